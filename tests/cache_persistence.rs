//! Cache behavior across manager instances sharing one root.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use wiki_harvester::{CacheConfig, CacheManager, Variant, VariantDeriver};

struct CountingDeriver {
    calls: AtomicUsize,
}

impl CountingDeriver {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl VariantDeriver for CountingDeriver {
    fn derive(&self, source: &Path, dest: &Path, _variant: Variant) -> std::io::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        fs::copy(source, dest)?;
        Ok(())
    }
}

#[test]
fn index_persists_across_manager_instances() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("cache");
    let source = dir.path().join("bg.png");
    fs::write(&source, b"image bytes").unwrap();
    let deriver = CountingDeriver::new();
    let variant = Variant::new(720, 1280);

    let first_path = {
        let cache = CacheManager::new(&root, CacheConfig::default()).unwrap();
        cache.get_or_create(&source, variant, &deriver).unwrap()
    };

    // A fresh manager over the same root sees the persisted index and hits
    let cache = CacheManager::new(&root, CacheConfig::default()).unwrap();
    let second_path = cache.get_or_create(&source, variant, &deriver).unwrap();

    assert_eq!(first_path, second_path);
    assert_eq!(
        deriver.calls.load(Ordering::SeqCst),
        1,
        "Second instance must not re-derive"
    );
}

#[test]
fn changed_source_content_changes_the_key() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("cache");
    let source = dir.path().join("bg.png");
    let deriver = CountingDeriver::new();
    let variant = Variant::new(720, 1280);
    let cache = CacheManager::new(&root, CacheConfig::default()).unwrap();

    fs::write(&source, b"version one").unwrap();
    let first = cache.get_or_create(&source, variant, &deriver).unwrap();

    fs::write(&source, b"version two").unwrap();
    let second = cache.get_or_create(&source, variant, &deriver).unwrap();

    assert_ne!(first, second, "New content hash must address a new artifact");
    assert_eq!(deriver.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_inserts_do_not_drop_entries() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("cache");
    let cache = std::sync::Arc::new(CacheManager::new(&root, CacheConfig::default()).unwrap());

    struct CopyDeriver;
    impl VariantDeriver for CopyDeriver {
        fn derive(&self, source: &Path, dest: &Path, _variant: Variant) -> std::io::Result<()> {
            fs::copy(source, dest)?;
            Ok(())
        }
    }

    let mut sources = Vec::new();
    for i in 0..8 {
        let source = dir.path().join(format!("src{i}.png"));
        fs::write(&source, format!("content {i}")).unwrap();
        sources.push(source);
    }

    let handles: Vec<_> = sources
        .into_iter()
        .map(|source| {
            let cache = std::sync::Arc::clone(&cache);
            std::thread::spawn(move || {
                cache
                    .get_or_create(&source, Variant::new(1, 1), &CopyDeriver)
                    .unwrap()
            })
        })
        .collect();

    let paths: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Racing load-mutate-save cycles must not lose each other's entries
    for path in &paths {
        assert!(path.exists(), "artifact missing: {}", path.display());
    }

    let distinct: std::collections::HashSet<_> = paths.iter().collect();
    assert_eq!(distinct.len(), 8, "Each source content gets its own key");
}
