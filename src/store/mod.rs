//! Domain and item persistence with search queries.
//!
//! This module provides the [`Store`] handle over a [`Database`] for the
//! two persisted record kinds: domains (site roots registered for
//! scraping) and items (entities extracted from detail pages). Every
//! operation is one connection-scoped statement; no transaction spans
//! multiple calls.
//!
//! The store is an explicit handle, never ambient state: multiple stores
//! over different databases can coexist, and tests isolate state by
//! constructing their own in-memory database.
//!
//! # Example
//!
//! ```ignore
//! use wiki_harvester::{Database, Store};
//!
//! let db = Database::new_in_memory().await?;
//! let store = Store::new(db);
//!
//! store.add_domain("https://example.com").await?;
//! store.add_item("Peeper", Some("A small fish"), Some("Fauna")).await?;
//! let hits = store.search_items(Some("fish"), None).await?;
//! ```

mod error;

pub use error::StoreError;

use sqlx::QueryBuilder;
use tracing::instrument;

use crate::db::Database;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A structured record extracted from a detail page.
///
/// `description` and `category` are best-effort fields: absent means the
/// source page had no matching element, not that it was empty.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ItemRecord {
    /// Entity name (non-empty by construction from link text).
    pub name: String,
    /// First paragraph of the detail page, trimmed.
    pub description: Option<String>,
    /// Visible text of the first category-namespace link, trimmed.
    pub category: Option<String>,
}

/// Persistence handle for domains and items.
///
/// Callers receive copies of rows, never live handles; rows are owned
/// exclusively by the store.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    /// Creates a new store over the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers a domain for scraping.
    ///
    /// Returns `Ok(true)` on insert, `Ok(false)` if the URL is already
    /// registered. The uniqueness violation is an expected outcome, not
    /// an error, and leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] for any failure other than the
    /// uniqueness violation.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn add_domain(&self, url: &str) -> Result<bool> {
        let result = sqlx::query("INSERT INTO domains (url) VALUES (?)")
            .bind(url)
            .execute(self.db.pool())
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    /// Removes a registered domain by URL.
    ///
    /// Returns `true` if a row was deleted, `false` if the URL was not
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn delete_domain(&self, url: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM domains WHERE url = ?")
            .bind(url)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns all registered domain URLs, most-recently-created first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_domains(&self) -> Result<Vec<String>> {
        // created_at has second resolution; id breaks ties deterministically
        let urls = sqlx::query_scalar(
            "SELECT url FROM domains ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(urls)
    }

    /// Inserts a scraped item.
    ///
    /// No uniqueness constraint applies: repeated scrapes of the same
    /// domain may insert duplicate rows by design.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    #[instrument(skip(self, description, category), fields(name = %name))]
    pub async fn add_item(
        &self,
        name: &str,
        description: Option<&str>,
        category: Option<&str>,
    ) -> Result<()> {
        sqlx::query("INSERT INTO items (name, description, category) VALUES (?, ?, ?)")
            .bind(name)
            .bind(description)
            .bind(category)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Searches items by keyword and/or category.
    ///
    /// `keyword` is a case-sensitive substring match against name OR
    /// description; `category` is an exact match. Both filters AND
    /// together when both are given; no filters returns all rows. The
    /// full result is materialized, no pagination.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn search_items(
        &self,
        keyword: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<ItemRecord>> {
        let mut query = QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT name, description, category FROM items WHERE 1=1",
        );

        if let Some(keyword) = keyword {
            let pattern = format!("%{keyword}%");
            query.push(" AND (name LIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR description LIKE ");
            query.push_bind(pattern);
            query.push(")");
        }

        if let Some(category) = category {
            query.push(" AND category = ");
            query.push_bind(category);
        }

        query.push(" ORDER BY id");

        let items = query
            .build_query_as::<ItemRecord>()
            .fetch_all(self.db.pool())
            .await?;

        Ok(items)
    }

    /// Deletes all registered domains.
    ///
    /// Items are unaffected: the schema has no foreign key from items to
    /// domains, so no cascade applies.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear_domains(&self) -> Result<()> {
        sqlx::query("DELETE FROM domains")
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Deletes all scraped items.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear_items(&self) -> Result<()> {
        sqlx::query("DELETE FROM items")
            .execute(self.db.pool())
            .await?;

        Ok(())
    }
}
