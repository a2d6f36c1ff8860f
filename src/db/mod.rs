// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Database module for brand preferences and post history

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{InstapostError, Result};

/// Database manager for instapost (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Stored voice and scheduling preferences for one brand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandPreferences {
    pub name: String,
    pub tone: String,
    pub audience: String,
    pub account: Option<String>,
    pub preferred_posting_time: Option<String>,
    pub timezone: Option<String>,
    pub examples: Vec<String>,
    pub extras: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl BrandPreferences {
    /// Empty preferences for a brand that has none stored yet
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tone: String::new(),
            audience: String::new(),
            account: None,
            preferred_posting_time: None,
            timezone: None,
            examples: Vec::new(),
            extras: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Published,
    DryRun,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Published => "published",
            PostStatus::DryRun => "dry_run",
            PostStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "published" => PostStatus::Published,
            "dry_run" => PostStatus::DryRun,
            _ => PostStatus::Failed,
        }
    }
}

/// A generated post as remembered for history and tone continuity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub brand: String,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub media_urls: Vec<String>,
    pub fingerprint: String,
    pub status: PostStatus,
    pub webhook_status: Option<u16>,
    pub created_at: DateTime<Utc>,
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub brand_count: i64,
    pub post_count: i64,
    pub published_count: i64,
    pub failed_count: i64,
}

const POST_COLUMNS: &str =
    "id, brand, caption, hashtags, media_urls, fingerprint, status, webhook_status, created_at";

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| InstapostError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS brands (
                name TEXT PRIMARY KEY,
                tone TEXT NOT NULL DEFAULT '',
                audience TEXT NOT NULL DEFAULT '',
                account TEXT,
                preferred_posting_time TEXT,
                timezone TEXT,
                examples TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS brand_preferences (
                brand TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (brand, key)
            );

            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                brand TEXT NOT NULL,
                caption TEXT NOT NULL,
                hashtags TEXT NOT NULL DEFAULT '[]',
                media_urls TEXT NOT NULL DEFAULT '[]',
                fingerprint TEXT NOT NULL,
                status TEXT NOT NULL,
                webhook_status INTEGER,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_posts_brand ON posts(brand, created_at);
            CREATE INDEX IF NOT EXISTS idx_posts_fingerprint ON posts(fingerprint);
        "#)?;
        Ok(())
    }

    /// Insert or replace a brand and its key/value extras
    pub fn upsert_brand(&self, brand: &BrandPreferences) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let examples = serde_json::to_string(&brand.examples)?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO brands (name, tone, audience, account, preferred_posting_time, timezone, examples, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
               ON CONFLICT(name) DO UPDATE SET
                   tone = excluded.tone,
                   audience = excluded.audience,
                   account = excluded.account,
                   preferred_posting_time = excluded.preferred_posting_time,
                   timezone = excluded.timezone,
                   examples = excluded.examples,
                   updated_at = excluded.updated_at"#,
            params![
                brand.name,
                brand.tone,
                brand.audience,
                brand.account,
                brand.preferred_posting_time,
                brand.timezone,
                examples,
                Utc::now().to_rfc3339(),
            ],
        )?;

        tx.execute("DELETE FROM brand_preferences WHERE brand = ?1", params![brand.name])?;
        for (key, value) in &brand.extras {
            tx.execute(
                "INSERT INTO brand_preferences (brand, key, value) VALUES (?1, ?2, ?3)",
                params![brand.name, key, value],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Get a brand with its extras
    pub fn get_brand(&self, name: &str) -> Result<Option<BrandPreferences>> {
        let conn = self.lock_conn()?;

        let brand = conn
            .query_row(
                r#"SELECT name, tone, audience, account, preferred_posting_time, timezone, examples, updated_at
                   FROM brands WHERE name = ?1"#,
                params![name],
                brand_from_row,
            )
            .optional()?;

        let Some(mut brand) = brand else {
            return Ok(None);
        };

        let mut stmt = conn.prepare("SELECT key, value FROM brand_preferences WHERE brand = ?1")?;
        brand.extras = stmt
            .query_map(params![name], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        Ok(Some(brand))
    }

    /// List all brands (without extras)
    pub fn list_brands(&self) -> Result<Vec<BrandPreferences>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT name, tone, audience, account, preferred_posting_time, timezone, examples, updated_at
               FROM brands ORDER BY name"#,
        )?;
        let brands = stmt.query_map([], brand_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(brands)
    }

    /// Delete a brand and its extras; returns false if it did not exist
    pub fn delete_brand(&self, name: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM brand_preferences WHERE brand = ?1", params![name])?;
        let removed = conn.execute("DELETE FROM brands WHERE name = ?1", params![name])?;
        Ok(removed > 0)
    }

    /// Set a single key/value preference on an existing brand
    pub fn set_preference(&self, brand: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.lock_conn()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM brands WHERE name = ?1)",
            params![brand],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(InstapostError::BrandNotFound(brand.to_string()));
        }

        conn.execute(
            r#"INSERT INTO brand_preferences (brand, key, value) VALUES (?1, ?2, ?3)
               ON CONFLICT(brand, key) DO UPDATE SET value = excluded.value"#,
            params![brand, key, value],
        )?;
        conn.execute(
            "UPDATE brands SET updated_at = ?2 WHERE name = ?1",
            params![brand, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Record a post; returns its id
    pub fn insert_post(
        &self,
        brand: &str,
        caption: &str,
        hashtags: &[String],
        media_urls: &[String],
        fingerprint: &str,
        status: PostStatus,
        webhook_status: Option<u16>,
    ) -> Result<String> {
        let conn = self.lock_conn()?;
        let id = new_post_id();

        conn.execute(
            r#"INSERT INTO posts (id, brand, caption, hashtags, media_urls, fingerprint, status, webhook_status, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                id,
                brand,
                caption,
                serde_json::to_string(hashtags)?,
                serde_json::to_string(media_urls)?,
                fingerprint,
                status.as_str(),
                webhook_status,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(id)
    }

    /// Most recent posts, optionally for one brand
    pub fn recent_posts(&self, brand: Option<&str>, limit: usize) -> Result<Vec<PostRecord>> {
        let conn = self.lock_conn()?;
        let posts = match brand {
            Some(brand) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM posts WHERE brand = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                    POST_COLUMNS
                ))?;
                let rows = stmt.query_map(params![brand, limit as i64], post_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM posts ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                    POST_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit as i64], post_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(posts)
    }

    /// Captions this brand actually published, newest first
    pub fn published_captions(&self, brand: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT caption FROM posts WHERE brand = ?1 AND status = 'published'
               ORDER BY created_at DESC, rowid DESC LIMIT ?2"#,
        )?;
        let captions = stmt
            .query_map(params![brand, limit as i64], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(captions)
    }

    /// Check for an already published post with the same fingerprint
    pub fn find_duplicate(&self, fingerprint: &str) -> Result<Option<String>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id FROM posts WHERE fingerprint = ?1 AND status = 'published' LIMIT 1",
            params![fingerprint],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DbStats> {
        let conn = self.lock_conn()?;
        let brand_count: i64 = conn.query_row("SELECT COUNT(*) FROM brands", [], |row| row.get(0))?;
        let post_count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        let published_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE status = 'published'",
            [],
            |row| row.get(0),
        )?;
        let failed_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE status = 'failed'",
            [],
            |row| row.get(0),
        )?;
        Ok(DbStats { brand_count, post_count, published_count, failed_count })
    }

    /// Vacuum database
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }
}

fn brand_from_row(row: &Row<'_>) -> rusqlite::Result<BrandPreferences> {
    let examples: String = row.get(6)?;
    let updated: String = row.get(7)?;
    Ok(BrandPreferences {
        name: row.get(0)?,
        tone: row.get(1)?,
        audience: row.get(2)?,
        account: row.get(3)?,
        preferred_posting_time: row.get(4)?,
        timezone: row.get(5)?,
        examples: serde_json::from_str(&examples).unwrap_or_default(),
        extras: BTreeMap::new(),
        updated_at: parse_timestamp(&updated),
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    let hashtags: String = row.get(3)?;
    let media_urls: String = row.get(4)?;
    let status: String = row.get(6)?;
    let created: String = row.get(8)?;
    Ok(PostRecord {
        id: row.get(0)?,
        brand: row.get(1)?,
        caption: row.get(2)?,
        hashtags: serde_json::from_str(&hashtags).unwrap_or_default(),
        media_urls: serde_json::from_str(&media_urls).unwrap_or_default(),
        fingerprint: row.get(5)?,
        status: PostStatus::parse(&status),
        webhook_status: row.get(7)?,
        created_at: parse_timestamp(&created),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Generate a new UUID for post records
pub fn new_post_id() -> String {
    Uuid::new_v4().to_string()
}
