use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serenity::all::MessageId;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::starboard::payload::StarredMessagePayload;
use crate::utils::{channel_id, message_id, user_id};

pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not create database directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub recent_id: Option<MessageId>,
}

const INIT_STATEMENT: &str = "
    CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY CHECK (id = 0),
        recent_id INTEGER
    );

    CREATE TABLE IF NOT EXISTS starboard (
        message_id INTEGER PRIMARY KEY NOT NULL,
        author_id INTEGER NOT NULL,
        content TEXT,
        image_url TEXT,
        created_at TEXT NOT NULL,
        stars INTEGER NOT NULL,
        channel_id INTEGER NOT NULL,
        star_id INTEGER UNIQUE NOT NULL
    );
";

const INSERT_STARRED_MESSAGE: &str = "INSERT OR IGNORE INTO starboard (message_id, author_id, content, image_url, created_at, stars, channel_id, star_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

#[derive(Clone)]
pub(crate) struct Database {
    pool: Arc<Mutex<Pool<SqliteConnectionManager>>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").finish()
    }
}

impl Database {
    /// Opens (or creates) the store and makes sure the schema exists.
    pub fn new(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::new(manager)?;
        Self::from_pool(pool)
    }

    /// Single connection so every checkout sees the same in-memory database.
    pub fn in_memory() -> DatabaseResult<Self> {
        let pool = Pool::builder().max_size(1).build(SqliteConnectionManager::memory())?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> DatabaseResult<Self> {
        let conn = pool.get()?;
        conn.execute_batch(INIT_STATEMENT)?;
        drop(conn);

        Ok(Database { pool: Arc::new(Mutex::new(pool)) })
    }

    /// The connection goes back to the pool when the transaction is dropped.
    pub async fn begin_transaction(&self) -> DatabaseResult<DatabaseTransaction> {
        let pool_guard = self.pool.lock().await;
        let conn = pool_guard.get()?;
        Ok(DatabaseTransaction { conn })
    }
}

pub struct DatabaseTransaction {
    conn: PooledConnection<SqliteConnectionManager>,
}

struct StarredMessageRow {
    message_id: i64,
    author_id: i64,
    content: Option<String>,
    image_url: Option<String>,
    created_at: String,
    stars: i64,
    channel_id: i64,
    star_id: i64,
}

impl StarredMessageRow {
    fn into_payload(self) -> Option<StarredMessagePayload> {
        Some(StarredMessagePayload {
            message_id: message_id(self.message_id as u64)?,
            author_id: user_id(self.author_id as u64)?,
            content: self.content.unwrap_or_default(),
            image_url: self.image_url,
            created_at: DateTime::parse_from_rfc3339(&self.created_at).ok()?.with_timezone(&Utc),
            stars: self.stars,
            channel_id: channel_id(self.channel_id as u64)?,
            star_id: message_id(self.star_id as u64)?,
        })
    }
}

impl DatabaseTransaction {
    pub fn load_settings(&mut self) -> DatabaseResult<Settings> {
        let recent_id: Option<Option<i64>> = self.conn.query_row("SELECT recent_id FROM settings WHERE id = 0", [], |row| row.get(0)).optional()?;

        Ok(Settings { recent_id: recent_id.flatten().and_then(|id| message_id(id as u64)) })
    }

    pub fn save_settings(&mut self, settings: &Settings) -> DatabaseResult<()> {
        let recent_id = settings.recent_id.map(|id| id.get() as i64);
        self.conn.execute("INSERT INTO settings (id, recent_id) VALUES (0, ?1) ON CONFLICT(id) DO UPDATE SET recent_id = excluded.recent_id", params![recent_id])?;
        Ok(())
    }

    pub fn load_starred_messages(&mut self) -> DatabaseResult<Vec<StarredMessagePayload>> {
        let mut stmt = self.conn.prepare("SELECT message_id, author_id, content, image_url, created_at, stars, channel_id, star_id FROM starboard")?;
        let rows = stmt.query_map([], |row| {
            Ok(StarredMessageRow {
                message_id: row.get(0)?,
                author_id: row.get(1)?,
                content: row.get(2)?,
                image_url: row.get(3)?,
                created_at: row.get(4)?,
                stars: row.get(5)?,
                channel_id: row.get(6)?,
                star_id: row.get(7)?,
            })
        })?;

        let mut payloads = Vec::new();
        for row in rows {
            let row = row?;
            let star_id = row.star_id;
            match row.into_payload() {
                Some(payload) => payloads.push(payload),
                None => tracing::warn!("Skipping unreadable starboard row with star_id {}", star_id),
            }
        }

        Ok(payloads)
    }

    /// Returns false when a row with either id already exists.
    pub fn save_starred_message(&mut self, payload: &StarredMessagePayload) -> DatabaseResult<bool> {
        let inserted = self.conn.execute(INSERT_STARRED_MESSAGE, starred_message_params(payload))?;
        Ok(inserted > 0)
    }

    pub fn save_starred_messages<'a>(&mut self, payloads: impl IntoIterator<Item = &'a StarredMessagePayload>) -> DatabaseResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(INSERT_STARRED_MESSAGE)?;
            for payload in payloads {
                inserted += stmt.execute(starred_message_params(payload))?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    pub fn update_starred_message(&mut self, content: &str, stars: i64, id: MessageId) -> DatabaseResult<usize> {
        let updated = self.conn.execute("UPDATE starboard SET content = ?1, stars = ?2 WHERE message_id = ?3 OR star_id = ?3", params![content, stars, id.get() as i64])?;
        Ok(updated)
    }

    pub fn delete_starred_message(&mut self, id: MessageId) -> DatabaseResult<usize> {
        let deleted = self.conn.execute("DELETE FROM starboard WHERE message_id = ?1 OR star_id = ?1", params![id.get() as i64])?;
        Ok(deleted)
    }

    pub fn count_starred_messages(&mut self) -> DatabaseResult<i64> {
        let count = self.conn.query_row("SELECT COUNT(*) FROM starboard", [], |row| row.get(0))?;
        Ok(count)
    }

    #[cfg(test)]
    pub fn execute_batch(&mut self, sql: &str) -> DatabaseResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

fn starred_message_params(payload: &StarredMessagePayload) -> (i64, i64, &str, Option<&str>, String, i64, i64, i64) {
    (
        payload.message_id.get() as i64,
        payload.author_id.get() as i64,
        payload.content.as_str(),
        payload.image_url.as_deref(),
        payload.created_at.to_rfc3339(),
        payload.stars,
        payload.channel_id.get() as i64,
        payload.star_id.get() as i64,
    )
}

#[cfg(test)]
mod tests {
    use serenity::all::{ChannelId, UserId};

    use super::*;

    fn payload(message_id: u64, star_id: u64) -> StarredMessagePayload {
        StarredMessagePayload {
            message_id: MessageId::new(message_id),
            author_id: UserId::new(7),
            content: "hello".to_string(),
            image_url: Some("https://cdn.discordapp.com/x.png".to_string()),
            created_at: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
            stars: 5,
            channel_id: ChannelId::new(3),
            star_id: MessageId::new(star_id),
        }
    }

    #[tokio::test]
    async fn settings_start_empty_and_persist() {
        let db = Database::in_memory().unwrap();
        let mut tx = db.begin_transaction().await.unwrap();

        assert_eq!(tx.load_settings().unwrap(), Settings::default());

        tx.save_settings(&Settings { recent_id: Some(MessageId::new(42)) }).unwrap();
        tx.save_settings(&Settings { recent_id: Some(MessageId::new(43)) }).unwrap();
        assert_eq!(tx.load_settings().unwrap().recent_id, Some(MessageId::new(43)));
    }

    #[tokio::test]
    async fn starred_messages_round_trip_and_ignore_duplicates() {
        let db = Database::in_memory().unwrap();
        let mut tx = db.begin_transaction().await.unwrap();

        assert!(tx.save_starred_message(&payload(1, 100)).unwrap());
        assert!(!tx.save_starred_message(&payload(1, 100)).unwrap());
        assert!(!tx.save_starred_message(&payload(2, 100)).unwrap());
        assert_eq!(tx.save_starred_messages([&payload(1, 100), &payload(2, 200)]).unwrap(), 1);

        let mut loaded = tx.load_starred_messages().unwrap();
        loaded.sort_by_key(|p| p.message_id);
        assert_eq!(loaded, vec![payload(1, 100), payload(2, 200)]);
    }

    #[tokio::test]
    async fn update_and_delete_match_either_id() {
        let db = Database::in_memory().unwrap();
        let mut tx = db.begin_transaction().await.unwrap();
        tx.save_starred_message(&payload(1, 100)).unwrap();
        tx.save_starred_message(&payload(2, 200)).unwrap();

        assert_eq!(tx.update_starred_message("edited", 9, MessageId::new(100)).unwrap(), 1);
        assert_eq!(tx.update_starred_message("edited", 9, MessageId::new(5)).unwrap(), 0);
        let updated = tx.load_starred_messages().unwrap().into_iter().find(|p| p.message_id == MessageId::new(1)).unwrap();
        assert_eq!((updated.content.as_str(), updated.stars), ("edited", 9));

        assert_eq!(tx.delete_starred_message(MessageId::new(2)).unwrap(), 1);
        assert_eq!(tx.delete_starred_message(MessageId::new(100)).unwrap(), 1);
        assert_eq!(tx.count_starred_messages().unwrap(), 0);
    }
}
