use crate::config::UnlabeledDocuments;
use crate::models::Document;
use crate::store::{ConversationLog, DocumentStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Label with the number of documents filed under it. `None` is the unlabeled pile.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSummary {
    pub label: Option<String>,
    pub documents: usize,
}

impl Database {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && path != ":memory:" {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
    }

    /// Runs a blocking closure against the database on the blocking thread pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;

        // Databases created before labels existed lack the column.
        let has_label = conn
            .prepare("PRAGMA table_info(documents)")?
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(Result::ok)
            .any(|name| name == "label");
        if !has_label {
            info!("Database: Adding label column to documents");
            conn.execute("ALTER TABLE documents ADD COLUMN label TEXT", [])?;
        }
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_documents_scope_label ON documents (channel_id, label);",
        )?;

        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    pub fn insert_document(
        &self,
        scope_key: &str,
        filename: &str,
        content: &str,
        label: Option<&str>,
    ) -> anyhow::Result<i64> {
        debug!(
            "Database: Saving document {} for scope {} (label: {:?})",
            filename, scope_key, label
        );
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (channel_id, filename, content, label) VALUES (?1, ?2, ?3, ?4)",
            (scope_key, filename, content, label),
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn select_documents(
        &self,
        scope_key: &str,
        label: Option<&str>,
        policy: UnlabeledDocuments,
    ) -> anyhow::Result<Vec<Document>> {
        if label.is_none() && policy == UnlabeledDocuments::None {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut sql = String::from(
            "SELECT id, channel_id, label, filename, content, uploaded_at
             FROM documents WHERE channel_id = ?1",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(scope_key.to_string())];
        if let Some(label) = label {
            sql.push_str(" AND label = ?2");
            params.push(Box::new(label.to_string()));
        }
        sql.push_str(" ORDER BY uploaded_at DESC, id DESC");

        let mut stmt = conn.prepare(&sql)?;
        let params_slice: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_slice[..], |row| {
            let uploaded_at: String = row.get(5)?;
            Ok(Document {
                id: row.get(0)?,
                scope_key: row.get(1)?,
                label: row.get(2)?,
                filename: row.get(3)?,
                content: row.get(4)?,
                uploaded_at: parse_sqlite_utc(&uploaded_at).unwrap_or_else(Utc::now),
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        debug!(
            "Database: {} documents for scope {} (label: {:?})",
            results.len(),
            scope_key,
            label
        );
        Ok(results)
    }

    pub fn count_documents(
        &self,
        scope_key: &str,
        label: Option<&str>,
        policy: UnlabeledDocuments,
    ) -> anyhow::Result<usize> {
        let conn = self.lock()?;
        let count: i64 = match (label, policy) {
            (Some(label), _) => conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE channel_id = ?1 AND label = ?2",
                (scope_key, label),
                |row| row.get(0),
            )?,
            (None, UnlabeledDocuments::All) => conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE channel_id = ?1",
                [scope_key],
                |row| row.get(0),
            )?,
            (None, UnlabeledDocuments::None) => 0,
        };
        Ok(count as usize)
    }

    pub fn list_labels(&self, scope_key: &str) -> anyhow::Result<Vec<LabelSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT label, COUNT(*) FROM documents WHERE channel_id = ?1
             GROUP BY label ORDER BY label IS NULL, label",
        )?;
        let rows = stmt.query_map([scope_key], |row| {
            Ok(LabelSummary {
                label: row.get(0)?,
                documents: row.get::<_, i64>(1)? as usize,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn insert_conversation(
        &self,
        scope_key: &str,
        user_id: &str,
        question: &str,
        answer: &str,
    ) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO conversations (channel_id, user_id, question, answer) VALUES (?1, ?2, ?3, ?4)",
            (scope_key, user_id, question, answer),
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub fn latest_answer(&self, scope_key: &str) -> anyhow::Result<Option<String>> {
        use rusqlite::OptionalExtension;
        let conn = self.lock()?;
        let answer = conn
            .query_row(
                "SELECT answer FROM conversations WHERE channel_id = ?1 ORDER BY id DESC LIMIT 1",
                [scope_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(answer)
    }
}

#[async_trait]
impl DocumentStore for Database {
    async fn save_document(
        &self,
        scope_key: &str,
        filename: &str,
        content: &str,
        label: Option<&str>,
    ) -> anyhow::Result<i64> {
        let (scope_key, filename, content) =
            (scope_key.to_string(), filename.to_string(), content.to_string());
        let label = label.map(str::to_string);
        self.run_blocking(move |db| {
            db.insert_document(&scope_key, &filename, &content, label.as_deref())
        })
        .await
    }

    async fn documents_for(
        &self,
        scope_key: &str,
        label: Option<&str>,
        policy: UnlabeledDocuments,
    ) -> anyhow::Result<Vec<Document>> {
        let scope_key = scope_key.to_string();
        let label = label.map(str::to_string);
        self.run_blocking(move |db| db.select_documents(&scope_key, label.as_deref(), policy))
            .await
    }

    async fn has_documents(
        &self,
        scope_key: &str,
        label: Option<&str>,
        policy: UnlabeledDocuments,
    ) -> anyhow::Result<bool> {
        let scope_key = scope_key.to_string();
        let label = label.map(str::to_string);
        self.run_blocking(move |db| db.count_documents(&scope_key, label.as_deref(), policy))
            .await
            .map(|n| n > 0)
    }
}

#[async_trait]
impl ConversationLog for Database {
    async fn log_conversation(
        &self,
        scope_key: &str,
        user_id: &str,
        question: &str,
        answer: &str,
    ) -> anyhow::Result<()> {
        let (scope_key, user_id, question, answer) = (
            scope_key.to_string(),
            user_id.to_string(),
            question.to_string(),
            answer.to_string(),
        );
        self.run_blocking(move |db| db.insert_conversation(&scope_key, &user_id, &question, &answer))
            .await
    }
}

fn parse_sqlite_utc(ts: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}
