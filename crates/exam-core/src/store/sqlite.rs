//! SQLite-backed paper store.
//!
//! One `papers` table keyed by id. The paper itself is stored as its wire
//! JSON so what is pushed is exactly what was saved.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::PaperStore;
use crate::error::{ExamError, Result};
use crate::model::Paper;

pub struct SqlitePaperStore {
    conn: Mutex<Connection>,
}

impl SqlitePaperStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS papers (
                id TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                data_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS papers_created_at ON papers(created_at);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ExamError::Storage("SQLite connection poisoned".to_string()))
    }

    fn paper_from_row(id: String, data_json: String) -> Result<Paper> {
        serde_json::from_str(&data_json)
            .map_err(|e| ExamError::Storage(format!("Paper {} is unreadable: {}", id, e)))
    }
}

impl PaperStore for SqlitePaperStore {
    fn add(&self, paper: &Paper) -> Result<()> {
        let data_json = serde_json::to_string(paper)?;
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO papers (id, created_at, data_json) VALUES (?1, ?2, ?3)",
            params![paper.id, paper.created_at.timestamp_millis(), data_json],
        )?;
        if inserted == 0 {
            return Err(ExamError::InvalidInput(format!(
                "Paper {} already exists",
                paper.id
            )));
        }
        Ok(())
    }

    fn put(&self, paper: &Paper) -> Result<()> {
        let data_json = serde_json::to_string(paper)?;
        self.conn()?.execute(
            r#"
            INSERT INTO papers (id, created_at, data_json) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                created_at = excluded.created_at,
                data_json = excluded.data_json
            "#,
            params![paper.id, paper.created_at.timestamp_millis(), data_json],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM papers WHERE id = ?1", [id])?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Paper>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, data_json FROM papers WHERE id = ?1",
                [id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(id, data)| Self::paper_from_row(id, data))
            .transpose()
    }

    fn get_all(&self) -> Result<Vec<Paper>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, data_json FROM papers ORDER BY created_at DESC, id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut papers = Vec::new();
        for row in rows {
            let (id, data) = row?;
            papers.push(Self::paper_from_row(id, data)?);
        }
        Ok(papers)
    }

    fn clear(&self) -> Result<()> {
        self.conn()?.execute("DELETE FROM papers", [])?;
        Ok(())
    }
}
