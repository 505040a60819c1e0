//! SQLite annotation store
//!
//! A local stand-in for the remote annotation service: the CLI works against
//! it and it keeps a group's codebook available offline.

use super::traits::{AnnotationFilter, AnnotationStore, OpenStore, StoreError, StoreResult};
use crate::annotation::Annotation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// SQLite-backed annotation store
///
/// One row per annotation holding the full record as JSON, plus the columns
/// searches filter on and a tag side table. Thread-safe via an internal
/// mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS annotations (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                group_id TEXT NOT NULL,
                uri TEXT NOT NULL,
                motivation TEXT NOT NULL,
                user_name TEXT NOT NULL,
                record_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_annotations_group
                ON annotations(group_id, motivation);
            CREATE INDEX IF NOT EXISTS idx_annotations_uri
                ON annotations(uri);

            CREATE TABLE IF NOT EXISTS annotation_tags (
                annotation_id TEXT NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (annotation_id, tag),
                FOREIGN KEY (annotation_id) REFERENCES annotations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_annotation_tags_tag
                ON annotation_tags(tag);

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }

    fn write_tags(conn: &Connection, annotation: &Annotation) -> StoreResult<()> {
        conn.execute(
            "DELETE FROM annotation_tags WHERE annotation_id = ?1",
            params![annotation.id],
        )?;
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO annotation_tags (annotation_id, tag) VALUES (?1, ?2)",
        )?;
        for tag in &annotation.tags {
            stmt.execute(params![annotation.id, tag])?;
        }
        Ok(())
    }

    fn row_to_annotation(record_json: String) -> StoreResult<Annotation> {
        Ok(serde_json::from_str(&record_json)?)
    }

    fn load(conn: &Connection, id: &str) -> StoreResult<Option<Annotation>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM annotations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(Self::row_to_annotation).transpose()
    }

    fn created_at(conn: &Connection, id: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT created_at FROM annotations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| StoreError::DateParse(e.to_string()))
        })
        .transpose()
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl AnnotationStore for SqliteStore {
    async fn search(&self, filter: &AnnotationFilter) -> StoreResult<Vec<Annotation>> {
        let conn = self.conn()?;

        let mut sql = String::from("SELECT record_json FROM annotations WHERE 1=1");
        let mut values: Vec<String> = Vec::new();

        if let Some(tag) = &filter.tag {
            values.push(tag.clone());
            sql.push_str(&format!(
                " AND id IN (SELECT annotation_id FROM annotation_tags WHERE tag = ?{})",
                values.len()
            ));
        }
        if let Some(group) = &filter.group {
            values.push(group.clone());
            sql.push_str(&format!(" AND group_id = ?{}", values.len()));
        }
        if let Some(uri) = &filter.uri {
            values.push(uri.clone());
            sql.push_str(&format!(" AND uri = ?{}", values.len()));
        }
        if let Some(motivation) = &filter.motivation {
            values.push(motivation.as_str().to_string());
            sql.push_str(&format!(" AND motivation = ?{}", values.len()));
        }
        if let Some(user) = &filter.user {
            values.push(user.clone());
            sql.push_str(&format!(" AND user_name = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY seq");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(Self::row_to_annotation(row?)?);
        }
        Ok(out)
    }

    async fn create(&self, mut annotation: Annotation) -> StoreResult<Annotation> {
        if annotation.id.is_empty() {
            annotation.id = Uuid::new_v4().simple().to_string();
        }
        let now = Utc::now();
        let created = *annotation.created.get_or_insert(now);
        annotation.updated = Some(now);

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO annotations
                (id, group_id, uri, motivation, user_name, record_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                annotation.id,
                annotation.group,
                annotation.uri,
                annotation.motivation.as_str(),
                annotation.user,
                serde_json::to_string(&annotation)?,
                created.to_rfc3339(),
                now.to_rfc3339(),
            ],
        );
        match inserted {
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::Duplicate(annotation.id));
            }
            other => other?,
        };
        Self::write_tags(&tx, &annotation)?;
        tx.commit()?;
        Ok(annotation)
    }

    async fn update(&self, id: &str, mut annotation: Annotation) -> StoreResult<Annotation> {
        let conn = self.conn()?;
        let created =
            Self::created_at(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let now = Utc::now();
        annotation.id = id.to_string();
        annotation.created = Some(created);
        annotation.updated = Some(now);

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE annotations
                SET group_id = ?2, uri = ?3, motivation = ?4, user_name = ?5,
                    record_json = ?6, updated_at = ?7
              WHERE id = ?1",
            params![
                annotation.id,
                annotation.group,
                annotation.uri,
                annotation.motivation.as_str(),
                annotation.user,
                serde_json::to_string(&annotation)?,
                now.to_rfc3339(),
            ],
        )?;
        Self::write_tags(&tx, &annotation)?;
        tx.commit()?;
        Ok(annotation)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM annotation_tags WHERE annotation_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM annotations WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }
}

impl SqliteStore {
    /// Fetch a single record by id
    pub fn get(&self, id: &str) -> StoreResult<Option<Annotation>> {
        let conn = self.conn()?;
        Self::load(&conn, id)
    }
}
