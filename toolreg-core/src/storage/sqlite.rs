// Copyright 2026 Toolreg Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Embedded-SQL storage backend (spec.md §4.4.2).
//!
//! Uses `rusqlite` rather than the teacher workspace's in-house
//! `sochdb`/`sochdb-index` crates, which are not publishable outside
//! that repository (see DESIGN.md).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::tool::{Temperature, Tool};

use super::{TemperatureThresholds, ToolStore};

const TABLE: &str = "tools";

const CREATE_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS tools (
    name TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    mcp_server TEXT,
    defer_loading INTEGER NOT NULL DEFAULT 1,
    tags TEXT,
    category TEXT,
    use_frequency INTEGER NOT NULL DEFAULT 0,
    last_used TEXT,
    temperature TEXT NOT NULL DEFAULT 'cold',
    input_schema TEXT,
    output_schema TEXT
)";

/// SQLite-backed storage. `save_many` batches all upserts inside a
/// single transaction; `load_by_temperature` pushes the frequency
/// comparison into a `WHERE` clause instead of filtering in memory.
pub struct SqliteStorage {
    path: PathBuf,
    conn: Mutex<Connection>,
    thresholds: TemperatureThresholds,
}

impl SqliteStorage {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let mut path = path.into();
        if path.extension().and_then(|e| e.to_str()) != Some("db") {
            path.set_extension("db");
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(Self { path, conn: Mutex::new(conn), thresholds: TemperatureThresholds::default() })
    }

    /// Use non-default hot/warm `use_frequency` thresholds for
    /// `load_by_temperature`'s WHERE pushdown. The `temperature`
    /// column stored per-row is only a secondary index hint — these
    /// thresholds are authoritative (spec.md §4.4.2), so changing them
    /// never requires a data migration.
    pub fn with_thresholds(mut self, thresholds: TemperatureThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    fn row_to_tool(row: &rusqlite::Row) -> rusqlite::Result<Tool> {
        let tags_json: Option<String> = row.get("tags")?;
        let tags: std::collections::BTreeSet<String> = tags_json
            .map(|s| serde_json::from_str(&s).unwrap_or_default())
            .unwrap_or_default();
        let input_schema: Option<String> = row.get("input_schema")?;
        let output_schema: Option<String> = row.get("output_schema")?;
        let last_used: Option<String> = row.get("last_used")?;
        let temperature: String = row.get("temperature")?;

        Ok(Tool {
            name: row.get("name")?,
            description: row.get("description")?,
            mcp_server: row.get("mcp_server")?,
            tags,
            category: row.get("category")?,
            use_frequency: {
                let v: i64 = row.get("use_frequency")?;
                v as u64
            },
            last_used: last_used.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
            temperature: Temperature::parse(&temperature).unwrap_or(Temperature::Cold),
            defer_loading: {
                let v: i64 = row.get("defer_loading")?;
                v != 0
            },
            input_schema: input_schema.and_then(|s| serde_json::from_str(&s).ok()),
            output_schema: output_schema.and_then(|s| serde_json::from_str(&s).ok()),
        })
    }

    fn upsert(conn: &Connection, tool: &Tool) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO tools
                (name, description, mcp_server, defer_loading, tags, category,
                 use_frequency, last_used, temperature, input_schema, output_schema)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                mcp_server = excluded.mcp_server,
                defer_loading = excluded.defer_loading,
                tags = excluded.tags,
                category = excluded.category,
                use_frequency = excluded.use_frequency,
                last_used = excluded.last_used,
                temperature = excluded.temperature,
                input_schema = excluded.input_schema,
                output_schema = excluded.output_schema",
            params![
                tool.name,
                tool.description,
                tool.mcp_server,
                tool.defer_loading as i64,
                serde_json::to_string(&tool.tags).unwrap_or_default(),
                tool.category,
                tool.use_frequency as i64,
                tool.last_used.map(|d| d.to_rfc3339()),
                tool.temperature.as_str(),
                tool.input_schema.as_ref().map(|v| v.to_string()),
                tool.output_schema.as_ref().map(|v| v.to_string()),
            ],
        )?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ToolStore for SqliteStorage {
    fn load_all(&self) -> Result<Vec<Tool>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT * FROM {TABLE}"))?;
        let rows = stmt.query_map([], Self::row_to_tool)?;
        Ok(rows.filter_map(std::result::Result::ok).collect())
    }

    fn save(&self, tool: &Tool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Self::upsert(&conn, tool)?;
        Ok(())
    }

    fn save_many(&self, tools: &[Tool]) -> Result<()> {
        if tools.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for tool in tools {
            Self::upsert(&tx, tool)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, tool_name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(&format!("DELETE FROM {TABLE} WHERE name = ?1"), params![tool_name])?;
        Ok(affected > 0)
    }

    fn exists(&self, tool_name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let found: Option<i64> = conn
            .query_row(&format!("SELECT 1 FROM {TABLE} WHERE name = ?1"), params![tool_name], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn load_by_temperature(
        &self,
        temperature: Temperature,
        limit: Option<usize>,
    ) -> Result<Vec<Tool>> {
        // Pushed down into SQL per spec.md §4.4.2: this is the whole
        // reason this backend exists alongside the flat-file one.
        let conn = self.conn.lock().unwrap();
        let hot_threshold = self.thresholds.hot as i64;
        let warm_threshold = self.thresholds.warm as i64;
        let (where_clause, hot, warm) = match temperature {
            Temperature::Hot => ("use_frequency >= ?1".to_string(), hot_threshold, 0i64),
            Temperature::Warm => {
                ("use_frequency >= ?1 AND use_frequency < ?2".to_string(), warm_threshold, hot_threshold)
            }
            Temperature::Cold => ("use_frequency < ?1".to_string(), warm_threshold, 0i64),
        };
        let mut sql = format!("SELECT * FROM {TABLE} WHERE {where_clause}");
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = match temperature {
            Temperature::Warm => stmt.query_map(params![hot, warm], Self::row_to_tool)?,
            _ => stmt.query_map(params![hot], Self::row_to_tool)?,
        };
        Ok(rows.filter_map(std::result::Result::ok).collect())
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn get(&self, tool_name: &str) -> Result<Option<Tool>> {
        let conn = self.conn.lock().unwrap();
        let tool = conn
            .query_row(&format!("SELECT * FROM {TABLE} WHERE name = ?1"), params![tool_name], Self::row_to_tool)
            .optional()?;
        Ok(tool)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(&format!("DELETE FROM {TABLE}"), [])?;
        Ok(())
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(())
    }

    fn validate(&self) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                params![TABLE],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = SqliteStorage::new(dir.path().join("tools.db")).unwrap();
        let tool = Tool::new("a", "A tool").with_category("aws").with_tags(["aws", "cloud"]);
        store.save(&tool).unwrap();

        let loaded = store.get("a").unwrap().unwrap();
        assert_eq!(loaded.name, "a");
        assert_eq!(loaded.category.as_deref(), Some("aws"));
        assert_eq!(loaded.tags.len(), 2);
    }

    #[test]
    fn save_many_is_transactional() {
        let dir = tempdir().unwrap();
        let store = SqliteStorage::new(dir.path().join("tools.db")).unwrap();
        let tools = vec![Tool::new("a", "A"), Tool::new("b", "B")];
        store.save_many(&tools).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn load_by_temperature_pushes_down_to_sql() {
        let dir = tempdir().unwrap();
        let store = SqliteStorage::new(dir.path().join("tools.db")).unwrap();
        let mut hot = Tool::new("hot", "Hot tool");
        hot.use_frequency = 15;
        let mut warm = Tool::new("warm", "Warm tool");
        warm.use_frequency = 5;
        let mut cold = Tool::new("cold", "Cold tool");
        cold.use_frequency = 1;
        store.save_many(&[hot, warm, cold]).unwrap();

        assert_eq!(store.load_by_temperature(Temperature::Hot, None).unwrap().len(), 1);
        assert_eq!(store.load_by_temperature(Temperature::Warm, None).unwrap().len(), 1);
        assert_eq!(store.load_by_temperature(Temperature::Cold, None).unwrap().len(), 1);
    }

    #[test]
    fn delete_reports_whether_a_row_existed() {
        let dir = tempdir().unwrap();
        let store = SqliteStorage::new(dir.path().join("tools.db")).unwrap();
        store.save(&Tool::new("a", "A")).unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
    }
}
