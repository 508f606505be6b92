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

//! Pluggable persistence backends for the tool catalog (spec.md §4.4).

mod json;
mod sqlite;

pub use json::JsonStorage;
pub use sqlite::SqliteStorage;

use crate::error::Result;
use crate::tool::{Temperature, Tool};

/// Synchronous storage contract. Implementations are blocking by
/// design (file I/O, SQLite) — async callers invoke these through
/// `tokio::task::spawn_blocking` rather than the trait itself being
/// async, so the trait carries no runtime dependency and backends are
/// unit-testable without an async test harness.
pub trait ToolStore: Send + Sync {
    /// Load every persisted tool. A missing store is treated as empty.
    /// A store that exists but is unreadable as a whole (not valid
    /// JSON / not a valid database) is a fatal read failure; a single
    /// malformed record within an otherwise-valid store is logged and
    /// skipped instead (spec.md §7).
    fn load_all(&self) -> Result<Vec<Tool>>;

    /// Persist a single tool, replacing any existing entry with the
    /// same name.
    fn save(&self, tool: &Tool) -> Result<()>;

    /// Persist many tools as a single durable batch.
    fn save_many(&self, tools: &[Tool]) -> Result<()>;

    /// Remove a tool by name. Returns `true` if it existed.
    fn delete(&self, tool_name: &str) -> Result<bool>;

    /// Whether a tool by this name is currently persisted.
    fn exists(&self, tool_name: &str) -> Result<bool>;

    /// Load tools whose use-frequency falls into `temperature`'s
    /// range. Backed by a `WHERE` pushdown on the SQL backend, by a
    /// full-load-then-filter on the flat-file backend.
    fn load_by_temperature(
        &self,
        temperature: Temperature,
        limit: Option<usize>,
    ) -> Result<Vec<Tool>>;

    /// Number of persisted tools.
    fn count(&self) -> Result<usize>;

    /// Whether the store currently holds zero tools.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// Load a single tool by name.
    fn get(&self, tool_name: &str) -> Result<Option<Tool>>;

    /// Remove every persisted tool.
    fn clear(&self) -> Result<()>;

    /// Prepare the backend for use (create files/tables as needed).
    /// Idempotent.
    fn initialize(&self) -> Result<()>;

    /// Sanity-check that the backend is in a readable, well-formed
    /// state.
    fn validate(&self) -> Result<bool>;
}

/// Threshold pair used by `load_by_temperature` implementations to
/// translate a `Temperature` into a `use_frequency` range.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureThresholds {
    pub hot: u64,
    pub warm: u64,
}

impl Default for TemperatureThresholds {
    fn default() -> Self {
        Self { hot: 10, warm: 3 }
    }
}

impl TemperatureThresholds {
    pub fn matches(&self, temperature: Temperature, use_frequency: u64) -> bool {
        match temperature {
            Temperature::Hot => use_frequency >= self.hot,
            Temperature::Warm => use_frequency >= self.warm && use_frequency < self.hot,
            Temperature::Cold => use_frequency < self.warm,
        }
    }
}
