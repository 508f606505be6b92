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

//! Flat-file JSON storage backend (spec.md §4.4.1).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};
use crate::tool::{Temperature, Tool};

use super::{TemperatureThresholds, ToolStore};

/// Persists the catalog as a single pretty-printed JSON object keyed
/// by tool name. Writes go through a temp file in the same directory
/// followed by a rename, so a crash mid-write never corrupts the
/// live file (the rename is atomic on the same filesystem).
pub struct JsonStorage {
    path: PathBuf,
    thresholds: TemperatureThresholds,
}

impl JsonStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut path = path.into();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            path.set_extension("json");
        }
        Self { path, thresholds: TemperatureThresholds::default() }
    }

    pub fn with_thresholds(mut self, thresholds: TemperatureThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Load the persisted map. A missing file reads as empty. A file
    /// that exists but isn't valid JSON at all is whole-file
    /// corruption and is a fatal read failure (spec.md §7); an
    /// individual record within an otherwise-valid map that fails to
    /// deserialize is logged and skipped instead, so one bad entry
    /// doesn't take the whole store down.
    fn read_map(&self) -> Result<BTreeMap<String, Tool>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(RegistryError::from(e)),
        };
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| {
                RegistryError::Storage(format!("tool store file {:?} is not valid JSON: {e}", self.path))
            })?;
        Ok(raw
            .into_iter()
            .filter_map(|(name, value)| match serde_json::from_value::<Tool>(value) {
                Ok(tool) => Some((name, tool)),
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "skipping malformed tool record");
                    None
                }
            })
            .collect())
    }

    fn write_atomic(&self, data: &BTreeMap<String, Tool>) -> Result<()> {
        let parent = self.parent_dir();
        fs::create_dir_all(&parent)?;

        let json = serde_json::to_string_pretty(data)?;
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().and_then(|n| n.to_str()).unwrap_or("tools")
        ));
        fs::write(&tmp_path, json).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            RegistryError::from(e)
        })?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn parent_dir(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
    }
}

impl ToolStore for JsonStorage {
    fn load_all(&self) -> Result<Vec<Tool>> {
        Ok(self.read_map()?.into_values().collect())
    }

    fn save(&self, tool: &Tool) -> Result<()> {
        let mut data = self.read_map()?;
        data.insert(tool.name.clone(), tool.clone());
        self.write_atomic(&data)
    }

    fn save_many(&self, tools: &[Tool]) -> Result<()> {
        if tools.is_empty() {
            return Ok(());
        }
        let mut data = self.read_map()?;
        for tool in tools {
            data.insert(tool.name.clone(), tool.clone());
        }
        self.write_atomic(&data)
    }

    fn delete(&self, tool_name: &str) -> Result<bool> {
        let mut data = self.read_map()?;
        if data.remove(tool_name).is_none() {
            return Ok(false);
        }
        if data.is_empty() {
            let _ = fs::remove_file(&self.path);
        } else {
            self.write_atomic(&data)?;
        }
        Ok(true)
    }

    fn exists(&self, tool_name: &str) -> Result<bool> {
        Ok(self.read_map()?.contains_key(tool_name))
    }

    fn load_by_temperature(
        &self,
        temperature: Temperature,
        limit: Option<usize>,
    ) -> Result<Vec<Tool>> {
        let all = self.load_all()?;
        let filtered: Vec<Tool> = all
            .into_iter()
            .filter(|t| self.thresholds.matches(temperature, t.use_frequency))
            .collect();
        Ok(match limit {
            Some(n) => filtered.into_iter().take(n).collect(),
            None => filtered,
        })
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read_map()?.len())
    }

    fn get(&self, tool_name: &str) -> Result<Option<Tool>> {
        Ok(self.read_map()?.remove(tool_name))
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn initialize(&self) -> Result<()> {
        fs::create_dir_all(self.parent_dir())?;
        if !self.path.exists() {
            self.write_atomic(&BTreeMap::new())?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<bool> {
        if !self.path.is_file() {
            return Ok(false);
        }
        Ok(fs::read_to_string(&self.path)
            .ok()
            .and_then(|c| serde_json::from_str::<serde_json::Value>(&c).ok())
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonStorage::new(dir.path().join("tools.json"));
        assert_eq!(store.load_all().unwrap(), Vec::new());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = JsonStorage::new(dir.path().join("tools.json"));
        let tool = Tool::new("a", "A tool").with_category("github");
        store.save(&tool).unwrap();

        let loaded = store.get("a").unwrap().unwrap();
        assert_eq!(loaded.name, "a");
        assert_eq!(loaded.category.as_deref(), Some("github"));
    }

    #[test]
    fn delete_removes_file_when_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.json");
        let store = JsonStorage::new(&path);
        store.save(&Tool::new("a", "A")).unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!path.exists());
        assert!(!store.delete("a").unwrap());
    }

    #[test]
    fn load_by_temperature_filters_on_use_frequency() {
        let dir = tempdir().unwrap();
        let store = JsonStorage::new(dir.path().join("tools.json"));
        let mut hot = Tool::new("hot", "Hot tool");
        hot.use_frequency = 20;
        let mut cold = Tool::new("cold", "Cold tool");
        cold.use_frequency = 0;
        store.save_many(&[hot, cold]).unwrap();

        let hot_tools = store.load_by_temperature(Temperature::Hot, None).unwrap();
        assert_eq!(hot_tools.len(), 1);
        assert_eq!(hot_tools[0].name, "hot");
    }

    #[test]
    fn whole_file_corruption_is_a_fatal_read_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.json");
        fs::write(&path, "not json").unwrap();
        let store = JsonStorage::new(&path);
        assert!(store.load_all().is_err());
    }

    #[test]
    fn malformed_single_record_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.json");
        fs::write(
            &path,
            r#"{"good": {"name": "good", "description": "Fine"}, "bad": {"name": 42}}"#,
        )
        .unwrap();
        let store = JsonStorage::new(&path);
        let tools = store.load_all().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "good");
    }
}
