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

//! The tool data model.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage-frequency tier a tool currently sits in.
///
/// Every tool is in exactly one tier at all times. Fresh tools default
/// to `Cold`; `ToolRegistry::update_usage` promotes a tool as its
/// `use_frequency` crosses the configured thresholds, and demotes
/// other tools inline when they've gone stale (see
/// `toolreg_core::registry::TierThresholds`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    Hot,
    Warm,
    Cold,
}

impl Default for Temperature {
    fn default() -> Self {
        Temperature::Cold
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Temperature::Hot => "hot",
            Temperature::Warm => "warm",
            Temperature::Cold => "cold",
        };
        f.write_str(s)
    }
}

impl Temperature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Temperature::Hot => "hot",
            Temperature::Warm => "warm",
            Temperature::Cold => "cold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hot" => Some(Temperature::Hot),
            "warm" => Some(Temperature::Warm),
            "cold" => Some(Temperature::Cold),
            _ => None,
        }
    }
}

/// Which search algorithm a query should be routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Regex,
    Bm25,
    Semantic,
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchMethod::Regex => "regex",
            SearchMethod::Bm25 => "bm25",
            SearchMethod::Semantic => "semantic",
        };
        f.write_str(s)
    }
}

impl SearchMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "regex" => Some(SearchMethod::Regex),
            "bm25" => Some(SearchMethod::Bm25),
            "semantic" | "embedding" => Some(SearchMethod::Semantic),
            _ => None,
        }
    }
}

/// A single catalog entry describing an MCP tool.
///
/// This is the authoritative, versionless tool record the registry
/// holds in memory and the storage backends persist verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_server: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub use_frequency: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub temperature: Temperature,
    #[serde(default = "default_defer_loading")]
    pub defer_loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

fn default_defer_loading() -> bool {
    true
}

impl Tool {
    /// Construct a fresh, never-used tool. Callers fill in tags and
    /// schemas afterwards; `use_frequency`/`last_used`/`temperature`
    /// start at their defaults.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            mcp_server: None,
            tags: BTreeSet::new(),
            category: None,
            use_frequency: 0,
            last_used: None,
            temperature: Temperature::default(),
            defer_loading: true,
            input_schema: None,
            output_schema: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_mcp_server(mut self, server: impl Into<String>) -> Self {
        self.mcp_server = Some(server.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_schemas(
        mut self,
        input_schema: Option<serde_json::Value>,
        output_schema: Option<serde_json::Value>,
    ) -> Self {
        self.input_schema = input_schema;
        self.output_schema = output_schema;
        self
    }

    /// The text corpus search algorithms index: name, description and
    /// tags joined with spaces (matches the original's
    /// `f"{name} {description} {' '.join(tags)}"`).
    pub fn search_corpus(&self) -> String {
        if self.tags.is_empty() {
            format!("{} {}", self.name, self.description)
        } else {
            let tags = self.tags.iter().cloned().collect::<Vec<_>>().join(" ");
            format!("{} {} {}", self.name, self.description, tags)
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.temperature)
    }
}

/// A single scored match returned by a search algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub tool_name: String,
    pub description: String,
    pub score: f64,
    pub match_reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tool_defaults_to_cold_and_zero_usage() {
        let tool = Tool::new("github.create_pr", "Create a pull request");
        assert_eq!(tool.temperature, Temperature::Cold);
        assert_eq!(tool.use_frequency, 0);
        assert!(tool.last_used.is_none());
        assert!(tool.defer_loading);
    }

    #[test]
    fn search_corpus_joins_name_description_and_tags() {
        let tool = Tool::new("github.create_pr", "Create a pull request")
            .with_tags(["github", "git"]);
        assert_eq!(tool.search_corpus(), "github.create_pr Create a pull request git github");
    }

    #[test]
    fn temperature_round_trips_through_str() {
        for t in [Temperature::Hot, Temperature::Warm, Temperature::Cold] {
            assert_eq!(Temperature::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn search_method_accepts_embedding_alias() {
        assert_eq!(SearchMethod::parse("embedding"), Some(SearchMethod::Semantic));
    }
}
