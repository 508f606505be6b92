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

//! Request handlers for the registry's MCP-exposed operations
//! (SPEC_FULL.md §4.5): `search_tools`, `search_hot_tools`,
//! `get_tool_definition`, `list_tools_by_category`, `register_tool`,
//! `unregister_tool`, `get_stats`, `get_categories`.

use std::sync::Arc;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use toolreg_core::storage::ToolStore;
use toolreg_core::tool::Tool;
use toolreg_core::{RegistryError, SearchMethod, ToolRegistry};

use crate::error::{HandlerError, PermissionChecker, PermissionLevel};

const MAX_QUERY_LEN: usize = 1000;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_LIMIT: usize = 100;
const MIN_LIMIT: usize = 1;
const DEFAULT_LIMIT: usize = 10;

/// The literal category value that means "list every category" rather
/// than "list tools in the category named 'all'" (spec.md §4.5).
const ALL_CATEGORIES: &str = "all";

const SUPPORTED_METHODS: &[&str] = &["regex", "bm25", "semantic"];

/// Shared handler state: the registry, its persisted shadow, and the
/// injected permission gate. The auth subsystem itself (key
/// issuance/verification) is out of scope — only this contract is
/// implemented (SPEC_FULL.md §4.5).
pub struct HandlerState {
    pub registry: Arc<ToolRegistry>,
    pub storage: Arc<dyn ToolStore>,
    pub permissions: Arc<dyn PermissionChecker>,
    pub default_method: SearchMethod,
}

fn validate_limit(limit: Option<usize>) -> Result<usize, HandlerError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(k) if k < MIN_LIMIT || k > MAX_LIMIT => Err(HandlerError::Validation(format!(
            "k must be between {MIN_LIMIT} and {MAX_LIMIT}, got {k}"
        ))),
        Some(k) => Ok(k),
    }
}

fn validate_query(query: &str) -> Result<&str, HandlerError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(HandlerError::Validation("query must not be empty".to_string()));
    }
    if query.len() > MAX_QUERY_LEN {
        return Err(HandlerError::Validation(format!(
            "query exceeds {MAX_QUERY_LEN} characters"
        )));
    }
    Ok(trimmed)
}

fn validate_method(method: Option<&str>, default: SearchMethod) -> Result<SearchMethod, HandlerError> {
    match method {
        None => Ok(default),
        Some(raw) => SearchMethod::parse(raw).ok_or_else(|| {
            HandlerError::Validation(format!(
                "unknown search method '{raw}', supported: {}",
                SUPPORTED_METHODS.join(", ")
            ))
        }),
    }
}

fn validate_name(name: &str) -> Result<&str, HandlerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(HandlerError::Validation("tool name must not be empty".to_string()));
    }
    Ok(trimmed)
}

fn validate_description(description: &str) -> Result<&str, HandlerError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(HandlerError::Validation("description must not be empty".to_string()));
    }
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(HandlerError::Validation(format!(
            "description exceeds {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(trimmed)
}

fn validate_category(category: Option<&str>) -> Result<(), HandlerError> {
    if let Some(c) = category {
        if c.trim().is_empty() {
            return Err(HandlerError::Validation("category must not be blank".to_string()));
        }
    }
    Ok(())
}

fn validate_schema(schema: &Option<Value>) -> Result<(), HandlerError> {
    let Some(schema) = schema else { return Ok(()) };
    JSONSchema::options()
        .compile(schema)
        .map_err(|e| HandlerError::Validation(format!("invalid JSON Schema: {e}")))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ListByCategoryParams {
    pub category: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct NamedToolParams {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterToolParams {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub mcp_server: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
    #[serde(default)]
    pub output_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct StatsResult {
    pub total_tools: usize,
    pub category_count: usize,
    pub categories: Vec<String>,
    pub most_used: Vec<Tool>,
}

impl HandlerState {
    fn require(&self, level: PermissionLevel) -> Result<(), HandlerError> {
        self.permissions.check(level)?;
        Ok(())
    }

    pub fn search_tools(&self, params: SearchParams) -> Result<Value, HandlerError> {
        self.require(PermissionLevel::Read)?;
        let query = validate_query(&params.query)?;
        let limit = validate_limit(params.k)?;
        let method = validate_method(params.method.as_deref(), self.default_method)?;
        let results = self.registry.search(query, method, limit)?;
        Ok(json!({ "results": results }))
    }

    pub fn search_hot_tools(&self, params: SearchParams) -> Result<Value, HandlerError> {
        self.require(PermissionLevel::Read)?;
        let query = validate_query(&params.query)?;
        let limit = validate_limit(params.k)?;
        let method = validate_method(params.method.as_deref(), self.default_method)?;
        let results = self.registry.search_hot_warm(query, method, limit)?;
        Ok(json!({ "results": results }))
    }

    pub fn get_tool_definition(&self, params: NamedToolParams) -> Result<Value, HandlerError> {
        self.require(PermissionLevel::Read)?;
        let name = validate_name(&params.name)?;
        let tool = self.registry.get(name).ok_or_else(|| HandlerError::Registry(RegistryError::NotFound(name.to_string())))?;
        Ok(serde_json::to_value(tool).map_err(|e| HandlerError::Validation(e.to_string()))?)
    }

    /// `category == "all"` returns the full category list rather than
    /// a tool listing; any other category name (or its absence) lists
    /// the matching tools, truncated to `k` (spec.md §4.5).
    pub fn list_tools_by_category(&self, params: ListByCategoryParams) -> Result<Value, HandlerError> {
        self.require(PermissionLevel::Read)?;
        let limit = validate_limit(params.k)?;
        let category = params.category.trim();

        if category.is_empty() {
            return Err(HandlerError::Validation("category must not be blank".to_string()));
        }

        if category.eq_ignore_ascii_case(ALL_CATEGORIES) {
            return Ok(json!({ "categories": self.registry.list_categories() }));
        }

        let mut tools = self.registry.list(Some(category));
        tools.truncate(limit);
        Ok(json!({ "tools": tools }))
    }

    pub fn register_tool(&self, params: RegisterToolParams) -> Result<Value, HandlerError> {
        self.require(PermissionLevel::Write)?;
        let name = validate_name(&params.name)?.to_string();
        validate_description(&params.description)?;
        validate_category(params.category.as_deref())?;
        validate_schema(&params.input_schema)?;
        validate_schema(&params.output_schema)?;

        if self.registry.get(&name).is_some() {
            return Err(HandlerError::Registry(RegistryError::Conflict(name)));
        }

        let mut tool = Tool::new(name, params.description).with_tags(params.tags);
        if let Some(category) = params.category {
            tool = tool.with_category(category);
        }
        if let Some(server) = params.mcp_server {
            tool = tool.with_mcp_server(server);
        }
        tool = tool.with_schemas(params.input_schema, params.output_schema);

        self.storage.save(&tool)?;
        self.registry.register(tool);
        Ok(json!({ "registered": true }))
    }

    pub fn unregister_tool(&self, params: NamedToolParams) -> Result<Value, HandlerError> {
        self.require(PermissionLevel::Write)?;
        let name = validate_name(&params.name)?;
        if self.registry.get(name).is_none() {
            return Err(HandlerError::Registry(RegistryError::NotFound(name.to_string())));
        }
        self.storage.delete(name)?;
        self.registry.unregister(name);
        Ok(json!({ "unregistered": true }))
    }

    pub fn get_stats(&self) -> Result<Value, HandlerError> {
        self.require(PermissionLevel::Read)?;
        let stats = StatsResult {
            total_tools: self.registry.tool_count(),
            category_count: self.registry.category_count(),
            categories: self.registry.list_categories(),
            most_used: self.registry.get_most_used(10),
        };
        Ok(serde_json::to_value(stats).map_err(|e| HandlerError::Validation(e.to_string()))?)
    }

    pub fn get_categories(&self) -> Result<Value, HandlerError> {
        self.require(PermissionLevel::Read)?;
        Ok(json!({ "categories": self.registry.list_categories() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AllowAll;
    use toolreg_core::registry::TierThresholds;
    use toolreg_core::search::RegexSearch;
    use toolreg_core::storage::JsonStorage;

    fn state() -> HandlerState {
        let registry = Arc::new(ToolRegistry::new(TierThresholds::default(), true));
        registry.register_searcher(Arc::new(RegexSearch::default()));
        registry.register(Tool::new("github.create_pr", "Create a pull request").with_category("github"));
        // `into_path` hands ownership of the directory to the test process
        // instead of deleting it when the `TempDir` guard drops here.
        let dir = tempfile::tempdir().unwrap().into_path();
        let storage = Arc::new(JsonStorage::new(dir.join("tools.json")));
        HandlerState { registry, storage, permissions: Arc::new(AllowAll), default_method: SearchMethod::Regex }
    }

    #[test]
    fn search_tools_rejects_blank_query() {
        let state = state();
        let err = state
            .search_tools(SearchParams { query: "   ".to_string(), method: None, k: None })
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
    }

    #[test]
    fn search_tools_rejects_k_out_of_range() {
        let state = state();
        let err = state
            .search_tools(SearchParams { query: "pr".to_string(), method: None, k: Some(0) })
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));

        let err = state
            .search_tools(SearchParams { query: "pr".to_string(), method: None, k: Some(101) })
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
    }

    #[test]
    fn search_tools_rejects_unknown_method() {
        let state = state();
        let err = state
            .search_tools(SearchParams {
                query: "pr".to_string(),
                method: Some("fuzzy".to_string()),
                k: None,
            })
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
    }

    #[test]
    fn search_tools_finds_registered_tool() {
        let state = state();
        let result = state
            .search_tools(SearchParams {
                query: "pull request".to_string(),
                method: Some("regex".to_string()),
                k: None,
            })
            .unwrap();
        assert_eq!(result["results"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn register_tool_rejects_malformed_schema() {
        let state = state();
        let params = RegisterToolParams {
            name: "aws.list_buckets".to_string(),
            description: "List S3 buckets".to_string(),
            mcp_server: None,
            tags: vec![],
            category: None,
            input_schema: Some(json!({ "type": "not-a-real-type" })),
            output_schema: None,
        };
        assert!(state.register_tool(params).is_err());
    }

    #[test]
    fn register_tool_persists_to_storage() {
        let state = state();
        let params = RegisterToolParams {
            name: "aws.list_buckets".to_string(),
            description: "List S3 buckets".to_string(),
            mcp_server: None,
            tags: vec!["s3".to_string()],
            category: Some("aws".to_string()),
            input_schema: None,
            output_schema: None,
        };
        state.register_tool(params).unwrap();
        let persisted = state.storage.get("aws.list_buckets").unwrap().unwrap();
        assert_eq!(persisted.category.as_deref(), Some("aws"));
    }

    #[test]
    fn unregister_tool_removes_from_storage() {
        let state = state();
        state.storage.save(&Tool::new("github.create_pr", "Create a pull request")).unwrap();
        state.unregister_tool(NamedToolParams { name: "github.create_pr".to_string() }).unwrap();
        assert!(!state.storage.exists("github.create_pr").unwrap());
    }

    #[test]
    fn register_tool_rejects_duplicate_name() {
        let state = state();
        let params = RegisterToolParams {
            name: "github.create_pr".to_string(),
            description: "Duplicate".to_string(),
            mcp_server: None,
            tags: vec![],
            category: None,
            input_schema: None,
            output_schema: None,
        };
        let err = state.register_tool(params).unwrap_err();
        assert!(matches!(err, HandlerError::Registry(RegistryError::Conflict(_))));
    }

    #[test]
    fn register_tool_rejects_overlong_description() {
        let state = state();
        let params = RegisterToolParams {
            name: "svc.long".to_string(),
            description: "x".repeat(1001),
            mcp_server: None,
            tags: vec![],
            category: None,
            input_schema: None,
            output_schema: None,
        };
        assert!(matches!(
            state.register_tool(params).unwrap_err(),
            HandlerError::Validation(_)
        ));
    }

    #[test]
    fn unregister_tool_on_missing_name_is_not_found() {
        let state = state();
        let err = state.unregister_tool(NamedToolParams { name: "missing".to_string() }).unwrap_err();
        assert!(matches!(err, HandlerError::Registry(RegistryError::NotFound(_))));
    }

    #[test]
    fn get_stats_reports_current_counts() {
        let state = state();
        let stats = state.get_stats().unwrap();
        assert_eq!(stats["total_tools"], 1);
        assert_eq!(stats["category_count"], 1);
    }

    #[test]
    fn list_tools_by_category_all_returns_category_list() {
        let state = state();
        let result = state
            .list_tools_by_category(ListByCategoryParams { category: "all".to_string(), k: None })
            .unwrap();
        assert_eq!(result["categories"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn list_tools_by_category_specific_returns_tools() {
        let state = state();
        let result = state
            .list_tools_by_category(ListByCategoryParams { category: "github".to_string(), k: None })
            .unwrap();
        assert_eq!(result["tools"].as_array().unwrap().len(), 1);
    }
}
