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

//! Routes decoded JSON-RPC requests onto `HandlerState` operations and
//! wraps their results back into the MCP envelope (SPEC_FULL.md §6).
//! This is the piece that's transport-agnostic: both the stdio loop
//! and the HTTP POST endpoint call `Dispatcher::handle` with a
//! decoded request and get back a response to re-encode.

use std::sync::Arc;

use serde_json::json;

use toolreg_core::storage::ToolStore;
use toolreg_core::ToolRegistry;

use crate::error::{HandlerError, PermissionChecker};

use super::handlers::HandlerState;
use super::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError, JsonRpcId,
    JsonRpcRequest, JsonRpcResponse, ListResourcesResult, ListToolsResult, McpToolDefinition,
    ReadResourceParams, ReadResourceResult, Resource, ResourceContent, ServerInfo,
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};

/// Everything the dispatcher needs that doesn't vary per-request.
/// Per-request state (the presented credential) is supplied to
/// `handle` separately, since an HTTP server shares one `Dispatcher`
/// across many connections that may each carry a different API key.
pub struct Dispatcher {
    pub registry: Arc<ToolRegistry>,
    pub storage: Arc<dyn ToolStore>,
    pub default_method: toolreg_core::SearchMethod,
    pub description: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        storage: Arc<dyn ToolStore>,
        default_method: toolreg_core::SearchMethod,
        description: String,
    ) -> Self {
        Self { registry, storage, default_method, description }
    }

    fn state(&self, permissions: Arc<dyn PermissionChecker>) -> HandlerState {
        HandlerState {
            registry: self.registry.clone(),
            storage: self.storage.clone(),
            permissions,
            default_method: self.default_method,
        }
    }

    pub async fn handle(
        &self,
        request: JsonRpcRequest,
        permissions: Arc<dyn PermissionChecker>,
    ) -> JsonRpcResponse {
        let id = request.id.clone();
        tracing::debug!(method = %request.method, "dispatching MCP request");

        match request.method.as_str() {
            "ping" => JsonRpcResponse::success(id, json!({})),
            "initialize" => self.handle_initialize(id, request.params),
            "initialized" | "notifications/initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params, permissions),
            "resources/list" => self.handle_resources_list(id),
            "resources/read" => self.handle_resources_read(id, request.params, permissions),
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        }
    }

    fn handle_initialize(&self, id: JsonRpcId, params: Option<serde_json::Value>) -> JsonRpcResponse {
        if let Some(p) = params {
            if let Err(e) = serde_json::from_value::<InitializeParams>(p) {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("invalid initialize params: {e}")),
                );
            }
        }
        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            server_info: ServerInfo { name: "toolreg".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
            description: self.description.clone(),
        };
        JsonRpcResponse::success(id, serde_json::to_value(result).unwrap())
    }

    fn handle_tools_list(&self, id: JsonRpcId) -> JsonRpcResponse {
        let tools = vec![
            McpToolDefinition {
                name: "search_tools".to_string(),
                description: "Search the tool catalog by query, ranked by the chosen method".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "method": {"type": "string", "enum": ["regex", "bm25", "semantic"]},
                        "k": {"type": "integer", "minimum": 1, "maximum": 100}
                    },
                    "required": ["query"]
                }),
            },
            McpToolDefinition {
                name: "search_hot_tools".to_string(),
                description: "Search only the hot and warm tiers of the tool catalog".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "method": {"type": "string", "enum": ["regex", "bm25", "semantic"]},
                        "k": {"type": "integer", "minimum": 1, "maximum": 100}
                    },
                    "required": ["query"]
                }),
            },
            McpToolDefinition {
                name: "get_tool_definition".to_string(),
                description: "Fetch the full record for one tool by name".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"]
                }),
            },
            McpToolDefinition {
                name: "list_tools_by_category".to_string(),
                description: "List tools in a category, or pass \"all\" to list every category".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "category": {"type": "string"},
                        "k": {"type": "integer", "minimum": 1, "maximum": 100}
                    },
                    "required": ["category"]
                }),
            },
            McpToolDefinition {
                name: "register_tool".to_string(),
                description: "Register a new tool in the catalog".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "description": {"type": "string"},
                        "mcp_server": {"type": "string"},
                        "category": {"type": "string"},
                        "tags": {"type": "array", "items": {"type": "string"}},
                        "input_schema": {"type": "object"},
                        "output_schema": {"type": "object"}
                    },
                    "required": ["name", "description"]
                }),
            },
            McpToolDefinition {
                name: "unregister_tool".to_string(),
                description: "Remove a tool from the catalog by name".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"]
                }),
            },
        ];
        JsonRpcResponse::success(id, serde_json::to_value(ListToolsResult { tools }).unwrap())
    }

    fn handle_tools_call(
        &self,
        id: JsonRpcId,
        params: Option<serde_json::Value>,
        permissions: Arc<dyn PermissionChecker>,
    ) -> JsonRpcResponse {
        let call: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(v) => v,
                Err(e) => {
                    return JsonRpcResponse::error(id, JsonRpcError::invalid_params(format!("invalid tool call params: {e}")))
                }
            },
            None => return JsonRpcResponse::error(id, JsonRpcError::invalid_params("missing tool call params")),
        };

        let args = serde_json::Value::Object(call.arguments.into_iter().collect());
        let state = self.state(permissions);

        let outcome = match call.name.as_str() {
            "search_tools" => parse_and_call(args, |p| state.search_tools(p)),
            "search_hot_tools" => parse_and_call(args, |p| state.search_hot_tools(p)),
            "get_tool_definition" => parse_and_call(args, |p| state.get_tool_definition(p)),
            "list_tools_by_category" => parse_and_call(args, |p| state.list_tools_by_category(p)),
            "register_tool" => parse_and_call(args, |p| state.register_tool(p)),
            "unregister_tool" => parse_and_call(args, |p| state.unregister_tool(p)),
            other => return JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        };

        match outcome {
            Ok(value) => JsonRpcResponse::success(id, serde_json::to_value(CallToolResult::json(value)).unwrap()),
            Err(err) => JsonRpcResponse::success(id, serde_json::to_value(CallToolResult::error(err.to_string())).unwrap()),
        }
    }

    fn handle_resources_list(&self, id: JsonRpcId) -> JsonRpcResponse {
        let resources = vec![
            Resource {
                uri: "toolreg://stats".to_string(),
                name: "Registry statistics".to_string(),
                description: Some("Tool counts, categories and most-used tools".to_string()),
                mime_type: Some("application/json".to_string()),
            },
            Resource {
                uri: "toolreg://categories".to_string(),
                name: "Categories".to_string(),
                description: Some("Every category currently in use".to_string()),
                mime_type: Some("application/json".to_string()),
            },
        ];
        JsonRpcResponse::success(id, serde_json::to_value(ListResourcesResult { resources }).unwrap())
    }

    fn handle_resources_read(
        &self,
        id: JsonRpcId,
        params: Option<serde_json::Value>,
        permissions: Arc<dyn PermissionChecker>,
    ) -> JsonRpcResponse {
        let read: ReadResourceParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(v) => v,
                Err(e) => {
                    return JsonRpcResponse::error(id, JsonRpcError::invalid_params(format!("invalid read params: {e}")))
                }
            },
            None => return JsonRpcResponse::error(id, JsonRpcError::invalid_params("missing read params")),
        };

        let state = self.state(permissions);
        let result = match read.uri.as_str() {
            "toolreg://stats" => state.get_stats(),
            "toolreg://categories" => state.get_categories(),
            other => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params(format!("unknown resource: {other}")))
            }
        };

        match result {
            Ok(value) => {
                let contents = vec![ResourceContent {
                    uri: read.uri,
                    mime_type: "application/json".to_string(),
                    text: value.to_string(),
                }];
                JsonRpcResponse::success(id, serde_json::to_value(ReadResourceResult { contents }).unwrap())
            }
            Err(err) => JsonRpcResponse::error(id, handler_error_to_jsonrpc(&err)),
        }
    }
}

fn parse_and_call<P, F>(args: serde_json::Value, f: F) -> Result<serde_json::Value, HandlerError>
where
    P: serde::de::DeserializeOwned,
    F: FnOnce(P) -> Result<serde_json::Value, HandlerError>,
{
    let params: P = serde_json::from_value(args).map_err(|e| HandlerError::Validation(e.to_string()))?;
    f(params)
}

fn handler_error_to_jsonrpc(err: &HandlerError) -> JsonRpcError {
    JsonRpcError::new(err.jsonrpc_code(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AllowAll;
    use toolreg_core::registry::TierThresholds;
    use toolreg_core::search::RegexSearch;
    use toolreg_core::storage::JsonStorage;
    use toolreg_core::tool::Tool;

    fn dispatcher() -> Dispatcher {
        let registry = Arc::new(ToolRegistry::new(TierThresholds::default(), true));
        registry.register_searcher(Arc::new(RegexSearch::default()));
        registry.register(Tool::new("github.create_pr", "Create a pull request").with_category("github"));
        let dir = tempfile::tempdir().unwrap().into_path();
        let storage = Arc::new(JsonStorage::new(dir.join("tools.json")));
        Dispatcher::new(registry, storage, toolreg_core::SearchMethod::Regex, "test server".to_string())
    }

    fn request(method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: JsonRpcId::Number(1),
        }
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version() {
        let d = dispatcher();
        let resp = d.handle(request("initialize", None), Arc::new(AllowAll)).await;
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let d = dispatcher();
        let resp = d.handle(request("nonexistent", None), Arc::new(AllowAll)).await;
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn tools_call_search_tools_returns_match() {
        let d = dispatcher();
        let params = json!({
            "name": "search_tools",
            "arguments": {"query": "pull request"}
        });
        let resp = d.handle(request("tools/call", Some(params)), Arc::new(AllowAll)).await;
        let result = resp.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tools_call_unknown_tool_reports_error_content() {
        let d = dispatcher();
        let params = json!({"name": "does_not_exist", "arguments": {}});
        let resp = d.handle(request("tools/call", Some(params)), Arc::new(AllowAll)).await;
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn resources_read_stats_returns_counts() {
        let d = dispatcher();
        let params = json!({"uri": "toolreg://stats"});
        let resp = d.handle(request("resources/read", Some(params)), Arc::new(AllowAll)).await;
        let result = resp.result.unwrap();
        let text = result["contents"][0]["text"].as_str().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["total_tools"], 1);
    }

    #[tokio::test]
    async fn resources_read_unknown_uri_is_invalid_params() {
        let d = dispatcher();
        let params = json!({"uri": "toolreg://nonsense"});
        let resp = d.handle(request("resources/read", Some(params)), Arc::new(AllowAll)).await;
        assert_eq!(resp.error.unwrap().code, -32602);
    }
}
