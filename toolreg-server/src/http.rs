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

//! Streamable HTTP transport: a single JSON-RPC POST endpoint plus a
//! health check, the HTTP half of SPEC_FULL.md §6 (stdio is
//! `mcp::transport::StdioTransport`). Grounded in the teacher's own
//! axum wiring (`agentreplay-server/src/lib.rs`, `mcp/server.rs`) but
//! trimmed to what this server actually exposes — no WebSocket or SSE,
//! those aren't part of this crate's surface.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::ApiKeyStore;
use crate::error::{AllowAll, PermissionChecker};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::Dispatcher;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct HttpState {
    pub dispatcher: Arc<Dispatcher>,
    pub enable_auth: bool,
    pub keys: Arc<ApiKeyStore>,
}

/// Builds the router. `mount_path` is `ServerConfig::path` (default
/// `/`), validated by `ServerConfig::validate` to start with `/`.
pub fn router(state: HttpState, mount_path: &str) -> Router {
    Router::new()
        .route(mount_path, post(handle_rpc))
        .route("/healthz", get(handle_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_rpc(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> (StatusCode, Json<JsonRpcResponse>) {
    let permissions: Arc<dyn PermissionChecker> = if state.enable_auth {
        let presented = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        Arc::new(state.keys.checker_for(presented))
    } else {
        Arc::new(AllowAll)
    };

    let response = state.dispatcher.handle(request, permissions).await;
    let status = match &response.error {
        Some(e) => status_for_jsonrpc_code(e.code),
        None => StatusCode::OK,
    };
    (status, Json(response))
}

fn status_for_jsonrpc_code(code: i32) -> StatusCode {
    match code {
        -32700 | -32602 => StatusCode::BAD_REQUEST,
        -32601 => StatusCode::NOT_FOUND,
        -32003 => StatusCode::FORBIDDEN,
        -32001 => StatusCode::NOT_FOUND,
        -32002 => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiKeyStore;
    use toolreg_core::registry::TierThresholds;
    use toolreg_core::search::RegexSearch;
    use toolreg_core::storage::JsonStorage;
    use toolreg_core::tool::Tool;
    use toolreg_core::{SearchMethod, ToolRegistry};

    fn test_state(enable_auth: bool) -> HttpState {
        let registry = Arc::new(ToolRegistry::new(TierThresholds::default(), true));
        registry.register_searcher(Arc::new(RegexSearch::default()));
        registry.register(Tool::new("github.create_pr", "Create a pull request"));
        let dir = tempfile::tempdir().unwrap().into_path();
        let storage = Arc::new(JsonStorage::new(dir.join("tools.json")));
        let dispatcher = Arc::new(Dispatcher::new(registry, storage, SearchMethod::Regex, "test".to_string()));
        HttpState { dispatcher, enable_auth, keys: Arc::new(ApiKeyStore::new()) }
    }

    #[tokio::test]
    async fn health_check_reports_ok() {
        let response = handle_health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rpc_without_auth_succeeds_when_auth_disabled() {
        let state = test_state(false);
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: "ping".to_string(),
            params: None,
            id: crate::mcp::protocol::JsonRpcId::Number(1),
        };
        let (status, Json(response)) = handle_rpc(State(state), HeaderMap::new(), Json(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn rpc_without_key_is_forbidden_when_auth_enabled() {
        let state = test_state(true);
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: "tools/call".to_string(),
            params: Some(serde_json::json!({
                "name": "search_tools",
                "arguments": {"query": "pr"}
            })),
            id: crate::mcp::protocol::JsonRpcId::Number(1),
        };
        let (status, Json(response)) = handle_rpc(State(state), HeaderMap::new(), Json(request)).await;
        let content = &response.result.as_ref().unwrap()["content"][0]["text"];
        assert!(content.as_str().unwrap().contains("permission denied"));
        assert_eq!(status, StatusCode::OK);
    }
}
