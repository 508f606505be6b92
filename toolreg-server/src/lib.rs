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

//! Server bootstrap: wires a `ToolRegistry`, its search algorithms and
//! storage backend together, seeds a fresh store, then serves either
//! stdio or HTTP (SPEC_FULL.md §4.6, §6).

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod seed;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toolreg_core::registry::TierThresholds;
use toolreg_core::search::{
    Bm25Search, Device, HashEmbeddingModel, LazySearchAlgorithm, RegexSearch, SearchAlgorithm,
    SemanticSearch,
};
use toolreg_core::storage::{JsonStorage, SqliteStorage, ToolStore};
use toolreg_core::{SearchMethod, ToolRegistry};

use auth::ApiKeyStore;
use config::{ServerConfig, StorageBackend, Transport};
use error::AllowAll;
use mcp::{Dispatcher, McpTransport, StdioTransport};

/// Distinguishes configuration failures from storage failures so
/// `main` can map them onto the exit codes SPEC_FULL.md §6 specifies
/// (1 for config, 2 for storage); anything else exits 1 as a generic
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("configuration error: {0}")]
    Config(#[source] anyhow::Error),
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BootError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BootError::Config(_) => 1,
            BootError::Storage(_) => 2,
            BootError::Other(_) => 1,
        }
    }
}

/// Build the storage backend named by `config.storage_backend`,
/// rooted at `config.data_path`.
fn build_storage(config: &ServerConfig) -> anyhow::Result<Arc<dyn ToolStore>> {
    match config.storage_backend {
        StorageBackend::Json => {
            let path = config.data_path.join("tools.json");
            Ok(Arc::new(JsonStorage::new(path)))
        }
        StorageBackend::Sqlite => {
            let path = config.data_path.join("tools.db");
            let storage = SqliteStorage::new(path).context("failed to open sqlite storage")?;
            Ok(Arc::new(storage))
        }
    }
}

/// Registers all three search algorithms. Semantic is wrapped in
/// `LazySearchAlgorithm` so parsing and validating `--device` doesn't
/// force a (hypothetical) model load before the first semantic query
/// actually arrives.
fn register_searchers(registry: &ToolRegistry, device_raw: &str) {
    registry.register_searcher(Arc::new(RegexSearch::default()));
    registry.register_searcher(Arc::new(Bm25Search::default()));

    let device = Device::parse(device_raw).unwrap_or_else(|| {
        tracing::warn!(device = %device_raw, "unrecognized device, falling back to cpu");
        Device::Cpu
    });
    registry.register_searcher(Arc::new(LazySearchAlgorithm::new(SearchMethod::Semantic, move || {
        Box::new(SemanticSearch::new(device.clone(), || Arc::new(HashEmbeddingModel::default())))
            as Box<dyn SearchAlgorithm>
    })));
}

/// Installs the global tracing subscriber. Idempotent-ish: a second
/// call (e.g. from a test harness that already set one up) is ignored
/// rather than panicking. `RUST_LOG` wins if set (standard escape
/// hatch for per-module filtering); otherwise `LOG_LEVEL`
/// (DEBUG/INFO/WARNING/ERROR, default INFO per SPEC_FULL.md §6) is
/// translated into a blanket directive.
pub fn init_tracing() {
    let directive = std::env::var("LOG_LEVEL").ok().and_then(|raw| match raw.to_uppercase().as_str() {
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARNING" | "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        _ => None,
    });

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match directive {
        Some(level) => format!("toolreg_server={level},toolreg_core={level},tower_http={level}").into(),
        None => "toolreg_server=info,toolreg_core=info,tower_http=info".into(),
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

pub async fn run_server(config: ServerConfig) -> Result<(), BootError> {
    init_tracing();
    tracing::info!(?config, "starting toolreg server");
    config.validate().map_err(BootError::Config)?;

    let storage = build_storage(&config).map_err(BootError::Storage)?;
    storage
        .initialize()
        .map_err(|e| BootError::Storage(anyhow::Error::from(e).context("failed to initialize storage backend")))?;

    let registry = Arc::new(ToolRegistry::new(TierThresholds::default(), true));
    register_searchers(&registry, &config.device);

    let persisted = storage.load_all().map_err(|e| BootError::Storage(e.into()))?;
    let starting_count = persisted.len();
    registry.register_many(persisted);

    if registry.is_empty() {
        tracing::info!("store is empty, registering default tool seed");
        let defaults = seed::default_tools();
        storage.save_many(&defaults).map_err(|e| BootError::Storage(e.into()))?;
        registry.register_many(defaults);
    } else {
        tracing::info!(count = starting_count, "loaded persisted tools");
    }

    registry.rebuild_indexes();

    let keys = if config.enable_auth {
        let raw = std::env::var("API_KEYS").unwrap_or_default();
        let store = ApiKeyStore::from_env_value(&raw);
        if store.is_empty() {
            tracing::warn!("ENABLE_AUTH is set but API_KEYS is empty; every request will be rejected");
        }
        store
    } else {
        ApiKeyStore::new()
    };

    let dispatcher =
        Arc::new(Dispatcher::new(registry, storage, config.search_method, config.description.clone()));

    let result = match config.transport {
        Transport::Stdio => run_stdio(dispatcher).await,
        Transport::Http => run_http(dispatcher, keys, &config).await,
    };
    result.map_err(BootError::from)
}

async fn run_stdio(dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    tracing::info!("serving over stdio");
    let mut transport = StdioTransport::new();
    // stdio is driven by a trusted parent process, not a network
    // client, so it always runs with AllowAll regardless of
    // `enable_auth` — that flag only gates the HTTP transport.
    let permissions = Arc::new(AllowAll);

    loop {
        match transport.recv().await {
            Ok(Some(request)) => {
                let response = dispatcher.handle(request, permissions.clone()).await;
                if let Err(e) = transport.send(response).await {
                    tracing::error!(error = %e, "failed to write response");
                    break;
                }
            }
            Ok(None) => {
                tracing::info!("stdin closed, shutting down");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request");
            }
        }
    }
    Ok(())
}

async fn run_http(dispatcher: Arc<Dispatcher>, keys: ApiKeyStore, config: &ServerConfig) -> anyhow::Result<()> {
    let state = http::HttpState { dispatcher, enable_auth: config.enable_auth, keys: Arc::new(keys) };
    let app = http::router(state, &config.path);

    let addr = config.socket_addr()?;
    tracing::info!(%addr, path = %config.path, "serving over http");
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind address")?;
    axum::serve(listener, app).await.context("http server error")?;
    Ok(())
}
