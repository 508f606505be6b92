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

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use toolreg_server::config::{ServerConfig, StorageBackend, Transport};
use toolreg_server::{auth, run_server};

/// MCP tool registry and discovery server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport to serve over.
    #[arg(long, env = "TRANSPORT")]
    transport: Option<CliTransport>,

    /// HTTP listen host.
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// HTTP listen port.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// HTTP mount path for the JSON-RPC endpoint.
    #[arg(long, env = "MCP_PATH")]
    path: Option<String>,

    /// Directory the storage backend persists into.
    #[arg(long, env = "DATA_PATH")]
    data_path: Option<PathBuf>,

    /// Storage backend to use.
    #[arg(long, env = "STORAGE_BACKEND")]
    storage_backend: Option<CliStorageBackend>,

    /// Require an API key on every HTTP request.
    #[arg(long, env = "ENABLE_AUTH")]
    enable_auth: bool,

    /// Default search method when a request doesn't specify one.
    #[arg(long, env = "SEARCH_METHOD")]
    search_method: Option<String>,

    /// Description advertised in `initialize` responses.
    #[arg(long, env = "DESCRIPTION")]
    description: Option<String>,

    /// Compute device for the semantic search backend.
    #[arg(long, env = "DEVICE")]
    device: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage API keys. Not implemented in this build (SPEC_FULL.md
    /// §4.6) — key management is currently static via `API_KEYS`.
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
}

#[derive(Subcommand, Debug)]
enum ApiKeyAction {
    Create,
    List,
    Delete { name: String },
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum CliTransport {
    Stdio,
    Http,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum CliStorageBackend {
    Json,
    Sqlite,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Some(Command::ApiKey { action }) = &args.command {
        let action_name = match action {
            ApiKeyAction::Create => "create",
            ApiKeyAction::List => "list",
            ApiKeyAction::Delete { .. } => "delete",
        };
        if let Err(e) = auth::api_key_command_stub(action_name) {
            eprintln!("{e}");
            std::process::exit(1);
        }
        return;
    }

    let mut config = match ServerConfig::load(args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    apply_cli_overrides(&mut config, args);

    match run_server(config).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    }
}

fn apply_cli_overrides(config: &mut ServerConfig, args: Args) {
    if let Some(t) = args.transport {
        config.transport = match t {
            CliTransport::Stdio => Transport::Stdio,
            CliTransport::Http => Transport::Http,
        };
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.path {
        config.path = path;
    }
    if let Some(data_path) = args.data_path {
        config.data_path = data_path;
    }
    if let Some(backend) = args.storage_backend {
        config.storage_backend = match backend {
            CliStorageBackend::Json => StorageBackend::Json,
            CliStorageBackend::Sqlite => StorageBackend::Sqlite,
        };
    }
    if args.enable_auth {
        config.enable_auth = true;
    }
    if let Some(method) = args.search_method.as_deref().and_then(toolreg_core::SearchMethod::parse) {
        config.search_method = method;
    }
    if let Some(description) = args.description {
        config.description = description;
    }
    if let Some(device) = args.device {
        config.device = device;
    }
}
