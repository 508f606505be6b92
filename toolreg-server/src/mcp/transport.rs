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

//! Transport abstraction over stdio and HTTP (SPEC_FULL.md §6).
//!
//! Stdio is **line-framed**: exactly one JSON-RPC request per line on
//! stdin, one response per line on stdout. This deliberately does not
//! reuse the teacher's 4-byte length-prefixed framing — spec.md calls
//! for a plain newline-delimited stream, the common shape for MCP
//! servers driven by a line-oriented parent process.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use super::protocol::{JsonRpcRequest, JsonRpcResponse};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stream closed")]
    Closed,
}

#[async_trait::async_trait]
pub trait McpTransport: Send {
    async fn recv(&mut self) -> Result<Option<JsonRpcRequest>, TransportError>;
    async fn send(&mut self, response: JsonRpcResponse) -> Result<(), TransportError>;
}

pub struct StdioTransport {
    reader: BufReader<tokio::io::Stdin>,
    writer: BufWriter<tokio::io::Stdout>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: BufWriter::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl McpTransport for StdioTransport {
    async fn recv(&mut self) -> Result<Option<JsonRpcRequest>, TransportError> {
        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(trimmed)?));
        }
    }

    async fn send(&mut self, response: JsonRpcResponse) -> Result<(), TransportError> {
        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        self.writer.write_all(&payload).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
