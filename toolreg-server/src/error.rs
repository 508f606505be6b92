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

//! Server-level error types: permission gating and the handler-facing
//! error shape that gets mapped onto HTTP status codes and JSON-RPC
//! error objects (SPEC_FULL.md §7).

use thiserror::Error;
use toolreg_core::RegistryError;

/// Permission level a handler requires before it runs. The API-key
/// auth subsystem itself (issuance, storage, rotation) is out of
/// scope for this crate — only this call-site contract is implemented
/// here; see `PermissionChecker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionLevel {
    Read,
    Write,
}

#[derive(Debug, Error)]
#[error("permission denied: {0}")]
pub struct PermissionError(pub String);

/// Injected into the handler layer so it has zero dependency on how
/// API keys are issued or verified. The default allows everything.
pub trait PermissionChecker: Send + Sync {
    fn check(&self, level: PermissionLevel) -> Result<(), PermissionError>;
}

/// Allows every call. Used when `ENABLE_AUTH` is off (the default).
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn check(&self, _level: PermissionLevel) -> Result<(), PermissionError> {
        Ok(())
    }
}

/// Errors a handler can return, covering both domain errors bubbled up
/// from `toolreg-core` and handler-local validation/permission errors.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

impl HandlerError {
    /// HTTP status code per SPEC_FULL.md §7.
    pub fn http_status(&self) -> u16 {
        match self {
            HandlerError::Validation(_) => 400,
            HandlerError::Permission(_) => 403,
            HandlerError::Registry(RegistryError::Validation(_)) => 400,
            HandlerError::Registry(RegistryError::NotFound(_)) => 404,
            HandlerError::Registry(RegistryError::Conflict(_)) => 409,
            HandlerError::Registry(RegistryError::PermissionDenied(_)) => 403,
            HandlerError::Registry(RegistryError::Storage(_)) => 500,
            HandlerError::Registry(RegistryError::Configuration(_)) => 500,
            HandlerError::Registry(RegistryError::SearcherNotRegistered(_)) => 500,
            HandlerError::Registry(RegistryError::Internal(_)) => 500,
        }
    }

    /// JSON-RPC error code per SPEC_FULL.md §7.
    pub fn jsonrpc_code(&self) -> i32 {
        match self {
            HandlerError::Validation(_) => -32602,
            HandlerError::Permission(_) => -32003,
            HandlerError::Registry(RegistryError::Validation(_)) => -32602,
            HandlerError::Registry(RegistryError::NotFound(_)) => -32001,
            HandlerError::Registry(RegistryError::Conflict(_)) => -32002,
            HandlerError::Registry(RegistryError::PermissionDenied(_)) => -32003,
            HandlerError::Registry(RegistryError::Storage(_)) => -32004,
            HandlerError::Registry(RegistryError::SearcherNotRegistered(_)) => -32004,
            HandlerError::Registry(RegistryError::Configuration(_))
            | HandlerError::Registry(RegistryError::Internal(_)) => -32603,
        }
    }
}
