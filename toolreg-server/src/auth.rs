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

//! API-key permission gating (SPEC_FULL.md §4.6). Key issuance,
//! rotation and storage are out of scope here — this only implements
//! the `PermissionChecker` contract the handler layer depends on, the
//! same way the teacher keeps its own key-management subsystem
//! (`agentreplay-server/src/auth`) separate from the `Authenticator`
//! trait its middleware calls through.

use std::collections::HashMap;

use crate::error::{PermissionChecker, PermissionError, PermissionLevel};

/// A credential's level: `Write` implies `Read`, `Read` grants only
/// read-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLevel {
    Read,
    Write,
}

impl KeyLevel {
    fn satisfies(self, required: PermissionLevel) -> bool {
        match (self, required) {
            (KeyLevel::Write, _) => true,
            (KeyLevel::Read, PermissionLevel::Read) => true,
            (KeyLevel::Read, PermissionLevel::Write) => false,
        }
    }
}

/// In-memory key table. `ENABLE_AUTH=true` without any configured keys
/// means every request is rejected, not silently allowed.
#[derive(Debug, Default, Clone)]
pub struct ApiKeyStore {
    keys: HashMap<String, KeyLevel>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self { keys: HashMap::new() }
    }

    /// Parses `API_KEYS` env-var syntax: comma-separated
    /// `key:level` pairs, e.g. `"abc123:write,readonly-key:read"`.
    /// Entries with an unrecognized level are skipped.
    pub fn from_env_value(raw: &str) -> Self {
        let mut keys = HashMap::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let mut parts = entry.splitn(2, ':');
            let key = parts.next().unwrap_or_default().trim();
            let level = match parts.next().map(str::trim) {
                Some("write") => KeyLevel::Write,
                Some("read") => KeyLevel::Read,
                other => {
                    tracing::warn!(entry = %key, level = ?other, "skipping API key with unrecognized level");
                    continue;
                }
            };
            if !key.is_empty() {
                keys.insert(key.to_string(), level);
            }
        }
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Build the per-request checker for a presented key (or none).
    pub fn checker_for(&self, presented: Option<&str>) -> ApiKeyChecker {
        let level = presented.and_then(|k| self.keys.get(k).copied());
        ApiKeyChecker { level }
    }
}

/// Per-request `PermissionChecker` built from whatever key (if any)
/// came in on this particular call.
pub struct ApiKeyChecker {
    level: Option<KeyLevel>,
}

impl PermissionChecker for ApiKeyChecker {
    fn check(&self, level: PermissionLevel) -> Result<(), PermissionError> {
        match self.level {
            Some(granted) if granted.satisfies(level) => Ok(()),
            Some(_) => Err(PermissionError("key does not grant write access".to_string())),
            None => Err(PermissionError("missing or unrecognized API key".to_string())),
        }
    }
}

/// Body of the `api-key` CLI subcommand. Issuing, listing and revoking
/// keys durably is out of scope for this build — there's no key store
/// to persist to yet, only the in-memory table `ApiKeyStore` builds
/// from `API_KEYS` at startup — so this always reports the same stub
/// error rather than pretending to manage state it doesn't have.
pub fn api_key_command_stub(action: &str) -> anyhow::Result<()> {
    anyhow::bail!(
        "`api-key {action}` is not implemented in this build: key management is \
         currently static, configured via the API_KEYS environment variable at startup"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_key_satisfies_read_and_write() {
        let store = ApiKeyStore::from_env_value("abc:write");
        let checker = store.checker_for(Some("abc"));
        assert!(checker.check(PermissionLevel::Read).is_ok());
        assert!(checker.check(PermissionLevel::Write).is_ok());
    }

    #[test]
    fn read_key_rejects_write() {
        let store = ApiKeyStore::from_env_value("ro:read");
        let checker = store.checker_for(Some("ro"));
        assert!(checker.check(PermissionLevel::Read).is_ok());
        assert!(checker.check(PermissionLevel::Write).is_err());
    }

    #[test]
    fn missing_key_is_rejected() {
        let store = ApiKeyStore::from_env_value("abc:write");
        let checker = store.checker_for(None);
        assert!(checker.check(PermissionLevel::Read).is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let store = ApiKeyStore::from_env_value("abc:write");
        let checker = store.checker_for(Some("wrong"));
        assert!(checker.check(PermissionLevel::Read).is_err());
    }

    #[test]
    fn entry_with_no_level_is_skipped_not_granted_write() {
        let store = ApiKeyStore::from_env_value("abc,ro:read");
        assert!(!store.is_empty());
        let checker = store.checker_for(Some("abc"));
        assert!(checker.check(PermissionLevel::Read).is_err());
        assert!(checker.check(PermissionLevel::Write).is_err());
    }

    #[test]
    fn entry_with_unrecognized_level_is_skipped() {
        let store = ApiKeyStore::from_env_value("abc:bogus,ro:read");
        let checker = store.checker_for(Some("abc"));
        assert!(checker.check(PermissionLevel::Read).is_err());
    }
}
