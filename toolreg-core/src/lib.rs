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

//! Core domain logic for the tool registry and discovery service:
//! the tool model, search algorithms, storage backends and the
//! registry that ties them together.

pub mod error;
pub mod fingerprint;
pub mod registry;
pub mod search;
pub mod storage;
pub mod tool;

pub use error::{RegistryError, Result};
pub use registry::{TierThresholds, ToolRegistry};
pub use tool::{SearchMethod, SearchResult, Temperature, Tool};
