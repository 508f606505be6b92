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

//! Pluggable search algorithms over a tool set.

mod bm25;
mod lazy;
mod regex_search;
mod semantic;

pub use bm25::Bm25Search;
pub use lazy::LazySearchAlgorithm;
pub use regex_search::RegexSearch;
pub use semantic::{Device, EmbeddingModel, HashEmbeddingModel, SemanticSearch};

use crate::tool::{SearchMethod, SearchResult, Tool};

/// A pluggable ranking strategy over a tool set.
///
/// Implementations own their own index and fingerprint cache (see
/// `fingerprint::fingerprint`) and rebuild lazily: `search` is handed
/// the live tool slice on every call and re-indexes only when that
/// slice's fingerprint differs from the one last indexed.
pub trait SearchAlgorithm: Send + Sync {
    /// Which `SearchMethod` this implementation serves.
    fn method(&self) -> SearchMethod;

    /// Force a (re)build of the index over `tools`, regardless of
    /// whether the fingerprint changed. `ToolRegistry::rebuild_indexes`
    /// calls this after a batch registration.
    fn index(&self, tools: &[Tool]);

    /// Rank `tools` against `query`, returning at most `limit` results
    /// sorted by descending score, each score normalized into [0, 1].
    /// Rebuilds the index first if `tools`'s fingerprint has drifted.
    fn search(&self, query: &str, tools: &[Tool], limit: usize) -> Vec<SearchResult>;

    /// Whether `index` has been called at least once.
    fn is_indexed(&self) -> bool;
}

/// Normalize a set of raw `(tool, score)` pairs into ranked, [0, 1]
/// normalized `SearchResult`s, truncated to `limit`. Shared by every
/// algorithm so normalization behavior (min-max, singleton -> 1.0)
/// stays identical across them.
pub(crate) fn normalize_and_rank(
    mut scored: Vec<(&Tool, f64)>,
    limit: usize,
    match_reason: &str,
) -> Vec<SearchResult> {
    if scored.is_empty() {
        return Vec::new();
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    let max_score = scored.iter().map(|(_, s)| *s).fold(f64::MIN, f64::max);
    let min_score = scored.iter().map(|(_, s)| *s).fold(f64::MAX, f64::min);
    let range = max_score - min_score;

    scored
        .into_iter()
        .map(|(tool, score)| {
            let normalized = if range > 0.0 { (score - min_score) / range } else { 1.0 };
            SearchResult {
                tool_name: tool.name.clone(),
                description: tool.description.clone(),
                score: normalized,
                match_reason: match_reason.to_string(),
            }
        })
        .collect()
}
