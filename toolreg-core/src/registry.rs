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

//! The registry core: the authoritative in-memory tool catalog
//! (spec.md §4.2, §4.3).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::{ReentrantMutex, RwLock};

use crate::error::{RegistryError, Result};
use crate::search::SearchAlgorithm;
use crate::storage::ToolStore;
use crate::tool::{SearchMethod, SearchResult, Temperature, Tool};

/// Frequency thresholds and inactivity windows governing tier
/// promotion/demotion (spec.md §4.3).
#[derive(Debug, Clone, Copy)]
pub struct TierThresholds {
    pub hot_use_frequency: u64,
    pub warm_use_frequency: u64,
    pub hot_inactive_days: i64,
    pub warm_inactive_days: i64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            hot_use_frequency: 10,
            warm_use_frequency: 3,
            hot_inactive_days: 30,
            warm_inactive_days: 60,
        }
    }
}

struct Inner {
    tools: HashMap<String, Tool>,
    hot: HashSet<String>,
    warm: HashSet<String>,
    cold: HashSet<String>,
    category_index: HashMap<Option<String>, HashSet<String>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            tools: HashMap::new(),
            hot: HashSet::new(),
            warm: HashSet::new(),
            cold: HashSet::new(),
            category_index: HashMap::new(),
        }
    }

    fn remove_from_tiers(&mut self, name: &str) {
        self.hot.remove(name);
        self.warm.remove(name);
        self.cold.remove(name);
    }

    fn add_to_tier(&mut self, name: &str, temperature: Temperature) {
        self.remove_from_tiers(name);
        match temperature {
            Temperature::Hot => self.hot.insert(name.to_string()),
            Temperature::Warm => self.warm.insert(name.to_string()),
            Temperature::Cold => self.cold.insert(name.to_string()),
        };
    }
}

/// The in-memory tool catalog. All five internal maps (primary,
/// hot/warm/cold tiers, category index) are protected by a single
/// reentrant lock (spec.md §5): several operations — most notably
/// `update_usage`'s inline demotion sweep — call back into registry
/// internals while already holding the lock, which a plain `Mutex`
/// cannot tolerate.
pub struct ToolRegistry {
    inner: ReentrantMutex<RefCell<Inner>>,
    searchers: RwLock<HashMap<SearchMethod, Arc<dyn SearchAlgorithm>>>,
    thresholds: TierThresholds,
    enable_downgrade: bool,
}

impl ToolRegistry {
    pub fn new(thresholds: TierThresholds, enable_downgrade: bool) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Inner::new())),
            searchers: RwLock::new(HashMap::new()),
            thresholds,
            enable_downgrade,
        }
    }

    fn classify(&self, use_frequency: u64) -> Temperature {
        if use_frequency >= self.thresholds.hot_use_frequency {
            Temperature::Hot
        } else if use_frequency >= self.thresholds.warm_use_frequency {
            Temperature::Warm
        } else {
            Temperature::Cold
        }
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register (or re-register) a tool. Temperature is recomputed
    /// from `use_frequency` and the tool is placed in the matching
    /// tier; the category index is updated to match.
    pub fn register(&self, mut tool: Tool) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        let name = tool.name.clone();
        if let Some(old) = inner.tools.get(&name) {
            let old_category = old.category.clone();
            if let Some(set) = inner.category_index.get_mut(&old_category) {
                set.remove(&name);
            }
            inner.remove_from_tiers(&name);
        }

        let temperature = self.classify(tool.use_frequency);
        tool.temperature = temperature;
        inner.category_index.entry(tool.category.clone()).or_default().insert(name.clone());
        inner.add_to_tier(&name, temperature);
        inner.tools.insert(name, tool);
    }

    pub fn register_many(&self, tools: Vec<Tool>) {
        for tool in tools {
            self.register(tool);
        }
    }

    /// Remove a tool. Returns `true` if it existed.
    pub fn unregister(&self, name: &str) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let Some(tool) = inner.tools.remove(name) else {
            return false;
        };
        if let Some(set) = inner.category_index.get_mut(&tool.category) {
            set.remove(name);
        }
        inner.remove_from_tiers(name);
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<Tool> {
        let guard = self.inner.lock();
        guard.borrow().tools.get(name).cloned()
    }

    /// List all tools, optionally filtered to a single category.
    pub fn list(&self, category: Option<&str>) -> Vec<Tool> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        match category {
            Some(c) => inner
                .category_index
                .get(&Some(c.to_string()))
                .into_iter()
                .flatten()
                .filter_map(|name| inner.tools.get(name).cloned())
                .collect(),
            None => inner.tools.values().cloned().collect(),
        }
    }

    /// List every non-empty, non-`None` category currently in use.
    pub fn list_categories(&self) -> Vec<String> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner
            .category_index
            .iter()
            .filter_map(|(cat, names)| if names.is_empty() { None } else { cat.clone() })
            .collect()
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    pub fn register_searcher(&self, algorithm: Arc<dyn SearchAlgorithm>) {
        self.searchers.write().insert(algorithm.method(), algorithm);
    }

    fn searcher(&self, method: SearchMethod) -> Result<Arc<dyn SearchAlgorithm>> {
        self.searchers
            .read()
            .get(&method)
            .cloned()
            .ok_or_else(|| RegistryError::SearcherNotRegistered(method.to_string()))
    }

    pub fn search(&self, query: &str, method: SearchMethod, limit: usize) -> Result<Vec<SearchResult>> {
        let tools = self.list(None);
        if tools.is_empty() {
            return Ok(Vec::new());
        }
        let searcher = self.searcher(method)?;
        Ok(searcher.search(query, &tools, limit))
    }

    /// Search only hot + warm tools, skipping cold ones entirely
    /// (spec.md §4.2). An empty hot+warm set short-circuits to an
    /// empty result without consulting cold tools or erroring, the
    /// same way for every algorithm (Open Question #3, SPEC_FULL.md
    /// §9.1).
    pub fn search_hot_warm(
        &self,
        query: &str,
        method: SearchMethod,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        // Semantic search is not offered on the hot/warm subset: silently
        // fall back to BM25 rather than paying embedding cost for a tiny
        // tier slice (spec.md §4.2, Open Question #3).
        let effective_method = if method == SearchMethod::Semantic {
            tracing::warn!("search_hot_warm: semantic method requested, substituting bm25");
            SearchMethod::Bm25
        } else {
            method
        };
        let searcher = self.searcher(effective_method)?;

        let hot_warm = {
            let guard = self.inner.lock();
            let inner = guard.borrow();
            let mut tools: Vec<Tool> = inner
                .hot
                .iter()
                .filter_map(|n| inner.tools.get(n).cloned())
                .collect();
            tools.extend(inner.warm.iter().filter_map(|n| inner.tools.get(n).cloned()));
            tools
        };

        if hot_warm.is_empty() {
            return Ok(Vec::new());
        }

        Ok(searcher.search(query, &hot_warm, limit))
    }

    // ------------------------------------------------------------------
    // Usage tracking & tiering
    // ------------------------------------------------------------------

    /// Record a use of `name`: increments `use_frequency`, bumps
    /// `last_used`, reclassifies its tier, and — if it was just
    /// promoted to hot or warm — sweeps the other hot/warm tools for
    /// ones that have gone stale and demotes them in place. There is
    /// no background sweep thread; this inline check is the entire
    /// demotion mechanism (SPEC_FULL.md §4.3, §9.1).
    pub fn update_usage(&self, name: &str) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        let Some(tool) = inner.tools.get_mut(name) else {
            return false;
        };
        let old_temperature = tool.temperature;
        tool.use_frequency += 1;
        tool.last_used = Some(Utc::now());
        let new_temperature = self.classify(tool.use_frequency);

        if new_temperature != old_temperature {
            tool.temperature = new_temperature;
            inner.add_to_tier(name, new_temperature);
        }

        if self.enable_downgrade && matches!(new_temperature, Temperature::Hot | Temperature::Warm) {
            self.sweep_downgrades(&mut inner);
        }

        true
    }

    fn needs_downgrade(&self, tool: &Tool, now: chrono::DateTime<Utc>) -> bool {
        let Some(last_used) = tool.last_used else {
            return false;
        };
        let days_inactive = (now - last_used).num_days();
        match tool.temperature {
            Temperature::Hot => days_inactive >= self.thresholds.hot_inactive_days,
            Temperature::Warm => days_inactive >= self.thresholds.warm_inactive_days,
            Temperature::Cold => false,
        }
    }

    fn sweep_downgrades(&self, inner: &mut Inner) {
        let now = Utc::now();

        let hot_stale: Vec<String> = inner
            .hot
            .iter()
            .filter(|n| inner.tools.get(*n).map(|t| self.needs_downgrade(t, now)).unwrap_or(false))
            .cloned()
            .collect();
        for name in hot_stale {
            if let Some(tool) = inner.tools.get_mut(&name) {
                tool.temperature = Temperature::Warm;
            }
            inner.add_to_tier(&name, Temperature::Warm);
        }

        let warm_stale: Vec<String> = inner
            .warm
            .iter()
            .filter(|n| inner.tools.get(*n).map(|t| self.needs_downgrade(t, now)).unwrap_or(false))
            .cloned()
            .collect();
        for name in warm_stale {
            if let Some(tool) = inner.tools.get_mut(&name) {
                tool.temperature = Temperature::Cold;
            }
            inner.add_to_tier(&name, Temperature::Cold);
        }
    }

    pub fn usage_stats(&self) -> HashMap<String, u64> {
        let guard = self.inner.lock();
        guard.borrow().tools.iter().map(|(n, t)| (n.clone(), t.use_frequency)).collect()
    }

    pub fn get_most_used(&self, limit: usize) -> Vec<Tool> {
        let mut tools = self.list(None);
        tools.sort_by(|a, b| b.use_frequency.cmp(&a.use_frequency));
        tools.truncate(limit);
        tools
    }

    // ------------------------------------------------------------------
    // Index management
    // ------------------------------------------------------------------

    /// Force every registered search algorithm to rebuild its index
    /// over the full current tool set. Typically called after a bulk
    /// `register_many` to amortize the rebuild cost up front.
    pub fn rebuild_indexes(&self) {
        let tools = self.list(None);
        for searcher in self.searchers.read().values() {
            searcher.index(&tools);
        }
    }

    /// Preload hot tools from `storage` into the registry, skipping
    /// any already registered. Returns how many were loaded.
    pub fn load_hot_tools(&self, storage: &dyn ToolStore, limit: Option<usize>) -> Result<usize> {
        let hot_tools = storage.load_by_temperature(Temperature::Hot, limit)?;
        let mut loaded = 0;
        for mut tool in hot_tools {
            let already_present = { self.inner.lock().borrow().tools.contains_key(&tool.name) };
            if !already_present {
                tool.temperature = Temperature::Hot;
                self.register(tool);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub fn tool_count(&self) -> usize {
        self.inner.lock().borrow().tools.len()
    }

    pub fn category_count(&self) -> usize {
        self.inner.lock().borrow().category_index.keys().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.tool_count() == 0
    }

    pub fn clear(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.tools.clear();
        inner.category_index.clear();
        inner.hot.clear();
        inner.warm.clear();
        inner.cold.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::RegexSearch;

    fn registry() -> ToolRegistry {
        let reg = ToolRegistry::new(TierThresholds::default(), true);
        reg.register_searcher(Arc::new(RegexSearch::default()));
        reg
    }

    #[test]
    fn register_then_get_round_trips() {
        let reg = registry();
        reg.register(Tool::new("github.create_pr", "Create a pull request").with_category("github"));
        let tool = reg.get("github.create_pr").unwrap();
        assert_eq!(tool.category.as_deref(), Some("github"));
        assert_eq!(tool.temperature, Temperature::Cold);
    }

    #[test]
    fn update_usage_promotes_tier_at_threshold() {
        let reg = registry();
        reg.register(Tool::new("a", "A tool"));
        for _ in 0..10 {
            assert!(reg.update_usage("a"));
        }
        let tool = reg.get("a").unwrap();
        assert_eq!(tool.temperature, Temperature::Hot);
        assert_eq!(tool.use_frequency, 10);
    }

    #[test]
    fn update_usage_on_unknown_tool_returns_false() {
        let reg = registry();
        assert!(!reg.update_usage("missing"));
    }

    #[test]
    fn unregister_removes_from_category_index_and_tiers() {
        let reg = registry();
        reg.register(Tool::new("a", "A").with_category("github"));
        assert!(reg.unregister("a"));
        assert!(reg.get("a").is_none());
        assert!(reg.list(Some("github")).is_empty());
        assert!(!reg.unregister("a"));
    }

    #[test]
    fn search_hot_warm_short_circuits_when_both_empty() {
        let reg = registry();
        reg.register(Tool::new("a", "A tool")); // starts cold
        let results = reg.search_hot_warm("a", SearchMethod::Regex, 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn search_hot_warm_substitutes_bm25_for_semantic() {
        use crate::search::Bm25Search;
        let reg = registry();
        reg.register_searcher(Arc::new(Bm25Search::default()));
        reg.register(Tool::new("a", "A searchable tool"));
        for _ in 0..10 {
            reg.update_usage("a");
        }
        // No semantic searcher registered at all; if the substitution
        // didn't happen this would fail with SearcherNotRegistered.
        let results = reg.search_hot_warm("searchable", SearchMethod::Semantic, 10).unwrap();
        assert_eq!(results[0].tool_name, "a");
    }

    #[test]
    fn search_with_unregistered_method_errors() {
        let reg = ToolRegistry::new(TierThresholds::default(), true);
        reg.register(Tool::new("a", "A"));
        let err = reg.search("a", SearchMethod::Bm25, 10).unwrap_err();
        assert!(matches!(err, RegistryError::SearcherNotRegistered(_)));
    }

    #[test]
    fn get_most_used_sorts_descending() {
        let reg = registry();
        reg.register(Tool::new("a", "A"));
        reg.register(Tool::new("b", "B"));
        reg.update_usage("b");
        reg.update_usage("b");
        reg.update_usage("a");
        let most_used = reg.get_most_used(2);
        assert_eq!(most_used[0].name, "b");
    }

    #[test]
    fn category_count_ignores_uncategorized_tools() {
        let reg = registry();
        reg.register(Tool::new("a", "A").with_category("github"));
        reg.register(Tool::new("b", "B"));
        assert_eq!(reg.category_count(), 1);
    }

    proptest::proptest! {
        /// Any sequence of `update_usage` calls alone (no elapsed time,
        /// so the downgrade sweep never fires) only ever promotes a
        /// tool, never demotes it (spec.md §8, property 7).
        #[test]
        fn update_usage_alone_never_demotes(call_count in 0u32..40) {
            let reg = registry();
            reg.register(Tool::new("a", "A tool"));
            let mut last_temperature = Temperature::Cold;
            for _ in 0..call_count {
                reg.update_usage("a");
                let current = reg.get("a").unwrap().temperature;
                let rank = |t: Temperature| match t {
                    Temperature::Cold => 0,
                    Temperature::Warm => 1,
                    Temperature::Hot => 2,
                };
                proptest::prop_assert!(rank(current) >= rank(last_temperature));
                last_temperature = current;
            }
        }
    }
}
