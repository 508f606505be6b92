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

//! Lazy registration wrapper (spec.md §4.1.4).

use std::cell::RefCell;

use parking_lot::ReentrantMutex;

use crate::tool::{SearchMethod, SearchResult, Tool};

use super::SearchAlgorithm;

/// Wraps a `SearchMethod` and a thunk that builds the real algorithm
/// only the first time it's needed. Used for the semantic algorithm
/// specifically, so constructing it doesn't force model
/// initialization at server boot when no semantic query has ever
/// been made.
pub struct LazySearchAlgorithm {
    method: SearchMethod,
    factory: Box<dyn Fn() -> Box<dyn SearchAlgorithm> + Send + Sync>,
    inner: ReentrantMutex<RefCell<Option<Box<dyn SearchAlgorithm>>>>,
}

impl LazySearchAlgorithm {
    pub fn new(
        method: SearchMethod,
        factory: impl Fn() -> Box<dyn SearchAlgorithm> + Send + Sync + 'static,
    ) -> Self {
        Self {
            method,
            factory: Box::new(factory),
            inner: ReentrantMutex::new(RefCell::new(None)),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&dyn SearchAlgorithm) -> R) -> R {
        {
            let guard = self.inner.lock();
            if let Some(algo) = guard.borrow().as_ref() {
                return f(algo.as_ref());
            }
        }
        let guard = self.inner.lock();
        let mut slot = guard.borrow_mut();
        if slot.is_none() {
            *slot = Some((self.factory)());
        }
        f(slot.as_ref().unwrap().as_ref())
    }
}

impl SearchAlgorithm for LazySearchAlgorithm {
    fn method(&self) -> SearchMethod {
        self.method
    }

    fn index(&self, tools: &[Tool]) {
        self.with_inner(|algo| algo.index(tools));
    }

    fn search(&self, query: &str, tools: &[Tool], limit: usize) -> Vec<SearchResult> {
        self.with_inner(|algo| algo.search(query, tools, limit))
    }

    fn is_indexed(&self) -> bool {
        let guard = self.inner.lock();
        match guard.borrow().as_ref() {
            Some(algo) => algo.is_indexed(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn factory_not_invoked_until_first_use() {
        let built = Arc::new(AtomicUsize::new(0));
        let built_clone = built.clone();
        let lazy = LazySearchAlgorithm::new(SearchMethod::Semantic, move || {
            built_clone.fetch_add(1, Ordering::SeqCst);
            Box::new(super::super::RegexSearch::default())
        });
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert!(!lazy.is_indexed());
        assert_eq!(built.load(Ordering::SeqCst), 0);

        let tools = vec![Tool::new("a", "A tool")];
        lazy.index(&tools);
        assert_eq!(built.load(Ordering::SeqCst), 1);

        lazy.index(&tools);
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }
}
