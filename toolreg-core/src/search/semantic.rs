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

//! Dense-vector semantic search (spec.md §4.1.3).

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::fingerprint::fingerprint;
use crate::tool::{SearchMethod, SearchResult, Tool};

use super::{normalize_and_rank, SearchAlgorithm};

/// A swappable embedding backend. Production builds would plug in a
/// local ONNX/sentence-embedding runtime here; shipping a full
/// transformer runtime is outside this crate's size budget, so the
/// trait boundary plus a deterministic test double
/// (`HashEmbeddingModel`) are what's included, exercising the
/// algorithm's caching, locking and cosine-similarity logic in full.
pub trait EmbeddingModel: Send + Sync {
    /// Embed a batch of texts into fixed-dimension vectors.
    fn embed(&self, texts: &[&str]) -> Vec<Vec<f32>>;

    /// Vector dimension this model produces.
    fn dimension(&self) -> usize;
}

/// Deterministic hashing "embedding" used by tests and as a harmless
/// default when no real model is configured. Not semantically
/// meaningful, but stable and dependency-free.
pub struct HashEmbeddingModel {
    dimension: usize,
}

impl HashEmbeddingModel {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbeddingModel {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EmbeddingModel for HashEmbeddingModel {
    fn embed(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|text| {
                let mut vec = vec![0.0f32; self.dimension];
                for (i, token) in text.split_whitespace().enumerate() {
                    let hash = blake3::hash(token.as_bytes());
                    let bytes = hash.as_bytes();
                    let bucket = (bytes[0] as usize + i) % self.dimension;
                    vec[bucket] += 1.0;
                }
                let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in vec.iter_mut() {
                        *v /= norm;
                    }
                }
                vec
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Compute device to run the (hypothetical) embedding model on.
/// `cpu` (default) and `auto` never fail; `gpu:N`/`cuda:N` select a
/// specific accelerator index but this crate has no GPU runtime to
/// dispatch to, so selecting one here only affects what gets reported
/// to callers/logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Auto,
    Gpu(u32),
}

impl Device {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cpu" => Some(Device::Cpu),
            "auto" => Some(Device::Auto),
            other => {
                let idx = other.strip_prefix("gpu:").or_else(|| other.strip_prefix("cuda:"))?;
                idx.parse::<u32>().ok().map(Device::Gpu)
            }
        }
    }
}

struct State {
    fingerprint: Option<[u8; 32]>,
    embeddings: Option<Vec<Vec<f32>>>,
    indexed: bool,
}

/// Cosine-similarity semantic search backed by a lazily-loaded,
/// swappable `EmbeddingModel`.
pub struct SemanticSearch {
    device: Device,
    model: ReentrantMutex<RefCell<Option<Arc<dyn EmbeddingModel>>>>,
    model_factory: Box<dyn Fn() -> Arc<dyn EmbeddingModel> + Send + Sync>,
    state: ReentrantMutex<RefCell<State>>,
}

impl SemanticSearch {
    pub fn new(
        device: Device,
        model_factory: impl Fn() -> Arc<dyn EmbeddingModel> + Send + Sync + 'static,
    ) -> Self {
        Self {
            device,
            model: ReentrantMutex::new(RefCell::new(None)),
            model_factory: Box::new(model_factory),
            state: ReentrantMutex::new(RefCell::new(State {
                fingerprint: None,
                embeddings: None,
                indexed: false,
            })),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Drop the loaded model and cached embeddings, freeing memory.
    /// The next `search`/`index` call reloads the model from scratch.
    pub fn unload(&self) {
        *self.model.lock().borrow_mut() = None;
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.embeddings = None;
        state.indexed = false;
        state.fingerprint = None;
    }

    fn load_model(&self) -> Arc<dyn EmbeddingModel> {
        // Double-checked locking: avoid constructing the model twice
        // under contention, but don't hold the lock while it's in use.
        {
            let guard = self.model.lock();
            if let Some(m) = guard.borrow().as_ref() {
                return m.clone();
            }
        }
        let guard = self.model.lock();
        let mut slot = guard.borrow_mut();
        if slot.is_none() {
            *slot = Some((self.model_factory)());
        }
        slot.as_ref().unwrap().clone()
    }

    fn build_embeddings(&self, tools: &[Tool]) -> Option<Vec<Vec<f32>>> {
        if tools.is_empty() {
            return None;
        }
        let model = self.load_model();
        let corpora: Vec<String> = tools.iter().map(Tool::search_corpus).collect();
        let texts: Vec<&str> = corpora.iter().map(String::as_str).collect();
        Some(model.embed(&texts))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

impl SearchAlgorithm for SemanticSearch {
    fn method(&self) -> SearchMethod {
        SearchMethod::Semantic
    }

    fn index(&self, tools: &[Tool]) {
        let embeddings = self.build_embeddings(tools);
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.fingerprint = Some(fingerprint(tools));
        state.embeddings = embeddings;
        state.indexed = true;
    }

    fn search(&self, query: &str, tools: &[Tool], limit: usize) -> Vec<SearchResult> {
        let current = fingerprint(tools);
        let needs_rebuild = {
            let guard = self.state.lock();
            guard.borrow().fingerprint != Some(current)
        };
        if needs_rebuild {
            let embeddings = self.build_embeddings(tools);
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            if state.fingerprint != Some(current) {
                state.fingerprint = Some(current);
                state.embeddings = embeddings;
                state.indexed = true;
            }
        }

        let embeddings = {
            let guard = self.state.lock();
            let state = guard.borrow();
            match state.embeddings.clone() {
                Some(e) => e,
                None => return Vec::new(),
            }
        };

        let model = self.load_model();
        let query_embedding = &model.embed(&[query])[0];

        let scored: Vec<(&Tool, f64)> = tools
            .iter()
            .zip(embeddings.iter())
            .map(|(tool, emb)| (tool, cosine_similarity(emb, query_embedding)))
            .collect();

        normalize_and_rank(scored, limit, "semantic_similarity")
    }

    fn is_indexed(&self) -> bool {
        self.state.lock().borrow().indexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make() -> SemanticSearch {
        SemanticSearch::new(Device::Cpu, || Arc::new(HashEmbeddingModel::default()))
    }

    #[test]
    fn device_parses_gpu_and_cuda_aliases() {
        assert_eq!(Device::parse("gpu:0"), Some(Device::Gpu(0)));
        assert_eq!(Device::parse("cuda:2"), Some(Device::Gpu(2)));
        assert_eq!(Device::parse("auto"), Some(Device::Auto));
        assert_eq!(Device::parse("nonsense"), None);
    }

    #[test]
    fn exact_text_match_scores_highest() {
        let s = make();
        let tools = vec![
            Tool::new("github.create_pr", "Create a pull request on GitHub"),
            Tool::new("slack.send_message", "Send a message to a Slack channel"),
        ];
        s.index(&tools);
        let results = s.search("Create a pull request on GitHub", &tools, 10);
        assert_eq!(results[0].tool_name, "github.create_pr");
    }

    #[test]
    fn unload_clears_index_state() {
        let s = make();
        let tools = vec![Tool::new("a", "A tool")];
        s.index(&tools);
        assert!(s.is_indexed());
        s.unload();
        assert!(!s.is_indexed());
    }

    #[test]
    fn empty_tool_set_yields_no_results() {
        let s = make();
        let tools: Vec<Tool> = Vec::new();
        s.index(&tools);
        assert!(s.search("anything", &tools, 10).is_empty());
    }
}
