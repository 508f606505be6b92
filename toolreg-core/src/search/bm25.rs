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

//! BM25 keyword search with multilingual tokenization (spec.md §4.1.2).

use std::cell::RefCell;
use std::collections::HashMap;

use parking_lot::ReentrantMutex;
use unicode_segmentation::UnicodeSegmentation;

use crate::fingerprint::fingerprint;
use crate::tool::{SearchMethod, SearchResult, Tool};

use super::{normalize_and_rank, SearchAlgorithm};

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "in", "is", "are", "and", "or", "for", "on", "with", "this",
    "that", "it", "as", "by", "be", "at",
];

/// Split `text` into lowercase search tokens. Latin/Cyrillic-style
/// words are split on Unicode word boundaries; CJK runs (which have
/// no inter-word whitespace) are additionally split into individual
/// characters, approximating what a dedicated Chinese segmenter (the
/// original implementation used `jieba`) does for short catalog
/// strings. Single-character Latin tokens and common English
/// stopwords are dropped; single CJK characters are meaningful on
/// their own and are kept.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.unicode_words() {
        let lower = word.to_lowercase();
        if lower.chars().all(is_cjk) {
            for ch in lower.chars() {
                tokens.push(ch.to_string());
            }
            continue;
        }
        if lower.chars().count() <= 1 {
            continue;
        }
        if STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        tokens.push(lower);
    }
    tokens
}

fn is_cjk(c: char) -> bool {
    let cp = c as u32;
    (0x4E00..=0x9FFF).contains(&cp) // CJK Unified Ideographs
        || (0x3040..=0x30FF).contains(&cp) // Hiragana/Katakana
        || (0xAC00..=0xD7A3).contains(&cp) // Hangul syllables
}

struct Index {
    docs: Vec<Vec<String>>,
    doc_lengths: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
}

struct State {
    fingerprint: Option<[u8; 32]>,
    index: Option<Index>,
}

/// Okapi BM25 with epsilon-smoothed IDF floor, matching the
/// `rank_bm25.BM25Okapi` defaults the original implementation built
/// on: `k1 = 1.5`, `b = 0.75`, `epsilon = 0.25`.
pub struct Bm25Search {
    k1: f64,
    b: f64,
    epsilon: f64,
    state: ReentrantMutex<RefCell<State>>,
}

impl Bm25Search {
    pub fn new(k1: f64, b: f64, epsilon: f64) -> Self {
        Self {
            k1,
            b,
            epsilon,
            state: ReentrantMutex::new(RefCell::new(State { fingerprint: None, index: None })),
        }
    }

    fn build_index(&self, tools: &[Tool]) -> Option<Index> {
        if tools.is_empty() {
            return None;
        }
        let docs: Vec<Vec<String>> = tools.iter().map(|t| tokenize(&t.search_corpus())).collect();
        let doc_lengths: Vec<usize> = docs.iter().map(|d| d.len()).collect();
        let total_len: usize = doc_lengths.iter().sum();
        let avg_doc_len = total_len as f64 / docs.len() as f64;

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            let mut seen = std::collections::HashSet::new();
            for term in doc {
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        let n = docs.len() as f64;
        let mut idf: HashMap<String, f64> = HashMap::new();
        for (term, df) in &doc_freq {
            let df = *df as f64;
            let score = ((n - df + 0.5) / (df + 0.5)).ln();
            idf.insert((*term).to_string(), score);
        }
        let average_idf = if idf.is_empty() {
            0.0
        } else {
            idf.values().sum::<f64>() / idf.len() as f64
        };
        let eps = self.epsilon * average_idf;
        for v in idf.values_mut() {
            if *v < 0.0 {
                *v = eps;
            }
        }

        Some(Index { docs, doc_lengths, avg_doc_len, idf })
    }

    fn score_all(&self, index: &Index, query_tokens: &[String]) -> Vec<f64> {
        index
            .docs
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let doc_len = index.doc_lengths[i] as f64;
                let mut term_freq: HashMap<&str, usize> = HashMap::new();
                for term in doc {
                    *term_freq.entry(term.as_str()).or_insert(0) += 1;
                }
                query_tokens
                    .iter()
                    .map(|q| {
                        let idf = match index.idf.get(q) {
                            Some(v) => *v,
                            None => return 0.0,
                        };
                        let f = *term_freq.get(q.as_str()).unwrap_or(&0) as f64;
                        if f == 0.0 {
                            return 0.0;
                        }
                        idf * (f * (self.k1 + 1.0))
                            / (f + self.k1 * (1.0 - self.b + self.b * doc_len / index.avg_doc_len))
                    })
                    .sum()
            })
            .collect()
    }
}

impl Default for Bm25Search {
    fn default() -> Self {
        Self::new(1.5, 0.75, 0.25)
    }
}

impl SearchAlgorithm for Bm25Search {
    fn method(&self) -> SearchMethod {
        SearchMethod::Bm25
    }

    fn index(&self, tools: &[Tool]) {
        let built = self.build_index(tools);
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.fingerprint = Some(fingerprint(tools));
        state.index = built;
    }

    fn search(&self, query: &str, tools: &[Tool], limit: usize) -> Vec<SearchResult> {
        let current = fingerprint(tools);
        let needs_rebuild = {
            let guard = self.state.lock();
            guard.borrow().fingerprint != Some(current)
        };
        if needs_rebuild {
            let built = self.build_index(tools);
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            if state.fingerprint != Some(current) {
                state.fingerprint = Some(current);
                state.index = built;
            }
        }

        let query_tokens = tokenize(query);

        let guard = self.state.lock();
        let state = guard.borrow();
        let index = match state.index.as_ref() {
            Some(i) => i,
            None => return Vec::new(),
        };

        let scores = self.score_all(index, &query_tokens);
        let scored: Vec<(&Tool, f64)> =
            tools.iter().zip(scores).filter(|(_, score)| *score > 0.0).collect();
        normalize_and_rank(scored, limit, "bm25_keyword_similarity")
    }

    fn is_indexed(&self) -> bool {
        self.state.lock().borrow().fingerprint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_short_latin_tokens_and_stopwords() {
        let tokens = tokenize("Create a Pull Request");
        assert!(!tokens.contains(&"a".to_string()));
        assert!(tokens.contains(&"create".to_string()));
        assert!(tokens.contains(&"pull".to_string()));
    }

    #[test]
    fn tokenize_splits_cjk_into_characters() {
        let tokens = tokenize("创建拉取请求");
        assert_eq!(tokens, vec!["创", "建", "拉", "取", "请", "求"]);
    }

    #[test]
    fn ranks_relevant_tool_above_irrelevant_one() {
        let s = Bm25Search::default();
        let tools = vec![
            Tool::new("github.create_pr", "Create a pull request on GitHub")
                .with_tags(["github", "git"]),
            Tool::new("slack.send_message", "Send a message to a Slack channel")
                .with_tags(["slack", "chat"]),
        ];
        s.index(&tools);
        let results = s.search("github pull request", &tools, 10);
        assert_eq!(results[0].tool_name, "github.create_pr");
    }

    #[test]
    fn empty_corpus_returns_no_results() {
        let s = Bm25Search::default();
        let tools: Vec<Tool> = Vec::new();
        s.index(&tools);
        assert!(s.search("anything", &tools, 10).is_empty());
    }
}
