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

//! Regex-based exact/substring matching (spec.md §4.1.1).

use parking_lot::ReentrantMutex;
use regex::RegexBuilder;
use std::cell::RefCell;

use crate::fingerprint::fingerprint;
use crate::tool::{SearchMethod, SearchResult, Tool};

use super::{normalize_and_rank, SearchAlgorithm};

struct State {
    fingerprint: Option<[u8; 32]>,
    indexed: bool,
}

/// Regex search: scores tools by how precisely a compiled pattern
/// matches their name, description and tags. Invalid patterns are
/// treated as "no matches" rather than an error.
pub struct RegexSearch {
    case_sensitive: bool,
    state: ReentrantMutex<RefCell<State>>,
}

impl RegexSearch {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            state: ReentrantMutex::new(RefCell::new(State { fingerprint: None, indexed: false })),
        }
    }

    fn score(&self, tool: &Tool, pattern: &regex::Regex) -> f64 {
        let mut score: f64 = 0.0;

        if full_match(pattern, &tool.name) {
            score = 1.0;
        } else if pattern.is_match(&tool.name) {
            score = score.max(0.8);
        }

        if full_match(pattern, &tool.description) {
            score = score.max(0.6);
        } else if pattern.is_match(&tool.description) {
            score = score.max(0.4);
        }

        for tag in &tool.tags {
            if full_match(pattern, tag) {
                score = score.max(0.5);
            } else if pattern.is_match(tag) {
                score = score.max(0.3);
            }
        }

        score
    }
}

fn full_match(pattern: &regex::Regex, text: &str) -> bool {
    matches!(pattern.find(text), Some(m) if m.start() == 0 && m.end() == text.len())
}

impl Default for RegexSearch {
    fn default() -> Self {
        Self::new(false)
    }
}

impl SearchAlgorithm for RegexSearch {
    fn method(&self) -> SearchMethod {
        SearchMethod::Regex
    }

    fn index(&self, tools: &[Tool]) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.fingerprint = Some(fingerprint(tools));
        state.indexed = true;
    }

    fn search(&self, query: &str, tools: &[Tool], limit: usize) -> Vec<SearchResult> {
        let current = fingerprint(tools);
        {
            let guard = self.state.lock();
            let needs_rebuild = guard.borrow().fingerprint != Some(current);
            if needs_rebuild {
                let mut state = guard.borrow_mut();
                if state.fingerprint != Some(current) {
                    state.fingerprint = Some(current);
                    state.indexed = true;
                }
            }
        }

        let pattern = match RegexBuilder::new(query).case_insensitive(!self.case_sensitive).build() {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };

        let scored: Vec<(&Tool, f64)> = tools
            .iter()
            .map(|t| (t, self.score(t, &pattern)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        normalize_and_rank(scored, limit, "regex_pattern_match")
    }

    fn is_indexed(&self) -> bool {
        self.state.lock().borrow().indexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> Vec<Tool> {
        vec![
            Tool::new("github.create_pr", "Create a pull request").with_tags(["github", "git"]),
            Tool::new("slack.send_message", "Send a Slack message").with_tags(["slack", "chat"]),
        ]
    }

    #[test]
    fn exact_name_match_scores_highest() {
        let s = RegexSearch::default();
        let ts = tools();
        s.index(&ts);
        let results = s.search("github.create_pr", &ts, 10);
        assert_eq!(results[0].tool_name, "github.create_pr");
        assert_eq!(results[0].score, 1.0);
    }

    #[test]
    fn substring_match_on_description() {
        let s = RegexSearch::default();
        let ts = tools();
        s.index(&ts);
        let results = s.search("pull request", &ts, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_name, "github.create_pr");
    }

    #[test]
    fn invalid_pattern_returns_empty_not_error() {
        let s = RegexSearch::default();
        let ts = tools();
        s.index(&ts);
        let results = s.search("[unterminated", &ts, 10);
        assert!(results.is_empty());
    }

    #[test]
    fn case_insensitive_by_default() {
        let s = RegexSearch::default();
        let ts = tools();
        s.index(&ts);
        let results = s.search("GITHUB", &ts, 10);
        assert!(!results.is_empty());
    }
}
