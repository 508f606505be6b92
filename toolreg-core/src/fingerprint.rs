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

//! Tool-set fingerprinting, used by search algorithms to detect a
//! stale index without re-indexing on every call.

use serde::Serialize;

use crate::tool::Tool;

#[derive(Serialize)]
struct FingerprintDoc<'a> {
    name: &'a str,
    description: &'a str,
    tags: Vec<&'a str>,
    category: &'a str,
}

/// Content hash of a tool set. Two calls with the same names,
/// descriptions, tags and categories (regardless of slice order)
/// produce the same fingerprint; any other change produces a
/// different one.
pub fn fingerprint(tools: &[Tool]) -> [u8; 32] {
    let mut docs: Vec<FingerprintDoc> = tools
        .iter()
        .map(|t| FingerprintDoc {
            name: &t.name,
            description: &t.description,
            tags: t.tags.iter().map(String::as_str).collect(),
            category: t.category.as_deref().unwrap_or(""),
        })
        .collect();
    docs.sort_by(|a, b| a.name.cmp(b.name));

    // serde_json::to_vec on a Vec of structs with BTreeSet-sourced
    // tags already preserves field order; we additionally rely on the
    // tags vec already being sorted since `Tool::tags` is a BTreeSet.
    let encoded = serde_json::to_vec(&docs).expect("fingerprint doc is always serializable");
    *blake3::hash(&encoded).as_bytes()
}

/// Hex-encoded fingerprint, convenient for logging and cache keys.
pub fn fingerprint_hex(tools: &[Tool]) -> String {
    hex_encode(&fingerprint(tools))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, desc: &str, tags: &[&str], category: Option<&str>) -> Tool {
        let mut t = Tool::new(name, desc).with_tags(tags.iter().copied());
        if let Some(c) = category {
            t = t.with_category(c);
        }
        t
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = tool("b", "B", &["x"], None);
        let b = tool("a", "A", &["y"], Some("cat"));
        let fp1 = fingerprint(&[a.clone(), b.clone()]);
        let fp2 = fingerprint(&[b, a]);
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn fingerprint_changes_when_description_changes() {
        let a = tool("a", "A", &[], None);
        let b = tool("a", "A changed", &[], None);
        assert_ne!(fingerprint(&[a]), fingerprint(&[b]));
    }

    #[test]
    fn fingerprint_ignores_use_frequency_and_last_used() {
        let mut a = tool("a", "A", &[], None);
        a.use_frequency = 42;
        let b = tool("a", "A", &[], None);
        assert_eq!(fingerprint(&[a]), fingerprint(&[b]));
    }

    proptest::proptest! {
        /// Permuting a tool list never changes its fingerprint, no
        /// matter which names/descriptions/tags land in the set.
        #[test]
        fn fingerprint_is_permutation_invariant(
            names in proptest::collection::vec("[a-z]{1,8}", 1..6),
            descs in proptest::collection::vec("[a-z ]{0,12}", 1..6),
        ) {
            let n = names.len().min(descs.len());
            let mut tools: Vec<Tool> = (0..n)
                .map(|i| tool(&names[i], &descs[i], &[], None))
                .collect();
            // Dedup by name: `Tool::name` is the primary key, duplicate
            // names in the same slice aren't a state fingerprint() needs
            // to handle meaningfully.
            tools.sort_by(|a, b| a.name.cmp(&b.name));
            tools.dedup_by(|a, b| a.name == b.name);

            let original = fingerprint(&tools);
            let mut shuffled = tools.clone();
            shuffled.reverse();
            proptest::prop_assert_eq!(original, fingerprint(&shuffled));
        }
    }
}
