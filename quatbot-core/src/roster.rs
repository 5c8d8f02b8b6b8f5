// ABOUTME: Room roster snapshot and display-name to identity resolution
// ABOUTME: Multi-word nicknames are matched greedily, longest nickname first

use crate::traits::{looks_like_identity, ChatUser};

/// Current members of the room as last reported by the transport
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<ChatUser>,
}

/// Identity paired with its display name split into words
struct DisplayName<'a> {
    id: &'a str,
    words: Vec<&'a str>,
}

fn split_display_name(name: &str) -> Vec<&str> {
    name.split_whitespace().collect()
}

impl Roster {
    pub fn new(members: Vec<ChatUser>) -> Self {
        Self { members }
    }

    pub fn replace(&mut self, members: Vec<ChatUser>) {
        self.members = members;
    }

    pub fn members(&self) -> &[ChatUser] {
        &self.members
    }

    /// All member identities, in roster order
    pub fn user_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.members.iter().any(|m| m.id == identity)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Resolve a single name to an identity.
    ///
    /// Identity-shaped input is returned as-is (even if that user is not in
    /// the room); otherwise the display name must match exactly.
    pub fn lookup_identity(&self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if looks_like_identity(name) {
            return Some(name.to_string());
        }
        self.members
            .iter()
            .find(|m| m.display_name.as_deref() == Some(name))
            .map(|m| m.id.clone())
    }

    /// Resolve a list of words, where nicknames may span several words.
    ///
    /// Words that can't be matched are passed through unchanged so that the
    /// caller can check them one by one with [`Roster::lookup_identity`].
    /// Empty words are dropped.
    pub fn lookup_identities<S: AsRef<str>>(&self, words: &[S]) -> Vec<String> {
        let mut names: Vec<DisplayName<'_>> = self
            .members
            .iter()
            .map(|m| DisplayName {
                id: &m.id,
                words: m
                    .display_name
                    .as_deref()
                    .map(split_display_name)
                    .unwrap_or_default(),
            })
            .filter(|d| !d.words.is_empty())
            .collect();
        // Longest first, then alphabetical
        names.sort_by(|a, b| {
            b.words
                .len()
                .cmp(&a.words.len())
                .then_with(|| a.words.cmp(&b.words))
        });

        let mut ids = Vec::new();
        let mut i = 0;
        while i < words.len() {
            let word = words[i].as_ref();
            if word.is_empty() {
                i += 1;
                continue;
            }
            if looks_like_identity(word) {
                ids.push(word.to_string());
                i += 1;
                continue;
            }

            let matched = names.iter().find(|d| {
                d.words.len() <= words.len() - i
                    && d.words
                        .iter()
                        .zip(&words[i..])
                        .all(|(part, w)| *part == w.as_ref())
            });
            match matched {
                Some(d) => {
                    ids.push(d.id.to_string());
                    i += d.words.len();
                }
                None => {
                    ids.push(word.to_string());
                    i += 1;
                }
            }
        }
        ids
    }
}
