//! Display name → session index.
//!
//! The catalogue never owns a session; it only remembers where a named
//! session sits in the server's session list. Whoever moves sessions around
//! must call [`Catalogue::repoint`] for the session that moved.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Catalogue {
    entries: HashMap<Vec<u8>, usize>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, name: &[u8]) -> bool {
        self.entries.contains_key(name)
    }

    #[inline]
    pub fn lookup(&self, name: &[u8]) -> Option<usize> {
        self.entries.get(name).copied()
    }

    /// Bind `name` to `index`. Returns `false` without touching anything if
    /// the name is already taken.
    pub fn bind(&mut self, name: &[u8], index: usize) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_vec(), index);
        true
    }

    /// Forget `name`, returning the index it pointed at.
    pub fn release(&mut self, name: &[u8]) -> Option<usize> {
        self.entries.remove(name)
    }

    /// Point an existing entry at a new index.
    pub fn repoint(&mut self, name: &[u8], index: usize) {
        if let Some(slot) = self.entries.get_mut(name) {
            *slot = index;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], usize)> {
        self.entries
            .iter()
            .map(|(name, &index)| (name.as_slice(), index))
    }
}
