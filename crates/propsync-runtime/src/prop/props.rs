#![forbid(unsafe_code)]

//! Initial prop sources handed to [`Runtime::create_component`](crate::Runtime::create_component).

use super::binding::PropSource;

/// Ordered map from runtime prop name to the parent-side source bound to it.
///
/// Binding the same name twice keeps the last source.
#[derive(Debug, Clone, Default)]
pub struct Props {
    entries: Vec<(String, PropSource)>,
}

impl Props {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, source: PropSource) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: PropSource) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = source,
            None => self.entries.push((name, source)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropSource> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, source)| source)
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<PropSource> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
