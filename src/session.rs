//! In-memory tag set for the file currently being edited.

use crate::tag::{TagCategory, TagEntry, TagId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Wildcard accepted by [`GroupFilter::parse`].
pub const ALL_GROUPS: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupFilter {
    #[default]
    All,
    Group(String),
    Category(TagCategory),
}

impl GroupFilter {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == ALL_GROUPS {
            Self::All
        } else {
            Self::Group(trimmed.to_string())
        }
    }

    fn matches(&self, entry: &TagEntry) -> bool {
        match self {
            Self::All => true,
            Self::Group(group) => entry.group.eq_ignore_ascii_case(group),
            Self::Category(category) => entry.category() == *category,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Group,
    TagName,
    Description,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Entries loaded for one file plus the edits made since loading.
#[derive(Debug, Clone, Default)]
pub struct MetadataSession {
    path: PathBuf,
    entries: Vec<TagEntry>,
}

impl MetadataSession {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entries(path: impl Into<PathBuf>, entries: Vec<TagEntry>) -> Self {
        let mut session = Self::new(path);
        session.load(entries);
        session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the whole entry set. Nothing from the previous load survives.
    pub fn load(&mut self, entries: Vec<TagEntry>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: TagId) -> Option<&TagEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Returns `false` when no entry has this id.
    pub fn set_value(&mut self, id: TagId, value: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.value = value.into();
                true
            }
            None => false,
        }
    }

    pub fn revert(&mut self, id: TagId) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.revert();
                true
            }
            None => false,
        }
    }

    pub fn revert_all(&mut self) {
        self.entries.iter_mut().for_each(TagEntry::revert);
    }

    pub fn modified_entries(&self) -> Vec<&TagEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.is_modified())
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(TagEntry::is_modified)
    }

    /// Entries in `group_filter` whose name, description, value or group
    /// contains `search` (case-insensitive, whitespace kept). An empty search
    /// matches all.
    pub fn filter(&self, search: &str, group_filter: &GroupFilter) -> Vec<&TagEntry> {
        let needle = search.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| group_filter.matches(entry))
            .filter(|entry| search.is_empty() || entry_contains(entry, &needle))
            .collect()
    }

    /// Distinct group names in entry order.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !groups.contains(&entry.group.as_str()) {
                groups.push(&entry.group);
            }
        }
        groups
    }

    pub fn sorted(&self, key: SortKey, order: SortOrder) -> Vec<&TagEntry> {
        let mut view: Vec<&TagEntry> = self.entries.iter().collect();
        view.sort_by(|a, b| {
            let ordering = compare_by(a, b, key);
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
        view
    }
}

fn entry_contains(entry: &TagEntry, needle: &str) -> bool {
    [
        entry.tag_name.as_str(),
        entry.description.as_str(),
        entry.value.as_str(),
        entry.group.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

fn compare_by(a: &TagEntry, b: &TagEntry, key: SortKey) -> Ordering {
    let primary = match key {
        SortKey::Group => a.group.cmp(&b.group),
        SortKey::TagName => a.tag_name.to_lowercase().cmp(&b.tag_name.to_lowercase()),
        SortKey::Description => a
            .description
            .to_lowercase()
            .cmp(&b.description.to_lowercase()),
        SortKey::Value => a.value.cmp(&b.value),
    };
    primary.then_with(|| a.tag_name.cmp(&b.tag_name))
}
