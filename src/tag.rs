//! Canonical tag model shared by the decoder, sessions and writers.

use crate::error::{MetaError, MetaResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Group assigned to keys the tool reports without a `Group:` prefix.
pub const FALLBACK_GROUP: &str = "Other";

/// Groups the tool derives or owns; edits to these are rejected locally.
const READ_ONLY_GROUPS: &[&str] = &["system", "file", "composite"];

static NEXT_TAG_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque per-row identity, independent of (group, tag name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagId(u64);

impl TagId {
    fn next() -> Self {
        Self(NEXT_TAG_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Display/filter bucket for a tool-supplied group name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Exif,
    Iptc,
    Xmp,
    File,
    MakerNotes,
    Composite,
    Other,
}

impl TagCategory {
    pub fn classify(group: &str) -> Self {
        let lowered = group.to_ascii_lowercase();
        match lowered.as_str() {
            "exif" | "ifd0" | "ifd1" | "exififd" | "gps" | "interopifd" => Self::Exif,
            "iptc" => Self::Iptc,
            "file" | "system" => Self::File,
            "makernotes" => Self::MakerNotes,
            "composite" => Self::Composite,
            _ if lowered.starts_with("xmp") => Self::Xmp,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Exif => "EXIF",
            Self::Iptc => "IPTC",
            Self::Xmp => "XMP",
            Self::File => "File",
            Self::MakerNotes => "Maker Notes",
            Self::Composite => "Composite",
            Self::Other => "Other",
        }
    }
}

/// One metadata field as reported by the tool for a single file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEntry {
    pub id: TagId,
    pub group: String,
    pub tag_name: String,
    pub description: String,
    pub value: String,
    original_value: String,
    pub is_writable: bool,
}

impl TagEntry {
    /// Builds a freshly loaded entry; `original_value` starts equal to `value`.
    pub fn new(
        group: impl Into<String>,
        tag_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let group = group.into();
        let tag_name = tag_name.into();
        let value = value.into();
        Self {
            id: TagId::next(),
            description: describe_tag_name(&tag_name),
            is_writable: !is_read_only_group(&group),
            original_value: value.clone(),
            group,
            tag_name,
            value,
        }
    }

    pub fn original_value(&self) -> &str {
        &self.original_value
    }

    pub fn is_modified(&self) -> bool {
        self.value != self.original_value
    }

    pub fn category(&self) -> TagCategory {
        TagCategory::classify(&self.group)
    }

    /// `Group:TagName`, or the bare name for the fallback group.
    pub fn qualified_name(&self) -> String {
        qualify(&self.group, &self.tag_name)
    }

    pub(crate) fn revert(&mut self) {
        self.value = self.original_value.clone();
    }
}

/// A tag reference as typed by a user: `Group:Tag` or a bare `Tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub group: Option<String>,
    pub name: String,
}

impl TagRef {
    pub fn parse(raw: &str) -> MetaResult<Self> {
        let trimmed = raw.trim();
        let (group, name) = match trimmed.split_once(':') {
            Some((group, name)) => (Some(group.trim()), name.trim()),
            None => (None, trimmed),
        };
        if name.is_empty() || group.is_some_and(str::is_empty) {
            return Err(MetaError::InvalidTag(raw.to_string()));
        }
        if name.contains('=') || name.starts_with('-') {
            return Err(MetaError::InvalidTag(raw.to_string()));
        }
        Ok(Self {
            group: group.map(str::to_string),
            name: name.to_string(),
        })
    }

    pub fn is_writable(&self) -> bool {
        self.group.as_deref().map_or(true, |group| !is_read_only_group(group))
    }

    pub fn qualified_name(&self) -> String {
        match &self.group {
            Some(group) => format!("{}:{}", group, self.name),
            None => self.name.clone(),
        }
    }
}

/// Splits a qualified key on its first colon.
pub fn split_qualified_key(key: &str) -> (&str, &str) {
    key.split_once(':').unwrap_or((FALLBACK_GROUP, key))
}

pub fn is_read_only_group(group: &str) -> bool {
    let lowered = group.to_ascii_lowercase();
    READ_ONLY_GROUPS.contains(&lowered.as_str())
}

/// Inserts a space before each uppercase letter that follows a lowercase
/// letter or digit. Runs of capitals stay together.
pub fn describe_tag_name(tag_name: &str) -> String {
    let mut description = String::with_capacity(tag_name.len() + 8);
    let mut previous: Option<char> = None;
    for ch in tag_name.chars() {
        if ch.is_uppercase() {
            if let Some(prev) = previous {
                if prev.is_lowercase() || prev.is_ascii_digit() {
                    description.push(' ');
                }
            }
        }
        description.push(ch);
        previous = Some(ch);
    }
    description
}

fn qualify(group: &str, tag_name: &str) -> String {
    if group == FALLBACK_GROUP {
        tag_name.to_string()
    } else {
        format!("{}:{}", group, tag_name)
    }
}
