//! Decodes `exiftool -json -G -a` output into tag entries.
//!
//! The tool emits one JSON object per file. With `-a` the same qualified key
//! can repeat inside one object, so the first object is read as an ordered
//! list of pairs instead of a map.

use crate::error::{MetaError, MetaResult};
use crate::tag::{split_qualified_key, TagEntry};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::fmt;

/// Key naming the file that was read, not a tag.
const SOURCE_FILE_KEY: &str = "SourceFile";

/// Shape of a raw tag value before it is projected to text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTagValue {
    Text(String),
    Number(Number),
    Nested(Map<String, Value>),
    Other(Value),
}

impl RawTagValue {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
            Self::Nested(object) => match object.get("val").or_else(|| object.get("value")) {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Number(number)) => number.to_string(),
                Some(other) => other.to_string(),
                None => Value::Object(object).to_string(),
            },
            Self::Other(value) => value.to_string(),
        }
    }
}

/// Key/value pairs of one JSON object, in document order, duplicates kept.
struct TagPairs(Vec<(String, RawTagValue)>);

impl<'de> Deserialize<'de> for TagPairs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = TagPairs;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object of tag values")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(64));
                while let Some((key, value)) = map.next_entry::<String, RawTagValue>()? {
                    pairs.push((key, value));
                }
                Ok(TagPairs(pairs))
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

/// The first record of the top-level array; later records are skipped.
struct FirstRecord(TagPairs);

impl<'de> Deserialize<'de> for FirstRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FirstVisitor;

        impl<'de> Visitor<'de> for FirstVisitor {
            type Value = FirstRecord;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON array of tag objects")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let first = seq
                    .next_element::<TagPairs>()?
                    .ok_or_else(|| <A::Error as de::Error>::custom("empty result array"))?;
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(FirstRecord(first))
            }
        }

        deserializer.deserialize_seq(FirstVisitor)
    }
}

/// Decodes raw tool stdout into entries sorted by (group, tag name).
pub fn decode(bytes: &[u8]) -> MetaResult<Vec<TagEntry>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|error| MetaError::ParsingFailed(format!("output is not UTF-8: {}", error)))?;
    decode_str(text)
}

pub fn decode_str(text: &str) -> MetaResult<Vec<TagEntry>> {
    let record: FirstRecord = serde_json::from_str(text)
        .map_err(|error| MetaError::ParsingFailed(error.to_string()))?;
    let FirstRecord(TagPairs(pairs)) = record;

    let mut entries: Vec<TagEntry> = pairs
        .into_iter()
        .filter(|(key, _)| key != SOURCE_FILE_KEY)
        .map(|(key, raw)| {
            let (group, tag_name) = split_qualified_key(&key);
            TagEntry::new(group, tag_name, raw.into_text())
        })
        .collect();

    entries.sort_by(|a, b| {
        a.group
            .cmp(&b.group)
            .then_with(|| a.tag_name.cmp(&b.tag_name))
    });
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = r#"[{
  "SourceFile": "/photos/a.jpg",
  "File:FileSize": "2.1 MB",
  "EXIF:Make": "Canon",
  "EXIF:ISO": 100,
  "EXIF:FNumber": 2.8,
  "Composite:ImageSize": "6000x4000",
  "XMP:Rating": {"val": 5, "num": 5},
  "XMP:Label": {"value": "Red"},
  "XMP:Flags": {"id": 3},
  "XMP:Subject": ["sky", "sea"],
  "ExifToolVersion": 12.76,
  "IPTC:Urgent": true
}]"#;

    fn find<'a>(entries: &'a [TagEntry], group: &str, name: &str) -> &'a TagEntry {
        entries
            .iter()
            .find(|entry| entry.group == group && entry.tag_name == name)
            .unwrap_or_else(|| panic!("missing {}:{}", group, name))
    }

    #[test]
    fn test_decode_splits_key_into_group_and_tag() {
        let entries = decode_str(r#"[{"EXIF:Make": "Canon"}]"#).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.group, "EXIF");
        assert_eq!(entry.tag_name, "Make");
        assert_eq!(entry.value, "Canon");
        assert_eq!(entry.original_value(), "Canon");
        assert!(entry.is_writable);
        assert!(!entry.is_modified());
    }

    #[test]
    fn test_decode_sample_output() {
        let entries = decode(SAMPLE_OUTPUT.as_bytes()).unwrap();
        assert_eq!(entries.len(), 11);
        assert!(entries.iter().all(|entry| entry.tag_name != "SourceFile"));

        assert_eq!(find(&entries, "EXIF", "ISO").value, "100");
        assert_eq!(find(&entries, "EXIF", "FNumber").value, "2.8");
        assert_eq!(find(&entries, "XMP", "Rating").value, "5");
        assert_eq!(find(&entries, "XMP", "Label").value, "Red");
        assert_eq!(find(&entries, "XMP", "Flags").value, r#"{"id":3}"#);
        assert_eq!(find(&entries, "XMP", "Subject").value, r#"["sky","sea"]"#);
        assert_eq!(find(&entries, "IPTC", "Urgent").value, "true");

        let version = find(&entries, "Other", "ExifToolVersion");
        assert_eq!(version.value, "12.76");

        assert!(!find(&entries, "File", "FileSize").is_writable);
        assert!(!find(&entries, "Composite", "ImageSize").is_writable);
        assert_eq!(
            find(&entries, "EXIF", "FNumber").description,
            "FNumber"
        );
    }

    #[test]
    fn test_decode_sorts_by_group_then_tag() {
        let entries = decode(SAMPLE_OUTPUT.as_bytes()).unwrap();
        let keys: Vec<(String, String)> = entries
            .iter()
            .map(|entry| (entry.group.clone(), entry.tag_name.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys[0], ("Composite".to_string(), "ImageSize".to_string()));
    }

    #[test]
    fn test_decode_keeps_duplicate_keys() {
        let entries =
            decode_str(r#"[{"XMP:Subject": "sky", "EXIF:Make": "Canon", "XMP:Subject": "sea"}]"#)
                .unwrap();
        let subjects: Vec<&str> = entries
            .iter()
            .filter(|entry| entry.tag_name == "Subject")
            .map(|entry| entry.value.as_str())
            .collect();
        assert_eq!(subjects, vec!["sky", "sea"]);
        assert_ne!(entries[1].id, entries[2].id);
    }

    #[test]
    fn test_nested_val_takes_precedence_over_value() {
        let raw: RawTagValue = serde_json::from_str(r#"{"value": "b", "val": "a"}"#).unwrap();
        assert_eq!(raw.into_text(), "a");
    }

    #[test]
    fn test_decode_ignores_records_after_first() {
        let entries =
            decode_str(r#"[{"EXIF:Make": "Canon"}, {"EXIF:Make": "Nikon"}, 42]"#).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "Canon");
    }

    #[test]
    fn test_decode_rejects_malformed_output() {
        for bad in ["", "not json", "{}", "[]", "[1]", r#"["EXIF:Make"]"#] {
            assert!(
                matches!(decode_str(bad), Err(MetaError::ParsingFailed(_))),
                "expected failure for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let bytes = [b'[', b'{', 0xff, 0xfe, b'}', b']'];
        assert!(matches!(decode(&bytes), Err(MetaError::ParsingFailed(_))));
    }
}
