//! The `data.json` index format.
//!
//! Each key maps to a positional array:
//!
//! ```text
//! [offsetStart, offsetEnd, esm, exportNames, exportStars, moduleSpecifiers, warnings]
//! ```
//!
//! or just `[offsetStart, offsetEnd]` for a key whose entry was evicted after
//! it had been queued. `[-1, -1]` means the key has no bytes in `data.blob`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use super::result::Warning;

/// Half-open byte range into `data.blob`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: i64,
    pub end: i64,
}

impl ByteRange {
    /// Sentinel for "no script data"
    pub const NONE: Self = Self { start: -1, end: -1 };

    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn is_none(&self) -> bool {
        self.start < 0 || self.end < 0
    }

    /// Range as `usize` offsets, if it is a real range
    pub fn to_range(self) -> Option<Range<usize>> {
        if self.is_none() || self.end < self.start {
            return None;
        }
        let start = usize::try_from(self.start).ok()?;
        let end = usize::try_from(self.end).ok()?;
        Some(start..end)
    }

    /// Bytes of `blob` covered by this range, if it is in bounds
    pub fn slice(self, blob: &[u8]) -> Option<&[u8]> {
        self.to_range().and_then(|range| blob.get(range))
    }
}

/// Export metadata stored for a live entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportMeta {
    pub esm: bool,
    pub export_names: Vec<String>,
    pub export_stars: Vec<String>,
    pub module_specifiers: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// One `data.json` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireRecord", into = "WireRecord")]
pub struct MetaRecord {
    pub range: ByteRange,
    /// `None` for evicted entries, which keep only their byte range
    pub meta: Option<ExportMeta>,
}

impl MetaRecord {
    pub fn full(range: ByteRange, meta: ExportMeta) -> Self {
        Self {
            range,
            meta: Some(meta),
        }
    }

    pub fn ranged(range: ByteRange) -> Self {
        Self { range, meta: None }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireRecord {
    Full(i64, i64, bool, Vec<String>, Vec<String>, Vec<String>, Vec<Warning>),
    Ranged(i64, i64),
}

impl From<WireRecord> for MetaRecord {
    fn from(wire: WireRecord) -> Self {
        match wire {
            WireRecord::Full(start, end, esm, export_names, export_stars, module_specifiers, warnings) => {
                Self::full(
                    ByteRange::new(start, end),
                    ExportMeta {
                        esm,
                        export_names,
                        export_stars,
                        module_specifiers,
                        warnings,
                    },
                )
            }
            WireRecord::Ranged(start, end) => Self::ranged(ByteRange::new(start, end)),
        }
    }
}

impl From<MetaRecord> for WireRecord {
    fn from(record: MetaRecord) -> Self {
        let ByteRange { start, end } = record.range;
        match record.meta {
            Some(meta) => Self::Full(
                start,
                end,
                meta.esm,
                meta.export_names,
                meta.export_stars,
                meta.module_specifiers,
                meta.warnings,
            ),
            None => Self::Ranged(start, end),
        }
    }
}

/// A byte-range problem found by [`CacheIndex::check_ranges`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeViolation {
    /// `end` is before `start`
    Inverted { key: String, range: ByteRange },
    /// Range extends past the end of the blob
    OutOfBounds { key: String, range: ByteRange, blob_len: usize },
    /// Range starts before the previous range ended
    Overlap { key: String, previous: String },
}

impl fmt::Display for RangeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inverted { key, range } => {
                write!(f, "{key}: range [{}, {}) is inverted", range.start, range.end)
            }
            Self::OutOfBounds {
                key,
                range,
                blob_len,
            } => write!(
                f,
                "{key}: range [{}, {}) exceeds blob length {blob_len}",
                range.start, range.end
            ),
            Self::Overlap { key, previous } => {
                write!(f, "{key}: range overlaps or precedes {previous}")
            }
        }
    }
}

/// Parsed `data.json`, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheIndex {
    records: IndexMap<String, MetaRecord>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn get(&self, key: &str) -> Option<&MetaRecord> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Insert or replace a record; a replaced key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, record: MetaRecord) {
        self.records.insert(key.into(), record);
    }

    /// Remove a record, preserving the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<MetaRecord> {
        self.records.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaRecord)> {
        self.records.iter().map(|(key, record)| (key.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check that every real range lies inside a blob of `blob_len` bytes and
    /// that ranges are ordered and disjoint in index order.
    pub fn check_ranges(&self, blob_len: usize) -> Vec<RangeViolation> {
        let mut violations = Vec::new();
        let mut previous: Option<(&str, usize)> = None;

        for (key, record) in self.iter() {
            let range = record.range;
            if range.is_none() {
                continue;
            }
            let Some(bytes) = range.to_range() else {
                violations.push(RangeViolation::Inverted {
                    key: key.to_string(),
                    range,
                });
                continue;
            };
            if bytes.end > blob_len {
                violations.push(RangeViolation::OutOfBounds {
                    key: key.to_string(),
                    range,
                    blob_len,
                });
            }
            if let Some((previous_key, previous_end)) = previous {
                if bytes.start < previous_end {
                    violations.push(RangeViolation::Overlap {
                        key: key.to_string(),
                        previous: previous_key.to_string(),
                    });
                }
            }
            previous = Some((key, bytes.end));
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ExportMeta {
        ExportMeta {
            esm: true,
            export_names: vec!["default".to_string()],
            export_stars: vec!["./dep.js".to_string()],
            module_specifiers: vec!["./dep.js".to_string()],
            warnings: vec![Warning::new("arguments-access", "`arguments` used at top level")],
        }
    }

    #[test]
    fn test_full_record_wire_format() {
        let mut index = CacheIndex::new();
        index.insert("k", MetaRecord::full(ByteRange::new(0, 4), meta()));

        let json: serde_json::Value = serde_json::from_slice(&index.to_json_vec().unwrap()).unwrap();
        let record = json["k"].as_array().unwrap();
        assert_eq!(record.len(), 7);
        assert_eq!(record[0], 0);
        assert_eq!(record[1], 4);
        assert_eq!(record[2], true);
        assert_eq!(record[3][0], "default");
        assert_eq!(record[6][0]["kind"], "arguments-access");
    }

    #[test]
    fn test_ranged_record_wire_format() {
        let mut index = CacheIndex::new();
        index.insert("k", MetaRecord::ranged(ByteRange::NONE));

        let json = String::from_utf8(index.to_json_vec().unwrap()).unwrap();
        assert_eq!(json, r#"{"k":[-1,-1]}"#);
    }

    #[test]
    fn test_parse_mixed_records() {
        let json = r#"{
            "a": [0, 3, false, [], [], ["fs"], []],
            "b": [3, 3],
            "c": [-1, -1, true, ["x"], [], [], []]
        }"#;
        let index = CacheIndex::from_json_slice(json.as_bytes()).unwrap();

        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(index.get("a").unwrap().meta.is_some());
        assert!(index.get("b").unwrap().meta.is_none());
        assert!(index.get("c").unwrap().range.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_arity() {
        assert!(CacheIndex::from_json_slice(br#"{"a": [0, 1, true]}"#).is_err());
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut index = CacheIndex::new();
        for key in ["a", "b", "c"] {
            index.insert(key, MetaRecord::ranged(ByteRange::NONE));
        }
        index.remove("b");
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let blob = [1u8, 2, 3];
        assert_eq!(ByteRange::new(1, 3).slice(&blob), Some(&blob[1..3]));
        assert_eq!(ByteRange::new(1, 9).slice(&blob), None);
        assert_eq!(ByteRange::NONE.slice(&blob), None);
    }

    #[test]
    fn test_check_ranges() {
        let mut index = CacheIndex::new();
        index.insert("a", MetaRecord::ranged(ByteRange::new(0, 4)));
        index.insert("none", MetaRecord::ranged(ByteRange::NONE));
        index.insert("b", MetaRecord::ranged(ByteRange::new(4, 6)));
        assert!(index.check_ranges(6).is_empty());

        index.insert("c", MetaRecord::ranged(ByteRange::new(5, 8)));
        let violations = index.check_ranges(6);
        assert_eq!(violations.len(), 2);
        assert!(matches!(violations[0], RangeViolation::OutOfBounds { .. }));
        assert!(matches!(violations[1], RangeViolation::Overlap { .. }));
    }
}
