//! The bytecode-offset ↔ source-line map.

use std::path::Path;

use serde::Deserialize;

use crate::error::{DebugError, DebugResult};

/// One compiler-emitted map entry: the half-open byte range
/// `[start, end)` of the `.avm` produced by a source line.
#[derive(Debug, Clone, Deserialize)]
pub struct DebugMapEntry {
    pub start: usize,
    pub end: usize,
    #[serde(alias = "file")]
    pub url: String,
    pub line: u32,
}

/// Bidirectional offset ↔ (source file, line) lookups.
///
/// Entries are kept sorted by start offset; ranges never overlap, so a
/// binary search with a containment check resolves offsets in O(log n).
/// Multiple source URLs (inline compilation units) are tolerated.
#[derive(Debug, Clone, Default)]
pub struct DebugMap {
    entries: Vec<DebugMapEntry>,
}

impl DebugMap {
    pub fn from_entries(mut entries: Vec<DebugMapEntry>) -> Self {
        entries.sort_by_key(|entry| entry.start);
        Self { entries }
    }

    /// Parses the `.debug.json` document: a top-level array of entries.
    pub fn from_json(document: &str, path: &Path) -> DebugResult<Self> {
        let entries: Vec<DebugMapEntry> = serde_json::from_str(document)
            .map_err(|err| DebugError::malformed(path, err.to_string()))?;
        Ok(Self::from_entries(entries))
    }

    pub fn load(path: &Path) -> DebugResult<Self> {
        let document =
            std::fs::read_to_string(path).map_err(|err| DebugError::io(path, err))?;
        Self::from_json(&document, path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DebugMapEntry] {
        &self.entries
    }

    /// The entry containing `offset`, if any.
    pub fn entry_for_offset(&self, offset: usize) -> Option<&DebugMapEntry> {
        let candidate = self.entries.partition_point(|entry| entry.start <= offset);
        if candidate == 0 {
            return None;
        }
        let entry = &self.entries[candidate - 1];
        (offset < entry.end).then_some(entry)
    }

    /// The source line covering `offset`, or `None` for unmapped code.
    pub fn resolve_line(&self, offset: usize) -> Option<u32> {
        self.entry_for_offset(offset).map(|entry| entry.line)
    }

    /// The smallest start offset of any entry on `line`, or `None` when
    /// the line produced no bytecode.
    pub fn resolve_offset(&self, line: u32) -> Option<usize> {
        self.entries
            .iter()
            .filter(|entry| entry.line == line)
            .map(|entry| entry.start)
            .min()
    }

    /// The source URL of the first entry; the façade reads the source
    /// text from there.
    pub fn primary_url(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.url.as_str())
    }

    /// Distinct source URLs in first-appearance order.
    pub fn file_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !names.contains(&entry.url.as_str()) {
                names.push(&entry.url);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> DebugMap {
        DebugMap::from_json(
            r#"[
                {"start": 5, "end": 9, "url": "contract.py", "line": 11},
                {"start": 0, "end": 5, "url": "contract.py", "line": 10},
                {"start": 9, "end": 12, "url": "util.py", "line": 3}
            ]"#,
            Path::new("contract.debug.json"),
        )
        .unwrap()
    }

    #[test]
    fn resolves_lines_inside_ranges() {
        let map = map();
        assert_eq!(map.resolve_line(0), Some(10));
        assert_eq!(map.resolve_line(4), Some(10));
        assert_eq!(map.resolve_line(5), Some(11));
        assert_eq!(map.resolve_line(8), Some(11));
        assert_eq!(map.resolve_line(9), Some(3));
        assert_eq!(map.resolve_line(12), None);
    }

    #[test]
    fn resolves_smallest_offset_for_line() {
        let map = map();
        assert_eq!(map.resolve_offset(10), Some(0));
        assert_eq!(map.resolve_offset(11), Some(5));
        assert_eq!(map.resolve_offset(99), None);
    }

    #[test]
    fn line_offset_round_trip_stays_in_entry() {
        let map = map();
        for offset in 0..12 {
            let line = map.resolve_line(offset).unwrap();
            let start = map.resolve_offset(line).unwrap();
            assert!(start <= offset);
            assert_eq!(map.resolve_line(start), Some(line));
        }
    }

    #[test]
    fn tracks_multiple_source_files() {
        let map = map();
        assert_eq!(map.primary_url(), Some("contract.py"));
        assert_eq!(map.file_names(), vec!["contract.py", "util.py"]);
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = DebugMap::from_json("{}", Path::new("bad.debug.json")).unwrap_err();
        assert!(matches!(err, DebugError::MalformedArtifact { .. }));
    }
}
