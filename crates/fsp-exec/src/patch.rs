use std::fs;
use std::io::ErrorKind;
use std::ops::Range;
use std::path::Path;

use fsp_core::errors::{ErrorInfo, FspError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Inclusive, 1-based column window of a fixed-column text record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRange {
    /// First column (1-based, inclusive).
    pub first: usize,
    /// Last column (1-based, inclusive).
    pub last: usize,
}

impl ColumnRange {
    /// Creates a window, rejecting zero columns and reversed bounds.
    pub fn new(first: usize, last: usize) -> Result<Self, FspError> {
        if first == 0 || last < first {
            return Err(FspError::Config(
                ErrorInfo::new("fsp_exec.column_range", "invalid column window")
                    .with_context("first", first.to_string())
                    .with_context("last", last.to_string()),
            ));
        }
        Ok(Self { first, last })
    }

    /// PDB columns 56-62, around the occupancy field.
    pub const OCCUPANCY: ColumnRange = ColumnRange { first: 56, last: 62 };

    /// Byte offsets covered by the window, clamped to `len`.
    pub fn byte_range(&self, len: usize) -> Range<usize> {
        let start = (self.first - 1).min(len);
        let end = self.last.min(len);
        start..end
    }
}

/// Fixed-column substitution applied to selected records of a text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyPatchRule {
    /// Record names a line must start with to be considered.
    pub line_prefixes: Vec<String>,
    /// Window that must fully contain the match literal.
    pub columns: ColumnRange,
    /// Literal searched inside the window.
    pub matches: String,
    /// Literal written in place of the first match inside the window.
    pub replacement: String,
}

impl OccupancyPatchRule {
    /// Post-phasing rule: HETATM occupancies `0.00` become `replacement`.
    pub fn phased(replacement: impl Into<String>) -> Self {
        Self {
            line_prefixes: vec!["HETATM".to_string()],
            columns: ColumnRange::OCCUPANCY,
            matches: "0.00".to_string(),
            replacement: replacement.into(),
        }
    }

    /// Post-refinement rule: ATOM and HETATM occupancies `0.00` become `replacement`.
    pub fn refined(replacement: impl Into<String>) -> Self {
        Self {
            line_prefixes: vec!["ATOM".to_string(), "HETATM".to_string()],
            columns: ColumnRange::OCCUPANCY,
            matches: "0.00".to_string(),
            replacement: replacement.into(),
        }
    }

    /// Checks that the substitution keeps every column in place.
    pub fn validate(&self) -> Result<(), FspError> {
        if self.matches.is_empty() {
            return Err(FspError::Config(ErrorInfo::new(
                "fsp_exec.patch_match",
                "patch match literal is empty",
            )));
        }
        if self.matches.len() != self.replacement.len() {
            return Err(FspError::Config(
                ErrorInfo::new(
                    "fsp_exec.patch_width",
                    "replacement must have the same width as the match literal",
                )
                .with_context("match", self.matches.clone())
                .with_context("replacement", self.replacement.clone()),
            ));
        }
        if self.line_prefixes.iter().any(|prefix| prefix.is_empty()) {
            return Err(FspError::Config(ErrorInfo::new(
                "fsp_exec.patch_prefix",
                "line prefixes must not be empty",
            )));
        }
        Ok(())
    }

    /// Rewrites a single line, returning `None` when it is left unchanged.
    ///
    /// Matches are rewritten until none is left in the window, including
    /// ones exposed by an earlier rewrite such as `0.00.00`.
    pub fn apply_to_line(&self, line: &[u8]) -> Option<Vec<u8>> {
        if !self
            .line_prefixes
            .iter()
            .any(|prefix| line.starts_with(prefix.as_bytes()))
        {
            return None;
        }
        let needle = self.matches.as_bytes();
        if needle.is_empty() || needle.len() != self.replacement.len() {
            return None;
        }
        let window = self.columns.byte_range(line.len());
        let mut patched = line.to_vec();
        for _ in 0..window.len() {
            let Some(offset) = patched[window.clone()]
                .windows(needle.len())
                .position(|candidate| candidate == needle)
            else {
                break;
            };
            let at = window.start + offset;
            patched[at..at + needle.len()].copy_from_slice(self.replacement.as_bytes());
        }
        (patched != line).then_some(patched)
    }

    /// Applies the rule to every line of `content`, preserving line endings.
    pub fn apply(&self, content: &[u8]) -> (Vec<u8>, usize) {
        let mut out = Vec::with_capacity(content.len());
        let mut modified = 0usize;
        for line in content.split_inclusive(|byte| *byte == b'\n') {
            match self.apply_to_line(line) {
                Some(patched) => {
                    modified += 1;
                    out.extend_from_slice(&patched);
                }
                None => out.extend_from_slice(line),
            }
        }
        (out, modified)
    }
}

/// Result of patching a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum PatchOutcome {
    /// The file was rewritten.
    Patched {
        /// Number of lines whose content changed.
        lines_modified: usize,
    },
    /// The target file does not exist; nothing was written.
    FileNotFound,
}

/// Applies `rule` to the file at `path`, rewriting it in place.
pub fn patch_occupancy(path: &Path, rule: &OccupancyPatchRule) -> Result<PatchOutcome, FspError> {
    rule.validate()?;
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "file not found");
            return Ok(PatchOutcome::FileNotFound);
        }
        Err(err) => return Err(FspError::io("fsp_exec.patch_read", path, err)),
    };
    let (patched, lines_modified) = rule.apply(&content);
    fs::write(path, patched).map_err(|err| FspError::io("fsp_exec.patch_write", path, err))?;
    info!(path = %path.display(), lines_modified, replacement = %rule.replacement, "modified");
    Ok(PatchOutcome::Patched { lines_modified })
}
