//! Tools for inspecting the physical structure of parcels.
//! Useful for debugging schema evolution: which fields a producer actually wrote.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::api::{DEFAULT_MAX_DEPTH, ParcelOptions};
use crate::error::{ParcelError, Result};
use crate::format::{COMPANION_SUFFIX, FIELD_HEADER_SIZE, FileHeader, FILE_HEADER_SIZE, SCOPE_END};

/// A structural report of a parcel.
#[derive(Debug, Serialize)]
pub struct DebugReport {
    /// Format version from the file header, when inspecting a file.
    pub format_version: Option<u16>,
    /// Size of the root scope in bytes.
    pub payload_size: u64,
    /// The root scope.
    pub root: ScopeInfo,
}

/// The fields of one scope.
#[derive(Debug, Serialize)]
pub struct ScopeInfo {
    /// Nesting depth; the root is 0.
    pub depth: usize,
    /// Fields in stream order.
    pub fields: Vec<FieldInfo>,
    /// Whether the scope ended with a close marker (the root may end at EOF).
    pub terminated: bool,
}

/// One field header and what its payload looks like.
#[derive(Debug, Serialize)]
pub struct FieldInfo {
    /// Field id.
    pub id: u32,
    /// Offset of the field header from the start of the root scope.
    pub offset: u64,
    /// Payload length.
    pub payload_size: u64,
    /// Inferred content, e.g. "scalar(4b)" or the companion identity.
    pub hint: String,
    /// The sub-parcel, when the payload is a versioned object.
    pub nested: Option<ScopeInfo>,
}

/// The parcel inspector.
#[derive(Debug)]
pub struct ParcelInspector;

impl ParcelInspector {
    /// Analyzes a file written by `save`.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<DebugReport> {
        Self::inspect_file(path.as_ref(), DEFAULT_MAX_DEPTH)
    }

    /// Like [`ParcelInspector::inspect`], following sub-parcels down to the
    /// nesting limit of `options`.
    pub fn inspect_with<P: AsRef<Path>>(path: P, options: &ParcelOptions) -> Result<DebugReport> {
        Self::inspect_file(path.as_ref(), options.max_depth())
    }

    fn inspect_file(path: &Path, max_depth: usize) -> Result<DebugReport> {
        let bytes = std::fs::read(path)?;
        let header = FileHeader::from_bytes(&bytes)?;
        let payload = bytes
            .get(FILE_HEADER_SIZE..)
            .ok_or_else(|| ParcelError::Format("File smaller than header".into()))?;
        header.verify(payload)?;

        let mut report = Self::inspect_root(payload, max_depth)?;
        report.format_version = Some(header.version);
        Ok(report)
    }

    /// Analyzes an in-memory root scope.
    pub fn inspect_bytes(bytes: &[u8]) -> Result<DebugReport> {
        Self::inspect_root(bytes, DEFAULT_MAX_DEPTH)
    }

    /// Like [`ParcelInspector::inspect_bytes`], with the nesting limit of `options`.
    pub fn inspect_bytes_with(bytes: &[u8], options: &ParcelOptions) -> Result<DebugReport> {
        Self::inspect_root(bytes, options.max_depth())
    }

    fn inspect_root(bytes: &[u8], max_depth: usize) -> Result<DebugReport> {
        let (root, _) = Self::inspect_scope(bytes, 0, bytes.len(), 0, max_depth)?;
        Ok(DebugReport {
            format_version: None,
            payload_size: bytes.len() as u64,
            root,
        })
    }

    fn inspect_scope(
        bytes: &[u8],
        start: usize,
        limit: usize,
        depth: usize,
        max_depth: usize,
    ) -> Result<(ScopeInfo, usize)> {
        if depth > max_depth {
            return Err(ParcelError::Format(format!("Nesting deeper than {max_depth}")));
        }
        let mut fields = Vec::new();
        let mut pos = start;
        loop {
            if pos >= limit {
                if depth > 0 {
                    return Err(ParcelError::Format("Sub-parcel ended without a close marker".into()));
                }
                let scope = ScopeInfo { depth, fields, terminated: false };
                return Ok((scope, pos));
            }
            let raw_id = read_i32_at(bytes, pos, limit)?;
            if raw_id == SCOPE_END {
                let scope = ScopeInfo { depth, fields, terminated: true };
                return Ok((scope, pos + 4));
            }
            let id = u32::try_from(raw_id).map_err(|_| ParcelError::Malformed {
                what: "field id",
                value: i64::from(raw_id),
            })?;
            let raw_len = read_i32_at(bytes, pos + 4, limit)?;
            let len = usize::try_from(raw_len).map_err(|_| ParcelError::Malformed {
                what: "field length",
                value: i64::from(raw_len),
            })?;
            let payload_start = pos + FIELD_HEADER_SIZE;
            let end = payload_start + len;
            if end > limit {
                return Err(ParcelError::Format(format!("Field {id} overruns its scope")));
            }

            let (hint, nested) = Self::analyze_payload(bytes, payload_start, end, depth, max_depth);
            fields.push(FieldInfo {
                id,
                offset: pos as u64,
                payload_size: len as u64,
                hint,
                nested,
            });
            pos = end;
        }
    }

    fn analyze_payload(
        bytes: &[u8],
        start: usize,
        end: usize,
        depth: usize,
        max_depth: usize,
    ) -> (String, Option<ScopeInfo>) {
        let len = end - start;
        if len == 0 {
            return ("empty".to_string(), None);
        }

        // CHECK 1: companion identity followed by a sub-parcel
        if let Some(identity) = read_str_at(bytes, start, end)
            && identity.ends_with(COMPANION_SUFFIX)
        {
            let scope_start = start + 4 + identity.len();
            if let Ok((scope, _)) = Self::inspect_scope(bytes, scope_start, end, depth + 1, max_depth) {
                return (identity.to_string(), Some(scope));
            }
        }

        // CHECK 2: a single null marker
        if len == 4 && read_i32_at(bytes, start, end).ok() == Some(-1) {
            return ("null".to_string(), None);
        }

        let hint = match len {
            4 | 8 => format!("scalar({len}b)"),
            _ => format!("composite({len}b)"),
        };
        (hint, None)
    }
}

fn read_i32_at(bytes: &[u8], pos: usize, limit: usize) -> Result<i32> {
    let end = pos + 4;
    if end > limit {
        return Err(ParcelError::Format(format!("Truncated value at offset {pos}")));
    }
    bytes
        .get(pos..end)
        .and_then(|b| b.try_into().ok())
        .map(i32::from_le_bytes)
        .ok_or_else(|| ParcelError::Format(format!("Truncated value at offset {pos}")))
}

fn read_str_at(bytes: &[u8], pos: usize, limit: usize) -> Option<&str> {
    let len = usize::try_from(read_i32_at(bytes, pos, limit).ok()?).ok()?;
    let start = pos + 4;
    if len == 0 || start + len > limit {
        return None;
    }
    std::str::from_utf8(bytes.get(start..start + len)?).ok()
}

impl fmt::Display for DebugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== VPARCEL INSPECTOR REPORT ===")?;
        if let Some(version) = self.format_version {
            writeln!(f, "Format Version: {version}")?;
        }
        writeln!(f, "Payload Size:   {}", self.payload_size)?;
        writeln!(f, "\n[FIELD LAYOUT]")?;
        self.root.fmt_recursive(f, "")
    }
}

impl ScopeInfo {
    fn fmt_recursive(&self, f: &mut fmt::Formatter<'_>, prefix: &str) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            let is_last = i + 1 == self.fields.len() && self.terminated;
            let connector = if is_last { "└── " } else { "├── " };
            writeln!(
                f,
                "{prefix}{connector}#{} [{}] Size: {}b",
                field.id, field.hint, field.payload_size
            )?;
            if let Some(nested) = &field.nested {
                let child_prefix = if is_last { "    " } else { "│   " };
                nested.fmt_recursive(f, &format!("{prefix}{child_prefix}"))?;
            }
        }
        if self.terminated {
            Ok(())
        } else {
            writeln!(f, "{prefix}└── (end of stream)")
        }
    }
}
