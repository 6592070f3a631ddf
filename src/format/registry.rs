//! Format registry (component H).
//!
//! The source registers formats into a process-wide mutable map at startup;
//! the REDESIGN FLAGS call for a compile-time constant table instead, so
//! detection never depends on registration order or run-before-use
//! initialisation. `FORMATS` is ordered longest-magic-first so detection
//! never looks past the longest registered magic.

use crate::error::{BsdiffError, Result};

/// The two patch formats this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Classic,
    Endsley,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Classic => "classic",
            Format::Endsley => "endsley",
        }
    }
}

struct FormatEntry {
    magic: &'static [u8],
    format: Format,
}

/// Longest magic first: `ENDSLEY/BSDIFF43` (16 bytes) before `BSDIFF40`
/// (8 bytes). A patch stream that happens to start with `BSDIFF40` cannot
/// also start with the longer Endsley magic, so ordering only matters for
/// the "consumes no more than the longest magic" guarantee in spec.md §8.
const FORMATS: &[FormatEntry] = &[
    FormatEntry {
        magic: b"ENDSLEY/BSDIFF43",
        format: Format::Endsley,
    },
    FormatEntry {
        magic: b"BSDIFF40",
        format: Format::Classic,
    },
];

/// Longest magic among all registered formats; detection never needs more
/// than this many leading bytes of the patch stream.
pub const MAX_MAGIC_LEN: usize = 16;

/// Identify the format of `patch_bytes` from its magic prefix.
pub fn detect(patch_bytes: &[u8]) -> Result<Format> {
    for entry in FORMATS {
        if patch_bytes.starts_with(entry.magic) {
            return Ok(entry.format);
        }
    }
    Err(BsdiffError::UnknownFormat)
}

/// Identify the format and, if the caller requested a specific one, verify
/// it matches.
pub fn detect_expecting(patch_bytes: &[u8], requested: Option<Format>) -> Result<Format> {
    let detected = detect(patch_bytes)?;
    if let Some(requested) = requested {
        if requested != detected {
            return Err(BsdiffError::FormatMismatch {
                requested: requested.name(),
                actual: detected.name(),
            });
        }
    }
    Ok(detected)
}
