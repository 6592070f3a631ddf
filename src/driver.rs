//! High-level driver (component J): the three command-style operations of
//! spec.md §6 (`bsdiff`, `bspatch`, `bsindex`), wiring the lower-level
//! components together over either file paths or already-open streams.
//!
//! CLI argument parsing is out of scope (spec.md §1's explicit Non-goal);
//! this module exposes only the library-level operations a CLI would wrap.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{BsdiffError, Result};
use crate::format::{Format, PatchDecoder, PatchEncoder};
use crate::index;
use crate::suffixarray::SuffixArray;
use crate::{applier, diffgen};

/// Where an `old`/`new`/patch/index input comes from. Replaces the source's
/// `path | stream` union parameter per the REDESIGN FLAGS note: the core
/// components never see this type, only byte buffers or byte streams.
pub enum InputSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
    Stream(Box<dyn Read + 'a>),
}

impl<'a> InputSource<'a> {
    fn load(self) -> Result<Vec<u8>> {
        match self {
            InputSource::Path(path) => Ok(std::fs::read(path)?),
            InputSource::Bytes(bytes) => Ok(bytes.to_vec()),
            InputSource::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

/// Where an output byte sequence is written. A `None` path defaults to a
/// freshly-created temporary file whose path is returned to the caller.
pub enum OutputSink<'a> {
    Path(&'a Path),
    Temp,
    Stream(Box<dyn Write + 'a>),
}

/// The outcome of an operation that writes to a path-backed destination:
/// either the caller's own path, or a freshly-created temporary file.
pub enum Written {
    Path(PathBuf),
    Stream,
}

fn write_to_path(path: &Path, bytes: &[u8]) -> Result<()> {
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(bytes)?;
        file.flush()
    })();
    if let Err(e) = result {
        let _ = std::fs::remove_file(path);
        return Err(BsdiffError::Io(e));
    }
    Ok(())
}

fn write_output(sink: OutputSink<'_>, bytes: &[u8], suffix: &str) -> Result<Written> {
    match sink {
        OutputSink::Path(path) => {
            write_to_path(path, bytes)?;
            Ok(Written::Path(path.to_path_buf()))
        }
        OutputSink::Temp => {
            let file = tempfile::Builder::new()
                .suffix(suffix)
                .tempfile()
                .map_err(BsdiffError::Io)?;
            let (mut handle, path) = file.keep().map_err(|e| BsdiffError::Io(e.error))?;
            if let Err(e) = handle.write_all(bytes).and_then(|_| handle.flush()) {
                let _ = std::fs::remove_file(&path);
                return Err(BsdiffError::Io(e));
            }
            Ok(Written::Path(path))
        }
        OutputSink::Stream(mut writer) => {
            writer.write_all(bytes)?;
            writer.flush()?;
            Ok(Written::Stream)
        }
    }
}

/// Produce a patch transforming `old` into `new`, writing it to `patch`.
/// `precomputed_index`, if given, is reused instead of rebuilding the
/// suffix array from `old`.
pub fn bsdiff(
    old: InputSource<'_>,
    new: InputSource<'_>,
    patch: OutputSink<'_>,
    format: Format,
    config: Config,
    precomputed_index: Option<InputSource<'_>>,
) -> Result<Written> {
    let old = old.load()?;
    let new = new.load()?;

    let sa = match precomputed_index {
        Some(src) => {
            let bytes = src.load()?;
            index::read_index(&bytes, old.len())?
        }
        None => SuffixArray::build(&old),
    };

    let encoder = PatchEncoder::new(format, Vec::new(), config.low_mem);
    let bytes = diffgen::generate(&old, &new, &sa, encoder)?;
    write_output(patch, &bytes, ".patch")
}

/// Apply `patch` to `old`, reconstructing `new`. `format = None` auto-detects
/// from the patch magic; `Some(format)` requires an exact match. `config`'s
/// `low_mem` selects the bzip2 decompressor's small-memory mode, mirroring
/// the block-size choice `bsdiff` already makes from the same flag on encode.
pub fn bspatch(
    old: InputSource<'_>,
    patch: InputSource<'_>,
    new: OutputSink<'_>,
    format: Option<Format>,
    config: Config,
) -> Result<Written> {
    let old = old.load()?;
    let patch_bytes = patch.load()?;

    let detected = crate::format::registry::detect_expecting(&patch_bytes, format)?;
    let mut decoder = PatchDecoder::new(detected, &patch_bytes, config.low_mem)?;
    let bytes = applier::apply(&old, &mut decoder)?;
    write_output(new, &bytes, ".new")
}

/// Precompute and serialise the suffix array of `old`.
pub fn bsindex(old: InputSource<'_>, index_out: OutputSink<'_>) -> Result<Written> {
    let old = old.load()?;
    let sa = SuffixArray::build(&old);
    let bytes = index::write_index(&sa, old.len());
    write_output(index_out, &bytes, ".idx")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bsdiff_then_bspatch_round_trips_through_paths() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("old.bin");
        let new_path = dir.path().join("new.bin");
        std::fs::write(&old_path, b"The quick brown fox").unwrap();
        std::fs::write(&new_path, b"The slow brown foxes").unwrap();

        let patch_path = dir.path().join("out.patch");
        let written = bsdiff(
            InputSource::Path(&old_path),
            InputSource::Path(&new_path),
            OutputSink::Path(&patch_path),
            Format::Classic,
            Config::default(),
            None,
        )
        .unwrap();
        assert!(matches!(written, Written::Path(p) if p == patch_path));

        let reconstructed_path = dir.path().join("reconstructed.bin");
        bspatch(
            InputSource::Path(&old_path),
            InputSource::Path(&patch_path),
            OutputSink::Path(&reconstructed_path),
            None,
            Config::default(),
        )
        .unwrap();

        let reconstructed = std::fs::read(&reconstructed_path).unwrap();
        assert_eq!(reconstructed, b"The slow brown foxes");
    }

    #[test]
    fn bsdiff_defaults_to_a_temp_file_when_no_path_given() {
        let written = bsdiff(
            InputSource::Bytes(b"abc"),
            InputSource::Bytes(b"abd"),
            OutputSink::Temp,
            Format::Endsley,
            Config::default(),
            None,
        )
        .unwrap();
        match written {
            Written::Path(path) => {
                assert!(path.exists());
                std::fs::remove_file(path).unwrap();
            }
            Written::Stream => panic!("expected a temp file path"),
        }
    }

    #[test]
    fn bspatch_accepts_a_low_mem_patch_with_low_mem_config() {
        let old = b"The quick brown fox jumps over the lazy dog.".to_vec();
        let new = b"The slow brown fox leaps over the lazy dog!!".to_vec();
        let low_mem = Config { low_mem: true };

        let patch_written = bsdiff(
            InputSource::Bytes(&old),
            InputSource::Bytes(&new),
            OutputSink::Temp,
            Format::Classic,
            low_mem,
            None,
        )
        .unwrap();
        let patch_path = match patch_written {
            Written::Path(p) => p,
            Written::Stream => panic!("expected a temp file path"),
        };

        let new_written = bspatch(
            InputSource::Bytes(&old),
            InputSource::Path(&patch_path),
            OutputSink::Temp,
            Some(Format::Classic),
            low_mem,
        )
        .unwrap();
        let new_path = match new_written {
            Written::Path(p) => p,
            Written::Stream => panic!("expected a temp file path"),
        };

        assert_eq!(std::fs::read(&new_path).unwrap(), new);
        std::fs::remove_file(patch_path).unwrap();
        std::fs::remove_file(new_path).unwrap();
    }

    #[test]
    fn bsindex_round_trips_through_bsdiff_precomputed_index() {
        let old = b"abracadabra the quick brown fox".to_vec();
        let idx_written = bsindex(InputSource::Bytes(&old), OutputSink::Temp).unwrap();
        let idx_path = match idx_written {
            Written::Path(p) => p,
            Written::Stream => panic!("expected a temp file path"),
        };

        let written = bsdiff(
            InputSource::Bytes(&old),
            InputSource::Bytes(b"abracadabra the slow brown fox"),
            OutputSink::Temp,
            Format::Classic,
            Config::default(),
            Some(InputSource::Path(&idx_path)),
        )
        .unwrap();

        let patch_path = match written {
            Written::Path(p) => p,
            Written::Stream => panic!("expected a temp file path"),
        };
        let bytes = std::fs::read(&patch_path).unwrap();
        let mut decoder = PatchDecoder::new(Format::Classic, &bytes, false).unwrap();
        let out = applier::apply(&old, &mut decoder).unwrap();
        assert_eq!(out, b"abracadabra the slow brown fox");

        std::fs::remove_file(idx_path).unwrap();
        std::fs::remove_file(patch_path).unwrap();
    }

    #[test]
    fn bsdiff_rejects_index_built_for_a_different_old() {
        let idx_written = bsindex(InputSource::Bytes(b"short"), OutputSink::Temp).unwrap();
        let idx_path = match idx_written {
            Written::Path(p) => p,
            Written::Stream => panic!("expected a temp file path"),
        };

        let result = bsdiff(
            InputSource::Bytes(b"a much longer old buffer entirely"),
            InputSource::Bytes(b"a much longer new buffer entirely"),
            OutputSink::Temp,
            Format::Classic,
            Config::default(),
            Some(InputSource::Path(&idx_path)),
        );
        assert!(result.is_err());
        std::fs::remove_file(idx_path).unwrap();
    }
}
