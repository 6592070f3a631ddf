//! Endsley format codec (component G): magic `"ENDSLEY/BSDIFF43"`, a single
//! bzip2-compressed stream holding interleaved `(control, diff, extra)`
//! records back to back, terminated by stream EOF rather than a count.
//!
//! Modeled on `ddelta`'s single-stream interleaved record layout (see
//! `djugei-ddelta-rs/src/diff.rs`): ddelta loops until a structurally empty
//! terminator record or EOF, uncompressed; Endsley instead compresses the
//! whole interleaved stream as one bzip2 block and relies on stream EOF
//! alone, per spec.md §4.G. The "loop reading records until nothing more
//! is left" control flow is the part being reused, not ddelta's framing.

use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression;

use crate::error::{BsdiffError, Result};
use crate::format::{bz_decompress, short_read, ControlRecord};
use crate::intcodec::{read_int, write_int};

pub const MAGIC: &[u8; 16] = b"ENDSLEY/BSDIFF43";
const HEADER_LEN: usize = 24;

fn compression(low_mem: bool) -> Compression {
    if low_mem {
        Compression::new(1)
    } else {
        Compression::best()
    }
}

/// Writes the header eagerly at `write_start` (it needs `new_size`, known
/// only then), then streams every subsequent record straight into a single
/// `BzEncoder` wrapping the sink.
pub struct EndsleyEncoder<W: Write> {
    sink: Option<W>,
    encoder: Option<BzEncoder<W>>,
    low_mem: bool,
}

impl<W: Write> EndsleyEncoder<W> {
    pub fn new(sink: W, low_mem: bool) -> Self {
        EndsleyEncoder {
            sink: Some(sink),
            encoder: None,
            low_mem,
        }
    }

    pub fn write_start(&mut self, new_size: u64) -> Result<()> {
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| BsdiffError::corrupt_patch("write_start called twice"))?;
        let mut header = [0u8; HEADER_LEN];
        header[0..16].copy_from_slice(MAGIC);
        write_int(new_size as i64, &mut header[16..24]);
        sink.write_all(&header)?;
        self.encoder = Some(BzEncoder::new(sink, compression(self.low_mem)));
        Ok(())
    }

    fn stream(&mut self) -> Result<&mut BzEncoder<W>> {
        self.encoder
            .as_mut()
            .ok_or_else(|| BsdiffError::corrupt_patch("write_start not called"))
    }

    pub fn encode_control(&mut self, record: ControlRecord) -> Result<()> {
        let mut buf = [0u8; 24];
        write_int(record.diff_size, &mut buf[0..8]);
        write_int(record.copy_size, &mut buf[8..16]);
        write_int(record.skip_size, &mut buf[16..24]);
        self.stream()?.write_all(&buf)?;
        Ok(())
    }

    pub fn encode_diff(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream()?.write_all(bytes)?;
        Ok(())
    }

    pub fn encode_data(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream()?.write_all(bytes)?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn write_finish(mut self) -> Result<W> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| BsdiffError::corrupt_patch("write_start not called"))?;
        let sink = encoder.finish()?;
        tracing::debug!("wrote endsley patch");
        Ok(sink)
    }
}

/// Decompresses the single interleaved stream into memory at construction;
/// `decode_control`/`decode_diff`/`decode_data` then walk one shared cursor
/// over it.
pub struct EndsleyDecoder<'p> {
    new_size: u64,
    body: Vec<u8>,
    pos: usize,
    _patch: std::marker::PhantomData<&'p [u8]>,
}

impl<'p> EndsleyDecoder<'p> {
    /// `low_mem` selects the bzip2 decompressor's small-memory mode
    /// (`BSDIFF_LOWMEM`, spec.md §6) for the single interleaved stream.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(patch_bytes: &'p [u8], low_mem: bool) -> Result<Self> {
        if patch_bytes.len() < HEADER_LEN || &patch_bytes[0..16] != MAGIC {
            return Err(BsdiffError::corrupt_patch("bad endsley header"));
        }
        let new_size = read_int(patch_bytes[16..24].try_into().unwrap());
        if new_size < 0 {
            return Err(BsdiffError::corrupt_patch("negative new_size in header"));
        }

        let body = bz_decompress(&patch_bytes[HEADER_LEN..], low_mem)?;

        Ok(EndsleyDecoder {
            new_size: new_size as u64,
            body,
            pos: 0,
            _patch: std::marker::PhantomData,
        })
    }

    pub fn expected_new_size(&self) -> Option<u64> {
        Some(self.new_size)
    }

    pub fn decode_control(&mut self) -> Result<Option<ControlRecord>> {
        if self.pos == self.body.len() {
            return Ok(None);
        }
        if self.pos + 24 > self.body.len() {
            return Err(short_read("control (mid-record EOF)"));
        }
        let chunk = &self.body[self.pos..self.pos + 24];
        let diff_size = read_int(chunk[0..8].try_into().unwrap());
        let copy_size = read_int(chunk[8..16].try_into().unwrap());
        let skip_size = read_int(chunk[16..24].try_into().unwrap());
        self.pos += 24;
        Ok(Some(ControlRecord {
            diff_size,
            copy_size,
            skip_size,
        }))
    }

    pub fn decode_diff(&mut self, len: usize) -> Result<Vec<u8>> {
        self.take(len, "diff")
    }

    pub fn decode_data(&mut self, len: usize) -> Result<Vec<u8>> {
        self.take(len, "extra")
    }

    fn take(&mut self, len: usize, what: &str) -> Result<Vec<u8>> {
        let end = self.pos.checked_add(len).ok_or_else(|| short_read(what))?;
        if end > self.body.len() {
            return Err(short_read(what));
        }
        let out = self.body[self.pos..end].to_vec();
        self.pos = end;
        Ok(out)
    }
}
