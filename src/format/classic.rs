//! Classic format codec (component F): magic `"BSDIFF40"`, three
//! bzip2-compressed sub-streams (control, diff, extra), size-prefixed
//! header. This is the layout `bsdiff-android`'s `bsdf2.rs`/`bsdf2_writer.rs`
//! already speak for the all-bzip2 case; generalised here into the
//! `PatchEncoder`/`PatchDecoder` capability set shared with [`super::endsley`].

use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression;

use crate::error::{BsdiffError, Result};
use crate::format::{bz_decompress, short_read, ControlRecord};
use crate::intcodec::{read_int, write_int};

pub const MAGIC: &[u8; 8] = b"BSDIFF40";
const HEADER_LEN: usize = 32;

fn compression(low_mem: bool) -> Compression {
    if low_mem {
        Compression::new(1)
    } else {
        Compression::best()
    }
}

/// Buffers the three raw sub-streams in memory and compresses them only at
/// [`ClassicEncoder::write_finish`], when their final sizes are needed for
/// the header. Mirrors `Bsdf2Writer` in the teacher crate.
pub struct ClassicEncoder<W: Write> {
    sink: W,
    low_mem: bool,
    new_size: u64,
    ctrl: Vec<u8>,
    diff: Vec<u8>,
    extra: Vec<u8>,
}

impl<W: Write> ClassicEncoder<W> {
    pub fn new(sink: W, low_mem: bool) -> Self {
        ClassicEncoder {
            sink,
            low_mem,
            new_size: 0,
            ctrl: Vec::new(),
            diff: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn write_start(&mut self, new_size: u64) -> Result<()> {
        self.new_size = new_size;
        Ok(())
    }

    pub fn encode_control(&mut self, record: ControlRecord) -> Result<()> {
        let mut buf = [0u8; 24];
        write_int(record.diff_size, &mut buf[0..8]);
        write_int(record.copy_size, &mut buf[8..16]);
        write_int(record.skip_size, &mut buf[16..24]);
        self.ctrl.extend_from_slice(&buf);
        Ok(())
    }

    pub fn encode_diff(&mut self, bytes: &[u8]) -> Result<()> {
        self.diff.extend_from_slice(bytes);
        Ok(())
    }

    pub fn encode_data(&mut self, bytes: &[u8]) -> Result<()> {
        self.extra.extend_from_slice(bytes);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn write_finish(mut self) -> Result<W> {
        let level = compression(self.low_mem);
        let ctrl = bz_compress(&self.ctrl, level)?;
        let diff = bz_compress(&self.diff, level)?;
        let extra = bz_compress(&self.extra, level)?;

        let mut header = [0u8; HEADER_LEN];
        header[0..8].copy_from_slice(MAGIC);
        write_int(ctrl.len() as i64, &mut header[8..16]);
        write_int(diff.len() as i64, &mut header[16..24]);
        write_int(self.new_size as i64, &mut header[24..32]);

        self.sink.write_all(&header)?;
        self.sink.write_all(&ctrl)?;
        self.sink.write_all(&diff)?;
        self.sink.write_all(&extra)?;
        tracing::debug!(
            ctrl_len = ctrl.len(),
            diff_len = diff.len(),
            extra_len = extra.len(),
            "wrote classic patch"
        );
        Ok(self.sink)
    }
}

fn bz_compress(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::new(), level);
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompresses all three sub-streams at construction time: `old`/`new` are
/// already whole-buffer (spec.md's Non-goals exclude streaming diff
/// generation), so there is nothing to gain from deferring decompression of
/// the much smaller control/diff/extra streams.
pub struct ClassicDecoder<'p> {
    new_size: u64,
    ctrl: Vec<u8>,
    diff: Vec<u8>,
    extra: Vec<u8>,
    ctrl_pos: usize,
    diff_pos: usize,
    extra_pos: usize,
    _patch: std::marker::PhantomData<&'p [u8]>,
}

impl<'p> ClassicDecoder<'p> {
    /// `low_mem` selects the bzip2 decompressor's small-memory mode
    /// (`BSDIFF_LOWMEM`, spec.md §6) for all three sub-streams.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(patch_bytes: &'p [u8], low_mem: bool) -> Result<Self> {
        if patch_bytes.len() < HEADER_LEN || &patch_bytes[0..8] != MAGIC {
            return Err(BsdiffError::corrupt_patch("bad classic header"));
        }
        let ctrl_len = read_int(patch_bytes[8..16].try_into().unwrap());
        let diff_len = read_int(patch_bytes[16..24].try_into().unwrap());
        let new_size = read_int(patch_bytes[24..32].try_into().unwrap());
        if ctrl_len < 0 || diff_len < 0 || new_size < 0 {
            return Err(BsdiffError::corrupt_patch("negative length in header"));
        }
        let (ctrl_len, diff_len) = (ctrl_len as usize, diff_len as usize);

        let ctrl_start = HEADER_LEN;
        let diff_start = ctrl_start
            .checked_add(ctrl_len)
            .ok_or_else(|| BsdiffError::corrupt_patch("control length overflow"))?;
        let extra_start = diff_start
            .checked_add(diff_len)
            .ok_or_else(|| BsdiffError::corrupt_patch("diff length overflow"))?;
        if extra_start > patch_bytes.len() {
            return Err(BsdiffError::corrupt_patch(
                "sub-stream lengths exceed patch size",
            ));
        }

        let ctrl = bz_decompress(&patch_bytes[ctrl_start..diff_start], low_mem)?;
        let diff = bz_decompress(&patch_bytes[diff_start..extra_start], low_mem)?;
        let extra = bz_decompress(&patch_bytes[extra_start..], low_mem)?;

        if ctrl.len() % 24 != 0 {
            return Err(BsdiffError::corrupt_patch(
                "control stream length is not a multiple of 24",
            ));
        }

        Ok(ClassicDecoder {
            new_size: new_size as u64,
            ctrl,
            diff,
            extra,
            ctrl_pos: 0,
            diff_pos: 0,
            extra_pos: 0,
            _patch: std::marker::PhantomData,
        })
    }

    pub fn expected_new_size(&self) -> Option<u64> {
        Some(self.new_size)
    }

    pub fn decode_control(&mut self) -> Result<Option<ControlRecord>> {
        if self.ctrl_pos == self.ctrl.len() {
            return Ok(None);
        }
        if self.ctrl_pos + 24 > self.ctrl.len() {
            return Err(short_read("control"));
        }
        let chunk = &self.ctrl[self.ctrl_pos..self.ctrl_pos + 24];
        let diff_size = read_int(chunk[0..8].try_into().unwrap());
        let copy_size = read_int(chunk[8..16].try_into().unwrap());
        let skip_size = read_int(chunk[16..24].try_into().unwrap());
        self.ctrl_pos += 24;
        Ok(Some(ControlRecord {
            diff_size,
            copy_size,
            skip_size,
        }))
    }

    pub fn decode_diff(&mut self, len: usize) -> Result<Vec<u8>> {
        take(&self.diff, &mut self.diff_pos, len, "diff")
    }

    pub fn decode_data(&mut self, len: usize) -> Result<Vec<u8>> {
        take(&self.extra, &mut self.extra_pos, len, "extra")
    }
}

fn take(buf: &[u8], pos: &mut usize, len: usize, what: &str) -> Result<Vec<u8>> {
    let end = pos
        .checked_add(len)
        .ok_or_else(|| short_read(what))?;
    if end > buf.len() {
        return Err(short_read(what));
    }
    let out = buf[*pos..end].to_vec();
    *pos = end;
    Ok(out)
}
