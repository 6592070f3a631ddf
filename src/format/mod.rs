//! Patch formats (components F, G, H).
//!
//! Two on-disk patch formats share one capability set — `write_start`,
//! `encode_control`, `encode_diff`, `encode_data`, `write_finish` on the
//! encode side; `read_start`, `decode_control`, `decode_diff`, `decode_data`
//! on the decode side — but differ in how sub-streams are laid out:
//! [`classic`] buffers three independently bzip2-compressed streams behind a
//! size-prefixed header, while [`endsley`] interleaves records into a single
//! bzip2 stream. [`registry`] maps magic bytes to one of the two.
//!
//! This is the tagged-variant re-architecture called for by the REDESIGN
//! FLAGS item on the source's runtime-dispatched `Patch` subtypes: `Format`
//! is a plain enum, and [`PatchEncoder`]/[`PatchDecoder`] dispatch by
//! `match` rather than virtual call.

pub mod classic;
pub mod endsley;
pub mod registry;

use std::io::Write;

use crate::error::{BsdiffError, Result};

pub use registry::{detect, Format};

/// One control triple, as defined in spec.md §3: `diff_size` bytes are
/// produced by byte-adding onto `old`, `copy_size` bytes are copied
/// verbatim, and `skip_size` advances (or rewinds) the old-cursor before
/// the next record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRecord {
    pub diff_size: i64,
    pub copy_size: i64,
    pub skip_size: i64,
}

/// Encoder side of a patch object, parameterised over the format.
///
/// Construct with [`PatchEncoder::new`], call `write_start` once with the
/// known final size of `new`, then `encode_control`/`encode_diff`/
/// `encode_data` once per record in the order the diff generator produces
/// them, and finally `write_finish` to flush and recover the sink. Skipping
/// `write_finish` loses any buffered-but-uncompressed data in the classic
/// format (see spec.md §9's Open Question) — callers should always use the
/// returned sink, never a clone taken before `write_finish`.
pub enum PatchEncoder<W: Write> {
    Classic(classic::ClassicEncoder<W>),
    Endsley(endsley::EndsleyEncoder<W>),
}

impl<W: Write> PatchEncoder<W> {
    pub fn new(format: Format, sink: W, low_mem: bool) -> Self {
        match format {
            Format::Classic => PatchEncoder::Classic(classic::ClassicEncoder::new(sink, low_mem)),
            Format::Endsley => PatchEncoder::Endsley(endsley::EndsleyEncoder::new(sink, low_mem)),
        }
    }

    pub fn write_start(&mut self, new_size: u64) -> Result<()> {
        match self {
            PatchEncoder::Classic(e) => e.write_start(new_size),
            PatchEncoder::Endsley(e) => e.write_start(new_size),
        }
    }

    pub fn encode_control(&mut self, record: ControlRecord) -> Result<()> {
        match self {
            PatchEncoder::Classic(e) => e.encode_control(record),
            PatchEncoder::Endsley(e) => e.encode_control(record),
        }
    }

    pub fn encode_diff(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            PatchEncoder::Classic(e) => e.encode_diff(bytes),
            PatchEncoder::Endsley(e) => e.encode_diff(bytes),
        }
    }

    pub fn encode_data(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            PatchEncoder::Classic(e) => e.encode_data(bytes),
            PatchEncoder::Endsley(e) => e.encode_data(bytes),
        }
    }

    /// Flush all buffered state and return the underlying sink. Consumes
    /// the encoder so a caller cannot keep writing (or forget to finish).
    pub fn write_finish(self) -> Result<W> {
        match self {
            PatchEncoder::Classic(e) => e.write_finish(),
            PatchEncoder::Endsley(e) => e.write_finish(),
        }
    }
}

/// Decoder side of a patch object, borrowing the patch bytes for its
/// lifetime. Both variants decompress eagerly at construction (`old`/`new`
/// are already whole-buffer per spec.md's Non-goals, so there is no benefit
/// to lazily streaming the much smaller control/diff/extra sub-streams).
pub enum PatchDecoder<'p> {
    Classic(classic::ClassicDecoder<'p>),
    Endsley(endsley::EndsleyDecoder<'p>),
}

impl<'p> PatchDecoder<'p> {
    /// `low_mem` selects the bzip2 decompressor's small-memory mode
    /// (`BSDIFF_LOWMEM`, spec.md §6), mirroring how the same flag already
    /// picks the encoder's block size.
    pub fn new(format: Format, patch_bytes: &'p [u8], low_mem: bool) -> Result<Self> {
        match format {
            Format::Classic => Ok(PatchDecoder::Classic(classic::ClassicDecoder::new(
                patch_bytes,
                low_mem,
            )?)),
            Format::Endsley => Ok(PatchDecoder::Endsley(endsley::EndsleyDecoder::new(
                patch_bytes,
                low_mem,
            )?)),
        }
    }

    /// The final size of `new`, if the format records it up front.
    /// Endsley always knows it (it's in the header); classic also records
    /// it in the header, so both return `Some` here — the REDESIGN FLAGS
    /// `expected_new_size` seam exists for a hypothetical third format that
    /// doesn't.
    pub fn expected_new_size(&self) -> Option<u64> {
        match self {
            PatchDecoder::Classic(d) => d.expected_new_size(),
            PatchDecoder::Endsley(d) => d.expected_new_size(),
        }
    }

    /// Decode the next control record, or `None` at a clean end of stream.
    pub fn decode_control(&mut self) -> Result<Option<ControlRecord>> {
        match self {
            PatchDecoder::Classic(d) => d.decode_control(),
            PatchDecoder::Endsley(d) => d.decode_control(),
        }
    }

    pub fn decode_diff(&mut self, len: usize) -> Result<Vec<u8>> {
        match self {
            PatchDecoder::Classic(d) => d.decode_diff(len),
            PatchDecoder::Endsley(d) => d.decode_diff(len),
        }
    }

    pub fn decode_data(&mut self, len: usize) -> Result<Vec<u8>> {
        match self {
            PatchDecoder::Classic(d) => d.decode_data(len),
            PatchDecoder::Endsley(d) => d.decode_data(len),
        }
    }
}

pub(crate) fn short_read(what: &str) -> BsdiffError {
    BsdiffError::corrupt_patch(format!("truncated {what} stream"))
}

/// Decompress a whole bzip2 block with the low-level `Decompress` state
/// machine rather than the `read::BzDecoder` adaptor, so `small` (the
/// decoder half of `BSDIFF_LOWMEM`, spec.md §6) can be threaded through.
/// Shared by both format codecs' decoders.
pub(crate) fn bz_decompress(data: &[u8], small: bool) -> Result<Vec<u8>> {
    use bzip2::{Decompress, Status};

    let mut decompress = Decompress::new(small);
    let mut out = Vec::with_capacity(data.len().saturating_mul(3).max(1024));
    let mut input = data;

    loop {
        let before_in = decompress.total_in();
        let before_out = out.len();
        out.reserve(8192);
        let status = decompress
            .decompress_vec(input, &mut out)
            .map_err(|e| BsdiffError::corrupt_patch(format!("bzip2 decompress error: {e}")))?;
        let consumed = (decompress.total_in() - before_in) as usize;
        input = &input[consumed..];
        match status {
            Status::StreamEnd => break,
            _ if consumed == 0 && out.len() == before_out => {
                return Err(BsdiffError::corrupt_patch("truncated bzip2 stream"));
            }
            _ => {}
        }
    }

    Ok(out)
}
