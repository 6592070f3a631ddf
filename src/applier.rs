/*-
 * Copyright 2003-2005 Colin Percival
 * Copyright 2012 Matthew Endsley
 * Modified 2017 Pieter-Jan Briers
 * All rights reserved
 *
 * Redistribution and use in source and binary forms, with or without
 * modification, are permitted providing that the following conditions
 * are met:
 * 1. Redistributions of source code must retain the above copyright
 *    notice, this list of conditions and the following disclaimer.
 * 2. Redistributions in binary form must reproduce the above copyright
 *    notice, this list of conditions and the following disclaimer in the
 *    documentation and/or other materials provided with the distribution.
 *
 * THIS SOFTWARE IS PROVIDED BY THE AUTHOR ``AS IS'' AND ANY EXPRESS OR
 * IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE IMPLIED
 * WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE
 * ARE DISCLAIMED.  IN NO EVENT SHALL THE AUTHOR BE LIABLE FOR ANY
 * DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
 * DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS
 * OR SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION)
 * HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT,
 * STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING
 * IN ANY WAY OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE
 * POSSIBILITY OF SUCH DAMAGE.
 */

//! Patch applier (component E). Walks a [`PatchDecoder`] one control record
//! at a time: `diff_size` bytes are read and byte-added onto the current
//! `old` cursor, `copy_size` bytes are taken verbatim, then the cursor is
//! advanced by `skip_size`.

use crate::error::{BsdiffError, Result};
use crate::format::PatchDecoder;

/// Apply `decoder`'s records against `old`, returning the reconstructed
/// `new` buffer.
#[tracing::instrument(level = "debug", skip_all, fields(old_len = old.len()))]
pub fn apply(old: &[u8], decoder: &mut PatchDecoder<'_>) -> Result<Vec<u8>> {
    let mut new = match decoder.expected_new_size() {
        Some(size) => Vec::with_capacity(size as usize),
        None => Vec::new(),
    };
    let mut oldpos: i64 = 0;

    while let Some(record) = decoder.decode_control()? {
        if record.diff_size < 0 || record.copy_size < 0 {
            return Err(BsdiffError::corrupt_patch(format!(
                "negative length: diff={}, copy={}",
                record.diff_size, record.copy_size
            )));
        }
        let diff_len = record.diff_size as usize;
        let copy_len = record.copy_size as usize;

        if let Some(expected) = decoder.expected_new_size() {
            let total = new
                .len()
                .checked_add(diff_len)
                .and_then(|n| n.checked_add(copy_len));
            if total.map_or(true, |total| total as u64 > expected) {
                return Err(BsdiffError::corrupt_patch(
                    "control record would exceed new_size",
                ));
            }
        }

        let diff_bytes = decoder.decode_diff(diff_len)?;
        let old_start = usize::try_from(oldpos)
            .map_err(|_| BsdiffError::corrupt_patch("negative old cursor"))?;
        let old_end = old_start
            .checked_add(diff_len)
            .ok_or_else(|| BsdiffError::corrupt_patch("diff range overflow"))?;
        let old_slice = old
            .get(old_start..old_end)
            .ok_or_else(|| BsdiffError::corrupt_patch("diff range exceeds old file"))?;

        new.reserve(diff_len + copy_len);
        for (d, o) in diff_bytes.iter().zip(old_slice.iter()) {
            new.push(d.wrapping_add(*o));
        }

        let extra = decoder.decode_data(copy_len)?;
        new.extend_from_slice(&extra);

        oldpos = old_start as i64 + diff_len as i64;
        oldpos = oldpos
            .checked_add(record.skip_size)
            .ok_or_else(|| BsdiffError::corrupt_patch("seek overflow"))?;
        if oldpos < 0 {
            return Err(BsdiffError::corrupt_patch("seek underflow"));
        }
    }

    if let Some(expected) = decoder.expected_new_size() {
        if new.len() as u64 != expected {
            return Err(BsdiffError::corrupt_patch(format!(
                "new file size mismatch: header says {expected}, produced {}",
                new.len()
            )));
        }
    }

    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ControlRecord, Format, PatchEncoder};

    fn build(format: Format, old: &[u8], new: &[u8]) -> Vec<u8> {
        let sa = crate::suffixarray::SuffixArray::build(old);
        let encoder = PatchEncoder::new(format, Vec::new(), false);
        crate::diffgen::generate(old, new, &sa, encoder).unwrap()
    }

    #[test]
    fn applies_generated_classic_patch() {
        let old = b"The quick brown fox jumps over the lazy dog.";
        let new = b"The slow brown fox leaps over the lazy dog!!";
        let bytes = build(Format::Classic, old, new);
        let mut decoder = PatchDecoder::new(Format::Classic, &bytes, false).unwrap();
        assert_eq!(apply(old, &mut decoder).unwrap(), new);
    }

    #[test]
    fn applies_generated_endsley_patch() {
        let old = b"The quick brown fox jumps over the lazy dog.";
        let new = b"The slow brown fox leaps over the lazy dog!!";
        let bytes = build(Format::Endsley, old, new);
        let mut decoder = PatchDecoder::new(Format::Endsley, &bytes, false).unwrap();
        assert_eq!(apply(old, &mut decoder).unwrap(), new);
    }

    #[test]
    fn rejects_a_record_that_would_exceed_new_size() {
        let mut encoder = PatchEncoder::new(Format::Classic, Vec::new(), false);
        encoder.write_start(2).unwrap();
        encoder
            .encode_control(ControlRecord {
                diff_size: 3,
                copy_size: 0,
                skip_size: 0,
            })
            .unwrap();
        encoder.encode_diff(&[1, 2, 3]).unwrap();
        let bytes = encoder.write_finish().unwrap();
        let mut decoder = PatchDecoder::new(Format::Classic, &bytes, false).unwrap();
        // `old` is long enough that the diff-range bounds check wouldn't
        // reject this on its own; only the new_size bound should.
        assert!(apply(b"abcdef", &mut decoder).is_err());
    }

    #[test]
    fn rejects_negative_control_lengths() {
        let mut encoder = PatchEncoder::new(Format::Classic, Vec::new(), false);
        encoder.write_start(0).unwrap();
        encoder
            .encode_control(ControlRecord {
                diff_size: -1,
                copy_size: 0,
                skip_size: 0,
            })
            .unwrap();
        let bytes = encoder.write_finish().unwrap();
        let mut decoder = PatchDecoder::new(Format::Classic, &bytes, false).unwrap();
        assert!(apply(b"", &mut decoder).is_err());
    }

    #[test]
    fn rejects_diff_range_past_old_end() {
        let mut encoder = PatchEncoder::new(Format::Classic, Vec::new(), false);
        encoder.write_start(4).unwrap();
        encoder
            .encode_control(ControlRecord {
                diff_size: 4,
                copy_size: 0,
                skip_size: 0,
            })
            .unwrap();
        encoder.encode_diff(&[1, 2, 3, 4]).unwrap();
        let bytes = encoder.write_finish().unwrap();
        let mut decoder = PatchDecoder::new(Format::Classic, &bytes, false).unwrap();
        assert!(apply(b"ab", &mut decoder).is_err());
    }

    #[test]
    fn rejects_new_size_mismatch() {
        let mut encoder = PatchEncoder::new(Format::Classic, Vec::new(), false);
        encoder.write_start(10).unwrap();
        let bytes = encoder.write_finish().unwrap();
        let mut decoder = PatchDecoder::new(Format::Classic, &bytes, false).unwrap();
        assert!(apply(b"", &mut decoder).is_err());
    }
}
