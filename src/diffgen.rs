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

//! Diff generator (component D) — the scan/extend/overlap-resolve loop that
//! is the heart of this crate. Walks `scan` across `new`, binary-searching
//! the suffix array of `old` through [`crate::search::longest_prefix_match`]
//! for the next candidate match, then extends the previous and current
//! matches toward each other (forward from the last emitted record,
//! backward from the candidate) and resolves any overlap by whichever side
//! has the better local match density. Each accepted record is pushed
//! through a [`PatchEncoder`] as it's produced rather than collected first.

use std::io::Write;

use crate::error::Result;
use crate::format::{ControlRecord, PatchEncoder};
use crate::search::longest_prefix_match;
use crate::suffixarray::SuffixArray;

/// Generate a patch transforming `old` into `new`, writing it through
/// `encoder`. Consumes the encoder and returns its underlying sink once
/// `write_finish` has committed every buffered sub-stream.
#[tracing::instrument(level = "debug", skip_all, fields(old_len = old.len(), new_len = new.len()))]
pub fn generate<W: Write>(
    old: &[u8],
    new: &[u8],
    sa: &SuffixArray,
    mut encoder: PatchEncoder<W>,
) -> Result<W> {
    encoder.write_start(new.len() as u64)?;

    let mut scan = 0usize;
    let mut pos = 0usize;
    let mut len = 0usize;
    let mut lastscan = 0usize;
    let mut lastpos = 0usize;
    let mut lastoffset = 0isize;
    let mut records = 0u64;

    while scan < new.len() {
        let mut oldscore = 0isize;
        scan += len;
        let mut scsc = scan;

        while scan < new.len() {
            let (p, l) = longest_prefix_match(sa, old, &new[scan..]);
            pos = p;
            len = l;

            while scsc < scan + len {
                let oi = scsc as isize + lastoffset;
                if oi >= 0 && (oi as usize) < old.len() && old[oi as usize] == new[scsc] {
                    oldscore += 1;
                }
                scsc += 1;
            }

            if (len as isize == oldscore && len != 0) || len as isize > oldscore + 8 {
                break;
            }

            let oi = scan as isize + lastoffset;
            if oi >= 0 && (oi as usize) < old.len() && old[oi as usize] == new[scan] {
                oldscore -= 1;
            }
            scan += 1;
        }

        if len as isize != oldscore || scan == new.len() {
            // Forward extension from (lastscan, lastpos): longest prefix
            // whose match density (2*matches - length) is maximal.
            let mut s = 0isize;
            let mut sf = 0isize;
            let mut lenf = 0usize;
            let mut i = 0usize;
            while lastscan + i < scan && lastpos + i < old.len() {
                if old[lastpos + i] == new[lastscan + i] {
                    s += 1;
                }
                i += 1;
                if s * 2 - i as isize > sf * 2 - lenf as isize {
                    sf = s;
                    lenf = i;
                }
            }

            // Backward extension from (scan, pos): symmetric.
            let mut lenb = 0usize;
            if scan < new.len() {
                let mut s = 0isize;
                let mut sb = 0isize;
                let mut i = 1usize;
                while scan >= lastscan + i && pos >= i {
                    if old[pos - i] == new[scan - i] {
                        s += 1;
                    }
                    if s * 2 - i as isize > sb * 2 - lenb as isize {
                        sb = s;
                        lenb = i;
                    }
                    i += 1;
                }
            }

            // Overlap resolution: if the forward region runs past where
            // the backward region starts, find the split inside the
            // overlap that attributes each byte to whichever side
            // actually matches it there.
            if lastscan + lenf > scan - lenb {
                let overlap = lastscan + lenf - (scan - lenb);
                let mut s = 0isize;
                let mut ss = 0isize;
                let mut lens = 0usize;
                for i in 0..overlap {
                    if new[lastscan + lenf - overlap + i] == old[lastpos + lenf - overlap + i] {
                        s += 1;
                    }
                    if new[scan - lenb + i] == old[pos - lenb + i] {
                        s -= 1;
                    }
                    if s > ss {
                        ss = s;
                        lens = i + 1;
                    }
                }
                lenf = lenf + lens - overlap;
                lenb -= lens;
            }

            let diff_size = lenf as i64;
            let copy_size = ((scan - lenb) - (lastscan + lenf)) as i64;
            let skip_size = (pos as i64 - lenb as i64) - (lastpos as i64 + lenf as i64);

            if diff_size != 0 || copy_size != 0 {
                encoder.encode_control(ControlRecord {
                    diff_size,
                    copy_size,
                    skip_size,
                })?;

                let mut diff_bytes = Vec::with_capacity(lenf);
                for k in 0..lenf {
                    diff_bytes.push(new[lastscan + k].wrapping_sub(old[lastpos + k]));
                }
                encoder.encode_diff(&diff_bytes)?;
                encoder.encode_data(&new[lastscan + lenf..scan - lenb])?;
                records += 1;
            }

            lastscan = scan - lenb;
            lastpos = pos - lenb;
            lastoffset = pos as isize - scan as isize;
        }
    }

    tracing::debug!(records, "diff generation complete");
    encoder.write_finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::apply;
    use crate::format::{Format, PatchDecoder};

    fn round_trip(old: &[u8], new: &[u8], format: Format) -> Vec<u8> {
        let sa = SuffixArray::build(old);
        let encoder = PatchEncoder::new(format, Vec::new(), false);
        let bytes = generate(old, new, &sa, encoder).unwrap();
        let mut decoder = PatchDecoder::new(format, &bytes, false).unwrap();
        apply(old, &mut decoder).unwrap()
    }

    #[test]
    fn s1_hello_world() {
        for format in [Format::Classic, Format::Endsley] {
            let out = round_trip(b"Goodbye, world.", b"Hello, world!", format);
            assert_eq!(out, b"Hello, world!");
        }
    }

    #[test]
    fn s2_empty_old() {
        for format in [Format::Classic, Format::Endsley] {
            let out = round_trip(b"", b"x", format);
            assert_eq!(out, b"x");
        }
    }

    #[test]
    fn s3_empty_new() {
        for format in [Format::Classic, Format::Endsley] {
            let sa = SuffixArray::build(b"x");
            let encoder = PatchEncoder::new(format, Vec::new(), false);
            let bytes = generate(b"x", b"", &sa, encoder).unwrap();
            let mut decoder = PatchDecoder::new(format, &bytes, false).unwrap();
            assert!(decoder.decode_control().unwrap().is_none());
            let out = apply(b"x", &mut decoder).unwrap();
            assert_eq!(out, b"");
        }
    }

    #[test]
    fn s4_identity() {
        for format in [Format::Classic, Format::Endsley] {
            let out = round_trip(b"abcdef", b"abcdef", format);
            assert_eq!(out, b"abcdef");
        }
    }

    #[test]
    fn s5_single_byte_flip_in_large_buffer() {
        let old = vec![0u8; 1024];
        let mut new = old.clone();
        new[500] = 1;
        for format in [Format::Classic, Format::Endsley] {
            let sa = SuffixArray::build(&old);
            let encoder = PatchEncoder::new(format, Vec::new(), false);
            let bytes = generate(&old, &new, &sa, encoder).unwrap();
            assert!(bytes.len() < old.len());
            let mut decoder = PatchDecoder::new(format, &bytes, false).unwrap();
            let out = apply(&old, &mut decoder).unwrap();
            assert_eq!(out, new);
        }
    }

    #[test]
    fn binary_data_with_insertions_and_deletions() {
        let old: Vec<u8> = (0..=255u8).cycle().take(4000).collect();
        let mut new = old.clone();
        new.splice(1000..1000, std::iter::repeat(0xAAu8).take(200));
        new.truncate(new.len() - 150);
        for format in [Format::Classic, Format::Endsley] {
            let out = round_trip(&old, &new, format);
            assert_eq!(out, new);
        }
    }
}
