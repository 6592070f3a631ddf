//! Suffix array construction and serialisation (component B).
//!
//! Construction is delegated to the `divsufsort` crate — a binding of Yuta
//! Mori's `libdivsufsort` — rather than a hand-rolled doubling sort: spec.md
//! §6 treats the suffix-sort primitive as an external black box with an
//! `O(n log n)` contract, which is exactly what `divsufsort` already
//! provides, battle-tested, so there is nothing to gain from reimplementing
//! it in-crate.

use crate::error::{BsdiffError, Result};

const INDEX_MAGIC: &[u8; 13] = b"SUFFIX ARRAY\0";

/// The width, in bytes, used to store each suffix-array element on disk.
/// Chosen as the smallest width that can address every position in `old`,
/// including the one-past-the-end sentinel some callers index by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementWidth {
    W1,
    W2,
    W4,
    W8,
}

impl ElementWidth {
    /// Smallest width able to address `max_value` (inclusive).
    fn for_len(max_value: u64) -> Self {
        if max_value <= u8::MAX as u64 {
            ElementWidth::W1
        } else if max_value <= u16::MAX as u64 {
            ElementWidth::W2
        } else if max_value <= u32::MAX as u64 {
            ElementWidth::W4
        } else {
            ElementWidth::W8
        }
    }

    fn byte_tag(self) -> u8 {
        match self {
            ElementWidth::W1 => 1,
            ElementWidth::W2 => 2,
            ElementWidth::W4 => 4,
            ElementWidth::W8 => 8,
        }
    }

    fn from_byte_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(ElementWidth::W1),
            2 => Ok(ElementWidth::W2),
            4 => Ok(ElementWidth::W4),
            8 => Ok(ElementWidth::W8),
            other => Err(BsdiffError::corrupt_index(format!(
                "unit width byte {other} not in {{1, 2, 4, 8}}"
            ))),
        }
    }

    fn bytes(self) -> usize {
        self.byte_tag() as usize
    }
}

/// A sorted suffix array over some byte buffer `old`.
///
/// `SuffixArray::build` constructs one from `old`; the entries are an
/// `i32`-width permutation of `0..old.len()` coming straight out of
/// `divsufsort`, widened on demand when serialised for larger buffers.
#[derive(Debug, Clone)]
pub struct SuffixArray {
    entries: Vec<i32>,
}

impl SuffixArray {
    /// Build a suffix array over `old`. Empty input yields an empty array.
    #[tracing::instrument(level = "debug", skip_all, fields(len = old.len()))]
    pub fn build(old: &[u8]) -> Self {
        if old.is_empty() {
            return SuffixArray {
                entries: Vec::new(),
            };
        }
        let mut entries = vec![0i32; old.len()];
        divsufsort::sort_in_place(old, &mut entries);
        tracing::debug!(len = old.len(), "built suffix array");
        SuffixArray { entries }
    }

    /// Borrow the suffix array as zero-based offsets into `old`.
    pub fn as_slice(&self) -> &[i32] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialise this suffix array: the element-width byte followed by the
    /// array as little-endian integers of that width. This is the same
    /// payload spec.md §4.I calls the index file body; [`crate::index`]
    /// wraps it with the on-disk header.
    pub fn serialise(&self, old_len: usize) -> Vec<u8> {
        let width = ElementWidth::for_len(old_len as u64);
        let mut out = Vec::with_capacity(1 + self.entries.len() * width.bytes());
        out.push(width.byte_tag());
        for &e in &self.entries {
            let v = e as u64;
            out.extend_from_slice(&v.to_le_bytes()[..width.bytes()]);
        }
        out
    }

    /// Deserialise the payload written by [`SuffixArray::serialise`]. `n` is
    /// the expected number of elements, taken from the length of the
    /// associated `old` buffer (the count itself is never stored).
    pub fn deserialise(bytes: &[u8], n: usize) -> Result<Self> {
        if bytes.is_empty() {
            return Err(BsdiffError::corrupt_index("empty index payload"));
        }
        let width = ElementWidth::from_byte_tag(bytes[0])?;
        if width != ElementWidth::for_len(n as u64) {
            tracing::warn!(
                stored = width.byte_tag(),
                expected = ElementWidth::for_len(n as u64).byte_tag(),
                "index element width does not match what the current old length would pick"
            );
        }
        let body = &bytes[1..];
        let stride = width.bytes();
        if body.len() != n * stride {
            return Err(BsdiffError::corrupt_index(format!(
                "expected {} elements of width {} ({} bytes), got {} bytes",
                n,
                stride,
                n * stride,
                body.len()
            )));
        }
        let mut entries = Vec::with_capacity(n);
        for chunk in body.chunks_exact(stride) {
            let mut buf = [0u8; 8];
            buf[..stride].copy_from_slice(chunk);
            entries.push(u64::from_le_bytes(buf) as i32);
        }
        Ok(SuffixArray { entries })
    }
}

/// Header bytes shared by the suffix-array serialisation and the index file
/// format (spec.md §4.B and §4.I describe the same on-disk shape).
pub(crate) const HEADER: &[u8; 13] = INDEX_MAGIC;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_empty() {
        let sa = SuffixArray::build(b"");
        assert!(sa.is_empty());
    }

    #[test]
    fn build_is_sorted_permutation() {
        let old = b"the quick brown fox jumps over the lazy dog";
        let sa = SuffixArray::build(old);
        assert_eq!(sa.len(), old.len());

        let mut seen = vec![false; old.len()];
        for &p in sa.as_slice() {
            assert!(!seen[p as usize]);
            seen[p as usize] = true;
        }
        assert!(seen.iter().all(|&x| x));

        for w in sa.as_slice().windows(2) {
            let a = &old[w[0] as usize..];
            let b = &old[w[1] as usize..];
            assert!(a <= b);
        }
    }

    #[test]
    fn element_width_picks_smallest() {
        assert_eq!(ElementWidth::for_len(200), ElementWidth::W1);
        assert_eq!(ElementWidth::for_len(70_000), ElementWidth::W4);
        assert_eq!(ElementWidth::for_len(u32::MAX as u64 + 1), ElementWidth::W8);
    }

    #[test]
    fn serialise_round_trip() {
        let old = b"abracadabra".to_vec();
        let sa = SuffixArray::build(&old);
        let bytes = sa.serialise(old.len());
        let back = SuffixArray::deserialise(&bytes, old.len()).unwrap();
        assert_eq!(sa.as_slice(), back.as_slice());
    }

    #[test]
    fn deserialise_rejects_bad_width() {
        let bytes = vec![3u8, 0, 0, 0];
        assert!(SuffixArray::deserialise(&bytes, 1).is_err());
    }

    #[test]
    fn deserialise_rejects_short_body() {
        let bytes = vec![4u8, 0, 0];
        assert!(SuffixArray::deserialise(&bytes, 1).is_err());
    }
}
