//! Index file codec (component I): a standalone on-disk encoding of a
//! [`SuffixArray`] over some `old` buffer, so repeated diffs against the same
//! `old` can skip reconstructing it. Layout is exactly spec.md §4.I's: the
//! header `b"SUFFIX ARRAY\0"`, then [`SuffixArray::serialise`]'s width-tagged
//! body. The element count is never stored in the file; per §4.I the loader
//! takes it from the length of the associated `old` buffer, so callers must
//! supply that length to [`read_index`].

use crate::error::{BsdiffError, Result};
use crate::suffixarray::{SuffixArray, HEADER};

/// Serialise `sa` (built over a buffer of `old_len` bytes) into a standalone
/// index file.
pub fn write_index(sa: &SuffixArray, old_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER.len() + 1 + sa.len());
    out.extend_from_slice(HEADER);
    out.extend_from_slice(&sa.serialise(old_len));
    out
}

/// Parse an index file previously produced by [`write_index`]. `old_len` is
/// the length of the `old` buffer this index was built against — the file
/// itself carries no count, so the caller must already know it.
pub fn read_index(bytes: &[u8], old_len: usize) -> Result<SuffixArray> {
    if bytes.len() < HEADER.len() || &bytes[..HEADER.len()] != HEADER {
        return Err(BsdiffError::corrupt_index("bad index header"));
    }
    let body = &bytes[HEADER.len()..];
    SuffixArray::deserialise(body, old_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_file() {
        let old = b"abracadabra the quick brown fox".to_vec();
        let sa = SuffixArray::build(&old);
        let bytes = write_index(&sa, old.len());
        let back = read_index(&bytes, old.len()).unwrap();
        assert_eq!(sa.as_slice(), back.as_slice());
    }

    #[test]
    fn rejects_bad_header() {
        let bytes = vec![0u8; 32];
        assert!(read_index(&bytes, 0).is_err());
    }

    #[test]
    fn rejects_mismatched_length() {
        let old = b"hello world".to_vec();
        let sa = SuffixArray::build(&old);
        let bytes = write_index(&sa, old.len());
        assert!(read_index(&bytes, old.len() + 5).is_err());
    }
}
