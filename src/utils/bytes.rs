//! Byte-slice utilities for bounds-oriented parsing.
//!
//! There are two layers:
//! - **Option layer** (`read_*`): helpers that return `Option<T>`.
//! - **Result layer** (`*_r`): wrappers that map `None` to `DecodeError::Truncated`.
//!
//! All numeric reads are **little-endian** (demo and SAR data are LE), and offsets are
//! interpreted relative to the slice you pass in.

use byteorder::{ByteOrder, LittleEndian};

use crate::err::DecodeError;

/// Read `N` raw bytes at `offset`.
///
/// Returns `None` if the range is out of bounds.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    let bytes: [u8; N] = buf.get(offset..end)?.try_into().ok()?;
    Some(bytes)
}

/// Read a single byte at `offset`.
pub(crate) fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    Some(LittleEndian::read_u32(&read_array::<4>(buf, offset)?))
}

pub(crate) fn read_i32_le(buf: &[u8], offset: usize) -> Option<i32> {
    Some(LittleEndian::read_i32(&read_array::<4>(buf, offset)?))
}

pub(crate) fn read_f32_le(buf: &[u8], offset: usize) -> Option<f32> {
    Some(LittleEndian::read_f32(&read_array::<4>(buf, offset)?))
}

#[inline]
pub(crate) fn truncated(what: &'static str, offset: usize, need: usize, len: usize) -> DecodeError {
    DecodeError::Truncated {
        what,
        offset: offset as u64,
        need,
        have: len.saturating_sub(offset),
    }
}

pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], DecodeError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))
}

/// Read `N` raw bytes at `offset`, or return `DecodeError::Truncated`.
pub(crate) fn read_array_r<const N: usize>(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<[u8; N], DecodeError> {
    read_array::<N>(buf, offset).ok_or_else(|| truncated(what, offset, N, buf.len()))
}

pub(crate) fn read_u32_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<u32, DecodeError> {
    read_u32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

pub(crate) fn read_i32_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<i32, DecodeError> {
    read_i32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

pub(crate) fn read_f32_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<f32, DecodeError> {
    read_f32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian_values() {
        let buf = [0x78, 0x56, 0x34, 0x12, 0x00, 0x00, 0x80, 0x3f];
        assert_eq!(read_u32_le(&buf, 0), Some(0x1234_5678));
        assert_eq!(read_f32_le(&buf, 4), Some(1.0));
        assert_eq!(read_i32_le(&[0xff; 4], 0), Some(-1));
    }

    #[test]
    fn test_out_of_bounds_reads_report_what_is_missing() {
        let buf = [1, 2, 3];
        assert_eq!(read_u32_le(&buf, 0), None);
        assert_eq!(
            read_u32_le_r(&buf, 1, "pause ticks"),
            Err(DecodeError::Truncated {
                what: "pause ticks",
                offset: 1,
                need: 4,
                have: 2,
            })
        );
        assert!(slice_r(&buf, usize::MAX, 2, "overflow").is_err());
        assert_eq!(slice_r(&buf, 3, 0, "eof").unwrap(), &[] as &[u8]);
    }
}
