use crate::err::{DecodeError, DecodeResult};
use crate::utils::bytes;

/// A lightweight cursor over an immutable byte slice.
///
/// This is the slice/offset equivalent of `Cursor<&[u8]>`. A cursor only ever moves forward, and
/// a read that would run past the end of its slice fails with [`DecodeError::Truncated`] without
/// advancing.
///
/// All reads are little-endian and advance the cursor on success.
#[derive(Clone, Copy, Debug)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    #[inline]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Bits not yet consumed in this cursor's scope.
    #[inline]
    pub fn bits_left(&self) -> usize {
        self.remaining() * 8
    }

    /// The unread tail of the buffer, without consuming it.
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }

    #[inline]
    pub fn advance(&mut self, n: usize, what: &'static str) -> DecodeResult<()> {
        let _ = self.take_bytes(n, what)?;
        Ok(())
    }

    #[inline]
    pub fn take_bytes(&mut self, len: usize, what: &'static str) -> DecodeResult<&'a [u8]> {
        let out = bytes::slice_r(self.buf, self.pos, len, what)?;
        self.pos += len;
        Ok(out)
    }

    #[inline]
    pub fn array<const N: usize>(&mut self, what: &'static str) -> DecodeResult<[u8; N]> {
        let v = bytes::read_array_r::<N>(self.buf, self.pos, what)?;
        self.pos += N;
        Ok(v)
    }

    /// Split off the next `len` bytes as an independent cursor, and skip past them.
    ///
    /// Reads on the returned cursor are bounded by `len`, regardless of what follows in the
    /// parent buffer.
    pub fn sub_cursor(&mut self, len: usize, what: &'static str) -> DecodeResult<ByteCursor<'a>> {
        Ok(ByteCursor::new(self.take_bytes(len, what)?))
    }

    #[inline]
    pub fn u8(&mut self) -> DecodeResult<u8> {
        self.u8_named("u8")
    }

    #[inline]
    pub fn u8_named(&mut self, what: &'static str) -> DecodeResult<u8> {
        let b = bytes::read_u8(self.buf, self.pos)
            .ok_or_else(|| bytes::truncated(what, self.pos, 1, self.buf.len()))?;
        self.pos += 1;
        Ok(b)
    }

    #[inline]
    pub fn u32(&mut self) -> DecodeResult<u32> {
        self.u32_named("u32")
    }

    #[inline]
    pub fn u32_named(&mut self, what: &'static str) -> DecodeResult<u32> {
        let v = bytes::read_u32_le_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    #[inline]
    pub fn i32(&mut self) -> DecodeResult<i32> {
        self.i32_named("i32")
    }

    #[inline]
    pub fn i32_named(&mut self, what: &'static str) -> DecodeResult<i32> {
        let v = bytes::read_i32_le_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    #[inline]
    pub fn f32(&mut self) -> DecodeResult<f32> {
        self.f32_named("f32")
    }

    #[inline]
    pub fn f32_named(&mut self, what: &'static str) -> DecodeResult<f32> {
        let v = bytes::read_f32_le_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    /// Read a string terminated by NUL, or by the end of this cursor's scope if no NUL follows.
    ///
    /// The terminator is consumed. Invalid UTF-8 is replaced, since SAR writes whatever the game
    /// hands it.
    pub fn ascii_string(&mut self, what: &'static str) -> DecodeResult<String> {
        let rest = self.rest();
        if rest.is_empty() {
            return Err(bytes::truncated(what, self.pos, 1, self.buf.len()));
        }

        let (text, consumed) = match rest.iter().position(|&b| b == 0) {
            Some(nul) => (&rest[..nul], nul + 1),
            None => (rest, rest.len()),
        };

        self.pos += consumed;
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    /// Read a fixed-size, NUL padded string field.
    pub fn fixed_ascii_string(&mut self, len: usize, what: &'static str) -> DecodeResult<String> {
        let raw = self.take_bytes(len, what)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}
