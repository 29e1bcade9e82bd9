//! Byte streams used by the row codec.

use super::{CodecError, CodecResult};

/// Writes into a caller-supplied buffer.
///
/// Once the buffer is exhausted the stream keeps counting without writing,
/// so a single pass reports the size a retry needs.
///
/// ```rust
/// use jogasaki_sql::codec::WritableStream;
///
/// let mut buf = [0u8; 2];
/// let mut out = WritableStream::new(&mut buf);
/// out.write_bytes(b"abc");
/// assert!(out.overflowed());
/// assert_eq!(out.required_size(), 3);
/// ```
#[derive(Debug)]
pub struct WritableStream<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WritableStream<'a> {
    /// Creates a stream over `buf`.
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Creates a stream that only measures.
    #[must_use]
    pub fn measuring() -> WritableStream<'static> {
        WritableStream {
            buf: &mut [],
            pos: 0,
        }
    }

    /// Bytes written or counted so far.
    #[inline]
    #[must_use]
    pub fn required_size(&self) -> usize {
        self.pos
    }

    /// Capacity of the underlying buffer.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if some bytes did not fit.
    #[inline]
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.pos > self.buf.len()
    }

    /// Written bytes; meaningful only when the stream did not overflow.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos.min(self.buf.len())]
    }

    /// Writes one byte.
    pub fn write_u8(&mut self, b: u8) {
        if let Some(slot) = self.buf.get_mut(self.pos) {
            *slot = b;
        }
        self.pos += 1;
    }

    /// Writes bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let start = self.pos.min(self.buf.len());
        let end = (self.pos + bytes.len()).min(self.buf.len());
        self.buf[start..end].copy_from_slice(&bytes[..end - start]);
        self.pos += bytes.len();
    }

    /// Writes bytes XOR-ed with `mask`.
    pub fn write_masked(&mut self, bytes: &[u8], mask: u8) {
        for b in bytes {
            self.write_u8(b ^ mask);
        }
    }

    /// Writes an unsigned LEB128 varint.
    pub fn write_varint(&mut self, mut v: u128) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.write_u8(byte);
                return;
            }
            self.write_u8(byte | 0x80);
        }
    }

    /// Writes a zigzag-encoded signed varint.
    pub fn write_signed_varint(&mut self, v: i64) {
        self.write_varint(u128::from(((v << 1) ^ (v >> 63)) as u64));
    }

    /// Complements every byte written since `start`.
    pub fn complement_from(&mut self, start: usize) {
        let end = self.pos.min(self.buf.len());
        let start = start.min(end);
        for b in &mut self.buf[start..end] {
            *b = !*b;
        }
    }
}

/// Encodes with `f` into `buf`, growing it and retrying once when the first
/// attempt overflows. Returns the encoded length; `buf` is truncated to it.
pub fn encode_with_retry<F>(buf: &mut Vec<u8>, f: F) -> CodecResult<usize>
where
    F: Fn(&mut WritableStream<'_>) -> CodecResult<()>,
{
    if buf.is_empty() {
        buf.resize(64, 0);
    }
    let required = {
        let mut out = WritableStream::new(buf);
        f(&mut out)?;
        if !out.overflowed() {
            let n = out.required_size();
            buf.truncate(n);
            return Ok(n);
        }
        out.required_size()
    };
    buf.resize(required, 0);
    let mut out = WritableStream::new(buf);
    f(&mut out)?;
    if out.overflowed() {
        return Err(CodecError::BufferTooSmall {
            required: out.required_size(),
            available: out.capacity(),
        });
    }
    let n = out.required_size();
    buf.truncate(n);
    Ok(n)
}

/// Reads from a byte slice.
#[derive(Debug, Clone)]
pub struct ReadableStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReadableStream<'a> {
    /// Creates a stream over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn short(&self, need: usize) -> CodecError {
        CodecError::DataCorruption(format!(
            "need {need} byte(s) at offset {}, {} left",
            self.pos,
            self.remaining()
        ))
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        let b = *self.data.get(self.pos).ok_or_else(|| self.short(1))?;
        self.pos += 1;
        Ok(b)
    }

    /// Reads one byte XOR-ed with `mask`.
    pub fn read_u8_masked(&mut self, mask: u8) -> CodecResult<u8> {
        self.read_u8().map(|b| b ^ mask)
    }

    /// Reads `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.short(n));
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    /// Reads a fixed-size array XOR-ed with `mask`.
    pub fn read_array_masked<const N: usize>(&mut self, mask: u8) -> CodecResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        for (o, b) in out.iter_mut().zip(bytes) {
            *o = b ^ mask;
        }
        Ok(out)
    }

    /// Reads an unsigned LEB128 varint.
    pub fn read_varint(&mut self) -> CodecResult<u128> {
        let mut v: u128 = 0;
        for shift in (0..128).step_by(7) {
            let b = self.read_u8()?;
            v |= u128::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(v);
            }
        }
        Err(CodecError::DataCorruption("varint too long".to_string()))
    }

    /// Reads a varint that must fit into `u64`.
    pub fn read_varint_u64(&mut self) -> CodecResult<u64> {
        u64::try_from(self.read_varint()?)
            .map_err(|_| CodecError::DataCorruption("varint exceeds 64 bits".to_string()))
    }

    /// Reads a zigzag-encoded signed varint.
    pub fn read_signed_varint(&mut self) -> CodecResult<i64> {
        let u = self.read_varint_u64()?;
        Ok(((u >> 1) as i64) ^ -((u & 1) as i64))
    }

    /// Reads a varint length and checks it against the remaining bytes.
    pub fn read_length(&mut self) -> CodecResult<usize> {
        let len = self.read_varint_u64()?;
        match usize::try_from(len) {
            Ok(n) if n <= self.remaining() => Ok(n),
            _ => Err(CodecError::DataCorruption(format!(
                "length prefix {len} exceeds the {} remaining byte(s)",
                self.remaining()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_only() {
        let mut out = WritableStream::measuring();
        out.write_bytes(&[1, 2, 3]);
        out.write_varint(300);
        assert_eq!(out.required_size(), 5);
        assert!(out.overflowed());
        assert!(out.written().is_empty());
    }

    #[test]
    fn test_partial_write_keeps_counting() {
        let mut buf = [0u8; 4];
        let mut out = WritableStream::new(&mut buf);
        out.write_bytes(&[1, 2, 3]);
        out.write_bytes(&[4, 5, 6]);
        assert_eq!(out.required_size(), 6);
        assert_eq!(out.written(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_encode_with_retry_grows() {
        let mut buf = vec![0u8; 2];
        let n = encode_with_retry(&mut buf, |out| {
            out.write_bytes(&[7u8; 100]);
            Ok(())
        })
        .unwrap();
        assert_eq!(n, 100);
        assert_eq!(buf, vec![7u8; 100]);
    }

    #[test]
    fn test_varints() {
        let mut buf = vec![0u8; 64];
        let mut out = WritableStream::new(&mut buf);
        out.write_varint(u128::MAX);
        out.write_signed_varint(-1);
        out.write_signed_varint(i64::MIN);
        let n = out.required_size();
        let mut input = ReadableStream::new(&buf[..n]);
        assert_eq!(input.read_varint().unwrap(), u128::MAX);
        assert_eq!(input.read_signed_varint().unwrap(), -1);
        assert_eq!(input.read_signed_varint().unwrap(), i64::MIN);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_read_length_rejects_overrun() {
        let data = [5u8, 1, 2];
        let mut input = ReadableStream::new(&data);
        assert!(matches!(input.read_length(), Err(CodecError::DataCorruption(_))));
        let mut input = ReadableStream::new(&[]);
        assert!(input.read_u8().is_err());
    }

    #[test]
    fn test_complement_from() {
        let mut buf = [0u8; 3];
        let mut out = WritableStream::new(&mut buf);
        out.write_u8(1);
        out.write_bytes(&[0x0f, 0xf0]);
        out.complement_from(1);
        assert_eq!(out.written(), &[1, 0xf0, 0x0f]);
    }
}
