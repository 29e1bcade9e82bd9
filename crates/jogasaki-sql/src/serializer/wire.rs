//! Tag-length-value framing.
//!
//! ```text
//! field := tag:u8  len:varint  payload[len]
//! ```
//!
//! Integers are payloads holding a zigzag or plain varint; nested messages
//! are payloads holding more fields. Readers skip tags they do not know.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{SerializerError, SerializerResult};

fn put_varint(buf: &mut BytesMut, mut v: u64) {
    while v >= 0x80 {
        buf.put_u8((v as u8) | 0x80);
        v >>= 7;
    }
    buf.put_u8(v as u8);
}

fn get_varint(buf: &mut Bytes) -> SerializerResult<u64> {
    let mut v = 0u64;
    for shift in (0..64).step_by(7) {
        if !buf.has_remaining() {
            return Err(SerializerError::Malformed("truncated varint".into()));
        }
        let b = buf.get_u8();
        v |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(v);
        }
    }
    Err(SerializerError::Malformed("varint too long".into()))
}

fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn unzigzag(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

/// Builds one message.
#[derive(Debug, Default)]
pub(crate) struct MessageWriter {
    buf: BytesMut,
}

impl MessageWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bytes(&mut self, tag: u8, payload: &[u8]) -> &mut Self {
        self.buf.put_u8(tag);
        put_varint(&mut self.buf, payload.len() as u64);
        self.buf.put_slice(payload);
        self
    }

    pub(crate) fn string(&mut self, tag: u8, s: &str) -> &mut Self {
        self.bytes(tag, s.as_bytes())
    }

    pub(crate) fn uint(&mut self, tag: u8, v: u64) -> &mut Self {
        let mut payload = BytesMut::with_capacity(10);
        put_varint(&mut payload, v);
        self.bytes(tag, &payload)
    }

    pub(crate) fn int(&mut self, tag: u8, v: i64) -> &mut Self {
        self.uint(tag, zigzag(v))
    }

    pub(crate) fn flag(&mut self, tag: u8, v: bool) -> &mut Self {
        self.uint(tag, u64::from(v))
    }

    pub(crate) fn message(&mut self, tag: u8, inner: MessageWriter) -> &mut Self {
        let payload = inner.finish();
        self.bytes(tag, &payload)
    }

    pub(crate) fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// A decoded field.
#[derive(Debug, Clone)]
pub(crate) struct Field {
    pub(crate) tag: u8,
    payload: Bytes,
}

impl Field {
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.payload
    }

    pub(crate) fn string(&self) -> SerializerResult<String> {
        String::from_utf8(self.payload.to_vec())
            .map_err(|_| SerializerError::Malformed(format!("field {} is not utf-8", self.tag)))
    }

    pub(crate) fn uint(&self) -> SerializerResult<u64> {
        let mut p = self.payload.clone();
        let v = get_varint(&mut p)?;
        if p.has_remaining() {
            return Err(SerializerError::Malformed(format!(
                "trailing bytes in integer field {}",
                self.tag
            )));
        }
        Ok(v)
    }

    pub(crate) fn int(&self) -> SerializerResult<i64> {
        self.uint().map(unzigzag)
    }

    pub(crate) fn flag(&self) -> SerializerResult<bool> {
        Ok(self.uint()? != 0)
    }

    pub(crate) fn message(&self) -> SerializerResult<Vec<Field>> {
        parse_fields(self.payload.clone())
    }
}

/// Splits a message into fields.
pub(crate) fn parse_fields(mut buf: Bytes) -> SerializerResult<Vec<Field>> {
    let mut fields = Vec::new();
    while buf.has_remaining() {
        let tag = buf.get_u8();
        let len = get_varint(&mut buf)?;
        let len = usize::try_from(len)
            .ok()
            .filter(|n| *n <= buf.remaining())
            .ok_or_else(|| SerializerError::Malformed(format!("field {tag} overruns the message")))?;
        let payload = buf.split_to(len);
        fields.push(Field { tag, payload });
    }
    Ok(fields)
}
