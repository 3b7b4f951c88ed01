//! Binary wire form of an [`Envelope`].
//!
//! Layout: a comma-prefixed, NUL-terminated type tag string padded to a
//! multiple of four bytes, followed by the values in tag order. Numbers are
//! big-endian, strings are NUL-terminated and padded to four bytes, chars
//! occupy one 32-bit word and booleans carry no payload at all.

use super::{DecodeError, Envelope, Value};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    #[error("buffer does not start with a type tag string")]
    MissingTypeTags,

    #[error("{0} bytes left over after the last value")]
    TrailingBytes(usize),

    #[error("invalid char code point {0:#x}")]
    InvalidChar(u32),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

fn padded(len: usize) -> usize {
    (len + 4) & !3
}

fn put_padded_str(buf: &mut BytesMut, s: &[u8]) {
    buf.put_slice(s);
    let pad = padded(s.len()) - s.len();
    buf.put_bytes(0, pad);
}

/// Serialize an envelope.
pub fn encode(envelope: &Envelope) -> Bytes {
    let mut buf = BytesMut::new();
    let tags = format!(",{}", envelope.tags());
    put_padded_str(&mut buf, tags.as_bytes());

    for value in envelope.values() {
        match value {
            Value::Int32(v) => buf.put_i32(*v),
            Value::Int64(v) => buf.put_i64(*v),
            Value::Float32(v) => buf.put_f32(*v),
            Value::Float64(v) => buf.put_f64(*v),
            Value::Str(v) => put_padded_str(&mut buf, v.as_bytes()),
            Value::Char(v) => buf.put_u32(*v as u32),
            Value::Bool(_) => {}
        }
    }

    buf.freeze()
}

/// Text is decoded permissively: invalid UTF-8 sequences are dropped.
fn permissive_text(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Read a NUL-terminated, 4-byte padded string from the front of `buf`.
fn take_padded_str(buf: &mut &[u8]) -> Option<Vec<u8>> {
    let end = buf.iter().position(|b| *b == 0)?;
    let total = padded(end);
    if buf.len() < total {
        return None;
    }
    let raw = buf[..end].to_vec();
    buf.advance(total);
    Some(raw)
}

/// Parse an envelope out of its wire form.
pub fn decode(bytes: &[u8]) -> Result<Envelope, WireError> {
    let mut buf = bytes;
    let tags = take_padded_str(&mut buf).ok_or(WireError::MissingTypeTags)?;
    let tags = match tags.split_first() {
        Some((b',', rest)) => rest.to_vec(),
        _ => return Err(WireError::MissingTypeTags),
    };

    let mut envelope = Envelope::new();
    for (position, tag) in tags.iter().map(|t| *t as char).enumerate() {
        let need = |n: usize, buf: &&[u8]| {
            if buf.remaining() < n {
                Err(DecodeError::Truncated { position })
            } else {
                Ok(())
            }
        };
        let value = match tag {
            'i' => {
                need(4, &buf)?;
                Value::Int32(buf.get_i32())
            }
            'h' => {
                need(8, &buf)?;
                Value::Int64(buf.get_i64())
            }
            'f' => {
                need(4, &buf)?;
                Value::Float32(buf.get_f32())
            }
            'd' => {
                need(8, &buf)?;
                Value::Float64(buf.get_f64())
            }
            's' => {
                let raw = take_padded_str(&mut buf).ok_or(DecodeError::Truncated { position })?;
                Value::Str(permissive_text(&raw))
            }
            'c' => {
                need(4, &buf)?;
                let code = buf.get_u32();
                Value::Char(char::from_u32(code).ok_or(WireError::InvalidChar(code))?)
            }
            'T' => Value::Bool(true),
            'F' => Value::Bool(false),
            other => return Err(DecodeError::UnknownTag(other).into()),
        };
        envelope.push(value);
    }

    if buf.has_remaining() {
        return Err(WireError::TrailingBytes(buf.remaining()));
    }
    Ok(envelope)
}
