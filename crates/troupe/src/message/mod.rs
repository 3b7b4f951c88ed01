//! # Message Envelope
//!
//! Every event that carries data carries it as a [`Message`]: an ordered list
//! of frames, where each frame is either a typed [`Envelope`] or a raw,
//! already-serialized wire buffer passed through untouched.
//!
//! An envelope is nothing more than a sequence of typed primitive values.
//! Position is the only addressing mechanism, so readers go through
//! [`EnvelopeReader`], which pops values strictly left to right and refuses
//! to finish while values are left over.

pub mod wire;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use wire::WireError;

/// A single typed primitive carried inside an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(String),
    Char(char),
    Bool(bool),
}

impl Value {
    /// The wire type tag for this value.
    ///
    /// Booleans carry their value in the tag itself (`T` / `F`).
    pub fn tag(&self) -> char {
        match self {
            Value::Int32(_) => 'i',
            Value::Int64(_) => 'h',
            Value::Float32(_) => 'f',
            Value::Float64(_) => 'd',
            Value::Str(_) => 's',
            Value::Char(_) => 'c',
            Value::Bool(true) => 'T',
            Value::Bool(false) => 'F',
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of the value, widening 32-bit integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Floating point view of the value, including integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Errors raised while reading an envelope.
///
/// A decode error aborts the conversion of the current message only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The envelope ran out of values before the reader was done
    #[error("envelope too short: expected a value at position {position}")]
    Truncated { position: usize },

    /// The value at this position does not have the requested type
    #[error("type mismatch at position {position}: expected '{expected}', found '{found}'")]
    TypeMismatch {
        position: usize,
        expected: char,
        found: char,
    },

    /// Values were left over when the reader finished
    #[error("{remaining} value(s) left unconsumed")]
    TrailingValues { remaining: usize },

    /// A tag outside the closed tag set
    #[error("unknown type tag '{0}'")]
    UnknownTag(char),
}

/// Ordered sequence of typed values. The wire form of one message frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    values: Vec<Value>,
}

impl Envelope {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Builder-style append.
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The tag string, e.g. `"si"` for `["/ping", 42]`.
    pub fn tags(&self) -> String {
        self.values.iter().map(Value::tag).collect()
    }

    /// First value when it is a string (the address-first convention).
    pub fn address(&self) -> Option<&str> {
        self.values.first().and_then(Value::as_str)
    }

    pub fn reader(&self) -> EnvelopeReader<'_> {
        EnvelopeReader {
            values: &self.values,
            position: 0,
        }
    }
}

impl From<Vec<Value>> for Envelope {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<Value> for Envelope {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", value.tag(), value)?;
        }
        write!(f, "]")
    }
}

/// Left-to-right cursor over an envelope.
///
/// Every value must be popped exactly once; [`EnvelopeReader::finish`]
/// reports leftovers as a decode error.
#[derive(Debug)]
pub struct EnvelopeReader<'a> {
    values: &'a [Value],
    position: usize,
}

macro_rules! pop_typed {
    ($name:ident, $variant:ident, $ty:ty, $tag:expr) => {
        pub fn $name(&mut self) -> Result<$ty, DecodeError> {
            let position = self.position;
            match self.pop()? {
                Value::$variant(v) => Ok(v.clone()),
                other => Err(DecodeError::TypeMismatch {
                    position,
                    expected: $tag,
                    found: other.tag(),
                }),
            }
        }
    };
}

impl<'a> EnvelopeReader<'a> {
    /// Pop the next value, whatever its type.
    pub fn pop(&mut self) -> Result<&'a Value, DecodeError> {
        let value = self.values.get(self.position).ok_or(DecodeError::Truncated {
            position: self.position,
        })?;
        self.position += 1;
        Ok(value)
    }

    pop_typed!(pop_int32, Int32, i32, 'i');
    pop_typed!(pop_int64, Int64, i64, 'h');
    pop_typed!(pop_float32, Float32, f32, 'f');
    pop_typed!(pop_float64, Float64, f64, 'd');
    pop_typed!(pop_str, Str, String, 's');
    pop_typed!(pop_char, Char, char, 'c');
    pop_typed!(pop_bool, Bool, bool, 'T');

    pub fn remaining(&self) -> usize {
        self.values.len() - self.position
    }

    /// Drain everything that is left.
    pub fn rest(&mut self) -> &'a [Value] {
        let rest = &self.values[self.position..];
        self.position = self.values.len();
        rest
    }

    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(DecodeError::TrailingValues { remaining }),
        }
    }
}

/// One frame of a [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Envelope(Envelope),
    /// Pre-serialized wire bytes, forwarded without per-value tagging
    Raw(Bytes),
}

impl Frame {
    /// Typed view of the frame; raw frames are decoded from the wire form.
    pub fn to_envelope(&self) -> Result<Envelope, WireError> {
        match self {
            Frame::Envelope(envelope) => Ok(envelope.clone()),
            Frame::Raw(bytes) => wire::decode(bytes),
        }
    }

    /// Wire form of the frame.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Frame::Envelope(envelope) => wire::encode(envelope),
            Frame::Raw(bytes) => bytes.clone(),
        }
    }
}

impl From<Envelope> for Frame {
    fn from(envelope: Envelope) -> Self {
        Frame::Envelope(envelope)
    }
}

/// Payload of an event: zero or more frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    frames: Vec<Frame>,
}

impl Message {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn single(frame: impl Into<Frame>) -> Self {
        Self {
            frames: vec![frame.into()],
        }
    }

    pub fn push(&mut self, frame: impl Into<Frame>) {
        self.frames.push(frame.into());
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The first frame as an envelope, if it is one.
    pub fn first_envelope(&self) -> Option<&Envelope> {
        match self.frames.first() {
            Some(Frame::Envelope(envelope)) => Some(envelope),
            _ => None,
        }
    }
}

impl From<Envelope> for Message {
    fn from(envelope: Envelope) -> Self {
        Message::single(envelope)
    }
}

impl FromIterator<Frame> for Message {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reader_consumes_in_order() {
        let envelope = Envelope::new().with("/ping").with(42).with(true);
        let mut reader = envelope.reader();
        assert_eq!(reader.pop_str().unwrap(), "/ping");
        assert_eq!(reader.pop_int32().unwrap(), 42);
        assert!(reader.pop_bool().unwrap());
        reader.finish().unwrap();
    }

    #[test]
    fn under_consumption_is_an_error() {
        let envelope = Envelope::new().with("/ping").with(42);
        let mut reader = envelope.reader();
        reader.pop_str().unwrap();
        assert_eq!(
            reader.finish(),
            Err(DecodeError::TrailingValues { remaining: 1 })
        );
    }

    #[test]
    fn over_consumption_is_an_error() {
        let envelope = Envelope::new().with(1);
        let mut reader = envelope.reader();
        reader.pop_int32().unwrap();
        assert_eq!(
            reader.pop_int32(),
            Err(DecodeError::Truncated { position: 1 })
        );
    }

    #[test]
    fn mismatched_type_reports_position() {
        let envelope = Envelope::new().with("x").with(2.5f32);
        let mut reader = envelope.reader();
        reader.pop_str().unwrap();
        assert_eq!(
            reader.pop_int64(),
            Err(DecodeError::TypeMismatch {
                position: 1,
                expected: 'h',
                found: 'f'
            })
        );
    }

    #[test]
    fn tags_and_address() {
        let envelope = Envelope::new()
            .with("/a")
            .with(1i64)
            .with(0.5f64)
            .with('x')
            .with(false);
        assert_eq!(envelope.tags(), "shdcF");
        assert_eq!(envelope.address(), Some("/a"));
        assert_eq!(envelope.to_string(), "[s:/a, h:1, d:0.5, c:x, F:False]");
    }
}
