//! Conversions between envelopes and script values.
//!
//! Inbound, an envelope becomes an address plus an array of its remaining
//! values. Outbound, a handler's return value becomes at most one frame:
//!
//! | script value | frame |
//! |---|---|
//! | `()` | none |
//! | string | `[s]` |
//! | bool | `[T]` / `[F]` |
//! | blob | raw wire bytes, passed through |
//! | `[address]`, `[address, [values...]]` | `[s address, values...]` |
//! | `SystemExit()` | none, terminates the process |
//!
//! Integers encode as `i` when they fit in 32 bits and `h` otherwise.
//! Floats encode as `f` when they survive the trip through `f32` and `d`
//! otherwise.

use crate::host::SystemExit;
use crate::ScriptError;
use bytes::Bytes;
use rhai::{Array, Dynamic, FLOAT, INT};
use troupe::{Envelope, Frame, Value};

/// A handler's return value, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nothing,
    Frame(Frame),
    Exit,
}

pub fn value_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Int32(v) => Dynamic::from(*v as INT),
        Value::Int64(v) => Dynamic::from(*v as INT),
        Value::Float32(v) => Dynamic::from(*v as FLOAT),
        Value::Float64(v) => Dynamic::from(*v as FLOAT),
        Value::Str(v) => Dynamic::from(v.clone()),
        Value::Char(v) => Dynamic::from(*v),
        Value::Bool(v) => Dynamic::from(*v),
    }
}

pub fn dynamic_to_value(value: Dynamic) -> Result<Value, ScriptError> {
    if let Ok(v) = value.as_int() {
        return Ok(match i32::try_from(v) {
            Ok(small) => Value::Int32(small),
            Err(_) => Value::Int64(v),
        });
    }
    if let Ok(v) = value.as_float() {
        let narrow = v as f32;
        return Ok(if narrow as FLOAT == v {
            Value::Float32(narrow)
        } else {
            Value::Float64(v)
        });
    }
    if let Ok(v) = value.as_bool() {
        return Ok(Value::Bool(v));
    }
    if let Ok(v) = value.as_char() {
        return Ok(Value::Char(v));
    }
    if value.is_string() {
        let type_name = value.type_name().to_string();
        return value
            .into_string()
            .map(Value::Str)
            .map_err(|_| ScriptError::UnsupportedValue(type_name));
    }
    Err(ScriptError::UnsupportedValue(value.type_name().to_string()))
}

/// Split an inbound envelope into its address and the remaining values.
pub fn decode_socket(envelope: &Envelope) -> Result<(String, Array), ScriptError> {
    let mut reader = envelope.reader();
    let address = reader
        .pop_str()
        .map_err(|e| ScriptError::Frame(e.into()))?;
    let args = reader.rest().iter().map(value_to_dynamic).collect();
    Ok((address, args))
}

pub fn encode_reply(value: Dynamic) -> Result<Reply, ScriptError> {
    if value.is_unit() {
        return Ok(Reply::Nothing);
    }
    if value.is::<SystemExit>() {
        return Ok(Reply::Exit);
    }
    if value.is_blob() {
        let type_name = value.type_name().to_string();
        let blob = value
            .into_blob()
            .map_err(|_| ScriptError::UnsupportedValue(type_name))?;
        return Ok(Reply::Frame(Frame::Raw(Bytes::from(blob))));
    }
    if value.is_array() {
        let type_name = value.type_name().to_string();
        let array = value
            .into_array()
            .map_err(|_| ScriptError::UnsupportedValue(type_name))?;
        return encode_addressed(array).map(|e| Reply::Frame(Frame::Envelope(e)));
    }
    if value.is_string() || value.is_bool() {
        let single = dynamic_to_value(value)?;
        return Ok(Reply::Frame(Frame::Envelope(Envelope::new().with(single))));
    }
    Err(ScriptError::UnsupportedValue(value.type_name().to_string()))
}

fn encode_addressed(array: Array) -> Result<Envelope, ScriptError> {
    let mut items = array.into_iter();
    let address = match items.next().map(dynamic_to_value).transpose()? {
        Some(Value::Str(address)) => address,
        Some(other) => {
            return Err(ScriptError::MalformedReply(format!(
                "first item should be the address string, found {}",
                other.tag()
            )))
        }
        None => return Err(ScriptError::MalformedReply("empty array".to_string())),
    };

    let mut envelope = Envelope::new().with(address);
    if let Some(data) = items.next() {
        let type_name = data.type_name().to_string();
        let values = data.into_array().map_err(|_| {
            ScriptError::MalformedReply(format!("second item should be an array, found {}", type_name))
        })?;
        for value in values {
            envelope.push(dynamic_to_value(value)?);
        }
    }
    if items.next().is_some() {
        return Err(ScriptError::MalformedReply(
            "expected [address, [values]]".to_string(),
        ));
    }
    Ok(envelope)
}
