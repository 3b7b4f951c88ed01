//! # Capability Descriptor
//!
//! Every actor type declares its configurable surface as a small tree:
//! `capabilities/data` entries for parameters and `inputs/input`,
//! `outputs/output` for slot types. The declaration is parsed once, at
//! registration time, into a typed [`CapabilityDescriptor`]. From then on
//! the descriptor is the only thing a controller (an editor, a stage file,
//! a test) writes through: [`CapabilityDescriptor::apply_change`] stores the
//! new text value and, when the entry names an API command, produces the
//! [`ApiCall`] the host delivers to the backend.

pub mod tree;

use crate::message::{Envelope, Message, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

pub use tree::ConfigNode;

/// Authoring and usage errors of the capability surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("line {line}: bad indentation (children are indented by four spaces)")]
    Indentation { line: usize },

    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    /// A node every entry must carry is absent
    #[error("{entry}: missing mandatory node '{node}'")]
    MissingNode { entry: String, node: &'static str },

    #[error("{entry}: unknown api_value tag '{tag}'")]
    UnknownApiTag { entry: String, tag: String },

    #[error("{entry}: invalid number '{value}' for {node}")]
    InvalidNumber {
        entry: String,
        node: &'static str,
        value: String,
    },

    #[error("{entry}: integer bounds [{min}, {max}] contain no integer")]
    EmptyRange { entry: String, min: f64, max: f64 },

    #[error("no capability entry named '{0}'")]
    UnknownEntry(String),

    #[error("{entry}: '{value}' is not a valid {kind} value")]
    InvalidValue {
        entry: String,
        kind: DataKind,
        value: String,
    },
}

/// Type of a `data` entry. Resolved once from the declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Int,
    Slider,
    Float,
    String,
    Bool,
    Filename,
    MediaControl,
    Trigger,
    /// A type string this runtime does not render or interpret
    Unsupported(String),
}

impl DataKind {
    pub fn parse(text: &str) -> Self {
        match text {
            "int" => DataKind::Int,
            "slider" => DataKind::Slider,
            "float" => DataKind::Float,
            "string" => DataKind::String,
            "bool" => DataKind::Bool,
            "filename" => DataKind::Filename,
            "mediacontrol" | "media-control" => DataKind::MediaControl,
            "trigger" => DataKind::Trigger,
            other => DataKind::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DataKind::Int => "int",
            DataKind::Slider => "slider",
            DataKind::Float => "float",
            DataKind::String => "string",
            DataKind::Bool => "bool",
            DataKind::Filename => "filename",
            DataKind::MediaControl => "mediacontrol",
            DataKind::Trigger => "trigger",
            DataKind::Unsupported(other) => other,
        }
    }

    /// Whether entries of this kind hold a persisted text value.
    pub fn carries_value(&self) -> bool {
        !matches!(
            self,
            DataKind::MediaControl | DataKind::Trigger | DataKind::Unsupported(_)
        )
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared input or output slot type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotType {
    Any,
    Position,
    Rotation,
    Matrix,
    Int,
    Osc,
    NatNet,
    Unsupported(String),
}

impl SlotType {
    pub fn parse(text: &str) -> Self {
        match text {
            "Any" => SlotType::Any,
            "Position" => SlotType::Position,
            "Rotation" => SlotType::Rotation,
            "Matrix" => SlotType::Matrix,
            "Int" => SlotType::Int,
            "OSC" => SlotType::Osc,
            "NatNet" => SlotType::NatNet,
            other => SlotType::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SlotType::Any => "Any",
            SlotType::Position => "Position",
            SlotType::Rotation => "Rotation",
            SlotType::Matrix => "Matrix",
            SlotType::Int => "Int",
            SlotType::Osc => "OSC",
            SlotType::NatNet => "NatNet",
            SlotType::Unsupported(other) => other,
        }
    }

    /// `Any` on either side connects to everything.
    pub fn accepts(&self, other: &SlotType) -> bool {
        matches!(self, SlotType::Any) || matches!(other, SlotType::Any) || self == other
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire type used for the argument of a synthesized API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiValueTag {
    Int32,
    Int64,
    Float32,
    Float64,
    /// `s`, and the legacy `b` picture character
    Str,
    Char,
    Bool,
}

impl ApiValueTag {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "i" => Some(ApiValueTag::Int32),
            "h" => Some(ApiValueTag::Int64),
            "f" => Some(ApiValueTag::Float32),
            "d" => Some(ApiValueTag::Float64),
            "s" | "b" => Some(ApiValueTag::Str),
            "c" => Some(ApiValueTag::Char),
            "T" | "F" => Some(ApiValueTag::Bool),
            _ => None,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, ApiValueTag::Float32 | ApiValueTag::Float64)
    }
}

/// The `api_call` / `api_value` pair of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiBinding {
    pub call: String,
    pub value_tag: Option<ApiValueTag>,
}

/// One configurable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub name: String,
    pub kind: DataKind,
    pub value: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub help: Option<String>,
    pub options: Option<String>,
    pub api: Option<ApiBinding>,
    /// Editor-facing nodes this runtime does not interpret (`valid_files`,
    /// `file_template`, ...), kept for rendering back.
    pub extra: Vec<(String, String)>,
}

impl DataEntry {
    fn from_node(node: &ConfigNode) -> Result<Self, CapabilityError> {
        let name = node
            .locate_value("name")
            .ok_or_else(|| CapabilityError::MissingNode {
                entry: "<data>".to_string(),
                node: "name",
            })?
            .to_string();
        let kind = node
            .locate_value("type")
            .map(DataKind::parse)
            .ok_or_else(|| CapabilityError::MissingNode {
                entry: name.clone(),
                node: "type",
            })?;

        let value = node.locate_value("value").map(str::to_string);
        if value.is_none() && kind.carries_value() {
            return Err(CapabilityError::MissingNode {
                entry: name,
                node: "value",
            });
        }
        if let DataKind::Unsupported(other) = &kind {
            warn!(entry = %name, kind = %other, "unsupported capability type");
        }

        let number = |field: &'static str| -> Result<Option<f64>, CapabilityError> {
            node.locate_value(field)
                .map(|text| {
                    text.trim()
                        .parse::<f64>()
                        .map_err(|_| CapabilityError::InvalidNumber {
                            entry: name.clone(),
                            node: field,
                            value: text.to_string(),
                        })
                })
                .transpose()
        };
        let min = number("min")?;
        let max = number("max")?;
        let step = number("step")?;

        let api = match node.locate_value("api_call") {
            Some(call) => {
                let value_tag = match node.locate_value("api_value") {
                    Some(tag) => Some(ApiValueTag::parse(tag).ok_or_else(|| {
                        CapabilityError::UnknownApiTag {
                            entry: name.clone(),
                            tag: tag.to_string(),
                        }
                    })?),
                    None => None,
                };
                Some(ApiBinding {
                    call: call.to_string(),
                    value_tag,
                })
            }
            None => None,
        };

        const KNOWN: &[&str] = &[
            "name", "type", "value", "min", "max", "step", "help", "options", "api_call",
            "api_value",
        ];
        let extra = node
            .children()
            .iter()
            .filter(|c| !KNOWN.contains(&c.name()))
            .filter_map(|c| c.value().map(|v| (c.name().to_string(), v.to_string())))
            .collect();

        let entry = DataEntry {
            help: node.locate_value("help").map(str::to_string),
            options: node.locate_value("options").map(str::to_string),
            name,
            kind,
            value,
            min,
            max,
            step,
            api,
            extra,
        };
        if let (Some(min), Some(max)) = (entry.min, entry.max) {
            if entry.is_integral() && entry.int_bounds().is_none() {
                return Err(CapabilityError::EmptyRange {
                    entry: entry.name,
                    min,
                    max,
                });
            }
        }
        Ok(entry)
    }

    fn to_node(&self) -> ConfigNode {
        let mut node = ConfigNode::new("data");
        node.push(ConfigNode::with_value("name", &self.name));
        node.push(ConfigNode::with_value("type", self.kind.as_str()));
        let numbers = [("min", self.min), ("max", self.max), ("step", self.step)];
        for (field, number) in numbers {
            if let Some(number) = number {
                node.push(ConfigNode::with_value(field, number.to_string()));
            }
        }
        if let Some(help) = &self.help {
            node.push(ConfigNode::with_value("help", help));
        }
        if let Some(options) = &self.options {
            node.push(ConfigNode::with_value("options", options));
        }
        for (key, value) in &self.extra {
            node.push(ConfigNode::with_value(key, value));
        }
        if let Some(value) = &self.value {
            node.push(ConfigNode::with_value("value", value));
        }
        if let Some(api) = &self.api {
            node.push(ConfigNode::with_value("api_call", &api.call));
            if let Some(tag) = api.value_tag {
                let text = match tag {
                    ApiValueTag::Int32 => "i",
                    ApiValueTag::Int64 => "h",
                    ApiValueTag::Float32 => "f",
                    ApiValueTag::Float64 => "d",
                    ApiValueTag::Str => "s",
                    ApiValueTag::Char => "c",
                    ApiValueTag::Bool => "T",
                };
                node.push(ConfigNode::with_value("api_value", text));
            }
        }
        node
    }

    /// Whether this entry is treated as a floating point number.
    fn is_float(&self) -> bool {
        match self.kind {
            DataKind::Float => true,
            DataKind::Slider => self.api.as_ref().and_then(|a| a.value_tag).is_some_and(ApiValueTag::is_float),
            _ => false,
        }
    }

    fn is_integral(&self) -> bool {
        matches!(self.kind, DataKind::Int | DataKind::Slider) && !self.is_float()
    }

    /// Integer clamp range, when both bounds are declared and an integer
    /// lies between them.
    fn int_bounds(&self) -> Option<(i64, i64)> {
        let (min, max) = self.min.zip(self.max)?;
        let (lo, hi) = (min.ceil() as i64, max.floor() as i64);
        (lo <= hi).then_some((lo, hi))
    }

    /// Normalise `text` for this entry's kind, clamping numbers when both
    /// bounds are declared.
    fn normalise(&self, text: &str) -> Result<String, CapabilityError> {
        let invalid = || CapabilityError::InvalidValue {
            entry: self.name.clone(),
            kind: self.kind.clone(),
            value: text.to_string(),
        };
        let bounds = self.min.zip(self.max).filter(|(min, max)| min <= max);
        match self.kind {
            DataKind::Int | DataKind::Slider if !self.is_float() => {
                let mut v = text
                    .trim()
                    .parse::<i64>()
                    .or_else(|_| text.trim().parse::<f64>().map(|f| f as i64))
                    .map_err(|_| invalid())?;
                if let Some((lo, hi)) = self.int_bounds() {
                    v = v.clamp(lo, hi);
                }
                Ok(v.to_string())
            }
            DataKind::Float | DataKind::Slider => {
                let mut v = text.trim().parse::<f64>().map_err(|_| invalid())?;
                if let Some((min, max)) = bounds {
                    v = v.clamp(min, max);
                }
                Ok(format!("{:.6}", v))
            }
            DataKind::Bool => match parse_bool(text) {
                Some(true) => Ok("True".to_string()),
                Some(false) => Ok("False".to_string()),
                None => Err(invalid()),
            },
            _ => Ok(text.to_string()),
        }
    }
}

/// `True`/`False` as written by controllers, plus the usual spellings.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "True" | "true" | "TRUE" | "1" | "on" => Some(true),
        "False" | "false" | "FALSE" | "0" | "off" | "" => Some(false),
        _ => None,
    }
}

/// An API command synthesized from a capability change.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub command: String,
    pub argument: Option<Value>,
}

impl ApiCall {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            argument: None,
        }
    }

    pub fn with_argument(command: impl Into<String>, argument: impl Into<Value>) -> Self {
        Self {
            command: command.into(),
            argument: Some(argument.into()),
        }
    }

    /// `[s command, argument?]`
    pub fn to_envelope(&self) -> Envelope {
        let mut envelope = Envelope::new().with(self.command.as_str());
        if let Some(argument) = &self.argument {
            envelope.push(argument.clone());
        }
        envelope
    }

    pub fn into_message(self) -> Message {
        Message::from(self.to_envelope())
    }
}

/// Typed view of an actor type's capability declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    data: Vec<DataEntry>,
    inputs: Vec<SlotType>,
    outputs: Vec<SlotType>,
}

impl Default for CapabilityDescriptor {
    /// No parameters; one OSC input and one OSC output.
    fn default() -> Self {
        Self {
            data: Vec::new(),
            inputs: vec![SlotType::Osc],
            outputs: vec![SlotType::Osc],
        }
    }
}

impl CapabilityDescriptor {
    /// Parse and validate a declaration. Any authoring error fails the
    /// whole descriptor.
    pub fn parse(text: &str) -> Result<Self, CapabilityError> {
        let root = ConfigNode::parse(text)?;
        Self::from_tree(&root)
    }

    pub fn from_tree(root: &ConfigNode) -> Result<Self, CapabilityError> {
        let data = match root.locate("capabilities") {
            Some(caps) => caps
                .children_named("data")
                .map(DataEntry::from_node)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let inputs = slots(root, "inputs", "input")?;
        let outputs = slots(root, "outputs", "output")?;
        Ok(Self {
            data,
            inputs,
            outputs,
        })
    }

    /// Rebuild the declaration tree, current values included.
    pub fn to_tree(&self) -> ConfigNode {
        let mut root = ConfigNode::new("root");
        let caps = root.push(ConfigNode::new("capabilities"));
        for entry in &self.data {
            caps.push(entry.to_node());
        }
        for (section, item, list) in [
            ("inputs", "input", &self.inputs),
            ("outputs", "output", &self.outputs),
        ] {
            let node = root.push(ConfigNode::new(section));
            for slot in list {
                let mut child = ConfigNode::new(item);
                child.push(ConfigNode::with_value("type", slot.as_str()));
                node.push(child);
            }
        }
        root
    }

    pub fn data(&self) -> &[DataEntry] {
        &self.data
    }

    pub fn entry(&self, name: &str) -> Option<&DataEntry> {
        self.data.iter().find(|e| e.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.entry(name).and_then(|e| e.value.as_deref())
    }

    pub fn inputs(&self) -> &[SlotType] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[SlotType] {
        &self.outputs
    }

    /// Write a new text value into `entry` and return the API call the
    /// backend must receive, if the entry declares one.
    ///
    /// Numbers clamp to `[min, max]` when both bounds are declared. A
    /// trigger sends its command with no argument; a media control sends
    /// the text itself as the command.
    pub fn apply_change(
        &mut self,
        entry: &str,
        text: &str,
    ) -> Result<Option<ApiCall>, CapabilityError> {
        let data = self
            .data
            .iter_mut()
            .find(|e| e.name == entry)
            .ok_or_else(|| CapabilityError::UnknownEntry(entry.to_string()))?;

        match &data.kind {
            DataKind::Trigger => {
                return Ok(data.api.as_ref().map(|api| ApiCall::new(&api.call)));
            }
            DataKind::MediaControl => {
                let command = text.trim();
                return Ok((!command.is_empty()).then(|| ApiCall::new(command)));
            }
            DataKind::Unsupported(_) => {
                data.value = Some(text.to_string());
                return Ok(None);
            }
            _ => {}
        }

        // Nothing is stored unless the value also fits the API argument.
        let stored = data.normalise(text)?;
        let call = match &data.api {
            Some(api) => {
                let argument = match api.value_tag {
                    Some(tag) => typed_argument(data, tag, &stored)?,
                    None => Value::Str(stored.clone()),
                };
                Some(ApiCall {
                    command: api.call.clone(),
                    argument: Some(argument),
                })
            }
            None => None,
        };
        data.value = Some(stored);
        Ok(call)
    }

    /// Current values of every entry that holds one, in declaration order.
    pub fn dump_values(&self) -> Vec<String> {
        self.data.iter().filter_map(|e| e.value.clone()).collect()
    }

    /// Re-apply persisted values in declaration order. Each value goes
    /// through [`apply_change`](Self::apply_change), so the returned API
    /// calls are exactly those a live edit would produce.
    pub fn restore_values<I, S>(&mut self, values: I) -> Result<Vec<ApiCall>, CapabilityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: Vec<String> = self
            .data
            .iter()
            .filter(|e| e.value.is_some())
            .map(|e| e.name.clone())
            .collect();

        let mut calls = Vec::new();
        for (name, value) in targets.iter().zip(values) {
            if let Some(call) = self.apply_change(name, value.as_ref())? {
                calls.push(call);
            }
        }
        Ok(calls)
    }
}

fn typed_argument(
    entry: &DataEntry,
    tag: ApiValueTag,
    stored: &str,
) -> Result<Value, CapabilityError> {
    let invalid = || CapabilityError::InvalidValue {
        entry: entry.name.clone(),
        kind: entry.kind.clone(),
        value: stored.to_string(),
    };
    let number = || stored.trim().parse::<f64>().map_err(|_| invalid());
    let within = |v: f64, lo: f64, hi: f64| {
        if v.is_finite() && (lo..=hi).contains(&v) {
            Ok(v)
        } else {
            Err(invalid())
        }
    };
    Ok(match tag {
        ApiValueTag::Int32 => {
            Value::Int32(within(number()?.trunc(), i32::MIN as f64, i32::MAX as f64)? as i32)
        }
        ApiValueTag::Int64 => match stored.trim().parse::<i64>() {
            Ok(v) => Value::Int64(v),
            Err(_) => Value::Int64(within(number()?.trunc(), i64::MIN as f64, i64::MAX as f64)? as i64),
        },
        ApiValueTag::Float32 => {
            Value::Float32(within(number()?, f32::MIN as f64, f32::MAX as f64)? as f32)
        }
        ApiValueTag::Float64 => Value::Float64(number()?),
        ApiValueTag::Str => Value::Str(stored.to_string()),
        ApiValueTag::Char => Value::Char(stored.chars().next().ok_or_else(invalid)?),
        ApiValueTag::Bool => Value::Bool(parse_bool(stored).ok_or_else(invalid)?),
    })
}

fn slots(root: &ConfigNode, section: &str, item: &str) -> Result<Vec<SlotType>, CapabilityError> {
    let Some(node) = root.locate(section) else {
        return Ok(Vec::new());
    };
    node.children_named(item)
        .map(|slot| {
            let text = slot
                .locate_value("type")
                .ok_or_else(|| CapabilityError::MissingNode {
                    entry: item.to_string(),
                    node: "type",
                })?;
            let parsed = SlotType::parse(text);
            if let SlotType::Unsupported(other) = &parsed {
                warn!(slot = %item, kind = %other, "unsupported slot type");
            }
            Ok(parsed)
        })
        .collect()
}

/// Persisted form of one actor: canvas position followed by the value of
/// every capability entry that carries one, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub position: [f32; 2],
    pub values: Vec<String>,
}

impl ActorRecord {
    /// Flat field list: `x`, `y`, then the values.
    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = vec![
            format!("{:.6}", self.position[0]),
            format!("{:.6}", self.position[1]),
        ];
        fields.extend(self.values.iter().cloned());
        fields
    }

    /// Inverse of [`to_fields`](Self::to_fields). `None` when the position
    /// fields are missing or not numbers.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Option<Self> {
        let x = fields.first()?.as_ref().trim().parse().ok()?;
        let y = fields.get(1)?.as_ref().trim().parse().ok()?;
        Some(Self {
            position: [x, y],
            values: fields[2..].iter().map(|f| f.as_ref().to_string()).collect(),
        })
    }
}
