//! Indentation-structured configuration tree.
//!
//! The declaration format is line oriented: every line is either a bare
//! node name or `name = value`, children are indented four spaces deeper
//! than their parent, and `#` starts a comment. Values may be quoted with
//! double or single quotes.
//!
//! ```text
//! capabilities
//!     data
//!         name = "rate"
//!         type = "int"
//!         value = "5"
//! inputs
//!     input
//!         type = "OSC"
//! ```

use super::CapabilityError;
use std::fmt::Write as _;

const INDENT: usize = 4;

/// A named node with an optional value and ordered children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigNode {
    name: String,
    value: Option<String>,
    children: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            children: Vec::new(),
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }

    pub fn push(&mut self, child: ConfigNode) -> &mut ConfigNode {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// First direct child with this name.
    pub fn child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with this name, in declaration order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Walk a `/`-separated path of child names. A missing node is `None`,
    /// never an error; callers decide which nodes are mandatory.
    pub fn locate(&self, path: &str) -> Option<&ConfigNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Value of the node at `path`, if both exist.
    pub fn locate_value(&self, path: &str) -> Option<&str> {
        self.locate(path).and_then(ConfigNode::value)
    }

    /// Parse declaration text into a tree under an unnamed root.
    pub fn parse(text: &str) -> Result<ConfigNode, CapabilityError> {
        let mut root = ConfigNode::new("root");
        // Path of child indices from the root to the last node at each depth.
        let mut stack: Vec<usize> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = strip_comment(raw);
            if content.trim().is_empty() {
                continue;
            }
            if content.starts_with('\t') {
                return Err(CapabilityError::Indentation { line });
            }

            let indent = content.len() - content.trim_start_matches(' ').len();
            if indent % INDENT != 0 {
                return Err(CapabilityError::Indentation { line });
            }
            let depth = indent / INDENT;
            if depth > stack.len() {
                return Err(CapabilityError::Indentation { line });
            }
            stack.truncate(depth);

            let node = parse_line(content.trim(), line)?;
            let parent = stack
                .iter()
                .fold(&mut root, |node, i| &mut node.children[*i]);
            parent.children.push(node);
            stack.push(parent.children.len() - 1);
        }

        Ok(root)
    }

    /// Render back to declaration text. Children of the root start at
    /// column zero.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.write_text(&mut out, 0);
        }
        out
    }

    fn write_text(&self, out: &mut String, depth: usize) {
        let pad = " ".repeat(depth * INDENT);
        match &self.value {
            Some(value) => {
                let _ = writeln!(out, "{}{} = \"{}\"", pad, self.name, value.replace('"', "'"));
            }
            None => {
                let _ = writeln!(out, "{}{}", pad, self.name);
            }
        }
        for child in &self.children {
            child.write_text(out, depth + 1);
        }
    }
}

fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, ch) in line.char_indices() {
        match (quote, ch) {
            (None, '#') => return &line[..i],
            (None, '"') | (None, '\'') => quote = Some(ch),
            (Some(q), c) if q == c => quote = None,
            _ => {}
        }
    }
    line
}

fn parse_line(content: &str, line: usize) -> Result<ConfigNode, CapabilityError> {
    let Some((name, value)) = content.split_once('=') else {
        return check_name(content, line).map(ConfigNode::new);
    };
    let name = check_name(name.trim(), line)?;
    let value = value.trim();
    let value = match value.chars().next() {
        Some(q @ ('"' | '\'')) => {
            if value.len() < 2 || !value.ends_with(q) {
                return Err(CapabilityError::Syntax {
                    line,
                    reason: "unterminated quoted value".to_string(),
                });
            }
            &value[1..value.len() - 1]
        }
        _ => value,
    };
    Ok(ConfigNode::with_value(name, value))
}

fn check_name(name: &str, line: usize) -> Result<&str, CapabilityError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'));
    if valid {
        Ok(name)
    } else {
        Err(CapabilityError::Syntax {
            line,
            reason: format!("invalid node name '{}'", name),
        })
    }
}
