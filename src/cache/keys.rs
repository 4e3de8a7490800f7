//! Query key derivation.
//!
//! A [`QueryKey`] is `(path, canonical input, kind)`. Path order is the route
//! and is kept verbatim; the input is reduced to canonical JSON text so that
//! structurally equal inputs compare and hash equal.

use std::fmt::{self, Write as _};

use serde_json::Value;

/// Top-level input fields that never participate in a key.
const INCIDENTAL_FIELDS: &[&str] = &["signal"];
/// Fields owned by infinite-query pagination; all pages share one key.
const CURSOR_FIELDS: &[&str] = &["cursor", "direction"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Query,
    Infinite,
}

impl QueryKind {
    fn as_str(self) -> &'static str {
        match self {
            QueryKind::Query => "query",
            QueryKind::Infinite => "infinite",
        }
    }
}

/// Canonical form of a call input.
///
/// `Absent` (no input supplied) never equals `Present("{}")` (an empty
/// object was supplied).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyInput {
    Absent,
    Present(String),
}

impl KeyInput {
    /// A `null` input is sent as no input, so it keys as [`KeyInput::Absent`].
    pub fn from_value(input: Option<&Value>, strip: &[&str]) -> Self {
        match input {
            None | Some(Value::Null) => KeyInput::Absent,
            Some(value) => {
                let mut text = String::new();
                write_canonical(value, strip, true, &mut text);
                KeyInput::Present(text)
            }
        }
    }
}

/// Cache index for one request's result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    path: Vec<String>,
    input: KeyInput,
    kind: QueryKind,
}

impl QueryKey {
    pub fn new<S: AsRef<str>>(path: &[S], input: Option<&Value>) -> Self {
        Self {
            path: owned_path(path),
            input: KeyInput::from_value(input, INCIDENTAL_FIELDS),
            kind: QueryKind::Query,
        }
    }

    /// Key for an infinite query; cursor fields are stripped from the input.
    pub fn infinite<S: AsRef<str>>(path: &[S], input: Option<&Value>) -> Self {
        let strip: Vec<&str> = INCIDENTAL_FIELDS
            .iter()
            .chain(CURSOR_FIELDS)
            .copied()
            .collect();
        Self {
            path: owned_path(path),
            input: KeyInput::from_value(input, &strip),
            kind: QueryKind::Infinite,
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn input(&self) -> &KeyInput {
        &self.input
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// True when `prefix` is a leading run of this key's path segments.
    pub fn starts_with<S: AsRef<str>>(&self, prefix: &[S]) -> bool {
        prefix.len() <= self.path.len()
            && prefix
                .iter()
                .zip(&self.path)
                .all(|(expected, actual)| expected.as_ref() == actual)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.path.join("."))?;
        match &self.input {
            KeyInput::Absent => Ok(()),
            KeyInput::Present(text) => write!(f, " {text}"),
        }
    }
}

/// Selects cached queries for invalidation, removal and cancellation.
///
/// The default filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    path: Vec<String>,
    input: Option<KeyInput>,
    kind: Option<QueryKind>,
    exact: bool,
}

impl QueryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Every query whose route begins with `path`.
    pub fn route<S: AsRef<str>>(path: &[S]) -> Self {
        Self {
            path: owned_path(path),
            ..Self::default()
        }
    }

    /// Exactly one key.
    pub fn exact(key: &QueryKey) -> Self {
        Self {
            path: key.path.clone(),
            input: Some(key.input.clone()),
            kind: Some(key.kind),
            exact: true,
        }
    }

    /// Narrow a route filter to one canonical input.
    pub fn with_input(mut self, input: Option<&Value>) -> Self {
        self.input = Some(KeyInput::from_value(input, INCIDENTAL_FIELDS));
        self
    }

    pub fn with_kind(mut self, kind: QueryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        let path_ok = if self.exact {
            key.path == self.path
        } else {
            key.starts_with(&self.path)
        };
        path_ok
            && self.kind.is_none_or(|kind| kind == key.kind)
            && self.input.as_ref().is_none_or(|input| *input == key.input)
    }
}

fn owned_path<S: AsRef<str>>(path: &[S]) -> Vec<String> {
    path.iter().map(|segment| segment.as_ref().to_owned()).collect()
}

/// Append the canonical JSON text of `value` to `out`.
///
/// Object keys are sorted, `null` object members are dropped at every depth,
/// and `strip` names are removed from the top-level object only.
fn write_canonical(value: &Value, strip: &[&str], top_level: bool, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map
                .iter()
                .filter(|(name, member)| {
                    !member.is_null() && !(top_level && strip.contains(&name.as_str()))
                })
                .collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));

            out.push('{');
            for (index, (name, member)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_string(name, out);
                out.push(':');
                write_canonical(member, strip, false, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, strip, false, out);
            }
            out.push(']');
        }
        Value::String(text) => write_string(text, out),
        Value::Number(number) => {
            let _ = write!(out, "{number}");
        }
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Null => out.push_str("null"),
    }
}

fn write_string(text: &str, out: &mut String) {
    // Value::String's Display is the escaped JSON literal.
    let _ = write!(out, "{}", Value::String(text.to_owned()));
}
