//! `Name(key=value, key=value, ...)` record parser
//!
//! Some workflow backends serialize their event objects with a
//! `toString()`-style format and ship that string as the `content` of an SSE
//! JSON payload:
//!
//! ```text
//! WorkflowEventMessage(content=嘿, nodeTitle=结束, nodeSeqID=0, nodeIsFinish=false, token=null, ext=null, usage=null)
//! ```
//!
//! Grammar:
//!
//! ```text
//! record := name '(' fields? ')'
//! fields := field (',' field)*
//! field  := ws key ws '=' value
//! key    := [A-Za-z_][A-Za-z0-9_]*
//! ```
//!
//! A value runs until a `,` that is followed by `ws key ws '='`, or until the
//! record's closing `)`. Values opening with `{`, `[`, `(` or a quote are
//! structured: their delimiters must balance and quoted spans are opaque, so
//! commas inside them never split. Other values are free text and may hold
//! any character, including commas and parentheses.

use thiserror::Error;

/// Malformed record input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrapperError {
    #[error("missing '(' after record name")]
    MissingOpenParen,
    #[error("invalid record name '{0}'")]
    InvalidName(String),
    #[error("record is not closed with ')'")]
    MissingCloseParen,
    #[error("unbalanced '{0}' in structured value")]
    Unbalanced(char),
    #[error("unterminated {0} quote in structured value")]
    UnterminatedQuote(char),
    #[error("field '{0}' has no '='")]
    MissingEquals(String),
    #[error("invalid field key '{0}'")]
    InvalidKey(String),
}

/// Typed view of one raw field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    /// Balanced `{...}`, `[...]` or `(...)` text, kept verbatim
    Nested(String),
    Text(String),
}

impl FieldValue {
    pub fn classify(raw: &str) -> Self {
        let t = raw.trim();
        match t {
            "null" => return FieldValue::Null,
            "true" => return FieldValue::Bool(true),
            "false" => return FieldValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = t.parse::<i64>() {
            return FieldValue::Integer(n);
        }
        if t.starts_with(['{', '[', '(']) {
            return FieldValue::Nested(t.to_string());
        }
        FieldValue::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

/// Raw record: name plus ordered `(key, raw value)` pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperRecord {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

impl WrapperRecord {
    pub fn parse(input: &str) -> Result<Self, WrapperError> {
        let s = input.trim();
        let open = s.find('(').ok_or(WrapperError::MissingOpenParen)?;
        let name = s[..open].trim();
        if !is_ident(name) {
            return Err(WrapperError::InvalidName(name.to_string()));
        }
        if !s.ends_with(')') || s.len() - 1 <= open {
            return Err(WrapperError::MissingCloseParen);
        }
        let inner = &s[open + 1..s.len() - 1];

        Ok(Self {
            name: name.to_string(),
            fields: parse_fields(inner)?,
        })
    }

    /// Raw value of the first field named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Cheap shape check: `Ident(` ... `)`.
pub fn looks_like_record(input: &str) -> bool {
    let s = input.trim();
    match s.find('(') {
        Some(open) => is_ident(&s[..open]) && s.ends_with(')') && s.len() - 1 > open,
        None => false,
    }
}

/// Workflow event carried inside a wrapped `content` string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowEventMessage {
    pub content: Option<String>,
    pub node_title: Option<String>,
    pub node_seq_id: Option<i64>,
    pub node_is_finish: Option<bool>,
    pub token: Option<FieldValue>,
    pub ext: Option<FieldValue>,
    pub usage: Option<FieldValue>,
    /// Fields this type does not know about, in input order
    pub extra: Vec<(String, FieldValue)>,
}

impl WorkflowEventMessage {
    pub fn parse(input: &str) -> Result<Self, WrapperError> {
        Ok(Self::from_record(WrapperRecord::parse(input)?))
    }

    pub fn from_record(record: WrapperRecord) -> Self {
        let mut msg = Self::default();
        for (key, raw) in record.fields {
            match key.as_str() {
                "content" => msg.content = text_value(&raw),
                "nodeTitle" => msg.node_title = text_value(&raw),
                "nodeSeqID" => {
                    msg.node_seq_id = match FieldValue::classify(&raw) {
                        FieldValue::Integer(n) => Some(n),
                        _ => None,
                    }
                }
                "nodeIsFinish" => {
                    msg.node_is_finish = match FieldValue::classify(&raw) {
                        FieldValue::Bool(b) => Some(b),
                        _ => None,
                    }
                }
                "token" => msg.token = typed_value(&raw),
                "ext" => msg.ext = typed_value(&raw),
                "usage" => msg.usage = typed_value(&raw),
                _ => msg.extra.push((key, FieldValue::classify(&raw))),
            }
        }
        msg
    }
}

fn text_value(raw: &str) -> Option<String> {
    if raw.trim() == "null" {
        None
    } else {
        Some(raw.to_string())
    }
}

fn typed_value(raw: &str) -> Option<FieldValue> {
    Some(FieldValue::classify(raw)).filter(|v| !v.is_null())
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// True when `rest` opens with `ws key ws '='`.
fn starts_field(rest: &str) -> bool {
    let rest = rest.trim_start();
    let key_len = rest
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    if key_len == 0 || !is_ident(&rest[..key_len]) {
        return false;
    }
    rest[key_len..].trim_start().starts_with('=')
}

fn parse_fields(inner: &str) -> Result<Vec<(String, String)>, WrapperError> {
    let mut fields = Vec::new();
    if inner.trim().is_empty() {
        return Ok(fields);
    }

    let mut rest = inner;
    loop {
        let eq = rest
            .find('=')
            .ok_or_else(|| WrapperError::MissingEquals(rest.trim().to_string()))?;
        let key = rest[..eq].trim();
        if !is_ident(key) {
            return Err(WrapperError::InvalidKey(key.to_string()));
        }
        let (value, next) = scan_value(&rest[eq + 1..])?;
        fields.push((key.to_string(), value.to_string()));
        match next {
            Some(r) => rest = r,
            None => break,
        }
    }
    Ok(fields)
}

/// Split one value off the front of `s`; returns the value and the text after
/// its terminating comma, if any.
fn scan_value(s: &str) -> Result<(&str, Option<&str>), WrapperError> {
    let structured = s.trim_start().starts_with(['{', '[', '(', '"', '\'']);
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if structured {
            match c {
                '"' | '\'' => {
                    quote = Some(c);
                    continue;
                }
                '{' | '[' | '(' => stack.push(c),
                '}' | ']' | ')' => match stack.pop() {
                    Some(open) if closes(open, c) => {}
                    _ => return Err(WrapperError::Unbalanced(c)),
                },
                _ => {}
            }
        }

        if c == ',' && stack.is_empty() && starts_field(&s[i + 1..]) {
            return Ok((&s[..i], Some(&s[i + 1..])));
        }
    }

    if let Some(q) = quote {
        return Err(WrapperError::UnterminatedQuote(q));
    }
    if let Some(open) = stack.last() {
        return Err(WrapperError::Unbalanced(*open));
    }
    Ok((s, None))
}

fn closes(open: char, close: char) -> bool {
    matches!((open, close), ('{', '}') | ('[', ']') | ('(', ')'))
}
