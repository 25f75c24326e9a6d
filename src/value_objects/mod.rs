//! Value objects for the dialog runtime
//!
//! [`Value`] is the payload type of every signal field. It is a JSON-like tree
//! extended with the few things conversation logic needs to keep distinct from
//! plain strings: nested signals, primitive type markers, variant references,
//! compiled patterns and named scoring capabilities.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{BotError, BotResult};
use crate::nlp::NlpResult;
use crate::signals::{Builtin, Signal};

/// A field value carried by a [`Signal`]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A nested concrete signal
    Signal(Box<Signal>),
    /// "Any value of this primitive type" marker
    Type(Primitive),
    /// Reference to a variant as a class-level template
    Variant(String),
    /// Compiled regular expression
    Regex(Pattern),
    /// Named scoring capability registered with the registry
    Scorer(String),
}

/// Primitive types usable as matcher markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Int,
    Float,
    Bool,
    Str,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
            Primitive::Str => "str",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Primitive::Int),
            "float" => Some(Primitive::Float),
            "bool" => Some(Primitive::Bool),
            "str" => Some(Primitive::Str),
            _ => None,
        }
    }

    /// Coerce raw text to this type, returning the accepted surface form
    pub fn coerce(self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        match self {
            Primitive::Int => trimmed.parse::<i64>().ok().map(|_| text.to_string()),
            Primitive::Float => trimmed.parse::<f64>().ok().map(|_| text.to_string()),
            Primitive::Bool => {
                let lower = text.to_lowercase();
                matches!(lower.as_str(), "true" | "false").then_some(lower)
            }
            Primitive::Str => Some(text.to_string()),
        }
    }
}

/// A regular expression that remembers how it was written
#[derive(Clone)]
pub struct Pattern {
    source: String,
    flags: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source` with inline `flags` (e.g. `"i"` for case-insensitive)
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> BotResult<Self> {
        let source = source.into();
        let flags = flags.into();
        let compiled = if flags.is_empty() {
            source.clone()
        } else {
            format!("(?{flags}){source}")
        };
        let regex = Regex::new(&compiled)?;
        Ok(Self {
            source,
            flags,
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "re({:?}, {:?})", self.source, self.flags)
    }
}

impl Value {
    /// Build a map value from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a compiled-pattern value
    pub fn pattern(source: &str) -> BotResult<Self> {
        Ok(Value::Regex(Pattern::new(source, "")?))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Python-ish truthiness used for flags such as `store`
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Value::Signal(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_signal_mut(&mut self) -> Option<&mut Signal> {
        match self {
            Value::Signal(s) => Some(s),
            _ => None,
        }
    }

    /// Treat a value as a list: null is empty, a scalar is a singleton,
    /// nulls inside a list are skipped.
    pub fn items(&self) -> Vec<&Value> {
        match self {
            Value::Null => Vec::new(),
            Value::List(items) => items.iter().filter(|v| !v.is_null()).collect(),
            other => vec![other],
        }
    }

    /// Signals reachable through [`Value::items`]
    pub fn signals(&self) -> Vec<Signal> {
        self.items()
            .into_iter()
            .filter_map(|v| v.as_signal().cloned())
            .collect()
    }

    /// Scalar rendering used for matches and option labels
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{f:.1}")),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
            _ => None,
        }
    }

    /// Whether this value is a literal that can be offered as a button
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Value::Str(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_)
        )
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Signal> for Value {
    fn from(value: Signal) -> Self {
        Value::Signal(Box::new(value))
    }
}

impl From<Primitive> for Value {
    fn from(value: Primitive) -> Self {
        Value::Type(value)
    }
}

impl From<Pattern> for Value {
    fn from(value: Pattern) -> Self {
        Value::Regex(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Inbound user message (text and media references)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub image: Option<String>,
    pub voice: Option<String>,
    pub video: Option<String>,
    /// Enrichment from the NLP collaborator; never persisted
    #[serde(skip)]
    pub nlp: Option<NlpResult>,
}

impl Message {
    /// Create a plain text message
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Attach NLP enrichment
    pub fn with_nlp(mut self, nlp: NlpResult) -> Self {
        self.nlp = Some(nlp);
        self
    }

    /// Lift into a `Message` signal
    pub fn to_signal(&self) -> Signal {
        let mut fields = vec![("text", Value::from(self.text.as_str()))];
        for (key, media) in [
            ("image", &self.image),
            ("voice", &self.voice),
            ("video", &self.video),
        ] {
            if let Some(media) = media {
                fields.push((key, Value::from(media.as_str())));
            }
        }
        let mut signal = Signal::assemble(Builtin::Message, fields);
        if let Some(nlp) = &self.nlp {
            signal.set_enrichment(nlp.clone());
        }
        signal
    }

    /// Read back from any signal carrying message fields
    pub fn from_signal(signal: &Signal) -> Self {
        Self {
            text: signal.str("text").unwrap_or_default().to_string(),
            image: signal.str("image").map(str::to_string),
            voice: signal.str("voice").map(str::to_string),
            video: signal.str("video").map(str::to_string),
            nlp: signal.enrichment().cloned(),
        }
    }
}

/// Outcome of matching a message against an options spec
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Best match, `None` when nothing matched
    pub matched: Option<String>,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Message that was scored
    pub message: Message,
    /// Named captures and synonym-group bindings
    pub entities: BTreeMap<String, String>,
}

impl Response {
    pub fn new(matched: Option<String>, confidence: f64, message: Message) -> Self {
        Self {
            matched,
            confidence,
            message,
            entities: BTreeMap::new(),
        }
    }

    /// Perfect answers are the only ones acted upon without clarification
    pub fn is_perfect(&self) -> bool {
        self.matched.is_some() && self.confidence > 0.95
    }

    /// Lift into a `Response` signal for persistence inside Clarify/Attend
    pub fn to_signal(&self) -> Signal {
        let mut fields = vec![
            ("match", Value::from(self.matched.clone())),
            ("confidence", Value::Float(self.confidence)),
            ("message", Value::from(self.message.to_signal())),
        ];
        if !self.entities.is_empty() {
            fields.push((
                "entities",
                Value::map(self.entities.iter().map(|(k, v)| (k.clone(), v.clone()))),
            ));
        }
        Signal::assemble(Builtin::Response, fields)
    }

    pub fn from_signal(signal: &Signal) -> BotResult<Self> {
        let message = signal
            .signal("message")
            .map(Message::from_signal)
            .ok_or_else(|| BotError::decode(format!("{} without message", signal.name())))?;
        let entities = signal
            .get("entities")
            .and_then(Value::as_map)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.render().map(|v| (k.clone(), v)))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            matched: signal.get("match").and_then(Value::render),
            confidence: signal.float("confidence").unwrap_or(0.0),
            message,
            entities,
        })
    }
}

/// Outbound record drained from the mouth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub delay: Option<i64>,
}

impl Utterance {
    pub(crate) fn from_signal(signal: &Signal) -> Self {
        Self {
            text: signal.str("text").map(str::to_string),
            options: signal
                .get("options")
                .map(|v| v.items().into_iter().filter_map(Value::render).collect())
                .unwrap_or_default(),
            delay: signal.int("delay"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_semantics() {
        assert!(Value::Null.items().is_empty());
        assert_eq!(Value::from("a").items().len(), 1);
        let list = Value::List(vec![Value::from(1), Value::Null, Value::from(2)]);
        assert_eq!(list.items().len(), 2);
    }

    #[test]
    fn test_primitive_coercion() {
        assert_eq!(Primitive::Int.coerce("42"), Some("42".to_string()));
        assert_eq!(Primitive::Int.coerce("two"), None);
        assert_eq!(Primitive::Float.coerce("4.2"), Some("4.2".to_string()));
        assert_eq!(Primitive::Bool.coerce("TRUE"), Some("true".to_string()));
        assert_eq!(Primitive::Bool.coerce("yes"), None);
    }

    #[test]
    fn test_pattern_equality_ignores_compilation() {
        let a = Pattern::new(r"(\d+)", "i").unwrap();
        let b = Pattern::new(r"(\d+)", "i").unwrap();
        assert_eq!(a, b);
        assert!(a.regex().is_match("ABC 12"));
    }

    #[test]
    fn test_response_perfect() {
        let message = Message::text("good");
        assert!(Response::new(Some("good".into()), 1.0, message.clone()).is_perfect());
        assert!(!Response::new(Some("good".into()), 0.95, message.clone()).is_perfect());
        assert!(!Response::new(None, 1.0, message).is_perfect());
    }

    #[test]
    fn test_response_signal_round_trip() {
        let mut response = Response::new(Some("bob".into()), 1.0, Message::text("i am bob"));
        response.entities.insert("name".into(), "bob".into());
        let back = Response::from_signal(&response.to_signal()).unwrap();
        assert_eq!(back, response);
    }
}
