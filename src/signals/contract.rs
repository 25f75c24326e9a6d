//! Construction contracts and field prototypes
//!
//! A [`Contract`] states which fields a variant requires, which it accepts, the
//! defaults merged in at construction and the alternative groups of which at
//! least one must be present. The prototype part ([`Shape`] per field) is
//! advisory and only checked by [`Signal::validate`](super::Signal::validate).

use std::collections::{BTreeMap, BTreeSet};

use super::registry::{Builtin, Registry};
use crate::error::{BotError, BotResult, ValidationWarning};
use crate::value_objects::{Primitive, Value};

/// Expected shape of a field value
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Int,
    Float,
    Bool,
    Str,
    Null,
    /// Any list
    List,
    /// Any map
    Map,
    /// Compiled regular expression
    Pattern,
    /// Primitive type marker
    TypeMarker,
    /// Named scoring capability
    Scorer,
    /// A signal (or variant reference) descending from the named variant
    Signal(String),
    /// Every item of the value (list semantics) matches one of the shapes
    OneOf(Vec<Shape>),
    /// Every item of the value (list semantics) matches the shape
    ListOf(Box<Shape>),
    /// Every value of a map matches the shape
    MapOf(Box<Shape>),
}

impl Shape {
    pub fn signal(variant: &str) -> Self {
        Shape::Signal(variant.to_string())
    }

    pub fn list_of(shape: Shape) -> Self {
        Shape::ListOf(Box::new(shape))
    }

    pub fn map_of(shape: Shape) -> Self {
        Shape::MapOf(Box::new(shape))
    }

    /// Everything a matcher accepts as an option
    pub fn options() -> Self {
        Shape::OneOf(vec![
            Shape::Int,
            Shape::Float,
            Shape::TypeMarker,
            Shape::Str,
            Shape::Pattern,
            Shape::signal("NamedEntity"),
            Shape::Map,
            Shape::Bool,
            Shape::Scorer,
        ])
    }

    /// Whether `value` conforms to this shape
    pub fn accepts(&self, value: &Value, registry: &Registry) -> bool {
        match self {
            Shape::Int => matches!(value, Value::Int(_) | Value::Type(Primitive::Int)),
            Shape::Float => matches!(value, Value::Float(_) | Value::Type(Primitive::Float)),
            Shape::Bool => matches!(value, Value::Bool(_) | Value::Type(Primitive::Bool)),
            Shape::Str => matches!(value, Value::Str(_) | Value::Type(Primitive::Str)),
            Shape::Null => value.is_null(),
            Shape::List => matches!(value, Value::List(_)),
            Shape::Map => matches!(value, Value::Map(_)),
            Shape::Pattern => matches!(value, Value::Regex(_)),
            Shape::TypeMarker => matches!(value, Value::Type(_)),
            Shape::Scorer => matches!(value, Value::Scorer(_)),
            Shape::Signal(ancestor) => match value {
                Value::Signal(signal) => signal.is_a(ancestor),
                Value::Variant(name) => registry.is_relative(name, ancestor),
                _ => false,
            },
            Shape::OneOf(shapes) => value
                .items()
                .into_iter()
                .all(|item| shapes.iter().any(|shape| shape.accepts(item, registry))),
            Shape::ListOf(shape) => value
                .items()
                .into_iter()
                .all(|item| shape.accepts(item, registry)),
            Shape::MapOf(shape) => match value {
                Value::Map(map) => map.values().all(|item| shape.accepts(item, registry)),
                _ => false,
            },
        }
    }
}

/// Construction contract of a variant
#[derive(Debug, Clone, Default)]
pub struct Contract {
    required: BTreeSet<String>,
    optional: BTreeSet<String>,
    defaults: BTreeMap<String, Value>,
    alternatives: Vec<BTreeSet<String>>,
    prototype: BTreeMap<String, Shape>,
}

fn key_set(keys: &[&str]) -> BTreeSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

impl Contract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, keys: &[&str]) -> Self {
        self.required.extend(key_set(keys));
        self
    }

    pub fn optional(mut self, keys: &[&str]) -> Self {
        self.optional.extend(key_set(keys));
        self
    }

    pub fn default_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.to_string(), value.into());
        self
    }

    /// Add an alternative group; at least one group must be fully present
    pub fn alternative(mut self, keys: &[&str]) -> Self {
        self.alternatives.push(key_set(keys));
        self
    }

    pub fn shape(mut self, key: &str, shape: Shape) -> Self {
        self.prototype.insert(key.to_string(), shape);
        self
    }

    /// Whether a field is part of the contract (private `_` fields always are)
    pub fn allows(&self, key: &str) -> bool {
        key.starts_with('_')
            || self.required.contains(key)
            || self.optional.contains(key)
            || self.defaults.contains_key(key)
            || self.alternatives.iter().any(|group| group.contains(key))
    }

    /// Merge defaults and enforce required fields and alternative groups.
    ///
    /// Returns the fields the contract does not know about.
    pub(crate) fn complete(
        &self,
        variant: &str,
        fields: &mut BTreeMap<String, Value>,
    ) -> BotResult<Vec<String>> {
        for (key, value) in &self.defaults {
            fields.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|key| !fields.contains_key(key.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(BotError::schema(
                variant,
                format!("missing keys: {}", missing.join(", ")),
            ));
        }

        if !self.alternatives.is_empty()
            && !self
                .alternatives
                .iter()
                .any(|group| group.iter().all(|key| fields.contains_key(key)))
        {
            let groups: Vec<String> = self
                .alternatives
                .iter()
                .map(|group| group.iter().cloned().collect::<Vec<_>>().join(" "))
                .collect();
            return Err(BotError::schema(
                variant,
                format!("missing keys ({})", groups.join(" or ")),
            ));
        }

        Ok(fields
            .keys()
            .filter(|key| !self.allows(key))
            .cloned()
            .collect())
    }

    /// Advisory shape check of every field against the prototype
    pub(crate) fn check_shapes(
        &self,
        variant: &str,
        fields: &BTreeMap<String, Value>,
        registry: &Registry,
    ) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for (key, value) in fields {
            if key.starts_with('_') {
                continue;
            }
            if !self.allows(key) {
                warnings.push(ValidationWarning {
                    variant: variant.to_string(),
                    field: key.clone(),
                    message: "unknown field".to_string(),
                });
                continue;
            }
            if value.is_null() && !self.required.contains(key) {
                continue;
            }
            if let Some(shape) = self.prototype.get(key) {
                if !shape.accepts(value, registry) {
                    warnings.push(ValidationWarning {
                        variant: variant.to_string(),
                        field: key.clone(),
                        message: format!("wrong shape {value:?}, expected {shape:?}"),
                    });
                }
            }
        }
        warnings
    }
}

/// Contract of each builtin variant
pub(crate) fn builtin_contract(builtin: Builtin) -> Contract {
    let signals = || Shape::list_of(Shape::signal("Signal"));
    let event = || Shape::signal("Event");
    match builtin {
        Builtin::Signal
        | Builtin::Check
        | Builtin::Condition
        | Builtin::Action
        | Builtin::Stop
        | Builtin::Restart
        | Builtin::Echo
        | Builtin::FirstMessage
        | Builtin::NonText => match builtin.parent() {
            Some(Builtin::Intent) => builtin_contract(Builtin::Intent),
            _ => Contract::new(),
        },
        Builtin::NamedEntity => Contract::new()
            .required(&["name"])
            .shape("name", Shape::Str),
        Builtin::Message => Contract::new()
            .optional(&["text", "image", "voice", "video"])
            .default_value("text", "")
            .shape("text", Shape::Str)
            .shape("image", Shape::Str)
            .shape("voice", Shape::Str)
            .shape("video", Shape::Str),
        Builtin::Desire => Contract::new()
            .required(&["actions"])
            .shape("actions", signals()),
        Builtin::Event => Contract::new()
            .required(&["signal"])
            .optional(&["type"])
            .shape("signal", Shape::list_of(Shape::signal("Signal")))
            .shape("type", Shape::Str),
        Builtin::Trigger => Contract::new()
            .required(&["condition", "actions"])
            .default_value("triggered", false)
            .default_value("instant", false)
            .default_value("n", 1)
            .shape("condition", Shape::list_of(Shape::signal("Condition")))
            .shape("actions", signals())
            .shape("instant", Shape::Bool)
            .shape("triggered", Shape::Bool)
            .shape("n", Shape::Int),
        Builtin::Response => Contract::new()
            .required(&["confidence", "match", "message"])
            .optional(&["entities"])
            .shape("confidence", Shape::OneOf(vec![Shape::Float, Shape::Int]))
            .shape("match", Shape::OneOf(vec![Shape::Str, Shape::Null]))
            .shape("message", Shape::signal("Message"))
            .shape("entities", Shape::map_of(Shape::Str)),
        Builtin::TextCondition => Contract::new()
            .required(&["event", "options"])
            .shape("event", event())
            .shape("options", Shape::options()),
        Builtin::EventCondition => Contract::new()
            .required(&["event"])
            .shape("event", event()),
        Builtin::CountCondition => Contract::new()
            .required(&["event", "n"])
            .shape("event", event())
            .shape("n", Shape::Int),
        Builtin::TimeCondition => Contract::new()
            .required(&["time"])
            .shape("time", Shape::Int),
        Builtin::IntervalCondition => Contract::new()
            .required(&["interval"])
            .optional(&["time"])
            .shape("interval", Shape::Int)
            .shape("time", Shape::Int),
        Builtin::Clear => Contract::new()
            .required(&["area"])
            .shape("area", Shape::list_of(Shape::Str)),
        Builtin::Say => Contract::new()
            .optional(&["as_is", "delay", "delay_coef"])
            .alternative(&["text"])
            .alternative(&["options"])
            .shape("text", Shape::list_of(Shape::Str))
            .shape("options", Shape::list_of(Shape::Str))
            .shape("as_is", Shape::Bool)
            .shape("delay", Shape::Int)
            .shape("delay_coef", Shape::OneOf(vec![Shape::Float, Shape::Int])),
        Builtin::Ask => Contract::new()
            .optional(&["actions", "store", "rename"])
            .alternative(&["text"])
            .alternative(&["options"])
            .shape("text", Shape::Str)
            .shape("options", Shape::options())
            .shape(
                "actions",
                Shape::OneOf(vec![Shape::Map, Shape::signal("Signal")]),
            )
            .shape("store", Shape::OneOf(vec![Shape::Bool, Shape::Map]))
            .shape("rename", Shape::map_of(Shape::Str)),
        Builtin::Clarify => Contract::new()
            .required(&["response", "ask"])
            .optional(&["skip", "text"])
            .shape("ask", Shape::signal("Ask"))
            .shape("response", Shape::signal("Response"))
            .shape("text", Shape::Str)
            .shape("skip", Shape::Bool),
        Builtin::Confirm => Contract::new()
            .required(&["yes"])
            .optional(&["no", "text"])
            .shape("text", Shape::Str)
            .shape("yes", signals())
            .shape("no", signals()),
        Builtin::Store => Contract::new()
            .required(&["data"])
            .shape("data", Shape::OneOf(vec![Shape::Map, Shape::List])),
        Builtin::SetTrigger => Contract::new()
            .required(&["trigger"])
            .shape("trigger", Shape::signal("Trigger")),
        Builtin::Pause => Contract::new()
            .required(&["condition"])
            .optional(&["instant"])
            .shape("condition", Shape::list_of(Shape::signal("Condition")))
            .shape("instant", Shape::Bool),
        Builtin::Graph => Contract::new()
            .required(&["transitions", "state"])
            .optional(&["final"])
            .shape("transitions", Shape::map_of(Shape::signal("Ask")))
            .shape("state", Shape::Str)
            .shape("final", Shape::Str),
        Builtin::Attend => Contract::new()
            .required(&["ask", "actions"])
            .optional(&["confirm_text"])
            .default_value("store", true)
            .shape("ask", Shape::list_of(Shape::signal("Ask")))
            .shape("actions", signals())
            .shape("confirm_text", Shape::Str),
        Builtin::Intent => Contract::new()
            .required(&["message"])
            .shape("message", Shape::signal("Message")),
    }
}
