//! Signals: the typed messages exchanged between areas
//!
//! A [`Signal`] is a field map tagged with its variant. Field access goes
//! through typed getters; the contract of the variant is enforced once at
//! construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{BotResult, ValidationWarning};
use crate::nlp::NlpResult;
use crate::text;
use crate::value_objects::Value;

pub mod contract;
pub mod registry;

pub use contract::{Contract, Shape};
pub use registry::{Builtin, Registry, VariantSpec};

/// Coarse classification of a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Signal,
    Condition,
    Action,
    Intent,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Signal => "Signal",
            Kind::Condition => "Condition",
            Kind::Action => "Action",
            Kind::Intent => "Intent",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged field map
#[derive(Clone)]
pub struct Signal {
    spec: Arc<VariantSpec>,
    fields: BTreeMap<String, Value>,
    enrichment: Option<Arc<NlpResult>>,
}

fn collect_fields<K, V, I>(fields: I) -> BTreeMap<String, Value>
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

impl Signal {
    /// Construct a signal, enforcing the variant's contract
    pub fn build<K, V, I>(spec: Arc<VariantSpec>, fields: I) -> BotResult<Self>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut fields = collect_fields(fields);
        let unknown = spec.contract().complete(spec.name(), &mut fields)?;
        if !unknown.is_empty() {
            debug!(variant = spec.name(), ?unknown, "unknown fields");
        }
        Ok(Self {
            spec,
            fields,
            enrichment: None,
        })
    }

    /// Construct a signal of a builtin variant by name
    pub fn new<K, V, I>(variant: &str, fields: I) -> BotResult<Self>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Registry::builtin().signal(variant, fields)
    }

    /// Construct a builtin signal from fields known to satisfy the contract
    pub(crate) fn assemble<K, V, I>(builtin: Builtin, fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let spec = Registry::builtin_spec(builtin);
        let mut fields = collect_fields(fields);
        if let Err(err) = spec.contract().complete(spec.name(), &mut fields) {
            warn!(%err, "assembled signal does not satisfy its contract");
        }
        Self {
            spec,
            fields,
            enrichment: None,
        }
    }

    /// Plain user message
    pub fn message(text: impl Into<String>) -> Self {
        Self::assemble(Builtin::Message, [("text", text.into())])
    }

    /// Event reporting that `signal` happened
    pub fn event(signal: Signal) -> Self {
        Self::assemble(Builtin::Event, [("signal", Value::from(signal))])
    }

    /// Event of a given type (e.g. `"done"`) about `signal`
    pub fn event_typed(signal: Signal, event_type: &str) -> Self {
        Self::assemble(
            Builtin::Event,
            [
                ("signal", Value::from(signal)),
                ("type", Value::from(event_type)),
            ],
        )
    }

    /// Event template matching any signal descending from `variant`
    pub fn event_on(variant: &str, event_type: Option<&str>) -> Self {
        let mut event = Self::assemble(
            Builtin::Event,
            [("signal", Value::Variant(variant.to_string()))],
        );
        if let Some(event_type) = event_type {
            event.set("type", event_type);
        }
        event
    }

    /// Carrier of pre-built actions
    pub fn desire(actions: Vec<Signal>) -> Self {
        Self::assemble(Builtin::Desire, [("actions", Value::from(actions))])
    }

    /// Slot lookup into the entities extracted by the NLP collaborator
    pub fn named_entity(name: &str) -> Self {
        Self::assemble(Builtin::NamedEntity, [("name", name)])
    }

    /// Empty signal used to wake time-based conditions
    pub fn check() -> Self {
        Self::assemble(Builtin::Check, Vec::<(String, Value)>::new())
    }

    pub fn spec(&self) -> &Arc<VariantSpec> {
        &self.spec
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn kind(&self) -> Kind {
        self.spec.kind()
    }

    pub fn builtin(&self) -> Builtin {
        self.spec.builtin()
    }

    /// Exact variant test
    pub fn is(&self, variant: &str) -> bool {
        self.spec.name() == variant
    }

    /// Subtype test
    pub fn is_a(&self, ancestor: &str) -> bool {
        self.spec.is_a(ancestor)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, Value> {
        self.fields
    }

    /// Whether the field is present, even if null
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Non-null field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn signal(&self, key: &str) -> Option<&Signal> {
        self.get(key).and_then(Value::as_signal)
    }

    pub fn signal_mut(&mut self, key: &str) -> Option<&mut Signal> {
        self.fields.get_mut(key).and_then(Value::as_signal_mut)
    }

    /// Field treated as a list (see [`Value::items`])
    pub fn items(&self, key: &str) -> Vec<&Value> {
        self.get(key).map(Value::items).unwrap_or_default()
    }

    /// Signals held by a field, cloned
    pub fn signals(&self, key: &str) -> Vec<Signal> {
        self.get(key).map(Value::signals).unwrap_or_default()
    }

    /// NLP enrichment attached to an inbound message
    pub fn enrichment(&self) -> Option<&NlpResult> {
        self.enrichment.as_deref()
    }

    pub fn set_enrichment(&mut self, nlp: NlpResult) {
        self.enrichment = Some(Arc::new(nlp));
    }

    /// Advisory structural validation against the variant's prototype
    pub fn validate(&self, registry: &Registry) -> Vec<ValidationWarning> {
        let mut warnings =
            self.spec
                .contract()
                .check_shapes(self.name(), &self.fields, registry);

        if self.is_a("CountCondition") {
            let bound_to_instance = self
                .signal("event")
                .and_then(|event| event.get("signal"))
                .is_some_and(|subject| matches!(subject, Value::Signal(_)));
            if bound_to_instance {
                warnings.push(ValidationWarning {
                    variant: self.name().to_string(),
                    field: "event".to_string(),
                    message: "counts work on variants only, use a variant reference or an EventCondition"
                        .to_string(),
                });
            }
        }

        for value in self.fields.values() {
            collect_nested(value, registry, &mut warnings);
        }
        warnings
    }

    /// Replace placeholders in every text-like field, recursing into nested signals
    pub fn substitute_text(&mut self, bindings: &[(String, String)]) {
        for value in self.fields.values_mut() {
            substitute_value(value, bindings);
        }
    }
}

fn collect_nested(value: &Value, registry: &Registry, warnings: &mut Vec<ValidationWarning>) {
    match value {
        Value::Signal(signal) => warnings.extend(signal.validate(registry)),
        Value::List(items) => items
            .iter()
            .for_each(|item| collect_nested(item, registry, warnings)),
        Value::Map(map) => map
            .values()
            .for_each(|item| collect_nested(item, registry, warnings)),
        _ => {}
    }
}

fn substitute_value(value: &mut Value, bindings: &[(String, String)]) {
    match value {
        Value::Str(s) => *s = text::substitute(s, bindings),
        Value::List(items) => items
            .iter_mut()
            .for_each(|item| substitute_value(item, bindings)),
        Value::Signal(signal) => signal.substitute_text(bindings),
        _ => {}
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.spec.name() == other.spec.name() && self.fields == other.fields
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::Str(s) => write!(f, "{key}={s:?}")?,
                Value::Signal(s) => write!(f, "{key}={s:?}")?,
                other => write!(f, "{key}={other:?}")?,
            }
        }
        f.write_str(")")
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
