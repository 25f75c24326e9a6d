//! Variant registry
//!
//! Every signal belongs to a named variant. Variants form a single-rooted
//! hierarchy; a variant's [`Kind`] is fixed when it is registered and comes
//! from the first of `Condition`, `Action` or `Intent` found in its ancestry.
//! Custom variants inherit the contract and the runtime behaviour of their
//! nearest builtin ancestor.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::Kind;
use super::contract::{Contract, builtin_contract};
use crate::error::{BotError, BotResult};
use crate::intents::{self, Intent};
use crate::matcher::Scorer;
use crate::signals::Signal;
use crate::value_objects::Value;

/// Builtin variants, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Signal,
    Check,
    NamedEntity,
    Message,
    Desire,
    Event,
    Trigger,
    Response,
    Condition,
    TextCondition,
    EventCondition,
    CountCondition,
    TimeCondition,
    IntervalCondition,
    Action,
    Clear,
    Say,
    Ask,
    Clarify,
    Confirm,
    Store,
    SetTrigger,
    Pause,
    Graph,
    Attend,
    Intent,
    Stop,
    Restart,
    Echo,
    FirstMessage,
    NonText,
}

impl Builtin {
    pub const ALL: [Builtin; 31] = [
        Builtin::Signal,
        Builtin::Check,
        Builtin::NamedEntity,
        Builtin::Message,
        Builtin::Desire,
        Builtin::Event,
        Builtin::Trigger,
        Builtin::Response,
        Builtin::Condition,
        Builtin::TextCondition,
        Builtin::EventCondition,
        Builtin::CountCondition,
        Builtin::TimeCondition,
        Builtin::IntervalCondition,
        Builtin::Action,
        Builtin::Clear,
        Builtin::Say,
        Builtin::Ask,
        Builtin::Clarify,
        Builtin::Confirm,
        Builtin::Store,
        Builtin::SetTrigger,
        Builtin::Pause,
        Builtin::Graph,
        Builtin::Attend,
        Builtin::Intent,
        Builtin::Stop,
        Builtin::Restart,
        Builtin::Echo,
        Builtin::FirstMessage,
        Builtin::NonText,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Signal => "Signal",
            Builtin::Check => "Check",
            Builtin::NamedEntity => "NamedEntity",
            Builtin::Message => "Message",
            Builtin::Desire => "Desire",
            Builtin::Event => "Event",
            Builtin::Trigger => "Trigger",
            Builtin::Response => "Response",
            Builtin::Condition => "Condition",
            Builtin::TextCondition => "TextCondition",
            Builtin::EventCondition => "EventCondition",
            Builtin::CountCondition => "CountCondition",
            Builtin::TimeCondition => "TimeCondition",
            Builtin::IntervalCondition => "IntervalCondition",
            Builtin::Action => "Action",
            Builtin::Clear => "Clear",
            Builtin::Say => "Say",
            Builtin::Ask => "Ask",
            Builtin::Clarify => "Clarify",
            Builtin::Confirm => "Confirm",
            Builtin::Store => "Store",
            Builtin::SetTrigger => "SetTrigger",
            Builtin::Pause => "Pause",
            Builtin::Graph => "Graph",
            Builtin::Attend => "Attend",
            Builtin::Intent => "Intent",
            Builtin::Stop => "Stop",
            Builtin::Restart => "Restart",
            Builtin::Echo => "Echo",
            Builtin::FirstMessage => "FirstMessage",
            Builtin::NonText => "NonText",
        }
    }

    pub fn parent(self) -> Option<Builtin> {
        match self {
            Builtin::Signal => None,
            Builtin::Check
            | Builtin::NamedEntity
            | Builtin::Message
            | Builtin::Desire
            | Builtin::Event
            | Builtin::Trigger
            | Builtin::Response
            | Builtin::Condition
            | Builtin::Action
            | Builtin::Intent => Some(Builtin::Signal),
            Builtin::TextCondition
            | Builtin::EventCondition
            | Builtin::CountCondition
            | Builtin::TimeCondition
            | Builtin::IntervalCondition => Some(Builtin::Condition),
            Builtin::Clear
            | Builtin::Say
            | Builtin::Ask
            | Builtin::Clarify
            | Builtin::Confirm
            | Builtin::Store
            | Builtin::SetTrigger
            | Builtin::Pause
            | Builtin::Graph
            | Builtin::Attend => Some(Builtin::Action),
            Builtin::Stop
            | Builtin::Restart
            | Builtin::Echo
            | Builtin::FirstMessage
            | Builtin::NonText => Some(Builtin::Intent),
        }
    }
}

/// Definition of one variant
pub struct VariantSpec {
    name: String,
    ancestry: Vec<String>,
    builtin: Builtin,
    kind: Kind,
    contract: Arc<Contract>,
    intent: Option<Arc<dyn Intent>>,
}

impl VariantSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Nearest builtin ancestor (or the variant itself)
    pub fn builtin(&self) -> Builtin {
        self.builtin
    }

    /// Names from this variant up to the root
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    /// Subtype test: `self` is `ancestor` or descends from it
    pub fn is_a(&self, ancestor: &str) -> bool {
        self.ancestry.iter().any(|name| name == ancestor)
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Scoring and reaction capability of intent variants
    pub fn intent(&self) -> Option<&Arc<dyn Intent>> {
        self.intent.as_ref()
    }
}

impl fmt::Debug for VariantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantSpec")
            .field("name", &self.name)
            .field("ancestry", &self.ancestry)
            .field("kind", &self.kind)
            .field("intent", &self.intent.is_some())
            .finish()
    }
}

fn kind_of(ancestry: &[String]) -> Kind {
    for (name, kind) in [
        ("Condition", Kind::Condition),
        ("Action", Kind::Action),
        ("Intent", Kind::Intent),
    ] {
        if ancestry.iter().any(|a| a == name) {
            return kind;
        }
    }
    Kind::Signal
}

/// Closed set of variants and named scoring capabilities known to a bot
#[derive(Clone)]
pub struct Registry {
    specs: Vec<Arc<VariantSpec>>,
    index: HashMap<String, usize>,
    scorers: HashMap<String, Arc<dyn Scorer>>,
}

impl Registry {
    /// Shared registry holding only the builtin variants
    pub fn builtin() -> &'static Registry {
        static BUILTIN: OnceLock<Registry> = OnceLock::new();
        BUILTIN.get_or_init(Registry::bootstrap)
    }

    /// A fresh registry seeded with the builtin variants
    pub fn new() -> Self {
        Self::builtin().clone()
    }

    fn bootstrap() -> Self {
        let mut registry = Registry {
            specs: Vec::with_capacity(Builtin::ALL.len()),
            index: HashMap::new(),
            scorers: HashMap::new(),
        };
        for builtin in Builtin::ALL {
            let mut ancestry = vec![builtin.name().to_string()];
            if let Some(parent) = builtin.parent() {
                ancestry.extend(registry.specs[parent as usize].ancestry.iter().cloned());
            }
            let spec = VariantSpec {
                name: builtin.name().to_string(),
                kind: kind_of(&ancestry),
                ancestry,
                builtin,
                contract: Arc::new(builtin_contract(builtin)),
                intent: intents::builtin_intent(builtin),
            };
            registry
                .index
                .insert(spec.name.clone(), registry.specs.len());
            registry.specs.push(Arc::new(spec));
        }
        registry
    }

    /// Spec of a builtin variant
    pub fn builtin_spec(builtin: Builtin) -> Arc<VariantSpec> {
        Self::builtin().specs[builtin as usize].clone()
    }

    /// Register a variant inheriting the parent's contract
    pub fn register_variant(&mut self, name: &str, parent: &str) -> BotResult<Arc<VariantSpec>> {
        self.insert(name, parent, None, None)
    }

    /// Register a variant with its own contract
    pub fn register_variant_with(
        &mut self,
        name: &str,
        parent: &str,
        contract: Contract,
    ) -> BotResult<Arc<VariantSpec>> {
        self.insert(name, parent, Some(contract), None)
    }

    /// Register an intent variant backed by `intent`
    pub fn register_intent(
        &mut self,
        name: &str,
        intent: Arc<dyn Intent>,
    ) -> BotResult<Arc<VariantSpec>> {
        self.insert(name, Builtin::Intent.name(), None, Some(intent))
    }

    fn insert(
        &mut self,
        name: &str,
        parent: &str,
        contract: Option<Contract>,
        intent: Option<Arc<dyn Intent>>,
    ) -> BotResult<Arc<VariantSpec>> {
        if self.index.contains_key(name) {
            return Err(BotError::DuplicateVariant(name.to_string()));
        }
        let parent = self
            .resolve(parent)
            .cloned()
            .ok_or_else(|| BotError::UnknownVariant(parent.to_string()))?;

        let mut ancestry = vec![name.to_string()];
        ancestry.extend(parent.ancestry.iter().cloned());
        let spec = Arc::new(VariantSpec {
            name: name.to_string(),
            kind: kind_of(&ancestry),
            ancestry,
            builtin: parent.builtin,
            contract: contract.map(Arc::new).unwrap_or_else(|| parent.contract.clone()),
            intent: intent.or_else(|| parent.intent.clone()),
        });
        self.index.insert(name.to_string(), self.specs.len());
        self.specs.push(spec.clone());
        Ok(spec)
    }

    /// Register a named scoring capability usable as a matcher option
    pub fn register_scorer(&mut self, name: &str, scorer: Arc<dyn Scorer>) {
        self.scorers.insert(name.to_string(), scorer);
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<VariantSpec>> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    pub fn scorer(&self, name: &str) -> Option<&Arc<dyn Scorer>> {
        self.scorers.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<Kind> {
        self.resolve(name).map(|spec| spec.kind)
    }

    /// Whether `name` is `ancestor` or descends from it
    pub fn is_relative(&self, name: &str, ancestor: &str) -> bool {
        self.resolve(name).is_some_and(|spec| spec.is_a(ancestor))
    }

    /// Construct a signal of any registered variant
    pub fn signal<K, V, I>(&self, variant: &str, fields: I) -> BotResult<Signal>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let spec = self
            .resolve(variant)
            .cloned()
            .ok_or_else(|| BotError::UnknownVariant(variant.to_string()))?;
        Signal::build(spec, fields)
    }

    /// Intent variants with a scoring capability, in registration order
    pub fn intents(&self) -> impl Iterator<Item = &Arc<VariantSpec>> {
        self.specs.iter().filter(|spec| spec.intent.is_some())
    }

    pub fn variants(&self) -> impl Iterator<Item = &Arc<VariantSpec>> {
        self.specs.iter()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("variants", &self.specs.len())
            .field("scorers", &self.scorers.keys().collect::<Vec<_>>())
            .finish()
    }
}
