//! Typed builders for the builtin actions
//!
//! Each builder converts into a [`Signal`] that already satisfies its
//! variant's contract, so conversation scripts never go through the fallible
//! by-name constructor.

use std::collections::BTreeMap;

use crate::signals::{Builtin, Signal};
use crate::value_objects::Value;

/// Utter a text, optionally with buttons
#[derive(Debug, Clone, Default)]
pub struct Say {
    text: Value,
    options: Option<Value>,
    as_is: bool,
    delay: Option<i64>,
    delay_coef: Option<f64>,
}

impl Say {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Value::from(text.into()),
            ..Self::default()
        }
    }

    /// One of the alternatives is picked at random when uttered
    pub fn one_of<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self {
            text: Value::List(texts.into_iter().map(|t| Value::from(t.into())).collect()),
            ..Self::default()
        }
    }

    pub fn options<S: Into<String>>(mut self, options: impl IntoIterator<Item = S>) -> Self {
        self.options = Some(Value::List(
            options.into_iter().map(|o| Value::from(o.into())).collect(),
        ));
        self
    }

    /// Keep the text exactly as written
    pub fn as_is(mut self) -> Self {
        self.as_is = true;
        self
    }

    pub fn delay(mut self, delay_ms: i64) -> Self {
        self.delay = Some(delay_ms);
        self
    }

    pub fn delay_coef(mut self, coef: f64) -> Self {
        self.delay_coef = Some(coef);
        self
    }
}

impl From<Say> for Signal {
    fn from(say: Say) -> Self {
        let mut fields = vec![("text", say.text)];
        if let Some(options) = say.options {
            fields.push(("options", options));
        }
        if say.as_is {
            fields.push(("as_is", Value::Bool(true)));
        }
        if let Some(delay) = say.delay {
            fields.push(("delay", Value::Int(delay)));
        }
        if let Some(coef) = say.delay_coef {
            fields.push(("delay_coef", Value::Float(coef)));
        }
        Signal::assemble(Builtin::Say, fields)
    }
}

/// Question awaiting an answer
#[derive(Debug, Clone)]
pub struct Ask {
    text: Option<String>,
    options: Option<Value>,
    actions: Option<Value>,
    store: Option<Value>,
    rename: BTreeMap<String, Value>,
}

impl Ask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            options: None,
            actions: None,
            store: None,
            rename: BTreeMap::new(),
        }
    }

    /// A question without text, only buttons
    pub fn choice(options: impl Into<Value>) -> Self {
        Self {
            text: None,
            ..Self::new("")
        }
        .options(options)
    }

    pub fn options(mut self, options: impl Into<Value>) -> Self {
        self.options = Some(options.into());
        self
    }

    /// Actions run on any perfect answer
    pub fn actions(mut self, actions: Vec<Signal>) -> Self {
        self.actions = Some(Value::from(actions));
        self
    }

    /// Actions run when the answer matches `answer`
    pub fn on(mut self, answer: &str, actions: Vec<Signal>) -> Self {
        let mut keyed = match self.actions.take() {
            Some(Value::Map(keyed)) => keyed,
            _ => BTreeMap::new(),
        };
        keyed.insert(answer.to_string(), Value::from(actions));
        self.actions = Some(Value::Map(keyed));
        self
    }

    /// Do not store the answer in memory
    pub fn no_store(mut self) -> Self {
        self.store = Some(Value::Bool(false));
        self
    }

    /// Extra fields merged into the stored answer
    pub fn store_with(mut self, extra: Value) -> Self {
        self.store = Some(extra);
        self
    }

    /// Override one of `where`, `key`, `question`, `answer` or `match`
    pub fn rename(mut self, field: &str, name: &str) -> Self {
        self.rename.insert(field.to_string(), Value::from(name));
        self
    }
}

impl From<Ask> for Signal {
    fn from(ask: Ask) -> Self {
        let mut fields = Vec::new();
        if let Some(text) = ask.text {
            fields.push(("text", Value::from(text)));
        }
        if let Some(options) = ask.options {
            fields.push(("options", options));
        }
        if let Some(actions) = ask.actions {
            fields.push(("actions", actions));
        }
        if let Some(store) = ask.store {
            fields.push(("store", store));
        }
        if !ask.rename.is_empty() {
            fields.push(("rename", Value::Map(ask.rename)));
        }
        Signal::assemble(Builtin::Ask, fields)
    }
}

/// Yes/no question with an action list per answer
#[derive(Debug, Clone)]
pub struct Confirm {
    text: Option<String>,
    yes: Vec<Signal>,
    no: Option<Vec<Signal>>,
}

impl Confirm {
    pub fn new(yes: Vec<Signal>) -> Self {
        Self {
            text: None,
            yes,
            no: None,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn no(mut self, no: Vec<Signal>) -> Self {
        self.no = Some(no);
        self
    }
}

impl From<Confirm> for Signal {
    fn from(confirm: Confirm) -> Self {
        let mut fields = vec![("yes", Value::from(confirm.yes))];
        if let Some(no) = confirm.no {
            fields.push(("no", Value::from(no)));
        }
        if let Some(text) = confirm.text {
            fields.push(("text", Value::from(text)));
        }
        Signal::assemble(Builtin::Confirm, fields)
    }
}

/// Write data into memory; keys may be dotted paths
#[derive(Debug, Clone)]
pub struct Store {
    data: Value,
}

impl Store {
    pub fn new<K, V>(data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            data: Value::map(data),
        }
    }
}

impl From<Store> for Signal {
    fn from(store: Store) -> Self {
        Signal::assemble(Builtin::Store, [("data", store.data)])
    }
}

/// Arm a trigger in the Triggers area
#[derive(Debug, Clone)]
pub struct SetTrigger {
    trigger: Signal,
}

impl SetTrigger {
    pub fn new(trigger: impl Into<Signal>) -> Self {
        Self {
            trigger: trigger.into(),
        }
    }
}

impl From<SetTrigger> for Signal {
    fn from(set: SetTrigger) -> Self {
        Signal::assemble(Builtin::SetTrigger, [("trigger", Value::from(set.trigger))])
    }
}

/// Hold every queued action until the condition fires
#[derive(Debug, Clone)]
pub struct Pause {
    condition: Signal,
    instant: bool,
}

impl Pause {
    pub fn until(condition: impl Into<Signal>) -> Self {
        Self {
            condition: condition.into(),
            instant: false,
        }
    }

    pub fn instant(mut self) -> Self {
        self.instant = true;
        self
    }
}

impl From<Pause> for Signal {
    fn from(pause: Pause) -> Self {
        let mut signal = Signal::assemble(
            Builtin::Pause,
            [("condition", Value::from(pause.condition))],
        );
        if pause.instant {
            signal.set("instant", true);
        }
        signal
    }
}

/// Explicit state machine: each state is an Ask whose synonym groups name
/// the next state
#[derive(Debug, Clone)]
pub struct Graph {
    state: String,
    final_state: Option<String>,
    transitions: BTreeMap<String, Value>,
}

impl Graph {
    pub fn new(state: &str) -> Self {
        Self {
            state: state.to_string(),
            final_state: None,
            transitions: BTreeMap::new(),
        }
    }

    pub fn state(mut self, name: &str, ask: impl Into<Signal>) -> Self {
        self.transitions
            .insert(name.to_string(), Value::from(ask.into()));
        self
    }

    pub fn final_state(mut self, name: &str) -> Self {
        self.final_state = Some(name.to_string());
        self
    }
}

impl From<Graph> for Signal {
    fn from(graph: Graph) -> Self {
        let mut fields = vec![
            ("transitions", Value::Map(graph.transitions)),
            ("state", Value::from(graph.state)),
        ];
        if let Some(final_state) = graph.final_state {
            fields.push(("final", Value::from(final_state)));
        }
        Signal::assemble(Builtin::Graph, fields)
    }
}

/// Fill several questions from whatever the user says, in any order
#[derive(Debug, Clone)]
pub struct Attend {
    asks: Vec<Signal>,
    actions: Vec<Signal>,
    confirm_text: Option<String>,
    store: Value,
}

impl Attend {
    pub fn new(asks: Vec<Signal>, actions: Vec<Signal>) -> Self {
        Self {
            asks,
            actions,
            confirm_text: None,
            store: Value::Bool(true),
        }
    }

    /// Ask for confirmation first; `\1`..`\N` are replaced by the answers
    pub fn confirm_text(mut self, text: impl Into<String>) -> Self {
        self.confirm_text = Some(text.into());
        self
    }

    /// `false` disables storing, a map adds fields to the stored record
    pub fn store(mut self, store: impl Into<Value>) -> Self {
        self.store = store.into();
        self
    }
}

impl From<Attend> for Signal {
    fn from(attend: Attend) -> Self {
        let slots = attend.asks.len();
        let mut fields = vec![
            ("ask", Value::from(attend.asks)),
            ("actions", Value::from(attend.actions)),
            ("store", attend.store),
            ("_responses", Value::List(vec![Value::Null; slots])),
            ("_focus", Value::Null),
        ];
        if let Some(text) = attend.confirm_text {
            fields.push(("confirm_text", Value::from(text)));
        }
        Signal::assemble(Builtin::Attend, fields)
    }
}

/// Empty the named areas
#[derive(Debug, Clone)]
pub struct Clear {
    areas: Vec<String>,
}

impl Clear {
    pub fn areas(areas: &[&str]) -> Self {
        Self {
            areas: areas.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Every stateful area
    pub fn all() -> Self {
        Self::areas(&["*"])
    }
}

impl From<Clear> for Signal {
    fn from(clear: Clear) -> Self {
        Signal::assemble(Builtin::Clear, [("area", Value::from(clear.areas))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::Registry;

    #[test]
    fn test_builders_satisfy_contracts() {
        let registry = Registry::builtin();
        let signals: Vec<Signal> = vec![
            Say::new("hi").options(["a", "b"]).as_is().delay(10).into(),
            Ask::new("How are you?")
                .options(vec!["good", "bad"])
                .on("good", vec![Say::new("great").into()])
                .rename("where", "mood")
                .into(),
            Confirm::new(vec![Say::new("ok").into()]).text("sure?").into(),
            Store::new([("general.key", 1)]).into(),
            Graph::new("a")
                .state("a", Ask::new("<a>").options(Value::map([("b", vec!["goto b"])])))
                .state("b", Ask::new("<b>"))
                .final_state("b")
                .into(),
            Attend::new(vec![Ask::new("name?").into()], vec![Say::new("ok").into()]).into(),
            Clear::all().into(),
        ];
        for signal in signals {
            assert!(signal.validate(registry).is_empty(), "{signal:?}");
        }
    }

    #[test]
    fn test_keyed_actions_accumulate() {
        let ask: Signal = Ask::new("q")
            .on("yes", vec![Say::new("y").into()])
            .on("no", vec![Say::new("n").into()])
            .into();
        let keyed = ask.get("actions").and_then(Value::as_map).unwrap();
        assert_eq!(keyed.len(), 2);
    }

    #[test]
    fn test_choice_has_no_text() {
        let ask: Signal = Ask::choice(vec!["a", "b"]).into();
        assert!(!ask.has("text"));
        assert!(ask.has("options"));
    }
}
