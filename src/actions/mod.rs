//! Actions and the conversation state machines
//!
//! Actions are plain [`Signal`]s of the `Action` kind. This module gives them
//! behaviour: how an awaiting action reacts to a [`Response`]
//! ([`respond`]), what options it listens for ([`options_of`]) and how it is
//! rendered for the user ([`to_say`]).

use tracing::debug;

use crate::clock::Clock;
use crate::config::BotConfig;
use crate::error::BotResult;
use crate::signals::{Builtin, Kind, Registry, Signal};
use crate::text::fill;
use crate::value_objects::{Response, Value};

pub mod ask;
pub mod attend;
pub mod builders;
pub mod clarify;
pub mod confirm;
pub mod graph;

pub use builders::{Ask, Attend, Clear, Confirm, Graph, Pause, Say, SetTrigger, Store};

/// Collaborators every action, condition and area may consult
#[derive(Clone, Copy)]
pub struct Env<'a> {
    pub config: &'a BotConfig,
    pub registry: &'a Registry,
    pub clock: &'a dyn Clock,
}

impl<'a> Env<'a> {
    pub fn now(&self) -> i64 {
        self.clock.now_ms()
    }
}

/// React to a user response while `action` holds the focus
pub fn respond(action: &Signal, response: &Response, env: Env<'_>) -> BotResult<Vec<Signal>> {
    match action.builtin() {
        Builtin::Ask => Ok(ask::respond(action, response, env)),
        Builtin::Clarify => clarify::respond(action, response, env),
        Builtin::Confirm => Ok(confirm::respond(action, response, env)),
        Builtin::Graph => Ok(graph::respond(action, response, env)),
        Builtin::Attend => attend::respond(action, response, env),
        other => {
            debug!(variant = action.name(), builtin = ?other, "action does not await responses");
            Ok(Vec::new())
        }
    }
}

/// Options an awaiting action listens for
pub fn options_of(action: &Signal, config: &BotConfig) -> Value {
    match action.builtin() {
        Builtin::Ask => action.get("options").cloned().unwrap_or_default(),
        Builtin::Clarify => {
            let skip = action
                .bool("skip")
                .unwrap_or(config.clarify_allow_skip);
            if skip {
                config.skip_options_value()
            } else {
                config.confirm_options_value()
            }
        }
        Builtin::Confirm => config.confirm_options_value(),
        Builtin::Graph => graph::current_ask(action)
            .and_then(|ask| ask.get("options").cloned())
            .unwrap_or_default(),
        _ => Value::Null,
    }
}

fn option_labels(options: &Value) -> Vec<String> {
    options.items().into_iter().filter_map(Value::render).collect()
}

/// Render an action as the `Say` the user sees
pub fn to_say(action: &Signal, config: &BotConfig) -> Option<Signal> {
    match action.builtin() {
        Builtin::Say => Some(action.clone()),
        Builtin::Ask => {
            let mut fields = Vec::new();
            if let Some(text) = action.get("text") {
                fields.push(("text", text.clone()));
            }
            let options = action.items("options");
            if !options.is_empty() && options.iter().all(|o| o.is_literal()) {
                let labels: Vec<String> = options.into_iter().filter_map(Value::render).collect();
                fields.push(("options", Value::from(labels)));
            }
            (!fields.is_empty()).then(|| Signal::assemble(Builtin::Say, fields))
        }
        Builtin::Clarify => {
            let text = match action.str("text") {
                Some(text) => text.to_string(),
                None => {
                    let tentative = action
                        .signal("response")
                        .and_then(|r| r.get("match"))
                        .and_then(Value::render)
                        .unwrap_or_default();
                    fill(&config.message_clarify, &tentative)
                }
            };
            let keys: Vec<String> = match options_of(action, config) {
                Value::Map(groups) => groups.into_keys().collect(),
                other => option_labels(&other),
            };
            Some(Signal::assemble(
                Builtin::Say,
                [("text", Value::from(text)), ("options", Value::from(keys))],
            ))
        }
        Builtin::Confirm => {
            let text = action
                .str("text")
                .unwrap_or(&config.message_confirm)
                .to_string();
            Some(Signal::assemble(
                Builtin::Say,
                [
                    ("text", Value::from(text)),
                    ("options", Value::from(config.confirm_keys())),
                ],
            ))
        }
        Builtin::Graph => {
            let ask = graph::current_ask(action)?;
            let mut fields = vec![("text", ask.get("text").cloned().unwrap_or_default())];
            let options: Vec<String> = match ask.get("options") {
                Some(Value::Map(groups)) => groups
                    .values()
                    .flat_map(option_labels)
                    .collect(),
                _ => Vec::new(),
            };
            if !options.is_empty() {
                fields.push(("options", Value::from(options)));
            }
            Some(Signal::assemble(Builtin::Say, fields))
        }
        Builtin::Attend => attend::focused_ask(action).and_then(|ask| to_say(&ask, config)),
        _ => None,
    }
}

/// Replace placeholders in the text of every action in `actions`
pub(crate) fn bind(actions: &mut [Signal], bindings: &[(String, String)]) {
    for action in actions.iter_mut().filter(|a| a.kind() == Kind::Action) {
        action.substitute_text(bindings);
    }
}

/// Plain `Say` with a single text
pub(crate) fn say(text: impl Into<String>) -> Signal {
    Signal::assemble(Builtin::Say, [("text", text.into())])
}

/// Hold the queued actions until `pause`'s condition fires
pub fn pause(pause: &Signal, queued: Vec<Signal>) -> Option<Signal> {
    if queued.is_empty() {
        return None;
    }
    let mut trigger = Signal::assemble(
        Builtin::Trigger,
        [
            ("condition", pause.get("condition").cloned().unwrap_or_default()),
            ("actions", Value::from(queued)),
        ],
    );
    if let Some(instant) = pause.bool("instant") {
        trigger.set("instant", instant);
    }
    Some(Signal::assemble(
        Builtin::SetTrigger,
        [("trigger", Value::from(trigger))],
    ))
}

/// Whether a `Clear` action targets the area named `area`
pub fn clears(clear: &Signal, area: &str) -> bool {
    clear
        .items("area")
        .into_iter()
        .filter_map(Value::as_str)
        .any(|target| target == "*" || target.eq_ignore_ascii_case(area))
}
