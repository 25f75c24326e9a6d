//! Mouth: renders actions into the utterances the user sees
//!
//! Every action that can be said becomes a `Say` limited to `text`,
//! `options` and `delay`. Texts are tidied up unless marked `as_is`, and a
//! reading delay is derived from the configured words per minute.

use std::any::Any;

use rand::seq::IndexedRandom;

use super::{Area, AreaContext, Events, decode_queue, encode_queue};
use crate::actions;
use crate::config::BotConfig;
use crate::error::BotResult;
use crate::signals::{Builtin, Registry, Signal};
use crate::state::FrontQueue;
use crate::text::prepare_text;
use crate::value_objects::{Utterance, Value};

#[derive(Debug, Default)]
pub struct Mouth {
    queue: FrontQueue<Signal>,
}

/// Milliseconds needed to read `text`
pub fn text_delay(text: &str, config: &BotConfig) -> i64 {
    let words_per_second = config.wpm / 60.0;
    let words = text.split_whitespace().count() as f64;
    (1000.0 * (0.3 + words / words_per_second)) as i64
}

fn choose_text(text: &Value) -> Option<String> {
    match text {
        Value::List(alternatives) => alternatives
            .choose(&mut rand::rng())
            .and_then(Value::render),
        other => other.render(),
    }
}

impl Mouth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn said(&self) -> Vec<Signal> {
        self.queue.all()
    }

    /// Hand every pending utterance to the caller
    pub fn pop_utterances(&mut self) -> Vec<Utterance> {
        self.queue
            .take_all()
            .iter()
            .map(Utterance::from_signal)
            .collect()
    }

    fn render(action: &Signal, config: &BotConfig) -> Option<Signal> {
        let say = actions::to_say(action, config)?;
        let mut fields: Vec<(&str, Value)> = Vec::new();

        let text = say
            .get("text")
            .and_then(choose_text)
            .map(|text| {
                if say.bool("as_is").unwrap_or(false) {
                    text
                } else {
                    prepare_text(&text)
                }
            })
            .filter(|text| !text.is_empty());

        if let Some(options) = say.get("options") {
            let labels: Vec<String> = options.items().into_iter().filter_map(Value::render).collect();
            fields.push(("options", Value::from(labels)));
        }

        if let Some(text) = &text {
            if config.provide_delays {
                let coef = say.float("delay_coef").unwrap_or(1.0);
                let base = say.int("delay").unwrap_or_else(|| text_delay(text, config));
                fields.push(("delay", Value::Int((coef * base as f64) as i64)));
            }
        } else if let Some(delay) = say.int("delay") {
            fields.push(("delay", Value::Int(delay)));
        }
        fields.push(("text", Value::from(text)));

        Some(Signal::assemble(Builtin::Say, fields))
    }
}

impl Area for Mouth {
    fn name(&self) -> &str {
        "Mouth"
    }

    fn listens_to(&self) -> &[&str] {
        &["Ask", "Say", "Clarify", "Confirm", "Graph", "Attend"]
    }

    fn process(&mut self, signal: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let Some(say) = Self::render(signal, ctx.env.config) else {
            return Ok(Vec::new());
        };
        if let Some(events) = ctx.siblings.get_mut::<Events>() {
            events.log_signal(&say, ctx.env);
        }
        self.queue.append([say]);
        Ok(Vec::new())
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn state(&self) -> Option<serde_json::Value> {
        Some(encode_queue(&self.queue))
    }

    fn restore(&mut self, state: &serde_json::Value, registry: &Registry) -> BotResult<()> {
        self.queue = decode_queue(state, registry)?;
        Ok(())
    }

    fn clear(&mut self) {
        self.queue.clear();
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
