//! Attention: turns messages into intents or resumes the pending question
//!
//! Every awaiting action that passes by becomes the focus. When a message
//! arrives, the active intents and the focus compete; commands (like Stop)
//! compete in both situations.

use std::any::Any;
use std::collections::HashMap;

use tracing::{debug, warn};

use super::{Actions, Area, AreaContext, Events, decode_map, encode_map};
use crate::actions;
use crate::error::BotResult;
use crate::intents::{Monitor, ScoreContext, intent_signal};
use crate::matcher::Matcher;
use crate::signals::{Kind, Registry, Signal};
use crate::state::PathMap;
use crate::text::hash_text;
use crate::value_objects::{Message, Response, Value};

const FOCUS: &str = "focus";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Attention,
    Intents,
    Commands,
}

struct Candidate {
    source: Source,
    intent: Option<String>,
    confidence: f64,
    response: Option<Response>,
}

#[derive(Debug, Default)]
pub struct Attention {
    store: PathMap,
    intents: Vec<String>,
}

impl Attention {
    /// `intents` are the names of the intent variants competing for messages
    pub fn new(intents: Vec<String>) -> Self {
        Self {
            store: PathMap::new(),
            intents,
        }
    }

    /// Action awaiting the next user reply
    pub fn focus(&self) -> Option<&Signal> {
        self.store.get(FOCUS).and_then(Value::as_signal)
    }

    fn attend(&mut self, action: &Signal, now: i64) {
        let mut focus = action.clone();
        let n = focus.int("_n").unwrap_or(0);
        focus.set("_time", now);
        focus.set("_n", n + 1);
        self.store.set(FOCUS, focus);
    }

    fn classify(&mut self, signal: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let env = ctx.env;
        let message = Message::from_signal(signal);
        let score_ctx = ScoreContext {
            monitor: Monitor::observe(ctx.siblings.get::<Events>()),
            env,
        };

        let mut candidates = Vec::new();
        for name in &self.intents {
            let Some(capability) = env.registry.resolve(name).and_then(|s| s.intent().cloned())
            else {
                warn!(intent = %name, "intent has no scoring capability");
                continue;
            };
            candidates.push(Candidate {
                source: if capability.is_command() {
                    Source::Commands
                } else {
                    Source::Intents
                },
                intent: Some(name.clone()),
                confidence: capability.score(&message, &score_ctx),
                response: None,
            });
        }

        let focus = self.focus().cloned();
        if let Some(focus) = &focus {
            let options = actions::options_of(focus, env.config);
            let response = Matcher::new(&options, env.registry).respond(&message);
            candidates.push(Candidate {
                source: Source::Attention,
                intent: None,
                confidence: response.confidence,
                response: Some(response),
            });
        }

        if candidates.is_empty() {
            warn!(text = %message.text, "no intent recognized");
            return Ok(Vec::new());
        }

        let nlp_intents: HashMap<String, f64> = message
            .nlp
            .as_ref()
            .map(|nlp| {
                nlp.intents
                    .iter()
                    .map(|i| (hash_text(&i.intent), i.confidence))
                    .collect()
            })
            .unwrap_or_default();

        let mut best: Option<(f64, usize)> = None;
        for (index, candidate) in candidates.iter_mut().enumerate() {
            match candidate.source {
                Source::Attention => {
                    candidate.confidence = (candidate.confidence + 0.1).min(1.0);
                }
                Source::Intents | Source::Commands => {
                    if let Some(name) = &candidate.intent {
                        candidate.confidence +=
                            nlp_intents.get(&hash_text(name)).copied().unwrap_or(0.0);
                    }
                }
            }
            let weight = match (focus.is_some(), candidate.source) {
                (_, Source::Commands) => 1.0,
                (true, Source::Attention) | (false, Source::Intents) => 1.0,
                _ => 0.0,
            };
            let weighted = weight * candidate.confidence;
            if best.is_none_or(|(top, _)| weighted > top) {
                best = Some((weighted, index));
            }
        }

        let Some((_, winner)) = best else {
            return Ok(Vec::new());
        };
        let winner = candidates.swap_remove(winner);
        match (winner.source, winner.response, winner.intent) {
            (Source::Attention, Some(response), _) => {
                let Some(focus) = self.store.pop(FOCUS).and_then(|f| f.as_signal().cloned()) else {
                    return Ok(Vec::new());
                };
                debug!(focus = focus.name(), matched = ?response.matched, "resuming focus");
                let reaction = actions::respond(&focus, &response, env)?;
                match ctx.siblings.get_mut::<Actions>() {
                    Some(queue) => {
                        queue.push(reaction);
                        Ok(Vec::new())
                    }
                    None => Ok(reaction),
                }
            }
            (_, _, Some(intent)) => {
                debug!(intent = %intent, "intent selected");
                Ok(vec![intent_signal(env, &intent, signal)?])
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl Area for Attention {
    fn name(&self) -> &str {
        "Attention"
    }

    fn priority(&self) -> i32 {
        6
    }

    fn listens_to(&self) -> &[&str] {
        &["Ask", "Clarify", "Confirm", "Graph", "Attend", "Message"]
    }

    fn process(&mut self, signal: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        if signal.is_a("Message") {
            return self.classify(signal, ctx);
        }
        if signal.kind() == Kind::Action {
            self.attend(signal, ctx.env.now());
        }
        Ok(Vec::new())
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn state(&self) -> Option<serde_json::Value> {
        Some(encode_map(&self.store))
    }

    fn restore(&mut self, state: &serde_json::Value, registry: &Registry) -> BotResult<()> {
        self.store = decode_map(state, registry)?;
        Ok(())
    }

    fn clear(&mut self) {
        self.store.clear();
    }

    fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Ask, Env};
    use crate::areas::Siblings;
    use crate::clock::ManualClock;
    use crate::config::BotConfig;

    fn slots() -> Vec<Option<Box<dyn Area>>> {
        vec![Some(Box::new(Events::new())), Some(Box::new(Actions::new()))]
    }

    #[test]
    fn test_actions_become_focus() {
        let config = BotConfig::default();
        let clock = ManualClock::new(11);
        let mut slots = slots();
        let mut ctx = AreaContext {
            env: Env { config: &config, registry: Registry::builtin(), clock: &clock },
            siblings: Siblings::new(&mut slots),
        };
        let mut attention = Attention::new(Vec::new());
        let ask: Signal = Ask::new("q?").into();
        attention.process(&ask, &mut ctx).unwrap();
        attention.process(&ask.clone().with("_n", 1), &mut ctx).unwrap();
        let focus = attention.focus().unwrap();
        assert_eq!(focus.int("_n"), Some(2));
        assert_eq!(focus.int("_time"), Some(11));
    }

    #[test]
    fn test_intent_wins_without_focus() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let mut slots = slots();
        let mut ctx = AreaContext {
            env: Env { config: &config, registry: Registry::builtin(), clock: &clock },
            siblings: Siblings::new(&mut slots),
        };
        let mut attention = Attention::new(vec!["Echo".into(), "Stop".into()]);
        let out = attention.process(&Signal::message("hello"), &mut ctx).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].is("Echo"));
        assert_eq!(out[0].signal("message").and_then(|m| m.str("text")), Some("hello"));
    }

    #[test]
    fn test_focus_answer_goes_to_actions_queue() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let mut slots = slots();
        let mut attention = Attention::new(vec!["Echo".into(), "Stop".into()]);
        {
            let mut ctx = AreaContext {
                env: Env { config: &config, registry: Registry::builtin(), clock: &clock },
                siblings: Siblings::new(&mut slots),
            };
            let ask: Signal = Ask::new("How are you?").options(vec!["good", "bad"]).into();
            attention.process(&ask, &mut ctx).unwrap();
            let out = attention.process(&Signal::message("good"), &mut ctx).unwrap();
            assert!(out.is_empty());
            assert!(attention.focus().is_none());

            // commands still interrupt a pending question
            attention.process(&ask, &mut ctx).unwrap();
            let out = attention.process(&Signal::message("stop"), &mut ctx).unwrap();
            assert!(out[0].is("Stop"));
        }
        let Some(Some(actions)) = slots.get(1) else { panic!("actions area missing") };
        let queue = actions.as_any().downcast_ref::<Actions>().unwrap();
        assert_eq!(queue.pending().len(), 2);
    }
}
