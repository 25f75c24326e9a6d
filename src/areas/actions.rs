//! Actions: the queue of actions waiting to be released
//!
//! Intents, desires and fired triggers push their actions to the front of
//! the queue. One action is released per pass; standalone actions (Clear,
//! Pause) take effect while being released.

use std::any::Any;

use tracing::{debug, warn};

use super::{Area, AreaContext, decode_queue, encode_queue};
use crate::actions;
use crate::error::{BotError, BotResult};
use crate::signals::{Builtin, Kind, Registry, Signal};
use crate::state::FrontQueue;

#[derive(Debug, Default)]
pub struct Actions {
    queue: FrontQueue<Signal>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a batch, keeping its order
    pub fn push(&mut self, batch: Vec<Signal>) {
        self.queue.push(batch);
    }

    pub fn pending(&self) -> Vec<Signal> {
        self.queue.all()
    }

    pub fn front(&self) -> Option<&Signal> {
        self.queue.front()
    }

    /// Release the next queued action, if any
    pub fn drain(&mut self, ctx: &mut AreaContext<'_>) -> Vec<Signal> {
        self.release(ctx)
    }

    fn release(&mut self, ctx: &mut AreaContext<'_>) -> Vec<Signal> {
        let Some(action) = self.queue.pop() else {
            return Vec::new();
        };
        let mut released = self.standalone(&action, ctx);
        released.insert(0, action);
        released
    }

    fn standalone(&mut self, action: &Signal, ctx: &mut AreaContext<'_>) -> Vec<Signal> {
        match action.builtin() {
            Builtin::Clear => {
                for area in ctx.siblings.iter_mut() {
                    if actions::clears(action, area.name()) {
                        debug!(area = area.name(), "clearing");
                        area.clear();
                    }
                }
                if actions::clears(action, self.name()) {
                    self.queue.clear();
                }
                Vec::new()
            }
            Builtin::Pause => {
                let queued = self.queue.take_all();
                actions::pause(action, queued).into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    fn incoming(&self, signal: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        if signal.kind() == Kind::Intent {
            let Some(intent) = signal.spec().intent().cloned() else {
                return Err(BotError::Area {
                    area: self.name().to_string(),
                    variant: signal.name().to_string(),
                    reason: "intent has no reaction".to_string(),
                });
            };
            let mut reaction = intent.react(signal, ctx)?;
            if !reaction.is_empty() {
                reaction.push(Signal::event_typed(signal.clone(), "done"));
            }
            return Ok(reaction);
        }
        match signal.builtin() {
            Builtin::Desire => Ok(signal.signals("actions")),
            Builtin::Trigger if signal.bool("triggered").unwrap_or(false) => {
                Ok(signal.signals("actions"))
            }
            Builtin::Trigger => Ok(Vec::new()),
            _ => {
                warn!(variant = signal.name(), "unexpected signal for the action queue");
                Ok(Vec::new())
            }
        }
    }
}

impl Area for Actions {
    fn name(&self) -> &str {
        "Actions"
    }

    fn listens_to(&self) -> &[&str] {
        &["Intent", "Desire", "Trigger"]
    }

    fn process(&mut self, signal: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let batch = self.incoming(signal, ctx)?;
        self.queue.push(batch);
        Ok(self.release(ctx))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Ask, Clear, Env, Pause, Say};
    use crate::areas::{Attention, Memory, Siblings};
    use crate::clock::ManualClock;
    use crate::conditions::EventCondition;
    use crate::config::BotConfig;
    use crate::value_objects::Value;

    #[test]
    fn test_desire_releases_one_at_a_time() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let mut slots: Vec<Option<Box<dyn Area>>> = Vec::new();
        let mut ctx = AreaContext {
            env: Env { config: &config, registry: Registry::builtin(), clock: &clock },
            siblings: Siblings::new(&mut slots),
        };
        let mut actions = Actions::new();
        let desire = Signal::desire(vec![Say::new("a").into(), Say::new("b").into()]);
        let out = actions.process(&desire, &mut ctx).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].str("text"), Some("a"));
        assert_eq!(actions.front().and_then(|a| a.str("text")), Some("b"));

        let out = actions.drain(&mut ctx);
        assert_eq!(out[0].str("text"), Some("b"));
        assert!(actions.drain(&mut ctx).is_empty());
    }

    #[test]
    fn test_intent_reaction_ends_with_done_event() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let mut slots: Vec<Option<Box<dyn Area>>> = Vec::new();
        let mut ctx = AreaContext {
            env: Env { config: &config, registry: Registry::builtin(), clock: &clock },
            siblings: Siblings::new(&mut slots),
        };
        let mut actions = Actions::new();
        let echo = Signal::new("Echo", [("message", Value::from(Signal::message("yo")))]).unwrap();
        let out = actions.process(&echo, &mut ctx).unwrap();
        assert_eq!(out[0].str("text"), Some("ECHO: yo"));
        let pending = actions.pending();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].is("Event"));
        assert_eq!(pending[0].str("type"), Some("done"));
    }

    #[test]
    fn test_clear_wipes_targeted_areas() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let env = Env { config: &config, registry: Registry::builtin(), clock: &clock };

        let mut attention = Attention::new(Vec::new());
        let mut none: Vec<Option<Box<dyn Area>>> = Vec::new();
        let ask: Signal = Ask::new("q?").into();
        attention
            .process(&ask, &mut AreaContext { env, siblings: Siblings::new(&mut none) })
            .unwrap();
        assert!(attention.focus().is_some());

        let mut slots: Vec<Option<Box<dyn Area>>> =
            vec![Some(Box::new(attention)), Some(Box::new(Memory::new()))];
        let mut ctx = AreaContext { env, siblings: Siblings::new(&mut slots) };
        let mut actions = Actions::new();
        let desire = Signal::desire(vec![
            Clear::areas(&["attention", "actions"]).into(),
            Say::new("later").into(),
        ]);
        let out = actions.process(&desire, &mut ctx).unwrap();
        assert!(out[0].is("Clear"));
        assert!(ctx.siblings.get::<Attention>().is_some_and(|a| a.focus().is_none()));
        assert!(actions.is_empty());
    }

    #[test]
    fn test_pause_wraps_remaining_actions() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let mut slots: Vec<Option<Box<dyn Area>>> = Vec::new();
        let mut ctx = AreaContext {
            env: Env { config: &config, registry: Registry::builtin(), clock: &clock },
            siblings: Siblings::new(&mut slots),
        };
        let mut actions = Actions::new();
        let desire = Signal::desire(vec![
            Pause::until(EventCondition::on("Message")).into(),
            Say::new("after").into(),
        ]);
        let out = actions.process(&desire, &mut ctx).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].is("Pause"));
        assert!(out[1].is("SetTrigger"));
        assert!(actions.is_empty());
    }
}
