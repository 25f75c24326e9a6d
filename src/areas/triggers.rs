//! Triggers: armed conditions waiting for events

use std::any::Any;

use tracing::debug;

use super::{Area, AreaContext, Events, decode_queue, encode_queue};
use crate::actions::Env;
use crate::conditions::{self, ConditionContext};
use crate::error::BotResult;
use crate::signals::{Registry, Signal};
use crate::state::{FrontQueue, PathMap};

#[derive(Debug, Default)]
pub struct Triggers {
    queue: FrontQueue<Signal>,
}

impl Triggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triggers(&self) -> &FrontQueue<Signal> {
        &self.queue
    }

    /// Offer `event` to every armed trigger; returns how many fired
    fn offer(&mut self, event: &Signal, ctx: &ConditionContext<'_>) -> usize {
        self.queue
            .iter_mut()
            .map(|trigger| conditions::trigger(trigger, event, ctx))
            .filter(|fired| *fired)
            .count()
    }

    /// Evaluate time-based conditions against the clock
    pub fn check(&mut self, env: Env<'_>, counts: Option<&PathMap>) -> usize {
        let ctx = ConditionContext { env, counts };
        self.offer(&Signal::event(Signal::check()), &ctx)
    }

    /// Collect the fired triggers of one phase
    pub fn pop_triggered(&mut self, instant: bool, now: i64) -> Vec<Signal> {
        conditions::pop_triggered(&mut self.queue, instant, now)
    }
}

impl Area for Triggers {
    fn name(&self) -> &str {
        "Triggers"
    }

    fn listens_to(&self) -> &[&str] {
        &["Event", "SetTrigger"]
    }

    fn process(&mut self, signal: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let env = ctx.env;
        let counts = ctx.siblings.get::<Events>().map(Events::store);
        let condition_ctx = ConditionContext { env, counts };

        if signal.is("SetTrigger") {
            if let Some(trigger) = signal.signal("trigger") {
                let armed = conditions::arm(trigger.clone(), &condition_ctx);
                debug!(trigger = ?armed, "trigger armed");
                self.queue.append([armed]);
            }
            return Ok(Vec::new());
        }

        if signal.is("Event") {
            let fired = self.offer(signal, &condition_ctx);
            if fired > 0 {
                debug!(fired, "triggers fired");
            }
            // instant triggers flagged by an earlier check() are released here too
            return Ok(self.pop_triggered(true, env.now()));
        }
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
