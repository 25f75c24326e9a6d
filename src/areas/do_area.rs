//! Do: the interface that injects pre-built actions

use std::any::Any;

use super::{Area, AreaContext};
use crate::error::BotResult;
use crate::signals::Signal;

/// Interface for executing actions directly, bypassing intent classification
#[derive(Debug, Default)]
pub struct Do;

impl Do {
    pub fn desire(&self, actions: Vec<Signal>) -> Signal {
        Signal::desire(actions)
    }
}

impl Area for Do {
    fn name(&self) -> &str {
        "Do"
    }

    fn is_interface(&self) -> bool {
        true
    }

    fn process(&mut self, _signal: &Signal, _ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        Ok(Vec::new())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
