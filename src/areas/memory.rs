//! Memory: long-lived key/value store fed by Store actions

use std::any::Any;

use tracing::error;

use super::{Area, AreaContext, decode_map, encode_map};
use crate::error::BotResult;
use crate::signals::{Registry, Signal};
use crate::state::PathMap;
use crate::value_objects::Value;

#[derive(Debug, Default)]
pub struct Memory {
    store: PathMap,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &PathMap {
        &self.store
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.store.get(path)
    }
}

impl Area for Memory {
    fn name(&self) -> &str {
        "Memory"
    }

    fn listens_to(&self) -> &[&str] {
        &["Store"]
    }

    fn process(&mut self, signal: &Signal, _ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let data = signal.get("data").cloned().unwrap_or_default();
        for item in data.items() {
            match item {
                Value::Map(entries) => self.store.add(entries.clone()),
                other => error!(value = ?other, "memory accepts a map or a list of maps"),
            }
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
