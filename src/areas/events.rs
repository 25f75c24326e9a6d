//! Events: counters, history and the conversation log
//!
//! Every signal passing through the runtime is counted under
//! `counts.<kind>.<variant>.n` and re-emitted as an Event for the triggers.
//! Events emitted elsewhere are counted under their type (`done`, ...) and
//! not re-emitted.

use std::any::Any;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Area, AreaContext, decode_map, encode_map};
use crate::actions::Env;
use crate::error::BotResult;
use crate::signals::{Registry, Signal};
use crate::state::PathMap;
use crate::value_objects::Value;

/// One line of the bounded history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub signal_name: String,
    pub signal_type: String,
    pub time: i64,
}

/// One logged utterance or message
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub signal: Signal,
    pub time: i64,
}

#[derive(Debug, Default)]
pub struct Events {
    store: PathMap,
}

fn bounded(list: Option<&Value>, record: Value, limit: usize) -> Value {
    let mut items: Vec<Value> = list.map(|l| l.items().into_iter().cloned().collect()).unwrap_or_default();
    items.push(record);
    let skip = items.len().saturating_sub(limit);
    Value::List(items.into_iter().skip(skip).collect())
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &PathMap {
        &self.store
    }

    pub fn count(&self, key: &str) -> i64 {
        self.store.count(key)
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.store
            .get("history")
            .map(Value::items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let record = item.as_map()?;
                Some(HistoryRecord {
                    signal_name: record.get("signal_name")?.as_str()?.to_string(),
                    signal_type: record.get("signal_type")?.as_str()?.to_string(),
                    time: record.get("time")?.as_i64()?,
                })
            })
            .collect()
    }

    pub fn log(&self) -> Vec<LogRecord> {
        self.store
            .get("log")
            .map(Value::items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let record = item.as_map()?;
                Some(LogRecord {
                    signal: record.get("signal")?.as_signal()?.clone(),
                    time: record.get("time").and_then(Value::as_i64).unwrap_or(0),
                })
            })
            .collect()
    }

    /// Append a message or utterance to the log
    pub fn log_signal(&mut self, signal: &Signal, env: Env<'_>) {
        let record = Value::map([
            ("signal", Value::from(signal.clone())),
            ("signal_name", Value::from(signal.name())),
            ("signal_type", Value::from(signal.kind().as_str())),
            ("time", Value::Int(env.now())),
        ]);
        let log = bounded(self.store.get("log"), record, env.config.log_limit);
        self.store.set("log", log);
    }

    fn subject(event: &Signal, registry: &Registry) -> (String, String) {
        match event.get("signal") {
            Some(Value::Signal(subject)) => {
                (subject.kind().to_string(), subject.name().to_string())
            }
            Some(Value::Variant(name)) => (
                registry
                    .kind_of(name)
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "Signal".to_string()),
                name.clone(),
            ),
            _ => {
                warn!(event = ?event, "event without a subject");
                ("Signal".to_string(), "unknown".to_string())
            }
        }
    }
}

impl Area for Events {
    fn name(&self) -> &str {
        "Events"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn listens_to(&self) -> &[&str] {
        &["Signal"]
    }

    fn process(&mut self, signal: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let env = ctx.env;
        let (kind, name, event_type, emitted) = if signal.is("Event") {
            let (kind, name) = Self::subject(signal, env.registry);
            let event_type = signal.str("type").unwrap_or("unk").to_string();
            (kind, name, event_type, Vec::new())
        } else {
            (
                signal.kind().to_string(),
                signal.name().to_string(),
                "n".to_string(),
                vec![Signal::event(signal.clone())],
            )
        };

        self.store
            .increment(&format!("counts.{kind}.{name}.{event_type}"), 1);
        self.store.increment(&format!("counts.{kind}.{event_type}"), 1);
        self.store.increment(&format!("counts.{event_type}"), 1);

        let record = Value::Map(BTreeMap::from([
            ("signal_name".to_string(), Value::from(signal.name())),
            ("signal_type".to_string(), Value::from(signal.kind().as_str())),
            ("time".to_string(), Value::Int(env.now())),
        ]));
        let history = bounded(self.store.get("history"), record, env.config.history_limit);
        self.store.set("history", history);

        Ok(emitted)
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
