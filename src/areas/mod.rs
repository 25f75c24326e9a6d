//! Areas: priority-ranked subscribers of the signal bus
//!
//! The dispatcher offers every signal to each [`Area`] whose listen set
//! contains one of the signal's ancestors. An area may own a container
//! (a [`PathMap`] or a [`FrontQueue`]) whose contents form the persisted state
//! of a conversation. While one area runs, the others are reachable through
//! [`Siblings`].

use std::any::Any;
use std::sync::Arc;

use crate::actions::Env;
use crate::error::BotResult;
use crate::serialization;
use crate::signals::{Registry, Signal};
use crate::state::{FrontQueue, PathMap};
use crate::value_objects::Value;

pub mod actions;
pub mod attention;
pub mod do_area;
pub mod events;
pub mod memory;
pub mod mouth;
pub mod triggers;

pub use actions::Actions;
pub use attention::Attention;
pub use do_area::Do;
pub use events::{Events, HistoryRecord, LogRecord};
pub use memory::Memory;
pub use mouth::Mouth;
pub use triggers::Triggers;

/// A subscriber of the signal bus
pub trait Area: Any + Send {
    fn name(&self) -> &str;

    /// Higher priorities receive a signal first
    fn priority(&self) -> i32 {
        0
    }

    /// Variants (and their descendants) this area receives
    fn listens_to(&self) -> &[&str] {
        &[]
    }

    fn listens(&self, signal: &Signal) -> bool {
        self.listens_to().iter().any(|variant| signal.is_a(variant))
    }

    /// Interfaces produce signals but never receive them
    fn is_interface(&self) -> bool {
        false
    }

    /// Whether the area receives the signals it emitted itself
    fn is_self_listening(&self) -> bool {
        false
    }

    fn process(&mut self, signal: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>>;

    fn is_stateful(&self) -> bool {
        false
    }

    /// Encoded contents of the area's container
    fn state(&self) -> Option<serde_json::Value> {
        None
    }

    fn restore(&mut self, _state: &serde_json::Value, _registry: &Registry) -> BotResult<()> {
        Ok(())
    }

    fn clear(&mut self) {}

    fn is_empty(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Builds a fresh area for each runtime instance
pub type AreaFactory = Arc<dyn Fn() -> Box<dyn Area> + Send + Sync>;

/// The other areas of the runtime while one of them is processing
pub struct Siblings<'a> {
    slots: &'a mut [Option<Box<dyn Area>>],
}

impl<'a> Siblings<'a> {
    pub(crate) fn new(slots: &'a mut [Option<Box<dyn Area>>]) -> Self {
        Self { slots }
    }

    /// First sibling of type `T`
    pub fn get<T: Area>(&self) -> Option<&T> {
        self.slots
            .iter()
            .flatten()
            .find_map(|area| area.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: Area>(&mut self) -> Option<&mut T> {
        self.slots
            .iter_mut()
            .flatten()
            .find_map(|area| area.as_any_mut().downcast_mut::<T>())
    }

    /// Sibling by name, ignoring case
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Box<dyn Area>> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|area| area.name().eq_ignore_ascii_case(name))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Area>> {
        self.slots.iter_mut().flatten()
    }
}

/// What an area sees while processing one signal
pub struct AreaContext<'a> {
    pub env: Env<'a>,
    pub siblings: Siblings<'a>,
}

/// The builtin areas, highest priority first
pub fn builtin_areas(intents: &[String]) -> Vec<Box<dyn Area>> {
    let mut areas: Vec<Box<dyn Area>> = vec![
        Box::new(Do),
        Box::new(Attention::new(intents.to_vec())),
        Box::new(Memory::new()),
        Box::new(Events::new()),
        Box::new(Triggers::new()),
        Box::new(Actions::new()),
        Box::new(Mouth::new()),
    ];
    sort_by_priority(&mut areas);
    areas
}

/// Stable sort, highest priority first
pub fn sort_by_priority(areas: &mut [Box<dyn Area>]) {
    areas.sort_by_key(|area| std::cmp::Reverse(area.priority()));
}

pub(crate) fn encode_map(map: &PathMap) -> serde_json::Value {
    serialization::encode(&map.to_value())
}

pub(crate) fn decode_map(state: &serde_json::Value, registry: &Registry) -> BotResult<PathMap> {
    match serialization::decode(registry, state)? {
        Value::Map(root) => Ok(PathMap::from_map(root)),
        Value::Null => Ok(PathMap::new()),
        other => Err(crate::error::BotError::decode(format!(
            "expected a map, found {other:?}"
        ))),
    }
}

pub(crate) fn encode_queue(queue: &FrontQueue<Signal>) -> serde_json::Value {
    serialization::encode(&Value::from(queue.all()))
}

pub(crate) fn decode_queue(
    state: &serde_json::Value,
    registry: &Registry,
) -> BotResult<FrontQueue<Signal>> {
    let items = serialization::decode(registry, state)?;
    items
        .items()
        .into_iter()
        .map(|item| {
            item.as_signal().cloned().ok_or_else(|| {
                crate::error::BotError::decode(format!("expected a signal, found {item:?}"))
            })
        })
        .collect()
}
