//! Conversational agent runtime
//!
//! This crate runs multi-turn conversations on a typed signal bus. It
//! provides:
//! - Signals with per-variant contracts and a closed variant registry
//! - Priority-ordered areas (attention, memory, events, triggers, actions,
//!   mouth) that consume and emit signals
//! - Fuzzy and typed answer matching
//! - Deferred actions released by conditions on events, counts and time
//! - Conversation state machines: Ask, Clarify, Confirm, Graph, Attend, Pause
//! - Tagged JSON persistence of a whole conversation
//!
//! A [`Bot`] holds one conversation; [`host::SessionHost`] runs many of them
//! over a pluggable session store.

pub mod actions;
pub mod areas;
pub mod clock;
pub mod conditions;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod intents;
pub mod matcher;
pub mod nlp;
pub mod projections;
pub mod serialization;
pub mod signals;
pub mod state;
pub mod text;
pub mod value_objects;

// Re-export main types
pub use actions::{Ask, Attend, Clear, Confirm, Env, Graph, Pause, Say, SetTrigger, Store};

pub use areas::{
    Actions, Area, AreaContext, AreaFactory, Attention, Do, Events, HistoryRecord, LogRecord,
    Memory, Mouth, Siblings, Triggers,
};

pub use conditions::{
    CountCondition, EventCondition, IntervalCondition, TextCondition, TimeCondition, Trigger,
};

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BotConfig, Mode, StoreParameters};
pub use dispatcher::{Bot, BotBuilder, ValidationReport};
pub use error::{BotError, BotResult, ValidationWarning};
pub use host::{BotFactory, MemorySessionStore, SessionHost, SessionStore};
pub use intents::{Intent, KeywordIntent, Monitor, ScoreContext};
pub use matcher::{Matcher, Scorer};
pub use nlp::{NlpProvider, NlpResult, PatternNlp};
pub use projections::{Agent, Transcript, TranscriptEntry};

pub use signals::{Builtin, Contract, Kind, Registry, Shape, Signal, VariantSpec};
pub use state::{FrontQueue, PathMap};

pub use value_objects::{Message, Pattern, Primitive, Response, Utterance, Value};
