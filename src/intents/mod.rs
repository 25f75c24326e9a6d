//! Intents: scoring and reacting to user messages
//!
//! An intent variant is backed by an [`Intent`] capability stored in its
//! [`VariantSpec`](crate::signals::VariantSpec). Attention scores every active
//! intent against the incoming message; the Actions area later asks the
//! winner to `react`.

use std::sync::Arc;

use crate::actions::{Clear, Confirm, Env, say};
use crate::areas::{AreaContext, Attention, Events};
use crate::error::BotResult;
use crate::signals::{Builtin, Signal};
use crate::value_objects::{Message, Value};

/// Conversation facts available while scoring
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Monitor {
    pub is_first_message: bool,
    pub last_message_time: Option<i64>,
}

impl Monitor {
    pub fn observe(events: Option<&Events>) -> Self {
        let Some(events) = events else {
            return Self::default();
        };
        Self {
            is_first_message: events.store().count("counts.n") == 1,
            last_message_time: events
                .history()
                .iter()
                .rev()
                .find(|record| record.signal_name == Builtin::Message.name())
                .map(|record| record.time),
        }
    }
}

/// Everything an intent may consult while scoring
#[derive(Clone, Copy)]
pub struct ScoreContext<'a> {
    pub monitor: Monitor,
    pub env: Env<'a>,
}

/// Scoring and reaction capability of an intent variant
pub trait Intent: Send + Sync {
    /// Confidence that `message` expresses this intent, usually in `[0, 1]`
    fn score(&self, message: &Message, ctx: &ScoreContext<'_>) -> f64;

    /// Actions released when the intent is chosen
    fn react(&self, intent: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>>;

    /// Commands compete with a pending question
    fn is_command(&self) -> bool {
        false
    }

    /// Messages used by the self-test
    fn test_texts(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Message carried by an intent signal
pub fn message_of(intent: &Signal) -> Message {
    intent
        .signal("message")
        .map(Message::from_signal)
        .unwrap_or_default()
}

fn focus_of(ctx: &AreaContext<'_>) -> Vec<Signal> {
    ctx.siblings
        .get::<Attention>()
        .and_then(Attention::focus)
        .cloned()
        .into_iter()
        .collect()
}

fn gated(actions: Vec<Signal>, confirm: bool, text: &str, ctx: &AreaContext<'_>) -> Vec<Signal> {
    if confirm {
        vec![
            Confirm::new(actions)
                .text(text)
                .no(focus_of(ctx))
                .into(),
        ]
    } else {
        actions
    }
}

/// Forget the current conversation
#[derive(Debug, Default)]
pub struct Stop;

impl Intent for Stop {
    fn score(&self, message: &Message, _ctx: &ScoreContext<'_>) -> f64 {
        if message.text.to_lowercase() == "stop" { 1.0 } else { 0.0 }
    }

    fn react(&self, _intent: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let config = ctx.env.config;
        let mut actions = Vec::new();
        if config.show_stop_message {
            actions.push(say(config.message_stopped.clone()));
        }
        actions.push(Clear::areas(&["Attention", "Actions"]).into());
        Ok(gated(actions, config.confirm_stop, &config.message_confirm_stop, ctx))
    }

    fn is_command(&self) -> bool {
        true
    }

    fn test_texts(&self) -> Vec<String> {
        vec!["stop".to_string()]
    }
}

/// Forget everything
#[derive(Debug, Default)]
pub struct Restart;

impl Intent for Restart {
    fn score(&self, message: &Message, _ctx: &ScoreContext<'_>) -> f64 {
        if message.text.to_lowercase() == "restart" { 1.0 } else { 0.0 }
    }

    fn react(&self, _intent: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let config = ctx.env.config;
        let mut actions = Vec::new();
        if config.show_restarted_message {
            actions.push(say(config.message_restarted.clone()));
        }
        actions.push(Clear::areas(&["Attention", "Actions", "Memory", "Triggers", "Events"]).into());
        Ok(gated(actions, config.confirm_restart, &config.message_confirm_restart, ctx))
    }

    fn is_command(&self) -> bool {
        true
    }

    fn test_texts(&self) -> Vec<String> {
        vec!["restart".to_string()]
    }
}

/// Fallback that repeats the message
#[derive(Debug, Default)]
pub struct Echo;

impl Intent for Echo {
    fn score(&self, _message: &Message, _ctx: &ScoreContext<'_>) -> f64 {
        0.01
    }

    fn react(&self, intent: &Signal, _ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        Ok(vec![say(format!("ECHO: {}", message_of(intent).text))])
    }

    fn test_texts(&self) -> Vec<String> {
        vec!["echo".to_string()]
    }
}

/// Welcome on the very first message
#[derive(Debug, Default)]
pub struct FirstMessage;

impl Intent for FirstMessage {
    fn score(&self, _message: &Message, ctx: &ScoreContext<'_>) -> f64 {
        if ctx.env.config.show_welcome_message && ctx.monitor.is_first_message {
            2.0
        } else {
            0.0
        }
    }

    fn react(&self, _intent: &Signal, ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        Ok(vec![say(ctx.env.config.message_welcome.clone())])
    }
}

/// Acknowledge media without text
#[derive(Debug, Default)]
pub struct NonText;

impl Intent for NonText {
    fn score(&self, message: &Message, _ctx: &ScoreContext<'_>) -> f64 {
        if message.text.is_empty() { 1.0 } else { 0.0 }
    }

    fn react(&self, intent: &Signal, _ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let message = message_of(intent);
        let text = if message.image.is_some() {
            "nice image!"
        } else if message.video.is_some() {
            "nice video!"
        } else if message.voice.is_some() {
            "nice voice!"
        } else {
            "i see..."
        };
        Ok(vec![say(text)])
    }
}

/// Capability of a builtin intent variant
pub(crate) fn builtin_intent(builtin: Builtin) -> Option<Arc<dyn Intent>> {
    match builtin {
        Builtin::Stop => Some(Arc::new(Stop)),
        Builtin::Restart => Some(Arc::new(Restart)),
        Builtin::Echo => Some(Arc::new(Echo)),
        Builtin::FirstMessage => Some(Arc::new(FirstMessage)),
        Builtin::NonText => Some(Arc::new(NonText)),
        _ => None,
    }
}

/// Intent recognized by exact keywords, reacting with fixed actions
#[derive(Debug, Clone)]
pub struct KeywordIntent {
    keywords: Vec<String>,
    actions: Vec<Signal>,
    command: bool,
}

impl KeywordIntent {
    pub fn new<S: AsRef<str>>(keywords: impl IntoIterator<Item = S>, actions: Vec<Signal>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .collect(),
            actions,
            command: false,
        }
    }

    /// Let the intent interrupt a pending question
    pub fn command(mut self) -> Self {
        self.command = true;
        self
    }
}

impl Intent for KeywordIntent {
    fn score(&self, message: &Message, _ctx: &ScoreContext<'_>) -> f64 {
        let text = message.text.trim().to_lowercase();
        if self.keywords.iter().any(|k| *k == text) { 1.0 } else { 0.0 }
    }

    fn react(&self, intent: &Signal, _ctx: &mut AreaContext<'_>) -> BotResult<Vec<Signal>> {
        let text = message_of(intent).text;
        let mut actions = self.actions.clone();
        crate::actions::bind(&mut actions, &[(r"\text".to_string(), text)]);
        Ok(actions)
    }

    fn is_command(&self) -> bool {
        self.command
    }

    fn test_texts(&self) -> Vec<String> {
        self.keywords.clone()
    }
}

/// The intent signal Attention emits for `message`
pub(crate) fn intent_signal(env: Env<'_>, name: &str, message: &Signal) -> BotResult<Signal> {
    env.registry
        .signal(name, [("message", Value::from(message.clone()))])
}
