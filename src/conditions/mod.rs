//! Conditions and the trigger state machine
//!
//! A trigger is armed with one or more conditions (OR). Every event the
//! Triggers area observes is offered to the armed triggers; a trigger whose
//! condition holds is flagged `triggered` and its budget `n` is decremented.
//! A collection pass then releases flagged triggers of the requested phase and
//! keeps a re-armed copy of each one with budget left.

use tracing::debug;

use crate::actions::Env;
use crate::matcher::Matcher;
use crate::signals::{Builtin, Signal};
use crate::state::{FrontQueue, PathMap};
use crate::value_objects::{Message, Value};

/// What a condition may consult besides the event itself
#[derive(Clone, Copy)]
pub struct ConditionContext<'a> {
    pub env: Env<'a>,
    /// Counters kept by the Events area
    pub counts: Option<&'a PathMap>,
}

impl<'a> ConditionContext<'a> {
    fn now(&self) -> i64 {
        self.env.clock.now_ms()
    }

    fn count(&self, key: &str) -> i64 {
        self.counts.map(|c| c.count(key)).unwrap_or(0)
    }
}

/// Name and kind of the subject an event template refers to
fn subject_of(template: &Signal, ctx: &ConditionContext<'_>) -> Option<(String, String)> {
    match template.get("signal")? {
        Value::Signal(signal) => Some((signal.kind().to_string(), signal.name().to_string())),
        Value::Variant(name) => {
            let kind = ctx.env.registry.kind_of(name)?;
            Some((kind.to_string(), name.clone()))
        }
        _ => None,
    }
}

/// Counter key a CountCondition watches: `counts.<kind>.<variant>.<type or n>`
pub fn count_key(condition: &Signal, ctx: &ConditionContext<'_>) -> Option<String> {
    let template = condition.signal("event")?;
    let (kind, name) = subject_of(template, ctx)?;
    let event_type = template.str("type").unwrap_or("n");
    Some(format!("counts.{kind}.{name}.{event_type}"))
}

/// Whether `subject` (the signal an event carries) descends from `variant`
fn subject_is_a(subject: Option<&Value>, variant: &str, ctx: &ConditionContext<'_>) -> bool {
    match subject {
        Some(Value::Signal(signal)) => signal.is_a(variant),
        Some(Value::Variant(name)) => ctx.env.registry.is_relative(name, variant),
        _ => false,
    }
}

/// Variant named by an event template, whether it holds a reference or an instance
fn template_variant(template: &Signal) -> Option<&str> {
    match template.get("signal")? {
        Value::Variant(name) => Some(name),
        Value::Signal(signal) => Some(signal.name()),
        _ => None,
    }
}

/// Evaluate one condition against `event`.
///
/// IntervalCondition advances its anchor by exactly one interval when it
/// fires, hence the mutable borrow.
pub fn holds(condition: &mut Signal, event: &Signal, ctx: &ConditionContext<'_>) -> bool {
    match condition.builtin() {
        Builtin::EventCondition => {
            let Some(template) = condition.signal("event") else {
                return false;
            };
            match template.get("signal") {
                Some(Value::Variant(variant)) => {
                    subject_is_a(event.get("signal"), variant, ctx)
                        && template.str("type") == event.str("type")
                }
                _ => template == event,
            }
        }
        Builtin::TextCondition => {
            let Some(variant) = condition.signal("event").and_then(template_variant) else {
                return false;
            };
            let Some(subject) = event.signal("signal") else {
                return false;
            };
            match subject.str("text") {
                Some(text) if subject.is_a(variant) && !text.is_empty() => {
                    let options = condition.get("options").cloned().unwrap_or_default();
                    Matcher::new(&options, ctx.env.registry)
                        .respond(&Message::text(text))
                        .is_perfect()
                }
                _ => false,
            }
        }
        Builtin::CountCondition => match (count_key(condition, ctx), condition.int("n")) {
            (Some(key), Some(n)) => n <= ctx.count(&key),
            _ => false,
        },
        Builtin::TimeCondition => condition.int("time").is_some_and(|t| ctx.now() >= t),
        Builtin::IntervalCondition => {
            let interval = condition.int("interval").unwrap_or(0);
            let Some(anchor) = condition.int("time") else {
                condition.set("time", ctx.now());
                return false;
            };
            if ctx.now() >= anchor + interval {
                condition.set("time", anchor + interval);
                true
            } else {
                false
            }
        }
        other => {
            debug!(variant = condition.name(), builtin = ?other, "not a condition");
            false
        }
    }
}

/// Re-arm a condition; only IntervalCondition keeps state, anchored on first arming
pub fn reset(condition: &mut Signal, now: i64) {
    if condition.builtin() == Builtin::IntervalCondition && !condition.has("time") {
        condition.set("time", now);
    }
}

fn conditions_mut(trigger: &mut Signal) -> Vec<&mut Signal> {
    match trigger.get_mut("condition") {
        Some(Value::Signal(condition)) => vec![condition.as_mut()],
        Some(Value::List(items)) => items.iter_mut().filter_map(Value::as_signal_mut).collect(),
        _ => Vec::new(),
    }
}

/// Offer `event` to a trigger; true when it fires now.
///
/// A trigger already flagged is left alone until it is collected.
pub fn trigger(trigger: &mut Signal, event: &Signal, ctx: &ConditionContext<'_>) -> bool {
    if trigger.bool("triggered").unwrap_or(false) {
        return false;
    }
    let fired = conditions_mut(trigger)
        .into_iter()
        .any(|condition| holds(condition, event, ctx));
    if fired {
        let n = trigger.int("n").unwrap_or(1);
        trigger.set("triggered", true);
        trigger.set("n", n - 1);
    }
    fired
}

/// Prepare a trigger for storage: count thresholds become relative to the
/// current count and interval anchors default to now
pub fn arm(mut trigger: Signal, ctx: &ConditionContext<'_>) -> Signal {
    let now = ctx.now();
    for condition in conditions_mut(&mut trigger) {
        match condition.builtin() {
            Builtin::CountCondition => {
                // same key the condition reads, so the bias matches what it compares against
                let seen = count_key(condition, ctx).map(|key| ctx.count(&key)).unwrap_or(0);
                let n = condition.int("n").unwrap_or(0);
                condition.set("n", n + seen);
            }
            Builtin::IntervalCondition => reset(condition, now),
            _ => {}
        }
    }
    trigger
}

/// Release the flagged triggers of one phase, keeping re-armed copies of
/// those with budget left
pub fn pop_triggered(triggers: &mut FrontQueue<Signal>, instant: bool, now: i64) -> Vec<Signal> {
    let mut released = Vec::new();
    let mut keep = Vec::new();
    for trigger in triggers.take_all() {
        let flagged = trigger.bool("triggered").unwrap_or(false);
        if flagged && trigger.bool("instant").unwrap_or(false) == instant {
            if trigger.int("n").unwrap_or(0) > 0 {
                let mut rearmed = trigger.clone();
                rearmed.set("triggered", false);
                for condition in conditions_mut(&mut rearmed) {
                    reset(condition, now);
                }
                keep.push(rearmed);
            }
            released.push(trigger);
        } else {
            keep.push(trigger);
        }
    }
    triggers.append(keep);
    released
}

fn event_template(variant: &str, event_type: Option<&str>) -> Signal {
    Signal::event_on(variant, event_type)
}

/// Fires on events about a variant (and its descendants), or on one exact event
#[derive(Debug, Clone)]
pub struct EventCondition {
    event: Signal,
}

impl EventCondition {
    /// Any event about `variant` without a type tag
    pub fn on(variant: &str) -> Self {
        Self {
            event: event_template(variant, None),
        }
    }

    /// Events about `variant` tagged `event_type` (e.g. `"done"`)
    pub fn typed(variant: &str, event_type: &str) -> Self {
        Self {
            event: event_template(variant, Some(event_type)),
        }
    }

    /// Only this exact event
    pub fn exactly(event: Signal) -> Self {
        Self { event }
    }
}

impl From<EventCondition> for Signal {
    fn from(condition: EventCondition) -> Self {
        Signal::assemble(
            Builtin::EventCondition,
            [("event", Value::from(condition.event))],
        )
    }
}

/// Fires once a counter kept by the Events area reaches `n`
#[derive(Debug, Clone)]
pub struct CountCondition {
    event: Signal,
    n: i64,
}

impl CountCondition {
    /// `n` more occurrences of `variant`, counted from when the trigger is set
    pub fn new(variant: &str, n: i64) -> Self {
        Self {
            event: event_template(variant, None),
            n,
        }
    }

    pub fn typed(variant: &str, event_type: &str, n: i64) -> Self {
        Self {
            event: event_template(variant, Some(event_type)),
            n,
        }
    }
}

impl From<CountCondition> for Signal {
    fn from(condition: CountCondition) -> Self {
        Signal::assemble(
            Builtin::CountCondition,
            [
                ("event", Value::from(condition.event)),
                ("n", Value::Int(condition.n)),
            ],
        )
    }
}

/// Fires when the text of an observed signal perfectly matches `options`
#[derive(Debug, Clone)]
pub struct TextCondition {
    event: Signal,
    options: Value,
}

impl TextCondition {
    pub fn new(variant: &str, options: impl Into<Value>) -> Self {
        Self {
            event: event_template(variant, None),
            options: options.into(),
        }
    }
}

impl From<TextCondition> for Signal {
    fn from(condition: TextCondition) -> Self {
        Signal::assemble(
            Builtin::TextCondition,
            [
                ("event", Value::from(condition.event)),
                ("options", condition.options),
            ],
        )
    }
}

/// Fires once the clock passes an absolute deadline (milliseconds)
#[derive(Debug, Clone, Copy)]
pub struct TimeCondition {
    time: i64,
}

impl TimeCondition {
    pub fn at(time_ms: i64) -> Self {
        Self { time: time_ms }
    }
}

impl From<TimeCondition> for Signal {
    fn from(condition: TimeCondition) -> Self {
        Signal::assemble(Builtin::TimeCondition, [("time", condition.time)])
    }
}

/// Fires every `interval` milliseconds on a fixed cadence
#[derive(Debug, Clone, Copy)]
pub struct IntervalCondition {
    interval: i64,
    time: Option<i64>,
}

impl IntervalCondition {
    pub fn every(interval_ms: i64) -> Self {
        Self {
            interval: interval_ms,
            time: None,
        }
    }

    /// Anchor the cadence at `time_ms` instead of the moment the trigger is set
    pub fn starting(mut self, time_ms: i64) -> Self {
        self.time = Some(time_ms);
        self
    }
}

impl From<IntervalCondition> for Signal {
    fn from(condition: IntervalCondition) -> Self {
        let mut signal =
            Signal::assemble(Builtin::IntervalCondition, [("interval", condition.interval)]);
        if let Some(time) = condition.time {
            signal.set("time", time);
        }
        signal
    }
}

/// Deferred release of actions
#[derive(Debug, Clone)]
pub struct Trigger {
    conditions: Vec<Signal>,
    actions: Vec<Signal>,
    n: i64,
    instant: bool,
}

impl Trigger {
    pub fn new(condition: impl Into<Signal>, actions: Vec<Signal>) -> Self {
        Self {
            conditions: vec![condition.into()],
            actions,
            n: 1,
            instant: false,
        }
    }

    /// Add an alternative condition
    pub fn or(mut self, condition: impl Into<Signal>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Fire budget
    pub fn times(mut self, n: i64) -> Self {
        self.n = n;
        self
    }

    /// Release in the same pass as the triggering event, before later areas
    pub fn instant(mut self) -> Self {
        self.instant = true;
        self
    }
}

impl From<Trigger> for Signal {
    fn from(trigger: Trigger) -> Self {
        let mut conditions = trigger.conditions;
        let condition = if conditions.len() == 1 {
            Value::from(conditions.remove(0))
        } else {
            Value::from(conditions)
        };
        Signal::assemble(
            Builtin::Trigger,
            [
                ("condition", condition),
                ("actions", Value::from(trigger.actions)),
                ("n", Value::Int(trigger.n)),
                ("instant", Value::Bool(trigger.instant)),
                ("triggered", Value::Bool(false)),
            ],
        )
    }
}
