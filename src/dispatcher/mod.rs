//! The runtime instance: areas, dispatch and entry points
//!
//! A [`Bot`] owns one conversation. Signals are fanned out over the areas in
//! priority order; every signal an area returns re-enters the fan-out at once
//! with that area as its source, depth-first. After a pass the fired
//! "after" triggers are released, then one pending action is drained when
//! nothing awaits a reply.
//!
//! A single `Bot` is not meant to be driven concurrently; hosts serialize
//! calls per conversation (see [`crate::host`]).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, error, warn};

use crate::actions::Env;
use crate::areas::{
    Actions, Area, AreaContext, AreaFactory, Attention, Do, Events, LogRecord, Memory, Mouth,
    Siblings, Triggers, builtin_areas, sort_by_priority,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{BotConfig, Mode};
use crate::error::{BotError, BotResult, ValidationWarning};
use crate::intents::Intent;
use crate::matcher::Scorer;
use crate::nlp::{self, NlpProvider};
use crate::projections::Transcript;
use crate::signals::{Contract, Registry, Signal};
use crate::state::{FrontQueue, PathMap};
use crate::value_objects::{Message, Utterance, Value};

const DEFAULT_INTENTS: [&str; 4] = ["Echo", "Restart", "FirstMessage", "Stop"];

/// Outcome of [`Bot::validate`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Intent reactions or dispatch passes that failed
    pub failures: Vec<String>,
    /// Test texts that left no trace in any stateful area
    pub silent_texts: Vec<String>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty() && self.silent_texts.is_empty()
    }
}

/// One conversational runtime instance
pub struct Bot {
    config: Arc<BotConfig>,
    registry: Arc<Registry>,
    clock: Arc<dyn Clock>,
    nlp: Option<Arc<dyn NlpProvider>>,
    intents: Vec<String>,
    factories: Vec<AreaFactory>,
    areas: Vec<Option<Box<dyn Area>>>,
    failures: Vec<BotError>,
    warnings: Vec<ValidationWarning>,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("intents", &self.intents)
            .field("areas", &self.area_names())
            .field("failures", &self.failures.len())
            .finish()
    }
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    fn assemble(
        config: Arc<BotConfig>,
        registry: Arc<Registry>,
        clock: Arc<dyn Clock>,
        nlp: Option<Arc<dyn NlpProvider>>,
        intents: Vec<String>,
        factories: Vec<AreaFactory>,
        state: Option<&serde_json::Value>,
    ) -> BotResult<Self> {
        let mut areas = builtin_areas(&intents);
        areas.extend(factories.iter().map(|factory| factory()));
        sort_by_priority(&mut areas);

        if let Some(state) = state {
            for area in areas.iter_mut().filter(|a| a.is_stateful()) {
                if let Some(saved) = state.get(area.name()) {
                    area.restore(saved, &registry)?;
                }
            }
        }

        Ok(Self {
            config,
            registry,
            clock,
            nlp,
            intents,
            factories,
            areas: areas.into_iter().map(Some).collect(),
            failures: Vec::new(),
            warnings: Vec::new(),
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn intents(&self) -> &[String] {
        &self.intents
    }

    /// Area names, highest priority first
    pub fn area_names(&self) -> Vec<String> {
        self.areas
            .iter()
            .flatten()
            .map(|area| area.name().to_string())
            .collect()
    }

    fn index_of<T: Area>(&self) -> Option<usize> {
        self.areas
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|area| area.as_any().is::<T>()))
    }

    /// The first area of type `T`
    pub fn area<T: Area>(&self) -> Option<&T> {
        self.areas
            .iter()
            .flatten()
            .find_map(|area| area.as_any().downcast_ref::<T>())
    }

    pub fn area_mut<T: Area>(&mut self) -> Option<&mut T> {
        self.areas
            .iter_mut()
            .flatten()
            .find_map(|area| area.as_any_mut().downcast_mut::<T>())
    }

    /// Run `f` on the area of type `T` with the others as its siblings
    fn with_area<T: Area, R>(
        &mut self,
        f: impl FnOnce(&mut T, &mut AreaContext<'_>) -> R,
    ) -> Option<R> {
        let index = self.index_of::<T>()?;
        let mut area = self.areas[index].take()?;
        let config = self.config.clone();
        let registry = self.registry.clone();
        let clock = self.clock.clone();
        let result = {
            let mut ctx = AreaContext {
                env: Env {
                    config: &config,
                    registry: &registry,
                    clock: clock.as_ref(),
                },
                siblings: Siblings::new(&mut self.areas),
            };
            area.as_any_mut()
                .downcast_mut::<T>()
                .map(|area| f(area, &mut ctx))
        };
        self.areas[index] = Some(area);
        result
    }

    /// Propagate `batch` from `source` and settle triggers and pending actions
    pub fn process(&mut self, source: Option<usize>, batch: Vec<Signal>) {
        if batch.is_empty() {
            return;
        }
        let span = debug_span!("process", signal = batch[0].name(), n = batch.len());
        let _entered = span.enter();

        self.fan_out(source, batch);
        self.sweep_triggers(false);
        self.drain_pending();
    }

    fn fan_out(&mut self, source: Option<usize>, batch: Vec<Signal>) {
        if self.config.is_strict() {
            for signal in &batch {
                for warning in signal.validate(&self.registry) {
                    warn!(%warning, "validation warning");
                    self.warnings.push(warning);
                }
            }
        }

        for index in 0..self.areas.len() {
            for signal in &batch {
                let Some(out) = self.offer(index, source, signal) else {
                    continue;
                };
                if !out.is_empty() {
                    self.fan_out(Some(index), out);
                }
            }
        }
    }

    /// Hand one signal to the area at `index` if it is eligible
    fn offer(&mut self, index: usize, source: Option<usize>, signal: &Signal) -> Option<Vec<Signal>> {
        let mut area = self.areas[index].take()?;
        let eligible = (source != Some(index) || area.is_self_listening())
            && !area.is_interface()
            && area.listens(signal);
        if !eligible {
            self.areas[index] = Some(area);
            return None;
        }

        let config = self.config.clone();
        let registry = self.registry.clone();
        let clock = self.clock.clone();
        let result = {
            let mut ctx = AreaContext {
                env: Env {
                    config: &config,
                    registry: &registry,
                    clock: clock.as_ref(),
                },
                siblings: Siblings::new(&mut self.areas),
            };
            area.process(signal, &mut ctx)
        };
        let name = area.name().to_string();
        self.areas[index] = Some(area);

        match result {
            Ok(out) => {
                if !out.is_empty() {
                    debug!(area = %name, signal = signal.name(), emitted = out.len(), "area emitted");
                }
                Some(out)
            }
            Err(err) => {
                error!(area = %name, signal = signal.name(), %err, "area failed");
                self.failures.push(BotError::Area {
                    area: name,
                    variant: signal.name().to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    fn sweep_triggers(&mut self, instant: bool) {
        let now = self.clock.now_ms();
        let Some(index) = self.index_of::<Triggers>() else {
            return;
        };
        let released = self
            .area_mut::<Triggers>()
            .map(|triggers| triggers.pop_triggered(instant, now))
            .unwrap_or_default();
        if !released.is_empty() {
            debug!(released = released.len(), instant, "releasing triggers");
            self.process(Some(index), released);
        }
    }

    fn drain_pending(&mut self) {
        let Some(index) = self.index_of::<Actions>() else {
            return;
        };
        let (pending, exempt) = match self.area::<Actions>() {
            Some(actions) => (
                !actions.is_empty(),
                actions.front().is_some_and(|front| front.is_a("Clear")),
            ),
            None => return,
        };
        let focused = self.focus().is_some();
        if pending && (exempt || !focused) {
            let out = self
                .with_area::<Actions, _>(|actions, ctx| actions.drain(ctx))
                .unwrap_or_default();
            if !out.is_empty() {
                self.process(Some(index), out);
            }
        }
    }

    /// Take an inbound message: enrich, log and dispatch it
    pub fn reply(&mut self, mut message: Message) {
        if message.nlp.is_none() && !message.text.is_empty() {
            if let Some(provider) = &self.nlp {
                message.nlp = Some(nlp::analyze(provider.as_ref(), &message.text));
            }
        }
        let signal = message.to_signal();
        self.with_area::<Events, _>(|events, ctx| events.log_signal(&signal, ctx.env));
        self.process(None, vec![signal]);
    }

    pub fn reply_text(&mut self, text: impl Into<String>) {
        self.reply(Message::text(text));
    }

    /// Run actions directly, bypassing intent classification
    pub fn do_actions(&mut self, actions: Vec<Signal>) {
        if actions.is_empty() {
            return;
        }
        let source = self.index_of::<Do>();
        let desire = match self.area::<Do>() {
            Some(interface) => interface.desire(actions),
            None => Signal::desire(actions),
        };
        self.process(source, vec![desire]);
    }

    /// Let time-based conditions fire without new input
    pub fn check(&mut self) {
        let span = debug_span!("check");
        let _entered = span.enter();
        let fired = self
            .with_area::<Triggers, _>(|triggers, ctx| {
                let counts = ctx.siblings.get::<Events>().map(Events::store);
                triggers.check(ctx.env, counts)
            })
            .unwrap_or(0);
        if fired > 0 {
            self.sweep_triggers(false);
        }
    }

    /// Drain what the bot said since the last call
    pub fn pop_utterances(&mut self) -> Vec<Utterance> {
        self.area_mut::<Mouth>()
            .map(Mouth::pop_utterances)
            .unwrap_or_default()
    }

    /// Persisted state: the encoded container of every stateful area by name
    pub fn state(&self) -> serde_json::Value {
        let state: serde_json::Map<String, serde_json::Value> = self
            .areas
            .iter()
            .flatten()
            .filter(|area| area.is_stateful())
            .filter_map(|area| Some((area.name().to_string(), area.state()?)))
            .collect();
        serde_json::Value::Object(state)
    }

    /// Forget the whole conversation
    pub fn clear(&mut self) {
        for area in self.areas.iter_mut().flatten() {
            area.clear();
        }
    }

    pub fn memory(&self) -> Option<&PathMap> {
        self.area::<Memory>().map(Memory::store)
    }

    pub fn events(&self) -> Option<&Events> {
        self.area::<Events>()
    }

    /// The action awaiting the next user reply
    pub fn focus(&self) -> Option<&Signal> {
        self.area::<Attention>().and_then(Attention::focus)
    }

    pub fn pending_actions(&self) -> Vec<Signal> {
        self.area::<Actions>()
            .map(Actions::pending)
            .unwrap_or_default()
    }

    pub fn triggers(&self) -> Option<&FrontQueue<Signal>> {
        self.area::<Triggers>().map(Triggers::triggers)
    }

    /// Says waiting in the mouth
    pub fn mouth(&self) -> Vec<Signal> {
        self.area::<Mouth>().map(Mouth::said).unwrap_or_default()
    }

    pub fn log(&self) -> Vec<LogRecord> {
        self.area::<Events>().map(Events::log).unwrap_or_default()
    }

    pub fn transcript(&self) -> Transcript {
        Transcript::from_log(&self.log())
    }

    /// Isolated area failures recorded so far
    pub fn failures(&self) -> &[BotError] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<BotError> {
        std::mem::take(&mut self.failures)
    }

    /// Validation warnings collected in strict mode
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    /// Exercise every intent on a strict throw-away copy of this bot.
    ///
    /// Each intent reacts to "hi" and its test texts; then every text is sent
    /// as a message and must leave a trace in some stateful area besides
    /// Events.
    pub fn validate(&self) -> BotResult<ValidationReport> {
        let mut config = (*self.config).clone();
        config.mode = Mode::Strict;
        let state = self.state();
        let mut bot = Bot::assemble(
            Arc::new(config),
            self.registry.clone(),
            self.clock.clone(),
            self.nlp.clone(),
            self.intents.clone(),
            self.factories.clone(),
            Some(&state),
        )?;

        let mut report = ValidationReport::default();
        let mut texts = vec!["hi".to_string()];
        for name in &self.intents {
            let Some(capability) = self.registry.resolve(name).and_then(|s| s.intent().cloned())
            else {
                report.failures.push(format!("intent <{name}> has no capability"));
                continue;
            };
            let own = capability.test_texts();
            for text in std::iter::once("hi".to_string()).chain(own.iter().cloned()) {
                let message = Value::from(Message::text(text.as_str()).to_signal());
                let outcome = self
                    .registry
                    .signal(name, [("message", message)])
                    .and_then(|intent| {
                        bot.with_area::<Actions, _>(|_, ctx| capability.react(&intent, ctx))
                            .unwrap_or(Ok(Vec::new()))
                    });
                if let Err(err) = outcome {
                    error!(intent = %name, %text, %err, "intent failed");
                    report
                        .failures
                        .push(format!("intent <{name}> failed at text \"{text}\": {err}"));
                }
            }
            texts.extend(own);
        }

        for text in texts {
            bot.reply_text(text.as_str());
            let traced = bot
                .areas
                .iter()
                .flatten()
                .filter(|area| area.is_stateful() && !area.as_any().is::<Events>())
                .any(|area| !area.is_empty());
            if !traced {
                error!(%text, "no output for text");
                report.silent_texts.push(text);
            }
            for area in bot.areas.iter_mut().flatten() {
                if area.is_stateful() && !area.as_any().is::<Events>() {
                    area.clear();
                }
            }
        }

        report
            .failures
            .extend(bot.take_failures().into_iter().map(|err| err.to_string()));
        report.warnings = bot.warnings.clone();
        Ok(report)
    }
}

/// Configures and builds a [`Bot`]
pub struct BotBuilder {
    config: BotConfig,
    registry: Registry,
    intents: Option<Vec<String>>,
    nlp: Option<Arc<dyn NlpProvider>>,
    clock: Arc<dyn Clock>,
    factories: Vec<AreaFactory>,
    state: Option<serde_json::Value>,
}

impl Default for BotBuilder {
    fn default() -> Self {
        Self {
            config: BotConfig::default(),
            registry: Registry::new(),
            intents: None,
            nlp: None,
            clock: Arc::new(SystemClock),
            factories: Vec::new(),
            state: None,
        }
    }
}

impl BotBuilder {
    pub fn config(mut self, config: BotConfig) -> Self {
        self.config = config;
        self
    }

    /// Active intents by variant name; defaults to Echo, Restart, FirstMessage and Stop
    pub fn intents<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.intents = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Register an intent variant and activate it
    pub fn custom_intent(mut self, name: &str, intent: Arc<dyn Intent>) -> BotResult<Self> {
        self.registry.register_intent(name, intent)?;
        self.intents
            .get_or_insert_with(|| DEFAULT_INTENTS.iter().map(|s| s.to_string()).collect())
            .push(name.to_string());
        Ok(self)
    }

    /// Register a custom variant under `parent`
    pub fn variant(mut self, name: &str, parent: &str, contract: Option<Contract>) -> BotResult<Self> {
        match contract {
            Some(contract) => self.registry.register_variant_with(name, parent, contract)?,
            None => self.registry.register_variant(name, parent)?,
        };
        Ok(self)
    }

    pub fn scorer(mut self, name: &str, scorer: Arc<dyn Scorer>) -> Self {
        self.registry.register_scorer(name, scorer);
        self
    }

    pub fn nlp(mut self, provider: Arc<dyn NlpProvider>) -> Self {
        self.nlp = Some(provider);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn area(mut self, factory: AreaFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Restore a conversation from [`Bot::state`]
    pub fn state(mut self, state: serde_json::Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> BotResult<Bot> {
        let intents = self
            .intents
            .unwrap_or_else(|| DEFAULT_INTENTS.iter().map(|s| s.to_string()).collect());
        for name in &intents {
            let spec = self
                .registry
                .resolve(name)
                .ok_or_else(|| BotError::UnknownVariant(name.clone()))?;
            if spec.intent().is_none() {
                return Err(BotError::schema(name.as_str(), "not an intent with a capability"));
            }
        }
        Bot::assemble(
            Arc::new(self.config),
            Arc::new(self.registry),
            self.clock,
            self.nlp,
            intents,
            self.factories,
            self.state.as_ref(),
        )
    }
}
