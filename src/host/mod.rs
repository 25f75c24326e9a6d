//! Async multi-session host
//!
//! A [`SessionHost`] keeps one persisted state per conversation in a
//! [`SessionStore`], rebuilds a [`Bot`] from it for every request, runs the
//! request and saves the new state back. Requests for the same session are
//! serialized; different sessions run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dispatcher::Bot;
use crate::error::BotResult;
use crate::projections::Transcript;
use crate::signals::Signal;
use crate::value_objects::{Message, Utterance};

/// Builds a bot, restoring it from a persisted state when one exists
pub type BotFactory = Arc<dyn Fn(Option<serde_json::Value>) -> BotResult<Bot> + Send + Sync>;

/// Repository of persisted conversation states
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get the state of a session
    async fn load(&self, session: &Uuid) -> anyhow::Result<Option<serde_json::Value>>;

    /// Save or replace the state of a session
    async fn save(&self, session: Uuid, state: serde_json::Value) -> anyhow::Result<()>;

    /// Forget a session; true when it existed
    async fn remove(&self, session: &Uuid) -> anyhow::Result<bool>;

    /// All known sessions
    async fn sessions(&self) -> anyhow::Result<Vec<Uuid>>;
}

/// In-memory implementation of SessionStore
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    states: Arc<RwLock<HashMap<Uuid, serde_json::Value>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session: &Uuid) -> anyhow::Result<Option<serde_json::Value>> {
        let states = self.states.read().await;
        Ok(states.get(session).cloned())
    }

    async fn save(&self, session: Uuid, state: serde_json::Value) -> anyhow::Result<()> {
        let mut states = self.states.write().await;
        states.insert(session, state);
        Ok(())
    }

    async fn remove(&self, session: &Uuid) -> anyhow::Result<bool> {
        let mut states = self.states.write().await;
        Ok(states.remove(session).is_some())
    }

    async fn sessions(&self) -> anyhow::Result<Vec<Uuid>> {
        let states = self.states.read().await;
        Ok(states.keys().copied().collect())
    }
}

/// Runs many conversations, one bot per request
pub struct SessionHost {
    store: Arc<dyn SessionStore>,
    factory: BotFactory,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionHost {
    pub fn new(store: Arc<dyn SessionStore>, factory: BotFactory) -> Self {
        Self {
            store,
            factory,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Host backed by a fresh [`MemorySessionStore`]
    pub fn in_memory(factory: BotFactory) -> Self {
        Self::new(Arc::new(MemorySessionStore::new()), factory)
    }

    pub fn new_session(&self) -> Uuid {
        Uuid::new_v4()
    }

    async fn lock_for(&self, session: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(session).or_default().clone()
    }

    /// Restore, run `op`, persist and return what the bot said
    async fn run<F>(&self, session: Uuid, op: F) -> anyhow::Result<Vec<Utterance>>
    where
        F: FnOnce(&mut Bot) + Send,
    {
        let lock = self.lock_for(session).await;
        let _guard = lock.lock().await;

        let prior = self.store.load(&session).await?;
        let (state, utterances) = {
            let mut bot = (self.factory)(prior)
                .with_context(|| format!("restoring session {session}"))?;
            op(&mut bot);
            for failure in bot.failures() {
                warn!(%session, %failure, "area failure during request");
            }
            let utterances = bot.pop_utterances();
            (bot.state(), utterances)
        };
        self.store.save(session, state).await?;
        debug!(%session, said = utterances.len(), "session updated");
        Ok(utterances)
    }

    pub async fn reply(&self, session: Uuid, message: Message) -> anyhow::Result<Vec<Utterance>> {
        self.run(session, move |bot| bot.reply(message)).await
    }

    pub async fn reply_text(&self, session: Uuid, text: &str) -> anyhow::Result<Vec<Utterance>> {
        self.reply(session, Message::text(text)).await
    }

    pub async fn do_actions(
        &self,
        session: Uuid,
        actions: Vec<Signal>,
    ) -> anyhow::Result<Vec<Utterance>> {
        self.run(session, move |bot| bot.do_actions(actions)).await
    }

    pub async fn check(&self, session: Uuid) -> anyhow::Result<Vec<Utterance>> {
        self.run(session, Bot::check).await
    }

    /// Run `check` for every stored session; returns sessions that said something
    pub async fn check_all(&self) -> anyhow::Result<Vec<(Uuid, Vec<Utterance>)>> {
        let mut spoken = Vec::new();
        for session in self.store.sessions().await? {
            let utterances = self.check(session).await?;
            if !utterances.is_empty() {
                spoken.push((session, utterances));
            }
        }
        Ok(spoken)
    }

    /// Forget a conversation
    pub async fn reset(&self, session: Uuid) -> anyhow::Result<bool> {
        let lock = self.lock_for(session).await;
        let _guard = lock.lock().await;
        let existed = self.store.remove(&session).await?;
        self.locks.lock().await.remove(&session);
        Ok(existed)
    }

    pub async fn transcript(&self, session: Uuid) -> anyhow::Result<Transcript> {
        let prior = self.store.load(&session).await?;
        let bot = (self.factory)(prior)?;
        Ok(bot.transcript())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Ask, Say};

    fn host() -> SessionHost {
        SessionHost::in_memory(Arc::new(|state: Option<serde_json::Value>| {
            let builder = Bot::builder();
            match state {
                Some(state) => builder.state(state).build(),
                None => builder.build(),
            }
        }))
    }

    #[tokio::test]
    async fn test_state_survives_requests() {
        let host = host();
        let session = host.new_session();
        let said = host
            .do_actions(
                session,
                vec![
                    Ask::new("How are you?").options(vec!["good", "bad"]).into(),
                    Say::new("see you").into(),
                ],
            )
            .await
            .unwrap();
        assert_eq!(said[0].text.as_deref(), Some("How are you?"));

        let said = host.reply_text(session, "good").await.unwrap();
        assert_eq!(said.len(), 1);
        assert_eq!(said[0].text.as_deref(), Some("See you."));

        let transcript = host.transcript(session).await.unwrap();
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        let session = Uuid::new_v4();
        tokio_test::block_on(async {
            assert!(store.load(&session).await.unwrap().is_none());
            store.save(session, serde_json::json!({"Mouth": []})).await.unwrap();
            assert_eq!(store.sessions().await.unwrap(), vec![session]);
            assert!(store.load(&session).await.unwrap().is_some());
            assert!(store.remove(&session).await.unwrap());
            assert!(store.sessions().await.unwrap().is_empty());
        });
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let host = host();
        let a = host.new_session();
        let b = host.new_session();
        host.do_actions(a, vec![Ask::new("Name?").into()]).await.unwrap();
        let said = host.reply_text(b, "hello").await.unwrap();
        assert_eq!(said[0].text.as_deref(), Some("ECHO: hello."));

        assert!(host.reset(a).await.unwrap());
        assert!(!host.reset(a).await.unwrap());
        assert!(host.check_all().await.unwrap().is_empty());
    }
}
