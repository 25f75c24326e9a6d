//! NLP collaborator interface
//!
//! A provider turns text into loosely structured JSON
//! (`{"entities": [...], "intents": [...]}`); [`analyze`] normalizes it into an
//! [`NlpResult`] before the message enters dispatch.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::error::BotResult;

/// Entity extracted from a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub entity: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Intent label with its confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub intent: String,
    pub confidence: f64,
}

/// Normalized NLP output; intents sorted by descending confidence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NlpResult {
    pub entities: Vec<EntityMention>,
    pub intents: Vec<IntentScore>,
}

impl NlpResult {
    /// First value extracted for `entity` (case-insensitive)
    pub fn entity(&self, entity: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.entity.eq_ignore_ascii_case(entity))
            .map(|e| e.value.as_str())
    }
}

/// Natural-language provider consulted once per inbound message
pub trait NlpProvider: Send + Sync {
    /// Raw prediction: `{"entities": [{entity, value, ..}], "intents": [{intent, confidence}]}`
    fn predict(&self, text: &str) -> serde_json::Value;
}

/// Run a provider and normalize its output
pub fn analyze(provider: &dyn NlpProvider, text: &str) -> NlpResult {
    normalize(&provider.predict(text))
}

/// Keep only the known keys of each record, drop malformed ones with a warning
pub fn normalize(raw: &serde_json::Value) -> NlpResult {
    let records = |key: &str| -> Vec<serde_json::Value> {
        raw.get(key)
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default()
    };

    let entities = records("entities")
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<EntityMention>(record) {
            Ok(entity) => Some(entity),
            Err(err) => {
                warn!(%err, "entities should look like [{{entity, value}}, ...]");
                None
            }
        })
        .collect();

    let mut intents: Vec<IntentScore> = records("intents")
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<IntentScore>(record) {
            Ok(intent) => Some(intent),
            Err(err) => {
                warn!(%err, "intents should look like [{{intent, confidence}}, ...]");
                None
            }
        })
        .collect();
    intents.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    NlpResult { entities, intents }
}

/// Entity extraction from the named groups of a list of regular expressions
#[derive(Debug, Clone)]
pub struct PatternNlp {
    patterns: Vec<Regex>,
}

impl PatternNlp {
    /// Patterns are compiled case-insensitively
    pub fn new<I, S>(patterns: I) -> BotResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(&format!("(?i){}", p.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl NlpProvider for PatternNlp {
    fn predict(&self, text: &str) -> serde_json::Value {
        let mut entities = Vec::new();
        for pattern in &self.patterns {
            for captures in pattern.captures_iter(text) {
                for name in pattern.capture_names().flatten() {
                    if let Some(m) = captures.name(name) {
                        entities.push(json!({
                            "entity": name,
                            "value": m.as_str(),
                            "start": m.start(),
                            "end": m.end(),
                        }));
                    }
                }
            }
        }
        json!({ "entities": entities })
    }
}
