//! Runtime configuration
//!
//! [`BotConfig`] carries every tunable of the runtime. Field names double as
//! override keys: `apply_overrides` accepts them in any letter case, so
//! `{"RESPONSE_REPEAT_N": 3}` and `{"response_repeat_n": 3}` are equivalent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

use crate::error::{BotError, BotResult};
use crate::value_objects::Value;

/// How strictly signal shapes are checked during dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Shape mismatches are ignored
    #[default]
    Production,
    /// Every dispatched signal is validated and warnings are collected
    Strict,
}

/// Field names and location used when an answer is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreParameters {
    #[serde(rename = "where")]
    pub location: String,
    pub question: String,
    pub answer: String,
    #[serde(rename = "match")]
    pub matched: String,
}

impl Default for StoreParameters {
    fn default() -> Self {
        Self {
            location: "general".to_string(),
            question: "question".to_string(),
            answer: "answer".to_string(),
            matched: "match".to_string(),
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

/// Tunables of one runtime instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub mode: Mode,

    pub confirm_stop: bool,
    pub confirm_restart: bool,

    pub show_welcome_message: bool,
    pub show_stop_message: bool,
    pub show_restarted_message: bool,

    pub message_welcome: String,
    pub message_stopped: String,
    pub message_restarted: String,

    pub message_ask_repeat_direct: String,
    /// `%s` is replaced by the comma separated options
    pub message_ask_repeat_direct_options: String,
    pub message_ask_repeat: String,
    pub message_ask_repeat_fail: String,

    pub message_confirm: String,
    /// `%s` is replaced by the tentative match
    pub message_clarify: String,
    pub message_clarify_no: String,
    pub message_clarify_fail: String,
    /// `%s` is replaced by the quoted confirm keys
    pub message_confirm_fail: String,
    pub message_confirm_stop: String,
    pub message_confirm_restart: String,
    pub message_graph_wrong_transition: String,

    /// Retries before an Ask lists its options or asks for a complete answer
    pub response_repeat_n: i64,
    pub response_clarify: bool,
    /// Minimum confidence of a near miss that is clarified instead of repeated
    pub response_clarify_conf: f64,
    pub response_store: bool,
    pub clarify_allow_skip: bool,

    pub store_parameters: StoreParameters,
    /// Hashed keys for stored answers, otherwise the current time
    pub store_hash_key: bool,
    pub store_time: bool,
    pub store_match: bool,

    pub confirm_options: BTreeMap<String, Vec<String>>,
    pub confirm_skip_options: BTreeMap<String, Vec<String>>,

    pub history_limit: usize,
    pub log_limit: usize,

    pub provide_delays: bool,
    /// Reading speed used to derive utterance delays
    pub wpm: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        let no = words(&["n", "no", "nope", "negative", "not", "disagree", "not right"]);
        let yes = words(&[
            "y", "yes", "yeah", "yeap", "positive", "sure", "agree", "confirm", "right",
        ]);

        Self {
            mode: Mode::Production,
            confirm_stop: true,
            confirm_restart: true,
            show_welcome_message: false,
            show_stop_message: true,
            show_restarted_message: true,
            message_welcome: "welcome".to_string(),
            message_stopped: "stopped".to_string(),
            message_restarted: "restarted".to_string(),
            message_ask_repeat_direct: "please choose from given options".to_string(),
            message_ask_repeat_direct_options: "options are (%s)".to_string(),
            message_ask_repeat: "i didn't get it, please try to rephrase the answer".to_string(),
            message_ask_repeat_fail: "sorry, i still didn't get it, is your answer complete?"
                .to_string(),
            message_confirm: "do you confirm?".to_string(),
            message_clarify: "Did you mean, %s?".to_string(),
            message_clarify_no: "sorry, let's try again".to_string(),
            message_clarify_fail: "sorry, let's try again".to_string(),
            message_confirm_fail: "Please choose between \"%s\"".to_string(),
            message_confirm_stop: "do you really want to stop?".to_string(),
            message_confirm_restart: "do you really want to restart the bot?".to_string(),
            message_graph_wrong_transition: "please choose one of the options".to_string(),
            response_repeat_n: 2,
            response_clarify: true,
            response_clarify_conf: 0.65,
            response_store: true,
            clarify_allow_skip: false,
            store_parameters: StoreParameters::default(),
            store_hash_key: true,
            store_time: true,
            store_match: true,
            confirm_options: BTreeMap::from([
                ("no".to_string(), no.clone()),
                ("yes".to_string(), yes.clone()),
            ]),
            confirm_skip_options: BTreeMap::from([
                ("no".to_string(), no),
                ("skip".to_string(), words(&["skip", "s"])),
                ("yes".to_string(), yes),
            ]),
            history_limit: 64,
            log_limit: 64,
            provide_delays: true,
            wpm: 300.0,
        }
    }
}

fn options_value(options: &BTreeMap<String, Vec<String>>) -> Value {
    Value::Map(
        options
            .iter()
            .map(|(key, surface)| (key.clone(), Value::from(surface.clone())))
            .collect(),
    )
}

impl BotConfig {
    /// Parse a full configuration; missing keys take their defaults
    pub fn from_json_str(json: &str) -> BotResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply known keys from a JSON object; unknown keys are logged and skipped
    pub fn apply_overrides(&mut self, overrides: &serde_json::Value) -> BotResult<()> {
        let overrides = overrides
            .as_object()
            .ok_or_else(|| BotError::decode("config overrides must be an object"))?;

        let mut current = serde_json::to_value(&*self)?;
        let Some(fields) = current.as_object_mut() else {
            return Err(BotError::decode("config does not serialize to an object"));
        };
        for (key, value) in overrides {
            let key = key.to_ascii_lowercase();
            match fields.get_mut(&key) {
                Some(slot) => *slot = value.clone(),
                None => error!(key = %key, "unknown config key"),
            }
        }
        *self = serde_json::from_value(current)?;
        Ok(())
    }

    pub fn is_strict(&self) -> bool {
        self.mode == Mode::Strict
    }

    /// Yes/no synonym groups as a matcher options spec
    pub fn confirm_options_value(&self) -> Value {
        options_value(&self.confirm_options)
    }

    /// Yes/no/skip synonym groups as a matcher options spec
    pub fn skip_options_value(&self) -> Value {
        options_value(&self.confirm_skip_options)
    }

    /// Canonical confirm answers, in key order
    pub fn confirm_keys(&self) -> Vec<String> {
        self.confirm_options.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.response_repeat_n, 2);
        assert_eq!(config.response_clarify_conf, 0.65);
        assert_eq!(config.store_parameters.location, "general");
        assert_eq!(config.confirm_keys(), vec!["no", "yes"]);
        assert!(!config.is_strict());
    }

    #[test]
    fn test_overrides_are_case_insensitive() {
        let mut config = BotConfig::default();
        config
            .apply_overrides(&json!({
                "RESPONSE_REPEAT_N": 3,
                "mode": "strict",
                "store_parameters": {"where": "answers"},
                "no_such_key": true
            }))
            .unwrap();
        assert_eq!(config.response_repeat_n, 3);
        assert!(config.is_strict());
        assert_eq!(config.store_parameters.location, "answers");
        assert_eq!(config.store_parameters.question, "question");
    }

    #[test]
    fn test_bad_override_type_is_an_error() {
        let mut config = BotConfig::default();
        assert!(config.apply_overrides(&json!({"wpm": "fast"})).is_err());
        assert!(config.apply_overrides(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = BotConfig::from_json_str(r#"{"provide_delays": false}"#).unwrap();
        assert!(!config.provide_delays);
        assert_eq!(config.wpm, 300.0);
    }
}
