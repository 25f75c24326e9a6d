//! Ask: a question awaiting one answer
//!
//! A perfect answer releases the bound actions (keyed by the canonical
//! answer when `actions` is a map), a stored record of the exchange and a
//! `done` event. A near miss is clarified; anything else is re-asked, with
//! the option list once the retry budget is spent.

use std::collections::BTreeMap;

use super::{Env, bind, say};
use crate::signals::{Builtin, Signal};
use crate::text::{fill, time_hash};
use crate::value_objects::{Response, Value};

/// Placeholder bindings offered to the actions of an answered Ask
pub(crate) fn answer_bindings(response: &Response) -> Vec<(String, String)> {
    let text = response.message.text.clone();
    let matched = response.matched.clone().unwrap_or_default();
    let mut bindings = vec![
        (r"\0".to_string(), text.clone()),
        (r"\text".to_string(), text),
        (r"\1".to_string(), matched.clone()),
        (r"\match".to_string(), matched),
    ];
    bindings.extend(
        response
            .entities
            .iter()
            .map(|(name, value)| (format!(r"\{name}"), value.clone())),
    );
    bindings
}

pub(crate) fn respond(ask: &Signal, response: &Response, env: Env<'_>) -> Vec<Signal> {
    let config = env.config;
    if response.is_perfect() {
        return answered(ask, response, env);
    }

    if response.matched.is_some()
        && config.response_clarify
        && response.confidence >= config.response_clarify_conf
    {
        return vec![clarify(ask, response, None, Some(false))];
    }

    let repeats = ask.int("_n").unwrap_or(0);
    let options = ask.items("options");
    let direct = options
        .iter()
        .all(|o| matches!(o, Value::Str(_) | Value::Int(_) | Value::Float(_)));

    if direct {
        let text = if repeats >= config.response_repeat_n {
            let labels: Vec<String> = options.into_iter().filter_map(Value::render).collect();
            fill(&config.message_ask_repeat_direct_options, &labels.join(", "))
        } else {
            config.message_ask_repeat_direct.clone()
        };
        return vec![say(text), ask.clone()];
    }

    if repeats >= config.response_repeat_n {
        // the raw text becomes the tentative answer
        let tentative = Response::new(
            Some(response.message.text.clone()),
            1.0,
            response.message.clone(),
        );
        return vec![clarify(
            ask,
            &tentative,
            Some(&config.message_ask_repeat_fail),
            None,
        )];
    }

    vec![say(config.message_ask_repeat.clone()), ask.clone()]
}

fn answered(ask: &Signal, response: &Response, env: Env<'_>) -> Vec<Signal> {
    let matched = response.matched.clone().unwrap_or_default();
    let mut actions = match ask.get("actions") {
        Some(Value::Map(keyed)) => keyed.get(&matched).map(Value::signals).unwrap_or_default(),
        Some(other) => other.signals(),
        None => Vec::new(),
    };
    bind(&mut actions, &answer_bindings(response));

    if env.config.response_store && ask.get("store") != Some(&Value::Bool(false)) {
        actions.insert(0, to_store(ask, response, env));
    }
    actions.push(Signal::event_typed(ask.clone(), "done"));
    actions
}

/// Clarify wrapping `ask` with a tentative response
pub(crate) fn clarify(
    ask: &Signal,
    response: &Response,
    text: Option<&str>,
    skip: Option<bool>,
) -> Signal {
    let mut clarify = Signal::assemble(
        Builtin::Clarify,
        [
            ("response", Value::from(response.to_signal())),
            ("ask", Value::from(ask.clone())),
        ],
    );
    if let Some(text) = text {
        clarify.set("text", text);
    }
    if let Some(skip) = skip {
        clarify.set("skip", skip);
    }
    clarify
}

/// Memory path and record of an answered Ask
pub(crate) fn store_record(
    ask: &Signal,
    response: &Response,
    env: Env<'_>,
) -> (String, BTreeMap<String, Value>) {
    let now = env.now();
    let parameters = &env.config.store_parameters;
    let renamed = |field: &str, fallback: &str| -> String {
        ask.get("rename")
            .and_then(|r| r.as_map())
            .and_then(|r| r.get(field))
            .and_then(Value::render)
            .unwrap_or_else(|| fallback.to_string())
    };

    let question = renamed("question", &parameters.question);
    let answer = renamed("answer", &parameters.answer);
    let matched = renamed("match", &parameters.matched);
    let location = renamed("where", &parameters.location);
    let fallback_key = if env.config.store_hash_key {
        time_hash()
    } else {
        now.to_string()
    };
    let key = renamed("key", &fallback_key);

    let mut record = BTreeMap::new();
    record.insert(question.clone(), ask.get("text").cloned().unwrap_or_default());
    record.insert(answer.clone(), Value::from(response.message.text.as_str()));
    if env.config.store_time {
        record.insert(
            format!("{question}_time"),
            ask.get("_time").cloned().unwrap_or_default(),
        );
        record.insert(format!("{answer}_time"), Value::Int(now));
    }
    if env.config.store_match && ask.get("options").is_some() {
        if let Some(m) = &response.matched {
            record.insert(matched, Value::from(m.as_str()));
        }
    }
    if let Some(Value::Map(extra)) = ask.get("store") {
        record.extend(extra.clone());
    }

    (format!("{location}.{key}"), record)
}

/// Store action capturing the exchange
pub fn to_store(ask: &Signal, response: &Response, env: Env<'_>) -> Signal {
    let (path, record) = store_record(ask, response, env);
    Signal::assemble(
        Builtin::Store,
        [("data", Value::map([(path, Value::Map(record))]))],
    )
}
