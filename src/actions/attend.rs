//! Attend: fill several Ask slots from free-form answers
//!
//! Every message is tested against every unfilled slot, so one utterance may
//! fill several. The slot in focus also accepts the raw answer. Once every
//! slot holds a response the follow-up actions run, optionally behind a
//! Confirm built from `confirm_text`.

use std::collections::BTreeMap;

use super::{Env, ask, bind};
use crate::error::{BotError, BotResult};
use crate::matcher::Matcher;
use crate::signals::{Builtin, Signal};
use crate::value_objects::{Response, Value};

fn slot_responses(attend: &Signal, slots: usize) -> BotResult<Vec<Option<Response>>> {
    let mut responses = match attend.get("_responses") {
        Some(Value::List(items)) => items
            .iter()
            .map(|item| match item {
                Value::Signal(signal) => Response::from_signal(signal).map(Some),
                Value::Null => Ok(None),
                other => Err(BotError::decode(format!("Attend slot holds {other:?}"))),
            })
            .collect::<BotResult<Vec<_>>>()?,
        _ => Vec::new(),
    };
    responses.resize(slots, None);
    Ok(responses)
}

fn focus_index(attend: &Signal) -> Option<usize> {
    attend
        .get("_focus")
        .and_then(Value::as_map)
        .and_then(|focus| focus.get("i"))
        .and_then(Value::as_i64)
        .and_then(|i| usize::try_from(i).ok())
}

/// Ask currently awaiting an answer
pub(crate) fn focused_ask(attend: &Signal) -> Option<Signal> {
    let asks = attend.signals("ask");
    let index = focus_index(attend)
        .or_else(|| {
            slot_responses(attend, asks.len())
                .ok()?
                .iter()
                .position(Option::is_none)
        })
        .unwrap_or(0);
    asks.get(index).cloned()
}

pub(crate) fn respond(attend: &Signal, response: &Response, env: Env<'_>) -> BotResult<Vec<Signal>> {
    let asks = attend.signals("ask");
    let mut responses = slot_responses(attend, asks.len())?;

    for (slot, ask) in responses.iter_mut().zip(&asks) {
        if slot.is_none() {
            let options = ask.get("options").cloned().unwrap_or_default();
            let candidate = Matcher::new(&options, env.registry).respond(&response.message);
            if candidate.is_perfect() {
                *slot = Some(candidate);
            }
        }
    }

    if let Some(i) = focus_index(attend) {
        if matches!(responses.get(i), Some(None)) {
            responses[i] = Some(response.clone());
        }
    }

    let Some(next) = responses.iter().position(Option::is_none) else {
        let filled: Vec<Response> = responses.into_iter().flatten().collect();
        return Ok(follow_up(attend, &asks, &filled, env));
    };

    let mut waiting = attend.clone();
    waiting.set(
        "_responses",
        Value::List(
            responses
                .iter()
                .map(|r| r.as_ref().map(Response::to_signal).into())
                .collect(),
        ),
    );
    waiting.set(
        "_focus",
        Value::map([("i", Value::Int(next as i64)), ("n", Value::Int(1))]),
    );
    Ok(vec![waiting])
}

fn follow_up(attend: &Signal, asks: &[Signal], responses: &[Response], env: Env<'_>) -> Vec<Signal> {
    let bindings: Vec<(String, String)> = responses
        .iter()
        .enumerate()
        .map(|(i, r)| (format!(r"\{}", i + 1), r.matched.clone().unwrap_or_default()))
        .collect();

    let mut actions = attend.signals("actions");
    bind(&mut actions, &bindings);

    if attend.get("store").is_some_and(Value::is_truthy) {
        actions.insert(0, to_store(attend, asks, responses, env));
    }

    match attend.str("confirm_text") {
        Some(template) => {
            let text = crate::text::substitute(template, &bindings);
            vec![Signal::assemble(
                Builtin::Confirm,
                [("text", Value::from(text)), ("yes", Value::from(actions))],
            )]
        }
        None => actions,
    }
}

fn to_store(attend: &Signal, asks: &[Signal], responses: &[Response], env: Env<'_>) -> Signal {
    let mut path = String::new();
    let mut records = Vec::with_capacity(asks.len());
    for (ask, response) in asks.iter().zip(responses) {
        let (key, record) = ask::store_record(ask, response, env);
        path = key;
        let record: BTreeMap<String, Value> = record
            .into_iter()
            .filter(|(field, _)| !field.contains("_time"))
            .collect();
        records.push(Value::Map(record));
    }

    let mut data = BTreeMap::from([
        ("attend".to_string(), Value::List(records)),
        ("attend_time".to_string(), Value::Int(env.now())),
    ]);
    if let Some(Value::Map(extra)) = attend.get("store") {
        data.extend(extra.clone());
    }
    Signal::assemble(
        Builtin::Store,
        [("data", Value::map([(path, Value::Map(data))]))],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Ask, Attend, Say};
    use crate::clock::ManualClock;
    use crate::config::BotConfig;
    use crate::nlp::{EntityMention, NlpResult};
    use crate::signals::Registry;
    use crate::value_objects::Message;

    fn mention(entity: &str, value: &str) -> EntityMention {
        EntityMention {
            entity: entity.into(),
            value: value.into(),
            start: None,
            end: None,
            confidence: None,
        }
    }

    fn message(text: &str, entities: Vec<EntityMention>) -> Message {
        Message::text(text).with_nlp(NlpResult {
            entities,
            intents: Vec::new(),
        })
    }

    /// Unmatched response carrying the first message of the exchange
    fn opening(message: Message) -> Response {
        Response::new(None, 1.0, message)
    }

    fn name_and_age() -> Signal {
        Attend::new(
            vec![
                Ask::new("What is your name?")
                    .options(Signal::named_entity("name"))
                    .into(),
                Ask::new("What is your age?")
                    .options(Signal::named_entity("age"))
                    .into(),
            ],
            vec![Say::new(r"hello \1, \2").into()],
        )
        .into()
    }

    #[test]
    fn test_one_message_fills_both_slots() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let env = Env { config: &config, registry: Registry::builtin(), clock: &clock };
        let both = message(
            "my name is bob and my age is 1",
            vec![mention("name", "bob"), mention("age", "1")],
        );
        let out = respond(&name_and_age(), &opening(both), env).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].is("Store"));
        assert_eq!(out[1].str("text"), Some("hello bob, 1"));
        assert!(out.iter().all(|s| !s.is("Attend")));
    }

    #[test]
    fn test_partial_answer_focuses_next_slot() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let env = Env { config: &config, registry: Registry::builtin(), clock: &clock };
        let out = respond(&name_and_age(), &opening(message("my name is bob", vec![mention("name", "bob")])), env)
            .unwrap();
        assert_eq!(out.len(), 1);
        let waiting = &out[0];
        assert!(waiting.is("Attend"));
        assert_eq!(focused_ask(waiting).unwrap().str("text"), Some("What is your age?"));

        // the focused slot takes the raw answer
        let raw = Response::new(Some("12".into()), 1.0, Message::text("12"));
        let out = respond(waiting, &raw, env).unwrap();
        assert_eq!(out.last().and_then(|s| s.str("text")), Some("hello bob, 12"));
    }

    #[test]
    fn test_confirm_gate_and_store_extra() {
        let config = BotConfig::default();
        let clock = ManualClock::new(5);
        let env = Env { config: &config, registry: Registry::builtin(), clock: &clock };
        let attend: Signal = Attend::new(
            vec![Ask::new("What is your name?").options(Signal::named_entity("name")).into()],
            vec![Say::new("got it").into()],
        )
        .confirm_text(r"your name is \1, right?")
        .store(Value::map([("mission_complete", true)]))
        .into();

        let out = respond(&attend, &opening(message("name is bob", vec![mention("name", "bob")])), env).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].is("Confirm"));
        assert_eq!(out[0].str("text"), Some("your name is bob, right?"));
        let yes = out[0].signals("yes");
        let data = yes[0].get("data").and_then(Value::as_map).unwrap();
        let record = data.values().next().and_then(Value::as_map).unwrap();
        assert_eq!(record.get("attend").map(|a| a.items().len()), Some(1));
        assert_eq!(record.get("attend_time"), Some(&Value::Int(5)));
        assert_eq!(record.get("mission_complete"), Some(&Value::Bool(true)));
    }
}
