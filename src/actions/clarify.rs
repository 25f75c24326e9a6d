//! Clarify: confirm a tentative answer before handing it to its Ask

use super::{Env, ask, say};
use crate::error::{BotError, BotResult};
use crate::signals::Signal;
use crate::value_objects::{Message, Response};

/// Answer recorded when the user skips a question
pub const SKIPPED: &str = "<skipped>";

pub(crate) fn respond(clarify: &Signal, response: &Response, env: Env<'_>) -> BotResult<Vec<Signal>> {
    let config = env.config;
    let original = clarify
        .signal("ask")
        .ok_or_else(|| BotError::decode("Clarify without ask"))?;
    let tentative = clarify
        .signal("response")
        .map(Response::from_signal)
        .transpose()?
        .ok_or_else(|| BotError::decode("Clarify without response"))?;

    if !response.is_perfect() {
        return Ok(vec![say(config.message_clarify_fail.clone()), original.clone()]);
    }

    match response.matched.as_deref() {
        Some("yes") => {
            let answer = tentative
                .matched
                .clone()
                .unwrap_or_else(|| tentative.message.text.clone());
            let confirmed = Response::new(Some(answer.clone()), 1.0, Message::text(answer));
            Ok(ask::respond(original, &confirmed, env))
        }
        Some("skip") if config.clarify_allow_skip && clarify.bool("skip") != Some(false) => {
            let skipped = Response::new(Some(SKIPPED.to_string()), 1.0, tentative.message);
            Ok(ask::respond(original, &skipped, env))
        }
        _ => Ok(vec![say(config.message_clarify_no.clone()), original.clone()]),
    }
}
