//! Integration tests for conversation flows
//!
//! These tests drive a bot through whole exchanges:
//! - Answering, clarifying and repeating questions
//! - Commands interrupting a pending question
//! - Graph and Attend state machines
//! - Custom keyword intents

use std::sync::Arc;

use cim_dialog_runtime::actions::clarify::SKIPPED;
use cim_dialog_runtime::{
    Ask, Attend, Bot, BotConfig, Graph, KeywordIntent, ManualClock, PatternNlp, Primitive, Say,
    Signal, Value,
};

fn bot() -> Bot {
    Bot::builder()
        .clock(Arc::new(ManualClock::new(0)))
        .build()
        .unwrap()
}

fn said(bot: &mut Bot) -> Vec<String> {
    bot.pop_utterances()
        .into_iter()
        .filter_map(|u| u.text)
        .collect()
}

fn how_are_you() -> Ask {
    Ask::new("How are you?")
        .options(vec!["good", "bad"])
        .actions(vec![Say::new(r"you feel \1").into()])
}

fn favorite_number() -> Ask {
    Ask::new("What is your favorite number?")
        .options(Primitive::Int)
        .actions(vec![Say::new(r"\1 is a fine number").into()])
}

/// Matched answers stored under the default location
fn stored_matches(bot: &Bot) -> Vec<String> {
    bot.memory()
        .and_then(|memory| memory.get("general"))
        .and_then(Value::as_map)
        .map(|records| {
            records
                .values()
                .filter_map(|record| record.as_map()?.get("match")?.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Test that a perfect answer runs the bound actions
#[test]
fn test_perfect_answer() {
    let mut bot = bot();
    bot.do_actions(vec![how_are_you().into()]);

    let utterances = bot.pop_utterances();
    assert_eq!(utterances.len(), 1);
    assert_eq!(utterances[0].text.as_deref(), Some("How are you?"));
    assert_eq!(utterances[0].options, vec!["good", "bad"]);

    bot.reply_text("good");
    assert_eq!(said(&mut bot), vec!["You feel good."]);
    assert!(bot.focus().is_none());
    assert_eq!(stored_matches(&bot), vec!["good"]);
}

/// Test that a near miss is clarified before it counts
#[test]
fn test_near_miss_is_clarified() {
    let mut bot = bot();
    bot.do_actions(vec![how_are_you().into()]);
    bot.pop_utterances();

    bot.reply_text("goo");
    let utterances = bot.pop_utterances();
    assert_eq!(utterances.len(), 1);
    assert_eq!(utterances[0].text.as_deref(), Some("Did you mean, good?"));
    assert_eq!(utterances[0].options, vec!["no", "yes"]);
    assert!(bot.focus().is_some_and(|f| f.is("Clarify")));

    bot.reply_text("yes");
    assert_eq!(said(&mut bot), vec!["You feel good."]);
    assert!(bot.focus().is_none());
}

/// Test that denying a clarification asks again
#[test]
fn test_denied_clarification_reasks() {
    let mut bot = bot();
    bot.do_actions(vec![how_are_you().into()]);
    bot.pop_utterances();

    bot.reply_text("goo");
    bot.pop_utterances();
    bot.reply_text("no");
    assert_eq!(said(&mut bot), vec!["Sorry, let's try again.", "How are you?"]);
    assert!(bot.focus().is_some_and(|f| f.is("Ask")));
}

/// Test that unrelated answers to a direct question list the options eventually
#[test]
fn test_unrelated_answer_lists_options() {
    let mut bot = bot();
    bot.do_actions(vec![how_are_you().into()]);
    bot.pop_utterances();

    bot.reply_text("hz");
    assert_eq!(
        said(&mut bot),
        vec!["Please choose from given options.", "How are you?"]
    );

    bot.reply_text("hz");
    assert_eq!(
        said(&mut bot),
        vec!["Options are (good, bad).", "How are you?"]
    );

    bot.reply_text("bad");
    assert_eq!(said(&mut bot), vec!["You feel bad."]);
}

/// Test a typed answer
#[test]
fn test_typed_answer() {
    let mut bot = bot();
    bot.do_actions(vec![favorite_number().into()]);
    bot.reply_text("7");
    assert_eq!(
        said(&mut bot),
        vec!["What is your favorite number?", "7 is a fine number."]
    );
    assert_eq!(stored_matches(&bot), vec!["7"]);
}

/// Test the fallback when a typed answer never parses
#[test]
fn test_typed_answer_repeat_fail() {
    let mut bot = bot();
    bot.do_actions(vec![favorite_number().into()]);
    bot.pop_utterances();

    bot.reply_text("seven");
    assert_eq!(
        said(&mut bot),
        vec![
            "I didn't get it, please try to rephrase the answer.",
            "What is your favorite number?"
        ]
    );

    bot.reply_text("seven");
    assert_eq!(
        said(&mut bot),
        vec!["Sorry, I still didn't get it, is your answer complete?"]
    );

    bot.reply_text("yes");
    assert_eq!(said(&mut bot), vec!["Seven is a fine number."]);
    assert_eq!(stored_matches(&bot), vec!["seven"]);
}

/// Test skipping a question when the configuration allows it
#[test]
fn test_skip_question() {
    let config = BotConfig {
        clarify_allow_skip: true,
        ..BotConfig::default()
    };
    let mut bot = Bot::builder()
        .config(config)
        .clock(Arc::new(ManualClock::new(0)))
        .build()
        .unwrap();
    bot.do_actions(vec![favorite_number().no_store().into(), Say::new("next").into()]);
    bot.pop_utterances();

    bot.reply_text("seven");
    bot.reply_text("seven");
    let utterances = bot.pop_utterances();
    let last = utterances.last().unwrap();
    assert_eq!(last.options, vec!["no", "skip", "yes"]);

    bot.reply_text("skip");
    let texts = said(&mut bot);
    assert_eq!(texts.len(), 2);
    assert!(texts[0].starts_with(SKIPPED));
    assert_eq!(texts[1], "Next.");
    assert!(stored_matches(&bot).is_empty());
}

/// Test that Stop interrupts a pending question behind a confirmation
#[test]
fn test_stop_interrupts_focus() {
    let mut bot = bot();
    bot.do_actions(vec![how_are_you().into(), Say::new("bye").into()]);
    bot.pop_utterances();

    bot.reply_text("stop");
    let utterances = bot.pop_utterances();
    assert_eq!(
        utterances[0].text.as_deref(),
        Some("Do you really want to stop?")
    );
    assert_eq!(utterances[0].options, vec!["no", "yes"]);

    bot.reply_text("yes");
    assert_eq!(said(&mut bot), vec!["Stopped."]);
    assert!(bot.focus().is_none());
    assert!(bot.pending_actions().is_empty());
}

/// Test that declining Stop resumes the interrupted question
#[test]
fn test_declined_stop_resumes_question() {
    let mut bot = bot();
    bot.do_actions(vec![how_are_you().into()]);
    bot.pop_utterances();

    bot.reply_text("stop");
    bot.pop_utterances();
    bot.reply_text("no");
    assert_eq!(said(&mut bot), vec!["How are you?"]);

    bot.reply_text("good");
    assert_eq!(said(&mut bot), vec!["You feel good."]);
}

/// Test walking a dialog graph to its final state
#[test]
fn test_graph_walk() {
    let graph = Graph::new("start")
        .state(
            "start",
            Ask::new("Left or right?").options(Value::map([
                ("lost", vec!["left"]),
                ("end", vec!["right"]),
            ])),
        )
        .state(
            "lost",
            Ask::new("You are lost, go back?").options(Value::map([("start", vec!["back"])])),
        )
        .state("end", Ask::new("You made it"))
        .final_state("end");

    let mut bot = bot();
    bot.do_actions(vec![graph.into()]);
    let utterances = bot.pop_utterances();
    assert_eq!(utterances[0].text.as_deref(), Some("Left or right?"));
    assert_eq!(utterances[0].options, vec!["right", "left"]);

    bot.reply_text("left");
    assert_eq!(said(&mut bot), vec!["You are lost, go back?"]);

    bot.reply_text("up");
    assert_eq!(
        said(&mut bot),
        vec!["Please choose one of the options.", "You are lost, go back?"]
    );

    bot.reply_text("back");
    assert_eq!(said(&mut bot), vec!["Left or right?"]);

    bot.reply_text("right");
    assert_eq!(said(&mut bot), vec!["You made it."]);
    assert!(bot.focus().is_none());
}

fn profile_bot() -> Bot {
    let nlp = PatternNlp::new([r"name is (?P<name>\w+)", r"age is (?P<age>\d+)"]).unwrap();
    Bot::builder()
        .clock(Arc::new(ManualClock::new(0)))
        .nlp(Arc::new(nlp))
        .build()
        .unwrap()
}

fn profile() -> Attend {
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
}

/// Test that one message can fill every slot of an Attend
#[test]
fn test_attend_fills_slots_at_once() {
    let mut bot = profile_bot();
    bot.do_actions(vec![profile().into()]);
    assert_eq!(said(&mut bot), vec!["What is your name?"]);

    bot.reply_text("my name is bob and my age is 33");
    assert_eq!(said(&mut bot), vec!["Hello bob, 33."]);
    assert!(bot.focus().is_none());
}

/// Test that an Attend asks for the slots still missing
#[test]
fn test_attend_asks_for_missing_slot() {
    let mut bot = profile_bot();
    bot.do_actions(vec![profile().into()]);
    bot.pop_utterances();

    bot.reply_text("my name is bob");
    assert_eq!(said(&mut bot), vec!["What is your age?"]);

    bot.reply_text("33");
    assert_eq!(said(&mut bot), vec!["Hello bob, 33."]);
}

/// Test a custom keyword intent next to the fallback echo
#[test]
fn test_keyword_intent() {
    let greet = KeywordIntent::new(["hi", "hello"], vec![Say::new(r"hello to you, \text").into()]);
    let mut bot = Bot::builder()
        .clock(Arc::new(ManualClock::new(0)))
        .custom_intent("Greet", Arc::new(greet))
        .unwrap()
        .build()
        .unwrap();
    assert!(bot.intents().iter().any(|name| name == "Greet"));

    bot.reply_text("hello");
    assert_eq!(said(&mut bot), vec!["Hello to you, hello."]);

    bot.reply_text("what?");
    assert_eq!(said(&mut bot), vec!["ECHO: what?"]);
}

/// Test that a keyword command answers while a question stays pending
#[test]
fn test_keyword_command_keeps_focus() {
    let help = KeywordIntent::new(["help"], vec![Say::new("just answer the question").into()])
        .command();
    let mut bot = Bot::builder()
        .clock(Arc::new(ManualClock::new(0)))
        .custom_intent("Help", Arc::new(help))
        .unwrap()
        .build()
        .unwrap();
    bot.do_actions(vec![how_are_you().into()]);
    bot.pop_utterances();

    bot.reply_text("help");
    assert_eq!(said(&mut bot), vec!["Just answer the question."]);
    assert!(bot.focus().is_some_and(|f| f.is("Ask")));

    bot.reply_text("good");
    assert_eq!(said(&mut bot), vec!["You feel good."]);
}
