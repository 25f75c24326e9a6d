//! Integration tests for deferred actions
//!
//! Triggers are armed through SetTrigger and Pause, then released by
//! messages, counts, text and the clock.

use std::sync::Arc;

use cim_dialog_runtime::{
    Bot, CountCondition, EventCondition, IntervalCondition, ManualClock, Pause, Say, SetTrigger,
    TextCondition, TimeCondition, Trigger,
};

fn bot_at(clock: Arc<ManualClock>) -> Bot {
    Bot::builder().clock(clock).build().unwrap()
}

fn said(bot: &mut Bot) -> Vec<String> {
    bot.pop_utterances()
        .into_iter()
        .filter_map(|u| u.text)
        .collect()
}

fn on_message(text: &str) -> Trigger {
    Trigger::new(EventCondition::on("Message"), vec![Say::new(text).into()])
}

/// Test that a deferred trigger speaks after the reply it was waiting for
#[test]
fn test_deferred_trigger_follows_reply() {
    let mut bot = bot_at(Arc::new(ManualClock::new(0)));
    bot.do_actions(vec![SetTrigger::new(on_message("noted")).into()]);
    assert!(said(&mut bot).is_empty());
    assert_eq!(bot.triggers().map(|t| t.len()), Some(1));

    bot.reply_text("hello");
    assert_eq!(said(&mut bot), vec!["ECHO: hello.", "Noted."]);
    assert_eq!(bot.triggers().map(|t| t.len()), Some(0));

    bot.reply_text("again");
    assert_eq!(said(&mut bot), vec!["ECHO: again."]);
}

/// Test that an instant trigger is released within the same pass
#[test]
fn test_instant_trigger() {
    let mut bot = bot_at(Arc::new(ManualClock::new(0)));
    bot.do_actions(vec![SetTrigger::new(on_message("right away").instant()).into()]);

    bot.reply_text("hello");
    let texts = said(&mut bot);
    assert_eq!(texts.len(), 2);
    assert!(texts.contains(&"Right away.".to_string()));
    assert!(texts.contains(&"ECHO: hello.".to_string()));
}

/// Test that check flags an instant trigger without releasing it
#[test]
fn test_instant_trigger_waits_for_next_event_after_check() {
    let clock = Arc::new(ManualClock::new(0));
    let mut bot = bot_at(clock.clone());
    bot.do_actions(vec![
        SetTrigger::new(
            Trigger::new(TimeCondition::at(1_000), vec![Say::new("instant one").into()]).instant(),
        )
        .into(),
    ]);

    clock.set(2_000);
    bot.check();
    assert!(said(&mut bot).is_empty());
    assert_eq!(bot.triggers().map(|t| t.len()), Some(1));

    bot.reply_text("hello");
    let texts = said(&mut bot);
    assert!(texts.contains(&"Instant one.".to_string()));
    assert!(texts.contains(&"ECHO: hello.".to_string()));
    assert_eq!(bot.triggers().map(|t| t.len()), Some(0));
}

/// Test that counts are relative to the moment the trigger was set
#[test]
fn test_count_condition_is_relative() {
    let mut bot = bot_at(Arc::new(ManualClock::new(0)));
    bot.reply_text("one");
    bot.do_actions(vec![
        SetTrigger::new(Trigger::new(
            CountCondition::new("Message", 2),
            vec![Say::new("two more").into()],
        ))
        .into(),
    ]);
    bot.pop_utterances();

    bot.reply_text("two");
    assert_eq!(said(&mut bot), vec!["ECHO: two."]);

    bot.reply_text("three");
    assert_eq!(said(&mut bot), vec!["ECHO: three.", "Two more."]);
}

/// Test that a text condition fires only on a matching message
#[test]
fn test_text_condition() {
    let mut bot = bot_at(Arc::new(ManualClock::new(0)));
    bot.do_actions(vec![
        SetTrigger::new(Trigger::new(
            TextCondition::new("Message", vec!["magic"]),
            vec![Say::new("you found it").into()],
        ))
        .into(),
    ]);

    bot.reply_text("nothing");
    assert_eq!(said(&mut bot), vec!["ECHO: nothing."]);

    bot.reply_text("magic");
    assert_eq!(said(&mut bot), vec!["ECHO: magic.", "You found it."]);
}

/// Test that interval triggers fire on check until their budget is spent
#[test]
fn test_interval_condition_on_check() {
    let clock = Arc::new(ManualClock::new(0));
    let mut bot = bot_at(clock.clone());
    bot.do_actions(vec![
        SetTrigger::new(
            Trigger::new(IntervalCondition::every(1_000), vec![Say::new("tick").into()]).times(2),
        )
        .into(),
    ]);

    clock.set(500);
    bot.check();
    assert!(said(&mut bot).is_empty());

    clock.set(1_000);
    bot.check();
    assert_eq!(said(&mut bot), vec!["Tick."]);

    clock.set(1_500);
    bot.check();
    assert!(said(&mut bot).is_empty());

    clock.set(2_000);
    bot.check();
    assert_eq!(said(&mut bot), vec!["Tick."]);
    assert_eq!(bot.triggers().map(|t| t.len()), Some(0));

    clock.set(5_000);
    bot.check();
    assert!(said(&mut bot).is_empty());
}

/// Test that a time condition waits for its moment
#[test]
fn test_time_condition() {
    let clock = Arc::new(ManualClock::new(0));
    let mut bot = bot_at(clock.clone());
    bot.do_actions(vec![
        SetTrigger::new(Trigger::new(
            TimeCondition::at(60_000),
            vec![Say::new("a minute passed").into()],
        ))
        .into(),
    ]);

    bot.check();
    assert!(said(&mut bot).is_empty());

    clock.advance(60_000);
    bot.check();
    assert_eq!(said(&mut bot), vec!["A minute passed."]);
}

/// Test that a pause holds the remaining actions until its condition fires
#[test]
fn test_pause_until_reply() {
    let mut bot = bot_at(Arc::new(ManualClock::new(0)));
    bot.do_actions(vec![
        Say::new("first").into(),
        Pause::until(EventCondition::on("Message")).into(),
        Say::new("second").into(),
    ]);
    assert_eq!(said(&mut bot), vec!["First."]);
    assert!(bot.pending_actions().is_empty());
    assert_eq!(bot.triggers().map(|t| t.len()), Some(1));

    bot.reply_text("go on");
    assert_eq!(said(&mut bot), vec!["ECHO: go on.", "Second."]);
}
