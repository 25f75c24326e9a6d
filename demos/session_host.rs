//! Session Host Example
//!
//! This example demonstrates how to:
//! - Run several conversations through one host
//! - Persist every conversation between requests
//! - Release timed reminders with `check_all`

use std::sync::Arc;

use cim_dialog_runtime::{
    Ask, Bot, BotResult, IntervalCondition, KeywordIntent, Primitive, Say, SessionHost, SetTrigger, Trigger,
    Utterance,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Dialog Runtime: Session Host ===\n");

    let host = SessionHost::in_memory(Arc::new(|state: Option<serde_json::Value>| -> BotResult<Bot> {
        let hours = KeywordIntent::new(
            ["hours", "opening hours"],
            vec![Say::new("we are open from 9 to 5").into()],
        )
        .command();
        let builder = Bot::builder().custom_intent("Hours", Arc::new(hours))?;
        match state {
            Some(state) => builder.state(state).build(),
            None => builder.build(),
        }
    }));

    let alice = host.new_session();
    let bob = host.new_session();

    // Step 1: Start both conversations
    println!("1. Greeting both users...");
    for session in [alice, bob] {
        let said = host
            .do_actions(
                session,
                vec![
                    Ask::new("How old are you?")
                        .options(Primitive::Int)
                        .actions(vec![Say::new(r"\1, noted").into()])
                        .into(),
                    SetTrigger::new(Trigger::new(
                        IntervalCondition::every(1_000),
                        vec![Say::new("anything else?").into()],
                    ))
                    .into(),
                ],
            )
            .await?;
        print_said(&session.to_string(), &said);
    }

    // Step 2: Interleaved replies
    println!("\n2. Replies...");
    for (session, text) in [(alice, "hours"), (bob, "41"), (alice, "29")] {
        println!("   {session} says: {text}");
        let said = host.reply_text(session, text).await?;
        print_said(&session.to_string(), &said);
    }

    // Step 3: Let the reminders fire
    println!("\n3. Waiting for reminders...");
    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
    for (session, said) in host.check_all().await? {
        print_said(&session.to_string(), &said);
    }

    // Step 4: Transcript of one conversation
    println!("\n4. Transcript of {alice}:");
    for entry in host.transcript(alice).await?.entries() {
        println!("   #{} {:?}: {}", entry.sequence_number, entry.agent, entry.text);
    }

    Ok(())
}

fn print_said(session: &str, said: &[Utterance]) {
    for utterance in said {
        println!("   bot -> {session}: {}", utterance.text.as_deref().unwrap_or_default());
    }
}
