//! Basic Ask Example
//!
//! This example demonstrates how to:
//! - Ask a question and bind actions to the answer
//! - Watch a near miss get clarified
//! - Read what was stored in memory

use cim_dialog_runtime::{Ask, Bot, Say, Value};

fn show(bot: &mut Bot) {
    for utterance in bot.pop_utterances() {
        let text = utterance.text.unwrap_or_default();
        if utterance.options.is_empty() {
            println!("   bot: {text}");
        } else {
            println!("   bot: {text} [{}]", utterance.options.join(" / "));
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Dialog Runtime: Ask ===\n");

    let mut bot = Bot::builder().build()?;

    // Step 1: Ask a question
    println!("1. Asking...");
    bot.do_actions(vec![
        Ask::new("How are you?")
            .options(Value::map([
                ("good", vec!["good", "fine", "great"]),
                ("bad", vec!["bad", "awful"]),
            ]))
            .on("good", vec![Say::new("glad to hear that").into()])
            .on("bad", vec![Say::new("sorry to hear that").into()])
            .into(),
        Say::new("bye").into(),
    ]);
    show(&mut bot);

    // Step 2: A typo is clarified first
    for text in ["gret", "yes"] {
        println!("\n   user: {text}");
        bot.reply_text(text);
        show(&mut bot);
    }

    // Step 3: Memory keeps the exchange
    println!("\n2. Memory:");
    if let Some(memory) = bot.memory() {
        for (key, value) in memory.as_map() {
            println!("   {key}: {value:?}");
        }
    }

    println!("\n3. Persisted state:");
    println!("{}", serde_json::to_string_pretty(&bot.state())?);

    Ok(())
}
