//! Confirm: a yes/no question with an action list per answer

use super::Env;
use crate::signals::Signal;
use crate::text::fill;
use crate::value_objects::Response;

pub(crate) fn respond(confirm: &Signal, response: &Response, env: Env<'_>) -> Vec<Signal> {
    let config = env.config;
    let keys = config.confirm_keys();
    match response.matched.as_deref() {
        Some(answer) if response.is_perfect() && keys.iter().any(|k| k == answer) => {
            if answer == "yes" {
                confirm.signals("yes")
            } else {
                confirm.signals("no")
            }
        }
        _ => {
            let text = fill(&config.message_confirm_fail, &keys.join("\", \""));
            vec![confirm.clone().with("text", text)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Confirm, say};
    use crate::clock::ManualClock;
    use crate::config::BotConfig;
    use crate::signals::Registry;
    use crate::value_objects::Message;

    #[test]
    fn test_branches() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let env = Env { config: &config, registry: Registry::builtin(), clock: &clock };
        let confirm: Signal = Confirm::new(vec![say("done")]).no(vec![say("cancelled")]).into();

        let yes = Response::new(Some("yes".into()), 1.0, Message::text("yeah"));
        assert_eq!(respond(&confirm, &yes, env)[0].str("text"), Some("done"));

        let no = Response::new(Some("no".into()), 1.0, Message::text("nope"));
        assert_eq!(respond(&confirm, &no, env)[0].str("text"), Some("cancelled"));

        let without_no: Signal = Confirm::new(vec![say("done")]).into();
        assert!(respond(&without_no, &no, env).is_empty());
    }

    #[test]
    fn test_unclear_answer_reissues_with_correction() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let env = Env { config: &config, registry: Registry::builtin(), clock: &clock };
        let confirm: Signal = Confirm::new(vec![say("done")]).into();
        let unclear = Response::new(None, 1.0, Message::text("maybe"));
        let out = respond(&confirm, &unclear, env);
        assert_eq!(out.len(), 1);
        assert!(out[0].is("Confirm"));
        assert_eq!(out[0].str("text"), Some(r#"Please choose between "no", "yes""#));
        assert_eq!(out[0].signals("yes"), confirm.signals("yes"));
    }
}
