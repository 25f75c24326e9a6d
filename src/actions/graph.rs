//! Graph: an explicit dialog state machine
//!
//! `transitions` maps a state name to the Ask asked in that state; the Ask's
//! synonym groups are keyed by the next state. The path walked so far is kept
//! in `_path`.

use super::{Env, ask, say, to_say};
use crate::signals::{Builtin, Signal};
use crate::value_objects::{Response, Value};

/// Ask of the current state
pub(crate) fn current_ask(graph: &Signal) -> Option<&Signal> {
    let state = graph.str("state")?;
    graph
        .get("transitions")?
        .as_map()?
        .get(state)?
        .as_signal()
}

pub(crate) fn respond(graph: &Signal, response: &Response, env: Env<'_>) -> Vec<Signal> {
    let (Some(current), Some(next)) = (current_ask(graph), response.matched.as_deref()) else {
        return vec![say(env.config.message_graph_wrong_transition.clone()), graph.clone()];
    };
    if !response.is_perfect() {
        return vec![say(env.config.message_graph_wrong_transition.clone()), graph.clone()];
    }

    let mut moved = graph.clone();
    let mut path = match graph.get("_path") {
        Some(Value::List(items)) => items.clone(),
        _ => Vec::new(),
    };
    path.push(graph.get("state").cloned().unwrap_or_default());
    moved.set("_path", Value::List(path));

    let mut actions: Vec<Signal> = ask::respond(current, response, env)
        .into_iter()
        .filter(|a| !(a.builtin() == Builtin::Store || a.builtin() == Builtin::Event))
        .collect();

    moved.set("state", next);
    if moved.str("final") == Some(next) {
        if let Some(terminal) = current_ask(&moved).and_then(|a| to_say(a, env.config)) {
            actions.push(terminal);
        }
    } else {
        actions.push(moved);
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Ask, Graph};
    use crate::clock::ManualClock;
    use crate::config::BotConfig;
    use crate::signals::Registry;
    use crate::value_objects::Message;

    fn two_states() -> Signal {
        Graph::new("a")
            .state(
                "a",
                Ask::new("<a>").options(Value::map([("b", vec!["goto b"])])),
            )
            .state("b", Ask::new("<b>"))
            .final_state("b")
            .into()
    }

    #[test]
    fn test_reaching_final_state_emits_terminal_prompt() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let env = Env { config: &config, registry: Registry::builtin(), clock: &clock };
        let graph = two_states();
        let response = Response::new(Some("b".into()), 1.0, Message::text("goto b"));
        let out = respond(&graph, &response, env);
        assert_eq!(out.len(), 1);
        assert!(out[0].is("Say"));
        assert_eq!(out[0].str("text"), Some("<b>"));
    }

    #[test]
    fn test_intermediate_state_keeps_graph() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let env = Env { config: &config, registry: Registry::builtin(), clock: &clock };
        let graph: Signal = Graph::new("a")
            .state("a", Ask::new("<a>").options(Value::map([("b", vec!["next"])])))
            .state("b", Ask::new("<b>").options(Value::map([("c", vec!["next"])])))
            .state("c", Ask::new("<c>"))
            .final_state("c")
            .into();
        let response = Response::new(Some("b".into()), 1.0, Message::text("next"));
        let out = respond(&graph, &response, env);
        assert_eq!(out.len(), 1);
        assert!(out[0].is("Graph"));
        assert_eq!(out[0].str("state"), Some("b"));
        assert_eq!(out[0].get("_path"), Some(&Value::List(vec!["a".into()])));
    }

    #[test]
    fn test_wrong_transition() {
        let config = BotConfig::default();
        let clock = ManualClock::new(0);
        let env = Env { config: &config, registry: Registry::builtin(), clock: &clock };
        let graph = two_states();
        let response = Response::new(None, 1.0, Message::text("elsewhere"));
        let out = respond(&graph, &response, env);
        assert_eq!(out[0].str("text"), Some(config.message_graph_wrong_transition.as_str()));
        assert_eq!(out[1], graph);
    }
}
