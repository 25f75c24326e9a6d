//! Fuzzy and typed answer matching
//!
//! An options spec (a [`Value`]) is read as [`Options`]: either a flat list of
//! [`OptionSpec`]s or keyed synonym groups. Every option scores the message;
//! the best non-null match wins, ties going to the first option.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, warn};

use crate::signals::{Builtin, Registry};
use crate::text::similarity;
use crate::value_objects::{Message, Pattern, Primitive, Response, Value};

/// Scoring capability usable as an option; returns a confidence in `[0, 1]`
pub trait Scorer: Send + Sync {
    fn score(&self, message: &Message) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&Message) -> f64 + Send + Sync,
{
    fn score(&self, message: &Message) -> f64 {
        self(message)
    }
}

/// Wrap a boolean predicate as a scorer (true scores 1, false 0)
pub fn predicate<F>(f: F) -> Arc<dyn Scorer>
where
    F: Fn(&Message) -> bool + Send + Sync + 'static,
{
    Arc::new(move |message: &Message| if f(message) { 1.0 } else { 0.0 })
}

/// One acceptable answer
#[derive(Debug, Clone, PartialEq)]
pub enum OptionSpec {
    /// Any text at all
    Anything,
    /// Text coercible to a primitive type
    Type(Primitive),
    /// Literal string scored by edit-distance similarity
    Text(String),
    /// Number or boolean compared by its rendering
    Literal(Value),
    /// Regular expression searched in the text
    Pattern(Pattern),
    /// Entity slot filled by the NLP collaborator
    Slot(String),
    /// Named scorer from the registry
    Scorer(String),
    /// Anything else; never matches
    Unsupported(String),
}

impl OptionSpec {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null | Value::Type(Primitive::Str) => OptionSpec::Anything,
            Value::Type(primitive) => OptionSpec::Type(*primitive),
            Value::Str(text) => OptionSpec::Text(text.clone()),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => OptionSpec::Literal(value.clone()),
            Value::Regex(pattern) => OptionSpec::Pattern(pattern.clone()),
            Value::Scorer(name) => OptionSpec::Scorer(name.clone()),
            Value::Signal(signal) if signal.builtin() == Builtin::NamedEntity => {
                OptionSpec::Slot(signal.str("name").unwrap_or_default().to_string())
            }
            other => OptionSpec::Unsupported(format!("{other:?}")),
        }
    }
}

/// Parsed options spec
#[derive(Debug, Clone, PartialEq)]
pub enum Options {
    Flat(Vec<OptionSpec>),
    /// Canonical answer -> acceptable surface variants, in key order
    Synonyms(Vec<(String, Vec<OptionSpec>)>),
}

impl Options {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Map(groups) => Options::Synonyms(
                groups
                    .iter()
                    .map(|(key, variants)| {
                        let specs = variants.items().into_iter().map(OptionSpec::from_value);
                        (key.clone(), specs.collect())
                    })
                    .collect(),
            ),
            Value::List(items) => Options::Flat(items.iter().map(OptionSpec::from_value).collect()),
            single => Options::Flat(vec![OptionSpec::from_value(single)]),
        }
    }
}

/// Score of a single option
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub matched: Option<String>,
    pub confidence: f64,
    pub entities: BTreeMap<String, String>,
}

impl Score {
    fn hit(matched: impl Into<String>, confidence: f64) -> Self {
        Self {
            matched: Some(matched.into()),
            confidence,
            entities: BTreeMap::new(),
        }
    }

    fn miss(confidence: f64) -> Self {
        Self {
            matched: None,
            confidence,
            entities: BTreeMap::new(),
        }
    }
}

/// Matches messages against an options spec
pub struct Matcher<'a> {
    options: Options,
    registry: &'a Registry,
}

impl<'a> Matcher<'a> {
    pub fn new(options: &Value, registry: &'a Registry) -> Self {
        Self {
            options: Options::from_value(options),
            registry,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn score(&self, option: &OptionSpec, message: &Message) -> Score {
        let text = message.text.as_str();
        match option {
            OptionSpec::Anything => Score::hit(text, 1.0),
            OptionSpec::Type(primitive) => match primitive.coerce(text) {
                Some(matched) => Score::hit(matched, 1.0),
                None => Score::miss(1.0),
            },
            OptionSpec::Text(expected) => {
                let confidence = similarity(expected, text);
                if confidence > 0.0 {
                    Score::hit(expected.clone(), confidence)
                } else {
                    Score::miss(1.0)
                }
            }
            OptionSpec::Literal(value) => {
                let rendered = value.render().unwrap_or_default();
                let confidence = if rendered == text { 1.0 } else { 0.0 };
                Score::hit(rendered, confidence)
            }
            OptionSpec::Pattern(pattern) => match pattern.regex().captures(text) {
                Some(captures) => {
                    let matched = captures.get(1).or_else(|| captures.get(0));
                    let mut score = Score::hit(matched.map(|m| m.as_str()).unwrap_or_default(), 1.0);
                    for name in pattern.regex().capture_names().flatten() {
                        if let Some(m) = captures.name(name) {
                            score.entities.insert(name.to_string(), m.as_str().to_string());
                        }
                    }
                    score
                }
                None => Score::miss(1.0),
            },
            OptionSpec::Slot(name) => match &message.nlp {
                Some(nlp) => match nlp.entity(name) {
                    Some(value) => Score::hit(value, 1.0),
                    None => Score::miss(1.0),
                },
                None => {
                    warn!(slot = %name, "named entities require an NLP provider");
                    Score::miss(1.0)
                }
            },
            OptionSpec::Scorer(name) => match self.registry.scorer(name) {
                Some(scorer) => Score::hit(text, scorer.score(message)),
                None => {
                    error!(scorer = %name, "unknown scorer in matcher options");
                    Score::miss(0.0)
                }
            },
            OptionSpec::Unsupported(what) => {
                error!(option = %what, "unsupported option in matcher");
                Score::miss(0.0)
            }
        }
    }

    /// Score every option
    pub fn scores(&self, message: &Message) -> Vec<Score> {
        match &self.options {
            Options::Flat(options) => options.iter().map(|o| self.score(o, message)).collect(),
            Options::Synonyms(groups) => groups
                .iter()
                .flat_map(|(key, options)| {
                    options.iter().map(move |option| {
                        let mut score = self.score(option, message);
                        if score.matched.is_some() {
                            score.matched = Some(key.clone());
                        }
                        score.entities = BTreeMap::from([(key.clone(), message.text.clone())]);
                        score
                    })
                })
                .collect(),
        }
    }

    /// Best match for `message`
    pub fn respond(&self, message: &Message) -> Response {
        let best = self
            .scores(message)
            .into_iter()
            .filter(|score| score.matched.is_some())
            .fold(None::<Score>, |best, score| match best {
                Some(best) if best.confidence >= score.confidence => Some(best),
                _ => Some(score),
            });

        match best {
            Some(score) => {
                let mut response = Response::new(score.matched, score.confidence, message.clone());
                response.entities = score.entities;
                response
            }
            None => Response::new(None, 1.0, message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::{EntityMention, NlpResult};
    use crate::signals::Signal;

    fn respond(options: Value, text: &str) -> Response {
        Matcher::new(&options, Registry::builtin()).respond(&Message::text(text))
    }

    #[test]
    fn test_type_marker_and_literals() {
        let options = Value::List(vec![
            Value::Type(Primitive::Int),
            "one".into(),
            "two".into(),
            "three".into(),
        ]);
        let response = respond(options.clone(), "two");
        assert_eq!(response.matched.as_deref(), Some("two"));
        assert_eq!(response.confidence, 1.0);

        let response = respond(options, "42");
        assert_eq!(response.matched.as_deref(), Some("42"));
        assert!(response.is_perfect());
    }

    #[test]
    fn test_near_miss_is_not_perfect() {
        let response = respond(Value::from(vec!["good", "bad"]), "goo");
        assert_eq!(response.matched.as_deref(), Some("good"));
        assert_eq!(response.confidence, 0.75);
        assert!(!response.is_perfect());
    }

    #[test]
    fn test_no_match_is_confident_null() {
        let response = respond(Value::from(vec!["good", "bad"]), "hz");
        assert_eq!(response.matched, None);
        assert_eq!(response.confidence, 1.0);
    }

    #[test]
    fn test_null_options_accept_anything() {
        let response = respond(Value::Null, "whatever");
        assert_eq!(response.matched.as_deref(), Some("whatever"));
        assert!(response.is_perfect());
    }

    #[test]
    fn test_numeric_and_bool_literals() {
        let response = respond(Value::List(vec![Value::Int(2), Value::Bool(true)]), "2");
        assert_eq!(response.matched.as_deref(), Some("2"));
        assert!(response.is_perfect());

        let response = respond(Value::Float(5.0), "5.0");
        assert!(response.is_perfect());
    }

    #[test]
    fn test_regex_group_and_entities() {
        let options = Value::pattern(r"is (?P<number>\d+)").unwrap();
        let response = respond(options, "my number is 42");
        assert_eq!(response.matched.as_deref(), Some("42"));
        assert_eq!(response.entities.get("number").map(String::as_str), Some("42"));

        let options = Value::pattern(r"\d+").unwrap();
        assert_eq!(respond(options, "it is 7").matched.as_deref(), Some("7"));
    }

    #[test]
    fn test_synonyms_report_canonical_key() {
        let options = Value::map([
            ("no", Value::from(vec!["n", "no", "nope"])),
            ("yes", Value::from(vec!["y", "yes", "yeah"])),
        ]);
        let response = respond(options, "yeah");
        assert_eq!(response.matched.as_deref(), Some("yes"));
        assert!(response.is_perfect());
        assert_eq!(response.entities.get("yes").map(String::as_str), Some("yeah"));
    }

    #[test]
    fn test_named_entity_slot() {
        let mut message = Message::text("my name is bob");
        message.nlp = Some(NlpResult {
            entities: vec![EntityMention {
                entity: "name".into(),
                value: "bob".into(),
                start: None,
                end: None,
                confidence: None,
            }],
            intents: vec![],
        });
        let options = Value::from(Signal::named_entity("Name"));
        let response = Matcher::new(&options, Registry::builtin()).respond(&message);
        assert_eq!(response.matched.as_deref(), Some("bob"));

        let without_nlp = respond(Value::from(Signal::named_entity("name")), "bob");
        assert_eq!(without_nlp.matched, None);
    }

    #[test]
    fn test_registered_scorer() {
        let mut registry = Registry::new();
        registry.register_scorer("shouting", predicate(|m| m.text.ends_with('!')));
        let options = Value::Scorer("shouting".into());
        let matcher = Matcher::new(&options, &registry);
        assert!(matcher.respond(&Message::text("hey!")).is_perfect());
        assert_eq!(matcher.respond(&Message::text("hey")).confidence, 0.0);
    }

    #[test]
    fn test_ties_go_to_first_option() {
        let response = respond(Value::from(vec!["cat", "car"]), "ca");
        assert_eq!(response.matched.as_deref(), Some("cat"));
    }
}
