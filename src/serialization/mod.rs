//! Tagged encoding of signal graphs as JSON
//!
//! Persisted state is plain JSON. The non-JSON parts of a [`Value`] are
//! written as reserved `@`-delimited strings:
//!
//! | value | encoding |
//! |---|---|
//! | signal | `{"@@Name@@": {fields}}` |
//! | variant reference | `"@@Name@@"` |
//! | type marker | `"@type@int@@"` |
//! | pattern | `"@{flags}@re@{source}@"` |
//! | scorer | `"@@fn@name@"` |
//!
//! Ordinary strings and map keys that start with `@` are escaped with an
//! `@str@` prefix so they never collide with the reserved forms.

use serde_json::{Map, Number};
use tracing::warn;

use crate::error::{BotError, BotResult};
use crate::signals::{Registry, Signal};
use crate::value_objects::{Pattern, Primitive, Value};

const ESCAPE: &str = "@str@";
const TYPE_PREFIX: &str = "@type@";
const SCORER_PREFIX: &str = "@@fn@";
const REGEX_MARK: &str = "@re@";

fn escape(text: &str) -> String {
    if text.starts_with('@') {
        format!("{ESCAPE}{text}")
    } else {
        text.to_string()
    }
}

fn variant_tag(name: &str) -> String {
    format!("@@{name}@@")
}

fn parse_variant_tag(text: &str) -> Option<&str> {
    text.strip_prefix("@@")?
        .strip_suffix("@@")
        .filter(|name| !name.is_empty() && !name.contains('@'))
}

/// Encode a value into tagged JSON
pub fn encode(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| {
                warn!(value = f, "non-finite float encoded as null");
                serde_json::Value::Null
            }),
        Value::Str(s) => serde_json::Value::String(escape(s)),
        Value::List(items) => serde_json::Value::Array(items.iter().map(encode).collect()),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (escape(k), encode(v)))
                .collect(),
        ),
        Value::Signal(signal) => encode_signal(signal),
        Value::Type(primitive) => {
            serde_json::Value::String(format!("{TYPE_PREFIX}{}@@", primitive.name()))
        }
        Value::Variant(name) => serde_json::Value::String(variant_tag(name)),
        Value::Regex(pattern) => serde_json::Value::String(format!(
            "@{}{REGEX_MARK}{}@",
            pattern.flags(),
            pattern.source()
        )),
        Value::Scorer(name) => serde_json::Value::String(format!("{SCORER_PREFIX}{name}@")),
    }
}

/// Encode a signal as a single-entry map keyed by its variant tag
pub fn encode_signal(signal: &Signal) -> serde_json::Value {
    let fields: Map<String, serde_json::Value> = signal
        .fields()
        .iter()
        .map(|(k, v)| (escape(k), encode(v)))
        .collect();
    let mut tagged = Map::new();
    tagged.insert(variant_tag(signal.name()), serde_json::Value::Object(fields));
    serde_json::Value::Object(tagged)
}

fn decode_string(registry: &Registry, text: &str) -> BotResult<Value> {
    if let Some(plain) = text.strip_prefix(ESCAPE) {
        return Ok(Value::Str(plain.to_string()));
    }
    if !text.starts_with('@') {
        return Ok(Value::Str(text.to_string()));
    }
    if let Some(name) = text
        .strip_prefix(TYPE_PREFIX)
        .and_then(|rest| rest.strip_suffix("@@"))
    {
        return Primitive::from_name(name)
            .map(Value::Type)
            .ok_or_else(|| BotError::decode(format!("unknown type marker {text}")));
    }
    if let Some(name) = text
        .strip_prefix(SCORER_PREFIX)
        .and_then(|rest| rest.strip_suffix('@'))
    {
        if registry.scorer(name).is_none() {
            warn!(scorer = name, "decoded scorer is not registered");
        }
        return Ok(Value::Scorer(name.to_string()));
    }
    if let Some((flags, rest)) = text[1..].split_once(REGEX_MARK) {
        if flags.chars().all(|c| c.is_ascii_alphabetic()) {
            let source = rest.strip_suffix('@').unwrap_or(rest);
            return Ok(Value::Regex(Pattern::new(source, flags)?));
        }
    }
    if let Some(name) = parse_variant_tag(text) {
        return registry
            .resolve(name)
            .map(|spec| Value::Variant(spec.name().to_string()))
            .ok_or_else(|| BotError::UnknownVariant(name.to_string()));
    }
    Err(BotError::decode(format!("unrecognized tag {text}")))
}

/// Decode tagged JSON, resolving variant tags against `registry`
pub fn decode(registry: &Registry, json: &serde_json::Value) -> BotResult<Value> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| BotError::decode(format!("unsupported number {n}"))),
        },
        serde_json::Value::String(s) => decode_string(registry, s),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| decode(registry, item))
            .collect::<BotResult<Vec<_>>>()
            .map(Value::List),
        serde_json::Value::Object(entries) => {
            if entries.len() == 1 {
                if let Some((tag, fields)) = entries.iter().next() {
                    if let Some(name) = parse_variant_tag(tag) {
                        return decode_signal(registry, name, fields).map(Value::from);
                    }
                }
            }
            decode_entries(registry, entries).map(Value::Map)
        }
    }
}

fn unescape_key(key: &str) -> String {
    key.strip_prefix(ESCAPE).unwrap_or(key).to_string()
}

fn decode_entries(
    registry: &Registry,
    entries: &Map<String, serde_json::Value>,
) -> BotResult<std::collections::BTreeMap<String, Value>> {
    entries
        .iter()
        .map(|(k, v)| Ok((unescape_key(k), decode(registry, v)?)))
        .collect()
}

fn decode_signal(registry: &Registry, name: &str, fields: &serde_json::Value) -> BotResult<Signal> {
    let spec = registry
        .resolve(name)
        .cloned()
        .ok_or_else(|| BotError::UnknownVariant(name.to_string()))?;
    let serde_json::Value::Object(fields) = fields else {
        return Err(BotError::decode(format!("fields of {name} are not a map")));
    };
    Signal::build(spec, decode_entries(registry, fields)?)
}

/// Encode a value straight to a JSON string
pub fn to_string(value: &Value) -> BotResult<String> {
    Ok(serde_json::to_string(&encode(value))?)
}

/// Decode a JSON string produced by [`to_string`]
pub fn from_str(registry: &Registry, json: &str) -> BotResult<Value> {
    let parsed: serde_json::Value = serde_json::from_str(json)?;
    decode(registry, &parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Ask, Graph};
    use crate::conditions::{CountCondition, Trigger};
    use serde_json::json;

    fn round_trip(value: Value) {
        let registry = Registry::builtin();
        let encoded = encode(&value);
        assert_eq!(decode(registry, &encoded).unwrap(), value, "{encoded}");
    }

    #[test]
    fn test_signal_encoding_shape() {
        let ask: Signal = Ask::new("hi?").options(vec!["a", "b"]).into();
        let encoded = encode_signal(&ask);
        assert_eq!(encoded["@@Ask@@"]["text"], json!("hi?"));
        assert_eq!(encoded["@@Ask@@"]["options"], json!(["a", "b"]));
    }

    #[test]
    fn test_markers_round_trip() {
        round_trip(Value::Type(Primitive::Int));
        round_trip(Value::Variant("Message".into()));
        round_trip(Value::Regex(Pattern::new(r"my name is (\w+)", "i").unwrap()));
        round_trip(Value::Regex(Pattern::new(r"\d+", "").unwrap()));
        round_trip(Value::Scorer("even".into()));
        round_trip(Value::from("@not a tag"));
        round_trip(Value::map([("@key", 1.5), ("plain", 2.0)]));
        round_trip(Value::Int(3));
    }

    #[test]
    fn test_nested_signals_round_trip() {
        let trigger: Signal = Trigger::new(
            CountCondition::new("Message", 2),
            vec![Graph::new("a")
                .state("a", Ask::new("<a>").options(Value::map([("b", vec!["goto b"])])))
                .state("b", Ask::new("<b>"))
                .final_state("b")
                .into()],
        )
        .times(3)
        .into();
        round_trip(Value::from(trigger));
    }

    #[test]
    fn test_unknown_variant_fails() {
        let registry = Registry::builtin();
        let err = decode(registry, &json!({"@@Nope@@": {}})).unwrap_err();
        assert!(matches!(err, BotError::UnknownVariant(name) if name == "Nope"));
        let err = decode(registry, &json!("@@Nope@@")).unwrap_err();
        assert!(matches!(err, BotError::UnknownVariant(_)));
    }

    #[test]
    fn test_string_helpers() {
        let registry = Registry::builtin();
        let value = Value::from(vec![Signal::message("hi")]);
        let text = to_string(&value).unwrap();
        assert_eq!(from_str(registry, &text).unwrap(), value);
    }
}
