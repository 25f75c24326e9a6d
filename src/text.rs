//! Small text helpers shared by the matcher, the mouth and the stores

use uuid::Uuid;

/// Edit-distance similarity in `[0, 1]`.
///
/// `1 - distance / max_len`, measured in characters. Two empty strings have
/// similarity 0 so an empty answer never matches an empty option.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    let distance = strsim::levenshtein(a, b);
    (longest - distance.min(longest)) as f64 / longest as f64
}

/// Normalized key used to compare intent names with NLP labels
pub fn hash_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Short random key for stored answers
pub fn time_hash() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Make an utterance look like a sentence.
pub fn prepare_text(text: &str) -> String {
    let mut text = text.trim().replace(" i ", " I ");
    if text.is_empty() {
        return text;
    }

    text = if let Some(rest) = text.strip_prefix('"') {
        format!("\"{}", capitalize(rest))
    } else {
        capitalize(&text)
    };

    if let Some(last) = text.chars().last() {
        if !matches!(last, '.' | '!' | '?' | '"' | ':' | '\'') {
            text.push('.');
        }
    }
    text
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replace every placeholder with its value.
///
/// Longer placeholders are substituted first so `\10` is not eaten by `\1`.
pub fn substitute(text: &str, bindings: &[(String, String)]) -> String {
    let mut ordered: Vec<&(String, String)> = bindings.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    ordered
        .into_iter()
        .fold(text.to_string(), |acc, (key, value)| acc.replace(key.as_str(), value))
}

/// Fill the first `%s` of a configured message
pub fn fill(template: &str, value: &str) -> String {
    template.replacen("%s", value, 1)
}
