//! Transcript projection - the conversation as the user saw it
//!
//! Built from the Events log: inbound messages become user entries, uttered
//! Says become bot entries.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::LogProjection;
use crate::areas::LogRecord;
use crate::value_objects::Value;

/// Who produced a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Agent {
    Bot,
    User,
}

/// A single line of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sequence_number: u64,
    pub time: i64,
    pub agent: Agent,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl TranscriptEntry {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.time).single()
    }
}

/// Consecutive entries by the same agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptGroup {
    pub agent: Agent,
    pub entries: Vec<TranscriptEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    last_sequence: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_log(log: &[LogRecord]) -> Self {
        let mut transcript = Self::new();
        for record in log {
            transcript.apply(record);
        }
        transcript
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_agent(&self, agent: Agent) -> Vec<&TranscriptEntry> {
        self.entries.iter().filter(|e| e.agent == agent).collect()
    }

    /// Get a page of entries
    pub fn get_page(&self, offset: usize, limit: usize) -> &[TranscriptEntry] {
        let start = offset.min(self.entries.len());
        let end = (start + limit).min(self.entries.len());
        &self.entries[start..end]
    }

    /// Case-insensitive text search
    pub fn search(&self, query: &str) -> Vec<&TranscriptEntry> {
        let query = query.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.text.to_lowercase().contains(&query))
            .collect()
    }

    /// Group consecutive entries by agent
    pub fn grouped(&self) -> Vec<TranscriptGroup> {
        let mut groups: Vec<TranscriptGroup> = Vec::new();
        for entry in &self.entries {
            match groups.last_mut() {
                Some(group) if group.agent == entry.agent => group.entries.push(entry.clone()),
                _ => groups.push(TranscriptGroup {
                    agent: entry.agent,
                    entries: vec![entry.clone()],
                }),
            }
        }
        groups
    }
}

impl LogProjection for Transcript {
    fn apply(&mut self, record: &LogRecord) {
        let signal = &record.signal;
        let agent = if signal.is("Say") { Agent::Bot } else { Agent::User };
        self.last_sequence += 1;
        self.entries.push(TranscriptEntry {
            sequence_number: self.last_sequence,
            time: record.time,
            agent,
            text: signal.str("text").unwrap_or_default().to_string(),
            options: signal
                .get("options")
                .map(|o| o.items().into_iter().filter_map(Value::render).collect())
                .unwrap_or_default(),
        });
    }

    fn name(&self) -> &str {
        "Transcript"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Say;
    use crate::signals::Signal;

    fn record(signal: Signal, time: i64) -> LogRecord {
        LogRecord { signal, time }
    }

    #[test]
    fn test_transcript_from_log() {
        let log = vec![
            record(Signal::message("hi"), 1_000),
            record(Say::new("Hello.").into(), 1_001),
            record(Say::new("How are you?").options(["good", "bad"]).into(), 1_002),
            record(Signal::message("good"), 2_000),
        ];
        let transcript = Transcript::from_log(&log);
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.by_agent(Agent::Bot).len(), 2);
        assert_eq!(transcript.entries()[2].options, vec!["good", "bad"]);
        assert_eq!(transcript.entries()[3].sequence_number, 4);
        assert_eq!(
            transcript.entries()[0].timestamp().map(|t| t.timestamp_millis()),
            Some(1_000)
        );

        let groups = transcript.grouped();
        let agents: Vec<Agent> = groups.iter().map(|g| g.agent).collect();
        assert_eq!(agents, vec![Agent::User, Agent::Bot, Agent::User]);
        assert_eq!(groups[1].entries.len(), 2);

        assert_eq!(transcript.search("HOW").len(), 1);
        assert_eq!(transcript.get_page(3, 10).len(), 1);
    }
}
