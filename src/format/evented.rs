//! Evented timeline output for interactive flamegraph viewers.
//!
//! Converts the "current stack + tick count" observations into a balanced
//! stream of open/close events over a synthetic time axis, one axis unit
//! per sampled tick. At any prefix of the stream the number of opens
//! minus closes is >= 0, and at the end it is exactly 0.

use crate::profile::{FrameTable, Profile};
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::FormatError;
use log::debug;
use serde::Serialize;

/// Event kinds, serialized as `"O"` / `"C"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "C")]
    Close,
}

/// One open or close of a frame on the synthetic time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub at: u64,
    pub frame: usize,
}

/// Frame entry in the document's shared frame list.
#[derive(Debug, Clone, Serialize)]
pub struct FrameEntry {
    pub name: String,
}

/// One exported timeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventedProfile {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub unit: &'static str,
    pub start_value: u64,
    pub end_value: u64,
    pub events: Vec<Event>,
}

/// The full document handed to the viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventedDocument {
    pub version: String,
    pub frames: Vec<FrameEntry>,
    pub profiles: Vec<EventedProfile>,
    pub active_profile_index: usize,
    pub metadata: crate::profile::Metadata,
}

/// Configuration for evented output. Immutable; build a new formatter to
/// change it.
#[derive(Debug, Clone)]
pub struct EventedFormatter {
    /// Display name of the exported timeline
    pub profile_name: String,
}

impl Default for EventedFormatter {
    fn default() -> Self {
        Self {
            profile_name: "profile".to_string(),
        }
    }
}

impl EventedFormatter {
    pub fn new(profile_name: impl Into<String>) -> Self {
        Self {
            profile_name: profile_name.into(),
        }
    }

    /// Build the viewer document for a profile.
    pub fn document(&self, profile: &Profile) -> EventedDocument {
        let table = FrameTable::build(&profile.samples);
        let (events, end_value) = build_events(profile, &table);

        debug!(
            "evented export: {} frames, {} events, end value {}",
            table.len(),
            events.len(),
            end_value
        );

        EventedDocument {
            version: SCHEMA_VERSION.to_string(),
            frames: table
                .names()
                .iter()
                .map(|name| FrameEntry { name: name.clone() })
                .collect(),
            profiles: vec![EventedProfile {
                kind: "evented",
                name: self.profile_name.clone(),
                unit: "samples",
                start_value: 0,
                end_value,
                events,
            }],
            active_profile_index: 0,
            metadata: profile.metadata.clone(),
        }
    }

    /// Serialize the viewer document to JSON bytes.
    pub fn format(&self, profile: &Profile) -> Result<Vec<u8>, FormatError> {
        let document = self.document(profile);
        Ok(serde_json::to_vec(&document)?)
    }

    pub fn content_type(&self) -> &'static str {
        "application/json"
    }

    pub fn file_extension(&self) -> &'static str {
        "json"
    }
}

/// Diff consecutive stacks into open/close events.
///
/// Every event produced while processing a sample carries the tick at
/// which that sample begins; the tick then advances by the sample's
/// count. Frames left open after the last sample close at the final tick,
/// which is also the timeline's end value.
///
/// The close test asks whether the top of the open stack occurs anywhere
/// in the new sample, and the open test whether a frame is anywhere on
/// the open stack, not at the matching depth. A frame name recurring at a
/// different depth is therefore treated as still open. Viewers consuming
/// this output rely on that behavior, so it is kept.
fn build_events(profile: &Profile, table: &FrameTable) -> (Vec<Event>, u64) {
    let mut events = Vec::new();
    let mut open_stack: Vec<usize> = Vec::new();
    let mut tick: u64 = 0;

    for sample in &profile.samples {
        // Ids exist for every frame: the table was built from these
        // same samples.
        let ids: Vec<usize> = sample
            .frames
            .iter()
            .filter_map(|frame| table.id_of(frame))
            .collect();

        while let Some(&top) = open_stack.last() {
            if ids.contains(&top) {
                break;
            }
            open_stack.pop();
            events.push(Event {
                kind: EventKind::Close,
                at: tick,
                frame: top,
            });
        }

        for &id in &ids {
            if !open_stack.contains(&id) {
                events.push(Event {
                    kind: EventKind::Open,
                    at: tick,
                    frame: id,
                });
                open_stack.push(id);
            }
        }

        tick += sample.count;
    }

    while let Some(id) = open_stack.pop() {
        events.push(Event {
            kind: EventKind::Close,
            at: tick,
            frame: id,
        });
    }

    (events, tick)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_samples;
    use crate::profile::Metadata;

    fn document_for(raw: &str) -> EventedDocument {
        let profile = Profile::new(parse_samples(raw), Metadata::new());
        EventedFormatter::new("test").document(&profile)
    }

    fn assert_balanced(events: &[Event]) {
        let mut depth: i64 = 0;
        for event in events {
            depth += match event.kind {
                EventKind::Open => 1,
                EventKind::Close => -1,
            };
            assert!(depth >= 0, "close before matching open at {:?}", event);
        }
        assert_eq!(depth, 0, "unclosed frames at end of stream");
    }

    #[test]
    fn test_single_sample() {
        let doc = document_for("main;a 2\n");
        let profile = &doc.profiles[0];

        assert_eq!(profile.kind, "evented");
        assert_eq!(profile.unit, "samples");
        assert_eq!(profile.start_value, 0);
        assert_eq!(profile.end_value, 2);
        assert_eq!(
            profile.events,
            vec![
                Event { kind: EventKind::Open, at: 0, frame: 0 },
                Event { kind: EventKind::Open, at: 0, frame: 1 },
                Event { kind: EventKind::Close, at: 2, frame: 1 },
                Event { kind: EventKind::Close, at: 2, frame: 0 },
            ]
        );
    }

    #[test]
    fn test_sibling_switch_closes_and_opens() {
        let doc = document_for("main;A;B 1\nmain;A;C 2\n");
        let profile = &doc.profiles[0];

        let names: Vec<&str> = doc.frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["main", "A", "B", "C"]);
        assert_eq!(profile.end_value, 3);
        assert_eq!(
            profile.events,
            vec![
                Event { kind: EventKind::Open, at: 0, frame: 0 },
                Event { kind: EventKind::Open, at: 0, frame: 1 },
                Event { kind: EventKind::Open, at: 0, frame: 2 },
                Event { kind: EventKind::Close, at: 1, frame: 2 },
                Event { kind: EventKind::Open, at: 1, frame: 3 },
                Event { kind: EventKind::Close, at: 3, frame: 3 },
                Event { kind: EventKind::Close, at: 3, frame: 1 },
                Event { kind: EventKind::Close, at: 3, frame: 0 },
            ]
        );
        assert_balanced(&profile.events);
    }

    #[test]
    fn test_identical_consecutive_samples_stay_open() {
        let doc = document_for("a;b 1\na;b 2\n");
        let profile = &doc.profiles[0];

        assert_eq!(profile.end_value, 3);
        // No close/reopen between the two samples.
        assert_eq!(profile.events.len(), 4);
        assert_balanced(&profile.events);
    }

    #[test]
    fn test_balance_and_monotonicity_over_irregular_input() {
        let doc = document_for(
            "main;a;b 2\nmain;c 1\nmain;a 3\nmain;a;b;d 1\nidle 4\nmain;c 2\n",
        );
        let profile = &doc.profiles[0];

        assert_balanced(&profile.events);
        let mut last_at = 0;
        for event in &profile.events {
            assert!(event.at >= last_at, "time axis went backwards");
            last_at = event.at;
        }
        assert_eq!(profile.end_value, 13);

        let opens = profile
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Open)
            .count();
        let closes = profile.events.len() - opens;
        assert_eq!(opens, closes);
    }

    #[test]
    fn test_recurring_frame_at_other_depth_is_kept_open() {
        // "main" is the root of the first sample and a child in the
        // second. The close test only asks whether the name occurs
        // anywhere in the new sample, so "main" survives as an open
        // frame and "x" opens underneath it. Long-standing behavior,
        // kept for viewer compatibility.
        let doc = document_for("main;a 1\nx;main 1\n");
        let profile = &doc.profiles[0];

        assert_balanced(&profile.events);
        let names: Vec<&str> = doc.frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["main", "a", "x"]);
        assert_eq!(
            profile.events,
            vec![
                Event { kind: EventKind::Open, at: 0, frame: 0 },
                Event { kind: EventKind::Open, at: 0, frame: 1 },
                Event { kind: EventKind::Close, at: 1, frame: 1 },
                Event { kind: EventKind::Open, at: 1, frame: 2 },
                Event { kind: EventKind::Close, at: 2, frame: 2 },
                Event { kind: EventKind::Close, at: 2, frame: 0 },
            ]
        );
    }

    #[test]
    fn test_empty_profile() {
        let doc = document_for("");
        let profile = &doc.profiles[0];

        assert!(doc.frames.is_empty());
        assert!(profile.events.is_empty());
        assert_eq!(profile.end_value, 0);
    }

    #[test]
    fn test_document_serialization_shape() {
        let mut profile = Profile::new(parse_samples("main 1\n"), Metadata::new());
        profile.tag("app", "demo");
        let bytes = EventedFormatter::new("demo").format(&profile).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["frames"][0]["name"], "main");
        assert_eq!(value["profiles"][0]["type"], "evented");
        assert_eq!(value["profiles"][0]["name"], "demo");
        assert_eq!(value["profiles"][0]["unit"], "samples");
        assert_eq!(value["profiles"][0]["startValue"], 0);
        assert_eq!(value["profiles"][0]["endValue"], 1);
        assert_eq!(value["profiles"][0]["events"][0]["type"], "O");
        assert_eq!(value["activeProfileIndex"], 0);
        assert_eq!(value["metadata"]["app"], "demo");
    }
}
