//! Attendance-style record of who was admitted and when.
//!
//! Built from frame results only; it never feeds back into tracking.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::frame_result::FrameResult;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PresenceRecord {
    pub identity: String,
    pub first_admitted: DateTime<Utc>,
    pub last_admitted: DateTime<Utc>,
    pub admitted_frames: u64,
}

#[derive(Clone, Debug, Default)]
pub struct PresenceRegister {
    records: BTreeMap<String, PresenceRecord>,
}

impl PresenceRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one frame in. Returns identities admitted for the first time.
    pub fn record(&mut self, result: &FrameResult) -> Vec<String> {
        let at = result.captured_at;
        let mut newly_admitted = Vec::new();
        for face in result.admitted() {
            let label = face.identity.label();
            match self.records.get_mut(label) {
                Some(record) => {
                    record.last_admitted = record.last_admitted.max(at);
                    record.admitted_frames += 1;
                }
                None => {
                    self.records.insert(
                        label.to_string(),
                        PresenceRecord {
                            identity: label.to_string(),
                            first_admitted: at,
                            last_admitted: at,
                            admitted_frames: 1,
                        },
                    );
                    newly_admitted.push(label.to_string());
                }
            }
        }
        newly_admitted
    }

    pub fn get(&self, identity: &str) -> Option<&PresenceRecord> {
        self.records.get(identity)
    }

    /// Records ordered by identity.
    pub fn records(&self) -> impl Iterator<Item = &PresenceRecord> {
        self.records.values()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary_string(&self) -> Option<String> {
        if self.records.is_empty() {
            return None;
        }
        let mut lines = vec![format!("Presence ({} admitted):", self.records.len())];
        for r in self.records.values() {
            lines.push(format!(
                "  {:16} first {}  last {}  frames {}",
                r.identity,
                r.first_admitted.format("%H:%M:%S"),
                r.last_admitted.format("%H:%M:%S"),
                r.admitted_frames
            ));
        }
        Some(lines.join("\n"))
    }
}
