use serde::{Deserialize, Serialize};

/// Severity levels for activity entries.
/// Controls retention policies and log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Membership and access changes: long-term retention
    Critical,
    /// Field edits and creation (default)
    #[default]
    Important,
    /// Self-service requests that may be withdrawn
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Trait for entities that can be recorded in the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of event names, e.g. "mission" in "mission.member_added".
    fn entity_type() -> &'static str;

    /// Id of the resource the event is about.
    fn subject_id(&self) -> String;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "join_requested" | "join_cancelled" => Severity::Noise,
            "created" | "updated" => self.severity(),
            _ => Severity::Critical,
        }
    }
}
