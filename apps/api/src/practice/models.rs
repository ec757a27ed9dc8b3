use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_SESSION_TYPE: &str = "mock_interview";

/// One interview question in a session deck. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub category: String,
    pub time_limit_seconds: u32,
}

/// User-chosen parameters for a practice session.
///
/// `job_title`, `industry` and `difficulty` are required. `language` and
/// `session_type` fall back to defaults when left blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub job_title: String,
    pub industry: String,
    pub difficulty: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_session_type")]
    pub session_type: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_session_type() -> String {
    DEFAULT_SESSION_TYPE.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Configuring,
    InProgress,
    Paused,
    Completed,
    Discarded,
}

impl SessionStatus {
    /// Completed and Discarded sessions accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Discarded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Configuring => "configuring",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Discarded => "discarded",
        }
    }
}

/// A captured free-text answer. Upserted while the session is mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub question_id: String,
    pub text: String,
    pub time_spent_seconds: u32,
    pub submitted_at: DateTime<Utc>,
}

impl Response {
    /// Placeholder used to score a question that was never answered.
    pub fn empty(question_id: &str) -> Self {
        Self {
            question_id: question_id.to_string(),
            text: String::new(),
            time_spent_seconds: 0,
            submitted_at: Utc::now(),
        }
    }
}

/// The session value owned by a single `SessionController`.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub config: SessionConfig,
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub responses: BTreeMap<String, Response>,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: Uuid, config: SessionConfig, questions: Vec<Question>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            config,
            questions,
            current_index: 0,
            responses: BTreeMap::new(),
            status: SessionStatus::Configuring,
            started_at: None,
            completed_at: None,
        }
    }

    /// Whole minutes between start and completion, rounded up.
    pub fn duration_minutes(&self) -> u32 {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => {
                let ms = (end - start).num_milliseconds().max(0);
                ((ms + 59_999) / 60_000) as u32
            }
            _ => 0,
        }
    }
}

/// Per-question result of the scoring pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub question_id: String,
    pub category: String,
    pub score: u8, // 0 – 100
    pub feedback: String,
}

/// Finalized performance summary for a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorecard {
    pub overall_score: u8, // 0 – 100
    pub per_question: Vec<QuestionScore>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub recommendations: Vec<String>,
    pub scorer_backend: String,
}

/// Immutable hand-off to the persistence gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub session_type: String,
    pub questions: Vec<Question>,
    pub answers: BTreeMap<String, Response>,
    pub scorecard: Scorecard,
    pub overall_score: u8,
    pub duration_minutes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> SessionConfig {
        SessionConfig {
            job_title: "Backend Engineer".to_string(),
            industry: "Fintech".to_string(),
            difficulty: "medium".to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            session_type: DEFAULT_SESSION_TYPE.to_string(),
        }
    }

    #[test]
    fn test_config_defaults_language_and_session_type() {
        let json = serde_json::json!({
            "job_title": "Backend Engineer",
            "industry": "Fintech",
            "difficulty": "medium"
        });
        let config: SessionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.language, "English");
        assert_eq!(config.session_type, "mock_interview");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(SessionStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Discarded.is_terminal());
        assert!(!SessionStatus::Paused.is_terminal());
        assert!(!SessionStatus::Configuring.is_terminal());
    }

    #[test]
    fn test_duration_rounds_up_to_whole_minutes() {
        let mut session = Session::new(Uuid::new_v4(), config(), vec![]);
        assert_eq!(session.duration_minutes(), 0);

        let start = Utc::now();
        session.started_at = Some(start);
        session.completed_at = Some(start + Duration::seconds(61));
        assert_eq!(session.duration_minutes(), 2);

        session.completed_at = Some(start + Duration::seconds(120));
        assert_eq!(session.duration_minutes(), 2);
    }

    #[test]
    fn test_sub_second_session_counts_as_one_minute() {
        let mut session = Session::new(Uuid::new_v4(), config(), vec![]);
        let start = Utc::now();
        session.started_at = Some(start);
        session.completed_at = Some(start + Duration::milliseconds(400));
        assert_eq!(session.duration_minutes(), 1);

        session.completed_at = Some(start);
        assert_eq!(session.duration_minutes(), 0);
    }

    #[test]
    fn test_new_session_starts_configuring_at_index_zero() {
        let session = Session::new(Uuid::new_v4(), config(), vec![]);
        assert_eq!(session.status, SessionStatus::Configuring);
        assert_eq!(session.current_index, 0);
        assert!(session.responses.is_empty());
        assert!(session.started_at.is_none());
    }
}
