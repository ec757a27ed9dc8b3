//! Session Configurator: validates a `SessionConfig` and builds the deck.
//!
//! Flow: validate → remote generation (bounded by a timeout) → sanitize →
//!       local fallback deck on error, timeout, or empty result.
//!
//! Generation failures never reach the user as errors; they become a notice.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::SessionError;
use crate::llm_client::LlmClient;
use crate::practice::models::{
    Question, Session, SessionConfig, DEFAULT_LANGUAGE, DEFAULT_SESSION_TYPE,
};
use crate::practice::prompts::{QUESTION_GENERATION_PROMPT_TEMPLATE, QUESTION_GENERATION_SYSTEM};

const DEFAULT_CATEGORY: &str = "General";
const DEFAULT_TIME_LIMIT_SECONDS: u32 = 120;

#[derive(Debug, Error)]
pub enum QuestionGenerationError {
    #[error("Question service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Question service failed: {0}")]
    Service(String),

    #[error("Question service returned no usable questions")]
    Empty,

    #[error("Question service is not configured")]
    Unavailable,
}

/// Request sent to the question-generation collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionRequest {
    pub job_title: String,
    pub industry: String,
    pub difficulty: String,
    pub language: String,
}

/// A question as returned by the service, before sanitization.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedQuestion {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub time_limit_seconds: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeneratedDeck {
    questions: Vec<GeneratedQuestion>,
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &QuestionRequest,
    ) -> Result<Vec<GeneratedQuestion>, QuestionGenerationError>;
}

/// Generates questions through the LLM client.
pub struct LlmQuestionGenerator(pub LlmClient);

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate(
        &self,
        request: &QuestionRequest,
    ) -> Result<Vec<GeneratedQuestion>, QuestionGenerationError> {
        let prompt = QUESTION_GENERATION_PROMPT_TEMPLATE
            .replace("{job_title}", &request.job_title)
            .replace("{industry}", &request.industry)
            .replace("{difficulty}", &request.difficulty)
            .replace("{language}", &request.language);

        let deck: GeneratedDeck = self
            .0
            .call_json(&prompt, QUESTION_GENERATION_SYSTEM)
            .await
            .map_err(|e| QuestionGenerationError::Service(e.to_string()))?;
        Ok(deck.questions)
    }
}

/// Used when no generation backend is configured; always yields the local deck.
pub struct OfflineQuestionGenerator;

#[async_trait]
impl QuestionGenerator for OfflineQuestionGenerator {
    async fn generate(
        &self,
        _request: &QuestionRequest,
    ) -> Result<Vec<GeneratedQuestion>, QuestionGenerationError> {
        Err(QuestionGenerationError::Unavailable)
    }
}

/// Output of `generate`: a Configuring session plus how the deck was obtained.
#[derive(Debug)]
pub struct GeneratedSession {
    pub session: Session,
    pub used_fallback: bool,
    /// Non-fatal message for the user when the fallback deck was used.
    pub notice: Option<String>,
}

#[derive(Clone)]
pub struct SessionConfigurator {
    generator: Arc<dyn QuestionGenerator>,
    timeout: Duration,
}

impl SessionConfigurator {
    pub fn new(generator: Arc<dyn QuestionGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn generate(
        &self,
        user_id: Uuid,
        config: SessionConfig,
    ) -> Result<GeneratedSession, SessionError> {
        let config = validate_config(config)?;

        let request = QuestionRequest {
            job_title: config.job_title.clone(),
            industry: config.industry.clone(),
            difficulty: config.difficulty.clone(),
            language: config.language.clone(),
        };

        let remote = match tokio::time::timeout(self.timeout, self.generator.generate(&request))
            .await
        {
            Ok(Ok(raw)) => {
                let questions = sanitize_questions(raw);
                if questions.is_empty() {
                    Err(QuestionGenerationError::Empty)
                } else {
                    Ok(questions)
                }
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(QuestionGenerationError::Timeout(self.timeout)),
        };

        let (questions, used_fallback, notice) = match remote {
            Ok(questions) => {
                info!(
                    "Generated {} questions for '{}' ({})",
                    questions.len(),
                    config.job_title,
                    config.industry
                );
                (questions, false, None)
            }
            Err(e) => {
                warn!("Question generation failed, using local deck: {e}");
                (
                    fallback_deck(&config.job_title, &config.industry),
                    true,
                    Some("Couldn't reach the question service; using a standard question set.".to_string()),
                )
            }
        };

        Ok(GeneratedSession {
            session: Session::new(user_id, config, questions),
            used_fallback,
            notice,
        })
    }
}

/// Trims every field and fills optional ones with defaults. Required fields
/// that end up blank are reported together.
pub fn validate_config(config: SessionConfig) -> Result<SessionConfig, SessionError> {
    let SessionConfig {
        job_title,
        industry,
        difficulty,
        language,
        session_type,
    } = config;

    let required = [
        ("job_title", job_title.trim()),
        ("industry", industry.trim()),
        ("difficulty", difficulty.trim()),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(SessionError::ConfigValidation(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )));
    }

    let or_default = |value: &str, default: &str| {
        let value = value.trim();
        if value.is_empty() {
            default.to_string()
        } else {
            value.to_string()
        }
    };

    Ok(SessionConfig {
        job_title: job_title.trim().to_string(),
        industry: industry.trim().to_string(),
        difficulty: difficulty.trim().to_lowercase(),
        language: or_default(&language, DEFAULT_LANGUAGE),
        session_type: or_default(&session_type, DEFAULT_SESSION_TYPE),
    })
}

/// Drops blank questions, fills defaults, and assigns ids `q1..qN`.
fn sanitize_questions(raw: Vec<GeneratedQuestion>) -> Vec<Question> {
    raw.into_iter()
        .filter(|q| !q.text.trim().is_empty())
        .enumerate()
        .map(|(i, q)| Question {
            id: format!("q{}", i + 1),
            text: q.text.trim().to_string(),
            category: q
                .category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            time_limit_seconds: q
                .time_limit_seconds
                .filter(|&t| t > 0)
                .unwrap_or(DEFAULT_TIME_LIMIT_SECONDS),
        })
        .collect()
}

/// The deterministic five-question deck used whenever generation fails.
pub fn fallback_deck(job_title: &str, industry: &str) -> Vec<Question> {
    let templates = [
        (
            "Introduction",
            120,
            format!("Tell me about yourself and why you're interested in this {job_title} position."),
        ),
        (
            "Experience",
            180,
            format!("Describe a challenging project you worked on in the {industry} industry. What was your role and what was the outcome?"),
        ),
        (
            "Behavioral",
            180,
            format!("Tell me about a time you had to resolve a conflict or disagreement while working as a {job_title}."),
        ),
        (
            "Career Goals",
            120,
            format!("Where do you see your career in {industry} heading over the next five years?"),
        ),
        (
            "Questions",
            90,
            format!("What questions do you have for us about the {job_title} role or our team?"),
        ),
    ];

    templates
        .into_iter()
        .enumerate()
        .map(|(i, (category, limit, text))| Question {
            id: format!("q{}", i + 1),
            text,
            category: category.to_string(),
            time_limit_seconds: limit,
        })
        .collect()
}
