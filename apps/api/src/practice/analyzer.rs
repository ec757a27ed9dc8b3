//! Session Completion Analyzer: turns a finished deck into a `Scorecard`.
//!
//! Every question is scored in deck order; unanswered ones are scored as
//! empty responses. Aggregation:
//! - overall = mean of per-question scores, rounded to nearest integer
//! - strengths: score ≥ 85
//! - improvements: score < 70
//! - 70 – 84 lands in neither bucket

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::practice::models::{Question, QuestionScore, Response, Scorecard};
use crate::practice::scoring::{assess_heuristically, AnswerScorer};

pub const STRENGTH_THRESHOLD: u8 = 85;
pub const IMPROVEMENT_THRESHOLD: u8 = 70;

#[derive(Clone)]
pub struct SessionCompletionAnalyzer {
    scorer: Arc<dyn AnswerScorer>,
}

impl SessionCompletionAnalyzer {
    pub fn new(scorer: Arc<dyn AnswerScorer>) -> Self {
        Self { scorer }
    }

    pub async fn analyze(
        &self,
        questions: &[Question],
        responses: &BTreeMap<String, Response>,
    ) -> Scorecard {
        let mut per_question = Vec::with_capacity(questions.len());

        for question in questions {
            let placeholder;
            let response = match responses.get(&question.id) {
                Some(r) => r,
                None => {
                    placeholder = Response::empty(&question.id);
                    &placeholder
                }
            };

            let assessment = match self.scorer.score(question, response).await {
                Ok(a) => a,
                Err(e) => {
                    warn!(
                        "Scorer '{}' failed on {}, using heuristic: {e}",
                        self.scorer.backend(),
                        question.id
                    );
                    assess_heuristically(question, response)
                }
            };

            per_question.push(QuestionScore {
                question_id: question.id.clone(),
                category: question.category.clone(),
                score: assessment.score.min(100),
                feedback: assessment.feedback,
            });
        }

        let answered = questions
            .iter()
            .filter(|q| {
                responses
                    .get(&q.id)
                    .is_some_and(|r| !r.text.trim().is_empty())
            })
            .count();

        let scorecard = build_scorecard(per_question, answered, self.scorer.backend());
        info!(
            "Scorecard built: overall {}/100 across {} questions ({} answered)",
            scorecard.overall_score,
            questions.len(),
            answered
        );
        scorecard
    }
}

fn build_scorecard(per_question: Vec<QuestionScore>, answered: usize, backend: &str) -> Scorecard {
    let overall_score = mean_score(&per_question);

    let strengths: Vec<String> = per_question
        .iter()
        .filter(|q| q.score >= STRENGTH_THRESHOLD)
        .map(|q| format!("{}: {}", q.category, q.feedback))
        .collect();

    let weak: Vec<&QuestionScore> = per_question
        .iter()
        .filter(|q| q.score < IMPROVEMENT_THRESHOLD)
        .collect();
    let improvements: Vec<String> = weak
        .iter()
        .map(|q| format!("{}: {}", q.category, q.feedback))
        .collect();

    let recommendations =
        build_recommendations(&weak, answered, per_question.len(), overall_score);

    Scorecard {
        overall_score,
        per_question,
        strengths,
        improvements,
        recommendations,
        scorer_backend: backend.to_string(),
    }
}

fn mean_score(scores: &[QuestionScore]) -> u8 {
    if scores.is_empty() {
        return 0;
    }
    let total: u32 = scores.iter().map(|q| q.score as u32).sum();
    (total as f64 / scores.len() as f64).round() as u8
}

fn build_recommendations(
    weak: &[&QuestionScore],
    answered: usize,
    total: usize,
    overall: u8,
) -> Vec<String> {
    let mut recommendations: Vec<String> = weak
        .iter()
        .map(|q| q.category.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(category_tip)
        .collect();

    if answered < total {
        recommendations.push(format!(
            "You answered {answered} of {total} questions. Practice giving an answer to every question, even a short one."
        ));
    }
    if overall < IMPROVEMENT_THRESHOLD {
        recommendations.push(
            "Use the STAR method (Situation, Task, Action, Result) to structure your answers."
                .to_string(),
        );
    }
    if recommendations.is_empty() {
        recommendations.push(
            "Solid session. Try the next difficulty level to keep stretching.".to_string(),
        );
    }
    recommendations
}

fn category_tip(category: &str) -> String {
    match category {
        "Introduction" => {
            "Prepare a 60-second pitch linking your background to the role.".to_string()
        }
        "Experience" => {
            "Pick two projects and rehearse them with concrete outcomes and numbers.".to_string()
        }
        "Behavioral" => {
            "Build a bank of stories about conflict, failure and leadership.".to_string()
        }
        "Career Goals" => {
            "Connect your long-term goals to what this role offers.".to_string()
        }
        "Questions" => {
            "Prepare thoughtful questions about the team, roadmap and success metrics."
                .to_string()
        }
        other => format!("Review common {other} questions and rehearse your answers aloud."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::scoring::{AnswerAssessment, HeuristicAnswerScorer, ScoringError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Returns scores from a fixed table keyed by question id.
    struct TableScorer(BTreeMap<String, u8>);

    #[async_trait]
    impl AnswerScorer for TableScorer {
        async fn score(
            &self,
            question: &Question,
            _response: &Response,
        ) -> Result<AnswerAssessment, ScoringError> {
            Ok(AnswerAssessment {
                score: self.0[&question.id],
                feedback: format!("feedback for {}", question.id),
            })
        }

        fn backend(&self) -> &'static str {
            "table"
        }
    }

    struct FlakyScorer {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnswerScorer for FlakyScorer {
        async fn score(
            &self,
            question: &Question,
            response: &Response,
        ) -> Result<AnswerAssessment, ScoringError> {
            self.calls.lock().unwrap().push(response.text.clone());
            if question.id == "q2" {
                Err(ScoringError::Backend("timeout".to_string()))
            } else {
                Ok(AnswerAssessment {
                    score: 250,
                    feedback: "off the charts".to_string(),
                })
            }
        }

        fn backend(&self) -> &'static str {
            "flaky"
        }
    }

    fn deck(categories: &[&str]) -> Vec<Question> {
        categories
            .iter()
            .enumerate()
            .map(|(i, c)| Question {
                id: format!("q{}", i + 1),
                text: format!("Question {}", i + 1),
                category: c.to_string(),
                time_limit_seconds: 120,
            })
            .collect()
    }

    fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, Response> {
        pairs
            .iter()
            .map(|(id, text)| {
                (
                    id.to_string(),
                    Response {
                        question_id: id.to_string(),
                        text: text.to_string(),
                        time_spent_seconds: 0,
                        submitted_at: Utc::now(),
                    },
                )
            })
            .collect()
    }

    fn table(scores: &[u8]) -> TableScorer {
        TableScorer(
            scores
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("q{}", i + 1), *s))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_buckets_and_rounded_mean() {
        let questions = deck(&["Introduction", "Experience", "Behavioral"]);
        let analyzer = SessionCompletionAnalyzer::new(Arc::new(table(&[90, 75, 60])));
        let card = analyzer
            .analyze(&questions, &answers(&[("q1", "a"), ("q2", "b"), ("q3", "c")]))
            .await;

        // (90 + 75 + 60) / 3 = 75
        assert_eq!(card.overall_score, 75);
        assert_eq!(card.strengths, vec!["Introduction: feedback for q1"]);
        assert_eq!(card.improvements, vec!["Behavioral: feedback for q3"]);
        assert_eq!(card.scorer_backend, "table");
        assert!(card
            .recommendations
            .iter()
            .any(|r| r.contains("stories about conflict")));
    }

    #[tokio::test]
    async fn test_mean_rounds_half_up() {
        let questions = deck(&["A", "B"]);
        let analyzer = SessionCompletionAnalyzer::new(Arc::new(table(&[70, 71])));
        let card = analyzer
            .analyze(&questions, &answers(&[("q1", "a"), ("q2", "b")]))
            .await;
        assert_eq!(card.overall_score, 71);
    }

    #[tokio::test]
    async fn test_threshold_edges() {
        let questions = deck(&["A", "B", "C", "D"]);
        let analyzer = SessionCompletionAnalyzer::new(Arc::new(table(&[85, 84, 70, 69])));
        let card = analyzer
            .analyze(
                &questions,
                &answers(&[("q1", "a"), ("q2", "b"), ("q3", "c"), ("q4", "d")]),
            )
            .await;
        assert_eq!(card.strengths.len(), 1);
        assert!(card.strengths[0].starts_with("A:"));
        assert_eq!(card.improvements.len(), 1);
        assert!(card.improvements[0].starts_with("D:"));
    }

    #[tokio::test]
    async fn test_unanswered_questions_are_scored_as_empty() {
        let questions = deck(&["Introduction", "Experience", "Behavioral", "Career Goals", "Questions"]);
        let analyzer = SessionCompletionAnalyzer::new(Arc::new(HeuristicAnswerScorer));
        let card = analyzer
            .analyze(
                &questions,
                &answers(&[("q1", "I focus on reliability and clear communication.")]),
            )
            .await;

        // Answered right after start: short answer band, no time bonus.
        assert_eq!(card.per_question.len(), 5);
        assert_eq!(card.per_question[0].score, 35);
        assert!(card.per_question[1..].iter().all(|q| q.score == 0));
        assert_eq!(card.overall_score, 7);
        assert!(card
            .recommendations
            .iter()
            .any(|r| r.contains("answered 1 of 5")));
    }

    #[tokio::test]
    async fn test_scorer_failure_falls_back_and_scores_are_clamped() {
        let questions = deck(&["A", "B"]);
        let scorer = Arc::new(FlakyScorer {
            calls: Mutex::new(vec![]),
        });
        let analyzer = SessionCompletionAnalyzer::new(scorer.clone());
        let card = analyzer.analyze(&questions, &answers(&[("q1", "x")])).await;

        assert_eq!(card.per_question[0].score, 100);
        // q2 unanswered → heuristic → 0
        assert_eq!(card.per_question[1].score, 0);
        assert_eq!(*scorer.calls.lock().unwrap(), vec!["x".to_string(), String::new()]);
    }

    #[tokio::test]
    async fn test_all_strong_gets_stretch_recommendation() {
        let questions = deck(&["A", "B"]);
        let analyzer = SessionCompletionAnalyzer::new(Arc::new(table(&[95, 88])));
        let card = analyzer
            .analyze(&questions, &answers(&[("q1", "a"), ("q2", "b")]))
            .await;
        assert!(card.improvements.is_empty());
        assert_eq!(card.recommendations.len(), 1);
        assert!(card.recommendations[0].contains("next difficulty"));
    }

    #[tokio::test]
    async fn test_empty_deck_scores_zero() {
        let analyzer = SessionCompletionAnalyzer::new(Arc::new(HeuristicAnswerScorer));
        let card = analyzer.analyze(&[], &BTreeMap::new()).await;
        assert_eq!(card.overall_score, 0);
        assert!(card.per_question.is_empty());
    }

    #[test]
    fn test_repeated_weak_category_gives_one_tip() {
        let weak = [
            QuestionScore {
                question_id: "q1".into(),
                category: "Technical".into(),
                score: 40,
                feedback: String::new(),
            },
            QuestionScore {
                question_id: "q2".into(),
                category: "Technical".into(),
                score: 50,
                feedback: String::new(),
            },
        ];
        let refs: Vec<&QuestionScore> = weak.iter().collect();
        let recs = build_recommendations(&refs, 2, 2, 80);
        assert_eq!(recs, vec!["Review common Technical questions and rehearse your answers aloud."]);
    }
}
