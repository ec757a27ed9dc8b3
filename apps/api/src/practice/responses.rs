use std::collections::{BTreeMap, HashSet};

use chrono::Utc;

use crate::errors::SessionError;
use crate::practice::models::{Question, Response};

/// One answer per question, keyed by question id and independent of the
/// sequencer position. Read-only once frozen.
#[derive(Debug, Clone)]
pub struct ResponseStore {
    known: HashSet<String>,
    total: usize,
    answers: BTreeMap<String, Response>,
    frozen: bool,
}

impl ResponseStore {
    pub fn new(questions: &[Question]) -> Self {
        Self {
            known: questions.iter().map(|q| q.id.clone()).collect(),
            total: questions.len(),
            answers: BTreeMap::new(),
            frozen: false,
        }
    }

    pub fn set_answer(
        &mut self,
        question_id: &str,
        text: &str,
        time_spent_seconds: u32,
    ) -> Result<&Response, SessionError> {
        if self.frozen {
            return Err(SessionError::SessionFinalized);
        }
        if !self.known.contains(question_id) {
            return Err(SessionError::UnknownQuestion(question_id.to_string()));
        }

        let response = Response {
            question_id: question_id.to_string(),
            text: text.to_string(),
            time_spent_seconds,
            submitted_at: Utc::now(),
        };
        self.answers.insert(question_id.to_string(), response);
        Ok(&self.answers[question_id])
    }

    pub fn get_answer(&self, question_id: &str) -> &str {
        self.answers
            .get(question_id)
            .map(|r| r.text.as_str())
            .unwrap_or("")
    }

    #[cfg(test)]
    pub fn get(&self, question_id: &str) -> Option<&Response> {
        self.answers.get(question_id)
    }

    /// Share of questions with a non-blank answer, in `0.0..=1.0`.
    pub fn completion_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.answered_count() as f64 / self.total as f64
    }

    pub fn answered_count(&self) -> usize {
        self.answers
            .values()
            .filter(|r| !r.text.trim().is_empty())
            .count()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn snapshot(&self) -> BTreeMap<String, Response> {
        self.answers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck(n: usize) -> Vec<Question> {
        (1..=n)
            .map(|i| Question {
                id: format!("q{i}"),
                text: format!("Question {i}"),
                category: "General".to_string(),
                time_limit_seconds: 60,
            })
            .collect()
    }

    #[test]
    fn test_get_answer_defaults_to_empty() {
        let store = ResponseStore::new(&deck(3));
        assert_eq!(store.get_answer("q1"), "");
    }

    #[test]
    fn test_set_answer_upserts() {
        let mut store = ResponseStore::new(&deck(3));
        store.set_answer("q1", "first draft", 10).unwrap();
        store.set_answer("q1", "final answer", 25).unwrap();
        assert_eq!(store.get_answer("q1"), "final answer");
        assert_eq!(store.get("q1").unwrap().time_spent_seconds, 25);
    }

    #[test]
    fn test_unrelated_answers_are_untouched() {
        let mut store = ResponseStore::new(&deck(3));
        store.set_answer("q1", "one", 5).unwrap();
        store.set_answer("q3", "three", 5).unwrap();
        store.set_answer("q1", "one, revised", 9).unwrap();
        assert_eq!(store.get_answer("q3"), "three");
    }

    #[test]
    fn test_unknown_question_rejected() {
        let mut store = ResponseStore::new(&deck(2));
        let err = store.set_answer("q9", "text", 1).unwrap_err();
        assert_eq!(err, SessionError::UnknownQuestion("q9".to_string()));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_frozen_store_rejects_writes_without_mutation() {
        let mut store = ResponseStore::new(&deck(2));
        store.set_answer("q1", "kept", 3).unwrap();
        let before = store.snapshot();

        store.freeze();
        assert_eq!(
            store.set_answer("q1", "overwrite", 4).unwrap_err(),
            SessionError::SessionFinalized
        );
        assert_eq!(
            store.set_answer("q2", "new", 4).unwrap_err(),
            SessionError::SessionFinalized
        );
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_completion_ratio_ignores_blank_answers() {
        let mut store = ResponseStore::new(&deck(4));
        store.set_answer("q1", "answered", 1).unwrap();
        store.set_answer("q2", "   ", 1).unwrap();
        assert!((store.completion_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_completion_ratio_empty_deck() {
        let store = ResponseStore::new(&[]);
        assert_eq!(store.completion_ratio(), 0.0);
    }
}
