//! Session Controller: the single owner of one practice `Session`.
//!
//! State machine:
//!   Configuring --start--> InProgress <--pause/resume--> Paused
//!   InProgress/Paused --advance past last | finish--> Completed
//!   Configuring/InProgress/Paused --exit--> Discarded
//!
//! Completed and Discarded are terminal. Entering either stops the timer,
//! cancels the tick schedule and releases the capture device. The same
//! resources are released by field drops if the controller goes away early.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::SessionError;
use crate::practice::analyzer::SessionCompletionAnalyzer;
use crate::practice::gateway::PracticeSessionGateway;
use crate::practice::models::{
    Question, Response, Scorecard, Session, SessionConfig, SessionRecord, SessionStatus,
};
use crate::practice::recording::{
    CaptureDevice, CaptureGuard, CaptureStream, DeviceAccessError, RecordingController,
};
use crate::practice::responses::ResponseStore;
use crate::practice::sequencer::{Advance, QuestionSequencer};
use crate::practice::timer::{TickOutcome, TickSchedule, TimerController};

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionServices {
    pub analyzer: SessionCompletionAnalyzer,
    pub gateway: Arc<dyn PracticeSessionGateway>,
    pub capture: Arc<dyn CaptureDevice>,
    pub tick_period: Duration,
}

/// Result of a navigation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Moved,
    Unchanged,
    /// This call moved the session into Completed; `finalize` should follow.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEffect {
    Idle,
    Ticked(u32),
    /// The countdown expired and the session advanced as a result.
    Expired(Step),
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub scorecard: Scorecard,
    pub record: SessionRecord,
    pub persistence_warning: Option<String>,
    /// False when a previous call already finalized the session.
    pub newly_finalized: bool,
}

/// Read model returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SessionStatus,
    pub config: SessionConfig,
    pub current_index: usize,
    pub total_questions: usize,
    pub current_question: Option<Question>,
    pub remaining_seconds: u32,
    pub timer_paused: bool,
    pub recording: bool,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub completion_ratio: f64,
    pub answers: BTreeMap<String, String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub has_scorecard: bool,
}

pub struct SessionController {
    session: Session,
    sequencer: QuestionSequencer,
    timer: TimerController,
    recorder: RecordingController,
    responses: ResponseStore,
    /// Seconds spent per question, counted by ticks while it was current.
    elapsed: HashMap<String, u32>,
    schedule: Option<TickSchedule>,
    outcome: Option<FinalizeOutcome>,
    services: SessionServices,
}

impl SessionController {
    pub fn new(session: Session, services: SessionServices) -> Self {
        let sequencer = QuestionSequencer::new(session.questions.len());
        let responses = ResponseStore::new(&session.questions);
        Self {
            session,
            sequencer,
            timer: TimerController::new(),
            recorder: RecordingController::new(),
            responses,
            elapsed: HashMap::new(),
            schedule: None,
            outcome: None,
            services,
        }
    }

    pub fn id(&self) -> Uuid {
        self.session.id
    }

    pub fn user_id(&self) -> Uuid {
        self.session.user_id
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn tick_period(&self) -> Duration {
        self.services.tick_period
    }

    #[cfg(test)]
    pub fn timer(&self) -> &TimerController {
        &self.timer
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.sequencer
            .current()
            .and_then(|i| self.session.questions.get(i))
    }

    pub fn scorecard(&self) -> Option<&Scorecard> {
        self.outcome.as_ref().map(|o| &o.scorecard)
    }

    pub fn is_ticking(&self) -> bool {
        self.schedule.as_ref().is_some_and(TickSchedule::is_live)
    }

    /// The session value with cursor and answers brought up to date.
    #[cfg(test)]
    pub fn snapshot(&self) -> Session {
        let mut session = self.session.clone();
        session.current_index = self.sequencer.index();
        session.responses = self.responses.snapshot();
        session
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.session.id,
            user_id: self.session.user_id,
            status: self.session.status,
            config: self.session.config.clone(),
            current_index: self.sequencer.index(),
            total_questions: self.sequencer.len(),
            current_question: self.current_question().cloned(),
            remaining_seconds: self.timer.remaining(),
            timer_paused: self.timer.is_paused(),
            recording: self.recorder.is_recording(),
            audio_enabled: self.recorder.is_audio_enabled(),
            video_enabled: self.recorder.is_video_enabled(),
            completion_ratio: self.responses.completion_ratio(),
            answers: self
                .responses
                .snapshot()
                .into_iter()
                .map(|(id, r)| (id, r.text))
                .collect(),
            started_at: self.session.started_at,
            completed_at: self.session.completed_at,
            has_scorecard: self.outcome.is_some(),
        }
    }

    // ── transitions ─────────────────────────────────────────────────────────

    /// Configuring → InProgress. Arms the timer on the first question.
    /// Recording is attached separately via `attach_capture`, so a slow
    /// permission prompt never holds up the session.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.require(&[SessionStatus::Configuring])?;

        self.session.status = SessionStatus::InProgress;
        self.session.started_at = Some(Utc::now());
        info!("Practice session {} started", self.session.id);

        match self.current_question().map(|q| q.time_limit_seconds) {
            Some(limit) => self.timer.start(limit),
            None => self.complete(),
        }
        Ok(())
    }

    pub fn capture_device(&self) -> Arc<dyn CaptureDevice> {
        self.services.capture.clone()
    }

    /// Hands an acquisition result to the recorder. A failure becomes a
    /// notice. A stream that arrives after the session ended is released.
    pub fn attach_capture(
        &mut self,
        acquired: Result<Box<dyn CaptureStream>, DeviceAccessError>,
    ) -> Option<String> {
        if !matches!(
            self.session.status,
            SessionStatus::InProgress | SessionStatus::Paused
        ) {
            if acquired.is_ok() {
                debug!(
                    "Session {} ended before the capture device was ready",
                    self.session.id
                );
            }
            drop(acquired.map(CaptureGuard::new));
            return None;
        }
        match self.recorder.attach(acquired) {
            Ok(()) => None,
            Err(e) => Some(format!(
                "Recording is unavailable ({e}); you can keep answering in text."
            )),
        }
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.require(&[SessionStatus::InProgress])?;
        self.session.status = SessionStatus::Paused;
        self.timer.pause();
        self.schedule = None;
        Ok(())
    }

    /// Paused → InProgress. The caller re-arms the tick schedule.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.require(&[SessionStatus::Paused])?;
        self.session.status = SessionStatus::InProgress;
        self.timer.resume();
        Ok(())
    }

    pub fn attach_schedule(&mut self, schedule: TickSchedule) {
        if self.session.status == SessionStatus::InProgress {
            self.schedule = Some(schedule);
        }
    }

    pub fn advance(&mut self) -> Result<Step, SessionError> {
        if self.session.status == SessionStatus::Completed {
            return Ok(Step::Unchanged);
        }
        self.require(&[SessionStatus::InProgress, SessionStatus::Paused])?;

        match self.sequencer.advance() {
            Advance::Moved => {
                self.rebind_timer();
                Ok(Step::Moved)
            }
            Advance::Exhausted => {
                self.complete();
                Ok(Step::Completed)
            }
            Advance::AlreadyExhausted => Ok(Step::Unchanged),
        }
    }

    pub fn retreat(&mut self) -> Result<Step, SessionError> {
        self.require(&[SessionStatus::InProgress, SessionStatus::Paused])?;
        if self.sequencer.retreat() {
            self.rebind_timer();
            Ok(Step::Moved)
        } else {
            Ok(Step::Unchanged)
        }
    }

    pub fn jump_to(&mut self, index: usize) -> Result<Step, SessionError> {
        self.require(&[SessionStatus::InProgress, SessionStatus::Paused])?;
        let before = self.sequencer.index();
        self.sequencer.jump_to(index)?;
        if before == index {
            return Ok(Step::Unchanged);
        }
        self.rebind_timer();
        Ok(Step::Moved)
    }

    pub fn set_answer(&mut self, question_id: &str, text: &str) -> Result<Response, SessionError> {
        self.require(&[SessionStatus::InProgress, SessionStatus::Paused])?;
        let spent = self.elapsed.get(question_id).copied().unwrap_or(0);
        self.responses
            .set_answer(question_id, text, spent)
            .cloned()
    }

    pub fn get_answer(&self, question_id: &str) -> &str {
        self.responses.get_answer(question_id)
    }

    pub fn toggle_audio(&mut self) -> Result<bool, SessionError> {
        self.require(&[SessionStatus::InProgress, SessionStatus::Paused])?;
        Ok(self.recorder.toggle_audio())
    }

    pub fn toggle_video(&mut self) -> Result<bool, SessionError> {
        self.require(&[SessionStatus::InProgress, SessionStatus::Paused])?;
        Ok(self.recorder.toggle_video())
    }

    /// One scheduled second. On expiry the session advances exactly once.
    pub fn tick(&mut self) -> Result<TickEffect, SessionError> {
        self.require(&[SessionStatus::InProgress])?;

        let outcome = self.timer.tick();
        if outcome != TickOutcome::Idle {
            if let Some(id) = self.current_question().map(|q| q.id.clone()) {
                *self.elapsed.entry(id).or_default() += 1;
            }
        }

        match outcome {
            TickOutcome::Idle => Ok(TickEffect::Idle),
            TickOutcome::Ticked(remaining) => Ok(TickEffect::Ticked(remaining)),
            TickOutcome::Expired => {
                debug!(
                    "Question timed out in session {} ({} expiries so far)",
                    self.session.id,
                    self.timer.expirations()
                );
                Ok(TickEffect::Expired(self.advance()?))
            }
        }
    }

    /// Forced completion. Idempotent on an already Completed session.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        if self.session.status == SessionStatus::Completed {
            return Ok(());
        }
        self.require(&[SessionStatus::InProgress, SessionStatus::Paused])?;
        self.complete();
        Ok(())
    }

    /// Abandons the session without persistence. Ignored once Completed.
    pub fn exit(&mut self) -> Result<(), SessionError> {
        if self.session.status == SessionStatus::Completed {
            return Ok(());
        }
        self.require(&[
            SessionStatus::Configuring,
            SessionStatus::InProgress,
            SessionStatus::Paused,
        ])?;
        self.session.status = SessionStatus::Discarded;
        self.release_resources();
        info!("Practice session {} discarded", self.session.id);
        Ok(())
    }

    /// Completes the session if needed, then scores and hands it off once.
    /// Later calls return the cached outcome without rescoring or resubmitting.
    pub async fn finalize(&mut self) -> Result<FinalizeOutcome, SessionError> {
        if let Some(outcome) = &self.outcome {
            return Ok(FinalizeOutcome {
                newly_finalized: false,
                ..outcome.clone()
            });
        }
        self.finish()?;

        let answers = self.responses.snapshot();
        let scorecard = self
            .services
            .analyzer
            .analyze(&self.session.questions, &answers)
            .await;

        let record = SessionRecord {
            session_id: self.session.id,
            user_id: self.session.user_id,
            session_type: self.session.config.session_type.clone(),
            questions: self.session.questions.clone(),
            answers,
            overall_score: scorecard.overall_score,
            scorecard: scorecard.clone(),
            duration_minutes: self.session.duration_minutes(),
        };

        // Cached before the hand-off: a dropped request must not lead to rescoring.
        let session_id = self.session.id;
        let gateway = self.services.gateway.clone();
        let outcome = self.outcome.insert(FinalizeOutcome {
            scorecard,
            record,
            persistence_warning: None,
            newly_finalized: true,
        });

        if let Err(e) = gateway.submit(&outcome.record).await {
            warn!("Failed to persist practice session {session_id}: {e}");
            outcome.persistence_warning =
                Some("Your results couldn't be saved, but your scorecard is below.".to_string());
        }
        Ok(outcome.clone())
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn require(&self, allowed: &[SessionStatus]) -> Result<(), SessionError> {
        let status = self.session.status;
        if allowed.contains(&status) {
            Ok(())
        } else if status == SessionStatus::Completed {
            Err(SessionError::SessionFinalized)
        } else {
            Err(SessionError::NoActiveSession { status })
        }
    }

    /// Binds the countdown to the question now under the cursor.
    fn rebind_timer(&mut self) {
        if let Some(limit) = self.current_question().map(|q| q.time_limit_seconds) {
            self.timer.reset(limit);
        }
    }

    fn complete(&mut self) {
        self.session.status = SessionStatus::Completed;
        self.session.completed_at = Some(Utc::now());
        self.responses.freeze();
        self.release_resources();
        info!(
            "Practice session {} completed ({} of {} answered)",
            self.session.id,
            self.responses.answered_count(),
            self.session.questions.len()
        );
    }

    fn release_resources(&mut self) {
        self.timer.stop();
        self.schedule = None;
        self.recorder.stop();
    }
}
