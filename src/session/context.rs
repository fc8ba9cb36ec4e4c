use rand::Rng;
use tracing::{info, warn};

use crate::identity::Identity;
use crate::question::bank::{QuestionBank, sample_from};
use crate::question::{Question, QuestionKind};
use crate::session::history::HistorySink;
use crate::session::quiz::{
    Advance, PracticalFeedback, QuizError, QuizSession, QuizSummary, TheoryFeedback,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Readiness {
    /// Sign-in has not finished yet.
    Pending,
    Ready(Identity),
    /// Sign-in failed; the app keeps working under the fallback identity.
    Degraded { identity: Identity, reason: String },
}

#[derive(Clone, Debug)]
pub enum QuizState {
    Idle,
    InProgress(QuizSession),
    Completed(QuizSummary),
}

/// Everything the UI layer drives: who the user is, which questions exist,
/// and the quiz currently being played.
#[derive(Debug)]
pub struct SessionContext {
    readiness: Readiness,
    bank: QuestionBank,
    quiz: QuizState,
}

impl SessionContext {
    pub fn new(bank: QuestionBank) -> Self {
        Self {
            readiness: Readiness::Pending,
            bank,
            quiz: QuizState::Idle,
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.readiness {
            Readiness::Pending => None,
            Readiness::Ready(identity) | Readiness::Degraded { identity, .. } => Some(identity),
        }
    }

    /// The identity is resolved once; later calls are ignored.
    pub fn mark_ready(&mut self, identity: Identity) -> bool {
        if self.readiness != Readiness::Pending {
            warn!(user = %identity.user_id, "identity already resolved; ignoring");
            return false;
        }
        info!(user = %identity.user_id, method = ?identity.method, "signed in");
        self.readiness = Readiness::Ready(identity);
        true
    }

    pub fn mark_degraded(&mut self, reason: impl Into<String>) -> bool {
        if self.readiness != Readiness::Pending {
            return false;
        }
        let reason = reason.into();
        warn!(reason = %reason, "sign-in failed; continuing without an account");
        self.readiness = Readiness::Degraded {
            identity: Identity::fallback(),
            reason,
        };
        true
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    /// Re-merge the bank with the latest generated questions. A quiz already
    /// in progress keeps its own sampled list.
    pub fn apply_generated(&mut self, generated: &[Question]) {
        self.bank.apply_generated(generated);
    }

    pub fn extend_generated(&mut self, batch: &[Question]) {
        self.bank.extend_generated(batch);
    }

    pub fn state(&self) -> &QuizState {
        &self.quiz
    }

    pub fn session(&self) -> Option<&QuizSession> {
        match &self.quiz {
            QuizState::InProgress(session) => Some(session),
            _ => None,
        }
    }

    fn session_mut(&mut self) -> Result<&mut QuizSession, QuizError> {
        match &mut self.quiz {
            QuizState::InProgress(session) => Ok(session),
            _ => Err(QuizError::NoActiveQuiz),
        }
    }

    pub fn start_quiz<R: Rng + ?Sized>(
        &mut self,
        kind: QuestionKind,
        count: usize,
        rng: &mut R,
    ) -> Result<&QuizSession, QuizError> {
        let questions = self.bank.sample(kind, count, rng);
        self.begin(kind, questions)
    }

    /// Start a quiz over an explicit batch, e.g. freshly generated questions.
    pub fn start_quiz_with<R: Rng + ?Sized>(
        &mut self,
        kind: QuestionKind,
        questions: &[Question],
        count: usize,
        rng: &mut R,
    ) -> Result<&QuizSession, QuizError> {
        let pool: Vec<Question> = questions
            .iter()
            .filter(|q| q.kind() == kind)
            .cloned()
            .collect();
        let questions = sample_from(&pool, count, rng);
        self.begin(kind, questions)
    }

    fn begin(
        &mut self,
        kind: QuestionKind,
        questions: Vec<Question>,
    ) -> Result<&QuizSession, QuizError> {
        let session = QuizSession::new(kind, questions)?;
        info!(kind = %kind, questions = session.len(), "quiz started");
        self.quiz = QuizState::InProgress(session);
        match &self.quiz {
            QuizState::InProgress(session) => Ok(session),
            _ => Err(QuizError::NoActiveQuiz),
        }
    }

    pub fn answer_theory(
        &mut self,
        option: &str,
        sink: &dyn HistorySink,
    ) -> Result<TheoryFeedback, QuizError> {
        self.session_mut()?.answer_theory(option, sink)
    }

    pub fn submit_code(
        &mut self,
        code: &str,
        sink: &dyn HistorySink,
    ) -> Result<PracticalFeedback, QuizError> {
        self.session_mut()?.submit_code(code, sink)
    }

    pub fn request_give_up(&mut self) -> Result<(), QuizError> {
        self.session_mut()?.request_give_up()
    }

    pub fn cancel_give_up(&mut self) -> Result<(), QuizError> {
        self.session_mut()?.cancel_give_up()
    }

    pub fn confirm_give_up(
        &mut self,
        sink: &dyn HistorySink,
    ) -> Result<PracticalFeedback, QuizError> {
        self.session_mut()?.confirm_give_up(sink)
    }

    pub fn hint(&self) -> Result<&str, QuizError> {
        self.session().ok_or(QuizError::NoActiveQuiz)?.hint()
    }

    pub fn next_question(&mut self) -> Result<Advance, QuizError> {
        let advance = self.session_mut()?.next_question()?;
        if let Advance::Completed(summary) = advance {
            info!(
                kind = %summary.kind,
                correct = summary.correct,
                total = summary.total,
                elapsed_secs = summary.elapsed.as_secs(),
                "quiz completed"
            );
            self.quiz = QuizState::Completed(summary);
        }
        Ok(advance)
    }

    /// Leave the quiz screen. Returns the summary of the quiz that was
    /// running or had just completed.
    pub fn return_home(&mut self) -> Option<QuizSummary> {
        let summary = match &mut self.quiz {
            QuizState::InProgress(session) => {
                let summary = session.abandon();
                info!(
                    answered = summary.answered,
                    total = summary.total,
                    "quiz abandoned"
                );
                Some(summary)
            }
            QuizState::Completed(summary) => Some(*summary),
            QuizState::Idle => None,
        };
        self.quiz = QuizState::Idle;
        summary
    }
}
