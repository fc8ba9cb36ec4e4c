use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::question::{PracticalQuestion, Question, QuestionKind, TheoryQuestion};
use crate::session::grading;
use crate::session::history::{HistorySink, NewHistoryEntry};

/// Theory questions allow one retry after a wrong first answer.
pub const MAX_THEORY_ATTEMPTS: u32 = 2;

/// A command the current state does not accept. Grading itself never fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuizError {
    #[error("no quiz is in progress")]
    NoActiveQuiz,
    #[error("no {0} questions are available")]
    EmptyBank(QuestionKind),
    #[error("the current question is a {0} question")]
    WrongKind(QuestionKind),
    #[error("this question has already been answered")]
    AlreadyGraded,
    #[error("answer the current question first")]
    NotGraded,
    #[error("\"{0}\" is not one of the options")]
    UnknownOption(String),
    #[error("that option was already ruled out")]
    OptionLockedOut,
    #[error("no give-up is waiting for confirmation")]
    NoPendingGiveUp,
    #[error("confirm or cancel giving up first")]
    GiveUpPending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub correct: bool,
    pub user_answer: String,
    pub gave_up: bool,
}

/// Where the current question stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Theory question waiting for a choice; after a wrong first attempt the
    /// chosen option stays locked out.
    Unanswered { locked_out: Option<String> },
    /// Practical question with an editable code buffer.
    Editing,
    /// Practical question; the user asked to give up and has not confirmed.
    ConfirmingGiveUp,
    /// Theory question finished.
    Graded(Verdict),
    /// Practical question finished.
    Submitted(Verdict),
}

impl Step {
    fn initial(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::Theory => Step::Unanswered { locked_out: None },
            QuestionKind::Practical => Step::Editing,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Step::Graded(_) | Step::Submitted(_))
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Step::Graded(v) | Step::Submitted(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TheoryFeedback {
    pub correct: bool,
    /// False while a retry is still allowed.
    pub graded: bool,
    pub attempts: u32,
    pub locked_out: Option<String>,
    /// Only revealed once the question is graded.
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PracticalFeedback {
    pub correct: bool,
    pub gave_up: bool,
    /// Reference solution, revealed only on give-up.
    pub solution: Option<String>,
    pub explanation: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuizSummary {
    pub kind: QuestionKind,
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    Next { index: usize },
    Completed(QuizSummary),
}

#[derive(Clone, Copy, Debug)]
pub struct QuizTimer {
    started_at: Instant,
    stopped_at: Option<Instant>,
}

impl QuizTimer {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            stopped_at: None,
        }
    }

    pub fn stop(&mut self) {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
        }
    }

    pub fn is_running(&self) -> bool {
        self.stopped_at.is_none()
    }

    pub fn elapsed(&self) -> Duration {
        match self.stopped_at {
            Some(end) => end.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }
}

/// One run through a sampled list of questions.
#[derive(Clone, Debug)]
pub struct QuizSession {
    kind: QuestionKind,
    questions: Vec<Question>,
    index: usize,
    attempts: HashMap<String, u32>,
    user_answers: HashMap<String, String>,
    step: Step,
    answered: usize,
    correct: usize,
    timer: QuizTimer,
}

impl QuizSession {
    /// Questions of the wrong kind are dropped.
    pub fn new(kind: QuestionKind, questions: Vec<Question>) -> Result<Self, QuizError> {
        let questions: Vec<Question> = questions.into_iter().filter(|q| q.kind() == kind).collect();
        if questions.is_empty() {
            return Err(QuizError::EmptyBank(kind));
        }
        Ok(Self {
            kind,
            questions,
            index: 0,
            attempts: HashMap::new(),
            user_answers: HashMap::new(),
            step: Step::initial(kind),
            answered: 0,
            correct: 0,
            timer: QuizTimer::start(),
        })
    }

    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    pub fn attempts(&self, question_id: &str) -> u32 {
        self.attempts.get(question_id).copied().unwrap_or(0)
    }

    pub fn user_answer(&self, question_id: &str) -> Option<&str> {
        self.user_answers.get(question_id).map(String::as_str)
    }

    pub fn correct_count(&self) -> usize {
        self.correct
    }

    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    fn current_theory(&self) -> Result<TheoryQuestion, QuizError> {
        match self.current() {
            Some(Question::Theory(q)) => Ok(q.clone()),
            Some(other) => Err(QuizError::WrongKind(other.kind())),
            None => Err(QuizError::NoActiveQuiz),
        }
    }

    fn current_practical(&self) -> Result<PracticalQuestion, QuizError> {
        match self.current() {
            Some(Question::Practical(q)) => Ok(q.clone()),
            Some(other) => Err(QuizError::WrongKind(other.kind())),
            None => Err(QuizError::NoActiveQuiz),
        }
    }

    fn bump_attempts(&mut self, question_id: &str) -> u32 {
        let count = self.attempts.entry(question_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn finish(
        &mut self,
        kind: QuestionKind,
        id: &str,
        correct_answer: &str,
        explanation: &str,
        verdict: Verdict,
        sink: &dyn HistorySink,
    ) {
        self.answered += 1;
        if verdict.correct {
            self.correct += 1;
        }
        sink.record(NewHistoryEntry {
            question_id: id.to_string(),
            question_type: kind,
            is_correct: verdict.correct,
            user_answer: verdict.user_answer.clone(),
            correct_answer: correct_answer.to_string(),
            explanation: explanation.to_string(),
        });
        debug!(question = id, correct = verdict.correct, gave_up = verdict.gave_up, "question graded");
        self.step = match kind {
            QuestionKind::Theory => Step::Graded(verdict),
            QuestionKind::Practical => Step::Submitted(verdict),
        };
    }

    pub fn answer_theory(
        &mut self,
        option: &str,
        sink: &dyn HistorySink,
    ) -> Result<TheoryFeedback, QuizError> {
        let q = self.current_theory()?;
        let locked_out = match &self.step {
            Step::Unanswered { locked_out } => locked_out.clone(),
            _ => return Err(QuizError::AlreadyGraded),
        };
        if !q.options.iter().any(|o| o == option) {
            return Err(QuizError::UnknownOption(option.to_string()));
        }
        if locked_out.as_deref() == Some(option) {
            return Err(QuizError::OptionLockedOut);
        }

        let attempts = self.bump_attempts(&q.id);
        self.user_answers.insert(q.id.clone(), option.to_string());
        let correct = option == q.correct_answer;

        if correct || attempts >= MAX_THEORY_ATTEMPTS {
            let verdict = Verdict {
                correct,
                user_answer: option.to_string(),
                gave_up: false,
            };
            self.finish(
                QuestionKind::Theory,
                &q.id,
                &q.correct_answer,
                &q.explanation,
                verdict,
                sink,
            );
            Ok(TheoryFeedback {
                correct,
                graded: true,
                attempts,
                locked_out: None,
                correct_answer: Some(q.correct_answer),
                explanation: Some(q.explanation),
            })
        } else {
            self.step = Step::Unanswered {
                locked_out: Some(option.to_string()),
            };
            Ok(TheoryFeedback {
                correct: false,
                graded: false,
                attempts,
                locked_out: Some(option.to_string()),
                correct_answer: None,
                explanation: None,
            })
        }
    }

    /// Grade a code buffer. Right or wrong, the question is closed afterwards.
    pub fn submit_code(
        &mut self,
        code: &str,
        sink: &dyn HistorySink,
    ) -> Result<PracticalFeedback, QuizError> {
        let q = self.current_practical()?;
        match self.step {
            Step::Editing => {}
            Step::ConfirmingGiveUp => return Err(QuizError::GiveUpPending),
            _ => return Err(QuizError::AlreadyGraded),
        }

        self.bump_attempts(&q.id);
        self.user_answers.insert(q.id.clone(), code.to_string());
        let correct = grading::code_matches(code, &q.correct_answer);
        let verdict = Verdict {
            correct,
            user_answer: code.to_string(),
            gave_up: false,
        };
        self.finish(
            QuestionKind::Practical,
            &q.id,
            &q.correct_answer,
            &q.explanation,
            verdict,
            sink,
        );
        Ok(PracticalFeedback {
            correct,
            gave_up: false,
            solution: None,
            explanation: correct.then_some(q.explanation),
        })
    }

    pub fn request_give_up(&mut self) -> Result<(), QuizError> {
        self.current_practical()?;
        match self.step {
            Step::Editing | Step::ConfirmingGiveUp => {
                self.step = Step::ConfirmingGiveUp;
                Ok(())
            }
            _ => Err(QuizError::AlreadyGraded),
        }
    }

    pub fn cancel_give_up(&mut self) -> Result<(), QuizError> {
        match self.step {
            Step::ConfirmingGiveUp => {
                self.step = Step::Editing;
                Ok(())
            }
            _ => Err(QuizError::NoPendingGiveUp),
        }
    }

    /// Reveal the reference solution and close the question as incorrect.
    pub fn confirm_give_up(
        &mut self,
        sink: &dyn HistorySink,
    ) -> Result<PracticalFeedback, QuizError> {
        let q = self.current_practical()?;
        if self.step != Step::ConfirmingGiveUp {
            return Err(QuizError::NoPendingGiveUp);
        }

        self.user_answers
            .insert(q.id.clone(), q.correct_answer.clone());
        let verdict = Verdict {
            correct: false,
            user_answer: q.correct_answer.clone(),
            gave_up: true,
        };
        self.finish(
            QuestionKind::Practical,
            &q.id,
            &q.correct_answer,
            &q.explanation,
            verdict,
            sink,
        );
        Ok(PracticalFeedback {
            correct: false,
            gave_up: true,
            solution: Some(q.correct_answer),
            explanation: Some(q.explanation),
        })
    }

    pub fn hint(&self) -> Result<&str, QuizError> {
        let q = self.current().ok_or(QuizError::NoActiveQuiz)?;
        if !self.step.is_open() {
            return Err(QuizError::AlreadyGraded);
        }
        Ok(q.hint())
    }

    pub fn next_question(&mut self) -> Result<Advance, QuizError> {
        if self.current().is_none() {
            return Err(QuizError::NoActiveQuiz);
        }
        if self.step.is_open() {
            return Err(QuizError::NotGraded);
        }
        self.index += 1;
        if self.index >= self.questions.len() {
            self.timer.stop();
            return Ok(Advance::Completed(self.summary()));
        }
        self.step = Step::initial(self.kind);
        Ok(Advance::Next { index: self.index })
    }

    /// Stop the clock and report how far the run got.
    pub fn abandon(&mut self) -> QuizSummary {
        self.timer.stop();
        self.summary()
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            kind: self.kind,
            total: self.questions.len(),
            answered: self.answered,
            correct: self.correct,
            elapsed: self.timer.elapsed(),
        }
    }
}
