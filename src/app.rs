use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{info, warn};

use cquiz::cache::OfflineCache;
use cquiz::config::{Backend, Config};
use cquiz::generator::{QuestionGenerator, UnavailableGenerator};
use cquiz::identity::{Identity, IdentityError, IdentityProvider, LocalIdentity};
use cquiz::question::bank::{QuestionBank, questions_from_documents};
use cquiz::question::{Question, QuestionKind};
use cquiz::session::context::{QuizState, Readiness, SessionContext};
use cquiz::session::history::{HistoryEntry, HistorySink, NewHistoryEntry};
use cquiz::session::quiz::{
    Advance, PracticalFeedback, QuizError, QuizSession, QuizSummary, TheoryFeedback,
};
use cquiz::store::json_store::JsonStore;
use cquiz::store::writer::{QueueHistorySink, WriteQueue};
use cquiz::store::{
    CollectionPath, DocumentId, DocumentStore, GENERATED_COLLECTION, HISTORY_COLLECTION,
    SnapshotEvent, StoreError,
};

use crate::event::{AppEvent, Feed};
use crate::ui::code_editor::{CodeEditor, EditorResult};
use crate::ui::components::menu::Menu;
use crate::ui::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppScreen {
    Splash,
    Home,
    Quiz,
    History,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Modal {
    Message { title: String, body: String },
    ConfirmGiveUp,
    Generating(QuestionKind),
    Completed(QuizSummary),
}

/// Used before the store is connected; outcomes are only logged.
struct UnsavedHistory;

impl HistorySink for UnsavedHistory {
    fn record(&self, entry: NewHistoryEntry) {
        warn!(question = %entry.question_id, "no store connected; history entry not saved");
    }
}

pub struct App {
    pub screen: AppScreen,
    pub config: Config,
    pub theme: &'static Theme,
    pub menu: Menu<'static>,
    pub ctx: SessionContext,
    /// Dialog stack; the last one is on top and takes the keys.
    pub modals: Vec<Modal>,
    pub should_quit: bool,
    pub selected_option: usize,
    pub theory_feedback: Option<TheoryFeedback>,
    pub practical_feedback: Option<PracticalFeedback>,
    pub editor: Option<CodeEditor>,
    pub show_hint: bool,
    pub history: Vec<HistoryEntry>,
    pub history_scroll: usize,
    pub history_loaded: bool,
    pub generating: usize,
    store: Option<Arc<dyn DocumentStore>>,
    writer: Option<WriteQueue>,
    history_sink: Option<QueueHistorySink>,
    generated_path: Option<CollectionPath>,
    cache: Option<OfflineCache>,
    generator: Arc<dyn QuestionGenerator>,
    events: Sender<AppEvent>,
    rng: SmallRng,
}

impl App {
    pub fn new(config: Config, events: Sender<AppEvent>) -> Self {
        let loaded_theme = Theme::load(&config.theme).unwrap_or_default();
        let theme: &'static Theme = Box::leak(Box::new(loaded_theme));
        let menu = Menu::new(theme);
        let cache = OfflineCache::new(config.data_path().join("cache"));
        if cache.is_none() {
            warn!("offline cache unavailable");
        }
        let generator = build_generator(&config);

        let app = Self {
            screen: AppScreen::Splash,
            config,
            theme,
            menu,
            ctx: SessionContext::new(QuestionBank::with_builtin_seed()),
            modals: Vec::new(),
            should_quit: false,
            selected_option: 0,
            theory_feedback: None,
            practical_feedback: None,
            editor: None,
            show_hint: false,
            history: Vec::new(),
            history_scroll: 0,
            history_loaded: false,
            generating: 0,
            store: None,
            writer: None,
            history_sink: None,
            generated_path: None,
            cache,
            generator,
            events,
            rng: SmallRng::from_entropy(),
        };
        app.spawn_sign_in();
        app
    }

    fn spawn_sign_in(&self) {
        let config = self.config.clone();
        let tx = self.events.clone();
        thread::spawn(move || {
            let result = sign_in(&config).map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::SignedIn(result));
        });
    }

    pub fn user_label(&self) -> String {
        match self.ctx.readiness() {
            Readiness::Pending => "signing in...".to_string(),
            Readiness::Ready(identity) => identity.user_id.clone(),
            Readiness::Degraded { identity, .. } => format!("{} (offline)", identity.user_id),
        }
    }

    pub fn session(&self) -> Option<&QuizSession> {
        self.ctx.session()
    }

    pub fn top_modal(&self) -> Option<&Modal> {
        self.modals.last()
    }

    pub fn show_message(&mut self, title: &str, body: impl Into<String>) {
        self.modals.push(Modal::Message {
            title: title.to_string(),
            body: body.into(),
        });
    }

    pub fn close_modal(&mut self) {
        if let Some(Modal::Completed(_)) = self.modals.pop() {
            self.return_home();
        }
    }

    pub fn on_signed_in(&mut self, result: Result<Identity, String>) {
        match result {
            Ok(identity) => {
                self.ctx.mark_ready(identity);
            }
            Err(reason) => {
                if self.ctx.mark_degraded(reason.clone()) {
                    self.show_message(
                        "Sign-in failed",
                        format!("{reason}\nContinuing as an anonymous user."),
                    );
                }
            }
        }
        if let Some(identity) = self.ctx.identity().cloned() {
            self.connect_store(&identity);
        }
        if self.screen == AppScreen::Splash {
            self.screen = AppScreen::Home;
        }
    }

    fn connect_store(&mut self, identity: &Identity) {
        if self.store.is_some() {
            return;
        }
        let history_path =
            CollectionPath::user(&self.config.app_id, &identity.user_id, HISTORY_COLLECTION);
        let generated_path =
            CollectionPath::user(&self.config.app_id, &identity.user_id, GENERATED_COLLECTION);

        if let Some(docs) = self
            .cache
            .as_ref()
            .and_then(|c| c.load_snapshot(&generated_path))
        {
            let cached = questions_from_documents(&docs);
            info!(questions = cached.len(), "seeding bank from offline cache");
            self.ctx.apply_generated(&cached);
        }

        let store = match open_store(&self.config, identity) {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "could not open store");
                self.show_message("Storage unavailable", e.to_string());
                return;
            }
        };

        spawn_feed(store.clone(), history_path.clone(), Feed::History, self.events.clone());
        spawn_feed(store.clone(), generated_path.clone(), Feed::Generated, self.events.clone());

        let tx = self.events.clone();
        let writer = WriteQueue::spawn(store.clone(), move |e| {
            let _ = tx.send(AppEvent::StoreFailure(e.to_string()));
        });
        self.history_sink = Some(writer.history_sink(history_path));
        self.writer = Some(writer);
        self.generated_path = Some(generated_path);
        self.store = Some(store);
    }

    pub fn on_snapshot(&mut self, feed: Feed, event: SnapshotEvent) {
        match (feed, event) {
            (Feed::Generated, Ok(snapshot)) => {
                if let Some(cache) = &self.cache {
                    cache.store_snapshot(&snapshot);
                }
                let generated = questions_from_documents(&snapshot.documents);
                self.ctx.apply_generated(&generated);
            }
            (Feed::History, Ok(snapshot)) => {
                self.history = snapshot
                    .documents
                    .iter()
                    .filter_map(|doc| match HistoryEntry::from_document(doc) {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            warn!(id = %doc.id, error = %e, "skipping unreadable history entry");
                            None
                        }
                    })
                    .collect();
                self.history_loaded = true;
            }
            (Feed::Generated, Err(e)) => {
                self.show_message("Error", format!("Failed to load generated questions: {e}"));
            }
            (Feed::History, Err(e)) => {
                self.show_message("Error", format!("Failed to load quiz history: {e}"));
            }
        }
    }

    pub fn on_store_failure(&mut self, message: String) {
        self.show_message("Error", format!("Failed to save: {message}"));
    }

    pub fn start_quiz(&mut self, kind: QuestionKind) {
        let count = self.config.quiz_size;
        match self.ctx.start_quiz(kind, count, &mut self.rng) {
            Ok(_) => self.enter_quiz(),
            Err(e) => self.show_quiz_error(e),
        }
    }

    fn enter_quiz(&mut self) {
        self.screen = AppScreen::Quiz;
        self.reset_question_ui();
    }

    fn reset_question_ui(&mut self) {
        self.selected_option = 0;
        self.theory_feedback = None;
        self.practical_feedback = None;
        self.show_hint = false;
        self.editor = match self.ctx.session().and_then(|s| s.current()) {
            Some(Question::Practical(q)) => Some(CodeEditor::new(&q.code_template)),
            _ => None,
        };
    }

    fn show_quiz_error(&mut self, e: QuizError) {
        match e {
            QuizError::EmptyBank(kind) => self.show_message(
                "No questions",
                format!("No {kind} questions are available. Try generating some."),
            ),
            other => self.show_message("Not allowed", other.to_string()),
        }
    }

    pub fn generate(&mut self, kind: QuestionKind) {
        if self.ctx.identity().is_none() {
            self.show_message("Please wait", "Still signing in.");
            return;
        }
        let generator = self.generator.clone();
        let difficulty = self.config.generate_difficulty;
        let count = self.config.generate_count;
        let tx = self.events.clone();
        self.generating += 1;
        self.modals.push(Modal::Generating(kind));
        info!(kind = %kind, count, "generation started");
        thread::spawn(move || {
            let result = generator
                .generate(kind, difficulty, count)
                .map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::Generated { kind, result });
        });
    }

    pub fn on_generated(&mut self, kind: QuestionKind, result: Result<Vec<Question>, String>) {
        self.generating = self.generating.saturating_sub(1);
        if let Some(pos) = self
            .modals
            .iter()
            .position(|m| *m == Modal::Generating(kind))
        {
            self.modals.remove(pos);
        }

        let questions = match result {
            Ok(questions) => questions,
            Err(e) => {
                warn!(kind = %kind, error = %e, "generation failed");
                self.show_message(
                    "Generation failed",
                    format!("Failed to generate questions: {e}. Please try again."),
                );
                return;
            }
        };

        self.persist_generated(&questions);
        let quiz_running = matches!(self.ctx.state(), QuizState::InProgress(_));
        if quiz_running {
            self.show_message(
                "Questions ready",
                format!(
                    "Generated {} new {kind} questions. They join the bank for your next quiz.",
                    questions.len()
                ),
            );
            return;
        }
        let count = self.config.quiz_size;
        match self
            .ctx
            .start_quiz_with(kind, &questions, count, &mut self.rng)
        {
            Ok(_) => {
                self.enter_quiz();
                self.show_message(
                    "Questions ready",
                    format!("Generated {} new {kind} questions.", questions.len()),
                );
            }
            Err(e) => self.show_quiz_error(e),
        }
    }

    fn persist_generated(&mut self, questions: &[Question]) {
        let ids: Vec<String> = questions.iter().map(|q| q.id().to_string()).collect();
        if let (Some(writer), Some(path)) = (&self.writer, &self.generated_path) {
            for question in questions {
                match serde_json::to_value(question) {
                    Ok(data) => writer.enqueue(
                        path.clone(),
                        DocumentId::Named(question.id().to_string()),
                        data,
                    ),
                    Err(e) => warn!(id = %question.id(), error = %e, "could not encode question"),
                }
            }
        } else {
            warn!("no store connected; generated questions kept for this run only");
            self.ctx.extend_generated(questions);
        }
        if let Some(cache) = &self.cache {
            cache.note_generated(&ids);
        }
    }

    pub fn answer_option(&mut self, index: usize) {
        let option = match self.ctx.session().and_then(|s| s.current()) {
            Some(Question::Theory(q)) => match q.options.get(index) {
                Some(option) => option.clone(),
                None => return,
            },
            _ => return,
        };
        self.selected_option = index;
        let sink: &dyn HistorySink = match &self.history_sink {
            Some(sink) => sink,
            None => &UnsavedHistory,
        };
        match self.ctx.answer_theory(&option, sink) {
            Ok(feedback) => {
                if feedback.graded {
                    self.show_hint = false;
                }
                self.theory_feedback = Some(feedback);
            }
            Err(QuizError::OptionLockedOut | QuizError::AlreadyGraded) => {}
            Err(e) => self.show_quiz_error(e),
        }
    }

    pub fn select_next_option(&mut self) {
        self.selected_option = (self.selected_option + 1) % 4;
    }

    pub fn select_prev_option(&mut self) {
        self.selected_option = (self.selected_option + 3) % 4;
    }

    pub fn edit_code(&mut self, key: crossterm::event::KeyEvent) {
        let result = match self.editor.as_mut() {
            Some(editor) => editor.handle(key),
            None => return,
        };
        match result {
            EditorResult::Continue => {}
            EditorResult::Submit => self.submit_code(),
            EditorResult::Cancel => self.return_home(),
        }
    }

    pub fn submit_code(&mut self) {
        let code = match &self.editor {
            Some(editor) => editor.value(),
            None => return,
        };
        let sink: &dyn HistorySink = match &self.history_sink {
            Some(sink) => sink,
            None => &UnsavedHistory,
        };
        match self.ctx.submit_code(&code, sink) {
            Ok(feedback) => self.practical_feedback = Some(feedback),
            Err(QuizError::AlreadyGraded) => {}
            Err(e) => self.show_quiz_error(e),
        }
    }

    pub fn request_give_up(&mut self) {
        match self.ctx.request_give_up() {
            Ok(()) => self.modals.push(Modal::ConfirmGiveUp),
            Err(QuizError::AlreadyGraded) => {}
            Err(e) => self.show_quiz_error(e),
        }
    }

    pub fn cancel_give_up(&mut self) {
        if let Some(Modal::ConfirmGiveUp) = self.modals.last() {
            self.modals.pop();
        }
        let _ = self.ctx.cancel_give_up();
    }

    pub fn confirm_give_up(&mut self) {
        if let Some(Modal::ConfirmGiveUp) = self.modals.last() {
            self.modals.pop();
        }
        let sink: &dyn HistorySink = match &self.history_sink {
            Some(sink) => sink,
            None => &UnsavedHistory,
        };
        match self.ctx.confirm_give_up(sink) {
            Ok(feedback) => {
                if let Some(solution) = &feedback.solution {
                    self.editor = Some(CodeEditor::new(solution));
                }
                self.show_hint = false;
                self.practical_feedback = Some(feedback);
            }
            Err(e) => self.show_quiz_error(e),
        }
    }

    pub fn toggle_hint(&mut self) {
        if self.ctx.hint().is_ok() {
            self.show_hint = !self.show_hint;
        }
    }

    pub fn next_question(&mut self) {
        match self.ctx.next_question() {
            Ok(Advance::Next { .. }) => self.reset_question_ui(),
            Ok(Advance::Completed(summary)) => self.modals.push(Modal::Completed(summary)),
            Err(QuizError::NotGraded) => {}
            Err(e) => self.show_quiz_error(e),
        }
    }

    pub fn return_home(&mut self) {
        self.ctx.return_home();
        self.editor = None;
        self.theory_feedback = None;
        self.practical_feedback = None;
        self.show_hint = false;
        self.screen = AppScreen::Home;
    }

    pub fn go_to_history(&mut self) {
        self.history_scroll = 0;
        self.screen = AppScreen::History;
    }

    pub fn shutdown(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.shutdown();
        }
    }
}

fn sign_in(config: &Config) -> Result<Identity, IdentityError> {
    match config.backend {
        Backend::Local => LocalIdentity::new(config.data_path()).sign_in(),
        #[cfg(feature = "network")]
        Backend::Firestore => cquiz::identity::FirebaseIdentity::new(
            &config.firebase_api_key,
            config.custom_token(),
            config.data_path(),
            config.request_timeout(),
        )?
        .sign_in(),
        #[cfg(not(feature = "network"))]
        Backend::Firestore => Err(IdentityError::Unavailable(
            "built without network support".to_string(),
        )),
    }
}

fn open_store(config: &Config, identity: &Identity) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend {
        Backend::Local => Ok(Arc::new(JsonStore::with_base_dir(
            config.data_path().join("store"),
        )?)),
        #[cfg(feature = "network")]
        Backend::Firestore => Ok(Arc::new(cquiz::store::firestore::FirestoreStore::new(
            &config.firebase_project_id,
            &config.firebase_api_key,
            identity.id_token.clone(),
            config.request_timeout(),
        )?)),
        #[cfg(not(feature = "network"))]
        Backend::Firestore => Err(StoreError::Network(format!(
            "built without network support; cannot reach Firestore for {}",
            identity.user_id
        ))),
    }
}

fn build_generator(config: &Config) -> Arc<dyn QuestionGenerator> {
    if config.generation_api_key.trim().is_empty() {
        return Arc::new(UnavailableGenerator::new("no generation API key configured"));
    }
    remote_generator(config)
}

#[cfg(feature = "network")]
fn remote_generator(config: &Config) -> Arc<dyn QuestionGenerator> {
    match cquiz::generator::gemini::GeminiGenerator::new(
        &config.generation_api_key,
        &config.generation_endpoint,
        &config.generation_model,
        config.request_timeout(),
    ) {
        Ok(generator) => Arc::new(generator),
        Err(e) => Arc::new(UnavailableGenerator::new(e.to_string())),
    }
}

#[cfg(not(feature = "network"))]
fn remote_generator(_config: &Config) -> Arc<dyn QuestionGenerator> {
    Arc::new(UnavailableGenerator::new("built without network support"))
}

/// Forward every snapshot of `path` to the UI thread until it goes away.
fn spawn_feed(
    store: Arc<dyn DocumentStore>,
    path: CollectionPath,
    feed: Feed,
    tx: Sender<AppEvent>,
) {
    thread::spawn(move || {
        let subscription = match store.subscribe(&path) {
            Ok(subscription) => subscription,
            Err(e) => {
                let _ = tx.send(AppEvent::Snapshot(feed, Err(e)));
                return;
            }
        };
        for event in subscription {
            if tx.send(AppEvent::Snapshot(feed, event)).is_err() {
                return;
            }
        }
    });
}
