mod app;
mod event;
mod ui;

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cquiz::config::{Backend, Config};
use cquiz::question::{Difficulty, QuestionKind};

use app::{App, AppScreen, Modal};
use event::{AppEvent, EventHandler};
use ui::components::history_view::HistoryView;
use ui::components::menu::MenuAction;
use ui::components::modal::{ModalView, format_elapsed};
use ui::components::quiz_view::QuizView;
use ui::layout::{ScreenLayout, centered_rect};

#[derive(Parser)]
#[command(name = "cquiz", version, about = "C programming quiz for the terminal")]
struct Cli {
    #[arg(short, long, help = "Questions per quiz")]
    size: Option<usize>,

    #[arg(short, long, help = "Storage backend (local, firestore)")]
    backend: Option<Backend>,

    #[arg(short, long, help = "Difficulty of generated questions (easy, medium, hard)")]
    difficulty: Option<Difficulty>,

    #[arg(short, long, help = "Path to a config.toml")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Theme name")]
    theme: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => {
            let config = Config::load().unwrap_or_default();
            // First run: leave an editable config behind
            if !Config::config_path().exists() {
                let _ = config.save();
            }
            config
        }
    };
    if let Some(size) = cli.size {
        config.quiz_size = size;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(difficulty) = cli.difficulty {
        config.generate_difficulty = difficulty;
    }
    if let Some(theme) = cli.theme {
        config.theme = theme;
    }
    config.validate();

    init_logging(&config)?;
    info!(backend = %config.backend, quiz_size = config.quiz_size, "starting cquiz");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = EventHandler::new(Duration::from_millis(250));
    let mut app = App::new(config, events.sender());

    let result = run_app(&mut terminal, &mut app, &events);
    app.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

/// The terminal belongs to the UI, so logs go to `{data_dir}/cquiz.log`.
fn init_logging(config: &Config) -> Result<()> {
    let dir = config.data_path();
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("cquiz.log"))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        match events.next()? {
            AppEvent::Key(key) => handle_key(app, key),
            AppEvent::Tick | AppEvent::Resize(_, _) => {}
            AppEvent::SignedIn(result) => app.on_signed_in(result),
            AppEvent::Snapshot(feed, event) => app.on_snapshot(feed, event),
            AppEvent::Generated { kind, result } => app.on_generated(kind, result),
            AppEvent::StoreFailure(message) => app.on_store_failure(message),
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    // Dialogs take every key until dismissed
    if let Some(modal) = app.top_modal().cloned() {
        handle_modal_key(app, &modal, key);
        return;
    }

    match app.screen {
        AppScreen::Splash => {
            if key.code == KeyCode::Char('q') {
                app.should_quit = true;
            }
        }
        AppScreen::Home => handle_home_key(app, key),
        AppScreen::Quiz => handle_quiz_key(app, key),
        AppScreen::History => handle_history_key(app, key),
    }
}

fn handle_modal_key(app: &mut App, modal: &Modal, key: KeyEvent) {
    match modal {
        Modal::ConfirmGiveUp => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => app.confirm_give_up(),
            KeyCode::Char('n') | KeyCode::Esc => app.cancel_give_up(),
            _ => {}
        },
        Modal::Generating(_) => {
            if key.code == KeyCode::Esc {
                app.modals.pop();
            }
        }
        Modal::Message { .. } | Modal::Completed(_) => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                app.close_modal();
            }
        }
    }
}

fn run_menu_action(app: &mut App, action: MenuAction) {
    match action {
        MenuAction::StartQuiz(kind) => app.start_quiz(kind),
        MenuAction::Generate(kind) => app.generate(kind),
        MenuAction::History => app.go_to_history(),
        MenuAction::Quit => app.should_quit = true,
    }
}

fn handle_home_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Up | KeyCode::Char('k') => app.menu.prev(),
        KeyCode::Down | KeyCode::Char('j') => app.menu.next(),
        KeyCode::Enter => {
            if let Some(action) = app.menu.selected_action() {
                run_menu_action(app, action);
            }
        }
        KeyCode::Char(ch) => {
            if let Some(action) = app.menu.action_for_key(ch) {
                run_menu_action(app, action);
            }
        }
        _ => {}
    }
}

fn handle_quiz_key(app: &mut App, key: KeyEvent) {
    let Some(session) = app.session() else {
        app.return_home();
        return;
    };
    let kind = session.kind();
    let open = session.step().is_open();
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if !open {
        match key.code {
            KeyCode::Enter | KeyCode::Char('n') => app.next_question(),
            KeyCode::Esc | KeyCode::Char('q') => app.return_home(),
            _ => {}
        }
        return;
    }

    match kind {
        QuestionKind::Theory => match key.code {
            KeyCode::Esc => app.return_home(),
            KeyCode::Up | KeyCode::Char('k') => app.select_prev_option(),
            KeyCode::Down | KeyCode::Char('j') => app.select_next_option(),
            KeyCode::Enter => app.answer_option(app.selected_option),
            KeyCode::Char(ch @ '1'..='4') => app.answer_option(ch as usize - '1' as usize),
            KeyCode::Char('h') => app.toggle_hint(),
            _ => {}
        },
        QuestionKind::Practical => match key.code {
            KeyCode::Char('g') if ctrl => app.request_give_up(),
            KeyCode::Char('t') if ctrl => app.toggle_hint(),
            _ => app.edit_code(key),
        },
    }
}

fn handle_history_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.screen = AppScreen::Home,
        KeyCode::Down | KeyCode::Char('j') => {
            let max = app.history.len().saturating_sub(1);
            app.history_scroll = (app.history_scroll + 1).min(max);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.history_scroll = app.history_scroll.saturating_sub(1);
        }
        KeyCode::Home => app.history_scroll = 0,
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let colors = &app.theme.colors;

    let bg = Block::default().style(Style::default().bg(colors.bg()));
    frame.render_widget(bg, area);

    match app.screen {
        AppScreen::Splash => render_splash(frame, app),
        AppScreen::Home => render_home(frame, app),
        AppScreen::Quiz => render_quiz(frame, app),
        AppScreen::History => render_history(frame, app),
    }

    if let Some(modal) = app.top_modal() {
        let popup = centered_rect(50, 30, area);
        frame.render_widget(ModalView::new(modal, app.theme), popup);
    }
}

fn render_header(frame: &mut ratatui::Frame, app: &App, area: Rect, info: &str) {
    let colors = &app.theme.colors;
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " cquiz ",
            Style::default()
                .fg(colors.header_fg())
                .bg(colors.header_bg())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            info.to_string(),
            Style::default().fg(colors.muted()).bg(colors.header_bg()),
        ),
    ]))
    .style(Style::default().bg(colors.header_bg()));
    frame.render_widget(header, area);
}

fn render_footer(frame: &mut ratatui::Frame, app: &App, area: Rect, keys: &str) {
    let footer = Paragraph::new(Line::from(Span::styled(
        keys.to_string(),
        Style::default().fg(app.theme.colors.muted()),
    )));
    frame.render_widget(footer, area);
}

fn render_splash(frame: &mut ratatui::Frame, app: &App) {
    let colors = &app.theme.colors;
    let area = centered_rect(40, 30, frame.area());
    let lines = vec![
        Line::from(Span::styled(
            "cquiz",
            Style::default()
                .fg(colors.accent())
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "C Programming Quiz",
            Style::default().fg(colors.fg()),
        )),
        Line::from(""),
        Line::from(Span::styled("Signing in...", Style::default().fg(colors.muted()))),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn render_home(frame: &mut ratatui::Frame, app: &App) {
    let layout = ScreenLayout::new(frame.area());
    let bank = app.ctx.bank();
    let generating = if app.generating > 0 {
        format!(" | generating ({})", app.generating)
    } else {
        String::new()
    };
    let info = format!(
        " User: {} | Theory {} ({} generated) | Practical {} ({} generated){}",
        app.user_label(),
        bank.len(QuestionKind::Theory),
        bank.generated_count(QuestionKind::Theory),
        bank.len(QuestionKind::Practical),
        bank.generated_count(QuestionKind::Practical),
        generating,
    );
    render_header(frame, app, layout.header, &info);

    let menu_area = centered_rect(60, 100, layout.main);
    frame.render_widget(&app.menu, menu_area);

    render_footer(
        frame,
        app,
        layout.footer,
        " [1-4] Start/Generate  [h] History  [j/k] Move  [Enter] Select  [q] Quit ",
    );
}

fn render_quiz(frame: &mut ratatui::Frame, app: &App) {
    let Some(session) = app.session() else {
        return;
    };
    let layout = ScreenLayout::new(frame.area());

    let info = format!(
        " Question {} of {} | Time {} | Score {} | User: {}",
        session.index() + 1,
        session.len(),
        format_elapsed(session.elapsed().as_secs()),
        session.correct_count(),
        app.user_label(),
    );
    render_header(frame, app, layout.header, &info);

    let view = QuizView::new(session, app.theme)
        .selected_option(app.selected_option)
        .theory_feedback(app.theory_feedback.as_ref())
        .practical_feedback(app.practical_feedback.as_ref())
        .editor(app.editor.as_ref())
        .show_hint(app.show_hint);
    frame.render_widget(view, layout.main);

    let keys = match (session.kind(), session.step().is_open()) {
        (_, false) => " [Enter/n] Next question  [Esc] Back to home ",
        (QuestionKind::Theory, true) => {
            " [1-4/Enter] Answer  [j/k] Move  [h] Hint  [Esc] Back to home "
        }
        (QuestionKind::Practical, true) => {
            " [Ctrl+S] Submit  [Ctrl+T] Hint  [Ctrl+G] Give up  [Esc] Back to home "
        }
    };
    render_footer(frame, app, layout.footer, keys);
}

fn render_history(frame: &mut ratatui::Frame, app: &App) {
    let layout = ScreenLayout::new(frame.area());
    let info = format!(" User: {} | {} answers", app.user_label(), app.history.len());
    render_header(frame, app, layout.header, &info);

    let view = HistoryView::new(&app.history, app.history_loaded, app.history_scroll, app.theme);
    frame.render_widget(view, layout.main);

    render_footer(frame, app, layout.footer, " [j/k] Scroll  [Esc] Back to home ");
}
