use chrono::Local;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use cquiz::session::history::{HistoryEntry, HistorySummary, sorted_recent_first};

use crate::ui::theme::Theme;

const ANSWER_PREVIEW_CHARS: usize = 60;

/// First line of an answer, shortened for the list.
pub fn preview(answer: &str) -> String {
    let first = answer.lines().next().unwrap_or("");
    let mut out: String = first.chars().take(ANSWER_PREVIEW_CHARS).collect();
    if first.chars().count() > ANSWER_PREVIEW_CHARS || answer.lines().count() > 1 {
        out.push_str(" ...");
    }
    out
}

pub struct HistoryView<'a> {
    entries: &'a [HistoryEntry],
    loaded: bool,
    scroll: usize,
    theme: &'a Theme,
}

impl<'a> HistoryView<'a> {
    pub fn new(entries: &'a [HistoryEntry], loaded: bool, scroll: usize, theme: &'a Theme) -> Self {
        Self {
            entries,
            loaded,
            scroll,
            theme,
        }
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let block = Block::bordered()
            .title(" Quiz History ")
            .border_style(Style::default().fg(colors.border()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(0)])
            .split(inner);

        let summary = HistorySummary::from_entries(self.entries);
        let header = format!(
            " Theory {}/{}  Practical {}/{}  Accuracy {:.0}%",
            summary.theory.correct,
            summary.theory.total,
            summary.practical.correct,
            summary.practical.total,
            summary.accuracy()
        );
        Paragraph::new(Line::from(Span::styled(
            header,
            Style::default().fg(colors.accent()).add_modifier(Modifier::BOLD),
        )))
        .render(layout[0], buf);

        if !self.loaded {
            Paragraph::new(Line::from(Span::styled(
                " Loading history...",
                Style::default().fg(colors.muted()),
            )))
            .render(layout[1], buf);
            return;
        }
        if self.entries.is_empty() {
            Paragraph::new(Line::from(Span::styled(
                " No quiz history yet. Start a quiz!",
                Style::default().fg(colors.muted()),
            )))
            .render(layout[1], buf);
            return;
        }

        let muted = Style::default().fg(colors.muted());
        let plain = Style::default().fg(colors.fg());
        let mut lines: Vec<Line> = Vec::new();
        for entry in sorted_recent_first(self.entries).into_iter().skip(self.scroll) {
            let when = entry.timestamp.map_or_else(
                || "just now".to_string(),
                |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            );
            let (verdict, verdict_style) = if entry.is_correct {
                ("Correct", Style::default().fg(colors.correct()).add_modifier(Modifier::BOLD))
            } else {
                ("Incorrect", Style::default().fg(colors.incorrect()).add_modifier(Modifier::BOLD))
            };
            lines.push(Line::from(vec![
                Span::styled(format!(" {when}  "), muted),
                Span::styled(format!("{} {}  ", entry.question_type.label(), entry.question_id), plain),
                Span::styled(verdict, verdict_style),
            ]));
            if let Some(answer) = &entry.user_answer {
                lines.push(Line::from(Span::styled(
                    format!("   Your answer: {}", preview(answer)),
                    muted,
                )));
            }
            if !entry.is_correct {
                if let Some(correct) = &entry.correct_answer {
                    lines.push(Line::from(Span::styled(
                        format!("   Correct answer: {}", preview(correct)),
                        muted,
                    )));
                }
            }
            lines.push(Line::from(""));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(layout[1], buf);
    }
}
