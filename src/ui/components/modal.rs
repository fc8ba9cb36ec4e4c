use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Widget, Wrap};

use crate::app::Modal;
use crate::ui::theme::Theme;

/// Minutes and seconds, e.g. `03:07`.
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub struct ModalView<'a> {
    modal: &'a Modal,
    theme: &'a Theme,
}

impl<'a> ModalView<'a> {
    pub fn new(modal: &'a Modal, theme: &'a Theme) -> Self {
        Self { modal, theme }
    }

    fn content(&self) -> (String, Vec<String>, &'static str) {
        match self.modal {
            Modal::Message { title, body } => (
                title.clone(),
                body.lines().map(str::to_string).collect(),
                "[Enter] OK",
            ),
            Modal::ConfirmGiveUp => (
                "Give up?".to_string(),
                vec![
                    "Are you sure you want to give up?".to_string(),
                    "The correct answer will be revealed.".to_string(),
                ],
                "[y] Give up  [n] Keep trying",
            ),
            Modal::Generating(kind) => (
                "Generating".to_string(),
                vec![format!("Generating new {kind} questions... This may take a moment.")],
                "[Esc] Hide",
            ),
            Modal::Completed(summary) => (
                "Quiz completed!".to_string(),
                vec![
                    format!("You answered {} of {} correctly.", summary.correct, summary.total),
                    format!("Time: {}", format_elapsed(summary.elapsed.as_secs())),
                ],
                "[Enter] Back to home",
            ),
        }
    }
}

impl Widget for ModalView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let (title, body, keys) = self.content();

        Clear.render(area, buf);
        let block = Block::bordered()
            .title(format!(" {title} "))
            .border_style(Style::default().fg(colors.border_focused()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines: Vec<Line> = vec![Line::from("")];
        lines.extend(
            body.into_iter()
                .map(|l| Line::from(Span::styled(l, Style::default().fg(colors.fg())))),
        );
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            keys,
            Style::default().fg(colors.accent()).add_modifier(Modifier::BOLD),
        )));

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(inner, buf);
    }
}
