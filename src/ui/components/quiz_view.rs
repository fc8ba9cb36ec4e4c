use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use cquiz::question::{Question, TheoryQuestion};
use cquiz::session::quiz::{PracticalFeedback, QuizSession, Step, TheoryFeedback};

use crate::ui::code_editor::CodeEditor;
use crate::ui::theme::Theme;

/// Rows a paragraph needs once wrapped to `width`.
fn wrapped_height(text: &str, width: u16) -> u16 {
    let width = width.max(1) as usize;
    text.lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum::<usize>()
        .max(1) as u16
}

pub struct QuizView<'a> {
    session: &'a QuizSession,
    selected_option: usize,
    theory_feedback: Option<&'a TheoryFeedback>,
    practical_feedback: Option<&'a PracticalFeedback>,
    editor: Option<&'a CodeEditor>,
    show_hint: bool,
    theme: &'a Theme,
}

impl<'a> QuizView<'a> {
    pub fn new(session: &'a QuizSession, theme: &'a Theme) -> Self {
        Self {
            session,
            selected_option: 0,
            theory_feedback: None,
            practical_feedback: None,
            editor: None,
            show_hint: false,
            theme,
        }
    }

    pub fn selected_option(mut self, index: usize) -> Self {
        self.selected_option = index;
        self
    }

    pub fn theory_feedback(mut self, feedback: Option<&'a TheoryFeedback>) -> Self {
        self.theory_feedback = feedback;
        self
    }

    pub fn practical_feedback(mut self, feedback: Option<&'a PracticalFeedback>) -> Self {
        self.practical_feedback = feedback;
        self
    }

    pub fn editor(mut self, editor: Option<&'a CodeEditor>) -> Self {
        self.editor = editor;
        self
    }

    pub fn show_hint(mut self, show: bool) -> Self {
        self.show_hint = show;
        self
    }

    fn feedback_lines(&self, question: &Question) -> Vec<Line<'a>> {
        let colors = &self.theme.colors;
        let ok = Style::default().fg(colors.correct()).add_modifier(Modifier::BOLD);
        let bad = Style::default().fg(colors.incorrect()).add_modifier(Modifier::BOLD);
        let plain = Style::default().fg(colors.fg());
        let mut lines = Vec::new();

        if let Some(fb) = self.theory_feedback {
            if fb.correct {
                lines.push(Line::from(Span::styled("Correct!", ok)));
            } else if !fb.graded {
                lines.push(Line::from(Span::styled("Incorrect. Try again!", bad)));
            } else {
                let answer = fb.correct_answer.clone().unwrap_or_default();
                lines.push(Line::from(Span::styled(
                    format!("Incorrect. The correct answer is: {answer}"),
                    bad,
                )));
            }
            if let Some(explanation) = fb.explanation.as_deref().filter(|e| !e.is_empty()) {
                lines.push(Line::from(Span::styled(format!("Explanation: {explanation}"), plain)));
            }
        }

        if let Some(fb) = self.practical_feedback {
            if fb.correct {
                lines.push(Line::from(Span::styled(
                    "Correct! Your code matches the solution.",
                    ok,
                )));
            } else if fb.gave_up {
                lines.push(Line::from(Span::styled(
                    "You gave up. The reference solution is shown in the editor.",
                    bad,
                )));
            } else {
                lines.push(Line::from(Span::styled(
                    "Your code does not match the solution.",
                    bad,
                )));
            }
            if let Some(explanation) = fb.explanation.as_deref().filter(|e| !e.is_empty()) {
                lines.push(Line::from(Span::styled(format!("Explanation: {explanation}"), plain)));
            }
        }

        if self.show_hint && self.session.step().is_open() && !question.hint().is_empty() {
            lines.push(Line::from(vec![
                Span::styled(
                    "Hint: ",
                    Style::default()
                        .fg(colors.warning())
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(question.hint().to_string(), Style::default().fg(colors.warning())),
            ]));
        }
        lines
    }

    fn render_options(&self, question: &TheoryQuestion, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let locked_out = match self.session.step() {
            Step::Unanswered { locked_out } => locked_out.as_deref(),
            _ => None,
        };
        let verdict = self.session.step().verdict();

        let lines: Vec<Line> = question
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| {
                let cursor = i == self.selected_option && verdict.is_none();
                let indicator = if cursor { ">" } else { " " };
                let mut style = Style::default().fg(colors.fg());
                let mut mark = " ";
                if let Some(v) = verdict {
                    if *option == question.correct_answer {
                        style = Style::default().fg(colors.correct()).add_modifier(Modifier::BOLD);
                        mark = "✓";
                    } else if *option == v.user_answer {
                        style = Style::default().fg(colors.incorrect());
                        mark = "✗";
                    } else {
                        style = Style::default().fg(colors.muted());
                    }
                } else if locked_out == Some(option.as_str()) {
                    style = Style::default()
                        .fg(colors.incorrect())
                        .add_modifier(Modifier::CROSSED_OUT);
                    mark = "✗";
                } else if cursor {
                    style = Style::default().fg(colors.accent()).add_modifier(Modifier::BOLD);
                }
                Line::from(Span::styled(
                    format!(" {indicator} [{n}] {mark} {option}", n = i + 1),
                    style,
                ))
            })
            .collect();

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }

    fn render_editor(&self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let Some(editor) = self.editor else {
            return;
        };
        let editable = self.session.step().is_open();
        let block = Block::bordered()
            .title(if editable { " Your code " } else { " Submitted code " })
            .border_style(Style::default().fg(if editable {
                colors.border_focused()
            } else {
                colors.border()
            }))
            .style(Style::default().bg(colors.code_bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let height = inner.height as usize;
        let first = editor.first_visible_row(height);
        let (cursor_row, cursor_col) = editor.cursor();
        let text_style = Style::default().fg(colors.fg()).bg(colors.code_bg());
        let cursor_style = Style::default().fg(colors.cursor_fg()).bg(colors.cursor_bg());

        let lines: Vec<Line> = editor
            .lines()
            .iter()
            .enumerate()
            .skip(first)
            .take(height)
            .map(|(row, text)| {
                if !editable || row != cursor_row {
                    return Line::from(Span::styled(text.clone(), text_style));
                }
                let before: String = text.chars().take(cursor_col).collect();
                let at: String = text.chars().nth(cursor_col).map_or(" ".to_string(), String::from);
                let after: String = text.chars().skip(cursor_col + 1).collect();
                Line::from(vec![
                    Span::styled(before, text_style),
                    Span::styled(at, cursor_style),
                    Span::styled(after, text_style),
                ])
            })
            .collect();
        Paragraph::new(lines).render(inner, buf);
    }
}

impl Widget for QuizView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let Some(question) = self.session.current() else {
            return;
        };

        let block = Block::bordered()
            .title(format!(" {} Quiz ", self.session.kind().label()))
            .border_style(Style::default().fg(colors.border()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let feedback = self.feedback_lines(question);
        let feedback_text: Vec<String> = feedback.iter().map(|l| l.to_string()).collect();
        let feedback_height = if feedback.is_empty() {
            0
        } else {
            wrapped_height(&feedback_text.join("\n"), inner.width) + 1
        };
        let prompt_height = wrapped_height(question.prompt(), inner.width) + 1;

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(prompt_height),
                Constraint::Min(4),
                Constraint::Length(feedback_height),
            ])
            .split(inner);

        Paragraph::new(Line::from(Span::styled(
            question.prompt().to_string(),
            Style::default().fg(colors.fg()).add_modifier(Modifier::BOLD),
        )))
        .wrap(Wrap { trim: true })
        .render(layout[0], buf);

        match question {
            Question::Theory(q) => self.render_options(q, layout[1], buf),
            Question::Practical(_) => self.render_editor(layout[1], buf),
        }

        if !feedback.is_empty() {
            let feedback_area = Rect {
                y: layout[2].y + 1,
                height: layout[2].height.saturating_sub(1),
                ..layout[2]
            };
            Paragraph::new(feedback)
                .wrap(Wrap { trim: false })
                .render(feedback_area, buf);
        }
    }
}
