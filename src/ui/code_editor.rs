use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const INDENT: &str = "    ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorResult {
    Continue,
    Submit,
    Cancel,
}

/// Multi-line code buffer for practical answers.
pub struct CodeEditor {
    lines: Vec<String>,
    /// Cursor row (line index).
    row: usize,
    /// Cursor column as a char index within the row.
    col: usize,
}

impl CodeEditor {
    pub fn new(text: &str) -> Self {
        let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self {
            lines,
            row: 0,
            col: 0,
        }
    }

    pub fn value(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    fn line_len(&self, row: usize) -> usize {
        self.lines.get(row).map_or(0, |l| l.chars().count())
    }

    fn byte_offset(line: &str, col: usize) -> usize {
        line.char_indices()
            .nth(col)
            .map_or(line.len(), |(i, _)| i)
    }

    /// First row to draw so the cursor stays inside a viewport of `height` rows.
    pub fn first_visible_row(&self, height: usize) -> usize {
        if height == 0 || self.row < height {
            0
        } else {
            self.row + 1 - height
        }
    }

    pub fn handle(&mut self, key: KeyEvent) -> EditorResult {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return EditorResult::Cancel,
            KeyCode::Char('s') if ctrl => return EditorResult::Submit,
            KeyCode::Enter if ctrl || key.modifiers.contains(KeyModifiers::ALT) => {
                return EditorResult::Submit;
            }
            KeyCode::Enter => self.newline(),
            KeyCode::Tab => self.insert_str(INDENT),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => {
                if self.col > 0 {
                    self.col -= 1;
                } else if self.row > 0 {
                    self.row -= 1;
                    self.col = self.line_len(self.row);
                }
            }
            KeyCode::Right => {
                if self.col < self.line_len(self.row) {
                    self.col += 1;
                } else if self.row + 1 < self.lines.len() {
                    self.row += 1;
                    self.col = 0;
                }
            }
            KeyCode::Up => {
                if self.row > 0 {
                    self.row -= 1;
                    self.col = self.col.min(self.line_len(self.row));
                }
            }
            KeyCode::Down => {
                if self.row + 1 < self.lines.len() {
                    self.row += 1;
                    self.col = self.col.min(self.line_len(self.row));
                }
            }
            KeyCode::Home => self.col = 0,
            KeyCode::End => self.col = self.line_len(self.row),
            KeyCode::Char('a') if ctrl => self.col = 0,
            KeyCode::Char('e') if ctrl => self.col = self.line_len(self.row),
            KeyCode::Char('u') if ctrl => {
                self.lines[self.row].clear();
                self.col = 0;
            }
            KeyCode::Char(ch) if !ctrl => self.insert_char(ch),
            _ => {}
        }
        EditorResult::Continue
    }

    fn insert_char(&mut self, ch: char) {
        let line = &mut self.lines[self.row];
        let offset = Self::byte_offset(line, self.col);
        line.insert(offset, ch);
        self.col += 1;
    }

    fn insert_str(&mut self, s: &str) {
        for ch in s.chars() {
            self.insert_char(ch);
        }
    }

    /// Split the line at the cursor, carrying the current indentation over.
    fn newline(&mut self) {
        let line = &mut self.lines[self.row];
        let offset = Self::byte_offset(line, self.col);
        let rest = line.split_off(offset);
        let indent: String = line.chars().take_while(|c| *c == ' ').collect();
        let indent_len = indent.chars().count();
        self.lines.insert(self.row + 1, format!("{indent}{rest}"));
        self.row += 1;
        self.col = indent_len;
    }

    fn backspace(&mut self) {
        if self.col > 0 {
            let line = &mut self.lines[self.row];
            let start = Self::byte_offset(line, self.col - 1);
            let end = Self::byte_offset(line, self.col);
            line.replace_range(start..end, "");
            self.col -= 1;
        } else if self.row > 0 {
            let current = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.line_len(self.row);
            self.lines[self.row].push_str(&current);
        }
    }

    fn delete(&mut self) {
        if self.col < self.line_len(self.row) {
            let line = &mut self.lines[self.row];
            let start = Self::byte_offset(line, self.col);
            let end = Self::byte_offset(line, self.col + 1);
            line.replace_range(start..end, "");
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_str(editor: &mut CodeEditor, s: &str) {
        for ch in s.chars() {
            editor.handle(key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn test_template_round_trips() {
        let template = "#include <stdio.h>\n\nint main() {\n    return 0;\n}";
        assert_eq!(CodeEditor::new(template).value(), template);
    }

    #[test]
    fn test_newline_keeps_indentation() {
        let mut editor = CodeEditor::new("    int a;");
        editor.handle(key(KeyCode::End));
        editor.handle(key(KeyCode::Enter));
        type_str(&mut editor, "int b;");
        assert_eq!(editor.value(), "    int a;\n    int b;");
        assert_eq!(editor.cursor(), (1, 10));
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut editor = CodeEditor::new("ab\ncd");
        editor.handle(key(KeyCode::Down));
        editor.handle(key(KeyCode::Home));
        editor.handle(key(KeyCode::Backspace));
        assert_eq!(editor.value(), "abcd");
        assert_eq!(editor.cursor(), (0, 2));
    }

    #[test]
    fn test_delete_at_line_end_pulls_next_line() {
        let mut editor = CodeEditor::new("x\ny");
        editor.handle(key(KeyCode::End));
        editor.handle(key(KeyCode::Delete));
        assert_eq!(editor.value(), "xy");
    }

    #[test]
    fn test_submit_and_cancel_keys() {
        let mut editor = CodeEditor::new("");
        assert_eq!(editor.handle(ctrl('s')), EditorResult::Submit);
        assert_eq!(editor.handle(key(KeyCode::Esc)), EditorResult::Cancel);
        assert_eq!(editor.handle(key(KeyCode::Char('s'))), EditorResult::Continue);
        assert_eq!(editor.value(), "s");
    }

    #[test]
    fn test_multibyte_chars() {
        let mut editor = CodeEditor::new("é");
        editor.handle(key(KeyCode::End));
        type_str(&mut editor, "ü");
        editor.handle(key(KeyCode::Left));
        editor.handle(key(KeyCode::Backspace));
        assert_eq!(editor.value(), "ü");
    }

    #[test]
    fn test_viewport_follows_cursor() {
        let mut editor = CodeEditor::new("1\n2\n3\n4\n5");
        for _ in 0..4 {
            editor.handle(key(KeyCode::Down));
        }
        assert_eq!(editor.first_visible_row(2), 3);
        assert_eq!(editor.first_visible_row(10), 0);
        for _ in 0..4 {
            editor.handle(key(KeyCode::Up));
        }
        assert_eq!(editor.first_visible_row(2), 0);
    }
}
