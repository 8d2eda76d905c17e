use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result of feeding a key to the composer
#[derive(Debug, PartialEq, Eq)]
pub enum ComposerResult {
    /// Enter was pressed; the caller decides whether to take the text
    Submit,
    None,
}

/// Single-line input of the chat panel. The cursor counts chars, not bytes.
#[derive(Debug, Clone, Default)]
pub struct WidgetComposer {
    content: String,
    cursor: usize,
}

impl WidgetComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    /// Take the text out, leaving the composer empty
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.content)
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(index, _)| index)
            .unwrap_or(self.content.len())
    }

    pub fn insert_char(&mut self, c: char) {
        let index = self.byte_index(self.cursor);
        self.content.insert(index, c);
        self.cursor += 1;
    }

    /// Pasted text; newlines become spaces since the input is single-line
    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars() {
            self.insert_char(if c == '\n' || c == '\r' { ' ' } else { c });
        }
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let index = self.byte_index(self.cursor);
            self.content.remove(index);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let index = self.byte_index(self.cursor);
            self.content.remove(index);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => return ComposerResult::Submit,
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.insert_char(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.char_count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.char_count(),
            _ => {}
        }

        ComposerResult::None
    }
}

/// Render-time view of the composer
pub struct ComposerView<'a> {
    pub composer: &'a WidgetComposer,
    pub placeholder: &'a str,
    pub disabled: bool,
}

impl Widget for ComposerView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.disabled {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Blue)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(if self.disabled { " aguarde… " } else { " Enter para enviar " });

        let inner = block.inner(area);
        block.render(area, buf);

        let line = if self.composer.content.is_empty() {
            Line::from(Span::styled(self.placeholder, Style::default().fg(Color::DarkGray)))
        } else {
            let mut shown = self.composer.content.clone();
            if !self.disabled {
                shown.insert(self.composer.byte_index(self.composer.cursor), '▌');
            }
            Line::from(Span::raw(shown))
        };
        buf.set_line(inner.x, inner.y, &line, inner.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &mut WidgetComposer, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn edits_multibyte_text_by_char() {
        let mut composer = WidgetComposer::new();
        type_text(&mut composer, "Conexão");
        composer.handle_key(press(KeyCode::Left));
        composer.handle_key(press(KeyCode::Backspace));
        assert_eq!(composer.content(), "Conexo");

        composer.handle_key(press(KeyCode::Char('ã')));
        assert_eq!(composer.content(), "Conexão");

        composer.handle_key(press(KeyCode::Home));
        composer.handle_key(press(KeyCode::Delete));
        assert_eq!(composer.content(), "onexão");
    }

    #[test]
    fn enter_requests_submit_without_clearing() {
        let mut composer = WidgetComposer::new();
        type_text(&mut composer, "oi");
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ComposerResult::Submit);
        assert_eq!(composer.content(), "oi");
        assert_eq!(composer.take(), "oi");
        assert!(composer.is_blank());
    }

    #[test]
    fn paste_flattens_newlines() {
        let mut composer = WidgetComposer::new();
        composer.insert_str("linha 1\nlinha 2");
        assert_eq!(composer.content(), "linha 1 linha 2");
    }
}
