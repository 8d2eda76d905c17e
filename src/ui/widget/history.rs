//! Transcript display of the chat panel

use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::events::{Role, Turn};
use crate::session::SessionSnapshot;

/// Scroll position, counted in lines up from the newest one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscriptScroll {
    offset_from_bottom: usize,
}

impl TranscriptScroll {
    pub fn scroll_to_bottom(&mut self) {
        self.offset_from_bottom = 0;
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset_from_bottom = self.offset_from_bottom.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset_from_bottom = self.offset_from_bottom.saturating_sub(lines);
    }

    pub fn is_at_bottom(&self) -> bool {
        self.offset_from_bottom == 0
    }

    pub fn offset_from_bottom(&self) -> usize {
        self.offset_from_bottom
    }
}

pub struct TranscriptView<'a> {
    pub snapshot: &'a SessionSnapshot,
    pub scroll: TranscriptScroll,
}

impl Widget for TranscriptView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::LEFT | Borders::RIGHT);
        let inner = block.inner(area);
        block.render(area, buf);

        let width = inner.width.saturating_sub(2) as usize;
        let mut lines: Vec<Line> = Vec::new();
        for turn in &self.snapshot.transcript {
            lines.extend(render_turn(turn, width));
            lines.push(Line::from(""));
        }

        if self.snapshot.is_busy {
            lines.push(Line::from(Span::styled(
                "  🤖 digitando…",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        if let Some(error) = &self.snapshot.last_error {
            for text in wrap_text(error, width) {
                lines.push(Line::from(Span::styled(
                    format!("  ⚠ {text}"),
                    Style::default().fg(Color::Red),
                )));
            }
        }

        let height = inner.height as usize;
        let max_offset = lines.len().saturating_sub(height);
        let offset = self.scroll.offset_from_bottom().min(max_offset);
        let end = lines.len() - offset;
        let start = end.saturating_sub(height);

        for (row, line) in lines[start..end].iter().enumerate() {
            buf.set_line(inner.x, inner.y + row as u16, line, inner.width);
        }
    }
}

fn render_turn(turn: &Turn, width: usize) -> Vec<Line<'static>> {
    let (icon, style) = match turn.role() {
        Role::User => ("👤", Style::default().fg(Color::Cyan)),
        Role::Assistant => ("🤖", Style::default().fg(Color::White)),
    };
    let time = turn.timestamp().with_timezone(&Local).format("%H:%M").to_string();

    let mut lines = vec![Line::from(vec![
        Span::raw(format!("{icon} ")),
        Span::styled(time, Style::default().fg(Color::DarkGray)),
    ])];
    for text in wrap_text(turn.content(), width) {
        lines.push(Line::from(vec![Span::raw("  "), Span::styled(text, style)]));
    }
    lines
}

/// Word wrap that keeps explicit line breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + word_len + 1 > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width_and_paragraphs() {
        let wrapped = wrap_text("um dois três quatro\ncinco", 9);
        assert_eq!(wrapped, vec!["um dois", "três", "quatro", "cinco"]);
    }

    #[test]
    fn scroll_never_goes_below_bottom() {
        let mut scroll = TranscriptScroll::default();
        scroll.scroll_up(3);
        scroll.scroll_down(10);
        assert!(scroll.is_at_bottom());
    }

    #[test]
    fn renders_latest_lines_when_at_bottom() {
        let snapshot = SessionSnapshot {
            transcript: vec![Turn::welcome("primeira"), Turn::user("última pergunta")],
            is_busy: true,
            last_error: None,
        };
        let area = Rect::new(0, 0, 40, 3);
        let mut buf = Buffer::empty(area);
        TranscriptView {
            snapshot: &snapshot,
            scroll: TranscriptScroll::default(),
        }
        .render(area, &mut buf);

        let bottom: String = (0..area.width)
            .map(|x| buf.get(x, 2).symbol().to_string())
            .collect();
        assert!(bottom.contains("digitando"));
    }
}
