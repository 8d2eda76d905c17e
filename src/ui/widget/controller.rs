use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

use crate::bridge::EmbedBridge;
use crate::bridge::host::Corner;
use crate::config::WidgetConfig;
use crate::prompts::INPUT_PLACEHOLDER;
use crate::session::{ConversationSession, Rejection, SubmitOutcome, TurnOutcome};
use crate::ui::widget::composer::{ComposerResult, ComposerView, WidgetComposer};
use crate::ui::widget::history::{TranscriptScroll, TranscriptView};

const PANEL_WIDTH: u16 = 48;
const PANEL_HEIGHT: u16 = 28;
const LAUNCHER_WIDTH: u16 = 20;
const LAUNCHER_HEIGHT: u16 = 3;

/// Actions requested by the controller from the terminal loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerAction {
    None,
    Quit,
}

/// Panel visibility, mirrored to the host through the bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedState {
    pub open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub anchor: Corner,
    pub close_on_send: bool,
}

impl From<&WidgetConfig> for ControllerOptions {
    fn from(config: &WidgetConfig) -> Self {
        Self {
            anchor: config.anchor,
            close_on_send: config.close_on_send,
        }
    }
}

/// Owns the session for the widget's lifetime and drives the panel
pub struct WidgetController {
    session: ConversationSession,
    bridge: EmbedBridge,
    embed: EmbedState,
    composer: WidgetComposer,
    scroll: TranscriptScroll,
    options: ControllerOptions,
    rendered: (usize, bool),
}

impl WidgetController {
    pub fn new(session: ConversationSession, bridge: EmbedBridge, options: ControllerOptions) -> Self {
        let rendered = (session.transcript().len(), session.is_busy());
        Self {
            session,
            bridge,
            embed: EmbedState::default(),
            composer: WidgetComposer::new(),
            scroll: TranscriptScroll::default(),
            options,
            rendered,
        }
    }

    /// Tell the host the initial (collapsed) state
    pub fn mount(&mut self) {
        self.bridge.reflect(self.embed.open);
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn embed_state(&self) -> EmbedState {
        self.embed
    }

    pub fn composer(&self) -> &WidgetComposer {
        &self.composer
    }

    pub fn scroll(&self) -> TranscriptScroll {
        self.scroll
    }

    pub fn set_open(&mut self, open: bool) {
        if self.embed.open != open {
            self.embed.open = open;
            if open {
                self.scroll.scroll_to_bottom();
            }
        }
        self.bridge.reflect(self.embed.open);
    }

    pub fn toggle(&mut self) {
        self.set_open(!self.embed.open);
    }

    pub fn minimize(&mut self) {
        self.set_open(false);
    }

    /// Send the composer text. While busy the input is left untouched and
    /// nothing happens; otherwise it is cleared before the reply arrives.
    pub fn submit_input(&mut self) -> SubmitOutcome {
        if self.session.is_busy() {
            return SubmitOutcome::Rejected(Rejection::Busy);
        }
        if self.composer.is_blank() {
            return SubmitOutcome::Rejected(Rejection::BlankInput);
        }

        let text = self.composer.take();
        let outcome = self.session.submit(&text);
        if outcome.is_accepted() && self.options.close_on_send {
            self.minimize();
        }
        self.follow_transcript();
        outcome
    }

    /// Pick up a finished completion, if any
    pub fn tick(&mut self) -> Option<TurnOutcome> {
        let outcome = self.session.poll_completion();
        self.follow_transcript();
        outcome
    }

    pub async fn wait_for_reply(&mut self) -> Option<TurnOutcome> {
        let outcome = self.session.wait_for_completion().await;
        self.follow_transcript();
        outcome
    }

    fn follow_transcript(&mut self) {
        let current = (self.session.transcript().len(), self.session.is_busy());
        if current != self.rendered {
            self.rendered = current;
            if self.embed.open {
                self.scroll.scroll_to_bottom();
            }
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        if self.embed.open {
            self.composer.insert_str(text);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ControllerAction {
        if key.kind != KeyEventKind::Press {
            return ControllerAction::None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => return ControllerAction::Quit,
                KeyCode::Char('o') => self.toggle(),
                _ => {}
            }
            return ControllerAction::None;
        }

        if !self.embed.open {
            if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                self.set_open(true);
            }
            return ControllerAction::None;
        }

        match key.code {
            KeyCode::Esc => self.minimize(),
            KeyCode::PageUp => self.scroll.scroll_up(5),
            KeyCode::PageDown => self.scroll.scroll_down(5),
            _ => {
                if self.composer.handle_key(key) == ComposerResult::Submit {
                    self.submit_input();
                }
            }
        }
        ControllerAction::None
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let launcher = anchored_rect(area, self.options.anchor, LAUNCHER_WIDTH, LAUNCHER_HEIGHT, 0);
        self.render_launcher(launcher, buf);

        if self.embed.open {
            let panel = anchored_rect(
                area,
                self.options.anchor,
                PANEL_WIDTH,
                PANEL_HEIGHT,
                LAUNCHER_HEIGHT,
            );
            self.render_panel(panel, buf);
        }
    }

    fn render_launcher(&self, area: Rect, buf: &mut Buffer) {
        let label = if self.embed.open { " ✕ fechar " } else { " 🤖 IA PREVTECH " };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue));
        let inner = block.inner(area);
        block.render(area, buf);
        let line = Line::from(Span::styled(
            label,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
        buf.set_line(inner.x, inner.y, &line, inner.width);
    }

    fn render_panel(&self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(area);

        let header = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue))
            .title(Span::styled(
                " PREVTECH AI ",
                Style::default().add_modifier(Modifier::BOLD),
            ));
        let header_inner = header.inner(chunks[0]);
        header.render(chunks[0], buf);
        buf.set_line(
            header_inner.x,
            header_inner.y,
            &Line::from(Span::styled(
                "Esc minimiza · PgUp/PgDn rola",
                Style::default().fg(Color::DarkGray),
            )),
            header_inner.width,
        );

        let snapshot = self.session.snapshot();
        TranscriptView {
            snapshot: &snapshot,
            scroll: self.scroll,
        }
        .render(chunks[1], buf);

        ComposerView {
            composer: &self.composer,
            placeholder: INPUT_PLACEHOLDER,
            disabled: snapshot.is_busy,
        }
        .render(chunks[2], buf);
    }
}

/// Rect of `width`×`height` pinned to the bottom corner, `lift` rows up
fn anchored_rect(area: Rect, anchor: Corner, width: u16, height: u16, lift: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height.saturating_sub(lift));
    let x = match anchor {
        Corner::BottomRight => area.x + area.width - width,
        Corner::BottomLeft => area.x,
    };
    let y = area.y + area.height.saturating_sub(lift + height);
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ChannelHost, PostedMessage};
    use crate::error::CommunicationError;
    use crate::session::testing::ScriptedBackend;
    use std::sync::Arc;
    use tokio::sync::{Notify, mpsc};

    fn controller_with(
        backend: ScriptedBackend,
        close_on_send: bool,
    ) -> (WidgetController, mpsc::UnboundedReceiver<PostedMessage>) {
        let session = ConversationSession::with_welcome(Arc::new(backend), "Olá!");
        let (host, rx) = ChannelHost::new();
        let bridge = EmbedBridge::new("prevtech-ai", Box::new(host));
        let controller = WidgetController::new(
            session,
            bridge,
            ControllerOptions {
                anchor: Corner::BottomRight,
                close_on_send,
            },
        );
        (controller, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PostedMessage>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message.data);
        }
        out
    }

    fn type_text(controller: &mut WidgetController, text: &str) {
        for c in text.chars() {
            controller.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn mount_announces_closed_and_toggles_emit_once_each() {
        let (mut controller, mut rx) = controller_with(ScriptedBackend::default(), false);
        controller.mount();
        assert_eq!(drain(&mut rx), vec!["prevtech-ai-close"]);

        controller.toggle();
        controller.set_open(true);
        controller.toggle();
        controller.minimize();
        controller.toggle();

        assert_eq!(
            drain(&mut rx),
            vec!["prevtech-ai-open", "prevtech-ai-close", "prevtech-ai-open"]
        );
    }

    #[test]
    fn rendering_does_not_emit_messages() {
        let (mut controller, mut rx) = controller_with(ScriptedBackend::default(), false);
        controller.mount();
        controller.toggle();
        drain(&mut rx);

        let area = Rect::new(0, 0, 80, 40);
        let mut buf = Buffer::empty(area);
        for _ in 0..3 {
            controller.render(area, &mut buf);
        }
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn submit_clears_input_before_reply_arrives() {
        let gate = Arc::new(Notify::new());
        let backend = ScriptedBackend::replying([Ok("Resposta X".to_string())]).gated(gate.clone());
        let (mut controller, _rx) = controller_with(backend, false);
        controller.set_open(true);

        type_text(&mut controller, "Regras EC 103/19");
        controller.handle_key(press(KeyCode::Enter));

        assert!(controller.composer().content().is_empty());
        assert!(controller.session().is_busy());

        gate.notify_one();
        controller.wait_for_reply().await;
        let transcript = controller.session().transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[2].content(), "Resposta X");
    }

    #[tokio::test]
    async fn input_is_kept_and_ignored_while_busy() {
        let gate = Arc::new(Notify::new());
        let backend = ScriptedBackend::replying([Ok("r".to_string())]).gated(gate.clone());
        let (mut controller, _rx) = controller_with(backend, false);
        controller.set_open(true);

        type_text(&mut controller, "primeira");
        controller.handle_key(press(KeyCode::Enter));
        type_text(&mut controller, "segunda");

        assert_eq!(controller.submit_input(), SubmitOutcome::Rejected(Rejection::Busy));
        assert_eq!(controller.composer().content(), "segunda");
        assert_eq!(controller.session().transcript().len(), 2);

        gate.notify_one();
        controller.wait_for_reply().await;
    }

    #[tokio::test]
    async fn failed_turn_keeps_input_cleared_and_shows_error() {
        let backend = ScriptedBackend::replying([Err(CommunicationError::generic())]);
        let (mut controller, _rx) = controller_with(backend, false);
        controller.set_open(true);

        type_text(&mut controller, "pergunta");
        controller.handle_key(press(KeyCode::Enter));
        controller.wait_for_reply().await;

        assert!(controller.composer().content().is_empty());
        assert!(controller.session().last_error().is_some());
        assert_eq!(controller.session().transcript().len(), 2);
    }

    #[tokio::test]
    async fn close_on_send_collapses_panel() {
        let (mut controller, mut rx) = controller_with(ScriptedBackend::default(), true);
        controller.mount();
        controller.set_open(true);
        drain(&mut rx);

        type_text(&mut controller, "oi");
        controller.handle_key(press(KeyCode::Enter));

        assert!(!controller.embed_state().open);
        assert_eq!(drain(&mut rx), vec!["prevtech-ai-close"]);
        controller.wait_for_reply().await;
    }

    #[tokio::test]
    async fn panel_stays_open_after_send_by_default() {
        let (mut controller, _rx) = controller_with(ScriptedBackend::default(), false);
        controller.set_open(true);
        type_text(&mut controller, "oi");
        controller.handle_key(press(KeyCode::Enter));
        assert!(controller.embed_state().open);
        controller.wait_for_reply().await;
    }

    #[tokio::test]
    async fn new_turns_scroll_open_panel_to_bottom() {
        let (mut controller, _rx) = controller_with(ScriptedBackend::default(), false);
        controller.set_open(true);
        controller.handle_key(press(KeyCode::PageUp));
        assert!(!controller.scroll().is_at_bottom());

        type_text(&mut controller, "oi");
        controller.handle_key(press(KeyCode::Enter));
        assert!(controller.scroll().is_at_bottom());

        controller.handle_key(press(KeyCode::PageUp));
        controller.wait_for_reply().await;
        assert!(controller.scroll().is_at_bottom());
    }

    #[test]
    fn closed_panel_opens_on_enter_and_ignores_typing() {
        let (mut controller, _rx) = controller_with(ScriptedBackend::default(), false);
        type_text(&mut controller, "abc");
        assert!(controller.composer().content().is_empty());

        controller.handle_key(press(KeyCode::Enter));
        assert!(controller.embed_state().open);
        assert_eq!(controller.session().transcript().len(), 1);
    }

    #[test]
    fn ctrl_c_quits() {
        let (mut controller, _rx) = controller_with(ScriptedBackend::default(), false);
        let action = controller.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(action, ControllerAction::Quit);
    }

    #[test]
    fn anchored_rect_pins_to_chosen_corner() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(anchored_rect(area, Corner::BottomRight, 20, 10, 3), Rect::new(80, 27, 20, 10));
        assert_eq!(anchored_rect(area, Corner::BottomLeft, 20, 10, 0), Rect::new(0, 30, 20, 10));
        let tiny = Rect::new(0, 0, 10, 5);
        assert_eq!(anchored_rect(tiny, Corner::BottomRight, 20, 10, 3), Rect::new(0, 0, 10, 2));
    }
}
