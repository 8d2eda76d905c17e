use anyhow::{Context, Result, bail};
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Interval, interval};

use crate::bridge::{DetachedHost, EmbedBridge, HostWindow, PathWriterHost};
use crate::config::{Config, WidgetConfig};
use crate::events::AppEvent;
use crate::llm::GeminiClient;
use crate::session::ConversationSession;
use crate::ui::widget::{ControllerAction, ControllerOptions, WidgetController};

const TICK_RATE: Duration = Duration::from_millis(100);

type WidgetTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Where bridge messages go: the configured file/FIFO, or nowhere.
/// Returns without waiting for a host to listen.
pub fn host_window(config: &WidgetConfig) -> Result<Box<dyn HostWindow>> {
    match &config.bridge_output {
        Some(path) => {
            let host = PathWriterHost::spawn(path.clone())
                .context("Failed to start bridge writer")?;
            Ok(Box::new(host))
        }
        None => Ok(Box::new(DetachedHost)),
    }
}

/// Session, bridge and controller for one widget lifetime
pub fn build_controller(config: &Config) -> Result<WidgetController> {
    let backend = GeminiClient::new(config).context("Widget is not operational")?;
    tracing::info!(model = backend.model(), widget = %config.widget.name, "starting widget");

    let session = ConversationSession::with_welcome(
        Arc::new(backend),
        config.widget.welcome_message.clone(),
    )
    .with_request_timeout(config.request_timeout());
    let bridge = EmbedBridge::from_config(&config.widget, host_window(&config.widget)?);

    Ok(WidgetController::new(
        session,
        bridge,
        ControllerOptions::from(&config.widget),
    ))
}

/// Run the widget until the user quits
pub async fn run(config: &Config) -> Result<()> {
    let mut controller = build_controller(config)?;
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut controller).await;
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<WidgetTerminal> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
        .context("Failed to enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")
}

fn restore_terminal(terminal: &mut WidgetTerminal) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableBracketedPaste)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// crossterm reads block, so they live on their own thread
fn spawn_input_reader() -> mpsc::UnboundedReceiver<AppEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let app_event = match event::read() {
                Ok(Event::Key(key)) => AppEvent::Key(key),
                Ok(Event::Paste(text)) => AppEvent::Paste(text),
                Ok(Event::Resize(width, height)) => AppEvent::Resize(width, height),
                Ok(_) => continue,
                Err(error) => {
                    tracing::error!(error = %error, "terminal input failed");
                    break;
                }
            };
            if tx.send(app_event).is_err() {
                break;
            }
        }
    });
    rx
}

/// Next input event, or a tick. A closed input channel means the terminal
/// can no longer be read, so the loop must end.
async fn next_event(
    events: &mut mpsc::UnboundedReceiver<AppEvent>,
    ticker: &mut Interval,
) -> Result<AppEvent> {
    tokio::select! {
        biased;
        received = events.recv() => match received {
            Some(app_event) => Ok(app_event),
            None => bail!("Terminal input closed"),
        },
        _ = ticker.tick() => Ok(AppEvent::Tick),
    }
}

async fn event_loop(terminal: &mut WidgetTerminal, controller: &mut WidgetController) -> Result<()> {
    controller.mount();
    let mut events = spawn_input_reader();
    let mut ticker = interval(TICK_RATE);

    loop {
        terminal
            .draw(|frame| {
                let area = frame.size();
                controller.render(area, frame.buffer_mut());
            })
            .context("Failed to draw widget")?;

        let app_event = next_event(&mut events, &mut ticker).await?;

        match app_event {
            AppEvent::Key(key) => {
                if controller.handle_key(key) == ControllerAction::Quit {
                    break;
                }
            }
            AppEvent::Paste(text) => controller.handle_paste(&text),
            AppEvent::Resize(width, height) => {
                tracing::debug!(width, height, "terminal resized");
            }
            AppEvent::Tick => {}
        }

        controller.tick();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::io::{BufRead, BufReader};
    use std::path::Path;

    fn temp_path(kind: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("prevtech-{kind}-{}", uuid::Uuid::new_v4()))
    }

    fn read_lines_when_written(path: &Path, count: usize) -> Vec<String> {
        for _ in 0..200 {
            if let Ok(content) = std::fs::read_to_string(path) {
                let lines: Vec<String> = content.lines().map(str::to_string).collect();
                if lines.len() >= count {
                    return lines;
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("bridge output {} never received {count} lines", path.display());
    }

    #[test]
    fn no_bridge_output_means_detached_host() {
        let host = host_window(&WidgetConfig::default()).unwrap();
        assert!(host.post_message("prevtech-ai-open", "*").is_ok());
    }

    #[test]
    fn bridge_output_file_receives_json_lines() {
        let path = temp_path("bridge");
        let config = WidgetConfig {
            bridge_output: Some(path.clone()),
            ..WidgetConfig::default()
        };

        let mut bridge = EmbedBridge::from_config(&config, host_window(&config).unwrap());
        bridge.reflect(false);
        bridge.reflect(true);

        let written = read_lines_when_written(&path, 2);
        std::fs::remove_file(&path).ok();

        assert_eq!(
            written,
            vec![
                r#"{"data":"prevtech-ai-close","targetOrigin":"*"}"#,
                r#"{"data":"prevtech-ai-open","targetOrigin":"*"}"#,
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn fifo_without_reader_does_not_block_startup_or_posting() {
        let path = temp_path("fifo");
        let status = std::process::Command::new("mkfifo").arg(&path).status().unwrap();
        assert!(status.success());

        let config = WidgetConfig {
            bridge_output: Some(path.clone()),
            ..WidgetConfig::default()
        };
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let mut bridge = EmbedBridge::from_config(&config, host_window(&config).unwrap());
            bridge.reflect(false);
            bridge.reflect(true);
            done_tx.send(()).ok();
        });
        let finished = done_rx.recv_timeout(Duration::from_secs(2));
        assert!(finished.is_ok(), "bridge blocked while no host was reading the FIFO");

        // A host that starts listening late still gets the queued messages.
        let reader = BufReader::new(std::fs::File::open(&path).unwrap());
        let lines: Vec<String> = reader.lines().take(2).map(Result::unwrap).collect();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            lines,
            vec![
                r#"{"data":"prevtech-ai-close","targetOrigin":"*"}"#,
                r#"{"data":"prevtech-ai-open","targetOrigin":"*"}"#,
            ]
        );
    }

    #[tokio::test]
    async fn closed_input_channel_ends_the_loop() {
        let (tx, mut events) = mpsc::unbounded_channel();
        let mut ticker = interval(TICK_RATE);
        drop(tx);

        let error = next_event(&mut events, &mut ticker).await.unwrap_err();
        assert_eq!(error.to_string(), "Terminal input closed");
    }

    #[tokio::test]
    async fn input_events_are_delivered_before_ticks() {
        let (tx, mut events) = mpsc::unbounded_channel();
        let mut ticker = interval(TICK_RATE);
        let key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        tx.send(AppEvent::Key(key)).unwrap();

        assert!(matches!(
            next_event(&mut events, &mut ticker).await.unwrap(),
            AppEvent::Key(received) if received == key
        ));
        assert!(matches!(
            next_event(&mut events, &mut ticker).await.unwrap(),
            AppEvent::Tick
        ));
    }
}
