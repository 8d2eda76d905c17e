//! Outbound signalling between the widget and the page hosting it.
//!
//! The widget never touches host layout. It only posts one of two literal
//! strings, `"<name>-open"` or `"<name>-close"`, whenever its panel changes
//! state; the host resizes its own container in response.

pub mod host;

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::config::WidgetConfig;

/// Target origin meaning "any receiver"
pub const ANY_ORIGIN: &str = "*";

/// The two signals of the embedding protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedSignal {
    Open,
    Close,
}

impl EmbedSignal {
    pub fn from_open(open: bool) -> Self {
        if open {
            EmbedSignal::Open
        } else {
            EmbedSignal::Close
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            EmbedSignal::Open => "-open",
            EmbedSignal::Close => "-close",
        }
    }

    /// Wire literal for `widget_name`
    pub fn message(self, widget_name: &str) -> String {
        format!("{widget_name}{}", self.suffix())
    }

    /// Exact, case-sensitive match against the two literals
    pub fn parse(widget_name: &str, payload: &str) -> Option<Self> {
        let rest = payload.strip_prefix(widget_name)?;
        [EmbedSignal::Open, EmbedSignal::Close]
            .into_iter()
            .find(|signal| rest == signal.suffix())
    }
}

/// Parent browsing context of the widget
pub trait HostWindow: Send {
    fn post_message(&self, message: &str, target_origin: &str) -> io::Result<()>;
}

/// A message as the host receives it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedMessage {
    pub data: String,
    #[serde(rename = "targetOrigin")]
    pub target_origin: String,
}

/// Delivers messages over an in-process channel
pub struct ChannelHost {
    tx: mpsc::UnboundedSender<PostedMessage>,
}

impl ChannelHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PostedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl HostWindow for ChannelHost {
    fn post_message(&self, message: &str, target_origin: &str) -> io::Result<()> {
        self.tx
            .send(PostedMessage {
                data: message.to_string(),
                target_origin: target_origin.to_string(),
            })
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "host receiver dropped"))
    }
}

/// Writes one JSON object per line, e.g. to a FIFO read by the host process
pub struct LineWriterHost<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> LineWriterHost<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> HostWindow for LineWriterHost<W> {
    fn post_message(&self, message: &str, target_origin: &str) -> io::Result<()> {
        let line = serde_json::to_string(&PostedMessage {
            data: message.to_string(),
            target_origin: target_origin.to_string(),
        })?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "host writer poisoned"))?;
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

/// JSON lines appended to a file or FIFO by a background writer.
///
/// Opening a FIFO blocks until the host starts reading, and a full pipe
/// blocks writes, so both happen off the caller's thread. Posting only queues.
pub struct PathWriterHost {
    tx: mpsc::UnboundedSender<PostedMessage>,
}

impl PathWriterHost {
    pub fn spawn(path: PathBuf) -> io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PostedMessage>();
        std::thread::Builder::new()
            .name("bridge-writer".to_string())
            .spawn(move || {
                let file = match OpenOptions::new().create(true).append(true).open(&path) {
                    Ok(file) => file,
                    Err(error) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %error,
                            "bridge output unavailable, embed messages will be dropped"
                        );
                        return;
                    }
                };
                tracing::debug!(path = %path.display(), "bridge output opened");

                let writer = LineWriterHost::new(file);
                while let Some(message) = rx.blocking_recv() {
                    if let Err(error) = writer.post_message(&message.data, &message.target_origin) {
                        tracing::warn!(
                            data = %message.data,
                            error = %error,
                            "failed to write embed message"
                        );
                    }
                }
            })?;
        Ok(Self { tx })
    }
}

impl HostWindow for PathWriterHost {
    fn post_message(&self, message: &str, target_origin: &str) -> io::Result<()> {
        self.tx
            .send(PostedMessage {
                data: message.to_string(),
                target_origin: target_origin.to_string(),
            })
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "bridge writer stopped"))
    }
}

/// No parent context; the widget runs standalone
pub struct DetachedHost;

impl HostWindow for DetachedHost {
    fn post_message(&self, message: &str, _target_origin: &str) -> io::Result<()> {
        tracing::debug!(data = message, "no host attached, dropping embed message");
        Ok(())
    }
}

/// Mirrors the panel's open state to the host, once per transition
pub struct EmbedBridge {
    widget_name: String,
    target_origins: Vec<String>,
    host: Box<dyn HostWindow>,
    last_posted: Option<bool>,
}

impl EmbedBridge {
    pub fn new(widget_name: impl Into<String>, host: Box<dyn HostWindow>) -> Self {
        Self {
            widget_name: widget_name.into(),
            target_origins: vec![ANY_ORIGIN.to_string()],
            host,
            last_posted: None,
        }
    }

    pub fn from_config(config: &WidgetConfig, host: Box<dyn HostWindow>) -> Self {
        Self::new(config.name.clone(), host).with_trusted_origins(config.trusted_origins.clone())
    }

    /// Restrict delivery to these origins. Empty, or containing `"*"`, means any.
    pub fn with_trusted_origins(mut self, origins: Vec<String>) -> Self {
        let origins: Vec<String> = origins
            .into_iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        self.target_origins = if origins.is_empty() || origins.iter().any(|o| o == ANY_ORIGIN) {
            vec![ANY_ORIGIN.to_string()]
        } else {
            origins
        };
        self
    }

    pub fn widget_name(&self) -> &str {
        &self.widget_name
    }

    pub fn target_origins(&self) -> &[String] {
        &self.target_origins
    }

    /// Post the signal for `open` unless the host already has it.
    ///
    /// Returns whether anything was posted. Delivery failures are logged and
    /// dropped; there is no acknowledgement and no retry.
    pub fn reflect(&mut self, open: bool) -> bool {
        if self.last_posted == Some(open) {
            return false;
        }
        self.last_posted = Some(open);

        let message = EmbedSignal::from_open(open).message(&self.widget_name);
        for origin in &self.target_origins {
            match self.host.post_message(&message, origin) {
                Ok(()) => tracing::debug!(data = %message, target_origin = %origin, "posted embed message"),
                Err(error) => tracing::warn!(
                    data = %message,
                    target_origin = %origin,
                    error = %error,
                    "failed to post embed message"
                ),
            }
        }
        true
    }
}
