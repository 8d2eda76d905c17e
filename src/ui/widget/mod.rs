//! Floating chat panel: launcher bubble, transcript and composer

pub mod composer;
pub mod controller;
pub mod history;

pub use composer::{ComposerResult, WidgetComposer};
pub use controller::{ControllerAction, ControllerOptions, EmbedState, WidgetController};
pub use history::{TranscriptScroll, TranscriptView};
