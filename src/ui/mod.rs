//! Terminal rendition of the widget

pub mod widget;
