//! Host page side of the embedding protocol.
//!
//! `HostContainer` is what a host listener does with the two literals: pick a
//! collapsed or expanded footprint for the fixed container holding the widget.
//! `listener_script` renders the same logic as the snippet a host page pastes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::EmbedSignal;

/// Screen corner the fixed container is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Corner {
    #[default]
    BottomRight,
    BottomLeft,
}

impl Corner {
    /// CSS property for the horizontal offset
    pub fn horizontal_property(self) -> &'static str {
        match self {
            Corner::BottomRight => "right",
            Corner::BottomLeft => "left",
        }
    }
}

/// Container size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Collapsed fits the launcher bubble and its margin; expanded fits the panel
pub const COLLAPSED_FOOTPRINT: Footprint = Footprint::new(96, 208);
pub const EXPANDED_FOOTPRINT: Footprint = Footprint::new(420, 720);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    pub anchor: Corner,
    pub collapsed: Footprint,
    pub expanded: Footprint,
}

impl Default for HostLayout {
    fn default() -> Self {
        Self {
            anchor: Corner::default(),
            collapsed: COLLAPSED_FOOTPRINT,
            expanded: EXPANDED_FOOTPRINT,
        }
    }
}

impl HostLayout {
    pub fn anchored(anchor: Corner) -> Self {
        Self {
            anchor,
            ..Self::default()
        }
    }
}

/// Fixed-position container on the host page
#[derive(Debug, Clone)]
pub struct HostContainer {
    widget_name: String,
    layout: HostLayout,
    current: Footprint,
}

impl HostContainer {
    /// Starts collapsed, like a freshly loaded widget
    pub fn new(widget_name: impl Into<String>, layout: HostLayout) -> Self {
        let current = layout.collapsed;
        Self {
            widget_name: widget_name.into(),
            layout,
            current,
        }
    }

    pub fn footprint(&self) -> Footprint {
        self.current
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    /// Apply a received message. Anything other than the widget's two
    /// literals is ignored; returns the new footprint when it applied.
    pub fn handle_message(&mut self, data: &str) -> Option<Footprint> {
        let signal = EmbedSignal::parse(&self.widget_name, data)?;
        self.current = match signal {
            EmbedSignal::Open => self.layout.expanded,
            EmbedSignal::Close => self.layout.collapsed,
        };
        Some(self.current)
    }

    /// Script a host page installs next to `<iframe id="{iframe_id}">`
    pub fn listener_script(&self, iframe_id: &str) -> String {
        let side = self.layout.anchor.horizontal_property();
        let open = EmbedSignal::Open.message(&self.widget_name);
        let close = EmbedSignal::Close.message(&self.widget_name);
        let HostLayout {
            collapsed, expanded, ..
        } = &self.layout;

        format!(
            r#"<script>
  (function () {{
    var frame = document.getElementById("{iframe_id}");
    if (!frame) return;
    frame.style.position = "fixed";
    frame.style.bottom = "0";
    frame.style.{side} = "0";
    frame.style.border = "none";
    frame.style.zIndex = "9999";
    function resize(width, height) {{
      frame.style.width = width + "px";
      frame.style.height = height + "px";
    }}
    resize({cw}, {ch});
    window.addEventListener("message", function (event) {{
      if (event.data === "{open}") resize({ew}, {eh});
      else if (event.data === "{close}") resize({cw}, {ch});
    }});
  }})();
</script>"#,
            cw = collapsed.width,
            ch = collapsed.height,
            ew = expanded.width,
            eh = expanded.height,
        )
    }
}
