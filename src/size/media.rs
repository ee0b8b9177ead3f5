//! Embedded media references in node text.
//!
//! Two forms are recognised: markdown images, `![alt](src)` with an optional
//! ` =WxH` size suffix inside the parentheses, and fenced diagram blocks
//! opened with ```` ```mermaid ````. Only the first media block of a node
//! contributes to its size; every reference is removed from the display text.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::Size;

/// Block size used when a reference carries no dimensions.
pub const DEFAULT_MEDIA_SIZE: Size = Size {
    width: 150.0,
    height: 105.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Diagram,
}

/// A media block and whatever dimensions the reference spelled out.
#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub kind: MediaKind,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl Media {
    /// Rendered block size. A single given dimension keeps the default
    /// aspect ratio; with none, `fallback` (the node's size override) or the
    /// default applies.
    pub fn resolve(&self, fallback: Option<Size>) -> Size {
        let aspect = DEFAULT_MEDIA_SIZE.height / DEFAULT_MEDIA_SIZE.width;
        match (self.width, self.height) {
            (Some(w), Some(h)) => Size::new(w, h),
            (Some(w), None) => Size::new(w, w * aspect),
            (None, Some(h)) => Size::new(h / aspect, h),
            (None, None) => fallback.unwrap_or(DEFAULT_MEDIA_SIZE),
        }
    }

    pub fn is_heavy(&self) -> bool {
        self.kind == MediaKind::Diagram
    }
}

/// Node text split into what is wrapped and the media block it embeds.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaScan {
    pub display: String,
    pub media: Option<Media>,
}

fn image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"!\[[^\]]*\]\(\s*[^)\s]*(?:\s+=\s*(\d+(?:\.\d+)?)?\s*x\s*(\d+(?:\.\d+)?)?)?\s*\)",
        )
        .unwrap_or_else(|e| panic!("invalid image pattern: {e}"))
    })
}

fn diagram_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```mermaid[^\n]*(?:\n.*?)?(?:```|\z)")
            .unwrap_or_else(|e| panic!("invalid diagram pattern: {e}"))
    })
}

fn dimension(capture: Option<regex::Match<'_>>) -> Option<f64> {
    capture
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Find the first media block in `text` and strip every reference.
pub fn scan(text: &str) -> MediaScan {
    let image = image_pattern().captures(text).map(|caps| {
        let start = caps.get(0).map_or(0, |m| m.start());
        let media = Media {
            kind: MediaKind::Image,
            width: dimension(caps.get(1)),
            height: dimension(caps.get(2)),
        };
        (start, media)
    });
    let diagram = diagram_pattern().find(text).map(|m| {
        let media = Media {
            kind: MediaKind::Diagram,
            width: None,
            height: None,
        };
        (m.start(), media)
    });

    let media = match (image, diagram) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a.1 } else { b.1 }),
        (Some((_, m)), None) | (None, Some((_, m))) => Some(m),
        (None, None) => None,
    };

    if media.is_none() {
        return MediaScan {
            display: text.to_string(),
            media: None,
        };
    }

    let without_diagrams = diagram_pattern().replace_all(text, "");
    let display = image_pattern().replace_all(&without_diagrams, "");
    MediaScan {
        display: display.trim().to_string(),
        media,
    }
}
