//! # Node Sizing
//!
//! The rendered box of a node derived from its content and the settings.
//! Nothing here is persisted: every size can be recomputed at any time, and
//! the layout cache memoizes it under a content fingerprint.
//!
//! A node's box is a text block (wrapped text plus padding, icon cluster and
//! checkbox glyph) stacked above an optional media block. Table nodes are
//! sized from their cells instead.

pub mod media;
pub mod table;

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::font::{FontSpec, MeasurementService};
use crate::model::{Node, NodeKind, WrapConfig};
use crate::text::markup::{split_prefix, strip_markup};
use crate::text::{line_height, TextLayout, WrapOptions};

const TEXT_PADDING_Y: f64 = 10.0;
const BASE_PADDING_X: f64 = 12.0;
const LONG_TEXT_PADDING_X: f64 = 13.0;
/// Display length at which the long-text padding is fully applied.
const LONG_TEXT_CHARS: f64 = 25.0;
const EDIT_MIN_WIDTH: f64 = 120.0;
const EDIT_PADDING_X: f64 = 34.0;
const ICON_WIDTH: f64 = 18.0;
const ICON_GAP: f64 = 4.0;
const CHECKBOX_EXTRA: f64 = 6.0;
const MEDIA_PADDING_X: f64 = 12.0;
const MEDIA_GAP: f64 = 6.0;
const MIN_WIDTH: f64 = 40.0;
const HEADING_WEIGHT: u32 = 700;

/// The computed box of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSize {
    pub width: f64,
    pub height: f64,
    /// Height of the media block, 0 without one.
    pub image_height: f64,
    /// Tables and diagrams, which get a fixed toggle offset.
    pub heavy: bool,
}

pub struct SizeCalculator<'a> {
    measurer: &'a MeasurementService,
    text_layout: TextLayout,
    font_family: &'a str,
}

impl<'a> SizeCalculator<'a> {
    pub fn new(measurer: &'a MeasurementService, font_family: &'a str) -> Self {
        Self {
            measurer,
            text_layout: TextLayout::new(),
            font_family,
        }
    }

    /// Size of `node`. While `is_editing`, `edit_text` (or the node text when
    /// absent) is measured raw, one line per hard break.
    pub fn size(
        &self,
        node: &Node,
        edit_text: Option<&str>,
        is_editing: bool,
        font_size: f64,
        wrap: &WrapConfig,
    ) -> NodeSize {
        let font = self.node_font(node, font_size);
        if node.kind == NodeKind::Table {
            return self.table_size(node, &font);
        }

        let (prefix, body) = split_prefix(&node.text);
        let scan = media::scan(body);
        let font = if prefix.is_heading() {
            FontSpec {
                weight: font.weight.max(HEADING_WEIGHT),
                ..font
            }
        } else {
            font
        };

        let (text_width, text_height) = if is_editing {
            let raw = edit_text.unwrap_or(&node.text);
            let mut lines = 0usize;
            let mut widest = 0.0f64;
            for line in raw.split('\n') {
                lines += 1;
                widest = widest.max(self.measurer.measure(line, &font));
            }
            (
                widest.max(EDIT_MIN_WIDTH) + EDIT_PADDING_X,
                lines.max(1) as f64 * line_height(font.size),
            )
        } else {
            let options = WrapOptions {
                font_size: font.size,
                font_family: font.family,
                font_weight: font.weight,
                font_style: font.style,
                max_width: wrap.effective_max_width(),
                prefix_tokens: prefix.marker().into_iter().collect(),
            };
            let wrapped = self.text_layout.wrap(self.measurer, &scan.display, &options);
            let len = strip_markup(&scan.display).chars().count() as f64;
            let padding = BASE_PADDING_X + (len / LONG_TEXT_CHARS).min(1.0) * LONG_TEXT_PADDING_X;
            (wrapped.max_line_width + padding, wrapped.text_height)
        };

        let icons = if node.icons.is_empty() {
            0.0
        } else {
            node.icons.len() as f64 * ICON_WIDTH + ICON_GAP
        };
        let checkbox = if prefix.has_checkbox() {
            font.size + CHECKBOX_EXTRA
        } else {
            0.0
        };

        let media_size = scan.media.as_ref().map(|m| m.resolve(node.size));
        let (media_width, image_height) = media_size
            .map(|s| (s.width + MEDIA_PADDING_X, s.height))
            .unwrap_or((0.0, 0.0));

        let width = (text_width + icons + checkbox).max(media_width).max(MIN_WIDTH);
        let mut height = text_height + TEXT_PADDING_Y;
        if media_size.is_some() {
            height += image_height + MEDIA_GAP;
        }

        NodeSize {
            width,
            height,
            image_height,
            heavy: scan.media.as_ref().is_some_and(media::Media::is_heavy),
        }
    }

    fn table_size(&self, node: &Node, font: &FontSpec<'_>) -> NodeSize {
        let size = node.size.unwrap_or_else(|| {
            let rows = table::table_rows(node);
            table::measure_table(&rows, self.measurer, font)
        });
        NodeSize {
            width: size.width,
            height: size.height,
            image_height: 0.0,
            heavy: true,
        }
    }

    fn node_font<'n>(&'n self, node: &'n Node, font_size: f64) -> FontSpec<'n> {
        let mut font = FontSpec::new(font_size, self.font_family);
        if let Some(o) = &node.font {
            if let Some(size) = o.size.filter(|s| s.is_finite() && *s > 0.0) {
                font.size = size;
            }
            if let Some(family) = o.family.as_deref() {
                font.family = family;
            }
            if let Some(weight) = o.weight {
                font.weight = weight;
            }
            if let Some(style) = o.style {
                font.style = style;
            }
        }
        font
    }
}

/// Fingerprint of everything that feeds a node's size apart from id, font
/// size and kind, which are part of the cache key themselves.
pub fn content_fingerprint(
    node: &Node,
    edit_text: Option<&str>,
    is_editing: bool,
    wrap: &WrapConfig,
    font_family: &str,
) -> u64 {
    let mut h = FxHasher::default();
    node.text.hash(&mut h);
    node.note.hash(&mut h);
    node.table.hash(&mut h);
    node.icons.hash(&mut h);
    node.size.map(|s| (s.width.to_bits(), s.height.to_bits())).hash(&mut h);
    if let Some(font) = &node.font {
        font.size.map(f64::to_bits).hash(&mut h);
        font.family.hash(&mut h);
        font.weight.hash(&mut h);
        font.style.hash(&mut h);
    }
    is_editing.hash(&mut h);
    if is_editing {
        edit_text.hash(&mut h);
    }
    wrap.enabled.hash(&mut h);
    wrap.max_width.to_bits().hash(&mut h);
    font_family.hash(&mut h);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Size;

    fn calc_size(node: &Node) -> NodeSize {
        let measurer = MeasurementService::heuristic();
        let calc = SizeCalculator::new(&measurer, "sans-serif");
        calc.size(node, None, false, 14.0, &WrapConfig::default())
    }

    #[test]
    fn short_text_gets_base_padding() {
        // "Hi": 2 units * 14 * 0.6 = 16.8, padding 12 + 2/25*13.
        let size = calc_size(&Node::new("a", "Hi"));
        let expected: f64 = 16.8 + 12.0 + (2.0 / 25.0) * 13.0;
        assert!((size.width - expected.max(MIN_WIDTH)).abs() < 1e-9);
        assert!((size.height - (line_height(14.0) + TEXT_PADDING_Y)).abs() < 1e-9);
        assert_eq!(size.image_height, 0.0);
    }

    #[test]
    fn width_never_below_minimum() {
        let size = calc_size(&Node::new("a", ""));
        assert_eq!(size.width, MIN_WIDTH);
    }

    #[test]
    fn long_text_wraps_and_grows_taller() {
        let short = calc_size(&Node::new("a", "word"));
        let long = calc_size(&Node::new("b", &"word ".repeat(30)));
        assert!(long.height > short.height);
        // Wrapped at 240 plus at most 25 px padding.
        assert!(long.width <= 240.0 + 25.0 + 1e-9);
    }

    #[test]
    fn wrap_disabled_keeps_one_line() {
        let measurer = MeasurementService::heuristic();
        let calc = SizeCalculator::new(&measurer, "sans-serif");
        let wrap = WrapConfig {
            enabled: false,
            max_width: 240.0,
        };
        let size = calc.size(&Node::new("a", &"word ".repeat(30)), None, false, 14.0, &wrap);
        assert!((size.height - (line_height(14.0) + TEXT_PADDING_Y)).abs() < 1e-9);
    }

    #[test]
    fn icons_and_checkbox_add_width() {
        let plain = calc_size(&Node::new("a", "some task text"));
        let task = calc_size(&Node::new("a", "- [ ] some task text"));
        assert!((task.width - plain.width - (14.0 + CHECKBOX_EXTRA)).abs() < 1e-9);

        let mut with_icons = Node::new("a", "some task text");
        with_icons.icons = vec!["link".to_string(), "note".to_string()];
        let iconed = calc_size(&with_icons);
        assert!((iconed.width - plain.width - (2.0 * ICON_WIDTH + ICON_GAP)).abs() < 1e-9);
    }

    #[test]
    fn heading_measures_wider_with_real_bold_face_only() {
        // The heuristic ignores weight, so the heading matches its body.
        let heading = calc_size(&Node::new("a", "# Title"));
        let body = calc_size(&Node::new("a", "Title"));
        assert!((heading.width - body.width).abs() < 1e-9);
    }

    #[test]
    fn media_block_stacks_under_text() {
        let size = calc_size(&Node::new("a", "Pic ![p](p.png =200x100)"));
        assert_eq!(size.image_height, 100.0);
        assert_eq!(size.width, 212.0);
        let text_only = calc_size(&Node::new("a", "Pic"));
        assert!((size.height - text_only.height - 106.0).abs() < 1e-9);
        assert!(!size.heavy);
    }

    #[test]
    fn diagram_is_heavy() {
        let size = calc_size(&Node::new("a", "```mermaid\ngraph TD\n```"));
        assert!(size.heavy);
        assert_eq!(size.image_height, 105.0);
    }

    #[test]
    fn editing_measures_raw_buffer_with_minimum() {
        let measurer = MeasurementService::heuristic();
        let calc = SizeCalculator::new(&measurer, "sans-serif");
        let node = Node::new("a", "x");
        let size = calc.size(&node, Some("**a**\nb"), true, 14.0, &WrapConfig::default());
        assert!((size.width - (EDIT_MIN_WIDTH + EDIT_PADDING_X)).abs() < 1e-9);
        assert!((size.height - (2.0 * line_height(14.0) + TEXT_PADDING_Y)).abs() < 1e-9);
    }

    #[test]
    fn table_override_wins() {
        let mut node = Node::new("t", "| a | b |\n| 1 | 2 |");
        node.kind = NodeKind::Table;
        let measured = calc_size(&node);
        assert!(measured.heavy);
        assert!(measured.width > MIN_WIDTH);
        node.size = Some(Size::new(500.0, 300.0));
        let overridden = calc_size(&node);
        assert_eq!((overridden.width, overridden.height), (500.0, 300.0));
    }

    #[test]
    fn node_font_size_override_applies() {
        let mut node = Node::new("a", "Hello there friend");
        let base = calc_size(&node);
        node.font = Some(crate::model::FontOverrides {
            size: Some(28.0),
            ..Default::default()
        });
        let big = calc_size(&node);
        assert!(big.width > base.width);
        assert!(big.height > base.height);
    }

    #[test]
    fn fingerprint_tracks_content_and_edit_buffer() {
        let wrap = WrapConfig::default();
        let a = Node::new("a", "one");
        let b = Node::new("a", "two");
        let fa = content_fingerprint(&a, None, false, &wrap, "sans-serif");
        assert_eq!(fa, content_fingerprint(&a, None, false, &wrap, "sans-serif"));
        assert_ne!(fa, content_fingerprint(&b, None, false, &wrap, "sans-serif"));
        assert_ne!(fa, content_fingerprint(&a, Some("one"), true, &wrap, "sans-serif"));
        assert_ne!(
            content_fingerprint(&a, Some("x"), true, &wrap, "sans-serif"),
            content_fingerprint(&a, Some("y"), true, &wrap, "sans-serif")
        );
        // Edit buffer is ignored when not editing.
        assert_eq!(fa, content_fingerprint(&a, Some("zzz"), false, &wrap, "sans-serif"));
    }
}
