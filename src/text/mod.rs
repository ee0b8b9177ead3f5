//! # Text Layout
//!
//! Line wrapping for node text: inline markup is parsed into styled runs,
//! the runs are tokenized with script-aware break rules, and tokens are
//! packed greedily into lines no wider than the requested maximum.
//!
//! Widths come from the [`MeasurementService`], one call per styled run, so
//! bold and italic spans are measured in their own faces.

pub mod breaking;
pub mod markup;

use std::ops::Range;

use crate::font::{FontSpec, MeasurementService};
use crate::model::FontStyle;
use breaking::{is_no_line_start, is_primary_punctuation, tokenize, StyledChar, TokenKind};
use markup::{parse_inline, InlineStyle, StyledSegment};

/// How far back an overlong token is scanned for a punctuation split point.
const PUNCTUATION_LOOKBACK: usize = 10;

/// Slack for accumulated float error when testing whether a token fits.
const FIT_EPSILON: f64 = 1e-6;

/// Line height for a font size: `max(fontSize * 1.35, fontSize + 6)`.
pub fn line_height(font_size: f64) -> f64 {
    (font_size * 1.35).max(font_size + 6.0)
}

/// Font and width constraints for one wrap call.
#[derive(Debug, Clone)]
pub struct WrapOptions<'a> {
    pub font_size: f64,
    pub font_family: &'a str,
    pub font_weight: u32,
    pub font_style: FontStyle,
    /// Lines are packed to this width; non-finite or non-positive disables
    /// wrapping.
    pub max_width: f64,
    /// Zero-width marker tokens (list bullets, heading markers) placed at the
    /// head of the first line.
    pub prefix_tokens: Vec<String>,
}

impl<'a> WrapOptions<'a> {
    pub fn new(font_size: f64, font_family: &'a str, max_width: f64) -> Self {
        Self {
            font_size,
            font_family,
            font_weight: 400,
            font_style: FontStyle::Normal,
            max_width,
            prefix_tokens: Vec::new(),
        }
    }

    fn base_font(&self) -> FontSpec<'a> {
        FontSpec {
            size: self.font_size,
            family: self.font_family,
            weight: self.font_weight,
            style: self.font_style,
        }
    }

    fn font_for(&self, style: InlineStyle) -> FontSpec<'a> {
        let mut font = self.base_font();
        if style.bold {
            font = font.bold();
        }
        if style.italic {
            font = font.italic();
        }
        font
    }

    fn limit(&self) -> f64 {
        if self.max_width.is_finite() && self.max_width > 0.0 {
            self.max_width
        } else {
            f64::INFINITY
        }
    }
}

/// One finished line.
#[derive(Debug, Clone, PartialEq)]
pub struct WrappedLine {
    /// Plain text of the line, trailing whitespace trimmed.
    pub text: String,
    pub width: f64,
    /// The line's text split into styled runs.
    pub runs: Vec<StyledSegment>,
    /// Marker tokens at the head of the line (first line only).
    pub markers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrappedText {
    pub lines: Vec<WrappedLine>,
    pub max_line_width: f64,
    pub line_height: f64,
    pub text_height: f64,
}

/// A line under construction: char ranges in order plus the running width.
#[derive(Debug, Default)]
struct LineBuilder {
    pieces: Vec<Range<usize>>,
    width: f64,
    has_word: bool,
    /// True for the first line and lines after a hard break, whose leading
    /// whitespace is kept.
    keeps_leading_space: bool,
    markers: Vec<String>,
}

impl LineBuilder {
    fn new(keeps_leading_space: bool, markers: Vec<String>) -> Self {
        Self {
            keeps_leading_space,
            markers,
            ..Self::default()
        }
    }

    fn push(&mut self, range: Range<usize>, width: f64, is_word: bool) {
        self.pieces.push(range);
        self.width += width;
        self.has_word |= is_word;
    }
}

pub struct TextLayout;

impl Default for TextLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayout {
    pub fn new() -> Self {
        Self
    }

    /// Break `text` into lines that fit within `options.max_width`.
    ///
    /// Tokens are packed greedily. A token wider than a whole line is split,
    /// preferably right after punctuation near the limit, never leaving a
    /// closing mark at the head of a line. A single character wider than the
    /// limit is unsplittable and gets a line to itself.
    pub fn wrap(
        &self,
        measurer: &MeasurementService,
        text: &str,
        options: &WrapOptions<'_>,
    ) -> WrappedText {
        let chars: Vec<StyledChar> = parse_inline(text)
            .into_iter()
            .flat_map(|seg| {
                let style = seg.style;
                seg.text
                    .chars()
                    .map(move |ch| StyledChar { ch, style })
                    .collect::<Vec<_>>()
            })
            .collect();

        let max_width = options.limit();
        let mut lines = Vec::new();
        let mut line = LineBuilder::new(true, options.prefix_tokens.clone());

        for token in tokenize(&chars) {
            match token.kind {
                TokenKind::Newline => {
                    let done = std::mem::replace(&mut line, LineBuilder::new(true, Vec::new()));
                    lines.push(self.finish_line(measurer, &chars, done, options));
                }
                TokenKind::Space => {
                    if line.has_word || line.keeps_leading_space {
                        let w = self.measure_range(measurer, &chars, token.range.clone(), options);
                        line.push(token.range, w, false);
                    }
                }
                TokenKind::Word => {
                    let w = self.measure_range(measurer, &chars, token.range.clone(), options);
                    if line.width + w <= max_width + FIT_EPSILON {
                        line.push(token.range, w, true);
                        continue;
                    }
                    if line.has_word {
                        let done =
                            std::mem::replace(&mut line, LineBuilder::new(false, Vec::new()));
                        lines.push(self.finish_line(measurer, &chars, done, options));
                        if w <= max_width + FIT_EPSILON {
                            line.push(token.range, w, true);
                            continue;
                        }
                    } else if !line.pieces.is_empty() {
                        // Leading indent only: drop it rather than split the word.
                        line.pieces.clear();
                        line.width = 0.0;
                        if w <= max_width + FIT_EPSILON {
                            line.push(token.range, w, true);
                            continue;
                        }
                    }
                    self.split_long_token(
                        measurer, &chars, token.range, options, &mut line, &mut lines,
                    );
                }
            }
        }
        lines.push(self.finish_line(measurer, &chars, line, options));

        let line_height = line_height(options.font_size);
        let max_line_width = lines.iter().map(|l| l.width).fold(0.0, f64::max);
        let text_height = line_height.max(lines.len() as f64 * line_height);

        WrappedText {
            lines,
            max_line_width,
            line_height,
            text_height,
        }
    }

    /// Place a token that does not fit on the current line, cutting it into
    /// line-sized pieces. The last piece stays on the open line.
    fn split_long_token(
        &self,
        measurer: &MeasurementService,
        chars: &[StyledChar],
        range: Range<usize>,
        options: &WrapOptions<'_>,
        line: &mut LineBuilder,
        lines: &mut Vec<WrappedLine>,
    ) {
        let max_width = options.limit();
        let mut start = range.start;
        let end = range.end;

        while start < end {
            let rest = self.measure_range(measurer, chars, start..end, options);
            if line.width + rest <= max_width + FIT_EPSILON {
                line.push(start..end, rest, true);
                return;
            }

            let available = max_width - line.width;
            let fit = self.fitting_prefix(measurer, chars, start..end, available, options);
            let cut = if fit == 0 {
                if line.has_word {
                    let done = std::mem::replace(line, LineBuilder::new(false, Vec::new()));
                    lines.push(self.finish_line(measurer, chars, done, options));
                    continue;
                }
                1
            } else {
                self.choose_cut(chars, start, fit, end)
            };

            let piece = start..start + cut;
            let w = self.measure_range(measurer, chars, piece.clone(), options);
            line.push(piece, w, true);
            start += cut;
            if start < end {
                let done = std::mem::replace(line, LineBuilder::new(false, Vec::new()));
                lines.push(self.finish_line(measurer, chars, done, options));
            }
        }
    }

    /// Number of chars from `range.start` that fit in `available`.
    fn fitting_prefix(
        &self,
        measurer: &MeasurementService,
        chars: &[StyledChar],
        range: Range<usize>,
        available: f64,
        options: &WrapOptions<'_>,
    ) -> usize {
        let mut fit = 0;
        for end in range.start + 1..=range.end {
            let w = self.measure_range(measurer, chars, range.start..end, options);
            if w > available + FIT_EPSILON {
                break;
            }
            fit = end - range.start;
        }
        fit
    }

    /// Pick where to cut an overlong token given that `fit` chars fit: right
    /// after a primary punctuation mark within the lookback window, else at
    /// the limit moved back so no closing mark starts the next line.
    fn choose_cut(&self, chars: &[StyledChar], start: usize, fit: usize, end: usize) -> usize {
        let limit = start + fit;
        let floor = limit.saturating_sub(PUNCTUATION_LOOKBACK).max(start);
        for j in (floor..limit).rev() {
            if is_primary_punctuation(chars[j].ch) && j + 1 < end {
                return j + 1 - start;
            }
        }

        let mut cut = fit;
        while cut > 1 && start + cut < end && is_no_line_start(chars[start + cut].ch) {
            cut -= 1;
        }
        cut
    }

    /// Width of a char range, measured one styled run at a time.
    fn measure_range(
        &self,
        measurer: &MeasurementService,
        chars: &[StyledChar],
        range: Range<usize>,
        options: &WrapOptions<'_>,
    ) -> f64 {
        runs_of(chars, range.collect::<Vec<_>>().as_slice())
            .iter()
            .map(|run| measurer.measure(&run.text, &options.font_for(run.style)))
            .sum()
    }

    fn finish_line(
        &self,
        measurer: &MeasurementService,
        chars: &[StyledChar],
        line: LineBuilder,
        options: &WrapOptions<'_>,
    ) -> WrappedLine {
        let mut indices: Vec<usize> = line.pieces.into_iter().flatten().collect();
        while let Some(&last) = indices.last() {
            if chars[last].ch.is_whitespace() {
                indices.pop();
            } else {
                break;
            }
        }

        let runs = runs_of(chars, &indices);
        let width = runs
            .iter()
            .map(|run| measurer.measure(&run.text, &options.font_for(run.style)))
            .sum();
        let text = runs.iter().map(|r| r.text.as_str()).collect();

        WrappedLine {
            text,
            width,
            runs,
            markers: line.markers,
        }
    }
}

/// Group chars at `indices` into maximal same-style runs.
fn runs_of(chars: &[StyledChar], indices: &[usize]) -> Vec<StyledSegment> {
    let mut runs: Vec<StyledSegment> = Vec::new();
    for &i in indices {
        let sc = chars[i];
        match runs.last_mut() {
            Some(run) if run.style == sc.style => run.text.push(sc.ch),
            _ => runs.push(StyledSegment {
                text: sc.ch.to_string(),
                style: sc.style,
            }),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(text: &str, max_width: f64) -> WrappedText {
        let measurer = MeasurementService::heuristic();
        TextLayout::new().wrap(&measurer, text, &WrapOptions::new(14.0, "sans-serif", max_width))
    }

    fn texts(w: &WrappedText) -> Vec<&str> {
        w.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_line_height_formula() {
        assert!((line_height(14.0) - 20.0).abs() < 1e-9);
        assert!((line_height(40.0) - 54.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_is_one_line() {
        let w = wrap("", 100.0);
        assert_eq!(w.lines.len(), 1);
        assert_eq!(w.max_line_width, 0.0);
        assert_eq!(w.text_height, w.line_height);
    }

    #[test]
    fn test_short_text_single_line() {
        let w = wrap("Hello", 200.0);
        assert_eq!(texts(&w), vec!["Hello"]);
        // 5 units * 14 * 0.6
        assert!((w.max_line_width - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_greedy_word_wrap_trims_trailing_space() {
        // Each char is 8.4 px; "hello world" = 11 chars = 92.4 px.
        let w = wrap("hello world again", 60.0);
        assert_eq!(texts(&w), vec!["hello", "world", "again"]);
        for line in &w.lines {
            assert!(!line.text.ends_with(' '));
            assert!(line.width <= 60.0 + 1e-6);
        }
        assert!((w.text_height - 3.0 * w.line_height).abs() < 1e-9);
    }

    #[test]
    fn test_words_pack_together_when_they_fit() {
        let w = wrap("a b c d", 40.0);
        // "a b c" = 5 units = 42 px > 40, so "a b" then "c d".
        assert_eq!(texts(&w), vec!["a b", "c d"]);
    }

    #[test]
    fn test_explicit_newline_is_hard_break() {
        let w = wrap("one\ntwo", 1000.0);
        assert_eq!(texts(&w), vec!["one", "two"]);
    }

    #[test]
    fn test_long_word_split_at_limit() {
        let w = wrap("abcdefghij", 42.0);
        // 5 chars per line at 8.4 px each.
        assert_eq!(texts(&w), vec!["abcde", "fghij"]);
    }

    #[test]
    fn test_long_token_prefers_punctuation() {
        // 12 chars fit in 100.8; the comma at index 4 is within lookback.
        let w = wrap("abcd,efghijklmnop", 100.8);
        assert_eq!(texts(&w)[0], "abcd,");
    }

    #[test]
    fn test_cjk_comma_stays_with_previous_char() {
        let w = wrap("これは、テストです。", 60.0);
        for line in &w.lines {
            assert!(!line.text.starts_with('、'), "lines: {:?}", texts(&w));
            assert!(!line.text.starts_with('。'), "lines: {:?}", texts(&w));
        }
        let joined: String = texts(&w).concat();
        assert_eq!(joined, "これは、テストです。");
        assert!(texts(&w).iter().any(|l| l.contains("は、")));
    }

    #[test]
    fn test_single_wide_char_exceeding_limit_gets_own_line() {
        let w = wrap("漢字", 10.0);
        assert_eq!(texts(&w), vec!["漢", "字"]);
        assert!(w.lines.iter().all(|l| l.width > 10.0));
    }

    #[test]
    fn test_markup_is_stripped_and_bold_runs_kept() {
        let w = wrap("a **bold** word", 1000.0);
        assert_eq!(texts(&w), vec!["a bold word"]);
        let runs = &w.lines[0].runs;
        assert_eq!(runs.len(), 3);
        assert!(runs[1].style.bold);
        assert_eq!(runs[1].text, "bold");
    }

    #[test]
    fn test_prefix_markers_are_zero_width_and_never_wrap() {
        let measurer = MeasurementService::heuristic();
        let mut opts = WrapOptions::new(14.0, "sans-serif", 42.0);
        opts.prefix_tokens = vec!["\u{2022}".to_string()];
        let w = TextLayout::new().wrap(&measurer, "abcde", &opts);
        assert_eq!(w.lines.len(), 1);
        assert_eq!(w.lines[0].markers, vec!["\u{2022}".to_string()]);
        assert!((w.lines[0].width - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_unbounded_width_never_wraps() {
        let w = wrap("many words that would normally wrap around", f64::INFINITY);
        assert_eq!(w.lines.len(), 1);
        let w = wrap("many words", 0.0);
        assert_eq!(w.lines.len(), 1);
    }

    #[test]
    fn test_soft_wrapped_line_drops_leading_space() {
        let w = wrap("aaaa   bbbb", 40.0);
        assert_eq!(texts(&w), vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn test_leading_indent_dropped_when_word_would_overflow() {
        let w = wrap("          ab", 20.0);
        assert_eq!(texts(&w), vec!["ab"]);
        assert!((w.max_line_width - 16.8).abs() < 1e-9);

        let w = wrap("  ab", 100.0);
        assert_eq!(texts(&w), vec!["  ab"]);
    }

    #[test]
    fn test_leading_indent_before_overlong_word_is_not_glued_on() {
        let w = wrap("    abcdefghij", 42.0);
        assert_eq!(texts(&w), vec!["abcde", "fghij"]);
        assert!(w.lines.iter().all(|l| l.width <= 42.0 + 1e-6));
    }

    #[test]
    fn test_hard_break_keeps_indent() {
        let w = wrap("a\n  b", 1000.0);
        assert_eq!(texts(&w), vec!["a", "  b"]);
    }
}
