//! Inline emphasis and structural prefixes of node text.
//!
//! # Inline emphasis
//! - `**bold**` / `__bold__`
//! - `*italic*` / `_italic_` (underscores only at word boundaries)
//! - `~~strikethrough~~`
//!
//! Styles nest (`***both***`, `**bold *and italic***`). A delimiter without a
//! matching closer is literal text, and `\*`, `\_`, `\~`, `\\` escape.
//!
//! # Structural prefixes
//! Headings (`# ` to `###### `), bullets (`- `, `* `, `+ `), ordered items
//! (`1. `) and task checkboxes (`- [ ] `, `- [x] `, `[ ] `).

/// Emphasis flags active on a run of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InlineStyle {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Bold,
    Italic,
    Strike,
}

impl InlineStyle {
    fn with(self, emphasis: Emphasis) -> Self {
        match emphasis {
            Emphasis::Bold => Self { bold: true, ..self },
            Emphasis::Italic => Self {
                italic: true,
                ..self
            },
            Emphasis::Strike => Self {
                strike: true,
                ..self
            },
        }
    }
}

/// A run of text sharing one inline style.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledSegment {
    pub text: String,
    pub style: InlineStyle,
}

const DELIMITERS: [(&str, Emphasis); 5] = [
    ("**", Emphasis::Bold),
    ("__", Emphasis::Bold),
    ("~~", Emphasis::Strike),
    ("*", Emphasis::Italic),
    ("_", Emphasis::Italic),
];

fn is_markup_char(ch: char) -> bool {
    matches!(ch, '*' | '_' | '~' | '\\')
}

/// Parse inline emphasis into styled segments. Adjacent segments never share
/// a style.
pub fn parse_inline(text: &str) -> Vec<StyledSegment> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    parse_into(&chars, InlineStyle::default(), &mut out);
    out
}

/// The text with every emphasis delimiter and escape removed.
pub fn strip_markup(text: &str) -> String {
    parse_inline(text).into_iter().map(|s| s.text).collect()
}

fn parse_into(chars: &[char], style: InlineStyle, out: &mut Vec<StyledSegment>) {
    let mut buf = String::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '\\' && i + 1 < chars.len() && is_markup_char(chars[i + 1]) {
            buf.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if let Some((delim, emphasis)) = opening_at(chars, i) {
            let len = delim.chars().count();
            if let Some(close) = find_close(chars, i + len, delim) {
                push_segment(out, std::mem::take(&mut buf), style);
                parse_into(&chars[i + len..close], style.with(emphasis), out);
                i = close + len;
                continue;
            }
        }
        buf.push(ch);
        i += 1;
    }
    push_segment(out, buf, style);
}

fn push_segment(out: &mut Vec<StyledSegment>, text: String, style: InlineStyle) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(last) if last.style == style => last.text.push_str(&text),
        _ => out.push(StyledSegment { text, style }),
    }
}

fn starts_with(chars: &[char], at: usize, delim: &str) -> bool {
    let mut idx = at;
    for d in delim.chars() {
        if chars.get(idx) != Some(&d) {
            return false;
        }
        idx += 1;
    }
    true
}

fn opening_at(chars: &[char], i: usize) -> Option<(&'static str, Emphasis)> {
    for (delim, emphasis) in DELIMITERS {
        if !starts_with(chars, i, delim) {
            continue;
        }
        let after = i + delim.chars().count();
        match chars.get(after) {
            Some(next) if !next.is_whitespace() => {}
            _ => continue,
        }
        if delim.starts_with('_') && i > 0 && chars[i - 1].is_alphanumeric() {
            continue;
        }
        return Some((delim, emphasis));
    }
    None
}

/// Index of the closing delimiter for content starting at `start`, taken at
/// the end of a delimiter run so `***x***` closes bold around `*x*`.
fn find_close(chars: &[char], start: usize, delim: &str) -> Option<usize> {
    let d = delim.chars().next()?;
    let len = delim.chars().count();
    let mut j = start + 1;
    while j < chars.len() {
        if chars[j] == '\\' {
            j += 2;
            continue;
        }
        if chars[j] != d {
            j += 1;
            continue;
        }
        let mut run_end = j;
        while run_end < chars.len() && chars[run_end] == d {
            run_end += 1;
        }
        let run = run_end - j;
        let closes = if len == 1 { run % 2 == 1 } else { run >= len };
        let after_ok = !(d == '_' && chars.get(run_end).is_some_and(|c| c.is_alphanumeric()));
        if closes && !chars[j - 1].is_whitespace() && after_ok {
            return Some(run_end - len);
        }
        j = run_end;
    }
    None
}

/// Block-level marker at the start of a node's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPrefix {
    None,
    Heading(u8),
    Bullet,
    Ordered(u32),
    Task { checked: bool },
}

impl BlockPrefix {
    /// The zero-width marker token the wrapper places at the head of the
    /// first line. Task items render a checkbox glyph instead.
    pub fn marker(self) -> Option<String> {
        match self {
            BlockPrefix::None | BlockPrefix::Task { .. } => None,
            BlockPrefix::Heading(level) => Some("#".repeat(level as usize)),
            BlockPrefix::Bullet => Some("\u{2022}".to_string()),
            BlockPrefix::Ordered(n) => Some(format!("{}.", n)),
        }
    }

    pub fn has_checkbox(self) -> bool {
        matches!(self, BlockPrefix::Task { .. })
    }

    pub fn is_heading(self) -> bool {
        matches!(self, BlockPrefix::Heading(_))
    }
}

/// Split a structural prefix off `text`.
pub fn split_prefix(text: &str) -> (BlockPrefix, &str) {
    let trimmed = text.trim_start_matches([' ', '\t']);

    if let Some(rest) = task_body(trimmed) {
        return rest;
    }

    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) {
        if let Some(body) = trimmed[hashes..].strip_prefix(' ') {
            return (BlockPrefix::Heading(hashes as u8), body.trim_start());
        }
    }

    for bullet in ["- ", "* ", "+ "] {
        if let Some(body) = trimmed.strip_prefix(bullet) {
            return (BlockPrefix::Bullet, body.trim_start());
        }
    }

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && digits <= 9 {
        if let Some(body) = trimmed[digits..].strip_prefix(". ") {
            let n = trimmed[..digits].parse().unwrap_or(1);
            return (BlockPrefix::Ordered(n), body.trim_start());
        }
    }

    (BlockPrefix::None, text)
}

fn task_body(text: &str) -> Option<(BlockPrefix, &str)> {
    let rest = ["- ", "* ", "+ "]
        .iter()
        .find_map(|b| text.strip_prefix(b))
        .unwrap_or(text);
    let (checked, body) = if let Some(body) = rest.strip_prefix("[ ] ") {
        (false, body)
    } else if let Some(body) = rest
        .strip_prefix("[x] ")
        .or_else(|| rest.strip_prefix("[X] "))
    {
        (true, body)
    } else {
        return None;
    };
    Some((BlockPrefix::Task { checked }, body.trim_start()))
}
