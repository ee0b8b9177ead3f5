//! Script-aware tokenization for the line wrapper.
//!
//! Latin text breaks at whitespace. CJK text has no spaces, so CJK runs are
//! cut into tokens after break-after punctuation and particles and at every
//! CJK / non-CJK boundary. Closing punctuation always sticks to the token
//! before it (it may not begin a line) and opening brackets start a new token.

use std::ops::Range;

use unicode_linebreak::{break_property, BreakClass};
use unicode_script::{Script, UnicodeScript};
use unicode_width::UnicodeWidthChar;

use super::markup::InlineStyle;

/// A character with the inline style it is measured in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyledChar {
    pub ch: char,
    pub style: InlineStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Space,
    Newline,
}

/// A token as a range of char indices into the styled text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakAfter {
    Punctuation,
    Particle,
}

/// Japanese particles a phrase may break after.
const PARTICLES: [char; 10] = ['は', 'が', 'を', 'に', 'へ', 'で', 'と', 'も', 'の', 'や'];

/// Punctuation preferred as the split point of an overlong token.
const PRIMARY_PUNCTUATION: [char; 16] = [
    '、', '。', '，', '．', '！', '？', '；', '：', ',', '.', '!', '?', ';', ':', '｡', '､',
];

pub fn is_cjk(ch: char) -> bool {
    matches!(
        ch.script(),
        Script::Han | Script::Hiragana | Script::Katakana | Script::Hangul | Script::Bopomofo
    ) || ch.width() == Some(2)
}

/// Characters that may not begin a line (closing brackets, CJK stops,
/// small kana).
pub fn is_no_line_start(ch: char) -> bool {
    matches!(ch, '”' | '’' | '»')
        || matches!(
            break_property(ch as u32),
            BreakClass::ClosePunctuation
                | BreakClass::CloseParenthesis
                | BreakClass::Exclamation
                | BreakClass::NonStarter
                | BreakClass::ConditionalJapaneseStarter
                | BreakClass::InfixSeparator
        )
}

/// Opening brackets and quotes: a break is forced right before them.
pub fn is_opening(ch: char) -> bool {
    matches!(ch, '“' | '‘' | '«') || matches!(break_property(ch as u32), BreakClass::OpenPunctuation)
}

/// CJK characters a token ends after.
pub fn is_break_after(ch: char) -> bool {
    if PARTICLES.contains(&ch) || PRIMARY_PUNCTUATION.contains(&ch) {
        return true;
    }
    is_cjk(ch)
        && matches!(
            break_property(ch as u32),
            BreakClass::ClosePunctuation | BreakClass::CloseParenthesis | BreakClass::Exclamation
        )
}

pub fn is_primary_punctuation(ch: char) -> bool {
    PRIMARY_PUNCTUATION.contains(&ch)
}

/// Split styled text into words, whitespace runs and hard breaks.
pub fn tokenize(chars: &[StyledChar]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;
    let mut pending: Option<BreakAfter> = None;
    let mut prev_cjk = false;

    let flush = |tokens: &mut Vec<Token>, start: &mut Option<usize>, end: usize| {
        if let Some(s) = start.take() {
            if s < end {
                tokens.push(Token {
                    kind: TokenKind::Word,
                    range: s..end,
                });
            }
        }
    };

    for (i, sc) in chars.iter().enumerate() {
        let ch = sc.ch;

        if ch == '\n' || ch == '\u{2028}' || ch == '\u{2029}' {
            flush(&mut tokens, &mut word_start, i);
            tokens.push(Token {
                kind: TokenKind::Newline,
                range: i..i + 1,
            });
            pending = None;
            continue;
        }

        if ch.is_whitespace() {
            flush(&mut tokens, &mut word_start, i);
            match tokens.last_mut() {
                Some(last) if last.kind == TokenKind::Space && last.range.end == i => {
                    last.range.end = i + 1;
                }
                _ => tokens.push(Token {
                    kind: TokenKind::Space,
                    range: i..i + 1,
                }),
            }
            pending = None;
            continue;
        }

        let cjk = is_cjk(ch);
        if let Some(s) = word_start {
            let sticks = is_no_line_start(ch);
            let only_openers = chars[s..i].iter().all(|c| is_opening(c.ch));
            let after_break = match pending {
                Some(BreakAfter::Punctuation) => true,
                // "です" stays whole; "で書く" breaks after the particle.
                Some(BreakAfter::Particle) => ch.script() != Script::Hiragana,
                None => false,
            };
            if !sticks && !only_openers && (after_break || is_opening(ch) || cjk != prev_cjk) {
                flush(&mut tokens, &mut word_start, i);
            }
        }
        if word_start.is_none() {
            word_start = Some(i);
        }

        pending = if !cjk {
            None
        } else if PARTICLES.contains(&ch) {
            Some(BreakAfter::Particle)
        } else if is_break_after(ch) {
            Some(BreakAfter::Punctuation)
        } else {
            None
        };
        prev_cjk = cjk;
    }

    flush(&mut tokens, &mut word_start, chars.len());
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> Vec<StyledChar> {
        text.chars()
            .map(|ch| StyledChar {
                ch,
                style: InlineStyle::default(),
            })
            .collect()
    }

    fn words(text: &str) -> Vec<String> {
        let chars = plain(text);
        tokenize(&chars)
            .into_iter()
            .map(|t| {
                let s: String = chars[t.range].iter().map(|c| c.ch).collect();
                match t.kind {
                    TokenKind::Word => s,
                    TokenKind::Space => "␣".to_string(),
                    TokenKind::Newline => "⏎".to_string(),
                }
            })
            .collect()
    }

    #[test]
    fn latin_breaks_at_whitespace_runs() {
        assert_eq!(words("hello  big world"), vec!["hello", "␣", "big", "␣", "world"]);
    }

    #[test]
    fn newline_is_hard_break() {
        assert_eq!(words("a\nb"), vec!["a", "⏎", "b"]);
    }

    #[test]
    fn cjk_flushes_after_punctuation_and_particles() {
        assert_eq!(words("これは、テストです。"), vec!["これは、", "テストです。"]);
    }

    #[test]
    fn cjk_latin_boundary_splits() {
        assert_eq!(words("Rustで書く"), vec!["Rust", "で", "書く"]);
    }

    #[test]
    fn opening_bracket_starts_new_token() {
        assert_eq!(words("見て「本」です"), vec!["見て", "「本」", "です"]);
        assert_eq!(words("call(x)"), vec!["call", "(x)"]);
    }

    #[test]
    fn closing_punctuation_sticks_to_previous() {
        assert_eq!(words("end."), vec!["end."]);
        assert_eq!(words("(テスト)"), vec!["(テスト)"]);
    }

    #[test]
    fn classification() {
        assert!(is_cjk('漢'));
        assert!(is_cjk('カ'));
        assert!(is_cjk('한'));
        assert!(!is_cjk('a'));
        assert!(is_no_line_start('、'));
        assert!(is_no_line_start('。'));
        assert!(is_no_line_start(')'));
        assert!(!is_no_line_start('a'));
        assert!(is_opening('('));
        assert!(is_opening('「'));
        assert!(is_opening('“'));
        assert!(is_primary_punctuation('、'));
        assert!(!is_primary_punctuation('x'));
    }
}
