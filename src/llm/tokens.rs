//! Prompt token estimation.
//!
//! `Gpt3` uses the `r50k_base` BPE (the GPT-3 vocabulary). `CharsPerToken` is
//! a cheap heuristic for tests and for running without the BPE tables.
//!
//! Prompt budgets are measured on the JSON string literal of the prompt in
//! HTML-safe form: `<`, `>`, `&`, `'`, `+`, backtick, `"` and every non-ASCII
//! char are written as `\uXXXX` (uppercase hex, UTF-16 units), so the ChatML
//! delimiters cost more than their raw text.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::{CharEscape, CompactFormatter, Formatter, Serializer};
use tiktoken_rs::CoreBPE;

use crate::llm::ProviderError;

/// Average characters per token used by the heuristic estimator.
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

#[derive(Clone)]
pub enum TokenCounter {
    Gpt3(Arc<CoreBPE>),
    CharsPerToken(usize),
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenCounter::Gpt3(_) => f.write_str("TokenCounter::Gpt3"),
            TokenCounter::CharsPerToken(n) => write!(f, "TokenCounter::CharsPerToken({n})"),
        }
    }
}

impl TokenCounter {
    /// Load the GPT-3 BPE. Building the tables is expensive; do it once.
    pub fn gpt3() -> Result<Self, ProviderError> {
        let bpe = tiktoken_rs::r50k_base().map_err(|e| ProviderError::Tokenizer(e.to_string()))?;
        Ok(TokenCounter::Gpt3(Arc::new(bpe)))
    }

    /// Resolve the `[llm] tokenizer` config value.
    pub fn from_name(name: &str) -> Result<Self, ProviderError> {
        match name {
            "gpt3" | "r50k_base" => Self::gpt3(),
            "heuristic" => Ok(TokenCounter::CharsPerToken(DEFAULT_CHARS_PER_TOKEN)),
            other => Err(ProviderError::Tokenizer(format!("unknown tokenizer: {other}"))),
        }
    }

    pub fn count(&self, text: &str) -> usize {
        match self {
            TokenCounter::Gpt3(bpe) => bpe.encode_ordinary(text).len(),
            TokenCounter::CharsPerToken(n) => text.chars().count().div_ceil((*n).max(1)),
        }
    }

    /// Count the HTML-safe JSON string literal of `text` (quotes and escapes
    /// included). Prompt budgets are measured this way.
    pub fn count_json_escaped(&self, text: &str) -> usize {
        self.count(&json_escaped(text))
    }
}

/// `text` as an HTML-safe JSON string literal, surrounding quotes included.
pub fn json_escaped(text: &str) -> String {
    let mut out = Vec::with_capacity(text.len() + 2);
    let mut ser = Serializer::with_formatter(&mut out, HtmlSafeFormatter);
    text.serialize(&mut ser).expect("serializing a str into a Vec cannot fail");
    // Every byte written is ASCII.
    String::from_utf8_lossy(&out).into_owned()
}

/// Compact JSON output with HTML-sensitive and non-ASCII chars `\u`-escaped.
struct HtmlSafeFormatter;

fn passes_unescaped(ch: char) -> bool {
    matches!(ch, ' '..='~') && !matches!(ch, '<' | '>' | '&' | '\'' | '+' | '`')
}

impl Formatter for HtmlSafeFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if passes_unescaped(ch) {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04X}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        match char_escape {
            CharEscape::Quote => writer.write_all(b"\\u0022"),
            CharEscape::AsciiControl(byte) => write!(writer, "\\u{byte:04X}"),
            other => CompactFormatter.write_char_escape(writer, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_rounds_up() {
        let c = TokenCounter::CharsPerToken(4);
        assert_eq!(c.count(""), 0);
        assert_eq!(c.count("abcd"), 1);
        assert_eq!(c.count("abcde"), 2);
    }

    #[test]
    fn zero_divisor_is_clamped() {
        assert_eq!(TokenCounter::CharsPerToken(0).count("abc"), 3);
    }

    #[test]
    fn json_escaping_is_measured() {
        let c = TokenCounter::CharsPerToken(1);
        // "a\nb" escapes to "\"a\\nb\"": 6 chars
        assert_eq!(c.count("a\nb"), 3);
        assert_eq!(c.count_json_escaped("a\nb"), 6);
    }

    #[test]
    fn delimiters_and_non_ascii_are_unicode_escaped() {
        let escaped = json_escaped("<|im_end|> café");
        assert_eq!(escaped, r#""\u003C|im_end|\u003E caf\u00E9""#);
        assert_eq!(escaped.chars().count(), 32);
        assert_eq!(TokenCounter::CharsPerToken(1).count_json_escaped("<|im_end|> café"), 32);
    }

    #[test]
    fn html_sensitive_ascii_is_escaped() {
        assert_eq!(json_escaped("a&b'c+d`e"), r#""a\u0026b\u0027c\u002Bd\u0060e""#);
        assert_eq!(json_escaped("say \"hi\""), r#""say \u0022hi\u0022""#);
    }

    #[test]
    fn controls_use_short_or_uppercase_escapes() {
        assert_eq!(json_escaped("a\tb\\c\n"), r#""a\tb\\c\n""#);
        assert_eq!(json_escaped("\u{1f}\u{7f}"), r#""\u001F\u007F""#);
    }

    #[test]
    fn astral_chars_become_surrogate_pairs() {
        assert_eq!(json_escaped("😀"), r#""\uD83D\uDE00""#);
    }

    #[test]
    fn unknown_tokenizer_errors() {
        assert!(matches!(TokenCounter::from_name("sentencepiece"), Err(ProviderError::Tokenizer(_))));
    }

    #[test]
    fn gpt3_counts_words() {
        let c = TokenCounter::gpt3().unwrap();
        assert_eq!(c.count("hello world"), 2);
        assert!(c.count_json_escaped("hello world") > c.count("hello world"));
    }
}
