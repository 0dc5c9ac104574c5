//! Canonical card identity.
//!
//! [`CardKey`] is the normalized, deterministic identity of one unit of
//! requested card-generation work: source language, target language,
//! part of speech, and term. Two semantically identical requests always
//! normalize to the same key, which is what makes per-key job dedup and
//! subscription routing possible.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LexicastError;

/// Separator between key segments in the canonical form.
const SEGMENT_SEPARATOR: char = '|';

/// Canonical identity of one card-generation request.
///
/// The canonical form is `"{source_lang}|{target_lang}|{pos}|{term}"`,
/// e.g. `"en|es|noun|run"`. Segments are normalized on construction:
/// lowercased, diacritics folded to ASCII, punctuation stripped, and
/// whitespace collapsed. Normalization is idempotent, so a key parsed
/// from a canonical string round-trips unchanged.
///
/// Used as the dedup key in the work queue, the subscription target in
/// the connection registry, and the lookup key in the result store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardKey {
    source_lang: String,
    target_lang: String,
    pos: String,
    term: String,
}

impl CardKey {
    /// Builds a key from raw request segments, normalizing each one.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::InvalidKey`] if any segment is empty
    /// after normalization.
    pub fn new(
        source_lang: &str,
        target_lang: &str,
        pos: &str,
        term: &str,
    ) -> Result<Self, LexicastError> {
        let key = Self {
            source_lang: normalize_segment(source_lang),
            target_lang: normalize_segment(target_lang),
            pos: normalize_segment(pos),
            term: normalize_segment(term),
        };
        if key.source_lang.is_empty()
            || key.target_lang.is_empty()
            || key.pos.is_empty()
            || key.term.is_empty()
        {
            return Err(LexicastError::InvalidKey(format!(
                "empty segment in '{source_lang}|{target_lang}|{pos}|{term}'"
            )));
        }
        Ok(key)
    }

    /// Parses a canonical `"src|dst|pos|term"` string.
    ///
    /// Segments are re-normalized, so a slightly denormalized input
    /// (mixed case, stray accents) still resolves to the same key.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::InvalidKey`] if the string does not have
    /// exactly four segments or any segment normalizes to empty.
    pub fn parse(raw: &str) -> Result<Self, LexicastError> {
        let mut parts = raw.split(SEGMENT_SEPARATOR);
        let (Some(src), Some(dst), Some(pos), Some(term), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(LexicastError::InvalidKey(format!(
                "expected 4 '|'-separated segments in '{raw}'"
            )));
        };
        Self::new(src, dst, pos, term)
    }

    /// Returns the normalized source language segment.
    #[must_use]
    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    /// Returns the normalized target language segment.
    #[must_use]
    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    /// Returns the normalized part-of-speech segment.
    #[must_use]
    pub fn pos(&self) -> &str {
        &self.pos
    }

    /// Returns the normalized term segment.
    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }
}

impl fmt::Display for CardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.source_lang, self.target_lang, self.pos, self.term
        )
    }
}

impl TryFrom<String> for CardKey {
    type Error = LexicastError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<CardKey> for String {
    fn from(key: CardKey) -> Self {
        key.to_string()
    }
}

/// Normalizes one key segment: lowercase, fold diacritics, strip
/// punctuation, collapse whitespace runs, trim.
fn normalize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars().flat_map(char::to_lowercase) {
        let folded = fold_char(ch);
        for fch in folded.chars() {
            if fch.is_whitespace() {
                pending_space = true;
            } else if fch.is_alphanumeric() {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(fch);
            }
            // Punctuation and symbols are dropped.
        }
    }
    out
}

/// Folds one lowercase character to its ASCII equivalent.
///
/// Covers Latin-1 Supplement and the Latin Extended-A letters that show
/// up in the supported source languages. Characters already in ASCII,
/// and any letter outside the table, pass through unchanged.
fn fold_char(ch: char) -> std::borrow::Cow<'static, str> {
    use std::borrow::Cow;
    let folded: &'static str = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ź' | 'ż' | 'ž' => "z",
        'ý' | 'ÿ' => "y",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĺ' | 'ļ' | 'ľ' | 'ł' => "l",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ţ' | 'ť' | 'ŧ' => "t",
        'ď' | 'đ' => "d",
        'ĥ' | 'ħ' => "h",
        'ŵ' => "w",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        'þ' => "th",
        'ð' => "d",
        _ => return Cow::Owned(ch.to_string()),
    };
    Cow::Borrowed(folded)
}
