//! Decoder for the `eval(function(p,a,c,k,e,d){...}(...))` packer that kwik
//! wraps its player setup in.
//!
//! The packed script is never run. Its call arguments are parsed and the
//! packer's word substitution is replayed: every identifier-like token in the
//! payload is a base-`a` index into the keyword list.

use std::{collections::HashMap, sync::LazyLock};

use color_eyre::eyre::{bail, eyre, Result};
use regex::{Captures, Regex};

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)eval(\(function.*?)</script>").unwrap());
static ARGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\}\s*\(\s*'(?P<payload>(?:[^'\\]|\\.)*)'\s*,\s*(?P<radix>\d+)\s*,\s*(?P<count>\d+)\s*,\s*'(?P<words>(?:[^'\\]|\\.)*)'\s*\.split\(\s*'(?P<sep>(?:[^'\\]|\\.)*)'\s*\)",
    )
    .unwrap()
});
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9A-Za-z_]+").unwrap());
static MANIFEST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https.*?m3u8").unwrap());

const MAX_RADIX: usize = 95;

/// The packed call expression (everything after `eval` up to `</script>`).
pub fn packed_script(html: &str) -> Option<&str> {
    SCRIPT_RE
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// First `https...m3u8` in the decoded script.
pub fn find_manifest(decoded: &str) -> Option<&str> {
    MANIFEST_RE.find(decoded).map(|m| m.as_str())
}

pub fn unpack(script: &str) -> Result<String> {
    let captures = ARGS_RE
        .captures(script)
        .ok_or_else(|| eyre!("packer arguments not found"))?;
    let payload = unescape(group(&captures, "payload")?);
    let radix = group(&captures, "radix")?.parse::<usize>()?;
    let count = group(&captures, "count")?.parse::<usize>()?;
    let words = unescape(group(&captures, "words")?);
    let sep = unescape(group(&captures, "sep")?);
    if !(2..=MAX_RADIX).contains(&radix) {
        bail!("unsupported packer radix {radix}");
    }

    let words: Vec<&str> = if sep.is_empty() {
        // ''.split('') yields single characters
        words.char_indices().map(|(i, c)| &words[i..i + c.len_utf8()]).collect()
    } else {
        words.split(sep.as_str()).collect()
    };
    let dictionary: HashMap<String, &str> = words
        .iter()
        .take(count)
        .enumerate()
        .filter(|(_, word)| !word.is_empty())
        .map(|(i, word)| (encode_index(i, radix), *word))
        .collect();

    let decoded = WORD_RE.replace_all(&payload, |captures: &Captures| {
        let token = &captures[0];
        dictionary.get(token).copied().unwrap_or(token).to_string()
    });
    Ok(decoded.into_owned())
}

fn group<'a>(captures: &Captures<'a>, name: &str) -> Result<&'a str> {
    captures
        .name(name)
        .map(|m| m.as_str())
        .ok_or_else(|| eyre!("packer argument {name} missing"))
}

/// The packer's own `e(c)`: base-`radix` digits `0-9a-z`, then `A-Z` and beyond
/// via `c + 29`.
fn encode_index(index: usize, radix: usize) -> String {
    let mut digits = Vec::new();
    let mut rest = index;
    loop {
        digits.push(digit(rest % radix));
        if rest < radix {
            break;
        }
        rest /= radix;
    }
    digits.iter().rev().collect()
}

fn digit(value: usize) -> char {
    if value > 35 {
        char::from_u32(value as u32 + 29).unwrap_or('?')
    } else {
        char::from_digit(value as u32, 36).unwrap_or('?')
    }
}

/// Undo the escaping of a single quoted js string literal.
fn unescape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
