//! Text to Kokoro phoneme token IDs, via espeak-ng.

use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};

use super::KokoroError;

/// Map a voice name prefix to an espeak-ng language code.
pub fn voice_lang(voice: &str) -> &'static str {
    let prefix: String = voice.chars().take(2).collect();
    match prefix.as_str() {
        "af" | "am" => "en-us",
        "bf" | "bm" => "en-gb",
        "ef" | "em" => "es",
        "ff" => "fr",
        "hf" | "hm" => "hi",
        "if" | "im" => "it",
        "jf" | "jm" => "ja",
        "pf" | "pm" => "pt-br",
        "zf" | "zm" => "cmn",
        _ => "en-us",
    }
}

/// Convert text to phoneme token IDs.
///
/// Sentence punctuation is mapped to its own token IDs directly; the text
/// between punctuation marks goes through espeak-ng and the resulting IPA
/// characters are looked up in `vocab`. Characters without a vocab entry are
/// silently dropped.
pub fn phonemize(
    text: &str,
    lang: &str,
    vocab: &HashMap<char, i64>,
) -> Result<Vec<i64>, KokoroError> {
    let mut ids = Vec::new();
    for part in split_parts(text) {
        match part {
            Part::Text(segment) => {
                let ipa = run_espeak(&segment, lang)?;
                ids.extend(ipa_to_ids(&ipa, vocab));
            }
            Part::Punct(ch) => {
                if let Some(&id) = vocab.get(&ch) {
                    ids.push(id);
                }
            }
        }
    }
    Ok(ids)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Punct(char),
}

/// Split text into espeak-able segments and boundary punctuation.
///
/// `.` and `,` between digits (decimals, thousands separators) stay inside
/// the text segment so espeak-ng can read the number correctly.
fn split_parts(text: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        if let Some(punct) = boundary_punct(ch) {
            if !between_digits(text, idx, ch) {
                flush(&mut parts, &mut current);
                parts.push(Part::Punct(punct));
                continue;
            }
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush(&mut parts, &mut current);
    parts
}

fn flush(parts: &mut Vec<Part>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(Part::Text(trimmed.to_string()));
    }
    current.clear();
}

fn boundary_punct(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' | '—' | '…' | '"' | '(' | ')' | '\u{201c}'
        | '\u{201d}' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

fn between_digits(text: &str, idx: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }
    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch.len_utf8()..].chars().next();
    matches!(
        (prev, next),
        (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit()
    )
}

fn run_espeak(input: &str, lang: &str) -> Result<String, KokoroError> {
    let mut child = Command::new("espeak-ng")
        .args(["--ipa", "--stdin", "-q", "-v", lang])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KokoroError::EspeakNotFound
            } else {
                KokoroError::Io(e)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // espeak-ng reads stdin line by line; without a final newline the
        // last token can be under-processed.
        if input.ends_with('\n') {
            stdin.write_all(input.as_bytes())?;
        } else {
            stdin.write_all(input.as_bytes())?;
            stdin.write_all(b"\n")?;
        }
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KokoroError::Phonemizer(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn ipa_to_ids(ipa: &str, vocab: &HashMap<char, i64>) -> Vec<i64> {
    let mut ids = Vec::new();
    for line in ipa.lines() {
        for ch in line.trim().chars() {
            if ch == '_' {
                continue;
            }
            if let Some(&id) = vocab.get(&ch) {
                ids.push(id);
            }
        }
    }
    ids
}
