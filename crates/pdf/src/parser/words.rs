//! Glyph runs to words.
//!
//! Runs are split into per-character boxes, flipped into top-left page
//! space, grouped into rows and then cut into words at whitespace and at
//! horizontal gaps.

use pdf2md_core::Word;
use unicode_normalization::UnicodeNormalization;

use super::layout::GlyphRun;

/// Characters whose tops differ by at most this much share a row.
const Y_TOLERANCE: f64 = 3.0;

/// A horizontal gap wider than this starts a new word.
const X_TOLERANCE: f64 = 3.0;

/// Share of the font size that sits below the baseline.
const DESCENT_RATIO: f64 = 0.2;

#[derive(Debug, Clone)]
struct Char {
    ch: char,
    x0: f64,
    x1: f64,
    top: f64,
    bottom: f64,
    size: f64,
    font_name: String,
}

/// Build words from glyph runs for a page whose media box is
/// `[llx, lly, urx, ury]`. Words come back row by row, top to bottom and
/// left to right within a row.
pub fn build_words(runs: &[GlyphRun], media_box: [f32; 4]) -> Vec<Word> {
    let llx = media_box[0] as f64;
    let ury = media_box[3] as f64;

    let mut chars: Vec<Char> = Vec::new();
    for run in runs {
        let count = run.text.chars().count();
        if count == 0 {
            continue;
        }
        let size = run.font_size as f64;
        let advance = run.width as f64 / count as f64;
        let bottom = (ury - run.y as f64) + size * DESCENT_RATIO;
        let top = bottom - size;

        for (i, ch) in run.text.chars().enumerate() {
            let x0 = run.x as f64 - llx + advance * i as f64;
            chars.push(Char {
                ch,
                x0,
                x1: x0 + advance,
                top,
                bottom,
                size,
                font_name: run.font_name.clone(),
            });
        }
    }

    rows(chars).into_iter().flat_map(split_row).collect()
}

/// Cluster characters into rows by their top, each row sorted by x.
fn rows(mut chars: Vec<Char>) -> Vec<Vec<Char>> {
    chars.sort_by(|a, b| a.top.total_cmp(&b.top));

    let mut rows: Vec<Vec<Char>> = Vec::new();
    let mut anchor = f64::NEG_INFINITY;
    for c in chars {
        match rows.last_mut() {
            Some(row) if (c.top - anchor).abs() <= Y_TOLERANCE => row.push(c),
            _ => {
                anchor = c.top;
                rows.push(vec![c]);
            }
        }
    }

    for row in rows.iter_mut() {
        row.sort_by(|a, b| a.x0.total_cmp(&b.x0));
    }
    rows
}

fn split_row(row: Vec<Char>) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Vec<Char> = Vec::new();

    for c in row {
        if c.ch.is_whitespace() {
            flush(&mut current, &mut words);
            continue;
        }
        if let Some(last) = current.last() {
            if c.x0 - last.x1 > X_TOLERANCE {
                flush(&mut current, &mut words);
            }
        }
        current.push(c);
    }
    flush(&mut current, &mut words);

    words
}

fn flush(current: &mut Vec<Char>, words: &mut Vec<Word>) {
    let chars = std::mem::take(current);
    let Some(first) = chars.first() else {
        return;
    };

    let raw: String = chars.iter().map(|c| c.ch).collect();
    let text = normalize_text(&raw);
    if text.is_empty() {
        return;
    }

    words.push(Word {
        text,
        x0: first.x0,
        x1: chars.iter().map(|c| c.x1).fold(first.x1, f64::max),
        top: chars.iter().map(|c| c.top).fold(first.top, f64::min),
        bottom: chars.iter().map(|c| c.bottom).fold(first.bottom, f64::max),
        size: first.size,
        font_name: first.font_name.clone(),
    });
}

/// NFC-normalize, expand typographic ligatures and drop replacement
/// characters.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.nfc() {
        match ch {
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
            '\u{FFFD}' => {}
            c => out.push(c),
        }
    }
    out
}
