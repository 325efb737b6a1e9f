//! Line and style assembly.
//!
//! Words arrive in extraction order. A line is anchored at its first word's
//! `top`; following words stay on it while they are within
//! [`LINE_TOLERANCE`] of the anchor. Inside a line, consecutive words with
//! the same bold classification form a style run, and bold runs are wrapped
//! in `**` markers.

use crate::headings::HeadingMap;
use crate::types::{TextLine, TextStyle, Word};

/// Maximum vertical distance (layout units) between a word and its line anchor.
pub const LINE_TOLERANCE: f64 = 3.0;

/// Weight names that contain "bold"-like text without being bold.
const NON_BOLD_MARKERS: [&str; 5] = ["semibold", "demibold", "book", "light", "regular"];

const BOLD_MARKERS: [&str; 4] = ["bold", "-bold", ".bold", " bold"];

/// Guess whether a font is bold from its name.
pub fn is_bold_font(font_name: &str) -> bool {
    let name = font_name.to_lowercase();
    if NON_BOLD_MARKERS.iter().any(|marker| name.contains(marker)) {
        return false;
    }
    BOLD_MARKERS.iter().any(|marker| name.contains(marker))
}

/// Group a page's words into classified [`TextLine`]s.
pub fn assemble_lines(words: &[Word], headings: &HeadingMap) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut current: Vec<&Word> = Vec::new();
    let mut anchor: Option<f64> = None;

    for word in words {
        match anchor {
            Some(top) if (word.top - top).abs() <= LINE_TOLERANCE => current.push(word),
            _ => {
                if let Some(line) = build_line(&current, headings) {
                    lines.push(line);
                }
                current.clear();
                anchor = Some(word.top);
                current.push(word);
            }
        }
    }

    if let Some(line) = build_line(&current, headings) {
        lines.push(line);
    }

    lines
}

/// Build a line from its words, classifying it by the first word's size.
fn build_line(words: &[&Word], headings: &HeadingMap) -> Option<TextLine> {
    let first = words.first()?;
    let level = headings.level_for(first.rounded_size());

    Some(TextLine {
        text: merge_style_runs(words),
        top: first.top,
        is_heading: level.is_some(),
        level,
        style: TextStyle {
            is_bold: is_bold_font(&first.font_name),
            font_name: first.font_name.clone(),
        },
    })
}

/// Join words into text, wrapping each maximal bold run in `**`.
fn merge_style_runs(words: &[&Word]) -> String {
    let mut runs: Vec<String> = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    let mut run_bold: Option<bool> = None;

    for word in words {
        let bold = is_bold_font(&word.font_name);
        if run_bold.is_some_and(|b| b != bold) {
            runs.push(format_run(&run, run_bold == Some(true)));
            run.clear();
        }
        run_bold = Some(bold);
        run.push(word.text.as_str());
    }

    if !run.is_empty() {
        runs.push(format_run(&run, run_bold == Some(true)));
    }

    runs.join(" ")
}

fn format_run(words: &[&str], bold: bool) -> String {
    let text = words.join(" ");
    if bold {
        format!("**{}**", text)
    } else {
        text
    }
}
