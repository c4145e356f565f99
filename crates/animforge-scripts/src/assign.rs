//! Assignment discovery.
//!
//! Scans script text line by line for plain `name = expression` statements,
//! top-level or indented. Matching is anchored at the start of the line (after
//! indentation), so a name that only appears inside a comment or a string
//! literal never matches; lines inside triple-quoted blocks are skipped
//! outright. Self-assignments (`x = x`) are excluded entirely.

use regex::Regex;
use std::sync::OnceLock;

/// A located assignment of one variable inside a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Zero-based line index.
    pub line: usize,
    /// Leading whitespace of the assignment line.
    pub indent: String,
    /// Right-hand-side text with trailing comment and whitespace stripped.
    /// Opaque text, never evaluated.
    pub rhs: String,
}

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<indent>[ \t]*)(?P<name>[A-Za-z_][A-Za-z0-9_]*)[ \t]*=[ \t]*(?P<rhs>.+?)[ \t]*$")
            .expect("assignment regex is valid")
    })
}

/// Find every non-self assignment of `name` in `source`.
pub fn find_assignments(source: &str, name: &str) -> Vec<Assignment> {
    let re = assignment_re();
    let mut found = Vec::new();
    let mut triple: Option<char> = None;

    for (idx, line) in source.lines().enumerate() {
        let inside_block = triple.is_some();
        triple = advance_triple_state(line, triple);
        if inside_block {
            continue;
        }
        let Some(caps) = re.captures(line) else {
            continue;
        };
        if &caps["name"] != name {
            continue;
        }
        let raw_rhs = &caps["rhs"];
        // `x == y` matches the regex with an rhs starting in '='; comparisons
        // are not assignments.
        if raw_rhs.starts_with('=') {
            continue;
        }
        let rhs = strip_trailing_comment(raw_rhs);
        if rhs.is_empty() || rhs == name {
            continue;
        }
        found.push(Assignment {
            line: idx,
            indent: caps["indent"].to_string(),
            rhs,
        });
    }

    found
}

/// Advance the triple-quoted block state across one line: the scan honors
/// single-line strings and `#` comments, so quotes inside either never open
/// or close a block.
fn advance_triple_state(line: &str, mut triple: Option<char>) -> Option<char> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while i < chars.len() {
        let ch = chars[i];

        if let Some(q) = triple {
            if ch == q && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                triple = None;
                i += 3;
                continue;
            }
            i += 1;
            continue;
        }
        if escaped {
            escaped = false;
            i += 1;
            continue;
        }
        if let Some(q) = quote {
            match ch {
                '\\' => escaped = true,
                c if c == q => quote = None,
                _ => {}
            }
            i += 1;
            continue;
        }
        match ch {
            '\'' | '"' => {
                if chars.get(i + 1) == Some(&ch) && chars.get(i + 2) == Some(&ch) {
                    triple = Some(ch);
                    i += 3;
                    continue;
                }
                quote = Some(ch);
            }
            '#' => return triple,
            _ => {}
        }
        i += 1;
    }
    triple
}

/// Strip a trailing `#` comment from right-hand-side text, quote-aware so a
/// hash inside a string literal survives.
fn strip_trailing_comment(rhs: &str) -> String {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (pos, ch) in rhs.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if quote.is_some() => escaped = true,
            '\'' | '"' => match quote {
                Some(q) if q == ch => quote = None,
                Some(_) => {}
                None => quote = Some(ch),
            },
            '#' if quote.is_none() => return rhs[..pos].trim_end().to_string(),
            _ => {}
        }
    }
    rhs.trim_end().to_string()
}
