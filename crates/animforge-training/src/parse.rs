//! Recognizes progress lines in phase subprocess output.

use regex::Regex;
use std::sync::OnceLock;

/// A progress line emitted by a phase entry script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// `Epoch <index> <loss>`
    Epoch { epoch: u32, loss: f64 },
    /// `Progress <percent> %`
    Percent(f64),
}

fn epoch_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Epoch\s+(\d+)\s+([\d.]+)$").expect("epoch regex is valid"))
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Progress\s+([\d.]+)\s*%$").expect("percent regex is valid"))
}

/// Parse one trimmed output line. Anything that is not a recognized progress
/// line returns `None`; the caller treats those as plain diagnostics.
#[must_use]
pub fn parse_progress(line: &str) -> Option<ProgressLine> {
    if let Some(captures) = epoch_re().captures(line) {
        let epoch = captures[1].parse().ok()?;
        let loss = captures[2].parse().ok()?;
        return Some(ProgressLine::Epoch { epoch, loss });
    }
    if let Some(captures) = percent_re().captures(line) {
        let pct = captures[1].parse().ok()?;
        return Some(ProgressLine::Percent(pct));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_epoch_lines() {
        assert_eq!(
            parse_progress("Epoch 3 0.4521"),
            Some(ProgressLine::Epoch { epoch: 3, loss: 0.4521 })
        );
        assert_eq!(
            parse_progress("Epoch 10 1.0"),
            Some(ProgressLine::Epoch { epoch: 10, loss: 1.0 })
        );
    }

    #[test]
    fn test_recognizes_percent_lines() {
        assert_eq!(parse_progress("Progress 42.5 %"), Some(ProgressLine::Percent(42.5)));
        assert_eq!(parse_progress("Progress 100%"), Some(ProgressLine::Percent(100.0)));
    }

    #[test]
    fn test_rejects_everything_else() {
        assert_eq!(parse_progress("Epoch three 0.4"), None);
        assert_eq!(parse_progress("Epoch 3"), None);
        assert_eq!(parse_progress("loading checkpoint"), None);
        assert_eq!(parse_progress("Progress 42.5"), None);
        // Malformed numerics fail the secondary parse, not the regex.
        assert_eq!(parse_progress("Epoch 3 0.4.2"), None);
    }
}
