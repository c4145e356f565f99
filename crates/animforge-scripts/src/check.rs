//! Lightweight syntactic sanity check for target scripts.
//!
//! The editor never parses the target language; before and after an edit it
//! only verifies the structural invariants a text-level patch could break:
//! balanced brackets and terminated string literals. Comments and triple-quoted
//! blocks are skipped, single-quoted strings must close on their own line.

/// Check `source` for balanced brackets and terminated strings.
///
/// Returns a human-readable reason on the first violation found.
pub fn check_source(source: &str) -> Result<(), String> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut triple: Option<char> = None;

    for (line_no, line) in source.lines().enumerate() {
        let bytes: Vec<char> = line.chars().collect();
        let mut i = 0;
        let mut quote: Option<char> = None;
        let mut escaped = false;

        while i < bytes.len() {
            let ch = bytes[i];

            if let Some(q) = triple {
                if ch == q && bytes.get(i + 1) == Some(&q) && bytes.get(i + 2) == Some(&q) {
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
                    if bytes.get(i + 1) == Some(&ch) && bytes.get(i + 2) == Some(&ch) {
                        triple = Some(ch);
                        i += 3;
                        continue;
                    }
                    quote = Some(ch);
                }
                '#' => break,
                '(' | '[' | '{' => stack.push((ch, line_no + 1)),
                ')' | ']' | '}' => {
                    let expected = match ch {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            return Err(format!("unbalanced '{ch}' on line {}", line_no + 1));
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }

        if quote.is_some() {
            return Err(format!("unterminated string literal on line {}", line_no + 1));
        }
    }

    if let Some((open, line_no)) = stack.first() {
        return Err(format!("unclosed '{open}' opened on line {line_no}"));
    }
    if triple.is_some() {
        return Err("unterminated triple-quoted string".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_well_formed_script() {
        let source = "import os\n\nepochs = 3\nx = f('a', [1, 2])\n\"\"\"doc ' string\"\"\"\n";
        assert!(check_source(source).is_ok());
    }

    #[test]
    fn test_rejects_unbalanced_brackets() {
        assert!(check_source("x = f(1, 2\n").is_err());
        assert!(check_source("x = [1, 2))\n").is_err());
    }

    #[test]
    fn test_rejects_unterminated_string() {
        let err = check_source("s = 'abc\n").unwrap_err();
        assert!(err.contains("unterminated"));
    }

    #[test]
    fn test_brackets_inside_comments_and_strings_ignored() {
        assert!(check_source("# (((\ns = '((('\n").is_ok());
    }
}
