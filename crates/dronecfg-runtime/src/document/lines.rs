//! Line preprocessing: comment stripping and indentation measurement.

use crate::error::ParseErrorKind;

/// A significant (non-blank, non-comment) source line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Line {
    /// 1-based line number.
    pub number: usize,
    /// Leading spaces.
    pub indent: usize,
    /// Content with indentation and trailing comment removed.
    pub text: String,
}

impl Line {
    /// Returns `true` for `- item` and bare `-` lines.
    pub fn is_seq_item(&self) -> bool {
        self.text == "-" || self.text.starts_with("- ")
    }
}

/// Splits `input` into significant lines.
///
/// # Errors
///
/// Returns the offending line number and [`ParseErrorKind::TabIndentation`]
/// if a line is indented with a tab.
pub(crate) fn split_lines(input: &str) -> Result<Vec<Line>, (usize, ParseErrorKind)> {
    let mut lines = Vec::new();

    for (idx, raw) in input.lines().enumerate() {
        let number = idx + 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);

        let content_start = raw
            .char_indices()
            .find(|(_, c)| *c != ' ' && *c != '\t')
            .map(|(i, _)| i);
        let Some(start) = content_start else {
            continue; // blank
        };
        if raw[..start].contains('\t') {
            return Err((number, ParseErrorKind::TabIndentation));
        }

        let text = strip_comment(&raw[start..]).trim_end();
        if text.is_empty() || text == "---" {
            continue;
        }

        lines.push(Line {
            number,
            indent: start,
            text: text.to_string(),
        });
    }

    Ok(lines)
}

/// Removes a trailing `# comment`.
///
/// `#` starts a comment at the beginning of the content or after
/// whitespace, outside quoted strings.
fn strip_comment(text: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if c == q && !(q == '"' && prev == Some('\\')) {
                    quote = None;
                }
            }
            None => match c {
                '#' if prev.map_or(true, char::is_whitespace) => return &text[..i],
                '"' | '\'' if prev.map_or(true, opens_quote) => quote = Some(c),
                _ => {}
            },
        }
        prev = Some(c);
    }

    text
}

/// Quotes only open a string at the start of a token.
fn opens_quote(prev: char) -> bool {
    prev.is_whitespace() || matches!(prev, '[' | '{' | ',' | ':' | '-')
}
