//! Splits assembly source into token lines.
//!
//! ```text
//! start:              ; label lines are dropped
//!     MV W1, #5       ; ["MV", "W1", "#5"]
//! ```

/// The tokens of one instruction line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// 1-based line number in the source
    pub line_nr: usize,
    /// Mnemonic followed by its operands
    pub tokens: Vec<&'a str>,
}

impl<'a> SourceLine<'a> {
    /// The tokens joined back together, used to point at the offending
    /// instruction in error messages.
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Tokenizes every line of `source`, skipping comments, labels and empty
/// lines.
pub fn tokenize(source: &str) -> Vec<SourceLine<'_>> {
    source
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let tokens = tokenize_line(line);
            if tokens.is_empty() {
                None
            } else {
                Some(SourceLine {
                    line_nr: idx + 1,
                    tokens,
                })
            }
        })
        .collect()
}

/// Tokenizes a single line. Returns no tokens for blank, comment-only and
/// label lines.
pub fn tokenize_line(line: &str) -> Vec<&str> {
    let line = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let line = line.trim();

    if line.ends_with(':') {
        return Vec::new();
    }

    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect()
}
