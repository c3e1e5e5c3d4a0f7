//! Result comparison
//!
//! Results are opaque canonical strings. The only normalization is a single
//! leading line break: `"\nX"` matches `"X"`, but `"\n\nX"` does not, and no
//! other whitespace is ignored. `\n` and `\r\n` count as the same break, so
//! `"\nX"` also matches `"\r\nX"`.

/// Outcome of comparing an actual result with its expectation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Match,
    Mismatch { diff: String },
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        matches!(self, Comparison::Match)
    }
}

fn strip_one_leading_break(s: &str) -> Option<&str> {
    s.strip_prefix("\r\n").or_else(|| s.strip_prefix('\n'))
}

/// True iff `actual` equals `expected` up to one leading line break on
/// either side.
pub fn results_match(expected: &str, actual: &str) -> bool {
    let exp_body = strip_one_leading_break(expected);
    let act_body = strip_one_leading_break(actual);
    expected == actual
        || act_body == Some(expected)
        || exp_body == Some(actual)
        || (exp_body.is_some() && exp_body == act_body)
}

pub fn compare(expected: &str, actual: &str) -> Comparison {
    if results_match(expected, actual) {
        Comparison::Match
    } else {
        Comparison::Mismatch {
            diff: line_diff(expected, actual),
        }
    }
}

/// Describe the first differing line between the two results
pub fn line_diff(expected: &str, actual: &str) -> String {
    let exp_lines: Vec<&str> = expected.lines().collect();
    let act_lines: Vec<&str> = actual.lines().collect();

    let first_diff = exp_lines
        .iter()
        .zip(act_lines.iter())
        .position(|(e, a)| e != a)
        .unwrap_or(exp_lines.len().min(act_lines.len()));

    let exp_line = exp_lines.get(first_diff).copied().unwrap_or("<eof>");
    let act_line = act_lines.get(first_diff).copied().unwrap_or("<eof>");

    format!(
        "line {}: expected {:?}, actual {:?} ({} vs {} lines)",
        first_diff + 1,
        exp_line,
        act_line,
        exp_lines.len(),
        act_lines.len()
    )
}
