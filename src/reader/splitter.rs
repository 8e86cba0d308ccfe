//! Statement splitter
//!
//! Example text often holds several statements (`CREATE`, `INSERT`, then a
//! `SELECT`). The engine reports one result group per statement, so the text is
//! cut at top-level semicolons first. Semicolons inside string literals, quoted
//! identifiers and comments do not split.

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

/// Split SQL text into its statements, dropping empty and comment-only ones
///
/// The returned statements are trimmed and carry no trailing semicolon.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut state = State::Code;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                ';' => {
                    if has_code {
                        statements.push(current.trim().to_string());
                    }
                    current.clear();
                    has_code = false;
                    continue;
                }
                '\'' => {
                    state = State::SingleQuoted;
                    has_code = true;
                }
                '"' => {
                    state = State::DoubleQuoted;
                    has_code = true;
                }
                '-' if chars.peek() == Some(&'-') => state = State::LineComment,
                '/' if chars.peek() == Some(&'*') => {
                    current.push(c);
                    current.push('*');
                    chars.next();
                    state = State::BlockComment;
                    continue;
                }
                c if !c.is_whitespace() => has_code = true,
                _ => {}
            },
            // A doubled quote closes and reopens, which leaves the state as-is
            State::SingleQuoted if c == '\'' => state = State::Code,
            State::DoubleQuoted if c == '"' => state = State::Code,
            State::LineComment if c == '\n' => state = State::Code,
            State::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                current.push(c);
                current.push('/');
                chars.next();
                state = State::Code;
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    if has_code {
        statements.push(current.trim().to_string());
    }

    statements
}

/// The first keyword of a statement, upper-cased
///
/// Leading whitespace and comments are skipped. Returns `None` when the text
/// holds no keyword.
pub fn leading_keyword(sql: &str) -> Option<String> {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }

    let keyword: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if keyword.is_empty() {
        None
    } else {
        Some(keyword.to_ascii_uppercase())
    }
}
