//! String literals and comment stripping for assembly text.

/// Render a string operand as a quoted literal the assembler reads back.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Strip matching `"…"` or `` `…` `` quotes and undo escapes. `None` on a
/// malformed literal.
pub fn unquote(literal: &str) -> Option<String> {
    let mut chars = literal.chars();
    let open = chars.next()?;
    if open != '"' && open != '`' {
        return None;
    }
    let body: Vec<char> = chars.collect();
    let (last, body) = body.split_last()?;
    if *last != open {
        return None;
    }
    let mut out = String::with_capacity(body.len());
    let mut iter = body.iter().copied();
    while let Some(c) = iter.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match iter.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            'u' => {
                let digits: String = (0..4).map(|_| iter.next()).collect::<Option<_>>()?;
                let code = u32::from_str_radix(&digits, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

#[derive(PartialEq)]
enum StripState {
    Code,
    Str(char),
    StrEscape(char),
    Comment,
    CommentStar,
}

/// Remove `/* … */` comments from one line, leaving string literals alone.
/// A comment left open at the end of the line swallows the rest of it.
pub fn strip_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut state = StripState::Code;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        state = match state {
            StripState::Code => match c {
                '"' | '`' => {
                    out.push(c);
                    StripState::Str(c)
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    StripState::Comment
                }
                _ => {
                    out.push(c);
                    StripState::Code
                }
            },
            StripState::Str(quote) => {
                out.push(c);
                match c {
                    '\\' => StripState::StrEscape(quote),
                    _ if c == quote => StripState::Code,
                    _ => StripState::Str(quote),
                }
            }
            StripState::StrEscape(quote) => {
                out.push(c);
                StripState::Str(quote)
            }
            StripState::Comment => {
                if c == '*' {
                    StripState::CommentStar
                } else {
                    StripState::Comment
                }
            }
            StripState::CommentStar => match c {
                '/' => StripState::Code,
                '*' => StripState::CommentStar,
                _ => StripState::Comment,
            },
        };
    }
    out
}
