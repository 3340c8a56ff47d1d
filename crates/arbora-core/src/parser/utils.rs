/// Splits a line into its indentation width (in columns) and the remaining text.
///
/// A tab counts `tab_width` columns; any other leading whitespace character (including the
/// ideographic space U+3000) counts one column.
pub(crate) fn split_indent(line: &str, tab_width: usize) -> (usize, &str) {
    let mut columns = 0usize;
    for (idx, ch) in line.char_indices() {
        match ch {
            '\t' => columns += tab_width.max(1),
            c if c.is_whitespace() => columns += 1,
            _ => return (columns, &line[idx..]),
        }
    }
    (columns, "")
}

/// Strips a trailing `%% comment`, ignoring `%%` inside double quotes.
pub(crate) fn strip_inline_comment(line: &str) -> &str {
    let mut in_quote = false;
    let mut it = line.char_indices().peekable();
    while let Some((idx, ch)) = it.next() {
        if ch == '"' {
            in_quote = !in_quote;
            continue;
        }
        if in_quote {
            continue;
        }
        if ch == '%' && it.peek().is_some_and(|(_, next)| *next == '%') {
            return &line[..idx];
        }
    }
    line
}

/// Removes one pair of surrounding double quotes, if present.
pub(crate) fn unquote(text: &str) -> &str {
    let t = text.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        &t[1..t.len() - 1]
    } else {
        t
    }
}
