/// Extracts the first double-quoted segment of `text`, decoding backslash escapes.
///
/// Returns the decoded content and the rest of `text` after the closing quote.
/// When there is no opening quote, or the segment is never closed, both are empty.
pub fn take_quoted(text: &str) -> (String, &str) {
    let Some(open) = text.find('"') else {
        return (String::new(), "");
    };
    let body = &text[open + 1..];

    let mut out = String::with_capacity(body.len());
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            continue;
        }
        match c {
            '"' => return (out, &body[i + 1..]),
            '\\' => escaped = true,
            _ => out.push(c),
        }
    }

    // unterminated
    (String::new(), "")
}
