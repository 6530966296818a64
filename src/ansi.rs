/// Clean tool output for storage: ANSI escapes removed, `X\bX` overstrike
/// (man's bold/underline when not paging) collapsed, CRLF normalised.
pub fn strip(input: &[u8]) -> String {
    // Backspaces must be resolved before the escape stripper drops them.
    let text = strip_overstrike(&String::from_utf8_lossy(input));
    let stripped = strip_ansi_escapes::strip(text.as_bytes());
    normalize(&String::from_utf8_lossy(&stripped))
}

fn strip_overstrike(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\x08' {
            out.pop();
        } else {
            out.push(c);
        }
    }
    out
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "")
}
