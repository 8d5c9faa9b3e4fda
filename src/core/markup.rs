//! Math delimiter rewriting for model output.
//!
//! Models often answer with LaTeX-style `\[ … \]` and `\( … \)` delimiters,
//! while the transcript renderer understands `$$ … $$` and `$ … $`.

/// Rewrite `\[` and `\]` to `$$`, and `\(` and `\)` to `$`. Everything else
/// passes through untouched.
pub fn normalize_math(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('[') | Some(']') => {
                chars.next();
                out.push_str("$$");
            }
            Some('(') | Some(')') => {
                chars.next();
                out.push('$');
            }
            _ => out.push(ch),
        }
    }

    out
}
