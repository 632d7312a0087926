/// Quotes `text` the way it would appear in a JSON schema document.
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{:?}", text))
}

/// Renders an optional doc string as `///` lines at the given indentation.
pub fn doc_comment(doc: Option<&str>, indent: &str) -> String {
    match doc {
        Some(doc) if !doc.trim().is_empty() => doc
            .trim_end()
            .lines()
            .map(|line| {
                let line = line.trim_end();
                if line.is_empty() {
                    format!("{}///\n", indent)
                } else {
                    format!("{}/// {}\n", indent, line.trim_start())
                }
            })
            .collect(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_like_json() {
        assert_eq!(quote("a\"b"), r#""a\"b""#);
    }

    #[test]
    fn doc_comments() {
        assert_eq!(doc_comment(None, ""), "");
        assert_eq!(doc_comment(Some("  "), ""), "");
        assert_eq!(doc_comment(Some("First.\n\n Second.\n"), "    "), "    /// First.\n    ///\n    /// Second.\n");
    }
}
