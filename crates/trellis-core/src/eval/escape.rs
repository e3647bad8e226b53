//! Context-sensitive HTML escaping for emitted values
//!
//! Literal template text is never escaped; only fence results pass
//! through here, and `SafeHtml` values bypass it entirely.

/// Escape the five HTML-significant characters
///
/// The numeric forms for quotes match what `html/template`-style
/// engines produce, so escaped output is byte-identical to theirs.
#[must_use]
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&#34;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_five() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&#34;x&#34;&gt;&amp;&#39;");
    }

    #[test]
    fn passes_plain_text_through() {
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn script_tag() {
        assert_eq!(
            escape_html("<script>alert('pwned')</script>"),
            "&lt;script&gt;alert(&#39;pwned&#39;)&lt;/script&gt;"
        );
    }
}
