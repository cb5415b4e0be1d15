//! Input Sanitization
//!
//! Injection detection and string cleaning for values that reach the
//! management API. Pattern tables are compiled once and shared read-only.

use std::sync::LazyLock;

use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid sanitizer pattern"))
        .collect()
}

static SQL_INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)(union\s+select|insert\s+into|delete\s+from|update\s+set|drop\s+table|create\s+table)",
        r"(?i)(exec\s*\(|execute\s*\(|sp_executesql)",
        r"(?i)(script\s*>|javascript:|vbscript:|onload\s*=|onerror\s*=)",
        r"(?i)(union.*select|select.*from.*where|1\s*=\s*1|1\s*or\s*1)",
    ])
});

static XSS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)<script[^>]*>.*?</script>",
        r"(?i)javascript:",
        r"(?i)vbscript:",
        r"(?i)on\w+\s*=",
        r"(?i)<iframe[^>]*>",
    ])
});

/// Whether `input` matches any SQL injection pattern
pub fn detect_sql_injection(input: &str) -> bool {
    let lowered = input.to_lowercase();
    SQL_INJECTION_PATTERNS.iter().any(|p| p.is_match(&lowered))
}

/// Whether `input` matches any XSS pattern
pub fn detect_xss(input: &str) -> bool {
    XSS_PATTERNS.iter().any(|p| p.is_match(input))
}

/// Escape the five HTML-significant characters
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Clean a user-supplied string
///
/// Drops NUL and control characters (TAB, LF and CR survive), escapes HTML,
/// removes residual XSS fragments and trims surrounding whitespace.
pub fn sanitize_string(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|&c| !(c == '\0' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))))
        .collect();

    let mut cleaned = escape_html(&cleaned);
    for pattern in XSS_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    cleaned.trim().to_string()
}
