//! Escaping host strings into injected script source
//!
//! Text is embedded as a JSON string literal, which is also a valid
//! JavaScript string literal, so the guest decodes exactly the original.

/// Encode `text` as a script string literal, quotes included
pub fn script_literal(text: &str) -> String {
    // Serializing a &str to JSON cannot fail
    let json = serde_json::to_string(text).unwrap_or_else(|_| String::from("\"\""));
    harden_literal(json)
}

/// Escape sequences JSON permits raw but script contexts do not
///
/// U+2028/U+2029 terminate lines in pre-ES2019 engines, and `</` can
/// close an enclosing `<script>` element.
pub(crate) fn harden_literal(json: String) -> String {
    let needs_escape = json.contains(|c: char| c == '\u{2028}' || c == '\u{2029}')
        || json.contains("</");
    if !needs_escape {
        return json;
    }
    json.replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
        .replace("</", "<\\/")
}
