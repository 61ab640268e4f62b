// src/utils/html.rs

/// Escapes arbitrary text for inclusion in an HTML email body.
///
/// Every markup-significant character is entity-encoded (spaces included),
/// so the output is safe both as element content and as an attribute value.
pub fn escape_text(input: &str) -> String {
    ammonia::clean_text(input)
}
