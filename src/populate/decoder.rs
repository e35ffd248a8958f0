use encoding_rs::UTF_16BE;

/// Decode a PDF text string into Rust text. Strings carrying the UTF-16BE
/// BOM are decoded as such; anything else is treated as a one-byte-per-char
/// encoding, which covers the ASCII field identifiers of the template.
pub fn decode_text(raw: &[u8]) -> String {
    if raw.starts_with(&[0xFE, 0xFF]) {
        UTF_16BE.decode_without_bom_handling(&raw[2..]).0.to_string()
    } else {
        raw.iter().map(|&b| b as char).collect()
    }
}
