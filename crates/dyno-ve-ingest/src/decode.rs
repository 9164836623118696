//! Byte decoding, delimiter sniffing and numeric cell parsing.

use serde::Serialize;
use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text encoding a log was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// UTF-8 without a byte-order mark.
    Utf8,
    /// UTF-8 with a leading byte-order mark.
    Utf8Bom,
    /// Legacy windows-1252 single-byte encoding.
    Windows1252,
}

/// Decode raw log bytes.
///
/// A UTF-8 BOM is stripped. Bytes that are not valid UTF-8 are decoded as
/// windows-1252 in full; that encoding maps every byte, so decoding never
/// fails.
#[must_use]
pub fn decode_log_bytes(bytes: &[u8]) -> (String, TextEncoding) {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        if let Ok(text) = std::str::from_utf8(rest) {
            return (text.to_owned(), TextEncoding::Utf8Bom);
        }
    } else if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_owned(), TextEncoding::Utf8);
    }
    let (text, _had_errors) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
    let text = match text {
        Cow::Borrowed(s) => s.to_owned(),
        Cow::Owned(s) => s,
    };
    (text, TextEncoding::Windows1252)
}

/// Tab when the header line holds more tabs than commas, otherwise comma.
#[must_use]
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let tabs = header.matches('\t').count();
    let commas = header.matches(',').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

/// Parse a numeric cell. Blank, non-numeric and non-finite cells are absent.
#[must_use]
pub fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_utf8_bom() {
        let (text, enc) = decode_log_bytes(b"\xEF\xBB\xBFrpm,map\n");
        assert_eq!(text, "rpm,map\n");
        assert_eq!(enc, TextEncoding::Utf8Bom);
    }

    #[test]
    fn plain_utf8_passes_through() {
        let (text, enc) = decode_log_bytes("IAT (°F)\n".as_bytes());
        assert_eq!(text, "IAT (°F)\n");
        assert_eq!(enc, TextEncoding::Utf8);
    }

    #[test]
    fn legacy_bytes_decode_as_windows_1252() {
        // 0xB0 is the degree sign in windows-1252 and invalid as UTF-8 here.
        let (text, enc) = decode_log_bytes(b"IAT (\xB0F)\n");
        assert_eq!(text, "IAT (°F)\n");
        assert_eq!(enc, TextEncoding::Windows1252);
    }

    #[test]
    fn delimiter_sniffing() {
        assert_eq!(sniff_delimiter("rpm\tmap\ttorque\n1,2,3"), b'\t');
        assert_eq!(sniff_delimiter("rpm,map,torque\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn number_parsing() {
        assert_eq!(parse_number(" 13.8 "), Some(13.8));
        assert_eq!(parse_number("+2.5"), Some(2.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }
}
