//! Text helpers shared by the PDF writer and the Bates stamper: WinAnsi
//! encoding, literal-string escaping, and Helvetica advance widths.

/// Helvetica advance widths (1/1000 em) for the printable ASCII range
/// `0x20..=0x7E`, from the standard Adobe font metrics.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const DEFAULT_WIDTH: u16 = 556;

/// Rendered width of `text` in points when set in Helvetica at `font_size`.
pub fn helvetica_width(text: &str, font_size: f64) -> f64 {
    let units: u32 = text
        .chars()
        .map(|c| {
            let code = c as u32;
            if (0x20..=0x7E).contains(&code) {
                HELVETICA_WIDTHS[(code - 0x20) as usize] as u32
            } else {
                DEFAULT_WIDTH as u32
            }
        })
        .sum();
    units as f64 * font_size / 1000.0
}

/// Maps a character to its WinAnsiEncoding byte, or `None` when the
/// encoding has no slot for it.
fn win_ansi_byte(c: char) -> Option<u8> {
    let code = c as u32;
    match c {
        '\t' => Some(b' '),
        '\u{20AC}' => Some(0x80),
        '\u{2026}' => Some(0x85),
        '\u{2018}' => Some(0x91),
        '\u{2019}' => Some(0x92),
        '\u{201C}' => Some(0x93),
        '\u{201D}' => Some(0x94),
        '\u{2022}' => Some(0x95),
        '\u{2013}' => Some(0x96),
        '\u{2014}' => Some(0x97),
        '\u{2122}' => Some(0x99),
        _ if (0x20..=0x7E).contains(&code) || (0xA0..=0xFF).contains(&code) => Some(code as u8),
        _ => None,
    }
}

/// Encodes `text` as the body of a PDF literal string (without the
/// surrounding parentheses). Unencodable characters become `?`.
pub fn literal_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let byte = win_ansi_byte(c).unwrap_or(b'?');
        match byte {
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out
}

/// Formats a coordinate compactly: integers without a fraction, everything
/// else with at most two decimals.
pub fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let formatted = format!("{:.2}", value);
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_table_covers_printable_ascii() {
        assert_eq!(HELVETICA_WIDTHS.len(), 0x7E - 0x20 + 1);
        assert_eq!(HELVETICA_WIDTHS[(b'0' - 0x20) as usize], 556);
        assert_eq!(HELVETICA_WIDTHS[(b'A' - 0x20) as usize], 667);
        assert_eq!(HELVETICA_WIDTHS[(b'W' - 0x20) as usize], 944);
        assert_eq!(HELVETICA_WIDTHS[(b'i' - 0x20) as usize], 222);
        assert_eq!(HELVETICA_WIDTHS[(b'~' - 0x20) as usize], 584);
    }

    #[test]
    fn test_helvetica_width() {
        // "EX-001": 667 + 667 + 333 + 3 * 556 = 3335
        let width = helvetica_width("EX-001", 10.0);
        assert!((width - 33.35).abs() < 1e-9);
    }

    #[test]
    fn test_literal_string_escapes_delimiters() {
        assert_eq!(literal_string(r"a(b)c\d"), r"a\(b\)c\\d");
    }

    #[test]
    fn test_literal_string_win_ansi() {
        assert_eq!(literal_string("café"), "caf\\351");
        assert_eq!(literal_string("\u{201C}hi\u{201D}"), "\\223hi\\224");
        assert_eq!(literal_string("a\u{2014}b"), "a\\227b");
    }

    #[test]
    fn test_literal_string_unencodable() {
        assert_eq!(literal_string("日本"), "??");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(72.0), "72");
        assert_eq!(number(12.5), "12.5");
        assert_eq!(number(1.0 / 3.0), "0.33");
        assert_eq!(number(-4.0), "-4");
    }
}
