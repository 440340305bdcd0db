//! # COMTRADE Text Parsing Utilities
//!
//! Helpers shared by the CFG and DAT parsers: splitting CSV text into trimmed cells and
//! reading numbers the way recorder software writes them. Numeric helpers read the
//! longest numeric prefix of a field (`"12.5kV"` reads as `12.5`) and never fail; callers
//! decide what an unreadable field becomes.

/// Splits text on `\r?\n`. A trailing line break yields a final empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Splits one CSV line on commas and trims every cell.
pub fn split_cells(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

/// Returns the cell at `index`, or `""` when the row is shorter.
pub fn cell<'a>(row: &[&'a str], index: usize) -> &'a str {
    row.get(index).copied().unwrap_or("")
}

pub fn is_blank_row(row: &[&str]) -> bool {
    row.iter().all(|cell| cell.is_empty())
}

/// Empty cells are reported as `None`.
pub fn optional_cell(row: &[&str], index: usize) -> Option<String> {
    let value = cell(row, index);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Reads the leading decimal number of `field`.
///
/// Returns `f64::NAN` when the field has no numeric prefix. NaN is an expected value for
/// sparse or legacy files and is passed through to the caller rather than raised.
pub fn parse_float(field: &str) -> f64 {
    let s = field.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if bytes[0] == b'-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return f64::NAN;
    }

    // Exponent only counts when at least one digit follows it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().unwrap_or(f64::NAN)
}

/// Reads the leading base-10 integer of `field` (`"4A"` reads as `4`).
pub fn parse_int(field: &str) -> Option<i64> {
    let s = field.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse::<i64>().ok()
}

/// Integer count field; unreadable or negative counts are zero.
pub fn parse_count(field: &str) -> usize {
    parse_int(field)
        .and_then(|value| usize::try_from(value).ok())
        .unwrap_or(0)
}

// Little-endian readers for the binary DAT record. Callers guard the length.
pub fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

pub fn read_i16_le(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

pub fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_keeps_trailing_empty_line() {
        assert_eq!(split_lines("a\r\nb\r\n"), vec!["a", "b", ""]);
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines(""), vec![""]);
    }

    #[test]
    fn test_split_cells_trims() {
        assert_eq!(split_cells(" 1 , IA ,, kA "), vec!["1", "IA", "", "kA"]);
        let row = split_cells("x,y");
        assert_eq!(cell(&row, 1), "y");
        assert_eq!(cell(&row, 5), "");
        assert!(is_blank_row(&split_cells(" , ,")));
        assert!(!is_blank_row(&row));
        assert_eq!(optional_cell(&row, 0), Some("x".to_string()));
        assert_eq!(optional_cell(&row, 3), None);
    }

    #[test]
    fn test_parse_float_prefix_rules() {
        assert_eq!(parse_float("1.5"), 1.5);
        assert_eq!(parse_float("  -0.25"), -0.25);
        assert_eq!(parse_float("+3"), 3.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("5."), 5.0);
        assert_eq!(parse_float("12.5kV"), 12.5);
        assert_eq!(parse_float("1e3"), 1000.0);
        assert_eq!(parse_float("2.5E-1x"), 0.25);
        assert_eq!(parse_float("7e"), 7.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);

        assert!(parse_float("").is_nan());
        assert!(parse_float("abc").is_nan());
        assert!(parse_float("-").is_nan());
        assert!(parse_float(".").is_nan());
        assert!(parse_float("NaN").is_nan());
    }

    #[test]
    fn test_parse_int_prefix_rules() {
        assert_eq!(parse_int("4A"), Some(4));
        assert_eq!(parse_int("12D"), Some(12));
        assert_eq!(parse_int("-7"), Some(-7));
        assert_eq!(parse_int("1.9"), Some(1));
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("A4"), None);

        assert_eq!(parse_count("3A"), 3);
        assert_eq!(parse_count("-3"), 0);
        assert_eq!(parse_count("x"), 0);
    }

    #[test]
    fn test_little_endian_readers() {
        let bytes = [0x01, 0x00, 0x00, 0x00, 0x00, 0x80, 0xFF, 0x7F];
        assert_eq!(read_u32_le(&bytes, 0), 1);
        assert_eq!(read_i16_le(&bytes, 4), -32768);
        assert_eq!(read_u16_le(&bytes, 6), 0x7FFF);
    }
}
