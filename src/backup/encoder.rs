// mysql-backup/src/backup/encoder.rs

/// A single cell as read from a table row.
///
/// Temporal columns are carried as `Text` in the server's own rendering, so they come
/// out quoted like any other string.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Int(i64),
    UInt(u64),
    /// DECIMAL, FLOAT or DOUBLE exactly as the server rendered it.
    Numeric(String),
    Bytes(Vec<u8>),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// Converts a cell into a literal token that can be pasted into an INSERT statement.
pub fn encode(value: &CellValue) -> String {
    match value {
        CellValue::Null => "NULL".to_string(),
        CellValue::Text(s) => format!("'{}'", escape_str(s)),
        CellValue::Int(v) => v.to_string(),
        CellValue::UInt(v) => v.to_string(),
        CellValue::Numeric(v) => v.clone(),
        CellValue::Bytes(b) if b.is_empty() => "''".to_string(),
        CellValue::Bytes(b) => format!("0x{}", hex::encode(b)),
    }
}

/// Escapes backslashes, then single quotes. Nothing else is touched.
pub fn escape_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Encodes a whole row as a parenthesized, comma-joined tuple.
pub fn encode_row(row: &[CellValue]) -> String {
    let values: Vec<String> = row.iter().map(encode).collect();
    format!("({})", values.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reverses `escape_str` using the same two-rule grammar.
    fn unescape(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn parse_literal(token: &str) -> String {
        assert!(token.starts_with('\'') && token.ends_with('\''), "not quoted: {}", token);
        unescape(&token[1..token.len() - 1])
    }

    #[test]
    fn test_null_is_unquoted() {
        assert_eq!(encode(&CellValue::Null), "NULL");
        assert_eq!(encode(&CellValue::from(None::<i64>)), "NULL");
        assert_eq!(encode(&CellValue::from(None::<String>)), "NULL");
    }

    #[test]
    fn test_plain_string_is_quoted() {
        assert_eq!(encode(&"hello world".into()), "'hello world'");
        assert_eq!(encode(&"".into()), "''");
    }

    #[test]
    fn test_quote_and_backslash_escaping() {
        assert_eq!(encode(&"O'Brien".into()), r"'O\'Brien'");
        assert_eq!(encode(&r"C:\temp".into()), r"'C:\\temp'");
        // Backslash first, so the quote's own backslash is not doubled.
        assert_eq!(encode(&r"\'".into()), r"'\\\''");
    }

    #[test]
    fn test_other_characters_untouched() {
        assert_eq!(encode(&"line1\nline2\t\"x\"".into()), "'line1\nline2\t\"x\"'");
        assert_eq!(encode(&"数据库".into()), "'数据库'");
    }

    #[test]
    fn test_escaping_round_trip() {
        let samples = [
            r"plain",
            r"it's",
            r"back\slash",
            r"\\",
            r"''",
            r"\'",
            r"end with backslash\",
            r"'quoted' and \escaped\ mixed\'",
        ];
        for original in samples {
            let token = encode(&original.into());
            assert_eq!(parse_literal(&token), original, "round trip of {:?}", original);
        }
    }

    #[test]
    fn test_numbers_are_unquoted() {
        assert_eq!(encode(&CellValue::Int(-42)), "-42");
        assert_eq!(encode(&CellValue::UInt(18_446_744_073_709_551_615)), "18446744073709551615");
        assert_eq!(encode(&CellValue::Numeric("19.90".into())), "19.90");
        assert_eq!(encode(&CellValue::Numeric("-1.5e-7".into())), "-1.5e-7");
        let wide = "12345678901234567890123456789012345.123456789012345678901234567890";
        assert_eq!(encode(&CellValue::Numeric(wide.into())), wide);
    }

    #[test]
    fn test_bytes_become_hex_literals() {
        assert_eq!(encode(&CellValue::Bytes(vec![0x00, 0xff, 0x27])), "0x00ff27");
        assert_eq!(encode(&CellValue::Bytes(Vec::new())), "''");
    }

    #[test]
    fn test_encode_row() {
        let row = vec![CellValue::Int(1), "a'b".into(), CellValue::Null];
        assert_eq!(encode_row(&row), r"(1,'a\'b',NULL)");
    }
}
