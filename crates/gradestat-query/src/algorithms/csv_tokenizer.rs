//! Line-oriented delimited-text tokenizer.
//!
//! Splits each physical line into trimmed fields. Supports:
//!
//! - Single-character delimiters (`,` and `;` in practice)
//! - Quoted fields that contain the delimiter (`"a;b"`)
//! - Double-quote escaping (`""` -> `"`)
//! - Optional comment lines
//! - Blank-line skipping
//!
//! Lines are decoded as UTF-8 lossily; encoding handling beyond that is the
//! record source's concern.

use std::io::{BufRead, ErrorKind};

use gradestat_types::error::{GradeStatError, Result};

/// Configuration for the tokenizer.
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Field delimiter. Default: ','
    pub delimiter: char,
    /// Quote character. Default: '"'
    pub quote_char: char,
    /// Whether to treat doubled quote chars as escaped quote. Default: true
    pub double_quote: bool,
    /// Comment character. Lines starting with this are skipped. Default: none
    pub comment_char: Option<char>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        CsvConfig {
            delimiter: ',',
            quote_char: '"',
            double_quote: true,
            comment_char: None,
        }
    }
}

impl CsvConfig {
    pub fn with_delimiter(delimiter: char) -> Self {
        CsvConfig {
            delimiter,
            ..Default::default()
        }
    }
}

/// One tokenized physical row, tagged with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub fields: Vec<String>,
}

impl RawRow {
    pub fn new(line: u64, fields: Vec<String>) -> Self {
        RawRow { line, fields }
    }

    /// Build a row from string slices; handy for in-memory sources.
    pub fn from_strs(line: u64, fields: &[&str]) -> Self {
        RawRow {
            line,
            fields: fields.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Lazily yields [`RawRow`]s from a buffered reader.
///
/// A read failure is reported once as [`GradeStatError::Stream`] and ends
/// the iteration.
pub struct RowReader<R> {
    reader: R,
    config: CsvConfig,
    line: u64,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> RowReader<R> {
    pub fn new(reader: R, config: CsvConfig) -> Self {
        RowReader {
            reader,
            config,
            line: 0,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for RowReader<R> {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    let text = String::from_utf8_lossy(&self.buf);
                    let line = text.trim_end_matches(&['\n', '\r'][..]);
                    if line.trim().is_empty() || is_comment(line, &self.config) {
                        continue;
                    }
                    return Some(Ok(RawRow::new(
                        self.line,
                        split_fields(line, &self.config),
                    )));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(GradeStatError::Stream(format!(
                        "failed to read line {}: {}",
                        self.line + 1,
                        e
                    ))));
                }
            }
        }
        None
    }
}

/// Tokenize an in-memory string into rows.
pub fn tokenize(content: &str, config: &CsvConfig) -> Result<Vec<RawRow>> {
    RowReader::new(content.as_bytes(), config.clone()).collect()
}

/// Check if a line is a comment.
fn is_comment(line: &str, config: &CsvConfig) -> bool {
    match config.comment_char {
        Some(c) => line.trim_start().starts_with(c),
        None => false,
    }
}

/// Split a line into fields, respecting quotes.
pub fn split_fields(line: &str, config: &CsvConfig) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quote = false;

    while let Some(ch) = chars.next() {
        if ch == config.quote_char {
            if in_quote {
                if config.double_quote && chars.peek() == Some(&config.quote_char) {
                    current.push(ch);
                    current.push(ch);
                    chars.next();
                    continue;
                }
                current.push(ch);
                in_quote = false;
                continue;
            } else if current.trim().is_empty() {
                current.push(ch);
                in_quote = true;
                continue;
            }
        }

        if !in_quote && ch == config.delimiter {
            fields.push(finish_field(&current, config));
            current.clear();
            continue;
        }

        current.push(ch);
    }

    fields.push(finish_field(&current, config));
    fields
}

/// Trim a raw field and strip surrounding quotes.
fn finish_field(raw: &str, config: &CsvConfig) -> String {
    let trimmed = raw.trim();
    let q = config.quote_char;
    if trimmed.len() >= 2 * q.len_utf8() && trimmed.starts_with(q) && trimmed.ends_with(q) {
        let inner = &trimmed[q.len_utf8()..trimmed.len() - q.len_utf8()];
        if config.double_quote {
            let doubled: String = [q, q].iter().collect();
            inner.replace(&doubled, &q.to_string())
        } else {
            inner.to_string()
        }
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokenize() {
        let rows = tokenize("a,b,c\n1,2,3\n", &CsvConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields, vec!["a", "b", "c"]);
        assert_eq!(rows[1].fields, vec!["1", "2", "3"]);
        assert_eq!(rows[1].line, 2);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let rows = tokenize("GP;F; 18 \n", &CsvConfig::with_delimiter(';')).unwrap();
        assert_eq!(rows[0].fields, vec!["GP", "F", "18"]);
    }

    #[test]
    fn test_quoted_field_with_delimiter() {
        let rows = tokenize("\"GP\";\"a;b\";3\n", &CsvConfig::with_delimiter(';')).unwrap();
        assert_eq!(rows[0].fields, vec!["GP", "a;b", "3"]);
    }

    #[test]
    fn test_double_quote_escaping() {
        let fields = split_fields(r#""say ""hi""",x"#, &CsvConfig::default());
        assert_eq!(fields, vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let rows = tokenize("a,b\r\n\r\n   \nc,d\r\n", &CsvConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].fields, vec!["c", "d"]);
        assert_eq!(rows[1].line, 4);
    }

    #[test]
    fn test_comment_lines() {
        let config = CsvConfig {
            comment_char: Some('#'),
            ..Default::default()
        };
        let rows = tokenize("# note\na,b\n", &config).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
    }

    #[test]
    fn test_empty_trailing_field() {
        let fields = split_fields("a,,", &CsvConfig::default());
        assert_eq!(fields, vec!["a", "", ""]);
    }

    #[test]
    fn test_read_error_is_stream_error() {
        struct Broken;
        impl std::io::Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::Other, "disk gone"))
            }
        }
        let mut reader = RowReader::new(std::io::BufReader::new(Broken), CsvConfig::default());
        assert!(matches!(reader.next(), Some(Err(GradeStatError::Stream(_)))));
        assert!(reader.next().is_none());
    }
}
