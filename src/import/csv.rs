use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
}

impl Encoding {
    fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            // every latin-1 byte is the unicode code point of the same value
            Encoding::Latin1 => bytes.iter().map(|&byte| byte as char).collect(),
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "iso-8859-1" | "latin-1" | "latin1" => Ok(Encoding::Latin1),
            _ => Err(Error::InvalidEncoding(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    pub encoding: Encoding,
}

/// One data line of a CSV export, addressed by column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub line: usize,
    fields: HashMap<String, String>,
}

impl CsvRow {
    pub fn new(line: usize, fields: HashMap<String, String>) -> Self {
        Self { line, fields }
    }

    pub fn get(&self, column: &str) -> Result<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingColumn {
                column: column.to_string(),
                line: self.line,
            })
    }

    pub fn get_opt(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// Read all rows of a CSV export. Column names are trimmed, exports tend to pad them.
pub fn read_rows(input: impl Read, dialect: Dialect) -> Result<Vec<CsvRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .quote(dialect.quote)
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|header| dialect.encoding.decode(header))
        .enumerate()
        .map(|(index, header)| {
            let header = if index == 0 {
                maybe_remove_byte_order_mark(header)
            } else {
                header
            };
            header.trim().to_string()
        })
        .collect();

    reader
        .byte_records()
        .enumerate()
        .map(|(index, record)| {
            let record = record?;
            let fields = headers
                .iter()
                .cloned()
                .zip(record.iter().map(|field| dialect.encoding.decode(field)))
                .collect();
            Ok(CsvRow::new(index + 1, fields))
        })
        .collect()
}

fn maybe_remove_byte_order_mark(mut content: String) -> String {
    if content.starts_with('\u{FEFF}') {
        content.remove(0);
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTF8_SEMICOLON: Dialect = Dialect {
        delimiter: b';',
        quote: b'"',
        encoding: Encoding::Utf8,
    };

    #[test]
    fn reads_rows_by_column_name() {
        let input = "\u{FEFF}REF; NAME ;TOTAL\n1;\"Doe; Jane\";1,234.56\n2;Bob;3\n";
        let rows = read_rows(input.as_bytes(), UTF8_SEMICOLON).unwrap();
        assert_eq!(2, rows.len());
        assert_eq!("1", rows[0].get("REF").unwrap());
        assert_eq!("Doe; Jane", rows[0].get("NAME").unwrap());
        assert_eq!("1,234.56", rows[0].get("TOTAL").unwrap());
        assert_eq!(2, rows[1].line);
        assert_eq!("Bob", rows[1].get("NAME").unwrap());
    }

    #[test]
    fn missing_column() {
        let rows = read_rows("A;B\n1;2\n".as_bytes(), UTF8_SEMICOLON).unwrap();
        assert!(matches!(
            rows[0].get("C"),
            Err(Error::MissingColumn { column, line: 1 }) if column == "C"
        ));
        assert_eq!(None, rows[0].get_opt("C"));
    }

    #[test]
    fn short_rows_lack_trailing_columns() {
        let rows = read_rows("A;B\n1\n".as_bytes(), UTF8_SEMICOLON).unwrap();
        assert_eq!("1", rows[0].get("A").unwrap());
        assert!(rows[0].get("B").is_err());
    }

    #[test]
    fn latin1_with_tabs_and_single_quotes() {
        let dialect = Dialect {
            delimiter: b'\t',
            quote: b'\'',
            encoding: Encoding::Latin1,
        };
        let input: &[u8] = b"Name\tNet\n'J\xfcrgen\tM.'\t12,00\n";
        let rows = read_rows(input, dialect).unwrap();
        assert_eq!("Jürgen\tM.", rows[0].get("Name").unwrap());
        assert_eq!("12,00", rows[0].get("Net").unwrap());
    }

    #[test]
    fn encoding_from_str() {
        assert_eq!(Encoding::Utf8, "UTF-8".parse().unwrap());
        assert_eq!(Encoding::Latin1, "iso-8859-1".parse().unwrap());
        assert_eq!(Encoding::Latin1, "latin_1".parse().unwrap());
        assert!("ebcdic".parse::<Encoding>().is_err());
    }
}
