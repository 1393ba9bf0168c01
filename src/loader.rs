// 📂 CSV Loader - Decode, sniff and read a source export into rows
//
// Exports come from Excel, Google Sheets and the OLCC portal, so the same
// logical file shows up as UTF-8 with/without BOM, UTF-16, or Windows-1252,
// and with comma, semicolon or tab delimiters.

use crate::columns::clean_header;
use crate::error::{MatchError, Result};
use crate::records::Row;
use encoding_rs::{Encoding, WINDOWS_1252};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// A decoded source file
#[derive(Debug, Clone)]
pub struct CsvTable {
    /// Header names, cleaned of BOM and quotes, in file order
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub delimiter: u8,
    pub encoding: &'static str,
}

impl CsvTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a CSV export from disk
pub fn read_csv_file(path: &Path) -> Result<CsvTable> {
    let bytes = fs::read(path)?;
    let (content, encoding) = decode_bytes(bytes);
    let delimiter = sniff_delimiter(&content);

    let table = read_csv_str(&content, delimiter).map_err(|e| MatchError::Csv {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    info!(
        path = %path.display(),
        encoding,
        delimiter = %(delimiter as char).escape_default(),
        rows = table.rows.len(),
        "loaded CSV"
    );

    Ok(CsvTable { encoding, ..table })
}

/// Decode raw bytes to text: BOM-declared encoding, then UTF-8, then Windows-1252
pub fn decode_bytes(bytes: Vec<u8>) -> (String, &'static str) {
    if let Some((encoding, _)) = Encoding::for_bom(&bytes) {
        // decode() strips the BOM it sniffed
        let (text, actual, _) = encoding.decode(&bytes);
        return (text.into_owned(), actual.name());
    }

    match String::from_utf8(bytes) {
        Ok(s) => (s, "UTF-8"),
        Err(e) => {
            let bytes = e.into_bytes();
            warn!("input is not valid UTF-8, decoding as windows-1252");
            let (decoded, _, _) = WINDOWS_1252.decode(&bytes);
            (decoded.into_owned(), WINDOWS_1252.name())
        }
    }
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// Each candidate (tab, semicolon, comma, pipe) must split the first line
/// into more than one field; the best score is
/// (lines agreeing with line 1's field count) × field count. Comma otherwise.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Parse decoded CSV text with a header row into column-name → value maps.
///
/// Short rows simply lack the trailing columns; extra cells are dropped.
pub fn read_csv_str(content: &str, delimiter: u8) -> std::result::Result<CsvTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(clean_header).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(CsvTable {
        headers,
        rows,
        delimiter,
        encoding: "UTF-8",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "Name,Address,License\nA,1 Main St,050-1\nB,2 Oak St,050-2\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        let content = "Name;Address;License\nA;\"1 Main St, Portland\";050-1\nB;\"2 Oak St, Bend\";050-2\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Name\tAddress\nA\t1 Main St, Portland, OR\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_empty_defaults_to_comma() {
        assert_eq!(sniff_delimiter(""), b',');
        assert_eq!(sniff_delimiter("single column\nvalue\n"), b',');
    }

    #[test]
    fn test_decode_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"Hoodie ID,License\n");

        let (text, encoding) = decode_bytes(bytes);

        assert_eq!(encoding, "UTF-8");
        assert!(text.starts_with("Hoodie ID"));
    }

    #[test]
    fn test_decode_utf16le_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "License\n050-1\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }

        let (text, encoding) = decode_bytes(bytes);

        assert_eq!(encoding, "UTF-16LE");
        assert_eq!(text, "License\n050-1\n");
    }

    #[test]
    fn test_decode_windows_1252_fallback() {
        // 0xE9 is 'é' in windows-1252 and invalid on its own in UTF-8
        let bytes = b"Caf\xE9 Cannabis".to_vec();

        let (text, encoding) = decode_bytes(bytes);

        assert_eq!(encoding, "windows-1252");
        assert_eq!(text, "Café Cannabis");
    }

    #[test]
    fn test_read_rows_with_short_lines() {
        let table = read_csv_str("\"Hoodie ID\",Dispensary,Address\nH1,Green Leaf,\"1 Main St, Portland\"\nH2,Blue Sky\n", b',').unwrap();

        assert_eq!(table.headers, vec!["Hoodie ID", "Dispensary", "Address"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["Address"], "1 Main St, Portland");
        assert!(table.rows[1].get("Address").is_none());
    }

    #[test]
    fn test_read_csv_file_end_to_end() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xEF, 0xBB, 0xBF]).unwrap();
        file.write_all(b"Hoodie ID;Dispensary;License #\nH1;Green Leaf;050 1234567\n")
            .unwrap();

        let table = read_csv_file(file.path()).unwrap();

        assert_eq!(table.delimiter, b';');
        assert_eq!(table.encoding, "UTF-8");
        assert_eq!(table.headers[0], "Hoodie ID");
        assert_eq!(table.rows[0]["License #"], "050 1234567");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_csv_file(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(MatchError::Io(_))));
    }
}
