//! CSV reading and writing with per-cell quotation tracking.
//!
//! Format rules: leading spaces and tabs in a cell are skipped, cells may
//! be quoted with `"`, a quote inside a quoted cell is written as `""`,
//! newlines cannot be quoted, and a blank line terminates a table (which
//! is how the model file packs several tables into one stream).

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use tracing::debug;

use crate::error::IoError;

/// One CSV cell: its text with quotes resolved, and whether it was quoted.
/// The quotation flag matters because an unquoted `NA` token is a missing
/// value while a quoted `"NA"` never is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Cell contents, excluding any surrounding quote marks.
    pub text: String,
    /// Whether the cell was quoted in the source (or must be on output).
    pub quoted: bool,
}

impl Cell {
    /// An unquoted cell.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), quoted: false }
    }

    /// A quoted cell.
    #[must_use]
    pub fn quoted(text: impl Into<String>) -> Self {
        Self { text: text.into(), quoted: true }
    }
}

/// A parsed CSV table: header names plus the data-cell grid.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column names from the header row (empty for headerless reads).
    pub col_names: Vec<String>,
    /// Row-major data cells.
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Check that every data row has `expected` cells.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MismatchedRowLengths`] naming the first bad row.
    pub fn require_uniform(&self, expected: usize, path: &Path) -> Result<(), IoError> {
        for (row, cells) in self.rows.iter().enumerate() {
            if cells.len() != expected {
                return Err(IoError::MismatchedRowLengths {
                    path: path.to_path_buf(),
                    row,
                    expected,
                    got: cells.len(),
                });
            }
        }
        Ok(())
    }
}

/// Parse one CSV line into cells. An empty line yields no cells.
#[must_use]
pub fn parse_line(line: &str) -> Vec<Cell> {
    let bytes = line.as_bytes();
    let mut len = bytes.len();
    // Tolerate CRLF input.
    if len > 0 && bytes[len - 1] == b'\r' {
        len -= 1;
    }

    let mut cells = Vec::new();
    let mut start = 0usize;

    while start < len {
        while start < len && (bytes[start] == b' ' || bytes[start] == b'\t') {
            start += 1;
        }
        if start >= len {
            break;
        }

        if bytes[start] == b'"' {
            start += 1;
            let mut text = String::new();
            let mut end = start;
            loop {
                if end == len {
                    // No closing quote before end of line.
                    text.push_str(&line[start..end]);
                    break;
                } else if bytes[end] == b'"' {
                    if end + 1 == len {
                        // Closing quote at end of line.
                        text.push_str(&line[start..end]);
                        break;
                    } else if bytes[end + 1] == b'"' {
                        // A quote pair collapses to one quote.
                        end += 1;
                        text.push_str(&line[start..end]);
                        end += 1;
                        start = end;
                    } else if bytes[end + 1] == b',' {
                        // Closing quote followed by the cell separator.
                        text.push_str(&line[start..end]);
                        end += 1;
                        break;
                    } else {
                        // Closing quote mid-cell; the cell continues.
                        text.push_str(&line[start..end]);
                        end += 1;
                        start = end;
                    }
                } else {
                    end += 1;
                }
            }
            cells.push(Cell { text, quoted: true });
            start = end + 1;
        } else {
            let mut end = start;
            while end < len && bytes[end] != b',' {
                end += 1;
            }
            cells.push(Cell { text: line[start..end].to_string(), quoted: false });
            start = end + 1;
        }
    }

    cells
}

/// Read lines from `reader` until a blank line or end of input, parsing
/// each into cells.
pub(crate) fn read_rows(
    reader: &mut impl BufRead,
    path: &Path,
) -> Result<Vec<Vec<Cell>>, IoError> {
    let mut rows = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .map_err(|e| IoError::ReadFile { path: path.to_path_buf(), source: e })?;
        if n == 0 {
            break;
        }
        let cells = parse_line(line.trim_end_matches('\n'));
        if cells.is_empty() {
            break;
        }
        rows.push(cells);
    }
    Ok(rows)
}

/// Read a CSV file with a header row.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | file cannot be opened |
/// | [`IoError::ReadFile`] | read failure mid-file |
/// | [`IoError::EmptyTable`] | no header line at all |
pub fn read_table(path: &Path) -> Result<Table, IoError> {
    let file = File::open(path)
        .map_err(|e| IoError::FileNotFound { path: path.to_path_buf(), source: e })?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    let n = reader
        .read_line(&mut header)
        .map_err(|e| IoError::ReadFile { path: path.to_path_buf(), source: e })?;
    if n == 0 {
        return Err(IoError::EmptyTable { path: path.to_path_buf() });
    }
    let col_names = parse_line(header.trim_end_matches('\n'))
        .into_iter()
        .map(|cell| cell.text)
        .collect();

    let rows = read_rows(&mut reader, path)?;
    debug!(path = %path.display(), n_rows = rows.len(), "table read");
    Ok(Table { col_names, rows })
}

/// Read a CSV file without a header row.
///
/// # Errors
///
/// Same conditions as [`read_table`], minus the header requirement.
pub fn read_table_headerless(path: &Path) -> Result<Table, IoError> {
    let file = File::open(path)
        .map_err(|e| IoError::FileNotFound { path: path.to_path_buf(), source: e })?;
    let mut reader = BufReader::new(file);
    let rows = read_rows(&mut reader, path)?;
    Ok(Table { col_names: Vec::new(), rows })
}

/// Append one cell to `out`, quoting when the cell demands it or when it
/// holds anything but digits and periods, and doubling embedded quotes.
fn push_cell(out: &mut String, cell: &Cell) {
    let needs_quotes =
        cell.quoted || cell.text.bytes().any(|b| !(b.is_ascii_digit() || b == b'.'));
    if needs_quotes {
        out.push('"');
    }
    for c in cell.text.chars() {
        if c == '"' {
            out.push_str("\"\"");
        } else {
            out.push(c);
        }
    }
    if needs_quotes {
        out.push('"');
    }
}

/// Render a table to CSV text; the header row is always quoted.
#[must_use]
pub(crate) fn render_table(col_names: &[String], rows: &[Vec<Cell>]) -> String {
    let mut out = String::new();
    if !col_names.is_empty() {
        for (col, name) in col_names.iter().enumerate() {
            if col > 0 {
                out.push(',');
            }
            push_cell(&mut out, &Cell::quoted(name.clone()));
        }
        out.push('\n');
    }
    for row in rows {
        for (col, cell) in row.iter().enumerate() {
            if col > 0 {
                out.push(',');
            }
            push_cell(&mut out, cell);
        }
        out.push('\n');
    }
    out
}

/// Write a table (header row included) to a CSV file.
///
/// # Errors
///
/// Returns [`IoError::WriteFile`] when the file cannot be written.
pub fn write_table(path: &Path, col_names: &[String], rows: &[Vec<Cell>]) -> Result<(), IoError> {
    let text = render_table(col_names, rows);
    let mut file = File::create(path)
        .map_err(|e| IoError::WriteFile { path: path.to_path_buf(), source: e })?;
    file.write_all(text.as_bytes())
        .map_err(|e| IoError::WriteFile { path: path.to_path_buf(), source: e })?;
    debug!(path = %path.display(), n_rows = rows.len(), "table written");
    Ok(())
}
