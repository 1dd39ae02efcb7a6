//! The plain-text, line-oriented model file.
//!
//! A model file is a sequence of named sections: a header line, one value
//! per following line, and a blank line closing the section. Sections, in
//! order: `valueTypes`, `useNaCategory`, one `categories.k` per column,
//! `targetColumn`, `selectColumns`, `imputeOptions`, `numTrees`, then per
//! tree `splitColIndex.t`, `lessOrEqualIndex.t`, `greaterOrNotIndex.t`,
//! `toLessOrEqualIfNA.t`, `value.t`, and a final `colNames`. Numeric node
//! values use a 17-significant-digit exponential so they round-trip bit
//! for bit; leaf/split level indices are written as integers.

use std::fmt::Write as _;
use std::fs;
use std::io::BufRead;
use std::path::Path;

use tracing::{debug, info, instrument};

use thicket_trees::{CompactTree, Model, Value, ValueType};

use crate::csv::{Cell, parse_line};
use crate::error::IoError;
use crate::table::{parse_impute_option, parse_value_type};

/// Index written for "no index" (a leaf's links and split column).
const NO_LINK: i64 = -1;

/// Serialize a model to its plain-text file.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::WriteFile`] | the file cannot be written |
/// | [`IoError::CorruptModel`] | a node value contradicts its column type |
#[instrument(skip(model), fields(path = %path.display(), n_trees = model.n_trees()))]
pub fn write_model(path: &Path, model: &Model) -> Result<(), IoError> {
    let mut out = String::new();

    out.push_str("valueTypes\n");
    for &value_type in &model.value_types {
        writeln_quoted(&mut out, value_type.name());
    }
    out.push('\n');

    out.push_str("useNaCategory\n");
    for map in &model.category_maps {
        let _ = writeln!(out, "{}", u8::from(map.use_na_category()));
    }
    out.push('\n');

    for (col, map) in model.category_maps.iter().enumerate() {
        let _ = writeln!(out, "categories.{col}");
        for index in 0..map.count_named() as i64 {
            let name = map.name_for(index).unwrap_or_default();
            writeln_quoted(&mut out, name);
        }
        out.push('\n');
    }

    let _ = writeln!(out, "targetColumn\n{}\n", model.target_column);

    out.push_str("selectColumns\n");
    for &col in &model.select_columns {
        let _ = writeln!(out, "{col}");
    }
    out.push('\n');

    out.push_str("imputeOptions\n");
    for &option in &model.impute_options {
        writeln_quoted(&mut out, option.name());
    }
    out.push('\n');

    let _ = writeln!(out, "numTrees\n{}\n", model.trees.len());

    for (tree_index, tree) in model.trees.iter().enumerate() {
        let _ = writeln!(out, "splitColIndex.{tree_index}");
        for &index in &tree.split_col_index {
            let _ = writeln!(out, "{}", index.map_or(NO_LINK, |i| i as i64));
        }
        out.push('\n');

        let _ = writeln!(out, "lessOrEqualIndex.{tree_index}");
        for &index in &tree.less_or_equal {
            let _ = writeln!(out, "{}", index.map_or(NO_LINK, |i| i as i64));
        }
        out.push('\n');

        let _ = writeln!(out, "greaterOrNotIndex.{tree_index}");
        for &index in &tree.greater_or_not {
            let _ = writeln!(out, "{}", index.map_or(NO_LINK, |i| i as i64));
        }
        out.push('\n');

        let _ = writeln!(out, "toLessOrEqualIfNA.{tree_index}");
        for &flag in &tree.to_less_or_equal_if_na {
            let _ = writeln!(out, "{}", u8::from(flag));
        }
        out.push('\n');

        let _ = writeln!(out, "value.{tree_index}");
        for (node, &value) in tree.value.iter().enumerate() {
            let col = node_value_column(model, tree, node);
            match (model.value_types[col], value) {
                (ValueType::Categorical, Value::Level(level)) => {
                    let _ = writeln!(out, "{level}");
                }
                (ValueType::Numeric, Value::Number(number)) => {
                    let _ = writeln!(out, "{number:.17e}");
                }
                _ => {
                    return Err(IoError::CorruptModel {
                        path: path.to_path_buf(),
                        detail: format!(
                            "tree {tree_index} node {node} value does not match its column type"
                        ),
                    });
                }
            }
        }
        out.push('\n');
    }

    out.push_str("colNames\n");
    for name in &model.col_names {
        writeln_quoted(&mut out, name);
    }

    fs::write(path, out.as_bytes())
        .map_err(|e| IoError::WriteFile { path: path.to_path_buf(), source: e })?;
    info!("model written");
    Ok(())
}

/// Deserialize a model from its plain-text file and validate it.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`], [`IoError::ReadFile`] | unreadable file |
/// | [`IoError::ModelSection`] | sections missing or out of order |
/// | [`IoError::CorruptModel`] | unparseable entries or size mismatches |
/// | [`IoError::UnknownValueType`], [`IoError::UnknownImputeOption`] | bad names |
/// | [`IoError::InvalidModel`] | the assembled model fails validation |
#[instrument(fields(path = %path.display()))]
pub fn read_model(path: &Path) -> Result<Model, IoError> {
    let file = fs::File::open(path)
        .map_err(|e| IoError::FileNotFound { path: path.to_path_buf(), source: e })?;
    let mut reader = std::io::BufReader::new(file);
    let mut sections = SectionReader { reader: &mut reader, path };

    // ~~~~ valueTypes ~~~~
    let rows = sections.expect("valueTypes")?;
    let mut value_types = Vec::with_capacity(rows.len());
    for row in &rows {
        value_types.push(parse_value_type(&row[0].text)?);
    }
    let n_cols = value_types.len();

    // ~~~~ useNaCategory + categories.k ~~~~
    let rows = sections.expect("useNaCategory")?;
    if rows.len() != n_cols {
        return Err(sections.corrupt(format!(
            "useNaCategory has {} entries for {n_cols} columns",
            rows.len()
        )));
    }
    let mut category_maps = vec![thicket_trees::CategoryMap::new(); n_cols];
    for (col, row) in rows.iter().enumerate() {
        category_maps[col].set_use_na_category(sections.parse_int(&row[0])? != 0);
    }
    for (col, map) in category_maps.iter_mut().enumerate() {
        let rows = sections.expect(&format!("categories.{col}"))?;
        for row in &rows {
            map.insert(&row[0].text).map_err(|e| IoError::InvalidModel {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
    }

    // ~~~~ targetColumn ~~~~
    let rows = sections.expect("targetColumn")?;
    let target_column = sections.single_int(&rows, "targetColumn")? as usize;

    // ~~~~ selectColumns ~~~~
    let rows = sections.expect("selectColumns")?;
    let mut select_columns = Vec::with_capacity(rows.len());
    for row in &rows {
        select_columns.push(sections.parse_int(&row[0])? as usize);
    }

    // ~~~~ imputeOptions ~~~~
    let rows = sections.expect("imputeOptions")?;
    if rows.len() != n_cols {
        return Err(sections.corrupt(format!(
            "imputeOptions has {} entries for {n_cols} columns",
            rows.len()
        )));
    }
    let mut impute_options = Vec::with_capacity(n_cols);
    for (col, row) in rows.iter().enumerate() {
        impute_options.push(parse_impute_option(&row[0].text, value_types[col])?);
    }

    // ~~~~ trees ~~~~
    let rows = sections.expect("numTrees")?;
    let n_trees = sections.single_int(&rows, "numTrees")? as usize;

    let mut trees = Vec::with_capacity(n_trees);
    for tree_index in 0..n_trees {
        let rows = sections.expect(&format!("splitColIndex.{tree_index}"))?;
        let mut tree = CompactTree::default();
        for row in &rows {
            tree.split_col_index.push(parse_link(sections.parse_int(&row[0])?));
        }
        let n_nodes = tree.split_col_index.len();

        let rows = sections.expect(&format!("lessOrEqualIndex.{tree_index}"))?;
        for row in &rows {
            tree.less_or_equal.push(parse_link(sections.parse_int(&row[0])?));
        }
        let rows = sections.expect(&format!("greaterOrNotIndex.{tree_index}"))?;
        for row in &rows {
            tree.greater_or_not.push(parse_link(sections.parse_int(&row[0])?));
        }
        let rows = sections.expect(&format!("toLessOrEqualIfNA.{tree_index}"))?;
        for row in &rows {
            tree.to_less_or_equal_if_na.push(sections.parse_int(&row[0])? != 0);
        }

        if tree.less_or_equal.len() != n_nodes
            || tree.greater_or_not.len() != n_nodes
            || tree.to_less_or_equal_if_na.len() != n_nodes
        {
            return Err(sections.corrupt(format!(
                "tree {tree_index} sections disagree on the node count"
            )));
        }

        // Node values need the column types, resolved through the links
        // just read.
        let rows = sections.expect(&format!("value.{tree_index}"))?;
        if rows.len() != n_nodes {
            return Err(sections.corrupt(format!(
                "tree {tree_index} has {n_nodes} nodes but {} values",
                rows.len()
            )));
        }
        for (node, row) in rows.iter().enumerate() {
            let col = match tree.split_col_index[node] {
                None => target_column,
                Some(index) => {
                    *select_columns.get(index).ok_or_else(|| {
                        sections.corrupt(format!(
                            "tree {tree_index} node {node} split column {index} out of range"
                        ))
                    })?
                }
            };
            let value_type = *value_types.get(col).ok_or_else(|| {
                sections.corrupt(format!("tree {tree_index} node {node} column {col} unknown"))
            })?;
            let value = match value_type {
                ValueType::Categorical => Value::Level(sections.parse_int(&row[0])?),
                ValueType::Numeric => Value::Number(sections.parse_float(&row[0])?),
            };
            tree.value.push(value);
        }

        trees.push(tree);
    }

    // ~~~~ colNames ~~~~
    let rows = sections.expect("colNames")?;
    let col_names: Vec<String> = rows.into_iter().map(|row| row[0].text.clone()).collect();

    let model = Model {
        value_types,
        category_maps,
        target_column,
        select_columns,
        impute_options,
        trees,
        col_names,
    };
    model
        .validate()
        .map_err(|e| IoError::InvalidModel { path: path.to_path_buf(), source: e })?;

    debug!(n_trees = model.n_trees(), n_columns = model.n_columns(), "model loaded");
    Ok(model)
}

/// Append a quoted line, doubling embedded quotes.
fn writeln_quoted(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        if c == '"' {
            out.push_str("\"\"");
        } else {
            out.push(c);
        }
    }
    out.push_str("\"\n");
}

/// Resolve which column a node's value belongs to: the split column for
/// internal nodes, the target column for leaves.
fn node_value_column(model: &Model, tree: &CompactTree, node: usize) -> usize {
    match tree.split_col_index[node] {
        None => model.target_column,
        Some(index) => model.select_columns.get(index).copied().unwrap_or(model.target_column),
    }
}

fn parse_link(raw: i64) -> Option<usize> {
    if raw < 0 { None } else { Some(raw as usize) }
}

/// Sequential reader over the model file's blank-line-separated sections.
struct SectionReader<'a, R: BufRead> {
    reader: &'a mut R,
    path: &'a Path,
}

impl<R: BufRead> SectionReader<'_, R> {
    /// Read the next section, requiring its header to match `expected`.
    /// Rows are guaranteed non-empty (each line yields at least one cell).
    fn expect(&mut self, expected: &str) -> Result<Vec<Vec<Cell>>, IoError> {
        let mut header = String::new();
        let n = self
            .reader
            .read_line(&mut header)
            .map_err(|e| IoError::ReadFile { path: self.path.to_path_buf(), source: e })?;
        let found = if n == 0 {
            String::new()
        } else {
            parse_line(header.trim_end_matches('\n'))
                .first()
                .map(|cell| cell.text.clone())
                .unwrap_or_default()
        };
        if found != expected {
            return Err(IoError::ModelSection {
                path: self.path.to_path_buf(),
                expected: expected.to_string(),
                found,
            });
        }
        crate::csv::read_rows(self.reader, self.path)
    }

    fn corrupt(&self, detail: String) -> IoError {
        IoError::CorruptModel { path: self.path.to_path_buf(), detail }
    }

    fn parse_int(&self, cell: &Cell) -> Result<i64, IoError> {
        cell.text
            .parse::<i64>()
            .map_err(|_| self.corrupt(format!("expected an integer, found \"{}\"", cell.text)))
    }

    fn parse_float(&self, cell: &Cell) -> Result<f64, IoError> {
        cell.text
            .parse::<f64>()
            .map_err(|_| self.corrupt(format!("expected a number, found \"{}\"", cell.text)))
    }

    fn single_int(&self, rows: &[Vec<Cell>], section: &str) -> Result<i64, IoError> {
        let row = rows
            .first()
            .ok_or_else(|| self.corrupt(format!("section {section} is empty")))?;
        self.parse_int(&row[0])
    }
}
