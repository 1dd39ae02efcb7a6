//! Tabular I/O for the thicket ensemble: CSV cell grids that track which
//! cells were quoted (a quoted cell is never a missing value), conversion
//! between cell grids and typed value columns, and the plain-text
//! line-oriented model file format.

mod csv;
mod error;
mod model;
mod table;

pub use csv::{Cell, Table, parse_line, read_table, read_table_headerless, write_table};
pub use error::IoError;
pub use model::{read_model, write_model};
pub use table::{
    cells_to_values, default_value_types, parse_impute_option, parse_value_type, values_to_cells,
};
