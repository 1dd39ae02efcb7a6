use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use thicket_io::{
    cells_to_values, default_value_types, parse_impute_option, parse_value_type, read_model,
    read_table, read_table_headerless, values_to_cells, write_model, write_table,
};
use thicket_trees::{
    CategoryMap, Dataset, ImputeOption, SelectionSet, TrainConfig, Value, ValueType,
};

/// Token that marks a missing value in input and output CSV files.
const NA_STRING: &str = "NA";

#[derive(Parser)]
#[command(name = "thicket")]
#[command(about = "Decision-tree ensembles over mixed numeric/categorical tabular data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Train an ensemble from attribute and response CSV files
    Train(TrainArgs),
    /// Predict responses for an attribute CSV file using a saved model
    Predict(PredictArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Attributes CSV file (header row required)
    #[arg(short = 'a', value_name = "FILE")]
    attributes: PathBuf,

    /// Response CSV file (header row, single column)
    #[arg(short = 'r', value_name = "FILE")]
    response: PathBuf,

    /// Output path for the serialized model
    #[arg(short = 'm', value_name = "FILE")]
    model: PathBuf,

    /// Value-type hints CSV (one row, one name per column; inferred if absent)
    #[arg(short = 'y', value_name = "FILE")]
    types: Option<PathBuf>,

    /// Impute-options CSV (one row, one name per attribute column)
    #[arg(short = 'i', value_name = "FILE")]
    impute: Option<PathBuf>,

    /// Columns each tree may split on (default: auto)
    #[arg(short = 'c', value_name = "N")]
    columns_per_tree: Option<usize>,

    /// Maximum tree depth
    #[arg(short = 'd', value_name = "N", default_value_t = 500)]
    max_depth: usize,

    /// Minimum training rows per leaf
    #[arg(short = 'l', value_name = "N", default_value_t = 4)]
    min_leaf_count: usize,

    /// Maximum splits per numeric attribute along one path (0 = unlimited)
    #[arg(short = 's', value_name = "N", default_value_t = 0)]
    max_splits_per_numeric_attribute: usize,

    /// Maximum number of trees
    #[arg(short = 't', value_name = "N", default_value_t = 1000)]
    max_trees: usize,

    /// Prune trees after growth (0 or 1)
    #[arg(short = 'u', value_name = "0|1", default_value_t = 0)]
    do_prune: u8,

    /// Minimum depth a tree must reach to be kept
    #[arg(short = 'e', value_name = "N", default_value_t = 1)]
    min_depth: usize,

    /// Node budget per tree (0 = unlimited)
    #[arg(short = 'n', value_name = "N", default_value_t = 0)]
    max_nodes: usize,

    /// Required improvement margin for regression splits
    #[arg(long, value_name = "RATIO", default_value_t = 0.0)]
    min_improvement: f64,
}

#[derive(Args)]
struct PredictArgs {
    /// Attributes CSV file (header must match the model's columns)
    #[arg(short = 'a', value_name = "FILE")]
    attributes: PathBuf,

    /// Output CSV file for the predicted response column
    #[arg(short = 'r', value_name = "FILE")]
    response: PathBuf,

    /// Path to the serialized model
    #[arg(short = 'm', value_name = "FILE")]
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Command::Train(args) => train(&args),
        Command::Predict(args) => predict(&args),
    };
    if let Err(error) = outcome {
        eprintln!("thicket: {error:#}");
        std::process::exit(1);
    }
}

fn train(args: &TrainArgs) -> Result<()> {
    // Optional type hints: one row of names covering the attributes, with
    // the response type as an optional extra trailing entry.
    let mut value_types: Vec<ValueType> = Vec::new();
    if let Some(path) = &args.types {
        let table = read_table_headerless(path)?;
        let row = table
            .rows
            .first()
            .with_context(|| format!("empty type file {}", path.display()))?;
        for cell in row {
            value_types.push(parse_value_type(&cell.text)?);
        }
    }
    let deduce_types = value_types.is_empty();

    // Attributes.
    let attr_table = read_table(&args.attributes)?;
    if attr_table.rows.is_empty() {
        bail!("no data rows in {}", args.attributes.display());
    }
    let mut col_names = attr_table.col_names.clone();
    let n_attrs = col_names.len();
    attr_table.require_uniform(n_attrs, &args.attributes)?;

    if deduce_types {
        value_types = default_value_types(&attr_table.rows, true, NA_STRING);
    } else if value_types.len() != n_attrs && value_types.len() != n_attrs + 1 {
        bail!("type file lists {} columns, attributes have {n_attrs}", value_types.len());
    }

    let mut category_maps: Vec<CategoryMap> = Vec::new();
    let mut columns = cells_to_values(
        &attr_table.rows,
        &value_types[..n_attrs],
        true,
        NA_STRING,
        false,
        &mut category_maps,
    )?;
    let n_rows = columns[0].len();

    // Response: a single-column table appended as the target.
    let response_table = read_table(&args.response)?;
    response_table.require_uniform(1, &args.response)?;
    let response_name = response_table
        .col_names
        .first()
        .cloned()
        .with_context(|| format!("missing header in {}", args.response.display()))?;
    if response_table.rows.len() != n_rows {
        bail!("attributes have {n_rows} rows, response has {}", response_table.rows.len());
    }

    let target_type = if value_types.len() > n_attrs {
        value_types[n_attrs]
    } else {
        default_value_types(&response_table.rows, true, NA_STRING)[0]
    };
    let mut response_maps: Vec<CategoryMap> = Vec::new();
    let mut response_columns = cells_to_values(
        &response_table.rows,
        &[target_type],
        true,
        NA_STRING,
        false,
        &mut response_maps,
    )?;

    let target_column = n_attrs;
    value_types.truncate(n_attrs);
    value_types.push(target_type);
    columns.push(response_columns.remove(0));
    category_maps.push(response_maps.remove(0));
    col_names.push(response_name);

    // Impute options: per attribute column, target gets none.
    let mut impute_options: Vec<ImputeOption> = Vec::new();
    match &args.impute {
        Some(path) => {
            let table = read_table_headerless(path)?;
            let row = table
                .rows
                .first()
                .with_context(|| format!("empty impute file {}", path.display()))?;
            if row.len() != n_attrs {
                bail!("impute file lists {} columns, attributes have {n_attrs}", row.len());
            }
            for (col, cell) in row.iter().enumerate() {
                impute_options.push(parse_impute_option(&cell.text, value_types[col])?);
            }
        }
        None => impute_options.resize(n_attrs, ImputeOption::Default),
    }
    impute_options.push(ImputeOption::None);

    let data = Dataset::new(columns, value_types, category_maps, col_names)?;

    let config = TrainConfig::new()
        .with_columns_per_tree(args.columns_per_tree)
        .with_max_depth(args.max_depth)
        .with_min_depth(args.min_depth)
        .with_prune(args.do_prune != 0)
        .with_min_improvement(args.min_improvement)
        .with_min_leaf_count(args.min_leaf_count)
        .with_max_splits_per_numeric_attribute(nonzero(args.max_splits_per_numeric_attribute))
        .with_max_trees(args.max_trees)
        .with_max_nodes(nonzero(args.max_nodes))
        .with_impute_options(Some(impute_options));

    let result = config.fit(data, target_column)?;
    let metadata = result.metadata();
    info!(
        n_trees = metadata.n_trees,
        columns_per_tree = metadata.columns_per_tree,
        "trained ensemble"
    );
    if metadata.n_trees == 0 {
        eprintln!("thicket: warning: no tree reached the minimum depth");
    }

    write_model(&args.model, result.model())?;
    Ok(())
}

fn predict(args: &PredictArgs) -> Result<()> {
    let model = read_model(&args.model)?;
    let n_cols = model.n_columns();
    let target_column = model.target_column;

    let attr_table = read_table(&args.attributes)?;
    if attr_table.col_names.len() != n_cols - 1 {
        bail!(
            "attributes have {} columns, model was trained with {}",
            attr_table.col_names.len(),
            n_cols - 1
        );
    }
    attr_table.require_uniform(n_cols - 1, &args.attributes)?;
    for (col, name) in attr_table.col_names.iter().enumerate() {
        if name != &model.col_names[col] {
            bail!(
                "attribute column {col} is named \"{name}\", model expects \"{}\"",
                model.col_names[col]
            );
        }
    }

    // Convert against the model's category maps: unknown levels become NA.
    let mut attr_maps = model.category_maps[..n_cols - 1].to_vec();
    let mut columns = cells_to_values(
        &attr_table.rows,
        &model.value_types[..n_cols - 1],
        true,
        NA_STRING,
        true,
        &mut attr_maps,
    )?;
    let n_rows = columns.first().map_or(0, Vec::len);
    if n_rows == 0 {
        bail!("no data rows in {}", args.attributes.display());
    }
    columns.push(vec![Value::Na; n_rows]);

    let select_rows = SelectionSet::with_all(n_rows, true);
    let predictions = model.predict(&columns, &select_rows)?;
    info!(n_rows, "predicted");

    let cells = values_to_cells(
        std::slice::from_ref(&predictions),
        &model.value_types[target_column..=target_column],
        &model.category_maps[target_column..=target_column],
        true,
        NA_STRING,
    )?;
    write_table(&args.response, std::slice::from_ref(&model.col_names[target_column]), &cells)?;
    Ok(())
}

/// Map the CLI convention "0 means unlimited" onto the engine's options.
fn nonzero(value: usize) -> Option<usize> {
    if value == 0 { None } else { Some(value) }
}
