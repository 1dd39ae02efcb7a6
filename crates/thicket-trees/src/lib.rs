//! Decision-tree ensembles over mixed tabular data: train, prune, predict.
//!
//! Provides a deterministic ensemble learner for datasets whose columns are
//! either numeric or categorical, with explicit missing-value handling.
//! Ensemble diversity comes from a deterministic column-subset generator
//! rather than row resampling, so identical inputs always produce identical
//! models. Trees are grown greedily (entropy for categorical targets,
//! weighted standard deviation for numeric targets), optionally pruned with
//! a pessimistic error estimate, and compacted into a flat serializable form
//! for prediction.

mod category;
mod compact;
mod config;
mod ensemble;
mod error;
mod impute;
mod metrics;
mod model;
mod predict;
mod prune;
mod selection;
mod sort;
mod split;
mod subsets;
mod tree;
mod value;

pub use category::{CategoryMap, NA_CATEGORY};
pub use compact::CompactTree;
pub use config::TrainConfig;
pub use ensemble::{Dataset, TrainResult, TrainingMetadata};
pub use error::TreesError;
pub use impute::ImputeOption;
pub use metrics::{compare_match, compare_rms};
pub use model::Model;
pub use selection::SelectionSet;
pub use subsets::make_column_subsets;
pub use value::{NO_INDEX, Value, ValueType};
