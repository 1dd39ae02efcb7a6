use std::collections::HashMap;

use crate::error::TreesError;
use crate::value::NO_INDEX;

/// Name reserved for the synthetic NA level; the surrounding spaces keep it
/// from colliding with any real level name.
pub const NA_CATEGORY: &str = " <NA> ";

/// Bijection between level names and small integer indices for one
/// categorical column.
///
/// Names are kept in insertion order and indices are assigned densely from
/// zero, so every index-ordered iteration is deterministic. When
/// `use_na_category` is on, NA is exposed as an additional synthetic level
/// with index [`NO_INDEX`] (-1) named [`NA_CATEGORY`], and index iteration
/// runs over `[-1, count_named)` instead of `[0, count_named)`.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    use_na_category: bool,
    names: Vec<String>,
    index_by_name: HashMap<String, i64>,
}

impl CategoryMap {
    /// Create an empty map with the NA level disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return whether NA is exposed as a synthetic level.
    #[must_use]
    pub fn use_na_category(&self) -> bool {
        self.use_na_category
    }

    /// Enable or disable the synthetic NA level.
    pub fn set_use_na_category(&mut self, use_na_category: bool) {
        self.use_na_category = use_na_category;
    }

    /// Insert a level if missing; return its index either way.
    pub fn find_or_insert(&mut self, name: &str) -> i64 {
        if let Some(&index) = self.index_by_name.get(name) {
            return index;
        }
        let index = self.names.len() as i64;
        self.names.push(name.to_string());
        self.index_by_name.insert(name.to_string(), index);
        index
    }

    /// Insert a level; a duplicate name is an error.
    ///
    /// # Errors
    ///
    /// Returns [`TreesError::DuplicateCategory`] when the name is present.
    pub fn insert(&mut self, name: &str) -> Result<i64, TreesError> {
        if self.index_by_name.contains_key(name) {
            return Err(TreesError::DuplicateCategory {
                name: name.to_string(),
            });
        }
        Ok(self.find_or_insert(name))
    }

    /// Look up the index for a level name.
    #[must_use]
    pub fn index_for(&self, name: &str) -> Option<i64> {
        self.index_by_name.get(name).copied()
    }

    /// Look up the name for a level index.
    ///
    /// [`NO_INDEX`] resolves to [`NA_CATEGORY`] when the NA level is on.
    #[must_use]
    pub fn name_for(&self, index: i64) -> Option<&str> {
        if index == NO_INDEX && self.use_na_category {
            return Some(NA_CATEGORY);
        }
        if index >= 0 {
            self.names.get(index as usize).map(String::as_str)
        } else {
            None
        }
    }

    /// Lowest level index, for enumeration: -1 with the NA level, else 0.
    #[must_use]
    pub fn begin_index(&self) -> i64 {
        if self.use_na_category { NO_INDEX } else { 0 }
    }

    /// One past the highest level index, for enumeration.
    #[must_use]
    pub fn end_index(&self) -> i64 {
        self.names.len() as i64
    }

    /// Count of named levels, never including the synthetic NA level.
    #[must_use]
    pub fn count_named(&self) -> usize {
        self.names.len()
    }

    /// Count of all levels, including the synthetic NA level iff it is on.
    #[must_use]
    pub fn count_all(&self) -> usize {
        if self.use_na_category {
            self.names.len() + 1
        } else {
            self.names.len()
        }
    }
}
