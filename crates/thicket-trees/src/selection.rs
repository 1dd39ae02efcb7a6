/// Packed set of selected indices over a fixed domain `0..size`.
///
/// Keeps a bit-vector for O(1) membership tests alongside a list of the
/// selected indices in first-insertion order. Invariant: the list is a
/// permutation of the positions where the bit-vector is true.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    bits: Vec<bool>,
    indices: Vec<usize>,
}

impl SelectionSet {
    /// Create an empty set over an empty domain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set over `0..size` with every index selected or unselected.
    #[must_use]
    pub fn with_all(size: usize, selected: bool) -> Self {
        let mut set = Self::new();
        if selected {
            set.select_all(size);
        } else {
            set.clear(size);
        }
        set
    }

    /// Resize the domain to `0..size` and unselect everything.
    pub fn clear(&mut self, size: usize) {
        self.bits.clear();
        self.bits.resize(size, false);
        self.indices.clear();
    }

    /// Resize the domain to `0..size` and select everything, in index order.
    pub fn select_all(&mut self, size: usize) {
        self.bits.clear();
        self.bits.resize(size, true);
        self.indices = (0..size).collect();
    }

    /// Select an index; a no-op if already selected.
    ///
    /// Panics if `index` is outside the domain.
    pub fn select(&mut self, index: usize) {
        if !self.bits[index] {
            self.bits[index] = true;
            self.indices.push(index);
        }
    }

    /// Unselect an index; a no-op if not selected. The insertion order of
    /// the remaining indices is preserved.
    ///
    /// Panics if `index` is outside the domain.
    pub fn unselect(&mut self, index: usize) {
        if self.bits[index] {
            self.bits[index] = false;
            if let Some(pos) = self.indices.iter().position(|&i| i == index) {
                self.indices.remove(pos);
            }
        }
    }

    /// Return `true` if the index is selected.
    #[must_use]
    pub fn is_selected(&self, index: usize) -> bool {
        self.bits[index]
    }

    /// Per-index selection flags for the whole domain.
    #[must_use]
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Selected indices in first-insertion order.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of selected indices.
    #[must_use]
    pub fn count(&self) -> usize {
        self.indices.len()
    }

    /// Size of the domain.
    #[must_use]
    pub fn domain_size(&self) -> usize {
        self.bits.len()
    }
}
