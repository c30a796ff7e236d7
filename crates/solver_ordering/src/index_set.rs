//! Index sets accepted by the ordering translations.

/// A set of global indices in one of three representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSet {
    /// Explicit list.
    General(Vec<i64>),
    /// `first, first + step, ...` with `len` entries.
    Stride {
        /// First index
        first: i64,
        /// Increment
        step: i64,
        /// Number of entries
        len: usize,
    },
    /// Blocks of `block_size` consecutive indices starting at `block * block_size`.
    Block {
        /// Indices per block
        block_size: usize,
        /// Block numbers
        blocks: Vec<i64>,
    },
}

impl IndexSet {
    /// Explicit index list.
    pub fn general(indices: impl Into<Vec<i64>>) -> Self {
        IndexSet::General(indices.into())
    }

    /// Strided range.
    pub fn stride(first: i64, step: i64, len: usize) -> Self {
        IndexSet::Stride { first, step, len }
    }

    /// Blocked set.
    pub fn block(block_size: usize, blocks: impl Into<Vec<i64>>) -> Self {
        IndexSet::Block {
            block_size,
            blocks: blocks.into(),
        }
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            IndexSet::General(indices) => indices.len(),
            IndexSet::Stride { len, .. } => *len,
            IndexSet::Block { block_size, blocks } => block_size * blocks.len(),
        }
    }

    /// `true` with no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block representation.
    pub fn is_block(&self) -> bool {
        matches!(self, IndexSet::Block { .. })
    }

    /// Strided representation.
    pub fn is_stride(&self) -> bool {
        matches!(self, IndexSet::Stride { .. })
    }

    /// Expanded indices, in order.
    pub fn indices(&self) -> Vec<i64> {
        match self {
            IndexSet::General(indices) => indices.clone(),
            IndexSet::Stride { first, step, len } => {
                (0..*len as i64).map(|k| first + k * step).collect()
            }
            IndexSet::Block { block_size, blocks } => {
                let bs = *block_size as i64;
                blocks
                    .iter()
                    .flat_map(|b| (0..bs).map(move |k| b * bs + k))
                    .collect()
            }
        }
    }

    /// Rewrite the set in explicit form.
    pub fn to_general(&mut self) {
        if !matches!(self, IndexSet::General(_)) {
            *self = IndexSet::General(self.indices());
        }
    }

    /// Explicit entries, if the set is in general form.
    pub fn as_general(&self) -> Option<&[i64]> {
        match self {
            IndexSet::General(indices) => Some(indices.as_slice()),
            _ => None,
        }
    }

    /// Mutable explicit entries, if the set is in general form.
    pub fn as_general_mut(&mut self) -> Option<&mut [i64]> {
        match self {
            IndexSet::General(indices) => Some(indices.as_mut_slice()),
            _ => None,
        }
    }
}
