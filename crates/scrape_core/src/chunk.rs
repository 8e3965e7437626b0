use std::fmt;

/// Number of object ids queried together in one batch request.
pub const CHUNK_SIZE: usize = 200;

/// Field name used in batch filter predicates.
pub const ID_FIELD: &str = "OBJECTID";

/// Per-feature identifier as reported by the layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Int(id) => write!(f, "{id}"),
            ObjectId::Text(id) => write!(f, "{id}"),
        }
    }
}

impl From<i64> for ObjectId {
    fn from(id: i64) -> Self {
        ObjectId::Int(id)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        ObjectId::Text(id.to_string())
    }
}

/// An ordered, immutable group of ids consumed by exactly one batch fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdBatch {
    index: usize,
    ids: Vec<ObjectId>,
    field: String,
}

impl IdBatch {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn ids(&self) -> &[ObjectId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Filter predicate of the form `FIELD in (id1,id2,...)`.
    pub fn where_clause(&self) -> String {
        let joined = self
            .ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!("{} in ({joined})", self.field)
    }
}

/// Partitions an ordered id sequence into bounded batches.
///
/// Order is preserved and ids are passed through untouched: no
/// deduplication, no range checks.
#[derive(Debug, Clone)]
pub struct IdChunker {
    chunk_size: usize,
    field: String,
}

impl IdChunker {
    pub fn new() -> Self {
        Self::with_chunk_size(CHUNK_SIZE)
    }

    /// A chunk size of zero is treated as one.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            field: ID_FIELD.to_string(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk(&self, ids: &[ObjectId]) -> Vec<IdBatch> {
        ids.chunks(self.chunk_size)
            .enumerate()
            .map(|(index, chunk)| IdBatch {
                index,
                ids: chunk.to_vec(),
                field: self.field.clone(),
            })
            .collect()
    }
}

impl Default for IdChunker {
    fn default() -> Self {
        Self::new()
    }
}
