//! Transaction handle.

/// An opaque handle to a transaction opened by a storage adapter.
///
/// The handle is `Copy` so it can be threaded through every write, nested
/// association setter, and reload issued on behalf of one caller operation.
/// Only the adapter that issued it can interpret the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transaction {
    id: u64,
}

impl Transaction {
    /// Create a handle for an adapter-assigned transaction id.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// The adapter-assigned id.
    pub fn id(&self) -> u64 {
        self.id
    }
}
