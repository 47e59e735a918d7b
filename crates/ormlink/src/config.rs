//! Repository and per-operation configuration.

use ormlink_proto::{Transaction, WriteOptions};

/// Default for running attribute validation on writes.
pub const DEFAULT_VALIDATE: bool = true;

/// Default for processing includes after a write.
pub const DEFAULT_ASSOCIATE: bool = true;

/// Default read-back mode for `update`.
pub const DEFAULT_READBACK: ReadbackMode = ReadbackMode::Detached;

/// How `update` re-reads the rows it wrote.
///
/// The engine's bulk update only reports a row count, so the updated rows are
/// fetched again with the same filter. In [`ReadbackMode::Detached`] the
/// write and the read are separate engine calls: a concurrent writer may
/// change the matched set in between, and the returned rows are not
/// guaranteed to be the rows that were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackMode {
    /// Write, then read back outside any transaction the repository opens.
    Detached,
    /// Run the write, the read-back, and association processing in one
    /// transaction when the caller did not supply one.
    Transactional,
}

/// Repository-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Read-back mode for `update`.
    pub readback: ReadbackMode,
}

impl RepositoryConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            readback: DEFAULT_READBACK,
        }
    }

    /// Set the read-back mode.
    pub fn with_readback(mut self, readback: ReadbackMode) -> Self {
        self.readback = readback;
        self
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for one write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOptions {
    /// Run attribute validation in the engine.
    pub validate: bool,
    /// Persist association values for the query's includes.
    pub associate: bool,
    /// Caller transaction, threaded through every nested write and reload.
    pub transaction: Option<Transaction>,
}

impl PersistOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            validate: DEFAULT_VALIDATE,
            associate: DEFAULT_ASSOCIATE,
            transaction: None,
        }
    }

    /// Enable or disable validation.
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Enable or disable association processing.
    pub fn with_associate(mut self, associate: bool) -> Self {
        self.associate = associate;
        self
    }

    /// Scope the operation to a transaction.
    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// The engine write options for these settings.
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            validate: self.validate,
            transaction: self.transaction,
        }
    }
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PersistOptions::default();
        assert!(options.validate);
        assert!(options.associate);
        assert!(options.transaction.is_none());
        assert_eq!(RepositoryConfig::default().readback, ReadbackMode::Detached);
    }

    #[test]
    fn test_write_options_carry_transaction() {
        let tx = Transaction::new(7);
        let write = PersistOptions::new()
            .with_validate(false)
            .with_transaction(tx)
            .write_options();
        assert!(!write.validate);
        assert_eq!(write.transaction, Some(tx));
    }
}
