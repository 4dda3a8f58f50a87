//! Statement shape: which of the three sub-caches a statement belongs to,
//! plus the (type, concurrency, holdability) triple used for first-fit
//! matching within a sub-cache.

/// Which sub-cache a prepared statement lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// No SQL text passed at creation time; keyed implicitly by the triple
    /// alone, since a connection can only have so many distinct shapes of
    /// "plain" statement outstanding at once.
    Simple,
    /// A precompiled statement, keyed by its SQL text.
    Parameterized,
    /// A stored-procedure call, keyed by its SQL text.
    Callable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetType {
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    ReadOnly,
    Updatable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holdability {
    HoldCursorsOverCommit,
    CloseCursorsAtCommit,
}

/// The shape a statement was requested with. Two requests with equal
/// triples are interchangeable for caching purposes regardless of which
/// SQL text originally produced them (for [`StatementKind::Simple`], the
/// triple is the entire key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementTriple {
    pub result_set_type: ResultSetType,
    pub concurrency: Concurrency,
    pub holdability: Holdability,
}

impl Default for StatementTriple {
    fn default() -> Self {
        StatementTriple {
            result_set_type: ResultSetType::ForwardOnly,
            concurrency: Concurrency::ReadOnly,
            holdability: Holdability::CloseCursorsAtCommit,
        }
    }
}
