//! Core library of db-testutil: asynchronous expectations for database
//! mutations.
//!
//! This crate is dependency-free (inherits workspace metadata only) and holds
//! the domain types, ports (traits), and error definitions. Keep store
//! adapters and IO concerns out of this crate.
//!
//! Two pieces cooperate:
//!
//! - [`expect_created`] (and siblings) register a post-mutation hook with a
//!   store and hand back a shared [`CompletionCounter`];
//! - [`ensure_completion`] blocks the test thread until that counter is
//!   satisfied or a timeout elapses.
//!
//! Failures are signalled through the [`Reporter`] side channel, never as
//! panics, so a hook firing on another thread can fail the test without
//! unwinding across it.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Kind of write operation observed on persisted data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mutation {
    /// Row insertion.
    Create,
    /// Row modification.
    Update,
    /// Row removal.
    Delete,
}

impl Mutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutation::Create => "create",
            Mutation::Update => "update",
            Mutation::Delete => "delete",
        }
    }
}

/// Record type persisted by a store. Implementations name the table their
/// rows live in; the store validates that name against the live schema.
pub trait Model {
    fn table_name(&self) -> &str;
}

/// One post-mutation firing delivered to registered hooks.
#[derive(Clone, Debug)]
pub struct MutationEvent {
    pub mutation: Mutation,
    /// Table the statement touched; hooks filter on this.
    pub table: String,
    /// Rowid of the affected row.
    pub rowid: i64,
}

/// Callback invoked synchronously on whichever thread performed the mutation.
///
/// Hooks run inside the store's own statement execution, so they must not
/// issue further statements against the same store.
pub type MutationHook = Box<dyn Fn(&MutationEvent) + Send + Sync>;

/// Port onto the persistence layer: schema introspection plus named
/// post-mutation hook registration. The expectation core depends only on
/// this trait, never on a concrete database library.
pub trait MutationStore {
    /// Resolve the entity identifier for `model`, validating it against the
    /// store's schema.
    fn resolve_entity(&self, model: &dyn Model) -> Result<String, StoreError>;

    /// Register a hook to run after every mutation of the given kind.
    ///
    /// Names are unique per store handle; a colliding name is rejected with
    /// [`StoreError::DuplicateHook`]. There is no deregistration: handles
    /// are disposable, one registration per entity and kind per handle.
    fn register_hook(
        &self,
        mutation: Mutation,
        name: &str,
        hook: MutationHook,
    ) -> Result<(), StoreError>;
}

/// Persistence-port errors (no external error crates to keep deps at zero).
#[derive(Debug)]
pub enum StoreError {
    /// The model's table does not exist in the store's schema.
    UnknownEntity(String),
    /// A hook with the same name is already registered.
    DuplicateHook(String),
    /// Failure inside the backing database library.
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UnknownEntity(name) => write!(f, "unknown entity: {}", name),
            StoreError::DuplicateHook(name) => write!(f, "hook already registered: {}", name),
            StoreError::Backend(msg) => write!(f, "store error: {}", msg),
        }
    }
}

impl Error for StoreError {}

pub mod counter;
pub mod ensure;
pub mod expect;
pub mod report;

pub use counter::CompletionCounter;
pub use ensure::{ensure_completion, EnsureConfig};
pub use expect::{expect_created, expect_deleted, expect_updated, ExpectConfig};
pub use report::{Reporter, TestReporter};
