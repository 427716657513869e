#![forbid(unsafe_code)]

mod error;
mod memory;
mod read;
mod support;
mod sweep;
mod write;

pub use error::ToolError;
pub use read::TimelineEvent;
pub use sweep::SweepOutcome;

use pf_core::model::Role;
use pf_storage::SqliteStore;
use std::path::Path;

/// Roles allowed to read. Any authenticated role qualifies.
pub const READ_ROLES: &[Role] = &[Role::Admin, Role::Analyst, Role::Operator, Role::Viewer];
/// Roles allowed to propose-style writes (create, ingest, escalate, propose).
pub const WRITE_ROLES: &[Role] = &[Role::Admin, Role::Analyst, Role::Operator];
/// Roles allowed to decide an approval.
pub const DECIDE_ROLES: &[Role] = &[Role::Admin];

/// The tool layer: the entire external contract of the write core. Every
/// operation authorizes the caller's `UserContext` before touching the
/// store; writes additionally pass through the idempotency ledger inside
/// the store's transaction.
#[derive(Debug)]
pub struct Toolbox {
    store: SqliteStore,
}

impl Toolbox {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, ToolError> {
        let store = SqliteStore::open(storage_dir)?;
        Ok(Self { store })
    }

    pub(crate) fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }
}
