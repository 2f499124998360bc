//! # Shared Store
//!
//! In-memory implementation of the storage ports in `shared-types`.
//!
//! ## Transaction model
//!
//! - Mutations are *staged* on a [`Session`] and become *flushed* (visible to
//!   audit listeners and later reads of the same session) on [`flush`].
//! - [`commit`] runs before-commit listeners, flushes, re-checks every
//!   change-request status transition against committed state and then
//!   applies the transaction atomically under the database lock.
//! - [`rollback`] discards staged and flushed mutations and every record the
//!   session wrote.
//!
//! [`flush`]: shared_types::UnitOfWork::flush
//! [`commit`]: shared_types::UnitOfWork::commit
//! [`rollback`]: shared_types::UnitOfWork::rollback

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod clock;
mod database;
mod faults;
mod session;
mod tables;

pub use clock::ManualClock;
pub use database::InMemoryDatabase;
pub use faults::Faults;
pub use session::Session;
