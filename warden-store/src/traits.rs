// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::actions::ActionLogStore;
use crate::groups::GroupStore;
use crate::nodes::NodeStore;
use crate::tracks::TrackStore;
use crate::users::UserStore;
use crate::uuids::UuidCacheStore;

/// Traits to implement database transaction provider.
///
/// To guard against sharing transactions unknowingly across unrelated database queries, a concept
/// of a "permit" was introduced which does not protect from misuse but helps to make "holding" a
/// transaction explicit.
pub trait Transaction {
    type Error: Error + Send + Sync + 'static;

    type Permit;

    /// Begins a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Permit, Self::Error>>;

    /// Rolls back the transaction and with that all uncommitted changes.
    fn rollback(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;

    /// Commits the transaction.
    fn commit(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Backend providing every storage domain with one error type and one transaction provider.
///
/// All store methods are expected to run inside a transaction started with
/// [`Transaction::begin`].
pub trait Store:
    Transaction
    + NodeStore<Error = <Self as Transaction>::Error>
    + UserStore<Error = <Self as Transaction>::Error>
    + GroupStore<Error = <Self as Transaction>::Error>
    + TrackStore<Error = <Self as Transaction>::Error>
    + ActionLogStore<Error = <Self as Transaction>::Error>
    + UuidCacheStore<Error = <Self as Transaction>::Error>
{
}

impl<T> Store for T where
    T: Transaction
        + NodeStore<Error = <T as Transaction>::Error>
        + UserStore<Error = <T as Transaction>::Error>
        + GroupStore<Error = <T as Transaction>::Error>
        + TrackStore<Error = <T as Transaction>::Error>
        + ActionLogStore<Error = <T as Transaction>::Error>
        + UuidCacheStore<Error = <T as Transaction>::Error>
{
}
