// SPDX-License-Identifier: MIT OR Apache-2.0

/// Macro to run the same test logic against all store backend implementations.
///
/// This macro takes a closure that will be executed against each store type:
/// - In-memory store (`MemoryStore`)
/// - SQLite store (`SqliteStore`)
///
/// The body runs inside a transaction which is committed afterwards.
///
/// ## Example
///
/// ```rust
/// # use warden_store::GroupStore;
/// # use warden_store::assert_all_stores;
/// # async fn run() {
/// assert_all_stores!(|store| async {
///     assert!(store.insert_group("admin").await.unwrap());
///     assert!(store.has_group("admin").await.unwrap());
/// });
/// # }
/// ```
#[macro_export]
macro_rules! assert_all_stores {
    (|$store:ident| $test_body:expr) => {
        // Test with MemoryStore.
        {
            let memory_store = $crate::MemoryStore::default();
            let permit = $crate::Transaction::begin(&memory_store).await.unwrap();
            let $store = memory_store.clone();
            $test_body.await;
            $crate::Transaction::commit(&memory_store, permit)
                .await
                .unwrap();
        }

        // Test with SqliteStore.
        {
            let sqlite_store = $crate::SqliteStore::temporary().await;
            let permit = $crate::Transaction::begin(&sqlite_store).await.unwrap();
            let $store = sqlite_store.clone();
            $test_body.await;
            $crate::Transaction::commit(&sqlite_store, permit)
                .await
                .unwrap();
        }
    };
}

/// Macro to run the same test logic against a [`Storage`](crate::Storage) facade over every
/// store backend.
///
/// Unlike [`assert_all_stores`] no transaction is held, the facade manages its own.
#[macro_export]
macro_rules! assert_all_storages {
    (|$storage:ident| $test_body:expr) => {
        // Test with MemoryStore.
        {
            let $storage = $crate::Storage::new($crate::MemoryStore::default());
            $test_body.await;
        }

        // Test with SqliteStore.
        {
            let $storage = $crate::Storage::new($crate::SqliteStore::temporary().await);
            $test_body.await;
        }
    };
}
