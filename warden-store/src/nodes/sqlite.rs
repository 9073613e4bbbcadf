// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use sqlx::{FromRow, query, query_as};
use warden_auth::HolderId;
use warden_core::UserId;

use crate::nodes::NodeStore;
use crate::reconcile::Changes;
use crate::record::NodeRecord;
use crate::sqlite::{DecodeError, SqliteError, SqliteStore};

/// Values of the `holder_type` and `holder_id` columns.
fn holder_columns(holder: &HolderId) -> (&'static str, String) {
    match holder {
        HolderId::User(id) => ("user", id.to_string()),
        HolderId::Group(name) => ("group", name.clone()),
    }
}

impl NodeStore for SqliteStore {
    type Error = SqliteError;

    async fn node_records(&self, holder: &HolderId) -> Result<BTreeSet<NodeRecord>, Self::Error> {
        let (holder_type, holder_id) = holder_columns(holder);
        let rows = self
            .tx(async |tx| {
                query_as::<_, NodeRow>(
                    "
                    SELECT
                        permission,
                        value,
                        server,
                        world,
                        expiry,
                        contexts
                    FROM
                        holder_nodes_v1
                    WHERE
                        holder_type = ?
                        AND holder_id = ?
                    ",
                )
                .bind(holder_type)
                .bind(&holder_id)
                .fetch_all(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(rows.into_iter().map(NodeRecord::from).collect())
    }

    async fn apply_changes(&self, holder: &HolderId, changes: &Changes) -> Result<(), Self::Error> {
        let (holder_type, holder_id) = holder_columns(holder);
        self.tx(async |tx| {
            for record in &changes.to_delete {
                query(
                    "
                    DELETE FROM
                        holder_nodes_v1
                    WHERE
                        holder_type = ?
                        AND holder_id = ?
                        AND permission = ?
                        AND value = ?
                        AND server = ?
                        AND world = ?
                        AND expiry = ?
                        AND contexts = ?
                    ",
                )
                .bind(holder_type)
                .bind(&holder_id)
                .bind(&record.permission)
                .bind(record.value)
                .bind(&record.server)
                .bind(&record.world)
                .bind(record.expiry as i64)
                .bind(&record.contexts)
                .execute(&mut **tx)
                .await?;
            }

            for record in &changes.to_insert {
                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        holder_nodes_v1 (
                            holder_type,
                            holder_id,
                            permission,
                            value,
                            server,
                            world,
                            expiry,
                            contexts
                        )
                    VALUES
                        (?, ?, ?, ?, ?, ?, ?, ?)
                    ",
                )
                .bind(holder_type)
                .bind(&holder_id)
                .bind(&record.permission)
                .bind(record.value)
                .bind(&record.server)
                .bind(&record.world)
                .bind(record.expiry as i64)
                .bind(&record.contexts)
                .execute(&mut **tx)
                .await?;
            }

            Ok(())
        })
        .await
    }

    async fn delete_nodes(&self, holder: &HolderId) -> Result<usize, Self::Error> {
        let (holder_type, holder_id) = holder_columns(holder);
        let result = self
            .tx(async |tx| {
                query(
                    "
                    DELETE FROM
                        holder_nodes_v1
                    WHERE
                        holder_type = ?
                        AND holder_id = ?
                    ",
                )
                .bind(holder_type)
                .bind(&holder_id)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn user_holders(&self) -> Result<BTreeSet<UserId>, Self::Error> {
        let rows: Vec<(String,)> = self
            .tx(async |tx| {
                query_as(
                    "
                    SELECT
                        DISTINCT holder_id
                    FROM
                        holder_nodes_v1
                    WHERE
                        holder_type = 'user'
                    ",
                )
                .fetch_all(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        rows.into_iter()
            .map(|(id,)| {
                UserId::parse_str(&id)
                    .map_err(|err| SqliteError::Decode("holder_id".into(), DecodeError::Uuid(err)))
            })
            .collect()
    }
}

/// Single node row as it is stored in the SQLite database.
#[derive(Debug, FromRow)]
struct NodeRow {
    permission: String,
    value: bool,
    server: String,
    world: String,
    expiry: i64,
    contexts: String,
}

impl From<NodeRow> for NodeRecord {
    fn from(row: NodeRow) -> Self {
        Self {
            permission: row.permission,
            value: row.value,
            server: row.server,
            world: row.world,
            // Stored with the same bits, expiries beyond `i64::MAX` come back unchanged.
            expiry: row.expiry as u64,
            contexts: row.contexts,
        }
    }
}
