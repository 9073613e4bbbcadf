// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use sqlx::{query, query_as};

use crate::groups::GroupStore;
use crate::sqlite::{SqliteError, SqliteStore};

impl GroupStore for SqliteStore {
    type Error = SqliteError;

    async fn has_group(&self, name: &str) -> Result<bool, Self::Error> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    SELECT
                        1
                    FROM
                        groups_v1
                    WHERE
                        name = ?
                    ",
                )
                .bind(name)
                .fetch_optional(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.is_some())
    }

    async fn insert_group(&self, name: &str) -> Result<bool, Self::Error> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        groups_v1 (name)
                    VALUES
                        (?)
                    ",
                )
                .bind(name)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_group(&self, name: &str) -> Result<bool, Self::Error> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    DELETE FROM
                        groups_v1
                    WHERE
                        name = ?
                    ",
                )
                .bind(name)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn group_names(&self) -> Result<BTreeSet<String>, Self::Error> {
        let rows: Vec<(String,)> = self
            .tx(async |tx| {
                query_as(
                    "
                    SELECT
                        name
                    FROM
                        groups_v1
                    ",
                )
                .fetch_all(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}
