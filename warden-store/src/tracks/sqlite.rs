// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use sqlx::{query, query_as};

use crate::sqlite::{SqliteError, SqliteStore};
use crate::tracks::TrackStore;

/// Groups of a track are stored as one comma separated column.
const GROUP_SEPARATOR: &str = ",";

impl TrackStore for SqliteStore {
    type Error = SqliteError;

    async fn track_groups(&self, name: &str) -> Result<Option<Vec<String>>, Self::Error> {
        let row: Option<(String,)> = self
            .tx(async |tx| {
                query_as(
                    "
                    SELECT
                        groups
                    FROM
                        tracks_v1
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

        Ok(row.map(|(groups,)| {
            groups
                .split(GROUP_SEPARATOR)
                .filter(|group| !group.is_empty())
                .map(str::to_string)
                .collect()
        }))
    }

    async fn upsert_track(&self, name: &str, groups: &[String]) -> Result<(), Self::Error> {
        let groups = groups.join(GROUP_SEPARATOR);
        self.tx(async |tx| {
            query(
                "
                INSERT
                INTO
                    tracks_v1 (
                        name,
                        groups
                    )
                VALUES
                    (?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    groups = excluded.groups
                ",
            )
            .bind(name)
            .bind(&groups)
            .execute(&mut **tx)
            .await?;
            Ok(())
        })
        .await
    }

    async fn delete_track(&self, name: &str) -> Result<bool, Self::Error> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    DELETE FROM
                        tracks_v1
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

    async fn track_names(&self) -> Result<BTreeSet<String>, Self::Error> {
        let rows: Vec<(String,)> = self
            .tx(async |tx| {
                query_as(
                    "
                    SELECT
                        name
                    FROM
                        tracks_v1
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
