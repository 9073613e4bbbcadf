// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use sqlx::{FromRow, query, query_as};
use warden_core::UserId;

use crate::sqlite::{DecodeError, SqliteError, SqliteStore};
use crate::users::{UserData, UserStore};

impl UserStore for SqliteStore {
    type Error = SqliteError;

    async fn user_data(&self, id: UserId) -> Result<Option<UserData>, Self::Error> {
        let row = self
            .tx(async |tx| {
                query_as::<_, UserRow>(
                    "
                    SELECT
                        username,
                        primary_group
                    FROM
                        users_v1
                    WHERE
                        uuid = ?
                    ",
                )
                .bind(id.to_string())
                .fetch_optional(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(row.map(UserData::from))
    }

    async fn upsert_user(&self, id: UserId, data: &UserData) -> Result<(), Self::Error> {
        self.tx(async |tx| {
            query(
                "
                INSERT
                INTO
                    users_v1 (
                        uuid,
                        username,
                        primary_group
                    )
                VALUES
                    (?, ?, ?)
                ON CONFLICT(uuid) DO UPDATE SET
                    username = excluded.username,
                    primary_group = excluded.primary_group
                ",
            )
            .bind(id.to_string())
            .bind(data.username.as_deref())
            .bind(&data.primary_group)
            .execute(&mut **tx)
            .await?;
            Ok(())
        })
        .await
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, Self::Error> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    DELETE FROM
                        users_v1
                    WHERE
                        uuid = ?
                    ",
                )
                .bind(id.to_string())
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn user_ids(&self) -> Result<BTreeSet<UserId>, Self::Error> {
        let rows: Vec<(String,)> = self
            .tx(async |tx| {
                query_as(
                    "
                    SELECT
                        uuid
                    FROM
                        users_v1
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
                    .map_err(|err| SqliteError::Decode("uuid".into(), DecodeError::Uuid(err)))
            })
            .collect()
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    username: Option<String>,
    primary_group: String,
}

impl From<UserRow> for UserData {
    fn from(row: UserRow) -> Self {
        Self {
            username: row.username,
            primary_group: row.primary_group,
        }
    }
}
