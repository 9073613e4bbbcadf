// SPDX-License-Identifier: MIT OR Apache-2.0

use sqlx::{query, query_as};
use warden_core::UserId;

use crate::sqlite::{DecodeError, SqliteError, SqliteStore};
use crate::uuids::{MappingResult, UuidCacheStore};

impl UuidCacheStore for SqliteStore {
    type Error = SqliteError;

    async fn save_mapping(&self, username: &str, id: UserId) -> Result<MappingResult, Self::Error> {
        let (previous_username, displaced) = self
            .tx(async |tx| {
                let previous: Option<(String,)> = query_as(
                    "
                    SELECT
                        username
                    FROM
                        uuid_cache_v1
                    WHERE
                        uuid = ?
                        AND username != ?
                    LIMIT 1
                    ",
                )
                .bind(id.to_string())
                .bind(username)
                .fetch_optional(&mut **tx)
                .await?;

                let displaced: Option<(String,)> = query_as(
                    "
                    SELECT
                        uuid
                    FROM
                        uuid_cache_v1
                    WHERE
                        username = ?
                        AND uuid != ?
                    ",
                )
                .bind(username)
                .bind(id.to_string())
                .fetch_optional(&mut **tx)
                .await?;

                query(
                    "
                    DELETE FROM
                        uuid_cache_v1
                    WHERE
                        uuid = ?
                    ",
                )
                .bind(id.to_string())
                .execute(&mut **tx)
                .await?;

                query(
                    "
                    INSERT OR REPLACE
                    INTO
                        uuid_cache_v1 (
                            username,
                            uuid
                        )
                    VALUES
                        (?, ?)
                    ",
                )
                .bind(username)
                .bind(id.to_string())
                .execute(&mut **tx)
                .await?;

                Ok((previous.map(|(name,)| name), displaced.map(|(id,)| id)))
            })
            .await?;

        let displaced = displaced
            .as_deref()
            .map(UserId::parse_str)
            .transpose()
            .map_err(|err| SqliteError::Decode("uuid".into(), DecodeError::Uuid(err)))?;

        Ok(MappingResult {
            previous_username,
            displaced,
        })
    }

    async fn uuid_for(&self, username: &str) -> Result<Option<UserId>, Self::Error> {
        let row: Option<(String,)> = self
            .tx(async |tx| {
                query_as(
                    "
                    SELECT
                        uuid
                    FROM
                        uuid_cache_v1
                    WHERE
                        username = ?
                    ",
                )
                .bind(username)
                .fetch_optional(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        row.map(|(id,)| UserId::parse_str(&id))
            .transpose()
            .map_err(|err| SqliteError::Decode("uuid".into(), DecodeError::Uuid(err)))
    }

    async fn username_for(&self, id: UserId) -> Result<Option<String>, Self::Error> {
        let row: Option<(String,)> = self
            .tx(async |tx| {
                query_as(
                    "
                    SELECT
                        username
                    FROM
                        uuid_cache_v1
                    WHERE
                        uuid = ?
                    LIMIT 1
                    ",
                )
                .bind(id.to_string())
                .fetch_optional(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(row.map(|(name,)| name))
    }
}
