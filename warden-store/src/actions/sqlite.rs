// SPDX-License-Identifier: MIT OR Apache-2.0

use sqlx::{FromRow, query, query_as};
use warden_core::{LogEntry, TargetType, Timestamp, UserId};

use crate::actions::ActionLogStore;
use crate::sqlite::{DecodeError, SqliteError, SqliteStore};

impl ActionLogStore for SqliteStore {
    type Error = SqliteError;

    async fn insert_action(&self, entry: &LogEntry) -> Result<(), Self::Error> {
        self.tx(async |tx| {
            query(
                "
                INSERT
                INTO
                    actions_v1 (
                        time,
                        actor_uuid,
                        actor_name,
                        target_type,
                        target_uuid,
                        target_name,
                        action
                    )
                VALUES
                    (?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(entry.timestamp().as_secs() as i64)
            .bind(entry.actor().to_string())
            .bind(entry.actor_name())
            .bind(entry.target_type().to_string())
            .bind(entry.target().map(|id| id.to_string()))
            .bind(entry.target_name())
            .bind(entry.action())
            .execute(&mut **tx)
            .await?;
            Ok(())
        })
        .await
    }

    async fn actions(&self) -> Result<Vec<LogEntry>, Self::Error> {
        let rows = self
            .tx(async |tx| {
                query_as::<_, ActionRow>(
                    "
                    SELECT
                        time,
                        actor_uuid,
                        actor_name,
                        target_type,
                        target_uuid,
                        target_name,
                        action
                    FROM
                        actions_v1
                    ORDER BY
                        id
                    ",
                )
                .fetch_all(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        rows.into_iter().map(LogEntry::try_from).collect()
    }
}

/// Single action row as it is stored in the SQLite database.
#[derive(Debug, FromRow)]
struct ActionRow {
    time: i64,
    actor_uuid: String,
    actor_name: String,
    target_type: String,
    target_uuid: Option<String>,
    target_name: String,
    action: String,
}

impl TryFrom<ActionRow> for LogEntry {
    type Error = SqliteError;

    fn try_from(row: ActionRow) -> Result<Self, Self::Error> {
        let actor = UserId::parse_str(&row.actor_uuid)
            .map_err(|err| SqliteError::Decode("actor_uuid".into(), DecodeError::Uuid(err)))?;
        let target_type: TargetType = row
            .target_type
            .parse()
            .map_err(|err| SqliteError::Decode("target_type".into(), DecodeError::Log(err)))?;
        let target = row
            .target_uuid
            .as_deref()
            .map(UserId::parse_str)
            .transpose()
            .map_err(|err| SqliteError::Decode("target_uuid".into(), DecodeError::Uuid(err)))?;

        Ok(LogEntry::builder()
            .timestamp(Timestamp::new(row.time as u64))
            .actor(actor, &row.actor_name)
            .target(target_type, target, &row.target_name)
            .action(&row.action)
            .build())
    }
}
