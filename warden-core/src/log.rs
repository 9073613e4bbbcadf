// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit trail of actions applied to users, groups and tracks.
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::UserId;
use crate::timestamp::Timestamp;

/// Number of entries shown on one page of a log query.
pub const PAGE_ENTRIES: usize = 5;

/// Identifier used as actor for actions which were not caused by a user.
pub const CONSOLE_ID: UserId = Uuid::nil();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("page {0} does not exist, there are {1} pages")]
    InvalidPage(usize, usize),

    #[error("unknown target type '{0}'")]
    UnknownTargetType(String),
}

/// Kind of object an action was applied to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TargetType {
    User,
    Group,
    Track,
}

impl TargetType {
    /// Single character code used in storage.
    pub fn code(&self) -> char {
        match self {
            TargetType::User => 'U',
            TargetType::Group => 'G',
            TargetType::Track => 'T',
        }
    }
}

impl FromStr for TargetType {
    type Err = LogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "U" | "u" => Ok(TargetType::User),
            "G" | "g" => Ok(TargetType::Group),
            "T" | "t" => Ok(TargetType::Track),
            other => Err(LogError::UnknownTargetType(other.to_string())),
        }
    }
}

impl Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Immutable record of one action.
///
/// Entries are ordered by time first, equal timestamps are ordered by the remaining fields to
/// keep the order total.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogEntry {
    timestamp: Timestamp,
    actor: UserId,
    actor_name: String,
    target_type: TargetType,
    target: Option<UserId>,
    target_name: String,
    action: String,
}

impl LogEntry {
    pub fn builder() -> LogEntryBuilder {
        LogEntryBuilder::default()
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }

    pub fn actor_name(&self) -> &str {
        &self.actor_name
    }

    pub fn target_type(&self) -> TargetType {
        self.target_type
    }

    /// Identifier of the target, only set for users.
    pub fn target(&self) -> Option<UserId> {
        self.target
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns true if actor, target or action contain the query, ignoring case.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.actor_name.to_lowercase().contains(&query)
            || self.target_name.to_lowercase().contains(&query)
            || self.action.to_lowercase().contains(&query)
    }
}

impl Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}) [{}] ({}) {}",
            self.actor_name, self.target_type, self.target_name, self.action
        )
    }
}

/// Builder for [`LogEntry`], the timestamp defaults to the current time and the actor to the
/// console.
#[derive(Clone, Debug)]
pub struct LogEntryBuilder {
    entry: LogEntry,
}

impl Default for LogEntryBuilder {
    fn default() -> Self {
        Self {
            entry: LogEntry {
                timestamp: Timestamp::now(),
                actor: CONSOLE_ID,
                actor_name: "console".to_string(),
                target_type: TargetType::User,
                target: None,
                target_name: String::new(),
                action: String::new(),
            },
        }
    }
}

impl LogEntryBuilder {
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.entry.timestamp = timestamp;
        self
    }

    pub fn actor(mut self, actor: UserId, name: &str) -> Self {
        self.entry.actor = actor;
        self.entry.actor_name = name.to_string();
        self
    }

    pub fn user(mut self, user: UserId, name: &str) -> Self {
        self.entry.target_type = TargetType::User;
        self.entry.target = Some(user);
        self.entry.target_name = name.to_string();
        self
    }

    pub fn group(mut self, name: &str) -> Self {
        self.entry.target_type = TargetType::Group;
        self.entry.target = None;
        self.entry.target_name = name.to_string();
        self
    }

    pub fn track(mut self, name: &str) -> Self {
        self.entry.target_type = TargetType::Track;
        self.entry.target = None;
        self.entry.target_name = name.to_string();
        self
    }

    /// Sets all target fields at once, used when reading entries back from storage.
    pub fn target(mut self, target_type: TargetType, target: Option<UserId>, name: &str) -> Self {
        self.entry.target_type = target_type;
        self.entry.target = target;
        self.entry.target_name = name.to_string();
        self
    }

    pub fn action(mut self, action: &str) -> Self {
        self.entry.action = action.to_string();
        self
    }

    pub fn build(self) -> LogEntry {
        self.entry
    }
}

/// Immutable, queryable collection of log entries, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Log {
    entries: BTreeSet<LogEntry>,
}

impl Log {
    pub fn new(entries: impl IntoIterator<Item = LogEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries caused by the given actor.
    pub fn actor_history(&self, actor: UserId) -> Vec<&LogEntry> {
        self.filter(|entry| entry.actor == actor)
    }

    /// Entries applied to the given user.
    pub fn user_history(&self, user: UserId) -> Vec<&LogEntry> {
        self.filter(|entry| entry.target_type == TargetType::User && entry.target == Some(user))
    }

    /// Entries applied to the given group.
    pub fn group_history(&self, group: &str) -> Vec<&LogEntry> {
        self.filter(|entry| {
            entry.target_type == TargetType::Group && entry.target_name.eq_ignore_ascii_case(group)
        })
    }

    /// Entries applied to the given track.
    pub fn track_history(&self, track: &str) -> Vec<&LogEntry> {
        self.filter(|entry| {
            entry.target_type == TargetType::Track && entry.target_name.eq_ignore_ascii_case(track)
        })
    }

    /// Entries mentioning the query in actor, target or action.
    pub fn search(&self, query: &str) -> Vec<&LogEntry> {
        self.filter(|entry| entry.matches_search(query))
    }

    fn filter<F>(&self, predicate: F) -> Vec<&LogEntry>
    where
        F: Fn(&LogEntry) -> bool,
    {
        self.entries.iter().filter(|entry| predicate(entry)).collect()
    }
}

/// Number of pages needed to show the given number of entries.
pub fn max_pages(entries: usize) -> usize {
    entries.div_ceil(PAGE_ENTRIES)
}

/// Returns one page of entries (numbered from 1) together with their position in the full list
/// (also numbered from 1).
pub fn page<'a>(
    entries: &[&'a LogEntry],
    page: usize,
) -> Result<Vec<(usize, &'a LogEntry)>, LogError> {
    let pages = max_pages(entries.len());
    if page == 0 || page > pages {
        return Err(LogError::InvalidPage(page, pages));
    }
    let start = (page - 1) * PAGE_ENTRIES;
    Ok(entries
        .iter()
        .enumerate()
        .skip(start)
        .take(PAGE_ENTRIES)
        .map(|(index, entry)| (index + 1, *entry))
        .collect())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::timestamp::Timestamp;

    use super::{Log, LogEntry, LogError, TargetType, max_pages, page};

    fn entries() -> (Uuid, Uuid, Log) {
        let alice = Uuid::from_u128(1);
        let bob = Uuid::from_u128(2);

        let log = Log::new([
            LogEntry::builder()
                .timestamp(Timestamp::new(30))
                .actor(alice, "alice")
                .user(bob, "bob")
                .action("permission set chat.color true")
                .build(),
            LogEntry::builder()
                .timestamp(Timestamp::new(10))
                .actor(alice, "alice")
                .group("admin")
                .action("parent add default")
                .build(),
            LogEntry::builder()
                .timestamp(Timestamp::new(20))
                .actor(bob, "bob")
                .track("staff")
                .action("append moderator")
                .build(),
        ]);

        (alice, bob, log)
    }

    #[test]
    fn ordered_by_time() {
        let (_, _, log) = entries();
        let times: Vec<u64> = log.entries().map(|entry| entry.timestamp().as_secs()).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn filters() {
        let (alice, bob, log) = entries();

        assert_eq!(log.actor_history(alice).len(), 2);
        assert_eq!(log.actor_history(bob).len(), 1);
        assert_eq!(log.user_history(bob).len(), 1);
        assert!(log.user_history(alice).is_empty());
        assert_eq!(log.group_history("ADMIN").len(), 1);
        assert_eq!(log.track_history("staff").len(), 1);
        assert_eq!(log.search("MODERATOR").len(), 1);
        assert_eq!(log.search("bob").len(), 2);
    }

    #[test]
    fn pagination() {
        let actor = Uuid::from_u128(7);
        let log = Log::new((0..12).map(|index| {
            LogEntry::builder()
                .timestamp(Timestamp::new(index))
                .actor(actor, "actor")
                .group("admin")
                .action(&format!("action {index}"))
                .build()
        }));

        let entries = log.actor_history(actor);
        assert_eq!(max_pages(entries.len()), 3);

        let first = page(&entries, 1).unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(first[0].0, 1);
        assert_eq!(first[0].1.action(), "action 0");

        let last = page(&entries, 3).unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[1].0, 12);

        assert_eq!(page(&entries, 0), Err(LogError::InvalidPage(0, 3)));
        assert_eq!(page(&entries, 4), Err(LogError::InvalidPage(4, 3)));
        assert_eq!(page(&[], 1), Err(LogError::InvalidPage(1, 0)));
    }

    #[test]
    fn target_type_codes() {
        for target_type in [TargetType::User, TargetType::Group, TargetType::Track] {
            assert_eq!(target_type.to_string().parse::<TargetType>(), Ok(target_type));
        }
        assert!("X".parse::<TargetType>().is_err());
    }
}
