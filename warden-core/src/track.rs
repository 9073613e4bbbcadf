// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered ladders of groups used to promote and demote users.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mutate::MutateResult;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    /// Next and previous groups can only be queried for groups on the track.
    #[error("group '{0}' is not part of track '{1}'")]
    NotOnTrack(String, String),

    #[error("position {0} is out of bounds for track with {1} groups")]
    IndexOutOfBounds(usize, usize),
}

/// Ordered list of unique group names.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Track {
    name: String,
    groups: Vec<String>,
}

impl Track {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            groups: Vec::new(),
        }
    }

    /// Creates a track from a stored list of groups, duplicates are dropped.
    pub fn from_groups(name: &str, groups: impl IntoIterator<Item = String>) -> Self {
        let mut track = Self::new(name);
        for group in groups {
            track.append_group(&group);
        }
        track
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn size(&self) -> usize {
        self.groups.len()
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.position(group).is_some()
    }

    /// Returns the group following `current` or `None` if it is the last one.
    pub fn next(&self, current: &str) -> Result<Option<&str>, TrackError> {
        let index = self.require_position(current)?;
        Ok(self.groups.get(index + 1).map(String::as_str))
    }

    /// Returns the group preceding `current` or `None` if it is the first one.
    pub fn previous(&self, current: &str) -> Result<Option<&str>, TrackError> {
        let index = self.require_position(current)?;
        if index == 0 {
            return Ok(None);
        }
        Ok(self.groups.get(index - 1).map(String::as_str))
    }

    /// Appends a group to the end of the track.
    pub fn append_group(&mut self, group: &str) -> MutateResult {
        if self.contains_group(group) {
            return MutateResult::AlreadyHas;
        }
        self.groups.push(normalize(group));
        MutateResult::Success
    }

    /// Inserts a group at the given position, shifting the following groups back.
    pub fn insert_group(&mut self, group: &str, position: usize) -> Result<MutateResult, TrackError> {
        if self.contains_group(group) {
            return Ok(MutateResult::AlreadyHas);
        }
        if position > self.groups.len() {
            return Err(TrackError::IndexOutOfBounds(position, self.groups.len()));
        }
        self.groups.insert(position, normalize(group));
        Ok(MutateResult::Success)
    }

    pub fn remove_group(&mut self, group: &str) -> MutateResult {
        match self.position(group) {
            Some(index) => {
                self.groups.remove(index);
                MutateResult::Success
            }
            None => MutateResult::Lacks,
        }
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    fn position(&self, group: &str) -> Option<usize> {
        let group = normalize(group);
        self.groups.iter().position(|item| *item == group)
    }

    fn require_position(&self, group: &str) -> Result<usize, TrackError> {
        self.position(group)
            .ok_or_else(|| TrackError::NotOnTrack(normalize(group), self.name.clone()))
    }
}

fn normalize(group: &str) -> String {
    group.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use crate::mutate::MutateResult;

    use super::{Track, TrackError};

    fn staff() -> Track {
        Track::from_groups(
            "Staff",
            ["helper", "moderator", "admin"].map(String::from),
        )
    }

    #[test]
    fn next_and_previous() {
        let track = staff();
        assert_eq!(track.name(), "staff");

        assert_eq!(track.next("helper"), Ok(Some("moderator")));
        assert_eq!(track.next("Admin"), Ok(None));
        assert_eq!(track.previous("moderator"), Ok(Some("helper")));
        assert_eq!(track.previous("helper"), Ok(None));

        assert_eq!(
            track.next("owner"),
            Err(TrackError::NotOnTrack("owner".into(), "staff".into()))
        );
    }

    #[test]
    fn groups_are_unique() {
        let mut track = staff();
        assert_eq!(track.append_group("ADMIN"), MutateResult::AlreadyHas);
        assert_eq!(track.insert_group("helper", 0), Ok(MutateResult::AlreadyHas));

        let duplicated = Track::from_groups("t", ["a", "b", "a"].map(String::from));
        assert_eq!(duplicated.groups(), ["a", "b"]);
    }

    #[test]
    fn insert_and_remove() {
        let mut track = staff();

        assert_eq!(track.insert_group("trainee", 0), Ok(MutateResult::Success));
        assert_eq!(track.insert_group("owner", 4), Ok(MutateResult::Success));
        assert_eq!(
            track.insert_group("ghost", 9),
            Err(TrackError::IndexOutOfBounds(9, 5))
        );
        assert_eq!(
            track.groups(),
            ["trainee", "helper", "moderator", "admin", "owner"]
        );

        assert_eq!(track.remove_group("moderator"), MutateResult::Success);
        assert_eq!(track.remove_group("moderator"), MutateResult::Lacks);
        assert_eq!(track.next("helper"), Ok(Some("admin")));

        track.clear();
        assert_eq!(track.size(), 0);
    }
}
