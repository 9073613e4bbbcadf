// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moving users along tracks.
use thiserror::Error;
use tracing::debug;
use warden_core::{ContextSet, Node, Track, TrackError};

use crate::group::GroupLookup;
use crate::user::User;

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("user is not a member of any group on track '{0}'")]
    NotOnTrack(String),

    #[error("user is a member of {1} groups on track '{0}'")]
    AmbiguousCall(String, usize),

    #[error("user is already at the end of track '{0}'")]
    EndOfTrack(String),

    #[error("group '{0}' is not loaded")]
    GroupNotLoaded(String),

    #[error("track '{0}' has no groups")]
    EmptyTrack(String),

    #[error(transparent)]
    Track(#[from] TrackError),
}

/// Result of a successful promotion or demotion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The user moved up the track, `from` is `None` if it joined the track at its first group.
    Promoted { from: Option<String>, to: String },

    /// The user moved down the track, `to` is `None` if it left the track from its first group.
    Demoted { from: String, to: Option<String> },
}

/// Groups of the track the user is a member of in exactly this context.
fn memberships(user: &User, track: &Track, context: &ContextSet) -> Vec<String> {
    user.enduring_nodes()
        .iter()
        .filter(|node| node.value() && !node.is_temporary() && node.context() == context)
        .filter_map(|node| node.group_name())
        .filter(|name| track.contains_group(name))
        .map(str::to_string)
        .collect()
}

fn require_loaded<G: GroupLookup>(groups: &G, name: &str) -> Result<(), PromotionError> {
    match groups.group(name) {
        Some(_) => Ok(()),
        None => Err(PromotionError::GroupNotLoaded(name.to_string())),
    }
}

/// Replaces the user's membership of `from` with `to` in the given context.
///
/// The stored primary group follows the move when the context is global.
fn replace_membership(user: &User, from: Option<&str>, to: Option<&str>, context: &ContextSet) {
    if let Some(from) = from {
        user.unset_permission_key(Node::inheritance(from).build().key(), context);
    }
    if let Some(to) = to {
        user.set_permission(Node::inheritance(to).context(context).build());
    }

    if context.is_empty()
        && let (Some(from), Some(to)) = (from, to)
        && user.stored_primary_group() == from
    {
        user.set_primary_group(to);
    }
}

/// Moves the user to the next group of the track.
///
/// A user which is not on the track yet joins it at the first group.
pub fn promote<G: GroupLookup>(
    groups: &G,
    user: &User,
    track: &Track,
    context: &ContextSet,
) -> Result<PromotionOutcome, PromotionError> {
    let current = memberships(user, track, context);
    match current.as_slice() {
        [] => {
            let first = track
                .groups()
                .first()
                .ok_or_else(|| PromotionError::EmptyTrack(track.name().to_string()))?;
            require_loaded(groups, first)?;
            replace_membership(user, None, Some(first.as_str()), context);
            debug!(user = %user.id(), track = track.name(), to = %first, "user joined track");
            Ok(PromotionOutcome::Promoted {
                from: None,
                to: first.clone(),
            })
        }
        [from] => {
            let to = track
                .next(from)?
                .ok_or_else(|| PromotionError::EndOfTrack(track.name().to_string()))?;
            require_loaded(groups, to)?;
            replace_membership(user, Some(from.as_str()), Some(to), context);
            debug!(user = %user.id(), track = track.name(), from = %from, to, "user promoted");
            Ok(PromotionOutcome::Promoted {
                from: Some(from.clone()),
                to: to.to_string(),
            })
        }
        _ => Err(PromotionError::AmbiguousCall(
            track.name().to_string(),
            current.len(),
        )),
    }
}

/// Moves the user to the previous group of the track.
///
/// A user at the first group leaves the track.
pub fn demote<G: GroupLookup>(
    groups: &G,
    user: &User,
    track: &Track,
    context: &ContextSet,
) -> Result<PromotionOutcome, PromotionError> {
    let current = memberships(user, track, context);
    match current.as_slice() {
        [] => Err(PromotionError::NotOnTrack(track.name().to_string())),
        [from] => {
            let to = track.previous(from)?;
            if let Some(to) = to {
                require_loaded(groups, to)?;
            }
            replace_membership(user, Some(from.as_str()), to, context);
            debug!(user = %user.id(), track = track.name(), from = %from, ?to, "user demoted");
            Ok(PromotionOutcome::Demoted {
                from: from.clone(),
                to: to.map(str::to_string),
            })
        }
        _ => Err(PromotionError::AmbiguousCall(
            track.name().to_string(),
            current.len(),
        )),
    }
}
