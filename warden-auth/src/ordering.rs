// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local priority order of the nodes of one holder.
//!
//! This order alone decides which node "wins" between nodes of the same holder: resolution keeps
//! it and all later stages take the first applicable node.
use std::cmp::{Ordering, Reverse};

use warden_core::Node;

/// Compares two nodes of the same holder, more specific nodes sort first.
///
/// 1. Nodes restricted to server and world beat server-only beat world-only beat global nodes,
///    more additional contexts beat fewer.
/// 2. Prefix and suffix nodes with a higher priority come first.
/// 3. Exact permissions beat wildcards, more specific wildcards beat less specific ones and
///    longer keys beat shorter ones.
/// 4. Temporary nodes beat permanent ones.
///
/// Remaining ties are broken by comparing all fields to keep the order total, this places
/// negated nodes before granting ones.
pub fn compare_priority(a: &Node, b: &Node) -> Ordering {
    Reverse(a.context().specificity())
        .cmp(&Reverse(b.context().specificity()))
        .then_with(|| Reverse(a.context().extra().len()).cmp(&Reverse(b.context().extra().len())))
        .then_with(|| Reverse(a.chat_priority()).cmp(&Reverse(b.chat_priority())))
        .then_with(|| a.is_wildcard().cmp(&b.is_wildcard()))
        .then_with(|| Reverse(a.wildcard_level()).cmp(&Reverse(b.wildcard_level())))
        .then_with(|| Reverse(a.key().len()).cmp(&Reverse(b.key().len())))
        .then_with(|| a.is_permanent().cmp(&b.is_permanent()))
        .then_with(|| a.cmp(b))
}

pub(crate) fn sort_by_priority(nodes: &mut [Node]) {
    nodes.sort_by(compare_priority);
}
