// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lookup specifications deciding which nodes apply.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::context::{ContextSet, SERVER_KEY, WORLD_KEY};
use crate::node::Node;

/// Target context and flags of a permission or meta lookup.
///
/// Query options are immutable and compared by value, structurally identical lookups share the
/// same cache entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QueryOptions {
    context: ContextSet,
    include_global: bool,
    include_global_world: bool,
    resolve_inheritance: bool,
    apply_global_groups: bool,
    apply_global_world_groups: bool,
    is_op: bool,
    allow_all: bool,
}

impl QueryOptions {
    /// Query without any context where all global nodes and groups apply.
    pub fn global() -> Self {
        Self::builder().build()
    }

    /// Query for the given context where all global nodes and groups apply as well.
    pub fn contextual(context: ContextSet) -> Self {
        Self::builder().context(context).build()
    }

    /// Query satisfied by every node regardless of its context.
    ///
    /// Used by views which need to see all data of a holder, for example admin tooling.
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::global()
        }
    }

    pub fn builder() -> QueryOptionsBuilder {
        QueryOptionsBuilder::default()
    }

    pub fn to_builder(&self) -> QueryOptionsBuilder {
        QueryOptionsBuilder {
            options: self.clone(),
        }
    }

    pub fn context(&self) -> &ContextSet {
        &self.context
    }

    pub fn include_global(&self) -> bool {
        self.include_global
    }

    pub fn include_global_world(&self) -> bool {
        self.include_global_world
    }

    pub fn resolve_inheritance(&self) -> bool {
        self.resolve_inheritance
    }

    pub fn apply_global_groups(&self) -> bool {
        self.apply_global_groups
    }

    pub fn apply_global_world_groups(&self) -> bool {
        self.apply_global_world_groups
    }

    pub fn is_op(&self) -> bool {
        self.is_op
    }

    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    /// Returns true if the node applies under this query.
    ///
    /// A node restricted to servers or worlds applies only when the query context contains all of
    /// them. Unrestricted nodes apply depending on the `include_global*` flags, for
    /// group memberships the `apply_global*_groups` flags are used instead. All remaining context
    /// pairs of the node must be part of the query context.
    pub fn satisfies(&self, node: &Node) -> bool {
        if self.allow_all {
            return true;
        }

        let (include_global, include_global_world) = if node.is_group_node() {
            (self.apply_global_groups, self.apply_global_world_groups)
        } else {
            (self.include_global, self.include_global_world)
        };

        self.restriction_applies(node, SERVER_KEY, include_global)
            && self.restriction_applies(node, WORLD_KEY, include_global_world)
            && node.context().extra().is_subset_of(&self.context)
    }

    /// Every value the node holds under `key` must be part of the query context.
    fn restriction_applies(&self, node: &Node, key: &str, include_global: bool) -> bool {
        let mut values = node.context().values(key).peekable();
        if values.peek().is_none() {
            return include_global;
        }
        values.all(|value| self.context.contains(key, value))
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::global()
    }
}

/// Builder for [`QueryOptions`], all flags default to `true` except `is_op`.
#[derive(Clone, Debug)]
pub struct QueryOptionsBuilder {
    options: QueryOptions,
}

impl Default for QueryOptionsBuilder {
    fn default() -> Self {
        Self {
            options: QueryOptions {
                context: ContextSet::empty(),
                include_global: true,
                include_global_world: true,
                resolve_inheritance: true,
                apply_global_groups: true,
                apply_global_world_groups: true,
                is_op: false,
                allow_all: false,
            },
        }
    }
}

impl QueryOptionsBuilder {
    pub fn context(mut self, context: ContextSet) -> Self {
        self.options.context = context;
        self
    }

    /// Include nodes without a server restriction. Default: `true`.
    pub fn include_global(mut self, value: bool) -> Self {
        self.options.include_global = value;
        self
    }

    /// Include nodes without a world restriction. Default: `true`.
    pub fn include_global_world(mut self, value: bool) -> Self {
        self.options.include_global_world = value;
        self
    }

    /// Walk into inherited groups. Default: `true`.
    pub fn resolve_inheritance(mut self, value: bool) -> Self {
        self.options.resolve_inheritance = value;
        self
    }

    /// Apply group memberships without a server restriction. Default: `true`.
    pub fn apply_global_groups(mut self, value: bool) -> Self {
        self.options.apply_global_groups = value;
        self
    }

    /// Apply group memberships without a world restriction. Default: `true`.
    pub fn apply_global_world_groups(mut self, value: bool) -> Self {
        self.options.apply_global_world_groups = value;
        self
    }

    /// Marks the querying subject as operator of the host. Default: `false`.
    pub fn op(mut self, value: bool) -> Self {
        self.options.is_op = value;
        self
    }

    pub fn build(self) -> QueryOptions {
        self.options
    }
}
