//! Dataset admission rules
//!
//! Exclusion is checked before inclusion, so an excluded name can never be
//! re-admitted by the include list.

use std::collections::HashSet;
use std::fmt;

use super::types::CatalogNode;

/// Why a catalog node is not reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `type == "collection"` grouping node
    Group,
    /// Node with nested `children`/`datasets`
    Container,
    /// Name is on the exclude list
    Excluded,
    /// Include list is non-empty and does not name this node
    NotIncluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Group => "grouping node",
            SkipReason::Container => "container node",
            SkipReason::Excluded => "excluded",
            SkipReason::NotIncluded => "not in include list",
        };
        f.write_str(text)
    }
}

/// Outcome of running a node through the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Reconcile,
    Skip(SkipReason),
}

/// Name-based include/exclude filter
#[derive(Debug, Clone, Default)]
pub struct DatasetFilter {
    exclude: HashSet<String>,
    include: HashSet<String>,
}

impl DatasetFilter {
    /// Build a filter from exclude and include name lists
    pub fn new<E, I>(exclude: E, include: I) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            exclude: exclude.into_iter().map(Into::into).collect(),
            include: include.into_iter().map(Into::into).collect(),
        }
    }

    /// Decide whether `node` should be reconciled
    pub fn admit(&self, node: &CatalogNode) -> Admission {
        if node.is_group() {
            return Admission::Skip(SkipReason::Group);
        }
        if node.is_container() {
            return Admission::Skip(SkipReason::Container);
        }
        if self.exclude.contains(&node.name) {
            return Admission::Skip(SkipReason::Excluded);
        }
        if !self.include.is_empty() && !self.include.contains(&node.name) {
            return Admission::Skip(SkipReason::NotIncluded);
        }
        Admission::Reconcile
    }

    /// Whether any include names were given
    pub fn has_include_list(&self) -> bool {
        !self.include.is_empty()
    }
}
