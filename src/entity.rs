//! Stable identities for nodes and attributes within a checked model.
//!
//! Per the design note on cyclic back-references: constraint leaves and
//! reason-tree references point at nodes by a stable arena index rather
//! than an owning pointer, since the [`crate::fd::Fm`] owns every node.

/// A node's position in the model's arena. Index `0` is always the root.
pub type NodeId = usize;

/// A resolved reference to a feature node or one of its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityRef {
    /// The feature node itself.
    Node(NodeId),
    /// The attribute at the given index within that node's attribute list.
    Attr(NodeId, usize),
}
