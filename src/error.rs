//! Error channels.
//!
//! The engine separates two kinds of failure, matching the source
//! engine's split between explanatory data and programmer errors:
//!
//! - [`DeclErrors`] accumulates unbound/ambiguous name-resolution
//!   diagnostics; it is returned to the caller for inspection, never raised.
//! - [`FmError`] is raised for construction-time shape violations and
//!   precondition violations (evaluating or normalizing a model that
//!   hasn't been `check`ed).

use std::fmt;

use crate::path::{path_to_str, Path};

/// A reference that could not be resolved to exactly one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnboundRef {
    /// The unresolved name.
    pub name: String,
    /// The path context the lookup was rooted at, if any.
    pub path: Option<Path>,
}

impl fmt::Display for UnboundRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            None => write!(f, "ERROR: variable \"{}\" not declared", self.name),
            Some(p) => write!(
                f,
                "ERROR: variable \"{}\" not declared in path \"{}\"",
                self.name,
                path_to_str(Some(p))
            ),
        }
    }
}

/// A reference that resolved to more than one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmbiguousRef {
    /// The ambiguous name.
    pub name: String,
    /// The path context the reference was attached at, if any.
    pub path: Option<Path>,
    /// The canonical paths of every candidate the name resolved to.
    pub candidates: Vec<Path>,
}

impl fmt::Display for AmbiguousRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let candidates = self
            .candidates
            .iter()
            .map(|p| format!("\"{}\"", path_to_str(Some(p))))
            .collect::<Vec<_>>()
            .join(", ");
        match &self.path {
            None => write!(
                f,
                "ERROR: reference \"{}\" is ambiguous (corresponds to paths: {})",
                self.name, candidates
            ),
            Some(p) => write!(
                f,
                "ERROR: reference \"{}[{}]\" is ambiguous (corresponds to paths: {})",
                path_to_str(Some(p)),
                self.name,
                candidates
            ),
        }
    }
}

/// Accumulates unbound and ambiguous reference diagnostics raised while
/// resolving names during `check`, `nf_constraint`, or `nf_product`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeclErrors {
    unbounds: Vec<UnboundRef>,
    ambiguities: Vec<AmbiguousRef>,
}

impl DeclErrors {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an unbound reference.
    pub fn add_unbound(&mut self, name: impl Into<String>, path: Option<Path>) {
        self.unbounds.push(UnboundRef {
            name: name.into(),
            path,
        });
    }

    /// Records an ambiguous reference and its candidate paths.
    pub fn add_ambiguous(&mut self, name: impl Into<String>, path: Option<Path>, candidates: Vec<Path>) {
        self.ambiguities.push(AmbiguousRef {
            name: name.into(),
            path,
            candidates,
        });
    }

    /// The unbound-reference diagnostics, in the order they were recorded.
    pub fn unbounds(&self) -> &[UnboundRef] {
        &self.unbounds
    }

    /// The ambiguous-reference diagnostics, in the order they were recorded.
    pub fn ambiguities(&self) -> &[AmbiguousRef] {
        &self.ambiguities
    }

    /// True iff any unbound reference was recorded.
    pub fn has_unbound(&self) -> bool {
        !self.unbounds.is_empty()
    }

    /// True iff any ambiguous reference was recorded.
    pub fn has_ambiguous(&self) -> bool {
        !self.ambiguities.is_empty()
    }

    /// True iff no diagnostics were recorded at all.
    pub fn is_empty(&self) -> bool {
        self.unbounds.is_empty() && self.ambiguities.is_empty()
    }

    /// Merges another accumulator's diagnostics into this one, preserving order.
    pub fn extend(&mut self, other: DeclErrors) {
        self.unbounds.extend(other.unbounds);
        self.ambiguities.extend(other.ambiguities);
    }
}

impl fmt::Display for DeclErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for e in &self.unbounds {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
            first = false;
        }
        for e in &self.ambiguities {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
            first = false;
        }
        Ok(())
    }
}

/// Fatal errors: construction-time shape violations and precondition
/// violations. These are raised synchronously, never accumulated.
#[derive(Debug, thiserror::Error)]
pub enum FmError {
    /// A feature-diagram constructor received something other than a
    /// sub-[`Fd`](crate::fd::Fd), a constraint expression, or an attribute.
    #[error("unexpected FD subtree (found {0})")]
    UnexpectedSubtree(&'static str),

    /// A domain specification was malformed (wrong arity, non-numeric bound, …).
    #[error("malformed domain specification: {0}")]
    MalformedDomain(String),

    /// `nf_constraint`/`nf_product` were called on a feature diagram that
    /// isn't the checked root.
    #[error("a non-root feature cannot put a {0} in normal form")]
    NotRoot(&'static str),

    /// Evaluation or normalization was attempted before `check()`.
    #[error("evaluating a non-well-formed FM: call check() on it first")]
    NotChecked,
}
