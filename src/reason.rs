//! Hierarchical explanation of an evaluation failure.

use std::collections::HashMap;
use std::fmt;

use crate::entity::EntityRef;
use crate::path::path_to_str;
use crate::value::Value;

/// Names something a reason refers to, before or after canonicalization.
///
/// Reason trees are built while a node's resolved [`EntityRef`] identity
/// is all that's known; [`ReasonTree::update_ref`] rewrites every stored
/// reference to its human-readable canonical path once the full model has
/// been evaluated, via the domain map built by `check()`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefLabel {
    /// A resolved node or attribute identity, not yet rendered.
    Entity(EntityRef),
    /// An already-rendered label: a constraint operator's name, or (after
    /// [`ReasonTree::update_ref`]) a feature/attribute's canonical path.
    Rendered(String),
}

impl fmt::Display for RefLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefLabel::Entity(e) => write!(f, "{e:?}"),
            RefLabel::Rendered(s) => write!(f, "{s}"),
        }
    }
}

/// A single local diagnostic attached to a [`ReasonTree`] node.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalReason {
    /// The value at `ref_` differed from what the caller required.
    ValueMismatch {
        /// What the mismatch is about.
        ref_: RefLabel,
        /// The value actually found (or computed).
        got: Value,
        /// What was required, if a fixed expectation applied.
        expected: Option<Value>,
    },
    /// `ref_` has no value in the supplied product.
    ValueNone {
        /// What is missing.
        ref_: RefLabel,
    },
    /// A feature is `False` while one or more of its sub-features were
    /// reported selected.
    Dependencies {
        /// The feature that should have been `True`.
        ref_: RefLabel,
        /// The selected descendants responsible.
        selected: Vec<RefLabel>,
    },
}

impl fmt::Display for LocalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalReason::ValueMismatch { ref_, got, expected } => match expected {
                Some(e) => write!(f, "{ref_} vs {got} (expected: {e})"),
                None => write!(f, "{ref_} vs {got}"),
            },
            LocalReason::ValueNone { ref_ } => {
                write!(f, "{ref_} has no value in the input configuration")
            }
            LocalReason::Dependencies { ref_, selected } => {
                let deps = selected
                    .iter()
                    .map(|d| format!("\"{d}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{ref_} should be True due to dependencies (found: {deps})")
            }
        }
    }
}

/// A node in the hierarchical explanation of why an evaluation failed.
///
/// Empty iff the evaluation it is attached to was valid; see
/// [`ReasonTree::is_empty`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonTree {
    ref_: RefLabel,
    local: Vec<LocalReason>,
    subs: Vec<ReasonTree>,
    count: usize,
}

impl ReasonTree {
    /// A fresh, empty reason tree labeled `ref_`.
    pub fn new(ref_: RefLabel) -> Self {
        ReasonTree { ref_, local: Vec::new(), subs: Vec::new(), count: 0 }
    }

    /// Appends a value-mismatch local reason.
    pub fn add_value_mismatch(&mut self, ref_: RefLabel, got: Value, expected: Option<Value>) {
        self.local.push(LocalReason::ValueMismatch { ref_, got, expected });
        self.count += 1;
    }

    /// Appends a value-missing local reason.
    pub fn add_value_none(&mut self, ref_: RefLabel) {
        self.local.push(LocalReason::ValueNone { ref_ });
        self.count += 1;
    }

    /// Appends a dependencies local reason.
    pub fn add_dependencies(&mut self, ref_: RefLabel, selected: Vec<RefLabel>) {
        self.local.push(LocalReason::Dependencies { ref_, selected });
        self.count += 1;
    }

    /// Attaches `sub` as a child explanation, silently dropping it if it's
    /// empty (i.e. the corresponding sub-evaluation was valid).
    pub fn add_sub(&mut self, sub: Option<ReasonTree>) {
        if let Some(sub) = sub {
            if !sub.is_empty() {
                self.subs.push(sub);
                self.count += 1;
            }
        }
    }

    /// True iff this tree carries no local reasons and no non-empty subtrees.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Rewrites every stored reference through `dom`, turning resolved
    /// identities into their canonical path strings.
    pub fn update_ref(&mut self, dom: &HashMap<EntityRef, String>) {
        self.ref_ = render(&self.ref_, dom);
        for l in &mut self.local {
            match l {
                LocalReason::ValueMismatch { ref_, .. } => *ref_ = render(ref_, dom),
                LocalReason::ValueNone { ref_ } => *ref_ = render(ref_, dom),
                LocalReason::Dependencies { ref_, selected } => {
                    *ref_ = render(ref_, dom);
                    for s in selected.iter_mut() {
                        *s = render(s, dom);
                    }
                }
            }
        }
        for s in &mut self.subs {
            s.update_ref(dom);
        }
    }

    fn render_to(&self, indent: &str, out: &mut String) {
        use std::fmt::Write;
        if self.count == 0 {
            return;
        }
        if self.count == 1 {
            if let Some(l) = self.local.first() {
                let _ = writeln!(out, "{indent}{}: {}", self.ref_, l);
            } else if let Some(s) = self.subs.first() {
                let _ = write!(out, "{indent}{}: ", self.ref_);
                let mut sub_str = String::new();
                s.render_to("", &mut sub_str);
                out.push_str(sub_str.trim_end());
                out.push('\n');
            }
        } else {
            let _ = writeln!(out, "{indent}{}: (", self.ref_);
            let more = format!("{indent} ");
            for l in &self.local {
                let _ = writeln!(out, "{more}{l}");
            }
            for s in &self.subs {
                s.render_to(&more, out);
            }
            let _ = writeln!(out, "{indent})");
        }
    }
}

fn render(label: &RefLabel, dom: &HashMap<EntityRef, String>) -> RefLabel {
    match label {
        RefLabel::Entity(e) => match dom.get(e) {
            Some(p) => RefLabel::Rendered(p.clone()),
            None => RefLabel::Rendered(path_to_str(None)),
        },
        other => other.clone(),
    }
}

impl fmt::Display for ReasonTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render_to("", &mut out);
        write!(f, "{}", out.trim_end_matches('\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lbl(s: &str) -> RefLabel {
        RefLabel::Rendered(s.to_string())
    }

    #[test]
    fn single_local_reason_inlines() {
        let mut t = ReasonTree::new(lbl("lang"));
        t.add_value_mismatch(lbl("lang"), Value::Bool(false), Some(Value::Bool(true)));
        assert!(!t.is_empty());
        assert_eq!(t.to_string(), "lang: lang vs false (expected: true)");
    }

    #[test]
    fn multi_reason_brackets_with_header() {
        let mut t = ReasonTree::new(lbl("HelloWorld"));
        t.add_value_mismatch(lbl("HelloWorld"), Value::Bool(false), Some(Value::Bool(true)));
        t.add_value_none(lbl("times_v"));
        assert_eq!(t.count, 2);
        let s = t.to_string();
        assert!(s.starts_with("HelloWorld: (\n"));
        assert!(s.ends_with(')'));
    }

    #[test]
    fn empty_sub_is_dropped_silently() {
        let mut t = ReasonTree::new(lbl("root"));
        t.add_sub(Some(ReasonTree::new(lbl("child"))));
        assert!(t.is_empty());
    }
}
