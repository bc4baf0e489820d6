//! Feature-diagram trees: construction, name resolution, and declaration
//! checking.
//!
//! A [`Fm`] owns every node of a checked feature model in a single arena
//! (see [`crate::entity`]); [`FdBuilder`] assembles one bottom-up from
//! sub-diagrams, matching the source engine's nested-constructor style
//! without Python's `*args`/`**kwargs` flexibility.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::entity::{EntityRef, NodeId};
use crate::error::{DeclErrors, FmError};
use crate::expr::{Expr, IntoExpr, VarRef};
use crate::path::{path_includes, path_to_str, Path};
use crate::product::Product;
use crate::value::Domain;

/// How a feature's children combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// All children must be selected whenever this feature is.
    And,
    /// At least one child must be selected whenever this feature is.
    Or,
    /// Exactly one child must be selected whenever this feature is.
    Xor,
    /// Any number of children (including none) may be selected.
    Any,
}

impl GroupKind {
    fn compute(self, values: &[bool]) -> bool {
        match self {
            GroupKind::And => values.iter().all(|&v| v),
            GroupKind::Or => values.iter().any(|&v| v),
            GroupKind::Any => true,
            GroupKind::Xor => {
                let mut found = false;
                for &v in values {
                    if v {
                        if found {
                            return false;
                        }
                        found = true;
                    }
                }
                found
            }
        }
    }

    /// What this group requires of a child/attribute/CTC's own truth
    /// value, given what's required of the group as a whole.
    fn child_expected(self, expected: Option<bool>) -> Option<bool> {
        match self {
            GroupKind::And => {
                if expected == Some(true) {
                    Some(true)
                } else {
                    None
                }
            }
            GroupKind::Or => {
                if expected == Some(true) {
                    None
                } else {
                    Some(false)
                }
            }
            GroupKind::Xor | GroupKind::Any => None,
        }
    }
}

/// One node's data within a [`Fm`]'s arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// The feature's declared name, or `None` for an anonymous grouping node.
    pub name: Option<String>,
    /// This node's children, by arena index.
    pub children: Vec<NodeId>,
    /// How the children combine.
    pub group: GroupKind,
    /// Cross-tree constraints declared at this node.
    pub ctcs: Vec<Expr>,
    /// This node's own attributes: name and accepted value domain.
    pub attributes: Vec<(String, Domain)>,
}

/// A table mapping declared names to every node/attribute that carries
/// that name, with the path each was declared at — built by
/// [`Fm::check`] and consulted while resolving [`crate::expr::VarRef`]s.
#[derive(Debug, Default)]
pub struct Lookup {
    by_name: HashMap<String, Vec<(EntityRef, Path)>>,
}

impl Lookup {
    fn new() -> Self {
        Self::default()
    }

    /// Registers a declaration, reporting an ambiguity if an existing
    /// declaration's path is reachable from (an ordered subsequence of)
    /// this one's.
    fn declare(&mut self, name: String, path: Path, entity: EntityRef, errors: &mut DeclErrors) {
        let entry = self.by_name.entry(name.clone()).or_default();
        let others: Vec<Path> = entry
            .iter()
            .filter(|(_, other)| path_includes(&path, other))
            .map(|(_, other)| other.clone())
            .collect();
        if !others.is_empty() {
            errors.add_ambiguous(name, Some(path.clone()), others);
        }
        entry.push((entity, path));
    }

    /// Resolves a written reference (`var_path`, as split into segments)
    /// declared at `context`, per the source engine's ordered-subsequence
    /// disambiguation.
    pub fn resolve(&self, context: &Path, var_path: &Path, errors: &mut DeclErrors) -> Option<VarRef> {
        let name = var_path.last()?.clone();
        let prefix: Path = context
            .iter()
            .cloned()
            .chain(var_path[..var_path.len() - 1].iter().cloned())
            .collect();
        let path_s = path_to_str(Some(var_path));
        match self.by_name.get(&name) {
            None => {
                errors.add_unbound(name, None);
                None
            }
            Some(decls) => {
                let matches: Vec<&(EntityRef, Path)> =
                    decls.iter().filter(|(_, p)| path_includes(p, &prefix)).collect();
                match matches.len() {
                    0 => {
                        errors.add_unbound(path_s, Some(context.clone()));
                        None
                    }
                    1 => Some(to_var_ref(matches[0].0)),
                    _ => {
                        let candidates = matches.iter().map(|(_, p)| p.clone()).collect();
                        errors.add_ambiguous(path_s, None, candidates);
                        None
                    }
                }
            }
        }
    }
}

fn to_var_ref(e: EntityRef) -> VarRef {
    match e {
        EntityRef::Node(n) => VarRef::Node(n),
        EntityRef::Attr(n, i) => VarRef::Attr(n, i),
    }
}

type NormHook = Arc<dyn Fn(&Fm, &Product) -> Product + Send + Sync>;

static DEFAULT_NORM: OnceLock<Mutex<Option<NormHook>>> = OnceLock::new();

/// Installs a process-wide default product-normalization hook, applied to
/// every [`Fm`] built afterwards unless overridden per-instance with
/// [`Fm::set_product_normalization`].
pub fn set_default_product_normalization(f: impl Fn(&Fm, &Product) -> Product + Send + Sync + 'static) {
    let cell = DEFAULT_NORM.get_or_init(|| Mutex::new(None));
    *cell.lock().unwrap() = Some(Arc::new(f));
}

fn default_norm() -> Option<NormHook> {
    DEFAULT_NORM.get().and_then(|m| m.lock().unwrap().clone())
}

/// A feature-diagram tree: an arena of [`NodeData`], plus the lookup
/// table and rendered-path index built by [`Fm::check`].
pub struct Fm {
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) root: NodeId,
    lookup: Option<Lookup>,
    dom: Option<HashMap<EntityRef, String>>,
    errors: Option<DeclErrors>,
    norm: Option<NormHook>,
}

impl Fm {
    /// The root node's declared name, if any.
    pub fn name(&self) -> Option<&str> {
        self.nodes[self.root].name.as_deref()
    }

    /// True once [`Fm::check`] has run (and [`Fm::clean`] hasn't since).
    pub fn is_checked(&self) -> bool {
        self.lookup.is_some()
    }

    /// Installs a per-instance product-normalization hook, overriding the
    /// process-wide default for this model.
    pub fn set_product_normalization(&mut self, f: impl Fn(&Fm, &Product) -> Product + Send + Sync + 'static) {
        self.norm = Some(Arc::new(f));
    }

    /// Discards the cached lookup table, path index, and declaration
    /// errors, forcing the next [`Fm::check`] to recompute them.
    pub fn clean(&mut self) {
        self.lookup = None;
        self.dom = None;
        self.errors = None;
    }

    /// Builds (or returns the cached) lookup table and path index,
    /// reporting every unbound/ambiguous reference found along the way.
    pub fn check(&mut self) -> DeclErrors {
        if self.lookup.is_none() {
            let mut lookup = Lookup::new();
            let mut dom = HashMap::new();
            let mut errors = DeclErrors::new();
            let mut path = Vec::new();
            let root = self.root;
            self.generate_lookup_rec(root, &mut path, 0, &mut lookup, &mut dom, &mut errors);
            self.lookup = Some(lookup);
            self.dom = Some(dom);
            self.errors = Some(errors);
        }
        self.errors.clone().unwrap()
    }

    /// Resolves a constraint expression's variables against this
    /// (checked) model's root scope, without attaching it to the tree.
    pub fn nf_constraint(&self, c: impl IntoExpr) -> Result<(Expr, DeclErrors), FmError> {
        let lookup = self.lookup.as_ref().ok_or(FmError::NotRoot("constraint"))?;
        let mut errors = DeclErrors::new();
        let mut expr = c.into_expr();
        let root_path = vec![self.nodes[self.root].name.clone().unwrap_or_else(|| "0".to_string())];
        expr.resolve(&root_path, lookup, &mut errors);
        Ok((expr, errors))
    }

    pub(crate) fn lookup(&self) -> Option<&Lookup> {
        self.lookup.as_ref()
    }

    pub(crate) fn dom(&self) -> Option<&HashMap<EntityRef, String>> {
        self.dom.as_ref()
    }

    pub(crate) fn norm_hook(&self) -> Option<&NormHook> {
        self.norm.as_ref()
    }

    fn generate_lookup_rec(
        &mut self,
        node: NodeId,
        path_to_self: &mut Path,
        idx: usize,
        lookup: &mut Lookup,
        dom: &mut HashMap<EntityRef, String>,
        errors: &mut DeclErrors,
    ) {
        let name = self.nodes[node].name.clone();
        let seg = name.clone().unwrap_or_else(|| idx.to_string());
        path_to_self.push(seg);
        let local_path = path_to_self.clone();

        if let Some(n) = &name {
            lookup.declare(n.clone(), local_path.clone(), EntityRef::Node(node), errors);
            dom.insert(EntityRef::Node(node), path_to_str(Some(&local_path)));
        }

        let children = self.nodes[node].children.clone();
        for (i, child) in children.iter().enumerate() {
            self.generate_lookup_rec(*child, path_to_self, i, lookup, dom, errors);
        }

        let attr_names: Vec<String> = self.nodes[node].attributes.iter().map(|(n, _)| n.clone()).collect();
        for (i, aname) in attr_names.iter().enumerate() {
            lookup.declare(aname.clone(), local_path.clone(), EntityRef::Attr(node, i), errors);
            let mut ap = local_path.clone();
            ap.push(aname.clone());
            dom.insert(EntityRef::Attr(node, i), path_to_str(Some(&ap)));
        }

        let mut ctcs = std::mem::take(&mut self.nodes[node].ctcs);
        for ctc in ctcs.iter_mut() {
            ctc.resolve(&local_path, lookup, errors);
        }
        self.nodes[node].ctcs = ctcs;

        path_to_self.pop();
    }
}

/// Assembles a [`Fm`] bottom-up: sub-diagrams are finished with `.build()`
/// and attached to a parent builder via `.child()`.
pub struct FdBuilder {
    name: Option<String>,
    group: GroupKind,
    nodes: Vec<NodeData>,
    children: Vec<NodeId>,
    ctcs: Vec<Expr>,
    attributes: Vec<(String, Domain)>,
}

impl FdBuilder {
    fn new(group: GroupKind, name: Option<String>) -> Self {
        FdBuilder {
            name,
            group,
            nodes: vec![placeholder_node()],
            children: Vec::new(),
            ctcs: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// A named `And` group (all children required). Alias: [`fd`].
    pub fn and(name: impl Into<String>) -> Self {
        Self::new(GroupKind::And, Some(name.into()))
    }
    /// An anonymous `And` group.
    pub fn and_anon() -> Self {
        Self::new(GroupKind::And, None)
    }
    /// A named `Or` group (at least one child required).
    pub fn or(name: impl Into<String>) -> Self {
        Self::new(GroupKind::Or, Some(name.into()))
    }
    /// An anonymous `Or` group.
    pub fn or_anon() -> Self {
        Self::new(GroupKind::Or, None)
    }
    /// A named `Xor` group (exactly one child required).
    pub fn xor(name: impl Into<String>) -> Self {
        Self::new(GroupKind::Xor, Some(name.into()))
    }
    /// An anonymous `Xor` group.
    pub fn xor_anon() -> Self {
        Self::new(GroupKind::Xor, None)
    }
    /// A named `Any` group (no constraint on children).
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(GroupKind::Any, Some(name.into()))
    }
    /// An anonymous `Any` group.
    pub fn any_anon() -> Self {
        Self::new(GroupKind::Any, None)
    }

    /// Attaches a finished sub-diagram as a child.
    pub fn child(mut self, sub: Fm) -> Self {
        let offset = self.nodes.len();
        for mut nd in sub.nodes {
            for c in nd.children.iter_mut() {
                *c += offset;
            }
            self.nodes.push(nd);
        }
        self.children.push(offset + sub.root);
        self
    }

    /// Attaches a cross-tree constraint at this node.
    pub fn ctc(mut self, c: impl IntoExpr) -> Self {
        self.ctcs.push(c.into_expr());
        self
    }

    /// Declares an attribute by name and its accepted value domain.
    pub fn attr(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.attributes.push((name.into(), domain));
        self
    }

    /// Finishes this node, producing a standalone [`Fm`] (root index `0`).
    pub fn build(mut self) -> Fm {
        self.nodes[0] = NodeData {
            name: self.name,
            children: self.children,
            group: self.group,
            ctcs: self.ctcs,
            attributes: self.attributes,
        };
        Fm { nodes: self.nodes, root: 0, lookup: None, dom: None, errors: None, norm: default_norm() }
    }
}

fn placeholder_node() -> NodeData {
    NodeData { name: None, children: Vec::new(), group: GroupKind::And, ctcs: Vec::new(), attributes: Vec::new() }
}

/// Alias for [`FdBuilder::and`], matching the source engine's `FD` being
/// a plain synonym for an `And` feature.
pub fn fd(name: impl Into<String>) -> FdBuilder {
    FdBuilder::and(name)
}
