//! Product normalization: merging several partial configurations into one
//! total product, with "most recently supplied partial wins" provenance.

use std::collections::HashMap;

use crate::entity::{EntityRef, NodeId};
use crate::error::{DeclErrors, FmError};
use crate::fd::{Fm, GroupKind};
use crate::path::path_from_str;
use crate::product::{Product, ProductKey};
use crate::value::Value;

/// `(value, provenance)`: the value last written to an entity, and the
/// index of the partial product that wrote it (`-1` for "never written").
type Prov = (Value, i64);

impl Fm {
    /// Merges `partials` (applied in order, later ones overriding earlier
    /// ones per-key) into a single total product, inferring every
    /// unmentioned feature's selection from its group semantics.
    pub fn nf_product(&self, partials: &[Product]) -> Result<(Product, DeclErrors), FmError> {
        let lookup = self.lookup().ok_or(FmError::NotRoot("product"))?;
        let mut errors = DeclErrors::new();
        let mut is_true_d: HashMap<EntityRef, Prov> = HashMap::new();

        for (i, partial) in partials.iter().enumerate() {
            let normalized = match self.norm_hook() {
                Some(hook) => hook(self, partial),
                None => partial.clone(),
            };
            for (key, val) in normalized.iter() {
                let entity = match key {
                    ProductKey::Entity(e) => Some(*e),
                    ProductKey::Path(s) => {
                        let var_path = path_from_str(s);
                        lookup.resolve(&Vec::new(), &var_path, &mut errors).map(|v| match v {
                            crate::expr::VarRef::Node(n) => EntityRef::Node(n),
                            crate::expr::VarRef::Attr(n, a) => EntityRef::Attr(n, a),
                            crate::expr::VarRef::Unresolved(_) => unreachable!(),
                        })
                    }
                };
                if let Some(e) = entity {
                    is_true_d.insert(e, (val.clone(), i as i64));
                }
            }
        }

        self.make_product_rec_1(self.root, &mut is_true_d);

        let mut res = Product::new();
        let v_local = is_true_d.get(&EntityRef::Node(self.root)).map(|(v, _)| v.truthy()).unwrap_or(false);
        self.make_product_rec_2(self.root, v_local, &is_true_d, &mut res);
        Ok((res, errors))
    }

    fn make_product_rec_1(&self, node: NodeId, is_true_d: &mut HashMap<EntityRef, Prov>) {
        let (idx, v_local, v_subs) = self.infer_sv(node, is_true_d);
        self.make_product_update(node, is_true_d, idx, v_local, &v_subs);
        let children = self.nodes[node].children.clone();
        for c in children {
            self.make_product_rec_1(c, is_true_d);
        }
        let (idx, v_local, v_subs) = self.infer_sv(node, is_true_d);
        self.make_product_update(node, is_true_d, idx, v_local, &v_subs);
    }

    fn make_product_update(
        &self,
        node: NodeId,
        is_true_d: &mut HashMap<EntityRef, Prov>,
        idx: i64,
        v_local: Option<Value>,
        v_subs: &[Option<Value>],
    ) {
        if let Some(v) = v_local {
            is_true_d.insert(EntityRef::Node(node), (v, idx));
        }
        for (&child, v_sub) in self.nodes[node].children.iter().zip(v_subs) {
            if let Some(v) = v_sub {
                is_true_d.insert(EntityRef::Node(child), (v.clone(), idx));
            }
        }
    }

    fn make_product_rec_2(&self, node: NodeId, v_local: bool, is_true_d: &HashMap<EntityRef, Prov>, res: &mut Product) {
        let (_, _, v_subs) = self.infer_sv(node, is_true_d);
        res.set(EntityRef::Node(node), Value::Bool(v_local));
        let children = self.nodes[node].children.clone();
        for (i, c) in children.iter().enumerate() {
            let v_sub = v_subs.get(i).and_then(|v| v.as_ref()).map(Value::truthy).unwrap_or(false);
            self.make_product_rec_2(*c, v_sub, is_true_d, res);
        }
        if v_local {
            for (i, _) in self.nodes[node].attributes.iter().enumerate() {
                if let Some((v, _)) = is_true_d.get(&EntityRef::Attr(node, i)) {
                    res.set(EntityRef::Attr(node, i), v.clone());
                }
            }
        }
    }

    /// Infers this node's and its children's selection, and the
    /// provenance index that decided it, from `is_true_d` alone.
    fn infer_sv(&self, node: NodeId, is_true_d: &HashMap<EntityRef, Prov>) -> (i64, Option<Value>, Vec<Option<Value>>) {
        let nd = &self.nodes[node];
        let self_ref = EntityRef::Node(node);
        match nd.group {
            GroupKind::And => {
                let domain: Vec<EntityRef> =
                    std::iter::once(self_ref).chain(nd.children.iter().map(|&c| EntityRef::Node(c))).collect();
                let (idx, value) = extract_none(is_true_d, &domain);
                let get_default = |el: EntityRef| -> Option<Value> {
                    match is_true_d.get(&el) {
                        Some((v, i)) if *i >= idx => Some(v.clone()),
                        _ => value.clone(),
                    }
                };
                let v_local = get_default(self_ref);
                let v_subs = nd.children.iter().map(|&c| get_default(EntityRef::Node(c))).collect();
                (idx, v_local, v_subs)
            }
            GroupKind::Or | GroupKind::Any => {
                let domain: Vec<EntityRef> = nd.children.iter().map(|&c| EntityRef::Node(c)).collect();
                let (idx_subs, v_subs) = extract_expected(is_true_d, &domain, true);
                let (mut v_local, mut idx_local) = local_default(is_true_d, self_ref);
                if idx_subs > idx_local {
                    idx_local = idx_subs;
                    v_local = true;
                }
                (idx_local, Some(Value::Bool(v_local)), v_subs)
            }
            GroupKind::Xor => {
                let domain: Vec<EntityRef> = nd.children.iter().map(|&c| EntityRef::Node(c)).collect();
                let (idx_subs, mut v_subs) = extract_expected(is_true_d, &domain, true);
                let (mut v_local, mut idx_local) = local_default(is_true_d, self_ref);
                if idx_subs > idx_local {
                    idx_local = idx_subs;
                    v_local = true;
                }
                if idx_subs > -1 {
                    v_subs = nd
                        .children
                        .iter()
                        .map(|&c| {
                            let matches = matches!(
                                is_true_d.get(&EntityRef::Node(c)),
                                Some((v, i)) if v.truthy() && *i == idx_subs
                            );
                            Some(Value::Bool(matches))
                        })
                        .collect();
                }
                (idx_local, Some(Value::Bool(v_local)), v_subs)
            }
        }
    }
}

fn local_default(is_true_d: &HashMap<EntityRef, Prov>, el: EntityRef) -> (bool, i64) {
    match is_true_d.get(&el) {
        Some((v, i)) => (v.truthy(), *i),
        None => (false, -1),
    }
}

/// Scans `domain`, returning the highest provenance index found and the
/// value stored there (ties keep the first one found).
fn extract_none(is_true_d: &HashMap<EntityRef, Prov>, domain: &[EntityRef]) -> (i64, Option<Value>) {
    let mut idx = -1i64;
    let mut value = None;
    for &el in domain {
        if let Some((v, i)) = is_true_d.get(&el) {
            if *i > idx {
                idx = *i;
                value = Some(v.clone());
            }
        }
    }
    (idx, value)
}

/// Scans `domain`, returning each element's own stored value (raw,
/// `None` if absent) and the highest provenance index among elements
/// whose stored value equals `expected`.
fn extract_expected(is_true_d: &HashMap<EntityRef, Prov>, domain: &[EntityRef], expected: bool) -> (i64, Vec<Option<Value>>) {
    let mut idx = -1i64;
    let mut v_subs = Vec::with_capacity(domain.len());
    for &el in domain {
        match is_true_d.get(&el) {
            None => v_subs.push(None),
            Some((v, i)) => {
                if v.truthy() == expected && *i > idx {
                    idx = *i;
                }
                v_subs.push(Some(v.clone()));
            }
        }
    }
    (idx, v_subs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fd::FdBuilder;

    #[test]
    fn and_group_defaults_children_to_most_recent_partial() {
        let mut fm = FdBuilder::and("Root").child(FdBuilder::and("A").build()).child(FdBuilder::and("B").build()).build();
        fm.check();
        let p1 = Product::new().with(EntityRef::Node(0), Value::Bool(true));
        let (res, errors) = fm.nf_product(&[p1]).unwrap();
        assert!(errors.is_empty());
        assert_eq!(res.get(&ProductKey::Entity(EntityRef::Node(0))), Some(&Value::Bool(true)));
        assert_eq!(res.get(&ProductKey::Entity(EntityRef::Node(1))), Some(&Value::Bool(true)));
        assert_eq!(res.get(&ProductKey::Entity(EntityRef::Node(2))), Some(&Value::Bool(true)));
    }

    #[test]
    fn later_partial_overrides_earlier_one() {
        let mut fm = FdBuilder::and("Root").child(FdBuilder::and("A").build()).build();
        fm.check();
        let p1 = Product::new().with(EntityRef::Node(1), Value::Bool(true));
        let p2 = Product::new().with(EntityRef::Node(1), Value::Bool(false));
        let (res, _) = fm.nf_product(&[p1, p2]).unwrap();
        assert_eq!(res.get(&ProductKey::Entity(EntityRef::Node(1))), Some(&Value::Bool(false)));
    }

    #[test]
    fn name_resolves_string_keys_in_partials() {
        let mut fm = FdBuilder::and("Root").child(FdBuilder::and("A").build()).build();
        fm.check();
        let p1 = Product::new().with("Root", Value::Bool(true)).with("Root/A", Value::Bool(true));
        let (res, errors) = fm.nf_product(&[p1]).unwrap();
        assert!(errors.is_empty());
        assert_eq!(res.get(&ProductKey::Entity(EntityRef::Node(1))), Some(&Value::Bool(true)));
    }

    #[test]
    fn xor_group_selects_only_the_winning_child() {
        let mut fm = FdBuilder::xor("Lang").child(FdBuilder::and("En").build()).child(FdBuilder::and("De").build()).build();
        fm.check();
        let p1 = Product::new().with(EntityRef::Node(0), Value::Bool(true)).with(EntityRef::Node(1), Value::Bool(true));
        let (res, _) = fm.nf_product(&[p1]).unwrap();
        assert_eq!(res.get(&ProductKey::Entity(EntityRef::Node(1))), Some(&Value::Bool(true)));
        assert_eq!(res.get(&ProductKey::Entity(EntityRef::Node(2))), Some(&Value::Bool(false)));
    }
}
