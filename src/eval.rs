//! Feature-diagram evaluation: does a product satisfy a checked model?

use crate::entity::{EntityRef, NodeId};
use crate::error::FmError;
use crate::fd::Fm;
use crate::product::{Product, ProductKey};
use crate::reason::{RefLabel, ReasonTree};
use crate::value::{Domain, Value};

/// The outcome of evaluating a [`Fm`] (or one of its nodes) against a product.
#[derive(Debug, Clone)]
pub struct FdEvalOutcome {
    /// Whether this node and everything below it is internally consistent
    /// and meets whatever was expected of it.
    pub value: bool,
    /// Non-empty iff `value` is `false`.
    pub reason: Option<ReasonTree>,
    /// This node's effective selection, used by its parent's group logic.
    pub nvalue: bool,
    /// Every selected node in this subtree, including this one if selected.
    pub selected: Vec<EntityRef>,
}

struct AttrOutcome {
    value: bool,
    reason: Option<ReasonTree>,
}

impl Fm {
    /// Evaluates `product` against this checked model, requiring the root
    /// to end up selected iff `expected` is `true`.
    pub fn call(&self, product: &Product, expected: bool) -> Result<FdEvalOutcome, FmError> {
        let dom = self.dom().ok_or(FmError::NotChecked)?;
        let mut out = self.eval_node(self.root, product, Some(expected));
        if let Some(r) = out.reason.as_mut() {
            r.update_ref(dom);
        }
        Ok(out)
    }

    fn eval_node(&self, node: NodeId, product: &Product, expected: Option<bool>) -> FdEvalOutcome {
        let nd = &self.nodes[node];
        let child_expected = nd.group.child_expected(expected);

        let results_content: Vec<FdEvalOutcome> =
            nd.children.iter().map(|&c| self.eval_node(c, product, child_expected)).collect();
        let result_att: Vec<AttrOutcome> = nd
            .attributes
            .iter()
            .enumerate()
            .map(|(i, (_, domain))| eval_attribute(node, i, domain, product, child_expected))
            .collect();
        let result_ctc: Vec<crate::expr::EvalOutcome> =
            nd.ctcs.iter().enumerate().map(|(i, c)| c.eval(product, i, child_expected)).collect();

        let nvalue_subs: Vec<bool> = results_content
            .iter()
            .map(|r| r.nvalue)
            .chain(result_att.iter().map(|r| r.value))
            .chain(result_ctc.iter().map(|r| r.value.truthy()))
            .collect();
        let nvalue_sub = nd.group.compute(&nvalue_subs);
        let value_subs = results_content.iter().all(|r| r.value);
        let mut snodes: Vec<EntityRef> = results_content.iter().flat_map(|r| r.selected.clone()).collect();

        let self_ref = RefLabel::Entity(EntityRef::Node(node));
        let mut reason: Option<ReasonTree> = None;
        let nvalue_local: bool;

        if nd.name.is_some() {
            match product.get(&ProductKey::Entity(EntityRef::Node(node))) {
                None => {
                    nvalue_local = false;
                    let mut t = ReasonTree::new(self_ref.clone());
                    t.add_value_none(self_ref.clone());
                    reason = Some(t);
                }
                Some(v) => {
                    let selected = v.truthy();
                    nvalue_local = selected;
                    if !selected && !snodes.is_empty() {
                        let mut t = ReasonTree::new(self_ref.clone());
                        t.add_dependencies(self_ref.clone(), snodes.iter().map(|e| RefLabel::Entity(*e)).collect());
                        reason = Some(t);
                    } else if selected && !nvalue_sub {
                        let mut t = ReasonTree::new(self_ref.clone());
                        t.add_value_mismatch(self_ref.clone(), Value::Bool(true), Some(Value::Bool(false)));
                        reason = Some(t);
                    } else if selected {
                        snodes.push(EntityRef::Node(node));
                    }
                }
            }
        } else {
            nvalue_local = nvalue_sub;
        }

        let value = value_subs && reason.is_none();

        // `expected == None` means "no fixed expectation" and must never
        // itself be reported as a mismatch (see the module-level note on
        // the source engine comparing an unpinned expectation with `!=`).
        let mismatched = matches!(expected, Some(e) if nvalue_local != e);

        if mismatched || !value {
            let t = reason.get_or_insert_with(|| ReasonTree::new(self_ref.clone()));
            if mismatched {
                t.add_value_mismatch(self_ref.clone(), Value::Bool(nvalue_local), expected.map(Value::Bool));
            }
            for r in results_content {
                t.add_sub(r.reason);
            }
            for r in result_att {
                t.add_sub(r.reason);
            }
            for r in result_ctc {
                t.add_sub(r.reason);
            }
        }

        FdEvalOutcome { value, reason, nvalue: nvalue_local, selected: snodes }
    }
}

fn eval_attribute(node: NodeId, attr_idx: usize, domain: &Domain, product: &Product, expected: Option<bool>) -> AttrOutcome {
    let label = RefLabel::Entity(EntityRef::Attr(node, attr_idx));
    match product.get(&ProductKey::Entity(EntityRef::Attr(node, attr_idx))) {
        None => {
            if expected == Some(true) {
                let mut t = ReasonTree::new(label.clone());
                t.add_value_none(label);
                AttrOutcome { value: false, reason: Some(t) }
            } else {
                AttrOutcome { value: false, reason: None }
            }
        }
        Some(v) => {
            let res = domain.accepts(v);
            let mismatched = matches!(expected, Some(e) if res != e);
            if mismatched {
                let mut t = ReasonTree::new(label.clone());
                t.add_value_mismatch(label, Value::Bool(res), expected.map(Value::Bool));
                AttrOutcome { value: res, reason: Some(t) }
            } else {
                AttrOutcome { value: res, reason: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{implies, var};
    use crate::fd::FdBuilder;
    use crate::value::IntervalSpec;

    fn bool_product(pairs: &[(NodeId, bool)]) -> Product {
        pairs.iter().fold(Product::new(), |p, (n, v)| p.with(EntityRef::Node(*n), Value::Bool(*v)))
    }

    #[test]
    fn hello_world_valid_configuration_has_no_reason() {
        let mut fm = FdBuilder::and("HelloWorld")
            .child(
                FdBuilder::xor("language")
                    .child(FdBuilder::and("english").build())
                    .child(FdBuilder::and("german").build())
                    .build(),
            )
            .child(FdBuilder::any_anon().child(FdBuilder::and("times").build()).build())
            .build();
        fm.check();
        // arena: 0 HelloWorld, 1 language(xor), 2 english, 3 german, 4 any, 5 times
        let p = bool_product(&[(0, true), (1, true), (2, true), (3, false), (4, true), (5, true)]);
        let out = fm.call(&p, true).unwrap();
        assert!(out.value, "{:?}", out.reason);
        assert!(out.reason.is_none());
    }

    #[test]
    fn wrong_group_reports_mismatch() {
        let mut fm = FdBuilder::xor("language")
            .child(FdBuilder::and("english").build())
            .child(FdBuilder::and("german").build())
            .build();
        fm.check();
        let p = bool_product(&[(0, true), (1, true), (2, true)]);
        let out = fm.call(&p, true).unwrap();
        assert!(!out.value);
        assert!(out.reason.is_some());
    }

    #[test]
    fn bad_attribute_type_reports_mismatch() {
        let mut fm = FdBuilder::and("Feature").attr("count", Domain::int(&[IntervalSpec::Range(Some(0), None)]).unwrap()).build();
        fm.check();
        let p = Product::new()
            .with(EntityRef::Node(0), Value::Bool(true))
            .with(EntityRef::Attr(0, 0), Value::Int(-5));
        let out = fm.call(&p, true).unwrap();
        assert!(!out.value);
    }

    #[test]
    fn dangling_attribute_reports_value_none() {
        let mut fm = FdBuilder::and("Feature").attr("count", Domain::int(&[]).unwrap()).build();
        fm.check();
        let p = Product::new().with(EntityRef::Node(0), Value::Bool(true));
        let out = fm.call(&p, true).unwrap();
        assert!(!out.value);
        assert!(out.reason.is_some());
    }

    #[test]
    fn ctc_violation_surfaces_through_eval() {
        let mut fm = FdBuilder::and("Root")
            .child(FdBuilder::and("A").build())
            .child(FdBuilder::and("B").build())
            .ctc(implies(var("A"), var("B")))
            .build();
        fm.check();
        let p = bool_product(&[(0, true), (1, true), (2, false)]);
        let out = fm.call(&p, true).unwrap();
        assert!(!out.value);
    }
}
