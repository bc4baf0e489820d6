//! Cross-tree constraint expressions.
//!
//! An [`Expr`] is a small Boolean/relational expression tree: feature and
//! attribute references, literals, and the usual logical and comparison
//! operators. Evaluation threads an `expected: Option<bool>` down the
//! tree the way a feature-diagram group threads it to its children: `Some`
//! pins the sub-expression to a required truth value, `None` means "no
//! fixed expectation" and must never itself be reported as a mismatch
//! (see the module-level note on the source engine's `expected is None`
//! handling, ported deliberately differently here).

use crate::entity::{EntityRef, NodeId};
use crate::error::DeclErrors;
use crate::path::{path_from_str, Path};
use crate::product::{Product, ProductKey};
use crate::reason::{RefLabel, ReasonTree};
use crate::value::Value;

/// The outcome of evaluating an [`Expr`] (or a constraint leaf).
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    /// The computed value (a `Bool` for every operator but `Var`/`Lit`,
    /// which may carry whatever the referenced attribute holds).
    pub value: Value,
    /// Non-empty iff the evaluation didn't meet its `expected` pin.
    pub reason: Option<ReasonTree>,
}

impl EvalOutcome {
    fn ok(value: Value) -> Self {
        EvalOutcome { value, reason: None }
    }

    fn is_empty_reason(&self) -> bool {
        self.reason.as_ref().is_none_or(ReasonTree::is_empty)
    }
}

/// A reference to a feature or attribute inside a constraint expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarRef {
    /// A name (or `/`-joined path), not yet resolved by `check()`.
    Unresolved(String),
    /// A resolved feature node.
    Node(NodeId),
    /// A resolved attribute, by index within its node's attribute list.
    Attr(NodeId, usize),
}

impl VarRef {
    fn key(&self) -> ProductKey {
        match self {
            VarRef::Unresolved(s) => ProductKey::Path(s.clone()),
            VarRef::Node(n) => ProductKey::Entity(EntityRef::Node(*n)),
            VarRef::Attr(n, i) => ProductKey::Entity(EntityRef::Attr(*n, *i)),
        }
    }

    fn label(&self) -> RefLabel {
        match self {
            VarRef::Unresolved(s) => RefLabel::Rendered(s.clone()),
            VarRef::Node(n) => RefLabel::Entity(EntityRef::Node(*n)),
            VarRef::Attr(n, i) => RefLabel::Entity(EntityRef::Attr(*n, *i)),
        }
    }

    /// The unresolved path this reference was written with, if still
    /// unresolved (used to report unbound/ambiguous names during `resolve`).
    fn unresolved_path(&self) -> Option<Path> {
        match self {
            VarRef::Unresolved(s) => Some(path_from_str(s)),
            _ => None,
        }
    }
}

/// A constraint expression over features, attributes, and literals.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A reference to a feature (Boolean selection) or attribute value.
    Var(VarRef),
    /// A constant value.
    Lit(Value),
    /// `left < right`.
    Lt(Box<Expr>, Box<Expr>),
    /// `left <= right`.
    Leq(Box<Expr>, Box<Expr>),
    /// `left == right`.
    Eq(Box<Expr>, Box<Expr>),
    /// `left >= right`.
    Geq(Box<Expr>, Box<Expr>),
    /// `left > right`.
    Gt(Box<Expr>, Box<Expr>),
    /// All operands must hold.
    And(Vec<Expr>),
    /// At least one operand must hold.
    Or(Vec<Expr>),
    /// The operand must not hold.
    Not(Box<Expr>),
    /// Exactly one operand holds.
    Xor(Vec<Expr>),
    /// At most one operand holds.
    Conflict(Vec<Expr>),
    /// `!left || right`.
    Implies(Box<Expr>, Box<Expr>),
    /// `left == right`, as a Boolean equivalence.
    Iff(Box<Expr>, Box<Expr>),
}

/// Anything that can be coerced into an [`Expr`] leaf, mirroring the
/// source engine's flexible constructor arguments (a string becomes a
/// `Var`, anything else becomes a `Lit`).
pub trait IntoExpr {
    /// Converts `self` into an expression.
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &str {
    fn into_expr(self) -> Expr {
        Expr::Var(VarRef::Unresolved(self.to_string()))
    }
}

impl IntoExpr for String {
    fn into_expr(self) -> Expr {
        Expr::Var(VarRef::Unresolved(self))
    }
}

impl IntoExpr for bool {
    fn into_expr(self) -> Expr {
        Expr::Lit(Value::Bool(self))
    }
}

impl IntoExpr for i64 {
    fn into_expr(self) -> Expr {
        Expr::Lit(Value::Int(self))
    }
}

impl IntoExpr for f64 {
    fn into_expr(self) -> Expr {
        Expr::Lit(Value::Float(self))
    }
}

/// Builds a feature/attribute reference, e.g. `var("language/english")`.
pub fn var(name: impl Into<String>) -> Expr {
    Expr::Var(VarRef::Unresolved(name.into()))
}

/// Builds a literal value.
pub fn lit(v: impl Into<Value>) -> Expr {
    Expr::Lit(v.into())
}

/// `left < right`.
pub fn lt(left: impl IntoExpr, right: impl IntoExpr) -> Expr {
    Expr::Lt(Box::new(left.into_expr()), Box::new(right.into_expr()))
}
/// `left <= right`.
pub fn leq(left: impl IntoExpr, right: impl IntoExpr) -> Expr {
    Expr::Leq(Box::new(left.into_expr()), Box::new(right.into_expr()))
}
/// `left == right`.
pub fn eq(left: impl IntoExpr, right: impl IntoExpr) -> Expr {
    Expr::Eq(Box::new(left.into_expr()), Box::new(right.into_expr()))
}
/// `left >= right`.
pub fn geq(left: impl IntoExpr, right: impl IntoExpr) -> Expr {
    Expr::Geq(Box::new(left.into_expr()), Box::new(right.into_expr()))
}
/// `left > right`.
pub fn gt(left: impl IntoExpr, right: impl IntoExpr) -> Expr {
    Expr::Gt(Box::new(left.into_expr()), Box::new(right.into_expr()))
}
/// `and(a, b, c, ...)`.
pub fn and(args: Vec<Expr>) -> Expr {
    Expr::And(args)
}
/// `or(a, b, c, ...)`.
pub fn or(args: Vec<Expr>) -> Expr {
    Expr::Or(args)
}
/// `not(a)`.
pub fn not(arg: impl IntoExpr) -> Expr {
    Expr::Not(Box::new(arg.into_expr()))
}
/// `xor(a, b, c, ...)`: exactly one holds.
pub fn xor(args: Vec<Expr>) -> Expr {
    Expr::Xor(args)
}
/// `conflict(a, b, c, ...)`: at most one holds.
pub fn conflict(args: Vec<Expr>) -> Expr {
    Expr::Conflict(args)
}
/// `implies(a, b)`.
pub fn implies(left: impl IntoExpr, right: impl IntoExpr) -> Expr {
    Expr::Implies(Box::new(left.into_expr()), Box::new(right.into_expr()))
}
/// `iff(a, b)`.
pub fn iff(left: impl IntoExpr, right: impl IntoExpr) -> Expr {
    Expr::Iff(Box::new(left.into_expr()), Box::new(right.into_expr()))
}

/// `Xor`'s reducer: true iff exactly one operand is true.
fn exactly_one_true(values: &[Value]) -> bool {
    let mut found = false;
    for v in values {
        if v.truthy() {
            if found {
                return false;
            }
            found = true;
        }
    }
    found
}

/// `Conflict`'s reducer: true iff at most one operand is true.
fn no_conflict(values: &[Value]) -> bool {
    let mut found = false;
    for v in values {
        if v.truthy() {
            if found {
                return false;
            }
            found = true;
        }
    }
    true
}

fn get_expected(kind: &str, expected: Option<bool>) -> Option<bool> {
    match kind {
        "and" => {
            if expected == Some(true) {
                Some(true)
            } else {
                None
            }
        }
        "or" => {
            if expected == Some(false) {
                Some(false)
            } else {
                None
            }
        }
        "not" => match expected {
            Some(true) => Some(false),
            Some(false) => Some(true),
            None => None,
        },
        _ => None,
    }
}

impl Expr {
    /// Evaluates this expression against `product`, with `idx` identifying
    /// this node's position among its siblings (used only if the node
    /// winds up needing a fresh, un-nameable reason label) and `expected`
    /// the truth value the caller requires (`None` if none is pinned).
    pub fn eval(&self, product: &Product, idx: usize, expected: Option<bool>) -> EvalOutcome {
        match self {
            Expr::Var(v) => {
                let key = v.key();
                match product.get(&key) {
                    Some(val) => EvalOutcome::ok(val.clone()),
                    None => {
                        let mut reason = ReasonTree::new(RefLabel::Rendered("Var".into()));
                        reason.add_value_none(v.label());
                        EvalOutcome { value: Value::Bool(false), reason: Some(reason) }
                    }
                }
            }
            Expr::Lit(v) => EvalOutcome::ok(v.clone()),
            Expr::Lt(l, r) => self.eval_relational("Lt", l, r, product, idx, expected, |a, b| a.less_than(b)),
            Expr::Leq(l, r) => self.eval_relational("Leq", l, r, product, idx, expected, |a, b| a.leq(b)),
            Expr::Eq(l, r) => self.eval_relational("Eq", l, r, product, idx, expected, |a, b| a == b),
            Expr::Geq(l, r) => self.eval_relational("Geq", l, r, product, idx, expected, |a, b| a.geq(b)),
            Expr::Gt(l, r) => self.eval_relational("Gt", l, r, product, idx, expected, |a, b| a.greater_than(b)),
            Expr::And(args) => self.eval_compound("And", args, product, idx, expected, |values| {
                values.iter().all(Value::truthy)
            }, |e| get_expected("and", e)),
            Expr::Or(args) => self.eval_compound("Or", args, product, idx, expected, |values| {
                values.iter().any(Value::truthy)
            }, |e| get_expected("or", e)),
            Expr::Not(a) => self.eval_compound(
                "Not",
                std::slice::from_ref(a.as_ref()),
                product,
                idx,
                expected,
                |values| !values[0].truthy(),
                |e| get_expected("not", e),
            ),
            Expr::Xor(args) => self.eval_compound("Xor", args, product, idx, expected, exactly_one_true, |_| None),
            Expr::Conflict(args) => {
                self.eval_compound("Conflict", args, product, idx, expected, no_conflict, |_| None)
            }
            Expr::Implies(l, r) => {
                let args = [(**l).clone(), (**r).clone()];
                self.eval_compound("Implies", &args, product, idx, expected, |values| {
                    !values[0].truthy() || values[1].truthy()
                }, |_| None)
            }
            Expr::Iff(l, r) => {
                let args = [(**l).clone(), (**r).clone()];
                self.eval_compound("Iff", &args, product, idx, expected, |values| values[0] == values[1], |_| None)
            }
        }
    }

    fn eval_relational(
        &self,
        name: &str,
        l: &Expr,
        r: &Expr,
        product: &Product,
        idx: usize,
        expected: Option<bool>,
        compute: impl Fn(&Value, &Value) -> bool,
    ) -> EvalOutcome {
        // relational operators never pin an expectation on their operands
        let left = l.eval(product, 0, None);
        let right = r.eval(product, 1, None);
        let res = compute(&left.value, &right.value);
        let _ = idx;

        let mismatched = matches!(expected, Some(e) if res != e);
        if !mismatched {
            return EvalOutcome::ok(Value::Bool(res));
        }

        let mut reason = ReasonTree::new(RefLabel::Rendered(name.to_string()));
        for (operand, outcome) in [(l, &left), (r, &right)] {
            let label = match operand {
                Expr::Var(v) => v.label(),
                _ => RefLabel::Rendered(operand.describe()),
            };
            reason.add_value_mismatch(label, outcome.value.clone(), None);
        }
        reason.add_sub(left.reason);
        reason.add_sub(right.reason);
        EvalOutcome { value: Value::Bool(res), reason: Some(reason) }
    }

    fn eval_compound(
        &self,
        name: &str,
        args: &[Expr],
        product: &Product,
        idx: usize,
        expected: Option<bool>,
        compute: impl Fn(&[Value]) -> bool,
        child_expected: impl Fn(Option<bool>) -> Option<bool>,
    ) -> EvalOutcome {
        let results: Vec<EvalOutcome> = args
            .iter()
            .enumerate()
            .map(|(i, a)| a.eval(product, i, child_expected(expected)))
            .collect();
        let values: Vec<Value> = results.iter().map(|r| r.value.clone()).collect();
        let res = compute(&values);

        let mismatched = match expected {
            Some(e) => res != e,
            None => false,
        };

        if !mismatched {
            let _ = idx;
            return EvalOutcome::ok(Value::Bool(res));
        }

        let mut reason = ReasonTree::new(RefLabel::Rendered(name.to_string()));
        for (i, a) in args.iter().enumerate() {
            let label = match a {
                Expr::Var(v) => v.label(),
                _ => RefLabel::Rendered(a.describe()),
            };
            reason.add_value_mismatch(label, values[i].clone(), child_expected(expected).map(Value::Bool));
        }
        for r in results {
            reason.add_sub(r.reason);
        }
        EvalOutcome { value: Value::Bool(res), reason: Some(reason) }
    }

    /// A short human label for this expression, used when an operand of a
    /// compound operator isn't itself a bare variable reference.
    fn describe(&self) -> String {
        match self {
            Expr::Var(v) => format!("{}", v.label()),
            Expr::Lit(v) => v.to_string(),
            Expr::Lt(..) => "Lt(..)".to_string(),
            Expr::Leq(..) => "Leq(..)".to_string(),
            Expr::Eq(..) => "Eq(..)".to_string(),
            Expr::Geq(..) => "Geq(..)".to_string(),
            Expr::Gt(..) => "Gt(..)".to_string(),
            Expr::And(..) => "And(..)".to_string(),
            Expr::Or(..) => "Or(..)".to_string(),
            Expr::Not(..) => "Not(..)".to_string(),
            Expr::Xor(..) => "Xor(..)".to_string(),
            Expr::Conflict(..) => "Conflict(..)".to_string(),
            Expr::Implies(..) => "Implies(..)".to_string(),
            Expr::Iff(..) => "Iff(..)".to_string(),
        }
    }

    /// Resolves every `Var` leaf's name against `lookup`, rooted at `path`,
    /// recording unbound/ambiguous references into `errors`.
    pub fn resolve(&mut self, path: &Path, lookup: &crate::fd::Lookup, errors: &mut DeclErrors) {
        match self {
            Expr::Var(v) => {
                if let Some(p) = v.unresolved_path() {
                    if let Some(resolved) = lookup.resolve(path, &p, errors) {
                        *v = resolved;
                    }
                }
            }
            Expr::Lit(_) => {}
            Expr::Lt(l, r)
            | Expr::Leq(l, r)
            | Expr::Eq(l, r)
            | Expr::Geq(l, r)
            | Expr::Gt(l, r)
            | Expr::Implies(l, r)
            | Expr::Iff(l, r) => {
                l.resolve(path, lookup, errors);
                r.resolve(path, lookup, errors);
            }
            Expr::Not(a) => a.resolve(path, lookup, errors),
            Expr::And(args) | Expr::Or(args) | Expr::Xor(args) | Expr::Conflict(args) => {
                for a in args.iter_mut() {
                    a.resolve(path, lookup, errors);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_with(pairs: &[(&str, Value)]) -> Product {
        pairs.iter().fold(Product::new(), |p, (k, v)| p.with(*k, v.clone()))
    }

    #[test]
    fn and_with_none_expected_never_mismatches() {
        // simulating a child under an `Any` group: the parent hands down
        // `expected = None`, meaning "don't care"; even though this And's
        // own computation is false, no mismatch must be reported.
        let e = and(vec![var("a"), var("b")]);
        let p = product_with(&[("a", Value::Bool(true)), ("b", Value::Bool(false))]);
        let out = e.eval(&p, 0, None);
        assert_eq!(out.value, Value::Bool(false));
        assert!(out.is_empty_reason());
    }

    #[test]
    fn and_mismatch_reports_each_operand() {
        let e = and(vec![var("a"), var("b")]);
        let p = product_with(&[("a", Value::Bool(true)), ("b", Value::Bool(false))]);
        let out = e.eval(&p, 0, Some(true));
        assert_eq!(out.value, Value::Bool(false));
        assert!(!out.is_empty_reason());
    }

    #[test]
    fn and_match_has_no_reason() {
        let e = and(vec![var("a"), var("b")]);
        let p = product_with(&[("a", Value::Bool(true)), ("b", Value::Bool(true))]);
        let out = e.eval(&p, 0, Some(true));
        assert_eq!(out.value, Value::Bool(true));
        assert!(out.is_empty_reason());
    }

    #[test]
    fn var_missing_reports_value_none() {
        let e = var("missing");
        let p = Product::new();
        let out = e.eval(&p, 0, Some(true));
        assert!(!out.is_empty_reason());
    }

    #[test]
    fn implies_true_antecedent_false_consequent_mismatches_when_expected() {
        let e = implies(var("a"), var("b"));
        let p = product_with(&[("a", Value::Bool(true)), ("b", Value::Bool(false))]);
        let out = e.eval(&p, 0, Some(true));
        assert_eq!(out.value, Value::Bool(false));
        assert!(!out.is_empty_reason());
    }

    #[test]
    fn xor_exactly_one_holds() {
        let e = xor(vec![var("a"), var("b")]);
        let p = product_with(&[("a", Value::Bool(true)), ("b", Value::Bool(false))]);
        let out = e.eval(&p, 0, Some(true));
        assert_eq!(out.value, Value::Bool(true));
        assert!(out.is_empty_reason());
    }

    #[test]
    fn lt_compares_ints() {
        let e = lt(var("a"), lit(5i64));
        let p = product_with(&[("a", Value::Int(3))]);
        let out = e.eval(&p, 0, Some(true));
        assert_eq!(out.value, Value::Bool(true));
    }

    #[test]
    fn lt_mismatch_against_expected_reports_reason() {
        let e = lt(var("x_val"), lit(5i64));
        let p = product_with(&[("x_val", Value::Int(10))]);
        let out = e.eval(&p, 0, Some(true));
        assert_eq!(out.value, Value::Bool(false));
        assert!(!out.is_empty_reason());
    }

    #[test]
    fn lt_with_none_expected_never_mismatches() {
        let e = lt(var("x_val"), lit(5i64));
        let p = product_with(&[("x_val", Value::Int(10))]);
        let out = e.eval(&p, 0, None);
        assert_eq!(out.value, Value::Bool(false));
        assert!(out.is_empty_reason());
    }
}
