//! Typed attribute values and domain specifications.
//!
//! A [`Value`] is the dynamic payload carried by a product: a feature's
//! Boolean selection, or an attribute's typed value. A [`Domain`] is a
//! validator over [`Value`]s, built from the variants described in the
//! model: `Bool`, `String`, `Enum`, `Int`, `Float`, `List`, and the
//! general `Class` escape hatch they're all built on.

use std::any::{Any, TypeId};
use std::fmt;

use crate::error::FmError;

/// An open-ended value belonging to some user type, used for the `Class`
/// and `Enum` attribute domains.
///
/// Rust has no runtime `isinstance`, so class membership is checked by
/// [`TypeId`] instead: any `T: Debug + Clone + PartialEq + 'static` can be
/// wrapped as a class value, and [`Domain::class`]/[`Domain::enum_of`]
/// check a stored value's concrete type against the one the domain was
/// built for.
pub trait ClassValue: fmt::Debug + Send + Sync {
    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Structural equality against another class value of possibly
    /// different concrete type (false if the types differ).
    fn eq_dyn(&self, other: &dyn ClassValue) -> bool;
    /// The concrete Rust type name, used in diagnostics.
    fn type_name(&self) -> &'static str;
    /// Clones this value behind a fresh box.
    fn clone_box(&self) -> Box<dyn ClassValue>;
}

impl<T> ClassValue for T
where
    T: fmt::Debug + Clone + PartialEq + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn ClassValue) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| o == self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn clone_box(&self) -> Box<dyn ClassValue> {
        Box::new(self.clone())
    }
}

/// Marker trait for Rust enums usable with [`Domain::enum_of`].
///
/// The source engine checks `issubclass(domain, enum.Enum)` at domain
/// construction time and raises `ValueError` otherwise; Rust has no
/// equivalent runtime reflection over "is an enum", so the check is moved
/// to compile time as a trait bound instead. Implement this for any plain
/// `#[derive(Debug, Clone, PartialEq)]` enum you want to use as an
/// attribute's value domain.
pub trait FmEnum: fmt::Debug + Clone + PartialEq + Send + Sync + 'static {}

/// A dynamically typed value: a feature's selection flag, or an
/// attribute's payload.
#[derive(Debug)]
pub enum Value {
    /// The sentinel for "no value at this key in the product". Never
    /// produced by user code; only by a missing-key lookup.
    Unset,
    /// A Boolean feature selection or constraint result.
    Bool(bool),
    /// A signed integer attribute value.
    Int(i64),
    /// A floating-point attribute value.
    Float(f64),
    /// A string attribute value.
    Str(String),
    /// A sequence attribute value (the `List` domain).
    List(Vec<Value>),
    /// An open class/enum value (see [`ClassValue`]).
    Class(Box<dyn ClassValue>),
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Unset => Value::Unset,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(i) => Value::Int(*i),
            Value::Float(x) => Value::Float(*x),
            Value::Str(s) => Value::Str(s.clone()),
            Value::List(xs) => Value::List(xs.clone()),
            Value::Class(c) => Value::Class(c.clone_box()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unset, Value::Unset) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a.eq_dyn(b.as_ref()),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => write!(f, "<unset>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Value::Class(c) => write!(f, "{c:?}"),
        }
    }
}

impl Value {
    /// Wraps an open class/enum value.
    pub fn class<T>(v: T) -> Self
    where
        T: fmt::Debug + Clone + PartialEq + Send + Sync + 'static,
    {
        Value::Class(Box::new(v))
    }

    /// Python-style truthiness, used when a raw attribute/constraint
    /// value is combined directly in a logical operator (e.g. a bare
    /// `Var` used as a cross-tree constraint).
    pub fn truthy(&self) -> bool {
        match self {
            Value::Unset => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(xs) => !xs.is_empty(),
            Value::Class(_) => true,
        }
    }

    fn lt(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a < b,
            (Value::Float(a), Value::Float(b)) => a < b,
            (Value::Int(a), Value::Float(b)) => (*a as f64) < *b,
            (Value::Float(a), Value::Int(b)) => *a < (*b as f64),
            (Value::Str(a), Value::Str(b)) => a < b,
            _ => false,
        }
    }

    /// `self < other`, per the `Lt` constraint operator.
    pub fn less_than(&self, other: &Value) -> bool {
        self.lt(other)
    }

    /// `self <= other`, per the `Leq` constraint operator.
    pub fn leq(&self, other: &Value) -> bool {
        self == other || self.lt(other)
    }

    /// `self >= other`, per the `Geq` constraint operator.
    pub fn geq(&self, other: &Value) -> bool {
        self == other || other.lt(self)
    }

    /// `self > other`, per the `Gt` constraint operator.
    pub fn greater_than(&self, other: &Value) -> bool {
        other.lt(self)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// An interval `[lo, hi)`; either bound may be unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval<T> {
    /// Inclusive lower bound, or `None` for unbounded below.
    pub lo: Option<T>,
    /// Exclusive upper bound, or `None` for unbounded above.
    pub hi: Option<T>,
}

impl<T: PartialOrd + Copy> Interval<T> {
    fn contains(&self, v: T) -> bool {
        if let Some(lo) = self.lo {
            if v < lo {
                return false;
            }
        }
        if let Some(hi) = self.hi {
            if v >= hi {
                return false;
            }
        }
        true
    }
}

/// A single entry in an interval domain specification: either a bare
/// point value (desugaring to `[n, n+1)`), or an explicit `(lo, hi)` range.
#[derive(Debug, Clone, Copy)]
pub enum IntervalSpec<T> {
    /// A single accepted value, shorthand for `[n, n+1)`.
    Point(T),
    /// An explicit, possibly-unbounded range.
    Range(Option<T>, Option<T>),
}

impl<T> From<T> for IntervalSpec<T> {
    fn from(v: T) -> Self {
        IntervalSpec::Point(v)
    }
}

fn build_intervals_i64(specs: &[IntervalSpec<i64>]) -> Vec<Interval<i64>> {
    specs
        .iter()
        .map(|s| match s {
            IntervalSpec::Point(n) => Interval { lo: Some(*n), hi: Some(n + 1) },
            IntervalSpec::Range(lo, hi) => Interval { lo: *lo, hi: *hi },
        })
        .collect()
}

fn build_intervals_f64(specs: &[IntervalSpec<f64>]) -> Vec<Interval<f64>> {
    specs
        .iter()
        .map(|s| match s {
            IntervalSpec::Point(n) => Interval { lo: Some(*n), hi: Some(n + 1.0) },
            IntervalSpec::Range(lo, hi) => Interval { lo: *lo, hi: *hi },
        })
        .collect()
}

/// A validator over attribute values.
///
/// An interval list being empty means "no domain restriction" beyond the
/// underlying type check.
pub enum Domain {
    /// `value` must be a `Value::Bool`.
    Bool,
    /// `value` must be a `Value::Str`.
    Str,
    /// `value` must be a `Value::Class` of the given concrete type.
    Class(TypeId, &'static str),
    /// `value` must be a `Value::Int` within one of the intervals.
    Int(Vec<Interval<i64>>),
    /// `value` must be a `Value::Float` within one of the intervals.
    Float(Vec<Interval<f64>>),
    /// `value` must be a `Value::List` whose length is within one of the
    /// size intervals, and whose elements (if `spec` is set) all satisfy it.
    List(Vec<Interval<i64>>, Option<Box<Domain>>),
}

impl Domain {
    /// The `Bool` domain.
    pub fn bool_() -> Self {
        Domain::Bool
    }

    /// The `String` domain.
    pub fn string() -> Self {
        Domain::Str
    }

    /// A domain accepting any `Value::Class` wrapping exactly `T`.
    pub fn class<T: Any>() -> Self {
        Domain::Class(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// A domain accepting any `Value::Class` wrapping exactly `E`.
    ///
    /// `E: FmEnum` stands in for the source engine's runtime
    /// `issubclass(domain, enum.Enum)` check: see [`FmEnum`].
    pub fn enum_of<E: FmEnum>() -> Self {
        Domain::class::<E>()
    }

    /// An integer domain over the given intervals (or unrestricted, if empty).
    pub fn int(specs: &[IntervalSpec<i64>]) -> Result<Self, FmError> {
        for s in specs {
            if let IntervalSpec::Range(lo, hi) = s {
                if let (Some(lo), Some(hi)) = (lo, hi) {
                    if lo >= hi {
                        return Err(FmError::MalformedDomain(format!(
                            "empty interval [{lo}, {hi})"
                        )));
                    }
                }
            }
        }
        Ok(Domain::Int(build_intervals_i64(specs)))
    }

    /// A floating-point domain over the given intervals (or unrestricted, if empty).
    pub fn float(specs: &[IntervalSpec<f64>]) -> Result<Self, FmError> {
        for s in specs {
            if let IntervalSpec::Range(Some(lo), Some(hi)) = s {
                if lo >= hi {
                    return Err(FmError::MalformedDomain(format!(
                        "empty interval [{lo}, {hi})"
                    )));
                }
            }
        }
        Ok(Domain::Float(build_intervals_f64(specs)))
    }

    /// A list domain: `size` bounds the sequence length (empty = unrestricted),
    /// `spec` (if any) every element must satisfy.
    pub fn list(size: &[IntervalSpec<i64>], spec: Option<Domain>) -> Self {
        Domain::List(build_intervals_i64(size), spec.map(Box::new))
    }

    /// Whether `value` belongs to this domain.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Domain::Bool => matches!(value, Value::Bool(_)),
            Domain::Str => matches!(value, Value::Str(_)),
            Domain::Class(tid, _) => match value {
                Value::Class(c) => c.as_any().type_id() == *tid,
                _ => false,
            },
            Domain::Int(intervals) => match value {
                Value::Int(n) => check_domain(intervals, *n),
                _ => false,
            },
            Domain::Float(intervals) => match value {
                Value::Float(x) => check_domain(intervals, *x),
                _ => false,
            },
            Domain::List(size, spec) => match value {
                Value::List(items) => {
                    check_domain(size, items.len() as i64)
                        && match spec {
                            None => true,
                            Some(d) => items.iter().all(|v| d.accepts(v)),
                        }
                }
                _ => false,
            },
        }
    }
}

fn check_domain<T: PartialOrd + Copy>(domain: &[Interval<T>], value: T) -> bool {
    if domain.is_empty() {
        true
    } else {
        domain.iter().any(|i| i.contains(value))
    }
}
