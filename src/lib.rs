//! # fdmodel - Feature Model Engine
//!
//! `fdmodel` builds, checks, evaluates, and normalizes feature models: the
//! variability trees used across software product lines to describe which
//! combinations of features are legal products.
//!
//! ## Overview
//!
//! A feature model is a tree of features grouped by `And`/`Or`/`Xor`/`Any`
//! combinators, decorated with typed attributes and cross-tree constraints
//! (arbitrary Boolean expressions over features and attributes anywhere in
//! the tree). A *product* is a partial or total assignment of values to
//! features and attributes; checking a product against a model tells you
//! whether it's a legal configuration, and if not, why.
//!
//! ```text
//! Build (FdBuilder) → Check (Fm::check) → Evaluate (Fm::call) / Normalize (Fm::nf_product)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fdmodel::{fd, var, Domain, Product};
//!
//! let mut model = fd("HelloWorld")
//!     .child(
//!         fd("language").child(fd("english").build()).build()
//!     )
//!     .build();
//!
//! let errors = model.check();
//! assert!(errors.is_empty());
//! ```
//!
//! ## Modules
//!
//! - [`entity`]: Arena identities for feature and attribute nodes
//! - [`path`]: Slash-separated canonical paths
//! - [`error`]: Accumulated and raised error channels
//! - [`value`]: Typed attribute values and domains
//! - [`reason`]: Hierarchical explanation of a failed evaluation
//! - [`product`]: Configurations (feature/attribute → value maps)
//! - [`expr`]: Cross-tree constraint expressions
//! - [`fd`]: Feature-diagram trees, the builder, and declaration checking
//! - [`eval`]: Evaluating a product against a checked model
//! - [`normalize`]: Merging partial products into a total one

#![doc(html_root_url = "https://docs.rs/fdmodel/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod entity;
pub mod error;
pub mod eval;
pub mod expr;
pub mod fd;
pub mod normalize;
pub mod path;
pub mod product;
pub mod reason;
pub mod value;

pub use entity::{EntityRef, NodeId};
pub use error::{AmbiguousRef, DeclErrors, FmError, UnboundRef};
pub use eval::FdEvalOutcome;
pub use expr::{and, conflict, eq, geq, gt, iff, implies, leq, lit, lt, not, or, var, xor, Expr, IntoExpr, VarRef};
pub use fd::{fd, set_default_product_normalization, Fm, FdBuilder, GroupKind};
pub use path::{path_from_str, path_includes, path_to_str, Path};
pub use product::{Product, ProductKey};
pub use reason::{LocalReason, ReasonTree, RefLabel};
pub use value::{ClassValue, Domain, FmEnum, Interval, IntervalSpec, Value};
