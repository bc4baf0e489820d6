//! Integration tests for the feature-model engine: whole-model scenarios
//! exercising construction, checking, evaluation, and normalization
//! together through the public API only.

use fdmodel::{
    and, conflict, eq, fd, implies, lit, lt, not, or, var, xor, Domain, EntityRef, FdBuilder,
    FmEnum, IntervalSpec, Product, ProductKey, Value,
};

#[derive(Debug, Clone, PartialEq)]
enum Hello {
    English,
    German,
}
impl FmEnum for Hello {}

fn hello_world() -> fdmodel::Fm {
    let lang = FdBuilder::and_anon()
        .child(fd("lang").attr("lang_v", Domain::enum_of::<Hello>()).build())
        .build();
    let times = FdBuilder::any_anon()
        .child(
            fd("times")
                .attr("times_v", Domain::int(&[IntervalSpec::Range(Some(0), None)]).unwrap())
                .build(),
        )
        .build();
    fd("HelloWorld").child(lang).child(times).build()
}

// arena for `hello_world()`: 0 HelloWorld, 1 lang-wrapper(anon And), 2 lang,
// 3 times-wrapper(anon Any), 4 times

#[test]
fn hello_world_valid_configuration_is_accepted() {
    let mut model = hello_world();
    let errors = model.check();
    assert!(errors.is_empty());

    let p = Product::new()
        .with(EntityRef::Node(0), Value::Bool(true))
        .with(EntityRef::Node(2), Value::Bool(true))
        .with(EntityRef::Attr(2, 0), Value::class(Hello::English))
        .with(EntityRef::Node(4), Value::Bool(true))
        .with(EntityRef::Attr(4, 0), Value::Int(2));

    let out = model.call(&p, true).unwrap();
    assert!(out.value, "unexpected failure: {:?}", out.reason);
    assert!(out.reason.is_none());
}

#[test]
fn wrong_group_reports_lang_mismatch() {
    let mut model = hello_world();
    model.check();

    let p = Product::new()
        .with(EntityRef::Node(0), Value::Bool(true))
        .with(EntityRef::Node(2), Value::Bool(false))
        .with(EntityRef::Node(4), Value::Bool(true))
        .with(EntityRef::Attr(4, 0), Value::Int(4));

    let out = model.call(&p, true).unwrap();
    assert!(!out.value);
    let rendered = out.reason.unwrap().to_string();
    assert!(rendered.contains("lang"), "reason did not mention lang: {rendered}");
}

#[test]
fn bad_attribute_type_is_rejected() {
    let mut model = hello_world();
    model.check();

    let p = Product::new()
        .with(EntityRef::Node(0), Value::Bool(true))
        .with(EntityRef::Node(2), Value::Bool(true))
        .with(EntityRef::Attr(2, 0), Value::Int(1))
        .with(EntityRef::Node(4), Value::Bool(true))
        .with(EntityRef::Attr(4, 0), Value::Int(2));

    let out = model.call(&p, true).unwrap();
    assert!(!out.value);
    let rendered = out.reason.unwrap().to_string();
    assert!(rendered.contains("lang_v"), "reason did not mention lang_v: {rendered}");
}

#[test]
fn dangling_attribute_dropped_by_normalization() {
    let mut model = hello_world();
    model.check();

    let partial = Product::new()
        .with(EntityRef::Node(0), Value::Bool(true))
        .with(EntityRef::Node(2), Value::Bool(true))
        .with(EntityRef::Attr(2, 0), Value::class(Hello::English))
        .with(EntityRef::Node(4), Value::Bool(false))
        .with(EntityRef::Attr(4, 0), Value::Int(4));

    let (res, errors) = model.nf_product(&[partial]).unwrap();
    assert!(errors.is_empty());
    assert_eq!(res.get(&ProductKey::Entity(EntityRef::Node(4))), Some(&Value::Bool(false)));
    assert!(res.get(&ProductKey::Entity(EntityRef::Attr(4, 0))).is_none());
}

#[test]
fn provenance_merge_later_partial_overrides_attributes() {
    let mut model = hello_world();
    model.check();

    let first = Product::new()
        .with(EntityRef::Node(0), Value::Bool(true))
        .with(EntityRef::Node(2), Value::Bool(true))
        .with(EntityRef::Attr(2, 0), Value::class(Hello::English))
        .with(EntityRef::Node(4), Value::Bool(true))
        .with(EntityRef::Attr(4, 0), Value::Int(2));
    let second = Product::new()
        .with(EntityRef::Attr(2, 0), Value::class(Hello::German))
        .with(EntityRef::Attr(4, 0), Value::Int(3));

    let (res, errors) = model.nf_product(&[first, second]).unwrap();
    assert!(errors.is_empty());
    assert_eq!(res.get(&ProductKey::Entity(EntityRef::Attr(2, 0))), Some(&Value::class(Hello::German)));
    assert_eq!(res.get(&ProductKey::Entity(EntityRef::Attr(4, 0))), Some(&Value::Int(3)));
    assert_eq!(res.get(&ProductKey::Entity(EntityRef::Node(0))), Some(&Value::Bool(true)));
}

#[test]
fn ambiguous_reference_is_reported_and_blocks_trust_in_the_model() {
    let mut model = fd("Root")
        .child(fd("x").build())
        .child(fd("Y").child(fd("x").build()).build())
        .ctc(var("x"))
        .build();

    let errors = model.check();
    assert!(errors.has_ambiguous());
    assert!(!errors.ambiguities()[0].candidates.is_empty());
}

#[test]
fn lookup_uniqueness_every_name_resolves_to_one_entry_or_disjoint_paths() {
    let mut model = fd("Root")
        .child(fd("A").child(fd("leaf").build()).build())
        .child(fd("B").child(fd("leaf").build()).build())
        .build();
    let errors = model.check();
    assert!(errors.is_empty(), "same-named siblings under different parents must not collide");
}

#[test]
fn universal_value_equals_reason_emptiness() {
    let mut model = fd("Root").child(fd("A").build()).build();
    model.check();

    let selected = Product::new().with(EntityRef::Node(0), Value::Bool(true)).with(EntityRef::Node(1), Value::Bool(true));
    let out = model.call(&selected, true).unwrap();
    assert_eq!(out.value, out.reason.is_none());

    let broken = Product::new().with(EntityRef::Node(0), Value::Bool(true)).with(EntityRef::Node(1), Value::Bool(false));
    let out = model.call(&broken, true).unwrap();
    assert_eq!(out.value, out.reason.is_none());
}

#[test]
fn boundary_conflict_with_no_operands_is_true() {
    let out = conflict(vec![]).eval(&Product::new(), 0, None);
    assert_eq!(out.value, Value::Bool(true));
}

#[test]
fn boundary_xor_with_no_operands_is_false() {
    let out = xor(vec![]).eval(&Product::new(), 0, None);
    assert_eq!(out.value, Value::Bool(false));
}

#[test]
fn boundary_unbounded_int_domain_accepts_non_negative_rejects_float() {
    let d = Domain::int(&[IntervalSpec::Range(Some(0), None)]).unwrap();
    assert!(d.accepts(&Value::Int(1_000_000)));
    assert!(!d.accepts(&Value::Int(-1)));
    assert!(!d.accepts(&Value::Float(3.0)));
}

#[test]
fn boundary_int_point_domain_desugars_to_single_value() {
    let d = Domain::int(&[IntervalSpec::Point(0)]).unwrap();
    assert!(d.accepts(&Value::Int(0)));
    assert!(!d.accepts(&Value::Int(1)));
}

#[test]
fn relational_and_logical_reducers_match_truth_tables() {
    let p = Product::new();
    assert_eq!(and(vec![lit(true), lit(true)]).eval(&p, 0, None).value, Value::Bool(true));
    assert_eq!(and(vec![lit(true), lit(false)]).eval(&p, 0, None).value, Value::Bool(false));
    assert_eq!(or(vec![lit(false), lit(false)]).eval(&p, 0, None).value, Value::Bool(false));
    assert_eq!(not(lit(true)).eval(&p, 0, None).value, Value::Bool(false));
    assert_eq!(lt(lit(1_i64), lit(2_i64)).eval(&p, 0, None).value, Value::Bool(true));
    assert_eq!(eq(lit(2_i64), lit(2_i64)).eval(&p, 0, None).value, Value::Bool(true));
    assert_eq!(implies(lit(true), lit(false)).eval(&p, 0, None).value, Value::Bool(false));
}
