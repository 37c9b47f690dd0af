//! Enum and flag values, class constants and mixins

use bindery_engine::bindery_sdk::{EnumValue, FlagSet};

use super::harness::*;

// ============================================================================
// Enum Values
// ============================================================================

#[test]
fn test_enum_constants_render_by_name() {
    let rt = runtime();
    let a_id = class(&rt, "A");
    let decl = rt.enum_decl(a_id, "Enum").unwrap();

    let a = rt.constant(a_id, "a").unwrap();
    assert_eq!(a.to_string(), "a");
    let parsed = EnumValue::parse(&decl, &a.to_string()).unwrap();
    assert_eq!(Variant::Enum(parsed), a);
}

#[test]
fn test_unnamed_values_round_trip() {
    let rt = runtime();
    let decl = rt.enum_decl(class(&rt, "A"), "Enum").unwrap();

    assert_eq!(EnumValue::default_for(&decl).to_string(), "#0");
    let odd = EnumValue::new(&decl, 3);
    assert_eq!(odd.to_string(), "#3");
    assert_eq!(EnumValue::parse(&decl, "#3").unwrap().to_i(), 3);

    let err = EnumValue::parse(&decl, "zzz").unwrap_err();
    assert_eq!(err.to_string(), "Invalid value 'zzz' for enum Enum");
}

#[test]
fn test_enum_arguments_convert_from_integers() {
    let mut rt = runtime();
    let b = new(&mut rt, "B", none());
    assert_eq!(text(&call(&mut rt, &b, "enum_name", vec![2.into()])), "b");
    assert_eq!(text(&call(&mut rt, &b, "enum_name", vec![3.into()])), "#3");

    let a = new(&mut rt, "A", none());
    let c = rt.constant(class(&rt, "A"), "c").unwrap();
    call(&mut rt, &a, "set_e", vec![c]);
    assert_eq!(int(&call(&mut rt, &a, "a1", none())), 4);
    call(&mut rt, &a, "set_e", vec![2.into()]);
    assert_eq!(int(&call(&mut rt, &a, "a1", none())), 2);
}

// ============================================================================
// Flags
// ============================================================================

#[test]
fn test_flag_combination() {
    let rt = runtime();
    let decl = rt.enum_decl(class(&rt, "A"), "Enum").unwrap();
    let a = EnumValue::named(&decl, "a").unwrap();
    let b = EnumValue::named(&decl, "b").unwrap();

    let ab = a.clone() | b;
    assert_eq!(ab.to_string(), "a|b");
    assert!(ab.contains(&a));
    assert_eq!(FlagSet::parse(&decl, "b|a").unwrap(), ab);
    assert_eq!((ab.clone() & a).to_string(), "a");
    assert_eq!(FlagSet::new(&decl, 8).to_string(), "8");
}

#[test]
fn test_flags_cross_the_boundary() {
    let mut rt = runtime();
    let a_id = class(&rt, "A");
    let b = new(&mut rt, "B", none());
    let a = rt.constant(a_id, "a").unwrap();
    let c = rt.constant(a_id, "c").unwrap();

    let out = call(&mut rt, &b, "combine", vec![a, c]);
    assert!(matches!(out, Variant::Flags(_)));
    assert_eq!(out.to_string(), "a|c");
}

#[test]
fn test_complement_respects_backing() {
    let mut rt = runtime();
    let a_id = class(&rt, "A");
    let signed = rt.enum_decl(a_id, "Enum").unwrap();
    let a = EnumValue::named(&signed, "a").unwrap();
    assert_eq!((!a.to_flags()).to_string(), "-2");

    let b = new(&mut rt, "B", none());
    let x = rt.constant(a_id, "x").unwrap();
    let inverted = call(&mut rt, &b, "invert", vec![x]);
    assert_eq!(inverted.to_string(), "254");
}

// ============================================================================
// Constants and Mixins
// ============================================================================

#[test]
fn test_class_constants() {
    let rt = runtime();
    let a_id = class(&rt, "A");
    assert_eq!(rt.constant(a_id, "VERSION").unwrap(), Variant::Int(2));
    assert_eq!(rt.constant(a_id, "SWEET").unwrap(), Variant::Int(1));
    assert_eq!(rt.constant(a_id, "SOUR").unwrap(), Variant::Int(2));
    assert!(rt.constant(a_id, "nope").is_err());
}

#[test]
fn test_constants_are_inherited() {
    let rt = runtime();
    let child = class(&rt, "AChild");
    assert_eq!(rt.constant(child, "VERSION").unwrap(), Variant::Int(2));
    assert_eq!(rt.constant(child, "x").unwrap().to_string(), "x");
    assert!(rt.enum_decl(child, "UEnum").is_ok());
}
