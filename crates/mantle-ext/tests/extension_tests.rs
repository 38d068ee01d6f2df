// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use mantle_core::{NativeFn, Object, PatchRegistry, Value};
use mantle_ext::{Extension, ExtensionError, ExtensionSet};

#[test]
fn function_extension_lands_on_the_global_owner() {
    let registry = PatchRegistry::new();
    let owner = registry.global_owner();
    let ext = Extension::function_on(
        &registry,
        &owner,
        NativeFn::new("shout", |args| match args.first() {
            Some(Value::Str(s)) => Value::from(s.to_uppercase()),
            _ => Value::Null,
        }),
    )
    .unwrap();
    ext.apply();

    let shout = owner.get(&"shout".into()).unwrap();
    assert_eq!(
        shout.as_function().unwrap().call(&[Value::from("hey")]),
        Value::from("HEY")
    );
    ext.revert().unwrap();
    assert!(!owner.has(&"shout".into()));
    ext.release();
    assert!(registry.is_empty());
}

#[test]
fn extensions_participate_in_registry_views() {
    let registry = PatchRegistry::new();
    let owner = Object::new();
    let ext = Extension::new_in(&registry, &owner, "answer", Value::from(42)).unwrap();

    let known = registry.scoped_to(&owner).known();
    assert_eq!(known.get(&"answer".into()), Some(Value::from(42)));
    assert!(!ext.applied());
    assert!(!owner.has(&"answer".into()));
}

#[test]
fn value_kind_predicates() {
    let registry = PatchRegistry::new();
    let owner = Object::new();
    let obj_ext =
        Extension::new_in(&registry, &owner, "bag", Value::from(Object::new())).unwrap();
    let prim_ext = Extension::new_in(&registry, &owner, "n", Value::from(3)).unwrap();
    assert!(obj_ext.is_object());
    assert!(!obj_ext.is_primitive());
    assert!(prim_ext.is_primitive());
    assert!(!prim_ext.is_function());
}

#[test]
fn a_set_tears_down_in_reverse_order() {
    let registry = PatchRegistry::new();
    let owner = Object::new();
    owner.set("x", Value::from("original")).unwrap();

    let mut set = ExtensionSet::new("overlays");
    set.add(Extension::new_in(&registry, &owner, "x", Value::from("first")).unwrap());
    set.add(Extension::new_in(&registry, &owner, "y", Value::from("second")).unwrap());
    set.apply_all();
    assert_eq!(owner.get(&"x".into()), Some(Value::from("first")));

    set.release_all();
    assert_eq!(owner.get(&"x".into()), Some(Value::from("original")));
    assert!(!owner.has(&"y".into()));
    assert!(registry.is_empty());
}

#[test]
fn refusal_reports_the_offending_key() {
    let registry = PatchRegistry::new();
    let owner = Object::new();
    owner
        .define_property(
            "sealed",
            mantle_core::Descriptor::data(Value::from(1)).writable(false),
        )
        .unwrap();
    let err = Extension::new_in(&registry, &owner, "sealed", Value::from(2)).unwrap_err();
    match err {
        ExtensionError::CannotBeExtended { key, .. } => {
            assert_eq!(key, "sealed".into());
        }
        other => panic!("unexpected error: {other}"),
    }
}
