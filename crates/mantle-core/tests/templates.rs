// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use mantle_core::{
    Descriptor, DescriptorTemplate, NativeFn, Object, Patch, PatchOptions, PatchRegistry, Value,
};

fn group(entries: &[(&str, i64)]) -> Object {
    let obj = Object::new();
    for (key, value) in entries {
        obj.set(*key, Value::from(*value)).unwrap();
    }
    obj
}

#[test]
fn template_group_forces_flags_onto_every_inner_key() {
    let registry = PatchRegistry::new();
    let owner = Object::new();
    let spec = Object::new();
    spec.define_property(
        DescriptorTemplate::MutablyHidden.key(),
        Descriptor::data(Value::from(group(&[("a", 1), ("b", 2)]))),
    )
    .unwrap();

    let patch = Patch::new_in(&registry, &owner, &spec, PatchOptions::new());
    assert_eq!(patch.patch_count(), 2);
    let report = patch.apply();
    assert!(report.is_clean());

    for key in ["a", "b"] {
        let descriptor = owner.own_descriptor(&key.into()).unwrap();
        assert!(!descriptor.is_enumerable());
        assert!(descriptor.is_configurable());
    }
    patch.revert().unwrap();
    assert!(owner.is_empty());
}

#[test]
fn outer_template_wins_over_a_nested_one() {
    let registry = PatchRegistry::new();
    let owner = Object::new();

    let inner = Object::new();
    inner
        .define_property(
            DescriptorTemplate::MutablyVisible.key(),
            Descriptor::data(Value::from(group(&[("nested", 1)]))),
        )
        .unwrap();
    let spec = Object::new();
    spec.define_property(
        DescriptorTemplate::ImmutablyHidden.key(),
        Descriptor::data(Value::from(inner)),
    )
    .unwrap();

    let patch = Patch::new_in(&registry, &owner, &spec, PatchOptions::new());
    patch.apply();
    let descriptor = owner.own_descriptor(&"nested".into()).unwrap();
    // The enclosing group's flags apply all the way down.
    assert!(!descriptor.is_enumerable());
    assert!(!descriptor.is_configurable());
}

#[test]
fn template_function_receives_a_memoized_store() {
    let registry = PatchRegistry::new();
    let owner = Object::new();
    let spec = Object::new();
    let grouping = NativeFn::anonymous(|args| {
        let store = args[0].as_object().unwrap();
        store.set("seen", Value::from(true)).unwrap();
        Value::from(group(&[("x", 1)]))
    });
    spec.define_property(
        DescriptorTemplate::MutablyVisible.key(),
        Descriptor::data(Value::from(grouping)),
    )
    .unwrap();

    let patch = Patch::new_in(&registry, &owner, &spec, PatchOptions::new());
    assert_eq!(patch.patch_count(), 1);
    let store = patch.store(DescriptorTemplate::MutablyVisible).unwrap();
    assert_eq!(store.get(&"seen".into()), Some(Value::from(true)));
    assert!(patch.store(DescriptorTemplate::ImmutablyHidden).is_none());
}

#[test]
fn non_object_template_payload_is_skipped() {
    let registry = PatchRegistry::new();
    let owner = Object::new();
    let spec = Object::new();
    spec.set("plain", Value::from(1)).unwrap();
    spec.define_property(
        DescriptorTemplate::MutablyHidden.key(),
        Descriptor::data(Value::from(42)),
    )
    .unwrap();

    let patch = Patch::new_in(&registry, &owner, &spec, PatchOptions::new());
    // The malformed group contributes nothing; the plain key survives.
    assert_eq!(patch.patch_count(), 1);
    let report = patch.apply();
    assert!(report.is_clean());
    assert_eq!(owner.get(&"plain".into()), Some(Value::from(1)));
}

#[test]
fn immutable_template_entries_resist_deletion() {
    let registry = PatchRegistry::new();
    let owner = Object::new();
    let spec = Object::new();
    spec.define_property(
        DescriptorTemplate::ImmutablyVisible.key(),
        Descriptor::data(Value::from(group(&[("pinned", 1)]))),
    )
    .unwrap();

    let patch = Patch::new_in(&registry, &owner, &spec, PatchOptions::new());
    patch.apply();
    assert!(!owner.delete(&"pinned".into()));

    // Reverting an immutable overlay fails loudly instead of lying.
    let revert = patch.revert().unwrap();
    assert!(!revert.is_clean());
    assert_eq!(revert.still_applied, 1);
    assert!(owner.has(&"pinned".into()));
}
