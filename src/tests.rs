/*
MIT License

Copyright (c) 2026 Raja Lehtihet and Wael El Oraiby

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Crate unit tests.

use super::*;
use crate::parser::parse_lookup;
use ndarray::{ArrayD, IxDyn};
use std::rc::Rc;

fn first_caret_column(pointer: &str) -> Option<usize> {
    pointer.chars().position(|ch| ch == '^').map(|idx| idx + 1)
}

fn numbers(value: &Value) -> Vec<f64> {
    value
        .to_array_data()
        .and_then(|data| data.to_numeric())
        .expect("numeric array")
        .iter()
        .copied()
        .collect()
}

fn beam_x() -> VarKey {
    VarKey::scalar("x").with_lineage(&[("Beam", 0)])
}

#[test]
fn value_round_trips_through_every_alias() {
    let x = beam_x();
    let mut store = ValueStore::default();
    store.set(&x, 3.0).expect("set");
    assert_eq!(store.get(&x).expect("by key"), Value::Number(3.0));
    assert_eq!(store.get("x").expect("by name"), Value::Number(3.0));
    assert_eq!(store.get("x_Beam").expect("qualified"), Value::Number(3.0));
    assert!(store.contains("x_Beam"));
}

#[test]
fn setting_elements_equals_setting_the_vector() {
    let y = VarKey::vector("y", &[3]);
    let mut by_element = ValueStore::default();
    for (i, v) in [1.0, 2.0, 3.0].into_iter().enumerate() {
        by_element.set(y.element(&[i]).expect("element"), v).expect("slot");
    }
    let mut whole = ValueStore::default();
    whole.set(&y, vec![1.0, 2.0, 3.0]).expect("set");

    assert_eq!(by_element.get(&y).expect("get"), whole.get(&y).expect("get"));
    assert_eq!(by_element.len(), 1);
}

#[test]
fn element_lookups_agree_with_whole_array() {
    let y = VarKey::vector("y", &[3]);
    for config in [StoreConfig::default(), StoreConfig::presence()] {
        let mut store = ValueStore::new(config);
        store.set(&y, vec![4.0, 5.0, 6.0]).expect("set");
        let whole = store.get(&y).expect("whole");
        assert_eq!(whole.value_at(&[1]), Some(store.get("y[1]").expect("indexed")));
        assert_eq!(
            store.get(y.element(&[1]).expect("element")).expect("by key"),
            Value::Number(5.0)
        );
    }
}

#[test]
fn caller_arrays_are_isolated_from_store_writes() {
    let y = VarKey::vector("y", &[3]);
    let mut store = ValueStore::default();
    let mine = Rc::new(ArrayData::Numeric(ArrayD::from_elem(IxDyn(&[3]), 1.0)));
    store.set(&y, Value::Array(Rc::clone(&mine))).expect("set");

    store.set("y[2]", 8.0).expect("write through store");
    assert_eq!(numbers(&Value::Array(Rc::clone(&mine))), vec![1.0, 1.0, 1.0]);
    assert_eq!(numbers(&store.get(&y).expect("get")), vec![1.0, 1.0, 8.0]);

    // The caller's handle is independent of later store writes too.
    let handed_out = store.get(&y).expect("get");
    store.set("y[0]", 0.0).expect("write");
    assert_eq!(numbers(&handed_out), vec![1.0, 1.0, 8.0]);
}

#[test]
fn deleting_elements_clears_slots_then_the_vector() {
    let y = VarKey::vector("y", &[2]);
    let mut store = ValueStore::default();
    store.set(&y, vec![1.0, 2.0]).expect("set");

    store.delete("y[0]").expect("delete slot");
    assert!(store.contains(&y));
    assert!(!store.contains("y[0]"));
    assert!(store.get("y[0]").expect("slot").is_nan());

    store.delete(y.element(&[1]).expect("element")).expect("delete last slot");
    assert!(!store.contains(&y));
    assert!(!store.contains("y"));
    assert!(store.is_empty());
    assert_eq!(store.bucket_count(), 0);
}

#[test]
fn deleting_by_name_removes_every_key_under_it() {
    let a = VarKey::scalar("x").with_lineage(&[("A", 0)]);
    let b = VarKey::scalar("x").with_lineage(&[("B", 0)]);
    let mut store = ValueStore::default();
    store.set(&a, 1.0).expect("a");
    store.set(&b, 2.0).expect("b");
    store.delete("x").expect("delete");
    assert!(store.is_empty());
    assert!(!store.has_empty_bucket());
    assert_eq!(
        store.delete("x").expect_err("gone"),
        KeyError::UnknownKey("x".into())
    );
}

#[test]
fn unrelated_keys_sharing_a_name_are_ambiguous() {
    let a = VarKey::scalar("x").with_lineage(&[("A", 0)]);
    let b = VarKey::scalar("x").with_lineage(&[("B", 0)]);
    let mut store = ValueStore::default();
    store.set(&a, 1.0).expect("a");
    store.set(&b, 2.0).expect("b");

    let err = store.get("x").expect_err("ambiguous");
    assert_eq!(
        err,
        KeyError::AmbiguousKey {
            alias: "x".into(),
            candidates: vec!["x_A".into(), "x_B".into()],
        }
    );
    assert!(store.contains("x"));
    assert_eq!(store.get("x_B").expect("qualified"), Value::Number(2.0));
}

#[test]
fn elements_sharing_a_name_resolve_to_their_vector() {
    let y = VarKey::vector("y", &[2]);
    let presence = PresenceIndex::from_keys([y.clone()]);
    assert_eq!(presence.resolve(&Lookup::alias("y")).expect("parent"), y);

    let mut store = ValueStore::new(StoreConfig::presence());
    store.set(&y, vec![1.0, 2.0]).expect("set");
    let matches = store.get_matches("y").expect("matches");
    assert_eq!(matches.keys().cloned().collect::<Vec<_>>(), y.elements());
}

#[test]
fn unknown_names_and_bad_indices_are_errors() {
    let y = VarKey::vector("y", &[2]);
    let mut store = ValueStore::default();
    assert_eq!(
        store.get("nope").expect_err("unknown"),
        KeyError::UnknownKey("nope".into())
    );
    store.set(&y, vec![1.0, 2.0]).expect("set");
    assert!(matches!(
        store.get("y[5]").expect_err("range"),
        KeyError::IndexOutOfRange { .. }
    ));
    assert!(matches!(
        store.set("nope", 1.0).expect_err("strings never create keys"),
        KeyError::UnknownKey(_)
    ));
}

#[test]
fn indexing_a_scalar_is_rejected() {
    let mut store = ValueStore::default();
    store.set(VarKey::scalar("s"), 1.0).expect("set");
    assert!(matches!(
        store.get("s[0]").expect_err("scalar"),
        KeyError::NotAnArray(_)
    ));
}

#[test]
fn repeated_sets_leave_state_unchanged() {
    let x = beam_x();
    let y = VarKey::vector("y", &[2]);
    let mut store = ValueStore::default();
    store.set(&x, 1.5).expect("x");
    store.set(&y, vec![1.0, 2.0]).expect("y");
    let plain = store.to_plain();
    let buckets = store.bucket_count();

    store.set(&x, 1.5).expect("x again");
    store.set(&y, vec![1.0, 2.0]).expect("y again");
    assert_eq!(store.to_plain(), plain);
    assert_eq!(store.bucket_count(), buckets);
}

#[test]
fn quantities_convert_to_declared_units() {
    let metre = Unit::new("m", "length", 1.0);
    let foot = Unit::new("ft", "length", 0.3048);
    let second = Unit::new("s", "time", 1.0);
    let h = VarKey::scalar("h").with_units(metre.clone());
    let mut store = ValueStore::default();

    store.set(&h, Quantity::new(10.0, foot)).expect("convert");
    let tagged = store.quantity("h").expect("tagged");
    assert_eq!(tagged.unit, metre);
    let metres = tagged.value.as_number().expect("number");
    assert!((metres - 3.048).abs() < 1e-12);

    let err = store.set(&h, Quantity::new(1.0, second)).expect_err("dimension");
    assert!(matches!(err, KeyError::UnitMismatch { .. }));
}

#[test]
fn linked_vector_values_are_stored_per_element() {
    let y = VarKey::vector("y", &[2]);
    let x = VarKey::scalar("x");
    let mut store = ValueStore::default();
    store.set(&x, 3.0).expect("x");
    store
        .set(
            &y,
            Value::linked(|ctx| {
                let x = ctx.get("x")?.as_number().unwrap_or(f64::NAN);
                Ok(Value::vector(vec![x, 2.0 * x]))
            }),
        )
        .expect("linked");

    let Value::Linked(second) = store.get("y[1]").expect("slot") else {
        panic!("expected a linked slot");
    };
    assert_eq!(second.call(&store).expect("call"), Value::Number(6.0));
    assert!(store.get(&y).expect("whole").as_array().expect("array").is_object());
}

#[test]
fn sweep_placeholder_slot_counts_as_present() {
    let y = VarKey::vector("y", &[2]);
    let mut store = ValueStore::default();
    store.set("y", 0.0).expect_err("not registered yet");
    let y0 = y.element(&[0]).expect("element");
    store.set(&y0, Value::sweep([1.0, 2.0])).expect("sweep slot");
    assert!(store.contains("y[0]"));
    assert!(!store.contains("y[1]"));
    assert!(store.get(&y).expect("whole").as_array().expect("array").is_object());
}

#[test]
fn short_index_reads_across_a_leading_sweep_axis() {
    let y = VarKey::vector("y", &[2]);
    let swept =
        ArrayD::from_shape_vec(IxDyn(&[3, 2]), vec![1., 2., 3., 4., 5., 6.]).expect("shape");
    let mut store = ValueStore::default();
    store.set(&y, Value::array(swept)).expect("swept array");
    assert_eq!(numbers(&store.get("y[1]").expect("column")), vec![2.0, 4.0, 6.0]);
}

#[test]
fn bulk_merge_shares_storage_until_written() {
    let y = VarKey::vector("y", &[2]);
    let x = beam_x();
    let mut source = ValueStore::default();
    source.set(&y, vec![1.0, 2.0]).expect("y");
    source.set(&x, 5.0).expect("x");

    let mut merged = ValueStore::default();
    merged.merge(&source).expect("merge");
    assert!(!merged.is_owned(&y));
    merged.set("y[0]", 9.0).expect("write");
    merged.delete("x_Beam").expect("delete");

    assert_eq!(numbers(&source.get(&y).expect("source")), vec![1.0, 2.0]);
    assert_eq!(source.get("x").expect("source x"), Value::Number(5.0));
    assert_eq!(numbers(&merged.get(&y).expect("merged")), vec![9.0, 2.0]);
    assert!(!merged.contains("x"));
    assert!(!merged.has_empty_bucket());
    assert!(!source.has_empty_bucket());
}

#[test]
fn merge_into_non_empty_store_sets_each_entry() {
    let y = VarKey::vector("y", &[2]);
    let mut source = ValueStore::new(StoreConfig::presence());
    source.set(&y, vec![1.0, 2.0]).expect("elements");

    let mut target = ValueStore::default();
    target.set(VarKey::scalar("z"), 0.0).expect("z");
    target.merge(&source).expect("merge");
    assert_eq!(numbers(&target.get(&y).expect("collapsed")), vec![1.0, 2.0]);
    assert_eq!(target.len(), 2);
}

#[test]
fn plain_mapping_round_trips() {
    let y = VarKey::vector("y", &[2]);
    let mut store = ValueStore::default();
    store.set(&y, vec![1.0, 2.0]).expect("y");
    store.set(beam_x(), 4.0).expect("x");
    let rebuilt =
        ValueStore::from_plain(StoreConfig::default(), store.to_plain()).expect("rebuild");
    assert_eq!(rebuilt.to_plain(), store.to_plain());
    assert_eq!(rebuilt.get("x_Beam").expect("alias"), Value::Number(4.0));
}

#[test]
fn classifier_partitions_constants_sweeps_and_linked() {
    let x = VarKey::scalar("x");
    let s = VarKey::scalar("s");
    let l = VarKey::scalar("l");
    let vars = PresenceIndex::from_keys([x.clone(), s.clone(), l.clone()]);
    let subs = Substitutions::new()
        .constant("x", 2.0)
        .sweep("s", [1.0, 2.0, 3.0])
        .linked("l", |ctx| ctx.get("s"));

    let classified = parse_subs(&vars, &subs, false).expect("classify");
    assert_eq!(classified.constants.get(&x), Some(&Value::Number(2.0)));
    assert_eq!(classified.sweep[&s].len(), 3);
    assert!(classified.linked.contains_key(&l));
    assert_eq!(subs.len(), 3);
}

#[test]
fn vector_linked_values_are_split_per_element_and_swept() {
    let x = VarKey::scalar("x");
    let y = VarKey::vector("y", &[2]);
    let vars = PresenceIndex::from_keys([x.clone(), y.clone()]);
    let subs = Substitutions::new().constant(&x, 3.0).linked(&y, |ctx| {
        let x = ctx.get("x")?.as_number().unwrap_or(f64::NAN);
        Ok(Value::vector(vec![x, 2.0 * x]))
    });

    let classified = parse_subs(&vars, &subs, false).expect("classify");
    assert_eq!(classified.linked.keys().cloned().collect::<Vec<_>>(), y.elements());

    let plan = SweepPlan::new(StoreConfig::default(), &classified).expect("plan");
    let store = plan.store_at(0).expect("iteration");
    assert_eq!(store.get("y[0]").expect("y0"), Value::Number(3.0));
    assert_eq!(store.get("y[1]").expect("y1"), Value::Number(6.0));
}

#[test]
fn linked_number_for_a_vector_fills_every_element() {
    let y = VarKey::vector("y", &[2]);
    let vars = PresenceIndex::from_keys([y.clone()]);
    let subs = Substitutions::new().linked("y", |_| Ok(Value::Number(5.0)));
    let classified = parse_subs(&vars, &subs, false).expect("classify");
    let plan = SweepPlan::new(StoreConfig::default(), &classified).expect("plan");
    let store = plan.store_at(0).expect("iteration");
    assert_eq!(numbers(&store.get(&y).expect("whole")), vec![5.0, 5.0]);
}

#[test]
fn length_one_vectors_resolve_whole_and_indexed() {
    let y = VarKey::vector("y", &[1]);
    let vars = PresenceIndex::from_keys([y.clone()]);
    assert_eq!(vars.resolve(&Lookup::alias("y")).expect("whole"), y);
    assert_eq!(
        vars.resolve(&Lookup::parse("y[0]").expect("parse")).expect("slot"),
        y.element(&[0]).expect("element")
    );
    assert!(vars.contains("y[0]"));

    let mut store = ValueStore::default();
    store.set(&y, vec![4.0]).expect("set");
    let restored = ValueStore::restore(store.snapshot(), &vars).expect("restore");
    assert_eq!(numbers(&restored.get(&y).expect("whole")), vec![4.0]);
    assert_eq!(restored.get("y[0]").expect("slot"), Value::Number(4.0));

    let mut by_element = ValueStore::new(StoreConfig::presence());
    by_element.set(&y, vec![4.0]).expect("set");
    assert_eq!(numbers(&by_element.get(&y).expect("whole")), vec![4.0]);
}

#[test]
fn lone_stored_element_is_reachable_without_collapsing() {
    let y = VarKey::vector("y", &[3]);
    let mut store = ValueStore::new(StoreConfig::presence());
    store.set(y.element(&[0]).expect("element"), 1.0).expect("slot");
    assert!(store.contains("y[0]"));
    assert!(!store.contains("y[1]"));
    assert_eq!(store.get("y[0]").expect("slot"), Value::Number(1.0));

    let whole = store.get("y").expect("padded");
    assert_eq!(whole.value_at(&[0]), Some(Value::Number(1.0)));
    assert!(whole.value_at(&[2]).expect("slot").is_nan());
}

#[test]
fn classifier_shape_error_names_both_shapes() {
    let y = VarKey::vector("y", &[3]);
    let vars = PresenceIndex::from_keys([y]);
    let subs = Substitutions::new().constant("y", vec![1.0, 2.0, 3.0, 4.0]);
    let err = parse_subs(&vars, &subs, false).expect_err("shape");
    let message = err.to_string();
    assert!(message.contains("(4,)"), "{message}");
    assert!(message.contains("(3,)"), "{message}");
}

#[test]
fn sweep_plan_yields_cross_product_with_linked_values() {
    let a = VarKey::scalar("a");
    let b = VarKey::scalar("b");
    let c = VarKey::scalar("c");
    let total = VarKey::scalar("total");
    let vars = PresenceIndex::from_keys([a.clone(), b.clone(), c.clone(), total.clone()]);
    let subs = Substitutions::new()
        .constant(&c, 100.0)
        .sweep(&a, [1.0, 2.0])
        .sweep(&b, [10.0, 20.0])
        .linked(&total, |ctx| {
            let sum: f64 = ["a", "b", "c"]
                .iter()
                .map(|name| ctx.get(*name).map(|v| v.as_number().unwrap_or(f64::NAN)))
                .sum::<Result<f64, KeyError>>()?;
            Ok(Value::Number(sum))
        });
    let classified = parse_subs(&vars, &subs, false).expect("classify");
    let plan = SweepPlan::new(StoreConfig::default(), &classified).expect("plan");

    let totals: Vec<f64> = plan
        .iter()
        .map(|store| {
            store
                .expect("iteration")
                .get(&total)
                .expect("total")
                .as_number()
                .expect("number")
        })
        .collect();
    assert_eq!(totals, vec![111.0, 121.0, 112.0, 122.0]);
}

#[test]
fn failing_linked_values_name_their_key() {
    let l = VarKey::scalar("l");
    let mut classified = Classified::default();
    classified
        .linked
        .insert(l.clone(), Linked::new(|ctx| ctx.get("missing")));
    let plan = SweepPlan::new(StoreConfig::default(), &classified).expect("plan");
    let err = plan.store_at(0).expect_err("linked failure");
    assert!(matches!(err, KeyError::Linked { ref key, .. } if key == "l"));

    let store = ValueStore::default();
    assert!(evaluate_linked(&classified.linked, &store).is_err());
}

#[test]
fn lookup_strings_report_caret_positions() {
    let err = Lookup::parse("y[0 1]").expect_err("missing comma");
    assert_eq!(err.line, 1);
    assert_eq!(first_caret_column(&err.pointer), Some(err.column));
    assert!(err.to_string().contains("line 1"));

    // Strings that are not lookup syntax are taken verbatim.
    assert_eq!(Lookup::from("a b"), Lookup::alias("a b"));
}

#[test]
fn snapshot_round_trips_through_json() {
    let y = VarKey::vector("y", &[2]).with_lineage(&[("Beam", 0)]);
    let x = beam_x();
    let vars = PresenceIndex::from_keys([y.clone(), x.clone()]);
    let mut store = ValueStore::default();
    store.set(&y, Value::vector(vec![1.0, f64::NAN])).expect("y");
    store.set(&x, 2.0).expect("x");

    let json = serde_json::to_string(&store.snapshot()).expect("serialize");
    let snapshot: Snapshot = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    let restored = ValueStore::restore(snapshot, &vars).expect("restore");

    assert_eq!(restored.get("x_Beam").expect("x"), Value::Number(2.0));
    assert_eq!(restored.get("y_Beam[0]").expect("y0"), Value::Number(1.0));
    assert!(!restored.contains("y[1]"));
}

// Keys

#[test]
fn element_keys_compare_by_parent_and_index() {
    let y = VarKey::vector("y", &[3]);
    let a = y.element(&[1]).expect("in range");
    let b = y.element(&[1]).expect("in range");
    let c = y.element(&[2]).expect("in range");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.veckey(), Some(&y));
    assert_eq!(a.kind(), KeyKind::ArrayElement);
    assert_eq!(a.to_string(), "y[1]");
}

#[test]
fn same_name_keys_are_distinct() {
    assert_ne!(VarKey::scalar("x"), VarKey::scalar("x"));
}

#[test]
fn builders_make_new_variables() {
    let x = VarKey::scalar("x");
    let metered = x.clone().with_units(Unit::new("m", "length", 1.0));
    assert_ne!(metered, x);
    assert_eq!(metered.name(), x.name());
    assert_eq!(x.units(), None);
}

#[test]
fn element_index_is_bounds_checked() {
    let y = VarKey::vector("y", &[3]);
    let err = y.element(&[3]).expect_err("out of range");
    assert!(matches!(err, KeyError::IndexOutOfRange { .. }));
    let err = y.element(&[0, 0]).expect_err("wrong rank");
    assert!(matches!(err, KeyError::IndexOutOfRange { .. }));
    let x = VarKey::scalar("x");
    assert!(matches!(x.element(&[0]), Err(KeyError::NotAnArray(_))));
}

#[test]
fn aliases_include_lineage() {
    let x = VarKey::scalar("x").with_lineage(&[("Aircraft", 0), ("Wing", 2)]);
    assert_eq!(x.qualified_name(), "x_Aircraft.Wing2");
    assert_eq!(x.aliases(), vec!["x".to_string(), "x_Aircraft.Wing2".to_string()]);
    assert_eq!(VarKey::scalar("z").aliases(), vec!["z".to_string()]);
}

#[test]
fn elements_are_row_major() {
    let m = VarKey::vector("m", &[2, 2]);
    let idx: Vec<Vec<usize>> = m
        .elements()
        .iter()
        .map(|k| k.idx().expect("element").to_vec())
        .collect();
    assert_eq!(idx, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
}

// Units

#[test]
fn converts_within_dimension() {
    let m = Unit::new("m", "length", 1.0);
    let ft = Unit::new("ft", "length", 0.3048);
    let q = Quantity::new(10.0, ft);
    let meters = q.to(&m).expect("same dimension");
    assert!((meters - 3.048).abs() < 1e-12);
}

#[test]
fn refuses_cross_dimension_conversion() {
    let m = Unit::new("m", "length", 1.0);
    let s = Unit::new("s", "time", 1.0);
    assert_eq!(Quantity::new(1.0, s).to(&m), None);
    assert_eq!(
        Quantity::new(2.0, Unit::dimensionless()).to(&Unit::dimensionless()),
        Some(2.0)
    );
}

// Values

#[test]
fn short_index_reads_across_sweep_axis() {
    let a = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1., 2., 3., 4., 5., 6.])
        .expect("shape");
    let data = ArrayData::Numeric(a);
    let column = data.value_at(&[1]).expect("in range");
    assert_eq!(column, Value::vector(vec![2., 5.]));
    assert_eq!(data.value_at(&[1, 2]), Some(Value::Number(6.)));
    assert_eq!(data.value_at(&[3]), None);
    assert_eq!(data.value_at(&[0, 0, 0]), None);
}

#[test]
fn assigning_placeholder_promotes_storage() {
    let mut data = ArrayData::nan(&[3], false);
    assert!(data.assign(&[0], Element::Number(1.0)));
    assert!(!data.is_object());
    assert!(data.assign(&[1], Element::Sweep(ArrayD::zeros(IxDyn(&[2])))));
    assert!(data.is_object());
    assert_eq!(data.value_at(&[0]), Some(Value::Number(1.0)));
    assert_eq!(data.is_present(&[1]), Some(true));
    assert_eq!(data.is_present(&[2]), Some(false));
    assert!(!data.assign(&[5], Element::Number(0.0)));
}

#[test]
fn overwrite_skips_nan_slots() {
    let mut data =
        ArrayData::Numeric(ArrayD::from_shape_vec(IxDyn(&[3]), vec![1., 2., 3.]).expect("shape"));
    let incoming = ArrayData::Numeric(
        ArrayD::from_shape_vec(IxDyn(&[3]), vec![f64::NAN, 20., f64::NAN]).expect("shape"),
    );
    data.overwrite_present(&incoming);
    let values: Vec<f64> = data.to_numeric().expect("numeric").iter().copied().collect();
    assert_eq!(values, vec![1., 20., 3.]);
}

#[test]
fn nested_sequences_become_dense() {
    let value = Value::Sequence(vec![Value::from(vec![1., 2.]), Value::from(vec![3., 4.])]);
    let data = value.to_array_data().expect("rectangular");
    assert_eq!(data.shape(), &[2, 2]);
    let ragged = Value::Sequence(vec![Value::from(vec![1.]), Value::from(vec![3., 4.])]);
    assert!(ragged.to_array_data().is_none());
}

#[test]
fn sequence_with_placeholder_is_object_typed() {
    let value = Value::Sequence(vec![Value::Number(1.), Value::sweep([1., 2.])]);
    assert!(value.to_array_data().expect("dense").is_object());
}

#[test]
fn shapes_format_like_tuples() {
    assert_eq!(fmt_shape(&[3]), "(3,)");
    assert_eq!(fmt_shape(&[2, 3]), "(2, 3)");
    assert_eq!(fmt_index(&[0, 2]), "[0, 2]");
}

// Lookup parsing

#[test]
fn parses_plain_and_indexed_names() {
    assert_eq!(parse_lookup("x").unwrap(), Lookup::alias("x"));
    assert_eq!(
        parse_lookup(" y_Model.Sub1[0, 2] ").unwrap(),
        Lookup::Alias {
            name: "y_Model.Sub1".into(),
            index: Some(vec![0, 2]),
        }
    );
    assert_eq!(
        parse_lookup("y[1]").unwrap(),
        Lookup::Alias {
            name: "y".into(),
            index: Some(vec![1]),
        }
    );
}

#[test]
fn rejects_trailing_text_and_bad_indices() {
    let err = parse_lookup("y[1]z").unwrap_err();
    assert_eq!(err.line, 1);
    assert_eq!(err.column, 5);
    assert!(parse_lookup("y[-1]").is_err());
    assert!(parse_lookup("y[]").is_err());
    assert!(parse_lookup("[1]").is_err());
}

#[test]
fn diagnostics_point_at_the_failure() {
    let err = parse_lookup("y[1,").unwrap_err();
    assert_eq!(err.message, "Syntax error: expected closing bracket");
    assert_eq!(err.snippet, "y[1,");
    assert_eq!(err.column, 4);
    assert_eq!(err.pointer, "   ^");
}

// Presence index

#[test]
fn vector_keys_are_tracked_by_element() {
    let y = VarKey::vector("y", &[3]);
    let presence = PresenceIndex::from_keys([y.clone()]);
    assert_eq!(presence.len(), 3);
    assert!(presence.contains(&y));
    assert!(presence.contains("y[2]"));
    assert!(!presence.contains("y[3]"));
    assert_eq!(presence.candidates(&Lookup::from(&y)), y.elements());
    assert_eq!(presence.resolve(&Lookup::alias("y")).expect("parent"), y);
}

#[test]
fn removing_every_element_forgets_the_vector() {
    let y = VarKey::vector("y", &[2]);
    let mut presence = PresenceIndex::from_keys([y.clone()]);
    presence.remove(&y);
    assert!(presence.is_empty());
    assert!(!presence.contains("y"));
    assert!(!presence.contains(&y));
    assert!(!presence.has_empty_bucket());
}

#[test]
fn shared_short_names_are_present_but_ambiguous() {
    let a = VarKey::scalar("x").with_lineage(&[("A", 0)]);
    let b = VarKey::scalar("x").with_lineage(&[("B", 0)]);
    let presence = PresenceIndex::from_keys([a.clone(), b]);
    assert!(presence.contains("x"));
    assert!(matches!(
        presence.resolve(&Lookup::alias("x")),
        Err(KeyError::AmbiguousKey { .. })
    ));
    assert_eq!(presence.resolve(&Lookup::alias("x_A")).expect("qualified"), a);
}

// Value store

#[test]
fn first_write_to_shared_array_copies_it() {
    let y = VarKey::vector("y", &[3]);
    let mut store = ValueStore::default();
    let caller = Rc::new(ArrayData::Numeric(ArrayD::from_elem(IxDyn(&[3]), 1.0)));
    store.set(&y, Value::Array(Rc::clone(&caller))).expect("set");
    assert!(!store.is_owned(&y));

    store.set(y.element(&[0]).expect("element"), 9.0).expect("slot");
    assert!(store.is_owned(&y));
    assert_eq!(caller.value_at(&[0]), Some(Value::Number(1.0)));
    assert_eq!(store.get("y[0]").expect("get"), Value::Number(9.0));
}

#[test]
fn handles_from_get_survive_later_writes() {
    let y = VarKey::vector("y", &[2]);
    let mut store = ValueStore::default();
    store.set(&y, vec![1.0, 2.0]).expect("set");
    assert!(store.is_owned(&y));
    let before = store.get(&y).expect("get");
    store.set("y[1]", 5.0).expect("slot");
    assert_eq!(before.value_at(&[1]), Some(Value::Number(2.0)));
    assert_eq!(store.get("y[1]").expect("get"), Value::Number(5.0));
}

#[test]
fn whole_array_write_keeps_slots_the_update_leaves_nan() {
    let y = VarKey::vector("y", &[3]);
    let mut store = ValueStore::default();
    store.set(&y, vec![1.0, 2.0, 3.0]).expect("set");
    store.set(&y, Value::vector(vec![f64::NAN, 7.0, f64::NAN])).expect("update");
    assert_eq!(store.get(&y).expect("get"), Value::vector(vec![1.0, 7.0, 3.0]));
}

#[test]
fn elementwise_storage_assembles_vectors() {
    let y = VarKey::vector("y", &[3]);
    let mut store = ValueStore::new(StoreConfig::presence());
    store.set(&y, vec![1.0, 2.0, 3.0]).expect("set");
    assert_eq!(store.len(), 3);
    assert_eq!(store.get("y").expect("get"), Value::vector(vec![1.0, 2.0, 3.0]));
    assert_eq!(store.get_matches("y").expect("matches").len(), 3);
    let err = store.set(&y, vec![1.0, 2.0]).expect_err("short");
    assert_eq!(
        err.to_string(),
        "cannot use array of shape (2,) for variable y of shape (3,)"
    );
}

#[test]
fn scoped_store_rejects_names_ambiguous_in_model() {
    let a = VarKey::scalar("x").with_lineage(&[("A", 0)]);
    let b = VarKey::scalar("x").with_lineage(&[("B", 0)]);
    let scope = PresenceIndex::from_keys([a.clone(), b]);
    let mut store = ValueStore::with_scope(StoreConfig::default(), scope);
    store.set("x_A", 1.0).expect("qualified name resolves");
    assert_eq!(store.get(&a).expect("by key"), Value::Number(1.0));
    assert!(matches!(store.get("x"), Err(KeyError::AmbiguousKey { .. })));
}

#[test]
fn padded_vectors_differ_from_stored_matches() {
    let y = VarKey::vector("y", &[3]);
    let mut store = ValueStore::new(StoreConfig::presence());
    store.set(y.element(&[1]).expect("element"), 4.0).expect("slot");
    let padded = store.get(&y).expect("padded");
    assert!(padded.value_at(&[0]).expect("slot").is_nan());
    assert_eq!(padded.value_at(&[1]), Some(Value::Number(4.0)));
    let stored = store.get_matches("y").expect("matches");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.keys().next(), y.element(&[1]).ok().as_ref());
}

// Snapshots

#[test]
fn version_one_documents_load_without_ownership() {
    let y = VarKey::vector("y", &[2]).with_lineage(&[("Beam", 0)]);
    let vars = PresenceIndex::from_keys([y.clone()]);
    let json = r#"{
        "version": 1,
        "entries": [
            {"key": "y_Beam", "value": {"kind": "array", "shape": [2], "data": [1.0, null]}}
        ]
    }"#;
    let snapshot: Snapshot = serde_json::from_str(json).expect("v1 parses");
    assert!(snapshot.owned.is_empty());
    let store = ValueStore::restore(snapshot, &vars).expect("restores");
    assert!(!store.is_owned(&y));
    assert_eq!(store.get("y[0]").expect("slot"), Value::Number(1.0));
    assert!(!store.contains("y[1]"));
}

#[test]
fn unknown_versions_are_rejected() {
    let snapshot = Snapshot {
        version: 9,
        collapse_arrays: true,
        entries: Vec::new(),
        owned: Vec::new(),
    };
    let err = ValueStore::restore(snapshot, &PresenceIndex::new()).expect_err("version");
    assert!(matches!(err, KeyError::Snapshot(_)));
}

#[test]
fn linked_entries_are_left_out() {
    let x = VarKey::scalar("x");
    let z = VarKey::scalar("z");
    let mut store = ValueStore::default();
    store.set(&x, 2.0).expect("x");
    store.set(&z, Value::linked(|_| Ok(Value::Number(1.0)))).expect("z");
    let snapshot = store.snapshot();
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].key, "x");
}

// Classifier

#[test]
fn numbers_become_constants_and_nan_is_dropped() {
    let x = VarKey::scalar("x");
    let z = VarKey::scalar("z");
    let vars = PresenceIndex::from_keys([x.clone(), z.clone()]);
    let subs = Substitutions::new().constant("x", 2.0).constant(&z, f64::NAN);
    let classified = parse_subs(&vars, &subs, false).expect("classify");
    assert_eq!(classified.constants.get(&x), Some(&Value::Number(2.0)));
    assert!(!classified.constants.contains_key(&z));
    assert!(classified.sweep.is_empty());
}

#[test]
fn vector_values_are_split_per_element() {
    let y = VarKey::vector("y", &[3]);
    let vars = PresenceIndex::from_keys([y.clone()]);
    let subs = Substitutions::new().constant("y", vec![1.0, 2.0, 3.0]);
    let classified = parse_subs(&vars, &subs, false).expect("classify");
    assert_eq!(classified.constants.len(), 3);
    let y2 = y.element(&[2]).expect("element");
    assert_eq!(classified.constants.get(&y2), Some(&Value::Number(3.0)));
}

#[test]
fn swept_vector_needs_leading_axis() {
    let y = VarKey::vector("y", &[2]);
    let vars = PresenceIndex::from_keys([y.clone()]);
    let sweep =
        ArrayD::from_shape_vec(IxDyn(&[3, 2]), vec![1., 2., 3., 4., 5., 6.]).expect("shape");
    let subs = Substitutions::new().constant(&y, Value::Sweep(sweep));
    let classified = parse_subs(&vars, &subs, false).expect("classify");
    let y1 = y.element(&[1]).expect("element");
    let candidates: Vec<f64> = classified.sweep[&y1].iter().copied().collect();
    assert_eq!(candidates, vec![2., 4., 6.]);
}

#[test]
fn one_swept_element_sweeps_alone() {
    let y = VarKey::vector("y", &[2]);
    let vars = PresenceIndex::from_keys([y.clone()]);
    let value = Value::Sequence(vec![Value::Number(1.0), Value::sweep([5.0, 6.0])]);
    let subs = Substitutions::new().constant("y", value);
    let classified = parse_subs(&vars, &subs, false).expect("classify");
    let [y0, y1] = [y.element(&[0]).expect("y0"), y.element(&[1]).expect("y1")];
    assert_eq!(classified.constants.get(&y0), Some(&Value::Number(1.0)));
    assert_eq!(classified.sweep[&y1].len(), 2);
    assert!(!classified.constants.contains_key(&y1));
}

#[test]
fn clean_mode_matches_exact_keys_only() {
    let x = VarKey::scalar("x");
    let vars = PresenceIndex::from_keys([x.clone()]);
    let subs = Substitutions::new().constant("x", 1.0);
    assert!(parse_subs(&vars, &subs, true).expect("clean").is_empty());
    let subs = Substitutions::new().constant(&x, 1.0);
    assert_eq!(parse_subs(&vars, &subs, true).expect("clean").constants.len(), 1);
}

#[test]
fn clean_mode_splits_vector_keyed_entries() {
    let y = VarKey::vector("y", &[2]);
    let vars = PresenceIndex::from_keys([y.clone()]);
    let subs = Substitutions::new().constant(&y, vec![4.0, 5.0]);
    let classified = parse_subs(&vars, &subs, true).expect("clean");
    let y1 = y.element(&[1]).expect("element");
    assert_eq!(classified.constants.get(&y1), Some(&Value::Number(5.0)));
}

#[test]
fn unknown_entries_are_skipped() {
    let vars = PresenceIndex::from_keys([VarKey::scalar("x")]);
    let subs = Substitutions::new().constant("w", 1.0);
    assert!(parse_subs(&vars, &subs, false).expect("classify").is_empty());
}

// Sweeps

fn swept_over(sweeps: &[(&VarKey, Vec<f64>)]) -> Classified {
    let mut out = Classified::default();
    for (key, values) in sweeps {
        let n = values.len();
        let candidates = ArrayD::from_shape_vec(IxDyn(&[n]), values.clone()).expect("1-d");
        out.sweep.insert((*key).clone(), candidates);
    }
    out
}

#[test]
fn last_axis_varies_fastest() {
    let a = VarKey::scalar("a");
    let b = VarKey::scalar("b");
    let plan = SweepPlan::new(
        StoreConfig::default(),
        &swept_over(&[(&a, vec![1.0, 2.0]), (&b, vec![10.0, 20.0, 30.0])]),
    )
    .expect("plan");
    assert_eq!(plan.len(), 6);
    let p1 = plan.point(1).expect("point");
    assert_eq!((p1[&a], p1[&b]), (1.0, 20.0));
    let p3 = plan.point(3).expect("point");
    assert_eq!((p3[&a], p3[&b]), (2.0, 10.0));
    assert!(plan.point(6).is_none());
}

#[test]
fn nothing_swept_is_one_iteration() {
    let plan = SweepPlan::new(StoreConfig::default(), &Classified::default()).expect("plan");
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.iter().count(), 1);
}

#[test]
fn multi_dimensional_candidates_are_rejected() {
    let a = VarKey::scalar("a");
    let mut subs = Classified::default();
    subs.sweep.insert(a, ArrayD::zeros(IxDyn(&[2, 2])));
    let err = SweepPlan::new(StoreConfig::default(), &subs).expect_err("2-d");
    assert!(matches!(err, KeyError::ShapeMismatch { .. }));
}
