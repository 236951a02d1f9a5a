// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use opflow::*;

fn union(types: &[DataType]) -> DataType {
    resolve_union_type(types, true, None)
}

#[test]
fn unions_compare_regardless_of_order() {
    let a = union(&[DataType::String, DataType::Number]);
    let b = union(&[DataType::Number, DataType::String]);
    assert!(is_type_compatible(&a, &b));
    assert!(is_type_compatible(&b, &a));

    let c = union(&[DataType::Number, DataType::Boolean]);
    assert!(!is_type_compatible(&a, &c));
}

#[test]
fn union_resolution_is_idempotent() {
    let once = resolve_union_type(
        &[
            DataType::String,
            DataType::Number,
            DataType::String,
            union(&[DataType::Boolean, DataType::Number]),
        ],
        false,
        None,
    );
    let members = once.union_members().map(|m| m.to_vec()).unwrap_or_default();
    assert_eq!(members.len(), 3);
    assert_eq!(resolve_union_type(&members, false, None), once);

    assert_eq!(resolve_union_type(&[DataType::String], false, None), DataType::String);
    assert_eq!(resolve_union_type(&[], false, None), DataType::Never);
}

#[test]
fn signatures_are_truncated_at_depth() {
    let nested = DataType::array(DataType::array(DataType::array(DataType::Number)));
    assert_eq!(get_type_signature(&nested, 10), nested.to_string());
    assert!(get_type_signature(&nested, 1).contains("..."));
}

#[test]
fn types_round_trip_through_json() -> Result<()> {
    let ty = DataType::operation(
        vec![
            ParameterType::new("items", DataType::array(DataType::String)),
            ParameterType::new("limit", DataType::Number).optional(),
        ],
        DataType::dictionary(DataType::Boolean),
    );
    let json = serde_json::to_string(&ty)?;
    assert!(json.contains(r#""kind":"operation""#));
    assert!(json.contains(r#""isOptional":true"#));
    let back: DataType = serde_json::from_str(&json)?;
    assert_eq!(back, ty);
    Ok(())
}

#[test]
fn defaults_match_their_type() {
    let options = DefaultValueOptions::default();
    let cases = [
        DataType::String,
        DataType::Number,
        DataType::Boolean,
        DataType::array(DataType::Number),
        DataType::dictionary(DataType::String),
        DataType::object([("a", DataType::Number), ("b", DataType::String)]),
        union(&[DataType::Undefined, DataType::Number]),
        DataType::Tuple {
            elements: vec![DataType::String, DataType::Number],
        },
    ];
    for ty in cases {
        let data = create_default_data(&ty, &options);
        let inferred = infer_type_from_value(
            &data.value,
            &Context::default().with_expected_type(Some(ty.clone())),
        );
        assert!(
            is_type_compatible(&inferred, &ty),
            "default of `{ty}` was inferred as `{inferred}`"
        );
    }
}

#[test]
fn narrowing_splits_the_union() {
    let original = union(&[DataType::String, DataType::Number, DataType::Boolean]);
    let narrowed = narrow_type(&original, &DataType::String);
    let inverse = get_inverse_types(&original, &DataType::String);
    assert_eq!(narrowed, DataType::String);

    let mut members: Vec<DataType> = vec![narrowed];
    members.extend(inverse.union_members().map(|m| m.to_vec()).unwrap_or_default());
    assert!(is_type_compatible(&union(&members), &original));
}
