// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Branch-local refinement of variable types.
//!
//! A boolean check on a referenced variable (`isTypeOf`, `isEqual`) yields
//! two maps: the type each variable must have when the check holds
//! (`narrowed`) and the type it has otherwise (`inverse`). `not` swaps them,
//! `and`/`or` combine them. The maps only take effect once a branch is
//! entered, see [`crate::context::Context::enter_branch`].

use crate::context::Context;
use crate::types::{is_type_compatible, resolve_union_type, DataType};
use crate::value::{IData, Statement, Value};
use crate::Rc;

use indexmap::IndexMap;

pub type TypeMap = IndexMap<Rc<str>, DataType>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Narrowing {
    pub narrowed: TypeMap,
    pub inverse: TypeMap,
}

impl Narrowing {
    pub fn swap(self) -> Self {
        Narrowing {
            narrowed: self.inverse,
            inverse: self.narrowed,
        }
    }

    /// True if either side proves a variable can have no value.
    pub fn narrowed_is_never(&self) -> bool {
        self.narrowed.values().any(|t| matches!(t, DataType::Never))
    }

    pub fn inverse_is_never(&self) -> bool {
        self.inverse.values().any(|t| matches!(t, DataType::Never))
    }
}

// Objects match structurally: every property of the target must be present
// and compatible. Other targets use plain compatibility.
fn member_matches(member: &DataType, target: &DataType) -> bool {
    match (member.dereference(), target.dereference()) {
        (_, DataType::Union { types, .. }) => types.iter().any(|t| member_matches(member, t)),
        (
            DataType::Object {
                properties: have, ..
            },
            DataType::Object {
                properties: want, ..
            },
        ) => want.iter().all(|(name, ty)| match have.get(name) {
            Some(h) => is_type_compatible(h, ty),
            None => false,
        }),
        (DataType::Object { .. }, _) | (_, DataType::Object { .. }) => false,
        (m, t) => is_type_compatible(m, t),
    }
}

/// Type `original` must have given that it matches `target`.
pub fn narrow_type(original: &DataType, target: &DataType) -> DataType {
    match original.dereference() {
        DataType::Unknown => target.clone(),
        DataType::Union {
            types,
            active_index,
        } => {
            let matched: Vec<DataType> = types
                .iter()
                .filter(|t| member_matches(t, target))
                .cloned()
                .collect();
            // Keep the active member active if it survived.
            let active = active_index
                .and_then(|idx| types.get(idx))
                .and_then(|a| matched.iter().position(|m| m == a));
            resolve_union_type(&matched, false, active)
        }
        other if member_matches(other, target) => other.clone(),
        _ => DataType::Never,
    }
}

/// Type `original` has given that it does not match `target`.
pub fn get_inverse_types(original: &DataType, target: &DataType) -> DataType {
    match original.dereference() {
        DataType::Unknown => DataType::Unknown,
        DataType::Union { types, .. } => {
            let remaining: Vec<DataType> = types
                .iter()
                .filter(|t| !member_matches(t, target))
                .cloned()
                .collect();
            resolve_union_type(&remaining, false, None)
        }
        other if member_matches(other, target) => DataType::Never,
        other => other.clone(),
    }
}

/// Runtime `isTypeOf` check.
pub fn matches_type(data: &IData, target: &DataType) -> bool {
    let actual = match data.ty.dereference() {
        DataType::Union {
            types,
            active_index,
        } => match active_index.and_then(|idx| types.get(idx)) {
            Some(active) => active.clone(),
            None => runtime_kind(&data.value),
        },
        DataType::Unknown => runtime_kind(&data.value),
        other => other.clone(),
    };
    member_matches(&actual, target)
}

fn runtime_kind(value: &Value) -> DataType {
    match value {
        Value::Undefined => DataType::Undefined,
        Value::String(_) => DataType::String,
        Value::Number(_) => DataType::Number,
        Value::Boolean(_) => DataType::Boolean,
        _ => DataType::Unknown,
    }
}

fn merge_with<F>(left: &TypeMap, right: &TypeMap, combine: F) -> TypeMap
where
    F: Fn(&DataType, &DataType) -> DataType,
{
    let mut merged = left.clone();
    for (name, ty) in right {
        let combined = match left.get(name) {
            Some(existing) => combine(existing, ty),
            None => ty.clone(),
        };
        merged.insert(name.clone(), combined);
    }
    merged
}

fn intersect_with<F>(left: &TypeMap, right: &TypeMap, combine: F) -> TypeMap
where
    F: Fn(&DataType, &DataType) -> DataType,
{
    left.iter()
        .filter_map(|(name, l)| right.get(name).map(|r| (name.clone(), combine(l, r))))
        .collect()
}

fn union_of(a: &DataType, b: &DataType) -> DataType {
    resolve_union_type(&[a.clone(), b.clone()], false, None)
}

fn variable_type(context: &Context, name: &str, fallback: &DataType) -> DataType {
    match context.get_variable(name) {
        Some(var) => var.data.ty.dereference().clone(),
        None => fallback.dereference().clone(),
    }
}

/// Narrowing produced by chaining `operation` on `data` when the receiver
/// already carries `current`.
pub fn apply_type_narrowing(
    context: &Context,
    data: &IData,
    current: Option<&Narrowing>,
    operation: &IData,
) -> Option<Narrowing> {
    let op = operation.as_operation()?;
    let name = op.name.as_deref()?;
    let argument = op.parameters.first();

    match name {
        "isTypeOf" | "isEqual" => {
            let reference = data.as_reference()?;
            let target = argument?.result_type();
            let original = variable_type(context, &reference.name, &data.ty);
            let narrowed = narrow_type(&original, &target);
            let mut result = Narrowing::default();
            result.narrowed.insert(reference.name.clone(), narrowed);
            // Equality with a value only says something about the other
            // branch when the value is `undefined`.
            if name == "isTypeOf" || matches!(target, DataType::Undefined) {
                result
                    .inverse
                    .insert(reference.name.clone(), get_inverse_types(&original, &target));
            }
            Some(result)
        }
        "not" => current.cloned().map(Narrowing::swap),
        "and" => {
            let left = current.cloned().unwrap_or_default();
            let right = get_statement_narrowing(context, argument?).unwrap_or_default();
            Some(Narrowing {
                narrowed: merge_with(&left.narrowed, &right.narrowed, narrow_type),
                inverse: intersect_with(&left.inverse, &right.inverse, union_of),
            })
        }
        "or" => {
            let left = current.cloned().unwrap_or_default();
            let right = get_statement_narrowing(context, argument?).unwrap_or_default();
            Some(Narrowing {
                narrowed: intersect_with(&left.narrowed, &right.narrowed, union_of),
                inverse: merge_with(&left.inverse, &right.inverse, narrow_type),
            })
        }
        _ => None,
    }
}

/// Narrowing produced by a whole statement's operation chain.
pub fn get_statement_narrowing(context: &Context, statement: &Statement) -> Option<Narrowing> {
    let mut narrowing = None;
    let mut receiver = statement.data.clone();
    for operation in statement.operations.iter() {
        narrowing = apply_type_narrowing(context, &receiver, narrowing.as_ref(), operation);
        // Later operations receive the previous result, not the reference.
        receiver = context
            .get_result(&operation.id)
            .unwrap_or_else(IData::undefined);
    }
    narrowing
}
