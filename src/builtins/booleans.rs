// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Boolean combinators. `and`, `or` and `thenElse` receive their arguments
//! unevaluated so that a dead operand never runs.

use crate::builtins::utils::{ensure_bool, ensure_lazy_args_count, receiver, returns_boolean};
use crate::builtins::Builtin;
use crate::context::{Branch, Context};
use crate::interpreter::execute_lazy_argument;
use crate::types::{is_type_compatible, resolve_union_type, DataType, ParameterType};
use crate::value::{IData, Statement};

use anyhow::Result;

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::lazy("and", "boolean", one_boolean, returns_boolean, and));
    m.push(Builtin::lazy("or", "boolean", one_boolean, returns_boolean, or));
    m.push(Builtin::eager("not", "boolean", boolean_only, returns_boolean, not));
    m.push(Builtin::lazy("thenElse", "boolean", branches, branches_result, then_else));
}

fn boolean_only(_: &IData) -> Vec<ParameterType> {
    vec![receiver(DataType::Boolean)]
}

fn one_boolean(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::Boolean),
        ParameterType::new("value", DataType::Boolean),
    ]
}

fn branches(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::Boolean),
        ParameterType::new("true", DataType::Unknown),
        ParameterType::new("false", DataType::Unknown),
    ]
}

fn branches_result(_: &IData, arguments: &[DataType]) -> DataType {
    resolve_union_type(arguments, false, None)
}

fn and(context: &Context, data: &IData, args: &[Statement]) -> Result<IData> {
    let name = "and";
    ensure_lazy_args_count(name, args, 1)?;
    let left = ensure_bool(name, data)?;
    let right = execute_lazy_argument(
        context,
        data,
        name,
        0,
        &args[0],
        Some(Branch::Narrowed),
        Some(DataType::Boolean),
    );
    if !left {
        return Ok(IData::boolean(false));
    }
    if right.is_error() {
        return Ok(right);
    }
    Ok(IData::boolean(ensure_bool(name, &right)?))
}

fn or(context: &Context, data: &IData, args: &[Statement]) -> Result<IData> {
    let name = "or";
    ensure_lazy_args_count(name, args, 1)?;
    let left = ensure_bool(name, data)?;
    let right = execute_lazy_argument(
        context,
        data,
        name,
        0,
        &args[0],
        Some(Branch::Inverse),
        Some(DataType::Boolean),
    );
    if left {
        return Ok(IData::boolean(true));
    }
    if right.is_error() {
        return Ok(right);
    }
    Ok(IData::boolean(ensure_bool(name, &right)?))
}

fn not(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::boolean(!ensure_bool("not", data)?))
}

/// Evaluates both branches, the dead one under an unreachable skip, and
/// returns the live one typed as the union of both branch types.
fn then_else(context: &Context, data: &IData, args: &[Statement]) -> Result<IData> {
    let name = "thenElse";
    ensure_lazy_args_count(name, args, 2)?;
    let condition = ensure_bool(name, data)?;
    let on_true = execute_lazy_argument(
        context,
        data,
        name,
        0,
        &args[0],
        Some(Branch::Narrowed),
        None,
    );
    let on_false = execute_lazy_argument(
        context,
        data,
        name,
        1,
        &args[1],
        Some(Branch::Inverse),
        None,
    );

    let chosen = if condition { on_true.clone() } else { on_false.clone() };
    if chosen.is_error() {
        return Ok(chosen);
    }

    let ty = resolve_union_type(&[on_true.ty, on_false.ty], false, None);
    let ty = match ty {
        DataType::Union { types, .. } => {
            let active = types.iter().position(|m| {
                is_type_compatible(&chosen.ty, m) && is_type_compatible(m, &chosen.ty)
            });
            DataType::Union {
                types,
                active_index: active.or(Some(0)),
            }
        }
        other => other,
    };
    Ok(IData::new(ty, chosen.value))
}
