// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_args_count, receiver, receiver_type};
use crate::builtins::Builtin;
use crate::context::Context;
use crate::types::{resolve_union_type, DataType, ParameterType};
use crate::value::{IData, Value};

use anyhow::Result;

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("orElse", "union", fallback_param, returns_defined, or_else));
}

/// The union's members other than `undefined`.
fn defined_members(data: &IData) -> DataType {
    match data.ty.dereference() {
        DataType::Union { types, .. } => {
            let defined: Vec<DataType> = types
                .iter()
                .filter(|t| !matches!(t, DataType::Undefined))
                .cloned()
                .collect();
            resolve_union_type(&defined, false, None)
        }
        other => other.clone(),
    }
}

fn fallback_param(data: &IData) -> Vec<ParameterType> {
    let receiver_ty = match data.ty.dereference() {
        ty @ DataType::Union { .. } => ty.clone(),
        _ => DataType::Union {
            types: vec![],
            active_index: None,
        },
    };
    vec![
        receiver(receiver_ty),
        ParameterType::new("fallback", defined_members(data)),
    ]
}

fn returns_defined(data: &IData, _: &[DataType]) -> DataType {
    defined_members(data)
}

fn or_else(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    ensure_args_count("orElse", args, 1)?;
    if matches!(data.value, Value::Undefined) {
        return Ok(args[0].clone());
    }
    let narrowed = defined_members(data);
    let ty = match narrowed {
        DataType::Never => receiver_type(data),
        ty => ty,
    };
    Ok(IData::new(ty, data.value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maybe_number(value: Value) -> IData {
        IData::new(
            resolve_union_type(&[DataType::Number, DataType::Undefined], false, None),
            value,
        )
    }

    #[test]
    fn fallback_replaces_undefined() {
        let ctx = Context::default();
        let r = or_else(&ctx, &maybe_number(Value::Undefined), &[IData::number(7.0)]);
        assert_eq!(r.ok().and_then(|d| d.as_number()), Some(7.0));

        let r = or_else(&ctx, &maybe_number(Value::Number(2.0)), &[IData::number(7.0)]);
        let r = r.ok();
        assert_eq!(r.as_ref().and_then(|d| d.as_number()), Some(2.0));
        assert_eq!(r.map(|d| d.ty), Some(DataType::Number));
    }
}
