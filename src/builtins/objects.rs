// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{
    ensure_args_count, ensure_object, ensure_string, receiver, returns_boolean,
    returns_receiver, returns_string_array, returns_unknown,
};
use crate::builtins::Builtin;
use crate::context::Context;
use crate::types::{resolve_union_type, DataType, ParameterType};
use crate::value::{IData, Statement, Value};
use crate::Rc;

use anyhow::Result;
use indexmap::IndexMap;

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("get", "object", key_param, returns_unknown, get));
    m.push(Builtin::eager("set", "object", key_value_params, returns_receiver, set));
    m.push(Builtin::eager("has", "object", key_param, returns_boolean, has));
    m.push(Builtin::eager("keys", "object", object_only, returns_string_array, keys));
    m.push(Builtin::eager("values", "object", object_only, returns_values, values));
    m.push(Builtin::eager("merge", "object", other_object, returns_receiver, merge));
}

fn object_receiver(data: &IData) -> ParameterType {
    match data.ty.dereference() {
        ty @ DataType::Object { .. } => receiver(ty.clone()),
        _ => receiver(DataType::object([])),
    }
}

fn object_only(data: &IData) -> Vec<ParameterType> {
    vec![object_receiver(data)]
}

fn key_param(data: &IData) -> Vec<ParameterType> {
    vec![
        object_receiver(data),
        ParameterType::new("key", DataType::String),
    ]
}

fn key_value_params(data: &IData) -> Vec<ParameterType> {
    vec![
        object_receiver(data),
        ParameterType::new("key", DataType::String),
        ParameterType::new("value", DataType::Unknown),
    ]
}

fn other_object(data: &IData) -> Vec<ParameterType> {
    vec![
        object_receiver(data),
        ParameterType::new("other", DataType::object([])),
    ]
}

fn returns_values(data: &IData, _: &[DataType]) -> DataType {
    match data.ty.dereference() {
        DataType::Object { properties, .. } => {
            let types: Vec<DataType> = properties.values().cloned().collect();
            DataType::array(resolve_union_type(&types, false, None))
        }
        _ => DataType::array(DataType::Unknown),
    }
}

// Rebuilds the object type from the actual entries. Properties declared
// optional stay optional.
fn object_data(data: &IData, entries: IndexMap<Rc<str>, Statement>) -> IData {
    let declared_required = match data.ty.dereference() {
        DataType::Object { properties, required } => Some((properties.clone(), required.clone())),
        _ => None,
    };
    let properties: IndexMap<Rc<str>, DataType> = entries
        .iter()
        .map(|(k, s)| (k.clone(), s.data.ty.clone()))
        .collect();
    let required = properties
        .keys()
        .filter(|k| match &declared_required {
            Some((declared, required)) => !declared.contains_key(*k) || required.contains(*k),
            None => true,
        })
        .cloned()
        .collect();
    IData::new(
        DataType::Object {
            properties,
            required,
        },
        Value::Object(Rc::new(entries)),
    )
}

fn get(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "get";
    ensure_args_count(name, args, 1)?;
    let entries = ensure_object(name, data)?;
    let key = ensure_string(name, &args[0])?;
    Ok(match entries.get(&key) {
        Some(s) => s.data.clone(),
        None => IData::undefined(),
    })
}

fn set(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "set";
    ensure_args_count(name, args, 2)?;
    let mut entries = ensure_object(name, data)?.as_ref().clone();
    let key = ensure_string(name, &args[0])?;
    entries.insert(key, Statement::new(args[1].clone()));
    Ok(object_data(data, entries))
}

fn has(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "has";
    ensure_args_count(name, args, 1)?;
    let entries = ensure_object(name, data)?;
    let key = ensure_string(name, &args[0])?;
    Ok(IData::boolean(entries.contains_key(&key)))
}

fn keys(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let entries = ensure_object("keys", data)?;
    Ok(IData::array(
        entries.keys().map(|k| IData::string(k)).collect(),
        DataType::String,
    ))
}

fn values(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let entries = ensure_object("values", data)?;
    Ok(IData::array(
        entries.values().map(|s| s.data.clone()).collect(),
        DataType::Unknown,
    ))
}

fn merge(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "merge";
    ensure_args_count(name, args, 1)?;
    let mut entries = ensure_object(name, data)?.as_ref().clone();
    for (k, s) in ensure_object(name, &args[0])?.iter() {
        entries.insert(k.clone(), s.clone());
    }
    Ok(object_data(data, entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> IData {
        IData::object(vec![
            ("x".into(), IData::number(1.0)),
            ("y".into(), IData::number(2.0)),
        ])
    }

    #[test]
    fn set_preserves_order_and_adds_property() {
        let r = set(
            &Context::default(),
            &point(),
            &[IData::string("z"), IData::string("new")],
        );
        let keys: Vec<String> = r
            .ok()
            .and_then(|d| d.as_object().map(|o| o.keys().map(|k| k.to_string()).collect()))
            .unwrap_or_default();
        assert_eq!(keys, vec!["x", "y", "z"]);
    }

    #[test]
    fn missing_key_is_undefined() {
        let r = get(&Context::default(), &point(), &[IData::string("w")]);
        assert_eq!(r.ok().map(|d| d.value), Some(Value::Undefined));
    }
}
