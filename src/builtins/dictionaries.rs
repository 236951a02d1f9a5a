// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{
    element_type_of, ensure_args_count, ensure_object, ensure_string, receiver, returns_boolean,
    returns_number, returns_receiver, returns_string_array,
};
use crate::builtins::Builtin;
use crate::context::Context;
use crate::types::{resolve_union_type, DataType, ParameterType};
use crate::value::{IData, Statement, Value};
use crate::Rc;

use anyhow::Result;

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("get", "dictionary", key_param, returns_element_or_undefined, get));
    m.push(Builtin::eager("set", "dictionary", key_value_params, returns_receiver, set));
    m.push(Builtin::eager("has", "dictionary", key_param, returns_boolean, has));
    m.push(Builtin::eager("delete", "dictionary", key_param, returns_receiver, delete));
    m.push(Builtin::eager("keys", "dictionary", dictionary_only, returns_string_array, keys));
    m.push(Builtin::eager("values", "dictionary", dictionary_only, returns_values, values));
    m.push(Builtin::eager("size", "dictionary", dictionary_only, returns_number, size));
}

fn dictionary_receiver(data: &IData) -> ParameterType {
    receiver(DataType::dictionary(element_type_of(data)))
}

fn dictionary_only(data: &IData) -> Vec<ParameterType> {
    vec![dictionary_receiver(data)]
}

fn key_param(data: &IData) -> Vec<ParameterType> {
    vec![
        dictionary_receiver(data),
        ParameterType::new("key", DataType::String),
    ]
}

fn key_value_params(data: &IData) -> Vec<ParameterType> {
    vec![
        dictionary_receiver(data),
        ParameterType::new("key", DataType::String),
        ParameterType::new("value", element_type_of(data)),
    ]
}

fn returns_element_or_undefined(data: &IData, _: &[DataType]) -> DataType {
    resolve_union_type(&[element_type_of(data), DataType::Undefined], false, None)
}

fn returns_values(data: &IData, _: &[DataType]) -> DataType {
    DataType::array(element_type_of(data))
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
    let element = resolve_union_type(&[element_type_of(data), args[1].ty.clone()], false, None);
    Ok(IData::new(
        DataType::dictionary(element),
        Value::Object(Rc::new(entries)),
    ))
}

fn has(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "has";
    ensure_args_count(name, args, 1)?;
    let entries = ensure_object(name, data)?;
    let key = ensure_string(name, &args[0])?;
    Ok(IData::boolean(entries.contains_key(&key)))
}

fn delete(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "delete";
    ensure_args_count(name, args, 1)?;
    let mut entries = ensure_object(name, data)?.as_ref().clone();
    let key = ensure_string(name, &args[0])?;
    entries.shift_remove(&key);
    Ok(IData::new(
        data.ty.dereference().clone(),
        Value::Object(Rc::new(entries)),
    ))
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
        element_type_of(data),
    ))
}

fn size(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::number(ensure_object("size", data)?.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn scores() -> IData {
        let mut entries = IndexMap::new();
        entries.insert(Rc::from("a"), Statement::new(IData::number(1.0)));
        entries.insert(Rc::from("b"), Statement::new(IData::number(2.0)));
        IData::new(
            DataType::dictionary(DataType::Number),
            Value::Object(Rc::new(entries)),
        )
    }

    #[test]
    fn delete_then_size() {
        let ctx = Context::default();
        let r = delete(&ctx, &scores(), &[IData::string("a")]);
        let r = r.and_then(|d| size(&ctx, &d, &[]));
        assert_eq!(r.ok().and_then(|d| d.as_number()), Some(1.0));
    }

    #[test]
    fn set_widens_element_type() {
        let r = set(
            &Context::default(),
            &scores(),
            &[IData::string("c"), IData::string("x")],
        );
        let ty = r.ok().map(|d| d.ty);
        assert_eq!(
            ty,
            Some(DataType::dictionary(resolve_union_type(
                &[DataType::Number, DataType::String],
                false,
                None
            )))
        );
    }
}
