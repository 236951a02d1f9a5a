// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{
    array_only, elements, element_type_of, ensure_args_count, ensure_array, ensure_numeric,
    ensure_operation, ensure_string, optional_arg, receiver, receiver_type, relative_index,
    returns_boolean, returns_number, returns_receiver, returns_string,
};
use crate::builtins::Builtin;
use crate::context::Context;
use crate::interpreter::call_operation;
use crate::types::{resolve_union_type, DataType, ParameterType};
use crate::value::{IData, Statement, Value};
use crate::Rc;

use core::cmp::Ordering;

use anyhow::{bail, Result};

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("length", "array", array_only, returns_number, length));
    m.push(Builtin::eager("at", "array", index_param, returns_element_or_undefined, at));
    m.push(Builtin::eager("concat", "array", other_array, returns_concat, concat));
    m.push(Builtin::eager("includes", "array", element_param, returns_boolean, includes));
    m.push(Builtin::eager("indexOf", "array", element_param, returns_number, index_of));
    m.push(Builtin::eager("join", "array", separator_param, returns_string, join));
    m.push(Builtin::eager("reverse", "array", array_only, returns_receiver, reverse));
    m.push(Builtin::eager("slice", "array", slice_params, returns_receiver, slice));
    m.push(Builtin::eager("push", "array", element_param, returns_receiver, push));
    m.push(Builtin::eager("map", "array", map_params, returns_mapped, map));
    m.push(Builtin::eager("filter", "array", predicate_params, returns_receiver, filter));
    m.push(Builtin::eager("find", "array", predicate_params, returns_element_or_undefined, find));
    m.push(Builtin::eager("some", "array", predicate_params, returns_boolean, some));
    m.push(Builtin::eager("every", "array", predicate_params, returns_boolean, every));
    m.push(Builtin::eager("sort", "array", sort_params, returns_receiver, sort));
    m.push(Builtin::eager("reduce", "array", reduce_params, returns_reduced, reduce));
}

fn array_receiver(data: &IData) -> ParameterType {
    match data.ty.dereference() {
        ty @ (DataType::Array { .. } | DataType::Tuple { .. }) => receiver(ty.clone()),
        _ => receiver(DataType::array(DataType::Unknown)),
    }
}

fn index_param(data: &IData) -> Vec<ParameterType> {
    vec![
        array_receiver(data),
        ParameterType::new("index", DataType::Number),
    ]
}

fn other_array(data: &IData) -> Vec<ParameterType> {
    vec![
        array_receiver(data),
        ParameterType::new("other", DataType::array(DataType::Unknown)),
    ]
}

fn element_param(data: &IData) -> Vec<ParameterType> {
    vec![
        array_receiver(data),
        ParameterType::new("element", element_type_of(data)),
    ]
}

fn separator_param(data: &IData) -> Vec<ParameterType> {
    vec![
        array_receiver(data),
        ParameterType::new("separator", DataType::String).optional(),
    ]
}

fn slice_params(data: &IData) -> Vec<ParameterType> {
    vec![
        array_receiver(data),
        ParameterType::new("start", DataType::Number),
        ParameterType::new("end", DataType::Number).optional(),
    ]
}

/// Callback signature derived from the receiver's element type.
fn callback(data: &IData, result: DataType) -> ParameterType {
    ParameterType::new(
        "callback",
        DataType::operation(
            vec![
                ParameterType::new("item", element_type_of(data)),
                ParameterType::new("index", DataType::Number).optional(),
            ],
            result,
        ),
    )
}

fn map_params(data: &IData) -> Vec<ParameterType> {
    vec![array_receiver(data), callback(data, DataType::Unknown)]
}

fn predicate_params(data: &IData) -> Vec<ParameterType> {
    vec![array_receiver(data), callback(data, DataType::Boolean)]
}

fn sort_params(data: &IData) -> Vec<ParameterType> {
    let element = element_type_of(data);
    vec![
        array_receiver(data),
        ParameterType::new(
            "comparator",
            DataType::operation(
                vec![
                    ParameterType::new("a", element.clone()),
                    ParameterType::new("b", element),
                ],
                DataType::Number,
            ),
        )
        .optional(),
    ]
}

fn reduce_params(data: &IData) -> Vec<ParameterType> {
    vec![
        array_receiver(data),
        ParameterType::new(
            "callback",
            DataType::operation(
                vec![
                    ParameterType::new("accumulator", DataType::Unknown),
                    ParameterType::new("item", element_type_of(data)),
                    ParameterType::new("index", DataType::Number).optional(),
                ],
                DataType::Unknown,
            ),
        ),
        ParameterType::new("initial", DataType::Unknown),
    ]
}

fn callback_result(arguments: &[DataType]) -> DataType {
    match arguments.first().map(|t| t.dereference()) {
        Some(DataType::Operation { result, .. }) => result.as_ref().clone(),
        _ => DataType::Unknown,
    }
}

fn returns_element_or_undefined(data: &IData, _: &[DataType]) -> DataType {
    resolve_union_type(&[element_type_of(data), DataType::Undefined], false, None)
}

fn returns_concat(data: &IData, arguments: &[DataType]) -> DataType {
    let other = arguments
        .first()
        .and_then(|t| t.element_type())
        .unwrap_or(DataType::Unknown);
    DataType::array(resolve_union_type(&[element_type_of(data), other], false, None))
}

fn returns_mapped(_: &IData, arguments: &[DataType]) -> DataType {
    DataType::array(callback_result(arguments))
}

fn returns_reduced(_: &IData, arguments: &[DataType]) -> DataType {
    callback_result(arguments)
}

fn with_items(data: &IData, items: Vec<Statement>) -> IData {
    IData::new(receiver_type(data), Value::Array(Rc::new(items)))
}

fn same_value(a: &IData, b: &IData) -> bool {
    a.to_plain_json() == b.to_plain_json()
}

fn length(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::number(ensure_array("length", data)?.len() as f64))
}

fn at(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "at";
    ensure_args_count(name, args, 1)?;
    let items = ensure_array(name, data)?;
    let idx = match ensure_numeric(name, &args[0])? {
        n if n.is_nan() => 0.0,
        n => n.trunc(),
    };
    let len = items.len() as f64;
    let idx = if idx < 0.0 { len + idx } else { idx };
    if idx < 0.0 {
        return Ok(IData::undefined());
    }
    Ok(items
        .get(idx as usize)
        .map(|s| s.data.clone())
        .unwrap_or_else(IData::undefined))
}

fn concat(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "concat";
    ensure_args_count(name, args, 1)?;
    let left = ensure_array(name, data)?;
    let right = ensure_array(name, &args[0])?;
    let items: Vec<IData> = elements(&left).into_iter().chain(elements(&right)).collect();
    Ok(IData::array(items, element_type_of(data)))
}

fn includes(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "includes";
    ensure_args_count(name, args, 1)?;
    let items = ensure_array(name, data)?;
    Ok(IData::boolean(items.iter().any(|s| same_value(&s.data, &args[0]))))
}

fn index_of(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "indexOf";
    ensure_args_count(name, args, 1)?;
    let items = ensure_array(name, data)?;
    Ok(IData::number(
        match items.iter().position(|s| same_value(&s.data, &args[0])) {
            Some(idx) => idx as f64,
            None => -1.0,
        },
    ))
}

fn join(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "join";
    let items = ensure_array(name, data)?;
    let separator = match optional_arg(args, 0) {
        Some(s) => ensure_string(name, s)?,
        None => ",".into(),
    };
    let parts: Vec<String> = items.iter().map(|s| s.data.to_string()).collect();
    Ok(IData::string(&parts.join(&*separator)))
}

fn reverse(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let items = ensure_array("reverse", data)?;
    Ok(with_items(data, items.iter().rev().cloned().collect()))
}

fn slice(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "slice";
    ensure_args_count(name, args, 1)?;
    let items = ensure_array(name, data)?;
    let start = relative_index(ensure_numeric(name, &args[0])?, items.len());
    let end = match optional_arg(args, 1) {
        Some(end) => relative_index(ensure_numeric(name, end)?, items.len()),
        None => items.len(),
    };
    let sliced = if start < end {
        items[start..end].to_vec()
    } else {
        vec![]
    };
    Ok(with_items(data, sliced))
}

fn push(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "push";
    ensure_args_count(name, args, 1)?;
    let items = ensure_array(name, data)?;
    let mut items = items.as_ref().clone();
    items.push(Statement::new(args[0].clone()));
    let element = resolve_union_type(&[element_type_of(data), args[0].ty.clone()], false, None);
    Ok(IData::new(DataType::array(element), Value::Array(Rc::new(items))))
}

// Runs `callback` for every element. Failures stay with their element.
fn apply_callback(context: &Context, data: &IData, callback: &IData) -> Result<Vec<IData>> {
    let items = ensure_array("callback", data)?;
    Ok(items
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            call_operation(
                context,
                callback,
                vec![s.data.clone(), IData::number(idx as f64)],
            )
        })
        .collect())
}

fn map(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "map";
    ensure_args_count(name, args, 1)?;
    let callback = ensure_operation(name, &args[0])?;
    let results = apply_callback(context, data, callback)?;
    Ok(IData::array(results, callback_result(&[callback.ty.clone()])))
}

fn filter(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "filter";
    ensure_args_count(name, args, 1)?;
    let callback = ensure_operation(name, &args[0])?;
    let items = ensure_array(name, data)?;
    let results = apply_callback(context, data, callback)?;
    let kept = items
        .iter()
        .zip(results)
        .filter_map(|(item, keep)| {
            if keep.is_error() {
                Some(Statement::new(keep))
            } else if keep.as_bool() == Some(true) {
                Some(item.clone())
            } else {
                None
            }
        })
        .collect();
    Ok(with_items(data, kept))
}

fn find(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "find";
    ensure_args_count(name, args, 1)?;
    let callback = ensure_operation(name, &args[0])?;
    let items = ensure_array(name, data)?;
    let results = apply_callback(context, data, callback)?;
    for (item, found) in items.iter().zip(results) {
        if found.is_error() {
            return Ok(found);
        }
        if found.as_bool() == Some(true) {
            return Ok(item.data.clone());
        }
    }
    Ok(IData::undefined())
}

fn some(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "some";
    ensure_args_count(name, args, 1)?;
    let callback = ensure_operation(name, &args[0])?;
    for result in apply_callback(context, data, callback)? {
        if result.is_error() {
            return Ok(result);
        }
        if result.as_bool() == Some(true) {
            return Ok(IData::boolean(true));
        }
    }
    Ok(IData::boolean(false))
}

fn every(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "every";
    ensure_args_count(name, args, 1)?;
    let callback = ensure_operation(name, &args[0])?;
    for result in apply_callback(context, data, callback)? {
        if result.is_error() {
            return Ok(result);
        }
        if result.as_bool() != Some(true) {
            return Ok(IData::boolean(false));
        }
    }
    Ok(IData::boolean(true))
}

fn natural_order(a: &IData, b: &IData) -> Ordering {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

// Comparator calls happen one at a time, left half before right half.
fn merge_sort<F>(items: Vec<Statement>, compare: &mut F) -> Result<Vec<Statement>>
where
    F: FnMut(&IData, &IData) -> Result<Ordering>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(left, compare)?;
    let right = merge_sort(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        if compare(&l.data, &r.data)? == Ordering::Greater {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn sort(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "sort";
    let items = ensure_array(name, data)?.as_ref().clone();
    let sorted = match optional_arg(args, 0) {
        Some(comparator) => {
            let comparator = ensure_operation(name, comparator)?;
            // A failing comparator's error is the result, as is.
            let mut failure = None;
            let sorted = merge_sort(items, &mut |a, b| {
                let result = call_operation(context, comparator, vec![a.clone(), b.clone()]);
                if result.is_error() {
                    failure = Some(result);
                    bail!("`{name}` comparator failed");
                }
                let n = ensure_numeric(name, &result)?;
                Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
            });
            if let Some(error) = failure {
                return Ok(error);
            }
            sorted?
        }
        None => merge_sort(items, &mut |a, b| Ok(natural_order(a, b)))?,
    };
    Ok(with_items(data, sorted))
}

fn reduce(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "reduce";
    ensure_args_count(name, args, 2)?;
    let callback = ensure_operation(name, &args[0])?;
    let items = ensure_array(name, data)?;
    let mut accumulator = args[1].clone();
    for (idx, item) in items.iter().enumerate() {
        accumulator = call_operation(
            context,
            callback,
            vec![accumulator, item.data.clone(), IData::number(idx as f64)],
        );
        if accumulator.is_error() {
            break;
        }
    }
    Ok(accumulator)
}
