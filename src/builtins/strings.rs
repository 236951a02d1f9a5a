// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{
    ensure_args_count, ensure_integer, ensure_numeric, ensure_string, optional_arg, receiver,
    relative_index, returns_boolean, returns_number, returns_string, returns_string_array,
    returns_unknown, string_only,
};
use crate::builtins::Builtin;
use crate::context::Context;
use crate::types::{DataType, ParameterType};
use crate::value::IData;

use anyhow::{bail, Result};

// Longest string `repeat` will build, in bytes.
const MAX_REPEAT_LEN: usize = 16 * 1024 * 1024;

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("length", "string", string_only, returns_number, length));
    m.push(Builtin::eager("concat", "string", one_string, returns_string, concat));
    m.push(Builtin::eager("includes", "string", one_string, returns_boolean, includes));
    m.push(Builtin::eager("startsWith", "string", one_string, returns_boolean, starts_with));
    m.push(Builtin::eager("endsWith", "string", one_string, returns_boolean, ends_with));
    m.push(Builtin::eager("indexOf", "string", one_string, returns_number, index_of));
    m.push(Builtin::eager("slice", "string", slice_params, returns_string, slice));
    m.push(Builtin::eager("split", "string", separator_param, returns_string_array, split));
    m.push(Builtin::eager("toUpperCase", "string", string_only, returns_string, upper));
    m.push(Builtin::eager("toLowerCase", "string", string_only, returns_string, lower));
    m.push(Builtin::eager("trim", "string", string_only, returns_string, trim));
    m.push(Builtin::eager("replace", "string", replace_params, returns_string, replace));
    m.push(Builtin::eager("replaceAll", "string", replace_params, returns_string, replace_all));
    m.push(Builtin::eager("repeat", "string", count_param, returns_string, repeat));
    m.push(Builtin::eager("toNumber", "string", string_only, returns_number, to_number));
    m.push(Builtin::eager("parseJson", "string", string_only, returns_unknown, parse_json));
    #[cfg(feature = "regex")]
    m.push(Builtin::eager("matches", "string", pattern_param, returns_boolean, matches));
    #[cfg(feature = "date")]
    m.push(Builtin::eager(
        "toDate",
        "string",
        string_only,
        crate::builtins::dates::returns_date,
        crate::builtins::dates::to_date,
    ));
    #[cfg(feature = "url")]
    m.push(Builtin::eager(
        "toUrl",
        "string",
        string_only,
        crate::builtins::urls::returns_url,
        crate::builtins::urls::to_url,
    ));
}

fn one_string(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::String),
        ParameterType::new("value", DataType::String),
    ]
}

fn separator_param(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::String),
        ParameterType::new("separator", DataType::String),
    ]
}

#[cfg(feature = "regex")]
fn pattern_param(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::String),
        ParameterType::new("pattern", DataType::String),
    ]
}

fn slice_params(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::String),
        ParameterType::new("start", DataType::Number),
        ParameterType::new("end", DataType::Number).optional(),
    ]
}

fn replace_params(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::String),
        ParameterType::new("search", DataType::String),
        ParameterType::new("replacement", DataType::String),
    ]
}

fn count_param(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::String),
        ParameterType::new("count", DataType::Number),
    ]
}

fn length(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let s = ensure_string("length", data)?;
    Ok(IData::number(s.chars().count() as f64))
}

fn concat(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "concat";
    ensure_args_count(name, args, 1)?;
    let s1 = ensure_string(name, data)?;
    let s2 = ensure_string(name, &args[0])?;
    Ok(IData::string(&format!("{s1}{s2}")))
}

fn includes(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "includes";
    ensure_args_count(name, args, 1)?;
    let s1 = ensure_string(name, data)?;
    let s2 = ensure_string(name, &args[0])?;
    Ok(IData::boolean(s1.contains(&*s2)))
}

fn starts_with(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "startsWith";
    ensure_args_count(name, args, 1)?;
    let s1 = ensure_string(name, data)?;
    let s2 = ensure_string(name, &args[0])?;
    Ok(IData::boolean(s1.starts_with(&*s2)))
}

fn ends_with(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "endsWith";
    ensure_args_count(name, args, 1)?;
    let s1 = ensure_string(name, data)?;
    let s2 = ensure_string(name, &args[0])?;
    Ok(IData::boolean(s1.ends_with(&*s2)))
}

// Positions are in characters, -1 when absent.
fn index_of(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "indexOf";
    ensure_args_count(name, args, 1)?;
    let s1 = ensure_string(name, data)?;
    let s2 = ensure_string(name, &args[0])?;
    Ok(IData::number(match s1.find(&*s2) {
        Some(byte_idx) => s1[..byte_idx].chars().count() as f64,
        None => -1.0,
    }))
}

fn slice(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "slice";
    ensure_args_count(name, args, 1)?;
    let s = ensure_string(name, data)?;
    let chars: Vec<char> = s.chars().collect();
    let start = relative_index(ensure_numeric(name, &args[0])?, chars.len());
    let end = match optional_arg(args, 1) {
        Some(end) => relative_index(ensure_numeric(name, end)?, chars.len()),
        None => chars.len(),
    };
    let sliced: String = if start < end {
        chars[start..end].iter().collect()
    } else {
        String::new()
    };
    Ok(IData::string(&sliced))
}

fn split(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "split";
    ensure_args_count(name, args, 1)?;
    let s = ensure_string(name, data)?;
    let separator = ensure_string(name, &args[0])?;
    let parts: Vec<IData> = if separator.is_empty() {
        s.chars().map(|c| IData::string(&c.to_string())).collect()
    } else {
        s.split(&*separator).map(IData::string).collect()
    };
    Ok(IData::array(parts, DataType::String))
}

fn upper(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::string(&ensure_string("toUpperCase", data)?.to_uppercase()))
}

fn lower(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::string(&ensure_string("toLowerCase", data)?.to_lowercase()))
}

fn trim(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::string(ensure_string("trim", data)?.trim()))
}

fn replace(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "replace";
    ensure_args_count(name, args, 2)?;
    let s = ensure_string(name, data)?;
    let old = ensure_string(name, &args[0])?;
    let new = ensure_string(name, &args[1])?;
    Ok(IData::string(&s.replacen(&*old, &new, 1)))
}

fn replace_all(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "replaceAll";
    ensure_args_count(name, args, 2)?;
    let s = ensure_string(name, data)?;
    let old = ensure_string(name, &args[0])?;
    let new = ensure_string(name, &args[1])?;
    if old.is_empty() {
        return Ok(IData::string(&s));
    }
    Ok(IData::string(&s.replace(&*old, &new)))
}

fn repeat(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "repeat";
    ensure_args_count(name, args, 1)?;
    let s = ensure_string(name, data)?;
    let count = ensure_integer(name, &args[0])?;
    if count < 0 {
        bail!("`{name}` expects a non-negative count. Got `{count}` instead");
    }
    match usize::try_from(count).ok().and_then(|c| c.checked_mul(s.len())) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(IData::string(&s.repeat(count as usize))),
        _ => bail!("`{name}` result is too large"),
    }
}

fn to_number(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let s = ensure_string("toNumber", data)?;
    match s.trim().parse::<f64>() {
        Ok(n) => Ok(IData::number(n)),
        Err(_) => bail!("`{s}` is not a valid number"),
    }
}

fn parse_json(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let s = ensure_string("parseJson", data)?;
    let json: serde_json::Value = serde_json::from_str(&s)?;
    Ok(IData::from_plain_json(&json))
}

#[cfg(feature = "regex")]
fn matches(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "matches";
    ensure_args_count(name, args, 1)?;
    let s = ensure_string(name, data)?;
    let pattern = ensure_string(name, &args[0])?;
    let re = regex::Regex::new(&pattern)
        .map_err(|e| anyhow::anyhow!("`{name}` received an invalid pattern: {e}"))?;
    Ok(IData::boolean(re.is_match(&s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: super::super::EagerFcn, data: IData, args: Vec<IData>) -> IData {
        match f(&Context::default(), &data, &args) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    #[test]
    fn slicing_counts_characters() {
        let r = call(slice, IData::string("héllo"), vec![IData::number(1.0), IData::number(-1.0)]);
        assert_eq!(r.as_str(), Some("éll"));
        let r = call(index_of, IData::string("héllo"), vec![IData::string("l")]);
        assert_eq!(r.as_number(), Some(2.0));
    }

    #[test]
    fn split_and_replace() {
        let r = call(split, IData::string("a,b,c"), vec![IData::string(",")]);
        assert_eq!(r.as_array().map(|a| a.len()), Some(3));
        assert_eq!(r.ty, DataType::array(DataType::String));

        let r = call(
            replace,
            IData::string("a-a-a"),
            vec![IData::string("-"), IData::string("+")],
        );
        assert_eq!(r.as_str(), Some("a+a-a"));
    }

    #[test]
    fn repeat_refuses_huge_results() {
        let r = call(repeat, IData::string("ab"), vec![IData::number(3.0)]);
        assert_eq!(r.as_str(), Some("ababab"));
        let r = call(repeat, IData::string(""), vec![IData::number(1e18)]);
        assert_eq!(r.as_str(), Some(""));
        let r = repeat(&Context::default(), &IData::string("ab"), &[IData::number(1e18)]);
        assert!(r.is_err());
    }

    #[test]
    fn invalid_numbers_fail() {
        assert!(to_number(&Context::default(), &IData::string("abc"), &[]).is_err());
        let r = call(to_number, IData::string(" 4.5 "), vec![]);
        assert_eq!(r.as_number(), Some(4.5));
    }
}
