// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::instances::{create_instance, get_instance};
use crate::builtins::utils::{ensure_string, receiver, returns_string};
use crate::builtins::Builtin;
use crate::context::{Context, Instance};
use crate::types::{DataType, ParameterType};
use crate::value::IData;

use anyhow::{bail, Result};

pub const URL: &str = "URL";

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("getHref", URL, url_only, returns_string, get_href));
    m.push(Builtin::eager("getProtocol", URL, url_only, returns_string, get_protocol));
    m.push(Builtin::eager("getHost", URL, url_only, returns_string, get_host));
    m.push(Builtin::eager("getPathname", URL, url_only, returns_string, get_pathname));
    m.push(Builtin::eager("getSearch", URL, url_only, returns_string, get_search));
    m.push(Builtin::eager("getHash", URL, url_only, returns_string, get_hash));
    m.push(Builtin::eager("getSearchParams", URL, url_only, returns_params, get_search_params));
}

pub fn url_type() -> DataType {
    DataType::instance(URL, vec![ParameterType::new("href", DataType::String)])
}

pub fn returns_url(_: &IData, _: &[DataType]) -> DataType {
    url_type()
}

fn returns_params(_: &IData, _: &[DataType]) -> DataType {
    DataType::dictionary(DataType::String)
}

fn url_only(_: &IData) -> Vec<ParameterType> {
    vec![receiver(url_type())]
}

pub fn parse_url(href: &str) -> Result<url::Url> {
    url::Url::parse(href.trim()).map_err(|e| anyhow::anyhow!("`{href}` is not a valid URL: {e}"))
}

pub fn to_url(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let href = ensure_string("toUrl", data)?;
    let url = parse_url(&href)?;
    create_instance(
        context,
        url_type(),
        vec![IData::string(url.as_str())],
        Instance::Url(url),
    )
}

fn ensure_url(fcn: &str, context: &Context, data: &IData) -> Result<url::Url> {
    match get_instance(fcn, context, data)? {
        Instance::Url(url) => Ok(url),
        _ => bail!("`{fcn}` expects a URL. Got `{data}` instead"),
    }
}

fn get_href(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::string(ensure_url("getHref", context, data)?.as_str()))
}

// Includes the trailing colon.
fn get_protocol(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let url = ensure_url("getProtocol", context, data)?;
    Ok(IData::string(&format!("{}:", url.scheme())))
}

// Includes a non-default port.
fn get_host(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let url = ensure_url("getHost", context, data)?;
    let host = url.host_str().unwrap_or_default();
    Ok(IData::string(&match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }))
}

fn get_pathname(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::string(ensure_url("getPathname", context, data)?.path()))
}

fn get_search(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let url = ensure_url("getSearch", context, data)?;
    Ok(IData::string(&match url.query() {
        Some(q) if !q.is_empty() => format!("?{q}"),
        _ => String::new(),
    }))
}

fn get_hash(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let url = ensure_url("getHash", context, data)?;
    Ok(IData::string(&match url.fragment() {
        Some(f) if !f.is_empty() => format!("#{f}"),
        _ => String::new(),
    }))
}

fn get_search_params(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    use crate::value::{Statement, Value};
    use crate::Rc;
    use indexmap::IndexMap;

    let url = ensure_url("getSearchParams", context, data)?;
    let mut entries: IndexMap<Rc<str>, Statement> = IndexMap::new();
    for (k, v) in url.query_pairs() {
        entries.insert(Rc::from(&*k), Statement::new(IData::string(&v)));
    }
    Ok(IData::new(
        DataType::dictionary(DataType::String),
        Value::Object(Rc::new(entries)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts() -> Result<()> {
        let ctx = Context::default();
        let url = to_url(
            &ctx,
            &IData::string("https://example.com:8080/a/b?x=1&y=two#frag"),
            &[],
        )?;
        assert_eq!(get_protocol(&ctx, &url, &[])?.as_str(), Some("https:"));
        assert_eq!(get_host(&ctx, &url, &[])?.as_str(), Some("example.com:8080"));
        assert_eq!(get_pathname(&ctx, &url, &[])?.as_str(), Some("/a/b"));
        assert_eq!(get_search(&ctx, &url, &[])?.as_str(), Some("?x=1&y=two"));
        assert_eq!(get_hash(&ctx, &url, &[])?.as_str(), Some("#frag"));

        let params = get_search_params(&ctx, &url, &[])?;
        assert_eq!(params.as_object().map(|o| o.len()), Some(2));
        Ok(())
    }

    #[test]
    fn instances_survive_a_fresh_store() -> Result<()> {
        let url = to_url(&Context::default(), &IData::string("https://example.com/"), &[])?;
        // A different store only has the serialized constructor arguments.
        let other = Context::default();
        assert_eq!(get_href(&other, &url, &[])?.as_str(), Some("https://example.com/"));
        Ok(())
    }
}
