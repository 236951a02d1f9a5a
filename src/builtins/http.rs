// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::instances::{create_instance, get_instance, promise_type};
use crate::builtins::utils::{ensure_args_count, ensure_string, receiver};
use crate::builtins::Builtin;
use crate::context::{Context, Instance, PromiseState};
use crate::types::{DataType, ParameterType};
use crate::value::IData;

use anyhow::{bail, Result};

pub const HTTP: &str = "Http";

/// Performs requests on behalf of the `Http` instance operations.
pub trait HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("get", HTTP, url_param, returns_response, get).cacheable());
    m.push(Builtin::eager("post", HTTP, url_body_params, returns_response, post).cacheable());
}

pub fn http_type() -> DataType {
    DataType::instance(HTTP, vec![])
}

fn response_type() -> DataType {
    DataType::object([
        ("status", DataType::Number),
        ("ok", DataType::Boolean),
        ("body", DataType::String),
    ])
}

fn returns_response(_: &IData, _: &[DataType]) -> DataType {
    promise_type(response_type())
}

fn url_param(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(http_type()),
        ParameterType::new("url", DataType::String),
    ]
}

fn url_body_params(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(http_type()),
        ParameterType::new("url", DataType::String),
        ParameterType::new("body", DataType::String),
    ]
}

fn send(context: &Context, data: &IData, request: HttpRequest) -> Result<IData> {
    let fcn = request.method;
    if !matches!(get_instance(fcn, context, data)?, Instance::Http) {
        bail!("`{fcn}` expects an Http client. Got `{data}` instead");
    }
    let Some(transport) = &context.http else {
        bail!("no HTTP transport is configured");
    };
    log::debug!("{} {}", request.method, request.url);
    let state = match transport.send(&request) {
        Ok(response) => PromiseState::Resolved(IData::object(vec![
            ("status".into(), IData::number(response.status as f64)),
            ("ok".into(), IData::boolean((200..300).contains(&response.status))),
            ("body".into(), IData::string(&response.body)),
        ])),
        Err(e) => PromiseState::Rejected(e.to_string().into()),
    };
    create_instance(
        context,
        promise_type(response_type()),
        vec![],
        Instance::Promise(state),
    )
}

fn get(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    ensure_args_count("get", args, 1)?;
    let url = ensure_string("get", &args[0])?;
    send(
        context,
        data,
        HttpRequest {
            method: "GET",
            url: url.to_string(),
            body: None,
        },
    )
}

fn post(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    ensure_args_count("post", args, 2)?;
    let url = ensure_string("post", &args[0])?;
    let body = ensure_string("post", &args[1])?;
    send(
        context,
        data,
        HttpRequest {
            method: "POST",
            url: url.to_string(),
            body: Some(body.to_string()),
        },
    )
}
