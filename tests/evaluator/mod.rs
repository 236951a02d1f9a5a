// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use core::cell::{Cell, RefCell};

use anyhow::{bail, Result};
use opflow::*;
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    statements: Vec<Statement>,
    #[serde(default)]
    want_kind: Option<String>,
    #[serde(default)]
    want_value: Option<serde_json::Value>,
    #[serde(default)]
    want_error: Option<ErrorType>,
    #[serde(default)]
    want_reason: Option<String>,
    #[serde(default)]
    skip: bool,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn check_case(case: &TestCase) -> Result<()> {
    let mut context = Context::default();
    let result = execute_statements(&case.statements, &mut context);

    match (&case.want_error, result.as_error()) {
        (Some(want), Some((kind, reason))) => {
            if *want != kind {
                bail!("want error `{want}`, got `{kind}`: {reason}");
            }
            if let Some(fragment) = &case.want_reason {
                if !reason.contains(fragment.as_str()) {
                    bail!("reason `{reason}` does not mention `{fragment}`");
                }
            }
            return Ok(());
        }
        (Some(want), None) => bail!("want error `{want}`, got `{}`", result.to_plain_json()),
        (None, Some((kind, reason))) => bail!("unexpected `{kind}`: {reason}"),
        (None, None) => (),
    }

    if let Some(kind) = &case.want_kind {
        if result.ty.dereference().kind() != kind {
            bail!("want kind `{kind}`, got `{}`", result.ty);
        }
    }
    if let Some(value) = &case.want_value {
        let actual = result.to_plain_json();
        if &actual != value {
            bail!(
                "value mismatch\nleft  = {}\nright = {}",
                serde_json::to_string_pretty(&actual)?,
                serde_json::to_string_pretty(value)?
            );
        }
    }
    Ok(())
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    std::println!("running {file}");
    for case in &test.cases {
        std::print!("case {} ", case.note);
        if case.skip {
            std::println!("skipped");
            continue;
        }
        check_case(case).map_err(|e| anyhow::anyhow!("{}: {e}", case.note))?;
        std::println!("passed");
    }
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{e}");
        }
    }
}

#[test_resources("tests/evaluator/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

fn call(name: &str, args: Vec<Statement>) -> IData {
    IData::new(
        DataType::operation(vec![], DataType::Unknown),
        Value::Operation(OperationValue::call(name, args)),
    )
}

#[test]
fn dead_branch_handlers_never_run() -> Result<()> {
    let counter = Rc::new(Cell::new(0));
    let mut engine = Engine::new();
    let ticks = counter.clone();
    engine.add_extension(
        "tick",
        vec![ParameterType::receiver(DataType::String)],
        DataType::String,
        move |data, _| {
            ticks.set(ticks.get() + 1);
            Ok(data.clone())
        },
    )?;

    let true_branch = Statement::new(IData::string("yes")).with_operations(vec![call("tick", vec![])]);
    let false_branch = Statement::new(IData::number(2.0));
    let statement = Statement::new(IData::boolean(false))
        .with_operations(vec![call("thenElse", vec![true_branch, false_branch])]);

    let result = engine.eval_statements(&[statement]);
    assert_eq!(counter.get(), 0);
    assert_eq!(result.as_number(), Some(2.0));
    assert_eq!(
        result.ty,
        resolve_union_type(&[DataType::String, DataType::Number], false, Some(1))
    );

    // The live branch does run the handler.
    let true_branch = Statement::new(IData::string("yes")).with_operations(vec![call("tick", vec![])]);
    let statement = Statement::new(IData::boolean(true)).with_operations(vec![call(
        "thenElse",
        vec![true_branch, Statement::new(IData::number(2.0))],
    )]);
    let result = engine.eval_statements(&[statement]);
    assert_eq!(counter.get(), 1);
    assert_eq!(result.as_str(), Some("yes"));
    Ok(())
}

#[test]
fn operation_results_are_cached_by_id() {
    let op = call("add", vec![Statement::new(IData::number(2.0))]);
    let op_id = op.id.clone();
    let statement = Statement::new(IData::number(1.0)).with_operations(vec![op]);
    let context = Context::default();
    let result = execute_statement(&statement, &context);

    assert_eq!(result.as_number(), Some(3.0));
    assert_eq!(context.get_result(&op_id).and_then(|d| d.as_number()), Some(3.0));
    assert_eq!(
        context.get_result(&statement.id).and_then(|d| d.as_number()),
        Some(3.0)
    );
}

#[test]
fn errors_pass_through_unchanged() {
    let statement = Statement::new(IData::number(1.0)).with_operations(vec![
        call("divide", vec![Statement::new(IData::number(0.0))]),
        call("add", vec![Statement::new(IData::number(1.0))]),
        call("toString", vec![]),
    ]);
    let context = Context::default();
    let result = execute_statement(&statement, &context);

    let divide_id = &statement.operations[0].id;
    let first = context.get_result(divide_id);
    assert_eq!(first.as_ref(), Some(&result));
    assert_eq!(result.as_error().map(|(k, _)| k), Some(ErrorType::RuntimeError));
}

#[test]
fn user_defined_operations_chain_on_their_first_parameter() {
    let x = Statement::new(IData::number(0.0)).with_name("x");
    let body = Statement::new(IData::reference("x", &x.id, DataType::Number))
        .with_operations(vec![call("multiply", vec![Statement::new(IData::number(2.0))])]);
    let double = IData::new(
        DataType::operation(vec![ParameterType::new("x", DataType::Number)], DataType::Number),
        Value::Operation(OperationValue {
            name: None,
            parameters: Rc::new(vec![x]),
            statements: Rc::new(vec![body]),
        }),
    );

    let mut context = Context::default();
    context.declare("double", "double-id", double);
    let statement = Statement::new(IData::number(21.0)).with_operations(vec![call("double", vec![])]);
    assert_eq!(execute_statement(&statement, &context).as_number(), Some(42.0));
}

fn looping() -> ProjectFile {
    let n = Statement::new(IData::number(0.0)).with_name("n");
    let body = Statement::new(IData::reference("n", &n.id, DataType::Number))
        .with_operations(vec![call("loop", vec![])]);
    let looping = IData::new(
        DataType::operation(vec![ParameterType::new("n", DataType::Number)], DataType::Number),
        Value::Operation(OperationValue {
            name: None,
            parameters: Rc::new(vec![n]),
            statements: Rc::new(vec![body]),
        }),
    );
    ProjectFile::new("loop", looping)
}

fn call_depth_error(engine: &Engine) -> String {
    let statement = Statement::new(IData::number(1.0)).with_operations(vec![call("loop", vec![])]);
    let result = engine.eval_statements(&[statement]);
    result.as_error().map(|(_, r)| r.to_string()).unwrap_or_default()
}

#[test]
fn runaway_recursion_is_a_runtime_error() -> Result<()> {
    let mut engine = Engine::with_options(EngineOptions {
        max_call_depth: 16,
        ..EngineOptions::default()
    });
    engine.add_file(looping())?;
    let reason = call_depth_error(&engine);
    assert!(reason.contains("limit=16"), "{reason}");
    Ok(())
}

#[test]
fn default_call_depth_fits_the_test_thread() -> Result<()> {
    // Runs on the harness thread and its default stack.
    let mut engine = Engine::new();
    engine.add_file(looping())?;
    let limit = EngineOptions::default().max_call_depth;
    let reason = call_depth_error(&engine);
    assert!(reason.contains(&format!("limit={limit}")), "{reason}");
    Ok(())
}

#[test]
fn checks_on_derived_values_leave_the_variable_alone() {
    let ty = resolve_union_type(&[DataType::String, DataType::Number], false, None);
    let x = Statement::new(IData::new(ty.clone(), Value::Number(5.0))).with_name("x");
    let fallback = Statement::new(IData::reference("x", &x.id, ty.clone()));
    let fallback_id = fallback.id.clone();
    // `x.toString().isTypeOf(number)` says nothing about `x` itself.
    let check = Statement::new(IData::reference("x", &x.id, ty)).with_operations(vec![
        call("toString", vec![]),
        call("isTypeOf", vec![Statement::new(IData::number(0.0))]),
        call("thenElse", vec![Statement::new(IData::number(0.0)), fallback]),
    ]);

    let mut context = Context::default();
    let result = execute_statements(&[x, check], &mut context);
    assert_eq!(result.as_number(), Some(5.0));

    let seen = context.get_result(&fallback_id);
    assert_eq!(seen.as_ref().and_then(|d| d.as_number()), Some(5.0));
    let seen_type = seen.map(|d| d.ty).unwrap_or(DataType::Never);
    assert!(
        is_type_compatible(&DataType::Number, &seen_type),
        "`x` was typed `{seen_type}`"
    );
}

#[test]
fn find_visits_every_element() -> Result<()> {
    let seen = Rc::new(RefCell::new(vec![]));
    let mut engine = Engine::new();
    let record = seen.clone();
    engine.add_extension(
        "record",
        vec![ParameterType::receiver(DataType::Number)],
        DataType::Number,
        move |data, _| {
            record.borrow_mut().extend(data.as_number());
            Ok(data.clone())
        },
    )?;

    let item = Statement::new(IData::number(0.0)).with_name("item");
    let body = Statement::new(IData::reference("item", &item.id, DataType::Number))
        .with_operations(vec![
            call("record", vec![]),
            call("greaterThan", vec![Statement::new(IData::number(0.0))]),
        ]);
    let callback = IData::new(
        DataType::operation(vec![ParameterType::new("item", DataType::Number)], DataType::Boolean),
        Value::Operation(OperationValue {
            name: None,
            parameters: Rc::new(vec![item]),
            statements: Rc::new(vec![body]),
        }),
    );
    let numbers = IData::array(
        vec![IData::number(5.0), IData::number(6.0), IData::number(7.0)],
        DataType::Number,
    );
    let statement =
        Statement::new(numbers).with_operations(vec![call("find", vec![Statement::new(callback)])]);

    let result = engine.eval_statements(&[statement]);
    assert_eq!(result.as_number(), Some(5.0));
    assert!(seen.borrow().ends_with(&[5.0, 6.0, 7.0]), "{:?}", seen.borrow());
    Ok(())
}

#[test]
fn create_operation_call_fills_required_arguments() -> Result<()> {
    let context = Context::default();
    let data = IData::string("abc");
    let op = create_operation_call(&context, &data, "slice")?;

    let args = op.as_operation().map(|o| o.parameters.len());
    // `end` is optional and left out.
    assert_eq!(args, Some(1));
    assert!(matches!(&op.ty, DataType::Operation { result, .. } if **result == DataType::String));
    assert!(create_operation_call(&context, &data, "toRange").is_err());
    Ok(())
}

#[test]
fn operation_list_includes_extensions() -> Result<()> {
    let mut engine = Engine::new();
    engine.add_extension(
        "shout",
        vec![ParameterType::receiver(DataType::String)],
        DataType::String,
        |data, _| Ok(IData::string(&data.to_string().to_uppercase())),
    )?;
    assert!(engine
        .add_extension("shout", vec![], DataType::String, |d, _| Ok(d.clone()))
        .is_err());

    let ops = engine.get_filtered_operations(&IData::string("a"));
    let shout = ops.iter().find(|o| o.name.as_ref() == "shout");
    assert_eq!(shout.map(|o| &*o.group), Some("extension"));
    assert!(!engine
        .get_filtered_operations(&IData::number(1.0))
        .iter()
        .any(|o| o.name.as_ref() == "shout"));
    Ok(())
}

#[cfg(feature = "http")]
mod http {
    use super::*;

    struct Fixed(Rc<Cell<usize>>);

    impl HttpTransport for Fixed {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.0.set(self.0.get() + 1);
            if request.url.ends_with("/missing") {
                bail!("connection refused");
            }
            Ok(HttpResponse {
                status: 200,
                body: format!("{} {}", request.method, request.url),
            })
        }
    }

    fn fetch(url: &str) -> Statement {
        let client = IData::new(
            DataType::instance("Http", vec![]),
            Value::Instance(InstanceValue {
                class_name: "Http".into(),
                constructor_args: Rc::default(),
                instance_id: create_entity_id(),
            }),
        );
        Statement::new(client).with_operations(vec![
            call("get", vec![Statement::new(IData::string(url))]),
            call("await", vec![]),
        ])
    }

    #[test]
    fn responses_are_reused_and_survive_clearing() {
        let sent = Rc::new(Cell::new(0));
        let mut engine = Engine::new();
        engine.set_http_transport(Fixed(sent.clone()));

        let statement = fetch("https://example.com/a");
        let first = engine.eval_statements(&[statement.clone()]);
        let body = first
            .as_object()
            .and_then(|o| o.get("body").map(|s| s.data.to_string()));
        assert_eq!(body.as_deref(), Some("GET https://example.com/a"));

        engine.clear_results();
        assert!(engine.get_result(&statement.operations[0].id).is_some());
        assert!(engine.get_result(&statement.id).is_none());

        engine.eval_statements(&[statement]);
        assert_eq!(sent.get(), 1);
    }

    #[test]
    fn failures_reject_the_promise() {
        let mut engine = Engine::new();
        engine.set_http_transport(Fixed(Rc::new(Cell::new(0))));
        let result = engine.eval_statements(&[fetch("https://example.com/missing")]);
        assert_eq!(
            result.as_error(),
            Some((ErrorType::RuntimeError, "connection refused"))
        );
    }

    #[test]
    fn missing_transport_is_reported() {
        let result = Engine::new().eval_statements(&[fetch("https://example.com/")]);
        let reason = result.as_error().map(|(_, r)| r.to_string()).unwrap_or_default();
        assert!(reason.contains("transport"), "{reason}");
    }
}
