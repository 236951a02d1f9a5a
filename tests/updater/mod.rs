// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use opflow::*;

fn call(name: &str, args: Vec<Statement>) -> IData {
    IData::new(
        DataType::operation(vec![], DataType::Unknown),
        Value::Operation(OperationValue::call(name, args)),
    )
}

fn function(parameters: Vec<Statement>, statements: Vec<Statement>) -> IData {
    let value = Value::Operation(OperationValue {
        name: None,
        parameters: Rc::new(parameters),
        statements: Rc::new(statements),
    });
    IData::new(infer_type_from_value(&value, &Context::default()), value)
}

fn program() -> Vec<Statement> {
    let greeting = Statement::new(IData::string("Hello")).with_name("greeting");
    let shout = Statement::new(IData::reference("greeting", &greeting.id, DataType::String))
        .with_operations(vec![
            call("concat", vec![Statement::new(IData::string("!"))]),
            call("toUpperCase", vec![]),
        ])
        .with_name("shout");
    let size = Statement::new(IData::reference("shout", &shout.id, DataType::String))
        .with_operations(vec![call("length", vec![])]);
    vec![greeting, shout, size]
}

#[test]
fn updating_twice_changes_nothing() {
    let _ = env_logger::builder().is_test(true).try_init();
    let context = Context::default();
    let once = update_statements(&program(), &context, None, false);
    let twice = update_statements(&once, &context, None, false);
    assert_eq!(once, twice);
}

#[test]
fn consistent_programs_are_left_as_they_are() -> Result<()> {
    let context = Context::default();
    let hello = IData::string("Hello");
    let greeting = Statement::new(hello.clone()).with_name("greeting");
    let shout = Statement::new(IData::reference("greeting", &greeting.id, DataType::String))
        .with_operations(vec![
            create_operation_call(&context, &hello, "concat")?,
            create_operation_call(&context, &hello, "toUpperCase")?,
        ]);
    // `at` declares `number | undefined` but produces a number here.
    let numbers = IData::array(vec![IData::number(1.0), IData::number(2.0)], DataType::Number);
    let first = Statement::new(numbers.clone())
        .with_operations(vec![create_operation_call(&context, &numbers, "at")?]);

    let program = vec![greeting, shout, first];
    assert_eq!(update_statements(&program, &context, None, false), program);
    Ok(())
}

#[test]
fn references_follow_renames() {
    let context = Context::default();
    let statements = update_statements(&program(), &context, None, false);

    let renamed = statements[0].clone().with_name("salutation");
    let updated = update_statements(&statements, &context, Some(&renamed), false);

    let reference = updated[1].data.as_reference().map(|r| r.name.to_string());
    assert_eq!(reference.as_deref(), Some("salutation"));
    assert_eq!(
        context.get_result(&updated[2].id).and_then(|d| d.as_number()),
        Some(6.0)
    );
}

#[test]
fn references_switch_to_a_new_variable_of_the_same_name() {
    let context = Context::default();
    let old = Statement::new(IData::number(1.0)).with_name("n");
    let new = Statement::new(IData::number(2.0)).with_name("n");
    let user = Statement::new(IData::reference("n", &old.id, DataType::Number));

    // `old` is removed; `n` now names `new`.
    let updated = update_statements(
        &[old.clone(), new.clone(), user],
        &context,
        Some(&old),
        true,
    );
    assert_eq!(updated.len(), 2);
    let target = updated[1].data.as_reference().map(|r| r.id.clone());
    assert_eq!(target, Some(new.id.clone()));
    assert_eq!(
        context.get_result(&updated[1].id).and_then(|d| d.as_number()),
        Some(2.0)
    );
}

#[test]
fn callbacks_follow_the_element_type() {
    let context = Context::default();
    let item = Statement::new(IData::number(0.0)).with_name("item");
    let body = Statement::new(IData::reference("item", &item.id, DataType::Number))
        .with_operations(vec![call("toString", vec![])]);
    let callback = Statement::new(function(vec![item], vec![body]));
    let callback_id = callback.id.clone();

    let numbers = IData::array(
        vec![IData::number(1.0), IData::number(2.0)],
        DataType::Number,
    );
    let mapped = Statement::new(numbers).with_operations(vec![call("map", vec![callback])]);
    let statements = update_statements(&[mapped], &context, None, false);

    // Still compatible: the callback is kept as written.
    let kept = statements[0].operations[0]
        .as_operation()
        .map(|o| o.parameters[0].clone());
    assert_eq!(kept.as_ref().map(|s| s.id.clone()), Some(callback_id.clone()));
    assert_eq!(
        kept.and_then(|s| s.data.as_operation().map(|o| o.statements.len())),
        Some(1)
    );

    // Switching to strings makes the number callback incompatible.
    let strings = Statement {
        data: IData::array(vec![IData::string("a")], DataType::String),
        ..statements[0].clone()
    };
    let updated = update_statements(&statements, &context, Some(&strings), false);
    let replaced = updated[0].operations[0]
        .as_operation()
        .map(|o| o.parameters[0].clone());
    assert_eq!(replaced.as_ref().map(|s| s.id.clone()), Some(callback_id));
    let first_parameter = replaced.and_then(|s| match s.data.ty {
        DataType::Operation { parameters, .. } => parameters.first().map(|p| p.ty.clone()),
        _ => None,
    });
    assert_eq!(first_parameter, Some(DataType::String));
}

#[test]
fn extra_arguments_are_dropped() {
    let statement = Statement::new(IData::string("abc")).with_operations(vec![call(
        "toUpperCase",
        vec![Statement::new(IData::number(1.0))],
    )]);
    let updated = update_statements(&[statement], &Context::default(), None, false);
    let args = updated[0].operations[0]
        .as_operation()
        .map(|o| o.parameters.len());
    assert_eq!(args, Some(0));
}

#[test]
fn file_changes_reach_callers() -> Result<()> {
    let x = Statement::new(IData::number(0.0)).with_name("x");
    let body = Statement::new(IData::reference("x", &x.id, DataType::Number))
        .with_operations(vec![call("multiply", vec![Statement::new(IData::number(2.0))])]);
    let double = ProjectFile::new("double", function(vec![x.clone()], vec![body]));

    let caller = Statement::new(IData::number(3.0)).with_operations(vec![call("double", vec![])]);
    let main = ProjectFile::new("main", function(vec![], vec![caller]));

    let mut engine = Engine::new();
    engine.add_file(double.clone())?;
    engine.add_file(main)?;
    assert_eq!(engine.eval_file("main")?.as_number(), Some(6.0));

    // `double` gains a required `factor` parameter.
    let factor = Statement::new(IData::number(1.0)).with_name("factor");
    let body = Statement::new(IData::reference("x", &x.id, DataType::Number)).with_operations(vec![
        call(
            "multiply",
            vec![Statement::new(IData::reference(
                "factor",
                &factor.id,
                DataType::Number,
            ))],
        ),
    ]);
    let edited = ProjectFile {
        content: function(vec![x, factor], vec![body]),
        ..double
    };
    engine.update_file(edited)?;

    let main = engine.project().get_file("main")?;
    let call_args = main
        .content
        .as_operation()
        .and_then(|o| o.statements[0].operations[0].as_operation().map(|c| c.parameters.len()));
    assert_eq!(call_args, Some(1));
    // The synthesized argument is the default number.
    assert_eq!(engine.eval_file("main")?.as_number(), Some(0.0));
    Ok(())
}
