// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use opflow::*;

const PROJECT: &str = r#"{
  "name": "demo",
  "files": [
    {
      "name": "greet",
      "type": "operation",
      "content": {
        "type": {
          "kind": "operation",
          "parameters": [{ "name": "who", "type": { "kind": "string" } }],
          "result": { "kind": "string" }
        },
        "value": {
          "parameters": [
            { "name": "who", "data": { "type": { "kind": "string" }, "value": "World" } }
          ],
          "statements": [
            {
              "data": { "type": { "kind": "string" }, "value": "Hello, " },
              "operations": [
                {
                  "value": {
                    "name": "concat",
                    "parameters": [{ "data": { "value": { "name": "who" } } }]
                  }
                }
              ]
            }
          ]
        }
      }
    },
    {
      "name": "settings",
      "type": "operation",
      "content": {
        "type": { "kind": "operation", "parameters": [], "result": { "kind": "unknown" } },
        "value": {
          "parameters": [],
          "statements": [
            {
              "data": {
                "type": {
                  "kind": "object",
                  "properties": { "zeta": { "kind": "number" }, "alpha": { "kind": "string" } },
                  "required": ["zeta", "alpha"]
                },
                "value": [
                  { "key": "zeta", "value": { "data": { "value": 1 } } },
                  { "key": "alpha", "value": { "data": { "value": "first" } } }
                ]
              }
            }
          ]
        }
      }
    }
  ]
}"#;

#[test]
fn round_trip_keeps_entry_order() -> Result<()> {
    let project = Project::from_json_str(PROJECT)?;
    let json = project.to_json_str()?;

    let zeta = json.find(r#""key": "zeta""#);
    let alpha = json.find(r#""key": "alpha""#);
    assert!(zeta.is_some() && alpha.is_some());
    assert!(zeta < alpha, "{json}");

    let back = Project::from_json_str(&json)?;
    assert_eq!(back, project);
    Ok(())
}

#[test]
fn files_evaluate_in_project_scope() -> Result<()> {
    let mut engine = Engine::new();
    engine.load_project(PROJECT)?;

    let greeting = engine.eval_file("greet")?;
    assert_eq!(greeting.as_str(), Some("Hello, World"));

    let settings = engine.eval_file("settings")?;
    let keys: Vec<String> = settings
        .as_object()
        .map(|o| o.keys().map(|k| k.to_string()).collect())
        .unwrap_or_default();
    assert_eq!(keys, vec!["zeta", "alpha"]);

    assert!(engine.eval_file("nope").is_err());
    Ok(())
}

#[test]
fn files_are_callable_from_statements() -> Result<()> {
    let mut engine = Engine::new();
    engine.load_project(PROJECT)?;

    let statement = Statement::new(IData::string("there")).with_operations(vec![IData::new(
        DataType::operation(vec![], DataType::Unknown),
        Value::Operation(OperationValue::call("greet", vec![])),
    )]);
    let result = engine.eval_statements(&[statement]);
    assert_eq!(result.as_str(), Some("Hello, there"));
    Ok(())
}

#[test]
fn invalid_projects_are_rejected() {
    let not_an_operation = r#"{
      "name": "bad",
      "files": [
        { "name": "x", "type": "operation", "content": { "type": { "kind": "number" }, "value": 1 } }
      ]
    }"#;
    assert!(Project::from_json_str(not_an_operation).is_err());

    let duplicate = PROJECT.replace(r#""name": "settings""#, r#""name": "greet""#);
    let error = Project::from_json_str(&duplicate).map(|_| ());
    assert!(error.is_err());
    assert!(Project::from_json_str("{ \"files\": 3 }").is_err());
}
