// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::context::Context;
use crate::types::DataType;
use crate::value::{create_entity_id, EntityId, IData};
use crate::Rc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("file `{0}` does not contain an operation")]
    NotAnOperation(String),
    #[error("file name `{0}` is used more than once")]
    DuplicateName(String),
    #[error("file `{0}` not found")]
    FileNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Operation,
}

/// A named top-level operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default = "create_entity_id")]
    pub id: EntityId,
    pub name: Rc<str>,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub content: IData,
}

impl ProjectFile {
    pub fn new(name: &str, content: IData) -> Self {
        ProjectFile {
            id: create_entity_id(),
            name: name.into(),
            file_type: FileType::Operation,
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default = "create_entity_id")]
    pub id: EntityId,
    pub name: Rc<str>,
    #[serde(default)]
    pub files: Vec<ProjectFile>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Project {
            id: create_entity_id(),
            name: name.into(),
            files: vec![],
        }
    }

    pub fn from_json_str(json: &str) -> Result<Project> {
        let project: Project = serde_json::from_str(json)?;
        project.validate()?;
        Ok(project)
    }

    pub fn to_json_str(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every file must hold an operation and file names must be unique,
    /// since files are visible to each other by name.
    pub fn validate(&self) -> Result<()> {
        for (idx, file) in self.files.iter().enumerate() {
            if !matches!(file.content.ty.dereference(), DataType::Operation { .. })
                || file.content.as_operation().is_none()
            {
                return Err(ProjectError::NotAnOperation(file.name.to_string()).into());
            }
            if self.files[..idx].iter().any(|f| f.name == file.name) {
                return Err(ProjectError::DuplicateName(file.name.to_string()).into());
            }
        }
        Ok(())
    }

    pub fn get_file(&self, name: &str) -> Result<&ProjectFile> {
        self.files
            .iter()
            .find(|f| f.name.as_ref() == name)
            .ok_or_else(|| ProjectError::FileNotFound(name.to_string()).into())
    }

    /// Replaces the file with the same id, or appends it.
    pub fn upsert_file(&mut self, file: ProjectFile) {
        match self.files.iter_mut().find(|f| f.id == file.id) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
    }
}

/// Scope in which every file is a variable named after the file.
pub fn project_context(context: &Context, files: &[ProjectFile]) -> Context {
    let mut scope = context.child();
    for file in files {
        scope.declare(&file.name, &file.id, file.content.clone());
    }
    scope
}
