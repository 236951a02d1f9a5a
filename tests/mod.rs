// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod evaluator;
mod project;
mod types;
mod updater;
