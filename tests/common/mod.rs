// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use arrow::array::{Array, ArrayRef, Int64Array, ListArray, StringArray};
use arrow::datatypes::{DataType, Field, Int64Type, Schema, SchemaRef};

use rowexpand::common::ids::SlotId;
use rowexpand::exec::chunk::{Chunk, field_with_slot_id};
use rowexpand::rowexpand_config;
use rowexpand::rowexpand_logging;

/// Test configuration for integration tests.
pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    /// Create a new test configuration with default settings.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_rowexpand.toml");

        let config_content = r#"
log_level = "debug"

[runtime]
chunk_size = 4096

[debug]
table_function_trace = false
"#;

        std::fs::write(&config_path, config_content)?;

        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    /// Initialize logging for tests.
    pub fn init_logging(&self) {
        rowexpand_logging::init_with_level("debug");
    }

    /// Load the test configuration.
    pub fn load_config(&self) -> anyhow::Result<&'static rowexpand_config::RowExpandConfig> {
        rowexpand_config::init_from_path(&self.config_path)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new().expect("Failed to create test config")
    }
}

pub fn int64_field(name: &str, slot: u32) -> Field {
    field_with_slot_id(Field::new(name, DataType::Int64, true), SlotId::new(slot))
}

pub fn utf8_field(name: &str, slot: u32) -> Field {
    field_with_slot_id(Field::new(name, DataType::Utf8, true), SlotId::new(slot))
}

pub fn int64_list_field(name: &str, slot: u32) -> Field {
    let item = Field::new_list_field(DataType::Int64, true);
    field_with_slot_id(
        Field::new(name, DataType::List(Arc::new(item)), true),
        SlotId::new(slot),
    )
}

pub fn int64_list(rows: Vec<Option<Vec<i64>>>) -> ArrayRef {
    Arc::new(ListArray::from_iter_primitive::<Int64Type, _, _>(
        rows.into_iter()
            .map(|row| row.map(|values| values.into_iter().map(Some).collect::<Vec<_>>())),
    ))
}

pub fn chunk(fields: Vec<Field>, columns: Vec<ArrayRef>) -> Chunk {
    Chunk::try_from_columns(Arc::new(Schema::new(fields)), columns).expect("build test chunk")
}

pub fn schema(fields: Vec<Field>) -> SchemaRef {
    Arc::new(Schema::new(fields))
}

pub fn i64_values(chunk: &Chunk, idx: usize) -> Vec<Option<i64>> {
    chunk.columns()[idx]
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("Int64 column")
        .iter()
        .collect()
}

pub fn str_values(chunk: &Chunk, idx: usize) -> Vec<Option<String>> {
    chunk.columns()[idx]
        .as_any()
        .downcast_ref::<StringArray>()
        .expect("Utf8 column")
        .iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

/// Assert that a result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}
