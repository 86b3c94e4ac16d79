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
use std::sync::Arc;

use arrow::datatypes::SchemaRef;

use crate::common::ids::SlotId;
use crate::exec::expr::{ExprArena, ExprId};

/// One configured table function: its name and argument expressions.
#[derive(Clone, Debug)]
pub struct TableFunctionCall {
    pub function_name: String,
    pub args: Vec<ExprId>,
}

impl TableFunctionCall {
    pub fn new(function_name: impl Into<String>, args: Vec<ExprId>) -> Self {
        Self {
            function_name: function_name.into(),
            args,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TableFunctionNode {
    pub node_id: i32,
    pub fn_calls: Vec<TableFunctionCall>,
    /// Input slots, in output column order.
    pub child_slots: Vec<SlotId>,
    /// Slots read downstream; child slots outside this set are emitted as NULL.
    pub output_slot_ids: Vec<SlotId>,
    /// Child slot columns followed by one column per function.
    pub output_schema: SchemaRef,
    pub arena: Arc<ExprArena>,
    /// Evaluated over each assembled output block.
    pub conjuncts: Vec<ExprId>,
}
