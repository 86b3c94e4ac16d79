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
//! Table-function processor.
//!
//! Responsibilities:
//! - Validates a `TableFunctionNode` once at plan time and creates one independent expander per
//!   driver.
//! - Maps the pipeline push/pull contract onto `TableFunctionExpander`.
//!
//! Key exported interfaces:
//! - Types: `TableFunctionProcessorFactory`, `TableFunctionProcessorOperator`.

use std::collections::HashSet;
use std::sync::Arc;

use super::expander::{ExpansionLayout, TableFunctionExpander};
use crate::common::logging::debug;
use crate::exec::chunk::{Chunk, field_slot_id};
use crate::exec::expr::ExprId;
use crate::exec::node::table_function::TableFunctionNode;
use crate::exec::pipeline::operator::{Operator, ProcessorOperator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::exec::table_function::{TableFunction, TableFunctionKind};
use crate::runtime::runtime_state::RuntimeState;

const LOG_TARGET: &str = "rowexpand::table_function";

#[derive(Clone, Debug)]
struct ResolvedCall {
    kind: TableFunctionKind,
    is_outer: bool,
    args: Vec<ExprId>,
}

/// Factory for table-function processors that expand each input row to variable output rows.
pub struct TableFunctionProcessorFactory {
    name: String,
    calls: Vec<ResolvedCall>,
    layout: Arc<ExpansionLayout>,
}

impl TableFunctionProcessorFactory {
    pub fn try_new(node: TableFunctionNode) -> Result<Self, String> {
        let TableFunctionNode {
            node_id,
            fn_calls,
            child_slots,
            output_slot_ids,
            output_schema,
            arena,
            conjuncts,
        } = node;

        if fn_calls.is_empty() {
            return Err("table function node requires at least one function".to_string());
        }
        let fields = output_schema.fields();
        if fields.len() != child_slots.len() + fn_calls.len() {
            return Err(format!(
                "table function output schema mismatch: schema={} child_slots={} functions={}",
                fields.len(),
                child_slots.len(),
                fn_calls.len()
            ));
        }
        for (idx, field) in fields.iter().enumerate() {
            let slot = field_slot_id(field.as_ref())?.ok_or_else(|| {
                format!(
                    "table function output field {idx} ({}) has no slot id",
                    field.name()
                )
            })?;
            if let Some(expected) = child_slots.get(idx)
                && slot != *expected
            {
                return Err(format!(
                    "table function output field {idx} has slot {slot}, expected child slot {expected}"
                ));
            }
        }

        let mut calls = Vec::with_capacity(fn_calls.len());
        for call in fn_calls {
            let (kind, is_outer) = TableFunctionKind::from_name(&call.function_name)?;
            if !kind.arity().contains(&call.args.len()) {
                return Err(format!(
                    "table function {} expects {}..={} arguments, got {}",
                    call.function_name,
                    kind.arity().start(),
                    kind.arity().end(),
                    call.args.len()
                ));
            }
            if let Some(bad) = call.args.iter().find(|id| !arena.contains(**id)) {
                return Err(format!(
                    "table function {} argument refers to unknown expr {}",
                    call.function_name, bad.0
                ));
            }
            calls.push(ResolvedCall {
                kind,
                is_outer,
                args: call.args,
            });
        }
        if let Some(bad) = conjuncts.iter().find(|id| !arena.contains(**id)) {
            return Err(format!(
                "table function conjunct refers to unknown expr {}",
                bad.0
            ));
        }

        let needed: HashSet<_> = output_slot_ids.iter().copied().collect();
        let mut output_slot_indexes = Vec::new();
        let mut useless_slot_indexes = Vec::new();
        for (idx, slot) in child_slots.iter().enumerate() {
            if needed.contains(slot) {
                output_slot_indexes.push(idx);
            } else {
                useless_slot_indexes.push(idx);
            }
        }

        let name = if node_id >= 0 {
            format!("TableFunction (id={node_id})")
        } else {
            "TableFunction".to_string()
        };
        debug!(
            target: LOG_TARGET,
            name = %name,
            functions = calls.len(),
            child_slots = child_slots.len(),
            copied_slots = output_slot_indexes.len(),
            conjuncts = conjuncts.len(),
            "table function factory created"
        );

        Ok(Self {
            name,
            calls,
            layout: Arc::new(ExpansionLayout {
                child_slots,
                output_slot_indexes,
                useless_slot_indexes,
                output_schema,
                arena,
                conjuncts,
            }),
        })
    }

    /// Fresh function instances for one driver.
    fn instantiate_functions(&self) -> Vec<Box<dyn TableFunction>> {
        self.calls
            .iter()
            .map(|c| c.kind.instantiate(c.is_outer, c.args.clone()))
            .collect()
    }

    /// Build a standalone expander, bypassing the pipeline operator wrapper.
    pub fn create_expander(&self) -> TableFunctionExpander {
        TableFunctionExpander::new(self.instantiate_functions(), Arc::clone(&self.layout))
    }

    pub fn create_processor(&self) -> TableFunctionProcessorOperator {
        TableFunctionProcessorOperator {
            name: self.name.clone(),
            expander: self.create_expander(),
            finishing: false,
            finished: false,
        }
    }
}

impl OperatorFactory for TableFunctionProcessorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, dop: i32, driver_id: i32) -> Box<dyn Operator> {
        debug!(
            target: LOG_TARGET,
            name = %self.name,
            dop,
            driver_id,
            "table function operator created"
        );
        Box::new(self.create_processor())
    }
}

pub struct TableFunctionProcessorOperator {
    name: String,
    expander: TableFunctionExpander,
    finishing: bool,
    finished: bool,
}

impl Operator for TableFunctionProcessorOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self) -> Result<(), String> {
        self.expander.open()
    }

    fn close(&mut self) -> Result<(), String> {
        self.expander.close();
        Ok(())
    }

    fn cancel(&mut self) {
        self.expander.close();
        self.finished = true;
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn as_processor_mut(&mut self) -> Option<&mut dyn ProcessorOperator> {
        Some(self)
    }

    fn as_processor_ref(&self) -> Option<&dyn ProcessorOperator> {
        Some(self)
    }
}

impl ProcessorOperator for TableFunctionProcessorOperator {
    fn need_input(&self) -> bool {
        !self.finishing && !self.finished && self.expander.need_more_input()
    }

    fn has_output(&self) -> bool {
        !self.finished && (self.expander.has_bound_row() || self.finishing)
    }

    fn push_chunk(&mut self, _state: &RuntimeState, chunk: Chunk) -> Result<(), String> {
        if !self.need_input() {
            return Err("table function received input while not ready".to_string());
        }
        self.expander.push_chunk(chunk)
    }

    fn pull_chunk(&mut self, state: &RuntimeState) -> Result<Option<Chunk>, String> {
        if self.finished {
            return Ok(None);
        }
        let mut block = self.expander.new_output_block(state.chunk_size());
        let status = self.expander.fill(state, &mut block)?;
        if status.eos {
            self.finished = true;
            debug!(target: LOG_TARGET, name = %self.name, "table function finished");
        }
        if status.rows == 0 {
            return Ok(None);
        }
        Ok(Some(block.into_chunk()?))
    }

    fn set_finishing(&mut self, _state: &RuntimeState) -> Result<(), String> {
        self.finishing = true;
        self.expander.set_input_finished();
        if !self.expander.has_bound_row() {
            self.finished = true;
            debug!(target: LOG_TARGET, name = %self.name, "table function finished");
        }
        Ok(())
    }
}
