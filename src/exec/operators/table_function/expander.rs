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
//! Row expansion state machine.
//!
//! Responsibilities:
//! - Holds the current input chunk and the row bound to every table function.
//! - Enumerates the cartesian product of the functions' values per row, resuming across output
//!   blocks.
//! - Replicates pass-through columns, pads unreferenced ones and applies conjuncts.

use std::sync::Arc;

use arrow::datatypes::SchemaRef;

use super::assembler::OutputBlock;
use super::cursor::{Pivot, is_inner_and_empty, locate_pivot, roll};
use crate::common::config;
use crate::common::ids::SlotId;
use crate::common::logging::{debug, trace};
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use crate::exec::table_function::TableFunction;
use crate::runtime::runtime_state::RuntimeState;

const LOG_TARGET: &str = "rowexpand::table_function";

/// Plan-time layout shared by every expander created from one factory.
#[derive(Debug)]
pub struct ExpansionLayout {
    pub child_slots: Vec<SlotId>,
    /// Pass-through columns that downstream reads; replicated from the input.
    pub output_slot_indexes: Vec<usize>,
    /// Pass-through columns nobody reads; padded with NULLs.
    pub useless_slot_indexes: Vec<usize>,
    pub output_schema: SchemaRef,
    pub arena: Arc<ExprArena>,
    pub conjuncts: Vec<ExprId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillStatus {
    /// Rows in the output block after filtering.
    pub rows: usize,
    /// Input is finished and fully expanded.
    pub eos: bool,
}

pub struct TableFunctionExpander {
    fns: Vec<Box<dyn TableFunction>>,
    layout: Arc<ExpansionLayout>,
    child_chunk: Option<Chunk>,
    cur_child_offset: Option<usize>,
    current_row_insert_times: usize,
    child_eos: bool,
}

impl TableFunctionExpander {
    pub fn new(fns: Vec<Box<dyn TableFunction>>, layout: Arc<ExpansionLayout>) -> Self {
        Self {
            fns,
            layout,
            child_chunk: None,
            cur_child_offset: None,
            current_row_insert_times: 0,
            child_eos: false,
        }
    }

    pub fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.layout.output_schema)
    }

    pub fn new_output_block(&self, capacity: usize) -> OutputBlock {
        OutputBlock::new(self.output_schema(), capacity)
    }

    pub fn open(&mut self) -> Result<(), String> {
        for f in self.fns.iter_mut() {
            f.open()?;
        }
        Ok(())
    }

    pub fn need_more_input(&self) -> bool {
        self.child_chunk.is_none() && !self.child_eos
    }

    /// A row of the held chunk is still being expanded.
    pub fn has_bound_row(&self) -> bool {
        self.cur_child_offset.is_some()
    }

    pub fn set_input_finished(&mut self) {
        self.child_eos = true;
    }

    pub fn is_input_finished(&self) -> bool {
        self.child_eos
    }

    /// Accept the next input chunk and bind its first row.
    pub fn push_chunk(&mut self, chunk: Chunk) -> Result<(), String> {
        if self.child_chunk.is_some() {
            return Err("table function received a chunk before the previous one was consumed"
                .to_string());
        }
        if chunk.is_empty() {
            return Ok(());
        }
        for slot in &self.layout.child_slots {
            chunk.column_by_slot_id(*slot)?;
        }
        for f in self.fns.iter_mut() {
            f.process_init(&self.layout.arena, &chunk)?;
        }
        debug!(target: LOG_TARGET, rows = chunk.len(), "table function accepted input chunk");
        self.child_chunk = Some(chunk);
        self.cur_child_offset = None;
        self.current_row_insert_times = 0;
        self.process_next_child_row()
    }

    /// Expand into `output` until it is full or the held chunk is exhausted.
    pub fn fill(
        &mut self,
        state: &RuntimeState,
        output: &mut OutputBlock,
    ) -> Result<FillStatus, String> {
        let child_slot_num = self.layout.child_slots.len();
        let fn_num = self.fns.len();
        if fn_num == 0 {
            return Err("table function operator has no functions".to_string());
        }
        if output.num_columns() != child_slot_num + fn_num {
            return Err(format!(
                "output block has {} columns, expected {}",
                output.num_columns(),
                child_slot_num + fn_num
            ));
        }
        let capacity = output.capacity();
        let first_fn_column = child_slot_num;
        let last_fn_column = child_slot_num + fn_num - 1;

        while output.column_len(first_fn_column) < capacity {
            state.check_cancelled()?;
            if self.child_chunk.is_none() {
                break;
            }

            let mut skip_child_row = false;
            while output.column_len(first_fn_column) < capacity {
                let pivot = locate_pivot(&self.fns);
                if pivot == Pivot::RowDone || skip_child_row {
                    self.copy_output_slots(output)?;
                    self.process_next_child_row()?;
                    if self.cur_child_offset.is_none() {
                        break;
                    }
                } else if let Pivot::Roll(k) = pivot {
                    if !roll(&mut self.fns, k) {
                        continue;
                    }
                }

                skip_child_row = is_inner_and_empty(&self.fns);
                if skip_child_row {
                    continue;
                }

                let remaining = capacity - output.column_len(first_fn_column);
                let repeat = self.fns[fn_num - 1]
                    .get_value(output.column_mut(last_fn_column)?, remaining)?;
                self.current_row_insert_times += repeat;
                for (i, f) in self.fns[..fn_num - 1].iter_mut().enumerate() {
                    f.get_same_many_values(output.column_mut(first_fn_column + i)?, repeat)?;
                }
            }
        }

        self.copy_output_slots(output)?;
        self.settle_bound_row()?;

        let rows = output.column_len(first_fn_column);
        for idx in &self.layout.useless_slot_indexes {
            output.pad_nulls(*idx, rows)?;
        }
        output.filter(&self.layout.arena, &self.layout.conjuncts)?;

        let status = FillStatus {
            rows: output.num_rows(),
            eos: self.child_eos && self.cur_child_offset.is_none(),
        };
        trace!(
            target: LOG_TARGET,
            expanded_rows = rows,
            output_rows = status.rows,
            eos = status.eos,
            "table function fill"
        );
        Ok(status)
    }

    /// Release the held chunk and per-chunk function state.
    pub fn close(&mut self) {
        if self.child_chunk.take().is_some() {
            for f in self.fns.iter_mut() {
                f.process_close();
            }
        }
        self.cur_child_offset = None;
        self.current_row_insert_times = 0;
    }

    /// Flush pending replication of the bound row's needed pass-through values.
    fn copy_output_slots(&mut self, output: &mut OutputBlock) -> Result<(), String> {
        let times = self.current_row_insert_times;
        if times == 0 {
            return Ok(());
        }
        let (Some(chunk), Some(row)) = (self.child_chunk.as_ref(), self.cur_child_offset) else {
            return Err(format!(
                "table function has {times} pending pass-through rows but no bound input row"
            ));
        };
        for idx in &self.layout.output_slot_indexes {
            let slot = self.layout.child_slots.get(*idx).ok_or_else(|| {
                format!("pass-through column {idx} has no child slot")
            })?;
            let src = chunk.column_by_slot_id(*slot)?;
            output.column_mut(*idx)?.append_repeated(&src, row, times)?;
        }
        self.current_row_insert_times = 0;
        Ok(())
    }

    /// Move a full block's cursor onto the next value, releasing the bound row when it has none
    /// left so that end of stream is reported by the fill that emitted the last row.
    fn settle_bound_row(&mut self) -> Result<(), String> {
        while self.cur_child_offset.is_some() {
            match locate_pivot(&self.fns) {
                Pivot::Current => break,
                Pivot::Roll(k) => {
                    if roll(&mut self.fns, k) {
                        break;
                    }
                }
                Pivot::RowDone => {
                    self.process_next_child_row()?;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Bind the next input row, or close the functions and drop the chunk when none is left.
    fn process_next_child_row(&mut self) -> Result<(), String> {
        let next = self.cur_child_offset.map_or(0, |row| row + 1);
        let rows = self.child_chunk.as_ref().map_or(0, Chunk::len);
        if next >= rows {
            for f in self.fns.iter_mut() {
                f.process_close();
            }
            self.child_chunk = None;
            self.cur_child_offset = None;
            debug!(target: LOG_TARGET, rows, "table function input chunk exhausted");
            return Ok(());
        }
        self.cur_child_offset = Some(next);
        for f in self.fns.iter_mut() {
            f.process_row(next)?;
        }
        if config::debug_table_function_trace() {
            debug!(target: LOG_TARGET, row = next, "table function bound input row");
        }
        Ok(())
    }
}
