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
use super::explode::ListSource;
use super::{CursorState, TableFunction, delegate_cursor, eval_raw_arg, not_initialized};
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use crate::exec::operators::table_function::assembler::ColumnBuffer;

/// `explode_map(map)`: one `struct<key, value>` row per map entry.
pub struct ExplodeMapFunction {
    name: String,
    state: CursorState,
    args: Vec<ExprId>,
    source: Option<ListSource>,
    row_start: usize,
}

impl ExplodeMapFunction {
    pub(crate) fn new(name: String, state: CursorState, args: Vec<ExprId>) -> Self {
        Self {
            name,
            state,
            args,
            source: None,
            row_start: 0,
        }
    }
}

delegate_cursor!(ExplodeMapFunction);

impl TableFunction for ExplodeMapFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_init(&mut self, arena: &ExprArena, chunk: &Chunk) -> Result<(), String> {
        let map = eval_raw_arg(arena, &self.args, 0, chunk, &self.name)?;
        self.source = Some(ListSource::from_map(&map, &self.name)?);
        Ok(())
    }

    fn process_row(&mut self, row: usize) -> Result<(), String> {
        let source = self.source.as_ref().ok_or_else(|| not_initialized(&self.name))?;
        let (start, len) = source.window(row, &self.name)?;
        self.row_start = start;
        self.state.bind(len);
        Ok(())
    }

    fn get_value(&mut self, column: &mut ColumnBuffer, max_count: usize) -> Result<usize, String> {
        let source = self.source.as_ref().ok_or_else(|| not_initialized(&self.name))?;
        let start = self.row_start;
        self.state.emit(column, max_count, |offset, len| {
            Ok(source.values().slice(start + offset, len))
        })
    }

    fn get_same_many_values(
        &mut self,
        column: &mut ColumnBuffer,
        repeat: usize,
    ) -> Result<(), String> {
        let source = self.source.as_ref().ok_or_else(|| not_initialized(&self.name))?;
        let start = self.row_start;
        self.state.emit_repeated(column, repeat, |offset| {
            Ok(source.values().slice(start + offset, 1))
        })
    }

    fn process_close(&mut self) {
        self.source = None;
        self.row_start = 0;
        self.state.close();
    }
}
