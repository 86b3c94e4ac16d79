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

use arrow::array::{Array, ArrayRef, Int64Array};

use super::{CursorState, TableFunction, delegate_cursor, eval_int64_arg, not_initialized};
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use crate::exec::operators::table_function::assembler::ColumnBuffer;

/// `explode_numbers(n)`: BIGINT values `0..n`.
pub struct ExplodeNumbersFunction {
    name: String,
    state: CursorState,
    args: Vec<ExprId>,
    counts: Option<Int64Array>,
}

impl ExplodeNumbersFunction {
    pub(crate) fn new(name: String, state: CursorState, args: Vec<ExprId>) -> Self {
        Self {
            name,
            state,
            args,
            counts: None,
        }
    }
}

fn numbers(offset: usize, len: usize) -> Result<ArrayRef, String> {
    let start = i64::try_from(offset).map_err(|_| "explode_numbers offset overflow".to_string())?;
    let len = i64::try_from(len).map_err(|_| "explode_numbers length overflow".to_string())?;
    Ok(Arc::new(Int64Array::from_iter_values(start..start + len)))
}

delegate_cursor!(ExplodeNumbersFunction);

impl TableFunction for ExplodeNumbersFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_init(&mut self, arena: &ExprArena, chunk: &Chunk) -> Result<(), String> {
        self.counts = Some(eval_int64_arg(arena, &self.args, 0, chunk, &self.name)?);
        Ok(())
    }

    fn process_row(&mut self, row: usize) -> Result<(), String> {
        let counts = self.counts.as_ref().ok_or_else(|| not_initialized(&self.name))?;
        if row >= counts.len() {
            return Err(format!("table function {} row {row} out of range", self.name));
        }
        let size = if counts.is_null(row) {
            0
        } else {
            let n = counts.value(row).max(0);
            usize::try_from(n).map_err(|_| format!("explode_numbers count too large: {n}"))?
        };
        self.state.bind(size);
        Ok(())
    }

    fn get_value(&mut self, column: &mut ColumnBuffer, max_count: usize) -> Result<usize, String> {
        self.state.emit(column, max_count, numbers)
    }

    fn get_same_many_values(
        &mut self,
        column: &mut ColumnBuffer,
        repeat: usize,
    ) -> Result<(), String> {
        self.state
            .emit_repeated(column, repeat, |offset| numbers(offset, 1))
    }

    fn process_close(&mut self) {
        self.counts = None;
        self.state.close();
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::Int32Array;
    use arrow::datatypes::DataType;

    use super::*;
    use crate::common::ids::SlotId;
    use crate::exec::table_function::test_util::{drain, single_column_chunk};
    use crate::exec::table_function::{FunctionCursor, TableFunctionKind};

    fn init(values: Vec<Option<i32>>) -> Box<dyn TableFunction> {
        let mut arena = ExprArena::default();
        let slot = arena.slot(SlotId::new(1));
        let mut f = TableFunctionKind::ExplodeNumbers.instantiate(false, vec![slot]);
        f.process_init(&arena, &single_column_chunk(Arc::new(Int32Array::from(values))))
            .unwrap();
        f
    }

    #[test]
    fn counts_from_zero() {
        let mut f = init(vec![Some(4)]);
        f.process_row(0).unwrap();
        let out = drain(f.as_mut(), DataType::Int64, 3);
        let out = out.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(out.values(), &[0, 1, 2, 3]);
    }

    #[test]
    fn null_zero_and_negative_are_empty() {
        let mut f = init(vec![None, Some(0), Some(-3)]);
        for row in 0..3 {
            f.process_row(row).unwrap();
            assert!(f.current_empty(), "row {row}");
        }
    }
}
