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

struct SeriesArgs {
    start: Int64Array,
    end: Int64Array,
    step: Option<Int64Array>,
}

/// `generate_series(start, end[, step])`: arithmetic series including `end` when reached.
pub struct GenerateSeriesFunction {
    name: String,
    state: CursorState,
    args: Vec<ExprId>,
    inputs: Option<SeriesArgs>,
    start: i64,
    step: i64,
}

impl GenerateSeriesFunction {
    pub(crate) fn new(name: String, state: CursorState, args: Vec<ExprId>) -> Self {
        Self {
            name,
            state,
            args,
            inputs: None,
            start: 0,
            step: 1,
        }
    }
}

fn series_values(
    fn_name: &str,
    start: i64,
    step: i64,
    offset: usize,
    len: usize,
) -> Result<ArrayRef, String> {
    let mut out = Vec::with_capacity(len);
    for i in offset..offset + len {
        let i = i128::try_from(i).map_err(|_| format!("{fn_name} offset overflow"))?;
        let v = i128::from(start) + i128::from(step) * i;
        out.push(
            i64::try_from(v)
                .map_err(|_| format!("table function {fn_name} value out of BIGINT range: {v}"))?,
        );
    }
    Ok(Arc::new(Int64Array::from(out)))
}

fn series_count(start: i64, end: i64, step: i64) -> Result<usize, String> {
    let (start, end, step) = (i128::from(start), i128::from(end), i128::from(step));
    let count = if step > 0 {
        if start > end {
            return Ok(0);
        }
        (end - start) / step + 1
    } else {
        if start < end {
            return Ok(0);
        }
        (start - end) / step.abs() + 1
    };
    usize::try_from(count).map_err(|_| format!("generate_series count overflow: {count}"))
}

delegate_cursor!(GenerateSeriesFunction);

impl TableFunction for GenerateSeriesFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_init(&mut self, arena: &ExprArena, chunk: &Chunk) -> Result<(), String> {
        let start = eval_int64_arg(arena, &self.args, 0, chunk, &self.name)?;
        let end = eval_int64_arg(arena, &self.args, 1, chunk, &self.name)?;
        let step = if self.args.len() > 2 {
            Some(eval_int64_arg(arena, &self.args, 2, chunk, &self.name)?)
        } else {
            None
        };
        self.inputs = Some(SeriesArgs { start, end, step });
        Ok(())
    }

    fn process_row(&mut self, row: usize) -> Result<(), String> {
        let inputs = self.inputs.as_ref().ok_or_else(|| not_initialized(&self.name))?;
        if row >= inputs.start.len() {
            return Err(format!("table function {} row {row} out of range", self.name));
        }
        let step_null = inputs.step.as_ref().is_some_and(|s| s.is_null(row));
        if inputs.start.is_null(row) || inputs.end.is_null(row) || step_null {
            self.state.bind(0);
            return Ok(());
        }
        let start = inputs.start.value(row);
        let end = inputs.end.value(row);
        let step = inputs.step.as_ref().map_or(1, |s| s.value(row));
        if step == 0 {
            return Err(format!("table function {} step cannot be zero", self.name));
        }
        let count = series_count(start, end, step)?;
        self.start = start;
        self.step = step;
        self.state.bind(count);
        Ok(())
    }

    fn get_value(&mut self, column: &mut ColumnBuffer, max_count: usize) -> Result<usize, String> {
        let (name, start, step) = (&self.name, self.start, self.step);
        self.state.emit(column, max_count, |offset, len| {
            series_values(name, start, step, offset, len)
        })
    }

    fn get_same_many_values(
        &mut self,
        column: &mut ColumnBuffer,
        repeat: usize,
    ) -> Result<(), String> {
        let (name, start, step) = (&self.name, self.start, self.step);
        self.state.emit_repeated(column, repeat, |offset| {
            series_values(name, start, step, offset, 1)
        })
    }

    fn process_close(&mut self) {
        self.inputs = None;
        self.start = 0;
        self.step = 1;
        self.state.close();
    }
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::common::ids::SlotId;
    use crate::exec::chunk::field_with_slot_id;
    use crate::exec::expr::LiteralValue;
    use crate::exec::table_function::test_util::drain;
    use crate::exec::table_function::{FunctionCursor, TableFunctionKind};

    fn series(start: Vec<Option<i64>>, end: i64, step: Option<i64>) -> Box<dyn TableFunction> {
        let schema = Arc::new(Schema::new(vec![field_with_slot_id(
            Field::new("start", DataType::Int64, true),
            SlotId::new(1),
        )]));
        let chunk =
            Chunk::try_from_columns(schema, vec![Arc::new(Int64Array::from(start))]).unwrap();
        let mut arena = ExprArena::default();
        let mut args = vec![arena.slot(SlotId::new(1))];
        args.push(arena.literal(LiteralValue::Int64(end)));
        if let Some(step) = step {
            args.push(arena.literal(LiteralValue::Int32(step as i32)));
        }
        let mut f = TableFunctionKind::GenerateSeries.instantiate(false, args);
        f.process_init(&arena, &chunk).unwrap();
        f
    }

    fn longs(array: ArrayRef) -> Vec<i64> {
        array
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap()
            .values()
            .to_vec()
    }

    #[test]
    fn default_step_includes_end() {
        let mut f = series(vec![Some(1)], 4, None);
        f.process_row(0).unwrap();
        assert_eq!(longs(drain(f.as_mut(), DataType::Int64, 3)), vec![1, 2, 3, 4]);
    }

    #[test]
    fn negative_step_counts_down() {
        let mut f = series(vec![Some(10)], 3, Some(-3));
        f.process_row(0).unwrap();
        assert_eq!(longs(drain(f.as_mut(), DataType::Int64, 8)), vec![10, 7, 4]);
    }

    #[test]
    fn wrong_direction_and_null_are_empty() {
        let mut f = series(vec![Some(5), None], 1, Some(1));
        f.process_row(0).unwrap();
        assert!(f.current_empty());
        f.process_row(1).unwrap();
        assert!(f.current_empty());
    }

    #[test]
    fn zero_step_is_an_error() {
        let mut f = series(vec![Some(1)], 3, Some(0));
        let err = f.process_row(0).unwrap_err();
        assert!(err.contains("step cannot be zero"), "err={err}");
    }

    #[test]
    fn repeats_current_value() {
        let mut f = series(vec![Some(0)], 10, Some(5));
        f.process_row(0).unwrap();
        f.forward(1);
        let mut column = ColumnBuffer::new(DataType::Int64);
        f.get_same_many_values(&mut column, 2).unwrap();
        assert_eq!(longs(column.finish().unwrap()), vec![5, 5]);
    }
}
