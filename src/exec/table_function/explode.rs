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
use arrow::array::{Array, ArrayRef, LargeListArray, ListArray, MapArray};
use arrow::datatypes::DataType;

use super::{CursorState, TableFunction, delegate_cursor, eval_raw_arg, not_initialized};
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use crate::exec::operators::table_function::assembler::ColumnBuffer;

/// Flattened child values plus the `[start, start + len)` window of every row.
///
/// NULL rows get a zero-length window.
#[derive(Clone, Debug)]
pub(crate) struct ListSource {
    values: ArrayRef,
    windows: Vec<(usize, usize)>,
}

impl ListSource {
    pub(crate) fn from_list(array: &ArrayRef, fn_name: &str) -> Result<Self, String> {
        match array.data_type() {
            DataType::List(_) => {
                let list = array
                    .as_any()
                    .downcast_ref::<ListArray>()
                    .ok_or_else(|| format!("table function {fn_name} expects ListArray"))?;
                let offsets = list.value_offsets();
                let windows = (0..list.len())
                    .map(|row| window(list.is_null(row), offsets[row], offsets[row + 1], fn_name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self {
                    values: list.values().clone(),
                    windows,
                })
            }
            DataType::LargeList(_) => {
                let list = array
                    .as_any()
                    .downcast_ref::<LargeListArray>()
                    .ok_or_else(|| format!("table function {fn_name} expects LargeListArray"))?;
                let offsets = list.value_offsets();
                let windows = (0..list.len())
                    .map(|row| window(list.is_null(row), offsets[row], offsets[row + 1], fn_name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self {
                    values: list.values().clone(),
                    windows,
                })
            }
            DataType::Null => Ok(Self::all_null(array.len())),
            other => Err(format!(
                "table function {fn_name} expects ARRAY argument, got {:?}",
                other
            )),
        }
    }

    pub(crate) fn from_map(array: &ArrayRef, fn_name: &str) -> Result<Self, String> {
        match array.data_type() {
            DataType::Map(_, _) => {
                let map = array
                    .as_any()
                    .downcast_ref::<MapArray>()
                    .ok_or_else(|| format!("table function {fn_name} expects MapArray"))?;
                let offsets = map.value_offsets();
                let windows = (0..map.len())
                    .map(|row| window(map.is_null(row), offsets[row], offsets[row + 1], fn_name))
                    .collect::<Result<Vec<_>, _>>()?;
                let entries: ArrayRef = std::sync::Arc::new(map.entries().clone());
                Ok(Self {
                    values: entries,
                    windows,
                })
            }
            DataType::Null => Ok(Self::all_null(array.len())),
            other => Err(format!(
                "table function {fn_name} expects MAP argument, got {:?}",
                other
            )),
        }
    }

    fn all_null(rows: usize) -> Self {
        Self {
            values: arrow::array::new_empty_array(&DataType::Null),
            windows: vec![(0, 0); rows],
        }
    }

    pub(crate) fn window(&self, row: usize, fn_name: &str) -> Result<(usize, usize), String> {
        self.windows.get(row).copied().ok_or_else(|| {
            format!(
                "table function {fn_name} row {row} out of range (rows={})",
                self.windows.len()
            )
        })
    }

    pub(crate) fn values(&self) -> &ArrayRef {
        &self.values
    }
}

fn window<O>(is_null: bool, start: O, end: O, fn_name: &str) -> Result<(usize, usize), String>
where
    O: TryInto<usize> + Copy,
{
    if is_null {
        return Ok((0, 0));
    }
    let start: usize = start
        .try_into()
        .map_err(|_| format!("table function {fn_name} has invalid list offsets"))?;
    let end: usize = end
        .try_into()
        .map_err(|_| format!("table function {fn_name} has invalid list offsets"))?;
    if end < start {
        return Err(format!("table function {fn_name} has invalid list offsets"));
    }
    Ok((start, end - start))
}

/// `explode(array)` / `unnest(array)`: one row per element.
pub struct ExplodeFunction {
    name: String,
    state: CursorState,
    args: Vec<ExprId>,
    source: Option<ListSource>,
    row_start: usize,
}

impl ExplodeFunction {
    pub(crate) fn new(name: String, state: CursorState, args: Vec<ExprId>) -> Self {
        Self {
            name,
            state,
            args,
            source: None,
            row_start: 0,
        }
    }

    fn source(&self) -> Result<&ListSource, String> {
        self.source.as_ref().ok_or_else(|| not_initialized(&self.name))
    }
}

delegate_cursor!(ExplodeFunction);

impl TableFunction for ExplodeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_init(&mut self, arena: &ExprArena, chunk: &Chunk) -> Result<(), String> {
        let list = eval_raw_arg(arena, &self.args, 0, chunk, &self.name)?;
        self.source = Some(ListSource::from_list(&list, &self.name)?);
        Ok(())
    }

    fn process_row(&mut self, row: usize) -> Result<(), String> {
        let (start, len) = self.source()?.window(row, &self.name)?;
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
        let source = self.source()?;
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Int32Array, Int32Builder, ListBuilder};

    use super::*;
    use crate::exec::table_function::test_util::{drain, single_column_chunk};
    use crate::exec::table_function::{FunctionCursor, TableFunctionKind};

    fn list_chunk() -> Chunk {
        let mut builder = ListBuilder::new(Int32Builder::new());
        builder.values().append_value(1);
        builder.values().append_value(2);
        builder.values().append_value(3);
        builder.append(true);
        builder.append(false);
        builder.append(true);
        builder.values().append_null();
        builder.append(true);
        single_column_chunk(Arc::new(builder.finish()))
    }

    fn explode(outer: bool) -> Box<dyn TableFunction> {
        let mut arena = ExprArena::default();
        let slot = arena.slot(crate::common::ids::SlotId::new(1));
        let mut f = TableFunctionKind::Explode.instantiate(outer, vec![slot]);
        f.process_init(&arena, &list_chunk()).unwrap();
        f
    }

    fn ints(array: ArrayRef) -> Vec<Option<i32>> {
        array
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn emits_elements_in_steps() {
        let mut f = explode(false);
        f.process_row(0).unwrap();
        assert!(!f.current_empty());
        assert_eq!(
            ints(drain(f.as_mut(), DataType::Int32, 2)),
            vec![Some(1), Some(2), Some(3)]
        );
    }

    #[test]
    fn null_and_empty_lists_are_empty_rows() {
        let mut f = explode(false);
        f.process_row(1).unwrap();
        assert!(f.current_empty());
        f.process_row(2).unwrap();
        assert!(f.current_empty());
        f.process_row(3).unwrap();
        assert!(!f.current_empty());
        assert_eq!(ints(drain(f.as_mut(), DataType::Int32, 8)), vec![None]);
    }

    #[test]
    fn outer_empty_row_emits_single_null() {
        let mut f = explode(true);
        f.process_row(1).unwrap();
        assert_eq!(ints(drain(f.as_mut(), DataType::Int32, 8)), vec![None]);
    }

    #[test]
    fn same_many_values_repeats_current_element() {
        let mut f = explode(false);
        f.process_row(0).unwrap();
        f.forward(1);
        let mut column = ColumnBuffer::new(DataType::Int32);
        f.get_same_many_values(&mut column, 3).unwrap();
        assert_eq!(
            ints(column.finish().unwrap()),
            vec![Some(2), Some(2), Some(2)]
        );
        assert!(!f.eos());
    }

    #[test]
    fn rejects_non_list_argument() {
        let mut arena = ExprArena::default();
        let slot = arena.slot(crate::common::ids::SlotId::new(1));
        let mut f = TableFunctionKind::Explode.instantiate(false, vec![slot]);
        let chunk = single_column_chunk(Arc::new(Int32Array::from(vec![1])));
        let err = f.process_init(&arena, &chunk).unwrap_err();
        assert!(err.contains("expects ARRAY"), "err={err}");
    }

    #[test]
    fn use_before_init_is_an_error() {
        let mut f = TableFunctionKind::Explode.instantiate(false, vec![]);
        assert!(f.process_row(0).is_err());
    }
}
