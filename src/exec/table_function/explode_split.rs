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

use arrow::array::{Array, ArrayRef, StringArray};

use super::{CursorState, TableFunction, delegate_cursor, eval_utf8_arg, not_initialized};
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use crate::exec::operators::table_function::assembler::ColumnBuffer;

/// `explode_split(str, delimiter)`: one VARCHAR row per substring.
///
/// An empty delimiter yields the whole input string. NULL input or delimiter makes the row empty.
pub struct ExplodeSplitFunction {
    name: String,
    state: CursorState,
    args: Vec<ExprId>,
    inputs: Option<(StringArray, StringArray)>,
    parts: ArrayRef,
}

impl ExplodeSplitFunction {
    pub(crate) fn new(name: String, state: CursorState, args: Vec<ExprId>) -> Self {
        Self {
            name,
            state,
            args,
            inputs: None,
            parts: Arc::new(StringArray::from(Vec::<&str>::new())),
        }
    }
}

fn split_row(input: &str, delimiter: &str) -> StringArray {
    if delimiter.is_empty() {
        return StringArray::from(vec![input]);
    }
    StringArray::from(input.split(delimiter).collect::<Vec<_>>())
}

delegate_cursor!(ExplodeSplitFunction);

impl TableFunction for ExplodeSplitFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_init(&mut self, arena: &ExprArena, chunk: &Chunk) -> Result<(), String> {
        let input = eval_utf8_arg(arena, &self.args, 0, chunk, &self.name)?;
        let delimiter = eval_utf8_arg(arena, &self.args, 1, chunk, &self.name)?;
        self.inputs = Some((input, delimiter));
        Ok(())
    }

    fn process_row(&mut self, row: usize) -> Result<(), String> {
        let (input, delimiter) = self.inputs.as_ref().ok_or_else(|| not_initialized(&self.name))?;
        if row >= input.len() {
            return Err(format!("table function {} row {row} out of range", self.name));
        }
        let parts = if input.is_null(row) || delimiter.is_null(row) {
            StringArray::from(Vec::<&str>::new())
        } else {
            split_row(input.value(row), delimiter.value(row))
        };
        self.state.bind(parts.len());
        self.parts = Arc::new(parts);
        Ok(())
    }

    fn get_value(&mut self, column: &mut ColumnBuffer, max_count: usize) -> Result<usize, String> {
        let parts = &self.parts;
        self.state
            .emit(column, max_count, |offset, len| Ok(parts.slice(offset, len)))
    }

    fn get_same_many_values(
        &mut self,
        column: &mut ColumnBuffer,
        repeat: usize,
    ) -> Result<(), String> {
        let parts = &self.parts;
        self.state
            .emit_repeated(column, repeat, |offset| Ok(parts.slice(offset, 1)))
    }

    fn process_close(&mut self) {
        self.inputs = None;
        self.parts = Arc::new(StringArray::from(Vec::<&str>::new()));
        self.state.close();
    }
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::common::ids::SlotId;
    use crate::exec::chunk::field_with_slot_id;
    use crate::exec::table_function::test_util::drain;
    use crate::exec::table_function::{FunctionCursor, TableFunctionKind};

    fn split(input: Vec<Option<&str>>, delimiter: &str) -> Box<dyn TableFunction> {
        let schema = Arc::new(Schema::new(vec![field_with_slot_id(
            Field::new("s", DataType::Utf8, true),
            SlotId::new(1),
        )]));
        let chunk = Chunk::try_from_columns(schema, vec![Arc::new(StringArray::from(input))])
            .unwrap();
        let mut arena = ExprArena::default();
        let s = arena.slot(SlotId::new(1));
        let d = arena.literal(crate::exec::expr::LiteralValue::Utf8(delimiter.to_string()));
        let mut f = TableFunctionKind::ExplodeSplit.instantiate(false, vec![s, d]);
        f.process_init(&arena, &chunk).unwrap();
        f
    }

    fn strings(array: ArrayRef) -> Vec<String> {
        let array = array.as_any().downcast_ref::<StringArray>().unwrap();
        array.iter().map(|v| v.unwrap_or("<null>").to_string()).collect()
    }

    #[test]
    fn splits_on_delimiter() {
        let mut f = split(vec![Some("a,b,,c")], ",");
        f.process_row(0).unwrap();
        assert_eq!(
            strings(drain(f.as_mut(), DataType::Utf8, 3)),
            vec!["a", "b", "", "c"]
        );
    }

    #[test]
    fn multi_char_delimiter_binds_each_row() {
        let mut f = split(vec![Some("a::b"), Some("x"), Some("::")], "::");
        f.process_row(0).unwrap();
        assert_eq!(strings(drain(f.as_mut(), DataType::Utf8, 1)), vec!["a", "b"]);
        f.process_row(1).unwrap();
        assert_eq!(strings(drain(f.as_mut(), DataType::Utf8, 4)), vec!["x"]);
        f.process_row(2).unwrap();
        assert_eq!(strings(drain(f.as_mut(), DataType::Utf8, 4)), vec!["", ""]);
    }

    #[test]
    fn empty_delimiter_keeps_whole_string() {
        let mut f = split(vec![Some("abc")], "");
        f.process_row(0).unwrap();
        assert_eq!(strings(drain(f.as_mut(), DataType::Utf8, 8)), vec!["abc"]);
    }

    #[test]
    fn null_input_is_empty() {
        let mut f = split(vec![None, Some("x")], ",");
        f.process_row(0).unwrap();
        assert!(f.current_empty());
        f.process_row(1).unwrap();
        assert!(!f.current_empty());
    }
}
