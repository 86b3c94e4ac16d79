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
//! Output assembly for the table-function operator.
//!
//! Responsibilities:
//! - Accumulates appended values per output column without materializing until the block is
//!   complete (`ColumnBuffer`).
//! - Holds one buffer per output slot and turns them into a `Chunk` (`OutputBlock`).
//! - Pads unreferenced pass-through columns and applies post-expansion conjuncts in place.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, UInt32Array, make_array, new_empty_array, new_null_array};
use arrow::compute::{cast, concat, take};
use arrow::datatypes::{DataType, SchemaRef};

use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId, filter_chunk};

/// Append-only column builder backed by arrow array segments.
#[derive(Clone, Debug)]
pub struct ColumnBuffer {
    data_type: DataType,
    nullable: bool,
    segments: Vec<ArrayRef>,
    len: usize,
}

impl ColumnBuffer {
    pub fn new(data_type: DataType) -> Self {
        Self::with_nullability(data_type, true)
    }

    /// A non-nullable buffer stores type defaults (zero, empty string, empty list) where NULLs
    /// are appended.
    pub fn with_nullability(data_type: DataType, nullable: bool) -> Self {
        Self {
            data_type,
            nullable,
            segments: Vec::new(),
            len: 0,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a whole array, casting it to the column type when they differ.
    pub fn append_array(&mut self, array: ArrayRef) -> Result<(), String> {
        if array.is_empty() {
            return Ok(());
        }
        let array = if array.data_type() == &self.data_type {
            array
        } else if matches!(array.data_type(), DataType::Null) {
            self.null_values(array.len())?
        } else {
            cast(&array, &self.data_type).map_err(|e| {
                format!(
                    "type mismatch appending {:?} into {:?} column: {}",
                    array.data_type(),
                    self.data_type,
                    e
                )
            })?
        };
        self.len += array.len();
        self.segments.push(array);
        Ok(())
    }

    pub fn append_slice(&mut self, src: &ArrayRef, offset: usize, len: usize) -> Result<(), String> {
        if offset + len > src.len() {
            return Err(format!(
                "slice [{offset}, {}) out of range for column of {} rows",
                offset + len,
                src.len()
            ));
        }
        self.append_array(src.slice(offset, len))
    }

    /// Append `src[row]` `times` times.
    pub fn append_repeated(&mut self, src: &ArrayRef, row: usize, times: usize) -> Result<(), String> {
        if times == 0 {
            return Ok(());
        }
        if row >= src.len() {
            return Err(format!(
                "row {row} out of range for column of {} rows",
                src.len()
            ));
        }
        let row = u32::try_from(row).map_err(|_| format!("row index overflow: {row}"))?;
        let indices = UInt32Array::from(vec![row; times]);
        let repeated = take(src.as_ref(), &indices, None).map_err(|e| e.to_string())?;
        self.append_array(repeated)
    }

    pub fn append_nulls(&mut self, n: usize) -> Result<(), String> {
        if n == 0 {
            return Ok(());
        }
        let values = self.null_values(n)?;
        self.segments.push(values);
        self.len += n;
        Ok(())
    }

    fn null_values(&self, n: usize) -> Result<ArrayRef, String> {
        if self.nullable {
            Ok(new_null_array(&self.data_type, n))
        } else {
            default_values(&self.data_type, n)
        }
    }

    /// Replace the contents with `array`.
    pub fn replace(&mut self, array: ArrayRef) -> Result<(), String> {
        self.segments.clear();
        self.len = 0;
        self.append_array(array)
    }

    /// Concatenate all segments into one array. The buffer keeps its contents.
    pub fn finish(&self) -> Result<ArrayRef, String> {
        match self.segments.as_slice() {
            [] => Ok(new_empty_array(&self.data_type)),
            [single] => Ok(Arc::clone(single)),
            segments => {
                let refs: Vec<&dyn Array> = segments.iter().map(|a| a.as_ref()).collect();
                concat(&refs).map_err(|e| format!("concat output column failed: {e}"))
            }
        }
    }
}

/// `len` default values of `data_type`: a null array with its validity buffer dropped. Its
/// zeroed buffers read as 0, empty strings and empty lists.
fn default_values(data_type: &DataType, len: usize) -> Result<ArrayRef, String> {
    let data = new_null_array(data_type, len)
        .to_data()
        .into_builder()
        .nulls(None)
        .build()
        .map_err(|e| format!("cannot build default values for {data_type:?}: {e}"))?;
    Ok(make_array(data))
}

/// Fixed-capacity output batch laid out as pass-through columns followed by one column per
/// table function, in output schema order.
#[derive(Clone, Debug)]
pub struct OutputBlock {
    capacity: usize,
    schema: SchemaRef,
    columns: Vec<ColumnBuffer>,
}

impl OutputBlock {
    pub fn new(schema: SchemaRef, capacity: usize) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|f| ColumnBuffer::with_nullability(f.data_type().clone(), f.is_nullable()))
            .collect();
        Self {
            capacity,
            schema,
            columns,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Row count, taken from the last column.
    pub fn num_rows(&self) -> usize {
        self.columns.last().map(ColumnBuffer::len).unwrap_or(0)
    }

    pub fn column_len(&self, idx: usize) -> usize {
        self.columns.get(idx).map(ColumnBuffer::len).unwrap_or(0)
    }

    pub fn column_mut(&mut self, idx: usize) -> Result<&mut ColumnBuffer, String> {
        let num_columns = self.columns.len();
        self.columns
            .get_mut(idx)
            .ok_or_else(|| format!("output column {idx} out of range (columns={num_columns})"))
    }

    /// Pad column `idx` with NULLs (type defaults when not nullable) up to `rows`.
    pub fn pad_nulls(&mut self, idx: usize, rows: usize) -> Result<(), String> {
        let column = self.column_mut(idx)?;
        let current = column.len();
        if current > rows {
            return Err(format!(
                "output column {idx} has {current} rows, more than the block's {rows}"
            ));
        }
        column.append_nulls(rows - current)
    }

    pub fn to_chunk(&self) -> Result<Chunk, String> {
        let rows = self.num_rows();
        let mut arrays = Vec::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            if column.len() != rows {
                return Err(format!(
                    "output column {idx} has {} rows, expected {rows}",
                    column.len()
                ));
            }
            arrays.push(column.finish()?);
        }
        Chunk::try_from_columns(Arc::clone(&self.schema), arrays)
    }

    pub fn into_chunk(self) -> Result<Chunk, String> {
        self.to_chunk()
    }

    /// Drop rows failing any of `conjuncts`.
    pub fn filter(&mut self, arena: &ExprArena, conjuncts: &[ExprId]) -> Result<(), String> {
        if conjuncts.is_empty() || self.num_rows() == 0 {
            return Ok(());
        }
        let chunk = self.to_chunk()?;
        let filtered = filter_chunk(arena, conjuncts, &chunk)?;
        if filtered.len() == chunk.len() {
            return Ok(());
        }
        for (column, array) in self.columns.iter_mut().zip(filtered.columns()) {
            column.replace(Arc::clone(array))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::SlotId;
    use crate::exec::chunk::field_with_slot_id;
    use crate::exec::expr::{ExprNode, LiteralValue};
    use arrow::array::{Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            field_with_slot_id(Field::new("k", DataType::Utf8, true), SlotId::new(1)),
            field_with_slot_id(Field::new("v", DataType::Int64, true), SlotId::new(2)),
        ]))
    }

    fn i64s(array: &ArrayRef) -> Vec<Option<i64>> {
        array
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn column_buffer_segments_concat() {
        let mut column = ColumnBuffer::new(DataType::Int64);
        let src: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
        column.append_slice(&src, 1, 2).unwrap();
        column.append_nulls(1).unwrap();
        column.append_repeated(&src, 0, 2).unwrap();
        assert_eq!(column.len(), 5);
        let out = column.finish().unwrap();
        assert_eq!(i64s(&out), vec![Some(2), Some(3), None, Some(1), Some(1)]);
    }

    #[test]
    fn column_buffer_casts_narrower_input() {
        let mut column = ColumnBuffer::new(DataType::Int64);
        column
            .append_array(Arc::new(Int32Array::from(vec![7])))
            .unwrap();
        assert_eq!(i64s(&column.finish().unwrap()), vec![Some(7)]);
    }

    #[test]
    fn column_buffer_rejects_out_of_range_row() {
        let mut column = ColumnBuffer::new(DataType::Int64);
        let src: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        assert!(column.append_repeated(&src, 1, 3).is_err());
        assert!(column.append_slice(&src, 0, 2).is_err());
    }

    #[test]
    fn empty_buffer_finishes_to_empty_array() {
        let column = ColumnBuffer::new(DataType::Utf8);
        let out = column.finish().unwrap();
        assert_eq!(out.len(), 0);
        assert_eq!(out.data_type(), &DataType::Utf8);
    }

    #[test]
    fn block_pads_and_builds_chunk() {
        let mut block = OutputBlock::new(schema(), 8);
        block
            .column_mut(1)
            .unwrap()
            .append_array(Arc::new(Int64Array::from(vec![1, 2])))
            .unwrap();
        assert_eq!(block.num_rows(), 2);
        assert!(block.to_chunk().is_err());
        block.pad_nulls(0, 2).unwrap();
        let chunk = block.into_chunk().unwrap();
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.columns()[0].null_count(), 2);
    }

    #[test]
    fn non_nullable_columns_pad_type_defaults() {
        let schema = Arc::new(Schema::new(vec![
            field_with_slot_id(Field::new("k", DataType::Utf8, false), SlotId::new(1)),
            field_with_slot_id(Field::new("v", DataType::Int64, false), SlotId::new(2)),
        ]));
        let mut block = OutputBlock::new(schema, 4);
        block.column_mut(1).unwrap().append_nulls(2).unwrap();
        block.pad_nulls(0, 2).unwrap();
        let chunk = block.into_chunk().unwrap();
        assert_eq!(i64s(&chunk.columns()[1]), vec![Some(0), Some(0)]);
        let keys = chunk.columns()[0]
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(keys.null_count(), 0);
        assert_eq!(keys.value(0), "");
        assert_eq!(keys.value(1), "");
    }

    #[test]
    fn block_filter_keeps_matching_rows() {
        let mut block = OutputBlock::new(schema(), 8);
        block
            .column_mut(0)
            .unwrap()
            .append_array(Arc::new(StringArray::from(vec!["a", "b", "c"])))
            .unwrap();
        block
            .column_mut(1)
            .unwrap()
            .append_array(Arc::new(Int64Array::from(vec![Some(1), None, Some(3)])))
            .unwrap();
        let mut arena = ExprArena::default();
        let v = arena.slot(SlotId::new(2));
        let one = arena.literal(LiteralValue::Int64(1));
        let gt = arena.push(ExprNode::Gt(v, one));
        block.filter(&arena, &[gt]).unwrap();
        assert_eq!(block.num_rows(), 1);
        let chunk = block.to_chunk().unwrap();
        assert_eq!(i64s(&chunk.columns()[1]), vec![Some(3)]);
    }
}
