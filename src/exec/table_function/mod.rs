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
//! Table-valued functions.
//!
//! Responsibilities:
//! - Defines the per-row iteration contract (`FunctionCursor`, `TableFunction`) consumed by the
//!   table-function operator.
//! - Resolves function names to concrete implementations and instantiates one fresh instance per
//!   driver.
//!
//! Key exported interfaces:
//! - Types: `FunctionCursor`, `TableFunction`, `TableFunctionKind`.
//!
//! Every function evaluates its arguments once per input chunk (`process_init`), is bound to one
//! row at a time (`process_row`), and hands out values through the shared `CursorState`.

mod explode;
mod explode_map;
mod explode_numbers;
mod explode_split;
mod generate_series;

use std::ops::RangeInclusive;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;

use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use crate::exec::operators::table_function::assembler::ColumnBuffer;

pub use explode::ExplodeFunction;
pub use explode_map::ExplodeMapFunction;
pub use explode_numbers::ExplodeNumbersFunction;
pub use explode_split::ExplodeSplitFunction;
pub use generate_series::GenerateSeriesFunction;

const OUTER_SUFFIX: &str = "_outer";

/// Position state of one function instance, as seen by the expansion cursor.
pub trait FunctionCursor {
    /// All values of the bound row have been handed out.
    fn eos(&self) -> bool;

    /// The bound row produced no values.
    fn current_empty(&self) -> bool;

    fn is_outer(&self) -> bool;

    /// Advance by `step` values; an empty row goes straight to eos.
    fn forward(&mut self, step: usize);

    /// Rewind to the first value of the bound row.
    fn reset(&mut self);
}

impl<T: ?Sized + FunctionCursor> FunctionCursor for Box<T> {
    fn eos(&self) -> bool {
        (**self).eos()
    }

    fn current_empty(&self) -> bool {
        (**self).current_empty()
    }

    fn is_outer(&self) -> bool {
        (**self).is_outer()
    }

    fn forward(&mut self, step: usize) {
        (**self).forward(step)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// A table-valued function instance owned by a single driver.
pub trait TableFunction: FunctionCursor + Send {
    fn name(&self) -> &str;

    /// Per-driver open hook, called once before the first chunk.
    fn open(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Evaluate the argument expressions over a whole input chunk.
    fn process_init(&mut self, arena: &ExprArena, chunk: &Chunk) -> Result<(), String>;

    /// Bind to `row` of the chunk passed to the last `process_init` and rewind.
    fn process_row(&mut self, row: usize) -> Result<(), String>;

    /// Append up to `max_count` consecutive values of the bound row, or a single NULL when the
    /// row is empty. Returns the number of rows appended and advances by that many.
    fn get_value(&mut self, column: &mut ColumnBuffer, max_count: usize) -> Result<usize, String>;

    /// Append the current value (NULL when the row is empty) `repeat` times without advancing.
    fn get_same_many_values(
        &mut self,
        column: &mut ColumnBuffer,
        repeat: usize,
    ) -> Result<(), String>;

    /// Drop everything derived from the current chunk.
    fn process_close(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableFunctionKind {
    Explode,
    ExplodeMap,
    ExplodeNumbers,
    ExplodeSplit,
    GenerateSeries,
}

impl TableFunctionKind {
    /// Resolve a function name, returning the kind and whether it is the `_outer` variant.
    pub fn from_name(name: &str) -> Result<(Self, bool), String> {
        let lowered = name.trim().to_ascii_lowercase();
        let (base, is_outer) = match lowered.strip_suffix(OUTER_SUFFIX) {
            Some(base) => (base, true),
            None => (lowered.as_str(), false),
        };
        let kind = match base {
            "explode" | "unnest" => Self::Explode,
            "explode_map" => Self::ExplodeMap,
            "explode_numbers" => Self::ExplodeNumbers,
            "explode_split" => Self::ExplodeSplit,
            "generate_series" => Self::GenerateSeries,
            _ => return Err(format!("unsupported table function: {name}")),
        };
        Ok((kind, is_outer))
    }

    pub fn base_name(&self) -> &'static str {
        match self {
            Self::Explode => "explode",
            Self::ExplodeMap => "explode_map",
            Self::ExplodeNumbers => "explode_numbers",
            Self::ExplodeSplit => "explode_split",
            Self::GenerateSeries => "generate_series",
        }
    }

    /// Accepted argument counts.
    pub fn arity(&self) -> RangeInclusive<usize> {
        match self {
            Self::Explode | Self::ExplodeMap | Self::ExplodeNumbers => 1..=1,
            Self::ExplodeSplit => 2..=2,
            Self::GenerateSeries => 2..=3,
        }
    }

    pub fn instantiate(&self, is_outer: bool, args: Vec<ExprId>) -> Box<dyn TableFunction> {
        let name = if is_outer {
            format!("{}{}", self.base_name(), OUTER_SUFFIX)
        } else {
            self.base_name().to_string()
        };
        let state = CursorState::new(is_outer);
        match self {
            Self::Explode => Box::new(ExplodeFunction::new(name, state, args)),
            Self::ExplodeMap => Box::new(ExplodeMapFunction::new(name, state, args)),
            Self::ExplodeNumbers => Box::new(ExplodeNumbersFunction::new(name, state, args)),
            Self::ExplodeSplit => Box::new(ExplodeSplitFunction::new(name, state, args)),
            Self::GenerateSeries => Box::new(GenerateSeriesFunction::new(name, state, args)),
        }
    }
}

/// Cursor bookkeeping shared by every function: size of the bound row and position in it.
#[derive(Clone, Debug, Default)]
pub(crate) struct CursorState {
    is_outer: bool,
    cur_size: usize,
    offset: usize,
    eos: bool,
    current_empty: bool,
}

impl CursorState {
    pub(crate) fn new(is_outer: bool) -> Self {
        Self {
            is_outer,
            ..Self::default()
        }
    }

    pub(crate) fn bind(&mut self, size: usize) {
        self.cur_size = size;
        self.current_empty = size == 0;
        self.reset();
    }

    pub(crate) fn close(&mut self) {
        self.cur_size = 0;
        self.current_empty = false;
        self.reset();
    }

    pub(crate) fn eos(&self) -> bool {
        self.eos
    }

    pub(crate) fn current_empty(&self) -> bool {
        self.current_empty
    }

    pub(crate) fn is_outer(&self) -> bool {
        self.is_outer
    }

    #[cfg(test)]
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn forward(&mut self, step: usize) {
        if self.current_empty {
            self.eos = true;
            return;
        }
        self.offset += step;
        if self.offset >= self.cur_size {
            self.eos = true;
        }
    }

    pub(crate) fn reset(&mut self) {
        self.eos = false;
        self.offset = 0;
    }

    /// Shared `get_value` body. `values(offset, len)` materializes `len` values of the bound
    /// row starting at `offset`.
    pub(crate) fn emit<F>(
        &mut self,
        column: &mut ColumnBuffer,
        max_count: usize,
        values: F,
    ) -> Result<usize, String>
    where
        F: FnOnce(usize, usize) -> Result<ArrayRef, String>,
    {
        if self.current_empty {
            column.append_nulls(1)?;
            self.forward(1);
            return Ok(1);
        }
        let count = max_count.min(self.cur_size.saturating_sub(self.offset));
        if count > 0 {
            column.append_array(values(self.offset, count)?)?;
        }
        self.forward(count);
        Ok(count)
    }

    /// Shared `get_same_many_values` body. `value(offset)` materializes the value at `offset`.
    pub(crate) fn emit_repeated<F>(
        &self,
        column: &mut ColumnBuffer,
        repeat: usize,
        value: F,
    ) -> Result<(), String>
    where
        F: FnOnce(usize) -> Result<ArrayRef, String>,
    {
        if repeat == 0 {
            return Ok(());
        }
        if self.current_empty {
            return column.append_nulls(repeat);
        }
        let one = value(self.offset)?;
        column.append_repeated(&one, 0, repeat)
    }
}

macro_rules! delegate_cursor {
    ($ty:ty) => {
        impl $crate::exec::table_function::FunctionCursor for $ty {
            fn eos(&self) -> bool {
                self.state.eos()
            }

            fn current_empty(&self) -> bool {
                self.state.current_empty()
            }

            fn is_outer(&self) -> bool {
                self.state.is_outer()
            }

            fn forward(&mut self, step: usize) {
                self.state.forward(step)
            }

            fn reset(&mut self) {
                self.state.reset()
            }
        }
    };
}
pub(crate) use delegate_cursor;

fn arg(args: &[ExprId], idx: usize, fn_name: &str) -> Result<ExprId, String> {
    args.get(idx)
        .copied()
        .ok_or_else(|| format!("table function {fn_name} missing argument {idx}"))
}

fn is_integer_type(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Evaluate an integer argument and widen it to BIGINT.
pub(crate) fn eval_int64_arg(
    arena: &ExprArena,
    args: &[ExprId],
    idx: usize,
    chunk: &Chunk,
    fn_name: &str,
) -> Result<Int64Array, String> {
    let value = arena.eval(arg(args, idx, fn_name)?, chunk)?;
    if !matches!(value.data_type(), DataType::Null) && !is_integer_type(value.data_type()) {
        return Err(format!(
            "table function {fn_name} argument {idx} expects an integer, got {:?}",
            value.data_type()
        ));
    }
    let widened = cast(&value, &DataType::Int64).map_err(|e| {
        format!("table function {fn_name} argument {idx} cast to BIGINT failed: {e}")
    })?;
    widened
        .as_any()
        .downcast_ref::<Int64Array>()
        .cloned()
        .ok_or_else(|| format!("table function {fn_name} argument {idx} is not BIGINT"))
}

/// Evaluate a string argument as Utf8.
pub(crate) fn eval_utf8_arg(
    arena: &ExprArena,
    args: &[ExprId],
    idx: usize,
    chunk: &Chunk,
    fn_name: &str,
) -> Result<StringArray, String> {
    let value = arena.eval(arg(args, idx, fn_name)?, chunk)?;
    if !matches!(
        value.data_type(),
        DataType::Null | DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    ) {
        return Err(format!(
            "table function {fn_name} argument {idx} expects a string, got {:?}",
            value.data_type()
        ));
    }
    let utf8 = cast(&value, &DataType::Utf8).map_err(|e| {
        format!("table function {fn_name} argument {idx} cast to VARCHAR failed: {e}")
    })?;
    utf8.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| format!("table function {fn_name} argument {idx} is not VARCHAR"))
}

/// Evaluate a single argument without type coercion.
pub(crate) fn eval_raw_arg(
    arena: &ExprArena,
    args: &[ExprId],
    idx: usize,
    chunk: &Chunk,
    fn_name: &str,
) -> Result<ArrayRef, String> {
    arena.eval(arg(args, idx, fn_name)?, chunk)
}

pub(crate) fn not_initialized(fn_name: &str) -> String {
    format!("table function {fn_name} used before process_init")
}
