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
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use arrow::array::{Array, ArrayRef, BooleanArray, Datum, new_null_array};
use arrow::compute::kernels::boolean::{and_kleene, not, or_kleene};
use arrow::compute::kernels::cmp::{eq, gt, gt_eq, lt, lt_eq, neq};
use arrow::compute::{cast, is_not_null, is_null};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use std::sync::Arc;

type CmpKernel = fn(&dyn Datum, &dyn Datum) -> Result<BooleanArray, ArrowError>;

fn is_integer(dt: &DataType) -> bool {
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

fn is_numeric(dt: &DataType) -> bool {
    is_integer(dt) || matches!(dt, DataType::Float32 | DataType::Float64)
}

fn cast_to(array: ArrayRef, target: &DataType) -> Result<ArrayRef, String> {
    if array.data_type() == target {
        return Ok(array);
    }
    cast(&array, target).map_err(|e| {
        format!(
            "comparison cast from {:?} to {:?} failed: {}",
            array.data_type(),
            target,
            e
        )
    })
}

/// Bring both sides to a common type. Returns `None` when either side is untyped NULL,
/// in which case every comparison result is NULL.
fn normalize_comparison_types(
    left: ArrayRef,
    right: ArrayRef,
) -> Result<Option<(ArrayRef, ArrayRef)>, String> {
    let (lt_, rt_) = (left.data_type().clone(), right.data_type().clone());
    if matches!(lt_, DataType::Null) || matches!(rt_, DataType::Null) {
        return Ok(None);
    }
    if lt_ == rt_ {
        return Ok(Some((left, right)));
    }
    if is_integer(&lt_) && is_integer(&rt_) {
        return Ok(Some((
            cast_to(left, &DataType::Int64)?,
            cast_to(right, &DataType::Int64)?,
        )));
    }
    if is_numeric(&lt_) && is_numeric(&rt_) {
        return Ok(Some((
            cast_to(left, &DataType::Float64)?,
            cast_to(right, &DataType::Float64)?,
        )));
    }
    let right = cast_to(right, &lt_)
        .map_err(|_| format!("Cannot compare incompatible types: {:?} vs {:?}", lt_, rt_))?;
    Ok(Some((left, right)))
}

fn eval_compare(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
    kernel: CmpKernel,
) -> Result<ArrayRef, String> {
    let l = arena.eval(left, chunk)?;
    let r = arena.eval(right, chunk)?;
    let Some((l_norm, r_norm)) = normalize_comparison_types(l, r)? else {
        return Ok(new_null_array(&DataType::Boolean, chunk.len()));
    };
    let result = kernel(&l_norm, &r_norm).map_err(|e| e.to_string())?;
    Ok(Arc::new(result))
}

pub fn eval_eq(arena: &ExprArena, a: ExprId, b: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    eval_compare(arena, a, b, chunk, eq)
}

pub fn eval_ne(arena: &ExprArena, a: ExprId, b: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    eval_compare(arena, a, b, chunk, neq)
}

pub fn eval_lt(arena: &ExprArena, a: ExprId, b: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    eval_compare(arena, a, b, chunk, lt)
}

pub fn eval_le(arena: &ExprArena, a: ExprId, b: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    eval_compare(arena, a, b, chunk, lt_eq)
}

pub fn eval_gt(arena: &ExprArena, a: ExprId, b: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    eval_compare(arena, a, b, chunk, gt)
}

pub fn eval_ge(arena: &ExprArena, a: ExprId, b: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    eval_compare(arena, a, b, chunk, gt_eq)
}

/// Evaluate a boolean operand; untyped NULL becomes an all-NULL boolean column.
fn eval_boolean(
    arena: &ExprArena,
    id: ExprId,
    chunk: &Chunk,
    op: &str,
) -> Result<BooleanArray, String> {
    let value = arena.eval(id, chunk)?;
    if matches!(value.data_type(), DataType::Null) {
        return Ok(BooleanArray::new_null(value.len()));
    }
    value
        .as_any()
        .downcast_ref::<BooleanArray>()
        .cloned()
        .ok_or_else(|| format!("{op} operand must be boolean, got {:?}", value.data_type()))
}

// AND/OR follow SQL three-valued logic: FALSE AND NULL = FALSE, TRUE OR NULL = TRUE.
pub fn eval_and(arena: &ExprArena, a: ExprId, b: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    let l = eval_boolean(arena, a, chunk, "AND")?;
    let r = eval_boolean(arena, b, chunk, "AND")?;
    let out = and_kleene(&l, &r).map_err(|e| e.to_string())?;
    Ok(Arc::new(out))
}

pub fn eval_or(arena: &ExprArena, a: ExprId, b: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    let l = eval_boolean(arena, a, chunk, "OR")?;
    let r = eval_boolean(arena, b, chunk, "OR")?;
    let out = or_kleene(&l, &r).map_err(|e| e.to_string())?;
    Ok(Arc::new(out))
}

pub fn eval_not(arena: &ExprArena, child: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    let v = eval_boolean(arena, child, chunk, "NOT")?;
    let out = not(&v).map_err(|e| e.to_string())?;
    Ok(Arc::new(out))
}

pub fn eval_is_null(
    arena: &ExprArena,
    child: ExprId,
    chunk: &Chunk,
    negate: bool,
) -> Result<ArrayRef, String> {
    let v = arena.eval(child, chunk)?;
    let out = if negate {
        is_not_null(v.as_ref())
    } else {
        is_null(v.as_ref())
    }
    .map_err(|e| e.to_string())?;
    Ok(Arc::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::SlotId;
    use crate::exec::chunk::field_with_slot_id;
    use crate::exec::expr::{ExprNode, LiteralValue};
    use arrow::array::{Int32Array, Int64Array};
    use arrow::datatypes::{Field, Schema};

    fn chunk() -> Chunk {
        let schema = Arc::new(Schema::new(vec![
            field_with_slot_id(Field::new("a", DataType::Int32, true), SlotId(1)),
            field_with_slot_id(Field::new("b", DataType::Int64, true), SlotId(2)),
        ]));
        Chunk::try_from_columns(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![Some(1), Some(5), None])),
                Arc::new(Int64Array::from(vec![Some(1), Some(2), Some(3)])),
            ],
        )
        .unwrap()
    }

    fn bools(arr: ArrayRef) -> Vec<Option<bool>> {
        arr.as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn mixed_integer_widths_compare() {
        let mut arena = ExprArena::default();
        let a = arena.slot(SlotId(1));
        let b = arena.slot(SlotId(2));
        let gt_expr = arena.push(ExprNode::Gt(a, b));
        assert_eq!(
            bools(arena.eval(gt_expr, &chunk()).unwrap()),
            vec![Some(false), Some(true), None]
        );
    }

    #[test]
    fn null_literal_comparison_is_null() {
        let mut arena = ExprArena::default();
        let a = arena.slot(SlotId(1));
        let null = arena.literal(LiteralValue::Null);
        let e = arena.push(ExprNode::Eq(a, null));
        assert_eq!(bools(arena.eval(e, &chunk()).unwrap()), vec![None, None, None]);
    }

    #[test]
    fn and_or_use_three_valued_logic() {
        let mut arena = ExprArena::default();
        let a = arena.slot(SlotId(1));
        let one = arena.literal(LiteralValue::Int32(1));
        let a_eq_1 = arena.push(ExprNode::Eq(a, one));
        let f = arena.literal(LiteralValue::Bool(false));
        let t = arena.literal(LiteralValue::Bool(true));
        let and_false = arena.push(ExprNode::And(a_eq_1, f));
        let or_true = arena.push(ExprNode::Or(a_eq_1, t));
        let not_expr = arena.push(ExprNode::Not(a_eq_1));
        let c = chunk();
        assert_eq!(
            bools(arena.eval(and_false, &c).unwrap()),
            vec![Some(false), Some(false), Some(false)]
        );
        assert_eq!(
            bools(arena.eval(or_true, &c).unwrap()),
            vec![Some(true), Some(true), Some(true)]
        );
        assert_eq!(
            bools(arena.eval(not_expr, &c).unwrap()),
            vec![Some(false), Some(true), None]
        );
    }

    #[test]
    fn is_null_and_is_not_null() {
        let mut arena = ExprArena::default();
        let a = arena.slot(SlotId(1));
        let is_null_expr = arena.push(ExprNode::IsNull(a));
        let not_null_expr = arena.push(ExprNode::IsNotNull(a));
        let c = chunk();
        assert_eq!(
            bools(arena.eval(is_null_expr, &c).unwrap()),
            vec![Some(false), Some(false), Some(true)]
        );
        assert_eq!(
            bools(arena.eval(not_null_expr, &c).unwrap()),
            vec![Some(true), Some(true), Some(false)]
        );
    }
}
