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
//! Vectorized expression arena.
//!
//! Expressions are stored as a flat arena of nodes addressed by `ExprId` and evaluated over a
//! whole chunk at a time. Only the node kinds needed to feed table-function arguments and
//! post-expansion conjuncts are supported.

mod comparison;
pub mod conjunct;
mod literal;

use crate::common::ids::SlotId;
use crate::exec::chunk::Chunk;
use arrow::array::{ArrayRef, new_null_array};
use arrow::compute::cast;
use arrow::datatypes::DataType;

pub use conjunct::filter_chunk;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ExprId(pub usize);

#[derive(Clone, Debug)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

#[derive(Clone, Debug)]
pub enum ExprNode {
    Literal(LiteralValue),
    SlotId(SlotId),
    /// Cast the child to the type recorded for this node.
    Cast(ExprId),
    Eq(ExprId, ExprId),
    Ne(ExprId, ExprId),
    Lt(ExprId, ExprId),
    Le(ExprId, ExprId),
    Gt(ExprId, ExprId),
    Ge(ExprId, ExprId),
    And(ExprId, ExprId),
    Or(ExprId, ExprId),
    Not(ExprId),
    IsNull(ExprId),
    IsNotNull(ExprId),
}

#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    nodes: Vec<ExprNode>,
    types: Vec<DataType>,
}

impl ExprArena {
    pub fn push(&mut self, node: ExprNode) -> ExprId {
        self.push_typed(node, DataType::Null)
    }

    pub fn push_typed(&mut self, node: ExprNode, data_type: DataType) -> ExprId {
        let id = ExprId(self.nodes.len());
        self.nodes.push(node);
        self.types.push(data_type);
        id
    }

    pub fn slot(&mut self, slot_id: SlotId) -> ExprId {
        self.push(ExprNode::SlotId(slot_id))
    }

    pub fn literal(&mut self, value: LiteralValue) -> ExprId {
        self.push(ExprNode::Literal(value))
    }

    pub fn node(&self, id: ExprId) -> Option<&ExprNode> {
        self.nodes.get(id.0)
    }

    pub fn data_type(&self, id: ExprId) -> Option<&DataType> {
        self.types.get(id.0)
    }

    pub fn contains(&self, id: ExprId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn eval(&self, id: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
        let node = self
            .nodes
            .get(id.0)
            .ok_or_else(|| format!("invalid ExprId {}", id.0))?;
        match node {
            ExprNode::Literal(v) => {
                let target_type = self.data_type(id).cloned().unwrap_or(DataType::Null);
                if matches!(v, LiteralValue::Null) && !matches!(target_type, DataType::Null) {
                    // Keep the declared type so typed NULLs line up with sibling columns.
                    return Ok(new_null_array(&target_type, chunk.len()));
                }
                literal::eval(v, chunk.len())
            }
            ExprNode::SlotId(slot_id) => chunk.column_by_slot_id(*slot_id),
            ExprNode::Cast(child) => {
                let value = self.eval(*child, chunk)?;
                let target_type = self
                    .data_type(id)
                    .ok_or_else(|| format!("cast expr {} has no target type", id.0))?;
                if value.data_type() == target_type {
                    return Ok(value);
                }
                cast(&value, target_type).map_err(|e| {
                    format!(
                        "cast from {:?} to {:?} failed: {}",
                        value.data_type(),
                        target_type,
                        e
                    )
                })
            }
            ExprNode::Eq(a, b) => comparison::eval_eq(self, *a, *b, chunk),
            ExprNode::Ne(a, b) => comparison::eval_ne(self, *a, *b, chunk),
            ExprNode::Lt(a, b) => comparison::eval_lt(self, *a, *b, chunk),
            ExprNode::Le(a, b) => comparison::eval_le(self, *a, *b, chunk),
            ExprNode::Gt(a, b) => comparison::eval_gt(self, *a, *b, chunk),
            ExprNode::Ge(a, b) => comparison::eval_ge(self, *a, *b, chunk),
            ExprNode::And(a, b) => comparison::eval_and(self, *a, *b, chunk),
            ExprNode::Or(a, b) => comparison::eval_or(self, *a, *b, chunk),
            ExprNode::Not(child) => comparison::eval_not(self, *child, chunk),
            ExprNode::IsNull(child) => comparison::eval_is_null(self, *child, chunk, false),
            ExprNode::IsNotNull(child) => comparison::eval_is_null(self, *child, chunk, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::chunk::field_with_slot_id;
    use arrow::array::{Array, Int32Array, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn int_chunk(values: Vec<Option<i32>>) -> Chunk {
        let field = field_with_slot_id(Field::new("x", DataType::Int32, true), SlotId(1));
        let schema = Arc::new(Schema::new(vec![field]));
        Chunk::try_from_columns(schema, vec![Arc::new(Int32Array::from(values))]).unwrap()
    }

    #[test]
    fn typed_null_literal_uses_declared_type() {
        let mut arena = ExprArena::default();
        let expr = arena.push_typed(ExprNode::Literal(LiteralValue::Null), DataType::Utf8);
        let arr = arena.eval(expr, &int_chunk(vec![Some(1), Some(2), Some(3)])).unwrap();
        assert_eq!(arr.data_type(), &DataType::Utf8);
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.null_count(), 3);
    }

    #[test]
    fn cast_widens_slot() {
        let mut arena = ExprArena::default();
        let slot = arena.slot(SlotId(1));
        let expr = arena.push_typed(ExprNode::Cast(slot), DataType::Int64);
        let arr = arena.eval(expr, &int_chunk(vec![Some(5), None])).unwrap();
        let arr = arr.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(arr.value(0), 5);
        assert!(arr.is_null(1));
    }

    #[test]
    fn invalid_expr_id_is_an_error() {
        let arena = ExprArena::default();
        assert!(!arena.contains(ExprId(0)));
        let err = arena.eval(ExprId(0), &int_chunk(vec![])).unwrap_err();
        assert!(err.contains("invalid ExprId"), "err={err}");
    }
}
