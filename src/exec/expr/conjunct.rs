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
use arrow::array::{Array, BooleanArray};
use arrow::compute::filter_record_batch;
use arrow::compute::kernels::boolean::and_kleene;
use arrow::datatypes::DataType;

/// Keep the rows of `chunk` for which every conjunct evaluates to TRUE.
///
/// NULL predicate results drop the row. An empty conjunct list returns the chunk unchanged.
pub fn filter_chunk(
    arena: &ExprArena,
    conjuncts: &[ExprId],
    chunk: &Chunk,
) -> Result<Chunk, String> {
    if conjuncts.is_empty() || chunk.is_empty() {
        return Ok(chunk.clone());
    }

    let mut mask: Option<BooleanArray> = None;
    for conjunct in conjuncts {
        let pred = arena.eval(*conjunct, chunk)?;
        let pred = if matches!(pred.data_type(), DataType::Null) {
            BooleanArray::new_null(pred.len())
        } else {
            pred.as_any()
                .downcast_ref::<BooleanArray>()
                .cloned()
                .ok_or_else(|| {
                    format!(
                        "conjunct must return boolean, got {:?}",
                        pred.data_type()
                    )
                })?
        };
        if pred.len() != chunk.len() {
            return Err(format!(
                "conjunct produced {} rows for a chunk of {} rows",
                pred.len(),
                chunk.len()
            ));
        }
        mask = Some(match mask {
            None => pred,
            Some(prev) => and_kleene(&prev, &pred).map_err(|e| e.to_string())?,
        });
    }

    let Some(mask) = mask else {
        return Ok(chunk.clone());
    };
    if mask.null_count() == 0 && mask.true_count() == chunk.len() {
        return Ok(chunk.clone());
    }
    let filtered = filter_record_batch(&chunk.batch, &mask).map_err(|e| e.to_string())?;
    Chunk::try_new(filtered)
}
