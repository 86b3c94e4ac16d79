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
//! Table-function (row expansion) operator.
//!
//! Each input row is expanded into the cartesian product of the values its table functions
//! produce. Pass-through columns are replicated once per produced row and output is packed into
//! fixed-capacity blocks; expansion of a single row may span several blocks.

pub mod assembler;
pub mod cursor;
mod expander;
mod processor;

pub use assembler::{ColumnBuffer, OutputBlock};
pub use cursor::{Pivot, is_inner_and_empty, locate_pivot, roll};
pub use expander::{ExpansionLayout, FillStatus, TableFunctionExpander};
pub use processor::{TableFunctionProcessorFactory, TableFunctionProcessorOperator};
