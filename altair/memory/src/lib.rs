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

//! In-memory columnar storage.
//!
//! A [`Batch`] is an immutable columnar container for a bounded number of
//! rows of one schema: per column a dense value vector, a null bitmap and an
//! optional bloom filter. A batch is built by a single producer, sealed, and
//! then shared read-only across any number of query workers.

pub mod accessor;
pub mod batch;
pub mod bloom;
pub mod column;

pub use accessor::{ListAccessor, MapAccessor, RowAccessor};
pub use batch::Batch;
pub use bloom::BloomFilter;
pub use column::{Column, NullBitmap};
