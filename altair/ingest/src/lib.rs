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

//! Ingestion: data-source specs and their lifecycle.
//!
//! Table definitions enumerate ingestible source units through a
//! [`repo::SourceInventory`]; the [`repo::SpecRepo`] diffs each enumeration
//! against the current spec set and assigns new work to nodes. On a node,
//! the [`loader::BlockLoader`] turns a spec's rows into sealed batches
//! registered with the block manager. The concrete connectors that fetch
//! bytes from object stores or streams live out of tree behind the
//! [`loader::SpecSource`] seam.

pub mod loader;
pub mod repo;
pub mod spec;
pub mod table;
pub mod task;

pub use loader::{BlockLoader, SpecSource};
pub use repo::{SourceInventory, SourceUnit, SpecRepo};
pub use spec::{IngestSpec, SpecState};
pub use table::{SourceType, TableDefinition};
pub use task::{ClusterConnector, NodeClient, Task, TaskState};
