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

//! The coordinator surface.
//!
//! [`handler::QueryHandler`] turns structured wire requests into DSL
//! queries, compiles and executes them and renders JSON responses.
//! [`node_sync::NodeSync`] is the periodic reconciler that keeps specs and
//! nodes converged. [`in_process::InProcessConnector`] stands in for the
//! out-of-tree RPC transport in single-host deployments and tests.

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod handler;
pub mod in_process;
pub mod node_sync;
pub mod request;

pub use catalog::Catalog;
pub use cluster::ClusterInfo;
pub use config::ServerConfig;
pub use handler::QueryHandler;
pub use in_process::{InProcessConnector, InProcessNode};
pub use node_sync::{NodeSync, SyncHandle};
pub use request::{DisplayType, QueryRequest};
