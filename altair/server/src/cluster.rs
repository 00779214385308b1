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

//! Cluster membership as the coordinator sees it.

use std::sync::Arc;

use altair_common::Node;
use parking_lot::RwLock;

/// The known nodes. Membership changes (scale, drains) swap the list; the
/// sync loop picks the change up on its next tick.
pub struct ClusterInfo {
    nodes: RwLock<Vec<Node>>,
}

impl ClusterInfo {
    pub fn new(nodes: Vec<Node>) -> Arc<Self> {
        Arc::new(Self {
            nodes: RwLock::new(nodes),
        })
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.read().clone()
    }

    pub fn active(&self) -> Vec<Node> {
        self.nodes.read().iter().filter(|n| n.active).cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Node> {
        self.nodes.read().iter().find(|n| n.id == id).cloned()
    }

    pub fn set_nodes(&self, nodes: Vec<Node>) {
        *self.nodes.write() = nodes;
    }
}
