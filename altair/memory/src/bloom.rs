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

//! Per-column bloom filters used to skip whole blocks.

use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use altair_common::Value;

const PROBES: u64 = 4;
const BITS_PER_ENTRY: usize = 10;

/// A fixed-width bloom filter over the values inserted into one column.
/// `probably` returning false guarantees the value was never inserted; true
/// may be a false positive.
#[derive(Clone)]
pub struct BloomFilter {
    words: Vec<u64>,
    mask: u64,
    state: [RandomState; 2],
}

impl fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomFilter")
            .field("bits", &(self.words.len() * 64))
            .finish()
    }
}

impl BloomFilter {
    /// Size the filter for an expected number of entries.
    pub fn with_capacity(entries: usize) -> Self {
        let nbits = (entries.max(64) * BITS_PER_ENTRY).next_power_of_two();
        Self {
            words: vec![0u64; nbits / 64],
            mask: (nbits - 1) as u64,
            // fixed seeds keep probe results stable for the filter's lifetime
            state: [
                RandomState::with_seeds(0x9e37, 0x79b9, 0x7f4a, 0x7c15),
                RandomState::with_seeds(0xf39c, 0xc060, 0x5ced, 0xc834),
            ],
        }
    }

    fn hashes(&self, value: &Value) -> (u64, u64) {
        let mut bytes = vec![];
        Value::write_key(Some(value), &mut bytes);
        let mut h1 = self.state[0].build_hasher();
        bytes.hash(&mut h1);
        let mut h2 = self.state[1].build_hasher();
        bytes.hash(&mut h2);
        (h1.finish(), h2.finish() | 1)
    }

    pub fn insert(&mut self, value: &Value) {
        let (h1, h2) = self.hashes(value);
        for i in 0..PROBES {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) & self.mask;
            self.words[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    pub fn probably(&self, value: &Value) -> bool {
        let (h1, h2) = self.hashes(value);
        for i in 0..PROBES {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) & self.mask;
            if self.words[(bit / 64) as usize] & (1u64 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }

    pub fn byte_size(&self) -> usize {
        self.words.len() * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soundness_no_false_negatives() {
        let mut bloom = BloomFilter::with_capacity(1000);
        for i in 0..1000i64 {
            bloom.insert(&Value::BigInt(i));
        }
        for i in 0..1000i64 {
            assert!(bloom.probably(&Value::BigInt(i)));
        }
    }

    #[test]
    fn mostly_rejects_absent_values() {
        let mut bloom = BloomFilter::with_capacity(1000);
        for i in 0..1000i64 {
            bloom.insert(&Value::BigInt(i));
        }
        let misses = (10_000..20_000i64)
            .filter(|i| !bloom.probably(&Value::BigInt(*i)))
            .count();
        // false-positive rate well under 10% at 10 bits/entry
        assert!(misses > 9_000, "only {misses} rejected");
    }

    #[test]
    fn distinguishes_kinds() {
        let mut bloom = BloomFilter::with_capacity(16);
        bloom.insert(&Value::Varchar("1".into()));
        assert!(bloom.probably(&Value::Varchar("1".into())));
    }
}
