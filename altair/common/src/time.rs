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

//! Small time helpers shared by planning, ingest and tests.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{AltairError, Result};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Parse a `YYYY-MM-DD` date into unix seconds at midnight UTC.
pub fn unix_date(text: &str) -> Result<i64> {
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| AltairError::InvalidQuery(format!("bad date {text}: {e}")))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default())
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp into unix seconds.
pub fn unix_time(text: &str) -> Result<i64> {
    let dt = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| AltairError::InvalidQuery(format!("bad timestamp {text}: {e}")))?;
    Ok(dt.and_utc().timestamp())
}

/// Truncate unix seconds down to the start of its day.
pub fn date_of(unix: i64) -> i64 {
    unix.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dates() {
        assert_eq!(unix_date("1970-01-02").unwrap(), SECONDS_PER_DAY);
        assert_eq!(unix_date("2019-01-01").unwrap(), 1_546_300_800);
        assert!(unix_date("2019-13-01").is_err());
    }

    #[test]
    fn truncates_to_day() {
        let noon = unix_date("2019-01-01").unwrap() + 12 * 3600;
        assert_eq!(date_of(noon), unix_date("2019-01-01").unwrap());
    }
}
