//! Date partition key and per-run context.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};

const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date that scopes a run, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionDate(NaiveDate);

impl PartitionDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for PartitionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(PARTITION_DATE_FORMAT))
    }
}

impl FromStr for PartitionDate {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `%Y` alone would accept unpadded or signed years.
        if s.len() != 10 {
            bail!(
                ErrorKind::InvalidData,
                "Partition date must be formatted as YYYY-MM-DD",
                s
            );
        }

        match NaiveDate::parse_from_str(s, PARTITION_DATE_FORMAT) {
            Ok(date) => Ok(Self(date)),
            Err(err) => bail!(
                ErrorKind::InvalidData,
                "Partition date must be formatted as YYYY-MM-DD",
                format!("{s}: {err}")
            ),
        }
    }
}

/// Builds a [`FixedOffset`] from whole hours relative to UTC.
pub fn utc_offset(hours: i32) -> EtlResult<FixedOffset> {
    match hours.checked_mul(3600).and_then(FixedOffset::east_opt) {
        Some(offset) => Ok(offset),
        None => bail!(
            ErrorKind::ConfigError,
            "UTC offset is out of range",
            format!("{hours} hours")
        ),
    }
}

/// State shared by every stage of a single run.
///
/// Both values come from one clock reading so that the extraction filter, the deletion
/// filter and the `created_at` stamp can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    partition_date: PartitionDate,
    started_at: NaiveDateTime,
}

impl RunContext {
    pub fn new(partition_date: PartitionDate, started_at: NaiveDateTime) -> Self {
        Self {
            partition_date,
            started_at,
        }
    }

    /// Creates a context for today in the given offset.
    pub fn now(offset: FixedOffset) -> Self {
        let started_at = Utc::now().with_timezone(&offset).naive_local();

        Self {
            partition_date: PartitionDate(started_at.date()),
            started_at,
        }
    }

    /// Creates a context for an explicit partition, stamped with the current time.
    ///
    /// Used to rerun or backfill a past day.
    pub fn for_date(partition_date: PartitionDate, offset: FixedOffset) -> Self {
        let started_at = Utc::now().with_timezone(&offset).naive_local();

        Self {
            partition_date,
            started_at,
        }
    }

    pub fn partition_date(&self) -> PartitionDate {
        self.partition_date
    }

    /// Local wall-clock time the run started at.
    pub fn started_at(&self) -> NaiveDateTime {
        self.started_at
    }
}
