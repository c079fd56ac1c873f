//! Parsing of the cron expression that drives the daemon.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use snafu::ResultExt;

use super::{Error, error};

/// A parsed cron expression, seconds first.
#[derive(Clone, Debug)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    /// Parses `expression` after stripping the quotes it may carry when passed
    /// through an environment variable or a quoted YAML scalar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchedule`] if the expression is not a valid
    /// six or seven field cron expression.
    pub fn parse(expression: &str) -> Result<Self, Error> {
        let expression = unquote(expression.trim()).trim().to_string();
        let schedule = cron::Schedule::from_str(&expression)
            .with_context(|_| error::InvalidScheduleSnafu { expression: expression.clone() })?;
        Ok(Self { expression, schedule })
    }

    /// The expression as configured, without surrounding quotes.
    pub fn expression(&self) -> &str { &self.expression }

    /// The first fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// Strips one pair of matching single or double quotes.
fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote)))
        .unwrap_or(value)
}
