//! Filter state of a table view.
//!
//! Filters map onto list query parameters (`datefrom`, `dateto`, `tags`,
//! `name`) and round-trip through a URL query string so filtered views can be
//! bookmarked and shared.

use crate::{error::Result, Error, Timestamp};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Date range, tag and text filters of a view. Dates are unix seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(rename = "datefrom", default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<Timestamp>,
    #[serde(rename = "dateto", default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<Timestamp>,
    /// Comma-separated tag list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

fn start_of_day(date: NaiveDate) -> Option<Timestamp> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Range picker semantics: both ends snap to the start of their day.
    pub fn with_day_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from = start_of_day(from);
        self.date_to = start_of_day(to);
        self
    }

    pub fn with_range(mut self, from: Timestamp, to: Timestamp) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        self.tags = (!joined.is_empty()).then_some(joined);
        self
    }

    /// Set the free-text search. Blank text clears it.
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// The whole calendar month containing `now`, used by report views.
    pub fn current_month(now: DateTime<Utc>) -> Self {
        let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1);
        let next = if now.month() == 12 {
            NaiveDate::from_ymd_opt(now.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(now.year(), now.month() + 1, 1)
        };

        Self {
            date_from: first.and_then(start_of_day),
            date_to: next.and_then(start_of_day).map(|t| t - 1),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Whether a date range or text search narrows the view. Tags alone only
    /// select a partition.
    pub fn narrows(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some() || self.search.is_some()
    }

    /// List query parameters, in a stable order.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(from) = self.date_from {
            params.push(("datefrom".to_string(), from.to_string()));
        }
        if let Some(to) = self.date_to {
            params.push(("dateto".to_string(), to.to_string()));
        }
        if let Some(tags) = &self.tags {
            params.push(("tags".to_string(), tags.clone()));
        }
        if let Some(search) = &self.search {
            params.push(("name".to_string(), search.clone()));
        }
        params
    }

    /// Encode for the page URL.
    pub fn to_query_string(&self) -> Result<String> {
        serde_qs::to_string(self).map_err(|e| Error::QueryString(e.to_string()))
    }

    /// Decode from a page URL query string. Unrelated keys (such as the
    /// token) are ignored and a leading `?` is accepted.
    pub fn from_query_string(query: &str) -> Result<Self> {
        serde_qs::from_str(query.trim_start_matches('?'))
            .map_err(|e| Error::QueryString(e.to_string()))
    }
}
