use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ConfigError;

/// Result size used when an alert doesn't set `limitResultsTo`
/// (matches the Elasticsearch default page size)
pub const DEFAULT_RESULT_SIZE: usize = 10;

/// Field the time window filters on
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Longest look-back window an alert may configure, in days
pub const MAX_TIME_WINDOW_DAYS: i64 = 90;

/// [`MAX_TIME_WINDOW_DAYS`] as a duration
pub fn max_time_window() -> Duration {
    Duration::days(MAX_TIME_WINDOW_DAYS)
}

/// How daily index names are formed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct IndexPattern {
    pub prefix: String,
    /// strftime format of the date suffix
    pub date_format: String,
}

impl IndexPattern {
    /// Reject date formats chrono can't render
    pub fn validate(&self) -> Result<(), ConfigError> {
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidIndexPattern(self.date_format.clone()));
        }
        Ok(())
    }

    /// Index name for one calendar day
    pub fn index_for(&self, day: NaiveDate) -> String {
        let mut name = self.prefix.clone();
        if write!(name, "{}", day.format(&self.date_format)).is_err() {
            // Unvalidated pattern; fall back to the ISO date
            name.truncate(self.prefix.len());
            let _ = write!(name, "{}", day.format("%Y-%m-%d"));
        }
        name
    }
}

impl Default for IndexPattern {
    fn default() -> Self {
        Self {
            prefix: "logstash-".to_string(),
            date_format: "%Y.%m.%d".to_string(),
        }
    }
}

/// Declarative filter an alert queries with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Full-text keyword every hit must match
    pub keyword: Option<String>,
    /// Only count events newer than `now - time_window`
    pub time_window: Option<Duration>,
    /// Result size cap
    pub limit_results_to: Option<usize>,
    pub index: IndexPattern,
}

/// Search request sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    /// Comma-joined index list, most recent first
    pub index: String,
    /// Request body
    pub body: Value,
}

/// Build the search request for `options` as seen at `now`.
pub fn build(options: &QueryOptions, now: DateTime<Utc>) -> SearchQuery {
    let query = match &options.keyword {
        Some(keyword) => json!({
            "bool": {
                "should": [
                    { "query_string": { "query": keyword } }
                ]
            }
        }),
        None => json!({ "match_all": {} }),
    };

    let mut filtered = json!({ "query": query });

    // No window means no filter key at all, not an empty one
    if let Some(window) = options.time_window {
        let from = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        filtered["filter"] = json!({
            "bool": {
                "must": [
                    {
                        "range": {
                            TIMESTAMP_FIELD: {
                                "from": from.timestamp_millis(),
                                "to": now.timestamp_millis(),
                            }
                        }
                    }
                ]
            }
        });
    }

    let lookback = options.time_window.unwrap_or_else(|| Duration::days(1));

    SearchQuery {
        index: daily_indices(&options.index, now, lookback).join(","),
        body: json!({
            "size": options.limit_results_to.unwrap_or(DEFAULT_RESULT_SIZE),
            "query": { "filtered": filtered },
        }),
    }
}

/// One index per UTC calendar day from `now - lookback` to `now`, newest first.
///
/// The lookback is capped at [`max_time_window`].
pub fn daily_indices(pattern: &IndexPattern, now: DateTime<Utc>, lookback: Duration) -> Vec<String> {
    let lookback = lookback.clamp(Duration::zero(), max_time_window());
    let oldest = now
        .checked_sub_signed(lookback)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .date_naive();

    let mut indices = Vec::new();
    let mut day = now.date_naive();
    while day >= oldest {
        indices.push(pattern.index_for(day));
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn window(minutes: i64) -> QueryOptions {
        QueryOptions {
            time_window: Some(Duration::minutes(minutes)),
            ..Default::default()
        }
    }

    #[test]
    fn test_queries_today_and_yesterday() {
        let query = build(&QueryOptions::default(), at(2014, 5, 14, 0, 0));
        assert_eq!(query.index, "logstash-2014.05.14,logstash-2014.05.13");
    }

    #[test]
    fn test_keyword_clause() {
        let options = QueryOptions {
            keyword: Some("keyword".to_string()),
            ..window(10)
        };
        let query = build(&options, at(2014, 1, 1, 0, 0));
        assert_eq!(
            query.body["query"]["filtered"]["query"]["bool"]["should"][0]["query_string"]["query"],
            "keyword"
        );
    }

    #[test]
    fn test_no_keyword_matches_all() {
        let query = build(&QueryOptions::default(), at(2014, 1, 1, 0, 0));
        assert_eq!(query.body["query"]["filtered"]["query"], json!({ "match_all": {} }));
    }

    #[test]
    fn test_range_ends_now_and_starts_window_before() {
        let now = at(2014, 5, 14, 16, 23);
        let query = build(&window(10), now);
        let range = &query.body["query"]["filtered"]["filter"]["bool"]["must"][0]["range"]["@timestamp"];

        assert_eq!(range["to"], now.timestamp_millis());
        assert_eq!(range["from"], (now - Duration::minutes(10)).timestamp_millis());
    }

    #[test]
    fn test_no_time_means_no_filter() {
        let query = build(&QueryOptions::default(), at(2014, 5, 14, 16, 23));
        let filtered = query.body["query"]["filtered"].as_object().unwrap();
        assert!(!filtered.contains_key("filter"));
    }

    #[test]
    fn test_zero_window() {
        let now = at(2014, 5, 14, 16, 23);
        let query = build(&window(0), now);
        let range = &query.body["query"]["filtered"]["filter"]["bool"]["must"][0]["range"]["@timestamp"];
        assert_eq!(range["from"], range["to"]);
        assert_eq!(query.index, "logstash-2014.05.14");
    }

    #[test]
    fn test_result_size() {
        let options = QueryOptions {
            limit_results_to: Some(100),
            ..Default::default()
        };
        let now = at(2014, 5, 14, 16, 23);
        assert_eq!(build(&options, now).body["size"], 100);
        assert_eq!(build(&QueryOptions::default(), now).body["size"], DEFAULT_RESULT_SIZE);
    }

    #[test]
    fn test_window_indices_follow_days_spanned() {
        // 10 minutes inside one day
        let query = build(&window(10), at(2014, 5, 14, 16, 23));
        assert_eq!(query.index, "logstash-2014.05.14");

        // 10 minutes crossing midnight
        let query = build(&window(10), at(2014, 5, 14, 0, 5));
        assert_eq!(query.index, "logstash-2014.05.14,logstash-2014.05.13");

        // three days back
        let query = build(&window(3 * 24 * 60), at(2014, 5, 14, 12, 0));
        assert_eq!(
            query.index,
            "logstash-2014.05.14,logstash-2014.05.13,logstash-2014.05.12,logstash-2014.05.11"
        );
    }

    #[test]
    fn test_oversized_window_does_not_panic() {
        let now = at(2014, 5, 14, 12, 0);
        let options = QueryOptions {
            time_window: Some(Duration::weeks(20_000_000)),
            ..Default::default()
        };
        let query = build(&options, now);

        let range = &query.body["query"]["filtered"]["filter"]["bool"]["must"][0]["range"]["@timestamp"];
        assert_eq!(range["from"], DateTime::<Utc>::MIN_UTC.timestamp_millis());
        assert_eq!(range["to"], now.timestamp_millis());
        // one index per day of the capped lookback, today included
        assert_eq!(
            query.index.split(',').count(),
            MAX_TIME_WINDOW_DAYS as usize + 1
        );
    }

    #[test]
    fn test_custom_index_pattern() {
        let pattern = IndexPattern {
            prefix: "app-".to_string(),
            date_format: "%Y%m%d".to_string(),
        };
        assert!(pattern.validate().is_ok());
        let indices = daily_indices(&pattern, at(2014, 3, 1, 0, 0), Duration::days(1));
        assert_eq!(indices, vec!["app-20140301", "app-20140228"]);
    }

    #[test]
    fn test_invalid_date_format_rejected() {
        let pattern = IndexPattern {
            prefix: "app-".to_string(),
            date_format: "%Q".to_string(),
        };
        assert!(matches!(
            pattern.validate(),
            Err(ConfigError::InvalidIndexPattern(_))
        ));
    }
}
