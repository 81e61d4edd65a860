use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DateRangeMode {
    All,
    Partial,
    Range,
}

/// Immutable-per-run import settings.
///
/// Serializes to the flat key-value JSON shape used for persisted
/// configuration files, so a file exported from one run can seed the next.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Configuration {
    #[serde(default = "defaults::version")]
    pub version: u32,
    #[serde(default = "defaults::unknown")]
    pub country: String,
    #[serde(default = "defaults::unknown")]
    pub bank: String,
    /// Requisition key → the aggregator's bank-connection reference.
    #[serde(default)]
    pub requisitions: BTreeMap<String, String>,
    #[serde(default = "defaults::date_range")]
    pub date_range: DateRangeMode,
    #[serde(default = "defaults::date_range_number")]
    pub date_range_number: u32,
    #[serde(default = "defaults::date_range_unit")]
    pub date_range_unit: String,
    /// Derived bound, `%Y-%m-%d` or empty. See [`Configuration::update_date_range`].
    #[serde(default)]
    pub date_not_before: String,
    #[serde(default)]
    pub date_not_after: String,
    #[serde(default = "defaults::enabled")]
    pub rules: bool,
    #[serde(default)]
    pub skip_form: bool,
    #[serde(default = "defaults::enabled")]
    pub add_import_tag: bool,
    #[serde(default = "defaults::enabled")]
    pub ignore_duplicate_transactions: bool,
    #[serde(default)]
    pub do_mapping: bool,
    /// Selected aggregator account id → ledger account id.
    #[serde(default)]
    pub accounts: BTreeMap<String, u64>,
    /// Counterparty name → ledger account id, consulted when `do_mapping` is on.
    #[serde(default)]
    pub mapping: BTreeMap<String, u64>,
}

mod defaults {
    use super::DateRangeMode;

    pub fn version() -> u32 {
        1
    }
    pub fn unknown() -> String {
        "XX".to_string()
    }
    pub fn date_range() -> DateRangeMode {
        DateRangeMode::All
    }
    pub fn date_range_number() -> u32 {
        30
    }
    pub fn date_range_unit() -> String {
        "d".to_string()
    }
    pub fn enabled() -> bool {
        true
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            version: defaults::version(),
            country: defaults::unknown(),
            bank: defaults::unknown(),
            requisitions: BTreeMap::new(),
            date_range: defaults::date_range(),
            date_range_number: defaults::date_range_number(),
            date_range_unit: defaults::date_range_unit(),
            date_not_before: String::new(),
            date_not_after: String::new(),
            rules: true,
            skip_form: false,
            add_import_tag: true,
            ignore_duplicate_transactions: true,
            do_mapping: false,
            accounts: BTreeMap::new(),
            mapping: BTreeMap::new(),
        }
    }
}

impl Configuration {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn requisition(&self, key: &str) -> Option<&str> {
        self.requisitions.get(key).map(|reference| reference.as_str())
    }

    pub fn date_not_before(&self) -> Option<NaiveDate> {
        parse_bound(&self.date_not_before)
    }

    pub fn date_not_after(&self) -> Option<NaiveDate> {
        parse_bound(&self.date_not_after)
    }

    /// Re-derives the `date_not_before`/`date_not_after` bounds from the
    /// date-range mode, relative to `today`.
    ///
    /// `all` clears both bounds and resets the unit/count pair, `partial`
    /// derives `date_not_before` from now minus N units and leaves
    /// `date_not_after` empty, `range` parses both explicit bounds and swaps
    /// them when inverted.
    pub fn update_date_range(&mut self, today: NaiveDate) {
        match self.date_range {
            DateRangeMode::All => {
                log::debug!("Date range is \"all\", clearing both bounds.");
                self.date_range_unit = defaults::date_range_unit();
                self.date_range_number = defaults::date_range_number();
                self.date_not_before = String::new();
                self.date_not_after = String::new();
            }
            DateRangeMode::Partial => {
                self.date_not_after = String::new();
                self.date_not_before =
                    match calc_not_before(today, &self.date_range_unit, self.date_range_number) {
                        Some(date) => date.format(DATE_FORMAT).to_string(),
                        None => String::new(),
                    };
                log::debug!("Date range is \"partial\", date_not_before is now \"{}\"", self.date_not_before);
            }
            DateRangeMode::Range => {
                let mut before = parse_bound(&self.date_not_before);
                let mut after = parse_bound(&self.date_not_after);
                if let (Some(b), Some(a)) = (before, after) {
                    if b > a {
                        (before, after) = (after, before);
                    }
                }
                self.date_not_before = format_bound(before);
                self.date_not_after = format_bound(after);
                log::debug!(
                    "Date range is \"range\", date_not_before is now \"{}\", date_not_after is \"{}\"",
                    self.date_not_before,
                    self.date_not_after
                );
            }
        }
    }
}

fn parse_bound(value: &str) -> Option<NaiveDate> {
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn format_bound(value: Option<NaiveDate>) -> String {
    match value {
        Some(date) => date.format(DATE_FORMAT).to_string(),
        None => String::new(),
    }
}

fn calc_not_before(today: NaiveDate, unit: &str, number: u32) -> Option<NaiveDate> {
    match unit {
        "d" => Some(today - Duration::days(i64::from(number))),
        "w" => Some(today - Duration::weeks(i64::from(number))),
        "m" => today.checked_sub_months(Months::new(number)),
        "y" => today.checked_sub_months(Months::new(number * 12)),
        _ => {
            log::error!("Could not parse date setting. Unknown unit \"{unit}\"");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, DATE_FORMAT).unwrap()
    }

    #[test]
    fn defaults_from_empty_json() {
        let configuration = Configuration::from_json(b"{}").unwrap();
        assert_eq!(Configuration::default(), configuration);
        assert_eq!("XX", configuration.country);
        assert_eq!(DateRangeMode::All, configuration.date_range);
        assert_eq!(30, configuration.date_range_number);
        assert!(configuration.add_import_tag);
        assert!(configuration.ignore_duplicate_transactions);
        assert!(!configuration.do_mapping);
    }

    #[test]
    fn flat_json_round_trip() {
        let mut configuration = Configuration::default();
        configuration.country = "NL".to_string();
        configuration.bank = "SOMEBANK_NL_123".to_string();
        configuration
            .requisitions
            .insert("req".to_string(), "reference-1".to_string());
        configuration.accounts.insert("acct-1".to_string(), 7);
        configuration.mapping.insert("Shop".to_string(), 12);
        configuration.date_range = DateRangeMode::Range;
        configuration.date_not_before = "2024-01-01".to_string();
        configuration.date_not_after = "2024-02-01".to_string();

        let json = configuration.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!("range", parsed["date_range"]);
        assert_eq!(7, parsed["accounts"]["acct-1"]);

        let reloaded = Configuration::from_json(&json).unwrap();
        assert_eq!(configuration, reloaded);
    }

    #[test]
    fn all_mode_clears_bounds() {
        let mut configuration = Configuration::default();
        configuration.date_not_before = "2024-01-01".to_string();
        configuration.date_not_after = "2024-02-01".to_string();
        configuration.date_range_number = 7;

        configuration.update_date_range(date("2024-01-10"));
        assert_eq!("", configuration.date_not_before);
        assert_eq!("", configuration.date_not_after);
        assert_eq!(30, configuration.date_range_number);
        assert_eq!("d", configuration.date_range_unit);
    }

    #[test]
    fn partial_mode_derives_not_before() {
        let mut configuration = Configuration::default();
        configuration.date_range = DateRangeMode::Partial;
        configuration.date_range_number = 7;
        configuration.date_range_unit = "d".to_string();

        configuration.update_date_range(date("2024-01-10"));
        assert_eq!("2024-01-03", configuration.date_not_before);
        assert_eq!("", configuration.date_not_after);
    }

    #[test]
    fn partial_mode_supports_weeks_months_years() {
        let mut configuration = Configuration::default();
        configuration.date_range = DateRangeMode::Partial;
        configuration.date_range_number = 2;

        configuration.date_range_unit = "w".to_string();
        configuration.update_date_range(date("2024-01-15"));
        assert_eq!("2024-01-01", configuration.date_not_before);

        configuration.date_range_unit = "m".to_string();
        configuration.update_date_range(date("2024-03-15"));
        assert_eq!("2024-01-15", configuration.date_not_before);

        configuration.date_range_unit = "y".to_string();
        configuration.update_date_range(date("2024-03-15"));
        assert_eq!("2022-03-15", configuration.date_not_before);
    }

    #[test]
    fn partial_mode_with_unknown_unit_clears_bound() {
        let mut configuration = Configuration::default();
        configuration.date_range = DateRangeMode::Partial;
        configuration.date_range_unit = "q".to_string();

        configuration.update_date_range(date("2024-01-10"));
        assert_eq!("", configuration.date_not_before);
    }

    #[test]
    fn range_mode_swaps_inverted_bounds() {
        let mut configuration = Configuration::default();
        configuration.date_range = DateRangeMode::Range;
        configuration.date_not_before = "2024-02-01".to_string();
        configuration.date_not_after = "2024-01-01".to_string();

        configuration.update_date_range(date("2024-03-01"));
        assert_eq!("2024-01-01", configuration.date_not_before);
        assert_eq!("2024-02-01", configuration.date_not_after);
    }

    #[test]
    fn bounds_parse_back_to_dates() {
        let mut configuration = Configuration::default();
        configuration.date_not_before = "2024-01-03".to_string();
        assert_eq!(Some(date("2024-01-03")), configuration.date_not_before());
        assert_eq!(None, configuration.date_not_after());
    }
}
