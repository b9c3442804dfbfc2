/// Availability aggregation.
///
/// For each `(station, period)` group, computes the percentage of expected
/// observation instants carrying a non-null value, per tracked parameter,
/// plus an unweighted overall average. The denominator is calendar days in
/// the period: FKLIM stations report exactly once per day, so a month
/// expects 28-31 instants and a year 365 or 366.
///
/// Rounding order is load-bearing: each per-parameter percentage is rounded
/// to two decimals first, and the overall average is taken over the rounded
/// values, matching the dashboard's historical figures at the margins.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::model::{Observation, PARAMETER_COUNT};

// ---------------------------------------------------------------------------
// Period types
// ---------------------------------------------------------------------------

/// Summary table granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Granularity {
    /// Period id is the integer `YYYYMM` (the warehouse's month dimension key).
    Monthly,
    /// Period id is the integer year.
    Yearly,
}

impl Granularity {
    /// Dimension key of the period containing `date`.
    pub fn period_id(&self, date: NaiveDate) -> i32 {
        match self {
            Granularity::Monthly => date.year() * 100 + date.month() as i32,
            Granularity::Yearly => date.year(),
        }
    }

    /// Expected observation instants in the period: one per calendar day.
    pub fn expected_days(&self, period_id: i32) -> u32 {
        match self {
            Granularity::Monthly => {
                days_in_month(period_id.div_euclid(100), (period_id.rem_euclid(100)) as u32)
            }
            Granularity::Yearly => {
                if is_leap_year(period_id) {
                    366
                } else {
                    365
                }
            }
        }
    }
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .unwrap_or(first);
    next.signed_duration_since(first).num_days().max(1) as u32
}

// ---------------------------------------------------------------------------
// Summary rows
// ---------------------------------------------------------------------------

/// One availability summary row, keyed on `(station_sk, period_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityRow {
    pub station_sk: i32,
    pub period_id: i32,
    /// Per-parameter availability percentages, in `model::PARAMETERS` order,
    /// each rounded to two decimals.
    pub per_parameter: [f64; PARAMETER_COUNT],
    /// Unweighted mean of the rounded per-parameter percentages, rounded to
    /// two decimals.
    pub overall: f64,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Recomputes availability rows for every `(station, period)` pair present
/// in `observations`. Output order is deterministic (station, then period).
///
/// Pure function over the observation set: recomputing with unchanged input
/// yields bit-identical rows, so re-upserting them is idempotent.
pub fn summarize(observations: &[Observation], granularity: Granularity) -> Vec<AvailabilityRow> {
    let mut counts: BTreeMap<(i32, i32), [u32; PARAMETER_COUNT]> = BTreeMap::new();

    for obs in observations {
        let period_id = granularity.period_id(obs.timestamp.date());
        let entry = counts
            .entry((obs.station_sk, period_id))
            .or_insert([0; PARAMETER_COUNT]);
        for (slot, present) in entry.iter_mut().zip(obs.presence()) {
            if present {
                *slot += 1;
            }
        }
    }

    counts
        .into_iter()
        .map(|((station_sk, period_id), non_null)| {
            let expected = granularity.expected_days(period_id) as f64;
            let mut per_parameter = [0.0; PARAMETER_COUNT];
            for (pct, count) in per_parameter.iter_mut().zip(non_null) {
                *pct = round2(count as f64 / expected * 100.0);
            }
            let overall = round2(per_parameter.iter().sum::<f64>() / PARAMETER_COUNT as f64);
            AvailabilityRow {
                station_sk,
                period_id,
                per_parameter,
                overall,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Observation;
    use chrono::NaiveDate;

    fn observation(station_sk: i32, date: NaiveDate, rainfall: Option<f64>) -> Observation {
        let ts = date.and_hms_opt(0, 0, 0).unwrap();
        Observation {
            station_sk,
            wmo_id: "96001".to_string(),
            station_name: None,
            timestamp: ts,
            temp_07lt_c: None,
            temp_13lt_c: None,
            temp_18lt_c: None,
            temp_avg_c: None,
            temp_max_c: None,
            temp_min_c: None,
            rainfall_mm: rainfall,
            sunshine_h: None,
            weather_specific: None,
            pressure_mb: None,
            rel_humidity_07lt_pc: None,
            rel_humidity_13lt_pc: None,
            rel_humidity_18lt_pc: None,
            rel_humidity_avg_pc: None,
            wind_speed_avg_km_h: None,
            wind_dir_max: None,
            wind_speed_max_knots: None,
            wind_dir_cardinal: None,
            source_data: None,
            updated_at: ts,
        }
    }

    fn full_year(station_sk: i32, year: i32, skip_last_day: bool) -> Vec<Observation> {
        let mut out = Vec::new();
        let mut date = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        while date.year() == year {
            let is_last = date == NaiveDate::from_ymd_opt(year, 12, 31).unwrap();
            let rainfall = if is_last && skip_last_day { None } else { Some(1.0) };
            out.push(observation(station_sk, date, rainfall));
            date = date.succ_opt().unwrap();
        }
        out
    }

    // rainfall_mm sits at index 6 of model::PARAMETERS
    const RAINFALL: usize = 6;

    #[test]
    fn test_period_ids() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert_eq!(Granularity::Monthly.period_id(date), 202402);
        assert_eq!(Granularity::Yearly.period_id(date), 2024);
    }

    #[test]
    fn test_expected_days_handles_leap_years() {
        assert_eq!(Granularity::Yearly.expected_days(2024), 366);
        assert_eq!(Granularity::Yearly.expected_days(2025), 365);
        assert_eq!(Granularity::Yearly.expected_days(1900), 365); // century rule
        assert_eq!(Granularity::Yearly.expected_days(2000), 366);
        assert_eq!(Granularity::Monthly.expected_days(202402), 29);
        assert_eq!(Granularity::Monthly.expected_days(202302), 28);
        assert_eq!(Granularity::Monthly.expected_days(202401), 31);
        assert_eq!(Granularity::Monthly.expected_days(202404), 30);
    }

    #[test]
    fn test_complete_leap_year_is_100_percent() {
        let observations = full_year(7, 2024, false);
        assert_eq!(observations.len(), 366);

        let rows = summarize(&observations, Granularity::Yearly);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].station_sk, 7);
        assert_eq!(rows[0].period_id, 2024);
        assert_eq!(rows[0].per_parameter[RAINFALL], 100.00);
    }

    #[test]
    fn test_one_missing_day_in_leap_year_rounds_to_99_73() {
        let observations = full_year(7, 2024, true);
        let rows = summarize(&observations, Granularity::Yearly);
        // 365/366 × 100 = 99.7267… → 99.73
        assert_eq!(rows[0].per_parameter[RAINFALL], 99.73);
    }

    #[test]
    fn test_monthly_percentage_uses_days_in_that_month() {
        // 10 rainfall values in February 2023 (28 days)
        let observations: Vec<_> = (1..=10)
            .map(|d| observation(3, NaiveDate::from_ymd_opt(2023, 2, d).unwrap(), Some(5.0)))
            .collect();

        let rows = summarize(&observations, Granularity::Monthly);
        assert_eq!(rows[0].period_id, 202302);
        // 10/28 × 100 = 35.714… → 35.71
        assert_eq!(rows[0].per_parameter[RAINFALL], 35.71);
    }

    #[test]
    fn test_overall_average_over_eighteen_parameters() {
        // One station, one day present in a 30-day month: rainfall at
        // 1/30 → 3.33 after rounding, all other parameters at 0. The
        // overall mean divides by all eighteen parameters.
        let observations = vec![observation(
            1,
            NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
            Some(0.0),
        )];
        let rows = summarize(&observations, Granularity::Monthly);
        assert_eq!(rows[0].per_parameter[RAINFALL], 3.33);
        // mean of rounded values: 3.33 / 18 = 0.185 → 0.19
        assert_eq!(rows[0].overall, 0.19);
    }

    #[test]
    fn test_zero_rainfall_counts_as_present() {
        let observations = vec![observation(
            1,
            NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
            Some(0.0),
        )];
        let rows = summarize(&observations, Granularity::Monthly);
        assert!(rows[0].per_parameter[RAINFALL] > 0.0);
    }

    #[test]
    fn test_recomputation_is_bit_identical() {
        let observations = full_year(7, 2024, true);
        let first = summarize(&observations, Granularity::Yearly);
        let second = summarize(&observations, Granularity::Yearly);
        assert_eq!(first, second);
    }

    #[test]
    fn test_groups_split_by_station_and_period() {
        let mut observations = full_year(1, 2023, false);
        observations.extend(full_year(2, 2023, false));
        observations.push(observation(
            1,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Some(1.0),
        ));

        let yearly = summarize(&observations, Granularity::Yearly);
        assert_eq!(yearly.len(), 3);

        let monthly = summarize(&observations, Granularity::Monthly);
        assert_eq!(monthly.len(), 25); // 12 + 12 + 1
    }
}
