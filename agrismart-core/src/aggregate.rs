//! Collapses 3-hourly forecast samples into per-day summaries.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::{DailySummary, RawForecastSample, capitalize, round1};

/// Number of days kept in a forecast.
pub const MAX_FORECAST_DAYS: usize = 5;

const MPS_TO_KMH: f64 = 3.6;

/// Group `samples` by local calendar date and summarise each day.
///
/// Days are returned in ascending order and only the first
/// [`MAX_FORECAST_DAYS`] dates are kept. `today` is the caller's local date and
/// only drives the day labels.
pub fn aggregate(samples: &[RawForecastSample], today: NaiveDate) -> Vec<DailySummary> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&RawForecastSample>> = BTreeMap::new();
    for sample in samples {
        by_date.entry(sample.timestamp.date_naive()).or_default().push(sample);
    }

    by_date
        .into_iter()
        .take(MAX_FORECAST_DAYS)
        .filter_map(|(date, mut group)| {
            group.sort_by_key(|s| s.timestamp);
            summarize_day(date, &group, today)
        })
        .collect()
}

fn summarize_day(
    date: NaiveDate,
    group: &[&RawForecastSample],
    today: NaiveDate,
) -> Option<DailySummary> {
    if group.is_empty() {
        return None;
    }

    let count = group.len() as f64;
    let mean = |f: fn(&RawForecastSample) -> f64| group.iter().map(|&s| f(s)).sum::<f64>() / count;
    let max = |f: fn(&RawForecastSample) -> f64| {
        group.iter().map(|&s| f(s)).fold(f64::NEG_INFINITY, f64::max)
    };

    let temp_min = group.iter().map(|s| s.temp_min).fold(f64::INFINITY, f64::min);
    let rain_mm: f64 = group.iter().map(|s| s.rain_3h).sum();

    let description = dominant(group.iter().map(|s| s.description.as_str()))?;
    let icon = dominant(group.iter().map(|s| s.icon.as_str()))?;

    Some(DailySummary {
        date,
        day_name: day_label(date, today),
        temp: round1(mean(|s| s.temp)),
        temp_min: round1(temp_min),
        temp_max: round1(max(|s| s.temp_max)),
        humidity: percent(mean(|s| s.humidity)),
        description: capitalize(description),
        icon: icon.to_string(),
        rain_probability: percent(max(|s| s.pop) * 100.0),
        rain_mm: round1(rain_mm),
        wind_speed: round1(max(|s| s.wind_speed) * MPS_TO_KMH),
        clouds: percent(mean(|s| s.clouds)),
    })
}

/// Most frequent value; ties go to the value seen first.
fn dominant<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }

    // `max_by_key` keeps the last maximum, so walk backwards.
    counts.into_iter().rev().max_by_key(|(_, n)| *n).map(|(v, _)| v)
}

fn percent(value: f64) -> u8 {
    value.round_ties_even().clamp(0.0, 100.0) as u8
}

/// "Aujourd'hui", "Demain", or the French weekday name.
pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        return "Aujourd'hui".to_string();
    }
    if today.succ_opt() == Some(date) {
        return "Demain".to_string();
    }

    let name = match date.weekday() {
        Weekday::Mon => "Lundi",
        Weekday::Tue => "Mardi",
        Weekday::Wed => "Mercredi",
        Weekday::Thu => "Jeudi",
        Weekday::Fri => "Vendredi",
        Weekday::Sat => "Samedi",
        Weekday::Sun => "Dimanche",
    };
    name.to_string()
}
