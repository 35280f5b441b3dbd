//! Time series over admission dates.
use crate::{aggregate::LabelCount, ArcStr, PatientRecord};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

/// Forecasts need at least this many distinct days of history.
pub const MIN_FORECAST_DAYS: usize = 7;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Admissions per day, for the days that have any.
pub fn daily_counts<'a>(
    records: impl IntoIterator<Item = &'a PatientRecord>,
) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for date in records.into_iter().filter_map(|rec| rec.admission_date) {
        *counts.entry(date).or_insert(0) += 1;
    }
    counts
}

/// Trailing moving average. The first `window - 1` points average over what is available.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|idx| {
            let start = (idx + 1).saturating_sub(window);
            mean(&values[start..=idx])
        })
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Percentage change between the mean of the last `window` points and the mean of the
/// `window` points before them.
///
/// With fewer than `2 * window` points the earlier window is whatever is left. 0 when there is
/// no earlier window or it averages 0.
pub fn growth_rate(values: &[f64], window: usize) -> f64 {
    let len = values.len();
    let recent_len = window.min(len);
    let split = len - recent_len;
    let earlier_start = split.saturating_sub(window);
    let earlier = &values[earlier_start..split];
    let recent = &values[split..];
    let earlier_mean = mean(earlier);
    if earlier.is_empty() || earlier_mean == 0. {
        return 0.;
    }
    (mean(recent) - earlier_mean) / earlier_mean * 100.
}

/// Mean of the last `window` points over the mean of the `window` points before them.
///
/// 1 until there are two full windows, or when the earlier window averages 0.
pub fn trend_factor(values: &[f64], window: usize) -> f64 {
    let window = window.max(1);
    let len = values.len();
    if len < 2 * window {
        return 1.;
    }
    let earlier = mean(&values[len - 2 * window..len - window]);
    if earlier == 0. {
        return 1.;
    }
    mean(&values[len - window..]) / earlier
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    fn from_history(days: usize, weekday_samples: usize) -> Self {
        if days >= 30 && weekday_samples >= 4 {
            Confidence::High
        } else if days >= 14 && weekday_samples >= 2 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub date: NaiveDate,
    pub day_name: ArcStr,
    pub predicted_visits: u64,
    pub confidence: Confidence,
}

/// Admissions over time, with a smoothed series and a short forecast.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisitTrend {
    pub dates: Vec<NaiveDate>,
    pub visits: Vec<usize>,
    pub moving_average: Vec<f64>,
    pub growth_rate: f64,
    /// Recent level over the level one window earlier. 1 means flat.
    pub trend_factor: f64,
    pub trend_direction: TrendDirection,
    pub forecast: Vec<Forecast>,
    /// Monday first, every day present.
    pub weekday_distribution: Vec<LabelCount>,
    pub season_distribution: Vec<LabelCount>,
}

impl VisitTrend {
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a PatientRecord>,
        window: usize,
        forecast_days: usize,
    ) -> Self {
        let daily = daily_counts(records);
        let dates: Vec<NaiveDate> = daily.keys().copied().collect();
        let visits: Vec<usize> = daily.values().copied().collect();
        let values: Vec<f64> = visits.iter().map(|v| *v as f64).collect();
        let moving_average = moving_average(&values, window);
        let trend_factor = trend_factor(&values, window);

        let mut weekday_counts = [0usize; 7];
        let mut season_counts = [0usize; 4];
        for (date, count) in &daily {
            weekday_counts[date.weekday().num_days_from_monday() as usize] += count;
            season_counts[season_index(date.month())] += count;
        }

        VisitTrend {
            growth_rate: growth_rate(&values, window),
            trend_direction: TrendDirection::from_growth((trend_factor - 1.) * 100.),
            forecast: forecast(&dates, &values, window, trend_factor, forecast_days),
            trend_factor,
            weekday_distribution: WEEKDAYS
                .iter()
                .zip(weekday_counts)
                .map(|(day, count)| LabelCount::new(weekday_name(*day), count))
                .collect(),
            season_distribution: SEASONS
                .iter()
                .zip(season_counts)
                .map(|(season, count)| LabelCount::new(*season, count))
                .collect(),
            dates,
            visits,
            moving_average,
        }
    }

    pub fn peak_weekday(&self) -> Option<&LabelCount> {
        peak(&self.weekday_distribution)
    }

    pub fn peak_season(&self) -> Option<&LabelCount> {
        peak(&self.season_distribution)
    }
}

// earliest label wins ties
pub(super) fn peak(counts: &[LabelCount]) -> Option<&LabelCount> {
    counts
        .iter()
        .filter(|c| c.count > 0)
        .fold(None, |best: Option<&LabelCount>, c| match best {
            Some(b) if b.count >= c.count => Some(b),
            _ => Some(c),
        })
}

const SEASONS: [&str; 4] = ["Winter", "Spring", "Summer", "Fall"];

fn season_index(month: u32) -> usize {
    match month {
        12 | 1 | 2 => 0,
        3..=5 => 1,
        6..=8 => 2,
        _ => 3,
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Predict the days after the last observed one.
///
/// Each day is the recent level, scaled by the trend and by how that weekday compares with the
/// recent level.
fn forecast(
    dates: &[NaiveDate],
    values: &[f64],
    window: usize,
    trend_factor: f64,
    forecast_days: usize,
) -> Vec<Forecast> {
    let Some(last_date) = dates.last() else {
        return Vec::new();
    };
    if dates.len() < MIN_FORECAST_DAYS {
        return Vec::new();
    }
    let level = mean(&values[values.len().saturating_sub(window.max(1))..]);

    let mut by_weekday: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (date, value) in dates.iter().zip(values) {
        by_weekday
            .entry(date.weekday().num_days_from_monday())
            .or_default()
            .push(*value);
    }

    (1..=forecast_days as i64)
        .map(|offset| {
            let date = *last_date + Duration::days(offset);
            let samples = by_weekday
                .get(&date.weekday().num_days_from_monday())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let weekday_multiplier = if level > 0. && !samples.is_empty() {
                mean(samples) / level
            } else {
                1.
            };
            Forecast {
                date,
                day_name: weekday_name(date.weekday()).into(),
                predicted_visits: (level * trend_factor * weekday_multiplier).round().max(1.)
                    as u64,
                confidence: Confidence::from_history(dates.len(), samples.len()),
            }
        })
        .collect()
}

/// Staffing and bed needs for the busiest forecast day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capacity {
    pub average_daily_visits: f64,
    /// The largest forecast, or the daily average when there is no forecast.
    pub peak_daily_visits: f64,
    pub beds: u64,
    pub doctors: u64,
    pub nurses: u64,
    pub admin_staff: u64,
    /// Peak visits against a floor of 50 a day, as a percentage.
    pub peak_utilization: f64,
    /// Average visits against a floor of 30 a day, as a percentage.
    pub average_utilization: f64,
}

impl Capacity {
    pub fn from_levels(average_daily_visits: f64, peak_daily_visits: f64) -> Self {
        let staff = |per_head: f64, floor: u64| ((peak_daily_visits / per_head) as u64).max(floor);
        Capacity {
            average_daily_visits,
            peak_daily_visits,
            beds: ((peak_daily_visits * 0.4) as u64).max(20),
            doctors: staff(8., 3),
            nurses: staff(5., 5),
            admin_staff: staff(15., 2),
            peak_utilization: super::ratio(
                peak_daily_visits * 100.,
                peak_daily_visits.max(50.),
            ),
            average_utilization: super::ratio(
                average_daily_visits * 100.,
                average_daily_visits.max(30.),
            ),
        }
    }

    /// `None` without any dated visits.
    pub fn from_trend(trend: &VisitTrend) -> Option<Self> {
        if trend.dates.is_empty() {
            return None;
        }
        let average = trend.visits.iter().sum::<usize>() as f64 / trend.dates.len() as f64;
        let peak = trend
            .forecast
            .iter()
            .map(|day| day.predicted_visits)
            .max()
            .map_or(average, |peak| peak as f64);
        Some(Capacity::from_levels(average, peak))
    }
}

/// Visit pattern of one locality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalityTrend {
    pub locality: ArcStr,
    pub total_visits: usize,
    pub average_daily_visits: f64,
    pub growth_rate: f64,
    pub trend: TrendDirection,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

impl Default for TrendDirection {
    fn default() -> Self {
        TrendDirection::Stable
    }
}

impl TrendDirection {
    pub fn from_growth(growth_rate: f64) -> Self {
        if growth_rate > 5. {
            TrendDirection::Increasing
        } else if growth_rate < -5. {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

/// The `top_n` busiest localities, by admissions with a known date.
pub fn locality_trends<'a>(
    records: impl IntoIterator<Item = &'a PatientRecord>,
    window: usize,
    top_n: usize,
) -> Vec<LocalityTrend> {
    let mut by_locality: BTreeMap<ArcStr, BTreeMap<NaiveDate, usize>> = BTreeMap::new();
    for rec in records {
        if let Some(date) = rec.admission_date {
            *by_locality
                .entry(super::locality_label(rec))
                .or_default()
                .entry(date)
                .or_insert(0) += 1;
        }
    }

    let mut trends: Vec<LocalityTrend> = by_locality
        .into_iter()
        .map(|(locality, daily)| {
            let values: Vec<f64> = daily.values().map(|v| *v as f64).collect();
            let total_visits: usize = daily.values().sum();
            let growth_rate = growth_rate(&values, window);
            LocalityTrend {
                locality,
                total_visits,
                average_daily_visits: total_visits as f64 / daily.len() as f64,
                growth_rate,
                trend: TrendDirection::from_growth(growth_rate),
            }
        })
        .collect();
    // stable sort, so ties stay in name order
    trends.sort_by(|a, b| b.total_visits.cmp(&a.total_visits));
    trends.truncate(top_n);
    trends
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::record;

    fn on(date: NaiveDate, locality: &str) -> PatientRecord {
        let mut rec = record("HMS-2024-X");
        rec.admission_date = Some(date);
        rec.locality = locality.into();
        rec
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn moving_average_uses_partial_windows() {
        let avg = moving_average(&[2., 4., 6., 8.], 3);
        assert_eq!(avg, vec![2., 3., 4., 6.]);
        assert!(moving_average(&[], 7).is_empty());
        assert_eq!(moving_average(&[5.], 0), vec![5.]);
    }

    #[test]
    fn growth_compares_adjacent_windows() {
        // earlier [2, 2], recent [3, 3]
        assert_eq!(growth_rate(&[2., 2., 3., 3.], 2), 50.);
        // earlier window is shorter than the recent one
        assert_eq!(growth_rate(&[4., 2., 2.], 2), -50.);
        assert_eq!(growth_rate(&[1., 2.], 7), 0.);
        assert_eq!(growth_rate(&[0., 0., 5., 5.], 2), 0.);
        assert_eq!(growth_rate(&[], 7), 0.);
    }

    #[test]
    fn forecast_needs_a_week_of_history() {
        let start = ymd(2024, 1, 1);
        let short: Vec<_> = (0..6).map(|d| on(start + Duration::days(d), "A")).collect();
        let trend = VisitTrend::from_records(&short, 7, 7);
        assert_eq!(trend.visits.len(), 6);
        assert!(trend.forecast.is_empty());
    }

    #[test]
    fn forecast_follows_weekday_pattern() {
        // 2024-01-01 is a Monday. Two weeks, Mondays are busy.
        let start = ymd(2024, 1, 1);
        let mut records = Vec::new();
        for day in 0..14 {
            let date = start + Duration::days(day);
            let visits = if date.weekday() == Weekday::Mon { 9 } else { 2 };
            for _ in 0..visits {
                records.push(on(date, "A"));
            }
        }
        let trend = VisitTrend::from_records(&records, 7, 7);
        assert_eq!(trend.forecast.len(), 7);
        let monday = &trend.forecast[0];
        assert_eq!(monday.date, ymd(2024, 1, 15));
        assert_eq!(&*monday.day_name, "Monday");
        assert_eq!(monday.predicted_visits, 9);
        assert_eq!(monday.confidence, Confidence::Medium);
        assert_eq!(trend.forecast[1].predicted_visits, 2);

        let again = VisitTrend::from_records(&records, 7, 7);
        assert_eq!(trend, again);
        assert_eq!(trend.peak_weekday().unwrap().label.as_ref(), "Monday");
        assert_eq!(trend.peak_season().unwrap().label.as_ref(), "Winter");
    }

    #[test]
    fn rising_visits_raise_the_forecast() {
        // a quiet week then a busy one
        let start = ymd(2024, 1, 1);
        let mut records = Vec::new();
        for day in 0..14 {
            let date = start + Duration::days(day);
            for _ in 0..(if day < 7 { 2 } else { 10 }) {
                records.push(on(date, "A"));
            }
        }
        let trend = VisitTrend::from_records(&records, 7, 7);
        assert_eq!(trend.trend_factor, 5.);
        assert_eq!(trend.trend_direction, TrendDirection::Increasing);
        assert_eq!(trend.growth_rate, 400.);
        // every weekday averages 6 over the two weeks
        assert!(trend.forecast.iter().all(|day| day.predicted_visits > 6));
        assert_eq!(trend.forecast[0].predicted_visits, 30);
    }

    #[test]
    fn capacity_from_forecast_peak() {
        let start = ymd(2024, 1, 1);
        let mut records = Vec::new();
        for day in 0..14 {
            let date = start + Duration::days(day);
            for _ in 0..(if day < 7 { 2 } else { 10 }) {
                records.push(on(date, "A"));
            }
        }
        let trend = VisitTrend::from_records(&records, 7, 7);
        let capacity = Capacity::from_trend(&trend).unwrap();
        assert_eq!(capacity.average_daily_visits, 6.);
        assert_eq!(capacity.peak_daily_visits, 30.);
        // small hospitals get the minimum staffing
        assert_eq!(capacity.beds, 20);
        assert_eq!(capacity.doctors, 3);
        assert_eq!(capacity.nurses, 6);
        assert_eq!(capacity.admin_staff, 2);
        assert_eq!(capacity.peak_utilization, 60.);
        assert_eq!(capacity.average_utilization, 20.);

        assert_eq!(Capacity::from_trend(&VisitTrend::default()), None);
    }

    #[test]
    fn capacity_scales_with_the_peak() {
        let capacity = Capacity::from_levels(120., 200.);
        assert_eq!(capacity.beds, 80);
        assert_eq!(capacity.doctors, 25);
        assert_eq!(capacity.nurses, 40);
        assert_eq!(capacity.admin_staff, 13);
        assert_eq!(capacity.peak_utilization, 100.);
        assert_eq!(capacity.average_utilization, 100.);

        // without a forecast the average stands in for the peak
        let start = ymd(2024, 1, 1);
        let short: Vec<_> = (0..3).map(|d| on(start + Duration::days(d), "A")).collect();
        let trend = VisitTrend::from_records(&short, 7, 7);
        let capacity = Capacity::from_trend(&trend).unwrap();
        assert_eq!(capacity.peak_daily_visits, 1.);
        assert_eq!(capacity.beds, 20);
    }

    #[test]
    fn trend_factor_needs_two_windows() {
        assert_eq!(trend_factor(&[1., 2., 3.], 2), 1.);
        assert_eq!(trend_factor(&[2., 2., 1., 1.], 2), 0.5);
        assert_eq!(trend_factor(&[0., 0., 4., 4.], 2), 1.);
    }

    #[test]
    fn localities_ranked_by_volume_then_name() {
        let d1 = ymd(2024, 1, 1);
        let d2 = ymd(2024, 1, 2);
        let records = vec![
            on(d1, "Zeta"),
            on(d2, "Zeta"),
            on(d1, "Alpha"),
            on(d2, "Alpha"),
            on(d2, "Alpha"),
            on(d1, "Beta"),
            on(d2, "Beta"),
        ];
        let trends = locality_trends(&records, 1, 2);
        assert_eq!(trends.len(), 2);
        assert_eq!(&*trends[0].locality, "Alpha");
        assert_eq!(trends[0].total_visits, 3);
        assert_eq!(trends[0].growth_rate, 100.);
        assert_eq!(trends[0].trend, TrendDirection::Increasing);
        assert_eq!(trends[0].average_daily_visits, 1.5);
        assert_eq!(&*trends[1].locality, "Beta");
        assert_eq!(trends[1].trend, TrendDirection::Stable);
    }
}
