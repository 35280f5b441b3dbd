//! When patients arrive: hour of day and calendar month.
use crate::{
    aggregate::{trend::mean, LabelCount},
    PatientRecord,
};
use chrono::Timelike;
use serde::Serialize;
use std::collections::BTreeMap;

/// An hour is a rush hour when it is this much busier than the average busy hour.
pub const RUSH_FACTOR: f64 = 1.2;
/// How many hours [`PeakTimes::busiest_hours`] lists.
pub const BUSIEST_HOURS: usize = 5;

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct HourCount {
    /// 0 to 23.
    pub hour: u32,
    pub visits: usize,
    /// Share of the visits with a known time of day.
    pub percentage: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum RushIntensity {
    High,
    Medium,
}

/// A run of consecutive rush hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RushPeriod {
    pub start_hour: u32,
    /// Inclusive.
    pub end_hour: u32,
    pub total_visits: usize,
    pub intensity: RushIntensity,
}

impl RushPeriod {
    fn new(start_hour: u32, end_hour: u32, total_visits: usize, average: f64) -> Self {
        RushPeriod {
            start_hour,
            end_hour,
            total_visits,
            intensity: if total_visits as f64 > average * 2. {
                RushIntensity::High
            } else {
                RushIntensity::Medium
            },
        }
    }

    /// e.g. `09:00 - 10:59`.
    pub fn label(&self) -> String {
        format!("{:02}:00 - {:02}:59", self.start_hour, self.end_hour)
    }
}

/// Rush periods in a 24-hour histogram.
///
/// The average only counts hours that saw any visits, so a quiet night doesn't make every
/// daytime hour look like a rush.
pub fn rush_periods(hourly: &[usize; 24]) -> Vec<RushPeriod> {
    let busy: Vec<f64> = hourly
        .iter()
        .filter(|visits| **visits > 0)
        .map(|visits| *visits as f64)
        .collect();
    if busy.is_empty() {
        return Vec::new();
    }
    let average = mean(&busy);

    let mut periods = Vec::new();
    let mut current: Option<(u32, u32, usize)> = None;
    for (hour, visits) in (0u32..).zip(hourly.iter().copied()) {
        if visits as f64 > average * RUSH_FACTOR {
            current = Some(match current {
                Some((start, _, total)) => (start, hour, total + visits),
                None => (hour, hour, visits),
            });
        } else if let Some((start, end, total)) = current.take() {
            periods.push(RushPeriod::new(start, end, total, average));
        }
    }
    // a rush running up to midnight
    if let Some((start, end, total)) = current {
        periods.push(RushPeriod::new(start, end, total, average));
    }
    periods
}

/// Arrival patterns by hour and by month.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeakTimes {
    /// All 24 hours, midnight first. Only records with an arrival time count.
    pub hourly: Vec<HourCount>,
    /// Busiest first, ties to the earlier hour. Hours without visits are left out.
    pub busiest_hours: Vec<HourCount>,
    pub peak_hour: Option<HourCount>,
    pub rush_periods: Vec<RushPeriod>,
    /// `YYYY-MM`, oldest first. Records with only an admission date count here too.
    pub monthly: Vec<LabelCount>,
    pub peak_month: Option<LabelCount>,
}

impl PeakTimes {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PatientRecord>) -> Self {
        let mut hourly = [0usize; 24];
        let mut monthly: BTreeMap<String, usize> = BTreeMap::new();
        for rec in records {
            if let Some(ts) = rec.timestamp {
                hourly[ts.hour() as usize] += 1;
            }
            if let Some(arrived) = rec.arrived_at() {
                *monthly
                    .entry(arrived.format("%Y-%m").to_string())
                    .or_insert(0) += 1;
            }
        }

        let timed: usize = hourly.iter().sum();
        let hours: Vec<HourCount> = (0u32..)
            .zip(hourly)
            .map(|(hour, visits)| HourCount {
                hour,
                visits,
                percentage: super::ratio(visits as f64 * 100., timed as f64),
            })
            .collect();
        let mut busiest_hours: Vec<HourCount> =
            hours.iter().filter(|h| h.visits > 0).copied().collect();
        // stable, so ties stay in hour order
        busiest_hours.sort_by(|a, b| b.visits.cmp(&a.visits));
        busiest_hours.truncate(BUSIEST_HOURS);

        let monthly: Vec<LabelCount> = monthly
            .into_iter()
            .map(|(month, count)| LabelCount::new(month, count))
            .collect();

        PeakTimes {
            peak_hour: busiest_hours.first().copied(),
            rush_periods: rush_periods(&hourly),
            peak_month: super::trend::peak(&monthly).cloned(),
            hourly: hours,
            busiest_hours,
            monthly,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::record;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, hour: u32) -> PatientRecord {
        let mut rec = record("HMS-2024-X");
        rec.admission_date = NaiveDate::from_ymd_opt(y, m, d);
        rec.timestamp = rec.admission_date.and_then(|d| d.and_hms_opt(hour, 15, 0));
        rec
    }

    #[test]
    fn rush_hours_merge_into_periods() {
        let mut hourly = [0usize; 24];
        hourly[9] = 10;
        hourly[10] = 10;
        hourly[14] = 2;
        hourly[20] = 2;
        hourly[23] = 8;
        // busy hours average 6.4, so anything above 7.68 is a rush
        let periods = rush_periods(&hourly);
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].label(), "09:00 - 10:59");
        assert_eq!(periods[0].total_visits, 20);
        assert_eq!(periods[0].intensity, RushIntensity::High);
        assert_eq!(periods[1].label(), "23:00 - 23:59");
        assert_eq!(periods[1].total_visits, 8);
        assert_eq!(periods[1].intensity, RushIntensity::Medium);

        assert!(rush_periods(&[0; 24]).is_empty());
        // a flat day has no rush
        assert!(rush_periods(&[3; 24]).is_empty());
    }

    #[test]
    fn hours_and_months() {
        let mut records = vec![
            at(2024, 1, 8, 9),
            at(2024, 1, 9, 9),
            at(2024, 2, 1, 9),
            at(2024, 2, 2, 14),
            at(2024, 2, 3, 14),
            at(2024, 2, 4, 22),
        ];
        // an admission date without a time counts by month only
        let mut dated = record("HMS-2024-Y");
        dated.admission_date = NaiveDate::from_ymd_opt(2024, 2, 5);
        records.push(dated);
        let mut undated = record("HMS-2024-Z");
        undated.admission_date = None;
        records.push(undated);

        let peaks = PeakTimes::from_records(&records);
        assert_eq!(peaks.hourly.len(), 24);
        assert_eq!(peaks.hourly.iter().map(|h| h.visits).sum::<usize>(), 6);
        assert_eq!(peaks.hourly[9].percentage, 50.);
        let busiest: Vec<_> = peaks.busiest_hours.iter().map(|h| h.hour).collect();
        assert_eq!(busiest, [9, 14, 22]);
        assert_eq!(peaks.peak_hour.map(|h| h.hour), Some(9));
        // average busy hour is 2, so only 09:00 is a rush
        assert_eq!(peaks.rush_periods.len(), 1);
        assert_eq!(peaks.rush_periods[0].start_hour, 9);

        let months: Vec<_> = peaks
            .monthly
            .iter()
            .map(|m| (m.label.to_string(), m.count))
            .collect();
        assert_eq!(
            months,
            [("2024-01".to_string(), 2), ("2024-02".to_string(), 5)]
        );
        assert_eq!(peaks.peak_month.unwrap().label.as_ref(), "2024-02");
    }

    #[test]
    fn no_times_no_peaks() {
        let peaks = PeakTimes::from_records(&Vec::<PatientRecord>::new());
        assert!(peaks.busiest_hours.is_empty());
        assert_eq!(peaks.peak_hour, None);
        assert!(peaks.rush_periods.is_empty());
        assert_eq!(peaks.peak_month, None);
        assert!(peaks.hourly.iter().all(|h| h.percentage == 0.));
    }
}
