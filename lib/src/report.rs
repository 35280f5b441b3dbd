//! Projections of a [`Summary`] for people: terminal tables, CSV exports, chart series and
//! HTML fragments.
//!
//! Nothing here computes statistics. Everything numeric comes from the aggregator.
use crate::{
    aggregate::{Counts, Financials, LabelCount, Summary},
    util, Aggregator, ArcStr, PatientId, PatientRecord, Patients, PaymentStatus, Result,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use qu::ick_use::*;
use serde::Serialize;
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};
use term_data_table::{Cell, Row, Table};

/// Columns of the billing CSV export, in order.
pub const BILLING_COLUMNS: [&str; 8] = [
    "Patient ID",
    "Name",
    "Admission Date",
    "Bill Amount",
    "Amount Paid",
    "Outstanding Amount",
    "Payment Status",
    "Insurance Coverage",
];

/// A two-column term table of label/value pairs.
pub fn pairs_table<'a>(
    headers: (&'static str, &'static str),
    pairs: impl IntoIterator<Item = (&'a str, String)>,
) -> Table<'static> {
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from(headers.0))
            .with_cell(Cell::from(headers.1)),
    );
    for (label, value) in pairs {
        table.add_row(
            Row::new()
                .with_cell(Cell::from(label.to_string()))
                .with_cell(Cell::from(value)),
        );
    }
    table
}

/// Counts with their share of `total`.
pub fn counts_table<'a>(
    header: &'static str,
    counts: impl IntoIterator<Item = (&'a str, usize)>,
    total: usize,
) -> Table<'static> {
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from(header))
            .with_cell(Cell::from("Count"))
            .with_cell(Cell::from("Percentage")),
    );
    for (label, count) in counts {
        table.add_row(
            Row::new()
                .with_cell(Cell::from(label.to_string()))
                .with_cell(Cell::from(count.to_string()))
                .with_cell(Cell::from(format!(
                    "{:.1}%",
                    crate::aggregate::ratio(count as f64, total as f64) * 100.
                ))),
        );
    }
    table
}

fn label_counts(counts: &[LabelCount]) -> impl Iterator<Item = (&str, usize)> {
    counts.iter().map(|c| (&*c.label, c.count))
}

fn map_counts(counts: &Counts) -> impl Iterator<Item = (&str, usize)> {
    counts.iter().map(|(label, count)| (&**label, *count))
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_patients: usize,
    pub emergency_cases: usize,
    /// Money actually collected.
    pub total_revenue: f64,
    pub average_bill: f64,
    pub collection_rate: f64,
    pub total_billed: f64,
    pub total_outstanding: f64,
    pub data_quality: f64,
}

impl From<&Summary> for DashboardStats {
    fn from(summary: &Summary) -> Self {
        let fin = &summary.financials;
        DashboardStats {
            total_patients: summary.total_patients,
            emergency_cases: summary.active_emergencies,
            total_revenue: fin.total_paid,
            average_bill: fin.average_bill,
            collection_rate: fin.collection_rate,
            total_billed: fin.total_billed,
            total_outstanding: fin.total_outstanding,
            data_quality: summary.data_quality,
        }
    }
}

impl DashboardStats {
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total patients", self.total_patients.to_string()),
            ("Emergency cases", self.emergency_cases.to_string()),
            ("Total revenue", format!("{:.2}", self.total_revenue)),
            ("Average bill", format!("{:.2}", self.average_bill)),
            ("Collection rate", format!("{:.1}%", self.collection_rate)),
            ("Total billed", format!("{:.2}", self.total_billed)),
            ("Total outstanding", format!("{:.2}", self.total_outstanding)),
            ("Data quality", format!("{:.1}", self.data_quality)),
        ]
    }

    pub fn term_table(&self) -> Table<'static> {
        pairs_table(("Statistic", "Value"), self.pairs())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingSummary {
    pub total_patients: usize,
    pub total_billed: f64,
    pub average_bill: f64,
    pub total_paid: f64,
    pub total_outstanding: f64,
    pub collection_rate: f64,
    pub payment_status_counts: Counts,
    pub insured_count: usize,
    pub non_insured_count: usize,
    pub unpaid_amount: f64,
    pub overdue_amount: f64,
}

impl From<&Summary> for BillingSummary {
    fn from(summary: &Summary) -> Self {
        let fin = &summary.financials;
        BillingSummary {
            total_patients: summary.total_patients,
            total_billed: fin.total_billed,
            average_bill: fin.average_bill,
            total_paid: fin.total_paid,
            total_outstanding: fin.total_outstanding,
            collection_rate: fin.collection_rate,
            payment_status_counts: summary.payments.counts.clone(),
            insured_count: summary.insurance.insured,
            non_insured_count: summary.insurance.uninsured,
            unpaid_amount: summary.payments.unpaid_amount,
            overdue_amount: summary.payments.overdue_amount,
        }
    }
}

impl BillingSummary {
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total patients", self.total_patients.to_string()),
            ("Total billed", format!("{:.2}", self.total_billed)),
            ("Average bill", format!("{:.2}", self.average_bill)),
            ("Total paid", format!("{:.2}", self.total_paid)),
            ("Total outstanding", format!("{:.2}", self.total_outstanding)),
            ("Collection rate", format!("{:.1}%", self.collection_rate)),
            ("Insured", self.insured_count.to_string()),
            ("Not insured", self.non_insured_count.to_string()),
            ("Unpaid amount", format!("{:.2}", self.unpaid_amount)),
            ("Overdue amount", format!("{:.2}", self.overdue_amount)),
        ]
    }

    pub fn status_table(&self) -> Table<'static> {
        counts_table(
            "Payment status",
            map_counts(&self.payment_status_counts),
            self.total_patients,
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ReportPeriod {
    Daily,
    Monthly,
}

impl ReportPeriod {
    /// Whether a patient admitted on `admitted` falls in the period containing `day`.
    pub fn contains(self, day: NaiveDate, admitted: NaiveDate) -> bool {
        match self {
            ReportPeriod::Daily => admitted == day,
            ReportPeriod::Monthly => admitted.year() == day.year() && admitted.month() == day.month(),
        }
    }

    pub fn select(self, patients: &Patients, day: NaiveDate) -> Patients {
        patients.filter(|rec| rec.admission_date.map_or(false, |d| self.contains(day, d)))
    }

    pub fn name(self) -> &'static str {
        match self {
            ReportPeriod::Daily => "daily",
            ReportPeriod::Monthly => "monthly",
        }
    }

    fn title(self, day: NaiveDate) -> String {
        match self {
            ReportPeriod::Daily => format!("Daily Financial Report - {}", day.format("%Y-%m-%d")),
            ReportPeriod::Monthly => format!("Monthly Financial Report - {}", day.format("%B %Y")),
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = Error;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(ReportPeriod::Daily),
            "monthly" => Ok(ReportPeriod::Monthly),
            _ => bail!("expected \"daily\" or \"monthly\", found \"{}\"", input),
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One line of the billing export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingRow {
    pub patient_id: PatientId,
    pub name: ArcStr,
    pub admission_date: Option<NaiveDate>,
    pub bill_amount: f64,
    pub amount_paid: f64,
    pub outstanding_amount: f64,
    pub payment_status: PaymentStatus,
    pub insurance_coverage: bool,
}

impl From<&PatientRecord> for BillingRow {
    fn from(rec: &PatientRecord) -> Self {
        BillingRow {
            patient_id: rec.patient_id.clone(),
            name: rec.name.clone(),
            admission_date: rec.admission_date,
            bill_amount: rec.bill_amount,
            amount_paid: rec.amount_paid,
            outstanding_amount: rec.outstanding_amount,
            payment_status: rec.payment_status.clone(),
            insurance_coverage: rec.insurance_coverage,
        }
    }
}

impl BillingRow {
    /// The cells of this row, formatted for export.
    pub fn cells(&self) -> [String; 8] {
        [
            self.patient_id.to_string(),
            self.name.to_string(),
            self.admission_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            format!("{:.2}", self.bill_amount),
            format!("{:.2}", self.amount_paid),
            format!("{:.2}", self.outstanding_amount),
            self.payment_status.to_string(),
            if self.insurance_coverage { "Yes" } else { "No" }.to_string(),
        ]
    }
}

/// Write billing rows as CSV with a header line.
pub fn write_billing_csv<'a>(
    writer: impl io::Write,
    rows: impl IntoIterator<Item = &'a BillingRow>,
) -> Result {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(BILLING_COLUMNS)?;
    for row in rows {
        writer.write_record(row.cells())?;
    }
    writer.flush()?;
    Ok(())
}

/// An HTML table of billing rows.
pub fn billing_html(rows: &[BillingRow]) -> String {
    util::Table::new(rows, |row, _| row.cells())
        .with_headers(BILLING_COLUMNS)
        .to_html()
}

/// A financial report for one day or month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialReport {
    pub title: String,
    pub period: ReportPeriod,
    pub day: NaiveDate,
    pub generated_at: NaiveDateTime,
    pub filename: String,
    pub total_patients: usize,
    /// Over patients admitted in the period.
    pub financials: Financials,
    pub rows: Vec<BillingRow>,
}

impl FinancialReport {
    /// The report for the period containing `now`.
    pub fn build(
        aggregator: &Aggregator,
        patients: &Patients,
        period: ReportPeriod,
        now: NaiveDateTime,
    ) -> Self {
        let day = now.date();
        let selected = period.select(patients, day);
        FinancialReport {
            title: period.title(day),
            period,
            day,
            generated_at: now,
            filename: format!(
                "{}_financial_report_{}.csv",
                period.name(),
                day.format("%Y%m%d")
            ),
            total_patients: selected.len(),
            financials: aggregator.financials(&selected),
            rows: selected.iter_ref().map(BillingRow::from).collect(),
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "Generated at",
                self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            ("Patients", self.total_patients.to_string()),
            ("Total billed", format!("{:.2}", self.financials.total_billed)),
            ("Total paid", format!("{:.2}", self.financials.total_paid)),
            (
                "Total outstanding",
                format!("{:.2}", self.financials.total_outstanding),
            ),
            (
                "Collection rate",
                format!("{:.1}%", self.financials.collection_rate),
            ),
        ]
    }

    /// Write the rows to `<dir>/<filename>`, returning the path written.
    pub fn export(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        let inner = |path: &Path| -> Result {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            if util::path_exists(path)? {
                event!(Level::WARN, "overwriting \"{}\"", path.display());
            }
            let file = fs::File::create(path)?;
            write_billing_csv(io::BufWriter::new(file), &self.rows)
        };
        inner(&path).with_context(|| format!("exporting report to \"{}\"", path.display()))?;
        event!(Level::INFO, "wrote \"{}\"", path.display());
        Ok(path)
    }
}

/// Labels and values ready for a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub title: &'static str,
    pub labels: Vec<ArcStr>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    pub fn from_counts<'a>(
        title: &'static str,
        counts: impl IntoIterator<Item = (&'a str, usize)>,
    ) -> Self {
        let (labels, values) = counts
            .into_iter()
            .map(|(label, count)| (ArcStr::from(label), count as f64))
            .unzip();
        ChartSeries {
            title,
            labels,
            values,
        }
    }
}

/// Every chart the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Charts {
    pub age: ChartSeries,
    pub severity: ChartSeries,
    pub payment_status: ChartSeries,
    pub disease_categories: ChartSeries,
    pub visits: ChartSeries,
    pub visits_trend: ChartSeries,
}

impl From<&Summary> for Charts {
    fn from(summary: &Summary) -> Self {
        let date_labels: Vec<ArcStr> = summary
            .visits
            .dates
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string().into())
            .collect();
        Charts {
            age: ChartSeries::from_counts("Age distribution", label_counts(&summary.age_brackets)),
            severity: ChartSeries::from_counts("Severity", map_counts(&summary.severity)),
            payment_status: ChartSeries::from_counts(
                "Payment status",
                map_counts(&summary.payments.counts),
            ),
            disease_categories: ChartSeries::from_counts(
                "Disease categories",
                label_counts(&summary.disease_categories.categories),
            ),
            visits: ChartSeries {
                title: "Daily visits",
                labels: date_labels.clone(),
                values: summary.visits.visits.iter().map(|v| *v as f64).collect(),
            },
            visits_trend: ChartSeries {
                title: "Visit trend",
                labels: date_labels,
                values: summary.visits.moving_average.clone(),
            },
        }
    }
}

/// Terminal tables for the insight sections of a summary.
pub fn insight_tables(summary: &Summary) -> Vec<(&'static str, Table<'static>)> {
    let mut out = vec![
        (
            "Age brackets",
            counts_table(
                "Age",
                label_counts(&summary.age_brackets),
                summary.total_patients,
            ),
        ),
        (
            "Severity",
            counts_table(
                "Severity",
                map_counts(&summary.severity),
                summary.total_patients,
            ),
        ),
        (
            "Top localities",
            counts_table(
                "Locality",
                label_counts(&summary.localities),
                summary.total_patients,
            ),
        ),
        (
            "Disease categories",
            counts_table(
                "Category",
                label_counts(&summary.disease_categories.categories).chain([(
                    "uncategorised",
                    summary.disease_categories.uncategorised,
                )]),
                summary.total_patients,
            ),
        ),
    ];

    let mut forecast = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Date"))
            .with_cell(Cell::from("Day"))
            .with_cell(Cell::from("Predicted visits"))
            .with_cell(Cell::from("Confidence")),
    );
    for day in &summary.visits.forecast {
        forecast.add_row(
            Row::new()
                .with_cell(Cell::from(day.date.to_string()))
                .with_cell(Cell::from(day.day_name.to_string()))
                .with_cell(Cell::from(day.predicted_visits.to_string()))
                .with_cell(Cell::from(format!("{:?}", day.confidence))),
        );
    }
    out.push(("Visit forecast", forecast));

    let mut localities = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Locality"))
            .with_cell(Cell::from("Visits"))
            .with_cell(Cell::from("Daily average"))
            .with_cell(Cell::from("Growth"))
            .with_cell(Cell::from("Trend")),
    );
    for trend in &summary.locality_trends {
        localities.add_row(
            Row::new()
                .with_cell(Cell::from(trend.locality.to_string()))
                .with_cell(Cell::from(trend.total_visits.to_string()))
                .with_cell(Cell::from(format!("{:.1}", trend.average_daily_visits)))
                .with_cell(Cell::from(format!("{:.1}%", trend.growth_rate)))
                .with_cell(Cell::from(format!("{:?}", trend.trend))),
        );
    }
    out.push(("Locality trends", localities));

    let mut diseases = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Disease"))
            .with_cell(Cell::from("Cases"))
            .with_cell(Cell::from("Prevalence"))
            .with_cell(Cell::from("Risk"))
            .with_cell(Cell::from("Average age"))
            .with_cell(Cell::from("Recent"))
            .with_cell(Cell::from("Trend")),
    );
    for disease in &summary.disease_insights {
        diseases.add_row(
            Row::new()
                .with_cell(Cell::from(disease.disease.to_string()))
                .with_cell(Cell::from(disease.cases.to_string()))
                .with_cell(Cell::from(format!("{:.2}%", disease.prevalence)))
                .with_cell(Cell::from(disease.risk_level.label()))
                .with_cell(Cell::from(format!("{:.1}", disease.average_age)))
                .with_cell(Cell::from(disease.recent_cases.to_string()))
                .with_cell(Cell::from(
                    disease
                        .trend
                        .map(|t| format!("{:?}", t))
                        .unwrap_or_else(|| "-".into()),
                )),
        );
    }
    out.push(("Disease insights", diseases));

    let peaks = &summary.peak_times;
    let mut hours = header_row(["Hour", "Visits", "Share"]);
    for hour in &peaks.busiest_hours {
        hours.add_row(
            Row::new()
                .with_cell(Cell::from(format!("{:02}:00", hour.hour)))
                .with_cell(Cell::from(hour.visits.to_string()))
                .with_cell(Cell::from(format!("{:.1}%", hour.percentage))),
        );
    }
    out.push(("Busiest hours", hours));

    let mut rush = header_row(["Period", "Visits", "Intensity"]);
    for period in &peaks.rush_periods {
        rush.add_row(
            Row::new()
                .with_cell(Cell::from(period.label()))
                .with_cell(Cell::from(period.total_visits.to_string()))
                .with_cell(Cell::from(format!("{:?}", period.intensity))),
        );
    }
    out.push(("Rush periods", rush));

    let mut severities = header_row(["Severity", "Cases", "Recent", "Urgency", "Status"]);
    for trend in &summary.severity_trends {
        severities.add_row(
            Row::new()
                .with_cell(Cell::from(trend.severity.to_string()))
                .with_cell(Cell::from(trend.total_cases.to_string()))
                .with_cell(Cell::from(format!(
                    "{} ({:.1}%)",
                    trend.recent_cases, trend.recent_share
                )))
                .with_cell(Cell::from(trend.urgency_score.to_string()))
                .with_cell(Cell::from(format!("{:?}", trend.status))),
        );
    }
    out.push(("Severity trends", severities));

    let mut correlation =
        header_row(["Disease", "Cases", "Average severity", "Most common", "Risk"]);
    for disease in &summary.severity_correlation {
        correlation.add_row(
            Row::new()
                .with_cell(Cell::from(disease.disease.to_string()))
                .with_cell(Cell::from(disease.cases.to_string()))
                .with_cell(Cell::from(format!("{:.2}", disease.average_score)))
                .with_cell(Cell::from(disease.most_common_severity.to_string()))
                .with_cell(Cell::from(disease.risk.label())),
        );
    }
    out.push(("Severity by disease", correlation));

    let mut demographics = header_row(["Group", "Cases", "Top disease", "Top cases", "Diseases"]);
    let groups = summary.demographics.age_groups.iter();
    for group in groups.chain(&summary.demographics.genders) {
        demographics.add_row(
            Row::new()
                .with_cell(Cell::from(group.group.to_string()))
                .with_cell(Cell::from(group.total_cases.to_string()))
                .with_cell(Cell::from(group.top_disease.to_string()))
                .with_cell(Cell::from(group.top_disease_cases.to_string()))
                .with_cell(Cell::from(group.unique_diseases.to_string())),
        );
    }
    out.push(("Demographics", demographics));

    if let Some(capacity) = &summary.capacity {
        let table = pairs_table(
            ("Measure", "Value"),
            [
                ("Average daily visits", format!("{:.1}", capacity.average_daily_visits)),
                ("Peak daily visits", format!("{:.0}", capacity.peak_daily_visits)),
                ("Beds", capacity.beds.to_string()),
                ("Doctors", capacity.doctors.to_string()),
                ("Nurses", capacity.nurses.to_string()),
                ("Admin staff", capacity.admin_staff.to_string()),
                ("Peak utilization", format!("{:.1}%", capacity.peak_utilization)),
                ("Average utilization", format!("{:.1}%", capacity.average_utilization)),
            ],
        );
        out.push(("Capacity", table));
    }
    out
}

fn header_row<const N: usize>(headers: [&'static str; N]) -> Table<'static> {
    Table::new().with_row(
        headers
            .into_iter()
            .fold(Row::new(), |row, h| row.with_cell(Cell::from(h))),
    )
}
