use clap::Parser;
use hms_analysis::{
    aggregate::SeverityStatus, config::DEFAULT_CONFIG_PATH, header, report, Aggregator, Config,
    CsvStore, RecordStore,
};
use qu::ick_use::*;
use std::path::PathBuf;

#[derive(Parser)]
struct Opt {
    /// The configuration file to use
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Print the whole summary as JSON
    #[clap(long)]
    json: bool,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = Config::load(&opt.config)?;
    let patients = CsvStore::from_config(&config).load_all()?;
    let today = chrono::Local::now().date_naive();
    let summary = Aggregator::new(config.analysis.clone()).summarise(&patients, today);

    if opt.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for (title, table) in report::insight_tables(&summary) {
        header(title);
        println!("{}", table);
    }
    if let Some(day) = summary.visits.peak_weekday() {
        println!("busiest weekday: {} ({} visits)", day.label, day.count);
    }
    if let Some(season) = summary.visits.peak_season() {
        println!("busiest season: {} ({} visits)", season.label, season.count);
    }
    if let Some(hour) = summary.peak_times.peak_hour {
        println!("busiest hour: {:02}:00 ({} visits)", hour.hour, hour.visits);
    }
    if let Some(month) = &summary.peak_times.peak_month {
        println!("busiest month: {} ({} visits)", month.label, month.count);
    }
    println!(
        "visit growth rate: {:.1}% ({:?})",
        summary.visits.growth_rate, summary.visits.trend_direction
    );
    for alert in summary
        .severity_trends
        .iter()
        .filter(|trend| trend.status == SeverityStatus::Alert)
    {
        event!(
            Level::WARN,
            "{} cases on alert: {} of {} in the last {} days",
            alert.severity,
            alert.recent_cases,
            alert.total_cases,
            config.analysis.recent_days
        );
    }
    Ok(())
}
