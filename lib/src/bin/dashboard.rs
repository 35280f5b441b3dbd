use clap::Parser;
use hms_analysis::{
    config::DEFAULT_CONFIG_PATH, header, report, Aggregator, Config, CsvStore, EmergencyQueue,
    Patients, RecordStore,
};
use qu::ick_use::*;
use std::path::PathBuf;

#[derive(Parser)]
struct Opt {
    /// The configuration file to use
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Print the statistics and chart series as JSON instead of tables
    #[clap(long)]
    json: bool,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = Config::load(&opt.config)?;
    let patients = CsvStore::from_config(&config).load_all()?;
    let today = chrono::Local::now().date_naive();
    let summary = Aggregator::new(config.analysis.clone()).summarise(&patients, today);
    let stats = report::DashboardStats::from(&summary);

    if opt.json {
        let out = serde_json::json!({
            "stats": stats,
            "charts": report::Charts::from(&summary),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    header("Dashboard");
    println!("{}", stats.term_table());

    header("Emergency queue");
    let queue = EmergencyQueue::from_patients(&patients);
    if queue.is_empty() {
        println!("no active emergencies");
    }
    for case in queue.into_sorted_vec() {
        println!(
            "[{}] {} {} ({}) since {}",
            case.priority.rank(),
            case.patient_id,
            case.name,
            case.condition,
            case.formatted_time()
        );
    }

    header("Recent patients");
    let mut recent: Vec<_> = patients.iter_ref().collect();
    recent.sort_by(|a, b| b.arrived_at().cmp(&a.arrived_at()));
    let recent: Patients = recent.into_iter().take(10).cloned().collect();
    println!("{}", recent.term_table());
    Ok(())
}
