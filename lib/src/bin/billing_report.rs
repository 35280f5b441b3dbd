use clap::Parser;
use hms_analysis::{
    config::DEFAULT_CONFIG_PATH,
    header,
    report::{billing_html, pairs_table, BillingSummary, FinancialReport, ReportPeriod},
    Aggregator, Config, CsvStore, RecordStore,
};
use qu::ick_use::*;
use std::{fs, path::PathBuf};

#[derive(Parser)]
struct Opt {
    /// The configuration file to use
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Also export a financial report for the current `daily` or `monthly` period
    #[clap(short, long)]
    period: Option<ReportPeriod>,
    /// Where to write the export. Defaults to the configured export directory.
    #[clap(short, long)]
    out_dir: Option<PathBuf>,
    /// Also write the report rows as an HTML table fragment next to the CSV
    #[clap(long, requires = "period")]
    html: bool,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = Config::load(&opt.config)?;
    let patients = CsvStore::from_config(&config).load_all()?;
    let now = chrono::Local::now().naive_local();
    let aggregator = Aggregator::new(config.analysis.clone());
    let summary = aggregator.summarise(&patients, now.date());

    header("Billing summary");
    let billing = BillingSummary::from(&summary);
    println!("{}", pairs_table(("Statistic", "Value"), billing.pairs()));
    println!("{}", billing.status_table());

    if let Some(period) = opt.period {
        let report = FinancialReport::build(&aggregator, &patients, period, now);
        header(&report.title);
        println!("{}", pairs_table(("Statistic", "Value"), report.pairs()));
        if report.rows.is_empty() {
            event!(Level::WARN, "no patients admitted in this {} period", period);
        }
        let dir = opt.out_dir.unwrap_or_else(|| config.export.dir.clone());
        let path = report.export(dir)?;
        println!("report written to \"{}\"", path.display());
        if opt.html {
            let html_path = path.with_extension("html");
            fs::write(&html_path, billing_html(&report.rows))
                .with_context(|| format!("writing \"{}\"", html_path.display()))?;
            println!("html written to \"{}\"", html_path.display());
        }
    }
    Ok(())
}
