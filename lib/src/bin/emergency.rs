use clap::{Parser, Subcommand};
use hms_analysis::{
    config::DEFAULT_CONFIG_PATH, store, Config, CsvStore, EmergencyQueue, PatientId,
    RecordStore, Severity,
};
use qu::ick_use::*;
use std::path::PathBuf;
use term_data_table::{Cell, Row, Table};

#[derive(Parser)]
struct Opt {
    /// The configuration file to use
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show active emergencies, most urgent first
    List,
    /// Admit a patient as an emergency, or readmit an existing one
    Add {
        /// Reuse this patient ID. A fresh one is generated if not given.
        #[clap(long)]
        id: Option<String>,
        #[clap(short, long)]
        name: String,
        /// e.g. Critical, High, Moderate
        #[clap(short, long)]
        severity: Severity,
        #[clap(long, default_value = "")]
        condition: String,
    },
    /// Discharge the most urgent active emergency
    Process,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = Config::load(&opt.config)?;
    let store = CsvStore::from_config(&config);
    let now = chrono::Local::now().naive_local();

    match opt.cmd {
        Cmd::List => {
            let queue = EmergencyQueue::from_patients(&store.load_all()?);
            println!("{} active emergencies", queue.size());
            let mut table = Table::new().with_row(
                Row::new()
                    .with_cell(Cell::from("Priority"))
                    .with_cell(Cell::from("Patient ID"))
                    .with_cell(Cell::from("Name"))
                    .with_cell(Cell::from("Severity"))
                    .with_cell(Cell::from("Condition"))
                    .with_cell(Cell::from("Added")),
            );
            for case in queue.into_sorted_vec() {
                table.add_row(
                    Row::new()
                        .with_cell(Cell::from(case.priority.to_string()))
                        .with_cell(Cell::from(case.patient_id.to_string()))
                        .with_cell(Cell::from(case.name.to_string()))
                        .with_cell(Cell::from(case.severity.to_string()))
                        .with_cell(Cell::from(case.condition.to_string()))
                        .with_cell(Cell::from(case.formatted_time())),
                );
            }
            println!("{}", table);
        }
        Cmd::Add {
            id,
            name,
            severity,
            condition,
        } => {
            ensure!(!name.trim().is_empty(), "patient name must not be empty");
            if !severity.is_emergency() {
                event!(
                    Level::WARN,
                    "severity \"{}\" will not put the patient on the emergency list",
                    severity
                );
            }
            let id = id.map(PatientId::from);
            let rec = store::admit_emergency(&store, id, &name, severity, &condition, now)?;
            println!("admitted {} ({})", rec.patient_id, rec.name);
        }
        Cmd::Process => match store::process_next_emergency(&store, now.date())? {
            Some(case) => println!(
                "processed {} {} ({}), priority {}",
                case.patient_id,
                case.name,
                case.condition,
                case.priority.rank()
            ),
            None => println!("no emergencies to process"),
        },
    }
    Ok(())
}
