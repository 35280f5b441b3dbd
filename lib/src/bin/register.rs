use clap::Parser;
use hms_analysis::{
    config::DEFAULT_CONFIG_PATH, store, Config, CsvStore, NewPatient, PaymentStatus, Severity,
};
use qu::ick_use::*;
use std::path::PathBuf;

#[derive(Parser)]
struct Opt {
    /// The configuration file to use
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[clap(short, long)]
    name: String,
    #[clap(short, long, default_value_t = 0)]
    age: u8,
    #[clap(short, long, default_value = "")]
    gender: String,
    #[clap(short, long, default_value = "")]
    locality: String,
    #[clap(short, long, default_value = "")]
    severity: Severity,
    #[clap(long, default_value = "")]
    priority_level: String,
    #[clap(long, default_value = "")]
    medical_history: String,
    #[clap(long, default_value_t = 0.)]
    bill_amount: f64,
    #[clap(long, default_value_t = 0.)]
    amount_paid: f64,
    #[clap(long)]
    insured: bool,
    #[clap(long, default_value = "")]
    insurance_details: String,
    /// Derived from the amounts if not given
    #[clap(long)]
    payment_status: Option<PaymentStatus>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    ensure!(!opt.name.trim().is_empty(), "patient name must not be empty");
    ensure!(opt.age <= 120, "age must be between 0 and 120, found {}", opt.age);
    let config = Config::load(&opt.config)?;
    let store = CsvStore::from_config(&config);

    let patient = NewPatient {
        name: opt.name.trim().into(),
        age: opt.age,
        gender: opt.gender.trim().into(),
        locality: opt.locality.trim().into(),
        condition_severity: opt.severity,
        priority_level: opt.priority_level.trim().into(),
        medical_history: opt.medical_history.trim().into(),
        bill_amount: opt.bill_amount,
        amount_paid: opt.amount_paid,
        insurance_coverage: opt.insured,
        insurance_details: opt.insurance_details.trim().into(),
        payment_status: opt.payment_status,
    };
    let rec = store::register(&store, patient, chrono::Local::now().naive_local())?;
    println!("registered {} ({})", rec.patient_id, rec.name);
    println!(
        "bill {:.2}, paid {:.2}, outstanding {:.2} ({})",
        rec.bill_amount, rec.amount_paid, rec.outstanding_amount, rec.payment_status
    );
    Ok(())
}
