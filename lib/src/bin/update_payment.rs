use clap::Parser;
use hms_analysis::{
    config::DEFAULT_CONFIG_PATH, store, Config, CsvStore, PaymentStatus, StoreError,
};
use qu::ick_use::*;
use std::path::PathBuf;

#[derive(Parser)]
struct Opt {
    /// The configuration file to use
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// The patient to update
    id: String,
    /// The total amount paid so far
    #[clap(long, conflicts_with = "add")]
    paid: Option<f64>,
    /// A new payment, added to what has already been paid
    #[clap(long)]
    add: Option<f64>,
    /// Override the derived payment status (only with --paid)
    #[clap(long, requires = "paid")]
    status: Option<PaymentStatus>,
    /// Also record the patient as discharged today
    #[clap(long)]
    discharge: bool,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = Config::load(&opt.config)?;
    let store = CsvStore::from_config(&config);

    let updated = match (opt.paid, opt.add) {
        (Some(paid), _) => Some(store::update_payment(&store, &opt.id, paid, opt.status)),
        (None, Some(add)) => Some(store::record_payment(&store, &opt.id, add)),
        (None, None) => None,
    };
    match updated {
        Some(Ok(rec)) => println!(
            "{}: paid {:.2}, outstanding {:.2} ({})",
            rec.patient_id, rec.amount_paid, rec.outstanding_amount, rec.payment_status
        ),
        Some(Err(StoreError::NotFound(id))) => bail!("there is no patient with ID \"{}\"", id),
        Some(Err(e)) => return Err(e).context("updating payment"),
        None if !opt.discharge => bail!("nothing to do: give --paid, --add or --discharge"),
        None => (),
    }

    if opt.discharge {
        let today = chrono::Local::now().date_naive();
        let rec = store::discharge(&store, &opt.id, today)?;
        println!("{} discharged on {}", rec.patient_id, today);
    }
    Ok(())
}
