use clap::Parser;
use hms_analysis::{config::DEFAULT_CONFIG_PATH, loader, Config};
use qu::ick_use::*;
use std::path::PathBuf;

#[derive(Parser)]
struct Opt {
    /// The configuration file to use
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = Config::load(&opt.config)?;
    if loader::provision(&config.store.path, config.delimiter())? {
        println!("created \"{}\"", config.store.path.display());
    } else {
        println!("\"{}\" already exists", config.store.path.display());
    }
    Ok(())
}
