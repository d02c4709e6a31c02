use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use clap::Parser;
use eyre::{Result, WrapErr};
use rdb_backend::{resolver::Finalize, Intensities, InstrumentationCollector};
use yansi::Paint;

/// CLI arguments for `rdb intensities`.
#[derive(Clone, Debug, Parser)]
pub struct IntensitiesArgs {
    /// The captured engine log, one record per line.
    pub log_file: PathBuf,

    /// The directory to write the intensity reports to.
    #[arg(long, short, default_value = ".")]
    pub out: PathBuf,
}

impl IntensitiesArgs {
    pub fn run(self) -> Result<()> {
        let intensities = collect(&self.log_file, &self.out)?;
        if intensities.is_empty() {
            println!("{}", "no intensity record found".yellow());
            return Ok(());
        }

        println!("{}", "Computation Kind".bold());
        for (kind, intensity) in intensities.computation_rows() {
            println!("  {kind:<28} {intensity}");
        }
        println!("{}", "Memory Kind".bold());
        for (kind, intensity) in intensities.memory_rows() {
            println!("  {kind:<28} {intensity}");
        }
        Ok(())
    }
}

/// Replay `log_file` through a collector reporting to `out`, and return the final snapshot.
fn collect(log_file: &Path, out: &Path) -> Result<Intensities> {
    let file = File::open(log_file)
        .wrap_err_with(|| format!("failed to open {}", log_file.display()))?;

    let mut collector = InstrumentationCollector::new(out);
    io::copy(&mut BufReader::new(file), &mut collector)?;
    debug!("{} intensity records in {}", collector.records(), log_file.display());

    collector.finalize()?;
    Ok(collector.snapshot())
}
