// Entry point: load the campaign table, print the text report, then render
// the three chart figures. Any failure ends the run with a non-zero status.
mod aggregate;
mod config;
mod error;
mod figures;
mod loader;
mod palette;
mod render;
mod reports;
mod types;
mod util;

use config::Settings;
use error::Result;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn run(settings: &Settings) -> Result<()> {
    let table = loader::load_campaigns(&settings.input_path)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    reports::write_report(&table, &mut out)?;
    reports::write_charts_banner(&mut out)?;
    out.flush()?;

    let dates = table.coerce_dates()?;
    let figures = figures::build_figures(&table.records, &dates);
    let mut saved = Vec::with_capacity(figures.len());
    for (idx, spec) in figures.iter().enumerate() {
        let path = render::render_figure(spec, &settings.output_dir, settings.dpi)?;
        info!(
            path = %path.display(),
            panels = spec.panels.len(),
            "saved figure"
        );
        reports::write_figure_saved(&mut out, idx, spec.file_name)?;
        out.flush()?;
        saved.push((spec.file_name.to_string(), spec.description.to_string()));
    }

    reports::write_closing(&mut out, &saved)?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let settings = Settings::default();
    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "analysis aborted");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
