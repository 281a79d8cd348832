use std::error::Error;

use tracing::{error, info, span, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::constant::{MILEAGE_THRESHOLD, REPORT_CSV, SUMMARY_JSON};
use crate::config::Settings;
use crate::dataset::Dataset;
use crate::hub::Hub;
use crate::report::{log_summary, print_status_at, print_summary, save_package_csv, save_summary_json, DaySummary};
use crate::simulation::SimulationClock;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            fmt::layer()
                .with_span_events(fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE)
                .pretty(),
        )
        .init();
}

/// Loads the day's dataset, simulates it and writes the reports.
pub async fn run() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let settings = Settings::from_env();

    let dataset = match &settings.data_dir {
        Some(dir) => Dataset::from_dir(dir).await?,
        None => Dataset::reference()?,
    };

    let (mut hub, correction) = {
        let span = span!(Level::INFO, "setup");
        let _guard = span.enter();
        Hub::from_dataset(&dataset, settings.day_start)?
    };
    info!(
        "Starting day at {} with {} packages",
        settings.day_start,
        hub.packages.len()
    );

    let mut clock = SimulationClock::new(settings.day_start, correction);
    let finished = match clock.run(&mut hub) {
        Ok(t) => t,
        Err(e) => {
            error!("Simulation failed: {e}");
            return Err(e.into());
        }
    };

    let summary = DaySummary::from_hub(&hub, finished)?;
    log_summary(&summary, MILEAGE_THRESHOLD);
    print_summary(&summary, MILEAGE_THRESHOLD);

    if let Some(at) = settings.report_at {
        print_status_at(&hub, at)?;
    }

    tokio::fs::create_dir_all(&settings.report_dir).await?;
    save_package_csv(&hub, &settings.report_dir.join(REPORT_CSV))?;
    save_summary_json(&summary, &settings.report_dir.join(SUMMARY_JSON))?;

    Ok(())
}
