mod settings;
mod simulation;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

use settings::{DEFAULT_CONFIG_PATH, load_settings};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // an explicit path must exist; the default one may be absent
    let (path, required) = match std::env::args().nth(1) {
        Some(path) => (path, true),
        None => (DEFAULT_CONFIG_PATH.to_string(), false),
    };
    let settings = load_settings(&path, required).with_context(|| format!("loading {}", path))?;

    info!("Two-wheeled robot EKF simulation started.");
    let report = simulation::run(&settings)?;

    if let Some(tick) = report.final_tick() {
        let (x, y, theta) = tick.estimated_pose.to_degrees();
        info!(
            "Finished after {} ticks ({} measurement updates skipped). True pose {}, estimate ({:.2}, {:.2}, {:.2} deg), position error {:.3}, covariance trace {:.4}.",
            tick.step,
            report.rejected_measurements,
            tick.true_pose,
            x,
            y,
            theta,
            report.position_error().unwrap_or_default(),
            tick.covariance.trace()
        );
    } else {
        info!("No ticks requested.");
    }
    Ok(())
}
