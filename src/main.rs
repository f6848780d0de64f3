//! alertmanager client that keeps track of active alerts for a dashboard
//!
//! Features:
//! - detects the alertmanager version and picks the matching api mapper
//! - normalizes alert groups of all supported api versions into one schema
//! - exposes prometheus metrics about the polls

use anyhow::{Context, Result};

mod log;
mod mapper;
mod models;
mod poller;
mod settings;
mod telemetry_endpoint;
mod transport;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	log::setup_logging().context("could not setup logging")?;

	tokio::spawn(async {
		if let Err(err) = telemetry_endpoint::run_telemetry_endpoint().await {
			tracing::error!("{:#}", err);
		}
	});

	poller::run().await.context("poller crashed")
}
