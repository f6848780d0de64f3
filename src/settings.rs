use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::Config;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};

use crate::{log::LogSettings, telemetry_endpoint::TelemetryEndpointSettings};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	/// time between two polls of the alertmanager api
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub poll_interval: Duration,
	pub alertmanager: UpstreamSettings,
	pub log: LogSettings,
	pub telemetry_endpoint: TelemetryEndpointSettings,
}

/// where and how to reach the alertmanager instance
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSettings {
	/// base uri of the alertmanager, api paths are joined onto it
	pub uri: String,
	/// timeout of a single http request against the alertmanager
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub timeout: Duration,
}

impl Settings {
	pub fn global() -> &'static Self {
		SETTINGS.get_or_init(|| {
			match Self::load().context("failed to load config and command line arguments") {
				Ok(settings) => settings,
				Err(err) => {
					// tracing wasn't setup yet
					panic!("{:#?}", err);
				}
			}
		})
	}

	fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			])
			.get_matches();

		let config_path = opts.value_of("config").context("missing config path")?;

		let mut settings: Settings = Config::builder()
			.add_source(config::File::with_name(config_path))
			.build()
			.context("can't load config")?
			.try_deserialize()
			.context("can't parse config")?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		Ok(settings)
	}
}
