//! periodically fetch alerts from the configured alertmanager
use anyhow::{Context, Result};
use prometheus::{IntCounterVec, IntGauge};
use tokio::time::{self, MissedTickBehavior};

use crate::{
	mapper::{self, AlertMapper, MapperError},
	models::AlertGroup,
	settings::{Settings, UpstreamSettings},
};

#[derive(Debug)]
/// prometheus meters for the poller
struct PollMetrics {
	/// total number of polls by result
	polls: IntCounterVec,
	/// number of alert groups seen in the last successful poll
	groups: IntGauge,
	/// number of alerts seen in the last successful poll
	alerts: IntGauge,
}

impl PollMetrics {
	/// construct prometheus meters
	fn new() -> Result<Self, prometheus::Error> {
		use prometheus::{opts, register_int_counter_vec, register_int_gauge};

		let polls = register_int_counter_vec!(
			opts!("polls_total", "total number of alertmanager polls")
				.namespace("alertmapper")
				.subsystem("poller"),
			&["result"]
		)?;

		let groups = register_int_gauge!(opts!(
			"alert_groups",
			"number of alert groups returned by the last successful poll"
		)
		.namespace("alertmapper")
		.subsystem("poller"))?;

		let alerts = register_int_gauge!(opts!(
			"alerts",
			"number of alerts returned by the last successful poll"
		)
		.namespace("alertmapper")
		.subsystem("poller"))?;

		Ok(Self { polls, groups, alerts })
	}

	fn record_success(&self, groups: &[AlertGroup]) {
		self.polls.with_label_values(&["success"]).inc();
		self.groups.set(groups.len() as i64);
		self.alerts.set(AlertGroup::count_alerts(groups) as i64);
	}

	fn record_error(&self, err: &MapperError) {
		let result = match err {
			MapperError::UrlConstruction(_) => "invalid_uri",
			MapperError::Transport(_) => "transport",
			MapperError::Upstream(_) => "upstream",
			MapperError::InvalidVersion(_) | MapperError::UnsupportedVersion(_) => "version",
		};

		self.polls.with_label_values(&[result]).inc();
	}
}

/// Probe the alertmanager version, pick the matching mapper and fetch all
/// alert groups with it
pub async fn poll(
	settings: &UpstreamSettings,
	client: &reqwest::Client,
	mappers: &[Box<dyn AlertMapper>],
) -> Result<Vec<AlertGroup>, MapperError> {
	let version = mapper::get_version(settings, client).await?;
	let mapper = mapper::find_mapper(mappers, &version)?;

	tracing::debug!(%version, "alertmanager version");

	mapper.get_alerts().await
}

/// poll the alertmanager every [Settings::poll_interval]. Failed polls are
/// logged and retried on the next tick.
pub async fn run() -> Result<()> {
	let settings = Settings::global();
	let metrics = PollMetrics::new().context("failed to register poller metrics")?;
	let client = reqwest::Client::new();
	let mappers = mapper::registered_mappers(&settings.alertmanager, &client);

	let mut interval = time::interval(settings.poll_interval);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		interval.tick().await;

		match poll(&settings.alertmanager, &client, &mappers).await {
			Ok(groups) => {
				tracing::info!(
					uri = %settings.alertmanager.uri,
					groups = groups.len(),
					alerts = AlertGroup::count_alerts(&groups),
					"fetched alerts"
				);
				metrics.record_success(&groups);
			}
			Err(err) => {
				tracing::warn!(uri = %settings.alertmanager.uri, "failed to fetch alerts: {}", err);
				metrics.record_error(&err);
			}
		}
	}
}
