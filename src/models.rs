//! internal alert representation handed to the dashboard, independent of the
//! alertmanager api version the data was fetched from
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// a single normalized alert
pub struct Alert {
	/// name of the receiver the alert was routed to
	pub receiver: String,
	pub annotations: HashMap<String, String>,
	pub labels: HashMap<String, String>,
	pub starts_at: DateTime<Utc>,
	pub ends_at: DateTime<Utc>,
	#[serde(rename = "generatorURL")]
	pub generator_url: String,
	/// alert state as reported by alertmanager (e.g. `active`, `suppressed`)
	pub state: String,
	/// ids of the silences muting this alert, never absent
	pub silenced_by: Vec<String>,
	/// fingerprints of the alerts inhibiting this alert, never absent
	pub inhibited_by: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// alerts sharing the same group labels and receiver
pub struct AlertGroup {
	pub receiver: String,
	pub labels: HashMap<String, String>,
	pub alerts: Vec<Alert>,
}

impl AlertGroup {
	/// total number of alerts over all `groups`
	pub fn count_alerts(groups: &[AlertGroup]) -> usize {
		groups.iter().map(|group| group.alerts.len()).sum()
	}
}
