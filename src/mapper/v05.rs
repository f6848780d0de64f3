//! mapper for the alertmanager 0.5 api
//!
//! Before 0.6 alertmanager didn't report an alert state or the full list of
//! suppressing silences. An alert carries the id of at most one silence and a
//! flag telling if it's inhibited.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull};

use super::{IntoAlert, MapperError};
use crate::{
	models::{Alert, AlertGroup},
	settings::UpstreamSettings,
};

const SUPPORTED_VERSIONS: &str = ">=0.5.0, <0.6.0";

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamAlert {
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	annotations: HashMap<String, String>,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	labels: HashMap<String, String>,
	starts_at: DateTime<Utc>,
	ends_at: DateTime<Utc>,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(rename = "generatorURL", default)]
	generator_url: String,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	inhibited: bool,
	/// id of the silence muting this alert, empty if not silenced
	#[serde(default)]
	silenced: Option<String>,
}

impl IntoAlert for UpstreamAlert {
	fn into_alert(self, receiver: &str) -> Alert {
		let silenced_by: Vec<String> = self.silenced.into_iter().filter(|id| !id.is_empty()).collect();

		let state = if self.inhibited || !silenced_by.is_empty() { "suppressed" } else { "active" };

		Alert {
			receiver: receiver.to_owned(),
			annotations: self.annotations,
			labels: self.labels,
			starts_at: self.starts_at,
			ends_at: self.ends_at,
			generator_url: self.generator_url,
			state: state.to_owned(),
			silenced_by,
			inhibited_by: Vec::new(),
		}
	}
}

/// [super::AlertMapper] for alertmanager 0.5.x
#[derive(Debug, Clone)]
pub struct AlertMapper {
	settings: UpstreamSettings,
	client: reqwest::Client,
}

impl AlertMapper {
	pub fn new(settings: UpstreamSettings, client: reqwest::Client) -> Self {
		Self { settings, client }
	}
}

#[async_trait]
impl super::AlertMapper for AlertMapper {
	fn is_supported(&self, version: &str) -> bool {
		super::version_matches(SUPPORTED_VERSIONS, version)
	}

	async fn get_alerts(&self) -> Result<Vec<AlertGroup>, MapperError> {
		super::fetch_alert_groups::<UpstreamAlert>(&self.settings, &self.client).await
	}
}
