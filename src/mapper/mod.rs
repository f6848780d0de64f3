//! Alertmanager changed the schema of its api multiple times. Every supported
//! api version gets its own [AlertMapper] which knows how to fetch alerts from
//! it and how to map them onto [crate::models]. The mapper matching the
//! version an alertmanager reports is picked with [find_mapper].
use std::collections::HashMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use semver::{Version, VersionReq};
use serde::{de::DeserializeOwned, Deserialize};
use serde_with::{serde_as, DefaultOnNull};
use thiserror::Error;

use crate::{
	models::{Alert, AlertGroup},
	settings::UpstreamSettings,
	transport,
};

pub mod v05;
pub mod v061;

/// Errors that can occur while talking to an alertmanager
#[derive(Debug, Error)]
pub enum MapperError {
	/// the configured alertmanager uri can't be turned into an api url
	#[error("invalid alertmanager uri: {0}")]
	UrlConstruction(#[from] url::ParseError),

	/// request failed, timed out, returned a non 2xx status or an
	/// undecodable body
	#[error("alertmanager request failed: {0}")]
	Transport(#[from] reqwest::Error),

	/// alertmanager answered with a status other than `success`
	#[error("{0}")]
	Upstream(String),

	/// alertmanager reported a version that isn't a semantic version
	#[error("invalid alertmanager version: {0}")]
	InvalidVersion(#[from] semver::Error),

	/// no registered mapper supports the reported version
	#[error("unsupported alertmanager version {0}")]
	UnsupportedVersion(String),
}

/// A mapper for one alertmanager api version
#[async_trait]
pub trait AlertMapper: Send + Sync {
	/// Returns true if this mapper can talk to an alertmanager reporting
	/// `version`.
	///
	/// # Panics
	///
	/// `version` has to be a valid semantic version, use [find_mapper] for
	/// untrusted input.
	fn is_supported(&self, version: &str) -> bool;

	/// Fetch all alert groups from the alertmanager
	async fn get_alerts(&self) -> Result<Vec<AlertGroup>, MapperError>;
}

/// every mapper known to us, in lookup order
pub fn registered_mappers(
	settings: &UpstreamSettings,
	client: &reqwest::Client,
) -> Vec<Box<dyn AlertMapper>> {
	vec![
		Box::new(v05::AlertMapper::new(settings.clone(), client.clone())),
		Box::new(v061::AlertMapper::new(settings.clone(), client.clone())),
	]
}

/// Returns the first mapper supporting `version`
pub fn find_mapper<'a>(
	mappers: &'a [Box<dyn AlertMapper>],
	version: &str,
) -> Result<&'a dyn AlertMapper, MapperError> {
	semver::Version::parse(version)?;

	mappers
		.iter()
		.find(|mapper| mapper.is_supported(version))
		.map(|mapper| &**mapper)
		.ok_or_else(|| MapperError::UnsupportedVersion(version.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
	version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusData {
	version_info: VersionInfo,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
	status: String,
	data: Option<StatusData>,
	#[serde(default)]
	error: String,
}

/// Ask the alertmanager which version it is running. The status endpoint
/// kept its shape across all versions we support.
pub async fn get_version(
	settings: &UpstreamSettings,
	client: &reqwest::Client,
) -> Result<String, MapperError> {
	let url = transport::join_url(&settings.uri, "api/v1/status")?;
	let resp: StatusResponse = transport::read_json(client, url, settings.timeout).await?;

	match resp {
		StatusResponse { status, data: Some(data), .. } if status == "success" => {
			Ok(data.version_info.version)
		}
		StatusResponse { error, .. } => Err(MapperError::Upstream(error)),
	}
}

/// Returns true if `version` satisfies `requirement`.
///
/// # Panics
///
/// if either of them can't be parsed
pub(crate) fn version_matches(requirement: &str, version: &str) -> bool {
	#[allow(clippy::expect_used)]
	let requirement = VersionReq::parse(requirement).expect("invalid version requirement");
	#[allow(clippy::expect_used)]
	let version = Version::parse(version).expect("is_supported called with invalid version");

	requirement.matches(&version)
}

/// An alert as decoded from a specific api version
pub(crate) trait IntoAlert: DeserializeOwned + Send {
	/// map onto the internal representation, `receiver` is the receiver of
	/// the block the alert was found in
	fn into_alert(self, receiver: &str) -> Alert;
}

// Alertmanager encodes empty slices and maps as `null`, so every collection
// and string below decodes `null` as its default.

#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RouteOpts {
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	pub(crate) receiver: String,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "A: Deserialize<'de>"))]
pub(crate) struct Block<A> {
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	pub(crate) alerts: Vec<A>,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	pub(crate) route_opts: RouteOpts,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "A: Deserialize<'de>"))]
pub(crate) struct AlertsGroup<A> {
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	pub(crate) labels: HashMap<String, String>,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	pub(crate) blocks: Vec<Block<A>>,
}

/// response of `GET api/v1/alerts/groups`, the alert shape differs between
/// api versions
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "A: Deserialize<'de>"))]
pub(crate) struct AlertsGroupsResponse<A> {
	pub(crate) status: String,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	pub(crate) data: Vec<AlertsGroup<A>>,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(default)]
	pub(crate) error: String,
}

/// Re-key the nested group → block → alert structure by receiver and flatten
/// it. Every block becomes one [AlertGroup] carrying the labels of the group
/// it was found in.
pub(crate) fn normalize<A: IntoAlert>(data: Vec<AlertsGroup<A>>) -> Vec<AlertGroup> {
	let mut receivers = ReceiverGroups::new();

	for group in data {
		for block in group.blocks {
			let receiver = block.route_opts.receiver;
			receivers.register(&receiver);

			let alerts = block.alerts.into_iter().map(|alert| alert.into_alert(&receiver)).collect();

			receivers.push(AlertGroup { receiver, labels: group.labels.clone(), alerts });
		}
	}

	receivers.into_groups()
}

/// Fetch `api/v1/alerts/groups`, decoding alerts as `A`
pub(crate) async fn fetch_alert_groups<A: IntoAlert>(
	settings: &UpstreamSettings,
	client: &reqwest::Client,
) -> Result<Vec<AlertGroup>, MapperError> {
	let url = transport::join_url(&settings.uri, "api/v1/alerts/groups")?;

	let resp: AlertsGroupsResponse<A> = transport::read_json(client, url, settings.timeout).await?;

	if resp.status != "success" {
		return Err(MapperError::Upstream(resp.error));
	}

	Ok(normalize(resp.data))
}

/// Alert groups accumulated per receiver while walking an api response.
/// Receivers are kept in the order they were first seen.
#[derive(Debug, Default)]
pub(crate) struct ReceiverGroups {
	receivers: IndexMap<String, Vec<AlertGroup>>,
}

impl ReceiverGroups {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// register `receiver` if we haven't seen it yet
	pub(crate) fn register(&mut self, receiver: &str) {
		if !self.receivers.contains_key(receiver) {
			self.receivers.insert(receiver.to_owned(), Vec::new());
		}
	}

	/// append `group` to the groups of its receiver
	pub(crate) fn push(&mut self, group: AlertGroup) {
		self.receivers.entry(group.receiver.clone()).or_default().push(group);
	}

	/// flatten into a single list, receiver after receiver
	pub(crate) fn into_groups(self) -> Vec<AlertGroup> {
		self.receivers.into_values().flatten().collect()
	}
}
