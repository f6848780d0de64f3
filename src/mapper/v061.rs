//! mapper for the alertmanager 0.6.1 api
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

/// versions this mapper understands
const SUPPORTED_VERSIONS: &str = "=0.6.1";

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::missing_docs_in_private_items)]
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
	/// 0.6.1 sends `status`, some builds `Status`. Go json decoders match keys
	/// case insensitively, we only accept these two spellings.
	#[serde_as(as = "DefaultOnNull")]
	#[serde(alias = "Status", default)]
	status: String,
	silenced_by: Option<Vec<String>>,
	inhibited_by: Option<Vec<String>>,
}

impl IntoAlert for UpstreamAlert {
	fn into_alert(self, receiver: &str) -> Alert {
		Alert {
			receiver: receiver.to_owned(),
			annotations: self.annotations,
			labels: self.labels,
			starts_at: self.starts_at,
			ends_at: self.ends_at,
			generator_url: self.generator_url,
			state: self.status,
			silenced_by: self.silenced_by.unwrap_or_default(),
			inhibited_by: self.inhibited_by.unwrap_or_default(),
		}
	}
}

/// [super::AlertMapper] for alertmanager 0.6.1
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

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use pretty_assertions::assert_eq;
	use serde_json::{json, Value};
	use wiremock::{
		matchers::{method, path},
		Mock, MockServer, ResponseTemplate,
	};

	use super::*;
	use crate::mapper::{normalize, tests::upstream_settings, AlertMapper as _, AlertsGroup};

	fn mapper(uri: &str) -> AlertMapper {
		AlertMapper::new(upstream_settings(uri), reqwest::Client::new())
	}

	fn upstream_alert(name: &str) -> Value {
		json!({
			"annotations": {"summary": format!("{} is firing", name)},
			"labels": {"alertname": name, "instance": "web1"},
			"startsAt": "2017-06-01T12:00:00Z",
			"endsAt": "0001-01-01T00:00:00Z",
			"generatorURL": "http://prometheus:9090/graph?g0.expr=up",
			"status": "active",
			"silencedBy": ["f2a7d5a2-2a4b-4b4a-9b8e-0d7b4f1b2b1c"],
			"inhibitedBy": null
		})
	}

	async fn serve(body: Value) -> MockServer {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/v1/alerts/groups"))
			.respond_with(ResponseTemplate::new(200).set_body_json(body))
			.mount(&server)
			.await;
		server
	}

	fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn supports_exactly_0_6_1() {
		let mapper = mapper("http://localhost:9093");

		assert!(mapper.is_supported("0.6.1"));
		for version in ["0.6.0", "0.6.2", "0.5.1", "0.7.0", "1.0.0", "0.6.1-rc.0", "0.6.1-alpha"] {
			assert!(!mapper.is_supported(version), "{} should not be supported", version);
		}
	}

	#[test]
	#[should_panic]
	fn panics_on_invalid_version() {
		mapper("http://localhost:9093").is_supported("not-a-version");
	}

	#[tokio::test]
	async fn maps_single_alert() {
		let server = serve(json!({
			"status": "success",
			"data": [{
				"labels": {"alertname": "HostDown"},
				"blocks": [{
					"alerts": [upstream_alert("HostDown")],
					"routeOpts": {"receiver": "ops"}
				}]
			}]
		}))
		.await;

		let groups = mapper(&server.uri()).get_alerts().await.unwrap();

		let expected = AlertGroup {
			receiver: "ops".to_string(),
			labels: labels(&[("alertname", "HostDown")]),
			alerts: vec![Alert {
				receiver: "ops".to_string(),
				annotations: labels(&[("summary", "HostDown is firing")]),
				labels: labels(&[("alertname", "HostDown"), ("instance", "web1")]),
				starts_at: "2017-06-01T12:00:00Z".parse().unwrap(),
				ends_at: "0001-01-01T00:00:00Z".parse().unwrap(),
				generator_url: "http://prometheus:9090/graph?g0.expr=up".to_string(),
				state: "active".to_string(),
				silenced_by: vec!["f2a7d5a2-2a4b-4b4a-9b8e-0d7b4f1b2b1c".to_string()],
				inhibited_by: Vec::new(),
			}],
		};

		assert_eq!(groups, vec![expected]);
	}

	#[tokio::test]
	async fn keeps_one_group_per_block_for_shared_receiver() {
		let server = serve(json!({
			"status": "success",
			"data": [
				{
					"labels": {"alertname": "HostDown"},
					"blocks": [{"alerts": [upstream_alert("HostDown")], "routeOpts": {"receiver": "R"}}]
				},
				{
					"labels": {"alertname": "DiskFull"},
					"blocks": [
						{"alerts": [upstream_alert("DiskFull")], "routeOpts": {"receiver": "R"}},
						{"alerts": [upstream_alert("DiskFull")], "routeOpts": {"receiver": "S"}}
					]
				}
			]
		}))
		.await;

		let groups = mapper(&server.uri()).get_alerts().await.unwrap();

		let summary: Vec<_> = groups
			.iter()
			.map(|group| (group.receiver.as_str(), group.labels["alertname"].as_str()))
			.collect();
		assert_eq!(summary, vec![("R", "HostDown"), ("R", "DiskFull"), ("S", "DiskFull")]);

		for group in &groups {
			assert!(group.alerts.iter().all(|alert| alert.receiver == group.receiver));
		}
	}

	#[test]
	fn uses_group_labels_and_keeps_empty_blocks() {
		let data: Vec<AlertsGroup<UpstreamAlert>> = serde_json::from_value(json!([
			{"labels": {"job": "node"}, "blocks": []},
			{"labels": {"job": "api"}, "blocks": [{"alerts": [], "routeOpts": {"receiver": "ops"}}]}
		]))
		.unwrap();

		let groups = normalize(data);

		assert_eq!(
			groups,
			vec![AlertGroup {
				receiver: "ops".to_string(),
				labels: labels(&[("job", "api")]),
				alerts: Vec::new()
			}]
		);
	}

	#[test]
	fn receiver_names_are_compared_exactly() {
		let data: Vec<AlertsGroup<UpstreamAlert>> = serde_json::from_value(json!([{
			"labels": {},
			"blocks": [
				{"alerts": [], "routeOpts": {"receiver": "ops"}},
				{"alerts": [], "routeOpts": {"receiver": "Ops"}},
				{"alerts": [], "routeOpts": {"receiver": "ops "}}
			]
		}]))
		.unwrap();

		let receivers: Vec<_> = normalize(data).into_iter().map(|group| group.receiver).collect();

		assert_eq!(receivers, vec!["ops", "Ops", "ops "]);
	}

	#[tokio::test]
	async fn coerces_absent_suppression_lists() {
		let mut alert = upstream_alert("HostDown");
		let fields = alert.as_object_mut().unwrap();
		fields.remove("silencedBy");
		fields.remove("inhibitedBy");
		fields.remove("status");
		fields.insert("Status".to_string(), json!("suppressed"));

		let server = serve(json!({
			"status": "success",
			"data": [{"labels": {}, "blocks": [{"alerts": [alert], "routeOpts": {"receiver": "ops"}}]}]
		}))
		.await;

		let groups = mapper(&server.uri()).get_alerts().await.unwrap();
		let alert = &groups[0].alerts[0];

		assert_eq!(alert.silenced_by, Vec::<String>::new());
		assert_eq!(alert.inhibited_by, Vec::<String>::new());
		assert_eq!(alert.state, "suppressed");
	}

	#[tokio::test]
	async fn empty_data_yields_no_groups() {
		let server = serve(json!({"status": "success", "data": []})).await;

		let groups = mapper(&server.uri()).get_alerts().await.unwrap();

		assert!(groups.is_empty());
	}

	#[tokio::test]
	async fn null_data_yields_no_groups() {
		let server = serve(json!({"status": "success", "data": null})).await;

		let groups = mapper(&server.uri()).get_alerts().await.unwrap();

		assert!(groups.is_empty());
	}

	#[tokio::test]
	async fn decodes_null_collections_as_empty() {
		let mut alert = upstream_alert("HostDown");
		let fields = alert.as_object_mut().unwrap();
		fields.insert("annotations".to_string(), Value::Null);
		fields.insert("silencedBy".to_string(), Value::Null);

		let server = serve(json!({
			"status": "success",
			"error": null,
			"data": [
				{"labels": null, "blocks": null},
				{
					"labels": null,
					"blocks": [
						{"alerts": [alert], "routeOpts": {"receiver": "ops"}},
						{"alerts": null, "routeOpts": {"receiver": "ops"}}
					]
				}
			]
		}))
		.await;

		let groups = mapper(&server.uri()).get_alerts().await.unwrap();

		assert_eq!(groups.len(), 2);
		assert!(groups.iter().all(|group| group.labels.is_empty() && group.receiver == "ops"));
		assert_eq!(groups[0].alerts.len(), 1);
		assert!(groups[1].alerts.is_empty());

		let alert = &groups[0].alerts[0];
		assert!(alert.annotations.is_empty());
		assert_eq!(alert.silenced_by, Vec::<String>::new());
		assert_eq!(alert.labels["alertname"], "HostDown");
	}

	#[tokio::test]
	async fn reports_upstream_error_message() {
		let server = serve(json!({"status": "error", "error": "no such cluster"})).await;

		let err = mapper(&server.uri()).get_alerts().await.unwrap_err();

		assert!(matches!(err, MapperError::Upstream(_)));
		assert_eq!(err.to_string(), "no such cluster");
	}

	#[tokio::test]
	async fn reports_server_errors_as_transport_error() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/v1/alerts/groups"))
			.respond_with(ResponseTemplate::new(500))
			.mount(&server)
			.await;

		let err = mapper(&server.uri()).get_alerts().await.unwrap_err();

		assert!(matches!(err, MapperError::Transport(_)));
	}

	#[tokio::test]
	async fn reports_timeouts_as_transport_error() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/v1/alerts/groups"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(json!({"status": "success", "data": []}))
					.set_delay(Duration::from_secs(2)),
			)
			.mount(&server)
			.await;

		let settings = UpstreamSettings { uri: server.uri(), timeout: Duration::from_millis(100) };
		let err = AlertMapper::new(settings, reqwest::Client::new()).get_alerts().await.unwrap_err();

		match err {
			MapperError::Transport(err) => assert!(err.is_timeout()),
			err => panic!("expected transport error, got {:?}", err),
		}
	}

	#[tokio::test]
	async fn reports_malformed_uri() {
		let err = mapper("not a uri").get_alerts().await.unwrap_err();

		assert!(matches!(err, MapperError::UrlConstruction(_)));
	}
}
