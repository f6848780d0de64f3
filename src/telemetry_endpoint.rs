//! Here we expose prometheus metrics about the poller
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
	http::{header::CONTENT_TYPE, StatusCode},
	response::IntoResponse,
	routing::get,
	Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;

use crate::settings::Settings;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
	pub bind_address: IpAddr,
	pub port: u16,
}

impl TelemetryEndpointSettings {
	pub fn global() -> &'static Self {
		&Settings::global().telemetry_endpoint
	}

	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

async fn metrics_handler() -> impl IntoResponse {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();

	match encoder.encode(&metric_families, &mut buffer) {
		Ok(()) => (StatusCode::OK, [(CONTENT_TYPE, encoder.format_type().to_owned())], buffer),
		Err(err) => {
			tracing::error!("failed to encode metrics: {}", err);
			(StatusCode::INTERNAL_SERVER_ERROR, [(CONTENT_TYPE, "text/plain".to_owned())], vec![])
		}
	}
}

pub async fn run_telemetry_endpoint() -> Result<()> {
	let app = Router::new().route("/metrics", get(metrics_handler));

	axum::Server::bind(&TelemetryEndpointSettings::global().to_socket_addr())
		.serve(app.into_make_service())
		.await
		.context("telemetry endpoint crashed")?;

	Ok(())
}
