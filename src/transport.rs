//! thin http helpers shared by all mappers
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

/// Joins `path` onto `base`, keeping every path segment of `base`.
///
/// [Url::join] replaces the last segment of a base without a trailing slash,
/// so `http://am/prefix` joined with `api` would yield `http://am/api`. We
/// always treat the base as a directory.
pub fn join_url(base: &str, path: &str) -> Result<Url, url::ParseError> {
	let mut base = Url::parse(base)?;

	if !base.path().ends_with('/') {
		let dir = format!("{}/", base.path());
		base.set_path(&dir);
	}

	base.join(path.trim_start_matches('/'))
}

/// GET `url` and decode the json body into `T`. Non 2xx responses, timeouts
/// and undecodable bodies are all reported as [reqwest::Error].
pub async fn read_json<T>(
	client: &reqwest::Client,
	url: Url,
	timeout: Duration,
) -> Result<T, reqwest::Error>
where
	T: DeserializeOwned,
{
	tracing::debug!(%url, ?timeout, "GET");

	client
		.get(url)
		.timeout(timeout)
		.send()
		.await?
		.error_for_status()?
		.json::<T>()
		.await
}
