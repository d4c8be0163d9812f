pub mod models;
pub mod rest;
pub mod storage;
pub mod store;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use models::{Message, NewMessage, Task, TaskStatusPatch};
pub use store::{DEFAULT_MESSAGE_LIMIT, RecordStore};

use std::time::Duration;

use reqwest::{
	Client, Response, Url,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

const API_KEY_HEADER: &str = "apikey";

/// Headers sent with every backend request: the key as `apikey` and as a bearer token, followed
/// by any configured defaults.
pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(API_KEY_HEADER, api_key.parse()?);
	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn build_client(cfg: &notes_config::Backend) -> Result<Client> {
	let mut builder = Client::builder()
		.default_headers(auth_headers(&cfg.api_key, &cfg.default_headers)?);

	if let Some(timeout_ms) = cfg.timeout_ms {
		builder = builder.timeout(Duration::from_millis(timeout_ms));
	}

	Ok(builder.build()?)
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
	let url = Url::parse(raw).map_err(|err| Error::InvalidConfig {
		message: format!("Backend url {raw:?} is invalid: {err}."),
	})?;

	if url.cannot_be_a_base() {
		return Err(Error::InvalidConfig {
			message: format!("Backend url {raw:?} cannot be used as a base."),
		});
	}

	Ok(url)
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn join_path(base: &Url, segments: &[&str]) -> Result<Url> {
	let mut url = base.clone();

	url.path_segments_mut()
		.map_err(|()| Error::InvalidConfig {
			message: format!("Backend url {base} cannot be used as a base."),
		})?
		.pop_if_empty()
		.extend(segments);

	Ok(url)
}

/// Passes successful responses through and turns the rest into `Error::Backend`, keeping the
/// backend's own error message and code when the body carries them.
pub(crate) async fn check_status(res: Response) -> Result<Response> {
	let status = res.status();

	if status.is_success() {
		return Ok(res);
	}

	let body = res.text().await.unwrap_or_default();
	let (code, message) = parse_error_body(&body);

	Err(Error::Backend {
		status: status.as_u16(),
		code,
		message: message.unwrap_or_else(|| {
			if body.trim().is_empty() {
				status.canonical_reason().unwrap_or("Request failed.").to_string()
			} else {
				body
			}
		}),
	})
}

fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
	let Ok(json) = serde_json::from_str::<Value>(body) else {
		return (None, None);
	};
	let text = |key: &str| json.get(key).and_then(Value::as_str).map(str::to_string);
	// REST errors carry `code`; storage errors carry `error` and a stringly `statusCode`.
	let code = text("code").or_else(|| text("error"));
	let message = text("message").or_else(|| text("msg"));

	(code, message)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_rest_error_body() {
		let (code, message) = parse_error_body(
			r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#,
		);

		assert_eq!(code.as_deref(), Some("PGRST116"));
		assert_eq!(message.as_deref(), Some("JSON object requested, multiple (or no) rows returned"));
	}

	#[test]
	fn parses_storage_error_body() {
		let (code, message) = parse_error_body(
			r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#,
		);

		assert_eq!(code.as_deref(), Some("Duplicate"));
		assert_eq!(message.as_deref(), Some("The resource already exists"));
	}

	#[test]
	fn non_json_bodies_have_no_code() {
		assert_eq!(parse_error_body("upstream timeout"), (None, None));
	}

	#[test]
	fn sends_key_as_apikey_and_bearer() {
		let mut defaults = Map::new();

		defaults.insert("x-client-info".to_string(), Value::from("notes-store"));

		let headers = auth_headers("secret", &defaults).expect("Failed to build headers.");

		assert_eq!(headers.get(API_KEY_HEADER).expect("Missing apikey header."), "secret");
		assert_eq!(headers.get(AUTHORIZATION).expect("Missing authorization header."), "Bearer secret");
		assert_eq!(headers.get("x-client-info").expect("Missing default header."), "notes-store");
	}

	#[test]
	fn rejects_non_string_default_headers() {
		let mut defaults = Map::new();

		defaults.insert("x-retries".to_string(), Value::from(3));

		assert!(matches!(auth_headers("secret", &defaults), Err(Error::InvalidConfig { .. })));
	}

	#[test]
	fn join_path_strips_trailing_slash_segment() {
		let base = Url::parse("http://localhost:54321/").expect("url");
		let url = join_path(&base, &["rest", "v1", "notes"]).expect("join");

		assert_eq!(url.as_str(), "http://localhost:54321/rest/v1/notes");
	}
}
