use std::{
	collections::HashMap,
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use notes_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root
		.as_table_mut()
		.expect("Template config must be a table.")
		.entry(section.to_string())
		.or_insert_with(|| Value::Table(Default::default()))
		.as_table_mut()
		.expect("Template section must be a table.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("notes_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> notes_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = notes_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

#[test]
fn template_loads_with_normalized_values() {
	let cfg = load_payload(SAMPLE_CONFIG_TEMPLATE_TOML.to_string())
		.expect("Expected template config to be valid.");

	assert_eq!(cfg.backend.url, "https://project.example.co");
	assert_eq!(cfg.backend.api_key, "test-key");
	assert_eq!(cfg.backend.timeout_ms, None);
	assert_eq!(cfg.storage.image_content_type, "image/png");
	assert!(!cfg.storage.upsert);
}

#[test]
fn tables_and_storage_sections_are_optional() {
	let payload = "[backend]\nurl = \"http://localhost:54321\"\napi_key = \"k\"\n".to_string();
	let cfg = load_payload(payload).expect("Expected minimal config to be valid.");

	assert_eq!(cfg.tables.notes, "notes");
	assert_eq!(cfg.tables.tasks, "tasks");
	assert_eq!(cfg.storage.bucket, "notes");
}

#[test]
fn backend_url_requires_http_scheme() {
	let payload = sample_toml_with("backend", "url", Value::String("ftp://example.co".into()));
	let err = load_payload(payload).expect_err("Expected url validation error.");

	assert!(
		err.to_string().contains("backend.url must start with http:// or https://."),
		"Unexpected error: {err}"
	);
}

#[test]
fn api_key_must_be_non_empty() {
	let payload = sample_toml_with("backend", "api_key", Value::String("   ".into()));
	let err = load_payload(payload).expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("backend.api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn bucket_must_be_non_empty() {
	let payload = sample_toml_with("storage", "bucket", Value::String("/".into()));
	let err = load_payload(payload).expect_err("Expected bucket validation error.");

	assert!(
		err.to_string().contains("storage.bucket must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn zero_timeout_means_client_default() {
	let payload = sample_toml_with("backend", "timeout_ms", Value::Integer(0));
	let cfg = load_payload(payload).expect("Expected zero timeout to be accepted.");

	assert_eq!(cfg.backend.timeout_ms, None);
}

#[test]
fn default_headers_must_be_strings() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let backend = root
		.get_mut("backend")
		.and_then(Value::as_table_mut)
		.expect("Template config must include [backend].");
	let mut headers = toml::Table::new();

	headers.insert("x-retries".to_string(), Value::Integer(3));
	backend.insert("default_headers".to_string(), Value::Table(headers));

	let payload = toml::to_string(&root).expect("Failed to render config.");
	let err = load_payload(payload).expect_err("Expected header validation error.");

	assert!(
		err.to_string().contains("backend.default_headers.x-retries must be a string."),
		"Unexpected error: {err}"
	);
}

#[test]
fn missing_file_reports_path() {
	let path = PathBuf::from("/definitely/not/here/notes.toml");
	let err = notes_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err:?}");
}

#[test]
fn malformed_toml_is_a_parse_error() {
	let err = load_payload("[backend\nurl = 1".to_string()).expect_err("Expected parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }), "Unexpected error: {err:?}");
}

#[test]
fn env_lookup_builds_default_config() {
	let vars = HashMap::from([
		("SUPABASE_URL", "https://project.example.co/"),
		("SUPABASE_KEY", "anon-key"),
	]);
	let cfg = notes_config::from_lookup(|name| vars.get(name).map(|value| value.to_string()))
		.expect("Expected env config to be valid.");

	assert_eq!(cfg.backend.url, "https://project.example.co");
	assert_eq!(cfg.backend.api_key, "anon-key");
	assert_eq!(cfg.tables.notes, "notes");
	assert_eq!(cfg.storage.bucket, "notes");
}

#[test]
fn env_lookup_reports_missing_variable() {
	let vars = HashMap::from([("SUPABASE_URL", "https://project.example.co")]);
	let err = notes_config::from_lookup(|name| vars.get(name).map(|value| value.to_string()))
		.expect_err("Expected missing key error.");

	assert!(matches!(err, Error::MissingEnv { name: "SUPABASE_KEY" }), "Unexpected error: {err:?}");
}

#[test]
fn notes_example_toml_is_valid() {
	let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

	path.push("../../notes.example.toml");

	notes_config::load(&path).expect("Expected notes.example.toml to be a valid config.");
}
