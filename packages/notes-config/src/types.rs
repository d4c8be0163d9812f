use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_NOTES_TABLE: &str = "notes";
pub const DEFAULT_TASKS_TABLE: &str = "tasks";
pub const DEFAULT_BUCKET: &str = "notes";
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub backend: Backend,
	#[serde(default)]
	pub tables: Tables,
	#[serde(default)]
	pub storage: Storage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
	/// Project base URL, e.g. `https://project.example.co`. Trailing slashes are stripped on load.
	pub url: String,
	/// Service access key. Sent both as the `apikey` header and as a bearer token.
	pub api_key: String,
	/// Optional. Absent means the HTTP client's own default.
	pub timeout_ms: Option<u64>,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tables {
	#[serde(default = "default_notes_table")]
	pub notes: String,
	#[serde(default = "default_tasks_table")]
	pub tasks: String,
}
impl Default for Tables {
	fn default() -> Self {
		Self { notes: default_notes_table(), tasks: default_tasks_table() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	#[serde(default = "default_bucket")]
	pub bucket: String,
	#[serde(default = "default_image_content_type")]
	pub image_content_type: String,
	/// Overwrite an existing object with the same name instead of failing the upload.
	#[serde(default)]
	pub upsert: bool,
}
impl Default for Storage {
	fn default() -> Self {
		Self {
			bucket: default_bucket(),
			image_content_type: default_image_content_type(),
			upsert: false,
		}
	}
}

impl Config {
	/// A config with default tables and storage for the given credentials.
	pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
		Self {
			backend: Backend {
				url: url.into(),
				api_key: api_key.into(),
				timeout_ms: None,
				default_headers: Map::new(),
			},
			tables: Tables::default(),
			storage: Storage::default(),
		}
	}
}

fn default_notes_table() -> String {
	DEFAULT_NOTES_TABLE.to_string()
}

fn default_tasks_table() -> String {
	DEFAULT_TASKS_TABLE.to_string()
}

fn default_bucket() -> String {
	DEFAULT_BUCKET.to_string()
}

fn default_image_content_type() -> String {
	DEFAULT_IMAGE_CONTENT_TYPE.to_string()
}
