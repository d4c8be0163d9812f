mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Backend, Config, DEFAULT_BUCKET, DEFAULT_IMAGE_CONTENT_TYPE, DEFAULT_NOTES_TABLE,
	DEFAULT_TASKS_TABLE, Storage, Tables,
};

use std::{env, fs, path::Path};

pub const URL_ENV: &str = "SUPABASE_URL";
pub const KEY_ENV: &str = "SUPABASE_KEY";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

/// Builds a config from `SUPABASE_URL` and `SUPABASE_KEY`, with defaults for everything else.
pub fn from_env() -> Result<Config> {
	from_lookup(|name| env::var(name).ok())
}

pub fn from_lookup<F>(lookup: F) -> Result<Config>
where
	F: Fn(&str) -> Option<String>,
{
	let read = |name: &'static str| {
		lookup(name).filter(|value| !value.trim().is_empty()).ok_or(Error::MissingEnv { name })
	};
	let mut cfg = Config::new(read(URL_ENV)?, read(KEY_ENV)?);

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	let url = cfg.backend.url.as_str();

	if url.is_empty() {
		return Err(Error::Validation { message: "backend.url must be non-empty.".to_string() });
	}
	if !(url.starts_with("http://") || url.starts_with("https://")) {
		return Err(Error::Validation {
			message: "backend.url must start with http:// or https://.".to_string(),
		});
	}
	if cfg.backend.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "backend.api_key must be non-empty.".to_string(),
		});
	}

	for (key, value) in &cfg.backend.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("backend.default_headers.{key} must be a string."),
			});
		}
	}

	for (label, value) in [
		("tables.notes", &cfg.tables.notes),
		("tables.tasks", &cfg.tables.tasks),
		("storage.bucket", &cfg.storage.bucket),
		("storage.image_content_type", &cfg.storage.image_content_type),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let url = cfg.backend.url.trim().trim_end_matches('/').to_string();

	cfg.backend.url = url;
	cfg.backend.api_key = cfg.backend.api_key.trim().to_string();

	if cfg.backend.timeout_ms == Some(0) {
		cfg.backend.timeout_ms = None;
	}

	cfg.tables.notes = cfg.tables.notes.trim().to_string();
	cfg.tables.tasks = cfg.tables.tasks.trim().to_string();
	cfg.storage.bucket = cfg.storage.bucket.trim().trim_matches('/').to_string();
}
