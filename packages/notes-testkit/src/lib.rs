mod backend;
mod error;

pub use backend::{FakeBackend, RecordedRequest, StoredObject};
pub use error::{Error, Result};

use tracing_subscriber::EnvFilter;

pub const TEST_API_KEY: &str = "test-service-key";

/// Installs a test-writer subscriber once per process. Honors `RUST_LOG`.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// A loopback URL with nothing listening on it.
pub fn unreachable_url() -> Result<String> {
	let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
	let addr = listener.local_addr()?;

	drop(listener);

	Ok(format!("http://{addr}"))
}

/// A store config pointing at `url` with default tables and bucket.
pub fn config_for(url: &str) -> notes_config::Config {
	notes_config::Config::new(url, TEST_API_KEY)
}
