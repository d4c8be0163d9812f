pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("Backend returned {status}: {message}")]
	Backend { status: u16, code: Option<String>, message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	/// Error code reported by the backend, e.g. `PGRST116`.
	pub fn backend_code(&self) -> Option<&str> {
		match self {
			Self::Backend { code, .. } => code.as_deref(),
			_ => None,
		}
	}
}
