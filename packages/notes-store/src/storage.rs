use reqwest::{Client, Url, header::CONTENT_TYPE};

use crate::Result;

const UPSERT_HEADER: &str = "x-upsert";

/// One object-storage bucket under `<base>/storage/v1`.
#[derive(Debug, Clone)]
pub struct Bucket {
	client: Client,
	base: Url,
	name: String,
	upsert: bool,
}
impl Bucket {
	pub fn new(client: Client, base: &Url, name: impl Into<String>, upsert: bool) -> Result<Self> {
		let base = crate::join_path(base, &["storage", "v1"])?;

		Ok(Self { client, base, name: name.into(), upsert })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Uploads `bytes` as `path` inside the bucket. Slashes in `path` nest the object.
	pub async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
		let url = self.object_url(&["object"], path)?;
		let res = self
			.client
			.post(url)
			.header(CONTENT_TYPE, content_type)
			.header(UPSERT_HEADER, if self.upsert { "true" } else { "false" })
			.body(bytes)
			.send()
			.await?;

		crate::check_status(res).await?;

		Ok(())
	}

	/// Public URL of `path`. Pure; the object is not checked for existence.
	pub fn public_url(&self, path: &str) -> Result<String> {
		Ok(self.object_url(&["object", "public"], path)?.to_string())
	}

	fn object_url(&self, prefix: &[&str], path: &str) -> Result<Url> {
		let mut segments: Vec<&str> = prefix.to_vec();

		segments.push(&self.name);
		segments.extend(path.split('/').filter(|segment| !segment.is_empty()));

		crate::join_path(&self.base, &segments)
	}
}
