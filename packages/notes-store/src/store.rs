//! The record store facade over the notes and tasks tables and the note image bucket.
//!
//! Every fallible operation comes in two flavours. The `try_*` methods return the typed error.
//! The plain methods log the error and hand back a fallback (`None` or an empty `Vec`), so a
//! caller cannot tell "no rows" from "the call failed" through them.

use time::OffsetDateTime;

use crate::{
	Error, Result,
	models::{Message, MessageRow, NewMessage, Task, TaskStatusPatch},
	rest::{Direction, Query, RestClient},
	storage::Bucket,
};

pub const DEFAULT_MESSAGE_LIMIT: u32 = 10;

#[derive(Debug, Clone)]
pub struct RecordStore {
	rest: RestClient,
	bucket: Bucket,
	notes_table: String,
	tasks_table: String,
	image_content_type: String,
}
impl RecordStore {
	/// Builds the shared HTTP handle. No request is sent, so bad credentials only surface on the
	/// first call.
	pub fn new(cfg: &notes_config::Config) -> Result<Self> {
		let client = crate::build_client(&cfg.backend)?;
		let base = crate::parse_base_url(&cfg.backend.url)?;
		let rest = RestClient::new(client.clone(), &base)?;
		let bucket = Bucket::new(client, &base, cfg.storage.bucket.clone(), cfg.storage.upsert)?;

		Ok(Self {
			rest,
			bucket,
			notes_table: cfg.tables.notes.clone(),
			tasks_table: cfg.tables.tasks.clone(),
			image_content_type: cfg.storage.image_content_type.clone(),
		})
	}

	pub async fn store_message(&self, message: NewMessage) -> Option<Message> {
		match self.try_store_message(&message).await {
			Ok(row) => Some(row),
			Err(err) => {
				tracing::error!(
					error = %err,
					user_id = %message.user_id,
					"Failed to store message."
				);

				None
			},
		}
	}

	pub async fn try_store_message(&self, message: &NewMessage) -> Result<Message> {
		let row = MessageRow::stamped(message, OffsetDateTime::now_utc());
		let inserted: Vec<Message> = self.rest.insert(&self.notes_table, &row).await?;
		let stored = inserted.into_iter().next().ok_or_else(|| Error::InvalidResponse {
			message: "Insert returned no representation.".to_string(),
		})?;

		tracing::debug!(user_id = %stored.user_id, timestamp = %stored.timestamp, "Stored message.");

		Ok(stored)
	}

	/// Uploads a PNG and returns its public URL.
	pub async fn store_image(&self, bytes: Vec<u8>, filename: &str) -> Option<String> {
		match self.try_store_image(bytes, filename).await {
			Ok(url) => Some(url),
			Err(err) => {
				tracing::error!(error = %err, filename, "Failed to store image.");

				None
			},
		}
	}

	pub async fn try_store_image(&self, bytes: Vec<u8>, filename: &str) -> Result<String> {
		let size = bytes.len();

		self.bucket.upload(filename, bytes, &self.image_content_type).await?;

		tracing::debug!(bucket = self.bucket.name(), filename, size, "Uploaded image.");

		self.bucket.public_url(filename)
	}

	/// Public URL for `filename` in the image bucket. Does not contact the backend.
	pub fn public_url(&self, filename: &str) -> Result<String> {
		self.bucket.public_url(filename)
	}

	/// Most recent messages first. `None` means [`DEFAULT_MESSAGE_LIMIT`].
	pub async fn get_user_messages(&self, user_id: &str, limit: Option<u32>) -> Vec<Message> {
		match self.try_get_user_messages(user_id, limit).await {
			Ok(rows) => rows,
			Err(err) => {
				tracing::error!(error = %err, user_id, "Failed to load user messages.");

				Vec::new()
			},
		}
	}

	pub async fn try_get_user_messages(
		&self,
		user_id: &str,
		limit: Option<u32>,
	) -> Result<Vec<Message>> {
		let query = Query::table(&self.notes_table)
			.eq("user_id", user_id)
			.order("timestamp", Direction::Desc)
			.limit(limit.unwrap_or(DEFAULT_MESSAGE_LIMIT));

		self.rest.select(&query).await
	}

	pub async fn get_task(&self, task_id: &str) -> Option<Task> {
		match self.try_get_task(task_id).await {
			Ok(task) => Some(task),
			Err(err) => {
				tracing::error!(error = %err, task_id, "Failed to load task.");

				None
			},
		}
	}

	/// Zero or several rows with this id are reported as `Error::NotFound`.
	pub async fn try_get_task(&self, task_id: &str) -> Result<Task> {
		let query = Query::table(&self.tasks_table).eq("id", task_id);

		self.rest.select_single(&query).await
	}

	/// Latest due time first.
	pub async fn get_user_tasks(&self, user_id: &str) -> Vec<Task> {
		match self.try_get_user_tasks(user_id).await {
			Ok(rows) => rows,
			Err(err) => {
				tracing::error!(error = %err, user_id, "Failed to load user tasks.");

				Vec::new()
			},
		}
	}

	pub async fn try_get_user_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
		let query = Query::table(&self.tasks_table)
			.eq("user_id", user_id)
			.order("due_time", Direction::Desc);

		self.rest.select(&query).await
	}

	/// Sets the status and refreshes `last_updated`. Scores left as `None` keep their stored
	/// values.
	pub async fn update_task_status(
		&self,
		task_id: &str,
		status: &str,
		confidence: Option<f64>,
		completion: Option<f64>,
	) -> Option<Task> {
		match self.try_update_task_status(task_id, status, confidence, completion).await {
			Ok(task) => Some(task),
			Err(err) => {
				tracing::error!(error = %err, task_id, status, "Failed to update task status.");

				None
			},
		}
	}

	pub async fn try_update_task_status(
		&self,
		task_id: &str,
		status: &str,
		confidence: Option<f64>,
		completion: Option<f64>,
	) -> Result<Task> {
		let patch = TaskStatusPatch {
			status,
			confidence_score: confidence,
			completion_score: completion,
			last_updated: OffsetDateTime::now_utc(),
		};
		let query = Query::table(&self.tasks_table).eq("id", task_id);
		let updated: Vec<Task> = self.rest.update(&query, &patch).await?;
		let task = updated
			.into_iter()
			.next()
			.ok_or_else(|| Error::NotFound { message: format!("Unknown task_id {task_id}.") })?;

		tracing::debug!(task_id, status, "Updated task status.");

		Ok(task)
	}
}
