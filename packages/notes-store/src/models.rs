use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// A chat message or note as stored in the notes table. Text and flag columns read as `null`
/// fall back to their empty values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
	pub user_id: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub username: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub content: String,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	#[serde(default, deserialize_with = "null_as_default")]
	pub has_image: bool,
	#[serde(default)]
	pub image_url: Option<String>,
	#[serde(default)]
	pub task_id: Option<String>,
	/// Backend-generated columns such as `id` or `created_at`.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Caller-supplied fields of a message. The timestamp is stamped by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
	pub user_id: String,
	pub username: String,
	pub content: String,
	pub has_image: bool,
	pub image_url: Option<String>,
	pub task_id: Option<String>,
}
impl NewMessage {
	pub fn new(
		user_id: impl Into<String>,
		username: impl Into<String>,
		content: impl Into<String>,
	) -> Self {
		Self {
			user_id: user_id.into(),
			username: username.into(),
			content: content.into(),
			has_image: false,
			image_url: None,
			task_id: None,
		}
	}

	/// Marks the message as carrying an image at `image_url`.
	pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
		self.has_image = true;
		self.image_url = Some(image_url.into());

		self
	}

	pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
		self.task_id = Some(task_id.into());

		self
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Task {
	/// Text or integer identity columns, rendered as text.
	#[serde(deserialize_with = "string_or_number")]
	pub id: String,
	pub user_id: String,
	#[serde(default, with = "crate::time_serde::option")]
	pub due_time: Option<OffsetDateTime>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub status: String,
	#[serde(default)]
	pub confidence_score: Option<f64>,
	#[serde(default)]
	pub completion_score: Option<f64>,
	#[serde(default, with = "crate::time_serde::option")]
	pub last_updated: Option<OffsetDateTime>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Insert body for the notes table.
#[derive(Debug, Serialize)]
pub(crate) struct MessageRow<'a> {
	pub(crate) user_id: &'a str,
	pub(crate) username: &'a str,
	pub(crate) content: &'a str,
	#[serde(with = "crate::time_serde")]
	pub(crate) timestamp: OffsetDateTime,
	pub(crate) has_image: bool,
	pub(crate) image_url: Option<&'a str>,
	pub(crate) task_id: Option<&'a str>,
}
impl<'a> MessageRow<'a> {
	pub(crate) fn stamped(message: &'a NewMessage, timestamp: OffsetDateTime) -> Self {
		Self {
			user_id: &message.user_id,
			username: &message.username,
			content: &message.content,
			timestamp,
			has_image: message.has_image,
			image_url: message.image_url.as_deref(),
			task_id: message.task_id.as_deref(),
		}
	}
}

/// Partial update body for the tasks table. Absent scores are left out of the payload so the
/// backend keeps their stored values.
#[derive(Debug, Serialize)]
pub struct TaskStatusPatch<'a> {
	pub status: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub confidence_score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub completion_score: Option<f64>,
	#[serde(with = "crate::time_serde")]
	pub last_updated: OffsetDateTime,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de> + Default,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	match Value::deserialize(deserializer)? {
		Value::String(text) => Ok(text),
		Value::Number(number) => Ok(number.to_string()),
		other => Err(serde::de::Error::custom(format!("expected a text or integer id, got {other}"))),
	}
}
