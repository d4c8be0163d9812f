use reqwest::{
	Client, RequestBuilder, Url,
	header::{ACCEPT, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Error, Result};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";
/// Reported when a single-object request matches zero or several rows.
pub const NO_SINGLE_ROW: &str = "PGRST116";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Asc,
	Desc,
}
impl Direction {
	fn as_str(self) -> &'static str {
		match self {
			Self::Asc => "asc",
			Self::Desc => "desc",
		}
	}
}

/// Filter, order, and limit parameters for one table request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
	table: String,
	filters: Vec<(String, String)>,
	order: Option<(String, Direction)>,
	limit: Option<u32>,
}
impl Query {
	pub fn table(table: impl Into<String>) -> Self {
		Self { table: table.into(), filters: Vec::new(), order: None, limit: None }
	}

	pub fn eq(mut self, column: impl Into<String>, value: impl AsRef<str>) -> Self {
		self.filters.push((column.into(), format!("eq.{}", value.as_ref())));

		self
	}

	pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
		self.order = Some((column.into(), direction));

		self
	}

	pub fn limit(mut self, limit: u32) -> Self {
		self.limit = Some(limit);

		self
	}

	pub fn table_name(&self) -> &str {
		&self.table
	}

	/// Query string pairs. `select` only applies to reads.
	pub fn params(&self, with_select: bool) -> Vec<(String, String)> {
		let mut params = Vec::with_capacity(self.filters.len() + 3);

		if with_select {
			params.push(("select".to_string(), "*".to_string()));
		}

		params.extend(self.filters.iter().cloned());

		if let Some((column, direction)) = &self.order {
			params.push(("order".to_string(), format!("{column}.{}", direction.as_str())));
		}
		if let Some(limit) = self.limit {
			params.push(("limit".to_string(), limit.to_string()));
		}

		params
	}
}

/// Executes table requests against `<base>/rest/v1/<table>`.
#[derive(Debug, Clone)]
pub struct RestClient {
	client: Client,
	base: Url,
}
impl RestClient {
	pub fn new(client: Client, base: &Url) -> Result<Self> {
		let base = crate::join_path(base, &["rest", "v1"])?;

		Ok(Self { client, base })
	}

	pub fn table_url(&self, table: &str) -> Result<Url> {
		crate::join_path(&self.base, &[table])
	}

	pub async fn select<T>(&self, query: &Query) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		let req = self.client.get(self.table_url(query.table_name())?).query(&query.params(true));

		read_rows(req, query.table_name()).await
	}

	/// Requests exactly one row as a bare object. Zero or several matches are `NotFound`.
	pub async fn select_single<T>(&self, query: &Query) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let req = self
			.client
			.get(self.table_url(query.table_name())?)
			.query(&query.params(true))
			.header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT));

		match read_json(req).await {
			Err(err) if is_single_row_miss(&err) =>
				Err(Error::NotFound { message: format!("No single row in {}.", query.table) }),
			other => other,
		}
	}

	pub async fn insert<B, T>(&self, table: &str, body: &B) -> Result<Vec<T>>
	where
		B: Serialize + ?Sized,
		T: DeserializeOwned,
	{
		let req = self
			.client
			.post(self.table_url(table)?)
			.header("Prefer", RETURN_REPRESENTATION)
			.json(body);

		read_rows(req, table).await
	}

	pub async fn update<B, T>(&self, query: &Query, body: &B) -> Result<Vec<T>>
	where
		B: Serialize + ?Sized,
		T: DeserializeOwned,
	{
		let req = self
			.client
			.patch(self.table_url(query.table_name())?)
			.query(&query.params(false))
			.header("Prefer", RETURN_REPRESENTATION)
			.json(body);

		read_rows(req, query.table_name()).await
	}
}

fn is_single_row_miss(err: &Error) -> bool {
	err.backend_code() == Some(NO_SINGLE_ROW) || matches!(err, Error::Backend { status: 406, .. })
}

async fn read_json<T>(req: RequestBuilder) -> Result<T>
where
	T: DeserializeOwned,
{
	let res = crate::check_status(req.send().await?).await?;
	let bytes = res.bytes().await?;

	Ok(serde_json::from_slice(&bytes)?)
}

/// Reads a row array, decoding each row on its own. Rows that do not fit `T` are logged and
/// skipped so the rest of the page is still returned.
async fn read_rows<T>(req: RequestBuilder, table: &str) -> Result<Vec<T>>
where
	T: DeserializeOwned,
{
	let rows: Vec<Value> = read_json(req).await?;

	Ok(decode_rows(rows, table))
}

fn decode_rows<T>(rows: Vec<Value>, table: &str) -> Vec<T>
where
	T: DeserializeOwned,
{
	rows.into_iter()
		.enumerate()
		.filter_map(|(index, row)| match serde_json::from_value(row) {
			Ok(decoded) => Some(decoded),
			Err(err) => {
				tracing::warn!(error = %err, table, index, "Skipping malformed row.");

				None
			},
		})
		.collect()
}
