//! In-memory stand-in for the hosted backend: PostgREST-style tables under `/rest/v1` and an
//! object store under `/storage/v1`, covering only what the record store sends.

use std::{
	cmp::Ordering,
	collections::HashMap,
	future::IntoFuture,
	sync::{
		Arc, Mutex, MutexGuard,
		atomic::{AtomicBool, Ordering as AtomicOrdering},
	},
};

use axum::{
	Json, Router,
	body::Bytes,
	extract::{Path, Query, State},
	http::{HeaderMap, Method, StatusCode, header},
	response::{IntoResponse, Response},
	routing,
};
use serde_json::{Map, Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::{
	net::TcpListener,
	sync::{oneshot, oneshot::Sender},
};
use uuid::Uuid;

use crate::{Error, Result};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

type Row = Map<String, Value>;
type Params = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
	pub content_type: Option<String>,
	pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
	pub method: Method,
	pub path: String,
	pub params: Params,
	pub body: Value,
}
impl RecordedRequest {
	pub fn param(&self, key: &str) -> Option<&str> {
		self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
	}
}

#[derive(Default)]
struct Inner {
	tables: HashMap<String, Vec<Row>>,
	objects: HashMap<String, StoredObject>,
	requests: Vec<RecordedRequest>,
}

struct Shared {
	api_key: String,
	failing: AtomicBool,
	inner: Mutex<Inner>,
}
impl Shared {
	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(|err| err.into_inner())
	}

	/// Outage and key checks shared by every route.
	fn guard(&self, headers: &HeaderMap) -> Option<Response> {
		if self.failing.load(AtomicOrdering::SeqCst) {
			return Some(
				error_response(StatusCode::SERVICE_UNAVAILABLE, None, "Backend unavailable."),
			);
		}

		let key = headers.get("apikey").and_then(|value| value.to_str().ok());

		if key != Some(self.api_key.as_str()) {
			return Some(error_response(StatusCode::UNAUTHORIZED, None, "Invalid API key."));
		}

		None
	}

	fn record(&self, method: Method, path: String, params: Params, body: Value) {
		self.lock().requests.push(RecordedRequest { method, path, params, body });
	}
}

pub struct FakeBackend {
	url: String,
	shared: Arc<Shared>,
	shutdown: Option<Sender<()>>,
}
impl FakeBackend {
	pub async fn start(api_key: &str) -> Result<Self> {
		let shared = Arc::new(Shared {
			api_key: api_key.to_string(),
			failing: AtomicBool::new(false),
			inner: Mutex::new(Inner::default()),
		});
		let app = Router::new()
			.route(
				"/rest/v1/{table}",
				routing::get(select_rows).post(insert_rows).patch(update_rows),
			)
			.route("/storage/v1/object/{bucket}/{*path}", routing::post(upload_object))
			.with_state(shared.clone());
		let listener = TcpListener::bind("127.0.0.1:0").await?;
		let addr = listener.local_addr()?;
		let (tx, rx) = oneshot::channel();
		let server = axum::serve(listener, app).with_graceful_shutdown(async move {
			let _ = rx.await;
		});

		tokio::spawn(async move {
			let _ = server.into_future().await;
		});

		Ok(Self { url: format!("http://{addr}"), shared, shutdown: Some(tx) })
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn config(&self) -> notes_config::Config {
		notes_config::Config::new(self.url.as_str(), self.shared.api_key.as_str())
	}

	/// Makes every route answer 503 until switched back.
	pub fn set_failing(&self, failing: bool) {
		self.shared.failing.store(failing, AtomicOrdering::SeqCst);
	}

	pub fn seed(&self, table: &str, rows: Vec<Value>) -> Result<()> {
		let mut parsed = Vec::with_capacity(rows.len());

		for row in rows {
			let Value::Object(row) = row else {
				return Err(Error::Message(format!("Seed rows for {table} must be objects.")));
			};

			parsed.push(row);
		}

		self.shared.lock().tables.entry(table.to_string()).or_default().extend(parsed);

		Ok(())
	}

	pub fn rows(&self, table: &str) -> Vec<Row> {
		self.shared.lock().tables.get(table).cloned().unwrap_or_default()
	}

	pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
		self.shared.lock().objects.get(&object_key(bucket, path)).cloned()
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.shared.lock().requests.clone()
	}

}
impl Drop for FakeBackend {
	fn drop(&mut self) {
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
	}
}

async fn select_rows(
	State(shared): State<Arc<Shared>>,
	Path(table): Path<String>,
	Query(params): Query<Params>,
	headers: HeaderMap,
) -> Response {
	shared.record(Method::GET, format!("/rest/v1/{table}"), params.clone(), Value::Null);

	if let Some(rejected) = shared.guard(&headers) {
		return rejected;
	}

	let filters = match parse_filters(&params) {
		Ok(filters) => filters,
		Err(response) => return response,
	};
	let mut rows: Vec<Row> = shared
		.lock()
		.tables
		.get(&table)
		.map(|rows| rows.iter().filter(|row| matches_filters(row, &filters)).cloned().collect())
		.unwrap_or_default();

	if let Some(order) = param(&params, "order") {
		sort_rows(&mut rows, order);
	}
	if let Some(limit) = param(&params, "limit").and_then(|raw| raw.parse::<usize>().ok()) {
		rows.truncate(limit);
	}

	let wants_single = headers
		.get(header::ACCEPT)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|accept| accept.contains(SINGLE_OBJECT));

	if wants_single {
		if rows.len() != 1 {
			return (
				StatusCode::NOT_ACCEPTABLE,
				Json(json!({
					"code": "PGRST116",
					"details": format!("The result contains {} rows", rows.len()),
					"hint": null,
					"message": "JSON object requested, multiple (or no) rows returned",
				})),
			)
				.into_response();
		}

		return (StatusCode::OK, Json(Value::Object(rows.remove(0)))).into_response();
	}

	(StatusCode::OK, Json(rows)).into_response()
}

async fn insert_rows(
	State(shared): State<Arc<Shared>>,
	Path(table): Path<String>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

	shared.record(Method::POST, format!("/rest/v1/{table}"), Vec::new(), payload.clone());

	if let Some(rejected) = shared.guard(&headers) {
		return rejected;
	}

	let incoming = match payload {
		Value::Object(row) => vec![row],
		Value::Array(rows) => rows
			.into_iter()
			.filter_map(|row| match row {
				Value::Object(row) => Some(row),
				_ => None,
			})
			.collect(),
		_ => return error_response(StatusCode::BAD_REQUEST, Some("PGRST102"), "Invalid body."),
	};
	let mut inserted = Vec::with_capacity(incoming.len());

	{
		let mut inner = shared.lock();
		let rows = inner.tables.entry(table).or_default();

		for mut row in incoming {
			row.entry("id").or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
			rows.push(row.clone());
			inserted.push(row);
		}
	}

	representation(&headers, StatusCode::CREATED, inserted)
}

async fn update_rows(
	State(shared): State<Arc<Shared>>,
	Path(table): Path<String>,
	Query(params): Query<Params>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

	shared.record(Method::PATCH, format!("/rest/v1/{table}"), params.clone(), payload.clone());

	if let Some(rejected) = shared.guard(&headers) {
		return rejected;
	}

	let Value::Object(changes) = payload else {
		return error_response(StatusCode::BAD_REQUEST, Some("PGRST102"), "Invalid body.");
	};
	let filters = match parse_filters(&params) {
		Ok(filters) => filters,
		Err(response) => return response,
	};
	let mut updated = Vec::new();

	{
		let mut inner = shared.lock();

		if let Some(rows) = inner.tables.get_mut(&table) {
			for row in rows.iter_mut().filter(|row| matches_filters(row, &filters)) {
				for (key, value) in &changes {
					row.insert(key.clone(), value.clone());
				}

				updated.push(row.clone());
			}
		}
	}

	representation(&headers, StatusCode::OK, updated)
}

async fn upload_object(
	State(shared): State<Arc<Shared>>,
	Path((bucket, path)): Path<(String, String)>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	shared.record(
		Method::POST,
		format!("/storage/v1/object/{bucket}/{path}"),
		Vec::new(),
		json!({ "size": body.len() }),
	);

	if let Some(rejected) = shared.guard(&headers) {
		return rejected;
	}

	let key = object_key(&bucket, &path);
	let upsert = headers
		.get("x-upsert")
		.and_then(|value| value.to_str().ok())
		.is_some_and(|value| value == "true");
	let content_type = headers
		.get(header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.map(str::to_string);
	let mut inner = shared.lock();

	if inner.objects.contains_key(&key) && !upsert {
		return (
			StatusCode::BAD_REQUEST,
			Json(json!({
				"statusCode": "409",
				"error": "Duplicate",
				"message": "The resource already exists",
			})),
		)
			.into_response();
	}

	inner.objects.insert(key.clone(), StoredObject { content_type, bytes: body.to_vec() });

	(StatusCode::OK, Json(json!({ "Key": key, "Id": Uuid::new_v4().to_string() }))).into_response()
}

fn representation(headers: &HeaderMap, status: StatusCode, rows: Vec<Row>) -> Response {
	let wants_rows = headers
		.get("prefer")
		.and_then(|value| value.to_str().ok())
		.is_some_and(|prefer| prefer.contains("return=representation"));

	if wants_rows { (status, Json(rows)).into_response() } else { status.into_response() }
}

fn error_response(status: StatusCode, code: Option<&str>, message: &str) -> Response {
	(status, Json(json!({ "code": code, "message": message }))).into_response()
}

fn object_key(bucket: &str, path: &str) -> String {
	format!("{bucket}/{}", path.trim_start_matches('/'))
}

fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
	params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
}

/// Equality filters only. Other operators are rejected the way PostgREST rejects unknown ones.
#[allow(clippy::result_large_err)]
fn parse_filters(params: &Params) -> std::result::Result<Vec<(String, String)>, Response> {
	let mut filters = Vec::new();

	for (column, raw) in params {
		if matches!(column.as_str(), "select" | "order" | "limit" | "offset") {
			continue;
		}

		let Some(value) = raw.strip_prefix("eq.") else {
			return Err(error_response(
				StatusCode::BAD_REQUEST,
				Some("PGRST100"),
				&format!("Unsupported filter {column}={raw}."),
			));
		};

		filters.push((column.clone(), value.to_string()));
	}

	Ok(filters)
}

fn matches_filters(row: &Row, filters: &[(String, String)]) -> bool {
	filters
		.iter()
		.all(|(column, expected)| row.get(column).map(render).as_deref() == Some(expected.as_str()))
}

fn render(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		other => other.to_string(),
	}
}

/// `<column>.<asc|desc>`. Nulls sort last ascending and first descending.
fn sort_rows(rows: &mut [Row], order: &str) {
	let mut parts = order.split('.');
	let column = parts.next().unwrap_or_default().to_string();
	let descending = parts.next() == Some("desc");

	rows.sort_by(|a, b| {
		let ordering = compare(a.get(&column), b.get(&column));

		if descending { ordering.reverse() } else { ordering }
	});
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
	let a = a.filter(|value| !value.is_null());
	let b = b.filter(|value| !value.is_null());

	match (a, b) {
		(None, None) => Ordering::Equal,
		(None, Some(_)) => Ordering::Greater,
		(Some(_), None) => Ordering::Less,
		(Some(Value::Number(a)), Some(Value::Number(b))) => a
			.as_f64()
			.unwrap_or_default()
			.partial_cmp(&b.as_f64().unwrap_or_default())
			.unwrap_or(Ordering::Equal),
		(Some(Value::String(a)), Some(Value::String(b))) => {
			match (OffsetDateTime::parse(a, &Rfc3339), OffsetDateTime::parse(b, &Rfc3339)) {
				(Ok(a), Ok(b)) => a.cmp(&b),
				_ => a.cmp(b),
			}
		},
		(Some(a), Some(b)) => render(a).cmp(&render(b)),
	}
}
