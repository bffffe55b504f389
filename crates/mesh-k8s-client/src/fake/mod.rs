// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory API server for tests.
//!
//! [`FakeApiServer`] implements [`Transport`], so any accessor can be pointed
//! at it instead of a cluster. It stores objects of every kind as JSON and
//! follows the API server's rules for the behaviour accessors depend on:
//!
//! - resource versions, uids, creation timestamps and generations are
//!   assigned on write
//! - creates of taken names and updates at a stale version are rejected
//! - delete preconditions and `dryRun=All` are honoured
//! - JSON, merge and server-side apply patches are applied; strategic merge
//!   is refused for custom resources
//! - the `status` subresource accepts GET, PUT and PATCH and changes only
//!   the object's `status`
//! - lists evaluate label and field selectors and paginate with continue
//!   tokens
//! - watches replay from a bounded history and report `410 Expired` for
//!   start points older than the compaction watermark
//!
//! Server-side apply is modelled as a merge of the applied configuration
//! without field ownership conflicts.

mod patch;
mod route;
mod selector;
mod store;
mod watch;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::{Method, Request};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{ClientResult, Status, StatusCause, StatusDetails};
use crate::options::PatchType;
use crate::transport::{LineStream, Transport};

use route::{bad_request, expired, unknown_path, unsupported_media_type, Query, Route};
use selector::Filter;
use store::{Change, ContinueToken, ObjectKey, Store};
use watch::Watcher;

pub use store::DEFAULT_HISTORY_LIMIT;

const STALE: &str = "the object has been modified; please apply your changes to the latest version and try again";

/// Checks an object before it is stored; the error becomes a `422 Invalid`.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A request as the fake server received it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
	pub method: Method,
	pub uri: String,
	pub content_type: Option<String>,
}

/// Shared handle to an in-memory API server. Clones see the same state.
#[derive(Clone)]
pub struct FakeApiServer {
	inner: Arc<Inner>,
}

struct Inner {
	store: Mutex<Store>,
	changes: broadcast::Sender<Change>,
	validators: RwLock<HashMap<String, Validator>>,
	latency: Mutex<Option<Duration>>,
	requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteBody {
	#[serde(default)]
	preconditions: Option<PreconditionsBody>,
	#[serde(default)]
	dry_run: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreconditionsBody {
	uid: Option<String>,
	resource_version: Option<String>,
}

impl DeleteBody {
	fn decode(body: &[u8]) -> Result<Self, Status> {
		if body.is_empty() {
			return Ok(Self::default());
		}
		serde_json::from_slice(body).map_err(|e| bad_request(format!("invalid delete options: {e}")))
	}

	fn dry_run(&self) -> bool {
		self.dry_run.iter().any(|v| v == "All")
	}
}

impl FakeApiServer {
	pub fn new() -> Self {
		Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
	}

	/// A server that keeps only the last `limit` changes for watch replay.
	pub fn with_history_limit(limit: usize) -> Self {
		let (changes, _) = broadcast::channel(1024);
		Self {
			inner: Arc::new(Inner {
				store: Mutex::new(Store::new(limit.max(1))),
				changes,
				validators: RwLock::new(HashMap::new()),
				latency: Mutex::new(None),
				requests: Mutex::new(Vec::new()),
			}),
		}
	}

	/// Runs `validator` on every object written to the `resource` collection.
	pub fn validate_with<F>(&self, resource: &str, validator: F)
	where
		F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self
			.inner
			.validators
			.write()
			.insert(resource.to_string(), Arc::new(validator));
	}

	/// Delays every unary response by `latency`.
	pub fn set_latency(&self, latency: Option<Duration>) {
		*self.inner.latency.lock() = latency;
	}

	/// Drops all change history; watches from older versions get `410`.
	pub fn compact(&self) {
		self.inner.store.lock().compact();
	}

	/// Sends a bookmark at the current version to watchers that asked for them.
	pub fn bookmark(&self) {
		let store = self.inner.store.lock();
		self.publish(Change::bookmark(store.current()));
	}

	pub fn resource_version(&self) -> String {
		self.inner.store.lock().current().to_string()
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.inner.requests.lock().clone()
	}

	fn record(&self, request: &Request<Vec<u8>>) {
		trace!(method = %request.method(), uri = %request.uri(), "fake api server request");
		self.inner.requests.lock().push(RecordedRequest {
			method: request.method().clone(),
			uri: request.uri().to_string(),
			content_type: content_type(request.headers()).map(str::to_string),
		});
	}

	fn publish(&self, change: Change) {
		// No watchers is fine.
		let _ = self.inner.changes.send(change);
	}

	fn handle(&self, parts: &Parts, body: &[u8]) -> Result<Value, Status> {
		let route = Route::parse(parts.uri.path())?;
		let status_only = match route.subresources.as_slice() {
			[] => false,
			[sub] if sub == "status" && route.name.is_some() => true,
			_ => return Err(unknown_path(parts.uri.path())),
		};
		let query = Query::parse(parts.uri.query());

		match (&parts.method, route.name.as_deref()) {
			(&Method::POST, None) => self.create(&route, &query, body),
			(&Method::GET, None) => self.list(&route, &query),
			(&Method::DELETE, None) => self.delete_collection(&route, &query, body),
			(&Method::GET, Some(name)) => self.get(&route, name, &query),
			(&Method::PUT, Some(name)) => self.update(&route, name, &query, body, status_only),
			(&Method::DELETE, Some(name)) if !status_only => self.delete(&route, name, body),
			(&Method::PATCH, Some(name)) => self.patch(
				&route,
				name,
				&query,
				content_type(&parts.headers),
				body,
				status_only,
			),
			(method, _) => Err(Status::failure(
				405,
				"MethodNotAllowed",
				format!("{method} is not allowed on {}", parts.uri.path()),
			)),
		}
	}

	fn key(route: &Route, namespace: &str, name: &str) -> ObjectKey {
		ObjectKey {
			resource: route.collection(),
			namespace: namespace.to_string(),
			name: name.to_string(),
		}
	}

	fn validate(&self, route: &Route, name: &str, obj: &Value) -> Result<(), Status> {
		let validator = self.inner.validators.read().get(&route.plural).cloned();
		match validator {
			Some(validator) => validator(obj).map_err(|message| route.invalid(name, &message)),
			None => Ok(()),
		}
	}

	fn create(&self, route: &Route, query: &Query, body: &[u8]) -> Result<Value, Status> {
		let mut obj = decode_object(body)?;
		let namespace = bind_namespace(route, &mut obj)?;
		let name = match (store::name(&obj), store::generate_name(&obj)) {
			(Some(name), _) => name.to_string(),
			(None, Some(prefix)) => format!("{prefix}{}", &Uuid::new_v4().simple().to_string()[..5]),
			(None, None) => {
				return Err(route.invalid(
					"",
					"metadata.name: Required value: name or generateName is required",
				))
			}
		};
		self.validate(route, &name, &obj)?;

		let mut store = self.inner.store.lock();
		let key = Self::key(route, &namespace, &name);
		if store.get(&key).is_some() {
			return Err(route.already_exists(&name));
		}
		Ok(self.admit(&mut store, route, key, obj, query.get("fieldManager"), "Update", query.dry_run()))
	}

	fn get(&self, route: &Route, name: &str, query: &Query) -> Result<Value, Status> {
		query.number("resourceVersion")?;
		let store = self.inner.store.lock();
		let key = Self::key(route, route.namespace.as_deref().unwrap_or_default(), name);
		store.get(&key).cloned().ok_or_else(|| route.not_found(name))
	}

	fn list(&self, route: &Route, query: &Query) -> Result<Value, Status> {
		let filter = Filter::from_query(route.namespace.as_deref(), query)?;
		let limit = query.number("limit")?.filter(|l| *l > 0);
		let token = query
			.get("continue")
			.map(|raw| ContinueToken::decode(raw).ok_or_else(|| bad_request(format!("invalid continue token {raw:?}"))))
			.transpose()?;
		let requested = query.number("resourceVersion")?;
		if token.is_some() && requested.is_some() {
			return Err(bad_request("specifying resource version is not allowed when using continue"));
		}

		let store = self.inner.store.lock();
		let current = store.current();
		match (query.get("resourceVersionMatch"), requested) {
			(None, _) | (Some("NotOlderThan"), Some(_)) => {}
			(Some(_), None) => {
				return Err(bad_request(
					"resourceVersionMatch is forbidden unless resourceVersion is provided",
				))
			}
			(Some("Exact"), Some(rv)) if rv < current => {
				return Err(expired(format!("too old resource version: {rv} ({current})")))
			}
			(Some("Exact"), Some(rv)) if rv > current => {
				return Err(Status::failure(
					504,
					"Timeout",
					format!("Too large resource version: {rv}, current: {current}"),
				))
			}
			(Some("Exact"), Some(_)) => {}
			(Some(other), Some(_)) => return Err(bad_request(format!("unsupported resourceVersionMatch {other:?}"))),
		}
		if let Some(token) = &token {
			if token.snapshot < store.compacted() {
				return Err(expired(
					"The provided continue parameter is too old to display a consistent list result. \
					 You can start a new list without the continue parameter.",
				));
			}
		}

		let after = token.as_ref().map(|t| (t.namespace.as_str(), t.name.as_str()));
		let matching: Vec<(&ObjectKey, &Value)> = store
			.scan(&route.collection(), route.namespace.as_deref())
			.filter(|(key, _)| after.map_or(true, |after| (key.namespace.as_str(), key.name.as_str()) > after))
			.filter(|(_, obj)| filter.matches(obj))
			.collect();

		let take = limit.map_or(matching.len(), |l| matching.len().min(l as usize));
		let (page, rest) = matching.split_at(take);
		let snapshot = token.as_ref().map_or(current, |t| t.snapshot);
		let next = match (rest.is_empty(), page.last()) {
			(false, Some((key, _))) => Some(
				ContinueToken {
					snapshot,
					namespace: key.namespace.clone(),
					name: key.name.clone(),
				}
				.encode(),
			),
			_ => None,
		};
		let items = page.iter().map(|(_, obj)| (*obj).clone()).collect();
		Ok(list_body(route, snapshot, items, next, rest.len()))
	}

	/// Replaces an object, or only its `status` when `status_only` is set.
	fn update(
		&self,
		route: &Route,
		name: &str,
		query: &Query,
		body: &[u8],
		status_only: bool,
	) -> Result<Value, Status> {
		let mut obj = decode_object(body)?;
		let namespace = bind_namespace(route, &mut obj)?;
		if store::name(&obj) != Some(name) {
			return Err(bad_request(format!(
				"the name of the object ({}) does not match the name on the URL ({name})",
				store::name(&obj).unwrap_or_default()
			)));
		}

		let mut store = self.inner.store.lock();
		let key = Self::key(route, &namespace, name);
		let current = store.get(&key).cloned().ok_or_else(|| route.not_found(name))?;
		match store::resource_version(&obj) {
			None if route.is_custom() => {
				return Err(route.invalid(
					name,
					"metadata.resourceVersion: Invalid value: 0x0: must be specified for an update",
				))
			}
			Some(rv) if Some(rv) != store::resource_version(&current) => {
				return Err(route.conflict(name, STALE))
			}
			_ => {}
		}
		if status_only {
			obj = with_status_of(&current, &obj);
		}
		self.validate(route, name, &obj)?;
		Ok(self.commit(
			&mut store,
			route,
			key,
			current,
			obj,
			query.get("fieldManager"),
			"Update",
			query.dry_run(),
		))
	}

	fn delete(&self, route: &Route, name: &str, body: &[u8]) -> Result<Value, Status> {
		let opts = DeleteBody::decode(body)?;
		let mut store = self.inner.store.lock();
		let key = Self::key(route, route.namespace.as_deref().unwrap_or_default(), name);
		let current = store.get(&key).cloned().ok_or_else(|| route.not_found(name))?;
		check_preconditions(route, name, &current, &opts)?;
		if opts.dry_run() {
			return Ok(current);
		}
		Ok(self.remove(&mut store, &key, current))
	}

	fn delete_collection(&self, route: &Route, query: &Query, body: &[u8]) -> Result<Value, Status> {
		let opts = DeleteBody::decode(body)?;
		let filter = Filter::from_query(route.namespace.as_deref(), query)?;

		let mut store = self.inner.store.lock();
		let targets: Vec<(ObjectKey, Value)> = store
			.scan(&route.collection(), route.namespace.as_deref())
			.filter(|(_, obj)| filter.matches(obj))
			.map(|(key, obj)| (key.clone(), obj.clone()))
			.collect();
		let total = targets.len();

		let mut deleted = Vec::new();
		let mut causes = Vec::new();
		for (key, obj) in targets {
			if let Err(status) = check_preconditions(route, &key.name, &obj, &opts) {
				causes.push(StatusCause {
					reason: Some(status.reason),
					message: Some(status.message),
					field: Some(key.name.clone()),
				});
				continue;
			}
			if opts.dry_run() {
				deleted.push(obj);
			} else {
				deleted.push(self.remove(&mut store, &key, obj));
			}
		}

		if !causes.is_empty() {
			debug!(failed = causes.len(), total, "delete collection partially failed");
			return Err(Status::failure(
				409,
				"Conflict",
				format!("{} of {total} {} could not be deleted", causes.len(), route.qualified()),
			)
			.with_details(StatusDetails {
				name: None,
				kind: Some(route.plural.clone()),
				causes,
			}));
		}
		Ok(list_body(route, store.current(), deleted, None, 0))
	}

	fn patch(
		&self,
		route: &Route,
		name: &str,
		query: &Query,
		content_type: Option<&str>,
		body: &[u8],
		status_only: bool,
	) -> Result<Value, Status> {
		let content_type = content_type.unwrap_or_default();
		let patch_type = PatchType::from_content_type(content_type)
			.filter(|pt| !(*pt == PatchType::StrategicMerge && route.is_custom()))
			.ok_or_else(|| unsupported_media_type(content_type))?;
		let payload: Value =
			serde_json::from_slice(body).map_err(|e| bad_request(format!("error decoding patch: {e}")))?;
		let manager = query.get("fieldManager");
		if patch_type == PatchType::Apply && manager.is_none() {
			return Err(Status::failure(
				422,
				"Invalid",
				"PatchOptions.meta.k8s.io \"\" is invalid: fieldManager: Required value: is required for apply patch",
			));
		}

		let namespace = route.namespace.clone().unwrap_or_default();
		let key = Self::key(route, &namespace, name);
		let mut store = self.inner.store.lock();
		let Some(current) = store.get(&key).cloned() else {
			if patch_type != PatchType::Apply || status_only {
				return Err(route.not_found(name));
			}
			let mut obj = payload;
			bind_namespace(route, &mut obj)?;
			match store::name(&obj) {
				Some(given) if given != name => {
					return Err(bad_request(format!(
						"the name of the object ({given}) does not match the name on the URL ({name})"
					)))
				}
				Some(_) => {}
				None => {
					store::metadata_mut(&mut obj).insert("name".to_string(), json!(name));
				}
			}
			self.validate(route, name, &obj)?;
			return Ok(self.admit(&mut store, route, key, obj, manager, "Apply", query.dry_run()));
		};

		let mut obj = current.clone();
		match patch_type {
			PatchType::Json => {
				patch::apply_json_patch(&mut obj, &payload).map_err(|e| route.invalid(name, &e))?
			}
			_ => patch::merge(&mut obj, &payload),
		}

		if store::name(&obj) != Some(name) {
			return Err(route.invalid(name, "metadata.name: Invalid value: field is immutable"));
		}
		if store::namespace(&obj) != store::namespace(&current) {
			return Err(route.invalid(name, "metadata.namespace: Invalid value: field is immutable"));
		}
		if store::resource_version(&obj) != store::resource_version(&current) {
			return Err(route.conflict(name, STALE));
		}
		if status_only {
			obj = with_status_of(&current, &obj);
		}
		self.validate(route, name, &obj)?;

		let operation = if patch_type == PatchType::Apply {
			"Apply"
		} else {
			"Update"
		};
		Ok(self.commit(&mut store, route, key, current, obj, manager, operation, query.dry_run()))
	}

	fn watch(&self, route: &Route, query: &Query) -> Result<LineStream, Status> {
		let watcher = Watcher::new(route, query)?;
		let timeout = query.number("timeoutSeconds")?.map(Duration::from_secs);
		let start = query.number("resourceVersion")?;

		let store = self.inner.store.lock();
		// Subscribe under the lock so no commit falls between replay and follow.
		let receiver = self.inner.changes.subscribe();
		let initial = match start {
			None | Some(0) => store
				.scan(&watcher.collection, route.namespace.as_deref())
				.filter_map(|(_, obj)| watcher.added(obj))
				.collect(),
			Some(rv) if rv < store.compacted() => {
				debug!(rv, compacted = store.compacted(), "watch start point compacted");
				return Ok(watch::closed(expired(format!(
					"too old resource version: {rv} ({})",
					store.compacted()
				))));
			}
			Some(rv) => store
				.history_since(rv)
				.filter_map(|change| watcher.project(change))
				.collect(),
		};
		drop(store);

		Ok(watch::stream(initial, receiver, watcher, timeout))
	}

	/// Stamps system fields on a new object and stores it.
	#[allow(clippy::too_many_arguments)]
	fn admit(
		&self,
		store: &mut Store,
		route: &Route,
		key: ObjectKey,
		mut obj: Value,
		manager: Option<&str>,
		operation: &str,
		dry_run: bool,
	) -> Value {
		let now = timestamp();
		{
			let meta = store::metadata_mut(&mut obj);
			meta.insert("name".to_string(), json!(key.name));
			if !key.namespace.is_empty() {
				meta.insert("namespace".to_string(), json!(key.namespace));
			}
			meta.insert("uid".to_string(), json!(Uuid::new_v4().to_string()));
			meta.insert("creationTimestamp".to_string(), json!(now));
			meta.insert("generation".to_string(), json!(1));
			meta.remove("resourceVersion");
			meta.remove("managedFields");
		}
		record_manager(&mut obj, &route.api_version(), manager, operation, &now);
		if dry_run {
			return obj;
		}

		let rv = store.next_version();
		store::metadata_mut(&mut obj).insert("resourceVersion".to_string(), json!(rv.to_string()));
		debug!(resource = %route.qualified(), name = %key.name, rv, "object created");
		let change = store.put(key, obj.clone(), None);
		self.publish(change);
		obj
	}

	/// Writes `obj` over `current`, keeping server-owned metadata.
	#[allow(clippy::too_many_arguments)]
	fn commit(
		&self,
		store: &mut Store,
		route: &Route,
		key: ObjectKey,
		current: Value,
		mut obj: Value,
		manager: Option<&str>,
		operation: &str,
		dry_run: bool,
	) -> Value {
		let now = timestamp();
		let generation = store::generation(&current) + i64::from(current.get("spec") != obj.get("spec"));
		{
			let meta = store::metadata_mut(&mut obj);
			for field in ["uid", "creationTimestamp", "managedFields"] {
				match store::metadata(&current).and_then(|m| m.get(field)) {
					Some(value) => meta.insert(field.to_string(), value.clone()),
					None => meta.remove(field),
				};
			}
			meta.insert("generation".to_string(), json!(generation));
		}
		record_manager(&mut obj, &route.api_version(), manager, operation, &now);
		if dry_run {
			return obj;
		}

		let rv = store.next_version();
		store::metadata_mut(&mut obj).insert("resourceVersion".to_string(), json!(rv.to_string()));
		debug!(resource = %route.qualified(), name = %key.name, rv, "object updated");
		let change = store.put(key, obj.clone(), Some(current));
		self.publish(change);
		obj
	}

	fn remove(&self, store: &mut Store, key: &ObjectKey, mut obj: Value) -> Value {
		let rv = store.next_version();
		store::metadata_mut(&mut obj).insert("resourceVersion".to_string(), json!(rv.to_string()));
		debug!(resource = %key.resource, name = %key.name, rv, "object deleted");
		let change = store.delete(key, obj.clone());
		self.publish(change);
		obj
	}
}

impl Default for FakeApiServer {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for FakeApiServer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FakeApiServer")
			.field("resource_version", &self.inner.store.lock().current())
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl Transport for FakeApiServer {
	async fn execute(&self, request: Request<Vec<u8>>) -> ClientResult<String> {
		self.record(&request);
		let latency = *self.inner.latency.lock();
		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}

		let (parts, body) = request.into_parts();
		match self.handle(&parts, &body) {
			Ok(value) => Ok(value.to_string()),
			Err(status) => {
				debug!(code = status.code, reason = %status.reason, "fake api server rejected request");
				Err(status.into())
			}
		}
	}

	async fn stream(&self, request: Request<Vec<u8>>) -> ClientResult<LineStream> {
		self.record(&request);
		let route = Route::parse(request.uri().path())?;
		let query = Query::parse(request.uri().query());
		if *request.method() != Method::GET || route.name.is_some() || !query.flag("watch") {
			return Err(bad_request("watch requests must GET a collection with watch=true").into());
		}
		Ok(self.watch(&route, &query)?)
	}
}

fn content_type(headers: &http::HeaderMap) -> Option<&str> {
	headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

fn timestamp() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn decode_object(body: &[u8]) -> Result<Value, Status> {
	let obj: Value =
		serde_json::from_slice(body).map_err(|e| bad_request(format!("error decoding object: {e}")))?;
	if !obj.is_object() {
		return Err(bad_request("request body must be a JSON object"));
	}
	Ok(obj)
}

/// Reconciles the object's namespace with the one in the URL.
fn bind_namespace(route: &Route, obj: &mut Value) -> Result<String, Status> {
	let given = store::namespace(obj).map(str::to_string);
	match (&route.namespace, given) {
		(Some(path), Some(given)) if *path != given => Err(bad_request(
			"the namespace of the provided object does not match the namespace sent on the request",
		)),
		(Some(path), _) => {
			store::metadata_mut(obj).insert("namespace".to_string(), json!(path));
			Ok(path.clone())
		}
		(None, given) => Ok(given.unwrap_or_default()),
	}
}

/// `current` with its `status` taken from `requested`; writes through the
/// status subresource ignore everything else.
fn with_status_of(current: &Value, requested: &Value) -> Value {
	let mut obj = current.clone();
	if let Value::Object(map) = &mut obj {
		match requested.get("status") {
			Some(status) => map.insert("status".to_string(), status.clone()),
			None => map.remove("status"),
		};
	}
	obj
}

fn check_preconditions(route: &Route, name: &str, current: &Value, opts: &DeleteBody) -> Result<(), Status> {
	let Some(preconditions) = &opts.preconditions else {
		return Ok(());
	};
	if let Some(uid) = &preconditions.uid {
		let actual = store::uid(current).unwrap_or_default();
		if uid.as_str() != actual {
			return Err(route.conflict(
				name,
				&format!("Precondition failed: UID in precondition: {uid}, UID in object meta: {actual}"),
			));
		}
	}
	if let Some(rv) = &preconditions.resource_version {
		let actual = store::resource_version(current).unwrap_or_default();
		if rv.as_str() != actual {
			return Err(route.conflict(
				name,
				&format!(
					"Precondition failed: ResourceVersion in precondition: {rv}, ResourceVersion in object meta: {actual}"
				),
			));
		}
	}
	Ok(())
}

fn record_manager(obj: &mut Value, api_version: &str, manager: Option<&str>, operation: &str, now: &str) {
	let Some(manager) = manager else {
		return;
	};
	let entries = store::metadata_mut(obj)
		.entry("managedFields")
		.or_insert_with(|| json!([]));
	if !entries.is_array() {
		*entries = json!([]);
	}
	if let Value::Array(entries) = entries {
		entries.retain(|e| !(e["manager"] == manager && e["operation"] == operation));
		entries.push(json!({
			"manager": manager,
			"operation": operation,
			"apiVersion": api_version,
			"time": now,
			"fieldsType": "FieldsV1",
		}));
	}
}

fn list_body(
	route: &Route,
	resource_version: u64,
	items: Vec<Value>,
	continue_token: Option<String>,
	remaining: usize,
) -> Value {
	let mut metadata = json!({ "resourceVersion": resource_version.to_string() });
	if let Some(token) = continue_token {
		metadata["continue"] = json!(token);
		metadata["remainingItemCount"] = json!(remaining);
	}
	let kind = items
		.first()
		.and_then(|obj| obj.get("kind"))
		.and_then(Value::as_str)
		.map(|kind| format!("{kind}List"));

	let mut list = json!({
		"apiVersion": route.api_version(),
		"metadata": metadata,
		"items": items,
	});
	if let Some(kind) = kind {
		list["kind"] = json!(kind);
	}
	list
}
