// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The generic typed client every resource accessor delegates to.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{future, StreamExt};
use http::Method;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::codec::ParameterCodec;
use crate::context::Context;
use crate::error::{ClientError, ClientResult};
use crate::options::{
	CreateOptions, DeleteOptions, GetOptions, ListOptions, PatchOptions, PatchType, UpdateOptions,
};
use crate::request::{self, validate_segment, ResourcePath, JSON};
use crate::transport::RestClient;
use crate::watch::{decode_event, WatchStream};

/// Standard verbs for a resource kind `K` whose list wrapper is `L`.
///
/// Kind-specific verbs belong in a separate extension trait implemented next
/// to this one.
#[async_trait]
pub trait ResourceInterface<K, L>: Send + Sync {
	async fn create(&self, ctx: &Context, obj: &K, opts: &CreateOptions) -> ClientResult<K>;

	/// Replace an object; `obj` must carry the version it was read at.
	async fn update(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> ClientResult<K>;

	async fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> ClientResult<()>;

	/// Delete every object matching `list_opts`.
	///
	/// Per-item failures are reported together as
	/// [`ClientError::DeleteCollection`].
	async fn delete_collection(
		&self,
		ctx: &Context,
		opts: &DeleteOptions,
		list_opts: &ListOptions,
	) -> ClientResult<()>;

	async fn get(&self, ctx: &Context, name: &str, opts: &GetOptions) -> ClientResult<K>;

	async fn list(&self, ctx: &Context, opts: &ListOptions) -> ClientResult<L>;

	/// Open a watch. The stream lives until the server closes it or `ctx` ends.
	async fn watch(&self, ctx: &Context, opts: &ListOptions) -> ClientResult<WatchStream<K>>;

	async fn patch(
		&self,
		ctx: &Context,
		name: &str,
		patch_type: PatchType,
		data: &[u8],
		opts: &PatchOptions,
		subresources: &[&str],
	) -> ClientResult<K>;
}

/// Typed REST client for one resource kind, bound to a namespace.
///
/// Holds no mutable state; clones share the transport and codec.
pub struct ClientWithList<K, L> {
	path: ResourcePath,
	rest: RestClient,
	codec: Arc<ParameterCodec>,
	scope: Scope,
	_types: PhantomData<fn() -> (K, L)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Scope {
	/// A namespaced kind; the empty namespace addresses all namespaces.
	Namespaced(String),
	Cluster,
}

impl<K, L> ClientWithList<K, L>
where
	K: Resource<DynamicType = ()>,
{
	/// Accessor for a namespaced kind stored under `resource` (its plural name).
	pub fn new(resource: &str, rest: RestClient, codec: Arc<ParameterCodec>, namespace: &str) -> Self {
		Self::with_scope(resource, rest, codec, Scope::Namespaced(namespace.to_string()))
	}

	/// Accessor for a cluster-scoped kind.
	pub fn new_cluster(resource: &str, rest: RestClient, codec: Arc<ParameterCodec>) -> Self {
		Self::with_scope(resource, rest, codec, Scope::Cluster)
	}

	fn with_scope(resource: &str, rest: RestClient, codec: Arc<ParameterCodec>, scope: Scope) -> Self {
		Self {
			path: ResourcePath::new(K::group(&()), K::version(&()), resource),
			rest,
			codec,
			scope,
			_types: PhantomData,
		}
	}
}

impl<K, L> ClientWithList<K, L> {
	/// The namespace this accessor is bound to; empty for all namespaces.
	pub fn namespace(&self) -> &str {
		match &self.scope {
			Scope::Namespaced(ns) => ns,
			Scope::Cluster => "",
		}
	}

	pub fn resource(&self) -> &str {
		self.path.plural()
	}

	/// Namespace segment for collection reads; `None` spans all namespaces.
	fn read_namespace(&self) -> ClientResult<Option<&str>> {
		match &self.scope {
			Scope::Namespaced(ns) if !ns.is_empty() => {
				validate_segment("namespace", ns)?;
				Ok(Some(ns))
			}
			_ => Ok(None),
		}
	}

	/// Namespace segment for calls addressing a single object.
	fn object_namespace(&self) -> ClientResult<Option<&str>> {
		match &self.scope {
			Scope::Namespaced(ns) if ns.is_empty() => Err(ClientError::request(format!(
				"a namespace is required to address a single {}",
				self.path.plural()
			))),
			Scope::Namespaced(ns) => {
				validate_segment("namespace", ns)?;
				Ok(Some(ns))
			}
			Scope::Cluster => Ok(None),
		}
	}

	fn collection_path(&self, single_object: bool) -> ClientResult<String> {
		let namespace = if single_object {
			self.object_namespace()?
		} else {
			self.read_namespace()?
		};
		Ok(self.path.collection(namespace))
	}

	fn item_path(&self, name: &str, subresources: &[&str]) -> ClientResult<String> {
		self.path.item(self.object_namespace()?, name, subresources)
	}

	async fn send<T: DeserializeOwned>(&self, ctx: &Context, request: http::Request<Vec<u8>>) -> ClientResult<T> {
		debug!(method = %request.method(), uri = %request.uri(), "sending request");
		let body = self.rest.execute(ctx, request).await?;
		trace!(bytes = body.len(), "decoding response");
		Ok(serde_json::from_str(&body)?)
	}
}

fn object_name<K: Resource>(obj: &K) -> ClientResult<&str> {
	obj.meta()
		.name
		.as_deref()
		.filter(|name| !name.is_empty())
		.ok_or_else(|| ClientError::request("resource name may not be empty"))
}

#[async_trait]
impl<K, L> ResourceInterface<K, L> for ClientWithList<K, L>
where
	K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Debug + Send + Sync + 'static,
	L: DeserializeOwned + Send + 'static,
{
	#[instrument(skip_all, fields(resource = %self.path.plural(), namespace = %self.namespace()))]
	async fn create(&self, ctx: &Context, obj: &K, opts: &CreateOptions) -> ClientResult<K> {
		let path = self.collection_path(true)?;
		let body = serde_json::to_vec(obj).map_err(|e| ClientError::request(e.to_string()))?;
		let req = request::build(Method::POST, &path, &self.codec.encode_create(opts), Some(JSON), body)?;
		self.send(ctx, req).await
	}

	#[instrument(skip_all, fields(resource = %self.path.plural(), namespace = %self.namespace()))]
	async fn update(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> ClientResult<K> {
		let path = self.item_path(object_name(obj)?, &[])?;
		let body = serde_json::to_vec(obj).map_err(|e| ClientError::request(e.to_string()))?;
		let req = request::build(Method::PUT, &path, &self.codec.encode_update(opts), Some(JSON), body)?;
		self.send(ctx, req).await
	}

	#[instrument(skip(self, ctx, opts), fields(resource = %self.path.plural(), namespace = %self.namespace()))]
	async fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> ClientResult<()> {
		let path = self.item_path(name, &[])?;
		let body = serde_json::to_vec(opts).map_err(|e| ClientError::request(e.to_string()))?;
		let req = request::build(Method::DELETE, &path, "", Some(JSON), body)?;
		self.rest.execute(ctx, req).await?;
		Ok(())
	}

	#[instrument(skip_all, fields(resource = %self.path.plural(), namespace = %self.namespace()))]
	async fn delete_collection(
		&self,
		ctx: &Context,
		opts: &DeleteOptions,
		list_opts: &ListOptions,
	) -> ClientResult<()> {
		let path = self.collection_path(false)?;
		let body = serde_json::to_vec(opts).map_err(|e| ClientError::request(e.to_string()))?;
		let req = request::build(
			Method::DELETE,
			&path,
			&self.codec.encode_list(list_opts),
			Some(JSON),
			body,
		)?;
		self
			.rest
			.execute(ctx, req)
			.await
			.map_err(ClientError::into_delete_collection)?;
		Ok(())
	}

	#[instrument(skip(self, ctx, opts), fields(resource = %self.path.plural(), namespace = %self.namespace()))]
	async fn get(&self, ctx: &Context, name: &str, opts: &GetOptions) -> ClientResult<K> {
		let path = self.item_path(name, &[])?;
		let req = request::build(Method::GET, &path, &self.codec.encode_get(opts), None, Vec::new())?;
		self.send(ctx, req).await
	}

	#[instrument(skip_all, fields(resource = %self.path.plural(), namespace = %self.namespace()))]
	async fn list(&self, ctx: &Context, opts: &ListOptions) -> ClientResult<L> {
		let path = self.collection_path(false)?;
		let req = request::build(Method::GET, &path, &self.codec.encode_list(opts), None, Vec::new())?;
		self.send(ctx, req).await
	}

	#[instrument(skip_all, fields(resource = %self.path.plural(), namespace = %self.namespace()))]
	async fn watch(&self, ctx: &Context, opts: &ListOptions) -> ClientResult<WatchStream<K>> {
		let path = self.collection_path(false)?;
		let req = request::build(Method::GET, &path, &self.codec.encode_watch(opts), None, Vec::new())?;
		debug!(uri = %req.uri(), "opening watch");
		let lines = self.rest.stream(ctx, req).await?;
		let events = lines.filter_map(|line| {
			future::ready(match line {
				Ok(line) => decode_event::<K>(&line),
				Err(err) => Some(Err(err)),
			})
		});
		Ok(Box::pin(ctx.guard(Box::pin(events))))
	}

	#[instrument(
		skip(self, ctx, data, opts),
		fields(resource = %self.path.plural(), namespace = %self.namespace(), patch_type = %patch_type)
	)]
	async fn patch(
		&self,
		ctx: &Context,
		name: &str,
		patch_type: PatchType,
		data: &[u8],
		opts: &PatchOptions,
		subresources: &[&str],
	) -> ClientResult<K> {
		let path = self.item_path(name, subresources)?;
		let req = request::build(
			Method::PATCH,
			&path,
			&self.codec.encode_patch(patch_type, opts),
			Some(patch_type.content_type()),
			data.to_vec(),
		)?;
		self.send(ctx, req).await
	}
}

impl<K, L> Clone for ClientWithList<K, L> {
	fn clone(&self) -> Self {
		Self {
			path: self.path.clone(),
			rest: self.rest.clone(),
			codec: self.codec.clone(),
			scope: self.scope.clone(),
			_types: PhantomData,
		}
	}
}

impl<K, L> Debug for ClientWithList<K, L> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClientWithList")
			.field("path", &self.path)
			.field("scope", &self.scope)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Status;
	use crate::transport::{LineStream, Transport};
	use http::header::CONTENT_TYPE;
	use k8s_openapi::api::core::v1::ConfigMap;
	use std::sync::Mutex;

	#[derive(Clone, Debug, PartialEq)]
	struct Sent {
		method: Method,
		uri: String,
		content_type: Option<String>,
		body: Vec<u8>,
	}

	/// Records requests and replies with a canned body or status.
	#[derive(Default)]
	struct Recorder {
		sent: Mutex<Vec<Sent>>,
		reply: Mutex<Option<Result<String, Status>>>,
		lines: Mutex<Vec<String>>,
	}

	impl Recorder {
		fn replying(body: &str) -> Arc<Self> {
			let recorder = Self::default();
			*recorder.reply.lock().unwrap() = Some(Ok(body.to_string()));
			Arc::new(recorder)
		}

		fn failing(status: Status) -> Arc<Self> {
			let recorder = Self::default();
			*recorder.reply.lock().unwrap() = Some(Err(status));
			Arc::new(recorder)
		}

		fn last(&self) -> Sent {
			self.sent.lock().unwrap().last().cloned().unwrap()
		}

		fn record(&self, request: http::Request<Vec<u8>>) {
			self.sent.lock().unwrap().push(Sent {
				method: request.method().clone(),
				uri: request.uri().to_string(),
				content_type: request
					.headers()
					.get(CONTENT_TYPE)
					.map(|v| v.to_str().unwrap().to_string()),
				body: request.into_body(),
			});
		}
	}

	#[async_trait]
	impl Transport for Recorder {
		async fn execute(&self, request: http::Request<Vec<u8>>) -> ClientResult<String> {
			self.record(request);
			match self.reply.lock().unwrap().clone() {
				Some(Ok(body)) => Ok(body),
				Some(Err(status)) => Err(status.into()),
				None => Ok("{}".to_string()),
			}
		}

		async fn stream(&self, request: http::Request<Vec<u8>>) -> ClientResult<LineStream> {
			self.record(request);
			let lines: Vec<ClientResult<String>> = self.lines.lock().unwrap().drain(..).map(Ok).collect();
			Ok(Box::pin(futures::stream::iter(lines)))
		}
	}

	#[derive(serde::Deserialize)]
	struct ConfigMapList {
		items: Vec<ConfigMap>,
	}

	const CONFIG_MAP: &str = r#"{"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"a","namespace":"ns1","resourceVersion":"5"}}"#;

	fn client(transport: Arc<Recorder>, namespace: &str) -> ClientWithList<ConfigMap, ConfigMapList> {
		let codec = ParameterCodec::new(&crate::config::ClientConfig {
			field_manager: Some("tests".to_string()),
			allow_watch_bookmarks: false,
			..Default::default()
		});
		ClientWithList::new("configmaps", RestClient::new(transport), Arc::new(codec), namespace)
	}

	fn config_map(name: &str) -> ConfigMap {
		let mut cm = ConfigMap::default();
		cm.metadata.name = Some(name.to_string());
		cm
	}

	#[tokio::test]
	async fn create_posts_to_collection() {
		let transport = Recorder::replying(CONFIG_MAP);
		let created = client(transport.clone(), "ns1")
			.create(&Context::background(), &config_map("a"), &CreateOptions::default())
			.await
			.unwrap();
		assert_eq!(created.metadata.resource_version.as_deref(), Some("5"));

		let sent = transport.last();
		assert_eq!(sent.method, Method::POST);
		assert_eq!(sent.uri, "/api/v1/namespaces/ns1/configmaps?fieldManager=tests");
		assert_eq!(sent.content_type.as_deref(), Some(JSON));
		let body: serde_json::Value = serde_json::from_slice(&sent.body).unwrap();
		assert_eq!(body["metadata"]["name"], "a");
	}

	#[tokio::test]
	async fn update_puts_to_item() {
		let transport = Recorder::replying(CONFIG_MAP);
		client(transport.clone(), "ns1")
			.update(&Context::background(), &config_map("a"), &UpdateOptions::default())
			.await
			.unwrap();
		let sent = transport.last();
		assert_eq!(sent.method, Method::PUT);
		assert_eq!(sent.uri, "/api/v1/namespaces/ns1/configmaps/a?fieldManager=tests");
	}

	#[tokio::test]
	async fn update_requires_a_name() {
		let transport = Recorder::replying(CONFIG_MAP);
		let err = client(transport.clone(), "ns1")
			.update(&Context::background(), &ConfigMap::default(), &UpdateOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(err, ClientError::Request { .. }));
		assert!(transport.sent.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn mutations_need_a_namespace() {
		let transport = Recorder::replying(CONFIG_MAP);
		let all = client(transport.clone(), "");
		let ctx = Context::background();

		let err = all
			.create(&ctx, &config_map("a"), &CreateOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(err, ClientError::Request { .. }));
		let err = all.delete(&ctx, "a", &DeleteOptions::default()).await.unwrap_err();
		assert!(matches!(err, ClientError::Request { .. }));
		assert!(transport.sent.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn list_across_all_namespaces() {
		let transport = Recorder::replying(r#"{"items":[]}"#);
		let list = client(transport.clone(), "")
			.list(&Context::background(), &ListOptions::default().labels("app=web"))
			.await
			.unwrap();
		assert!(list.items.is_empty());
		assert_eq!(transport.last().uri, "/api/v1/configmaps?labelSelector=app%3Dweb");
	}

	#[tokio::test]
	async fn delete_sends_options_body() {
		let transport = Recorder::replying(r#"{"kind":"Status","status":"Success"}"#);
		let opts = DeleteOptions {
			grace_period_seconds: Some(0),
			..Default::default()
		};
		client(transport.clone(), "ns1")
			.delete(&Context::background(), "a", &opts)
			.await
			.unwrap();
		let sent = transport.last();
		assert_eq!(sent.method, Method::DELETE);
		assert_eq!(sent.uri, "/api/v1/namespaces/ns1/configmaps/a");
		assert_eq!(sent.body, br#"{"gracePeriodSeconds":0}"#);
	}

	#[tokio::test]
	async fn delete_collection_targets_collection_with_selector() {
		let transport = Recorder::replying(r#"{"items":[]}"#);
		client(transport.clone(), "ns1")
			.delete_collection(
				&Context::background(),
				&DeleteOptions::default(),
				&ListOptions::default().labels("app=web"),
			)
			.await
			.unwrap();
		let sent = transport.last();
		assert_eq!(sent.method, Method::DELETE);
		assert_eq!(sent.uri, "/api/v1/namespaces/ns1/configmaps?labelSelector=app%3Dweb");
	}

	#[tokio::test]
	async fn patch_sets_content_type_and_subresource() {
		let transport = Recorder::replying(CONFIG_MAP);
		client(transport.clone(), "ns1")
			.patch(
				&Context::background(),
				"a",
				PatchType::Json,
				br#"[{"op":"add","path":"/data","value":{}}]"#,
				&PatchOptions::default(),
				&["status"],
			)
			.await
			.unwrap();
		let sent = transport.last();
		assert_eq!(sent.method, Method::PATCH);
		assert_eq!(sent.uri, "/api/v1/namespaces/ns1/configmaps/a/status?fieldManager=tests");
		assert_eq!(sent.content_type.as_deref(), Some("application/json-patch+json"));
		assert_eq!(sent.body, br#"[{"op":"add","path":"/data","value":{}}]"#);
	}

	#[tokio::test]
	async fn server_errors_are_surfaced_verbatim() {
		let status = Status::failure(404, "NotFound", "configmaps \"a\" not found");
		let transport = Recorder::failing(status.clone());
		let err = client(transport, "ns1")
			.get(&Context::background(), "a", &GetOptions::default())
			.await
			.unwrap_err();
		assert!(err.is_not_found());
		assert_eq!(err.status(), Some(&status));
	}

	#[tokio::test]
	async fn watch_decodes_lines_in_order() {
		let transport = Arc::new(Recorder::default());
		transport.lines.lock().unwrap().extend([
			format!(r#"{{"type":"ADDED","object":{CONFIG_MAP}}}"#),
			String::new(),
			format!(r#"{{"type":"MODIFIED","object":{CONFIG_MAP}}}"#),
		]);
		let mut stream = client(transport.clone(), "ns1")
			.watch(&Context::background(), &ListOptions::default().at_version("4"))
			.await
			.unwrap();

		assert!(matches!(stream.next().await, Some(Ok(crate::WatchEvent::Added(_)))));
		assert!(matches!(stream.next().await, Some(Ok(crate::WatchEvent::Modified(_)))));
		assert!(stream.next().await.is_none());
		assert_eq!(
			transport.last().uri,
			"/api/v1/namespaces/ns1/configmaps?watch=true&resourceVersion=4"
		);
	}
}
