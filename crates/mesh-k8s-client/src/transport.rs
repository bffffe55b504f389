// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{AsyncBufReadExt, Stream, StreamExt, TryStreamExt};
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use tracing::debug;

use crate::context::Context;
use crate::error::{ClientError, ClientResult, Status};

/// A stream of newline-delimited response lines, as sent for watches.
pub type LineStream = Pin<Box<dyn Stream<Item = ClientResult<String>> + Send>>;

/// Sends prepared HTTP requests to an API server.
///
/// Implementations classify server failures into [`ClientError`] variants and
/// must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Send a request and return the response body of a successful call.
	async fn execute(&self, request: Request<Vec<u8>>) -> ClientResult<String>;

	/// Send a request whose response is streamed line by line.
	async fn stream(&self, request: Request<Vec<u8>>) -> ClientResult<LineStream>;
}

/// Production transport backed by the kube crate's client.
pub struct KubeTransport {
	client: Client,
}

impl KubeTransport {
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// Create a transport that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn try_default() -> ClientResult<Self> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}

	/// Sends `request` without kube's error mapping, so failed calls keep the
	/// server's full status, details and causes included.
	async fn send(&self, request: Request<Vec<u8>>) -> ClientResult<Response<Body>> {
		let response = self.client.send(request.map(Body::from)).await?;
		let code = response.status();
		if code.is_client_error() || code.is_server_error() {
			let body = read_body(response.into_body()).await?;
			debug!(code = code.as_u16(), "API server rejected request");
			return Err(api_failure(code, &body));
		}
		Ok(response)
	}
}

#[async_trait]
impl Transport for KubeTransport {
	async fn execute(&self, request: Request<Vec<u8>>) -> ClientResult<String> {
		let response = self.send(request).await?;
		let body = read_body(response.into_body()).await?;
		String::from_utf8(body).map_err(|e| ClientError::Transport {
			message: format!("response body is not UTF-8: {e}"),
		})
	}

	async fn stream(&self, request: Request<Vec<u8>>) -> ClientResult<LineStream> {
		let response = self.send(request).await?;
		let data = response
			.into_body()
			.into_data_stream()
			.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
		let lines = Box::pin(data).into_async_read().lines().map(|line| {
			line.map_err(|e| ClientError::Transport {
				message: e.to_string(),
			})
		});
		Ok(Box::pin(lines))
	}
}

async fn read_body(body: Body) -> ClientResult<Vec<u8>> {
	let collected = body.collect().await.map_err(|e| ClientError::Transport {
		message: e.to_string(),
	})?;
	Ok(collected.to_bytes().to_vec())
}

/// Classifies an error response. Bodies that are not a status object, such
/// as a proxy's plain-text page, keep the HTTP code and become the message.
fn api_failure(code: StatusCode, body: &[u8]) -> ClientError {
	let status = match serde_json::from_slice::<Status>(body) {
		Ok(mut status) if !status.reason.is_empty() || !status.message.is_empty() => {
			if status.code == 0 {
				status.code = code.as_u16();
			}
			status
		}
		_ => Status::failure(
			code.as_u16(),
			code.canonical_reason().unwrap_or("Unknown").replace(' ', ""),
			String::from_utf8_lossy(body).trim(),
		),
	};
	status.into()
}

/// Shared handle to a transport plus the client-wide request timeout.
#[derive(Clone)]
pub struct RestClient {
	transport: Arc<dyn Transport>,
	timeout: Option<Duration>,
}

impl RestClient {
	pub fn new(transport: Arc<dyn Transport>) -> Self {
		Self {
			transport,
			timeout: None,
		}
	}

	/// Bound unary calls whose context carries no deadline of its own.
	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	pub(crate) async fn execute(&self, ctx: &Context, request: Request<Vec<u8>>) -> ClientResult<String> {
		ctx.run(self.timeout, self.transport.execute(request)).await
	}

	/// Open a stream; the timeout covers only establishing it.
	pub(crate) async fn stream(&self, ctx: &Context, request: Request<Vec<u8>>) -> ClientResult<LineStream> {
		ctx.run(self.timeout, self.transport.stream(request)).await
	}
}

impl std::fmt::Debug for RestClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RestClient")
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io;

	use http::header::CONTENT_TYPE;
	use serde_json::{json, Value};

	/// A transport over a kube client whose connection is `respond`.
	fn mock<F>(respond: F) -> KubeTransport
	where
		F: Fn(Request<Body>) -> Result<Response<Body>, io::Error> + Send + 'static,
	{
		let service = tower::service_fn(move |request| futures::future::ready(respond(request)));
		KubeTransport::new(Client::new(service, "default"))
	}

	fn reply(code: u16, content_type: &str, body: &str) -> Result<Response<Body>, io::Error> {
		Ok(Response::builder()
			.status(code)
			.header(CONTENT_TYPE, content_type)
			.body(Body::from(body.as_bytes().to_vec()))
			.unwrap())
	}

	fn status(code: u16, reason: &str, causes: Value) -> String {
		json!({
			"kind": "Status",
			"apiVersion": "v1",
			"status": "Failure",
			"message": format!("{reason} from the API server"),
			"reason": reason,
			"code": code,
			"details": { "kind": "servers", "causes": causes },
		})
		.to_string()
	}

	fn get(path: &str) -> Request<Vec<u8>> {
		Request::get(path).body(Vec::new()).unwrap()
	}

	#[tokio::test]
	async fn successful_body_is_returned() {
		let transport = mock(|request| {
			assert_eq!(request.uri().path(), "/api/v1/namespaces/ns1/configmaps/a");
			reply(200, "application/json", r#"{"kind":"ConfigMap"}"#)
		});
		let body = transport.execute(get("/api/v1/namespaces/ns1/configmaps/a")).await.unwrap();
		assert_eq!(body, r#"{"kind":"ConfigMap"}"#);
	}

	#[tokio::test]
	async fn error_status_keeps_details() {
		let transport = mock(|_| {
			reply(
				422,
				"application/json",
				&status(
					422,
					"Invalid",
					json!([{ "type": "FieldValueInvalid", "message": "must be positive", "field": "spec.port" }]),
				),
			)
		});
		let err = transport.execute(get("/apis/g/v1/things")).await.unwrap_err();
		assert!(matches!(err, ClientError::Invalid(_)), "got {err:?}");

		let status = err.status().unwrap();
		assert_eq!(status.code, 422);
		let details = status.details.as_ref().unwrap();
		assert_eq!(details.kind.as_deref(), Some("servers"));
		assert_eq!(details.causes[0].field.as_deref(), Some("spec.port"));
		assert_eq!(details.causes[0].reason.as_deref(), Some("FieldValueInvalid"));
	}

	#[tokio::test]
	async fn delete_collection_causes_survive_the_transport() {
		let transport = mock(|_| {
			reply(
				409,
				"application/json",
				&status(
					409,
					"Conflict",
					json!([
						{ "type": "Conflict", "message": "precondition failed", "field": "b" },
						{ "type": "Conflict", "message": "precondition failed", "field": "c" },
					]),
				),
			)
		});
		let request = Request::delete("/apis/g/v1/namespaces/ns1/things").body(b"{}".to_vec()).unwrap();
		let err = transport.execute(request).await.unwrap_err().into_delete_collection();

		match err {
			ClientError::DeleteCollection { failures } => {
				let names: Vec<_> = failures.iter().map(|f| f.name.as_str()).collect();
				assert_eq!(names, ["b", "c"]);
			}
			other => panic!("expected an aggregate failure, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn non_status_error_body_keeps_http_code() {
		let transport = mock(|_| reply(503, "text/plain", "upstream connect error\n"));
		let err = transport.execute(get("/apis/g/v1/things")).await.unwrap_err();

		let status = err.status().unwrap();
		assert!(matches!(err, ClientError::Api(_)), "got {err:?}");
		assert_eq!(status.code, 503);
		assert_eq!(status.reason, "ServiceUnavailable");
		assert_eq!(status.message, "upstream connect error");
	}

	#[tokio::test]
	async fn watch_body_is_split_into_lines() {
		let transport = mock(|request| {
			assert_eq!(request.uri().query(), Some("watch=true"));
			reply(200, "application/json", "{\"type\":\"ADDED\"}\n\n{\"type\":\"DELETED\"}\n")
		});
		let lines: Vec<String> = transport
			.stream(get("/apis/g/v1/things?watch=true"))
			.await
			.unwrap()
			.map(|line| line.unwrap())
			.collect()
			.await;
		assert_eq!(lines, [r#"{"type":"ADDED"}"#, "", r#"{"type":"DELETED"}"#]);
	}

	#[tokio::test]
	async fn watch_rejected_at_establishment_is_classified() {
		let transport = mock(|_| {
			reply(
				410,
				"application/json",
				&status(410, "Expired", json!([])),
			)
		});
		let err = transport
			.stream(get("/apis/g/v1/things?watch=true&resourceVersion=1"))
			.await
			.err()
			.unwrap();
		assert!(err.is_gone(), "got {err:?}");
	}

	#[tokio::test]
	async fn connection_failure_is_a_transport_error() {
		let transport = mock(|_| Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")));
		let err = transport.execute(get("/apis/g/v1/things")).await.unwrap_err();
		assert!(matches!(err, ClientError::Transport { .. }), "got {err:?}");
		assert!(err.status().is_none());
	}
}
