// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tests for the `Server` accessor over a real `kube::Client` whose
//! connection is a scripted tower service.
//!
//! These cover the production transport: what the API server sends on the
//! wire must reach callers with the same classification the in-memory server
//! gives.

use std::io;

use futures::StreamExt;
use http::header::CONTENT_TYPE;
use http::{Method, Request, Response};
use kube::client::Body;
use mesh_k8s_client::{ClientConfig, ClientError, Context, DeleteOptions, ListOptions, ResourceInterface, WatchEvent};
use mesh_policy_api::{Port, Selector, Server, ServerSpec};
use mesh_policy_client::{ServerV1beta1Client, ServersGetter};
use serde_json::json;

const SERVERS: &str = "/apis/policy.linkerd.io/v1beta1/namespaces/ns1/servers";

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_env_filter("mesh_k8s_client=debug,mesh_policy_client=debug")
		.try_init();
}

/// A client whose every request is answered by `respond`.
fn client<F>(respond: F) -> ServerV1beta1Client
where
	F: Fn(Request<Body>) -> Response<Body> + Send + 'static,
{
	init_tracing();
	let service = tower::service_fn(move |request| futures::future::ready(Ok::<_, io::Error>(respond(request))));
	let config = ClientConfig {
		allow_watch_bookmarks: false,
		..ClientConfig::default()
	};
	ServerV1beta1Client::new(kube::Client::new(service, "default"), &config)
}

fn reply(code: u16, body: String) -> Response<Body> {
	Response::builder()
		.status(code)
		.header(CONTENT_TYPE, "application/json")
		.body(Body::from(body.into_bytes()))
		.unwrap()
}

fn server(name: &str, port: u16) -> Server {
	let mut server = Server::new(
		name,
		ServerSpec::new(Selector::from_labels([("app", name)]), Port::Number(port)),
	);
	server.metadata.namespace = Some("ns1".to_string());
	server.metadata.resource_version = Some("7".to_string());
	server
}

fn ctx() -> Context {
	Context::background()
}

/// A partially failed delete-collection reaches callers as one aggregate.
/// **Why Important**: The per-item causes only exist in the status body; a
/// transport that drops them leaves callers unable to tell which servers
/// survived.
#[tokio::test]
async fn test_delete_collection_failures_are_aggregated() {
	let client = client(|request| {
		assert_eq!(request.method(), Method::DELETE);
		assert_eq!(request.uri().path(), SERVERS);
		let status = json!({
			"kind": "Status",
			"apiVersion": "v1",
			"status": "Failure",
			"message": "2 servers could not be deleted",
			"reason": "Conflict",
			"code": 409,
			"details": {
				"kind": "servers",
				"causes": [
					{ "type": "Conflict", "message": "precondition failed", "field": "b" },
					{ "type": "Conflict", "message": "precondition failed", "field": "c" },
				],
			},
		});
		reply(409, status.to_string())
	});

	let err = client
		.servers("ns1")
		.delete_collection(&ctx(), &DeleteOptions::default(), &ListOptions::default())
		.await
		.unwrap_err();

	match err {
		ClientError::DeleteCollection { failures } => {
			let names: Vec<_> = failures.iter().map(|f| f.name.as_str()).collect();
			assert_eq!(names, ["b", "c"]);
			assert!(failures.iter().all(|f| f.reason == "Conflict"));
		}
		other => panic!("expected an aggregate failure, got {other:?}"),
	}
}

/// A missing object answered by the cluster is classified as not found.
/// **Why Important**: Controllers branch on `is_not_found` to decide whether
/// to create; a generic API error would make them retry forever.
#[tokio::test]
async fn test_not_found_from_cluster_is_classified() {
	let client = client(|_| {
		let status = json!({
			"kind": "Status",
			"status": "Failure",
			"message": "servers.policy.linkerd.io \"web\" not found",
			"reason": "NotFound",
			"details": { "name": "web", "kind": "servers" },
			"code": 404,
		});
		reply(404, status.to_string())
	});

	let err = client
		.servers("ns1")
		.get(&ctx(), "web", &Default::default())
		.await
		.unwrap_err();
	assert!(err.is_not_found(), "got {err:?}");
	assert_eq!(err.status().and_then(|s| s.details.as_ref()).and_then(|d| d.name.as_deref()), Some("web"));
}

/// Watch events arrive in order and keep-alive blank lines are skipped.
/// **Why Important**: Long-lived watches through proxies see blank lines; they
/// must not surface as decode errors.
#[tokio::test]
async fn test_watch_over_cluster_skips_blank_lines() {
	let first = server("a", 8080);
	let second = server("b", 9090);
	let body = format!(
		"{}\n\n{}\n",
		json!({ "type": "ADDED", "object": first }),
		json!({ "type": "DELETED", "object": second }),
	);
	let client = client(move |request| {
		assert_eq!(request.uri().path(), SERVERS);
		assert!(request.uri().query().unwrap_or_default().contains("watch=true"));
		reply(200, body.clone())
	});

	let events: Vec<_> = client
		.servers("ns1")
		.watch(&ctx(), &ListOptions::default().at_version("0"))
		.await
		.unwrap()
		.map(|event| event.unwrap())
		.collect()
		.await;

	assert_eq!(events.len(), 2);
	match (&events[0], &events[1]) {
		(WatchEvent::Added(a), WatchEvent::Deleted(b)) => {
			assert_eq!(a, &first);
			assert_eq!(b, &second);
		}
		other => panic!("unexpected events {other:?}"),
	}
}
