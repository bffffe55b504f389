// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::labels::Selector;

/// Plural resource name used in API paths.
pub const SERVER_RESOURCE: &str = "servers";

/// Describes a port exposed by a set of pods and the protocol spoken on it.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
	group = "policy.linkerd.io",
	version = "v1beta1",
	kind = "Server",
	plural = "servers",
	namespaced,
	derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
	pub pod_selector: Selector,
	pub port: Port,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub proxy_protocol: Option<ProxyProtocol>,
}

impl ServerSpec {
	pub fn new(pod_selector: Selector, port: Port) -> Self {
		Self {
			pod_selector,
			port,
			proxy_protocol: None,
		}
	}

	pub fn with_proxy_protocol(mut self, protocol: ProxyProtocol) -> Self {
		self.proxy_protocol = Some(protocol);
		self
	}
}

impl Server {
	/// Whether this server applies to a pod carrying `labels`.
	pub fn selects(&self, labels: &BTreeMap<String, String>) -> bool {
		self.spec.pod_selector.matches(labels)
	}
}

/// References a pod spec's port by number or by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Port {
	Number(u16),
	Name(String),
}

impl fmt::Display for Port {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Port::Number(n) => write!(f, "{n}"),
			Port::Name(name) => f.write_str(name),
		}
	}
}

impl From<u16> for Port {
	fn from(port: u16) -> Self {
		Port::Number(port)
	}
}

/// Protocol hint for the proxy; `Unknown` means protocol detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ProxyProtocol {
	#[default]
	#[serde(rename = "unknown")]
	Unknown,
	#[serde(rename = "HTTP/1")]
	Http1,
	#[serde(rename = "HTTP/2")]
	Http2,
	#[serde(rename = "gRPC")]
	Grpc,
	#[serde(rename = "opaque")]
	Opaque,
	#[serde(rename = "TLS")]
	Tls,
}

/// A page of `Server` objects as returned by a list call.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ServerList {
	#[serde(default)]
	pub metadata: ListMeta,
	#[serde(default)]
	pub items: Vec<Server>,
}

impl ServerList {
	/// Resource version the list was served at; the starting point for a watch.
	pub fn resource_version(&self) -> Option<&str> {
		self.metadata.resource_version.as_deref()
	}

	/// Token for the next page, when the list was truncated by a limit.
	pub fn continue_token(&self) -> Option<&str> {
		self
			.metadata
			.continue_
			.as_deref()
			.filter(|token| !token.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use kube::Resource;
	use serde_json::json;

	fn web_server() -> Server {
		let mut server = Server::new(
			"web",
			ServerSpec::new(Selector::from_labels([("app", "web")]), Port::Number(8080)),
		);
		server.metadata.namespace = Some("ns1".to_string());
		server
	}

	#[test]
	fn resource_metadata() {
		assert_eq!(Server::group(&()), "policy.linkerd.io");
		assert_eq!(Server::version(&()), "v1beta1");
		assert_eq!(Server::kind(&()), "Server");
		assert_eq!(Server::plural(&()), SERVER_RESOURCE);
		assert_eq!(Server::api_version(&()), "policy.linkerd.io/v1beta1");
	}

	#[test]
	fn serializes_camel_case_spec() {
		let value = serde_json::to_value(web_server()).unwrap();
		assert_eq!(value["apiVersion"], "policy.linkerd.io/v1beta1");
		assert_eq!(value["kind"], "Server");
		assert_eq!(value["metadata"]["name"], "web");
		assert_eq!(value["spec"]["port"], 8080);
		assert_eq!(value["spec"]["podSelector"]["matchLabels"]["app"], "web");
		assert!(value["spec"].get("proxyProtocol").is_none());
	}

	#[test]
	fn port_is_untagged() {
		let number: Port = serde_json::from_value(json!(4191)).unwrap();
		let name: Port = serde_json::from_value(json!("admin-http")).unwrap();
		assert_eq!(number, Port::Number(4191));
		assert_eq!(name, Port::Name("admin-http".to_string()));
		assert_eq!(name.to_string(), "admin-http");
	}

	#[test]
	fn proxy_protocol_wire_names() {
		let cases = [
			(ProxyProtocol::Unknown, "unknown"),
			(ProxyProtocol::Http1, "HTTP/1"),
			(ProxyProtocol::Http2, "HTTP/2"),
			(ProxyProtocol::Grpc, "gRPC"),
			(ProxyProtocol::Opaque, "opaque"),
			(ProxyProtocol::Tls, "TLS"),
		];
		for (protocol, wire) in cases {
			assert_eq!(serde_json::to_value(protocol).unwrap(), json!(wire));
			let parsed: ProxyProtocol = serde_json::from_value(json!(wire)).unwrap();
			assert_eq!(parsed, protocol);
		}
	}

	#[test]
	fn list_exposes_pagination_metadata() {
		let list: ServerList = serde_json::from_value(json!({
			"apiVersion": "policy.linkerd.io/v1beta1",
			"kind": "ServerList",
			"metadata": { "resourceVersion": "42", "continue": "" },
			"items": [serde_json::to_value(web_server()).unwrap()],
		}))
		.unwrap();

		assert_eq!(list.resource_version(), Some("42"));
		assert_eq!(list.continue_token(), None);
		assert_eq!(list.items, vec![web_server()]);
	}

	#[test]
	fn selects_pods_by_label() {
		let server = web_server();
		let mut labels = BTreeMap::new();
		labels.insert("app".to_string(), "web".to_string());
		assert!(server.selects(&labels));

		labels.insert("app".to_string(), "db".to_string());
		assert!(!server.selects(&labels));
	}
}
