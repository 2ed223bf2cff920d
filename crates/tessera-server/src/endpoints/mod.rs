// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in services exposed next to the document services.

pub mod authorisations;
pub mod tags;

pub use authorisations::AuthorisationsEndpoint;
pub use tags::TagsEndpoint;

use std::sync::{Arc, Weak};

use serde_json::Value;
use tessera_server_auth::{
	AuthError, Document, DocumentId, Method, Params, Query, ResourceService, Result, Translation,
};
use tracing::debug;

use crate::registry::ServiceRegistry;

/// Field name clients use to designate the service of the target resource.
pub const RESOURCES_SERVICE_FIELD: &str = "resourcesService";
pub const RESOURCE_FIELD: &str = "resource";

/// Reads `field` from the call data, falling back to the query.
fn field<'a>(data: Option<&'a Document>, query: &'a Query, name: &str) -> Option<&'a Value> {
	data.and_then(|data| data.get(name))
		.or_else(|| query.get(name))
		.filter(|value| !value.is_null())
}

fn str_field<'a>(data: Option<&'a Document>, query: &'a Query, name: &str) -> Option<&'a str> {
	field(data, query, name)
		.and_then(Value::as_str)
		.filter(|value| !value.is_empty())
}

fn require_str<'a>(data: Option<&'a Document>, query: &'a Query, name: &str) -> Result<&'a str> {
	str_field(data, query, name).ok_or_else(|| AuthError::missing_field(name))
}

pub(crate) fn method_not_allowed(method: Method, path: &str) -> AuthError {
	AuthError::bad_request(
		Translation::new("server.auth.bad_request.method_not_allowed")
			.with("method", method)
			.with("path", path),
	)
}

fn registry(registry: &Weak<ServiceRegistry>) -> Result<Arc<ServiceRegistry>> {
	registry
		.upgrade()
		.ok_or_else(|| AuthError::Store("service registry is no longer available".to_string()))
}

/// Loads the resource a call targets, skipping authorisation.
///
/// A missing resource is not an error; `None` is returned instead.
async fn populate_resource(
	resources: &dyn ResourceService,
	id: &DocumentId,
	params: &Params,
) -> Result<Option<Document>> {
	let lookup = params.nested().with_check_authorisation(false);
	match resources.get(id, &lookup).await {
		Ok(resource) => Ok(Some(resource)),
		Err(e) if e.is_not_found() => {
			debug!(path = %resources.path(), id = %id, "target resource not found");
			Ok(None)
		}
		Err(e) => Err(e),
	}
}
