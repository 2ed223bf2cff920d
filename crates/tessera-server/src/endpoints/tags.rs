// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The contextual `tags` service.
//!
//! Creating a tag registers it (or bumps its count) and, when the data names
//! a `resource` and its `resourcesService`, adds the tag to that resource.
//! Removing takes the *resource* id with `value`, `scope` and
//! `resourcesService` in the query: the tag count is decremented and the tag
//! dropped from the resource.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tessera_server_auth::tags::{
	add_tag_if_new, remove_tag_if_unused, tag_resource, untag_resource,
};
use tessera_server_auth::{
	Action, AuthError, Document, DocumentId, Method, Page, Params, ResourceService, Result, Tag,
	Translation,
};
use tracing::{debug, instrument};

use super::{
	method_not_allowed, populate_resource, registry, str_field, RESOURCES_SERVICE_FIELD,
	RESOURCE_FIELD,
};
use crate::registry::ServiceRegistry;

pub struct TagsEndpoint {
	store: Arc<dyn ResourceService>,
	registry: Weak<ServiceRegistry>,
}

impl TagsEndpoint {
	/// Serves the tags kept in `store`, under the store's name and context.
	pub fn new(store: Arc<dyn ResourceService>, registry: Weak<ServiceRegistry>) -> Self {
		Self { store, registry }
	}

	/// Target resource named by the call, with the service holding it.
	async fn target(
		&self,
		id: Option<DocumentId>,
		service: Option<&str>,
		params: &Params,
	) -> Result<Option<(Arc<dyn ResourceService>, Document)>> {
		let (Some(id), Some(service)) = (id, service) else {
			return Ok(None);
		};
		let resources = registry(&self.registry)?.require(service)?;
		let resource = populate_resource(resources.as_ref(), &id, params).await?;
		Ok(resource.map(|resource| (resources, resource)))
	}

	/// Checks a delegated removal against the caller's abilities on the tag.
	fn check_removal(&self, tag: &Tag, params: &Params) -> Result<()> {
		if params.authorised {
			return Ok(());
		}
		let Some(abilities) = params.abilities.as_ref() else {
			return Ok(());
		};
		if abilities.can(Action::Remove, self.name(), self.context(), Some(&tag.to_document()?)) {
			return Ok(());
		}
		debug!(value = %tag.value, scope = %tag.scope, "tag removal denied");
		Err(AuthError::forbidden(
			Translation::new("server.auth.forbidden.operation")
				.with("method", Method::Remove)
				.with("path", self.name()),
		))
	}
}

#[async_trait]
impl ResourceService for TagsEndpoint {
	fn name(&self) -> &str {
		self.store.name()
	}

	fn context(&self) -> Option<&DocumentId> {
		self.store.context()
	}

	/// Removal ids are resource ids, so tags are never fetched by the
	/// enforcer.
	fn supports_get(&self) -> bool {
		false
	}

	async fn find(&self, params: &Params) -> Result<Page> {
		self.store.find(params).await
	}

	async fn get(&self, id: &DocumentId, params: &Params) -> Result<Document> {
		if params.is_external() {
			return Err(method_not_allowed(Method::Get, self.name()));
		}
		self.store.get(id, params).await
	}

	#[instrument(skip(self, data, params), fields(path = %self.path()))]
	async fn create(&self, mut data: Document, params: &Params) -> Result<Document> {
		let resource_id = data
			.remove(RESOURCE_FIELD)
			.as_ref()
			.and_then(DocumentId::from_value);
		let service = data
			.remove(RESOURCES_SERVICE_FIELD)
			.and_then(|value| value.as_str().map(str::to_string));
		let target = self.target(resource_id, service.as_deref(), params).await?;

		let tag = add_tag_if_new(self.store.as_ref(), data).await?;
		if let Some((resources, resource)) = target {
			tag_resource(resources.as_ref(), &resource, tag.clone(), self.context(), params).await?;
		}
		tag.to_document()
	}

	async fn update(&self, _id: &DocumentId, _data: Document, _params: &Params) -> Result<Document> {
		Err(method_not_allowed(Method::Update, self.name()))
	}

	async fn patch(&self, id: &DocumentId, data: Document, params: &Params) -> Result<Document> {
		if params.is_external() {
			return Err(method_not_allowed(Method::Patch, self.name()));
		}
		self.store.patch(id, data, params).await
	}

	#[instrument(skip(self, id, params), fields(path = %self.path(), resource = %id))]
	async fn remove(&self, id: &DocumentId, params: &Params) -> Result<Document> {
		let query = &params.query;
		let (Some(value), Some(scope)) = (str_field(None, query, "value"), str_field(None, query, "scope"))
		else {
			// Plain removal of a stored tag by its own id.
			if !params.authorised && params.abilities.is_some() {
				return Err(AuthError::bad_request(Translation::new(
					"server.tags.missing_value_or_scope",
				)));
			}
			return self.store.remove(id, params).await;
		};

		let mut lookup = Tag::new(value, scope);
		lookup.context = self.context().cloned();
		self.check_removal(&lookup, params)?;

		let target = self
			.target(Some(id.clone()), str_field(None, query, RESOURCES_SERVICE_FIELD), params)
			.await?;
		let removed = remove_tag_if_unused(self.store.as_ref(), value, scope).await?;
		let tag = removed.unwrap_or(lookup);
		if let Some((resources, resource)) = target {
			untag_resource(resources.as_ref(), &resource, &tag, params).await?;
		}
		tag.to_document()
	}
}

impl std::fmt::Debug for TagsEndpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TagsEndpoint")
			.field("path", &self.path())
			.finish()
	}
}
