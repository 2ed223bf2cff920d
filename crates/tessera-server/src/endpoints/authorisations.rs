// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The `authorisations` service.
//!
//! `create` grants a role and `remove` revokes it. Both name their targets
//! by id:
//!
//! | Field              | `create` (data or query) | `remove` (query)  |
//! |--------------------|--------------------------|-------------------|
//! | `scope`            | required                 | required          |
//! | `permissions`      | required                 | -                 |
//! | `subjects`         | required                 | required          |
//! | `subjectsService`  | required                 | required          |
//! | `resource`         | required                 | the call id       |
//! | `resourcesService` | required                 | required          |
//!
//! The service cannot fetch authorisations by id, so removals check the
//! caller's abilities here rather than in the access enforcer.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::{json, Value};
use tessera_server_auth::authorisation::ids_from_value;
use tessera_server_auth::{
	parse_permissions, Action, AuthError, AuthorisationRequest, AuthorisationService, Document,
	DocumentId, Method, Page, Params, ResourceService, Result, RevocationRequest, Role, Subject,
	Translation, ID_FIELD,
};
use tracing::{debug, instrument};

use super::{field, method_not_allowed, registry, require_str, RESOURCES_SERVICE_FIELD, RESOURCE_FIELD};
use crate::registry::ServiceRegistry;

pub const AUTHORISATIONS_SERVICE: &str = "authorisations";
pub const SUBJECTS_FIELD: &str = "subjects";
pub const SUBJECTS_SERVICE_FIELD: &str = "subjectsService";

pub struct AuthorisationsEndpoint {
	registry: Weak<ServiceRegistry>,
	authorisations: Arc<AuthorisationService>,
}

impl AuthorisationsEndpoint {
	pub fn new(registry: Weak<ServiceRegistry>, authorisations: Arc<AuthorisationService>) -> Self {
		Self {
			registry,
			authorisations,
		}
	}

	fn subjects(&self, data: Option<&Document>, params: &Params) -> Result<Vec<DocumentId>> {
		let subjects = field(data, &params.query, SUBJECTS_FIELD)
			.map(ids_from_value)
			.unwrap_or_default();
		if subjects.is_empty() {
			return Err(AuthError::missing_field(SUBJECTS_FIELD));
		}
		Ok(subjects)
	}

	fn services(
		&self,
		data: Option<&Document>,
		params: &Params,
	) -> Result<(Arc<dyn ResourceService>, Arc<dyn ResourceService>)> {
		let registry = registry(&self.registry)?;
		let subjects_service =
			registry.require(require_str(data, &params.query, SUBJECTS_SERVICE_FIELD)?)?;
		let resources_service =
			registry.require(require_str(data, &params.query, RESOURCES_SERVICE_FIELD)?)?;
		Ok((subjects_service, resources_service))
	}

	/// Enforces removal rights when the enforcer delegated the decision.
	fn check_removal(&self, resource: &DocumentId, params: &Params) -> Result<()> {
		if params.authorised {
			return Ok(());
		}
		let Some(abilities) = params.abilities.as_ref() else {
			return Ok(());
		};

		let mut target = Document::new();
		target.insert(RESOURCE_FIELD.to_string(), resource.clone().into());
		if abilities.can(Action::Remove, self.name(), None, Some(&target)) {
			return Ok(());
		}
		debug!(resource = %resource, "authorisation removal denied");
		Err(AuthError::forbidden(
			Translation::new("server.auth.forbidden.operation")
				.with("method", Method::Remove)
				.with("path", self.name()),
		))
	}
}

fn summary(
	scope: &str,
	resource: &DocumentId,
	permissions: Option<Role>,
	subjects: Vec<Subject>,
) -> Document {
	let mut document = Document::new();
	document.insert(ID_FIELD.to_string(), resource.clone().into());
	document.insert("scope".to_string(), json!(scope));
	document.insert(RESOURCE_FIELD.to_string(), resource.clone().into());
	if let Some(permissions) = permissions {
		document.insert("permissions".to_string(), json!(permissions.name()));
	}
	document.insert(
		SUBJECTS_FIELD.to_string(),
		Value::Array(
			subjects
				.into_iter()
				.map(|subject| Value::Object(subject.into_document()))
				.collect(),
		),
	);
	document
}

#[async_trait]
impl ResourceService for AuthorisationsEndpoint {
	fn name(&self) -> &str {
		AUTHORISATIONS_SERVICE
	}

	fn supports_get(&self) -> bool {
		false
	}

	async fn find(&self, _params: &Params) -> Result<Page> {
		Err(method_not_allowed(Method::Find, self.name()))
	}

	async fn get(&self, _id: &DocumentId, _params: &Params) -> Result<Document> {
		Err(method_not_allowed(Method::Get, self.name()))
	}

	#[instrument(skip(self, data, params), fields(user_id = ?params.user.as_ref().and_then(Subject::id)))]
	async fn create(&self, data: Document, params: &Params) -> Result<Document> {
		let scope = require_str(Some(&data), &params.query, "scope")?;
		let permissions = parse_permissions(require_str(Some(&data), &params.query, "permissions")?)?;
		let resource = DocumentId::from(require_str(Some(&data), &params.query, RESOURCE_FIELD)?);
		let subjects = self.subjects(Some(&data), params)?;
		let (subjects_service, resources_service) = self.services(Some(&data), params)?;

		let request = AuthorisationRequest {
			scope: scope.to_string(),
			permissions,
			subjects,
			subjects_service,
			resource: resource.clone(),
			resources_service,
		};
		let updated = self.authorisations.create(&request, params).await?;
		Ok(summary(scope, &resource, Some(permissions), updated))
	}

	async fn update(&self, _id: &DocumentId, _data: Document, _params: &Params) -> Result<Document> {
		Err(method_not_allowed(Method::Update, self.name()))
	}

	async fn patch(&self, _id: &DocumentId, _data: Document, _params: &Params) -> Result<Document> {
		Err(method_not_allowed(Method::Patch, self.name()))
	}

	#[instrument(skip(self, id, params), fields(resource = %id, user_id = ?params.user.as_ref().and_then(Subject::id)))]
	async fn remove(&self, id: &DocumentId, params: &Params) -> Result<Document> {
		self.check_removal(id, params)?;

		let scope = require_str(None, &params.query, "scope")?;
		let subjects = self.subjects(None, params)?;
		let (subjects_service, resources_service) = self.services(None, params)?;

		let request = RevocationRequest {
			scope: scope.to_string(),
			subjects,
			subjects_service,
			resource: id.clone(),
			resources_service,
		};
		let updated = self.authorisations.remove(&request, params).await?;
		Ok(summary(scope, id, None, updated))
	}
}

impl std::fmt::Debug for AuthorisationsEndpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AuthorisationsEndpoint").finish_non_exhaustive()
	}
}
