// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Granting and revoking roles on resources.
//!
//! Roles live on the subjects themselves, as entries of a named scope list.
//! Every subject in a batch is written independently and concurrently; a
//! failed write does not undo the others but fails the batch as a whole with
//! [`AuthError::Batch`]. A subject's cached abilities are dropped right after
//! its write lands so the next check sees the new scopes.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::cache::AbilitiesCache;
use crate::error::{AuthError, Result, SubjectFailure, Translation};
use crate::escalation::{escalation_check_required, prevent_escalation, EscalationCheck};
use crate::service::{Method, Params, ResourceService};
use crate::types::{Document, DocumentId, ResourceRef, Role, ScopeEntry, Subject, ID_FIELD};

/// Parses a role name received from a client.
pub fn parse_permissions(permissions: &str) -> Result<Role> {
	permissions.parse().map_err(|_| {
		AuthError::bad_request(
			Translation::new("server.auth.bad_request.invalid_permissions")
				.with("permissions", permissions),
		)
	})
}

/// Role assignment applied to every subject of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
	pub scope: String,
	pub resource: ResourceRef,
	pub permissions: Role,
}

/// Grant request naming subjects and resource by id.
#[derive(Clone)]
pub struct AuthorisationRequest {
	pub scope: String,
	pub permissions: Role,
	pub subjects: Vec<DocumentId>,
	pub subjects_service: Arc<dyn ResourceService>,
	pub resource: DocumentId,
	pub resources_service: Arc<dyn ResourceService>,
}

/// Revocation request naming subjects and resource by id.
#[derive(Clone)]
pub struct RevocationRequest {
	pub scope: String,
	pub subjects: Vec<DocumentId>,
	pub subjects_service: Arc<dyn ResourceService>,
	pub resource: DocumentId,
	pub resources_service: Arc<dyn ResourceService>,
}

type Outcome = std::result::Result<Subject, SubjectFailure>;

pub struct AuthorisationService {
	cache: Arc<AbilitiesCache>,
}

impl AuthorisationService {
	pub fn new(cache: Arc<AbilitiesCache>) -> Self {
		Self { cache }
	}

	pub fn cache(&self) -> &Arc<AbilitiesCache> {
		&self.cache
	}

	// =========================================================================
	// Batch mutations over loaded subjects
	// =========================================================================

	/// Gives every subject `grant.permissions` on `grant.resource`.
	///
	/// Subjects already holding exactly that role are returned untouched.
	#[instrument(
        level = "debug",
        skip(self, subjects_service, subjects, params),
        fields(scope = %grant.scope, resource = %grant.resource.id, permissions = %grant.permissions, subjects = subjects.len())
    )]
	pub async fn grant(
		&self,
		subjects_service: &dyn ResourceService,
		grant: &Grant,
		subjects: Vec<Subject>,
		params: &Params,
	) -> Result<Vec<Subject>> {
		let total = subjects.len();
		let outcomes = join_all(
			subjects
				.into_iter()
				.map(|subject| self.grant_one(subjects_service, grant, subject, params)),
		)
		.await;
		let updated = collect_outcomes(total, outcomes)?;
		info!(
			scope = %grant.scope,
			resource = %grant.resource.id,
			permissions = %grant.permissions,
			subjects = updated.len(),
			"authorisation granted"
		);
		Ok(updated)
	}

	/// Removes every subject's entry for `resource_id` from `scope`.
	///
	/// Subjects without such an entry are returned untouched. Deleted subjects
	/// are updated in memory only so their record is not revived.
	#[instrument(
        level = "debug",
        skip(self, subjects_service, scope, resource_id, subjects, params),
        fields(scope = %scope, resource = %resource_id, subjects = subjects.len())
    )]
	pub async fn revoke(
		&self,
		subjects_service: &dyn ResourceService,
		scope: &str,
		resource_id: &DocumentId,
		subjects: Vec<Subject>,
		params: &Params,
	) -> Result<Vec<Subject>> {
		let total = subjects.len();
		let outcomes = join_all(
			subjects
				.into_iter()
				.map(|subject| self.revoke_one(subjects_service, scope, resource_id, subject, params)),
		)
		.await;
		let updated = collect_outcomes(total, outcomes)?;
		info!(
			scope,
			resource = %resource_id,
			subjects = updated.len(),
			"authorisation revoked"
		);
		Ok(updated)
	}

	async fn grant_one(
		&self,
		subjects_service: &dyn ResourceService,
		grant: &Grant,
		mut subject: Subject,
		params: &Params,
	) -> Outcome {
		let role = grant.permissions.to_string();
		let entry = match subject.scope_entry(&grant.scope, &grant.resource.id) {
			Some(entry) if entry.permissions == role => {
				debug!(subject_id = ?subject.id(), "subject already holds role, skipping write");
				return Ok(subject);
			}
			Some(entry) => ScopeEntry {
				permissions: role,
				..entry
			},
			None => ScopeEntry::new(&grant.resource, grant.permissions),
		};
		let list = subject
			.scope_with(&grant.scope, &entry)
			.map_err(|error| failure(&subject, error.into()))?;

		self.persist(subjects_service, &mut subject, &grant.scope, list, params)
			.await
			.map_err(|error| failure(&subject, error))?;
		Ok(subject)
	}

	async fn revoke_one(
		&self,
		subjects_service: &dyn ResourceService,
		scope: &str,
		resource_id: &DocumentId,
		mut subject: Subject,
		params: &Params,
	) -> Outcome {
		let Some(list) = subject.scope_without(scope, resource_id) else {
			debug!(subject_id = ?subject.id(), "no entry to revoke");
			return Ok(subject);
		};

		if subject.is_deleted() {
			subject.replace_scope(scope, list);
			self.cache.invalidate(Some(&subject));
			debug!(subject_id = ?subject.id(), "subject deleted, skipping write");
			return Ok(subject);
		}

		self.persist(subjects_service, &mut subject, scope, list, params)
			.await
			.map_err(|error| failure(&subject, error))?;
		Ok(subject)
	}

	/// Patches the subject's scope list, then drops its cached abilities.
	async fn persist(
		&self,
		subjects_service: &dyn ResourceService,
		subject: &mut Subject,
		scope: &str,
		list: Value,
		params: &Params,
	) -> Result<()> {
		let id = subject.id().ok_or_else(|| AuthError::missing_field(ID_FIELD))?;
		let mut data = Document::new();
		data.insert(scope.to_string(), list);

		let patched = subjects_service.patch(&id, data, &params.nested()).await?;
		*subject = Subject::from(patched);
		self.cache.invalidate(Some(subject));
		Ok(())
	}

	// =========================================================================
	// Requests by id
	// =========================================================================

	/// Loads subjects and resource, checks escalation, then grants.
	#[instrument(
        level = "debug",
        skip(self, request, params),
        fields(scope = %request.scope, resource = %request.resource, permissions = %request.permissions)
    )]
	pub async fn create(
		&self,
		request: &AuthorisationRequest,
		params: &Params,
	) -> Result<Vec<Subject>> {
		let (resource, subjects) = populate(
			request.resources_service.as_ref(),
			&request.resource,
			request.subjects_service.as_ref(),
			&request.subjects,
			params,
		)
		.await?;

		if escalation_check_required(params) {
			prevent_escalation(&EscalationCheck {
				method: Method::Create,
				scope: &request.scope,
				resource: &resource.id,
				acting: params.user.as_ref(),
				subjects: &subjects,
				permissions: Some(request.permissions),
			})?;
		}

		let grant = Grant {
			scope: request.scope.clone(),
			resource,
			permissions: request.permissions,
		};
		self.grant(request.subjects_service.as_ref(), &grant, subjects, params)
			.await
	}

	/// Loads subjects and resource, checks escalation, then revokes.
	#[instrument(
        level = "debug",
        skip(self, request, params),
        fields(scope = %request.scope, resource = %request.resource)
    )]
	pub async fn remove(
		&self,
		request: &RevocationRequest,
		params: &Params,
	) -> Result<Vec<Subject>> {
		let (resource, subjects) = populate(
			request.resources_service.as_ref(),
			&request.resource,
			request.subjects_service.as_ref(),
			&request.subjects,
			params,
		)
		.await?;

		if escalation_check_required(params) {
			prevent_escalation(&EscalationCheck {
				method: Method::Remove,
				scope: &request.scope,
				resource: &resource.id,
				acting: params.user.as_ref(),
				subjects: &subjects,
				permissions: None,
			})?;
		}

		self.revoke(
			request.subjects_service.as_ref(),
			&request.scope,
			&resource.id,
			subjects,
			params,
		)
		.await
	}
}

impl std::fmt::Debug for AuthorisationService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AuthorisationService")
			.field("cache", &self.cache)
			.finish()
	}
}

fn failure(subject: &Subject, error: AuthError) -> SubjectFailure {
	warn!(subject_id = ?subject.id(), error = %error, "subject update failed");
	SubjectFailure {
		subject_id: subject.id(),
		error,
	}
}

fn collect_outcomes(total: usize, outcomes: Vec<Outcome>) -> Result<Vec<Subject>> {
	let mut updated = Vec::with_capacity(outcomes.len());
	let mut failures = Vec::new();
	for outcome in outcomes {
		match outcome {
			Ok(subject) => updated.push(subject),
			Err(failure) => failures.push(failure),
		}
	}

	if failures.is_empty() {
		return Ok(updated);
	}
	Err(AuthError::Batch {
		total,
		succeeded: updated.iter().filter_map(Subject::id).collect(),
		failures,
	})
}

/// Fetches the resource and every subject with authorisation disabled.
///
/// A missing record fails the request.
async fn populate(
	resources_service: &dyn ResourceService,
	resource_id: &DocumentId,
	subjects_service: &dyn ResourceService,
	subject_ids: &[DocumentId],
	params: &Params,
) -> Result<(ResourceRef, Vec<Subject>)> {
	let lookup = params.nested().with_check_authorisation(false);

	let resource = resources_service.get(resource_id, &lookup).await?;
	let subjects = try_join_all(
		subject_ids
			.iter()
			.map(|id| subjects_service.get(id, &lookup)),
	)
	.await?
	.into_iter()
	.map(Subject::from)
	.collect();

	let context = resource
		.get("context")
		.and_then(DocumentId::from_value)
		.or_else(|| resources_service.context().cloned());
	let resource = ResourceRef {
		id: DocumentId::of(&resource).unwrap_or_else(|| resource_id.clone()),
		context,
	};
	Ok((resource, subjects))
}

/// Reads a list of ids given either as an array or a single value.
pub fn ids_from_value(value: &Value) -> Vec<DocumentId> {
	match value {
		Value::Array(items) => items
			.iter()
			.filter_map(|item| match item {
				Value::Object(document) => DocumentId::of(document),
				other => DocumentId::from_value(other),
			})
			.collect(),
		Value::Object(document) => DocumentId::of(document).into_iter().collect(),
		other => DocumentId::from_value(other).into_iter().collect(),
	}
}
