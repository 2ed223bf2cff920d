// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access enforcement run before every service call.
//!
//! # Flow
//!
//! 1. Internal calls and calls already authorised pass through, unless the
//!    `check_authorisation` override says otherwise. The override is consumed
//!    so it cannot leak into the lookups made below.
//! 2. The caller must hold `service` on the service path.
//! 3. `create` without an id is checked against the submitted data.
//! 4. Other calls without an id get the ability filter merged into their
//!    query. When nothing is accessible the call resolves to an empty page.
//! 5. Calls with an id fetch the target and check it. For `get`, the fetched
//!    document becomes the result.
//! 6. Services that cannot fetch by id enforce single-item access themselves.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::ability::AbilitySet;
use crate::cache::AbilitiesCache;
use crate::error::{AuthError, Result, Translation};
use crate::query::{self, Query};
use crate::service::{Method, Operation, OperationResult, Page, ResourceService};

/// How an operation got through enforcement.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
	/// No check required.
	Skipped,
	/// Service and resource checks passed.
	Allowed,
	/// The query was narrowed to the accessible documents.
	Filtered(Query),
	/// Nothing is accessible; the result is an empty page.
	Empty,
	/// The target was fetched and checked.
	Fetched,
	/// The service has no fetch-by-id; it must enforce access itself.
	Delegated,
}

impl Decision {
	/// Whether the operation already carries its result.
	pub fn is_short_circuit(&self) -> bool {
		matches!(self, Decision::Empty)
	}
}

pub struct AccessEnforcer {
	cache: Arc<AbilitiesCache>,
}

impl AccessEnforcer {
	pub fn new(cache: Arc<AbilitiesCache>) -> Self {
		Self { cache }
	}

	pub fn cache(&self) -> &Arc<AbilitiesCache> {
		&self.cache
	}

	/// Authorises `operation` on `service`, narrowing its query or setting its
	/// result where needed.
	#[instrument(
        level = "debug",
        skip(self, service, operation),
        fields(path = %service.path(), method = %operation.method, id = ?operation.id)
    )]
	pub async fn authorise(
		&self,
		service: &dyn ResourceService,
		operation: &mut Operation,
	) -> Result<Decision> {
		let params = &mut operation.params;
		let mut check = params.is_external();
		if params.authorised {
			debug!("access already granted");
			check = false;
		}
		if let Some(forced) = params.check_authorisation.take() {
			debug!(forced, "access check overridden");
			check = forced;
		}

		if !check {
			params.authorised = true;
			debug!("authorisation check skipped");
			return Ok(Decision::Skipped);
		}

		let abilities = self.cache.get(params.user.as_ref());
		params.abilities = Some(abilities.clone());

		let path = service.path();
		if !abilities.can_service(&path) {
			info!(path = %path, "service access denied");
			return Err(AuthError::forbidden(
				Translation::new("server.auth.forbidden.service_path").with("path", &path),
			));
		}

		let resource_type = service.name();
		let context = service.context();
		let action = operation.method.action();

		let Some(id) = operation.id.clone() else {
			if operation.method == Method::Create {
				if !abilities.can(action, resource_type, context, operation.data.as_ref()) {
					return Err(denied(operation.method, resource_type));
				}
				operation.params.authorised = true;
				return Ok(Decision::Allowed);
			}

			return Ok(match abilities.filter_query_in(action, resource_type, context) {
				Some(filter) => {
					debug!(filter = ?filter, "restricting query");
					query::restrict(&mut operation.params.query, filter.clone());
					operation.params.authorised = true;
					Decision::Filtered(filter)
				}
				None => {
					debug!("no accessible resources");
					operation.result = Some(OperationResult::Page(Page::empty()));
					operation.params.authorised = true;
					Decision::Empty
				}
			});
		};

		if !service.supports_get() {
			debug!("service cannot fetch by id, access delegated to service");
			return Ok(Decision::Delegated);
		}

		let mut lookup = operation.params.clone();
		lookup.check_authorisation = Some(false);
		let resource = service.get(&id, &lookup).await?;
		check_resource(&abilities, operation.method, resource_type, service, &resource)?;

		if operation.method == Method::Get {
			operation.result = Some(OperationResult::Item(resource));
		}
		operation.params.authorised = true;
		Ok(Decision::Fetched)
	}
}

impl std::fmt::Debug for AccessEnforcer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AccessEnforcer")
			.field("cache", &self.cache)
			.finish()
	}
}

fn check_resource(
	abilities: &AbilitySet,
	method: Method,
	resource_type: &str,
	service: &dyn ResourceService,
	resource: &crate::types::Document,
) -> Result<()> {
	if abilities.can(method.action(), resource_type, service.context(), Some(resource)) {
		Ok(())
	} else {
		Err(denied(method, resource_type))
	}
}

fn denied(method: Method, resource_type: &str) -> AuthError {
	info!(method = %method, resource_type, "resource access denied");
	AuthError::forbidden(
		Translation::new("server.auth.forbidden.operation")
			.with("method", method)
			.with("path", resource_type),
	)
}
