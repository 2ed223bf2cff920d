// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Privilege escalation guard for authorisation changes.
//!
//! A subject changing authorisations on a resource must hold a role on that
//! resource themself, cannot touch subjects ranked above them, and cannot
//! grant a role above their own. Any violation rejects the whole batch before
//! anything is persisted.

use tracing::{debug, info};

use crate::error::{AuthError, Result, Translation};
use crate::service::{Method, Params};
use crate::types::{DocumentId, Role, Subject};

/// Whether the guard applies to a call.
///
/// External calls are guarded; an explicit `check_escalation` wins.
pub fn escalation_check_required(params: &Params) -> bool {
	params.check_escalation.unwrap_or(params.is_external())
}

/// Inputs of one escalation check.
#[derive(Debug, Clone, Copy)]
pub struct EscalationCheck<'a> {
	/// `Create` for grants, `Remove` for revocations.
	pub method: Method,
	pub scope: &'a str,
	pub resource: &'a DocumentId,
	/// Subject performing the change; `None` is anonymous.
	pub acting: Option<&'a Subject>,
	pub subjects: &'a [Subject],
	/// Role being granted; only meaningful for grants.
	pub permissions: Option<Role>,
}

fn role_on(subject: &Subject, scope: &str, resource: &DocumentId) -> Option<Role> {
	subject
		.scope_entry(scope, resource)
		.and_then(|entry| entry.role())
}

/// Rejects the change when it would hand out or remove more than the acting
/// subject holds.
pub fn prevent_escalation(check: &EscalationCheck<'_>) -> Result<()> {
	let resource = check.resource;

	if check.acting.is_none() {
		info!(scope = check.scope, resource = %resource, "escalation denied: anonymous caller");
		return Err(AuthError::forbidden(Translation::new(
			"server.auth.forbidden.authorisation_user",
		)));
	}

	let Some(acting_role) = check
		.acting
		.and_then(|acting| role_on(acting, check.scope, resource))
	else {
		info!(
			scope = check.scope,
			resource = %resource,
			"escalation denied: acting subject holds no role on resource"
		);
		return Err(AuthError::forbidden(
			Translation::new("server.auth.forbidden.authorisation_resource")
				.with("resource", resource),
		));
	};

	let allowed = check
		.subjects
		.iter()
		.filter(|subject| {
			let role = role_on(subject, check.scope, resource);
			match check.method {
				Method::Remove => role.is_some_and(|role| role <= acting_role),
				_ => role.map_or(true, |role| role <= acting_role),
			}
		})
		.count();

	let rejected = check.subjects.len() - allowed;
	if rejected > 0 {
		info!(
			scope = check.scope,
			resource = %resource,
			rejected,
			"escalation denied: subjects outrank acting subject"
		);
		return Err(AuthError::forbidden(
			Translation::new("server.auth.forbidden.authorisation_subjects")
				.with("count", rejected)
				.with("resource", resource),
		));
	}

	if check.method != Method::Remove {
		if let Some(requested) = check.permissions {
			if requested > acting_role {
				info!(
					scope = check.scope,
					resource = %resource,
					requested = %requested,
					acting = %acting_role,
					"escalation denied: requested role above acting role"
				);
				return Err(AuthError::forbidden(
					Translation::new("server.auth.forbidden.authorisation_permissions")
						.with("permissions", requested)
						.with("resource", resource),
				));
			}
		}
	}

	debug!(scope = check.scope, resource = %resource, "escalation check passed");
	Ok(())
}
