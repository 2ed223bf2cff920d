// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ability-based authorisation for Tessera services.
//!
//! # Overview
//!
//! Access is decided from *abilities*: allow/deny rules over an action, a
//! resource type and optional field conditions. Abilities are computed per
//! subject by the hooks registered on an [`AbilityEngine`] and cached in an
//! [`AbilitiesCache`].
//!
//! - [`AccessEnforcer`] checks every external service call against the
//!   caller's abilities, narrowing collection queries to what is accessible.
//! - [`AuthorisationService`] grants and revokes roles, stored as scope
//!   entries on subjects, and keeps the cache coherent.
//! - [`escalation`] stops subjects from handing out more than they hold.
//! - [`tags`] maintains tag usage counts and tag summaries on resources.
//!
//! # Roles
//!
//! | Role      | Rank |
//! |-----------|------|
//! | `member`  | 0    |
//! | `manager` | 1    |
//! | `owner`   | 2    |

pub mod ability;
pub mod authorisation;
pub mod cache;
pub mod error;
pub mod escalation;
pub mod memory;
pub mod middleware;
pub mod query;
pub mod service;
pub mod subjects;
pub mod tags;
pub mod types;

pub use ability::{
	hook, AbilityBuilder, AbilityEngine, AbilityHook, AbilitySet, Action, Rule,
};
pub use authorisation::{
	parse_permissions, AuthorisationRequest, AuthorisationService, Grant, RevocationRequest,
};
pub use cache::{AbilitiesCache, ANONYMOUS_KEY, DEFAULT_CAPACITY};
pub use error::{AuthError, Result, Translation};
pub use escalation::{escalation_check_required, prevent_escalation, EscalationCheck};
pub use memory::MemoryService;
pub use middleware::{AccessEnforcer, Decision};
pub use query::Query;
pub use service::{Method, Operation, OperationResult, Page, Params, ResourceService};
pub use subjects::{count_subjects_for_resource, find_subjects_for_resource};
pub use tags::{Tag, TagServiceResolver};
pub use types::{
	Document, DocumentId, ResourceRef, Role, ScopeEntry, Subject, TypedResource, ID_FIELD,
};
