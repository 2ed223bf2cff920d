// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde_json::{json, Value};
use tessera_server_auth::Method;

use super::support::{run_authz_cases, AuthzCase, TestApp, GROUPS};

const AUTHORISATIONS: &str = "authorisations";

fn grant(subject: &str, permissions: &str) -> Value {
	json!({
		"scope": GROUPS,
		"permissions": permissions,
		"subjects": [subject],
		"subjectsService": "users",
		"resource": "g1",
		"resourcesService": GROUPS,
	})
}

fn revocation(subject: &str) -> Value {
	json!({
		"scope": GROUPS,
		"subjects": [subject],
		"subjectsService": "users",
		"resourcesService": GROUPS,
	})
}

#[tokio::test]
async fn test_authorisations_authorization() {
	let app = TestApp::new().await;
	let fixtures = &app.fixtures;

	let cases = vec![
		// POST authorisations - anonymous_cannot_grant
		AuthzCase {
			name: "anonymous_cannot_grant",
			method: Method::Create,
			path: AUTHORISATIONS.to_string(),
			id: None,
			user: None,
			body: Some(grant("outsider", "member")),
			expected_status: 403,
		},
		// POST authorisations - member_cannot_grant
		AuthzCase {
			name: "member_cannot_grant",
			method: Method::Create,
			path: AUTHORISATIONS.to_string(),
			id: None,
			user: Some(fixtures.member.clone()),
			body: Some(grant("outsider", "member")),
			expected_status: 403,
		},
		// POST authorisations - other_owner_cannot_grant_on_foreign_group
		AuthzCase {
			name: "other_owner_cannot_grant_on_foreign_group",
			method: Method::Create,
			path: AUTHORISATIONS.to_string(),
			id: None,
			user: Some(fixtures.other_owner.clone()),
			body: Some(grant("outsider", "member")),
			expected_status: 403,
		},
		// POST authorisations - manager_cannot_grant_owner
		AuthzCase {
			name: "manager_cannot_grant_owner",
			method: Method::Create,
			path: AUTHORISATIONS.to_string(),
			id: None,
			user: Some(fixtures.manager.clone()),
			body: Some(grant("outsider", "owner")),
			expected_status: 403,
		},
		// POST authorisations - manager_cannot_demote_owner
		AuthzCase {
			name: "manager_cannot_demote_owner",
			method: Method::Create,
			path: AUTHORISATIONS.to_string(),
			id: None,
			user: Some(fixtures.manager.clone()),
			body: Some(grant("owner", "member")),
			expected_status: 403,
		},
		// POST authorisations - invalid_permissions_rejected
		AuthzCase {
			name: "invalid_permissions_rejected",
			method: Method::Create,
			path: AUTHORISATIONS.to_string(),
			id: None,
			user: Some(fixtures.manager.clone()),
			body: Some(grant("outsider", "admin")),
			expected_status: 400,
		},
		// POST authorisations - manager_can_grant_member
		AuthzCase {
			name: "manager_can_grant_member",
			method: Method::Create,
			path: AUTHORISATIONS.to_string(),
			id: None,
			user: Some(fixtures.manager.clone()),
			body: Some(grant("outsider", "member")),
			expected_status: 200,
		},
		// GET groups/{id} - new_member_can_get_group
		AuthzCase {
			name: "new_member_can_get_group",
			method: Method::Get,
			path: GROUPS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.outsider.clone()),
			body: None,
			expected_status: 200,
		},
		// DELETE authorisations/{id} - member_cannot_revoke
		AuthzCase {
			name: "member_cannot_revoke",
			method: Method::Remove,
			path: AUTHORISATIONS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.member.clone()),
			body: Some(revocation("outsider")),
			expected_status: 403,
		},
		// DELETE authorisations/{id} - manager_cannot_revoke_owner
		AuthzCase {
			name: "manager_cannot_revoke_owner",
			method: Method::Remove,
			path: AUTHORISATIONS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.manager.clone()),
			body: Some(revocation("owner")),
			expected_status: 403,
		},
		// DELETE authorisations/{id} - manager_can_revoke_member
		AuthzCase {
			name: "manager_can_revoke_member",
			method: Method::Remove,
			path: AUTHORISATIONS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.manager.clone()),
			body: Some(revocation("outsider")),
			expected_status: 200,
		},
		// GET groups/{id} - revoked_member_loses_access
		AuthzCase {
			name: "revoked_member_loses_access",
			method: Method::Get,
			path: GROUPS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.outsider.clone()),
			body: None,
			expected_status: 403,
		},
		// GET authorisations - find_yields_nothing
		AuthzCase {
			name: "find_yields_nothing",
			method: Method::Find,
			path: AUTHORISATIONS.to_string(),
			id: None,
			user: Some(fixtures.owner.clone()),
			body: None,
			expected_status: 200,
		},
	];

	run_authz_cases(&app, &cases).await;
}

#[tokio::test]
async fn test_grant_updates_subject_scope() {
	let app = TestApp::new().await;

	let result = app
		.call(
			AUTHORISATIONS,
			Method::Create,
			None,
			Some(&app.fixtures.owner),
			Some(grant("outsider", "manager")),
		)
		.await
		.unwrap()
		.into_item()
		.unwrap();
	assert_eq!(result["permissions"], json!("manager"));
	assert_eq!(result["subjects"][0]["_id"], json!("outsider"));

	let stored = app.user_document(&app.fixtures.outsider).await;
	assert_eq!(stored["groups"], json!([{ "_id": "g1", "permissions": "manager" }]));
}

#[tokio::test]
async fn test_grant_is_idempotent() {
	let app = TestApp::new().await;
	for _ in 0..2 {
		app.call(
			AUTHORISATIONS,
			Method::Create,
			None,
			Some(&app.fixtures.owner),
			Some(grant("member", "member")),
		)
		.await
		.unwrap();
	}

	let stored = app.user_document(&app.fixtures.member).await;
	assert_eq!(stored["groups"], json!([{ "_id": "g1", "permissions": "member" }]));
}

#[tokio::test]
async fn test_owner_can_promote_to_owner() {
	let app = TestApp::new().await;
	app.call(
		AUTHORISATIONS,
		Method::Create,
		None,
		Some(&app.fixtures.owner),
		Some(grant("manager", "owner")),
	)
	.await
	.unwrap();

	app.call(GROUPS, Method::Remove, Some("g1"), Some(&app.fixtures.manager), None)
		.await
		.unwrap();
}

#[tokio::test]
async fn test_revoking_subject_without_role_is_rejected() {
	let app = TestApp::new().await;
	let before = app.user_document(&app.fixtures.outsider).await;

	let err = app
		.call(
			AUTHORISATIONS,
			Method::Remove,
			Some("g1"),
			Some(&app.fixtures.owner),
			Some(revocation("outsider")),
		)
		.await
		.unwrap_err();
	assert_eq!(
		err.translation_key(),
		Some("server.auth.forbidden.authorisation_subjects")
	);
	assert_eq!(app.user_document(&app.fixtures.outsider).await, before);
}

#[tokio::test]
async fn test_revoking_deleted_subject_skips_write() {
	let app = TestApp::new().await;

	let result = app
		.call(
			AUTHORISATIONS,
			Method::Remove,
			Some("g1"),
			Some(&app.fixtures.owner),
			Some(revocation("deleted")),
		)
		.await
		.unwrap()
		.into_item()
		.unwrap();
	assert_eq!(result["subjects"][0]["groups"], json!([]));

	let stored = app.user_document(&app.fixtures.deleted).await;
	assert_eq!(stored["groups"], json!([{ "_id": "g1", "permissions": "member" }]));
}

#[tokio::test]
async fn test_batch_grant_across_subjects() {
	let app = TestApp::new().await;
	let mut data = grant("outsider", "member");
	data["subjects"] = json!(["outsider", "other-owner"]);

	let result = app
		.call(
			AUTHORISATIONS,
			Method::Create,
			None,
			Some(&app.fixtures.owner),
			Some(data),
		)
		.await
		.unwrap()
		.into_item()
		.unwrap();
	assert_eq!(result["subjects"].as_array().map(Vec::len), Some(2));

	let other = app.user_document(&app.fixtures.other_owner).await;
	assert_eq!(
		other["groups"],
		json!([
			{ "_id": "g2", "permissions": "owner" },
			{ "_id": "g1", "permissions": "member" }
		])
	);
}

#[tokio::test]
async fn test_unknown_subject_fails_whole_request() {
	let app = TestApp::new().await;
	let mut data = grant("outsider", "member");
	data["subjects"] = json!(["outsider", "ghost"]);

	let err = app
		.call(
			AUTHORISATIONS,
			Method::Create,
			None,
			Some(&app.fixtures.owner),
			Some(data),
		)
		.await
		.unwrap_err();
	assert!(err.is_not_found());

	let outsider = app.user_document(&app.fixtures.outsider).await;
	assert!(outsider.get("groups").is_none());
}
