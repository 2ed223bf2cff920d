// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Anonymous, registered and delegated callers against one application.

use std::sync::Arc;

use serde_json::json;
use tessera_server::App;
use tessera_server_auth::ability::policies::ScopeAbilities;
use tessera_server_auth::{
	DocumentId, MemoryService, Method, Operation, OperationResult, Params, ResourceService,
	ScopeEntry, Subject,
};
use tessera_server_config::ServerConfig;

use super::support::{doc, entry};

const SCOPE: &str = "authorisations";

struct Scenario {
	app: App,
	users: Arc<MemoryService>,
}

fn scenario() -> Scenario {
	let app = App::new(ServerConfig::default());
	app.register_hook(Arc::new(ScopeAbilities::new(SCOPE, "organisations")));

	let users = Arc::new(MemoryService::new("users").with_documents([
		doc(json!({ "_id": "b" })),
		doc(json!({ "_id": "c", SCOPE: [entry("r", "manager")] })),
		doc(json!({ "_id": "d" })),
	]));
	app.register_service(users.clone());
	app.register_service(Arc::new(
		MemoryService::new("organisations").with_documents([doc(json!({ "_id": "r" }))]),
	));
	app.register_service(Arc::new(MemoryService::new("tags")));

	Scenario { app, users }
}

impl Scenario {
	async fn user(&self, id: &str) -> Subject {
		Subject::from(
			self.users
				.get(&DocumentId::from(id), &Params::internal())
				.await
				.unwrap(),
		)
	}

	async fn grant(&self, acting: &str, permissions: &str) -> tessera_server_auth::Result<OperationResult> {
		let data = doc(json!({
			"scope": SCOPE,
			"permissions": permissions,
			"subjects": ["d"],
			"subjectsService": "users",
			"resource": "r",
			"resourcesService": "organisations",
		}));
		let params = Params::external("rest").with_user(self.user(acting).await);
		self.app
			.call("authorisations", Operation::create(data, params))
			.await
	}
}

#[tokio::test]
async fn test_anonymous_cannot_create_tags() {
	let scenario = scenario();
	let err = scenario
		.app
		.call(
			"tags",
			Operation::create(doc(json!({ "value": "x", "scope": "y" })), Params::external("rest")),
		)
		.await
		.unwrap_err();
	assert!(err.is_forbidden());
	assert_eq!(
		err.translation_key(),
		Some("server.auth.forbidden.service_path")
	);
}

#[tokio::test]
async fn test_registered_subject_can_create_users() {
	let scenario = scenario();
	let params = Params::external("rest").with_user(scenario.user("b").await);
	let created = scenario
		.app
		.call("users", Operation::create(doc(json!({ "name": "E" })), params))
		.await
		.unwrap()
		.into_item()
		.unwrap();
	assert!(DocumentId::of(&created).is_some());
	assert_eq!(scenario.users.len(), 4);
}

#[tokio::test]
async fn test_manager_grants_within_own_role() {
	let scenario = scenario();

	let err = scenario.grant("c", "owner").await.unwrap_err();
	assert!(err.is_forbidden());
	assert_eq!(
		err.translation_key(),
		Some("server.auth.forbidden.authorisation_permissions")
	);
	assert!(scenario.user("d").await.scope(SCOPE).is_empty());

	scenario.grant("c", "member").await.unwrap();
	let scope = scenario.user("d").await.scope(SCOPE);
	assert_eq!(scope.len(), 1);
	let ScopeEntry { id, permissions, .. } = &scope[0];
	assert_eq!(id, &DocumentId::from("r"));
	assert_eq!(permissions, "member");
}
