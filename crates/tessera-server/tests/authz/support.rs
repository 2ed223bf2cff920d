// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use serde_json::{json, Value};
use tessera_server::App;
use tessera_server_auth::ability::policies::ScopeAbilities;
use tessera_server_auth::{
	AuthError, Document, DocumentId, Method, Operation, OperationResult, Params, ResourceService,
	Subject,
};
use tessera_server_config::ServerConfig;
use tessera_server_db::testing::create_test_pool;
use tessera_server_db::SqlitePool;

pub const GROUPS: &str = "groups";

pub fn doc(value: Value) -> Document {
	value.as_object().cloned().unwrap()
}

#[derive(Clone, Debug)]
pub struct TestUser {
	pub id: DocumentId,
}

#[derive(Clone, Debug)]
pub struct Fixtures {
	/// Owner of g1.
	pub owner: TestUser,
	/// Manager of g1.
	pub manager: TestUser,
	/// Member of g1.
	pub member: TestUser,
	/// Registered, no groups.
	pub outsider: TestUser,
	/// Owner of g2.
	pub other_owner: TestUser,
	/// Soft-deleted member of g1.
	pub deleted: TestUser,
}

pub struct TestApp {
	pub app: App,
	pub pool: SqlitePool,
	pub users: Arc<dyn ResourceService>,
	pub fixtures: Fixtures,
}

impl TestApp {
	/// Users and groups stored in SQLite, with group roles in the `groups`
	/// scope.
	pub async fn new() -> Self {
		let pool = create_test_pool().await.unwrap();
		let app = App::new(ServerConfig::default());
		app.register_hook(Arc::new(ScopeAbilities::new(GROUPS, GROUPS)));

		let users = app.register_collection(&pool, "users", None, false);
		let groups = app.register_collection(&pool, GROUPS, None, false);
		for (id, name) in [("g1", "Group One"), ("g2", "Group Two")] {
			groups
				.create(doc(json!({ "_id": id, "name": name })), &Params::internal())
				.await
				.unwrap();
		}

		let fixtures = Fixtures {
			owner: create_user(&users, json!({ "_id": "owner", "groups": [entry("g1", "owner")] })).await,
			manager: create_user(
				&users,
				json!({ "_id": "manager", "groups": [entry("g1", "manager")] }),
			)
			.await,
			member: create_user(&users, json!({ "_id": "member", "groups": [entry("g1", "member")] }))
				.await,
			outsider: create_user(&users, json!({ "_id": "outsider" })).await,
			other_owner: create_user(
				&users,
				json!({ "_id": "other-owner", "groups": [entry("g2", "owner")] }),
			)
			.await,
			deleted: create_user(
				&users,
				json!({ "_id": "deleted", "deleted": true, "groups": [entry("g1", "member")] }),
			)
			.await,
		};

		Self {
			app,
			pool,
			users,
			fixtures,
		}
	}

	/// Current state of a user, as authentication would load it.
	pub async fn subject(&self, user: &TestUser) -> Subject {
		Subject::from(self.user_document(user).await)
	}

	pub async fn user_document(&self, user: &TestUser) -> Document {
		self.users.get(&user.id, &Params::internal()).await.unwrap()
	}

	/// Issues an external call. `body` is the data of writes and the query
	/// of reads and removals.
	pub async fn call(
		&self,
		path: &str,
		method: Method,
		id: Option<&str>,
		user: Option<&TestUser>,
		body: Option<Value>,
	) -> Result<OperationResult, AuthError> {
		let mut params = Params::external("rest");
		if let Some(user) = user {
			params = params.with_user(self.subject(user).await);
		}

		let body = body.map(doc);
		let mut operation = Operation::new(method, params);
		operation.id = id.map(DocumentId::from);
		match method {
			Method::Create | Method::Update | Method::Patch => operation.data = body,
			_ => operation.params.query = body.unwrap_or_default(),
		}
		self.app.call(path, operation).await
	}
}

pub fn entry(id: &str, permissions: &str) -> Value {
	json!({ "_id": id, "permissions": permissions })
}

async fn create_user(users: &Arc<dyn ResourceService>, user: Value) -> TestUser {
	let created = users.create(doc(user), &Params::internal()).await.unwrap();
	TestUser {
		id: DocumentId::of(&created).unwrap(),
	}
}

pub struct AuthzCase {
	pub name: &'static str,
	pub method: Method,
	pub path: String,
	pub id: Option<String>,
	pub user: Option<TestUser>,
	pub body: Option<Value>,
	pub expected_status: u16,
}

pub async fn run_authz_cases(app: &TestApp, cases: &[AuthzCase]) {
	for case in cases {
		let result = app
			.call(
				&case.path,
				case.method,
				case.id.as_deref(),
				case.user.as_ref(),
				case.body.clone(),
			)
			.await;

		let status = match &result {
			Ok(_) => 200,
			Err(e) => e.status_code(),
		};
		if status != case.expected_status {
			panic!(
				"Case '{}': {} {} {:?} - expected {}, got {}\nResult: {:?}",
				case.name, case.method, case.path, case.id, case.expected_status, status, result
			);
		}
	}
}
