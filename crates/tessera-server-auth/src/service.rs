// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Document service contract.
//!
//! Subjects, resources and tags all live behind [`ResourceService`]
//! implementations. Each call carries [`Params`] describing who issued it and
//! whether authorisation still has to be checked.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ability::{AbilitySet, Action};
use crate::error::Result;
use crate::query::Query;
use crate::types::{Document, DocumentId, Subject};

/// Service operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
	Find,
	Get,
	Create,
	Update,
	Patch,
	Remove,
}

impl Method {
	/// Ability action checked for this method.
	pub fn action(self) -> Action {
		match self {
			Method::Find => Action::Find,
			Method::Get => Action::Get,
			Method::Create => Action::Create,
			Method::Update => Action::Update,
			Method::Patch => Action::Patch,
			Method::Remove => Action::Remove,
		}
	}

	pub fn as_str(self) -> &'static str {
		self.action().as_str()
	}
}

impl fmt::Display for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Per-call context.
#[derive(Debug, Clone, Default)]
pub struct Params {
	/// Transport the call came in through; `None` for internal calls.
	pub provider: Option<String>,
	/// Acting subject; `None` is anonymous.
	pub user: Option<Subject>,
	pub query: Query,
	/// Forces the authorisation check on or off; consumed by the check.
	pub check_authorisation: Option<bool>,
	/// Forces the escalation guard on or off.
	pub check_escalation: Option<bool>,
	/// Set once the call passed authorisation.
	pub authorised: bool,
	/// Abilities the call was authorised with.
	pub abilities: Option<AbilitySet>,
	/// Item state before an update, when it could be loaded.
	pub previous_item: Option<Document>,
}

impl Params {
	/// Internal call, not subject to authorisation by default.
	pub fn internal() -> Self {
		Self::default()
	}

	/// Call received from outside the process.
	pub fn external(provider: impl Into<String>) -> Self {
		Self {
			provider: Some(provider.into()),
			..Self::default()
		}
	}

	pub fn with_user(mut self, user: Subject) -> Self {
		self.user = Some(user);
		self
	}

	pub fn with_query(mut self, query: Query) -> Self {
		self.query = query;
		self
	}

	pub fn with_check_authorisation(mut self, check: bool) -> Self {
		self.check_authorisation = Some(check);
		self
	}

	pub fn with_check_escalation(mut self, check: bool) -> Self {
		self.check_escalation = Some(check);
		self
	}

	pub fn is_external(&self) -> bool {
		self.provider.is_some()
	}

	/// Params for a follow-up call made on behalf of this one.
	pub fn nested(&self) -> Self {
		Self {
			user: self.user.clone(),
			..Self::default()
		}
	}
}

/// A page of `find` results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Page {
	pub total: usize,
	pub skip: usize,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub limit: Option<usize>,
	pub data: Vec<Document>,
}

impl Page {
	pub fn empty() -> Self {
		Self::default()
	}
}

#[async_trait]
pub trait ResourceService: Send + Sync {
	/// Resource type name rules are written against.
	fn name(&self) -> &str;

	/// Registration path; contextual services are prefixed by their context.
	fn path(&self) -> String {
		match self.context() {
			Some(context) => format!("{}/{}", context, self.name()),
			None => self.name().to_string(),
		}
	}

	/// Tenant the service's documents belong to.
	fn context(&self) -> Option<&DocumentId> {
		None
	}

	/// Whether single documents can be fetched by id.
	fn supports_get(&self) -> bool {
		true
	}

	async fn find(&self, params: &Params) -> Result<Page>;

	async fn get(&self, id: &DocumentId, params: &Params) -> Result<Document>;

	async fn create(&self, data: Document, params: &Params) -> Result<Document>;

	async fn update(&self, id: &DocumentId, data: Document, params: &Params) -> Result<Document>;

	async fn patch(&self, id: &DocumentId, data: Document, params: &Params) -> Result<Document>;

	async fn remove(&self, id: &DocumentId, params: &Params) -> Result<Document>;
}

/// One inbound call on a service.
#[derive(Debug, Clone)]
pub struct Operation {
	pub method: Method,
	pub id: Option<DocumentId>,
	pub data: Option<Document>,
	pub params: Params,
	/// Result produced before the service ran.
	pub result: Option<OperationResult>,
}

impl Operation {
	pub fn new(method: Method, params: Params) -> Self {
		Self {
			method,
			id: None,
			data: None,
			params,
			result: None,
		}
	}

	pub fn find(params: Params) -> Self {
		Self::new(Method::Find, params)
	}

	pub fn get(id: impl Into<DocumentId>, params: Params) -> Self {
		Self::new(Method::Get, params).with_id(id)
	}

	pub fn create(data: Document, params: Params) -> Self {
		Self::new(Method::Create, params).with_data(data)
	}

	pub fn patch(id: impl Into<DocumentId>, data: Document, params: Params) -> Self {
		Self::new(Method::Patch, params).with_id(id).with_data(data)
	}

	pub fn update(id: impl Into<DocumentId>, data: Document, params: Params) -> Self {
		Self::new(Method::Update, params).with_id(id).with_data(data)
	}

	pub fn remove(id: impl Into<DocumentId>, params: Params) -> Self {
		Self::new(Method::Remove, params).with_id(id)
	}

	pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
		self.id = Some(id.into());
		self
	}

	pub fn with_data(mut self, data: Document) -> Self {
		self.data = Some(data);
		self
	}
}

/// What a service call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
	Page(Page),
	Item(Document),
}

impl OperationResult {
	pub fn into_page(self) -> Option<Page> {
		match self {
			OperationResult::Page(page) => Some(page),
			OperationResult::Item(_) => None,
		}
	}

	pub fn into_item(self) -> Option<Document> {
		match self {
			OperationResult::Item(item) => Some(item),
			OperationResult::Page(_) => None,
		}
	}
}
