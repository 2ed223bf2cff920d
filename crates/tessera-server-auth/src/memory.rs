// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process document service.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::instrument;

use crate::error::{AuthError, Result};
use crate::query::{self, Query};
use crate::service::{Page, Params, ResourceService};
use crate::types::{Document, DocumentId, ID_FIELD};

/// Keeps documents in insertion order behind a lock.
pub struct MemoryService {
	name: String,
	context: Option<DocumentId>,
	supports_get: bool,
	documents: RwLock<Vec<Document>>,
}

impl MemoryService {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			context: None,
			supports_get: true,
			documents: RwLock::new(Vec::new()),
		}
	}

	pub fn with_context(mut self, context: impl Into<DocumentId>) -> Self {
		self.context = Some(context.into());
		self
	}

	/// Service whose documents cannot be fetched by id from outside.
	pub fn without_get(mut self) -> Self {
		self.supports_get = false;
		self
	}

	/// Pre-loads documents, assigning ids where missing.
	pub fn with_documents(self, documents: impl IntoIterator<Item = Document>) -> Self {
		{
			let mut stored = self.documents.write();
			for document in documents {
				stored.push(with_id(document));
			}
		}
		self
	}

	pub fn len(&self) -> usize {
		self.documents.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn not_found(&self, id: &DocumentId) -> AuthError {
		AuthError::NotFound(format!("No record found for id '{id}' in {}", self.name))
	}

	fn position(documents: &[Document], id: &DocumentId) -> Option<usize> {
		documents
			.iter()
			.position(|document| DocumentId::of(document).as_ref() == Some(id))
	}
}

fn with_id(mut document: Document) -> Document {
	if DocumentId::of(&document).is_none() {
		document.insert(ID_FIELD.to_string(), DocumentId::generate().into());
	}
	document
}

fn paging(query: &Query, key: &str) -> Option<usize> {
	query
		.get(key)
		.and_then(Value::as_u64)
		.and_then(|n| usize::try_from(n).ok())
}

/// Applies `$skip`/`$limit` to the documents matching the query.
pub fn paginate(matching: Vec<Document>, query: &Query) -> Page {
	let total = matching.len();
	let skip = paging(query, "$skip").unwrap_or(0);
	let limit = paging(query, "$limit");
	let data = matching
		.into_iter()
		.skip(skip)
		.take(limit.unwrap_or(usize::MAX))
		.collect();
	Page {
		total,
		skip,
		limit,
		data,
	}
}

#[async_trait]
impl ResourceService for MemoryService {
	fn name(&self) -> &str {
		&self.name
	}

	fn context(&self) -> Option<&DocumentId> {
		self.context.as_ref()
	}

	fn supports_get(&self) -> bool {
		self.supports_get
	}

	#[instrument(level = "trace", skip(self, params), fields(service = %self.name))]
	async fn find(&self, params: &Params) -> Result<Page> {
		let matching = self
			.documents
			.read()
			.iter()
			.filter(|document| query::matches(document, &params.query))
			.cloned()
			.collect();
		Ok(paginate(matching, &params.query))
	}

	async fn get(&self, id: &DocumentId, _params: &Params) -> Result<Document> {
		let documents = self.documents.read();
		Self::position(&documents, id)
			.map(|index| documents[index].clone())
			.ok_or_else(|| self.not_found(id))
	}

	async fn create(&self, data: Document, _params: &Params) -> Result<Document> {
		let document = with_id(data);
		let mut documents = self.documents.write();
		if let Some(id) = DocumentId::of(&document) {
			if Self::position(&documents, &id).is_some() {
				return Err(AuthError::Conflict(format!(
					"Duplicate id '{id}' in {}",
					self.name
				)));
			}
		}
		documents.push(document.clone());
		Ok(document)
	}

	async fn update(&self, id: &DocumentId, mut data: Document, _params: &Params) -> Result<Document> {
		let mut documents = self.documents.write();
		let index = Self::position(&documents, id).ok_or_else(|| self.not_found(id))?;
		data.insert(ID_FIELD.to_string(), id.clone().into());
		documents[index] = data.clone();
		Ok(data)
	}

	async fn patch(&self, id: &DocumentId, data: Document, _params: &Params) -> Result<Document> {
		let mut documents = self.documents.write();
		let index = Self::position(&documents, id).ok_or_else(|| self.not_found(id))?;
		let document = &mut documents[index];
		for (key, value) in data {
			if key != ID_FIELD {
				document.insert(key, value);
			}
		}
		Ok(document.clone())
	}

	async fn remove(&self, id: &DocumentId, _params: &Params) -> Result<Document> {
		let mut documents = self.documents.write();
		let index = Self::position(&documents, id).ok_or_else(|| self.not_found(id))?;
		Ok(documents.remove(index))
	}
}
