// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Services reachable through the application, keyed by path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tessera_server_auth::{AuthError, DocumentId, ResourceService, TagServiceResolver};
use tracing::debug;

#[derive(Clone)]
pub struct Registration {
	pub service: Arc<dyn ResourceService>,
	/// Keep tag services in sync with the `tags` of written items.
	pub tagged: bool,
}

#[derive(Default)]
pub struct ServiceRegistry {
	services: RwLock<HashMap<String, Registration>>,
}

impl ServiceRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `service` under its path, replacing any previous one.
	pub fn insert(&self, service: Arc<dyn ResourceService>, tagged: bool) {
		let path = service.path();
		debug!(path = %path, tagged, "service registered");
		self.services
			.write()
			.insert(path, Registration { service, tagged });
	}

	pub fn remove(&self, path: &str) -> bool {
		self.services.write().remove(path).is_some()
	}

	pub fn registration(&self, path: &str) -> Option<Registration> {
		self.services.read().get(path).cloned()
	}

	pub fn get(&self, path: &str) -> Option<Arc<dyn ResourceService>> {
		self.registration(path).map(|registration| registration.service)
	}

	/// Like [`get`](Self::get), failing with `NotFound` for unknown paths.
	pub fn require(&self, path: &str) -> Result<Arc<dyn ResourceService>, AuthError> {
		self.get(path)
			.ok_or_else(|| AuthError::NotFound(format!("No service registered at '{path}'")))
	}

	pub fn paths(&self) -> Vec<String> {
		let mut paths: Vec<String> = self.services.read().keys().cloned().collect();
		paths.sort();
		paths
	}

	pub fn len(&self) -> usize {
		self.services.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl TagServiceResolver for ServiceRegistry {
	fn tag_service(&self, context: Option<&DocumentId>) -> Option<Arc<dyn ResourceService>> {
		match context {
			Some(context) => self.get(&format!("{context}/tags")),
			None => self.get("tags"),
		}
	}
}

impl std::fmt::Debug for ServiceRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServiceRegistry")
			.field("paths", &self.paths())
			.finish()
	}
}
