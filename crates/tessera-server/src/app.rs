// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application wiring and the operation pipeline.
//!
//! Every call goes through [`App::call`]:
//!
//! 1. The access enforcer authorises the operation, possibly narrowing its
//!    query or producing the result itself.
//! 2. For services registered as tagged, tag services are updated from the
//!    item's `tags` before it is written.
//! 3. The operation is dispatched to the service.
//!
//! A patch or remove without an id applies to every item the (narrowed)
//! query selects, one item at a time.

use std::sync::Arc;

use tessera_server_auth::ability::policies::UserAbilities;
use tessera_server_auth::tags::{populate_previous, update_tags};
use tessera_server_auth::{
	AbilitiesCache, AbilityEngine, AbilityHook, AccessEnforcer, AuthError, AuthorisationService,
	Document, DocumentId, Method, Operation, OperationResult, Page, ResourceService, Result,
	ID_FIELD,
};
use tessera_server_config::ServerConfig;
use tessera_server_db::{SqliteDocumentService, SqlitePool};
use tracing::{debug, info, instrument};

use crate::endpoints::{AuthorisationsEndpoint, TagsEndpoint};
use crate::registry::{Registration, ServiceRegistry};

pub struct App {
	config: ServerConfig,
	engine: Arc<AbilityEngine>,
	cache: Arc<AbilitiesCache>,
	enforcer: AccessEnforcer,
	authorisations: Arc<AuthorisationService>,
	registry: Arc<ServiceRegistry>,
}

impl App {
	/// Builds the application with the default user abilities and the
	/// `authorisations` service registered.
	pub fn new(config: ServerConfig) -> Self {
		let engine = Arc::new(AbilityEngine::new());
		engine.register(Arc::new(UserAbilities::default()));

		let cache = Arc::new(AbilitiesCache::from_settings(
			engine.clone(),
			config.authorisation.cache_enabled,
			config.authorisation.cache_max_subjects,
		));
		let enforcer = AccessEnforcer::new(cache.clone());
		let authorisations = Arc::new(AuthorisationService::new(cache.clone()));
		let registry = Arc::new(ServiceRegistry::new());
		registry.insert(
			Arc::new(AuthorisationsEndpoint::new(
				Arc::downgrade(&registry),
				authorisations.clone(),
			)),
			false,
		);

		info!(
			cache_enabled = cache.is_enabled(),
			cache_max_subjects = config.authorisation.cache_max_subjects,
			"application initialised"
		);

		Self {
			config,
			engine,
			cache,
			enforcer,
			authorisations,
			registry,
		}
	}

	pub fn config(&self) -> &ServerConfig {
		&self.config
	}

	pub fn engine(&self) -> &Arc<AbilityEngine> {
		&self.engine
	}

	pub fn cache(&self) -> &Arc<AbilitiesCache> {
		&self.cache
	}

	pub fn authorisations(&self) -> &Arc<AuthorisationService> {
		&self.authorisations
	}

	pub fn registry(&self) -> &Arc<ServiceRegistry> {
		&self.registry
	}

	/// Adds an ability hook. Cached abilities are dropped since they were
	/// computed without it.
	pub fn register_hook(&self, hook: Arc<dyn AbilityHook>) -> bool {
		let added = self.engine.register(hook);
		if added {
			self.cache.clear();
		}
		added
	}

	pub fn unregister_hook(&self, hook: &Arc<dyn AbilityHook>) -> bool {
		let removed = self.engine.unregister(hook);
		if removed {
			self.cache.clear();
		}
		removed
	}

	pub fn register_service(&self, service: Arc<dyn ResourceService>) {
		self.registry.insert(service, false);
	}

	/// Registers a service whose items carry `tags` kept in sync with the
	/// tag services.
	pub fn register_tagged_service(&self, service: Arc<dyn ResourceService>) {
		self.registry.insert(service, true);
	}

	/// Registers the `tags` service of `store`'s context.
	pub fn register_tags(&self, store: Arc<dyn ResourceService>) {
		let endpoint = TagsEndpoint::new(store, Arc::downgrade(&self.registry));
		self.registry.insert(Arc::new(endpoint), false);
	}

	/// Service at `name`, prefixed by `context` for contextual services.
	pub fn service(&self, name: &str, context: Option<&DocumentId>) -> Option<Arc<dyn ResourceService>> {
		match context {
			Some(context) => self.registry.get(&format!("{context}/{name}")),
			None => self.registry.get(name),
		}
	}

	/// Runs `operation` on the service at `path`.
	#[instrument(
        skip(self, path, operation),
        fields(path = %path, method = %operation.method, id = ?operation.id)
    )]
	pub async fn call(&self, path: &str, mut operation: Operation) -> Result<OperationResult> {
		let registration = self
			.registry
			.registration(path)
			.ok_or_else(|| AuthError::NotFound(format!("No service registered at '{path}'")))?;

		let decision = self
			.enforcer
			.authorise(registration.service.as_ref(), &mut operation)
			.await?;
		debug!(decision = ?decision, "operation authorised");
		if let Some(result) = operation.result.take() {
			return Ok(result);
		}

		if operation.id.is_none() && matches!(operation.method, Method::Patch | Method::Remove) {
			return self.run_many(&registration, operation).await;
		}
		self.run(&registration, operation).await
	}

	/// Applies an id-less patch or remove to each item its query selects.
	async fn run_many(
		&self,
		registration: &Registration,
		operation: Operation,
	) -> Result<OperationResult> {
		let selected = registration.service.find(&operation.params).await?;
		let mut affected = Vec::with_capacity(selected.data.len());
		for item in selected.data {
			let Some(id) = DocumentId::of(&item) else {
				continue;
			};
			let mut single = Operation::new(operation.method, operation.params.clone());
			single.id = Some(id);
			single.data = operation.data.clone();
			single.params.previous_item = Some(item);
			match self.run(registration, single).await? {
				OperationResult::Item(item) => affected.push(item),
				OperationResult::Page(page) => affected.extend(page.data),
			}
		}

		debug!(affected = affected.len(), "collection mutation applied");
		Ok(OperationResult::Page(Page {
			total: affected.len(),
			skip: 0,
			limit: None,
			data: affected,
		}))
	}

	/// Dispatches an authorised operation, keeping tags in sync.
	async fn run(&self, registration: &Registration, mut operation: Operation) -> Result<OperationResult> {
		let service = registration.service.as_ref();
		if registration.tagged {
			self.sync_tags_before(service, &mut operation).await?;
		}
		let method = operation.method;
		let result = dispatch(service, operation).await?;
		if registration.tagged && method == Method::Remove {
			return self.sync_tags_after_remove(service, result).await;
		}
		Ok(result)
	}

	async fn sync_tags_before(
		&self,
		service: &dyn ResourceService,
		operation: &mut Operation,
	) -> Result<()> {
		let method = operation.method;
		if !matches!(method, Method::Create | Method::Update | Method::Patch) {
			return Ok(());
		}
		let Some(data) = operation.data.as_mut() else {
			return Ok(());
		};

		let previous = match (&operation.id, &operation.params.previous_item) {
			(_, Some(previous)) => Some(previous.clone()),
			(Some(id), None) if method != Method::Create => populate_previous(service, id).await,
			_ => None,
		};
		update_tags(
			&*self.registry,
			method,
			data,
			previous.as_ref(),
			service.context(),
		)
		.await?;
		operation.params.previous_item = previous;
		Ok(())
	}

	async fn sync_tags_after_remove(
		&self,
		service: &dyn ResourceService,
		result: OperationResult,
	) -> Result<OperationResult> {
		let mut removed = match result {
			OperationResult::Item(removed) => removed,
			page => return Ok(page),
		};
		update_tags(
			&*self.registry,
			Method::Remove,
			&mut removed,
			None,
			service.context(),
		)
		.await?;
		Ok(OperationResult::Item(removed))
	}

	/// Localized message of `error` for a caller preferring `locale`.
	pub fn error_message(&self, error: &AuthError, locale: Option<&str>) -> String {
		let locale = tessera_common_i18n::resolve_locale(
			locale,
			&self.config.authorisation.default_locale,
		);
		error.localized_message(locale)
	}

	/// Document collection stored in `pool`, registered under its path.
	pub fn register_collection(
		&self,
		pool: &SqlitePool,
		name: &str,
		context: Option<&DocumentId>,
		tagged: bool,
	) -> Arc<dyn ResourceService> {
		let mut service = SqliteDocumentService::new(pool.clone(), name);
		if let Some(context) = context {
			service = service.with_context(context.clone());
		}
		let service: Arc<dyn ResourceService> = Arc::new(service);
		self.registry.insert(service.clone(), tagged);
		service
	}
}

impl std::fmt::Debug for App {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("App")
			.field("registry", &self.registry)
			.field("cache", &self.cache)
			.finish_non_exhaustive()
	}
}

fn require_id(id: Option<DocumentId>) -> Result<DocumentId> {
	id.ok_or_else(|| AuthError::missing_field(ID_FIELD))
}

fn require_data(data: Option<Document>) -> Result<Document> {
	data.ok_or_else(|| AuthError::missing_field("data"))
}

async fn dispatch(service: &dyn ResourceService, operation: Operation) -> Result<OperationResult> {
	let Operation {
		method,
		id,
		data,
		params,
		..
	} = operation;

	let item = match method {
		Method::Find => return Ok(OperationResult::Page(service.find(&params).await?)),
		Method::Create => service.create(require_data(data)?, &params).await?,
		Method::Get => service.get(&require_id(id)?, &params).await?,
		Method::Update => {
			service
				.update(&require_id(id)?, require_data(data)?, &params)
				.await?
		}
		Method::Patch => {
			service
				.patch(&require_id(id)?, require_data(data)?, &params)
				.await?
		}
		Method::Remove => service.remove(&require_id(id)?, &params).await?,
	};
	Ok(OperationResult::Item(item))
}
