// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! LRU cache of computed abilities, keyed by subject id.
//!
//! Anonymous callers share one entry under [`ANONYMOUS_KEY`]. Every change to
//! a subject's scopes must be followed by [`AbilitiesCache::invalidate`] (or
//! [`AbilitiesCache::update`]) so the next lookup recomputes.
//!
//! Abilities are computed outside the lock. A lookup that raced with an
//! invalidation returns what it computed but does not store it.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::ability::{AbilityEngine, AbilitySet};
use crate::types::Subject;

pub const ANONYMOUS_KEY: &str = "anonymous";
pub const DEFAULT_CAPACITY: usize = 1000;

fn cache_key(subject: Option<&Subject>) -> String {
	subject
		.and_then(Subject::id)
		.map(|id| id.to_string())
		.unwrap_or_else(|| ANONYMOUS_KEY.to_string())
}

struct Entries {
	lru: LruCache<String, AbilitySet>,
	/// Bumped by every invalidation.
	generation: u64,
}

pub struct AbilitiesCache {
	engine: Arc<AbilityEngine>,
	entries: Option<Mutex<Entries>>,
}

impl AbilitiesCache {
	/// Cache holding at most `capacity` subjects.
	pub fn new(engine: Arc<AbilityEngine>, capacity: NonZeroUsize) -> Self {
		Self {
			engine,
			entries: Some(Mutex::new(Entries {
				lru: LruCache::new(capacity),
				generation: 0,
			})),
		}
	}

	/// Cache that recomputes on every lookup.
	pub fn disabled(engine: Arc<AbilityEngine>) -> Self {
		Self {
			engine,
			entries: None,
		}
	}

	/// Builds from configuration values; `capacity` of zero disables caching.
	pub fn from_settings(engine: Arc<AbilityEngine>, enabled: bool, capacity: usize) -> Self {
		match NonZeroUsize::new(capacity).filter(|_| enabled) {
			Some(capacity) => Self::new(engine, capacity),
			None => Self::disabled(engine),
		}
	}

	pub fn engine(&self) -> &Arc<AbilityEngine> {
		&self.engine
	}

	pub fn is_enabled(&self) -> bool {
		self.entries.is_some()
	}

	/// Cached abilities of `subject`, computing them on a miss.
	pub fn get(&self, subject: Option<&Subject>) -> AbilitySet {
		let Some(entries) = &self.entries else {
			return self.engine.compute(subject);
		};

		let key = cache_key(subject);
		let generation = {
			let mut guard = entries.lock();
			if let Some(abilities) = guard.lru.get(&key) {
				trace!(key = %key, "abilities cache hit");
				return abilities.clone();
			}
			guard.generation
		};

		let abilities = self.engine.compute(subject);
		let mut guard = entries.lock();
		if guard.generation == generation {
			guard.lru.put(key.clone(), abilities.clone());
			debug!(key = %key, "abilities cached");
		} else {
			debug!(key = %key, "invalidated while computing, not cached");
		}
		abilities
	}

	pub fn invalidate(&self, subject: Option<&Subject>) {
		if let Some(entries) = &self.entries {
			let key = cache_key(subject);
			let mut guard = entries.lock();
			guard.generation = guard.generation.wrapping_add(1);
			if guard.lru.pop(&key).is_some() {
				debug!(key = %key, "abilities invalidated");
			}
		}
	}

	/// Invalidates then recomputes `subject`'s abilities.
	pub fn update(&self, subject: Option<&Subject>) -> AbilitySet {
		self.invalidate(subject);
		self.get(subject)
	}

	pub fn clear(&self) {
		if let Some(entries) = &self.entries {
			let mut guard = entries.lock();
			guard.generation = guard.generation.wrapping_add(1);
			guard.lru.clear();
		}
	}

	pub fn len(&self) -> usize {
		self.entries.as_ref().map_or(0, |entries| entries.lock().lru.len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl std::fmt::Debug for AbilitiesCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AbilitiesCache")
			.field("enabled", &self.is_enabled())
			.field("len", &self.len())
			.finish()
	}
}
