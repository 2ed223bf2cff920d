// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ability computation from registered hooks.
//!
//! Every feature that owns resources registers an [`AbilityHook`] that writes
//! the rules a subject gets for those resources. [`AbilityEngine::compute`]
//! runs the hooks in registration order and freezes the result into an
//! [`AbilitySet`]. Computation is a pure function of the subject and the
//! registered hooks.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, instrument};

use super::set::{AbilityBuilder, AbilitySet};
use crate::types::Subject;

/// Contributes rules for a subject; `None` is the anonymous subject.
pub trait AbilityHook: Send + Sync {
	fn define(&self, subject: Option<&Subject>, builder: &mut AbilityBuilder);
}

impl<F> AbilityHook for F
where
	F: Fn(Option<&Subject>, &mut AbilityBuilder) + Send + Sync,
{
	fn define(&self, subject: Option<&Subject>, builder: &mut AbilityBuilder) {
		self(subject, builder)
	}
}

/// Wraps a closure as a shareable hook.
pub fn hook<F>(f: F) -> Arc<dyn AbilityHook>
where
	F: Fn(Option<&Subject>, &mut AbilityBuilder) + Send + Sync + 'static,
{
	Arc::new(f)
}

fn same_hook(a: &Arc<dyn AbilityHook>, b: &Arc<dyn AbilityHook>) -> bool {
	std::ptr::eq(
		Arc::as_ptr(a) as *const (),
		Arc::as_ptr(b) as *const (),
	)
}

/// Ordered registry of ability hooks.
#[derive(Default)]
pub struct AbilityEngine {
	hooks: RwLock<Vec<Arc<dyn AbilityHook>>>,
}

impl AbilityEngine {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `hook`; registering the same hook twice is a no-op.
	///
	/// Returns whether the hook was added.
	pub fn register(&self, hook: Arc<dyn AbilityHook>) -> bool {
		let mut hooks = self.hooks.write();
		if hooks.iter().any(|existing| same_hook(existing, &hook)) {
			return false;
		}
		hooks.push(hook);
		true
	}

	/// Removes `hook`; returns whether it was registered.
	pub fn unregister(&self, hook: &Arc<dyn AbilityHook>) -> bool {
		let mut hooks = self.hooks.write();
		let before = hooks.len();
		hooks.retain(|existing| !same_hook(existing, hook));
		hooks.len() != before
	}

	pub fn hook_count(&self) -> usize {
		self.hooks.read().len()
	}

	/// Runs every hook against a fresh builder.
	#[instrument(
        level = "debug",
        skip(self, subject),
        fields(subject_id = ?subject.and_then(Subject::id))
    )]
	pub fn compute(&self, subject: Option<&Subject>) -> AbilitySet {
		let hooks: Vec<_> = self.hooks.read().clone();
		let mut builder = AbilityBuilder::new();
		for hook in &hooks {
			hook.define(subject, &mut builder);
		}
		debug!(
			hooks = hooks.len(),
			rules = builder.rules().len(),
			"computed abilities"
		);
		builder.build()
	}
}

impl std::fmt::Debug for AbilityEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AbilityEngine")
			.field("hooks", &self.hook_count())
			.finish()
	}
}
