// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorisation engine configuration section.

use serde::Deserialize;

const DEFAULT_CACHE_MAX_SUBJECTS: usize = 1000;
const DEFAULT_LOCALE: &str = "en";

/// Authorisation configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorisationConfig {
	/// Keep computed abilities in an LRU cache keyed by subject.
	pub cache_enabled: bool,
	/// Maximum number of subjects whose abilities are cached.
	pub cache_max_subjects: usize,
	/// Locale used for error messages when the caller has no preference.
	pub default_locale: String,
}

impl Default for AuthorisationConfig {
	fn default() -> Self {
		Self {
			cache_enabled: true,
			cache_max_subjects: DEFAULT_CACHE_MAX_SUBJECTS,
			default_locale: DEFAULT_LOCALE.to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AuthorisationConfigLayer {
	#[serde(default)]
	pub cache_enabled: Option<bool>,
	#[serde(default)]
	pub cache_max_subjects: Option<usize>,
	#[serde(default)]
	pub default_locale: Option<String>,
}

impl AuthorisationConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.cache_enabled.is_some() {
			self.cache_enabled = other.cache_enabled;
		}
		if other.cache_max_subjects.is_some() {
			self.cache_max_subjects = other.cache_max_subjects;
		}
		if other.default_locale.is_some() {
			self.default_locale = other.default_locale;
		}
	}

	pub fn finalize(self) -> AuthorisationConfig {
		let defaults = AuthorisationConfig::default();
		AuthorisationConfig {
			cache_enabled: self.cache_enabled.unwrap_or(defaults.cache_enabled),
			cache_max_subjects: self
				.cache_max_subjects
				.unwrap_or(defaults.cache_max_subjects),
			default_locale: self.default_locale.unwrap_or(defaults.default_locale),
		}
	}
}
