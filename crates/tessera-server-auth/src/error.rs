// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for authorisation and the document services it guards.

use tessera_common_i18n::t_fmt;
use thiserror::Error;

use crate::types::DocumentId;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Translation key plus the values substituted into its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
	pub key: &'static str,
	pub params: Vec<(&'static str, String)>,
}

impl Translation {
	pub fn new(key: &'static str) -> Self {
		Self {
			key,
			params: Vec::new(),
		}
	}

	pub fn with(mut self, name: &'static str, value: impl ToString) -> Self {
		self.params.push((name, value.to_string()));
		self
	}

	pub fn render(&self, locale: &str) -> String {
		let args: Vec<(&str, &str)> = self
			.params
			.iter()
			.map(|(name, value)| (*name, value.as_str()))
			.collect();
		t_fmt(locale, self.key, &args)
	}
}

/// A subject whose write failed inside a grant or revoke batch.
#[derive(Debug)]
pub struct SubjectFailure {
	pub subject_id: Option<DocumentId>,
	pub error: AuthError,
}

#[derive(Debug, Error)]
pub enum AuthError {
	#[error("{message}")]
	Forbidden {
		message: String,
		translation: Translation,
	},

	#[error("{message}")]
	BadRequest {
		message: String,
		translation: Translation,
	},

	#[error("not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("store error: {0}")]
	Store(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("{} of {total} subject updates failed", .failures.len())]
	Batch {
		total: usize,
		succeeded: Vec<DocumentId>,
		failures: Vec<SubjectFailure>,
	},
}

impl AuthError {
	/// Forbidden error whose message is the English rendering of `translation`.
	pub fn forbidden(translation: Translation) -> Self {
		AuthError::Forbidden {
			message: translation.render(tessera_common_i18n::DEFAULT_LOCALE),
			translation,
		}
	}

	pub fn bad_request(translation: Translation) -> Self {
		AuthError::BadRequest {
			message: translation.render(tessera_common_i18n::DEFAULT_LOCALE),
			translation,
		}
	}

	pub fn missing_field(field: &str) -> Self {
		Self::bad_request(
			Translation::new("server.auth.bad_request.missing_field").with("field", field),
		)
	}

	/// Error class name as exposed to clients.
	pub fn name(&self) -> &'static str {
		match self {
			AuthError::Forbidden { .. } => "Forbidden",
			AuthError::BadRequest { .. } => "BadRequest",
			AuthError::NotFound(_) => "NotFound",
			AuthError::Conflict(_) => "Conflict",
			AuthError::Store(_) | AuthError::Serialization(_) | AuthError::Batch { .. } => {
				"GeneralError"
			}
		}
	}

	pub fn status_code(&self) -> u16 {
		match self {
			AuthError::Forbidden { .. } => 403,
			AuthError::BadRequest { .. } => 400,
			AuthError::NotFound(_) => 404,
			AuthError::Conflict(_) => 409,
			AuthError::Store(_) | AuthError::Serialization(_) | AuthError::Batch { .. } => 500,
		}
	}

	pub fn translation_key(&self) -> Option<&'static str> {
		match self {
			AuthError::Forbidden { translation, .. } | AuthError::BadRequest { translation, .. } => {
				Some(translation.key)
			}
			_ => None,
		}
	}

	/// Message rendered in `locale`; untranslated errors keep their display text.
	pub fn localized_message(&self, locale: &str) -> String {
		match self {
			AuthError::Forbidden { translation, .. } | AuthError::BadRequest { translation, .. } => {
				translation.render(locale)
			}
			other => other.to_string(),
		}
	}

	pub fn is_forbidden(&self) -> bool {
		matches!(self, AuthError::Forbidden { .. })
	}

	pub fn is_bad_request(&self) -> bool {
		matches!(self, AuthError::BadRequest { .. })
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, AuthError::NotFound(_))
	}
}
