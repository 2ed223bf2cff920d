// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Locale resolution logic.

use crate::locale::{locale_info, DEFAULT_LOCALE};

/// Resolve the effective locale from user preference and server default.
///
/// Resolution order (highest to lowest priority):
/// 1. User's stored locale preference (if valid)
/// 2. Server default locale (if valid)
/// 3. Fallback to English ("en")
///
/// # Example
///
/// ```
/// use tessera_common_i18n::resolve_locale;
///
/// assert_eq!(resolve_locale(Some("es"), "en"), "es");
/// assert_eq!(resolve_locale(None, "es"), "es");
/// assert_eq!(resolve_locale(Some("invalid"), "also_invalid"), "en");
/// ```
pub fn resolve_locale(user_locale: Option<&str>, server_default: &str) -> &'static str {
	user_locale
		.and_then(locale_info)
		.or_else(|| locale_info(server_default))
		.map(|info| info.code)
		.unwrap_or(DEFAULT_LOCALE)
}
