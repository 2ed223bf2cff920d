// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Internationalization (i18n) support for Tessera.
//!
//! Server-side strings are looked up by hierarchical dot-notation keys in a
//! catalog compiled into the binary.
//!
//! # String Naming Convention
//!
//! - `server.auth.` for authorization failures (forbidden operations, escalation)
//! - `server.tags.` for tag bookkeeping errors
//!
//! Example: `server.auth.forbidden.service`
//!
//! # Example
//!
//! ```
//! use tessera_common_i18n::{resolve_locale, t, t_fmt};
//!
//! let message = t("es", "server.auth.forbidden.service");
//! assert!(!message.is_empty());
//!
//! let message = t_fmt("en", "server.auth.forbidden.service_path", &[("path", "tags")]);
//! assert!(message.contains("tags"));
//!
//! let locale = resolve_locale(Some("es"), "en");
//! assert_eq!(locale, "es");
//! ```

mod catalog;
mod locale;
mod resolve;

pub use catalog::{has_key, t, t_fmt};
pub use locale::{available_locales, is_supported, locale_info, LocaleInfo};
pub use resolve::resolve_locale;

pub use locale::{DEFAULT_LOCALE, LOCALES};
