// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tessera server: authorised document services.
//!
//! [`App`] owns the ability engine, the abilities cache and the registry of
//! services, and runs every call through access enforcement before it
//! reaches a service.

pub mod app;
pub mod endpoints;
pub mod registry;
pub mod telemetry;

pub use app::App;
pub use endpoints::{AuthorisationsEndpoint, TagsEndpoint};
pub use registry::{Registration, ServiceRegistry};
pub use tessera_server_config::ServerConfig;
