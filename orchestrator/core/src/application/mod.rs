// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Layer
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Resource lifecycle use cases over the tenant workspace
//!
//! Each service acquires the tenant lock, checks uniqueness, writes records,
//! renders the workspace and starts one automation run whose outcome a
//! settlement task applies back to the record store.

pub mod locks;
pub mod provisioning;

pub mod app;
pub mod database;
pub mod server;
pub mod system_user;

// Re-export use cases for convenience
pub use app::{AppService, CreateApp, StandardAppService};
pub use database::{CreateDatabase, DatabaseService, StandardDatabaseService};
pub use locks::TenantLocks;
pub use provisioning::{ProvisioningContext, ProvisioningError, ProvisioningTicket};
pub use server::{ConnectServer, ServerService, StandardServerService};
pub use system_user::{CreateSystemUser, StandardSystemUserService, SystemUserService};
