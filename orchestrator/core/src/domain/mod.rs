// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value objects, records and contracts of the provisioning engine. Nothing in
//! this layer touches the filesystem or spawns processes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Tenants, jobs, run events, variable sets, resource records,
//!   automation tags and configuration

pub mod credential;
pub mod events;
pub mod job;
pub mod node_config;
pub mod repository;
pub mod resource;
pub mod tag;
pub mod tenant;
pub mod variables;
