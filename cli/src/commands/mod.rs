// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Hostwright CLI

pub mod app;
pub mod config;
pub mod database;
pub mod run;
pub mod server;
pub mod user;

pub use self::app::AppCommand;
pub use self::config::ConfigCommand;
pub use self::database::DatabaseCommand;
pub use self::run::RunCommand;
pub use self::server::ServerCommand;
pub use self::user::UserCommand;
