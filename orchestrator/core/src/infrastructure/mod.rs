// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod credentials;
pub mod event_bus;
pub mod renderer;
pub mod repositories;
pub mod supervisor;
pub mod workspace;

pub use event_bus::EventBus;
pub use renderer::{RenderError, RenderParams, VariableRenderer};
pub use repositories::{HttpRecordStore, InMemoryRecordStore};
pub use supervisor::{RunError, RunHandle, RunOptions, RunSupervisor};
pub use workspace::{Workspace, WorkspaceError, WorkspaceManager};
