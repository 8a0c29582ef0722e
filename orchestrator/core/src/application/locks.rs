// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tenant Locks
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Serialize renders and runs within one tenant workspace

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::domain::tenant::TenantId;

/// Per-tenant exclusivity for workspace renders and automation runs.
///
/// Two runs against the same workspace would race on the variable file, so a
/// lifecycle operation holds its tenant's guard from the first workspace write
/// until its run has settled. Different tenants never contend.
#[derive(Clone, Default)]
pub struct TenantLocks {
    locks: Arc<DashMap<TenantId, Arc<Mutex<()>>>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the tenant's workspace
    pub async fn acquire(&self, tenant_id: &TenantId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(tenant_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        debug!(tenant = %tenant_id, "Waiting for tenant lock");
        lock.lock_owned().await
    }

    /// Whether the tenant currently has an operation in flight
    pub fn is_busy(&self, tenant_id: &TenantId) -> bool {
        self.locks
            .get(tenant_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_tenant_is_serialized() {
        let locks = TenantLocks::new();
        let tenant = TenantId::parse("t1").unwrap();

        let guard = locks.acquire(&tenant).await;
        assert!(locks.is_busy(&tenant));

        let waiting = {
            let locks = locks.clone();
            let tenant = tenant.clone();
            tokio::spawn(async move { locks.acquire(&tenant).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        let _second = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_tenants_do_not_contend() {
        let locks = TenantLocks::new();
        let _a = locks.acquire(&TenantId::parse("a").unwrap()).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&TenantId::parse("b").unwrap()),
        )
        .await
        .unwrap();
        assert!(!locks.is_busy(&TenantId::parse("c").unwrap()));
    }
}
