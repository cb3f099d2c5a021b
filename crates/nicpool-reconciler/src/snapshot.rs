//! Pool snapshots — the attached/unattached partition.
//!
//! A `PoolSnapshot` is an immutable value produced by one pure read of
//! the provider: all pool-tagged interfaces plus all running
//! pool-tagged instances, keyed by id. Reconciliation logic computes
//! the partition from this value and never mutates it; a later pass
//! loads a fresh snapshot instead.

use std::collections::{BTreeMap, BTreeSet};

use nicpool_provider::{Instance, NetworkInterface, POOL_TAG, ProviderGateway};

use crate::error::ReconcileResult;

/// Instances and interfaces of one pool, captured at one reconciliation
/// pass.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pool: String,
    instances: BTreeMap<String, Instance>,
    interfaces: BTreeMap<String, NetworkInterface>,
}

impl PoolSnapshot {
    /// Read the pool's current state from the provider.
    ///
    /// An empty pool (no instances, no interfaces) is a valid snapshot.
    pub async fn load<P: ProviderGateway>(provider: &P, pool: &str) -> ReconcileResult<Self> {
        let interfaces = provider
            .list_interfaces_by_tag(POOL_TAG, pool, None)
            .await?;
        let instances = provider
            .list_running_instances_by_tag(POOL_TAG, pool)
            .await?;
        Ok(Self {
            pool: pool.to_string(),
            instances: instances.into_iter().map(|i| (i.id.clone(), i)).collect(),
            interfaces: interfaces
                .into_iter()
                .map(|n| (n.id.clone(), n))
                .collect(),
        })
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn instances(&self) -> &BTreeMap<String, Instance> {
        &self.instances
    }

    pub fn interfaces(&self) -> &BTreeMap<String, NetworkInterface> {
        &self.interfaces
    }

    /// Ids of loaded instances holding at least one loaded interface.
    ///
    /// Set semantics: an instance holding several pool interfaces is
    /// counted once.
    pub fn attached_ids(&self) -> BTreeSet<&str> {
        self.interfaces
            .values()
            .filter_map(NetworkInterface::attached_instance_id)
            .filter(|id| self.instances.contains_key(*id))
            .collect()
    }

    /// Whether the given instance holds at least one loaded interface.
    pub fn is_attached(&self, instance_id: &str) -> bool {
        self.interfaces
            .values()
            .any(|n| n.attached_instance_id() == Some(instance_id))
    }

    /// Loaded instances holding at least one loaded interface.
    pub fn attached_instances(&self) -> Vec<&Instance> {
        let attached = self.attached_ids();
        self.instances
            .values()
            .filter(|i| attached.contains(i.id.as_str()))
            .collect()
    }

    /// Loaded instances holding no loaded interface. Iteration order is
    /// not part of the contract.
    pub fn unattached_instances(&self) -> Vec<&Instance> {
        let attached = self.attached_ids();
        self.instances
            .values()
            .filter(|i| !attached.contains(i.id.as_str()))
            .collect()
    }

    /// Loaded interfaces whose attachment targets the given instance.
    pub fn interfaces_attached_to(&self, instance_id: &str) -> Vec<&NetworkInterface> {
        self.interfaces
            .values()
            .filter(|n| n.attached_instance_id() == Some(instance_id))
            .collect()
    }
}
