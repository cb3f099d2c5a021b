//! In-memory provider gateway.
//!
//! Implements the full `ProviderGateway` contract over `RwLock` state.
//! Backs the test suites and the daemon's state-file mode, where the
//! resource graph is loaded from and persisted to a JSON document.
//!
//! A configurable settle delay makes mutated interfaces report a
//! transitional status for a number of describe calls before reaching
//! their terminal status, so the wait-for-status protocol is exercised
//! the same way an eventually-consistent provider would.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::gateway::ProviderGateway;
use crate::types::{Attachment, Instance, InterfaceStatus, NetworkInterface};

/// An instance plus the provider-side running flag.
///
/// Lifecycle state is not part of the `Instance` snapshot type; the
/// provider tracks it to answer running-only listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    #[serde(flatten)]
    pub instance: Instance,
    #[serde(default = "default_running")]
    pub running: bool,
}

fn default_running() -> bool {
    true
}

/// Serializable view of the whole resource graph. The daemon persists
/// this as its JSON state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolFixture {
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Default)]
struct MemoryState {
    instances: BTreeMap<String, InstanceRecord>,
    interfaces: BTreeMap<String, NetworkInterface>,
    /// Interfaces still settling: id → (describe calls left, terminal status).
    settling: BTreeMap<String, (u32, InterfaceStatus)>,
    attach_calls: u32,
    detach_calls: u32,
    next_attachment: u64,
}

/// In-memory `ProviderGateway` implementation.
pub struct MemoryProvider {
    state: RwLock<MemoryState>,
    /// Describe calls a mutated interface spends in a transitional
    /// status before reaching its terminal status. 0 = settle instantly.
    settle_polls: u32,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            settle_polls: 0,
        }
    }

    /// Delay status transitions by `polls` describe calls.
    pub fn with_settle_polls(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    /// Build a provider from a fixture document.
    pub fn from_fixture(fixture: PoolFixture) -> Self {
        let mut state = MemoryState::default();
        for record in fixture.instances {
            state.instances.insert(record.instance.id.clone(), record);
        }
        for interface in fixture.interfaces {
            state.interfaces.insert(interface.id.clone(), interface);
        }
        Self {
            state: RwLock::new(state),
            settle_polls: 0,
        }
    }

    /// Export the current resource graph as a fixture document.
    pub async fn fixture(&self) -> PoolFixture {
        let state = self.state.read().await;
        PoolFixture {
            instances: state.instances.values().cloned().collect(),
            interfaces: state.interfaces.values().cloned().collect(),
        }
    }

    /// Register a running instance.
    pub async fn insert_instance(&self, instance: Instance) {
        let mut state = self.state.write().await;
        state.instances.insert(
            instance.id.clone(),
            InstanceRecord {
                instance,
                running: true,
            },
        );
    }

    pub async fn insert_interface(&self, interface: NetworkInterface) {
        let mut state = self.state.write().await;
        state.interfaces.insert(interface.id.clone(), interface);
    }

    /// Flip an instance's running flag. Non-running instances drop out
    /// of running listings but remain describable.
    pub async fn set_running(&self, instance_id: &str, running: bool) {
        let mut state = self.state.write().await;
        if let Some(record) = state.instances.get_mut(instance_id) {
            record.running = running;
        }
    }

    /// Remove an instance entirely, as the provider does some time
    /// after termination.
    pub async fn remove_instance(&self, instance_id: &str) {
        let mut state = self.state.write().await;
        state.instances.remove(instance_id);
    }

    /// Number of attach calls issued so far.
    pub async fn attach_calls(&self) -> u32 {
        self.state.read().await.attach_calls
    }

    /// Number of detach calls issued so far.
    pub async fn detach_calls(&self) -> u32 {
        self.state.read().await.detach_calls
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderGateway for MemoryProvider {
    async fn describe_instance(&self, id: &str) -> ProviderResult<Instance> {
        let state = self.state.read().await;
        state
            .instances
            .get(id)
            .map(|r| r.instance.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("instance {id}")))
    }

    async fn list_running_instances_by_tag(
        &self,
        key: &str,
        value: &str,
    ) -> ProviderResult<Vec<Instance>> {
        let state = self.state.read().await;
        Ok(state
            .instances
            .values()
            .filter(|r| r.running && r.instance.tags.get(key).is_some_and(|v| v == value))
            .map(|r| r.instance.clone())
            .collect())
    }

    async fn list_interfaces_by_tag(
        &self,
        key: &str,
        value: &str,
        subnet_id: Option<&str>,
    ) -> ProviderResult<Vec<NetworkInterface>> {
        let state = self.state.read().await;
        Ok(state
            .interfaces
            .values()
            .filter(|n| n.tags.get(key).is_some_and(|v| v == value))
            .filter(|n| subnet_id.is_none() || n.subnet_id.as_deref() == subnet_id)
            .cloned()
            .collect())
    }

    async fn attach_interface(
        &self,
        instance_id: &str,
        interface_id: &str,
        device_index: u32,
    ) -> ProviderResult<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.attach_calls += 1;

        if !state.instances.contains_key(instance_id) {
            return Err(ProviderError::NotFound(format!("instance {instance_id}")));
        }
        let index_taken = state.interfaces.values().any(|n| {
            n.attachment
                .as_ref()
                .is_some_and(|a| a.instance_id == instance_id && a.device_index == device_index)
        });
        if index_taken {
            return Err(ProviderError::Conflict(format!(
                "device index {device_index} already in use on {instance_id}"
            )));
        }

        let attachment_id = {
            state.next_attachment += 1;
            format!("attach-{:04}", state.next_attachment)
        };
        let settle = self.settle_polls;
        let interface = state
            .interfaces
            .get_mut(interface_id)
            .ok_or_else(|| ProviderError::NotFound(format!("interface {interface_id}")))?;
        if !interface.is_available() {
            return Err(ProviderError::Conflict(format!(
                "interface {interface_id} is {}",
                interface.status
            )));
        }

        interface.attachment = Some(Attachment {
            id: attachment_id,
            instance_id: instance_id.to_string(),
            device_index,
        });
        if settle > 0 {
            interface.status = InterfaceStatus::Other("attaching".to_string());
            state
                .settling
                .insert(interface_id.to_string(), (settle, InterfaceStatus::InUse));
        } else {
            interface.status = InterfaceStatus::InUse;
        }
        if let Some(record) = state.instances.get_mut(instance_id) {
            record.instance.interface_count += 1;
        }
        debug!(instance = instance_id, interface = interface_id, device_index, "attached");
        Ok(())
    }

    async fn detach_interface(&self, attachment_id: &str) -> ProviderResult<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.detach_calls += 1;

        let settle = self.settle_polls;
        let mut detached = None;
        for interface in state.interfaces.values_mut() {
            if interface.attachment.as_ref().is_some_and(|a| a.id == attachment_id) {
                let attachment = interface.attachment.take();
                if settle > 0 {
                    interface.status = InterfaceStatus::Other("detaching".to_string());
                    state
                        .settling
                        .insert(interface.id.clone(), (settle, InterfaceStatus::Available));
                } else {
                    interface.status = InterfaceStatus::Available;
                }
                detached = attachment.map(|a| (interface.id.clone(), a.instance_id));
                break;
            }
        }
        let Some((interface_id, instance_id)) = detached else {
            return Err(ProviderError::NotFound(format!("attachment {attachment_id}")));
        };
        if let Some(record) = state.instances.get_mut(&instance_id) {
            record.instance.interface_count = record.instance.interface_count.saturating_sub(1);
        }
        debug!(interface = %interface_id, instance = %instance_id, "detached");
        Ok(())
    }

    async fn describe_interface(&self, id: &str) -> ProviderResult<NetworkInterface> {
        let mut state = self.state.write().await;
        if let Some((left, terminal)) = state.settling.get(id).cloned() {
            if left <= 1 {
                state.settling.remove(id);
                if let Some(interface) = state.interfaces.get_mut(id) {
                    interface.status = terminal;
                }
            } else {
                state.settling.insert(id.to_string(), (left - 1, terminal));
            }
        }
        state
            .interfaces
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("interface {id}")))
    }

    async fn list_distinct_tag_values(&self, key: &str) -> ProviderResult<Vec<String>> {
        let state = self.state.read().await;
        let values: BTreeSet<String> = state
            .instances
            .values()
            .filter_map(|r| r.instance.tags.get(key).cloned())
            .chain(
                state
                    .interfaces
                    .values()
                    .filter_map(|n| n.tags.get(key).cloned()),
            )
            .collect();
        Ok(values.into_iter().collect())
    }
}
