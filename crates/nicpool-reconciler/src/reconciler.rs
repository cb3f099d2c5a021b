//! Attach/detach operations and the wait-for-status protocol.
//!
//! `PoolReconciler` drives the two mutations this system performs:
//! binding one available interface to one instance, and freeing every
//! pool interface an instance holds. Both confirm the terminal status
//! by polling the provider with a bounded number of status reads.
//!
//! Failures are per-resource: a sweep logs and skips the instance or
//! interface that failed and keeps going. Recovery is the next pass.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use nicpool_provider::{
    Instance, InterfaceStatus, NetworkInterface, POOL_TAG, ProviderError, ProviderGateway,
};

use crate::error::{ReconcileError, ReconcileResult};
use crate::snapshot::PoolSnapshot;

/// Polling parameters for the wait-for-status protocol.
///
/// The wait loop is the dominant latency source of the whole system:
/// it couples correctness (confirming state) to wall-clock polling.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Pause between status polls.
    pub interval: Duration,
    /// Polls before giving up with `WaitTimeout`.
    pub max_attempts: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
        }
    }
}

/// Reconciliation operations for one pool.
///
/// Holds no snapshot state: every operation starts by re-reading
/// ground truth through the gateway.
pub struct PoolReconciler<P> {
    provider: Arc<P>,
    pool: String,
    wait: WaitConfig,
}

impl<P: ProviderGateway> PoolReconciler<P> {
    pub fn new(provider: Arc<P>, pool: &str) -> Self {
        Self {
            provider,
            pool: pool.to_string(),
            wait: WaitConfig::default(),
        }
    }

    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Attach exactly one available pool interface to the instance and
    /// confirm it reaches `in-use`.
    ///
    /// Candidates are the pool interfaces in the instance's subnet that
    /// are currently available; the first in the provider's listing
    /// order wins. No candidate is a `NoCapacity` error, resolved only
    /// by a later pass once capacity frees up. At most one attach call
    /// is issued per invocation.
    pub async fn attach_one(&self, instance: &Instance) -> ReconcileResult<()> {
        let Some(subnet) = instance.subnet_id.as_deref() else {
            return Err(ReconcileError::NoSubnet(instance.id.clone()));
        };

        let candidates = self
            .provider
            .list_interfaces_by_tag(POOL_TAG, &self.pool, Some(subnet))
            .await?;
        let Some(interface) = candidates.iter().find(|n| n.is_available()) else {
            return Err(ReconcileError::NoCapacity {
                pool: self.pool.clone(),
                subnet: subnet.to_string(),
            });
        };

        // Append after the interfaces already on the instance.
        let device_index = instance.interface_count;
        info!(
            pool = %self.pool,
            instance = %instance.id,
            interface = %interface.id,
            device_index,
            "attaching interface"
        );
        self.provider
            .attach_interface(&instance.id, &interface.id, device_index)
            .await?;
        self.wait_for_status(interface, InterfaceStatus::InUse).await
    }

    /// Attach an interface to every unattached instance in the pool.
    ///
    /// Instances are processed sequentially; a failure on one is logged
    /// and does not abort the rest. Returns the number of confirmed
    /// attachments.
    pub async fn attach_sweep(&self) -> ReconcileResult<u32> {
        let snapshot = PoolSnapshot::load(self.provider.as_ref(), &self.pool).await?;
        let unattached = snapshot.unattached_instances();
        if unattached.is_empty() {
            debug!(
                pool = %self.pool,
                instances = snapshot.instances().len(),
                "every pool instance already holds an interface"
            );
            return Ok(0);
        }

        let mut attached = 0;
        for instance in unattached {
            match self.attach_one(instance).await {
                Ok(()) => attached += 1,
                Err(e) => {
                    error!(
                        pool = %self.pool,
                        instance = %instance.id,
                        error = %e,
                        "failed to attach interface"
                    );
                }
            }
        }
        Ok(attached)
    }

    /// Detach every pool interface currently bound to the instance and
    /// confirm each returns to `available`.
    ///
    /// Best-effort over the full set: a failure on one interface is
    /// logged and the rest are still attempted. No attached interfaces
    /// is a no-op. Returns the number of confirmed detachments.
    pub async fn detach_all(&self, instance_id: &str) -> ReconcileResult<u32> {
        let snapshot = PoolSnapshot::load(self.provider.as_ref(), &self.pool).await?;
        let attached = snapshot.interfaces_attached_to(instance_id);
        if attached.is_empty() {
            debug!(
                pool = %self.pool,
                instance = instance_id,
                "no pool interfaces to detach"
            );
            return Ok(0);
        }

        let mut detached = 0;
        for interface in attached {
            let Some(attachment) = interface.attachment.as_ref() else {
                continue;
            };
            info!(
                pool = %self.pool,
                instance = instance_id,
                interface = %interface.id,
                "detaching interface"
            );
            if let Err(e) = self.provider.detach_interface(&attachment.id).await {
                error!(
                    pool = %self.pool,
                    interface = %interface.id,
                    error = %e,
                    "failed to detach interface"
                );
                continue;
            }
            match self
                .wait_for_status(interface, InterfaceStatus::Available)
                .await
            {
                Ok(()) => detached += 1,
                Err(e) => {
                    error!(
                        pool = %self.pool,
                        interface = %interface.id,
                        error = %e,
                        "interface did not return to available"
                    );
                }
            }
        }
        Ok(detached)
    }

    /// Poll until the interface's status equals `target`.
    ///
    /// Starts from the last-known status, so an interface already at
    /// the target returns without a single provider call. Bounded by
    /// `WaitConfig::max_attempts`; exhaustion is a `WaitTimeout`, an
    /// interface that disappears mid-wait is `InterfaceGone`.
    pub async fn wait_for_status(
        &self,
        interface: &NetworkInterface,
        target: InterfaceStatus,
    ) -> ReconcileResult<()> {
        let mut status = interface.status.clone();
        let mut attempts = 0;
        while status != target {
            if attempts >= self.wait.max_attempts {
                return Err(ReconcileError::WaitTimeout {
                    interface: interface.id.clone(),
                    target,
                });
            }
            attempts += 1;
            debug!(
                interface = %interface.id,
                current = %status,
                target = %target,
                attempt = attempts,
                "waiting for interface status"
            );
            tokio::time::sleep(self.wait.interval).await;
            status = match self.provider.describe_interface(&interface.id).await {
                Ok(current) => current.status,
                Err(ProviderError::NotFound(_)) => {
                    return Err(ReconcileError::InterfaceGone(interface.id.clone()));
                }
                Err(e) => return Err(e.into()),
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nicpool_provider::MemoryProvider;
    use std::collections::BTreeMap;

    fn fast_wait() -> WaitConfig {
        WaitConfig {
            interval: Duration::from_millis(1),
            max_attempts: 5,
        }
    }

    fn instance(id: &str, pool: &str, subnet: &str) -> Instance {
        Instance {
            id: id.to_string(),
            subnet_id: Some(subnet.to_string()),
            tags: BTreeMap::from([(POOL_TAG.to_string(), pool.to_string())]),
            interface_count: 1,
        }
    }

    fn interface(id: &str, pool: &str, subnet: &str) -> NetworkInterface {
        NetworkInterface {
            id: id.to_string(),
            status: InterfaceStatus::Available,
            subnet_id: Some(subnet.to_string()),
            tags: BTreeMap::from([(POOL_TAG.to_string(), pool.to_string())]),
            attachment: None,
        }
    }

    fn reconciler(provider: &Arc<MemoryProvider>, pool: &str) -> PoolReconciler<MemoryProvider> {
        PoolReconciler::new(provider.clone(), pool).with_wait_config(fast_wait())
    }

    #[tokio::test]
    async fn attach_one_picks_subnet_matching_interface() {
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_instance(instance("i-1", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-b", "bastion", "subnet-b")).await;
        provider.insert_interface(interface("eni-a", "bastion", "subnet-a")).await;

        reconciler(&provider, "bastion")
            .attach_one(&instance("i-1", "bastion", "subnet-a"))
            .await
            .unwrap();

        let eni = provider.describe_interface("eni-a").await.unwrap();
        assert_eq!(eni.attached_instance_id(), Some("i-1"));
        let other = provider.describe_interface("eni-b").await.unwrap();
        assert!(other.is_available());
    }

    #[tokio::test]
    async fn attach_one_appends_at_current_interface_count() {
        let provider = Arc::new(MemoryProvider::new());
        let mut i = instance("i-1", "bastion", "subnet-a");
        i.interface_count = 3;
        provider.insert_instance(i.clone()).await;
        provider.insert_interface(interface("eni-1", "bastion", "subnet-a")).await;

        reconciler(&provider, "bastion").attach_one(&i).await.unwrap();

        let eni = provider.describe_interface("eni-1").await.unwrap();
        assert_eq!(eni.attachment.unwrap().device_index, 3);
    }

    #[tokio::test]
    async fn no_capacity_mutates_nothing() {
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_instance(instance("i-1", "bastion", "subnet-a")).await;
        // Only interface is in the wrong subnet.
        provider.insert_interface(interface("eni-b", "bastion", "subnet-b")).await;

        let err = reconciler(&provider, "bastion")
            .attach_one(&instance("i-1", "bastion", "subnet-a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::NoCapacity { .. }));
        assert_eq!(provider.attach_calls().await, 0);

        let snapshot = PoolSnapshot::load(provider.as_ref(), "bastion").await.unwrap();
        assert_eq!(snapshot.unattached_instances().len(), 1);
    }

    #[tokio::test]
    async fn attach_one_without_subnet_is_rejected() {
        let provider = Arc::new(MemoryProvider::new());
        let mut i = instance("i-1", "bastion", "subnet-a");
        i.subnet_id = None;
        provider.insert_instance(i.clone()).await;
        provider.insert_interface(interface("eni-1", "bastion", "subnet-a")).await;

        let err = reconciler(&provider, "bastion").attach_one(&i).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NoSubnet(_)));
        assert_eq!(provider.attach_calls().await, 0);
    }

    #[tokio::test]
    async fn attach_one_issues_a_single_attach_call() {
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_instance(instance("i-1", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-1", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-2", "bastion", "subnet-a")).await;

        reconciler(&provider, "bastion")
            .attach_one(&instance("i-1", "bastion", "subnet-a"))
            .await
            .unwrap();
        assert_eq!(provider.attach_calls().await, 1);
    }

    #[tokio::test]
    async fn attach_sweep_covers_every_unattached_instance() {
        let provider = Arc::new(MemoryProvider::new());
        for n in 1..=3 {
            provider
                .insert_instance(instance(&format!("i-{n}"), "bastion", "subnet-a"))
                .await;
            provider
                .insert_interface(interface(&format!("eni-{n}"), "bastion", "subnet-a"))
                .await;
        }

        let attached = reconciler(&provider, "bastion").attach_sweep().await.unwrap();
        assert_eq!(attached, 3);

        let snapshot = PoolSnapshot::load(provider.as_ref(), "bastion").await.unwrap();
        assert!(snapshot.unattached_instances().is_empty());
        assert!(snapshot.interfaces().values().all(|n| !n.is_available()));
    }

    #[tokio::test]
    async fn attach_sweep_continues_past_starved_instances() {
        // Two instances, one interface: the sweep attaches what it can.
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_instance(instance("i-1", "bastion", "subnet-a")).await;
        provider.insert_instance(instance("i-2", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-1", "bastion", "subnet-a")).await;

        let attached = reconciler(&provider, "bastion").attach_sweep().await.unwrap();
        assert_eq!(attached, 1);

        let snapshot = PoolSnapshot::load(provider.as_ref(), "bastion").await.unwrap();
        assert_eq!(snapshot.unattached_instances().len(), 1);
    }

    #[tokio::test]
    async fn attach_sweep_on_settled_pool_is_a_noop() {
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_instance(instance("i-1", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-1", "bastion", "subnet-a")).await;

        let r = reconciler(&provider, "bastion");
        assert_eq!(r.attach_sweep().await.unwrap(), 1);
        assert_eq!(r.attach_sweep().await.unwrap(), 0);
        assert_eq!(provider.attach_calls().await, 1);
    }

    #[tokio::test]
    async fn detach_all_frees_every_held_interface() {
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_instance(instance("i-1", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-1", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-2", "bastion", "subnet-a")).await;
        provider.attach_interface("i-1", "eni-1", 1).await.unwrap();
        provider.attach_interface("i-1", "eni-2", 2).await.unwrap();

        let detached = reconciler(&provider, "bastion").detach_all("i-1").await.unwrap();
        assert_eq!(detached, 2);

        let snapshot = PoolSnapshot::load(provider.as_ref(), "bastion").await.unwrap();
        assert!(snapshot.interfaces().values().all(|n| n.is_available()));
    }

    #[tokio::test]
    async fn detach_all_with_nothing_attached_is_a_noop() {
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_instance(instance("i-1", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-1", "bastion", "subnet-a")).await;

        let detached = reconciler(&provider, "bastion").detach_all("i-1").await.unwrap();
        assert_eq!(detached, 0);
        assert_eq!(provider.detach_calls().await, 0);
    }

    #[tokio::test]
    async fn wait_rides_out_transitional_statuses() {
        let provider = Arc::new(MemoryProvider::new().with_settle_polls(3));
        provider.insert_instance(instance("i-1", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-1", "bastion", "subnet-a")).await;

        reconciler(&provider, "bastion")
            .attach_one(&instance("i-1", "bastion", "subnet-a"))
            .await
            .unwrap();

        let eni = provider.describe_interface("eni-1").await.unwrap();
        assert_eq!(eni.status, InterfaceStatus::InUse);
    }

    #[tokio::test]
    async fn wait_times_out_distinctly_from_gone() {
        let provider = Arc::new(MemoryProvider::new().with_settle_polls(100));
        provider.insert_instance(instance("i-1", "bastion", "subnet-a")).await;
        provider.insert_interface(interface("eni-1", "bastion", "subnet-a")).await;

        let err = reconciler(&provider, "bastion")
            .attach_one(&instance("i-1", "bastion", "subnet-a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::WaitTimeout { .. }));
    }

    #[tokio::test]
    async fn wait_reports_vanished_interface_as_gone() {
        let provider = Arc::new(MemoryProvider::new());
        let eni = interface("eni-1", "bastion", "subnet-a");
        let r = reconciler(&provider, "bastion");
        // Interface never inserted: first poll sees NotFound.
        let err = r
            .wait_for_status(&eni, InterfaceStatus::InUse)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InterfaceGone(_)));
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_at_target() {
        let provider = Arc::new(MemoryProvider::new());
        let eni = interface("eni-1", "bastion", "subnet-a");
        // Not inserted into the provider: success proves no poll happened.
        reconciler(&provider, "bastion")
            .wait_for_status(&eni, InterfaceStatus::Available)
            .await
            .unwrap();
    }
}
