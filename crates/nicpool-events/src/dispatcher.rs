//! The dispatcher — classification to reconciliation action.
//!
//! One `handle` call performs at most one reconciliation: a targeted
//! attach for a freshly running instance, a detach-plus-sweep for a
//! removed one, or a sweep of every known pool on a timer tick.
//! Failures never propagate to the invoker; they are logged and left
//! for the next pass.

use std::sync::Arc;

use tracing::{debug, error, info};

use nicpool_provider::{Instance, POOL_TAG, ProviderError, ProviderGateway};
use nicpool_reconciler::{PoolReconciler, PoolSnapshot, WaitConfig};

use crate::event::{EventClass, Notification, classify};

/// Entry point for all notifications.
pub struct Dispatcher<P> {
    provider: Arc<P>,
    wait: WaitConfig,
}

impl<P: ProviderGateway> Dispatcher<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            wait: WaitConfig::default(),
        }
    }

    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// Classify and dispatch one notification.
    ///
    /// Idempotent: replaying the same notification cannot corrupt pool
    /// state, because every action re-reads ground truth first.
    pub async fn handle(&self, event: &Notification) {
        match classify(event) {
            EventClass::LifecycleRunning { instance_id } => self.on_running(&instance_id).await,
            EventClass::LifecycleRemoved { instance_id, state } => {
                self.on_removed(&instance_id, &state).await
            }
            EventClass::LifecycleOther { state } => {
                debug!(state = ?state, "ignoring lifecycle state change");
            }
            EventClass::Timer => self.on_timer().await,
            EventClass::Unrecognized => {
                error!(
                    source = %event.source,
                    detail_type = %event.detail_type,
                    "ignoring unrecognized notification"
                );
            }
        }
    }

    fn reconciler(&self, pool: &str) -> PoolReconciler<P> {
        PoolReconciler::new(self.provider.clone(), pool).with_wait_config(self.wait.clone())
    }

    /// Resolve an instance, or explain why no action will be taken.
    async fn resolve_instance(&self, instance_id: &str) -> Option<Instance> {
        match self.provider.describe_instance(instance_id).await {
            Ok(instance) => Some(instance),
            Err(ProviderError::NotFound(_)) => {
                debug!(instance = instance_id, "instance not found, nothing to reconcile");
                None
            }
            Err(e) => {
                error!(instance = instance_id, error = %e, "failed to describe instance");
                None
            }
        }
    }

    async fn on_running(&self, instance_id: &str) {
        let Some(instance) = self.resolve_instance(instance_id).await else {
            return;
        };
        let Some(pool) = instance.pool_name() else {
            debug!(instance = instance_id, "ignoring instance without a pool tag");
            return;
        };
        let pool = pool.to_string();

        // Replay safety: an instance that already holds a pool interface
        // needs no second attach.
        let snapshot = match PoolSnapshot::load(self.provider.as_ref(), &pool).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(pool = %pool, error = %e, "failed to load pool snapshot");
                return;
            }
        };
        if snapshot.is_attached(instance_id) {
            debug!(
                pool = %pool,
                instance = instance_id,
                "instance already holds a pool interface"
            );
            return;
        }

        if let Err(e) = self.reconciler(&pool).attach_one(&instance).await {
            error!(
                pool = %pool,
                instance = instance_id,
                error = %e,
                "failed to attach interface"
            );
        }
    }

    async fn on_removed(&self, instance_id: &str, state: &str) {
        let Some(instance) = self.resolve_instance(instance_id).await else {
            return;
        };
        let Some(pool) = instance.pool_name() else {
            debug!(instance = instance_id, "ignoring instance without a pool tag");
            return;
        };

        info!(
            pool = %pool,
            instance = instance_id,
            state,
            "instance left the running state, freeing its interfaces"
        );
        let reconciler = self.reconciler(pool);
        if let Err(e) = reconciler.detach_all(instance_id).await {
            error!(pool = %pool, instance = instance_id, error = %e, "detach failed");
        }
        // The freed interfaces may unblock instances the pool could not
        // serve earlier, so backfill the whole pool right away.
        match reconciler.attach_sweep().await {
            Ok(attached) if attached > 0 => {
                info!(pool = %pool, attached, "backfilled pool after removal");
            }
            Ok(_) => {}
            Err(e) => error!(pool = %pool, error = %e, "backfill sweep failed"),
        }
    }

    async fn on_timer(&self) {
        let pools = match self.provider.list_distinct_tag_values(POOL_TAG).await {
            Ok(pools) => pools,
            Err(e) => {
                error!(error = %e, "failed to enumerate pools");
                return;
            }
        };
        debug!(pools = pools.len(), "timer sweep");
        for pool in pools {
            match self.reconciler(&pool).attach_sweep().await {
                Ok(attached) if attached > 0 => {
                    info!(pool = %pool, attached, "sweep attached interfaces");
                }
                Ok(_) => {}
                Err(e) => error!(pool = %pool, error = %e, "pool sweep failed"),
            }
        }
    }
}
