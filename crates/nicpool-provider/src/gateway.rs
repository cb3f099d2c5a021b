//! The provider gateway contract.
//!
//! This trait is the full extent of what the reconciliation core needs
//! from the cloud API. Implementations own pagination, credentials, and
//! retries below this line; the core is generic over the trait and
//! treats every call as a single logical operation.

use crate::error::ProviderResult;
use crate::types::{Instance, NetworkInterface};

/// Describe, list, attach, and detach operations against the resource
/// graph. Listing operations paginate internally and return complete
/// result sets.
#[allow(async_fn_in_trait)]
pub trait ProviderGateway: Send + Sync {
    /// Look up a single instance. `Err(NotFound)` when it no longer
    /// exists (terminated instances eventually disappear entirely).
    async fn describe_instance(&self, id: &str) -> ProviderResult<Instance>;

    /// All *running* instances carrying the given tag.
    async fn list_running_instances_by_tag(
        &self,
        key: &str,
        value: &str,
    ) -> ProviderResult<Vec<Instance>>;

    /// All interfaces carrying the given tag, optionally scoped to one
    /// subnet. Listing order is the provider's and is what attachment
    /// candidate selection ties on.
    async fn list_interfaces_by_tag(
        &self,
        key: &str,
        value: &str,
        subnet_id: Option<&str>,
    ) -> ProviderResult<Vec<NetworkInterface>>;

    /// Bind an interface to an instance at the given device index.
    async fn attach_interface(
        &self,
        instance_id: &str,
        interface_id: &str,
        device_index: u32,
    ) -> ProviderResult<()>;

    /// Release an attachment by its attachment id (not the interface id).
    async fn detach_interface(&self, attachment_id: &str) -> ProviderResult<()>;

    /// Current view of a single interface. `Err(NotFound)` when it no
    /// longer exists.
    async fn describe_interface(&self, id: &str) -> ProviderResult<NetworkInterface>;

    /// Every distinct value of the given tag key across taggable
    /// resources. Drives pool discovery for timer sweeps.
    async fn list_distinct_tag_values(&self, key: &str) -> ProviderResult<Vec<String>>;
}
