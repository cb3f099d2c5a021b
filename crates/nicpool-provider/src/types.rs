//! Resource snapshot types.
//!
//! Typed views over raw provider records: identity, tags, attachment
//! linkage, and status. These types carry no behavior beyond accessors;
//! all mutation goes through the provider gateway.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag key marking pool membership on both instances and interfaces.
pub const POOL_TAG: &str = "network-interface-manager-pool";

/// A compute instance as reported by the provider.
///
/// Lifecycle state (running / stopping / terminated) is carried in
/// notifications, not stored here; listings are already filtered to
/// running instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    /// Subnet of the instance's primary interface. Pool interfaces are
    /// only attachable within the same subnet.
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Number of interfaces currently on the instance. The next
    /// attachment appends at this device index.
    #[serde(default)]
    pub interface_count: u32,
}

impl Instance {
    /// Pool this instance belongs to, if it carries the pool tag.
    pub fn pool_name(&self) -> Option<&str> {
        self.tags.get(POOL_TAG).map(String::as_str)
    }
}

/// Status of a network interface.
///
/// The provider reports transitional values ("attaching", "detaching")
/// while an attachment settles; those are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceStatus {
    Available,
    InUse,
    Other(String),
}

impl InterfaceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "available",
            Self::InUse => "in-use",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for InterfaceStatus {
    fn from(s: &str) -> Self {
        match s {
            "available" => Self::Available,
            "in-use" => Self::InUse,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for InterfaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for InterfaceStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InterfaceStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.as_str().into())
    }
}

/// The provider-level binding of one interface to one instance.
///
/// The attachment id is distinct from the interface id and is what
/// detach operations reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub instance_id: String,
    pub device_index: u32,
}

/// A network interface as reported by the provider.
///
/// Interfaces are pre-provisioned externally; this system only cycles
/// their attachment state between `available` and `in-use`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub id: String,
    pub status: InterfaceStatus,
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Present only while the interface is bound to an instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl NetworkInterface {
    /// Pool this interface belongs to, if it carries the pool tag.
    pub fn pool_name(&self) -> Option<&str> {
        self.tags.get(POOL_TAG).map(String::as_str)
    }

    pub fn is_available(&self) -> bool {
        self.status == InterfaceStatus::Available
    }

    /// Instance this interface is bound to, if any.
    pub fn attached_instance_id(&self) -> Option<&str> {
        self.attachment.as_ref().map(|a| a.instance_id.as_str())
    }
}
