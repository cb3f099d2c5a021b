//! Notification shape and classification.
//!
//! Notifications arrive as JSON records carrying a source channel, a
//! detail-type, and a detail payload. Classification is a pure function
//! into a disjoint set of reconciliation actions.

use serde::{Deserialize, Serialize};

/// Channel carrying compute lifecycle notifications.
pub const LIFECYCLE_SOURCE: &str = "aws.ec2";
/// Detail-type of an instance state-change notification.
pub const LIFECYCLE_DETAIL_TYPE: &str = "EC2 Instance State-change Notification";
/// Channel carrying scheduled ticks.
pub const TIMER_SOURCE: &str = "aws.events";
/// Detail-type of a scheduled tick.
pub const TIMER_DETAIL_TYPE: &str = "Scheduled Event";

/// Lifecycle states that free an instance's interfaces.
const REMOVED_STATES: [&str; 3] = ["stopping", "shutting-down", "terminated"];

/// An inbound notification. Unknown fields are ignored so richer
/// event-source payloads (account, region, resources) parse cleanly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub source: String,
    #[serde(rename = "detail-type", default)]
    pub detail_type: String,
    #[serde(default)]
    pub detail: Detail,
}

/// Detail payload: populated for lifecycle events, empty for ticks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Detail {
    #[serde(rename = "instance-id", default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Notification {
    /// A scheduled-tick notification, as the timer channel emits it.
    pub fn timer() -> Self {
        Self {
            source: TIMER_SOURCE.to_string(),
            detail_type: TIMER_DETAIL_TYPE.to_string(),
            detail: Detail::default(),
        }
    }
}

/// Disjoint classification of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClass {
    /// An instance entered the running state.
    LifecycleRunning { instance_id: String },
    /// An instance is stopping, shutting down, or terminated.
    LifecycleRemoved { instance_id: String, state: String },
    /// A state change this system does not act on (pending, etc).
    LifecycleOther { state: Option<String> },
    /// A scheduled tick requesting a full sweep of every pool.
    Timer,
    /// Anything else, including malformed lifecycle payloads.
    Unrecognized,
}

/// Classify a notification. Pure; no provider access.
pub fn classify(event: &Notification) -> EventClass {
    if event.source == LIFECYCLE_SOURCE && event.detail_type == LIFECYCLE_DETAIL_TYPE {
        let Some(instance_id) = event.detail.instance_id.clone() else {
            // A state change without an instance id is malformed.
            return EventClass::Unrecognized;
        };
        return match event.detail.state.as_deref() {
            Some("running") => EventClass::LifecycleRunning { instance_id },
            Some(state) if REMOVED_STATES.contains(&state) => EventClass::LifecycleRemoved {
                instance_id,
                state: state.to_string(),
            },
            other => EventClass::LifecycleOther {
                state: other.map(str::to_string),
            },
        };
    }
    if event.source == TIMER_SOURCE && event.detail_type == TIMER_DETAIL_TYPE {
        return EventClass::Timer;
    }
    EventClass::Unrecognized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle(instance_id: &str, state: &str) -> Notification {
        Notification {
            source: LIFECYCLE_SOURCE.to_string(),
            detail_type: LIFECYCLE_DETAIL_TYPE.to_string(),
            detail: Detail {
                instance_id: Some(instance_id.to_string()),
                state: Some(state.to_string()),
            },
        }
    }

    #[test]
    fn running_state_classifies_as_running() {
        assert_eq!(
            classify(&lifecycle("i-abcd1111", "running")),
            EventClass::LifecycleRunning {
                instance_id: "i-abcd1111".to_string()
            }
        );
    }

    #[test]
    fn removal_states_classify_as_removed() {
        for state in ["stopping", "shutting-down", "terminated"] {
            assert_eq!(
                classify(&lifecycle("i-1", state)),
                EventClass::LifecycleRemoved {
                    instance_id: "i-1".to_string(),
                    state: state.to_string(),
                }
            );
        }
    }

    #[test]
    fn intermediate_states_classify_as_other() {
        assert_eq!(
            classify(&lifecycle("i-1", "pending")),
            EventClass::LifecycleOther {
                state: Some("pending".to_string())
            }
        );
    }

    #[test]
    fn timer_tick_classifies_as_timer() {
        assert_eq!(classify(&Notification::timer()), EventClass::Timer);
    }

    #[test]
    fn unknown_source_is_unrecognized() {
        let mut event = lifecycle("i-1", "running");
        event.source = "aws.unknown".to_string();
        assert_eq!(classify(&event), EventClass::Unrecognized);
    }

    #[test]
    fn unknown_detail_type_is_unrecognized() {
        let mut event = lifecycle("i-1", "running");
        event.detail_type = "EC2 Spot Instance Interruption Warning".to_string();
        assert_eq!(classify(&event), EventClass::Unrecognized);
    }

    #[test]
    fn lifecycle_without_instance_id_is_unrecognized() {
        let mut event = lifecycle("i-1", "running");
        event.detail.instance_id = None;
        assert_eq!(classify(&event), EventClass::Unrecognized);
    }

    #[test]
    fn empty_notification_is_unrecognized() {
        assert_eq!(classify(&Notification::default()), EventClass::Unrecognized);
    }

    #[test]
    fn parses_full_event_source_payload() {
        let json = r#"{
            "id": "7bf73129-1428-4cd3-a780-95db273d1602",
            "detail-type": "EC2 Instance State-change Notification",
            "source": "aws.ec2",
            "account": "123456789012",
            "time": "2015-11-11T21:29:54Z",
            "region": "us-east-1",
            "resources": ["arn:aws:ec2:us-east-1:123456789012:instance/i-abcd1111"],
            "detail": {"instance-id": "i-abcd1111", "state": "running"}
        }"#;
        let event: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(
            classify(&event),
            EventClass::LifecycleRunning {
                instance_id: "i-abcd1111".to_string()
            }
        );
    }

    #[test]
    fn parses_bare_timer_payload() {
        let json = r#"{"detail-type": "Scheduled Event", "source": "aws.events", "detail": {}}"#;
        let event: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(classify(&event), EventClass::Timer);
    }
}
