//! Device - Robots, Multicast Groups and Activity Classification

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::helpers::lenient;

/// A cleaning robot registered on the network server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Unique device identifier
    pub dev_eui: String,
    #[serde(default)]
    pub name: String,
    /// Free text, used by the plant as block/location
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Active when last seen within `window` of `now`. Never-seen robots are inactive.
    pub fn is_active(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_seen_at
            .map(|seen| now - seen <= window)
            .unwrap_or(false)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.dev_eui
        } else {
            &self.name
        }
    }

    pub fn location(&self) -> &str {
        self.description.as_deref().unwrap_or("N/A")
    }
}

/// Split devices into (active, inactive) by last-seen age
pub fn partition_by_activity(
    devices: &[Device],
    now: DateTime<Utc>,
    window: Duration,
) -> (Vec<Device>, Vec<Device>) {
    devices
        .iter()
        .cloned()
        .partition(|d| d.is_active(now, window))
}

/// Case-insensitive name search
pub fn filter_by_name<'a>(devices: &'a [Device], term: &str) -> Vec<&'a Device> {
    let needle = term.to_lowercase();
    devices
        .iter()
        .filter(|d| d.name.to_lowercase().contains(&needle))
        .collect()
}

/// A multicast group addressed as one downlink target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(deserialize_with = "lenient::id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Live channel values reported by a robot
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceChannels {
    /// 1 while the robot is running a cleaning cycle
    #[serde(rename = "CH2", default, deserialize_with = "lenient::opt_f64")]
    pub ch2: Option<f64>,
    /// Fault bitmask
    #[serde(rename = "CH7", default, deserialize_with = "lenient::opt_u32")]
    pub ch7: Option<u32>,
}

impl DeviceChannels {
    pub fn running(&self) -> bool {
        self.ch2 == Some(1.0)
    }
}

/// Aggregate counts for the fleet overview
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSummary {
    pub group_count: usize,
    pub device_total: usize,
    pub active: Vec<Device>,
    pub inactive: Vec<Device>,
}

impl DashboardSummary {
    pub fn build(
        group_count: usize,
        devices: &[Device],
        now: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let (active, inactive) = partition_by_activity(devices, now, window);
        Self {
            group_count,
            device_total: devices.len(),
            active,
            inactive,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn inactive_count(&self) -> usize {
        self.inactive.len()
    }
}
