//! FleetState - Devices, Groups and Running Flags

use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Duration, Utc};

use crate::domain::device::{DashboardSummary, Device, DeviceChannels, Group};
use crate::domain::fault::{FaultReport, RobotFault};

/// State for the fleet overview and the group status board
#[derive(Debug, Clone)]
pub struct FleetState {
    devices: Vec<Device>,
    groups: Vec<Group>,
    /// Groups with members, as used by the status board
    group_members: Vec<Group>,
    /// Latest channel values by devEui
    channels: AHashMap<String, DeviceChannels>,
    summary: DashboardSummary,
    window: Duration,
}

impl FleetState {
    pub fn new(window: Duration) -> Self {
        Self {
            devices: Vec::new(),
            groups: Vec::new(),
            group_members: Vec::new(),
            channels: AHashMap::new(),
            summary: DashboardSummary::default(),
            window,
        }
    }

    /// Replace devices and groups and recompute the summary
    pub fn set_inventory(
        &mut self,
        devices: Vec<Device>,
        groups: Vec<Group>,
        now: DateTime<Utc>,
    ) -> &DashboardSummary {
        self.summary = DashboardSummary::build(groups.len(), &devices, now, self.window);
        self.devices = devices;
        self.groups = groups;
        &self.summary
    }

    /// Replace the device inventory, keeping the known group count
    pub fn set_devices(&mut self, devices: Vec<Device>, now: DateTime<Utc>) -> &DashboardSummary {
        let group_count = self.groups.len();
        self.summary = DashboardSummary::build(group_count, &devices, now, self.window);
        self.devices = devices;
        self.prune_channels();
        &self.summary
    }

    /// Replace the status board groups; robots that left every group stop counting
    pub fn set_group_members(&mut self, groups: Vec<Group>) {
        self.group_members = groups;
        self.prune_channels();
    }

    /// Drop channel values for robots neither on the board nor in the inventory
    fn prune_channels(&mut self) {
        let known: AHashSet<&str> = self
            .group_members
            .iter()
            .flat_map(|g| g.devices.iter())
            .chain(self.devices.iter())
            .map(|d| d.dev_eui.as_str())
            .collect();
        self.channels.retain(|dev_eui, _| known.contains(dev_eui.as_str()));
    }

    fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.group_members
            .iter()
            .flat_map(|g| g.devices.iter())
            .map(|d| d.dev_eui.as_str())
    }

    /// Record a channel fetch; `None` (failed fetch) reads as not running
    pub fn set_channels(&mut self, dev_eui: &str, channels: Option<DeviceChannels>) {
        self.channels
            .insert(dev_eui.to_string(), channels.unwrap_or_default());
    }

    pub fn is_running(&self, dev_eui: &str) -> bool {
        self.channels
            .get(dev_eui)
            .map(DeviceChannels::running)
            .unwrap_or(false)
    }

    /// Distinct robots on the status board
    pub fn member_count(&self) -> usize {
        self.member_ids().collect::<AHashSet<_>>().len()
    }

    /// Running robots among the current status board members
    pub fn running_count(&self) -> usize {
        self.member_ids()
            .collect::<AHashSet<_>>()
            .into_iter()
            .filter(|dev_eui| self.is_running(dev_eui))
            .count()
    }

    /// Robots with at least one CH7 fault: the inventory first, then any
    /// board member missing from it
    pub fn faults(&self) -> Vec<FaultReport> {
        let mut seen = AHashSet::new();
        self.devices
            .iter()
            .chain(self.group_members.iter().flat_map(|g| g.devices.iter()))
            .filter(|device| seen.insert(device.dev_eui.as_str()))
            .filter_map(|device| {
                let mask = self.channels.get(&device.dev_eui)?.ch7?;
                let faults = RobotFault::decode(mask);
                (!faults.is_empty()).then(|| FaultReport {
                    dev_eui: device.dev_eui.clone(),
                    robot_name: device.display_name().to_string(),
                    location: device.description.clone(),
                    faults,
                })
            })
            .collect()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_members(&self) -> &[Group] {
        &self.group_members
    }

    pub fn summary(&self) -> &DashboardSummary {
        &self.summary
    }

    pub fn find_group(&self, group_id: &str) -> Option<&Group> {
        self.group_members
            .iter()
            .chain(self.groups.iter())
            .find(|g| g.id == group_id)
    }

    /// Group names for `ids`, falling back to the id itself
    pub fn group_names(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.find_group(id)
                    .map(|g| g.name.clone())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| id.clone())
            })
            .collect()
    }
}

impl Default for FleetState {
    fn default() -> Self {
        Self::new(Duration::minutes(crate::constants::ACTIVITY_WINDOW_MINS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, seen_mins_ago: Option<i64>, now: DateTime<Utc>) -> Device {
        Device {
            dev_eui: id.into(),
            name: id.to_uppercase(),
            description: None,
            last_seen_at: seen_mins_ago.map(|m| now - Duration::minutes(m)),
        }
    }

    #[test]
    fn test_inventory_summary() {
        let now = Utc::now();
        let mut state = FleetState::default();
        let summary = state.set_inventory(
            vec![
                device("a", Some(5), now),
                device("b", Some(31), now),
                device("c", None, now),
            ],
            vec![],
            now,
        );
        assert_eq!(summary.device_total, 3);
        assert_eq!(summary.active_count(), 1);
        assert_eq!(summary.inactive_count(), 2);
    }

    fn channels(ch2: f64, ch7: u32) -> DeviceChannels {
        DeviceChannels {
            ch2: Some(ch2),
            ch7: Some(ch7),
        }
    }

    fn block(id: &str, devices: Vec<Device>) -> Group {
        Group {
            id: id.into(),
            name: format!("Block {id}"),
            region: None,
            devices,
        }
    }

    #[test]
    fn test_running_flags_default_false() {
        let now = Utc::now();
        let mut state = FleetState::default();
        assert!(!state.is_running("a"));
        state.set_group_members(vec![block(
            "1",
            vec![device("a", None, now), device("b", None, now), device("c", None, now)],
        )]);
        state.set_channels("a", Some(channels(1.0, 0)));
        state.set_channels("b", Some(channels(0.0, 0)));
        state.set_channels("c", None);
        assert!(state.is_running("a"));
        assert!(!state.is_running("c"));
        assert_eq!(state.running_count(), 1);
    }

    #[test]
    fn test_regroup_drops_departed_robots_from_running() {
        let now = Utc::now();
        let mut state = FleetState::default();
        state.set_group_members(vec![block("1", vec![device("a", None, now)])]);
        state.set_channels("a", Some(channels(1.0, 0)));
        assert_eq!(state.running_count(), 1);

        state.set_group_members(vec![block("1", vec![])]);
        assert_eq!(state.member_count(), 0);
        assert_eq!(state.running_count(), 0);
        assert!(!state.is_running("a"));
    }

    #[test]
    fn test_robot_in_two_groups_counts_once() {
        let now = Utc::now();
        let mut state = FleetState::default();
        state.set_group_members(vec![
            block("1", vec![device("a", None, now)]),
            block("2", vec![device("a", None, now), device("b", None, now)]),
        ]);
        state.set_channels("a", Some(channels(1.0, 0)));
        assert_eq!(state.member_count(), 2);
        assert_eq!(state.running_count(), 1);
    }

    #[test]
    fn test_faults_include_ungrouped_inventory_robots() {
        let now = Utc::now();
        let mut state = FleetState::default();
        state.set_devices(vec![device("loose", Some(1), now)], now);
        state.set_group_members(vec![block("1", vec![device("a", Some(1), now)])]);
        state.set_channels("loose", Some(channels(0.0, 0b1)));
        state.set_channels("a", Some(channels(0.0, 0b100_0000)));

        let faults = state.faults();
        let ids: Vec<_> = faults.iter().map(|f| f.dev_eui.as_str()).collect();
        assert_eq!(ids, vec!["loose", "a"]);
        assert_eq!(faults[0].faults, vec![RobotFault::Encoder]);
        assert_eq!(faults[1].faults, vec![RobotFault::HighTemperature]);
    }

    #[test]
    fn test_faults_only_lists_faulty_robots() {
        let now = Utc::now();
        let mut state = FleetState::default();
        state.set_group_members(vec![Group {
            id: "g1".into(),
            name: "Block A".into(),
            region: None,
            devices: vec![device("a", Some(1), now), device("b", Some(1), now)],
        }]);
        state.set_channels("a", Some(channels(1.0, 0b1000)));
        state.set_channels("b", Some(channels(0.0, 0)));

        let faults = state.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].robot_name, "A");
        assert_eq!(faults[0].faults, vec![RobotFault::LowBattery]);
    }

    #[test]
    fn test_group_names_fall_back_to_id() {
        let mut state = FleetState::default();
        state.set_group_members(vec![Group {
            id: "g1".into(),
            name: "Block A".into(),
            region: None,
            devices: vec![],
        }]);
        assert_eq!(
            state.group_names(&["g1".into(), "g2".into()]),
            vec!["Block A".to_string(), "g2".to_string()]
        );
    }
}
