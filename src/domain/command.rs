//! Command - Robot Actions and Downlink Payloads
//!
//! Each action maps to a single opcode byte that the robot firmware decodes.
//! The backend expects the frame base64-encoded.

use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::constants::DOWNLINK_FPORT;
use crate::error::{Error, Result};
use crate::helpers::lenient;

/// A named robot action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotAction {
    /// Ask the group to report status
    Refresh,
    Start,
    Stop,
    /// Return to dock
    Home,
    Reboot,
    Disable,
    Enable,
}

impl RobotAction {
    pub const ALL: [RobotAction; 7] = [
        RobotAction::Refresh,
        RobotAction::Start,
        RobotAction::Stop,
        RobotAction::Home,
        RobotAction::Reboot,
        RobotAction::Disable,
        RobotAction::Enable,
    ];

    /// Firmware opcode
    pub fn opcode(&self) -> u8 {
        match self {
            RobotAction::Refresh => 0x01,
            RobotAction::Start => 0x02,
            RobotAction::Stop => 0x03,
            RobotAction::Home => 0x04,
            RobotAction::Reboot => 0x05,
            RobotAction::Disable => 0x06,
            RobotAction::Enable => 0x07,
        }
    }

    /// Base64 frame as queued on the network server
    pub fn payload(&self) -> String {
        BASE64.encode([self.opcode()])
    }

    /// Motion actions are refused while weather warnings are active
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            RobotAction::Start | RobotAction::Stop | RobotAction::Home | RobotAction::Reboot
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            RobotAction::Refresh => "refresh",
            RobotAction::Start => "start",
            RobotAction::Stop => "stop",
            RobotAction::Home => "home",
            RobotAction::Reboot => "reboot",
            RobotAction::Disable => "disable",
            RobotAction::Enable => "enable",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            RobotAction::Refresh => 0,
            RobotAction::Start => 1,
            RobotAction::Stop => 2,
            RobotAction::Home => 3,
            RobotAction::Reboot => 4,
            RobotAction::Disable => 5,
            RobotAction::Enable => 6,
        }
    }
}

impl std::fmt::Display for RobotAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RobotAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refresh" => Ok(RobotAction::Refresh),
            "start" | "on" => Ok(RobotAction::Start),
            "stop" | "off" => Ok(RobotAction::Stop),
            "home" | "gohome" => Ok(RobotAction::Home),
            "reboot" => Ok(RobotAction::Reboot),
            "disable" => Ok(RobotAction::Disable),
            "enable" => Ok(RobotAction::Enable),
            other => Err(Error::Invalid {
                message: format!("Unknown action: {other}"),
            }),
        }
    }
}

/// Downlink queue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub data: String,
    pub f_cnt: u32,
    pub f_port: u8,
    pub confirmed: bool,
}

impl QueueItem {
    pub fn for_action(action: RobotAction) -> Self {
        Self {
            data: action.payload(),
            f_cnt: 0,
            f_port: DOWNLINK_FPORT,
            confirmed: true,
        }
    }
}

/// What a queue request answered with
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    #[serde(default, deserialize_with = "lenient::opt_id_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub f_cnt: Option<u32>,
}

/// Who receives a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    Devices(Vec<String>),
    Groups(Vec<String>),
}

impl DispatchTarget {
    pub fn ids(&self) -> &[String] {
        match self {
            DispatchTarget::Devices(ids) | DispatchTarget::Groups(ids) => ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DispatchTarget::Devices(_) => "device",
            DispatchTarget::Groups(_) => "group",
        }
    }
}

/// How a dispatch went across its targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Complete,
    /// Some targets were unreachable; informational, not an error
    Partial,
}

/// Per-target delivery results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub request_id: String,
    pub action: RobotAction,
    pub delivered: Vec<(String, EnqueueReceipt)>,
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn outcome(&self) -> DispatchOutcome {
        if self.failed.is_empty() {
            DispatchOutcome::Complete
        } else {
            DispatchOutcome::Partial
        }
    }

    pub fn delivered_ids(&self) -> impl Iterator<Item = &str> {
        self.delivered.iter().map(|(id, _)| id.as_str())
    }
}
