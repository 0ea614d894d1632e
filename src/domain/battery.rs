//! Battery - Robot Battery Voltage Classification

use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};

use crate::constants::{BATTERY_CRITICAL_VOLTS, BATTERY_LOW_VOLTS, BATTERY_MAX_VOLTS};
use crate::error::Result;

/// Voltage thresholds (volts)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryThresholds {
    pub critical: f64,
    pub low: f64,
    pub max: f64,
}

impl Default for BatteryThresholds {
    fn default() -> Self {
        Self {
            critical: BATTERY_CRITICAL_VOLTS,
            low: BATTERY_LOW_VOLTS,
            max: BATTERY_MAX_VOLTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryStatus {
    Offline,
    Critical,
    Low,
    Normal,
}

impl BatteryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BatteryStatus::Offline => "Offline",
            BatteryStatus::Critical => "Critical",
            BatteryStatus::Low => "Low",
            BatteryStatus::Normal => "Normal",
        }
    }
}

impl BatteryThresholds {
    pub fn classify(&self, voltage: Option<f64>) -> BatteryStatus {
        match voltage {
            None => BatteryStatus::Offline,
            Some(v) if v.is_nan() => BatteryStatus::Offline,
            Some(v) if v <= self.critical => BatteryStatus::Critical,
            Some(v) if v <= self.low => BatteryStatus::Low,
            Some(_) => BatteryStatus::Normal,
        }
    }

    /// Gauge fill in 0.0..=1.0
    pub fn fill(&self, voltage: Option<f64>) -> f64 {
        match voltage {
            Some(v) if v.is_finite() && self.max > 0.0 => (v / self.max).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

/// One robot's battery reading
#[derive(Debug, Clone, PartialEq)]
pub struct RobotBattery {
    pub dev_eui: String,
    pub name: String,
    pub description: Option<String>,
    pub group_name: String,
    pub voltage: Option<f64>,
}

/// Battery readings grouped by block, in group order
#[derive(Debug, Clone, Default)]
pub struct BatteryBoard {
    blocks: LinkedHashMap<String, Vec<RobotBattery>>,
}

impl BatteryBoard {
    pub fn from_readings(readings: impl IntoIterator<Item = RobotBattery>) -> Self {
        let mut blocks: LinkedHashMap<String, Vec<RobotBattery>> = LinkedHashMap::new();
        for reading in readings {
            // get_mut keeps first-seen block order; entry() would move hits to the back
            if let Some(robots) = blocks.get_mut(&reading.group_name) {
                robots.push(reading);
            } else {
                blocks.insert(reading.group_name.clone(), vec![reading]);
            }
        }
        Self { blocks }
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&String, &Vec<RobotBattery>)> {
        self.blocks.iter()
    }

    pub fn robot_count(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    /// CSV with columns `Block,Robot Name,batteryVolt`
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Block", "Robot Name", "batteryVolt"])?;
        for robots in self.blocks.values() {
            for robot in robots {
                let volts = robot
                    .voltage
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "N/A".into());
                writer.write_record([
                    robot.description.as_deref().unwrap_or(""),
                    robot.name.as_str(),
                    volts.as_str(),
                ])?;
            }
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
