//! Fault - Robot Fault Bitmask Decoding

/// Fault codes reported in the CH7 bitmask (bit `code - 1`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotFault {
    Encoder = 1,
    Peripheral = 2,
    IoExpander = 3,
    LowBattery = 4,
    LimitSwitch = 5,
    BrushMotorOverCurrent = 6,
    HighTemperature = 7,
}

impl RobotFault {
    pub const ALL: [RobotFault; 7] = [
        RobotFault::Encoder,
        RobotFault::Peripheral,
        RobotFault::IoExpander,
        RobotFault::LowBattery,
        RobotFault::LimitSwitch,
        RobotFault::BrushMotorOverCurrent,
        RobotFault::HighTemperature,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn description(&self) -> &'static str {
        match self {
            RobotFault::Encoder => "Encoder Fault",
            RobotFault::Peripheral => "Peripheral Fault",
            RobotFault::IoExpander => "IO Expander Fault",
            RobotFault::LowBattery => "Low Battery Fault",
            RobotFault::LimitSwitch => "Limit Switch Fault",
            RobotFault::BrushMotorOverCurrent => "Brush Motor Over Current Fault",
            RobotFault::HighTemperature => "High Temperature Fault",
        }
    }

    /// Faults set in a CH7 mask, in code order. Bits above 7 are ignored.
    pub fn decode(mask: u32) -> Vec<RobotFault> {
        Self::ALL
            .into_iter()
            .filter(|f| mask & (1 << (f.code() - 1)) != 0)
            .collect()
    }
}

/// A robot with at least one active fault
#[derive(Debug, Clone, PartialEq)]
pub struct FaultReport {
    pub dev_eui: String,
    pub robot_name: String,
    pub location: Option<String>,
    pub faults: Vec<RobotFault>,
}
