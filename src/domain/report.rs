//! Report - Cleaning Performance and Auto-Run Counts

use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::helpers::lenient;

/// Report aggregation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Daily,
    Monthly,
    Yearly,
}

impl Timeframe {
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Daily => "daily",
            Timeframe::Monthly => "monthly",
            Timeframe::Yearly => "yearly",
        }
    }

    /// Column carrying the period start in report rows
    pub fn date_key(&self) -> &'static str {
        match self {
            Timeframe::Daily => "day",
            Timeframe::Monthly => "month_start",
            Timeframe::Yearly => "year_start",
        }
    }

    pub fn download_file_name(&self) -> String {
        format!("{}_report.csv", self.label())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Timeframe::Daily),
            "monthly" => Ok(Timeframe::Monthly),
            "yearly" => Ok(Timeframe::Yearly),
            other => Err(Error::Invalid {
                message: format!("Invalid timeframe: {other}"),
            }),
        }
    }
}

/// One device row of a performance report. Columns vary by timeframe.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DevicePerformance {
    #[serde(default, deserialize_with = "lenient::opt_id_string")]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub columns: Map<String, Value>,
}

impl DevicePerformance {
    /// Period start for this row, if the backend included it
    pub fn period_start(&self, timeframe: Timeframe) -> Option<String> {
        match self.columns.get(timeframe.date_key())? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    #[serde(default)]
    pub individual_devices: Vec<DevicePerformance>,
    #[serde(default)]
    pub overall_summary: Option<Map<String, Value>>,
}

// ==================== Weekly charts ====================

/// Weekly trend charts shown on the fleet overview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeeklyChart {
    /// Average battery voltage per day
    Battery,
    /// Panels cleaned per day
    Panels,
}

impl WeeklyChart {
    pub fn label(&self) -> &'static str {
        match self {
            WeeklyChart::Battery => "battery",
            WeeklyChart::Panels => "panels",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            WeeklyChart::Battery => "robot-battery-report/weekly",
            WeeklyChart::Panels => "robot-panels-report/weekly",
        }
    }
}

impl FromStr for WeeklyChart {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "battery" => Ok(WeeklyChart::Battery),
            "panels" => Ok(WeeklyChart::Panels),
            other => Err(Error::Invalid {
                message: format!("Invalid chart: {other} (expected battery or panels)"),
            }),
        }
    }
}

/// One plotted series; missing points stay `None`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChartSeries {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: Vec<Option<f64>>,
}

/// Chart payload as the backend prepares it for plotting
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    x_axis: Option<Value>,
    #[serde(default)]
    pub series: Vec<ChartSeries>,
}

impl ChartData {
    pub fn title(&self) -> Option<&str> {
        match self.title.as_ref()? {
            Value::String(text) => Some(text.as_str()),
            other => other.get("text")?.as_str(),
        }
    }

    /// X axis categories; the axis may be one object or a list of them
    pub fn categories(&self) -> Vec<String> {
        let axis = match self.x_axis.as_ref() {
            Some(Value::Array(axes)) => axes.first(),
            other => other,
        };
        axis.and_then(|a| a.get("categories"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rows of `(category, value per series)`
    pub fn rows(&self) -> Vec<(String, Vec<Option<f64>>)> {
        self.categories()
            .into_iter()
            .enumerate()
            .map(|(i, category)| {
                let values = self
                    .series
                    .iter()
                    .map(|s| s.data.get(i).copied().flatten())
                    .collect();
                (category, values)
            })
            .collect()
    }
}

/// Automatic vs manual cleaning runs for one robot
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCount {
    #[serde(rename = "device_name", default)]
    pub device_name: String,
    #[serde(default)]
    pub block: String,
    #[serde(default)]
    pub auto_count: u64,
    #[serde(default)]
    pub manual_count: u64,
    #[serde(default)]
    pub update_at: Option<DateTime<Utc>>,
}

impl ActiveCount {
    pub fn total(&self) -> u64 {
        self.auto_count + self.manual_count
    }
}

/// Fleet totals over a set of count rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountTotals {
    pub auto: u64,
    pub manual: u64,
}

impl CountTotals {
    pub fn of(rows: &[ActiveCount]) -> Self {
        rows.iter().fold(Self::default(), |acc, row| Self {
            auto: acc.auto + row.auto_count,
            manual: acc.manual + row.manual_count,
        })
    }

    pub fn total(&self) -> u64 {
        self.auto + self.manual
    }
}

/// Optional date filter for count queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountFilter {
    pub date: NaiveDate,
}

/// CSV with columns `Device Name,Block,Auto Count,Manual Count,Total Count,Updated At`
pub fn counts_to_csv(rows: &[ActiveCount]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Device Name",
        "Block",
        "Auto Count",
        "Manual Count",
        "Total Count",
        "Updated At",
    ])?;
    for row in rows {
        let updated = row
            .update_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        writer.write_record([
            row.device_name.clone(),
            row.block.clone(),
            row.auto_count.to_string(),
            row.manual_count.to_string(),
            row.total().to_string(),
            updated,
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
