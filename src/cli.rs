//! Command Line Interface
//!
//! Subcommands map onto the service layer; notifications raised while a
//! command runs are printed to stderr after it finishes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::Receiver;

use scr_ops::Error;
use scr_ops::domain::command::{DispatchOutcome, DispatchTarget, RobotAction};
use scr_ops::domain::device::{Device, filter_by_name};
use scr_ops::domain::report::{CountTotals, Timeframe, WeeklyChart, counts_to_csv};
use scr_ops::domain::threshold::{ThresholdConfig, WindSpeedUnit};
use scr_ops::services::{ServiceEvent, ServiceHub, WatchOutcome};
use scr_ops::utils::{format_opt_datetime, format_time, gauge, truncate};

/// Solar-panel cleaning robot fleet console
#[derive(Parser, Debug)]
#[command(name = "scr-ops", version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend REST base URL, overrides config and environment
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run all pollers in the foreground and print events until Ctrl-C
    Watch,

    /// Current weather and the operations gate
    Weather,

    /// Show or change weather thresholds
    #[command(subcommand)]
    Thresholds(ThresholdsCommand),

    /// List devices with their activity
    Devices {
        /// Case-insensitive name filter
        #[arg(long)]
        search: Option<String>,
    },

    /// List multicast groups and member counts
    Groups,

    /// Fleet summary and per-group running status
    Status,

    /// Send a command to robots or groups
    Dispatch {
        /// start, stop, home, reboot, enable or disable
        action: RobotAction,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Enable a robot
    Enable { dev_eui: String },

    /// Disable a robot
    Disable { dev_eui: String },

    /// List robots disabled from this console
    Disabled,

    /// Ask a group to report its status
    Refresh { group_id: String },

    /// Schedule a downlink for groups and watch it
    Schedule {
        #[arg(long = "group", required = true)]
        groups: Vec<String>,
        /// RFC 3339 timestamp, e.g. 2024-05-01T06:30:00+04:00
        #[arg(long)]
        at: DateTime<Utc>,
    },

    /// List scheduled tasks
    Tasks,

    /// Cancel a scheduled task
    Cancel { task_id: String },

    /// Battery voltage per block
    Battery {
        /// Also write the board as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Robots reporting faults
    Faults,

    /// Cleaning performance report
    Report {
        timeframe: Timeframe,
        /// Save the backend CSV into this directory
        #[arg(long)]
        download: Option<PathBuf>,
    },

    /// Weekly trend chart as a table
    Weekly {
        /// battery or panels
        chart: WeeklyChart,
    },

    /// Automatic vs manual cleaning counts
    Counts {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Robot events
    Events {
        #[arg(long, conflicts_with = "clear")]
        count: bool,
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ThresholdsCommand {
    Show,
    /// Update the given limits, keeping the others
    Set(ThresholdArgs),
}

#[derive(Args, Debug)]
pub struct ThresholdArgs {
    /// Rain gauge limit (mm)
    #[arg(long)]
    rain: Option<f64>,
    /// Wind speed limit, in the configured unit
    #[arg(long)]
    wind: Option<f64>,
    #[arg(long)]
    wind_level: Option<f64>,
    #[arg(long)]
    wind_angle: Option<f64>,
    /// Humidity limit (%)
    #[arg(long)]
    humidity: Option<f64>,
}

impl ThresholdArgs {
    fn apply(self, mut base: ThresholdConfig) -> ThresholdConfig {
        base.rain_gauge = self.rain.or(base.rain_gauge);
        base.wind_speed = self.wind.or(base.wind_speed);
        base.wind_speed_level = self.wind_level.or(base.wind_speed_level);
        base.wind_direction_angle = self.wind_angle.or(base.wind_direction_angle);
        base.humidity = self.humidity.or(base.humidity);
        base
    }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    #[arg(long = "device")]
    devices: Vec<String>,
    #[arg(long = "group")]
    groups: Vec<String>,
}

impl TargetArgs {
    fn into_target(self) -> DispatchTarget {
        if self.groups.is_empty() {
            DispatchTarget::Devices(self.devices)
        } else {
            DispatchTarget::Groups(self.groups)
        }
    }
}

// ==================== Execution ====================

pub async fn run(hub: &ServiceHub, command: Command) -> anyhow::Result<()> {
    let events = hub.events();
    let result = execute(hub, command, &events).await;
    print_notifications(&events);
    result
}

async fn execute(
    hub: &ServiceHub,
    command: Command,
    events: &Receiver<ServiceEvent>,
) -> anyhow::Result<()> {
    let poller = hub.poller();
    let dispatcher = hub.dispatcher();
    let ctx = hub.context();

    match command {
        Command::Watch => watch(hub, events).await?,

        Command::Weather => {
            if let Err(e) = poller.refresh_thresholds().await {
                tracing::warn!("Thresholds unavailable: {e}");
            }
            poller.poll_weather().await;
            let weather = ctx.weather.read().await;
            println!("{}", weather.display_reading().summary());
            if let Some(warning) = weather.connectivity_warning() {
                println!("! {warning}");
            }
            if weather.operations_disabled() {
                println!("Operations DISABLED:");
                for warning in weather.warnings() {
                    println!("  - {warning}");
                }
            } else {
                let unit = match weather.evaluator().unit() {
                    WindSpeedUnit::MetersPerSecond => "m/s",
                    WindSpeedUnit::MilesPerHour => "mph",
                };
                println!("Operations enabled (wind compared in {unit})");
            }
        }

        Command::Thresholds(ThresholdsCommand::Show) => {
            match poller.refresh_thresholds().await? {
                Some(t) => print_thresholds(&t),
                None => println!("No thresholds configured"),
            }
        }

        Command::Thresholds(ThresholdsCommand::Set(args)) => {
            let current = poller.refresh_thresholds().await?.unwrap_or_default();
            let saved = poller.save_thresholds(&args.apply(current)).await?;
            print_thresholds(&saved.thresholds);
        }

        Command::Devices { search } => {
            let devices = ctx.api.devices().await?;
            let shown: Vec<&Device> = match &search {
                Some(term) => filter_by_name(&devices, term),
                None => devices.iter().collect(),
            };
            let now = Utc::now();
            let window = hub.config().activity_window();
            println!("{:<20} {:<24} {:<20} {:<8} LAST SEEN", "DEV EUI", "NAME", "LOCATION", "STATE");
            for device in shown {
                println!(
                    "{:<20} {:<24} {:<20} {:<8} {}",
                    device.dev_eui,
                    truncate(device.display_name(), 24),
                    truncate(device.location(), 20),
                    if device.is_active(now, window) { "active" } else { "inactive" },
                    format_opt_datetime(device.last_seen_at.as_ref()),
                );
            }
        }

        Command::Groups => {
            for group in ctx.api.group_devices().await? {
                println!("{:<38} {:<24} {} robots", group.id, group.name, group.devices.len());
            }
        }

        Command::Status => {
            if let Some(summary) = poller.poll_dashboard().await {
                println!(
                    "{} groups | {} robots | {} active | {} inactive",
                    summary.group_count,
                    summary.device_total,
                    summary.active_count(),
                    summary.inactive_count()
                );
            }
            let running = poller.poll_activity().await;
            let fleet = ctx.fleet.read().await;
            for group in fleet.group_members() {
                println!("\n{} ({})", group.name, group.id);
                for device in &group.devices {
                    let state = if fleet.is_running(&device.dev_eui) { "running" } else { "idle" };
                    println!("  {:<24} {:<8} {}", device.display_name(), state, device.location());
                }
            }
            println!("\n{running} robot(s) running");
        }

        Command::Dispatch { action, target } => {
            prepare_gate(hub, action).await;
            let report = dispatcher.dispatch(&target.into_target(), action).await?;
            for (id, receipt) in &report.delivered {
                println!("sent     {id} {}", receipt.id.as_deref().unwrap_or(""));
            }
            for (id, reason) in &report.failed {
                println!("failed   {id}: {reason}");
            }
            if report.outcome() == DispatchOutcome::Partial {
                println!("Partial delivery (request {})", report.request_id);
            }
        }

        Command::Enable { dev_eui } => {
            dispatcher.set_robot_enabled(&dev_eui, true).await?;
        }

        Command::Disable { dev_eui } => {
            dispatcher.set_robot_enabled(&dev_eui, false).await?;
        }

        Command::Disabled => {
            let disabled = ctx.disabled.read().await;
            if disabled.is_empty() {
                println!("No robots disabled");
            }
            for dev_eui in disabled.iter() {
                println!("{dev_eui}");
            }
        }

        Command::Refresh { group_id } => {
            poller.poll_activity().await;
            dispatcher.refresh_group(&group_id).await?;
        }

        Command::Schedule { groups, at } => {
            poller.poll_activity().await;
            let watch = dispatcher.schedule_task(groups, at).await?;
            println!("Scheduled task {}; watching...", watch.task.id);
            let task_id = watch.task.id.clone();
            let outcome = watch.handle.await.context("task watcher panicked")?;
            match outcome {
                WatchOutcome::Terminal(status) => println!("Task {task_id} {}", status.label()),
                other => {
                    return Err(Error::TaskWatch {
                        task_id,
                        reason: other.label(),
                    }
                    .into());
                }
            }
        }

        Command::Tasks => {
            poller.poll_activity().await;
            let fleet = ctx.fleet.read().await;
            for task in dispatcher.refresh_tasks().await? {
                let names = if task.group_names.is_empty() {
                    fleet.group_names(&task.group_ids)
                } else {
                    task.group_names.clone()
                };
                println!(
                    "{:<12} {:<10} {:<20} {}",
                    task.id,
                    task.status.label(),
                    format_opt_datetime(task.schedule_time.as_ref()),
                    names.join(", ")
                );
            }
        }

        Command::Cancel { task_id } => {
            dispatcher.cancel_task(&task_id).await?;
        }

        Command::Battery { csv } => {
            let board = poller.battery_board().await?;
            let thresholds = hub.config().battery;
            for (block, robots) in board.blocks() {
                println!("\n{block}");
                for robot in robots {
                    let status = thresholds.classify(robot.voltage);
                    let volts = robot
                        .voltage
                        .map(|v| format!("{v:.1} V"))
                        .unwrap_or_else(|| "N/A".into());
                    println!(
                        "  {:<24} {} {:<8} {}",
                        robot.name,
                        gauge(thresholds.fill(robot.voltage)),
                        volts,
                        status.label()
                    );
                }
            }
            if let Some(path) = csv {
                std::fs::write(&path, board.to_csv()?)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("\nWrote {} robots to {}", board.robot_count(), path.display());
            }
        }

        Command::Faults => {
            let faults = poller.poll_faults().await?;
            if faults.is_empty() {
                println!("No faults reported");
            }
            for report in faults {
                let names: Vec<&str> = report.faults.iter().map(|f| f.description()).collect();
                println!(
                    "{:<24} {:<20} {}",
                    report.robot_name,
                    report.location.as_deref().unwrap_or("N/A"),
                    names.join(", ")
                );
            }
        }

        Command::Report {
            timeframe,
            download,
        } => {
            let report = ctx.api.performance_report(timeframe).await?;
            for row in &report.individual_devices {
                println!(
                    "{:<20} {:<12} {}",
                    row.device_id.as_deref().unwrap_or("-"),
                    row.period_start(timeframe).unwrap_or_default(),
                    serde_json::Value::Object(row.columns.clone())
                );
            }
            if let Some(summary) = &report.overall_summary {
                println!("Overall: {}", serde_json::Value::Object(summary.clone()));
            }
            if let Some(dir) = download {
                let bytes = ctx.api.download_report(timeframe).await?;
                let path = dir.join(timeframe.download_file_name());
                std::fs::write(&path, bytes)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Saved {}", path.display());
            }
        }

        Command::Weekly { chart } => match poller.weekly_chart(chart).await? {
            None => println!("No weekly {} data", chart.label()),
            Some(data) => {
                if let Some(title) = data.title() {
                    println!("{title}");
                }
                let names: Vec<String> = data
                    .series
                    .iter()
                    .map(|s| format!("{:>12}", truncate(&s.name, 12)))
                    .collect();
                println!("{:<12}{}", "", names.join(""));
                for (category, values) in data.rows() {
                    let cells: Vec<String> = values
                        .iter()
                        .map(|v| match v {
                            Some(v) => format!("{v:>12.1}"),
                            None => format!("{:>12}", "-"),
                        })
                        .collect();
                    println!("{:<12}{}", truncate(&category, 12), cells.join(""));
                }
            }
        },

        Command::Counts { date, csv } => {
            let rows = ctx.api.active_counts(date).await?;
            for row in &rows {
                println!(
                    "{:<24} {:<16} auto {:>5} manual {:>5} total {:>5}",
                    row.device_name,
                    row.block,
                    row.auto_count,
                    row.manual_count,
                    row.total()
                );
            }
            let totals = CountTotals::of(&rows);
            println!(
                "Total: auto {} manual {} overall {}",
                totals.auto,
                totals.manual,
                totals.total()
            );
            if let Some(path) = csv {
                std::fs::write(&path, counts_to_csv(&rows)?)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }

        Command::Events { count, clear } => {
            if clear {
                ctx.api.clear_events().await?;
                println!("Events cleared");
            } else if count {
                println!("{}", ctx.api.events_count().await?);
            } else {
                for event in ctx.api.events().await? {
                    println!(
                        "{:<20} {:<20} {}",
                        format_opt_datetime(event.created_at.as_ref()),
                        event.source(),
                        truncate(&event.text(), 80)
                    );
                }
            }
        }
    }
    Ok(())
}

/// Load thresholds and weather so motion commands see the current gate
async fn prepare_gate(hub: &ServiceHub, action: RobotAction) {
    if !action.is_motion() {
        return;
    }
    if let Err(e) = hub.poller().refresh_thresholds().await {
        tracing::warn!("Thresholds unavailable, gate stays open: {e}");
    }
    hub.poller().poll_weather().await;
}

async fn watch(hub: &ServiceHub, events: &Receiver<ServiceEvent>) -> anyhow::Result<()> {
    hub.start().await;
    let mut drain = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = drain.tick() => {
                for event in events.try_iter() {
                    print_event(&event);
                }
            }
        }
    }
    hub.stop().await;
    Ok(())
}

fn print_event(event: &ServiceEvent) {
    let now = format_time(&chrono::Local::now());
    match event {
        ServiceEvent::WeatherEvaluated {
            warnings,
            operations_disabled,
        } => {
            if *operations_disabled {
                println!("{now} weather  gate CLOSED: {}", warnings.join("; "));
            } else {
                println!("{now} weather  gate open");
            }
        }
        ServiceEvent::ConnectionState {
            service,
            connected,
            detail,
        } => {
            let state = if *connected { "up" } else { "DOWN" };
            println!("{now} {service:<8} {state} ({detail})");
        }
        ServiceEvent::ActivityRefreshed { running, total } => {
            println!("{now} activity {running}/{total} running");
        }
        ServiceEvent::DashboardRefreshed {
            groups,
            devices,
            active,
            inactive,
        } => {
            println!("{now} fleet    {groups} groups, {devices} robots, {active} active, {inactive} inactive");
        }
        ServiceEvent::TaskUpdated(task) => {
            println!("{now} task     {} {}", task.id, task.status.label());
        }
        ServiceEvent::Notify(n) => {
            println!(
                "{} [{}] {}: {}",
                format_time(&n.timestamp),
                n.level.label(),
                n.title,
                n.message
            );
        }
    }
}

fn print_notifications(events: &Receiver<ServiceEvent>) {
    for event in events.try_iter() {
        if let ServiceEvent::Notify(n) = event {
            eprintln!("[{}] {}: {}", n.level.label(), n.title, n.message);
        }
    }
}

fn print_thresholds(t: &ThresholdConfig) {
    let show = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
    println!("Rain gauge:           {}", show(t.rain_gauge));
    println!("Wind speed:           {}", show(t.wind_speed));
    println!("Wind speed level:     {}", show(t.wind_speed_level));
    println!("Wind direction angle: {}", show(t.wind_direction_angle));
    println!("Humidity:             {}", show(t.humidity));
    if let Some(id) = &t.id {
        println!("(record {id})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_shape() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dispatch_targets() {
        let cli = Cli::try_parse_from(["scr-ops", "dispatch", "home", "--group", "g1", "--group", "g2"])
            .expect("parse");
        let Command::Dispatch { action, target } = cli.command else {
            panic!("expected dispatch");
        };
        assert_eq!(action, RobotAction::Home);
        assert_eq!(
            target.into_target(),
            DispatchTarget::Groups(vec!["g1".into(), "g2".into()])
        );

        assert!(Cli::try_parse_from(["scr-ops", "dispatch", "start"]).is_err());
        assert!(
            Cli::try_parse_from(["scr-ops", "dispatch", "start", "--device", "a", "--group", "g"])
                .is_err()
        );
    }

    #[test]
    fn test_schedule_parses_rfc3339() {
        let cli = Cli::try_parse_from([
            "scr-ops",
            "schedule",
            "--group",
            "g1",
            "--at",
            "2030-05-01T06:30:00+04:00",
        ])
        .expect("parse");
        let Command::Schedule { at, .. } = cli.command else {
            panic!("expected schedule");
        };
        assert_eq!(at.to_rfc3339(), "2030-05-01T02:30:00+00:00");
    }

    #[test]
    fn test_weekly_chart_argument() {
        let cli = Cli::try_parse_from(["scr-ops", "weekly", "panels"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Weekly {
                chart: WeeklyChart::Panels
            }
        ));
        assert!(Cli::try_parse_from(["scr-ops", "weekly", "monthly"]).is_err());
    }

    #[test]
    fn test_threshold_args_keep_unset_fields() {
        let args = ThresholdArgs {
            rain: Some(4.0),
            wind: None,
            wind_level: None,
            wind_angle: None,
            humidity: None,
        };
        let base = ThresholdConfig {
            wind_speed: Some(12.0),
            ..Default::default()
        };
        let merged = args.apply(base);
        assert_eq!(merged.rain_gauge, Some(4.0));
        assert_eq!(merged.wind_speed, Some(12.0));
    }
}
