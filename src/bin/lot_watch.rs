use anyhow::Result;
use log::info;
use parkwatch::config;
use parkwatch::parking::{DashboardStats, WatchedField};
use parkwatch::watch::{ApiClient, PollController, ViewState};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{interval, Duration};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // Load configuration, optionally from a file given as the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    info!("Watching {}", config.watch.api_base_url);

    let client = Arc::new(ApiClient::new(&config.watch.api_base_url)?);
    let controller = Arc::new(PollController::new(client, &config.watch));

    // An initial load failure is terminal for this mount; the error it
    // carries is the user-visible message
    controller.start().await?;

    let mut frame = interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = frame.tick() => {
                let view = controller.view().await;
                print!("{}", render(&view));
                io::stdout().flush()?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Stopping watcher");
    controller.shutdown().await;
    Ok(())
}

/// One terminal frame: banner, stats line, session table. Highlighted
/// fields carry a `*` suffix and new rows a `+` prefix for the duration of
/// the highlight cycle.
fn render(view: &ViewState) -> String {
    let mut out = String::from(CLEAR_SCREEN);

    out.push_str(&format!("parkwatch [{}]", view.phase.as_str()));
    if view.degraded {
        out.push_str("  (fallback data: store unreachable)");
    }
    out.push('\n');

    if let Some(error) = &view.error {
        out.push_str(error);
        out.push('\n');
        return out;
    }

    if let Some(stats) = &view.stats {
        out.push_str(&stats_line(stats, &view.stat_changes));
        out.push('\n');
    }
    out.push('\n');

    out.push_str(&format!(
        " {:<12} {:<10} {:<10} {:<10} {:<11} {:<10}\n",
        "VEHICLE", "ENTRY", "EXIT", "DURATION", "FEE", "STATUS"
    ));

    for row in &view.rows {
        let highlighted =
            |field: WatchedField| view.row_changes.is_highlighted(&row.vehicle_number, field);
        let is_new = view
            .row_changes
            .get(&row.vehicle_number)
            .map(|c| c.is_new)
            .unwrap_or(false);

        out.push_str(&format!(
            "{}{:<12} {:<10} {:<10} {:<10} {:<11} {:<10}\n",
            if is_new { "+" } else { " " },
            row.vehicle_number,
            row.entry_time,
            cell(&row.exit_time, highlighted(WatchedField::ExitTime)),
            cell(&row.duration, highlighted(WatchedField::Duration)),
            cell(&row.fee, highlighted(WatchedField::Fee)),
            cell(&row.status, highlighted(WatchedField::Status)),
        ));
    }

    out
}

fn stats_line(stats: &DashboardStats, changed: &[&'static str]) -> String {
    let mark = |field: &str| {
        if changed.iter().any(|c| *c == field) {
            "*"
        } else {
            ""
        }
    };

    format!(
        "vehicles {}{}  spots free {}{} ({}{}%)  revenue today Rs. {}{}  growth {:+.1}%{} revenue {:+.1}%{} vehicles",
        stats.total_vehicles,
        mark("totalVehicles"),
        stats.available_spots,
        mark("availableSpots"),
        stats.available_percent,
        mark("availablePercent"),
        stats.today_revenue,
        mark("todayRevenue"),
        stats.revenue_growth,
        mark("revenueGrowth"),
        stats.vehicle_growth,
        mark("vehicleGrowth"),
    )
}

fn cell(value: &str, highlighted: bool) -> String {
    if highlighted {
        format!("{}*", value)
    } else {
        value.to_string()
    }
}
