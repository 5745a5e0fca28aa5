// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Screen rendering for the dashboard views.
//!
//! Raw-mode output: explicit `\r\n` line endings, full clear on every
//! frame. All data comes from fleet-model snapshots.

use std::io::Write;
use std::sync::Arc;

use muster_core::StatsSnapshot;

use crate::color;
use crate::executor::JointReport;
use crate::fleet::{FleetModel, TaskState};
use crate::table::{Column, Table};

const CLEAR: &str = "\x1b[2J\x1b[H";

fn frame(title: &str, lines: Vec<String>, footer: &str) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    write!(out, "{CLEAR}")?;
    write!(out, "{}\r\n\r\n", color::header(title))?;
    for line in lines {
        write!(out, "{line}\r\n")?;
    }
    write!(out, "\r\n{}\r\n", color::muted(footer))?;
    out.flush()
}

fn cpu_cell(stats: Option<StatsSnapshot>) -> String {
    match stats {
        Some(s) if !s.is_unreachable() => format!("{:.1}%", s.cpu),
        Some(_) => "unreachable".to_string(),
        None => "-".to_string(),
    }
}

fn ram_cell(stats: Option<StatsSnapshot>) -> String {
    match stats {
        Some(s) if !s.is_unreachable() => format!("{}/{} MB", s.ram_used, s.ram_total),
        _ => "-".to_string(),
    }
}

/// Top-level view: agents, selection, latest stats, alerts.
pub fn fleet(model: &Arc<FleetModel>, report: Option<&JointReport>) -> std::io::Result<()> {
    let agents = model.agents();
    let selection = model.selection();

    let mut table = Table::new(vec![
        Column::left("#"),
        Column::left("SEL"),
        Column::left("NAME"),
        Column::left("IP").muted(),
        Column::right("CPU"),
        Column::right("RAM").muted(),
    ]);
    for (i, agent) in agents.iter().enumerate() {
        let stats = model.stats_for(&agent.name);
        table.row(vec![
            (i + 1).to_string(),
            if selection.get(i).copied().unwrap_or(false) {
                "[x]".to_string()
            } else {
                "[ ]".to_string()
            },
            agent.name.clone(),
            agent.ip.clone(),
            cpu_cell(stats),
            ram_cell(stats),
        ]);
    }

    let mut lines = table.render();

    let alerts = model.alerts();
    if !alerts.is_empty() {
        lines.push(String::new());
        lines.push(color::header("ALERTS"));
        for alert in alerts.iter().rev().take(3) {
            lines.push(format!(
                "  [{}] {} on {}",
                alert.severity, alert.message, alert.hostname
            ));
        }
    }

    if let Some(report) = report {
        lines.push(String::new());
        lines.push(format!(
            "last command: {} launched, {} failed",
            report.launched.len(),
            report.failed.len()
        ));
        for (agent, error) in &report.failed {
            lines.push(color::muted(&format!("  {agent}: {error}")));
        }
    }

    frame(
        "MUSTER FLEET",
        lines,
        "1-9 toggle  c command  t tasks  s stats  r refresh  ESC quit",
    )
}

/// Task table sub-view.
pub fn tasks(model: &Arc<FleetModel>) -> std::io::Result<()> {
    let mut table = Table::new(vec![
        Column::right("ID"),
        Column::left("AGENT"),
        Column::left("STATE").status(),
        Column::left("COMMAND").max_width(48),
    ]);
    for task in model.tasks() {
        let state = match &task.state {
            TaskState::Error(message) => format!("error: {message}"),
            other => other.label().to_string(),
        };
        table.row(vec![
            task.id.to_string(),
            task.agent.clone(),
            state,
            task.command.clone(),
        ]);
    }

    let lines = if table.is_empty() {
        vec![color::muted("no tasks launched yet")]
    } else {
        table.render()
    };
    frame("TASKS", lines, "any key to return")
}

/// Stats table sub-view.
pub fn stats(model: &Arc<FleetModel>) -> std::io::Result<()> {
    let mut table = Table::new(vec![
        Column::left("AGENT"),
        Column::right("CPU"),
        Column::right("RAM USED"),
        Column::right("RAM TOTAL"),
        Column::left("STATE").status(),
    ]);
    for agent in model.agents() {
        let stats = model.stats_for(&agent.name);
        let state = match stats {
            Some(s) if s.is_unreachable() => "unreachable",
            Some(_) => "ok",
            None => "-",
        };
        let (used, total) = match stats {
            Some(s) if !s.is_unreachable() => {
                (format!("{} MB", s.ram_used), format!("{} MB", s.ram_total))
            }
            _ => ("-".to_string(), "-".to_string()),
        };
        table.row(vec![
            agent.name.clone(),
            cpu_cell(stats),
            used,
            total,
            state.to_string(),
        ]);
    }
    frame("STATS", table.render(), "any key to return")
}
