// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive terminal view over the fleet model.
//!
//! Top-level view: the fleet list with selection toggles. Sub-views
//! (tasks, stats) return to the top level on any key; ESC at the top
//! level exits. A background task refreshes the model on the
//! configured interval; the view only reads snapshots.

mod render;

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal;
use futures_util::StreamExt;
use tokio::sync::Notify;
use tracing::debug;

use crate::client::AgentApi;
use crate::executor::{run_joint, JointReport};
use crate::fleet::FleetModel;
use crate::streams;
use muster_core::{Alert, Channel, StreamEvent};

/// Which screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Fleet,
    Tasks,
    Stats,
}

/// Run the dashboard until the user exits. Returns cleanly on ESC.
pub async fn run(
    model: Arc<FleetModel>,
    api: Arc<dyn AgentApi>,
    refresh_interval: Duration,
) -> std::io::Result<()> {
    // Background refresher; poke wakes it for an immediate refresh.
    let poke = Arc::new(Notify::new());
    let refresher = {
        let model = Arc::clone(&model);
        let api = Arc::clone(&api);
        let poke = Arc::clone(&poke);
        tokio::spawn(async move {
            loop {
                model.refresh(Arc::clone(&api)).await;
                tokio::select! {
                    _ = tokio::time::sleep(refresh_interval) => {}
                    _ = poke.notified() => {}
                }
            }
        })
    };

    // Follow each agent's main channel so CPU alerts reach the fleet
    // view without waiting for a poll.
    let mut watchers = Vec::new();
    for agent in model.agents() {
        let model = Arc::clone(&model);
        watchers.push(tokio::spawn(async move {
            let Ok(mut events) = streams::subscribe(&agent, Channel::Main).await else {
                debug!(agent = %agent.name, "main channel unavailable");
                return;
            };
            while let Some(event) = events.recv().await {
                if let StreamEvent::CpuAlert {
                    hostname,
                    message,
                    timestamp,
                    ..
                } = event
                {
                    model.record_alert(Alert::cpu(hostname, message, timestamp));
                }
            }
        }));
    }

    terminal::enable_raw_mode()?;
    let result = event_loop(&model, &api, &poke).await;
    terminal::disable_raw_mode()?;
    refresher.abort();
    for watcher in watchers {
        watcher.abort();
    }

    // Leave the alternate content behind cleanly.
    println!();
    result
}

async fn event_loop(
    model: &Arc<FleetModel>,
    api: &Arc<dyn AgentApi>,
    poke: &Arc<Notify>,
) -> std::io::Result<()> {
    let mut events = EventStream::new();
    let mut view = View::Fleet;
    let mut last_report: Option<JointReport> = None;

    loop {
        match view {
            View::Fleet => render::fleet(model, last_report.as_ref())?,
            View::Tasks => render::tasks(model)?,
            View::Stats => render::stats(model)?,
        }

        // Redraw on every key or on the refresh cadence.
        let event = tokio::select! {
            event = events.next() => event,
            _ = tokio::time::sleep(Duration::from_millis(500)) => continue,
        };

        let key = match event {
            Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => key,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(error = %e, "terminal event error");
                continue;
            }
            None => return Ok(()),
        };

        match view {
            View::Fleet => match key_action(&key) {
                Action::Quit => return Ok(()),
                Action::Toggle(index) => model.toggle(index),
                Action::Command => {
                    // The event stream owns the tty reader; release it
                    // while the prompt reads a line from stdin.
                    drop(events);
                    last_report = prompt_and_dispatch(model, api).await?;
                    events = EventStream::new();
                    poke.notify_one();
                }
                Action::ShowTasks => view = View::Tasks,
                Action::ShowStats => view = View::Stats,
                Action::Refresh => poke.notify_one(),
                Action::None => {}
            },
            // Any key returns to the top-level view.
            View::Tasks | View::Stats => view = View::Fleet,
        }
    }
}

enum Action {
    Quit,
    Toggle(usize),
    Command,
    ShowTasks,
    ShowStats,
    Refresh,
    None,
}

fn key_action(key: &KeyEvent) -> Action {
    match key.code {
        KeyCode::Esc => Action::Quit,
        KeyCode::Char(c @ '1'..='9') => Action::Toggle(c as usize - '1' as usize),
        KeyCode::Char('c') => Action::Command,
        KeyCode::Char('t') => Action::ShowTasks,
        KeyCode::Char('s') => Action::ShowStats,
        KeyCode::Char('r') => Action::Refresh,
        _ => Action::None,
    }
}

/// Leave raw mode for a line-edited command prompt, then dispatch the
/// command to the selected agents.
async fn prompt_and_dispatch(
    model: &Arc<FleetModel>,
    api: &Arc<dyn AgentApi>,
) -> std::io::Result<Option<JointReport>> {
    if model.selected_agents().is_empty() {
        return Ok(None);
    }

    terminal::disable_raw_mode()?;
    print!("\r\ncommand> ");
    use std::io::Write;
    std::io::stdout().flush()?;

    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))??;
    terminal::enable_raw_mode()?;

    let command = line.trim();
    if command.is_empty() {
        return Ok(None);
    }
    Ok(Some(run_joint(model, Arc::clone(api), command).await))
}
