// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task supervisor: spawns child processes and owns their lifecycle.
//!
//! Each submitted command becomes one task: a record in the table plus
//! one supervising tokio task that streams the child's merged
//! stdout/stderr line-by-line onto the main channel and emits exactly
//! one `task_complete` when the child is gone. The table mutex guards
//! only insert/lookup/flag operations; the supervising task refers to
//! its record by id alone.

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use muster_core::{ApiError, Channel, Clock, StreamEvent, TaskId, TaskSnapshot};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::streams::StreamHub;

/// A single output line (or oversize fragment) never exceeds this many
/// bytes; longer lines are flushed in fragments.
pub const LINE_LIMIT: usize = 4096;

/// Exit code reported when the child could not be spawned.
pub const SPAWN_FAILURE_EXIT: i32 = -1;

struct TaskRecord {
    command: String,
    output: String,
    running: bool,
    pgid: Option<i32>,
}

/// Process-scoped task supervisor.
pub struct TaskSupervisor {
    tasks: Mutex<HashMap<TaskId, TaskRecord>>,
    next_id: AtomicU64,
    hub: Arc<StreamHub>,
    clock: Arc<dyn Clock>,
    shell: std::path::PathBuf,
}

impl TaskSupervisor {
    pub fn new(hub: Arc<StreamHub>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Self::with_shell(hub, clock, "/bin/sh")
    }

    /// Supervisor running commands through a specific shell binary.
    pub fn with_shell(
        hub: Arc<StreamHub>,
        clock: Arc<dyn Clock>,
        shell: impl Into<std::path::PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            hub,
            clock,
            shell: shell.into(),
        })
    }

    /// Accept a command, record it as running, and launch its
    /// supervising task. Returns before the child produces output.
    pub fn submit(self: &Arc<Self>, command: &str, env: &HashMap<String, String>) -> TaskId {
        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        {
            let mut tasks = self.tasks.lock();
            tasks.insert(
                id,
                TaskRecord {
                    command: command.to_string(),
                    output: String::new(),
                    running: true,
                    pgid: None,
                },
            );
        }

        info!(task_id = %id, command, "task submitted");
        self.hub.broadcast(
            Channel::Main,
            &StreamEvent::TaskStart {
                task_id: id,
                command: command.to_string(),
            },
        );

        let supervisor = Arc::clone(self);
        let command = command.to_string();
        let env = env.clone();
        tokio::spawn(async move {
            supervise(supervisor, id, command, env).await;
        });

        id
    }

    /// Best-effort SIGKILL to the task's process group. Success of the
    /// call does not imply the child has terminated.
    pub fn kill(&self, id: TaskId) -> Result<(), ApiError> {
        let pgid = {
            let tasks = self.tasks.lock();
            let record = tasks
                .get(&id)
                .ok_or_else(|| ApiError::not_found(format!("unknown task id {id}")))?;
            if !record.running {
                return Ok(());
            }
            record.pgid
        };

        if let Some(pgid) = pgid {
            match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                Ok(()) => info!(task_id = %id, pgid, "killed task process group"),
                Err(nix::errno::Errno::ESRCH) => {
                    debug!(task_id = %id, pgid, "process group already gone")
                }
                Err(e) => {
                    return Err(ApiError::internal(format!("kill failed: {e}")));
                }
            }
        }
        Ok(())
    }

    /// Snapshot of every task, ordered by id.
    pub fn list(&self) -> Vec<TaskSnapshot> {
        let tasks = self.tasks.lock();
        let mut out: Vec<TaskSnapshot> = tasks
            .iter()
            .map(|(id, record)| TaskSnapshot {
                id: *id,
                command: record.command.clone(),
                running: record.running,
            })
            .collect();
        out.sort_by_key(|t| t.id);
        out
    }

    /// The captured output buffer, verbatim. `None` for unknown ids.
    pub fn output(&self, id: TaskId) -> Option<String> {
        let tasks = self.tasks.lock();
        tasks.get(&id).map(|record| record.output.clone())
    }

    pub fn is_running(&self, id: TaskId) -> Option<bool> {
        let tasks = self.tasks.lock();
        tasks.get(&id).map(|record| record.running)
    }

    fn record_pgid(&self, id: TaskId, pgid: i32) {
        let mut tasks = self.tasks.lock();
        if let Some(record) = tasks.get_mut(&id) {
            record.pgid = Some(pgid);
        }
    }

    fn append_output(&self, id: TaskId, chunk: &str) {
        let mut tasks = self.tasks.lock();
        if let Some(record) = tasks.get_mut(&id) {
            record.output.push_str(chunk);
        }
    }

    /// Flip `running` to false and emit the single `task_complete`.
    ///
    /// The flag transitions true to false exactly once; a second call
    /// for the same id is a no-op.
    fn finish(&self, id: TaskId, exit_code: i32) {
        {
            let mut tasks = self.tasks.lock();
            match tasks.get_mut(&id) {
                Some(record) if record.running => record.running = false,
                _ => return,
            }
        }
        info!(task_id = %id, exit_code, "task complete");
        self.hub.broadcast(
            Channel::Main,
            &StreamEvent::TaskComplete {
                task_id: id,
                exit_code,
            },
        );
    }
}

/// Own one child process from spawn to exit.
async fn supervise(
    supervisor: Arc<TaskSupervisor>,
    id: TaskId,
    command: String,
    env: HashMap<String, String>,
) {
    let mut cmd = Command::new(&supervisor.shell);
    cmd.arg("-c")
        .arg(&command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    for (key, value) in &env {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(task_id = %id, error = %e, "spawn failed");
            supervisor.finish(id, SPAWN_FAILURE_EXIT);
            return;
        }
    };

    // The child leads its own process group (process_group(0)), so its
    // pid doubles as the pgid used by kill().
    if let Some(pid) = child.id() {
        supervisor.record_pgid(id, pid as i32);
    }

    let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(read_lines(stdout, line_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(read_lines(stderr, line_tx.clone()));
    }
    drop(line_tx);

    // Both pipe readers feed one queue; the channel closing means both
    // pipes hit EOF.
    while let Some(chunk) = line_rx.recv().await {
        supervisor.append_output(id, &chunk);
        supervisor.hub.broadcast(
            Channel::Main,
            &StreamEvent::TaskOutput {
                task_id: id,
                output: chunk,
                timestamp: supervisor.clock.now_ms(),
            },
        );
    }

    let exit_code = match child.wait().await {
        Ok(status) => status
            .code()
            .or_else(|| status.signal().map(|sig| -sig))
            .unwrap_or(0),
        Err(e) => {
            warn!(task_id = %id, error = %e, "wait failed");
            0
        }
    };

    supervisor.finish(id, exit_code);
}

/// Read one pipe line-by-line, flushing oversize lines as fragments of
/// at most [`LINE_LIMIT`] bytes.
///
/// A fragment cut mid-line may end inside a multi-byte UTF-8 sequence;
/// those trailing bytes are carried into the next read instead of being
/// decoded on their own, so concatenated fragments reproduce the
/// child's bytes exactly.
async fn read_lines<R: tokio::io::AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf: Vec<u8> = Vec::with_capacity(LINE_LIMIT);
    let mut carry: Vec<u8> = Vec::new();
    loop {
        buf.clear();
        buf.append(&mut carry);
        let room = (LINE_LIMIT - buf.len()) as u64;
        let n = {
            let mut limited = (&mut reader).take(room);
            match limited.read_until(b'\n', &mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "pipe read failed");
                    break;
                }
            }
        };

        if n == 0 {
            // EOF: flush a carried partial character, if any.
            if !buf.is_empty() {
                let _ = tx.send(String::from_utf8_lossy(&buf).into_owned()).await;
            }
            break;
        }

        if buf.last() != Some(&b'\n') {
            let hold = incomplete_utf8_suffix(&buf);
            if hold > 0 {
                carry.extend_from_slice(&buf[buf.len() - hold..]);
                buf.truncate(buf.len() - hold);
            }
            if buf.is_empty() {
                continue;
            }
        }

        let chunk = String::from_utf8_lossy(&buf).into_owned();
        if tx.send(chunk).await.is_err() {
            break;
        }
    }
}

/// Number of trailing bytes that start a UTF-8 sequence whose
/// continuation bytes have not arrived yet. At most three bytes are
/// ever held back; trailing bytes that can never complete (bare
/// continuations, invalid leads) are not carried.
fn incomplete_utf8_suffix(buf: &[u8]) -> usize {
    let len = buf.len();
    for back in 1..=len.min(3) {
        let byte = buf[len - back];
        if byte & 0xC0 != 0x80 {
            let width = match byte {
                0xC0..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF7 => 4,
                _ => return 0,
            };
            return if width > back { back } else { 0 };
        }
    }
    0
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
