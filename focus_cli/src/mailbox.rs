//! File-backed remote link shared with the web front end.
//!
//! The front end writes `desired_cmd` into a JSON state object and reads
//! the status fields back. Status pushes merge into the existing object
//! and replace the file atomically (write to a sibling, then rename).
//! Unreadable or malformed state reads as "no command".

use std::fs;
use std::path::{Path, PathBuf};

use focus_core::{CommandSource, RemoteCommand, StatusSink, StatusUpdate};
use serde_json::{Map, Value};

pub const COMMAND_KEY: &str = "desired_cmd";

#[derive(Debug, Clone)]
pub struct FileMailbox {
    path: PathBuf,
}

impl FileMailbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Option<Map<String, Value>> {
        let text = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) | Err(_) => {
                tracing::debug!(path = %self.path.display(), "mailbox is not a JSON object");
                None
            }
        }
    }

    fn store(&self, state: &Map<String, Value>) -> std::io::Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, Value::Object(state.clone()).to_string())?;
        fs::rename(&tmp, &self.path)
    }
}

fn merge(state: &mut Map<String, Value>, update: &StatusUpdate) {
    let mut put = |key: &str, v: Option<Value>| {
        if let Some(v) = v {
            state.insert(key.to_string(), v);
        }
    };
    put("is_running", update.is_running.map(Value::from));
    put("is_homing", update.is_homing.map(Value::from));
    put("current_pos_mm", update.current_pos_mm.map(Value::from));
    put("current_voltage", update.current_voltage.map(Value::from));
    put("best_pos_mm", update.best_pos_mm.map(Value::from));
    put("best_voltage", update.best_voltage.map(Value::from));
    put("focal_length", update.focal_length.map(Value::from));
    if update.clear_command {
        state.insert(COMMAND_KEY.to_string(), Value::from(""));
    }
}

impl CommandSource for FileMailbox {
    fn poll_command(&mut self) -> Option<RemoteCommand> {
        let state = self.load()?;
        let cmd = state.get(COMMAND_KEY)?.as_str()?;
        let parsed = RemoteCommand::parse(cmd);
        if parsed.is_none() && !cmd.trim().is_empty() {
            tracing::debug!(cmd, "ignoring unknown mailbox command");
        }
        parsed
    }
}

impl StatusSink for FileMailbox {
    fn push_status(&mut self, update: &StatusUpdate) {
        let mut state = self.load().unwrap_or_default();
        merge(&mut state, update);
        if let Err(e) = self.store(&state) {
            tracing::debug!(error = %e, path = %self.path.display(), "mailbox write failed");
        }
    }
}
