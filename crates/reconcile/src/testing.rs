//! Test support: an invoker that replays scripted outputs
//!
//! Shared with driver crates so their tests run the real engine without
//! spawning processes.

use crate::command::CommandSpec;
use crate::error::{Error, Result};
use crate::invoker::Invoker;
use crate::types::CommandOutput;
use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

enum Reply {
    Output(CommandOutput),
    Timeout(Duration),
}

/// Invoker that records every command and answers from a queue
///
/// Replies are consumed in order. Running out of replies is reported as a
/// spawn error so an unexpected extra invocation fails the test loudly.
#[derive(Default)]
pub struct ScriptedInvoker {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply with the given exit code and streams
    pub fn reply(self, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.push(Reply::Output(CommandOutput::new(exit_code, stdout, stderr)));
        self
    }

    /// Queue a timeout
    pub fn reply_timeout(self, after: Duration) -> Self {
        self.push(Reply::Timeout(after));
        self
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Every command invoked so far
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of commands invoked so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Replies not yet consumed
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or_default()
    }
}

impl Invoker for ScriptedInvoker {
    fn invoke(&self, command: &CommandSpec) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }
        let reply = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Timeout(after)) => Err(Error::Timeout {
                command: command.to_string(),
                after,
            }),
            None => Err(Error::Spawn {
                command: command.to_string(),
                source: io::Error::other("no scripted reply left"),
            }),
        }
    }
}
