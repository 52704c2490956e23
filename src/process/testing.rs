//! Test double that replays canned process results and records invocations.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{CommandRunner, Invocation, ProcessOutput};
use crate::error::Result;

#[derive(Default)]
pub(crate) struct ScriptedRunner {
    replies: Mutex<VecDeque<ProcessOutput>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next invocation.
    pub(crate) fn reply(self, exit_code: i32, output: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(ProcessOutput::new(Some(exit_code), output));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted reply for `{invocation}`"));
        Ok(reply)
    }
}
