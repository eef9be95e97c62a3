//! Scripted controller for exercising scan logic without hardware.

use crate::error::{Error, Result};
use crate::hci::filter::HciFilter;
use crate::hci::packet::HciCommand;
use crate::hci::Controller;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One observed controller interaction, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MockOp {
    Command(HciCommand),
    SetFilter(HciFilter),
}

#[derive(Default)]
struct Inner {
    ops: Vec<MockOp>,
    /// Scripted `read_event` results, served front to back. While the
    /// queue is non-empty the controller reports itself readable.
    events: VecDeque<std::io::Result<Vec<u8>>>,
    /// Commands that should be rejected with a failure status
    fail_commands: Vec<HciCommand>,
    /// `set_filter` calls allowed to succeed before failing; `None`
    /// means never fail
    set_filter_budget: Option<usize>,
    set_filter_calls: usize,
    filter: HciFilter,
}

/// A controller double driven entirely from a test script.
#[derive(Clone, Default)]
pub(crate) struct MockController {
    inner: Arc<Mutex<Inner>>,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw event buffer to be returned by `read_event`
    pub fn push_event(&self, event: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .events
            .push_back(Ok(event.to_vec()));
    }

    /// Queue a read failure
    pub fn push_read_error(&self, err: std::io::Error) {
        self.inner.lock().unwrap().events.push_back(Err(err));
    }

    /// Make a specific command fail with a non-zero status
    pub fn fail_command(&self, command: HciCommand) {
        self.inner.lock().unwrap().fail_commands.push(command);
    }

    /// Let `budget` calls to `set_filter` succeed, then fail the rest
    pub fn fail_set_filter_after(&self, budget: usize) {
        self.inner.lock().unwrap().set_filter_budget = Some(budget);
    }

    /// Seed the filter returned before anything is installed, without
    /// recording an op
    pub fn seed_filter(&self, filter: HciFilter) {
        self.inner.lock().unwrap().filter = filter;
    }

    pub fn ops(&self) -> Vec<MockOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    pub fn commands(&self) -> Vec<HciCommand> {
        self.inner
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter_map(|op| match op {
                MockOp::Command(command) => Some(command.clone()),
                MockOp::SetFilter(_) => None,
            })
            .collect()
    }
}

impl Controller for MockController {
    fn run_command(&mut self, command: &HciCommand, _timeout: Duration) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(MockOp::Command(command.clone()));

        if inner.fail_commands.contains(command) {
            return Err(Error::ScanConfig(format!(
                "Command 0x{:04x} failed with status 0x0c",
                command.opcode()
            )));
        }

        Ok(())
    }

    fn wait_readable(&mut self, _timeout: Duration) -> std::io::Result<bool> {
        Ok(!self.inner.lock().unwrap().events.is_empty())
    }

    fn read_event(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let next = self.inner.lock().unwrap().events.pop_front();
        match next {
            Some(Ok(event)) => {
                let len = event.len().min(buf.len());
                buf[..len].copy_from_slice(&event[..len]);
                Ok(len)
            }
            Some(Err(err)) => Err(err),
            None => Ok(0),
        }
    }

    fn filter(&mut self) -> std::io::Result<HciFilter> {
        Ok(self.inner.lock().unwrap().filter)
    }

    fn set_filter(&mut self, filter: &HciFilter) -> std::io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(MockOp::SetFilter(*filter));

        inner.set_filter_calls += 1;
        if let Some(budget) = inner.set_filter_budget {
            if inner.set_filter_calls > budget {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "filter rejected",
                ));
            }
        }

        inner.filter = *filter;
        Ok(())
    }
}
