//! Bluetooth LE scan session management
//!
//! This module owns the controller-facing half of discovery: putting the
//! controller into passive scan mode, installing the event filter that
//! admits advertising reports, and undoing both on teardown.

use crate::error::{Error, Result};
use crate::hci::constants::*;
use crate::hci::filter::HciFilter;
use crate::hci::packet::HciCommand;
use crate::hci::socket::{device_index, HciSocket};
use crate::hci::Controller;
use log::warn;
use std::time::Duration;

/// Controller-level scan settings.
///
/// Interval and window are in 0.625ms units; the defaults scan for 10ms
/// every 10ms, matching common passive discovery setups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub scan_interval: u16,
    pub scan_window: u16,
    /// Let the controller suppress repeat advertisements per device
    pub filter_duplicates: bool,
    /// How long to wait for the controller to acknowledge each command
    pub command_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_interval: 0x0010,
            scan_window: 0x0010,
            filter_duplicates: true,
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// A scan session over one exclusively-owned controller handle.
///
/// The session tracks whether scanning is enabled and holds the filter
/// snapshot taken before its own filter was installed. It knows nothing
/// about decoding; it only moves the controller between states.
pub struct ScanSession<C> {
    controller: C,
    config: ScanConfig,
    saved_filter: Option<HciFilter>,
    scanning: bool,
}

impl ScanSession<HciSocket> {
    /// Opens a session on a named device such as `"hci0"`
    pub fn open(device: &str) -> Result<Self> {
        let index = device_index(device)?;
        let socket = HciSocket::open(index)?;
        Ok(Self::new(socket, ScanConfig::default()))
    }
}

impl<C: Controller> ScanSession<C> {
    pub fn new(controller: C, config: ScanConfig) -> Self {
        Self {
            controller,
            config,
            saved_filter: None,
            scanning: false,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Puts the controller into passive scan mode: set scan parameters,
    /// then enable scanning.
    ///
    /// Fails if scanning is already enabled on this session.
    pub fn enable_scan_mode(&mut self) -> Result<()> {
        if self.scanning {
            return Err(Error::ScanConfig(
                "Scanning is already enabled on this controller".to_string(),
            ));
        }

        let parameters = HciCommand::LeSetScanParameters {
            scan_type: LE_SCAN_PASSIVE,
            scan_interval: self.config.scan_interval,
            scan_window: self.config.scan_window,
            own_address_type: LE_PUBLIC_ADDRESS,
            filter_policy: 0x00,
        };
        self.controller
            .run_command(&parameters, self.config.command_timeout)
            .map_err(|err| privilege_hint("Failed to set scan parameters", err))?;

        let enable = HciCommand::LeSetScanEnable {
            enable: true,
            filter_duplicates: self.config.filter_duplicates,
        };
        self.controller
            .run_command(&enable, self.config.command_timeout)
            .map_err(|err| privilege_hint("Failed to enable scanning", err))?;

        self.scanning = true;
        Ok(())
    }

    /// Takes the controller out of scan mode.
    ///
    /// Fails if scanning was never enabled on this session.
    pub fn disable_scan_mode(&mut self) -> Result<()> {
        if !self.scanning {
            return Err(Error::ScanConfig(
                "Scanning is not enabled on this controller".to_string(),
            ));
        }

        let disable = HciCommand::LeSetScanEnable {
            enable: false,
            filter_duplicates: self.config.filter_duplicates,
        };
        self.controller
            .run_command(&disable, self.config.command_timeout)?;

        self.scanning = false;
        Ok(())
    }

    /// Saves the controller's current event filter and installs one that
    /// only admits LE meta events
    pub fn install_filter(&mut self) -> Result<()> {
        let saved = self.controller.filter().map_err(Error::Filter)?;

        let mut scan_filter = HciFilter::new();
        scan_filter.set_packet_type(HCI_EVENT_PKT);
        scan_filter.set_event(EVT_LE_META_EVENT);
        self.controller
            .set_filter(&scan_filter)
            .map_err(Error::Filter)?;

        self.saved_filter = Some(saved);
        Ok(())
    }

    /// Puts the saved filter back. Best effort: a failure here is logged
    /// and swallowed since this runs during teardown.
    pub fn restore_filter(&mut self) {
        if let Some(saved) = self.saved_filter.take() {
            if let Err(err) = self.controller.set_filter(&saved) {
                warn!("Failed to restore socket filter: {}", err);
            }
        }
    }

    /// Waits for the controller to have an event ready
    pub fn wait_readable(&mut self, timeout: Duration) -> std::io::Result<bool> {
        self.controller.wait_readable(timeout)
    }

    /// Reads one raw event packet
    pub fn read_event(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.controller.read_event(buf)
    }
}

fn privilege_hint(what: &str, err: Error) -> Error {
    match err {
        Error::ScanConfig(cause) => {
            Error::ScanConfig(format!("{}: {} (are you root?)", what, cause))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hci::mock::{MockController, MockOp};

    fn session(controller: &MockController) -> ScanSession<MockController> {
        ScanSession::new(controller.clone(), ScanConfig::default())
    }

    #[test]
    fn test_enable_sends_passive_parameters_then_enable() {
        let controller = MockController::new();
        let mut session = session(&controller);

        session.enable_scan_mode().unwrap();
        assert!(session.is_scanning());

        let commands = controller.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0],
            HciCommand::LeSetScanParameters {
                scan_type: LE_SCAN_PASSIVE,
                scan_interval: 0x0010,
                scan_window: 0x0010,
                own_address_type: LE_PUBLIC_ADDRESS,
                filter_policy: 0x00,
            }
        );
        assert_eq!(
            commands[1],
            HciCommand::LeSetScanEnable {
                enable: true,
                filter_duplicates: true,
            }
        );
    }

    #[test]
    fn test_enable_twice_fails() {
        let controller = MockController::new();
        let mut session = session(&controller);

        session.enable_scan_mode().unwrap();
        let err = session.enable_scan_mode().unwrap_err();

        assert!(matches!(err, Error::ScanConfig(_)));
        // No commands beyond the first enable pair
        assert_eq!(controller.commands().len(), 2);
    }

    #[test]
    fn test_disable_without_enable_fails() {
        let controller = MockController::new();
        let mut session = session(&controller);

        let err = session.disable_scan_mode().unwrap_err();

        assert!(matches!(err, Error::ScanConfig(_)));
        assert!(controller.commands().is_empty());
    }

    #[test]
    fn test_enable_failure_mentions_privileges() {
        let controller = MockController::new();
        controller.fail_command(HciCommand::LeSetScanParameters {
            scan_type: LE_SCAN_PASSIVE,
            scan_interval: 0x0010,
            scan_window: 0x0010,
            own_address_type: LE_PUBLIC_ADDRESS,
            filter_policy: 0x00,
        });
        let mut session = session(&controller);

        let err = session.enable_scan_mode().unwrap_err();

        assert!(err.to_string().contains("are you root?"));
        assert!(!session.is_scanning());
        // The enable command is never issued after the parameters fail
        assert_eq!(controller.commands().len(), 1);
    }

    #[test]
    fn test_install_and_restore_filter() {
        let controller = MockController::new();
        let mut original = HciFilter::new();
        original.set_packet_type(HCI_ACL_PKT);
        controller.seed_filter(original);

        let mut session = session(&controller);
        session.install_filter().unwrap();

        let ops = controller.ops();
        match &ops[0] {
            MockOp::SetFilter(installed) => {
                assert!(installed.accepts_packet_type(HCI_EVENT_PKT));
                assert!(installed.accepts_event(EVT_LE_META_EVENT));
                assert!(!installed.accepts_event(EVT_CMD_COMPLETE));
            }
            other => panic!("unexpected op {:?}", other),
        }

        session.restore_filter();
        assert_eq!(*controller.ops().last().unwrap(), MockOp::SetFilter(original));
    }

    #[test]
    fn test_restore_filter_swallows_errors() {
        let controller = MockController::new();
        controller.fail_set_filter_after(1);

        let mut session = session(&controller);
        session.install_filter().unwrap();

        // The failing restore must not panic or surface an error
        session.restore_filter();
        assert_eq!(controller.ops().len(), 2);

        // The snapshot is consumed either way
        session.restore_filter();
        assert_eq!(controller.ops().len(), 2);
    }

    #[test]
    fn test_restore_without_install_is_a_no_op() {
        let controller = MockController::new();
        let mut session = session(&controller);

        session.restore_filter();
        assert!(controller.ops().is_empty());
    }
}
