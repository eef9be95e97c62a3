pub mod session;
pub mod types;


pub use session::{
    CancellationToken, DiscoveryCallback, DiscoveryConfig, DiscoverySession, EirReportDecoder,
    ReportDecoder, SessionState, DEFAULT_DEVICE,
};
pub use types::*;
