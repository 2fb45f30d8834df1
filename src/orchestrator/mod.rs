//! Connect, disconnect and status workflows.
//!
//! Each workflow talks to the collaborators held by a
//! [`Context`](crate::context::Context), streams progress through a
//! [`Reporter`](crate::report::Reporter) and returns a value the report
//! layer turns into the closing summary or JSON document.
pub mod connect;
pub mod disconnect;
pub mod outcome;
pub mod status;

pub use connect::{ConnectRequest, Registration, connect};
pub use disconnect::{DisconnectProbes, Idle};
pub use outcome::{
    ConnectionOutcome, Direction, FeatureOutcome, StepKind, StepOutcome, StepStatus,
};
pub use status::{Probe, SystemStatus, probe_status};
