//! Authorization for privileged host actions.
//!
//! Classifies shell commands, routes requests that are not auto-approved to a
//! pluggable decision authority, and reports each resolution with its trace.

pub mod command_classifier;
pub mod decision_authority;
pub mod permission_gate;
pub mod permission_request;

pub use command_classifier::*;
pub use decision_authority::*;
pub use permission_gate::*;
pub use permission_request::*;
