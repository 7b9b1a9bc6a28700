//! Rewind - HTTP interaction recording and playback
//!
//! Every intercepted request is classified as ignored, stubbed, recordable or
//! unhandled, announced to hooks, and dispatched to its integration's handler
//! for that classification.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod cassette;
pub mod classify;
pub mod config;
pub mod error;
pub mod handler;
pub mod network;
pub mod policy;
pub mod request;

pub use error::{Result, RewindError};
pub use handler::{DispositionHandler, HandlingCycle, RequestHandler};
pub use policy::{HookEvent, HookName, Policy, PolicyContext};
pub use request::{Disposition, Request, Response, TypedRequest};
