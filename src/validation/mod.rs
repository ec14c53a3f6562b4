//! Request admission subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → request.rs (OperationRequest: id, fields, target)
//!     → validator.rs (RequestSchema checks against the operation's rules)
//!     → ValidatedRequest (borrowed, read-only) handed to the pipeline
//! ```
//!
//! # Design Decisions
//! - Validation is a pure function: no I/O, no retries
//! - All missing and invalid fields are reported together, not just the first
//! - A request never reaches an external collaborator without passing here

pub mod request;
pub mod validator;

pub use request::{OperationRequest, Target};
pub use validator::{FieldKind, FieldRule, InputError, InputValidator, RequestSchema, ValidatedRequest};
