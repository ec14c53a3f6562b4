//! Service registry collaborator.
//!
//! # Data Flow
//! ```text
//! discovery dir (**/*.json, sorted)
//!     → discovery.rs (one OperationRequest per file)
//!     → operation.rs (RegistrationOperation under the pipeline)
//!     → client.rs (PUT /v1/agent/service/register, GET check)
//! ```
//!
//! # Design Decisions
//! - One file is one request; a bad file never blocks the others
//! - 429, 5xx and connection failures are retried; other 4xx are final

pub mod client;
pub mod discovery;
pub mod operation;

pub use client::{RegistryClient, RegistryError};
pub use discovery::{discover, DiscoveredDocument, DiscoveryError, DOCUMENT_FIELD};
pub use operation::{RegisteredService, RegistrationOperation, REGISTRATION_OPERATION};
