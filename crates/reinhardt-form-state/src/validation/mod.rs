//! Validation pipeline
//!
//! - [`constraints`]: synchronous native constraint checks for one control
//! - [`schema`]: contracts for pluggable schema validators
//! - [`provider`]: per-scope aggregation of field, group and schema results
//! - [`batch`]: debounce and coalescing of validation requests
//! - [`result`]: the result and issue types every layer reports

pub mod batch;
pub mod constraints;
pub mod provider;
pub mod result;
pub mod schema;

pub use batch::{BatchFuture, BatchedRequest};
pub use constraints::{Constraints, InputType};
pub use provider::{SourceRegistration, ValidationProvider, ValidationSource};
pub use result::{IssueCollection, ValidationMode, ValidationResult, ValidationScope};
pub use schema::{
	FnSchema, PathKey, SchemaContext, SchemaResult, SharedSchema, StandardIssue, StandardOutcome,
	StandardSchema, StandardSchemaAdapter, TypedSchema, schema_fn, standard_schema,
};
