//! Reinhardt Form State - reactive form state and validation engine
//!
//! A headless engine for form controls: values, touched, disabled and error
//! state addressed by dot/bracket paths, with schema-driven validation and
//! submit handling. Rendering is left to the caller.
//!
//! ## Features
//!
//! - **Path-addressable trees**: `"user.tags[0]"` reads and writes nested values
//! - **Dirty tracking**: against an originals snapshot, with revert and reset
//! - **Path lifecycle**: fields register, move and leave through transactions
//! - **Layered validation**: native constraints, field schemas, group schemas
//!   and a form schema, aggregated per scope and debounced on request
//! - **Submit flow**: validated output minus disabled paths, plus form data
//!   flattening for multipart submission
//!
//! ## Architecture
//!
//! - [`path`]: path syntax and tree operations
//! - [`value`]: the [`FormValue`] tree
//! - [`snapshot`]: initial and original copies of a tree
//! - [`context`]: the shared form state
//! - [`transaction`]: path registration, moves and removal
//! - [`observer`]: change notifications
//! - [`validation`]: constraints, schemas, providers and batching
//! - [`field`], [`group`], [`form`](mod@form): the control-level bindings
//! - [`actions`]: submit and reset
//! - [`form_data`]: multipart-style output
//! - [`config`]: engine-wide settings
//!
//! Everything is single-threaded: handles are `Rc`-based and futures are
//! `!Send`, so drive them on a current-thread runtime or a `LocalSet`.
//!
//! ## Example
//!
//! ```
//! use reinhardt_form_state::prelude::*;
//! use serde_json::json;
//!
//! let form = Form::new(FormOptions::new().with_initial_values(json!({"name": "John"})));
//! let name = FormField::in_form(
//!     &form,
//!     FieldOptions::new()
//!         .with_path("name")
//!         .with_constraints(Constraints::new().required()),
//! );
//!
//! name.set_value("");
//! assert_eq!(name.error().as_deref(), Some("This field is required"));
//! assert!(form.is_dirty(None));
//! ```

pub mod actions;
pub mod config;
pub mod context;
pub mod error;
pub mod field;
pub mod form;
pub mod form_data;
pub mod group;
pub mod observer;
pub mod path;
pub mod snapshot;
pub mod transaction;
pub mod validation;
pub mod value;

pub mod prelude;

pub use actions::{ConsumableData, FormActions, ResetOptions, ResetState, SubmitEvent};
pub use config::FormConfig;
pub use context::FormContext;
pub use error::{ConfigError, FormError, FormResult};
pub use field::{FieldOptions, FormField, Model, ModelSubscription};
pub use form::{Form, FormOptions};
pub use form_data::{FormData, FormDataEntry};
pub use group::FormGroup;
pub use observer::{EventBus, FormEvent, Subscription};
pub use path::Path;
pub use snapshot::{FormSnapshot, SnapshotInit, ValueSource};
pub use transaction::{FormTransaction, PathBundle, TransactionId, TransactionView};
pub use validation::{
	BatchFuture, BatchedRequest, Constraints, FnSchema, InputType, IssueCollection, PathKey,
	SchemaContext, SchemaResult, SharedSchema, SourceRegistration, StandardIssue, StandardOutcome,
	StandardSchema, StandardSchemaAdapter, TypedSchema, ValidationMode, ValidationProvider,
	ValidationResult, ValidationScope, ValidationSource, schema_fn, standard_schema,
};
pub use value::{FileBlob, FormMap, FormValue, UpdateBehavior};
