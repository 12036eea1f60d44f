//! # Reinhardt Formkit
//!
//! Headless form state for Reinhardt frontends.
//!
//! Formkit tracks what a form holds (values, touched and disabled flags,
//! errors), validates it with native constraints and pluggable schemas, and
//! produces submittable output. It renders nothing: bind [`FormField`]s to
//! your own inputs and read the state back.
//!
//! ## Quick Example
//!
//! ```
//! use reinhardt_formkit::prelude::*;
//! use serde_json::json;
//!
//! # block_on(async {
//! let form = Form::new(FormOptions::new().with_initial_values(json!({"user": {"name": ""}})));
//! let name = FormField::in_form(
//!     &form,
//!     FieldOptions::new()
//!         .with_path("user.name")
//!         .with_constraints(Constraints::new().required()),
//! );
//!
//! let submit = form.handle_submit(|data| async move { data.to_json() });
//! assert_eq!(submit(None).await.unwrap(), None);
//! assert_eq!(form.get_submit_error("user.name").as_deref(), Some("This field is required"));
//! assert!(name.is_touched());
//!
//! name.set_value("Ada");
//! assert_eq!(submit(None).await.unwrap(), Some(json!({"user": {"name": "Ada"}})));
//! # });
//! # fn block_on(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub use reinhardt_form_state as form_state;

pub use reinhardt_form_state::{
	ConsumableData, Constraints, FieldOptions, FileBlob, Form, FormConfig, FormData, FormError,
	FormField, FormGroup, FormOptions, FormResult, FormValue, InputType, IssueCollection, Model,
	Path, ResetOptions, ResetState, SchemaResult, SubmitEvent, UpdateBehavior, ValidationResult,
	ValueSource, schema_fn, standard_schema,
};

/// Prelude module for convenient imports
pub mod prelude {
	pub use reinhardt_form_state::prelude::*;
}
