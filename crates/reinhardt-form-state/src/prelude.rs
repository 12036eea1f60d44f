//! Convenience re-exports for common usage.
//!
//! ```
//! use reinhardt_form_state::prelude::*;
//!
//! let form = Form::new(FormOptions::new());
//! let _field = FormField::in_form(&form, FieldOptions::new().with_path("name"));
//! ```

// Error types
pub use crate::error::{FormError, FormResult};

// Form, groups and fields
pub use crate::field::{FieldOptions, FormField, Model};
pub use crate::form::{Form, FormOptions};
pub use crate::group::FormGroup;

// Submit and reset
pub use crate::actions::{ConsumableData, ResetOptions, ResetState, SubmitEvent};
pub use crate::form_data::FormData;

// Values and paths
pub use crate::path::Path;
pub use crate::snapshot::ValueSource;
pub use crate::value::{FileBlob, FormValue, UpdateBehavior};

// Validation
pub use crate::validation::{
	Constraints, InputType, IssueCollection, SchemaResult, ValidationResult, schema_fn,
	standard_schema,
};
