//! Form value tree
//!
//! `FormValue` is the JSON-like tree every form store is built from. It differs
//! from `serde_json::Value` in two ways:
//!
//! - Objects preserve insertion order (`IndexMap`), which keeps serialized
//!   `FormData` entries in the order fields were written.
//! - A `File` leaf carries an opaque binary payload, so file pickers can live
//!   in the same tree as text inputs.
//!
//! ## Example
//!
//! ```
//! use reinhardt_form_state::FormValue;
//! use serde_json::json;
//!
//! let value = FormValue::from(json!({"name": "John", "tags": ["a", "b"]}));
//! assert_eq!(value.get_key("name"), Some(&FormValue::from("John")));
//! assert_eq!(value.to_json(), json!({"name": "John", "tags": ["a", "b"]}));
//! ```

use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered map used for object nodes.
pub type FormMap = IndexMap<String, FormValue>;

/// A node of the form value tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FormValue {
	/// An explicit empty value
	#[default]
	Null,
	/// Boolean leaf (checkboxes, switches)
	Bool(bool),
	/// Numeric leaf, kept exactly as JSON numbers are
	Number(serde_json::Number),
	/// Text leaf
	String(String),
	/// Ordered list of values
	Array(Vec<FormValue>),
	/// Object keyed by field name
	Object(FormMap),
	/// Opaque file payload
	File(FileBlob),
}

/// Opaque binary payload attached to a form value (a selected file).
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::FileBlob;
///
/// let file = FileBlob::new("avatar.png", b"\x89PNG".to_vec()).with_content_type("image/png");
/// assert_eq!(file.name(), "avatar.png");
/// assert_eq!(file.content_type(), Some("image/png"));
/// assert_eq!(file.len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
	name: String,
	content_type: Option<String>,
	data: Bytes,
}

impl FileBlob {
	/// Create a file payload from a name and its contents
	pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
		Self {
			name: name.into(),
			content_type: None,
			data: data.into(),
		}
	}

	/// Set the MIME type of the payload
	pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn content_type(&self) -> Option<&str> {
		self.content_type.as_deref()
	}

	pub fn data(&self) -> &Bytes {
		&self.data
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

/// How an incoming tree is combined with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateBehavior {
	/// Deep-merge the incoming tree onto the existing one
	#[default]
	Merge,
	/// Drop the existing content before writing the incoming tree
	Replace,
}

impl FormValue {
	/// An empty object node
	pub fn object() -> Self {
		FormValue::Object(FormMap::new())
	}

	pub fn is_null(&self) -> bool {
		matches!(self, FormValue::Null)
	}

	/// Whether this node is an object or an array
	pub fn is_container(&self) -> bool {
		matches!(self, FormValue::Object(_) | FormValue::Array(_))
	}

	/// Whether this node is an object or array without children
	pub fn is_empty_container(&self) -> bool {
		match self {
			FormValue::Object(map) => map.is_empty(),
			FormValue::Array(items) => items.is_empty(),
			_ => false,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			FormValue::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			FormValue::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			FormValue::Number(n) => n.as_f64(),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&FormMap> {
		match self {
			FormValue::Object(map) => Some(map),
			_ => None,
		}
	}

	pub fn as_object_mut(&mut self) -> Option<&mut FormMap> {
		match self {
			FormValue::Object(map) => Some(map),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&Vec<FormValue>> {
		match self {
			FormValue::Array(items) => Some(items),
			_ => None,
		}
	}

	pub fn as_file(&self) -> Option<&FileBlob> {
		match self {
			FormValue::File(file) => Some(file),
			_ => None,
		}
	}

	/// Look up a direct child of an object node
	pub fn get_key(&self, key: &str) -> Option<&FormValue> {
		self.as_object().and_then(|map| map.get(key))
	}

	/// Deep-merge `incoming` into `self`.
	///
	/// Objects are merged key by key; every other combination replaces the
	/// existing node with the incoming one.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_form_state::FormValue;
	/// use serde_json::json;
	///
	/// let mut value = FormValue::from(json!({"user": {"name": "John", "age": 30}}));
	/// value.deep_merge(FormValue::from(json!({"user": {"age": 31}, "active": true})));
	/// assert_eq!(
	///     value.to_json(),
	///     json!({"user": {"name": "John", "age": 31}, "active": true})
	/// );
	/// ```
	pub fn deep_merge(&mut self, incoming: FormValue) {
		match (self, incoming) {
			(FormValue::Object(target), FormValue::Object(source)) => {
				for (key, value) in source {
					match target.get_mut(&key) {
						Some(existing) => existing.deep_merge(value),
						None => {
							target.insert(key, value);
						}
					}
				}
			}
			(target, incoming) => *target = incoming,
		}
	}

	/// Render the tree as JSON.
	///
	/// File leaves are not JSON-serializable and become empty objects.
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			FormValue::Null => serde_json::Value::Null,
			FormValue::Bool(b) => serde_json::Value::Bool(*b),
			FormValue::Number(n) => serde_json::Value::Number(n.clone()),
			FormValue::String(s) => serde_json::Value::String(s.clone()),
			FormValue::Array(items) => {
				serde_json::Value::Array(items.iter().map(FormValue::to_json).collect())
			}
			FormValue::Object(map) => serde_json::Value::Object(
				map.iter()
					.map(|(key, value)| (key.clone(), value.to_json()))
					.collect(),
			),
			FormValue::File(_) => serde_json::Value::Object(serde_json::Map::new()),
		}
	}

	/// Render a scalar leaf the way it appears in a text form entry
	pub(crate) fn to_text(&self) -> String {
		match self {
			FormValue::Null => String::new(),
			FormValue::Bool(b) => b.to_string(),
			FormValue::Number(n) => n.to_string(),
			FormValue::String(s) => s.clone(),
			other => other.to_json().to_string(),
		}
	}
}

impl From<serde_json::Value> for FormValue {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => FormValue::Null,
			serde_json::Value::Bool(b) => FormValue::Bool(b),
			serde_json::Value::Number(n) => FormValue::Number(n),
			serde_json::Value::String(s) => FormValue::String(s),
			serde_json::Value::Array(items) => {
				FormValue::Array(items.into_iter().map(FormValue::from).collect())
			}
			serde_json::Value::Object(map) => FormValue::Object(
				map.into_iter()
					.map(|(key, value)| (key, FormValue::from(value)))
					.collect(),
			),
		}
	}
}

impl From<&str> for FormValue {
	fn from(value: &str) -> Self {
		FormValue::String(value.to_string())
	}
}

impl From<String> for FormValue {
	fn from(value: String) -> Self {
		FormValue::String(value)
	}
}

impl From<bool> for FormValue {
	fn from(value: bool) -> Self {
		FormValue::Bool(value)
	}
}

impl From<i64> for FormValue {
	fn from(value: i64) -> Self {
		FormValue::Number(value.into())
	}
}

impl From<i32> for FormValue {
	fn from(value: i32) -> Self {
		FormValue::Number(value.into())
	}
}

impl From<u64> for FormValue {
	fn from(value: u64) -> Self {
		FormValue::Number(value.into())
	}
}

impl From<f64> for FormValue {
	/// Non-finite numbers have no JSON representation and become `Null`
	fn from(value: f64) -> Self {
		serde_json::Number::from_f64(value)
			.map(FormValue::Number)
			.unwrap_or(FormValue::Null)
	}
}

impl From<FileBlob> for FormValue {
	fn from(value: FileBlob) -> Self {
		FormValue::File(value)
	}
}

impl<T: Into<FormValue>> From<Vec<T>> for FormValue {
	fn from(values: Vec<T>) -> Self {
		FormValue::Array(values.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<FormValue>> From<Option<T>> for FormValue {
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or(FormValue::Null)
	}
}

impl FromIterator<(String, FormValue)> for FormValue {
	fn from_iter<I: IntoIterator<Item = (String, FormValue)>>(iter: I) -> Self {
		FormValue::Object(iter.into_iter().collect())
	}
}

impl Serialize for FormValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.to_json().serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for FormValue {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		serde_json::Value::deserialize(deserializer).map(FormValue::from)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_json_conversion_preserves_key_order() {
		let value = FormValue::from(json!({"b": 1, "a": 2, "c": 3}));
		let keys: Vec<&str> = value
			.as_object()
			.unwrap()
			.keys()
			.map(String::as_str)
			.collect();

		assert_eq!(keys, vec!["b", "a", "c"]);
	}

	#[rstest]
	fn test_file_leaf_serializes_as_empty_object() {
		let mut value = FormValue::object();
		value
			.as_object_mut()
			.unwrap()
			.insert("avatar".to_string(), FileBlob::new("a.png", vec![1, 2]).into());
		value
			.as_object_mut()
			.unwrap()
			.insert("name".to_string(), "John".into());

		assert_eq!(value.to_json(), json!({"avatar": {}, "name": "John"}));
		assert_eq!(
			serde_json::to_string(&value).unwrap(),
			r#"{"avatar":{},"name":"John"}"#
		);
	}

	#[rstest]
	fn test_deep_merge_replaces_arrays() {
		let mut value = FormValue::from(json!({"tags": ["a", "b", "c"], "keep": 1}));
		value.deep_merge(FormValue::from(json!({"tags": ["z"]})));

		assert_eq!(value.to_json(), json!({"tags": ["z"], "keep": 1}));
	}

	#[rstest]
	#[case(FormValue::Null, "")]
	#[case(FormValue::from(true), "true")]
	#[case(FormValue::from(42), "42")]
	#[case(FormValue::from(1.5), "1.5")]
	#[case(FormValue::from("text"), "text")]
	fn test_to_text(#[case] value: FormValue, #[case] expected: &str) {
		assert_eq!(value.to_text(), expected);
	}

	#[rstest]
	fn test_non_finite_float_becomes_null() {
		assert_eq!(FormValue::from(f64::NAN), FormValue::Null);
	}

	#[rstest]
	fn test_empty_container_detection() {
		assert!(FormValue::object().is_empty_container());
		assert!(FormValue::Array(vec![]).is_empty_container());
		assert!(!FormValue::from(json!({"a": 1})).is_empty_container());
		assert!(!FormValue::Null.is_empty_container());
	}

	#[rstest]
	fn test_deserialize_from_json_text() {
		let value: FormValue = serde_json::from_str(r#"{"a": [1, null]}"#).unwrap();
		assert_eq!(value, FormValue::from(json!({"a": [1, null]})));
	}
}
