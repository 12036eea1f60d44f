//! Multipart-style form data
//!
//! [`FormData`] is an ordered multimap of text and file entries, the shape a
//! browser submits. [`FormData::from_value`] flattens a value tree into it:
//!
//! ```text
//! {"a": {"b": [{"c": 1}]}}   ->  a[b][0][c]=1
//! {"hobbies": ["x", null]}   ->  hobbies[0]=x, hobbies[1]=
//! {"empty": {}}              ->  (no entry)
//! ```

use crate::error::{FormError, FormResult};
use crate::value::{FileBlob, FormValue};

/// One form data entry
#[derive(Debug, Clone, PartialEq)]
pub enum FormDataEntry {
	Text(String),
	File(FileBlob),
}

impl FormDataEntry {
	pub fn as_text(&self) -> Option<&str> {
		match self {
			FormDataEntry::Text(text) => Some(text),
			FormDataEntry::File(_) => None,
		}
	}

	pub fn as_file(&self) -> Option<&FileBlob> {
		match self {
			FormDataEntry::File(file) => Some(file),
			FormDataEntry::Text(_) => None,
		}
	}
}

/// Ordered list of named entries; names may repeat
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
	entries: Vec<(String, FormDataEntry)>,
}

impl FormData {
	pub fn new() -> Self {
		Self::default()
	}

	/// Flatten a value tree into bracketed entries
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_form_state::{FormData, FormValue};
	/// use serde_json::json;
	///
	/// let data = FormData::from_value(&FormValue::from(json!({
	///     "user": {"name": "John", "tags": ["a", null]},
	///     "meta": {}
	/// })));
	///
	/// let names: Vec<&str> = data.entries().iter().map(|(name, _)| name.as_str()).collect();
	/// assert_eq!(names, ["user[name]", "user[tags][0]", "user[tags][1]"]);
	/// assert_eq!(data.get("user[tags][1]").and_then(|e| e.as_text()), Some(""));
	/// ```
	pub fn from_value(value: &FormValue) -> Self {
		let mut data = Self::new();
		data.append_value("", value);
		data
	}

	fn append_value(&mut self, key: &str, value: &FormValue) {
		match value {
			FormValue::Object(map) => {
				for (child, nested) in map {
					self.append_value(&nested_key(key, child), nested);
				}
			}
			FormValue::Array(items) => {
				for (index, nested) in items.iter().enumerate() {
					self.append_value(&nested_key(key, &index.to_string()), nested);
				}
			}
			_ if key.is_empty() => {}
			FormValue::File(file) => self.append_file(key, file.clone()),
			leaf => self.append_text(key, leaf.to_text()),
		}
	}

	pub fn append(&mut self, name: impl Into<String>, entry: FormDataEntry) {
		self.entries.push((name.into(), entry));
	}

	pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.append(name, FormDataEntry::Text(value.into()));
	}

	pub fn append_file(&mut self, name: impl Into<String>, file: FileBlob) {
		self.append(name, FormDataEntry::File(file));
	}

	/// First entry named `name`
	pub fn get(&self, name: &str) -> Option<&FormDataEntry> {
		self.entries
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, entry)| entry)
	}

	/// Every entry named `name`, in order
	pub fn get_all(&self, name: &str) -> Vec<&FormDataEntry> {
		self.entries
			.iter()
			.filter(|(key, _)| key == name)
			.map(|(_, entry)| entry)
			.collect()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	pub fn entries(&self) -> &[(String, FormDataEntry)] {
		&self.entries
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Replace every entry with those of `other`
	pub fn replace_with(&mut self, other: FormData) {
		self.entries = other.entries;
	}

	/// Encode the text entries as `application/x-www-form-urlencoded`.
	/// File entries are skipped.
	pub fn to_urlencoded(&self) -> FormResult<String> {
		let pairs: Vec<(&str, &str)> = self
			.entries
			.iter()
			.filter_map(|(name, entry)| entry.as_text().map(|text| (name.as_str(), text)))
			.collect();
		serde_urlencoded::to_string(pairs).map_err(|e| FormError::Serialization(e.to_string()))
	}
}

fn nested_key(parent: &str, child: &str) -> String {
	if parent.is_empty() {
		child.to_string()
	} else {
		format!("{parent}[{child}]")
	}
}

impl IntoIterator for FormData {
	type Item = (String, FormDataEntry);
	type IntoIter = std::vec::IntoIter<(String, FormDataEntry)>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.into_iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn text_entries(data: &FormData) -> Vec<(String, String)> {
		data.entries()
			.iter()
			.filter_map(|(name, entry)| entry.as_text().map(|text| (name.clone(), text.to_string())))
			.collect()
	}

	#[rstest]
	fn test_array_with_null_leaf() {
		let data = FormData::from_value(&FormValue::from(json!({"hobbies": ["x", null]})));

		assert_eq!(
			text_entries(&data),
			vec![
				("hobbies[0]".to_string(), "x".to_string()),
				("hobbies[1]".to_string(), String::new()),
			]
		);
		assert!(!data.contains("hobbies"));
	}

	#[rstest]
	fn test_nested_paths_use_brackets() {
		let data = FormData::from_value(&FormValue::from(json!({"a": {"b": [{"c": 1}]}, "ok": true})));

		assert_eq!(
			text_entries(&data),
			vec![
				("a[b][0][c]".to_string(), "1".to_string()),
				("ok".to_string(), "true".to_string()),
			]
		);
	}

	#[rstest]
	fn test_empty_objects_produce_no_entry() {
		let data = FormData::from_value(&FormValue::from(json!({"empty": {}, "nested": {"also": {}}})));
		assert!(data.is_empty());
	}

	#[rstest]
	fn test_files_become_file_entries() {
		let mut value = FormValue::object();
		crate::path::set(
			&mut value,
			&crate::Path::parse("docs[0]"),
			FileBlob::new("cv.pdf", vec![1, 2, 3]).into(),
			true,
		);
		let data = FormData::from_value(&value);

		let file = data.get("docs[0]").and_then(FormDataEntry::as_file).unwrap();
		assert_eq!(file.name(), "cv.pdf");
		assert_eq!(data.to_urlencoded().unwrap(), "");
	}

	#[rstest]
	fn test_urlencoded_output() {
		let mut data = FormData::new();
		data.append_text("name", "John Doe");
		data.append_text("tags[0]", "a&b");
		data.append_text("tags[0]", "again");

		assert_eq!(
			data.to_urlencoded().unwrap(),
			"name=John+Doe&tags%5B0%5D=a%26b&tags%5B0%5D=again"
		);
		assert_eq!(data.get_all("tags[0]").len(), 2);
	}
}
