//! Path utilities for nested form trees
//!
//! A [`Path`] addresses a location inside a [`FormValue`] tree. The textual
//! form uses `.` for object descent and either `[n]` or a bare numeric segment
//! for array descent:
//!
//! ```text
//! address.street        -> ["address", "street"]
//! hobbies[0].name       -> ["hobbies", "0", "name"]
//! hobbies.0.name        -> ["hobbies", "0", "name"]
//! settings.foo\.bar     -> ["settings", "foo.bar"]
//! ```
//!
//! Literal keys that contain `.`, `[`, `]` or `\` are stored escaped, so a
//! single key `"foo.bar"` never collides with the nested path `foo.bar`.
//!
//! None of the tree operations fail on missing paths: reads return `None`,
//! writes create what they need, unsets of absent paths do nothing.

use crate::value::{FormMap, FormValue};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

const ESCAPE: char = '\\';

/// Escape a literal key so it parses back as a single path segment.
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::path::{escape, unescape, Path};
///
/// assert_eq!(escape("foo.bar"), "foo\\.bar");
/// assert_eq!(unescape(&escape("foo.bar")), "foo.bar");
/// assert_eq!(Path::parse(&escape("foo.bar")).segments(), ["foo.bar"]);
/// ```
pub fn escape(key: &str) -> String {
	let mut escaped = String::with_capacity(key.len());
	for c in key.chars() {
		if matches!(c, '\\' | '.' | '[' | ']') {
			escaped.push(ESCAPE);
		}
		escaped.push(c);
	}
	escaped
}

/// Reverse [`escape`].
pub fn unescape(escaped: &str) -> String {
	let mut key = String::with_capacity(escaped.len());
	let mut chars = escaped.chars();
	while let Some(c) = chars.next() {
		if c == ESCAPE {
			// A dangling escape at the end is kept as-is
			key.push(chars.next().unwrap_or(ESCAPE));
		} else {
			key.push(c);
		}
	}
	key
}

/// A parsed location inside a form tree.
///
/// The empty path addresses the root of the tree. Pathless fields and
/// form-scope validation results use the root path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
	segments: Vec<String>,
}

impl Path {
	/// The root path
	pub fn root() -> Self {
		Self::default()
	}

	/// Parse a textual path. Parsing never fails.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_form_state::Path;
	///
	/// assert_eq!(Path::parse("a.b[0].c").segments(), ["a", "b", "0", "c"]);
	/// assert_eq!(Path::parse("a.b.0.c"), Path::parse("a.b[0].c"));
	/// assert!(Path::parse("").is_root());
	/// ```
	pub fn parse(input: &str) -> Self {
		let mut segments = Vec::new();
		let mut current = String::new();
		let mut chars = input.chars();
		let mut in_bracket = false;

		while let Some(c) = chars.next() {
			match c {
				ESCAPE => {
					current.push(chars.next().unwrap_or(ESCAPE));
				}
				'.' if !in_bracket => {
					flush_segment(&mut segments, &mut current);
				}
				'[' if !in_bracket => {
					flush_segment(&mut segments, &mut current);
					in_bracket = true;
				}
				']' if in_bracket => {
					flush_segment(&mut segments, &mut current);
					in_bracket = false;
				}
				c => current.push(c),
			}
		}
		flush_segment(&mut segments, &mut current);

		Self { segments }
	}

	/// A path made of a single literal key, without any parsing
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_form_state::Path;
	///
	/// let path = Path::literal("foo.bar");
	/// assert_eq!(path.segments(), ["foo.bar"]);
	/// assert_eq!(path.to_string(), "foo\\.bar");
	/// ```
	pub fn literal(key: impl Into<String>) -> Self {
		Self {
			segments: vec![key.into()],
		}
	}

	/// Build a path from already-split segments
	pub fn from_segments<I, S>(segments: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			segments: segments.into_iter().map(Into::into).collect(),
		}
	}

	pub fn segments(&self) -> &[String] {
		&self.segments
	}

	pub fn is_root(&self) -> bool {
		self.segments.is_empty()
	}

	pub fn len(&self) -> usize {
		self.segments.len()
	}

	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// The last segment, if any
	pub fn last(&self) -> Option<&str> {
		self.segments.last().map(String::as_str)
	}

	/// The enclosing path; `None` for the root
	pub fn parent(&self) -> Option<Path> {
		let (_, parent) = self.segments.split_last()?;
		Some(Self {
			segments: parent.to_vec(),
		})
	}

	/// Append a single literal segment
	pub fn child(&self, segment: impl Into<String>) -> Path {
		let mut segments = self.segments.clone();
		segments.push(segment.into());
		Self { segments }
	}

	/// Append every segment of `other`
	pub fn join(&self, other: &Path) -> Path {
		let mut segments = self.segments.clone();
		segments.extend(other.segments.iter().cloned());
		Self { segments }
	}

	/// Segment-aware prefix test.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_form_state::Path;
	///
	/// let street = Path::parse("address.street");
	/// assert!(street.starts_with(&Path::parse("address")));
	/// assert!(!Path::parse("addressLine").starts_with(&Path::parse("address")));
	/// assert!(street.starts_with(&Path::root()));
	/// ```
	pub fn starts_with(&self, prefix: &Path) -> bool {
		self.segments.starts_with(&prefix.segments)
	}

	/// Whether one path is a prefix of the other
	pub fn overlaps(&self, other: &Path) -> bool {
		self.starts_with(other) || other.starts_with(self)
	}

	/// The remainder of this path below `prefix`
	pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
		self.segments
			.strip_prefix(prefix.segments.as_slice())
			.map(|rest| Self {
				segments: rest.to_vec(),
			})
	}
}

fn flush_segment(segments: &mut Vec<String>, current: &mut String) {
	if !current.is_empty() {
		segments.push(std::mem::take(current));
	}
}

impl fmt::Display for Path {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, segment) in self.segments.iter().enumerate() {
			if i > 0 {
				f.write_str(".")?;
			}
			f.write_str(&escape(segment))?;
		}
		Ok(())
	}
}

impl FromStr for Path {
	type Err = Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Path::parse(s))
	}
}

impl From<&str> for Path {
	fn from(value: &str) -> Self {
		Path::parse(value)
	}
}

impl From<String> for Path {
	fn from(value: String) -> Self {
		Path::parse(&value)
	}
}

impl From<&String> for Path {
	fn from(value: &String) -> Self {
		Path::parse(value)
	}
}

impl From<&Path> for Path {
	fn from(value: &Path) -> Self {
		value.clone()
	}
}

impl Serialize for Path {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for Path {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(|s| Path::parse(&s))
	}
}

fn array_index(segment: &str) -> Option<usize> {
	segment.parse::<usize>().ok()
}

/// Read the node at `path`
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::{path, FormValue, Path};
/// use serde_json::json;
///
/// let tree = FormValue::from(json!({"a": {"b": [10, 20]}}));
/// assert_eq!(path::get(&tree, &Path::parse("a.b[1]")), Some(&FormValue::from(20)));
/// assert_eq!(path::get(&tree, &Path::parse("a.c")), None);
/// ```
pub fn get<'a>(tree: &'a FormValue, path: &Path) -> Option<&'a FormValue> {
	let mut cursor = tree;
	for segment in path.segments() {
		cursor = match cursor {
			FormValue::Object(map) => map.get(segment.as_str())?,
			FormValue::Array(items) => items.get(array_index(segment)?)?,
			_ => return None,
		};
	}
	Some(cursor)
}

/// Mutable access to the node at `path`
pub fn get_mut<'a>(tree: &'a mut FormValue, path: &Path) -> Option<&'a mut FormValue> {
	let mut cursor = tree;
	for segment in path.segments() {
		cursor = match cursor {
			FormValue::Object(map) => map.get_mut(segment.as_str())?,
			FormValue::Array(items) => items.get_mut(array_index(segment)?)?,
			_ => return None,
		};
	}
	Some(cursor)
}

/// Whether `path` holds a present, non-null value
pub fn is_path_set(tree: &FormValue, path: &Path) -> bool {
	get(tree, path).is_some_and(|value| !value.is_null())
}

/// Write `value` at `path`, creating missing containers on the way.
///
/// Intermediate containers are objects unless `vivify` is set, in which case
/// an array is created whenever the following segment is an integer.
/// Scalar intermediates are replaced by containers.
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::{path, FormValue, Path};
/// use serde_json::json;
///
/// let mut tree = FormValue::object();
/// path::set(&mut tree, &Path::parse("hobbies[1].name"), "chess".into(), true);
/// assert_eq!(tree.to_json(), json!({"hobbies": [null, {"name": "chess"}]}));
///
/// let mut tree = FormValue::object();
/// path::set(&mut tree, &Path::parse("hobbies[1].name"), "chess".into(), false);
/// assert_eq!(tree.to_json(), json!({"hobbies": {"1": {"name": "chess"}}}));
/// ```
pub fn set(tree: &mut FormValue, path: &Path, value: FormValue, vivify: bool) {
	let segments = path.segments();
	let Some((last, parents)) = segments.split_last() else {
		*tree = value;
		return;
	};

	let mut cursor = tree;
	for (depth, segment) in parents.iter().enumerate() {
		let slot = child_slot(cursor, segment);
		if !slot.is_container() {
			let next_is_index = array_index(&segments[depth + 1]).is_some();
			*slot = if vivify && next_is_index {
				FormValue::Array(Vec::new())
			} else {
				FormValue::object()
			};
		}
		cursor = slot;
	}

	*child_slot(cursor, last) = value;
}

/// Get or create the child slot for `segment`, converting `node` into a
/// container if it is not one that can hold the segment.
fn child_slot<'a>(node: &'a mut FormValue, segment: &str) -> &'a mut FormValue {
	let index = array_index(segment);
	let indexes_array = matches!(node, FormValue::Array(_)) && index.is_some();
	if !indexes_array && node.as_object().is_none() {
		*node = FormValue::object();
	}

	match node {
		FormValue::Array(items) => {
			let index = index.unwrap_or_default();
			if items.len() <= index {
				items.resize(index + 1, FormValue::Null);
			}
			&mut items[index]
		}
		FormValue::Object(map) => map.entry(segment.to_string()).or_default(),
		_ => unreachable!("node was converted to a container above"),
	}
}

/// Remove the value at `path`.
///
/// With `destroy = false` the leaf is replaced by `Null` and every container
/// stays in place, so array siblings keep their indices. With
/// `destroy = true` the key is removed (array items are spliced out) and
/// every ancestor that becomes empty is pruned, up to but excluding the root.
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::{path, FormValue, Path};
/// use serde_json::json;
///
/// let mut tree = FormValue::from(json!({"a": {"b": {"c": 1}}, "d": 2}));
/// path::unset(&mut tree, &Path::parse("a.b.c"), true);
/// assert_eq!(tree.to_json(), json!({"d": 2}));
///
/// let mut tree = FormValue::from(json!({"list": [1, 2, 3]}));
/// path::unset(&mut tree, &Path::parse("list[1]"), false);
/// assert_eq!(tree.to_json(), json!({"list": [1, null, 3]}));
/// ```
pub fn unset(tree: &mut FormValue, path: &Path, destroy: bool) {
	if path.is_root() {
		*tree = FormValue::object();
		return;
	}

	if !destroy {
		if let Some(leaf) = get_mut(tree, path) {
			*leaf = FormValue::Null;
		}
		return;
	}

	let mut current = path.clone();
	while let Some(parent) = current.parent() {
		let Some(segment) = current.last() else {
			break;
		};
		let Some(container) = get_mut(tree, &parent) else {
			break;
		};
		remove_child(container, segment);

		let parent_is_empty = get(tree, &parent).is_some_and(FormValue::is_empty_container);
		if parent.is_root() || !parent_is_empty {
			break;
		}
		current = parent;
	}
}

/// Segment-wise ordering with numeric segments compared as numbers
pub(crate) fn compare_paths(a: &Path, b: &Path) -> Ordering {
	for (left, right) in a.segments().iter().zip(b.segments()) {
		let ordering = match (left.parse::<usize>(), right.parse::<usize>()) {
			(Ok(left), Ok(right)) => left.cmp(&right),
			_ => left.cmp(right),
		};
		if ordering != Ordering::Equal {
			return ordering;
		}
	}
	a.len().cmp(&b.len())
}

fn remove_child(container: &mut FormValue, segment: &str) -> Option<FormValue> {
	match container {
		FormValue::Object(map) => map.shift_remove(segment),
		FormValue::Array(items) => {
			let index = array_index(segment)?;
			(index < items.len()).then(|| items.remove(index))
		}
		_ => None,
	}
}

/// Depth-first search for a leaf satisfying `predicate`.
///
/// Leaves are every node that is not a container; empty containers are not
/// visited. Returns the path of the first match.
///
/// # Examples
///
/// ```
/// use reinhardt_form_state::{path, FormValue, Path};
/// use serde_json::json;
///
/// let touched = FormValue::from(json!({"a": false, "b": {"c": true}}));
/// let found = path::find_leaf(&touched, |_, leaf| leaf.as_bool() == Some(true));
/// assert_eq!(found, Some(Path::parse("b.c")));
/// ```
pub fn find_leaf<F>(tree: &FormValue, mut predicate: F) -> Option<Path>
where
	F: FnMut(&Path, &FormValue) -> bool,
{
	fn walk<F>(node: &FormValue, path: &mut Path, predicate: &mut F) -> bool
	where
		F: FnMut(&Path, &FormValue) -> bool,
	{
		match node {
			FormValue::Object(map) => map.iter().any(|(key, child)| {
				path.segments.push(key.clone());
				let found = walk(child, path, predicate);
				if !found {
					path.segments.pop();
				}
				found
			}),
			FormValue::Array(items) => items.iter().enumerate().any(|(index, child)| {
				path.segments.push(index.to_string());
				let found = walk(child, path, predicate);
				if !found {
					path.segments.pop();
				}
				found
			}),
			leaf => predicate(path, leaf),
		}
	}

	let mut path = Path::root();
	walk(tree, &mut path, &mut predicate).then_some(path)
}

/// Apply `f` to every leaf of the tree
pub fn visit_leaves_mut<F>(tree: &mut FormValue, mut f: F)
where
	F: FnMut(&mut FormValue),
{
	fn walk<F: FnMut(&mut FormValue)>(node: &mut FormValue, f: &mut F) {
		match node {
			FormValue::Object(map) => map.values_mut().for_each(|child| walk(child, f)),
			FormValue::Array(items) => items.iter_mut().for_each(|child| walk(child, f)),
			leaf => f(leaf),
		}
	}

	walk(tree, &mut f);
}

/// Build an object from top-level literal keys
pub(crate) fn object_from_literal_keys(map: FormMap) -> FormValue {
	let mut tree = FormValue::object();
	for (key, value) in map {
		set(&mut tree, &Path::literal(key), value, true);
	}
	tree
}
