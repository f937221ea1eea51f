//! Structural validation against declared shapes.
//!
//! A [`Shape`] describes the JSON an artifact must have: required and
//! optional fields, types, enumerations, array bounds and nesting. Object
//! shapes are either permissive (unknown fields allowed) or strict (only
//! declared fields).

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use storyloom_core::ValidationIssue;

/// Whether an object accepts fields it does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strictness {
    /// Unknown fields are ignored
    #[default]
    Permissive,
    /// Unknown fields are issues
    Strict,
}

/// One declared field of an object shape.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct Field {
    name: String,
    shape: Shape,
    required: bool,
}

/// The declared fields of an object and its strictness.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use storyloom_validation::{ObjectShape, Shape};
///
/// let shape: Shape = ObjectShape::strict()
///     .required("beat_id", Shape::non_empty_string())
///     .optional("keyframe_count", Shape::integer_range(Some(1), Some(9)))
///     .into();
///
/// let issues = shape.validate(&json!({ "beat_id": "", "extra": 1 }));
/// assert_eq!(issues.len(), 2);
/// assert_eq!(issues[0].path(), "beat_id");
/// assert_eq!(issues[1].path(), "extra");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectShape {
    fields: Vec<Field>,
    strictness: Strictness,
}

impl ObjectShape {
    /// An object that rejects undeclared fields.
    pub fn strict() -> Self {
        Self {
            fields: Vec::new(),
            strictness: Strictness::Strict,
        }
    }

    /// An object that ignores undeclared fields.
    pub fn permissive() -> Self {
        Self {
            fields: Vec::new(),
            strictness: Strictness::Permissive,
        }
    }

    /// Declare a required field.
    pub fn required(mut self, name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            shape: shape.into(),
            required: true,
        });
        self
    }

    /// Declare an optional field.
    ///
    /// `null` is accepted and treated as absent, so the typed field must
    /// have a serde default.
    pub fn optional(mut self, name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            shape: shape.into(),
            required: false,
        });
        self
    }

    /// Declared fields.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Strictness flag.
    pub fn strictness(&self) -> Strictness {
        self.strictness
    }
}

impl From<ObjectShape> for Shape {
    fn from(shape: ObjectShape) -> Self {
        Shape::Object(shape)
    }
}

/// A structural descriptor for a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// A string, optionally with a minimum length or an enumeration
    String {
        /// Minimum length in characters after trimming
        min_len: usize,
        /// Allowed values; empty means any
        one_of: Vec<String>,
    },
    /// An integer with optional bounds
    Integer {
        /// Inclusive lower bound
        min: Option<i64>,
        /// Inclusive upper bound
        max: Option<i64>,
    },
    /// Any number
    Number,
    /// `true` or `false`
    Boolean,
    /// An array of uniformly shaped items
    Array {
        /// Item shape
        items: Box<Shape>,
        /// Minimum item count
        min_items: usize,
        /// Maximum item count
        max_items: Option<usize>,
    },
    /// An object
    Object(ObjectShape),
    /// `null` or the inner shape
    Nullable(Box<Shape>),
    /// Anything
    Any,
}

impl Shape {
    /// Any string.
    pub fn string() -> Self {
        Self::String {
            min_len: 0,
            one_of: Vec::new(),
        }
    }

    /// A string with at least one non-whitespace character.
    pub fn non_empty_string() -> Self {
        Self::String {
            min_len: 1,
            one_of: Vec::new(),
        }
    }

    /// One of a fixed set of strings.
    pub fn one_of(values: &[&str]) -> Self {
        Self::String {
            min_len: 0,
            one_of: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Any integer.
    pub fn integer() -> Self {
        Self::Integer {
            min: None,
            max: None,
        }
    }

    /// An integer within inclusive bounds.
    pub fn integer_range(min: Option<i64>, max: Option<i64>) -> Self {
        Self::Integer { min, max }
    }

    /// Any number.
    pub fn number() -> Self {
        Self::Number
    }

    /// A boolean.
    pub fn boolean() -> Self {
        Self::Boolean
    }

    /// An array of `items` with a minimum and optional maximum length.
    pub fn array(items: impl Into<Shape>, min_items: usize, max_items: Option<usize>) -> Self {
        Self::Array {
            items: Box::new(items.into()),
            min_items,
            max_items,
        }
    }

    /// `null` or `inner`.
    pub fn nullable(inner: impl Into<Shape>) -> Self {
        Self::Nullable(Box::new(inner.into()))
    }

    /// Anything at all.
    pub fn any() -> Self {
        Self::Any
    }

    /// Check `value`, returning issues in document order. Empty means valid.
    pub fn validate(&self, value: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.check(value, "$", &mut issues);
        issues
    }

    fn check(&self, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
        match self {
            Self::Any => {}
            Self::Nullable(inner) => {
                if !value.is_null() {
                    inner.check(value, path, issues);
                }
            }
            Self::String { min_len, one_of } => {
                let Some(text) = value.as_str() else {
                    issues.push(type_issue(path, "string", value));
                    return;
                };
                if text.trim().chars().count() < *min_len {
                    let message = if *min_len == 1 {
                        "must not be empty".to_string()
                    } else {
                        format!("must be at least {} characters", min_len)
                    };
                    issues.push(ValidationIssue::new(path, message));
                } else if !one_of.is_empty() && !one_of.iter().any(|allowed| allowed == text) {
                    issues.push(ValidationIssue::new(
                        path,
                        format!("must be one of: {} (found \"{}\")", one_of.join(", "), text),
                    ));
                }
            }
            Self::Integer { min, max } => {
                let number = value
                    .as_i64()
                    .or_else(|| value.as_u64().map(|n| i64::try_from(n).unwrap_or(i64::MAX)));
                let Some(number) = number else {
                    issues.push(type_issue(path, "integer", value));
                    return;
                };
                if let Some(min) = min.filter(|min| number < *min) {
                    issues.push(ValidationIssue::new(path, format!("must be >= {}", min)));
                }
                if let Some(max) = max.filter(|max| number > *max) {
                    issues.push(ValidationIssue::new(path, format!("must be <= {}", max)));
                }
            }
            Self::Number => {
                if !value.is_number() {
                    issues.push(type_issue(path, "number", value));
                }
            }
            Self::Boolean => {
                if !value.is_boolean() {
                    issues.push(type_issue(path, "boolean", value));
                }
            }
            Self::Array {
                items,
                min_items,
                max_items,
            } => {
                let Some(array) = value.as_array() else {
                    issues.push(type_issue(path, "array", value));
                    return;
                };
                if array.len() < *min_items {
                    issues.push(ValidationIssue::new(
                        path,
                        format!("must contain at least {} items (found {})", min_items, array.len()),
                    ));
                }
                if let Some(max) = max_items.filter(|max| array.len() > *max) {
                    issues.push(ValidationIssue::new(
                        path,
                        format!("must contain at most {} items (found {})", max, array.len()),
                    ));
                }
                for (index, item) in array.iter().enumerate() {
                    items.check(item, &child_path(path, &index.to_string()), issues);
                }
            }
            Self::Object(object) => {
                let Some(map) = value.as_object() else {
                    issues.push(type_issue(path, "object", value));
                    return;
                };
                for field in &object.fields {
                    let field_path = child_path(path, &field.name);
                    match map.get(&field.name) {
                        None => {
                            if field.required {
                                issues.push(ValidationIssue::new(field_path, "is required"));
                            }
                        }
                        Some(Value::Null) if !field.required => {}
                        Some(child) => field.shape.check(child, &field_path, issues),
                    }
                }
                if object.strictness == Strictness::Strict {
                    for key in map.keys() {
                        if !object.fields.iter().any(|f| &f.name == key) {
                            issues.push(ValidationIssue::new(
                                child_path(path, key),
                                "is not an allowed field",
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Remove `null` members of optional fields that are not nullable.
    ///
    /// [`Shape::validate`] treats such a member as absent; after this pass
    /// decoding does too.
    pub fn strip_optional_nulls(&self, value: &mut Value) {
        match (self, value) {
            (Self::Nullable(inner), value) => inner.strip_optional_nulls(value),
            (Self::Array { items, .. }, Value::Array(array)) => {
                for item in array.iter_mut() {
                    items.strip_optional_nulls(item);
                }
            }
            (Self::Object(object), Value::Object(map)) => {
                for field in &object.fields {
                    let absent = !field.required
                        && !matches!(field.shape, Self::Nullable(_))
                        && map.get(&field.name).is_some_and(Value::is_null);
                    if absent {
                        map.remove(&field.name);
                    } else if let Some(child) = map.get_mut(&field.name) {
                        field.shape.strip_optional_nulls(child);
                    }
                }
            }
            _ => {}
        }
    }

    /// Render the shape as a JSON Schema document.
    ///
    /// # Examples
    ///
    /// ```
    /// use storyloom_validation::{ObjectShape, Shape};
    ///
    /// let shape: Shape = ObjectShape::strict().required("id", Shape::string()).into();
    /// let schema = shape.to_json_schema();
    /// assert_eq!(schema["type"], "object");
    /// assert_eq!(schema["additionalProperties"], false);
    /// assert_eq!(schema["required"][0], "id");
    /// ```
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::Any => json!({}),
            Self::Nullable(inner) => json!({ "anyOf": [inner.to_json_schema(), { "type": "null" }] }),
            Self::String { min_len, one_of } => {
                let mut schema = Map::new();
                schema.insert("type".into(), json!("string"));
                if *min_len > 0 {
                    schema.insert("minLength".into(), json!(min_len));
                }
                if !one_of.is_empty() {
                    schema.insert("enum".into(), json!(one_of));
                }
                Value::Object(schema)
            }
            Self::Integer { min, max } => {
                let mut schema = Map::new();
                schema.insert("type".into(), json!("integer"));
                if let Some(min) = min {
                    schema.insert("minimum".into(), json!(min));
                }
                if let Some(max) = max {
                    schema.insert("maximum".into(), json!(max));
                }
                Value::Object(schema)
            }
            Self::Number => json!({ "type": "number" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Array {
                items,
                min_items,
                max_items,
            } => {
                let mut schema = Map::new();
                schema.insert("type".into(), json!("array"));
                schema.insert("items".into(), items.to_json_schema());
                if *min_items > 0 {
                    schema.insert("minItems".into(), json!(min_items));
                }
                if let Some(max) = max_items {
                    schema.insert("maxItems".into(), json!(max));
                }
                Value::Object(schema)
            }
            Self::Object(object) => {
                let properties: Map<String, Value> = object
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), f.shape.to_json_schema()))
                    .collect();
                let required: Vec<&str> = object
                    .fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| f.name.as_str())
                    .collect();
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": object.strictness == Strictness::Permissive,
                })
            }
        }
    }
}

/// Validate `value` against `shape`, then decode it.
///
/// `null` in an optional field decodes as if the field were missing. Decode
/// failures after a clean shape check are reported as a single issue at
/// `$`, so the caller always deals with one issue list.
pub fn validate_typed<T: DeserializeOwned>(
    shape: &Shape,
    value: &Value,
) -> Result<T, Vec<ValidationIssue>> {
    let issues = shape.validate(value);
    if !issues.is_empty() {
        return Err(issues);
    }
    let mut value = value.clone();
    shape.strip_optional_nulls(&mut value);
    serde_json::from_value(value)
        .map_err(|err| vec![ValidationIssue::root(format!("does not decode: {}", err))])
}

fn child_path(parent: &str, child: &str) -> String {
    if parent == "$" {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

fn type_issue(path: &str, expected: &str, found: &Value) -> ValidationIssue {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    ValidationIssue::new(path, format!("expected {}, found {}", expected, found))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel_shape() -> Shape {
        ObjectShape::permissive()
            .required("index", Shape::integer_range(Some(1), Some(9)))
            .required("en", Shape::non_empty_string())
            .optional("zh", Shape::string())
            .into()
    }

    #[test]
    fn test_valid_value_has_no_issues() {
        let issues = panel_shape().validate(&json!({ "index": 3, "en": "[MS] Mira waves", "x": 1 }));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_root_type_mismatch_uses_dollar_path() {
        let issues = panel_shape().validate(&json!([1, 2]));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path(), "$");
        assert_eq!(issues[0].message(), "expected object, found array");
    }

    #[test]
    fn test_nested_array_paths() {
        let shape = Shape::from(
            ObjectShape::permissive().required("panels", Shape::array(panel_shape(), 1, Some(9))),
        );
        let issues = shape.validate(&json!({ "panels": [{ "index": 1, "en": "a" }, { "index": 12 }] }));
        let paths: Vec<&str> = issues.iter().map(|i| i.path().as_str()).collect();
        assert_eq!(paths, vec!["panels.1.index", "panels.1.en"]);
    }

    #[test]
    fn test_strict_rejects_unknown_fields() {
        let shape = Shape::from(ObjectShape::strict().required("a", Shape::integer()));
        let issues = shape.validate(&json!({ "a": 1, "b": 2 }));
        assert_eq!(issues, vec![ValidationIssue::new("b", "is not an allowed field")]);
    }

    #[test]
    fn test_optional_null_is_accepted() {
        let issues = panel_shape().validate(&json!({ "index": 1, "en": "a", "zh": null }));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_optional_null_decodes_as_missing() {
        #[derive(serde::Deserialize)]
        struct Character {
            name: String,
            #[serde(default)]
            location: String,
            #[serde(default)]
            holding: Option<String>,
        }
        let shape = Shape::array(
            ObjectShape::permissive()
                .required("name", Shape::non_empty_string())
                .optional("location", Shape::string())
                .optional("holding", Shape::nullable(Shape::string())),
            0,
            None,
        );
        let value = json!([{ "name": "Mira", "location": null, "holding": null }]);

        let decoded: Vec<Character> = validate_typed(&shape, &value).unwrap();
        assert_eq!(decoded[0].name, "Mira");
        assert_eq!(decoded[0].location, "");
        assert_eq!(decoded[0].holding, None);
    }

    #[test]
    fn test_strip_keeps_nullable_members() {
        let shape = Shape::from(
            ObjectShape::permissive()
                .optional("zh", Shape::string())
                .optional("left", Shape::nullable(Shape::string())),
        );
        let mut value = json!({ "zh": null, "left": null });
        shape.strip_optional_nulls(&mut value);
        assert_eq!(value, json!({ "left": null }));
    }

    #[test]
    fn test_enumeration() {
        let issues = Shape::one_of(&["A", "B"]).validate(&json!("C"));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message().contains("must be one of: A, B"));
    }

    #[test]
    fn test_array_bounds() {
        let shape = Shape::array(Shape::integer(), 9, Some(9));
        let issues = shape.validate(&json!([1, 2, 3]));
        assert_eq!(issues[0].message(), "must contain at least 9 items (found 3)");
    }

    #[test]
    fn test_validate_typed_decodes() {
        #[derive(serde::Deserialize)]
        struct Panel {
            index: u8,
            en: String,
        }
        let panel: Panel = validate_typed(&panel_shape(), &json!({ "index": 2, "en": "b" })).unwrap();
        assert_eq!(panel.index, 2);
        assert_eq!(panel.en, "b");
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let value = json!({ "index": 4, "en": "still" });
        assert!(panel_shape().validate(&value).is_empty());
        assert!(panel_shape().validate(&value).is_empty());
    }

    #[test]
    fn test_json_schema_for_array() {
        let schema = Shape::array(Shape::non_empty_string(), 1, None).to_json_schema();
        assert_eq!(schema["type"], "array");
        assert_eq!(schema["minItems"], 1);
        assert_eq!(schema["items"]["minLength"], 1);
    }
}
