//! Document model shared by the store, the resolver, and the relationship layer.
//!
//! Documents are flat field maps whose values may reference other documents.
//! References are carried as [`DocRef`] addresses and only dereferenced by the
//! resolver, which keeps the store contract free of graph semantics.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Number, Value as Json};

/// Key used to encode a reference inside seed/JSON files: `{"$ref": "teams/abc"}`.
pub const REF_KEY: &str = "$ref";

pub mod collections {
    pub const USERS: &str = "users";
    pub const TEAMS: &str = "teams";
    pub const HACKATHONS: &str = "hackathons";
    pub const NONPROFITS: &str = "nonprofits";
    pub const PROBLEM_STATEMENTS: &str = "problem_statements";
    pub const NEWS: &str = "news";
}

/// Address of a document inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Parse the `collection/id` form used by seed files.
    pub fn parse(path: &str) -> Option<Self> {
        let (collection, id) = path.split_once('/')?;
        if collection.is_empty() || id.is_empty() || id.contains('/') {
            return None;
        }
        Some(Self::new(collection, id))
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

pub type Fields = BTreeMap<String, Value>;

/// A stored field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Ref(DocRef),
    List(Vec<Value>),
    Map(Fields),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_doc_ref(&self) -> Option<&DocRef> {
        match self {
            Value::Ref(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Whether this value, or any element of it when it is a list, is a reference.
    pub fn holds_refs(&self) -> bool {
        match self {
            Value::Ref(_) => true,
            Value::List(items) => items.iter().any(|item| matches!(item, Value::Ref(_))),
            _ => false,
        }
    }

    /// Render for clients: references collapse to their bare id.
    pub fn to_flat_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(flag) => Json::Bool(*flag),
            Value::Int(number) => Json::from(*number),
            Value::Float(number) => Number::from_f64(*number).map_or(Json::Null, Json::Number),
            Value::Text(text) => Json::String(text.clone()),
            Value::Ref(reference) => Json::String(reference.id.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_flat_json).collect()),
            Value::Map(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_flat_json()))
                    .collect(),
            ),
        }
    }

    /// Lossless JSON encoding used by seed files (references as `{"$ref": "c/id"}`).
    pub fn to_seed_json(&self) -> Json {
        match self {
            Value::Ref(reference) => {
                let mut object = Map::new();
                object.insert(REF_KEY.to_string(), Json::String(reference.to_string()));
                Json::Object(object)
            }
            Value::List(items) => Json::Array(items.iter().map(Value::to_seed_json).collect()),
            Value::Map(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_seed_json()))
                    .collect(),
            ),
            other => other.to_flat_json(),
        }
    }

    /// Inverse of [`Value::to_seed_json`].
    pub fn from_seed_json(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(flag) => Value::Bool(flag),
            Json::Number(number) => match number.as_i64() {
                Some(int) => Value::Int(int),
                None => number.as_f64().map_or(Value::Null, Value::Float),
            },
            Json::String(text) => Value::Text(text),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from_seed_json).collect()),
            Json::Object(object) => {
                if object.len() == 1 {
                    if let Some(reference) = object
                        .get(REF_KEY)
                        .and_then(Json::as_str)
                        .and_then(DocRef::parse)
                    {
                        return Value::Ref(reference);
                    }
                }
                Value::Map(
                    object
                        .into_iter()
                        .map(|(key, value)| (key, Value::from_seed_json(value)))
                        .collect(),
                )
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DocRef> for Value {
    fn from(value: DocRef) -> Self {
        Value::Ref(value)
    }
}

/// A document as read from the store at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub reference: DocRef,
    pub fields: Fields,
}

impl Snapshot {
    pub fn new(reference: DocRef, fields: Fields) -> Self {
        Self { reference, fields }
    }

    pub fn id(&self) -> &str {
        &self.reference.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// References held by a list-valued field; non-reference elements are skipped.
    pub fn refs(&self, field: &str) -> Vec<DocRef> {
        self.get(field)
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Value::as_doc_ref).cloned().collect())
            .unwrap_or_default()
    }
}

/// Either an address that still has to be fetched, or an already fetched document.
#[derive(Debug, Clone, PartialEq)]
pub enum Handle {
    Unresolved(DocRef),
    Resolved(Snapshot),
}

impl Handle {
    pub fn id(&self) -> &str {
        match self {
            Handle::Unresolved(reference) => &reference.id,
            Handle::Resolved(snapshot) => snapshot.id(),
        }
    }

    pub fn reference(&self) -> &DocRef {
        match self {
            Handle::Unresolved(reference) => reference,
            Handle::Resolved(snapshot) => &snapshot.reference,
        }
    }
}

impl From<DocRef> for Handle {
    fn from(value: DocRef) -> Self {
        Handle::Unresolved(value)
    }
}

impl From<Snapshot> for Handle {
    fn from(value: Snapshot) -> Self {
        Handle::Resolved(value)
    }
}

/// Client-facing flattened document. Always carries an `id` field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatDocument(Map<String, Json>);

impl FlatDocument {
    pub fn from_fields(id: &str, fields: &Fields) -> Self {
        let mut object: Map<String, Json> = fields
            .iter()
            .map(|(key, value)| (key.clone(), value.to_flat_json()))
            .collect();
        object.insert("id".to_string(), Json::String(id.to_string()));
        Self(object)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Json::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Json> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Json) {
        self.0.insert(field.into(), value);
    }

    pub fn as_map(&self) -> &Map<String, Json> {
        &self.0
    }

    pub fn into_json(self) -> Json {
        Json::Object(self.0)
    }

    /// Ids listed in a string-array field, e.g. a shallow-resolved member list.
    pub fn id_list(&self, field: &str) -> Vec<String> {
        self.0
            .get(field)
            .and_then(Json::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
