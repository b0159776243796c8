//! Vocabulary of the dataset graph: addresses, fields, collections and datasets.
//!
//! Everything here is plain data with structural validation. Reference
//! resolution and ordering live in [`crate::graph::dataset_graph`] and
//! [`crate::graph::traversal`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::errors::{GraphError, GraphResult};

/// One row returned by a collection query
pub type Row = serde_json::Map<String, Value>;

/// Dotted path to a (possibly nested) field inside a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(levels.into_iter().map(Into::into).collect())
    }

    /// Parse `a.b.c` into a three-level path
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.').filter(|level| !level.is_empty()))
    }

    pub fn levels(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut levels = self.0.clone();
        levels.push(name.to_string());
        Self(levels)
    }

    /// Walk a row following this path through nested JSON objects
    pub fn retrieve_from<'a>(&self, row: &'a Row) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = row.get(first)?;
        for level in rest {
            current = current.as_object()?.get(level)?;
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        FieldPath::parse(dotted)
    }
}

/// (dataset, collection) key used for graph nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionAddress {
    pub dataset: String,
    pub collection: String,
}

impl CollectionAddress {
    pub fn new(dataset: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            collection: collection.into(),
        }
    }

    pub fn field_address(&self, path: impl Into<FieldPath>) -> FieldAddress {
        FieldAddress {
            dataset: self.dataset.clone(),
            collection: self.collection.clone(),
            path: path.into(),
        }
    }
}

impl fmt::Display for CollectionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dataset, self.collection)
    }
}

/// (dataset, collection, field path) key used for reference edges
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldAddress {
    pub dataset: String,
    pub collection: String,
    pub path: FieldPath,
}

impl FieldAddress {
    pub fn new(
        dataset: impl Into<String>,
        collection: impl Into<String>,
        path: impl Into<FieldPath>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            collection: collection.into(),
            path: path.into(),
        }
    }

    pub fn collection_address(&self) -> CollectionAddress {
        CollectionAddress::new(self.dataset.clone(), self.collection.clone())
    }
}

impl fmt::Display for FieldAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.dataset, self.collection, self.path)
    }
}

/// Parses the dataset-file form `dataset.collection.field[.sub...]`
impl FromStr for FieldAddress {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        match (parts.next(), parts.next()) {
            (Some(dataset), Some(collection)) if !dataset.is_empty() && !collection.is_empty() => {
                let path = FieldPath::new(parts.filter(|level| !level.is_empty()));
                if path.is_empty() {
                    return Err(GraphError::InvalidAddress(s.to_string()));
                }
                Ok(FieldAddress::new(dataset, collection, path))
            }
            _ => Err(GraphError::InvalidAddress(s.to_string())),
        }
    }
}

/// Which side of a reference has to execute first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The owning field depends on the target
    To,
    /// The target depends on the owning field
    From,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::To => write!(f, "to"),
            Direction::From => write!(f, "from"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReference {
    pub address: FieldAddress,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    Scalar,
    /// Nested fields keyed by name
    Object(BTreeMap<String, Field>),
}

/// Column-like unit of data, scalar or object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub primary_key: bool,
    /// Identity label such as `email` or `ssn`
    pub identity: Option<String>,
    pub references: Vec<FieldReference>,
    pub kind: FieldKind,
}

impl Field {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: false,
            identity: None,
            references: Vec::new(),
            kind: FieldKind::Scalar,
        }
    }

    /// Object field owning `fields`; sub-field names must be unique
    pub fn object(name: impl Into<String>, fields: Vec<Field>) -> GraphResult<Self> {
        let name = name.into();
        let mut sub_fields = BTreeMap::new();
        for field in fields {
            if sub_fields.contains_key(&field.name) {
                return Err(GraphError::DuplicateField {
                    parent: name,
                    field: field.name,
                });
            }
            sub_fields.insert(field.name.clone(), field);
        }

        Ok(Self {
            name,
            primary_key: false,
            identity: None,
            references: Vec::new(),
            kind: FieldKind::Object(sub_fields),
        })
    }

    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_reference(mut self, address: FieldAddress, direction: Direction) -> Self {
        self.references.push(FieldReference { address, direction });
        self
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, FieldKind::Object(_))
    }

    pub fn sub_fields(&self) -> Option<&BTreeMap<String, Field>> {
        match &self.kind {
            FieldKind::Object(fields) => Some(fields),
            FieldKind::Scalar => None,
        }
    }

    /// True if this field or any nested field satisfies `predicate`
    pub fn contains_field<F>(&self, predicate: F) -> bool
    where
        F: Fn(&Field) -> bool,
    {
        self.contains_field_by(&predicate)
    }

    fn contains_field_by(&self, predicate: &dyn Fn(&Field) -> bool) -> bool {
        if predicate(self) {
            return true;
        }
        self.sub_fields()
            .map(|fields| fields.values().any(|f| f.contains_field_by(predicate)))
            .unwrap_or(false)
    }

    fn collect_paths<'a>(&'a self, prefix: &FieldPath, out: &mut Vec<(FieldPath, &'a Field)>) {
        let path = prefix.child(&self.name);
        if let Some(fields) = self.sub_fields() {
            for field in fields.values() {
                field.collect_paths(&path, out);
            }
        }
        out.push((path, self));
    }
}

/// Table-like grouping of fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Collection {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> GraphResult<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(GraphError::DuplicateField {
                    parent: name,
                    field: field.name.clone(),
                });
            }
        }
        Ok(Self { name, fields })
    }

    pub fn contains_field<F>(&self, predicate: F) -> bool
    where
        F: Fn(&Field) -> bool,
    {
        self.fields.iter().any(|f| f.contains_field_by(&predicate))
    }

    /// Look up a field, descending into object fields
    pub fn field(&self, path: &FieldPath) -> Option<&Field> {
        let (first, rest) = path.levels().split_first()?;
        let mut current = self.fields.iter().find(|f| &f.name == first)?;
        for level in rest {
            current = current.sub_fields()?.get(level)?;
        }
        Some(current)
    }

    /// Every field with its full path, nested fields included
    pub fn field_paths(&self) -> Vec<(FieldPath, &Field)> {
        let root = FieldPath::new(Vec::<String>::new());
        let mut out = Vec::new();
        for field in &self.fields {
            field.collect_paths(&root, &mut out);
        }
        out
    }

    /// `(path, identity label)` for every identity-bearing field
    pub fn identities(&self) -> Vec<(FieldPath, String)> {
        self.field_paths()
            .into_iter()
            .filter_map(|(path, field)| field.identity.clone().map(|identity| (path, identity)))
            .collect()
    }

    pub fn primary_keys(&self) -> Vec<FieldPath> {
        self.field_paths()
            .into_iter()
            .filter(|(_, field)| field.primary_key)
            .map(|(path, _)| path)
            .collect()
    }

    /// `(owning path, reference)` for every reference declared in the collection
    pub fn references(&self) -> Vec<(FieldPath, &FieldReference)> {
        self.field_paths()
            .into_iter()
            .flat_map(|(path, field)| {
                field
                    .references
                    .iter()
                    .map(move |reference| (path.clone(), reference))
            })
            .collect()
    }
}

/// A named group of collections sharing one external connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDataset {
    pub name: String,
    /// Opaque key resolved to live credentials outside this crate
    pub connection_key: String,
    pub collections: Vec<Collection>,
}

impl GraphDataset {
    pub fn new(
        name: impl Into<String>,
        connection_key: impl Into<String>,
        collections: Vec<Collection>,
    ) -> Self {
        Self {
            name: name.into(),
            connection_key: connection_key.into(),
            collections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t1() -> Collection {
        Collection::new(
            "t1",
            vec![
                Field::scalar("f1").with_primary_key(),
                Field::scalar("f2").with_identity("email"),
                Field::scalar("f3")
                    .with_reference(FieldAddress::new("s1", "t2", "f1"), Direction::To),
                Field::object("f4", vec![Field::scalar("f5").with_identity("ssn")]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_collection_contains_field() {
        let collection = t1();
        assert!(collection.contains_field(|f| f.name == "f3"));
        assert!(!collection.contains_field(|f| f.name == "f6"));
        assert!(collection.contains_field(|f| f.primary_key));
        assert!(collection.contains_field(|f| f.identity.as_deref() == Some("ssn")));
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let err = Collection::new("t", vec![Field::scalar("a"), Field::scalar("a")]).unwrap_err();
        assert_eq!(
            err,
            GraphError::DuplicateField {
                parent: "t".to_string(),
                field: "a".to_string()
            }
        );

        let err = Field::object("o", vec![Field::scalar("x"), Field::scalar("x")]).unwrap_err();
        assert!(err.is_construction_error());
    }

    #[test]
    fn test_nested_field_lookup() {
        let collection = t1();
        let field = collection.field(&FieldPath::parse("f4.f5")).unwrap();
        assert_eq!(field.identity.as_deref(), Some("ssn"));
        assert!(collection.field(&FieldPath::parse("f4.nope")).is_none());
        assert!(collection.field(&FieldPath::parse("f1.f2")).is_none());
    }

    #[test]
    fn test_identities_and_primary_keys() {
        let collection = t1();
        let identities = collection.identities();
        assert!(identities.contains(&(FieldPath::parse("f2"), "email".to_string())));
        assert!(identities.contains(&(FieldPath::parse("f4.f5"), "ssn".to_string())));
        assert_eq!(collection.primary_keys(), vec![FieldPath::parse("f1")]);
        assert_eq!(collection.references().len(), 1);
    }

    #[test]
    fn test_field_address_parsing() {
        let address: FieldAddress = "postgres.customer.address.city".parse().unwrap();
        assert_eq!(address.dataset, "postgres");
        assert_eq!(address.collection, "customer");
        assert_eq!(address.path, FieldPath::parse("address.city"));
        assert_eq!(address.to_string(), "postgres:customer:address.city");

        assert!("postgres.customer".parse::<FieldAddress>().is_err());
        assert!("".parse::<FieldAddress>().is_err());
    }

    #[test]
    fn test_retrieve_from_row() {
        let row = json!({"id": 1, "address": {"city": "Oslo"}});
        let row = row.as_object().unwrap();
        assert_eq!(
            FieldPath::parse("address.city").retrieve_from(row),
            Some(&json!("Oslo"))
        );
        assert_eq!(FieldPath::parse("id.x").retrieve_from(row), None);
    }

    #[test]
    fn test_address_ordering_and_equality() {
        let a = CollectionAddress::new("s1", "t1");
        let b = CollectionAddress::new("s1", "t1");
        assert_eq!(a, b);
        assert!(CollectionAddress::new("s1", "a") < CollectionAddress::new("s1", "b"));
        assert_eq!(a.field_address("f1"), FieldAddress::new("s1", "t1", "f1"));
    }
}
