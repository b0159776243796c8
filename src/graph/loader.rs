//! YAML dataset documents.
//!
//! ```text
//! DatasetFile
//!   └── dataset: Vec<DatasetDefinition>
//!       ├── name, connection_key
//!       └── collections: Vec<CollectionDefinition>
//!           └── fields: Vec<FieldDefinition>
//!               ├── primary_key, identity
//!               ├── references: Vec<ReferenceDefinition>  (field: "ds.coll.field", direction)
//!               └── fields: Vec<FieldDefinition>          (object sub-fields)
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::config::{Collection, Direction, Field, FieldAddress, GraphDataset};
use crate::errors::GraphResult;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DatasetFile {
    pub dataset: Vec<DatasetDefinition>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatasetDefinition {
    pub name: String,
    pub connection_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub collections: Vec<CollectionDefinition>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CollectionDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ReferenceDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReferenceDefinition {
    pub field: String,
    pub direction: Direction,
}

impl FieldDefinition {
    fn into_field(self) -> GraphResult<Field> {
        let mut field = if self.fields.is_empty() {
            Field::scalar(self.name)
        } else {
            let sub_fields = self
                .fields
                .into_iter()
                .map(FieldDefinition::into_field)
                .collect::<GraphResult<Vec<_>>>()?;
            Field::object(self.name, sub_fields)?
        };

        field.primary_key = self.primary_key;
        field.identity = self.identity;
        for reference in self.references {
            let address: FieldAddress = reference.field.parse()?;
            field = field.with_reference(address, reference.direction);
        }
        Ok(field)
    }
}

impl TryFrom<DatasetDefinition> for GraphDataset {
    type Error = crate::errors::GraphError;

    fn try_from(definition: DatasetDefinition) -> GraphResult<Self> {
        let collections = definition
            .collections
            .into_iter()
            .map(|collection| {
                let fields = collection
                    .fields
                    .into_iter()
                    .map(FieldDefinition::into_field)
                    .collect::<GraphResult<Vec<_>>>()?;
                Collection::new(collection.name, fields)
            })
            .collect::<GraphResult<Vec<_>>>()?;

        Ok(GraphDataset::new(
            definition.name,
            definition.connection_key,
            collections,
        ))
    }
}

pub fn parse_datasets(content: &str) -> Result<Vec<GraphDataset>> {
    let file: DatasetFile = serde_yaml::from_str(content)?;
    let datasets = file
        .dataset
        .into_iter()
        .map(GraphDataset::try_from)
        .collect::<GraphResult<Vec<_>>>()?;
    debug!("Parsed {} dataset(s)", datasets.len());
    Ok(datasets)
}

pub fn load_datasets(path: &Path) -> Result<Vec<GraphDataset>> {
    info!("Loading datasets from {}", path.display());
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset file {}", path.display()))?;
    parse_datasets(&content)
        .with_context(|| format!("Invalid dataset file {}", path.display()))
}

/// Load and concatenate several dataset files, in argument order
pub fn load_dataset_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<GraphDataset>> {
    let mut datasets = Vec::new();
    for path in paths {
        datasets.extend(load_datasets(path.as_ref())?);
    }
    Ok(datasets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GraphError;
    use crate::graph::config::FieldPath;
    use std::io::Write;

    const SAMPLE: &str = r#"
dataset:
  - name: postgres_example
    connection_key: pg_conn
    collections:
      - name: customer
        fields:
          - name: id
            primary_key: true
          - name: email
            identity: email
          - name: address
            fields:
              - name: city
              - name: zip
      - name: orders
        fields:
          - name: customer_id
            references:
              - field: postgres_example.customer.id
                direction: to
"#;

    #[test]
    fn test_parse_datasets() {
        let datasets = parse_datasets(SAMPLE).unwrap();
        assert_eq!(datasets.len(), 1);
        let dataset = &datasets[0];
        assert_eq!(dataset.name, "postgres_example");
        assert_eq!(dataset.connection_key, "pg_conn");

        let customer = &dataset.collections[0];
        assert_eq!(customer.primary_keys(), vec![FieldPath::parse("id")]);
        assert!(customer.field(&FieldPath::parse("address.zip")).is_some());

        let orders = &dataset.collections[1];
        let references = orders.references();
        assert_eq!(references.len(), 1);
        assert_eq!(
            references[0].1.address,
            FieldAddress::new("postgres_example", "customer", "id")
        );
        assert_eq!(references[0].1.direction, Direction::To);
    }

    #[test]
    fn test_invalid_reference_string() {
        let yaml = r#"
dataset:
  - name: d
    connection_key: c
    collections:
      - name: t
        fields:
          - name: f
            references:
              - field: only_two.parts
                direction: from
"#;
        let err = parse_datasets(yaml).unwrap_err();
        assert_eq!(
            err.downcast_ref::<GraphError>(),
            Some(&GraphError::InvalidAddress("only_two.parts".to_string()))
        );
    }

    #[test]
    fn test_load_from_files() {
        let mut first = tempfile::NamedTempFile::new().unwrap();
        first.write_all(SAMPLE.as_bytes()).unwrap();

        let mut second = tempfile::NamedTempFile::new().unwrap();
        second
            .write_all(
                b"dataset:\n  - name: mongo\n    connection_key: mongo_conn\n    collections: []\n",
            )
            .unwrap();

        let datasets = load_dataset_files(&[first.path(), second.path()]).unwrap();
        let names: Vec<_> = datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["postgres_example", "mongo"]);
    }

    #[test]
    fn test_missing_file() {
        let err = load_datasets(Path::new("/nonexistent/datasets.yml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read dataset file"));
    }
}
