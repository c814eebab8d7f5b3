//! Model definitions describing how entities map onto DB2 tables.
//!
//! Definitions are normally loaded from JSON files shaped like:
//!
//! ```json
//! {
//!   "name": "Customer",
//!   "settings": { "db2": { "table": "CUSTOMER", "schema": "STORE" } },
//!   "properties": [
//!     { "name": "id", "type": "Number", "id": 1, "generated": true },
//!     { "name": "email", "type": "String", "required": true, "length": 200, "index": { "unique": true } },
//!     { "name": "status", "type": "Enum", "values": ["active", "closed"] }
//!   ],
//!   "indexes": { "customer_name_idx": { "columns": "lastName, firstName" } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IbmDbError;
use crate::Result;

/// Semantic type of a model property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PropertyType {
    String,
    Text,
    Number,
    Boolean,
    Date,
    Buffer,
    GeoPoint,
    Point,
    List,
    Array,
    Object,
    Json,
    Any,
    Enum(Vec<String>),
    Unknown(String),
}

impl PropertyType {
    /// Resolves a type name as written in a model file.
    ///
    /// Names are matched case-insensitively; enum values come from the
    /// property's `values` list.
    pub fn from_name(name: &str, values: Vec<String>) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "text" => Self::Text,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "buffer" => Self::Buffer,
            "geopoint" => Self::GeoPoint,
            "point" => Self::Point,
            "list" => Self::List,
            "array" => Self::Array,
            "object" => Self::Object,
            "json" => Self::Json,
            "any" => Self::Any,
            "enum" => Self::Enum(values),
            _ => Self::Unknown(name.to_string()),
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Text)
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enum(_) => write!(f, "Enum"),
            Self::Unknown(name) => write!(f, "{name}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// DB2-specific column overrides declared under `"db2"` on a property
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Db2ColumnSettings {
    pub column_name: Option<String>,
    pub data_type: Option<String>,
    pub data_length: Option<u32>,
    pub data_precision: Option<u32>,
    pub data_scale: Option<u32>,
}

/// Property-level index declaration, either `true` or an options object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyIndex {
    Flag(bool),
    Options {
        #[serde(default)]
        unique: bool,
        #[serde(default)]
        kind: Option<String>,
    },
}

impl PropertyIndex {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Flag(enabled) => *enabled,
            Self::Options { .. } => true,
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Options { unique: true, .. })
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Options { kind, .. } => kind.as_deref(),
            Self::Flag(_) => None,
        }
    }
}

/// Column descriptor for one model property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PropertyRecord")]
pub struct PropertyDefinition {
    pub name: String,
    pub property_type: PropertyType,
    pub required: bool,
    pub nullable: Option<bool>,
    /// Position within a (possibly composite) id
    pub id: Option<u32>,
    pub generated: bool,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    /// Generic column type override
    pub data_type: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub index: Option<PropertyIndex>,
    pub db2: Db2ColumnSettings,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            required: false,
            nullable: None,
            id: None,
            generated: false,
            length: None,
            precision: None,
            scale: None,
            data_type: None,
            charset: None,
            collation: None,
            index: None,
            db2: Db2ColumnSettings::default(),
        }
    }

    /// Marks the property as the id (position 1)
    pub fn as_id(mut self) -> Self {
        self.id = Some(1);
        self
    }

    pub fn with_generated(mut self, generated: bool) -> Self {
        self.generated = generated;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_index(mut self, index: PropertyIndex) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_db2(mut self, db2: Db2ColumnSettings) -> Self {
        self.db2 = db2;
        self
    }

    pub fn is_id(&self) -> bool {
        self.id.is_some()
    }

    /// Whether a null value should defer to the column default
    pub fn uses_default_for_null(&self) -> bool {
        self.is_id() || self.generated
    }

    /// Required and id properties are never nullable; otherwise an explicit
    /// `nullable` wins and the default is nullable.
    pub fn is_nullable(&self) -> bool {
        if self.required || self.is_id() {
            return false;
        }
        self.nullable.unwrap_or(true)
    }

    /// Column name, honouring the DB2 override
    pub fn column_name(&self) -> &str {
        self.db2.column_name.as_deref().unwrap_or(&self.name)
    }

    /// DB2 `dataType` override, falling back to the generic one
    pub fn declared_data_type(&self) -> Option<&str> {
        self.db2
            .data_type
            .as_deref()
            .or(self.data_type.as_deref())
    }

    pub fn declared_precision(&self) -> Option<u32> {
        self.db2.data_precision.or(self.precision)
    }

    pub fn declared_scale(&self) -> Option<u32> {
        self.db2.data_scale.or(self.scale)
    }

    pub fn has_index(&self) -> bool {
        self.index.as_ref().is_some_and(PropertyIndex::is_enabled)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyRecord {
    name: String,
    #[serde(rename = "type", default = "default_type_name")]
    type_name: String,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    required: bool,
    nullable: Option<bool>,
    id: Option<IdMarker>,
    #[serde(default)]
    generated: bool,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
    data_type: Option<String>,
    charset: Option<String>,
    collation: Option<String>,
    index: Option<PropertyIndex>,
    #[serde(default)]
    db2: Db2ColumnSettings,
}

fn default_type_name() -> String {
    "String".to_string()
}

/// `"id": true` and `"id": 1` are both accepted
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdMarker {
    Flag(bool),
    Position(u32),
}

impl TryFrom<PropertyRecord> for PropertyDefinition {
    type Error = String;

    fn try_from(record: PropertyRecord) -> std::result::Result<Self, Self::Error> {
        if record.name.trim().is_empty() {
            return Err("property name cannot be empty".to_string());
        }
        let id = match record.id {
            Some(IdMarker::Flag(true)) => Some(1),
            Some(IdMarker::Flag(false)) | None => None,
            Some(IdMarker::Position(position)) => Some(position),
        };
        Ok(Self {
            name: record.name,
            property_type: PropertyType::from_name(&record.type_name, record.values),
            required: record.required,
            nullable: record.nullable,
            id,
            generated: record.generated,
            length: record.length,
            precision: record.precision,
            scale: record.scale,
            data_type: record.data_type,
            charset: record.charset,
            collation: record.collation,
            index: record.index,
            db2: record.db2,
        })
    }
}

/// Sort order of one indexed column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    pub order: SortOrder,
}

impl IndexColumn {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Model-level index keyed by name in [`ModelDefinition::indexes`].
///
/// Accepts both `{"columns": "a, b DESC", "unique": true}` and the older
/// `{"keys": {"a": 1, "b": -1}, "options": {"unique": true}}` forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexRecord")]
pub struct IndexDefinition {
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    /// Native index kind placed between `CREATE` and `INDEX`
    pub kind: Option<String>,
}

impl IndexDefinition {
    pub fn new(columns: Vec<IndexColumn>) -> Self {
        Self {
            columns,
            unique: false,
            kind: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexOptions {
    #[serde(default)]
    unique: bool,
}

#[derive(Debug, Deserialize)]
struct IndexRecord {
    columns: Option<String>,
    keys: Option<BTreeMap<String, i32>>,
    #[serde(default)]
    unique: bool,
    kind: Option<String>,
    #[serde(default)]
    options: IndexOptions,
}

impl TryFrom<IndexRecord> for IndexDefinition {
    type Error = String;

    fn try_from(record: IndexRecord) -> std::result::Result<Self, Self::Error> {
        let mut columns = Vec::new();
        if let Some(keys) = record.keys {
            for (name, direction) in keys {
                columns.push(if direction == -1 {
                    IndexColumn::desc(name)
                } else {
                    IndexColumn::asc(name)
                });
            }
        }
        if columns.is_empty()
            && let Some(list) = record.columns
        {
            for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                columns.push(match entry.rsplit_once(char::is_whitespace) {
                    Some((name, order)) if order.eq_ignore_ascii_case("DESC") => {
                        IndexColumn::desc(name.trim())
                    }
                    Some((name, order)) if order.eq_ignore_ascii_case("ASC") => {
                        IndexColumn::asc(name.trim())
                    }
                    _ => IndexColumn::asc(entry),
                });
            }
        }
        if columns.is_empty() {
            return Err("index must declare at least one column".to_string());
        }
        Ok(Self {
            columns,
            unique: record.unique || record.options.unique,
            kind: record.kind,
        })
    }
}

/// DB2 table placement for a model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Db2ModelSettings {
    pub table: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub db2: Db2ModelSettings,
}

/// A model and the table it persists to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub properties: Vec<PropertyDefinition>,
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexDefinition>,
    #[serde(default)]
    pub settings: ModelSettings,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>, properties: Vec<PropertyDefinition>) -> Self {
        Self {
            name: name.into(),
            properties,
            indexes: BTreeMap::new(),
            settings: ModelSettings::default(),
        }
    }

    pub fn with_index(mut self, name: impl Into<String>, index: IndexDefinition) -> Self {
        self.indexes.insert(name.into(), index);
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.settings.db2.table = Some(table.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.settings.db2.schema = Some(schema.into());
        self
    }

    /// Table name, honouring the DB2 override
    pub fn table_name(&self) -> &str {
        self.settings.db2.table.as_deref().unwrap_or(&self.name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Looks a property up by its column name, as reported by the catalog
    pub fn property_by_column(&self, column: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.column_name() == column)
    }

    /// Id properties ordered by their id position
    pub fn id_properties(&self) -> Vec<&PropertyDefinition> {
        let mut ids: Vec<_> = self.properties.iter().filter(|p| p.is_id()).collect();
        ids.sort_by_key(|p| p.id.unwrap_or(u32::MAX));
        ids
    }

    /// First id property, if any
    pub fn id_property(&self) -> Option<&PropertyDefinition> {
        self.id_properties().into_iter().next()
    }

    /// Checks the invariants the statement builders rely on
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(IbmDbError::configuration("model name cannot be empty"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for property in &self.properties {
            if !seen.insert(property.name.as_str()) {
                return Err(IbmDbError::configuration(format!(
                    "model '{}' declares property '{}' twice",
                    self.name, property.name
                )));
            }
        }
        Ok(())
    }

    /// Parses a single model definition from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self =
            serde_json::from_str(json).map_err(|source| IbmDbError::Serialization {
                context: "Failed to parse model definition".to_string(),
                source,
            })?;
        model.validate()?;
        Ok(model)
    }

    /// Loads model definitions from a JSON file holding one model or an array
    pub fn from_json_file(path: &Path) -> Result<Vec<Self>> {
        let content = std::fs::read_to_string(path).map_err(|source| IbmDbError::Io {
            context: format!("Failed to read model file {}", path.display()),
            source,
        })?;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            Many(Vec<ModelDefinition>),
            One(Box<ModelDefinition>),
        }

        let models = match serde_json::from_str::<OneOrMany>(&content).map_err(|source| {
            IbmDbError::Serialization {
                context: format!("Failed to parse model file {}", path.display()),
                source,
            }
        })? {
            OneOrMany::Many(models) => models,
            OneOrMany::One(model) => vec![*model],
        };
        for model in &models {
            model.validate()?;
        }
        Ok(models)
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
