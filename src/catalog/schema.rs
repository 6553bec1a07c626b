//! Attribute type catalog

use crate::error::{EmfError, Result};
use arrow::datatypes::{DataType as ArrowDataType, Schema as ArrowSchema};
use hashbrown::HashMap;
use std::fmt;

/// Scalar type of a base-relation attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// varchar / char, compared as trimmed strings
    String,
    /// Compared as parsed i64
    Integer,
    /// Compared as parsed f64
    Float,
    /// Equality and inequality only, compared as `YYYY-MM-DD` strings
    Date,
}

impl AttributeType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeType::Integer | AttributeType::Float)
    }

    /// Map an Arrow data type onto a catalog type
    pub fn from_arrow(data_type: &ArrowDataType) -> Option<Self> {
        match data_type {
            ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 => Some(AttributeType::String),
            ArrowDataType::Int8
            | ArrowDataType::Int16
            | ArrowDataType::Int32
            | ArrowDataType::Int64
            | ArrowDataType::UInt8
            | ArrowDataType::UInt16
            | ArrowDataType::UInt32
            | ArrowDataType::UInt64 => Some(AttributeType::Integer),
            ArrowDataType::Float32 | ArrowDataType::Float64 => Some(AttributeType::Float),
            ArrowDataType::Date32 | ArrowDataType::Date64 => Some(AttributeType::Date),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::String => write!(f, "string"),
            AttributeType::Integer => write!(f, "integer"),
            AttributeType::Float => write!(f, "float"),
            AttributeType::Date => write!(f, "date"),
        }
    }
}

/// Static mapping from attribute name to scalar type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCatalog {
    types: HashMap<String, AttributeType>,
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::sales()
    }
}

impl SchemaCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Catalog for the `sales` relation
    pub fn sales() -> Self {
        Self::new()
            .with_attribute("cust", AttributeType::String)
            .with_attribute("prod", AttributeType::String)
            .with_attribute("day", AttributeType::Integer)
            .with_attribute("month", AttributeType::Integer)
            .with_attribute("year", AttributeType::Integer)
            .with_attribute("state", AttributeType::String)
            .with_attribute("quant", AttributeType::Integer)
            .with_attribute("date", AttributeType::Date)
    }

    /// Derive a catalog from an Arrow schema
    pub fn from_arrow_schema(schema: &ArrowSchema) -> Result<Self> {
        let mut catalog = Self::new();
        for field in schema.fields() {
            let ty = AttributeType::from_arrow(field.data_type()).ok_or_else(|| {
                EmfError::NotImplemented(format!(
                    "column '{}' has unsupported type {:?}",
                    field.name(),
                    field.data_type()
                ))
            })?;
            catalog.register(field.name().clone(), ty);
        }
        Ok(catalog)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.register(name, ty);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, ty: AttributeType) {
        self.types.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<AttributeType> {
        self.types.get(name).copied()
    }

    /// Look up an attribute, failing on a catalog miss
    pub fn lookup(&self, name: &str) -> Result<AttributeType> {
        self.get(name)
            .ok_or_else(|| EmfError::UnknownAttribute(name.to_string()))
    }

    /// Attribute names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::Field;

    #[test]
    fn test_sales_catalog() {
        let catalog = SchemaCatalog::sales();
        assert_eq!(catalog.len(), 8);
        assert_eq!(catalog.get("cust"), Some(AttributeType::String));
        assert_eq!(catalog.get("quant"), Some(AttributeType::Integer));
        assert_eq!(catalog.get("date"), Some(AttributeType::Date));
        assert_eq!(catalog.get("missing"), None);
    }

    #[test]
    fn test_lookup_miss() {
        let catalog = SchemaCatalog::sales();
        let err = catalog.lookup("price").unwrap_err();
        assert!(matches!(err, EmfError::UnknownAttribute(name) if name == "price"));
    }

    #[test]
    fn test_from_arrow_schema() {
        let schema = ArrowSchema::new(vec![
            Field::new("region", ArrowDataType::Utf8, false),
            Field::new("units", ArrowDataType::Int32, false),
            Field::new("price", ArrowDataType::Float64, true),
            Field::new("sold_on", ArrowDataType::Date32, true),
        ]);

        let catalog = SchemaCatalog::from_arrow_schema(&schema).unwrap();
        assert_eq!(catalog.get("region"), Some(AttributeType::String));
        assert_eq!(catalog.get("units"), Some(AttributeType::Integer));
        assert_eq!(catalog.get("price"), Some(AttributeType::Float));
        assert_eq!(catalog.get("sold_on"), Some(AttributeType::Date));
    }

    #[test]
    fn test_from_arrow_schema_unsupported() {
        let schema = ArrowSchema::new(vec![Field::new("flag", ArrowDataType::Boolean, false)]);
        assert!(SchemaCatalog::from_arrow_schema(&schema).is_err());
    }
}
