//! Normalized catalog metadata.
//!
//! These records are read-only snapshots fetched fresh for every run. They
//! are never mutated, only translated into DDL text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical type family of a column, independent of dialect spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeClass {
    /// Fixed-length character (`char`, `nchar`, `character`, `bpchar`).
    Char,
    /// Variable-length character (`varchar`, `nvarchar`, `character varying`).
    Varchar,
    /// Integer family, including bit/boolean.
    Integer,
    /// Exact numeric (`decimal`, `numeric`, `money`).
    Decimal,
    /// Approximate numeric (`float`, `real`, `double precision`).
    Float,
    /// Binary (`bytea`, `binary`, `varbinary`, `image`).
    Binary,
    /// Date and time types.
    DateTime,
    /// Unbounded text (`text`, `ntext`, `xml`, `json`).
    Text,
    /// Anything else (uuid, spatial, user-defined).
    Other,
}

impl TypeClass {
    /// Classify a catalog type name (either dialect).
    pub fn classify(data_type: &str) -> Self {
        match data_type.trim().to_lowercase().as_str() {
            "char" | "nchar" | "character" | "bpchar" => TypeClass::Char,
            "varchar" | "nvarchar" | "character varying" => TypeClass::Varchar,
            "bit" | "boolean" | "bool" | "tinyint" | "smallint" | "int" | "integer" | "bigint"
            | "int2" | "int4" | "int8" => TypeClass::Integer,
            "decimal" | "numeric" | "money" | "smallmoney" => TypeClass::Decimal,
            "float" | "real" | "double precision" | "float4" | "float8" => TypeClass::Float,
            "bytea" | "binary" | "varbinary" | "image" => TypeClass::Binary,
            "date" | "time" | "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset"
            | "timestamp" | "timestamp without time zone" | "timestamp with time zone"
            | "timestamptz" | "time without time zone" | "time with time zone" | "interval" => {
                TypeClass::DateTime
            }
            "text" | "ntext" | "xml" | "json" | "jsonb" => TypeClass::Text,
            _ => TypeClass::Other,
        }
    }

    /// Character types whose comparisons depend on collation.
    pub fn is_character(&self) -> bool {
        matches!(self, TypeClass::Char | TypeClass::Varchar)
    }
}

/// Column metadata as reported by the source catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name.
    pub name: String,

    /// Catalog type name, lower case (e.g. "nvarchar", "character varying").
    pub data_type: String,

    /// Logical type family.
    pub type_class: TypeClass,

    /// Character length; negative means unbounded (`MAX`).
    pub max_length: Option<i32>,

    /// Numeric precision.
    pub precision: Option<i32>,

    /// Numeric scale.
    pub scale: Option<i32>,

    /// Whether the column is nullable.
    pub is_nullable: bool,

    /// Default expression in source-dialect text; empty when none.
    pub default: String,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

impl ColumnMeta {
    /// Build a column record, classifying its type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into().to_lowercase();
        Self {
            name: name.into(),
            type_class: TypeClass::classify(&data_type),
            data_type,
            max_length: None,
            precision: None,
            scale: None,
            is_nullable: true,
            default: String::new(),
            ordinal_pos: 0,
        }
    }

    /// Set the character length.
    pub fn with_length(mut self, max_length: i32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set numeric precision and scale.
    pub fn with_precision(mut self, precision: i32, scale: i32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    /// Set the default expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    /// Set the ordinal position.
    pub fn at(mut self, ordinal_pos: i32) -> Self {
        self.ordinal_pos = ordinal_pos;
        self
    }
}

/// A column paired with its definition rendered for the destination dialect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedColumn {
    /// Source metadata.
    pub meta: ColumnMeta,
    /// Destination type text, e.g. `NUMERIC(10,2)`.
    pub target_type: String,
    /// Destination column definition, e.g. `"total" NUMERIC(10,2) NOT NULL`.
    pub definition: String,
    /// Set when the type mapping loses information.
    pub warning: Option<String>,
}

impl RenderedColumn {
    /// Column name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

/// Table metadata gathered for one table task.
#[derive(Debug, Clone, Serialize)]
pub struct TableMeta {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Columns in ordinal order.
    pub columns: Vec<RenderedColumn>,
    /// Primary key column names in key order; empty when the table has none.
    pub primary_key: Vec<String>,
    /// Secondary indexes.
    pub indexes: Vec<IndexMeta>,
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Schema of the owning table.
    pub schema: String,
    /// Owning table.
    pub table: String,
    /// Index name in the source catalog.
    pub name: String,
    /// Key columns in index order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub is_unique: bool,
    /// Whether the index backs the primary key constraint.
    pub is_primary_key: bool,
}

impl IndexMeta {
    /// `<table>.<index>`, the catalog key for dialects that scope index names per table.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

/// View metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMeta {
    pub schema: String,
    pub name: String,
    /// Full source definition text, opaque to the engine.
    pub definition: String,
}

/// Procedure or function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoutineKind {
    Procedure,
    Function,
}

impl RoutineKind {
    /// Parse the catalog's ROUTINE_TYPE value.
    pub fn parse(routine_type: &str) -> Self {
        if routine_type.trim().eq_ignore_ascii_case("function") {
            RoutineKind::Function
        } else {
            RoutineKind::Procedure
        }
    }

    /// SQL keyword (`PROCEDURE` / `FUNCTION`).
    pub fn keyword(&self) -> &'static str {
        match self {
            RoutineKind::Procedure => "PROCEDURE",
            RoutineKind::Function => "FUNCTION",
        }
    }
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A declared routine parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineParam {
    /// Parameter name without any `@` prefix; may be empty for unnamed parameters.
    pub name: String,
    /// `IN`, `OUT` or `INOUT`.
    pub mode: String,
    /// Catalog type name.
    pub data_type: String,
    pub max_length: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
}

/// Routine metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineMeta {
    pub schema: String,
    pub name: String,
    pub kind: RoutineKind,
    /// Declared external language (`plpgsql`, `sql`, `SQL` for T-SQL).
    pub language: String,
    /// Catalog return type for functions.
    pub return_type: Option<String>,
    /// Parameters in ordinal order.
    pub parameters: Vec<RoutineParam>,
    /// Full source definition text, opaque to the engine.
    pub definition: String,
}

/// Object kind processed by one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Tables,
    Views,
    Routines,
    Indexes,
}

impl ObjectKind {
    /// Batch order used when several kinds are selected.
    pub const ORDER: [ObjectKind; 4] = [
        ObjectKind::Tables,
        ObjectKind::Views,
        ObjectKind::Routines,
        ObjectKind::Indexes,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Tables => "tables",
            ObjectKind::Views => "views",
            ObjectKind::Routines => "routines",
            ObjectKind::Indexes => "indexes",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
