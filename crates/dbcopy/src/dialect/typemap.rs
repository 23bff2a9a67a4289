//! Type mapping implementations with (source, target) pair keying.
//!
//! Each mapper handles one source→target dialect pair. Target type text is
//! always upper case so generated DDL is byte-stable across runs.

use crate::core::dialect::Dialect;
use crate::core::schema::ColumnMeta;
use crate::core::traits::{TypeMapper, TypeMapping};

/// Largest `CHAR`/`VARCHAR` length SQL Server accepts before `MAX`.
const MSSQL_MAX_CHAR_LENGTH: i32 = 8000;

/// Largest precision SQL Server `DECIMAL` accepts.
const MSSQL_MAX_DECIMAL_PRECISION: i32 = 38;

/// PostgreSQL → PostgreSQL mapper.
///
/// Types pass through with their lengths; defaults are copied verbatim.
#[derive(Debug, Clone, Default)]
pub struct PostgresToPostgresMapper;

impl PostgresToPostgresMapper {
    pub fn new() -> Self {
        Self
    }
}

impl TypeMapper for PostgresToPostgresMapper {
    fn source_dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn target_dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn map_type(
        &self,
        data_type: &str,
        max_length: Option<i32>,
        precision: Option<i32>,
        scale: Option<i32>,
    ) -> TypeMapping {
        TypeMapping::lossless(postgres_to_postgres(data_type, max_length, precision, scale))
    }

    fn map_default(&self, col: &ColumnMeta) -> String {
        col.default.trim().to_string()
    }
}

/// MSSQL → PostgreSQL mapper.
#[derive(Debug, Clone, Default)]
pub struct MssqlToPostgresMapper;

impl MssqlToPostgresMapper {
    pub fn new() -> Self {
        Self
    }
}

impl TypeMapper for MssqlToPostgresMapper {
    fn source_dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn target_dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn map_type(
        &self,
        data_type: &str,
        max_length: Option<i32>,
        precision: Option<i32>,
        scale: Option<i32>,
    ) -> TypeMapping {
        mssql_to_postgres(data_type, max_length, precision, scale)
    }

    fn map_default(&self, col: &ColumnMeta) -> String {
        let expr = strip_wrapping_parens(col.default.trim());
        if expr.is_empty() {
            return String::new();
        }

        let lower = expr.to_lowercase();
        match lower.as_str() {
            "getdate()" | "sysdatetime()" | "current_timestamp" => {
                return "CURRENT_TIMESTAMP".to_string()
            }
            "getutcdate()" | "sysutcdatetime()" => {
                return "(CURRENT_TIMESTAMP AT TIME ZONE 'UTC')".to_string()
            }
            "newid()" | "newsequentialid()" => return "gen_random_uuid()".to_string(),
            _ => {}
        }

        if col.data_type == "bit" {
            return match strip_wrapping_parens(&lower).as_str() {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                _ => String::new(),
            };
        }

        // N'text' -> 'text'
        if (expr.starts_with("N'") || expr.starts_with("n'")) && expr.ends_with('\'') {
            return expr[1..].to_string();
        }

        expr
    }
}

/// PostgreSQL → MSSQL mapper.
///
/// Some mappings are lossy; the warning explains what is lost.
#[derive(Debug, Clone, Default)]
pub struct PostgresToMssqlMapper;

impl PostgresToMssqlMapper {
    pub fn new() -> Self {
        Self
    }
}

impl TypeMapper for PostgresToMssqlMapper {
    fn source_dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn target_dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn map_type(
        &self,
        data_type: &str,
        max_length: Option<i32>,
        precision: Option<i32>,
        scale: Option<i32>,
    ) -> TypeMapping {
        postgres_to_mssql(data_type, max_length, precision, scale)
    }

    fn map_default(&self, col: &ColumnMeta) -> String {
        // Casts are PostgreSQL-only syntax: 'abc'::character varying -> 'abc'
        let expr = match col.default.find("::") {
            Some(pos) => col.default[..pos].trim(),
            None => col.default.trim(),
        };
        let expr = strip_wrapping_parens(expr);
        let lower = expr.to_lowercase();

        if lower.starts_with("nextval(") {
            // sequence defaults are not carried over
            return String::new();
        }

        match lower.as_str() {
            "" => String::new(),
            "now()" | "current_timestamp" | "localtimestamp" | "transaction_timestamp()" => {
                "GETDATE()".to_string()
            }
            "current_date" => "CAST(GETDATE() AS DATE)".to_string(),
            "gen_random_uuid()" | "uuid_generate_v4()" => "NEWID()".to_string(),
            "true" => "1".to_string(),
            "false" => "0".to_string(),
            _ => expr,
        }
    }
}

/// MSSQL → MSSQL mapper.
#[derive(Debug, Clone, Default)]
pub struct MssqlToMssqlMapper;

impl MssqlToMssqlMapper {
    pub fn new() -> Self {
        Self
    }
}

impl TypeMapper for MssqlToMssqlMapper {
    fn source_dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn target_dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn map_type(
        &self,
        data_type: &str,
        max_length: Option<i32>,
        precision: Option<i32>,
        scale: Option<i32>,
    ) -> TypeMapping {
        TypeMapping::lossless(mssql_to_mssql(data_type, max_length, precision, scale))
    }

    fn map_default(&self, col: &ColumnMeta) -> String {
        col.default.trim().to_string()
    }
}

/// Remove parentheses that wrap the whole expression: `((0))` -> `0`.
///
/// `(a) + (b)` is left alone because its first parenthesis closes early.
fn strip_wrapping_parens(expr: &str) -> String {
    let mut current = expr.trim();
    while current.starts_with('(') && current.ends_with(')') {
        let mut depth = 0i32;
        let mut in_quote = false;
        let mut closes_at_end = true;
        for (idx, ch) in current.char_indices() {
            match ch {
                '\'' => in_quote = !in_quote,
                '(' if !in_quote => depth += 1,
                ')' if !in_quote => {
                    depth -= 1;
                    if depth == 0 && idx != current.len() - 1 {
                        closes_at_end = false;
                        break;
                    }
                }
                _ => {}
            }
        }
        if !closes_at_end {
            break;
        }
        current = current[1..current.len() - 1].trim();
    }
    current.to_string()
}

fn positive(value: Option<i32>) -> Option<i32> {
    value.filter(|v| *v > 0)
}

fn numeric_spec(name: &str, precision: Option<i32>, scale: Option<i32>) -> String {
    match positive(precision) {
        Some(p) => format!("{}({},{})", name, p, scale.unwrap_or(0).max(0)),
        None => name.to_string(),
    }
}

fn postgres_to_postgres(
    pg_type: &str,
    max_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    let lower = pg_type.trim().to_lowercase();

    // udt array names: _int4 -> INT4[]
    if let Some(element) = lower.strip_prefix('_') {
        return format!("{}[]", element.to_uppercase());
    }

    match lower.as_str() {
        "integer" | "int" | "int4" => "INT".to_string(),
        "smallint" | "int2" => "SMALLINT".to_string(),
        "bigint" | "int8" => "BIGINT".to_string(),
        "boolean" | "bool" => "BOOLEAN".to_string(),
        "character" | "char" | "bpchar" => match positive(max_length) {
            Some(n) => format!("CHARACTER({})", n),
            None => "CHARACTER".to_string(),
        },
        "character varying" | "varchar" => match max_length {
            Some(n) if n > 0 => format!("CHARACTER VARYING({})", n),
            Some(_) => "TEXT".to_string(),
            None => "CHARACTER VARYING".to_string(),
        },
        "numeric" | "decimal" => numeric_spec("NUMERIC", precision, scale),
        "double precision" | "float8" => "DOUBLE PRECISION".to_string(),
        "real" | "float4" => "REAL".to_string(),
        "timestamp without time zone" | "timestamp" => "TIMESTAMP".to_string(),
        "timestamp with time zone" | "timestamptz" => "TIMESTAMPTZ".to_string(),
        "time without time zone" | "time" => "TIME".to_string(),
        "time with time zone" | "timetz" => "TIMETZ".to_string(),
        _ => lower.to_uppercase(),
    }
}

fn mssql_to_postgres(
    mssql_type: &str,
    max_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> TypeMapping {
    let lower = mssql_type.trim().to_lowercase();

    let target = match lower.as_str() {
        "bit" => "BOOLEAN".to_string(),

        "tinyint" | "smallint" => "SMALLINT".to_string(),
        "int" => "INT".to_string(),
        "bigint" => "BIGINT".to_string(),

        "decimal" | "numeric" => numeric_spec("NUMERIC", precision, scale),
        "money" => "NUMERIC(19,4)".to_string(),
        "smallmoney" => "NUMERIC(10,4)".to_string(),

        // float(n): n <= 24 is single precision
        "float" => match positive(precision) {
            Some(p) if p <= 24 => "REAL".to_string(),
            _ => "DOUBLE PRECISION".to_string(),
        },
        "real" => "REAL".to_string(),

        "char" | "nchar" => match positive(max_length) {
            Some(n) => format!("CHARACTER({})", n),
            None => "TEXT".to_string(),
        },
        "varchar" | "nvarchar" => match positive(max_length) {
            Some(n) => format!("CHARACTER VARYING({})", n),
            None => "TEXT".to_string(),
        },
        "text" | "ntext" => "TEXT".to_string(),

        // timestamp/rowversion is a binary row version, not a date
        "binary" | "varbinary" | "image" | "timestamp" | "rowversion" => "BYTEA".to_string(),

        "date" => "DATE".to_string(),
        "time" => "TIME".to_string(),
        "datetime" | "datetime2" | "smalldatetime" => "TIMESTAMP".to_string(),
        "datetimeoffset" => "TIMESTAMPTZ".to_string(),

        "uniqueidentifier" => "UUID".to_string(),
        "xml" => "XML".to_string(),

        other => {
            return TypeMapping::lossy(
                "TEXT",
                format!("SQL Server type '{}' has no PostgreSQL equivalent; stored as TEXT", other),
            )
        }
    };

    TypeMapping::lossless(target)
}

fn postgres_to_mssql(
    pg_type: &str,
    max_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> TypeMapping {
    let lower = pg_type.trim().to_lowercase();

    if lower.ends_with("[]") || lower.starts_with('_') {
        return TypeMapping::lossy(
            "VARCHAR(MAX)",
            format!("Array type '{}' stored as text", pg_type),
        );
    }

    let target = match lower.as_str() {
        "boolean" | "bool" => "BIT".to_string(),

        "smallint" | "int2" => "SMALLINT".to_string(),
        "integer" | "int" | "int4" => "INT".to_string(),
        "bigint" | "int8" => "BIGINT".to_string(),

        "numeric" | "decimal" => match positive(precision) {
            Some(p) if p <= MSSQL_MAX_DECIMAL_PRECISION => {
                format!("DECIMAL({},{})", p, scale.unwrap_or(0).max(0))
            }
            Some(p) => {
                return TypeMapping::lossy(
                    format!(
                        "DECIMAL({},{})",
                        MSSQL_MAX_DECIMAL_PRECISION,
                        scale.unwrap_or(0).clamp(0, MSSQL_MAX_DECIMAL_PRECISION)
                    ),
                    format!("numeric precision {} exceeds SQL Server maximum of 38", p),
                )
            }
            None => {
                return TypeMapping::lossy(
                    "DECIMAL(38,10)",
                    "unconstrained numeric mapped to DECIMAL(38,10)",
                )
            }
        },
        "money" => "MONEY".to_string(),

        "double precision" | "float8" => "FLOAT".to_string(),
        "real" | "float4" => "REAL".to_string(),

        "character" | "char" | "bpchar" => match positive(max_length) {
            Some(n) if n <= MSSQL_MAX_CHAR_LENGTH => format!("CHAR({})", n),
            _ => "VARCHAR(MAX)".to_string(),
        },
        "character varying" | "varchar" => match positive(max_length) {
            Some(n) if n <= MSSQL_MAX_CHAR_LENGTH => format!("VARCHAR({})", n),
            _ => "VARCHAR(MAX)".to_string(),
        },
        "text" | "name" | "citext" => "VARCHAR(MAX)".to_string(),

        "bytea" => "VARBINARY(MAX)".to_string(),

        "date" => "DATE".to_string(),
        "time without time zone" | "time" => "TIME".to_string(),
        "timestamp without time zone" | "timestamp" => "DATETIME2".to_string(),
        "timestamp with time zone" | "timestamptz" => "DATETIMEOFFSET".to_string(),

        "uuid" => "UNIQUEIDENTIFIER".to_string(),
        "xml" => "XML".to_string(),

        "json" | "jsonb" => {
            return TypeMapping::lossy(
                "VARCHAR(MAX)",
                format!("{} stored as text; JSON operators unavailable", lower.to_uppercase()),
            )
        }

        other => {
            return TypeMapping::lossy(
                "VARCHAR(MAX)",
                format!("PostgreSQL type '{}' has no SQL Server equivalent; stored as text", other),
            )
        }
    };

    TypeMapping::lossless(target)
}

fn mssql_to_mssql(
    mssql_type: &str,
    max_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    let upper = mssql_type.trim().to_uppercase();

    match upper.as_str() {
        "CHAR" | "NCHAR" | "BINARY" => match positive(max_length) {
            Some(n) => format!("{}({})", upper, n),
            None => upper,
        },
        "VARCHAR" | "NVARCHAR" | "VARBINARY" => match max_length {
            Some(n) if n > 0 => format!("{}({})", upper, n),
            Some(_) => format!("{}(MAX)", upper),
            None => upper,
        },
        "IMAGE" => "VARBINARY(MAX)".to_string(),
        // Fractional-second digits; 7 is the server default.
        "DATETIME2" | "DATETIMEOFFSET" | "TIME" => match scale {
            Some(s) if (0..7).contains(&s) => format!("{}({})", upper, s),
            _ => upper,
        },
        "DECIMAL" | "NUMERIC" => numeric_spec(&upper, precision, scale),
        "FLOAT" => match positive(precision) {
            Some(p) if p < 53 => format!("FLOAT({})", p),
            _ => "FLOAT".to_string(),
        },
        _ => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(data_type: &str, default: &str) -> ColumnMeta {
        ColumnMeta::new("c", data_type).with_default(default)
    }

    #[test]
    fn test_pg_to_pg_passthrough() {
        let m = PostgresToPostgresMapper::new();
        assert_eq!(m.map_type("integer", None, Some(32), Some(0)).target_type, "INT");
        assert_eq!(
            m.map_type("numeric", None, Some(10), Some(2)).target_type,
            "NUMERIC(10,2)"
        );
        assert_eq!(
            m.map_type("character varying", Some(40), None, None).target_type,
            "CHARACTER VARYING(40)"
        );
        assert_eq!(
            m.map_type("character varying", Some(-1), None, None).target_type,
            "TEXT"
        );
        assert_eq!(m.map_type("_int4", None, None, None).target_type, "INT4[]");
        assert_eq!(m.map_type("jsonb", None, None, None).target_type, "JSONB");
        assert_eq!(m.map_default(&col("integer", "nextval('s'::regclass)")), "nextval('s'::regclass)");
    }

    #[test]
    fn test_mssql_to_pg_types() {
        let m = MssqlToPostgresMapper::new();
        assert_eq!(m.map_type("tinyint", None, Some(3), Some(0)).target_type, "SMALLINT");
        assert_eq!(m.map_type("nvarchar", Some(-1), None, None).target_type, "TEXT");
        assert_eq!(
            m.map_type("nvarchar", Some(50), None, None).target_type,
            "CHARACTER VARYING(50)"
        );
        assert_eq!(m.map_type("nchar", Some(2), None, None).target_type, "CHARACTER(2)");
        assert_eq!(m.map_type("float", None, Some(53), None).target_type, "DOUBLE PRECISION");
        assert_eq!(m.map_type("float", None, Some(24), None).target_type, "REAL");
        assert_eq!(m.map_type("varbinary", Some(-1), None, None).target_type, "BYTEA");
        assert_eq!(m.map_type("datetime", None, None, None).target_type, "TIMESTAMP");
        assert_eq!(m.map_type("uniqueidentifier", None, None, None).target_type, "UUID");

        let lossy = m.map_type("geography", None, None, None);
        assert_eq!(lossy.target_type, "TEXT");
        assert!(lossy.is_lossy);
    }

    #[test]
    fn test_mssql_to_pg_defaults() {
        let m = MssqlToPostgresMapper::new();
        assert_eq!(m.map_default(&col("int", "((0))")), "0");
        assert_eq!(m.map_default(&col("datetime", "(getdate())")), "CURRENT_TIMESTAMP");
        assert_eq!(m.map_default(&col("nvarchar", "(N'open')")), "'open'");
        assert_eq!(m.map_default(&col("bit", "((1))")), "TRUE");
        assert_eq!(m.map_default(&col("uniqueidentifier", "(newid())")), "gen_random_uuid()");
        assert_eq!(m.map_default(&col("int", "")), "");
    }

    #[test]
    fn test_pg_to_mssql_types() {
        let m = PostgresToMssqlMapper::new();
        assert_eq!(m.map_type("boolean", None, None, None).target_type, "BIT");
        assert_eq!(
            m.map_type("character varying", Some(40), None, None).target_type,
            "VARCHAR(40)"
        );
        assert_eq!(m.map_type("text", None, None, None).target_type, "VARCHAR(MAX)");
        assert_eq!(
            m.map_type("numeric", None, Some(12), Some(4)).target_type,
            "DECIMAL(12,4)"
        );
        assert_eq!(m.map_type("double precision", None, None, None).target_type, "FLOAT");
        assert_eq!(m.map_type("bytea", None, None, None).target_type, "VARBINARY(MAX)");

        let jsonb = m.map_type("jsonb", None, None, None);
        assert!(jsonb.is_lossy);
        assert!(jsonb.warning.unwrap().contains("JSONB"));
    }

    #[test]
    fn test_pg_to_mssql_defaults() {
        let m = PostgresToMssqlMapper::new();
        assert_eq!(m.map_default(&col("character varying", "'new'::character varying")), "'new'");
        assert_eq!(m.map_default(&col("timestamp", "now()")), "GETDATE()");
        assert_eq!(m.map_default(&col("integer", "nextval('orders_id_seq'::regclass)")), "");
        assert_eq!(m.map_default(&col("boolean", "false")), "0");
    }

    #[test]
    fn test_mssql_to_mssql() {
        let m = MssqlToMssqlMapper::new();
        assert_eq!(m.map_type("nvarchar", Some(-1), None, None).target_type, "NVARCHAR(MAX)");
        assert_eq!(m.map_type("nchar", Some(3), None, None).target_type, "NCHAR(3)");
        assert_eq!(
            m.map_type("decimal", None, Some(18), Some(2)).target_type,
            "DECIMAL(18,2)"
        );
        assert_eq!(m.map_type("float", None, Some(24), None).target_type, "FLOAT(24)");
        assert_eq!(m.map_type("float", None, Some(53), None).target_type, "FLOAT");
        assert_eq!(m.map_default(&col("int", "((0))")), "((0))");
    }

    #[test]
    fn test_mssql_to_mssql_keeps_fractional_seconds() {
        let m = MssqlToMssqlMapper::new();
        assert_eq!(m.map_type("datetime2", None, None, Some(3)).target_type, "DATETIME2(3)");
        assert_eq!(m.map_type("datetime2", None, None, Some(0)).target_type, "DATETIME2(0)");
        assert_eq!(m.map_type("datetime2", None, None, Some(7)).target_type, "DATETIME2");
        assert_eq!(m.map_type("datetime2", None, None, None).target_type, "DATETIME2");
        assert_eq!(
            m.map_type("datetimeoffset", None, None, Some(2)).target_type,
            "DATETIMEOFFSET(2)"
        );
        assert_eq!(m.map_type("time", None, None, Some(4)).target_type, "TIME(4)");
        assert_eq!(m.map_type("datetime", None, None, Some(3)).target_type, "DATETIME");
    }

    #[test]
    fn test_binary_and_fallback_rows() {
        let cases: [(&dyn TypeMapper, &str, Option<i32>, &str, bool); 8] = [
            (&MssqlToMssqlMapper, "image", Some(2147483647), "VARBINARY(MAX)", false),
            (&MssqlToMssqlMapper, "varbinary", Some(16), "VARBINARY(16)", false),
            (&MssqlToMssqlMapper, "varbinary", Some(-1), "VARBINARY(MAX)", false),
            (&MssqlToPostgresMapper, "image", None, "BYTEA", false),
            (&PostgresToMssqlMapper, "_int4", None, "VARCHAR(MAX)", true),
            (&PostgresToMssqlMapper, "integer[]", None, "VARCHAR(MAX)", true),
            (&PostgresToMssqlMapper, "jsonb", None, "VARCHAR(MAX)", true),
            (&PostgresToMssqlMapper, "tsvector", None, "VARCHAR(MAX)", true),
        ];
        for (mapper, source, length, expected, lossy) in cases {
            let mapping = mapper.map_type(source, length, None, None);
            assert_eq!(mapping.target_type, expected, "{}", source);
            assert_eq!(mapping.is_lossy, lossy, "{}", source);
        }
    }

    #[test]
    fn test_strip_wrapping_parens() {
        assert_eq!(strip_wrapping_parens("((0))"), "0");
        assert_eq!(strip_wrapping_parens("(getdate())"), "getdate()");
        assert_eq!(strip_wrapping_parens("(1)+(2)"), "(1)+(2)");
        assert_eq!(strip_wrapping_parens("('(x')"), "'(x'");
    }
}
