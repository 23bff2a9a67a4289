//! DDL generation for a (source, destination) dialect pair.
//!
//! A [`Translator`] is obtained from
//! [`TranslatorCatalog::translator`](crate::core::TranslatorCatalog::translator)
//! and turns normalized metadata into destination-dialect statements. Every
//! generator is pure: the same metadata always yields byte-identical SQL, so
//! reruns and exported files are reproducible.
//!
//! Generators return a [`DdlPair`]: the DROP statements and the CREATE
//! statements for one object. Identifiers are always quoted through
//! [`Dialect::quote_ident`]; nothing from the catalog is spliced in raw.

mod link;
mod program;
mod sync;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::core::dialect::Dialect;
use crate::core::identifier::strip_quotes;
use crate::core::schema::{ColumnMeta, IndexMeta, RenderedColumn};
use crate::core::traits::TypeMapper;
use crate::error::{MigrateError, Result};

pub use link::LinkSource;
pub use program::{definition_body, DefinitionHeader};

/// Statements that drop and recreate one object.
///
/// Applied in order: every `drop` statement, then every `create` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DdlPair {
    pub drop: Vec<String>,
    pub create: Vec<String>,
}

impl DdlPair {
    pub fn new(drop: impl Into<String>, create: impl Into<String>) -> Self {
        Self {
            drop: vec![drop.into()],
            create: vec![create.into()],
        }
    }

    /// Drop statements joined by newlines.
    pub fn drop_sql(&self) -> String {
        self.drop.join("\n")
    }

    /// Create statements joined by newlines.
    pub fn create_sql(&self) -> String {
        self.create.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.drop.is_empty() && self.create.is_empty()
    }

    /// Append another pair, keeping all drops ahead of all creates.
    ///
    /// Merging a table pair with its index pair yields the
    /// drop, drop-index, create, create-index order.
    pub fn merge(&mut self, other: DdlPair) {
        self.drop.extend(other.drop);
        self.create.extend(other.create);
    }

    /// All statements in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.drop
            .iter()
            .chain(self.create.iter())
            .map(String::as_str)
    }
}

/// Synthesized index name: `<table>_<col1>_<col2>_idx`.
///
/// Quote characters are stripped so the same (table, columns) always yields
/// the same identifier regardless of how the catalog quoted them.
pub fn index_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| strip_quotes(c.as_ref())).collect();
    format!("{}_{}_idx", strip_quotes(table), cols.join("_"))
}

/// [`index_name`] fitted to `dest`'s identifier limit.
///
/// An over-long name keeps its longest prefix that fits and ends in `_`
/// plus eight hex digits of the full name's SHA-256.
pub fn bounded_index_name<S: AsRef<str>>(dest: Dialect, table: &str, columns: &[S]) -> String {
    let name = index_name(table, columns);
    let limit = dest.max_identifier_len();
    if name.len() <= limit {
        return name;
    }
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let mut cut = limit - 9;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}_{}", &name[..cut], &digest[..8])
}

/// Name of the staging relation holding source rows for `table`.
///
/// The suffix follows the table's case so case-sensitive lookups match:
/// `ORDERS` stages into `ORDERSTEMP`, `orders` into `orderstemp`.
pub fn staging_name(table: &str) -> String {
    if table.to_uppercase() == table {
        format!("{}TEMP", table)
    } else {
        format!("{}temp", table)
    }
}

/// DDL generator bound to one dialect pair.
#[derive(Clone)]
pub struct Translator {
    mapper: Arc<dyn TypeMapper>,
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("source", &self.source())
            .field("dest", &self.dest())
            .finish()
    }
}

impl Translator {
    pub fn new(mapper: Arc<dyn TypeMapper>) -> Self {
        Self { mapper }
    }

    /// Source dialect.
    pub fn source(&self) -> Dialect {
        self.mapper.source_dialect()
    }

    /// Destination dialect.
    pub fn dest(&self) -> Dialect {
        self.mapper.target_dialect()
    }

    pub fn mapper(&self) -> &dyn TypeMapper {
        self.mapper.as_ref()
    }

    /// Render one column definition for the destination:
    /// `<quoted name> <TYPE>[ NOT NULL][ DEFAULT <expr>]`.
    pub fn render_column(&self, col: &ColumnMeta) -> Result<RenderedColumn> {
        let mapping = self.mapper.map_column(col);
        let default = self.mapper.map_default(col);

        let mut definition = format!(
            "{} {}",
            self.dest().quote_ident(&col.name)?,
            mapping.target_type
        );
        if !col.is_nullable {
            definition.push_str(" NOT NULL");
        }
        if !default.is_empty() {
            definition.push_str(" DEFAULT ");
            definition.push_str(&default);
        }

        Ok(RenderedColumn {
            meta: col.clone(),
            target_type: mapping.target_type,
            definition,
            warning: mapping.warning,
        })
    }

    /// Render columns, preserving their order.
    pub fn render_columns(&self, columns: &[ColumnMeta]) -> Result<Vec<RenderedColumn>> {
        columns.iter().map(|c| self.render_column(c)).collect()
    }

    /// DROP/CREATE for a table.
    ///
    /// Columns appear in the supplied order. A `PRIMARY KEY (...)` clause is
    /// appended only when `primary_key` is non-empty, listing its columns in
    /// the supplied order.
    pub fn generate_table(
        &self,
        schema: &str,
        table: &str,
        columns: &[RenderedColumn],
        primary_key: &[String],
    ) -> Result<DdlPair> {
        if columns.is_empty() {
            return Err(MigrateError::metadata(
                format!("{}.{}", schema, table),
                "table has no columns",
            ));
        }

        let dest = self.dest();
        let qualified = dest.qualify(schema, table)?;

        let mut body: Vec<String> = columns.iter().map(|c| c.definition.clone()).collect();
        if !primary_key.is_empty() {
            body.push(format!("PRIMARY KEY ({})", dest.quote_list(primary_key)?));
        }
        let body = body.join(",");

        Ok(match dest {
            Dialect::Postgres => DdlPair::new(
                format!("DROP TABLE IF EXISTS {} CASCADE;", qualified),
                format!("CREATE TABLE IF NOT EXISTS {} ({});", qualified, body),
            ),
            Dialect::Mssql => DdlPair::new(
                format!("DROP TABLE IF EXISTS {};", qualified),
                format!("CREATE TABLE {} ({});", qualified, body),
            ),
        })
    }

    /// DROP/CREATE for each secondary index.
    ///
    /// Primary-key-backed indexes are skipped since the table DDL already
    /// declares the key. Index names are synthesized with
    /// [`bounded_index_name`]; two indexes over the same columns collapse
    /// into one, and the unique one wins.
    pub fn generate_indexes(&self, schema: &str, indexes: &[IndexMeta]) -> Result<DdlPair> {
        let dest = self.dest();
        let mut pair = DdlPair::default();

        // One index per synthesized name; a unique one replaces a plain one.
        let mut selected: Vec<(String, &IndexMeta)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for index in indexes {
            if index.is_primary_key || index.columns.is_empty() {
                continue;
            }
            let name = bounded_index_name(dest, &index.table, &index.columns);
            match positions.get(&name) {
                Some(&pos) => {
                    let kept = &mut selected[pos];
                    if index.is_unique && !kept.1.is_unique {
                        kept.1 = index;
                    }
                }
                None => {
                    positions.insert(name.clone(), selected.len());
                    selected.push((name, index));
                }
            }
        }

        for (name, index) in selected {
            let table = dest.qualify(schema, &index.table)?;
            let columns = dest.quote_list(&index.columns)?;
            let unique = if index.is_unique { "UNIQUE " } else { "" };

            match dest {
                Dialect::Postgres => {
                    pair.drop.push(format!(
                        "DROP INDEX IF EXISTS {};",
                        dest.qualify(schema, &name)?
                    ));
                    pair.create.push(format!(
                        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({});",
                        unique,
                        dest.quote_ident(&name)?,
                        table,
                        columns
                    ));
                }
                Dialect::Mssql => {
                    let quoted = dest.quote_ident(&name)?;
                    pair.drop
                        .push(format!("DROP INDEX IF EXISTS {} ON {};", quoted, table));
                    pair.create.push(format!(
                        "CREATE {}INDEX {} ON {} ({});",
                        unique, quoted, table, columns
                    ));
                }
            }
        }

        Ok(pair)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::TranslatorCatalog;

    pub(crate) fn translator(source: Dialect, dest: Dialect) -> Translator {
        TranslatorCatalog::with_builtins()
            .translator(source, dest)
            .unwrap()
    }

    fn orders_columns() -> Vec<ColumnMeta> {
        vec![
            ColumnMeta::new("id", "integer").not_null().at(1),
            ColumnMeta::new("total", "numeric").with_precision(10, 2).at(2),
        ]
    }

    fn index(table: &str, name: &str, cols: &[&str], unique: bool, pk: bool) -> IndexMeta {
        IndexMeta {
            schema: "src".into(),
            table: table.into(),
            name: name.into(),
            columns: cols.iter().map(|c| c.to_string()).collect(),
            is_unique: unique,
            is_primary_key: pk,
        }
    }

    #[test]
    fn test_generate_table_postgres_example() {
        let t = translator(Dialect::Postgres, Dialect::Postgres);
        let cols = t.render_columns(&orders_columns()).unwrap();
        let ddl = t
            .generate_table("dest", "orders", &cols, &["id".to_string()])
            .unwrap();

        assert_eq!(
            ddl.drop_sql(),
            "DROP TABLE IF EXISTS \"dest\".\"orders\" CASCADE;"
        );
        assert_eq!(
            ddl.create_sql(),
            "CREATE TABLE IF NOT EXISTS \"dest\".\"orders\" (\"id\" INT NOT NULL,\"total\" NUMERIC(10,2),PRIMARY KEY (\"id\"));"
        );
    }

    #[test]
    fn test_generate_table_is_deterministic() {
        let t = translator(Dialect::Mssql, Dialect::Postgres);
        let cols = t
            .render_columns(&[
                ColumnMeta::new("Id", "int").not_null(),
                ColumnMeta::new("Name", "nvarchar").with_length(-1),
                ColumnMeta::new("Created", "datetime").with_default("(getdate())"),
            ])
            .unwrap();
        let a = t.generate_table("dbo", "Users", &cols, &["Id".into()]).unwrap();
        let b = t.generate_table("dbo", "Users", &cols, &["Id".into()]).unwrap();
        assert_eq!(a, b);
        assert!(a.create_sql().contains("\"Name\" TEXT"));
        assert!(a
            .create_sql()
            .contains("\"Created\" TIMESTAMP DEFAULT CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_generate_table_keeps_column_order() {
        let t = translator(Dialect::Postgres, Dialect::Postgres);
        let names = ["zeta", "alpha", "mid", "beta"];
        let cols: Vec<ColumnMeta> = names
            .iter()
            .enumerate()
            .map(|(i, n)| ColumnMeta::new(*n, "text").at(i as i32 + 1))
            .collect();
        let cols = t.render_columns(&cols).unwrap();
        let sql = t.generate_table("s", "t", &cols, &[]).unwrap().create_sql();

        let positions: Vec<usize> = names
            .iter()
            .map(|n| sql.find(&format!("\"{}\"", n)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_primary_key_clause_only_when_present() {
        let t = translator(Dialect::Postgres, Dialect::Postgres);
        let cols = t.render_columns(&orders_columns()).unwrap();

        let without = t.generate_table("s", "orders", &cols, &[]).unwrap();
        assert!(!without.create_sql().contains("PRIMARY KEY"));

        let composite = t
            .generate_table("s", "orders", &cols, &["total".into(), "id".into()])
            .unwrap();
        assert!(composite
            .create_sql()
            .contains("PRIMARY KEY (\"total\",\"id\")"));
    }

    #[test]
    fn test_generate_table_mssql_dest() {
        let t = translator(Dialect::Postgres, Dialect::Mssql);
        let cols = t.render_columns(&orders_columns()).unwrap();
        let ddl = t.generate_table("dbo", "orders", &cols, &["id".into()]).unwrap();
        assert_eq!(ddl.drop_sql(), "DROP TABLE IF EXISTS [dbo].[orders];");
        assert_eq!(
            ddl.create_sql(),
            "CREATE TABLE [dbo].[orders] ([id] INT NOT NULL,[total] DECIMAL(10,2),PRIMARY KEY ([id]));"
        );
    }

    #[test]
    fn test_generate_table_rejects_empty_columns() {
        let t = translator(Dialect::Postgres, Dialect::Postgres);
        assert!(t.generate_table("s", "t", &[], &[]).is_err());
    }

    #[test]
    fn test_render_column_carries_warning() {
        let t = translator(Dialect::Postgres, Dialect::Mssql);
        let col = t.render_column(&ColumnMeta::new("doc", "jsonb")).unwrap();
        assert_eq!(col.definition, "[doc] VARCHAR(MAX)");
        assert!(col.warning.is_some());
    }

    #[test]
    fn test_index_name() {
        assert_eq!(index_name("orders", &["customer_id"]), "orders_customer_id_idx");
        assert_eq!(
            index_name("\"Orders\"", &["[Region]", "\"Placed At\""]),
            "Orders_Region_Placed At_idx"
        );
    }

    #[test]
    fn test_staging_name_follows_case() {
        assert_eq!(staging_name("ORDERS"), "ORDERSTEMP");
        assert_eq!(staging_name("orders"), "orderstemp");
        assert_eq!(staging_name("Orders"), "Orderstemp");
    }

    #[test]
    fn test_generate_indexes_postgres() {
        let t = translator(Dialect::Mssql, Dialect::Postgres);
        let ddl = t
            .generate_indexes(
                "dest",
                &[
                    index("orders", "PK_orders", &["id"], true, true),
                    index("orders", "IX_a", &["customer_id", "placed"], false, false),
                    index("orders", "UX_b", &["code"], true, false),
                ],
            )
            .unwrap();

        assert_eq!(
            ddl.drop,
            vec![
                "DROP INDEX IF EXISTS \"dest\".\"orders_customer_id_placed_idx\";",
                "DROP INDEX IF EXISTS \"dest\".\"orders_code_idx\";",
            ]
        );
        assert_eq!(
            ddl.create,
            vec![
                "CREATE INDEX IF NOT EXISTS \"orders_customer_id_placed_idx\" ON \"dest\".\"orders\" (\"customer_id\",\"placed\");",
                "CREATE UNIQUE INDEX IF NOT EXISTS \"orders_code_idx\" ON \"dest\".\"orders\" (\"code\");",
            ]
        );
    }

    #[test]
    fn test_generate_indexes_mssql_and_stable_names() {
        let t = translator(Dialect::Postgres, Dialect::Mssql);
        let indexes = [
            index("orders", "orders_a", &["a"], false, false),
            index("orders", "orders_a_dup", &["a"], true, false),
        ];
        let first = t.generate_indexes("dbo", &indexes).unwrap();
        let second = t.generate_indexes("dbo", &indexes).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.drop,
            vec!["DROP INDEX IF EXISTS [orders_a_idx] ON [dbo].[orders];"]
        );
        assert_eq!(
            first.create,
            vec!["CREATE UNIQUE INDEX [orders_a_idx] ON [dbo].[orders] ([a]);"]
        );
    }

    #[test]
    fn test_unique_index_wins_name_collision() {
        let indexes = [
            index("orders", "ix_a", &["a"], false, false),
            index("orders", "ux_a", &["a"], true, false),
            index("orders", "ix_a_again", &["a"], false, false),
            index("orders", "ix_b", &["b"], false, false),
        ];
        let ddl = translator(Dialect::Postgres, Dialect::Postgres)
            .generate_indexes("s", &indexes)
            .unwrap();
        assert_eq!(
            ddl.create,
            vec![
                "CREATE UNIQUE INDEX IF NOT EXISTS \"orders_a_idx\" ON \"s\".\"orders\" (\"a\");",
                "CREATE INDEX IF NOT EXISTS \"orders_b_idx\" ON \"s\".\"orders\" (\"b\");",
            ]
        );
    }

    #[test]
    fn test_long_index_names_fit_destination_limit() {
        let columns = [
            "customer_account_identifier",
            "order_placement_timestamp_utc",
            "fulfillment_warehouse_region_code",
            "shipping_carrier_service_level",
        ];
        let indexes = [index("customer_orders_history", "ix_long", &columns, false, false)];
        let full = index_name("customer_orders_history", &columns);
        assert!(full.len() > 128);

        for dest in [Dialect::Postgres, Dialect::Mssql] {
            let name = bounded_index_name(dest, "customer_orders_history", &columns);
            assert_eq!(name.len(), dest.max_identifier_len());
            assert!(name.starts_with("customer_orders_history_customer_account_identifier"));
            assert_eq!(name, bounded_index_name(dest, "customer_orders_history", &columns));

            let ddl = translator(Dialect::Postgres, dest)
                .generate_indexes("s", &indexes)
                .unwrap();
            assert_eq!(ddl.create.len(), 1);
            assert!(ddl.create[0].contains(&name));
        }

        // Names that share the truncated prefix stay distinct.
        let mut other = columns;
        other[3] = "shipping_carrier_service_tier";
        assert_ne!(
            bounded_index_name(Dialect::Postgres, "customer_orders_history", &columns),
            bounded_index_name(Dialect::Postgres, "customer_orders_history", &other)
        );
        assert_eq!(bounded_index_name(Dialect::Postgres, "orders", &["a"]), "orders_a_idx");
    }

    #[test]
    fn test_merge_keeps_drops_first() {
        let mut table = DdlPair::new("DROP t", "CREATE t");
        table.merge(DdlPair::new("DROP i", "CREATE i"));
        let order: Vec<&str> = table.statements().collect();
        assert_eq!(order, vec!["DROP t", "DROP i", "CREATE t", "CREATE i"]);
    }
}
