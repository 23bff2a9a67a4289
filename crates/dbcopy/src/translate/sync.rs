//! Synchronization procedures.
//!
//! `upd_<table>` merges the staging relation (see [`staging_name`]) into the
//! destination table: delete rows gone upstream, update rows whose non-key
//! values differ, insert new rows. Rows are matched on the primary key.

use crate::core::dialect::Dialect;
use crate::error::{MigrateError, Result};

use super::{staging_name, DdlPair, Translator};

const DEST_ALIAS: &str = "d";
const STAGE_ALIAS: &str = "st";

impl Translator {
    /// DROP/CREATE for the sync procedure of `table` in `schema`.
    ///
    /// The UPDATE step is omitted when the primary key covers every column.
    pub fn generate_sync_procedure(
        &self,
        schema: &str,
        table: &str,
        primary_key: &[String],
        columns: &[String],
    ) -> Result<DdlPair> {
        if primary_key.is_empty() {
            return Err(MigrateError::NoPrimaryKey(format!("{}.{}", schema, table)));
        }
        if let Some(missing) = primary_key.iter().find(|k| !columns.contains(*k)) {
            return Err(MigrateError::metadata(
                format!("{}.{}", schema, table),
                format!("primary key column {} is not a column of the table", missing),
            ));
        }

        let non_key: Vec<&String> = columns
            .iter()
            .filter(|c| !primary_key.contains(*c))
            .collect();
        let dest = self.dest();
        let procedure = dest.qualify(schema, &format!("upd_{}", table))?;
        let target = dest.qualify(schema, table)?;

        let key_match = |left: &str, right: &str| -> Result<String> {
            let parts = primary_key
                .iter()
                .map(|k| {
                    let k = dest.quote_ident(k)?;
                    Ok(format!("{}.{} = {}.{}", left, k, right, k))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(parts.join(" AND "))
        };
        let stage_list = columns
            .iter()
            .map(|c| Ok(format!("{}.{}", STAGE_ALIAS, dest.quote_ident(c)?)))
            .collect::<Result<Vec<_>>>()?
            .join(",");
        let column_list = dest.quote_list(columns)?;

        match dest {
            Dialect::Postgres => {
                let staging = dest.qualify(schema, &staging_name(table))?;
                let mut body = Vec::new();

                body.push(format!(
                    "DELETE FROM {target} AS {d}\nWHERE NOT EXISTS (SELECT 1 FROM {staging} AS {st} WHERE {on});",
                    target = target,
                    staging = staging,
                    d = DEST_ALIAS,
                    st = STAGE_ALIAS,
                    on = key_match(STAGE_ALIAS, DEST_ALIAS)?,
                ));

                if !non_key.is_empty() {
                    let mut sets = Vec::new();
                    let mut diffs = Vec::new();
                    for col in &non_key {
                        let q = dest.quote_ident(col)?;
                        sets.push(format!("{} = {}.{}", q, STAGE_ALIAS, q));
                        diffs.push(format!(
                            "{}.{} IS DISTINCT FROM {}.{}",
                            DEST_ALIAS, q, STAGE_ALIAS, q
                        ));
                    }
                    body.push(format!(
                        "UPDATE {target} AS {d}\nSET {sets}\nFROM {staging} AS {st}\nWHERE {on}\nAND ({diffs});",
                        target = target,
                        d = DEST_ALIAS,
                        sets = sets.join(","),
                        staging = staging,
                        st = STAGE_ALIAS,
                        on = key_match(STAGE_ALIAS, DEST_ALIAS)?,
                        diffs = diffs.join(" OR "),
                    ));
                }

                body.push(format!(
                    "INSERT INTO {target} ({cols})\nSELECT {stage_list}\nFROM {staging} AS {st}\nWHERE NOT EXISTS (SELECT 1 FROM {target} AS {d} WHERE {on});",
                    target = target,
                    cols = column_list,
                    stage_list = stage_list,
                    staging = staging,
                    st = STAGE_ALIAS,
                    d = DEST_ALIAS,
                    on = key_match(DEST_ALIAS, STAGE_ALIAS)?,
                ));

                Ok(DdlPair::new(
                    format!("DROP PROCEDURE IF EXISTS {}();", procedure),
                    format!(
                        "CREATE OR REPLACE PROCEDURE {}()\nLANGUAGE plpgsql\nAS $procedure$\nBEGIN\n{}\nEND\n$procedure$;",
                        procedure,
                        body.join("\n")
                    ),
                ))
            }
            Dialect::Mssql => {
                let source = dest.qualify(schema, &staging_name(table))?;
                let temp_name = format!("#{}", table);
                let temp = dest.quote_ident(&temp_name)?;
                let mut body = Vec::new();

                body.push("SET NOCOUNT ON;".to_string());
                body.push(format!(
                    "IF OBJECT_ID({}, 'U') IS NOT NULL DROP TABLE {};",
                    dest.quote_literal(&format!("tempdb..{}", temp_name)),
                    temp
                ));
                body.push(format!("SELECT * INTO {} FROM {};", temp, source));

                body.push(format!(
                    "DELETE {d} FROM {target} AS {d}\nWHERE NOT EXISTS (SELECT 1 FROM {temp} AS {st} WHERE {on});",
                    d = DEST_ALIAS,
                    target = target,
                    temp = temp,
                    st = STAGE_ALIAS,
                    on = key_match(STAGE_ALIAS, DEST_ALIAS)?,
                ));

                if !non_key.is_empty() {
                    let mut sets = Vec::new();
                    let mut diffs = Vec::new();
                    for col in &non_key {
                        let q = dest.quote_ident(col)?;
                        sets.push(format!("{} = {}.{}", q, STAGE_ALIAS, q));
                        // NULL-aware inequality; T-SQL has no IS DISTINCT FROM before 2022
                        diffs.push(format!(
                            "{d}.{c} <> {st}.{c} OR ({d}.{c} IS NULL AND {st}.{c} IS NOT NULL) OR ({d}.{c} IS NOT NULL AND {st}.{c} IS NULL)",
                            d = DEST_ALIAS,
                            st = STAGE_ALIAS,
                            c = q
                        ));
                    }
                    body.push(format!(
                        "UPDATE {d}\nSET {sets}\nFROM {target} AS {d}\nJOIN {temp} AS {st} ON {on}\nWHERE {diffs};",
                        d = DEST_ALIAS,
                        sets = sets.join(","),
                        target = target,
                        temp = temp,
                        st = STAGE_ALIAS,
                        on = key_match(STAGE_ALIAS, DEST_ALIAS)?,
                        diffs = diffs.join(" OR "),
                    ));
                }

                body.push(format!(
                    "INSERT INTO {target} ({cols})\nSELECT {stage_list}\nFROM {temp} AS {st}\nWHERE NOT EXISTS (SELECT 1 FROM {target} AS {d} WHERE {on});",
                    target = target,
                    cols = column_list,
                    stage_list = stage_list,
                    temp = temp,
                    st = STAGE_ALIAS,
                    d = DEST_ALIAS,
                    on = key_match(DEST_ALIAS, STAGE_ALIAS)?,
                ));
                body.push(format!("DROP TABLE {};", temp));

                Ok(DdlPair::new(
                    format!("DROP PROCEDURE IF EXISTS {};", procedure),
                    format!(
                        "CREATE PROCEDURE {} AS\nBEGIN\n{}\nEND;",
                        procedure,
                        body.join("\n")
                    ),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::tests::translator;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sync_postgres_full() {
        let t = translator(Dialect::Mssql, Dialect::Postgres);
        let ddl = t
            .generate_sync_procedure("dest", "orders", &names(&["id"]), &names(&["id", "total"]))
            .unwrap();

        assert_eq!(
            ddl.drop_sql(),
            "DROP PROCEDURE IF EXISTS \"dest\".\"upd_orders\"();"
        );
        let expected = "CREATE OR REPLACE PROCEDURE \"dest\".\"upd_orders\"()
LANGUAGE plpgsql
AS $procedure$
BEGIN
DELETE FROM \"dest\".\"orders\" AS d
WHERE NOT EXISTS (SELECT 1 FROM \"dest\".\"orderstemp\" AS st WHERE st.\"id\" = d.\"id\");
UPDATE \"dest\".\"orders\" AS d
SET \"total\" = st.\"total\"
FROM \"dest\".\"orderstemp\" AS st
WHERE st.\"id\" = d.\"id\"
AND (d.\"total\" IS DISTINCT FROM st.\"total\");
INSERT INTO \"dest\".\"orders\" (\"id\",\"total\")
SELECT st.\"id\",st.\"total\"
FROM \"dest\".\"orderstemp\" AS st
WHERE NOT EXISTS (SELECT 1 FROM \"dest\".\"orders\" AS d WHERE d.\"id\" = st.\"id\");
END
$procedure$;";
        assert_eq!(ddl.create_sql(), expected);
    }

    #[test]
    fn test_sync_step_order() {
        let t = translator(Dialect::Postgres, Dialect::Mssql);
        let ddl = t
            .generate_sync_procedure("dbo", "ORDERS", &names(&["ID"]), &names(&["ID", "QTY"]))
            .unwrap();
        let sql = ddl.create_sql();

        let delete = sql.find("DELETE d FROM").unwrap();
        let update = sql.find("UPDATE d").unwrap();
        let insert = sql.find("INSERT INTO").unwrap();
        assert!(delete < update && update < insert);
        assert!(sql.contains("SELECT * INTO [#ORDERS] FROM [dbo].[ORDERSTEMP];"));
        assert!(sql.contains("IF OBJECT_ID('tempdb..#ORDERS', 'U') IS NOT NULL"));
        assert_eq!(ddl.drop_sql(), "DROP PROCEDURE IF EXISTS [dbo].[upd_ORDERS];");
    }

    #[test]
    fn test_all_key_table_skips_update() {
        for dest in Dialect::ALL {
            let t = translator(Dialect::Postgres, dest);
            let cols = names(&["a", "b"]);
            let sql = t
                .generate_sync_procedure("s", "link", &cols, &cols)
                .unwrap()
                .create_sql();
            assert!(!sql.contains("UPDATE"), "{}", dest);
            assert!(sql.contains("DELETE"));
            assert!(sql.contains("INSERT INTO"));
        }
    }

    #[test]
    fn test_composite_key_matching() {
        let t = translator(Dialect::Postgres, Dialect::Postgres);
        let sql = t
            .generate_sync_procedure(
                "s",
                "lines",
                &names(&["order_id", "line"]),
                &names(&["order_id", "line", "qty"]),
            )
            .unwrap()
            .create_sql();
        assert!(sql.contains("st.\"order_id\" = d.\"order_id\" AND st.\"line\" = d.\"line\""));
    }

    #[test]
    fn test_sync_requires_primary_key() {
        let t = translator(Dialect::Postgres, Dialect::Postgres);
        let err = t
            .generate_sync_procedure("s", "t", &[], &names(&["a"]))
            .unwrap_err();
        assert!(matches!(err, MigrateError::NoPrimaryKey(_)));

        let err = t
            .generate_sync_procedure("s", "t", &names(&["x"]), &names(&["a"]))
            .unwrap_err();
        assert!(err.to_string().contains("primary key column x"));
    }

    #[test]
    fn test_sync_is_deterministic() {
        let t = translator(Dialect::Mssql, Dialect::Mssql);
        let pk = names(&["id"]);
        let cols = names(&["id", "a", "b"]);
        assert_eq!(
            t.generate_sync_procedure("dbo", "t", &pk, &cols).unwrap(),
            t.generate_sync_procedure("dbo", "t", &pk, &cols).unwrap()
        );
    }
}
