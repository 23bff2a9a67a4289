//! Views and routines.
//!
//! Definitions are opaque: only the wrapping CREATE/DROP header is rebuilt
//! for the destination. A light tokenizer finds where a source header ends
//! (`CREATE [OR ALTER] VIEW|PROC|PROCEDURE|FUNCTION <name> ... AS`) while
//! skipping comments, string literals and quoted identifiers.

use crate::core::dialect::Dialect;
use crate::core::schema::{RoutineKind, RoutineMeta, RoutineParam, ViewMeta};
use crate::error::{MigrateError, Result};

use super::{DdlPair, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Quoted,
    Dot,
    Open,
    Close,
    Other,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn is_word_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'@' | b'#' | b'$') || c >= 0x80
}

/// Split SQL text into tokens. Only ASCII bytes delimit tokens, so every
/// boundary is a char boundary.
fn tokenize(text: &str) -> Vec<Token> {
    let b = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < b.len() {
        let c = b[i];
        let start = i;
        let kind = match c {
            _ if c.is_ascii_whitespace() => {
                i += 1;
                continue;
            }
            b'-' if b.get(i + 1) == Some(&b'-') => {
                while i < b.len() && b[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if b.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < b.len() && !(b[i] == b'*' && b.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(b.len());
                continue;
            }
            b'\'' | b'"' | b'[' => {
                let close = if c == b'[' { b']' } else { c };
                i += 1;
                while i < b.len() {
                    if b[i] == close {
                        if b.get(i + 1) == Some(&close) {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                if c == b'\'' {
                    TokenKind::Other
                } else {
                    TokenKind::Quoted
                }
            }
            b'.' => {
                i += 1;
                TokenKind::Dot
            }
            b'(' => {
                i += 1;
                TokenKind::Open
            }
            b')' => {
                i += 1;
                TokenKind::Close
            }
            _ if is_word_byte(c) => {
                while i < b.len() && is_word_byte(b[i]) {
                    i += 1;
                }
                TokenKind::Word
            }
            _ => {
                i += 1;
                TokenKind::Other
            }
        };
        tokens.push(Token {
            kind,
            start,
            end: i,
        });
    }

    tokens
}

/// Location of the CREATE header inside a source definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionHeader {
    /// `VIEW`, `PROCEDURE` or `FUNCTION`.
    pub kind: String,
    /// Byte offset just past the object name.
    pub name_end: usize,
    /// Byte offset just past the first top-level `AS` after the name.
    pub body_start: Option<usize>,
}

impl DefinitionHeader {
    /// Locate the header, or `None` when the text does not start with one
    /// (e.g. a PostgreSQL view definition, which is the bare query).
    pub fn parse(definition: &str) -> Option<Self> {
        let tokens = tokenize(definition);
        let word = |idx: usize| -> Option<String> {
            tokens
                .get(idx)
                .filter(|t| t.kind == TokenKind::Word)
                .map(|t| definition[t.start..t.end].to_ascii_uppercase())
        };

        let mut idx = 0;
        if word(idx)?.as_str() != "CREATE" {
            return None;
        }
        idx += 1;
        if word(idx).as_deref() == Some("OR") {
            match word(idx + 1).as_deref() {
                Some("ALTER") | Some("REPLACE") => idx += 2,
                _ => return None,
            }
        }

        let kind = match word(idx)?.as_str() {
            "VIEW" => "VIEW",
            "PROC" | "PROCEDURE" => "PROCEDURE",
            "FUNCTION" => "FUNCTION",
            _ => return None,
        };
        idx += 1;

        let is_name = |t: &Token| matches!(t.kind, TokenKind::Word | TokenKind::Quoted);
        let mut last = tokens.get(idx).filter(|t| is_name(*t))?;
        idx += 1;
        while tokens.get(idx).map(|t| t.kind) == Some(TokenKind::Dot) {
            match tokens.get(idx + 1).filter(|t| is_name(*t)) {
                Some(next) => {
                    last = next;
                    idx += 2;
                }
                None => break,
            }
        }
        let name_end = last.end;

        let mut depth = 0i32;
        let mut body_start = None;
        for t in &tokens[idx..] {
            match t.kind {
                TokenKind::Open => depth += 1,
                TokenKind::Close => depth -= 1,
                TokenKind::Word
                    if depth == 0 && definition[t.start..t.end].eq_ignore_ascii_case("AS") =>
                {
                    body_start = Some(t.end);
                    break;
                }
                _ => {}
            }
        }

        Some(Self {
            kind: kind.to_string(),
            name_end,
            body_start,
        })
    }
}

/// The definition with any CREATE header removed, trimmed.
pub fn definition_body(definition: &str) -> &str {
    match DefinitionHeader::parse(definition).and_then(|h| h.body_start) {
        Some(start) => definition[start..].trim(),
        None => definition.trim(),
    }
}

fn terminated(body: &str) -> String {
    if body.ends_with(';') {
        body.to_string()
    } else {
        format!("{};", body)
    }
}

impl Translator {
    /// DROP/CREATE for a view.
    ///
    /// PostgreSQL destinations rely on `CREATE OR REPLACE` and emit no drop.
    pub fn generate_view(&self, schema: &str, view: &ViewMeta) -> Result<DdlPair> {
        if view.definition.trim().is_empty() {
            return Err(MigrateError::metadata(
                format!("{}.{}", view.schema, view.name),
                "view definition is empty or not readable",
            ));
        }

        let dest = self.dest();
        let qualified = dest.qualify(schema, &view.name)?;

        match dest {
            Dialect::Postgres => Ok(DdlPair {
                drop: Vec::new(),
                create: vec![format!(
                    "CREATE OR REPLACE VIEW {} AS\n{}",
                    qualified,
                    terminated(definition_body(&view.definition))
                )],
            }),
            Dialect::Mssql => {
                let create = match self.rename_header(&view.definition) {
                    Some(rest) => format!("CREATE VIEW {}{}", qualified, rest.trim_end()),
                    None => format!(
                        "CREATE VIEW {} AS\n{}",
                        qualified,
                        definition_body(&view.definition)
                    ),
                };
                Ok(DdlPair::new(
                    format!("DROP VIEW IF EXISTS {};", qualified),
                    create,
                ))
            }
        }
    }

    /// DROP/CREATE for a procedure or function.
    pub fn generate_routine(&self, schema: &str, routine: &RoutineMeta) -> Result<DdlPair> {
        if routine.definition.trim().is_empty() {
            return Err(MigrateError::metadata(
                format!("{}.{}", routine.schema, routine.name),
                "routine definition is empty or not readable",
            ));
        }

        let dest = self.dest();
        let qualified = dest.qualify(schema, &routine.name)?;
        let keyword = routine.kind.keyword();
        let body = definition_body(&routine.definition);

        match dest {
            Dialect::Postgres => {
                let mut params = Vec::with_capacity(routine.parameters.len());
                let mut signature = Vec::new();
                for (pos, p) in routine.parameters.iter().enumerate() {
                    let ty = self.param_type(p);
                    let name = dest.quote_ident(&param_name(p, pos))?;
                    let mode = p.mode.trim().to_uppercase();
                    match mode.as_str() {
                        "OUT" | "INOUT" => params.push(format!("{} {} {}", mode, name, ty)),
                        _ => params.push(format!("{} {}", name, ty)),
                    }
                    if mode != "OUT" || routine.kind == RoutineKind::Procedure {
                        signature.push(ty);
                    }
                }

                let returns = match (&routine.kind, &routine.return_type) {
                    (RoutineKind::Function, Some(rt)) if !rt.trim().is_empty() => format!(
                        "RETURNS {}\n",
                        self.mapper().map_type(rt, None, None, None).target_type
                    ),
                    _ => String::new(),
                };

                let language = match self.source() {
                    Dialect::Postgres if !routine.language.trim().is_empty() => {
                        routine.language.trim().to_lowercase()
                    }
                    _ => "plpgsql".to_string(),
                };
                let tag = keyword.to_lowercase();

                Ok(DdlPair::new(
                    format!(
                        "DROP {} IF EXISTS {}({});",
                        keyword,
                        qualified,
                        signature.join(",")
                    ),
                    format!(
                        "CREATE OR REPLACE {} {}({})\n{}LANGUAGE {}\nAS ${}$\n{}\n${}$;",
                        keyword,
                        qualified,
                        params.join(","),
                        returns,
                        language,
                        tag,
                        body,
                        tag
                    ),
                ))
            }
            Dialect::Mssql => {
                let create = match self.rename_header(&routine.definition) {
                    Some(rest) => format!("CREATE {} {}{}", keyword, qualified, rest.trim_end()),
                    None => {
                        let params: Vec<String> = routine
                            .parameters
                            .iter()
                            .enumerate()
                            .map(|(pos, p)| {
                                let output = match p.mode.trim().to_uppercase().as_str() {
                                    "OUT" | "INOUT" => " OUTPUT",
                                    _ => "",
                                };
                                format!("@{} {}{}", param_name(p, pos), self.param_type(p), output)
                            })
                            .collect();

                        let mut header = format!("CREATE {} {}", keyword, qualified);
                        match routine.kind {
                            RoutineKind::Function => {
                                header.push_str(&format!("({})", params.join(",")));
                                if let Some(rt) = routine.return_type.as_deref() {
                                    header.push_str(&format!(
                                        " RETURNS {}",
                                        self.mapper().map_type(rt, None, None, None).target_type
                                    ));
                                }
                            }
                            RoutineKind::Procedure if !params.is_empty() => {
                                header.push_str(&format!(" {}", params.join(",")));
                            }
                            RoutineKind::Procedure => {}
                        }
                        format!("{}\nAS\n{}", header, body)
                    }
                };

                Ok(DdlPair::new(
                    format!("DROP {} IF EXISTS {};", keyword, qualified),
                    create,
                ))
            }
        }
    }

    /// For a same-dialect SQL Server copy, the source text after the object
    /// name, so only the name is replaced.
    fn rename_header<'a>(&self, definition: &'a str) -> Option<&'a str> {
        if self.source() != Dialect::Mssql {
            return None;
        }
        DefinitionHeader::parse(definition).map(|h| &definition[h.name_end..])
    }

    fn param_type(&self, p: &RoutineParam) -> String {
        self.mapper()
            .map_type(&p.data_type, p.max_length, p.precision, p.scale)
            .target_type
    }
}

fn param_name(p: &RoutineParam, pos: usize) -> String {
    let name = p.name.trim().trim_start_matches('@');
    if name.is_empty() {
        format!("p{}", pos + 1)
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::tests::translator;

    fn view(def: &str) -> ViewMeta {
        ViewMeta {
            schema: "src".into(),
            name: "v_orders".into(),
            definition: def.into(),
        }
    }

    fn param(name: &str, mode: &str, ty: &str) -> RoutineParam {
        RoutineParam {
            name: name.into(),
            mode: mode.into(),
            data_type: ty.into(),
            max_length: None,
            precision: None,
            scale: None,
        }
    }

    #[test]
    fn test_header_parse() {
        let def = "-- report view\n/* v2 */ CREATE   VIEW [dbo].[v as x] WITH SCHEMABINDING AS SELECT 1 AS a";
        let h = DefinitionHeader::parse(def).unwrap();
        assert_eq!(h.kind, "VIEW");
        assert_eq!(&def[..h.name_end], "-- report view\n/* v2 */ CREATE   VIEW [dbo].[v as x]");
        assert_eq!(definition_body(def), "SELECT 1 AS a");
    }

    #[test]
    fn test_header_skips_parenthesized_as() {
        let def = "CREATE OR ALTER FUNCTION dbo.f(@a int) RETURNS TABLE AS RETURN (SELECT CAST(@a AS int) AS v)";
        let h = DefinitionHeader::parse(def).unwrap();
        assert_eq!(h.kind, "FUNCTION");
        assert_eq!(definition_body(def), "RETURN (SELECT CAST(@a AS int) AS v)");
    }

    #[test]
    fn test_no_header() {
        assert!(DefinitionHeader::parse(" SELECT o.id FROM orders o;").is_none());
        assert_eq!(definition_body(" SELECT o.id FROM orders o;\n"), "SELECT o.id FROM orders o;");
        assert!(DefinitionHeader::parse("CREATE TABLE t (a int)").is_none());
    }

    #[test]
    fn test_view_to_postgres() {
        let t = translator(Dialect::Postgres, Dialect::Postgres);
        let ddl = t.generate_view("rpt", &view(" SELECT id FROM orders")).unwrap();
        assert!(ddl.drop.is_empty());
        assert_eq!(
            ddl.create_sql(),
            "CREATE OR REPLACE VIEW \"rpt\".\"v_orders\" AS\nSELECT id FROM orders;"
        );

        let t = translator(Dialect::Mssql, Dialect::Postgres);
        let ddl = t
            .generate_view("rpt", &view("CREATE VIEW dbo.v_orders AS SELECT id FROM orders"))
            .unwrap();
        assert_eq!(
            ddl.create_sql(),
            "CREATE OR REPLACE VIEW \"rpt\".\"v_orders\" AS\nSELECT id FROM orders;"
        );
    }

    #[test]
    fn test_view_to_mssql_renames_header() {
        let t = translator(Dialect::Mssql, Dialect::Mssql);
        let ddl = t
            .generate_view(
                "rpt",
                &view("CREATE VIEW [dbo].[v_orders] WITH SCHEMABINDING AS SELECT id FROM dbo.orders\n"),
            )
            .unwrap();
        assert_eq!(ddl.drop_sql(), "DROP VIEW IF EXISTS [rpt].[v_orders];");
        assert_eq!(
            ddl.create_sql(),
            "CREATE VIEW [rpt].[v_orders] WITH SCHEMABINDING AS SELECT id FROM dbo.orders"
        );

        let t = translator(Dialect::Postgres, Dialect::Mssql);
        let ddl = t.generate_view("rpt", &view(" SELECT id FROM orders;")).unwrap();
        assert_eq!(
            ddl.create_sql(),
            "CREATE VIEW [rpt].[v_orders] AS\nSELECT id FROM orders;"
        );
    }

    #[test]
    fn test_empty_definition_is_metadata_error() {
        let t = translator(Dialect::Mssql, Dialect::Mssql);
        let err = t.generate_view("dbo", &view("  ")).unwrap_err();
        assert!(matches!(err, MigrateError::Metadata { .. }));
    }

    #[test]
    fn test_function_to_postgres() {
        let t = translator(Dialect::Postgres, Dialect::Postgres);
        let routine = RoutineMeta {
            schema: "public".into(),
            name: "order_total".into(),
            kind: RoutineKind::Function,
            language: "PLPGSQL".into(),
            return_type: Some("numeric".into()),
            parameters: vec![param("p_id", "IN", "integer"), param("p_rate", "OUT", "real")],
            definition: "\nBEGIN\n  RETURN 1;\nEND\n".into(),
        };
        let ddl = t.generate_routine("app", &routine).unwrap();
        assert_eq!(
            ddl.drop_sql(),
            "DROP FUNCTION IF EXISTS \"app\".\"order_total\"(INT);"
        );
        assert_eq!(
            ddl.create_sql(),
            "CREATE OR REPLACE FUNCTION \"app\".\"order_total\"(\"p_id\" INT,OUT \"p_rate\" REAL)\nRETURNS NUMERIC\nLANGUAGE plpgsql\nAS $function$\nBEGIN\n  RETURN 1;\nEND\n$function$;"
        );
    }

    #[test]
    fn test_procedure_mssql_to_postgres() {
        let t = translator(Dialect::Mssql, Dialect::Postgres);
        let routine = RoutineMeta {
            schema: "dbo".into(),
            name: "purge".into(),
            kind: RoutineKind::Procedure,
            language: "SQL".into(),
            return_type: None,
            parameters: vec![param("@days", "IN", "int")],
            definition: "CREATE PROCEDURE dbo.purge @days int AS\nBEGIN\n DELETE FROM log;\nEND".into(),
        };
        let ddl = t.generate_routine("dbo", &routine).unwrap();
        assert_eq!(ddl.drop_sql(), "DROP PROCEDURE IF EXISTS \"dbo\".\"purge\"(INT);");
        assert!(ddl.create_sql().starts_with(
            "CREATE OR REPLACE PROCEDURE \"dbo\".\"purge\"(\"days\" INT)\nLANGUAGE plpgsql\nAS $procedure$\nBEGIN\n DELETE FROM log;\nEND\n$procedure$;"
        ));
    }

    #[test]
    fn test_procedure_mssql_to_mssql_keeps_text() {
        let t = translator(Dialect::Mssql, Dialect::Mssql);
        let routine = RoutineMeta {
            schema: "dbo".into(),
            name: "purge".into(),
            kind: RoutineKind::Procedure,
            language: "SQL".into(),
            return_type: None,
            parameters: vec![],
            definition: "create proc dbo.purge @days int = 30 AS DELETE FROM log".into(),
        };
        let ddl = t.generate_routine("ops", &routine).unwrap();
        assert_eq!(ddl.drop_sql(), "DROP PROCEDURE IF EXISTS [ops].[purge];");
        assert_eq!(
            ddl.create_sql(),
            "CREATE PROCEDURE [ops].[purge] @days int = 30 AS DELETE FROM log"
        );
    }

    #[test]
    fn test_function_postgres_to_mssql() {
        let t = translator(Dialect::Postgres, Dialect::Mssql);
        let routine = RoutineMeta {
            schema: "public".into(),
            name: "twice".into(),
            kind: RoutineKind::Function,
            language: "sql".into(),
            return_type: Some("integer".into()),
            parameters: vec![param("", "IN", "integer")],
            definition: "BEGIN RETURN @p1 * 2; END".into(),
        };
        let ddl = t.generate_routine("dbo", &routine).unwrap();
        assert_eq!(ddl.drop_sql(), "DROP FUNCTION IF EXISTS [dbo].[twice];");
        assert_eq!(
            ddl.create_sql(),
            "CREATE FUNCTION [dbo].[twice](@p1 INT) RETURNS INT\nAS\nBEGIN RETURN @p1 * 2; END"
        );
    }
}
