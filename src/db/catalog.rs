//! Catalog queries used for schema probing and table introspection.
//!
//! Every query here is a plain SELECT and must pass the forced read-only
//! policy check before it runs.

/// Backend-specific catalog SQL.
///
/// Parameter order: `schema_probe`, `list_tables` take the schema name;
/// the `table_*` queries take the table name then the schema name.
#[derive(Debug)]
pub struct Catalog {
    pub backend: &'static str,
    pub ping: &'static str,
    pub schema_probe: &'static str,
    pub list_schemas: &'static str,
    pub list_tables: &'static str,
    pub table_columns: &'static str,
    pub table_indexes: &'static str,
    pub table_constraints: &'static str,
}

impl Catalog {
    /// Every statement in the catalog, for validation.
    pub fn statements(&self) -> [&'static str; 7] {
        [
            self.ping,
            self.schema_probe,
            self.list_schemas,
            self.list_tables,
            self.table_columns,
            self.table_indexes,
            self.table_constraints,
        ]
    }
}

pub static POSTGRES: Catalog = Catalog {
    backend: "postgres",
    ping: "SELECT 1 AS test_connection",
    schema_probe: r#"
        SELECT schema_name::text AS schemaname
        FROM information_schema.schemata
        WHERE schema_name = $1
    "#,
    list_schemas: r#"
        SELECT schema_name::text AS schemaname
        FROM information_schema.schemata
        WHERE schema_name NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
            AND schema_name NOT LIKE 'pg_temp_%'
            AND schema_name NOT LIKE 'pg_toast_temp_%'
        ORDER BY schema_name
    "#,
    list_tables: r#"
        SELECT
            schemaname::text AS schemaname,
            tablename::text AS tablename,
            tableowner::text AS tableowner,
            hasindexes,
            hasrules,
            hastriggers,
            rowsecurity
        FROM pg_catalog.pg_tables
        WHERE schemaname = $1
        ORDER BY tablename
    "#,
    table_columns: r#"
        SELECT
            c.column_name::text AS column_name,
            c.data_type::text AS data_type,
            c.character_maximum_length::int8 AS character_maximum_length,
            c.numeric_precision::int8 AS numeric_precision,
            c.numeric_scale::int8 AS numeric_scale,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default,
            c.ordinal_position::int8 AS ordinal_position,
            CASE WHEN pk.column_name IS NOT NULL THEN 'YES' ELSE 'NO' END AS is_primary_key,
            col_description(
                format('%I.%I', c.table_schema, c.table_name)::regclass,
                c.ordinal_position::int
            ) AS column_comment
        FROM information_schema.columns c
        LEFT JOIN (
            SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_name = $1
                AND tc.table_schema = $2
        ) pk ON c.column_name = pk.column_name
        WHERE c.table_name = $1
            AND c.table_schema = $2
        ORDER BY c.ordinal_position
    "#,
    table_indexes: r#"
        SELECT
            indexname::text AS indexname,
            indexdef,
            CASE WHEN indexdef LIKE 'CREATE UNIQUE%' THEN 'YES' ELSE 'NO' END AS is_unique
        FROM pg_catalog.pg_indexes
        WHERE tablename = $1
            AND schemaname = $2
        ORDER BY indexname
    "#,
    table_constraints: r#"
        SELECT
            tc.constraint_name::text AS constraint_name,
            tc.constraint_type::text AS constraint_type,
            kcu.column_name::text AS column_name,
            (CASE WHEN tc.constraint_type = 'FOREIGN KEY'
                THEN ccu.table_schema || '.' || ccu.table_name || '.' || ccu.column_name
                ELSE NULL
            END)::text AS foreign_key_references
        FROM information_schema.table_constraints tc
        LEFT JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        LEFT JOIN information_schema.constraint_column_usage ccu
            ON tc.constraint_name = ccu.constraint_name
            AND tc.constraint_schema = ccu.constraint_schema
        WHERE tc.table_name = $1
            AND tc.table_schema = $2
        ORDER BY tc.constraint_type, tc.constraint_name
    "#,
};
