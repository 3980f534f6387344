//! Business Schema
//!
//! Table → column mapping used by the schema validator. Names are lower-cased
//! once at construction and the PostgreSQL system catalog is merged in, so
//! introspection queries never look like hallucinations.

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

const PG_TABLES_COLUMNS: &[&str] = &[
    "schemaname", "tablename", "tableowner", "tablespace", "hasindexes", "hasrules",
    "hastriggers", "rowsecurity",
];

lazy_static! {
    /// PostgreSQL catalog and information_schema relations that are always valid
    pub static ref SYSTEM_CATALOG: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("pg_tables", PG_TABLES_COLUMNS.to_vec()),
        ("pg_catalog.pg_tables", PG_TABLES_COLUMNS.to_vec()),
        ("pg_class", vec![
            "relname", "relnamespace", "reltype", "relowner", "relam", "relfilenode",
            "reltablespace", "relpages", "reltuples", "relallvisible", "reltoastrelid",
            "relhasindex", "relisshared", "relpersistence", "relkind", "relnatts", "relchecks",
            "relhasrules", "relhastriggers", "relhassubclass", "relrowsecurity",
            "relforcerowsecurity", "relispopulated", "relreplident", "relispartition",
            "relfrozenxid", "relminmxid", "relacl", "reloptions", "relpartbound",
        ]),
        ("pg_namespace", vec!["nspname", "nspowner", "nspacl"]),
        ("pg_attribute", vec![
            "attrelid", "attname", "atttypid", "attstattarget", "attlen", "attnum", "attndims",
            "attcacheoff", "atttypmod", "attbyval", "attstorage", "attalign", "attnotnull",
            "atthasdef", "attidentity", "attgenerated", "attisdropped", "attislocal",
            "attinhcount", "attcollation", "attacl", "attoptions", "attfdwoptions",
            "attmissingval",
        ]),
        ("information_schema.tables", vec![
            "table_catalog", "table_schema", "table_name", "table_type",
            "self_referencing_column_name", "reference_generation", "user_defined_type_catalog",
            "user_defined_type_schema", "user_defined_type_name", "is_insertable_into",
            "is_typed", "commit_action",
        ]),
        ("information_schema.columns", vec![
            "table_catalog", "table_schema", "table_name", "column_name", "ordinal_position",
            "column_default", "is_nullable", "data_type", "character_maximum_length",
            "character_octet_length", "numeric_precision", "numeric_precision_radix",
            "numeric_scale", "datetime_precision", "interval_type", "interval_precision",
            "character_set_catalog", "character_set_schema", "character_set_name",
            "collation_catalog", "collation_schema", "collation_name", "domain_catalog",
            "domain_schema", "domain_name", "udt_catalog", "udt_schema", "udt_name",
            "scope_catalog", "scope_schema", "scope_name", "maximum_cardinality",
            "dtd_identifier", "is_self_referencing", "is_identity", "identity_generation",
            "identity_start", "identity_increment", "identity_maximum", "identity_minimum",
            "identity_cycle", "is_generated", "generation_expression", "is_updatable",
        ]),
    ];

    /// Catalog table and column names the answer verifier accepts without context support
    pub static ref CATALOG_ELEMENTS: HashSet<&'static str> = [
        "pg_catalog", "pg_tables", "pg_class", "pg_namespace", "pg_attribute", "pg_index",
        "pg_proc", "pg_type", "information_schema", "columns", "tables", "schemata",
        "tablename", "schemaname", "tableowner", "tablespace", "hasindexes", "hasrules",
        "hastriggers", "rowsecurity", "table_name", "column_name", "data_type", "is_nullable",
    ]
    .into_iter()
    .collect();
}

/// Lower-cased schema merged with the system catalog
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: HashMap<String, Vec<String>>,
    business_tables: Vec<String>,
}

impl Schema {
    pub fn new<I, T, C, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut merged: HashMap<String, Vec<String>> = HashMap::new();
        let mut business_tables = Vec::new();

        for (table, columns) in tables {
            let name = table.as_ref().to_lowercase();
            let columns = columns
                .into_iter()
                .map(|c| c.as_ref().to_lowercase())
                .collect();
            if !business_tables.contains(&name) {
                business_tables.push(name.clone());
            }
            merged.insert(name, columns);
        }

        for (table, columns) in SYSTEM_CATALOG.iter() {
            merged.insert(
                table.to_string(),
                columns.iter().map(|c| c.to_string()).collect(),
            );
        }

        Self {
            tables: merged,
            business_tables,
        }
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_lowercase())
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(&table.to_lowercase()).map(|c| c.as_slice())
    }

    /// Tables supplied by the caller, in the order they were given
    pub fn business_tables(&self) -> &[String] {
        &self.business_tables
    }

    /// Columns of the caller-supplied tables, first occurrence order
    pub fn business_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.business_tables
            .iter()
            .filter_map(|t| self.tables.get(t))
            .flatten()
            .filter(|c| seen.insert(c.as_str()))
            .map(|c| c.as_str())
            .collect()
    }
}

/// True if a table or column name belongs to the catalog whitelist
pub fn is_catalog_element(element: &str) -> bool {
    CATALOG_ELEMENTS.contains(element.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_lowercased() {
        let schema = Schema::new(vec![("Sales", vec!["Region", "NET_REVENUE"])]);
        assert!(schema.contains_table("sales"));
        assert!(schema.contains_table("SALES"));
        assert_eq!(
            schema.columns("sales").unwrap(),
            &["region".to_string(), "net_revenue".to_string()]
        );
    }

    #[test]
    fn test_system_catalog_is_merged() {
        let schema = Schema::new(Vec::<(&str, Vec<&str>)>::new());
        assert!(schema.contains_table("pg_tables"));
        assert!(schema.contains_table("information_schema.columns"));
        assert!(schema.business_tables().is_empty());
        assert!(SYSTEM_CATALOG.iter().all(|(table, _)| schema.contains_table(table)));
    }

    #[test]
    fn test_catalog_elements() {
        assert!(is_catalog_element("TABLENAME"));
        assert!(is_catalog_element("pg_class"));
        assert!(!is_catalog_element("net_revenue"));
    }
}
