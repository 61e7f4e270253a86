use std::collections::BTreeMap;

use serde::Serialize;

use crate::document::TableContent;
use crate::error::ReleaseError;

/// Deepest supported key: `{connection}.{database}.{schema}.{db_table}`.
pub const MAX_DEPTH: usize = 4;

/// Table attributes addressable by a property map key, outermost first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableAttribute {
    ConnectionName,
    DbName,
    Schema,
    DbTable,
}

impl TableAttribute {
    pub const ORDER: [TableAttribute; MAX_DEPTH] = [
        TableAttribute::ConnectionName,
        TableAttribute::DbName,
        TableAttribute::Schema,
        TableAttribute::DbTable,
    ];

    fn read(self, table: &TableContent) -> Option<&str> {
        match self {
            TableAttribute::ConnectionName => table.connection_name(),
            TableAttribute::DbName => table.db_name(),
            TableAttribute::Schema => table.schema(),
            TableAttribute::DbTable => table.db_table(),
        }
    }

    fn write(self, table: &mut TableContent, value: &str) {
        match self {
            TableAttribute::ConnectionName => table.set_connection_name(value),
            TableAttribute::DbName => table.set_db_name(value),
            TableAttribute::Schema => table.set_schema(value),
            TableAttribute::DbTable => table.set_db_table(value),
        }
    }
}

/// Validated substitution rules for table connection details.
///
/// Keys and values are `.`-joined paths over [`TableAttribute::ORDER`]. Every key and
/// value share one depth, so a map is either all connection names, all
/// connection+database pairs, and so on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TablePropertyMap {
    depth: usize,
    entries: BTreeMap<String, String>,
}

impl TablePropertyMap {
    /// Validates depth consistency before any document is touched.
    pub fn new(entries: BTreeMap<String, String>) -> Result<Self, ReleaseError> {
        let mut depth: Option<usize> = None;
        for (key, value) in &entries {
            let key_depth = key.split('.').count();
            let value_depth = value.split('.').count();
            if key_depth != value_depth {
                return Err(ReleaseError::ConfigValidation(format!(
                    "table_properties_map key '{key}' and value '{value}' do not have the same depth of specification"
                )));
            }
            match depth {
                None if key_depth > MAX_DEPTH => {
                    return Err(ReleaseError::ConfigValidation(format!(
                        "table_properties_map entry '{key}' exceeds the maximum depth of {MAX_DEPTH} ({{connection}}.{{database}}.{{schema}}.{{db_table}})"
                    )));
                }
                None => depth = Some(key_depth),
                Some(expected) if expected != key_depth => {
                    return Err(ReleaseError::ConfigValidation(format!(
                        "all table_properties_map entries must share one depth of specification: '{key}' has depth {key_depth}, expected {expected}"
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            depth: depth.unwrap_or(0),
            entries,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites the table's connection details when its key matches; returns whether it did.
    pub fn apply(&self, table: &mut TableContent) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let attributes = &TableAttribute::ORDER[..self.depth];

        let mut segments = Vec::with_capacity(self.depth);
        for attribute in attributes {
            match attribute.read(table) {
                Some(value) => segments.push(value.to_string()),
                None => return false,
            }
        }
        let key = segments.join(".");
        let Some(replacement) = self.entries.get(&key) else {
            return false;
        };

        for (attribute, value) in attributes.iter().zip(replacement.split('.')) {
            attribute.write(table, value);
        }
        tracing::debug!(from = %key, to = %replacement, "applied table property mapping");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TmlDocument;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn table() -> TmlDocument {
        TmlDocument::parse(
            "guid: t1\ntable:\n  name: Sales\n  db: DB1\n  schema: S\n  db_table: T\n  connection:\n    name: DevConn\n",
        )
        .unwrap()
    }

    #[test]
    fn depth_two_mapping_rewrites_connection_and_database_only() {
        let props = TablePropertyMap::new(map(&[("DevConn.DB1", "ProdConn.DB2")])).unwrap();
        assert_eq!(props.depth(), 2);

        let mut doc = table();
        let table = doc.as_table_mut().unwrap();
        assert!(props.apply(table));
        assert_eq!(table.connection_name(), Some("ProdConn"));
        assert_eq!(table.db_name(), Some("DB2"));
        assert_eq!(table.schema(), Some("S"));
        assert_eq!(table.db_table(), Some("T"));
    }

    #[test]
    fn depth_one_and_four_mappings_apply() {
        let mut doc = table();
        let props = TablePropertyMap::new(map(&[("DevConn", "Prod DB")])).unwrap();
        assert!(props.apply(doc.as_table_mut().unwrap()));
        assert_eq!(doc.as_table().unwrap().connection_name(), Some("Prod DB"));

        let mut doc = table();
        let props =
            TablePropertyMap::new(map(&[("DevConn.DB1.S.T", "ProdConn.DB9.S2.T2")])).unwrap();
        assert!(props.apply(doc.as_table_mut().unwrap()));
        let table = doc.as_table().unwrap();
        assert_eq!(table.schema(), Some("S2"));
        assert_eq!(table.db_table(), Some("T2"));
    }

    #[test]
    fn unmatched_table_passes_through_unchanged() {
        let props = TablePropertyMap::new(map(&[("OtherConn.DB1", "ProdConn.DB2")])).unwrap();
        let mut doc = table();
        let before = doc.clone();
        assert!(!props.apply(doc.as_table_mut().unwrap()));
        assert_eq!(doc, before);
    }

    #[test]
    fn table_missing_key_attribute_never_matches() {
        let props = TablePropertyMap::new(map(&[("DevConn.DB1.S", "P.D.S")])).unwrap();
        let mut doc = TmlDocument::parse(
            "guid: t\ntable:\n  name: x\n  db: DB1\n  connection:\n    name: DevConn\n",
        )
        .unwrap();
        assert!(!props.apply(doc.as_table_mut().unwrap()));
    }

    #[test]
    fn mismatched_key_and_value_depth_is_rejected() {
        let err = TablePropertyMap::new(map(&[("DevConn.DB1", "ProdConn")])).unwrap_err();
        assert!(matches!(err, ReleaseError::ConfigValidation(_)));
    }

    #[test]
    fn mixed_entry_depths_are_rejected() {
        let err = TablePropertyMap::new(map(&[
            ("DevConn.DB1", "ProdConn.DB2"),
            ("DevConn.DB1.S", "ProdConn.DB2.S"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("share one depth"));
    }

    #[test]
    fn depth_beyond_four_is_rejected() {
        let err = TablePropertyMap::new(map(&[("a.b.c.d.e", "v.w.x.y.z")])).unwrap_err();
        assert!(err.to_string().contains("maximum depth"));
    }

    #[test]
    fn empty_map_is_a_no_op() {
        let props = TablePropertyMap::new(BTreeMap::new()).unwrap();
        assert!(props.is_empty());
        assert!(!props.apply(table().as_table_mut().unwrap()));
    }
}
