use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::document::{ContentKind, TmlDocument};
use crate::error::ReleaseError;
use crate::workspace::is_tml_file_name;

/// Side table from `(kind, object name)` to parent identifier, used to resolve by-name
/// references. Names are only unique within one object type.
#[derive(Clone, Debug, Default)]
pub struct NameIndex {
    names: BTreeMap<(ContentKind, String), NameSlot>,
}

#[derive(Clone, Debug)]
enum NameSlot {
    Unique(String),
    Ambiguous(Vec<String>),
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, N, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ContentKind, N, P)>,
        N: Into<String>,
        P: Into<String>,
    {
        let mut index = Self::new();
        for (kind, name, parent) in entries {
            index.insert(kind, name, parent);
        }
        index
    }

    /// Indexes the kind directories that documents of `target` may reference.
    ///
    /// Kind directories that do not exist are skipped. A file that does not parse is
    /// logged and left out; it belongs to another batch.
    pub fn from_source_tree(root: &Path, target: ContentKind) -> Result<Self, ReleaseError> {
        let mut index = Self::new();
        for &kind in target.referenced_kinds() {
            let dir = root.join(kind.as_str());
            if !dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&dir).sort_by_file_name() {
                let entry = entry.map_err(|err| {
                    ReleaseError::Io(std::io::Error::other(err.to_string()))
                        .context(format!("indexing {}", dir.display()))
                })?;
                if !entry.file_type().is_file()
                    || !entry.file_name().to_str().is_some_and(is_tml_file_name)
                {
                    continue;
                }
                let raw = fs::read_to_string(entry.path())?;
                let document = match TmlDocument::parse(&raw) {
                    Ok(document) if document.kind() == kind => document,
                    Ok(document) => {
                        tracing::warn!(
                            file = %entry.path().display(),
                            found = %document.kind(),
                            "document does not match its directory; not indexed"
                        );
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(
                            file = %entry.path().display(),
                            error = %err,
                            "could not parse document; not indexed"
                        );
                        continue;
                    }
                };
                if let (Some(name), Some(identifier)) =
                    (document.content_name(), document.identifier())
                {
                    index.insert(kind, name, identifier);
                }
            }
        }
        for (kind, name, candidates) in index.ambiguous() {
            tracing::warn!(
                %kind,
                name,
                candidates = %candidates.join(", "),
                "object name maps to several identifiers; references by this name will not resolve"
            );
        }
        Ok(index)
    }

    /// Records `(kind, name) → parent`. A second, different identifier for the same
    /// kind and name marks it ambiguous.
    pub fn insert(
        &mut self,
        kind: ContentKind,
        name: impl Into<String>,
        parent: impl Into<String>,
    ) {
        let parent = parent.into();
        match self.names.entry((kind, name.into())) {
            Entry::Vacant(slot) => {
                slot.insert(NameSlot::Unique(parent));
            }
            Entry::Occupied(mut slot) => {
                let next = match slot.get() {
                    NameSlot::Unique(existing) if *existing == parent => return,
                    NameSlot::Unique(existing) => {
                        NameSlot::Ambiguous(vec![existing.clone(), parent])
                    }
                    NameSlot::Ambiguous(existing) => {
                        if existing.contains(&parent) {
                            return;
                        }
                        let mut all = existing.clone();
                        all.push(parent);
                        NameSlot::Ambiguous(all)
                    }
                };
                slot.insert(next);
            }
        }
    }

    /// Parent identifier for `name` among objects of `kind`, unless unknown or ambiguous.
    pub fn parent_of(&self, kind: ContentKind, name: &str) -> Option<&str> {
        match self.slot(kind, name)? {
            NameSlot::Unique(parent) => Some(parent),
            NameSlot::Ambiguous(_) => None,
        }
    }

    /// Resolves a by-name entry written inside a document of kind `referrer`.
    ///
    /// Kinds are tried in [`ContentKind::referenced_kinds`] order; the first kind that
    /// knows the name decides, so an ambiguous name never falls through to a later kind.
    pub fn resolve(&self, referrer: ContentKind, name: &str) -> Option<&str> {
        referrer
            .referenced_kinds()
            .iter()
            .find_map(|&kind| self.slot(kind, name))
            .and_then(|slot| match slot {
                NameSlot::Unique(parent) => Some(parent.as_str()),
                NameSlot::Ambiguous(_) => None,
            })
    }

    pub fn is_ambiguous(&self, kind: ContentKind, name: &str) -> bool {
        matches!(self.slot(kind, name), Some(NameSlot::Ambiguous(_)))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn slot(&self, kind: ContentKind, name: &str) -> Option<&NameSlot> {
        self.names.get(&(kind, name.to_string()))
    }

    fn ambiguous(&self) -> impl Iterator<Item = (ContentKind, &str, &[String])> {
        self.names.iter().filter_map(|((kind, name), slot)| match slot {
            NameSlot::Ambiguous(candidates) => {
                Some((*kind, name.as_str(), candidates.as_slice()))
            }
            NameSlot::Unique(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn duplicate_names_with_different_parents_do_not_resolve() {
        let mut index = NameIndex::from_entries([
            (ContentKind::Table, "Sales", "p1"),
            (ContentKind::Table, "Orders", "p2"),
        ]);
        index.insert(ContentKind::Table, "Sales", "p1");
        assert_eq!(index.parent_of(ContentKind::Table, "Sales"), Some("p1"));

        index.insert(ContentKind::Table, "Sales", "p3");
        assert_eq!(index.parent_of(ContentKind::Table, "Sales"), None);
        assert!(index.is_ambiguous(ContentKind::Table, "Sales"));
        assert_eq!(index.parent_of(ContentKind::Table, "Orders"), Some("p2"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn same_name_in_different_kinds_stays_distinct() {
        let index = NameIndex::from_entries([
            (ContentKind::Table, "Sales", "t1"),
            (ContentKind::Answer, "Sales", "a1"),
            (ContentKind::Worksheet, "Sales", "w1"),
        ]);

        assert!(!index.is_ambiguous(ContentKind::Table, "Sales"));
        assert_eq!(index.resolve(ContentKind::Worksheet, "Sales"), Some("t1"));
        assert_eq!(index.resolve(ContentKind::Answer, "Sales"), Some("w1"));
        assert_eq!(index.resolve(ContentKind::Table, "Sales"), None);
    }

    #[test]
    fn ambiguous_name_does_not_fall_through_to_later_kind() {
        let index = NameIndex::from_entries([
            (ContentKind::Worksheet, "Sales", "w1"),
            (ContentKind::Worksheet, "Sales", "w2"),
            (ContentKind::Table, "Sales", "t1"),
        ]);
        assert_eq!(index.resolve(ContentKind::Answer, "Sales"), None);
    }

    #[test]
    fn source_tree_indexes_referenced_kind_directories() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("table")).unwrap();
        fs::create_dir_all(root.join("worksheet")).unwrap();
        fs::write(
            root.join("table/t1.table.tml"),
            "guid: t1\ntable:\n  name: Sales Fact\n",
        )
        .unwrap();
        fs::write(
            root.join("worksheet/w1.worksheet.tml"),
            "guid: w1\nworksheet:\n  name: Sales\n  tables:\n  - name: Sales Fact\n",
        )
        .unwrap();
        fs::write(root.join("worksheet/notes.md"), "ignored").unwrap();

        let for_answers = NameIndex::from_source_tree(root, ContentKind::Answer).unwrap();
        assert_eq!(for_answers.parent_of(ContentKind::Table, "Sales Fact"), Some("t1"));
        assert_eq!(for_answers.parent_of(ContentKind::Worksheet, "Sales"), Some("w1"));
        assert_eq!(for_answers.len(), 2);

        let for_worksheets = NameIndex::from_source_tree(root, ContentKind::Worksheet).unwrap();
        assert_eq!(for_worksheets.len(), 1);

        let for_tables = NameIndex::from_source_tree(root, ContentKind::Table).unwrap();
        assert!(for_tables.is_empty());
    }

    #[test]
    fn source_tree_skips_unparseable_file() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("view")).unwrap();
        fs::write(temp.path().join("view/bad.view.tml"), "guid: v\n").unwrap();
        fs::write(
            temp.path().join("view/v1.view.tml"),
            "guid: v1\nview:\n  name: Regions\n",
        )
        .unwrap();

        let index = NameIndex::from_source_tree(temp.path(), ContentKind::Answer).unwrap();
        assert_eq!(index.parent_of(ContentKind::View, "Regions"), Some("v1"));
        assert_eq!(index.len(), 1);
    }
}
