use std::cell::RefCell;
use std::fs;
use std::path::Path;

use tmlrelease::{
    DUPLICATE_TABLE_ERROR, IdentityMap, ImportOutcome, ReleaseError, TmlPublisher,
    publish_release,
};

/// Answers each import with a scripted outcome per document, keyed on content.
struct ScriptedPublisher {
    packages: RefCell<Vec<usize>>,
    outcome: fn(&str) -> ImportOutcome,
}

impl ScriptedPublisher {
    fn new(outcome: fn(&str) -> ImportOutcome) -> Self {
        Self {
            packages: RefCell::new(Vec::new()),
            outcome,
        }
    }
}

impl TmlPublisher for ScriptedPublisher {
    fn import(&self, documents: &[String]) -> Result<Vec<ImportOutcome>, ReleaseError> {
        self.packages.borrow_mut().push(documents.len());
        Ok(documents.iter().map(|doc| (self.outcome)(doc)).collect())
    }
}

fn created_from_name(doc: &str) -> ImportOutcome {
    let name = doc
        .lines()
        .find_map(|line| line.trim().strip_prefix("name: "))
        .unwrap_or("unknown");
    ImportOutcome::Created {
        identifier: format!("child-{name}"),
    }
}

fn write(dir: &Path, file: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(file), body).unwrap();
}

#[test]
fn each_connection_directory_is_one_package_and_map_is_updated() {
    let temp = tempfile::tempdir().unwrap();
    let release = temp.path().join("r1/table");
    write(
        &release.join("Prod_DB"),
        "t1.table.tml",
        "table:\n  name: Orders\n",
    );
    write(
        &release.join("Prod_DB"),
        "t2.table.tml",
        "table:\n  name: Customers\n",
    );
    write(
        &release.join("Other_DB"),
        "t3.table.tml",
        "table:\n  name: Ledger\n",
    );

    let publisher = ScriptedPublisher::new(created_from_name);
    let mut map = IdentityMap::load(&temp.path().join("map.json"), "prod").unwrap();

    let report = publish_release(&release, None, &publisher, &mut map, "prod").unwrap();

    assert_eq!(*publisher.packages.borrow(), vec![1, 2]);
    assert_eq!(report.published.len(), 3);
    assert!(report.rejected.is_empty());
    assert_eq!(map.get("prod", "t1"), Some("child-Orders"));
    assert_eq!(map.get("prod", "t3"), Some("child-Ledger"));
}

#[test]
fn single_connection_publishes_only_that_directory() {
    let temp = tempfile::tempdir().unwrap();
    let release = temp.path().join("r1/table");
    write(&release.join("Prod_DB"), "t1.table.tml", "table:\n  name: A\n");
    write(&release.join("Other_DB"), "t2.table.tml", "table:\n  name: B\n");

    let publisher = ScriptedPublisher::new(created_from_name);
    let mut map = IdentityMap::new();
    publish_release(&release, Some("Prod DB"), &publisher, &mut map, "prod").unwrap();

    assert_eq!(map.get("prod", "t1"), Some("child-A"));
    assert_eq!(map.get("prod", "t2"), None);
}

#[test]
fn duplicate_table_error_is_reported_but_not_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let release = temp.path().join("r1/table/Prod_DB");
    write(&release, "t1.table.tml", "table:\n  name: Dup\n");
    write(&release, "t2.table.tml", "table:\n  name: Fresh\n");

    let publisher = ScriptedPublisher::new(|doc| {
        if doc.contains("Dup") {
            ImportOutcome::Failed {
                code: Some(DUPLICATE_TABLE_ERROR),
                message: "already exists".into(),
            }
        } else {
            created_from_name(doc)
        }
    });
    let mut map = IdentityMap::new();
    let report = publish_release(
        &temp.path().join("r1/table"),
        None,
        &publisher,
        &mut map,
        "prod",
    )
    .unwrap();

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].code, Some(DUPLICATE_TABLE_ERROR));
    assert_eq!(map.get("prod", "t1"), None);
    assert_eq!(map.get("prod", "t2"), Some("child-Fresh"));
}

#[test]
fn other_import_failures_abort_the_publish() {
    let temp = tempfile::tempdir().unwrap();
    let release = temp.path().join("r1/view");
    write(&release, "v1.view.tml", "view:\n  name: V\n");

    let publisher = ScriptedPublisher::new(|_| ImportOutcome::Failed {
        code: Some(10002),
        message: "bad tml".into(),
    });
    let mut map = IdentityMap::new();
    let err = publish_release(&release, None, &publisher, &mut map, "prod").unwrap_err();

    assert!(matches!(err, ReleaseError::Publish(_)));
    assert!(err.to_string().contains("10002"));
}

#[test]
fn published_pairs_survive_a_save_and_reload() {
    let temp = tempfile::tempdir().unwrap();
    let release = temp.path().join("r1/worksheet");
    write(&release, "w1.worksheet.tml", "worksheet:\n  name: Sales\n");
    let map_path = temp.path().join("maps/guid_map.json");

    let publisher = ScriptedPublisher::new(created_from_name);
    let mut map = IdentityMap::load(&map_path, "prod").unwrap();
    publish_release(&release, None, &publisher, &mut map, "prod").unwrap();
    map.save(&map_path).unwrap();

    let reloaded = IdentityMap::load(&map_path, "prod").unwrap();
    assert_eq!(reloaded.get("prod", "w1"), Some("child-Sales"));
}
