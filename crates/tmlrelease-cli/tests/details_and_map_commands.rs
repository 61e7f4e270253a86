use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tmlrelease"))
}

fn write_config(root: &std::path::Path) {
    fs::write(
        root.join("thoughtspot_release_config.toml"),
        "git_directory = \"tml\"\nreleases_directory = \"releases\"\nparent_child_guid_map_file = \"maps/guid_map.json\"\n",
    )
    .unwrap();
}

#[test]
fn details_lists_every_tml_file_without_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let dir = temp.path().join("export");
    fs::create_dir_all(dir.join("Prod_DB"))?;
    fs::write(
        dir.join("a1.answer.tml"),
        "guid: a1\nanswer:\n  name: Revenue\n",
    )?;
    fs::write(
        dir.join("Prod_DB/t1.table.tml"),
        "table:\n  name: Orders\n",
    )?;
    fs::write(dir.join("notes.txt"), "ignored")?;

    cli()
        .current_dir(temp.path())
        .args(["details", "export"])
        .assert()
        .success()
        .stdout(contains("a1.answer.tml | answer | Revenue | a1"))
        .stdout(contains("t1.table.tml | table | Orders | -"))
        .stdout(contains("notes.txt").not());
    Ok(())
}

#[test]
fn details_flags_unreadable_documents() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    fs::write(temp.path().join("x.view.tml"), "guid: x\nid: y\nview:\n  name: V\n")?;

    cli()
        .current_dir(temp.path())
        .args(["details", "x.view.tml"])
        .assert()
        .failure()
        .code(65)
        .stdout(contains("x.view.tml | error:"));
    Ok(())
}

#[test]
fn map_set_then_get_round_trips_through_the_file() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write_config(temp.path());

    cli()
        .current_dir(temp.path())
        .args(["map", "set", "-e", "prod", "w1", "w1-prod"])
        .assert()
        .success()
        .stdout(contains("Recorded 'w1' -> w1-prod in 'prod'"));

    cli()
        .current_dir(temp.path())
        .args(["map", "get", "-e", "prod", "w1"])
        .assert()
        .success()
        .stdout("w1-prod\n");

    let raw = fs::read_to_string(temp.path().join("maps/guid_map.json"))?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    assert_eq!(parsed["prod"]["w1"], "w1-prod");
    Ok(())
}

#[test]
fn map_get_for_unknown_parent_is_data_error() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write_config(temp.path());

    cli()
        .current_dir(temp.path())
        .args(["map", "get", "-e", "prod", "missing"])
        .assert()
        .failure()
        .code(65)
        .stdout(contains("No child identifier for 'missing'"));
    Ok(())
}

#[test]
fn map_show_emits_json_entries() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write_config(temp.path());
    fs::create_dir_all(temp.path().join("maps"))?;
    fs::write(
        temp.path().join("maps/guid_map.json"),
        r#"{"prod": {"t1": "t1-prod"}, "test": {"t1": "t1-test"}}"#,
    )?;

    cli()
        .current_dir(temp.path())
        .args(["--json", "map", "show", "-e", "test"])
        .assert()
        .success()
        .stdout(contains("\"type\":\"map_listing\""))
        .stdout(contains("\"t1\":\"t1-test\""))
        .stdout(contains("t1-prod").not());
    Ok(())
}
