//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the participant runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use r_ven_common::config::VenConfig;
use tempfile::tempdir;

#[test]
fn first_existing_candidate_wins() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("ven.toml");
    fs::write(
        &present,
        "[ven]\nven_name = \"ven-from-file\"\n\n[lifecycle]\nidle_delay = 0\n",
    )
    .unwrap();

    let loaded = VenConfig::load_with_source(&[missing, present.clone()]).expect("config loads");
    assert_eq!(loaded.source, present);
    assert_eq!(loaded.config.ven.ven_name, "ven-from-file");
    assert_eq!(loaded.config.lifecycle.idle_delay, Duration::ZERO);
}

#[test]
fn missing_candidates_are_listed_in_error() {
    let dir = tempdir().expect("tempdir");
    let a = dir.path().join("a.toml");
    let b = dir.path().join("b.toml");
    let err = VenConfig::load_with_source(&[a, b]).expect_err("nothing to load");
    let message = err.to_string();
    assert!(message.contains("a.toml"));
    assert!(message.contains("b.toml"));
}

#[test]
fn invalid_file_reports_its_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[vtn]\nurl = \"::nope::\"\n").unwrap();
    let err = VenConfig::load(&[path]).expect_err("invalid url");
    assert!(format!("{err:#}").contains("broken.toml"));
}
