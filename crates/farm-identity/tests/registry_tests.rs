use farm_identity::{
    FlatFileStore, IdentityError, IdentityRegistry, IdentitySession, RegistryStore, SessionState, StaticDirectory,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const MAP: &str = "usr/map/user_map";

fn registry_on(mount: &Path) -> IdentityRegistry {
    let directory = StaticDirectory::new()
        .with_entry("120988", "Alice.Smith")
        .with_entry("120999", "Bob Jones")
        .with_entry("130001", "carol");
    IdentityRegistry::new(Arc::new(directory), Arc::new(FlatFileStore::new(mount, MAP)))
}

fn map_contents(mount: &Path) -> String {
    fs::read_to_string(mount.join(MAP)).unwrap()
}

#[test]
fn test_register_is_idempotent() {
    let mount = TempDir::new().unwrap();
    let registry = registry_on(mount.path());

    registry.register("120988", "alicesmith").unwrap();
    registry.register("120988", "alicesmith").unwrap();

    assert_eq!(map_contents(mount.path()), "120988_alicesmith\n");
}

#[test]
fn test_file_is_sorted_and_keeps_foreign_lines() {
    let mount = TempDir::new().unwrap();
    fs::create_dir_all(mount.path().join("usr/map")).unwrap();
    fs::write(mount.path().join(MAP), "999_zed\n100_amy\n100_amy\n").unwrap();

    let registry = registry_on(mount.path());
    registry.register("500", "Mid Name").unwrap();

    assert_eq!(map_contents(mount.path()), "100_amy\n500_midname\n999_zed\n");
}

#[test]
fn test_query_outcomes() {
    let mount = TempDir::new().unwrap();
    let registry = registry_on(mount.path());

    // absent file on a reachable mount reads as empty
    assert_eq!(registry.query("12").unwrap(), None);

    registry.register("120999", "bobjones").unwrap();
    registry.register("120988", "alicesmith").unwrap();
    registry.register("130001", "carol").unwrap();

    let one = registry.query("1300").unwrap().unwrap();
    assert_eq!((one.account_id.as_str(), one.display_name.as_str()), ("130001", "carol"));

    // several matches: first in sort order
    let first = registry.query("1209").unwrap().unwrap();
    assert_eq!(first.account_id, "120988");

    assert_eq!(registry.query("77").unwrap(), None);
}

#[test]
fn test_reregistering_an_account_replaces_its_name() {
    let mount = TempDir::new().unwrap();
    let registry = registry_on(mount.path());

    registry.register("120988", "alice").unwrap();
    registry.register("120999", "bobjones").unwrap();
    registry.register("120988", "Alice Smith").unwrap();

    assert_eq!(map_contents(mount.path()), "120988_alicesmith\n120999_bobjones\n");
    let records = registry.records().unwrap();
    assert_eq!(records.iter().filter(|r| r.account_id == "120988").count(), 1);
    assert_eq!(registry.query("120988").unwrap().unwrap().display_name, "alicesmith");
}

#[test]
fn test_query_matches_account_id_only() {
    let mount = TempDir::new().unwrap();
    fs::create_dir_all(mount.path().join("usr/map")).unwrap();
    fs::write(mount.path().join(MAP), "1_ann\n").unwrap();
    let registry = registry_on(mount.path());

    // a prefix reaching past the separator must not match into the name
    assert_eq!(registry.query("1_a").unwrap(), None);
    assert_eq!(registry.query("1").unwrap().unwrap().display_name, "ann");
}

#[test]
fn test_concurrent_writer_can_be_lost() {
    let mount = TempDir::new().unwrap();
    let store = FlatFileStore::new(mount.path(), MAP);
    let registry = registry_on(mount.path());

    // a second client reads its snapshot first
    let mut stale = store.load().unwrap();

    registry.register("120988", "alicesmith").unwrap();

    stale.insert("130001_carol".to_string());
    store.save(&stale).unwrap();

    // last writer wins: alice's registration is gone
    assert_eq!(map_contents(mount.path()), "130001_carol\n");
}

#[test]
fn test_session_register_creates_home_and_record() {
    let mount = TempDir::new().unwrap();
    let work = mount.path().join("work");
    let mut session = IdentitySession::new(registry_on(mount.path()), &work);

    let registration = session.register("120988").unwrap();
    assert!(registration.persisted);
    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(registration.environment.render_home, work.join("alicesmith"));
    assert!(work.join("alicesmith").is_dir());
    assert_eq!(map_contents(mount.path()), "120988_alicesmith\n");

    let mut query = IdentitySession::new(registry_on(mount.path()), &work);
    assert_eq!(query.query("120988").unwrap().map(|r| r.display_name), Some("alicesmith".into()));
}

#[test]
fn test_session_register_fails_on_unknown_account() {
    let mount = TempDir::new().unwrap();
    let mut session = IdentitySession::new(registry_on(mount.path()), mount.path().join("work"));
    let err = session.register("404").unwrap_err();
    assert!(matches!(err, IdentityError::IdentityNotResolved { .. }));
    assert!(!mount.path().join(MAP).exists());
}

#[test]
fn test_missing_mount_is_unavailable() {
    let mount = TempDir::new().unwrap();
    let gone = mount.path().join("dabrender");
    let mut session = IdentitySession::new(registry_on(&gone), gone.join("work"));
    let err = session.register("120988").unwrap_err();
    assert!(matches!(err, IdentityError::MountUnavailable { .. }));
}

#[cfg(unix)]
#[test]
fn test_plain_directory_is_not_a_mount_point() {
    let mount = TempDir::new().unwrap();
    let nested = mount.path().join("dabrender");
    fs::create_dir(&nested).unwrap();

    assert!(FlatFileStore::new(&nested, MAP).check_mount().is_ok());
    let strict = FlatFileStore::new(&nested, MAP).require_mount_point(true);
    assert!(matches!(strict.check_mount(), Err(IdentityError::MountUnavailable { .. })));
}
