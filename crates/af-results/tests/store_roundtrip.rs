use af_core::ArrayData;
use af_results::{ContainerKind, ResultsError, SolutionStore};
use std::fs;

fn modes_arrays() -> Vec<(&'static str, ArrayData)> {
    vec![
        ("omega", ArrayData::vector(vec![1.25, 7.8, 21.9])),
        (
            "phi1",
            ArrayData::new(vec![3, 2, 6], (0..36).map(|i| f64::from(i).sin()).collect()).unwrap(),
        ),
        ("x_delta", ArrayData::vector(vec![0.0, 0.5])),
    ]
}

#[test]
fn save_then_load_reproduces_container() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SolutionStore::open(dir.path().join("sol")).unwrap();

    let mut slot = store.claim(ContainerKind::Modes, "").unwrap();
    slot.extend(modes_arrays());
    slot.set_fingerprint("abc123");
    store.commit(slot).unwrap();
    let saved = store.save(ContainerKind::Modes, "").unwrap();
    assert!(saved.ends_with("Modes"));
    assert!(saved.join("manifest.json").exists());
    assert!(saved.join("omega.json").exists());

    let mut reopened = SolutionStore::open(dir.path().join("sol")).unwrap();
    assert!(reopened.has_saved(ContainerKind::Modes, ""));
    let loaded = reopened.load(ContainerKind::Modes, "").unwrap().clone();
    assert_eq!(&loaded, store.get(ContainerKind::Modes, "").unwrap());
    assert_eq!(loaded.fingerprint.as_deref(), Some("abc123"));

    let manifest = reopened.load_manifest(ContainerKind::Modes, "").unwrap();
    assert_eq!(manifest.arrays.len(), 3);
    assert_eq!(manifest.arrays["phi1"].shape, vec![3, 2, 6]);
}

#[test]
fn labelled_containers_use_their_own_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SolutionStore::open(dir.path().to_path_buf()).unwrap();
    for label in ["sys1", "sys2"] {
        let mut slot = store.claim(ContainerKind::DynamicSystem, label).unwrap();
        slot.insert("q", ArrayData::from_rows(&[vec![0.0, 1.0], vec![2.0, 3.0]]).unwrap());
        store.commit(slot).unwrap();
        store.save(ContainerKind::DynamicSystem, label).unwrap();
    }
    assert!(dir.path().join("DynamicSystemsys1").is_dir());
    assert!(dir.path().join("DynamicSystemsys2").is_dir());
}

#[test]
fn tampered_array_fails_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SolutionStore::open(dir.path().to_path_buf()).unwrap();
    let mut slot = store.claim(ContainerKind::Couplings, "").unwrap();
    slot.insert("gamma1", ArrayData::vector(vec![0.5; 8]));
    store.commit(slot).unwrap();
    let saved = store.save(ContainerKind::Couplings, "").unwrap();

    fs::write(
        saved.join("gamma1.json"),
        r#"{"shape":[8],"data":[0.5,0.5,0.5,0.5,0.5,0.5,0.5,0.25]}"#,
    )
    .unwrap();

    let mut reopened = SolutionStore::open(dir.path().to_path_buf()).unwrap();
    let err = reopened.load(ContainerKind::Couplings, "").unwrap_err();
    assert!(matches!(err, ResultsError::Checksum { .. }));
    // a failed load leaves the key free
    assert!(!reopened.contains(ContainerKind::Couplings, ""));
    assert!(reopened.claim(ContainerKind::Couplings, "").is_ok());
}

#[test]
fn loading_over_a_committed_container_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SolutionStore::open(dir.path().to_path_buf()).unwrap();
    let mut slot = store.claim(ContainerKind::ModalAero, "").unwrap();
    slot.insert("poles", ArrayData::vector(vec![0.1, 0.4]));
    store.commit(slot).unwrap();
    store.save(ContainerKind::ModalAero, "").unwrap();

    let err = store.load(ContainerKind::ModalAero, "").unwrap_err();
    assert!(matches!(err, ResultsError::AlreadyWritten { .. }));
}

#[test]
fn unsaved_container_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SolutionStore::open(dir.path().to_path_buf()).unwrap();
    assert!(!store.has_saved(ContainerKind::StaticSystem, "s"));
    assert!(matches!(
        store.load(ContainerKind::StaticSystem, "s").unwrap_err(),
        ResultsError::ContainerNotFound { .. }
    ));
}

#[test]
fn config_snapshot_lands_in_the_solution_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = SolutionStore::open(dir.path().to_path_buf()).unwrap();
    let path = store.write_config_snapshot("fem:\n  num_modes: 4\n").unwrap().unwrap();
    assert_eq!(path, dir.path().join("config.yaml"));
    assert!(SolutionStore::in_memory().write_config_snapshot("x: 1").unwrap().is_none());
}
