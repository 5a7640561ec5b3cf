use af_config::*;
use af_core::ArrayData;
use af_fem::EigenMethod;
use af_intrinsic::{AdMode, EquationKind, Objective, ObjectiveFun, ObjectiveVar, ParamKind};
use af_solver::{SolverFunction, SolverLibrary, SolverSettings};
use std::collections::BTreeMap;

fn identity(n: usize) -> ArrayData {
    let mut data = vec![0.0; n * n];
    for i in 0..n {
        data[i * n + i] = 1.0;
    }
    ArrayData::new(vec![n, n], data).unwrap()
}

fn dynamic_config() -> Config {
    Config {
        fem: FemConfig {
            folder: Some("FEM".into()),
            num_modes: 3,
            eig_type: EigenMethod::Nalgebra,
            eig_names: None,
            connectivity: BTreeMap::from([("wing".to_string(), Vec::new())]),
            grid: vec![
                GridPointDef {
                    component: "wing".to_string(),
                    x: [0.0, 0.0, 0.0],
                },
                GridPointDef {
                    component: "wing".to_string(),
                    x: [0.0, 1.5, 0.0],
                },
            ],
            stiffness: MatrixSource::Inline(identity(6)),
            mass: MatrixSource::File("Ma.json".into()),
            cab_xtol: 1e-4,
            alpha_tolerance: 1e-6,
            tolerate_inconsistency: false,
        },
        driver: DriverConfig {
            sol_path: Some("results".into()),
            save_fem: true,
            ..Default::default()
        },
        simulation: SimulationConfig::default(),
        systems: BTreeMap::from([(
            "gust".to_string(),
            SystemConfig {
                solution: EquationKind::Dynamic,
                solver_library: SolverLibrary::Adaptive,
                solver_function: SolverFunction::Ode,
                solver_settings: SolverSettings {
                    rtol: Some(1e-8),
                    ..Default::default()
                },
                t0: 0.0,
                t1: Some(2.0),
                tn: Some(201),
                dt: None,
                t: None,
                xloads: None,
                aero: Some(AeroConfig {
                    folder: None,
                    c_ref: 0.5,
                    u_inf: 20.0,
                    rho_inf: 1.225,
                    poles: vec![0.1, 0.3],
                    a: MatrixSource::File("A.json".into()),
                    d: Some(MatrixSource::File("D.json".into())),
                    singular_tol: 1e-10,
                    gust: Some(GustConfig {
                        profile: af_aero::GustProfile::Mc,
                        span_shape: af_aero::SpanShape::Const,
                        intensity: 1.5,
                        length: 10.0,
                        shift: 0.0,
                        step: 0.01,
                        collocation: vec![[0.1, 0.5, 0.0], [0.1, 1.2, 0.0]],
                        dihedral: None,
                    }),
                }),
                q0: None,
                ad: Some(AdConfig {
                    mode: AdMode::Jacrev,
                    inputs: vec![ParamKind::GustIntensity, ParamKind::UInf],
                    objective: Objective {
                        var: ObjectiveVar::X2,
                        fun: ObjectiveFun::Max,
                        nodes: vec![1],
                        components: vec![4, 5],
                    },
                }),
                shard: None,
                save: true,
                rotation_threshold: 1e-3,
            },
        )]),
    }
}

#[test]
fn roundtrip_yaml_dynamic_system() {
    let config = dynamic_config();
    config.validate().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("case.yaml");
    save_yaml(&path, &config).unwrap();
    let loaded = load_yaml(&path).unwrap();
    assert_eq!(config, loaded);
}

#[test]
fn driver_keys_use_typeof() {
    let yaml = dynamic_config().to_yaml_string().unwrap();
    assert!(yaml.contains("typeof: intrinsic"));
    assert!(yaml.contains("typeof: single"));
}

#[test]
fn invalid_config_is_not_saved() {
    let mut config = dynamic_config();
    config.fem.num_modes = 0;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("case.yaml");
    assert!(matches!(
        save_yaml(&path, &config).unwrap_err(),
        ConfigError::Validation(_)
    ));
    assert!(!path.exists());
}

#[test]
fn file_matrices_resolve_against_their_folder() {
    let config = dynamic_config();
    let folder = config.fem.folder.as_deref();
    assert_eq!(
        config.fem.mass.path_in(folder).unwrap(),
        std::path::Path::new("FEM").join("Ma.json")
    );
    assert!(config.fem.stiffness.path_in(folder).is_none());
}
