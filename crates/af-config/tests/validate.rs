use af_config::*;
use af_intrinsic::{AdMode, EquationKind, ParamKind};

const BASE: &str = r#"
fem:
  num_modes: 4
  connectivity:
    wing: []
  grid:
    - {component: wing, x: [0.0, 0.0, 0.0]}
    - {component: wing, x: [0.0, 1.0, 0.0]}
    - {component: wing, x: [0.0, 2.0, 0.0]}
  stiffness: Ka.json
  mass: Ma.json
systems:
  s1:
    solution: static
    solver_library: newton
    solver_function: root
    t: [0.5, 1.0]
    xloads:
      times: [0.0, 1.0]
      follower:
        - {node: 2, component: 2, values: [0.0, 100.0]}
"#;

fn base() -> Config {
    Config::from_yaml_str(BASE).unwrap()
}

fn rejected(config: &Config) -> ValidationError {
    config.validate().unwrap_err()
}

#[test]
fn defaults_are_filled_in() {
    let c = base();
    assert_eq!(c.fem.eig_type, af_fem::EigenMethod::Jacobi);
    assert_eq!(c.fem.cab_xtol, 1e-4);
    assert_eq!(c.fem.alpha_tolerance, 1e-6);
    assert!(c.driver.compute_fem && c.driver.compute_modalaero);
    assert!(!c.driver.save_fem && !c.driver.save_modalaero);
    assert_eq!(c.simulation.kind, SimulationKind::Single);
    let s = &c.systems["s1"];
    assert_eq!(s.rotation_threshold, 1e-3);
    assert_eq!(s.t0, 0.0);
    assert_eq!(s.xloads.as_ref().unwrap().load_factor, 1.0);
    assert!(matches!(c.fem.stiffness, MatrixSource::File(_)));
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = BASE.replace("num_modes: 4", "num_modes: 4\n  num_mode: 3");
    assert!(matches!(
        Config::from_yaml_str(&yaml).unwrap_err(),
        ConfigError::Yaml(_)
    ));
}

#[test]
fn grid_component_must_exist() {
    let mut c = base();
    c.fem.grid[2].component = "tail".to_string();
    assert!(matches!(rejected(&c), ValidationError::MissingReference { .. }));
}

#[test]
fn unknown_child_component_is_reported() {
    let mut c = base();
    c.fem.connectivity.insert("wing".to_string(), vec!["fin".to_string()]);
    assert!(matches!(rejected(&c), ValidationError::MissingReference { .. }));
}

#[test]
fn too_many_modes_is_a_configuration_error() {
    let mut c = base();
    c.fem.num_modes = 13;
    let err = ConfigError::from(rejected(&c));
    assert_eq!(err.kind(), af_core::ErrorKind::Configuration);
}

#[test]
fn solver_must_match_the_equation() {
    let mut c = base();
    let s = c.systems.get_mut("s1").unwrap();
    s.solver_library = af_solver::SolverLibrary::RungeKutta;
    s.solver_function = af_solver::SolverFunction::Ode;
    assert!(matches!(rejected(&c), ValidationError::InvalidValue { .. }));
}

#[test]
fn settings_of_another_backend_are_rejected() {
    let yaml = BASE.replace(
        "solver_function: root\n",
        "solver_function: root\n    solver_settings: {substeps: 4}\n",
    );
    let c = Config::from_yaml_str(&yaml).unwrap_err();
    match c {
        ConfigError::Validation(ValidationError::InvalidValue { field, .. }) => {
            assert_eq!(field, "systems.s1.solver_settings");
        }
        other => panic!("unexpected {other}"),
    }

    let yaml = BASE.replace(
        "solver_function: root\n",
        "solver_function: root\n    solver_settings: {damping: 0.5, norm: linf}\n",
    );
    assert!(Config::from_yaml_str(&yaml).is_ok());
}

#[test]
fn dynamic_grid_from_dt() {
    let mut c = base();
    let s = c.systems.get_mut("s1").unwrap();
    s.solution = EquationKind::Dynamic;
    s.solver_library = af_solver::SolverLibrary::RungeKutta;
    s.solver_function = af_solver::SolverFunction::Ode;
    s.t = None;
    s.t1 = Some(1.0);
    s.dt = Some(0.25);
    assert_eq!(s.time_grid().unwrap(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    c.validate().unwrap();

    let s = c.systems.get_mut("s1").unwrap();
    s.dt = None;
    assert!(s.time_grid().is_err());
}

#[test]
fn static_default_grid_is_a_single_load_step() {
    let mut c = base();
    c.systems.get_mut("s1").unwrap().t = None;
    assert_eq!(c.systems["s1"].time_grid().unwrap(), vec![1.0]);
}

#[test]
fn dead_loads_are_static_only() {
    let mut c = base();
    let s = c.systems.get_mut("s1").unwrap();
    s.solution = EquationKind::Dynamic;
    s.solver_library = af_solver::SolverLibrary::RungeKutta;
    s.solver_function = af_solver::SolverFunction::Ode;
    let x = s.xloads.as_mut().unwrap();
    x.dead = x.follower.clone();
    assert!(matches!(rejected(&c), ValidationError::Unsupported { .. }));
}

#[test]
fn point_load_on_the_root_is_rejected() {
    let mut c = base();
    c.systems.get_mut("s1").unwrap().xloads.as_mut().unwrap().follower[0].node = 0;
    assert!(matches!(rejected(&c), ValidationError::InvalidValue { .. }));
}

#[test]
fn saving_needs_a_solution_path() {
    let mut c = base();
    c.driver.save_fem = true;
    assert!(rejected(&c).to_string().contains("sol_path"));
    c.driver.sol_path = Some("results".into());
    c.validate().unwrap();
}

#[test]
fn initial_state_length_is_checked() {
    let mut c = base();
    c.systems.get_mut("s1").unwrap().q0 = Some(vec![0.0; 3]);
    assert!(matches!(rejected(&c), ValidationError::InvalidValue { .. }));
    c.systems.get_mut("s1").unwrap().q0 = Some(vec![0.0; 4]);
    c.validate().unwrap();
}

#[test]
fn derivative_inputs_need_their_source() {
    let yaml = format!(
        "{BASE}    ad:\n      mode: jacfwd\n      inputs: [u_inf]\n      objective: {{var: ra, nodes: [2], components: [2]}}\n"
    );
    let c: Config = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(c.systems["s1"].ad.as_ref().unwrap().mode, AdMode::Jacfwd);
    assert!(matches!(rejected(&c), ValidationError::MissingReference { .. }));

    let mut ok = c.clone();
    ok.systems.get_mut("s1").unwrap().ad.as_mut().unwrap().inputs = vec![ParamKind::LoadFactor];
    ok.validate().unwrap();
}

#[test]
fn shard_tables_need_a_shard_simulation() {
    let yaml = format!(
        "{BASE}    ad:\n      objective: {{var: ra, fun: last, nodes: [2], components: [2]}}\n    shard:\n      kinds: [load_factor]\n      rows: [[0.5], [1.0]]\n"
    );
    let mut c: Config = serde_yaml::from_str(&yaml).unwrap();
    assert!(matches!(rejected(&c), ValidationError::Unsupported { .. }));
    c.simulation.kind = SimulationKind::Shard;
    c.validate().unwrap();

    c.systems.get_mut("s1").unwrap().shard.as_mut().unwrap().rows[1] = vec![1.0, 2.0];
    assert!(matches!(rejected(&c), ValidationError::InvalidValue { .. }));
}

#[test]
fn single_simulation_takes_one_system() {
    let mut c = base();
    let second = c.systems["s1"].clone();
    c.systems.insert("s2".to_string(), second);
    assert!(rejected(&c).to_string().contains("exactly one"));
    c.simulation.kind = SimulationKind::Serial;
    c.validate().unwrap();
}
