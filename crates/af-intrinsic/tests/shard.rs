//! Sharded evaluation over a parameter table.

use af_fem::testing::reference_cantilever;
use af_fem::{EigenMethod, EigenSource, build_couplings, compute_modes};
use af_intrinsic::{
    AdMode, CaseData, EquationKind, ExternalLoads, Objective, ObjectiveFun, ObjectiveVar,
    ParamKind, ParameterTable, Parameters, PointLoad, Structure, differentiate, evaluate_shard,
};
use af_solver::{Backend, SolverSettings};
use std::sync::Arc;

fn case() -> CaseData {
    let input = reference_cantilever(6, 3.0).unwrap();
    let basis = compute_modes(&input, &EigenSource::Solve(EigenMethod::Jacobi), 4).unwrap();
    let couplings = build_couplings(&basis);
    CaseData {
        structure: Arc::new(Structure {
            tree: input.tree,
            basis,
            couplings,
        }),
        equation: EquationKind::Static,
        backend: Backend::Newton,
        settings: SolverSettings::default(),
        grid: vec![0.5, 1.0],
        aero: None,
        loads: Some(ExternalLoads {
            times: vec![0.0, 1.0],
            follower: vec![PointLoad {
                node: 5,
                component: 1,
                values: vec![0.0, 200.0],
            }],
            dead: Vec::new(),
        }),
        nominal: Parameters::default(),
        rotation_threshold: 1e-3,
    }
}

fn objective() -> Objective {
    Objective {
        var: ObjectiveVar::X2,
        fun: ObjectiveFun::Max,
        nodes: vec![1, 3],
        components: vec![5],
    }
}

fn table() -> ParameterTable {
    ParameterTable {
        kinds: vec![ParamKind::LoadFactor],
        rows: vec![vec![0.5], vec![1.0], vec![1.5], vec![2.0]],
    }
}

#[test]
fn shard_matches_individual_evaluations() {
    let c = case();
    let base = Parameters::default();
    let q0 = c.zero_state();
    let inputs = [ParamKind::LoadFactor];
    for mode in [AdMode::Value, AdMode::Jacfwd, AdMode::Jacrev] {
        let shard =
            evaluate_shard(&table(), &base, mode, &inputs, &q0, &c, &objective()).unwrap();
        assert_eq!(shard.len(), 4);
        for (row, got) in table().rows.iter().zip(&shard) {
            let p = base.with_row(&[ParamKind::LoadFactor], row);
            let want = differentiate(mode, &p, &inputs, &q0, &c, &objective()).unwrap();
            assert_eq!(*got, want);
        }
    }
}

#[test]
fn malformed_table_is_rejected() {
    let c = case();
    let bad = ParameterTable {
        kinds: vec![ParamKind::LoadFactor],
        rows: vec![vec![1.0, 2.0]],
    };
    let err = evaluate_shard(
        &bad,
        &Parameters::default(),
        AdMode::Value,
        &[],
        &c.zero_state(),
        &c,
        &objective(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), af_core::ErrorKind::Configuration);
}
