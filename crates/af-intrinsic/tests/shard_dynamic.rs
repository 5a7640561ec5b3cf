//! Sharded gust derivatives over flight-condition rows.

use af_aero::{GustProfile, GustSettings, PanelGeometry, RawAero, SpanShape};
use af_core::ArrayData;
use af_fem::testing::reference_cantilever;
use af_fem::{EigenMethod, EigenSource, build_couplings, compute_modes};
use af_intrinsic::{
    AdMode, AeroCase, CaseData, EquationKind, GustCase, Objective, ObjectiveFun, ObjectiveVar,
    ParamKind, ParameterTable, Parameters, Structure, differentiate, evaluate_shard,
};
use af_solver::{Backend, RkMethod, SolverSettings};
use std::sync::Arc;

const NM: usize = 4;

fn structure() -> Arc<Structure> {
    let input = reference_cantilever(6, 5.0).unwrap();
    let basis = compute_modes(&input, &EigenSource::Solve(EigenMethod::Jacobi), NM).unwrap();
    let couplings = build_couplings(&basis);
    Arc::new(Structure {
        tree: input.tree,
        basis,
        couplings,
    })
}

fn raw_aero(panels: usize) -> RawAero {
    let diag = |v: f64| -> Vec<f64> {
        (0..NM * NM)
            .map(|i| if i / NM == i % NM { v } else { 0.0 })
            .collect()
    };
    let mut a = Vec::new();
    a.extend(diag(-0.01));
    a.extend(diag(-0.5));
    a.extend(diag(-0.01));
    a.extend(diag(0.05));
    let a = ArrayData::new(vec![4, NM, NM], a).unwrap();

    let mut d = Vec::new();
    for block in 0..4 {
        for m in 0..NM {
            for p in 0..panels {
                // the acceleration block stays empty
                let v = if block == 2 {
                    0.0
                } else {
                    0.02 * ((m + 2 * p + block) % 5) as f64 - 0.03
                };
                d.push(v);
            }
        }
    }
    let d = ArrayData::new(vec![4, NM, panels], d).unwrap();
    RawAero::from_arrays(&a, Some(&d), &ArrayData::vector(vec![0.2])).unwrap()
}

fn gust_case() -> GustCase {
    let x = [0.37, 1.93, 3.41, 4.66];
    GustCase {
        settings: GustSettings {
            profile: GustProfile::Mc,
            span_shape: SpanShape::Const,
            shift: 0.0,
            step: 0.01,
        },
        geometry: PanelGeometry::new(
            x.iter().map(|&xi| [xi, 0.0, 0.0]).collect(),
            vec![0.0; 4],
        )
        .unwrap(),
    }
}

fn nominal() -> Parameters<f64> {
    Parameters {
        gust_intensity: 2.0,
        gust_length: 2.0,
        u_inf: 10.0,
        rho_inf: 1.2,
        load_factor: 1.0,
    }
}

fn case() -> CaseData {
    let grid: Vec<f64> = (0..=40).map(|i| 0.02 * i as f64).collect();
    CaseData {
        structure: structure(),
        equation: EquationKind::Dynamic,
        backend: Backend::Marching,
        settings: SolverSettings {
            solver_name: Some(RkMethod::Rk4),
            substeps: Some(2),
            ..Default::default()
        },
        grid,
        aero: Some(AeroCase {
            raw: raw_aero(4),
            c_ref: 1.0,
            singular_tol: 1e-10,
            gust: Some(gust_case()),
        }),
        loads: None,
        nominal: nominal(),
        rotation_threshold: 1e-3,
    }
}

fn root_loads() -> Objective {
    Objective {
        var: ObjectiveVar::X2,
        fun: ObjectiveFun::Sum,
        nodes: vec![1],
        components: vec![4, 5],
    }
}

const INPUTS: [ParamKind; 4] = [
    ParamKind::GustIntensity,
    ParamKind::GustLength,
    ParamKind::UInf,
    ParamKind::RhoInf,
];

fn table() -> ParameterTable {
    ParameterTable {
        kinds: INPUTS.to_vec(),
        rows: vec![
            vec![2.0, 2.0, 10.0, 1.2],
            vec![1.5, 2.5, 11.0, 1.1],
            vec![2.5, 1.8, 9.5, 1.3],
        ],
    }
}

#[test]
fn every_row_matches_its_own_derivative() {
    let c = case();
    let base = nominal();
    let q0 = c.zero_state();
    let obj = root_loads();
    let t = table();
    let mut jacobians = Vec::new();
    for mode in [AdMode::Jacfwd, AdMode::Jacrev] {
        let shard = evaluate_shard(&t, &base, mode, &INPUTS, &q0, &c, &obj).unwrap();
        assert_eq!(shard.len(), t.len());
        for (row, got) in t.rows.iter().zip(&shard) {
            let p = base.with_row(&t.kinds, row);
            let want = differentiate(mode, &p, &INPUTS, &q0, &c, &obj).unwrap();
            assert_eq!(got.value, want.value);
            assert_eq!(got.jacobian, want.jacobian);
        }
        jacobians.push(shard);
    }

    let (fwd, rev) = (&jacobians[0], &jacobians[1]);
    let mut distinct = false;
    for (k, (f, r)) in fwd.iter().zip(rev).enumerate() {
        if k > 0 && f.value != fwd[0].value {
            distinct = true;
        }
        let (jf, jr) = (f.jacobian.as_ref().unwrap(), r.jacobian.as_ref().unwrap());
        assert_eq!(jf.shape(), (2, 4));
        for j in 0..4 {
            let col_max = (0..2).fold(0.0_f64, |m, i| m.max(jf.get(i, j).abs()));
            assert!(col_max > 0.0, "row {k}: {:?} has no effect", INPUTS[j]);
            for i in 0..2 {
                assert!(
                    (jf.get(i, j) - jr.get(i, j)).abs() <= 1e-9 * col_max,
                    "row {k} {:?}: fwd {} rev {}",
                    INPUTS[j],
                    jf.get(i, j),
                    jr.get(i, j)
                );
            }
        }
    }
    assert!(distinct, "rows share one objective");
}
