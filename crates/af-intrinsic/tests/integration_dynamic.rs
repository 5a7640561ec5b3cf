//! Free and gust-excited response of a clamped beam.

use af_aero::{GustProfile, GustSettings, PanelGeometry, RawAero, SpanShape};
use af_core::ArrayData;
use af_fem::testing::reference_cantilever;
use af_fem::{EigenMethod, EigenSource, build_couplings, compute_modes};
use af_intrinsic::{
    AdMode, AeroCase, CaseData, EquationKind, GustCase, Objective, ObjectiveFun, ObjectiveVar,
    ParamKind, Parameters, Structure, differentiate, evaluate,
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

fn case(with_aero: bool) -> CaseData {
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
        aero: with_aero.then(|| AeroCase {
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

#[test]
fn zero_forcing_and_zero_state_stay_at_rest() {
    let c = case(true);
    let mut p = nominal();
    p.gust_intensity = 0.0;
    let ev = evaluate(&p, &c.zero_state(), &c, Some(&root_loads())).unwrap();
    assert_eq!(ev.states.state_size(), NM * 3);
    for row in &ev.states.rows {
        assert!(row.iter().all(|v| *v == 0.0));
    }
    assert!(ev.objective.iter().all(|v| *v == 0.0));
}

#[test]
fn free_response_conserves_modal_energy() {
    let mut c = case(false);
    c.grid = (0..=100).map(|i| 0.01 * i as f64).collect();
    c.settings.substeps = Some(10);
    let q0: Vec<f64> = (0..2 * NM).map(|i| 0.05 * (i as f64 + 1.0).cos()).collect();
    let ev = evaluate(&nominal(), &q0, &c, None).unwrap();
    let energy = |q: &[f64]| 0.5 * q.iter().map(|v| v * v).sum::<f64>();
    let e0 = energy(&q0);
    for row in &ev.states.rows {
        assert!((energy(row) - e0).abs() < 1e-6 * e0);
    }
}

#[test]
fn gust_excites_the_structure() {
    let c = case(true);
    let ev = evaluate(&nominal(), &c.zero_state(), &c, Some(&root_loads())).unwrap();
    assert!(ev.objective.iter().any(|v| v.abs() > 1e-8));
    let peak = ev
        .fields
        .x2
        .iter()
        .map(|step| step[1][4].abs())
        .fold(0.0, f64::max);
    assert!(peak > 0.0);
}

#[test]
fn forward_reverse_and_finite_differences_agree() {
    let c = case(true);
    let p = nominal();
    let q0 = c.zero_state();
    let obj = root_loads();
    let inputs = [
        ParamKind::GustIntensity,
        ParamKind::GustLength,
        ParamKind::UInf,
        ParamKind::RhoInf,
    ];
    let fwd = differentiate(AdMode::Jacfwd, &p, &inputs, &q0, &c, &obj).unwrap();
    let rev = differentiate(AdMode::Jacrev, &p, &inputs, &q0, &c, &obj).unwrap();
    let (jf, jr) = (fwd.jacobian.unwrap(), rev.jacobian.unwrap());
    assert_eq!(jf.shape(), (2, 4));

    for (j, kind) in inputs.iter().enumerate() {
        let col_max = (0..2).fold(0.0_f64, |m, i| m.max(jf.get(i, j).abs()));
        assert!(col_max > 0.0, "{kind:?} has no effect");

        let h = 1e-6 * p.get(*kind).abs().max(1.0);
        let at = |v: f64| {
            let mut pp = p;
            pp.set(*kind, v);
            evaluate(&pp, &q0, &c, Some(&obj)).unwrap().objective
        };
        let plus = at(p.get(*kind) + h);
        let minus = at(p.get(*kind) - h);
        for i in 0..2 {
            let fd = (plus[i] - minus[i]) / (2.0 * h);
            assert!(
                (jf.get(i, j) - jr.get(i, j)).abs() <= 1e-9 * col_max,
                "{kind:?}: fwd {} rev {}",
                jf.get(i, j),
                jr.get(i, j)
            );
            assert!(
                (jf.get(i, j) - fd).abs() <= 1e-2 * col_max,
                "{kind:?}: fwd {} fd {fd}",
                jf.get(i, j)
            );
        }
    }
}

#[test]
fn adaptive_backend_follows_fixed_step_solution() {
    let mut fixed = case(true);
    fixed.settings.substeps = Some(10);
    let mut adaptive = case(true);
    adaptive.backend = Backend::Dopri5;
    adaptive.settings = SolverSettings {
        rtol: Some(1e-9),
        atol: Some(1e-12),
        ..Default::default()
    };
    let p = nominal();
    let a = evaluate(&p, &fixed.zero_state(), &fixed, None).unwrap();
    let b = evaluate(&p, &adaptive.zero_state(), &adaptive, None).unwrap();
    let peak = a
        .states
        .rows
        .iter()
        .flatten()
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    assert!(peak > 0.0);
    for (x, y) in a.states.rows.iter().zip(&b.states.rows) {
        for (u, v) in x.iter().zip(y) {
            assert!((u - v).abs() < 1e-3 * peak, "{u} vs {v}");
        }
    }
}
