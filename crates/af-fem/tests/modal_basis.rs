//! Modal basis of the reference beams.

use af_fem::testing::{reference_cantilever, reference_tee};
use af_fem::{
    EigenMethod, EigenPairs, EigenSource, FemError, ModalBasis, check_alphas, compute_modes,
};
use std::collections::BTreeMap;

#[test]
fn cantilever_first_bending_frequency_matches_beam_theory() {
    let fem = reference_cantilever(21, 10.0).unwrap();
    let basis = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Jacobi), 4).unwrap();

    // weaker bending plane: EIy = 2e4, m = 10, L = 10
    let exact = 3.516 * (2e4_f64 / (10.0 * 10.0_f64.powi(4))).sqrt();
    let rel = (basis.omega[0] - exact).abs() / exact;
    assert!(rel < 0.03, "omega0 = {}, beam theory {exact}", basis.omega[0]);

    for w in basis.omega.windows(2) {
        assert!(w[0] <= w[1], "frequencies must be ascending: {:?}", basis.omega);
    }
}

#[test]
fn alphas_are_identity_for_the_tee() {
    let fem = reference_tee().unwrap();
    let basis = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Nalgebra), 8).unwrap();
    let report = check_alphas(&basis, 1e-6, false).unwrap();
    assert!(report.alpha1 < 1e-9, "alpha1 deviation {}", report.alpha1);
    assert!(report.alpha2 < 1e-6, "alpha2 deviation {}", report.alpha2);

    // clamped root carries nothing
    for m in 0..8 {
        assert_eq!(basis.phi1[m][0], [0.0; 6]);
        assert_eq!(basis.psi2l[m][0], [0.0; 6]);
    }
}

#[test]
fn jacobi_and_nalgebra_agree_including_signs() {
    let fem = reference_cantilever(11, 5.0).unwrap();
    let a = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Jacobi), 6).unwrap();
    let b = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Nalgebra), 6).unwrap();
    for (x, y) in a.omega.iter().zip(&b.omega) {
        assert!((x - y).abs() < 1e-8 * y, "{x} vs {y}");
    }
    let diff = (&a.eigenvectors - &b.eigenvectors).amax();
    assert!(diff < 1e-6, "eigenvector mismatch {diff}");
}

#[test]
fn largest_entry_of_every_mode_is_positive() {
    let fem = reference_cantilever(11, 5.0).unwrap();
    let basis = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Jacobi), 5).unwrap();
    for col in basis.eigenvectors.column_iter() {
        let lead = col.iter().fold(0.0_f64, |m, v| if v.abs() > m.abs() { *v } else { m });
        assert!(lead > 0.0);
    }
}

#[test]
fn modal_computation_is_deterministic() {
    let fem = reference_tee().unwrap();
    let src = EigenSource::Solve(EigenMethod::Jacobi);
    let a = compute_modes(&fem, &src, 5).unwrap();
    let b = compute_modes(&fem, &src, 5).unwrap();
    assert_eq!(a, b);
}

#[test]
fn precomputed_pairs_reproduce_the_solved_basis() {
    let fem = reference_cantilever(9, 4.0).unwrap();
    let solved = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Nalgebra), 3).unwrap();
    let pairs = EigenPairs {
        values: solved.eigenvalues.clone(),
        vectors: -solved.eigenvectors.clone(),
    };
    let loaded = compute_modes(&fem, &EigenSource::Precomputed(pairs), 3).unwrap();
    for (x, y) in loaded.phi1l.iter().flatten().zip(solved.phi1l.iter().flatten()) {
        for k in 0..6 {
            assert!((x[k] - y[k]).abs() < 1e-12);
        }
    }
}

#[test]
fn too_many_modes_is_a_configuration_error() {
    let fem = reference_cantilever(3, 1.0).unwrap();
    let err = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Jacobi), 13).unwrap_err();
    assert!(matches!(err, FemError::Configuration { .. }));
    assert_eq!(err.kind(), af_core::ErrorKind::Configuration);
}

#[test]
fn mismatched_matrix_size_is_rejected() {
    let mut fem = reference_cantilever(4, 1.0).unwrap();
    fem.mass = nalgebra::DMatrix::identity(6, 6);
    let err = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Jacobi), 2).unwrap_err();
    assert!(matches!(err, FemError::Configuration { .. }));
}

#[test]
fn perturbed_basis_fails_or_warns_on_alpha_check() {
    let fem = reference_cantilever(6, 2.0).unwrap();
    let mut basis = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Jacobi), 3).unwrap();
    for v in basis.psi1[0][3].iter_mut() {
        *v += 0.5;
    }
    let err = check_alphas(&basis, 1e-6, false).unwrap_err();
    assert!(matches!(err, FemError::NumericalConsistency { check: "alpha1", .. }));
    let report = check_alphas(&basis, 1e-6, true).unwrap();
    assert!(report.alpha1 > 1e-6);
}

#[test]
fn arrays_round_trip_exactly() {
    let fem = reference_tee().unwrap();
    let basis = compute_modes(&fem, &EigenSource::Solve(EigenMethod::Jacobi), 4).unwrap();
    let arrays: BTreeMap<String, _> = basis
        .to_arrays()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    assert_eq!(arrays["phi1"].shape, vec![4, 12, 6]);
    assert_eq!(arrays["c0ab"].shape, vec![12, 3, 3]);
    let back = ModalBasis::from_arrays(&arrays).unwrap();
    assert_eq!(back, basis);
}
