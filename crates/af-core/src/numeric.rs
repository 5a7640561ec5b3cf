//! Float helpers shared by the stage crates.

/// Floating point type used for every non-differentiated quantity.
pub type Real = f64;

/// Largest absolute entry-wise deviation of a square matrix from identity.
pub fn identity_deviation(rows: &[Vec<Real>]) -> Real {
    let mut worst: Real = 0.0;
    for (i, row) in rows.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            let target = if i == j { 1.0 } else { 0.0 };
            worst = worst.max((v - target).abs());
        }
    }
    worst
}

/// `n` evenly spaced points from `a` to `b` inclusive.
pub fn linspace(a: Real, b: Real, n: usize) -> Vec<Real> {
    match n {
        0 => Vec::new(),
        1 => vec![a],
        _ => {
            let h = (b - a) / (n - 1) as Real;
            (0..n)
                .map(|i| if i == n - 1 { b } else { a + h * i as Real })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_hits_both_ends() {
        let t = linspace(0.0, 0.3, 4);
        assert_eq!(t.len(), 4);
        assert_eq!(t[0], 0.0);
        assert_eq!(t[3], 0.3);
        assert!((t[1] - 0.1).abs() < 1e-15);
    }

    #[test]
    fn identity_deviation_reports_worst_entry() {
        let m = vec![vec![1.0, 0.01], vec![-0.02, 0.999]];
        assert!((identity_deviation(&m) - 0.02).abs() < 1e-15);
    }
}
