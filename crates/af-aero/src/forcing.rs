//! Modal gust forces from panel downwash.

use crate::error::{AeroError, AeroResult};
use crate::gust::Gust;
use crate::roger::AerodynamicModel;
use af_core::Scalar;

/// Generalized gust forces on the gust time grid, `[time][mode]`.
///
/// `ql_wdot` rows are pole-major, `num_poles * num_modes` long, matching the
/// layout of the lag states.
#[derive(Debug, Clone)]
pub struct GustForcing<S> {
    pub time: Vec<f64>,
    pub q_w: Vec<Vec<S>>,
    pub q_wdot: Vec<Vec<S>>,
    pub q_wddot: Vec<Vec<S>>,
    pub q_wsum: Vec<Vec<S>>,
    pub ql_wdot: Vec<Vec<S>>,
    pub total_time: S,
}

pub fn project_gust<S: Scalar>(
    model: &AerodynamicModel<S>,
    gust: &Gust<S>,
) -> AeroResult<GustForcing<S>> {
    let ops = model
        .gust
        .as_ref()
        .ok_or_else(|| AeroError::configuration("gust forcing requires the D matrices"))?;
    let panels = gust.downwash.first().map_or(0, Vec::len);
    if ops.d0hat.cols() != panels {
        return Err(AeroError::configuration(format!(
            "D maps {} panels but the gust has {panels}",
            ops.d0hat.cols()
        )));
    }

    let nt = gust.time.len();
    let mut forcing = GustForcing {
        time: gust.time.clone(),
        q_w: Vec::with_capacity(nt),
        q_wdot: Vec::with_capacity(nt),
        q_wddot: Vec::with_capacity(nt),
        q_wsum: Vec::with_capacity(nt),
        ql_wdot: Vec::with_capacity(nt),
        total_time: gust.total_time,
    };
    for i in 0..nt {
        let q_w = ops.d0hat.matvec(&gust.downwash[i]);
        let q_wdot = ops.d1hat.matvec(&gust.downwash_rate[i]);
        let q_wddot = ops.d2hat.matvec(&gust.downwash_accel[i]);
        let q_wsum = (0..q_w.len())
            .map(|m| q_w[m] + q_wdot[m] + q_wddot[m])
            .collect();
        let ql = ops
            .d3hat
            .iter()
            .flat_map(|d| d.matvec(&gust.downwash_rate[i]))
            .collect();
        forcing.q_w.push(q_w);
        forcing.q_wdot.push(q_wdot);
        forcing.q_wddot.push(q_wddot);
        forcing.q_wsum.push(q_wsum);
        forcing.ql_wdot.push(ql);
    }
    Ok(forcing)
}

impl<S: Scalar> GustForcing<S> {
    /// `Q_wsum(t)`.
    pub fn sum_at(&self, t: f64) -> Vec<S> {
        interpolate(&self.time, &self.q_wsum, t)
    }

    /// `Ql_wdot(t)`, pole-major.
    pub fn lag_at(&self, t: f64) -> Vec<S> {
        interpolate(&self.time, &self.ql_wdot, t)
    }

    pub fn map_scalar<T: Scalar>(&self, f: impl Fn(S) -> T + Copy) -> GustForcing<T> {
        let rows = |r: &[Vec<S>]| -> Vec<Vec<T>> {
            r.iter().map(|row| row.iter().map(|v| f(*v)).collect()).collect()
        };
        GustForcing {
            time: self.time.clone(),
            q_w: rows(&self.q_w),
            q_wdot: rows(&self.q_wdot),
            q_wddot: rows(&self.q_wddot),
            q_wsum: rows(&self.q_wsum),
            ql_wdot: rows(&self.ql_wdot),
            total_time: f(self.total_time),
        }
    }
}

/// Piecewise-linear sample of `rows` at `t`; zero outside the grid.
pub fn interpolate<S: Scalar>(time: &[f64], rows: &[Vec<S>], t: f64) -> Vec<S> {
    let width = rows.first().map_or(0, Vec::len);
    let (Some(&first), Some(&last)) = (time.first(), time.last()) else {
        return vec![S::zero(); width];
    };
    if t < first || t > last {
        return vec![S::zero(); width];
    }
    let hi = time.partition_point(|&x| x <= t);
    if hi >= time.len() {
        return rows[time.len() - 1].clone();
    }
    let lo = hi - 1;
    let w = (t - time[lo]) / (time[hi] - time[lo]);
    let (a, b) = (S::cst(1.0 - w), S::cst(w));
    rows[lo]
        .iter()
        .zip(&rows[hi])
        .map(|(&x, &y)| a * x + b * y)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn interpolation_hits_nodes_and_midpoints() {
        let time = [0.0, 1.0, 2.0];
        let rows = vec![vec![0.0, 1.0], vec![2.0, 1.0], vec![4.0, -1.0]];
        assert_eq!(interpolate(&time, &rows, 1.0), vec![2.0, 1.0]);
        assert_eq!(interpolate(&time, &rows, 1.5), vec![3.0, 0.0]);
        assert_eq!(interpolate(&time, &rows, 2.0), vec![4.0, -1.0]);
        assert_eq!(interpolate(&time, &rows, 2.5), vec![0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn interpolant_stays_between_neighbours(
            a in -10.0f64..10.0,
            b in -10.0f64..10.0,
            t in 0.0f64..1.0,
        ) {
            let v = interpolate(&[0.0, 1.0], &[vec![a], vec![b]], t)[0];
            prop_assert!(v >= a.min(b) - 1e-12 && v <= a.max(b) + 1e-12);
        }
    }
}
