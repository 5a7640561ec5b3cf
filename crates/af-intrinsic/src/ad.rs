//! Objective values and Jacobians with respect to physical parameters.
//!
//! - `value`: plain evaluation.
//! - `jacfwd`: one dual-number evaluation per input.
//! - `jacrev`: one taped evaluation, one backward sweep per output.
//!
//! Shards map rows of a parameter table over the rayon pool. Every row is an
//! independent evaluation; reverse-mode tapes live on the worker's thread.

use crate::error::{IntrinsicError, IntrinsicResult};
use crate::objectives::Objective;
use crate::params::{ParamKind, ParameterTable, Parameters};
use crate::pipeline::{CaseData, evaluate};
use af_core::DenseMatrix;
use af_core::tape::record;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdMode {
    #[default]
    Value,
    Jacfwd,
    Jacrev,
}

/// Objective value and, unless plain, its Jacobian `[outputs × inputs]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivative {
    pub value: Vec<f64>,
    pub inputs: Vec<ParamKind>,
    pub jacobian: Option<DenseMatrix<f64>>,
}

pub fn value(
    params: &Parameters<f64>,
    q0: &[f64],
    case: &CaseData,
    objective: &Objective,
) -> IntrinsicResult<Vec<f64>> {
    Ok(evaluate(params, q0, case, Some(objective))?.objective)
}

pub fn jacfwd(
    params: &Parameters<f64>,
    inputs: &[ParamKind],
    q0: &[f64],
    case: &CaseData,
    objective: &Objective,
) -> IntrinsicResult<Derivative> {
    if inputs.is_empty() {
        return Err(IntrinsicError::configuration(
            "forward differentiation needs at least one input",
        ));
    }
    let mut columns = Vec::with_capacity(inputs.len());
    let mut out = Vec::new();
    for &kind in inputs {
        let ev = evaluate(&params.seeded(kind), q0, case, Some(objective))?;
        out = ev.objective.iter().map(|d| d.val).collect();
        columns.push(ev.objective.iter().map(|d| d.eps).collect::<Vec<f64>>());
    }
    let jac = DenseMatrix::from_fn(out.len(), inputs.len(), |i, j| columns[j][i]);
    Ok(Derivative {
        value: out,
        inputs: inputs.to_vec(),
        jacobian: Some(jac),
    })
}

pub fn jacrev(
    params: &Parameters<f64>,
    inputs: &[ParamKind],
    q0: &[f64],
    case: &CaseData,
    objective: &Objective,
) -> IntrinsicResult<Derivative> {
    if inputs.is_empty() {
        return Err(IntrinsicError::configuration(
            "reverse differentiation needs at least one input",
        ));
    }
    let (recorded, tape) = record(|| -> IntrinsicResult<_> {
        let (p, vars) = params.taped(inputs);
        let ev = evaluate(&p, q0, case, Some(objective))?;
        Ok((vars, ev.objective))
    });
    let (vars, outputs) = recorded?;
    tracing::debug!(nodes = tape.len(), outputs = outputs.len(), "reverse sweep");

    let rows: Vec<Vec<f64>> = outputs
        .iter()
        .map(|o| {
            let g = tape.gradient(*o);
            vars.iter().map(|v| g.wrt(*v)).collect()
        })
        .collect();
    let jac = DenseMatrix::from_fn(outputs.len(), inputs.len(), |i, j| rows[i][j]);
    Ok(Derivative {
        value: outputs.iter().map(af_core::Scalar::value).collect(),
        inputs: inputs.to_vec(),
        jacobian: Some(jac),
    })
}

pub fn differentiate(
    mode: AdMode,
    params: &Parameters<f64>,
    inputs: &[ParamKind],
    q0: &[f64],
    case: &CaseData,
    objective: &Objective,
) -> IntrinsicResult<Derivative> {
    match mode {
        AdMode::Value => Ok(Derivative {
            value: value(params, q0, case, objective)?,
            inputs: Vec::new(),
            jacobian: None,
        }),
        AdMode::Jacfwd => jacfwd(params, inputs, q0, case, objective),
        AdMode::Jacrev => jacrev(params, inputs, q0, case, objective),
    }
}

/// Evaluates every row of `table` on top of `base`, in row order.
pub fn evaluate_shard(
    table: &ParameterTable,
    base: &Parameters<f64>,
    mode: AdMode,
    inputs: &[ParamKind],
    q0: &[f64],
    case: &CaseData,
    objective: &Objective,
) -> IntrinsicResult<Vec<Derivative>> {
    table.check().map_err(IntrinsicError::configuration)?;
    tracing::info!(rows = table.len(), ?mode, "evaluating shard");
    table
        .rows
        .par_iter()
        .map(|row| {
            let params = base.with_row(&table.kinds, row);
            differentiate(mode, &params, inputs, q0, case, objective)
        })
        .collect()
}
