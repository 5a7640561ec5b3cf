//! Cross-reference checks run before anything is computed.

use crate::schema::{AeroConfig, Config, MatrixSource, SimulationKind, SystemConfig, XloadsConfig};
use af_fem::EigenMethod;
use af_intrinsic::{AdMode, EquationKind, ParamKind};
use af_solver::{Backend, SolverFunction, lookup};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported feature: {feature} - {reason}")]
    Unsupported { feature: String, reason: String },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn positive(field: &str, v: f64) -> Result<(), ValidationError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, v, "must be positive"))
    }
}

pub fn validate_config(config: &Config) -> Result<(), ValidationError> {
    validate_fem(config)?;

    let needs_store = !config.driver.compute_fem
        || config.driver.save_fem
        || !config.driver.compute_modalaero
        || config.driver.save_modalaero
        || config.systems.values().any(|s| s.save);
    if needs_store && config.driver.sol_path.is_none() {
        return Err(invalid(
            "driver.sol_path",
            "none",
            "required when loading or saving results",
        ));
    }

    if config.systems.is_empty() {
        return Err(invalid("systems", "{}", "at least one system is required"));
    }
    match config.simulation.kind {
        SimulationKind::Single if config.systems.len() != 1 => {
            return Err(invalid(
                "simulation.typeof",
                "single",
                format!("needs exactly one system, found {}", config.systems.len()),
            ));
        }
        SimulationKind::Shard => {
            if let Some((name, _)) = config.systems.iter().find(|(_, s)| s.shard.is_none()) {
                return Err(ValidationError::MissingReference {
                    id: "shard".to_string(),
                    context: format!("system '{name}' of a shard simulation"),
                });
            }
        }
        _ => {
            if let Some((name, _)) = config.systems.iter().find(|(_, s)| s.shard.is_some()) {
                return Err(ValidationError::Unsupported {
                    feature: format!("systems.{name}.shard"),
                    reason: "parameter tables need simulation typeof shard".to_string(),
                });
            }
        }
    }

    let num_nodes = config.fem.grid.len();
    for (name, system) in &config.systems {
        validate_system(name, system, config.fem.num_modes, num_nodes)?;
    }
    Ok(())
}

fn validate_fem(config: &Config) -> Result<(), ValidationError> {
    let fem = &config.fem;
    if fem.num_modes == 0 {
        return Err(invalid("fem.num_modes", 0, "at least one mode is required"));
    }
    if fem.grid.len() < 2 {
        return Err(invalid(
            "fem.grid",
            fem.grid.len(),
            "needs the clamped root and at least one free node",
        ));
    }
    positive("fem.cab_xtol", fem.cab_xtol)?;
    positive("fem.alpha_tolerance", fem.alpha_tolerance)?;

    for (component, children) in &fem.connectivity {
        for child in children {
            if !fem.connectivity.contains_key(child) {
                return Err(ValidationError::MissingReference {
                    id: child.clone(),
                    context: format!("fem.connectivity.{component}"),
                });
            }
        }
    }
    let mut used = HashSet::new();
    for (n, p) in fem.grid.iter().enumerate() {
        if !fem.connectivity.contains_key(&p.component) {
            return Err(ValidationError::MissingReference {
                id: p.component.clone(),
                context: format!("fem.grid[{n}]"),
            });
        }
        if p.x.iter().any(|v| !v.is_finite()) {
            return Err(invalid(format!("fem.grid[{n}].x"), format!("{:?}", p.x), "must be finite"));
        }
        used.insert(p.component.as_str());
    }
    if let Some(empty) = fem.connectivity.keys().find(|c| !used.contains(c.as_str())) {
        return Err(invalid(
            format!("fem.connectivity.{empty}"),
            empty,
            "component has no grid nodes",
        ));
    }

    if fem.eig_type == EigenMethod::Load && fem.eig_names.is_none() {
        return Err(ValidationError::MissingReference {
            id: "eig_names".to_string(),
            context: "fem with eig_type load".to_string(),
        });
    }
    let ndof = 6 * (fem.grid.len() - 1);
    for (field, source) in [("fem.stiffness", &fem.stiffness), ("fem.mass", &fem.mass)] {
        if let MatrixSource::Inline(a) = source {
            if a.shape != [ndof, ndof] {
                return Err(invalid(
                    field,
                    format!("{:?}", a.shape),
                    format!("expected [{ndof}, {ndof}] without the clamped root"),
                ));
            }
        }
    }
    if fem.num_modes > ndof {
        return Err(invalid(
            "fem.num_modes",
            fem.num_modes,
            format!("model has only {ndof} free degrees of freedom"),
        ));
    }
    Ok(())
}

fn validate_system(
    name: &str,
    system: &SystemConfig,
    num_modes: usize,
    num_nodes: usize,
) -> Result<(), ValidationError> {
    let field = |f: &str| format!("systems.{name}.{f}");

    let backend_error = |reason: String| {
        invalid(
            field("solver_library"),
            format!("{:?}/{:?}", system.solver_library, system.solver_function),
            reason,
        )
    };
    let backend = lookup(system.solver_library, system.solver_function)
        .map_err(|e| backend_error(e.to_string()))?;
    let settings = &system.solver_settings;
    let resolved = match backend {
        Backend::Marching => settings.runge_kutta().map(|_| ()),
        Backend::Dopri5 => settings.adaptive().map(|_| ()),
        Backend::Newton => settings.newton().map(|_| ()),
    };
    resolved.map_err(|e| {
        invalid(
            field("solver_settings"),
            format!("{:?}", settings.given()),
            e.to_string(),
        )
    })?;
    let expected = match system.solution {
        EquationKind::Static => SolverFunction::Root,
        EquationKind::Dynamic => SolverFunction::Ode,
    };
    if system.solver_function != expected {
        return Err(backend_error(format!(
            "{:?} systems need solver_function {expected:?}",
            system.solution
        )));
    }

    system
        .time_grid()
        .map_err(|reason| invalid(field("t"), "grid", reason))?;
    positive(&field("rotation_threshold"), system.rotation_threshold)?;

    if let Some(q0) = &system.q0 {
        let size = system.state_size(num_modes);
        if q0.len() != size {
            return Err(invalid(
                field("q0"),
                q0.len(),
                format!("state has {size} entries"),
            ));
        }
    }

    if let Some(xloads) = &system.xloads {
        validate_xloads(name, system.solution, xloads, num_nodes)?;
    }
    if let Some(aero) = &system.aero {
        validate_aero(name, system.solution, aero)?;
    }

    let check_inputs = |what: &str, kinds: &[ParamKind]| -> Result<(), ValidationError> {
        for kind in kinds {
            let available = match kind {
                ParamKind::GustIntensity | ParamKind::GustLength => {
                    system.aero.as_ref().is_some_and(|a| a.gust.is_some())
                }
                ParamKind::UInf | ParamKind::RhoInf => system.aero.is_some(),
                ParamKind::LoadFactor => system.xloads.is_some(),
            };
            if !available {
                return Err(ValidationError::MissingReference {
                    id: format!("{kind:?}"),
                    context: field(what),
                });
            }
        }
        Ok(())
    };

    if let Some(ad) = &system.ad {
        if ad.mode != AdMode::Value && ad.inputs.is_empty() {
            return Err(invalid(
                field("ad.inputs"),
                "[]",
                format!("{:?} needs at least one input", ad.mode),
            ));
        }
        check_inputs("ad.inputs", &ad.inputs)?;
        let obj = &ad.objective;
        if obj.is_empty() {
            return Err(invalid(field("ad.objective"), "[]", "selects no entries"));
        }
        if let Some(n) = obj.nodes.iter().find(|&&n| n >= num_nodes) {
            return Err(invalid(field("ad.objective.nodes"), n, format!("grid has {num_nodes} nodes")));
        }
        let nc = obj.var.num_components();
        if let Some(c) = obj.components.iter().find(|&&c| c >= nc) {
            return Err(invalid(
                field("ad.objective.components"),
                c,
                format!("{:?} has {nc} components", obj.var),
            ));
        }
    }

    if let Some(table) = &system.shard {
        table
            .check()
            .map_err(|reason| invalid(field("shard"), table.len(), reason))?;
        if table.is_empty() {
            return Err(invalid(field("shard.rows"), 0, "parameter table has no rows"));
        }
        check_inputs("shard.kinds", &table.kinds)?;
        if system.ad.is_none() {
            return Err(ValidationError::MissingReference {
                id: "ad".to_string(),
                context: format!("system '{name}' with a parameter table"),
            });
        }
    }
    Ok(())
}

fn validate_xloads(
    name: &str,
    solution: EquationKind,
    xloads: &XloadsConfig,
    num_nodes: usize,
) -> Result<(), ValidationError> {
    let field = |f: &str| format!("systems.{name}.xloads.{f}");
    if xloads.times.is_empty() || xloads.times.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(invalid(field("times"), xloads.times.len(), "must be strictly increasing"));
    }
    if !xloads.dead.is_empty() && solution == EquationKind::Dynamic {
        return Err(ValidationError::Unsupported {
            feature: field("dead"),
            reason: "dead loads are only supported in static systems".to_string(),
        });
    }
    for (kind, loads) in [("follower", &xloads.follower), ("dead", &xloads.dead)] {
        for (i, p) in loads.iter().enumerate() {
            if p.node == 0 || p.node >= num_nodes {
                return Err(invalid(
                    field(&format!("{kind}[{i}].node")),
                    p.node,
                    format!("free nodes are 1..{num_nodes}"),
                ));
            }
            if p.component >= 6 {
                return Err(invalid(field(&format!("{kind}[{i}].component")), p.component, "must be below 6"));
            }
            if p.values.len() != xloads.times.len() {
                return Err(invalid(
                    field(&format!("{kind}[{i}].values")),
                    p.values.len(),
                    format!("one value per time, {} times", xloads.times.len()),
                ));
            }
        }
    }
    if !xloads.load_factor.is_finite() {
        return Err(invalid(field("load_factor"), xloads.load_factor, "must be finite"));
    }
    Ok(())
}

fn validate_aero(name: &str, solution: EquationKind, aero: &AeroConfig) -> Result<(), ValidationError> {
    let field = |f: &str| format!("systems.{name}.aero.{f}");
    positive(&field("c_ref"), aero.c_ref)?;
    positive(&field("u_inf"), aero.u_inf)?;
    positive(&field("rho_inf"), aero.rho_inf)?;
    positive(&field("singular_tol"), aero.singular_tol)?;
    if let Some(p) = aero.poles.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
        return Err(invalid(field("poles"), p, "lag poles must be positive"));
    }
    if let Some(gust) = &aero.gust {
        if solution == EquationKind::Static {
            return Err(ValidationError::Unsupported {
                feature: field("gust"),
                reason: "gusts drive dynamic systems only".to_string(),
            });
        }
        if aero.d.is_none() {
            return Err(ValidationError::MissingReference {
                id: "d".to_string(),
                context: field("gust"),
            });
        }
        positive(&field("gust.length"), gust.length)?;
        positive(&field("gust.step"), gust.step)?;
        if !gust.intensity.is_finite() {
            return Err(invalid(field("gust.intensity"), gust.intensity, "must be finite"));
        }
        if gust.collocation.is_empty() {
            return Err(invalid(field("gust.collocation"), 0, "needs at least one panel"));
        }
        if gust.dihedral().len() != gust.collocation.len() {
            return Err(invalid(
                field("gust.dihedral"),
                gust.dihedral().len(),
                format!("one angle per panel, {} panels", gust.collocation.len()),
            ));
        }
    }
    Ok(())
}
