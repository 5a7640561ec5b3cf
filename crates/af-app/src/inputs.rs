//! Runtime inputs compiled from the configuration.
//!
//! Matrices are read here, whether the stage that needs them computes or
//! loads its container, because the cache fingerprints digest their content.

use crate::error::{AppError, AppResult};
use af_aero::{GustSettings, PanelGeometry, RawAero};
use af_config::{AeroConfig, FemConfig, GustConfig, MatrixSource, SystemConfig, XloadsConfig};
use af_core::ArrayData;
use af_fem::{BeamTree, ComponentDef, EigenMethod, EigenPairs, EigenSource, FemInput, GridPoint};
use af_intrinsic::{ExternalLoads, GustCase, Parameters, PointLoad};
use af_results::{Fingerprinter, ResultsError, read_array};
use nalgebra::DMatrix;
use std::path::Path;

pub fn read_matrix(source: &MatrixSource, folder: Option<&Path>) -> AppResult<ArrayData> {
    match (source, source.path_in(folder)) {
        (MatrixSource::Inline(a), _) => Ok(a.clone()),
        (MatrixSource::File(_), Some(path)) => {
            let (array, _) = read_array(&path)?;
            tracing::debug!(path = %path.display(), shape = ?array.shape, "read matrix");
            Ok(array)
        }
        (MatrixSource::File(p), None) => Err(AppError::InvalidInput(format!(
            "matrix file {} could not be resolved",
            p.display()
        ))),
    }
}

fn square(a: &ArrayData, what: &str) -> AppResult<DMatrix<f64>> {
    a.expect_ndim(what, 2)?;
    if a.shape[0] != a.shape[1] {
        return Err(AppError::InvalidInput(format!(
            "{what} must be square, got {:?}",
            a.shape
        )));
    }
    Ok(DMatrix::from_row_slice(a.shape[0], a.shape[1], &a.data))
}

pub fn beam_tree(fem: &FemConfig) -> AppResult<BeamTree> {
    let components: Vec<ComponentDef> = fem
        .connectivity
        .iter()
        .map(|(name, children)| ComponentDef {
            name: name.clone(),
            children: children.clone(),
        })
        .collect();
    let grid: Vec<GridPoint> = fem
        .grid
        .iter()
        .map(|p| GridPoint {
            x: p.x,
            component: p.component.clone(),
        })
        .collect();
    Ok(BeamTree::new(&components, &grid, fem.cab_xtol)?)
}

/// Structural model, eigen source and the digest of both.
pub struct FemInputs {
    pub input: FemInput,
    pub source: EigenSource,
    pub fingerprint: String,
}

pub fn fem_inputs(fem: &FemConfig) -> AppResult<FemInputs> {
    let folder = fem.folder.as_deref();
    let tree = beam_tree(fem)?;
    let k = read_matrix(&fem.stiffness, folder)?;
    let m = read_matrix(&fem.mass, folder)?;

    let mut fp = Fingerprinter::new("fem");
    fp.update_array(&k)
        .update_array(&m)
        .update_str(&fem.num_modes.to_string())
        .update_f64s(&[fem.cab_xtol]);
    fp.update_json(&fem.connectivity)
        .and_then(|f| f.update_json(&fem.grid))
        .and_then(|f| f.update_json(&fem.eig_type))
        .map_err(ResultsError::from)?;

    let source = match (fem.eig_type, &fem.eig_names) {
        (EigenMethod::Load, Some([values, vectors])) => {
            let read = |p: &Path| {
                let path = match folder {
                    Some(f) if p.is_relative() => f.join(p),
                    _ => p.to_path_buf(),
                };
                read_array(&path).map(|(a, _)| a)
            };
            let values = read(values.as_path())?;
            let vectors = read(vectors.as_path())?;
            fp.update_array(&values).update_array(&vectors);
            EigenSource::Precomputed(EigenPairs::from_arrays(&values, &vectors)?)
        }
        (EigenMethod::Load, None) => {
            return Err(AppError::InvalidInput(
                "eig_type load needs eig_names".to_string(),
            ));
        }
        (method, _) => EigenSource::Solve(method),
    };

    Ok(FemInputs {
        input: FemInput {
            tree,
            stiffness: square(&k, "stiffness")?,
            mass: square(&m, "mass")?,
        },
        source,
        fingerprint: fp.finish(),
    })
}

pub struct AeroInputs {
    pub raw: RawAero,
    pub fingerprint: String,
}

pub fn aero_inputs(aero: &AeroConfig) -> AppResult<AeroInputs> {
    let folder = aero.folder.as_deref();
    let a = read_matrix(&aero.a, folder)?;
    let d = aero
        .d
        .as_ref()
        .map(|d| read_matrix(d, folder))
        .transpose()?;
    let poles = ArrayData::vector(aero.poles.clone());

    let mut fp = Fingerprinter::new("modal_aero");
    fp.update_array(&a).update_array(&poles);
    if let Some(d) = &d {
        fp.update_array(d);
    }
    Ok(AeroInputs {
        raw: RawAero::from_arrays(&a, d.as_ref(), &poles)?,
        fingerprint: fp.finish(),
    })
}

pub fn gust_case(gust: &GustConfig) -> AppResult<GustCase> {
    Ok(GustCase {
        settings: GustSettings {
            profile: gust.profile,
            span_shape: gust.span_shape,
            shift: gust.shift,
            step: gust.step,
        },
        geometry: PanelGeometry::new(gust.collocation.clone(), gust.dihedral())?,
    })
}

pub fn external_loads(xloads: &XloadsConfig) -> ExternalLoads {
    let points = |defs: &[af_config::PointLoadDef]| {
        defs.iter()
            .map(|p| PointLoad {
                node: p.node,
                component: p.component,
                values: p.values.clone(),
            })
            .collect()
    };
    ExternalLoads {
        times: xloads.times.clone(),
        follower: points(&xloads.follower),
        dead: points(&xloads.dead),
    }
}

/// Configured flight and load values; absent sources keep the defaults.
pub fn nominal_parameters(system: &SystemConfig) -> Parameters<f64> {
    let mut p = Parameters::default();
    if let Some(aero) = &system.aero {
        p.u_inf = aero.u_inf;
        p.rho_inf = aero.rho_inf;
        if let Some(gust) = &aero.gust {
            p.gust_intensity = gust.intensity;
            p.gust_length = gust.length;
        }
    }
    if let Some(x) = &system.xloads {
        p.load_factor = x.load_factor;
    }
    p
}
