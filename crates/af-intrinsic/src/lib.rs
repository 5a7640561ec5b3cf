//! af-intrinsic: intrinsic modal equations and the differentiable pipeline.
//!
//! - states (state vector layout)
//! - params (differentiable physical parameters)
//! - xloads (follower and dead point loads)
//! - rotation, fields (field recovery along the tree)
//! - dq (static residual and dynamic right-hand side)
//! - pipeline, objectives, ad (evaluation and derivatives)

pub mod ad;
pub mod dq;
pub mod error;
pub mod fields;
pub mod objectives;
pub mod params;
pub mod pipeline;
pub mod rotation;
pub mod states;
pub mod xloads;

pub use ad::{AdMode, Derivative, differentiate, evaluate_shard, jacfwd, jacrev, value};
pub use dq::{DqArgs, DynamicEquation, StaticEquation, dynamic_rhs, static_residual};
pub use error::{IntrinsicError, IntrinsicResult};
pub use fields::{Fields, Kinematics, NodeField, kinematics, recover_fields, superpose};
pub use objectives::{Objective, ObjectiveFun, ObjectiveVar};
pub use params::{ParamKind, ParameterTable, Parameters};
pub use pipeline::{AeroCase, CaseData, Evaluation, GustCase, Structure, evaluate};
pub use states::{EquationKind, StateBlocks, StateLayout};
pub use xloads::{ExternalLoads, PointLoad};
