//! af-solver: time marching and root finding over generic scalars.
//!
//! Backends are selected through a fixed `(library, function)` registry.
//! Step control and convergence tests run on plain values; states carry
//! the scalar type so derivatives propagate through the solve.

pub mod adaptive;
pub mod error;
pub mod jacobian;
pub mod marching;
pub mod newton;
pub mod problem;
pub mod registry;
pub mod settings;

pub use adaptive::{AdaptiveResult, integrate};
pub use error::{SolverError, SolverResult};
pub use jacobian::{central_difference_jacobian, forward_jacobian};
pub use marching::{ForwardEuler, Integrator, MarchResult, Rk4, Tsit5, integrator, march};
pub use newton::{NewtonResult, NewtonSweep, newton_solve, newton_sweep};
pub use problem::{OdeSystem, Problem, RootSystem};
pub use registry::{Backend, REGISTRY, RawTrajectory, SolverFunction, SolverLibrary, StateMatrix, lookup};
pub use settings::{AdaptiveSettings, NewtonSettings, NormKind, RkMethod, RkSettings, SolverSettings};
