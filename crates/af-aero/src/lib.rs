//! af-aero: Roger aerodynamics and discrete gusts in modal coordinates.
//!
//! Everything downstream of the raw matrices is generic over
//! [`af_core::Scalar`] so flight conditions and gust parameters can carry
//! derivatives.

pub mod error;
pub mod forcing;
pub mod gust;
pub mod roger;

pub use error::{AeroError, AeroResult};
pub use forcing::{GustForcing, interpolate, project_gust};
pub use gust::{Gust, GustProfile, GustSettings, PanelGeometry, SpanShape, build_gust, time_grid};
pub use roger::{AerodynamicModel, GustOperators, RawAero, scale_aero};
