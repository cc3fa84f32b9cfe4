pub mod engine;
pub mod inputs;
pub mod solver;
pub mod summary;

pub use engine::{calculate_projection, calculate_projection_with, ProjectionOutput, YearlyResult};
pub use inputs::UserInputs;
pub use summary::ProjectionSummary;
