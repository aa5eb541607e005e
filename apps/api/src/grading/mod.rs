// Grading: five independently scored dimensions with floors, plus typed remedies.

pub mod assessment;
pub mod grader;
pub mod policy;

pub use assessment::SeniorityAssessor;
pub use grader::{GradeInput, Grader};
pub use policy::GradingPolicy;
