// Grounding: every generated statement must trace back to source material.
// Stages depend on the `GroundingValidator` trait, never on a concrete rule set.

pub mod claims;
pub mod lexicon;
pub mod validator;

pub use validator::{Candidate, GroundingValidator, SourceFacts, StrictGroundingValidator};
