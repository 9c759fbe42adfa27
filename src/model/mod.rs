pub mod finding;
pub mod occurrence_set;
pub mod secret_value;

pub use finding::{Finding, Occurrence, SourceContent, Validity};
pub use occurrence_set::OccurrenceSet;
pub use secret_value::SecretValue;
