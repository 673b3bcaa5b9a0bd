pub mod events;
pub mod feasibility;
pub mod submit;
pub mod validation;

pub use events::EventReporter;
pub use submit::{partial_result_from_status, SubmitServer};
