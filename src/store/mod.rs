//! Calculation persistence.
//!
//! The service only talks to [`CalculationStore`]; [`InMemoryStore`] is the
//! reference backend used by the HTTP edge and the tests.

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::{CalculationFilter, CalculationStore};
