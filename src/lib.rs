#![warn(clippy::pedantic)]
// Noisy doc/signature lints — would require annotating hundreds of pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference — keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Intentional casts throughout scheduling/metrics code (durations, sizes, scores)
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
// Planner/executor functions are naturally long; splitting would be artificial
#![allow(clippy::too_many_lines)]
// Module structure — foo::FooThing pattern by design
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod metrics;
pub mod plan;
pub mod search;
pub mod tools;
pub(crate) mod utils;

pub use errors::{ShuntError, ShuntResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
