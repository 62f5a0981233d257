pub mod base;
pub mod registry;
pub mod search;

pub use base::{
    DiscoveryData, ErrorDetails, ExecutionContext, ParamHints, ParameterValidator, Tool,
    ToolResult, ValidationError, ValidationReport,
};
pub use registry::ToolRegistry;
