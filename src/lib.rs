//! GLSL `#include` preprocessor and offline shader validation

pub mod batch;
pub mod diagnostics;
pub mod error;
pub mod parser;
pub mod preprocessor;
pub mod registry;
pub mod resolver;
pub mod validator;

pub use batch::*;
pub use diagnostics::*;
pub use error::*;
pub use parser::*;
pub use preprocessor::*;
pub use registry::*;
pub use resolver::*;
pub use validator::*;
