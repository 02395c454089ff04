//! Provider Registry (§4.E): name -> Provider, `providerId:modelName` spec
//! parsing.

pub mod error;
pub mod model_spec;
pub mod provider;
pub mod registry;
pub mod test_support;

pub use error::ProviderError;
pub use model_spec::ModelSpec;
pub use provider::{GenerateOptions, Provider, ToolCallRequest, ToolChoice};
pub use registry::ProviderRegistry;
