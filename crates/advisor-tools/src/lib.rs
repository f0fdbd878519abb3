pub mod domains;
pub mod error;
pub mod memory;
pub mod provider;
pub mod registry;

pub use domains::{builtin_registry, register_builtin_tools};
pub use error::{ProviderError, RegistryError, ToolError};
pub use provider::{CachedProvider, DataProvider, MockDataProvider};
pub use registry::{ToolDescriptor, ToolHandler, ToolRegistry};
