mod registry;
mod session;

pub use registry::{RegistryConfig, SessionRegistry};
pub use session::{SessionInfo, ANONYMOUS};
