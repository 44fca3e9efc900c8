//! Kernel module - infrastructure traits, backends and the dependency container.

pub mod deps;
pub mod memory;
pub mod test_dependencies;
pub mod traits;

pub use deps::{AppDeps, GigachatAdapter};
pub use memory::MemoryDocumentStore;
pub use test_dependencies::{MockAuthService, MockChatService, TestDependencies};
pub use traits::*;
