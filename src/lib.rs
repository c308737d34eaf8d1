pub mod allocator;
pub mod constants;
pub mod error;
pub mod fault;
pub mod io;
pub mod memory;
pub mod page_table;
pub mod process;
pub mod translation;
pub mod vm_manager;

#[cfg(test)]
mod tests_prop;

// Re-export commonly used items for convenience
pub use error::{Result, VmError};
pub use fault::FaultResolution;
pub use page_table::{Access, PageTable, Pte};
pub use translation::{TranslationResult, VirtualPage};
pub use vm_manager::VmManager;
