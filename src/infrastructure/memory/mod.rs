mod memory_repository;
mod memory_sessions;

pub use memory_repository::{create_memory_repository, MemoryRepository};
pub use memory_sessions::{create_memory_session_store, MemorySessionStore};
