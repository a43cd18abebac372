pub mod factory;
pub mod memory;
pub mod repository;

pub use factory::{DbConfig, MemoryRepositoryFactory, RepositoryFactory, RepositoryRegistry};
pub use memory::InMemoryTableRepository;
pub use repository::{RepositoryError, TableRepository};
