//! Business logic services.
//!
//! Services sit between the outer surfaces (HTTP, CLI) and the storage
//! backends.

mod repository;

pub use repository::ItemRepository;
