pub mod manager;
pub mod memory;
pub mod models;
pub mod pagination;
pub mod postgres;
pub mod repository;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use pagination::{Page, PageInfo, Pagination};
pub use postgres::PgStore;
pub use repository::Store;
