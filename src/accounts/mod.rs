pub mod memory;
pub mod model;
pub mod repo;

pub use memory::MemoryAccountStore;
pub use model::{prepare_for_persistence, Account, Password, Prepared, Role, Subscription};
pub use repo::{AccountStore, PgAccountStore};
