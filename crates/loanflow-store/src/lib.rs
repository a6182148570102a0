pub mod memory;
pub mod postgres;

pub use memory::{InMemoryLoanStore, InMemoryUserStore};
pub use postgres::{PgLoanStore, PgUserStore};
