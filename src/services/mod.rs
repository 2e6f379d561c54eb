//! Business logic. Each service receives its collaborators at construction time.

pub mod tasks;
pub mod users;

pub use tasks::{TaskService, DEFAULT_DUE_SOON_DAYS};
pub use users::{PasswordResetTicket, UserService};
