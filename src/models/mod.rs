pub mod task;
pub mod user;

pub use task::{NewTask, Task, TaskInput, TaskPatch, TaskQuery, TaskStatus, TaskUpdate};
pub use user::{NewUser, PublicUser, Role, User, UserFilter, UserPatch};
