#![doc = "The `taskforge` library crate."]
#![doc = ""]
#![doc = "Domain models, the task lifecycle and user account services, the persistence"]
#![doc = "gateway they depend on, authentication, routing configuration and error handling."]
#![doc = "The binary (`main.rs`) wires these together into an HTTP server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

pub use crate::error::{AppError, ErrorCode, ErrorKind};
pub use crate::services::{TaskService, UserService};
