//! Domain logic for the studio website: sign-in and roles, the client portal, the admin
//! dashboard and the public landing page.
//!
//! Everything is persisted through a hosted [`Platform`] which provides authentication, tables
//! and object storage.

pub use error::{Error, Result};
pub use logging::init_logging;
pub use platform::Platform;

pub mod auth;
pub mod clients;
pub mod contact;
pub mod error;
pub mod gallery;
pub mod landing;
pub mod platform;
pub mod portal;
pub mod roles;
pub mod schema;
pub mod uploads;

mod logging;
