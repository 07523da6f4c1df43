//! Database models split into domain-specific modules.

pub mod booking;
pub mod common;
pub mod image;
pub mod property;
pub mod user;

pub use booking::*;
pub use common::*;
pub use image::*;
pub use property::*;
pub use user::*;
