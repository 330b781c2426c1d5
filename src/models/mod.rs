//! Data models for SharePoint and directory entities

mod drive;
mod permission;
mod site;
mod user;

pub use drive::*;
pub use permission::*;
pub use site::*;
pub use user::*;
