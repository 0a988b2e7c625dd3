//! Validated, transactional edits of Xcode `project.pbxproj` files, exposed
//! as a CLI and an MCP tool server.

pub mod api;
pub mod app;
pub mod config;
pub mod edit;
pub mod filetype;
pub mod hash;
pub mod logging;
pub mod plist;
pub mod project;
pub mod response;
pub mod scan;
pub mod server;
pub mod store;
pub mod tree;
pub mod validate;
