//! A small static-file server: canonical directory URLs, symlink-aware
//! listings, hide/deny/index patterns, and range/conditional transfers.

pub mod errors;
pub mod sys_access;
pub mod sys_config;
pub mod sys_content;
pub mod sys_fsx;
pub mod sys_listing;
pub mod sys_path;
pub mod sys_render;
pub mod sys_server;
pub mod sys_statichost;
