//! Command-line flags and the immutable per-process server configuration.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use clap::{Parser, ValueEnum};

use crate::{
    errors::StartupError,
    sys_access::core::AccessPatterns,
    sys_fsx::{core::Filesystem, dir::DirFs},
};

pub const DEFAULT_HIDE: &str = "/[.][^/]+/?$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ListingMode {
    /// Rows rendered on the server, sortable through query links
    #[default]
    Server,
    /// Data payload sorted and selected in the browser
    Client,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "smn_dirserve", version, about = "Serve a directory tree over HTTP")]
pub struct CliArgs {
    /// The network address to listen on
    #[arg(long, default_value = ":8080")]
    pub addr: String,

    /// Regular expression of file paths to hide.
    /// Paths matching this pattern are excluded from directory listings,
    /// but direct requests for this path are still resolved.
    #[arg(long, default_value = DEFAULT_HIDE)]
    pub hide: String,

    /// Regular expression of file paths to deny.
    /// Paths matching this pattern are excluded from directory listings
    /// and direct requests for this path report Forbidden.
    #[arg(long, default_value = "")]
    pub deny: String,

    /// Regular expression of file paths to treat as index.html pages
    /// (e.g., '/index[.]html$'; default none)
    #[arg(long, default_value = "")]
    pub index: String,

    /// Directory to serve files from
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Allow the zero-copy streaming path for file bodies
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sendfile: bool,

    /// Log every HTTP request
    #[arg(long)]
    pub verbose: bool,

    /// How directory listings are rendered
    #[arg(long, value_enum, default_value_t = ListingMode::Server)]
    pub listing: ListingMode,
}

/// Everything a request handler needs, built once at startup and shared
/// read-only between all requests.
#[derive(Clone)]
pub struct ServerConfig {
    pub fs: Arc<dyn Filesystem>,
    pub patterns: AccessPatterns,
    pub sendfile: bool,
    pub verbose: bool,
    pub listing: ListingMode,
}

impl ServerConfig {
    pub fn new(fs: Arc<dyn Filesystem>, patterns: AccessPatterns) -> Self {
        Self {
            fs,
            patterns,
            sendfile: true,
            verbose: false,
            listing: ListingMode::Server,
        }
    }

    /// Compile the patterns and check the root directory.
    pub fn from_args(args: &CliArgs) -> Result<Self, StartupError> {
        let patterns = AccessPatterns::compile(&args.hide, &args.deny, &args.index)?;
        std::fs::metadata(&args.root).map_err(|source| StartupError::InvalidRoot {
            path: args.root.clone(),
            source,
        })?;
        Ok(Self {
            fs: Arc::new(DirFs::new(&args.root)),
            patterns,
            sendfile: args.sendfile,
            verbose: args.verbose,
            listing: args.listing,
        })
    }
}

/// Parse a listen address; a bare `:port` listens on all interfaces.
pub fn parse_addr(addr: &str) -> Result<SocketAddr, StartupError> {
    if let Some(port) = addr.strip_prefix(':') {
        let port: u16 = port
            .parse()
            .map_err(|_| StartupError::InvalidAddr(addr.to_string()))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    addr.parse()
        .map_err(|_| StartupError::InvalidAddr(addr.to_string()))
}
