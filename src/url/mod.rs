//! URL handling module
//!
//! This module provides URL normalization, crawl scope resolution, binary
//! extension filtering and private-host detection.

mod host;
mod normalize;
mod scope;

// Re-export main functions
pub use host::{is_private_host, is_private_ip, resolves_to_private_address};
pub use normalize::{normalize_url, origin_of};
pub use scope::{has_binary_extension, in_scope, scope_path};
