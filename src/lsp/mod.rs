//! Language-analysis layer: JSON-RPC transport to language servers, the
//! per-language connection pool, the session document cache and symbol
//! navigation on top of them.

pub mod client;
pub mod documents;
pub mod navigation;
pub mod pool;

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

pub use client::LspConnection;
pub use documents::{number_lines, Document, DocumentCache};
pub use navigation::{NavigationKind, NavigationRequest, NavigationResolver};
pub use pool::ConnectionPool;

use crate::error::{InvestigatorError, Result};

const FILE_SCHEME: &str = "file://";

/// `file://` URI for an absolute path, percent-encoding anything outside the
/// path-safe set.
pub fn path_to_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut uri = String::with_capacity(FILE_SCHEME.len() + raw.len());
    uri.push_str(FILE_SCHEME);
    for byte in raw.bytes() {
        let keep = byte.is_ascii_alphanumeric() || b"-._~/!$&'()*+,;=:@".contains(&byte);
        if keep {
            uri.push(byte as char);
        } else {
            uri.push_str(&format!("%{:02X}", byte));
        }
    }
    uri
}

/// Inverse of [`path_to_uri`]; `None` for non-file URIs.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let encoded = uri.strip_prefix(FILE_SCHEME)?;
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let (high, low) = (bytes[i + 1], bytes[i + 2]);
            if !high.is_ascii_hexdigit() || !low.is_ascii_hexdigit() {
                return None;
            }
            decoded.push((hex_value(high) << 4) | hex_value(low));
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok().map(PathBuf::from)
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

/// Drop `.` and fold `..` into its parent without touching the filesystem.
/// `..` at the root stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

pub(crate) fn parse_uri(uri: &str) -> Result<lsp_types::Uri> {
    lsp_types::Uri::from_str(uri)
        .map_err(|e| InvestigatorError::Lsp(format!("invalid uri '{}': {}", uri, e)))
}
