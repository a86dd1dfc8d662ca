//! Banner grabbing for freshly connected TCP streams.
//!
//! Reads whatever a service volunteers right after the handshake. Nothing
//! is sent to elicit a response.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Maximum bytes read for a banner.
pub const MAX_BANNER_SIZE: usize = 1024;

/// Read an initial banner from `stream` within `wait`.
///
/// Returns `None` when the service sends nothing in time, closes the
/// connection, errors, or sends only whitespace/control noise.
pub async fn read_banner<S>(stream: &mut S, wait: Duration) -> Option<String>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; MAX_BANNER_SIZE];

    match timeout(wait, stream.read(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => {
            let banner = sanitize_banner(&buffer[..n]);
            (!banner.is_empty()).then_some(banner)
        }
        _ => None,
    }
}

/// Replace non-printable bytes and collapse whitespace.
///
/// Line breaks and tabs become spaces, other control or non-ASCII bytes
/// become '.', runs of spaces collapse to one and the ends are trimmed.
pub fn sanitize_banner(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len());
    let mut prev_space = true;

    for &b in data.iter().take(MAX_BANNER_SIZE) {
        let c = match b {
            b'\r' | b'\n' | b'\t' | b' ' => ' ',
            _ if b.is_ascii_graphic() => b as char,
            _ => '.',
        };

        if c == ' ' {
            if !prev_space {
                result.push(c);
            }
            prev_space = true;
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.truncate(result.trim_end().len());
    result
}
