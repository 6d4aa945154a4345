//! Camera endpoint addressing.
//!
//! Credentials are carried as query parameters on every request the camera
//! serves (`user` / `pwd`). URLs are built with `url` so nothing the operator
//! configures is spliced into a string by hand.

use anyhow::{anyhow, Context, Result};
use std::fmt;
use url::Url;

pub const DEFAULT_USER: &str = "admin";

#[derive(Clone)]
pub struct CameraEndpoint {
    base: Url,
    user: String,
    password: String,
}

impl CameraEndpoint {
    /// `address` may be a bare `host[:port]` or a full `http(s)://` URL.
    pub fn new(address: &str, user: &str, password: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(anyhow!("camera address must not be empty"));
        }
        let raw = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        let base = Url::parse(&raw).with_context(|| format!("invalid camera address {}", address))?;
        match base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported camera scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        if base.host_str().is_none() {
            return Err(anyhow!("camera address {} has no host", address));
        }
        Ok(Self {
            base,
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    /// Host (and port, if any) for log lines. Never includes credentials.
    pub fn host(&self) -> String {
        match (self.base.host_str(), self.base.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => self.base.to_string(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Authenticated URL for a camera resource such as `/snapshot.cgi`.
    pub fn resource_url(&self, path: &str) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .with_context(|| format!("invalid camera resource path {}", path))?;
        url.query_pairs_mut()
            .append_pair("user", &self.user)
            .append_pair("pwd", &self.password);
        Ok(url)
    }
}

impl fmt::Debug for CameraEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraEndpoint")
            .field("host", &self.host())
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Describe a transport failure without its request URL, whose query carries
/// the camera credentials. Only the host and path of the URL are kept.
pub(crate) fn describe_transport(transport: &ureq::Transport) -> String {
    let mut text = transport.kind().to_string();
    if let Some(url) = transport.url() {
        text = format!("{}{}: {}", url.host_str().unwrap_or(""), url.path(), text);
    }
    if let Some(message) = transport.message() {
        text.push_str(": ");
        text.push_str(message);
    }
    if let Some(source) = std::error::Error::source(transport) {
        text.push_str(": ");
        text.push_str(&source.to_string());
    }
    text
}
