//! Request descriptors handed to the controller by its host.

use reqwest::Method;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// What the requesting page will do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation.
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    #[default]
    Other,
}

impl Destination {
    /// Guess the destination a browser would assign from the URL path.
    ///
    /// Paths without an extension, or ending in `.html`, are navigations.
    pub fn from_path(path: &str) -> Self {
        let file = path.rsplit('/').next().unwrap_or_default();
        let Some((_, ext)) = file.rsplit_once('.') else {
            return Destination::Document;
        };

        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Destination::Document,
            "js" | "mjs" => Destination::Script,
            "css" => Destination::Style,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "ico" | "avif" => Destination::Image,
            "woff" | "woff2" | "ttf" | "otf" => Destination::Font,
            "webmanifest" => Destination::Manifest,
            "json" if file == "manifest.json" => Destination::Manifest,
            _ => Destination::Other,
        }
    }
}

/// An outbound request as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
}

impl Request {
    /// A GET for a sub-resource.
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, destination: Destination::Other }
    }

    /// A top-level navigation.
    pub fn navigate(url: Url) -> Self {
        Self { method: Method::GET, url, destination: Destination::Document }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Whether this is a side-effect-free read.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }

    /// Key the response is stored under.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}
