//! MIME type detection for the preview server and asset inventory.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    // Text
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    /// Framer ships ES modules as `.mjs`; some static hosts serve those as
    /// `application/octet-stream`, which browsers refuse to execute.
    pub const JAVASCRIPT: &str = "application/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const MANIFEST: &str = "application/manifest+json";
    pub const XML: &str = "application/xml";

    // Binary
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const WASM: &str = "application/wasm";
    pub const PDF: &str = "application/pdf";

    // Images
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const AVIF: &str = "image/avif";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    // Media
    pub const MP3: &str = "audio/mpeg";
    pub const WAV: &str = "audio/wav";
    pub const MP4: &str = "video/mp4";
    pub const WEBM: &str = "video/webm";
    pub const MOV: &str = "video/quicktime";
    pub const VTT: &str = "text/vtt; charset=utf-8";

    // Fonts
    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OTF: &str = "font/otf";
    pub const EOT: &str = "application/vnd.ms-fontobject";
}

/// Guess MIME type from file extension.
pub fn from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    from_extension(ext.as_deref())
}

/// Guess MIME type from a lowercase extension string.
pub fn from_extension(ext: Option<&str>) -> &'static str {
    match ext {
        Some("html" | "htm") => types::HTML,
        Some("css") => types::CSS,
        Some("js" | "mjs" | "cjs") => types::JAVASCRIPT,
        Some("json") => types::JSON,
        Some("webmanifest") => types::MANIFEST,
        Some("xml") => types::XML,
        Some("txt") => types::PLAIN,
        Some("vtt") => types::VTT,

        Some("svg") => types::SVG,
        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("gif") => types::GIF,
        Some("webp") => types::WEBP,
        Some("avif") => types::AVIF,
        Some("ico") => types::ICO,

        Some("mp3") => types::MP3,
        Some("wav") => types::WAV,
        Some("mp4" | "m4v") => types::MP4,
        Some("webm") => types::WEBM,
        Some("mov") => types::MOV,

        Some("woff") => types::WOFF,
        Some("woff2") => types::WOFF2,
        Some("ttf") => types::TTF,
        Some("otf") => types::OTF,
        Some("eot") => types::EOT,

        Some("pdf") => types::PDF,
        Some("wasm") => types::WASM,

        _ => types::OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_path() {
        assert_eq!(from_path(&PathBuf::from("index.html")), types::HTML);
        assert_eq!(from_path(&PathBuf::from("style.css")), types::CSS);
        assert_eq!(from_path(&PathBuf::from("app.js")), types::JAVASCRIPT);
        assert_eq!(from_path(&PathBuf::from("font.woff2")), types::WOFF2);
        assert_eq!(from_path(&PathBuf::from("photo.JPG")), types::JPEG);
        assert_eq!(from_path(&PathBuf::from("unknown.xyz")), types::OCTET_STREAM);
        assert_eq!(from_path(&PathBuf::from("noext")), types::OCTET_STREAM);
    }

    #[test]
    fn test_mjs_is_javascript() {
        assert_eq!(
            from_path(&PathBuf::from("chunk-ABC.mjs")),
            "application/javascript; charset=utf-8"
        );
    }
}
