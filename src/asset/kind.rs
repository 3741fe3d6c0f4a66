//! Asset categories and their output buckets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a localized asset; each has its own bucket under `assets/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "fonts")]
    Font,
    #[serde(rename = "images")]
    Image,
    #[serde(rename = "js")]
    Script,
    #[serde(rename = "css")]
    Style,
    #[serde(rename = "data")]
    Data,
}

impl Category {
    pub const ALL: [Self; 5] = [
        Self::Font,
        Self::Image,
        Self::Script,
        Self::Style,
        Self::Data,
    ];

    /// Directory name under `assets/`.
    pub const fn bucket(self) -> &'static str {
        match self {
            Self::Font => "fonts",
            Self::Image => "images",
            Self::Script => "js",
            Self::Style => "css",
            Self::Data => "data",
        }
    }

    /// Extension for files whose URL carries none.
    pub const fn default_extension(self) -> &'static str {
        match self {
            Self::Font => "woff2",
            Self::Image => "png",
            Self::Script => "js",
            Self::Style => "css",
            Self::Data => "json",
        }
    }

    /// Served with a long-lived immutable cache header.
    pub const fn is_immutable(self) -> bool {
        matches!(self, Self::Font | Self::Image | Self::Script)
    }

    /// Downloaded files of this category are scanned for nested references.
    pub const fn is_scannable(self) -> bool {
        matches!(self, Self::Script | Self::Style)
    }

    /// Category implied by a (lowercase) file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Some(match ext {
            "woff" | "woff2" | "ttf" | "otf" | "eot" => Self::Font,
            // Media shares the images bucket
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" | "ico" | "bmp" | "mp4"
            | "webm" | "mov" | "mp3" | "wav" | "ogg" => Self::Image,
            "js" | "mjs" | "cjs" => Self::Script,
            "css" => Self::Style,
            "json" | "webmanifest" | "xml" | "txt" | "wasm" | "vtt" => Self::Data,
            _ => return None,
        })
    }

    /// Extension first, the referencing context as fallback.
    pub fn classify(ext: Option<&str>, hint: Self) -> Self {
        ext.and_then(Self::from_extension).unwrap_or(hint)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bucket())
    }
}
