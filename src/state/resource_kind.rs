//! Content classification for archived resources

use std::fmt;

/// The closed set of kinds an archived resource can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Html,
    Css,
    Js,
    Image,
    Video,
    Font,
    Other,
}

impl ResourceKind {
    /// Every kind, in display order
    pub const ALL: [ResourceKind; 7] = [
        Self::Html,
        Self::Css,
        Self::Js,
        Self::Image,
        Self::Video,
        Self::Font,
        Self::Other,
    ];

    /// Maps a declared `Content-Type` header value to a resource kind
    ///
    /// Only the media type before any `;` parameter is considered, compared
    /// case-insensitively. Anything unrecognized, including a missing header,
    /// maps to [`ResourceKind::Other`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rewind::ResourceKind;
    ///
    /// assert_eq!(ResourceKind::classify(Some("text/html; charset=utf-8")), ResourceKind::Html);
    /// assert_eq!(ResourceKind::classify(Some("image/webp")), ResourceKind::Image);
    /// assert_eq!(ResourceKind::classify(None), ResourceKind::Other);
    /// ```
    pub fn classify(content_type: Option<&str>) -> Self {
        let media_type = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let (top, sub) = media_type.split_once('/').unwrap_or((media_type.as_str(), ""));

        match (top, sub) {
            ("text", sub) if sub.starts_with("html") => Self::Html,
            ("text", sub) if sub.starts_with("css") => Self::Css,
            (_, "javascript" | "x-javascript" | "ecmascript") => Self::Js,
            ("image", sub) if !sub.is_empty() => Self::Image,
            ("video", sub) if !sub.is_empty() => Self::Video,
            ("font", sub) if !sub.is_empty() => Self::Font,
            ("application", sub) if sub.starts_with("font") || sub.starts_with("x-font") => {
                Self::Font
            }
            _ => Self::Other,
        }
    }

    /// Returns true if links should be extracted from resources of this kind
    pub fn has_links(&self) -> bool {
        matches!(self, Self::Html | Self::Css)
    }

    /// Converts the kind to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Js => "js",
            Self::Image => "image",
            Self::Video => "video",
            Self::Font => "font",
            Self::Other => "other",
        }
    }

    /// Parses a kind from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "html" => Some(Self::Html),
            "css" => Some(Self::Css),
            "js" => Some(Self::Js),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "font" => Some(Self::Font),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
