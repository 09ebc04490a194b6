//! Segment grammar shared by all resolvers.
//!
//! A directory entry name is classified into one of five patterns. Matching
//! precedence when several entries could accept the same URL segment is
//! literal > dynamic > catch-all; route groups never consume a segment.

/// Classification of a directory entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentPattern {
    /// Plain name, matches itself exactly
    Literal(String),
    /// `(name)` — organizational folder, transparent to the URL
    Group(String),
    /// `[name]` — consumes exactly one segment, binds it to `name`
    Dynamic(String),
    /// `[...name]` — consumes all remaining segments (at least one)
    CatchAll(String),
    /// `[[...name]]` — catch-all that also matches zero remaining segments
    OptionalCatchAll(String),
}

impl SegmentPattern {
    /// Parse a directory entry name (without extension) into a pattern.
    pub fn parse(name: &str) -> Self {
        if let Some(inner) = name.strip_prefix("[[...").and_then(|r| r.strip_suffix("]]")) {
            return Self::OptionalCatchAll(inner.to_string());
        }
        if let Some(inner) = name.strip_prefix("[...").and_then(|r| r.strip_suffix(']')) {
            return Self::CatchAll(inner.to_string());
        }
        if let Some(inner) = name.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return Self::Dynamic(inner.to_string());
        }
        if let Some(inner) = name.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            return Self::Group(inner.to_string());
        }
        Self::Literal(name.to_string())
    }

    /// The bound parameter (or literal/group) name.
    pub fn name(&self) -> &str {
        match self {
            Self::Literal(n)
            | Self::Group(n)
            | Self::Dynamic(n)
            | Self::CatchAll(n)
            | Self::OptionalCatchAll(n) => n,
        }
    }

    /// Check whether this pattern is a route group.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// Check whether this pattern consumes one or more URL segments
    /// dynamically (anything except literals and groups).
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            Self::Dynamic(_) | Self::CatchAll(_) | Self::OptionalCatchAll(_)
        )
    }

    /// Tie-break rank: lower wins when several entries accept a segment.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Literal(_) | Self::Group(_) => 0,
            Self::Dynamic(_) => 1,
            Self::CatchAll(_) => 2,
            Self::OptionalCatchAll(_) => 3,
        }
    }
}
