//! CSS media list support.
//!
//! A stylesheet reference may be restricted to a set of CSS media. The
//! media list takes part in bundling compatibility and is persisted in the
//! bundle catalog by medium name.

use std::fmt;

use serde::Serialize;

/// A single CSS medium, as used in `<link media="...">`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CssMedium {
    All,
    Aural,
    Braille,
    Embossed,
    Handheld,
    Print,
    Projection,
    Screen,
    Speech,
    Tty,
    Tv,
}

impl CssMedium {
    /// The medium name as stored in the catalog and rendered in markup.
    pub fn name(&self) -> &'static str {
        match self {
            CssMedium::All => "all",
            CssMedium::Aural => "aural",
            CssMedium::Braille => "braille",
            CssMedium::Embossed => "embossed",
            CssMedium::Handheld => "handheld",
            CssMedium::Print => "print",
            CssMedium::Projection => "projection",
            CssMedium::Screen => "screen",
            CssMedium::Speech => "speech",
            CssMedium::Tty => "tty",
            CssMedium::Tv => "tv",
        }
    }

    /// Resolve a medium by name. Returns `None` for unknown names — the
    /// catalog treats that as data corruption, not as a soft skip.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(CssMedium::All),
            "aural" => Some(CssMedium::Aural),
            "braille" => Some(CssMedium::Braille),
            "embossed" => Some(CssMedium::Embossed),
            "handheld" => Some(CssMedium::Handheld),
            "print" => Some(CssMedium::Print),
            "projection" => Some(CssMedium::Projection),
            "screen" => Some(CssMedium::Screen),
            "speech" => Some(CssMedium::Speech),
            "tty" => Some(CssMedium::Tty),
            "tv" => Some(CssMedium::Tv),
            _ => None,
        }
    }
}

impl fmt::Display for CssMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered, duplicate-free list of CSS media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MediaList {
    media: Vec<CssMedium>,
}

impl MediaList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from the given media, preserving order and dropping
    /// duplicates.
    pub fn from_media<I: IntoIterator<Item = CssMedium>>(media: I) -> Self {
        let mut list = Self::new();
        for medium in media {
            list.push(medium);
        }
        list
    }

    /// Append a medium unless it is already present.
    pub fn push(&mut self, medium: CssMedium) {
        if !self.media.contains(&medium) {
            self.media.push(medium);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }

    pub fn len(&self) -> usize {
        self.media.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CssMedium> {
        self.media.iter()
    }

    /// Medium names in order, for catalog persistence and markup.
    pub fn names(&self) -> Vec<&'static str> {
        self.media.iter().map(CssMedium::name).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
