//! Phone-stored objects and the format-code table.

use std::fmt;

/// Storage category used by the listing command (`AT+KPSL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// Wallpapers and photos.
    Pictures,
    /// Ring tones and sounds.
    Rings,
    /// vCards.
    Address,
    /// vCalendar events.
    Events,
    /// vCalendar to-dos.
    Tasks,
    /// Animated images and video clips.
    Animations,
}

impl Category {
    /// All categories, in listing order.
    pub const ALL: [Self; 6] = [
        Self::Pictures,
        Self::Rings,
        Self::Address,
        Self::Events,
        Self::Tasks,
        Self::Animations,
    ];

    /// Name used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Pictures => "PICTURES",
            Self::Rings => "RINGS",
            Self::Address => "ADDRESS",
            Self::Events => "EVENTS",
            Self::Tasks => "TASKS",
            Self::Animations => "ANIMATIONS",
        }
    }

    /// Get the category from its wire name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.wire_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One row of the format-code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementType {
    /// Format code reported by the phone (e.g. `FGIF`).
    pub code: &'static str,
    /// Conventional file extension, without the dot.
    pub extension: &'static str,
    /// Storage category.
    pub category: Category,
    /// Type-ID sent in the upload type+size stage, if the phone accepts
    /// uploads of this format.
    pub upload_id: Option<u16>,
}

const fn row(
    code: &'static str,
    extension: &'static str,
    category: Category,
    upload_id: Option<u16>,
) -> ElementType {
    ElementType {
        code,
        extension,
        category,
        upload_id,
    }
}

/// Format codes known to the firmware.
///
/// Several codes share an extension; lookups by extension return the first
/// row, so upload-capable rows come before download-only aliases.
pub const ELEMENT_TYPES: &[ElementType] = &[
    // Pictures
    row("FGIF", "gif", Category::Pictures, Some(0x0101)),
    row("FJPG", "jpg", Category::Pictures, Some(0x0102)),
    row("JPEG", "jpeg", Category::Pictures, Some(0x0102)),
    row("FBMP", "bmp", Category::Pictures, Some(0x0103)),
    row("FPNG", "png", Category::Pictures, Some(0x0104)),
    row("WBMP", "wbmp", Category::Pictures, Some(0x0105)),
    row("FSVG", "svg", Category::Pictures, Some(0x0106)),
    row("FWMF", "wmf", Category::Pictures, None),
    row("FTIF", "tif", Category::Pictures, None),
    row("FCGM", "cgm", Category::Pictures, None),
    row("FEPS", "eps", Category::Pictures, None),
    row("SPIC", "pbf", Category::Pictures, None),
    // Rings
    row("MIDI", "mid", Category::Rings, Some(0x0201)),
    row("FMID", "midi", Category::Rings, Some(0x0201)),
    row("FAMR", "amr", Category::Rings, Some(0x0202)),
    row("FWAV", "wav", Category::Rings, Some(0x0203)),
    row("IMEL", "imy", Category::Rings, Some(0x0204)),
    row("FMP3", "mp3", Category::Rings, Some(0x0205)),
    row("AIFF", "aif", Category::Rings, Some(0x0206)),
    row("SMAF", "mmf", Category::Rings, Some(0x0207)),
    row("FAAC", "aac", Category::Rings, None),
    // Address book
    row("VCRD", "vcf", Category::Address, Some(0x0301)),
    row("VCARD", "vcard", Category::Address, None),
    // Calendar
    row("VCAL", "vcs", Category::Events, Some(0x0401)),
    row("VEVENT", "ics", Category::Events, Some(0x0402)),
    row("VTODO", "vcs", Category::Tasks, Some(0x0501)),
    row("VTDO", "vtd", Category::Tasks, Some(0x0501)),
    // Animations and clips
    row("FMNG", "mng", Category::Animations, Some(0x0601)),
    row("ANIM", "agif", Category::Animations, Some(0x0602)),
    row("FMP4", "mp4", Category::Animations, Some(0x0603)),
    row("F3GP", "3gp", Category::Animations, Some(0x0604)),
    row("FWMV", "wmv", Category::Animations, None),
    row("MIDLET", "jad", Category::Animations, None),
    row("FZIP", "zip", Category::Animations, None),
    row("FGZ", "gz", Category::Animations, None),
    row("FXML", "xml", Category::Animations, None),
];

/// Look up a format code.
pub fn type_by_code(code: &str) -> Option<&'static ElementType> {
    ELEMENT_TYPES
        .iter()
        .find(|t| t.code.eq_ignore_ascii_case(code))
}

/// Look up the first row with the given extension (without the dot).
pub fn type_by_extension(extension: &str) -> Option<&'static ElementType> {
    ELEMENT_TYPES
        .iter()
        .find(|t| t.extension.eq_ignore_ascii_case(extension))
}

/// Upload type-ID for a file extension, if uploads of that format are
/// supported.
pub fn upload_type_id(extension: &str) -> Option<u16> {
    ELEMENT_TYPES
        .iter()
        .filter(|t| t.extension.eq_ignore_ascii_case(extension))
        .find_map(|t| t.upload_id)
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// An object stored on the phone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Element {
    id: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    kind: String,
    filename: String,
}

impl Element {
    /// Create an element; the filename is sanitized.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, filename: &str) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            filename: sanitize_filename(filename),
        }
    }

    /// Phone-side identifier (hex string).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Format code (e.g. `FGIF`).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Sanitized base name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Table row for this element's format code.
    pub fn element_type(&self) -> Option<&'static ElementType> {
        type_by_code(&self.kind)
    }

    /// File extension for this element's format code.
    pub fn extension(&self) -> Option<&'static str> {
        self.element_type().map(|t| t.extension)
    }

    /// File name with extension, when the format is known.
    pub fn file_name(&self) -> String {
        match self.extension() {
            Some(ext) => format!("{}.{ext}", self.filename),
            None => self.filename.clone(),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.kind, self.filename)
    }
}
