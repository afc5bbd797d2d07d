//! Resource accessor.
//!
//! Stateless helpers the engine calls on demand: resolving a logical resource
//! name to a decoded bitmap, and measuring a block of text. Names beginning
//! with [`ASSET_PREFIX`] live in the bundled-asset namespace supplied by the
//! host; all other names are filesystem paths. Failures surface as
//! [`ResourceError::NotFound`] sentinels; the engine decides whether that is
//! fatal to the current draw.

use std::io::Cursor;

use parley::style::{FontFamily, FontStack, GenericFamily, StyleProperty};
use parley::{FontContext, Layout, LayoutContext};

/// Reserved prefix for the bundled-asset namespace.
pub const ASSET_PREFIX: &str = "assets/";

/// Host-supplied access to the bundled asset namespace.
pub trait AssetSource {
    /// Read a bundled asset by its path relative to the asset root.
    fn open(&self, path: &str) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// The name did not resolve to a decodable resource. Covers missing
    /// files, missing assets, and decode failures alike.
    #[error("resource not found")]
    NotFound,
}

/// Decoded bitmap in RGBA8, same type for both namespaces.
pub struct ImageHandle {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl ImageHandle {
    pub fn from_raw(pixels: Vec<u8>, width: u32, height: u32, stride: u32) -> Self {
        assert!(
            pixels.len() >= (height as usize) * (stride as usize),
            "pixel buffer too small for image dimensions"
        );
        Self {
            pixels,
            width,
            height,
            stride,
        }
    }
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}

/// Resolve `name` to a decoded bitmap.
///
/// `assets/foo.png` reads `foo.png` from the host asset bundle; any other
/// name is a filesystem path. Both paths return the same handle type.
pub fn resolve_image(assets: &dyn AssetSource, name: &str) -> Result<ImageHandle, ResourceError> {
    let bytes = match name.strip_prefix(ASSET_PREFIX) {
        Some(rel) => assets.open(rel).ok_or_else(|| {
            log::debug!("asset '{}' not found", rel);
            ResourceError::NotFound
        })?,
        None => std::fs::read(name).map_err(|e| {
            log::debug!("file '{}' unreadable: {}", name, e);
            ResourceError::NotFound
        })?,
    };

    decode_png(&bytes).map_err(|e| {
        log::debug!("'{}' failed to decode: {}", name, e);
        ResourceError::NotFound
    })
}

/// Decode a PNG into RGBA8. Palette, grayscale, and 16-bit inputs are
/// expanded; the output stride is always `width * 4`.
fn decode_png(bytes: &[u8]) -> Result<ImageHandle, png::DecodingError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);

    let mut reader = decoder.read_info()?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    buf.truncate(info.buffer_size());

    let (width, height) = (info.width, info.height);
    let pixels = match info.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => buf
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 0xff])
            .collect(),
        png::ColorType::GrayscaleAlpha => buf
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 0xff]).collect(),
        // EXPAND resolves palettes to RGB; anything else is unexpected.
        png::ColorType::Indexed => {
            return Err(png::DecodingError::LimitsExceeded);
        }
    };

    Ok(ImageHandle::from_raw(pixels, width, height, width * 4))
}

/// Style inputs for text measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Font family name; the platform sans-serif when absent.
    pub font_family: Option<String>,
    /// Font size in pixels.
    pub font_size: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 14.0,
        }
    }
}

/// A measured text layout handle.
pub struct TextLayout {
    layout: Layout<[u8; 4]>,
}

impl TextLayout {
    /// Measured size of the laid-out block in pixels.
    pub fn size(&self) -> (f32, f32) {
        (self.layout.width(), self.layout.height())
    }

    pub fn line_count(&self) -> usize {
        self.layout.lines().count()
    }
}

impl std::fmt::Debug for TextLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (w, h) = self.size();
        f.debug_struct("TextLayout")
            .field("width", &w)
            .field("height", &h)
            .field("lines", &self.line_count())
            .finish()
    }
}

/// Text shaping contexts, reused across layout calls.
///
/// Font discovery is the expensive part; the shaper keeps one `FontContext`
/// and one `LayoutContext` alive the way the renderer keeps its shaping
/// contexts between frames.
pub struct TextShaper {
    font_cx: FontContext,
    layout_cx: LayoutContext<[u8; 4]>,
}

impl Default for TextShaper {
    fn default() -> Self {
        Self::new()
    }
}

impl TextShaper {
    pub fn new() -> Self {
        Self {
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
        }
    }

    /// Lay out `text` wrapped to `max_width` pixels (unbounded when `None`
    /// or zero).
    pub fn layout(&mut self, text: &str, max_width: Option<u32>, style: &TextStyle) -> TextLayout {
        let mut builder = self.layout_cx.ranged_builder(&mut self.font_cx, text, 1.0, true);
        builder.push_default(StyleProperty::FontSize(style.font_size));
        let family = match &style.font_family {
            Some(name) => FontFamily::Named(name.clone().into()),
            None => FontFamily::Generic(GenericFamily::SansSerif),
        };
        builder.push_default(StyleProperty::FontStack(FontStack::Single(family)));

        let mut layout = builder.build(text);
        match max_width {
            Some(w) if w > 0 => layout.break_all_lines(Some(w as f32)),
            _ => layout.break_all_lines(Some(f32::INFINITY)),
        }

        TextLayout { layout }
    }
}

/// Resolve a text layout for `text` constrained to `max_width`.
pub fn resolve_text_layout(
    shaper: &mut TextShaper,
    text: &str,
    max_width: Option<u32>,
    style: &TextStyle,
) -> TextLayout {
    shaper.layout(text, max_width, style)
}
