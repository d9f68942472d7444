//! Frame annotator.
//!
//! Draws a rectangle and a `label (0.93)` caption for every reported object
//! onto a working copy of the frame. Captions use the bundled DejaVu Sans
//! unless another TrueType/OpenType font is supplied.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use vigil_models::AggregatedObject;

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// DejaVu Sans, shipped so captions render without any configuration.
static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Drawing parameters.
#[derive(Debug, Clone)]
pub struct AnnotatorConfig {
    /// Box and caption colour
    pub color: [u8; 3],
    /// Box outline thickness in pixels
    pub thickness: u32,
    /// Caption height in pixels
    pub font_scale: f32,
    /// Gap between caption and box top
    pub caption_offset: i32,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            color: [0, 255, 0],
            thickness: 2,
            font_scale: 16.0,
            caption_offset: 4,
        }
    }
}

/// Draws detection overlays.
#[derive(Clone)]
pub struct Annotator {
    config: AnnotatorConfig,
    font: Option<FontArc>,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("config", &self.config)
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(AnnotatorConfig::default())
    }
}

impl Annotator {
    /// Create an annotator captioning with the bundled font.
    pub fn new(config: AnnotatorConfig) -> Self {
        let font = match FontArc::try_from_slice(BUNDLED_FONT) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Bundled annotation font failed to load, captions disabled: {}", e);
                None
            }
        };
        Self { config, font }
    }

    /// Create an annotator that draws boxes only.
    pub fn boxes_only(config: AnnotatorConfig) -> Self {
        Self { config, font: None }
    }

    /// Replace the caption font.
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Load the caption font from a TTF/OTF file.
    pub fn with_font_file(self, path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FontNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| MediaError::InvalidFont(e.to_string()))?;
        debug!(path = %path.display(), "Loaded annotation font");
        Ok(self.with_font(font))
    }

    /// Whether captions will be rendered.
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Caption text for an object.
    pub fn caption(object: &AggregatedObject) -> String {
        format!("{} ({:.2})", object.label, object.best_confidence)
    }

    /// Annotate a copy of the frame. The frame itself is left untouched.
    pub fn annotate(&self, frame: &Frame, objects: &[AggregatedObject]) -> RgbImage {
        let mut canvas = frame.working_copy();
        self.draw(&mut canvas, objects);
        canvas
    }

    /// Draw overlays in place. Boxes are clipped to the canvas; boxes lying
    /// entirely outside it are skipped.
    pub fn draw(&self, canvas: &mut RgbImage, objects: &[AggregatedObject]) {
        let color = Rgb(self.config.color);
        let (canvas_w, canvas_h) = canvas.dimensions();

        for object in objects {
            let bbox = &object.bbox;
            let x1 = i64::from(bbox.x1()).max(0);
            let y1 = i64::from(bbox.y1()).max(0);
            let x2 = i64::from(bbox.x2()).min(i64::from(canvas_w));
            let y2 = i64::from(bbox.y2()).min(i64::from(canvas_h));
            if x1 >= x2 || y1 >= y2 {
                continue;
            }
            // Clipped extents fit the canvas, so they fit u32 and i32
            let (x1, y1) = (x1 as i32, y1 as i32);
            let (width, height) = ((x2 - i64::from(x1)) as u32, (y2 - i64::from(y1)) as u32);

            for inset in 0..self.config.thickness {
                let shrink = 2 * inset;
                if width <= shrink || height <= shrink {
                    break;
                }
                let rect = Rect::at(x1 + inset as i32, y1 + inset as i32).of_size(width - shrink, height - shrink);
                draw_hollow_rect_mut(canvas, rect, color);
            }

            if let Some(font) = &self.font {
                let scale = PxScale::from(self.config.font_scale);
                let text = Self::caption(object);
                let (_, text_h) = text_size(scale, font, &text);
                let y = (y1 - self.config.caption_offset - text_h as i32).max(0);
                draw_text_mut(canvas, color, x1, y, scale, font, &text);
            }
        }
    }
}
