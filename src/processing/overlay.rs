//! Software overlay rendering.
//!
//! Burns the reconstructed input state into a frame: a translucent panel in
//! a fixed corner with the elapsed time, cursor coordinates and pressed
//! key/button labels, plus a crosshair marker at the cursor position. All
//! drawing is CPU pixel work on an owned RGB buffer, so identical inputs
//! produce bit-identical output - no randomness, no clock reads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fontdue::layout::{CoordinateSystem, GlyphRasterConfig, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use thiserror::Error;

use crate::processing::state::StateSnapshot;

const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const PANEL_COLOR: [u8; 3] = [0, 0, 0];
const MARKER_COLOR: [u8; 3] = [255, 255, 255];
const MARKER_HALO: [u8; 3] = [0, 0, 0];
/// Crosshair arm length in pixels.
const MARKER_ARM: i64 = 10;

/// Candidate TTFs probed when no explicit font is configured.
const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Errors resolving or loading the overlay font.
#[derive(Error, Debug)]
pub enum FontError {
    #[error("no usable overlay font found on this system; pass an explicit TTF path")]
    NotFound,

    #[error("failed to read font {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse font {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// An owned RGB24 pixel buffer for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 3],
        }
    }

    /// Wrap raw RGB24 bytes as produced by the decoder.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize * 3,
            "pixel buffer size does not match {width}x{height} RGB24"
        );
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Blend `color` over the pixel at (x, y); out-of-bounds is a no-op.
    pub(crate) fn blend_pixel(&mut self, x: i64, y: i64, color: [u8; 3], alpha: u8) {
        if alpha == 0 || x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height)
        {
            return;
        }
        let index = (y as usize * self.width as usize + x as usize) * 3;
        let alpha = u16::from(alpha);
        let inverse = 255 - alpha;
        for channel in 0..3 {
            let src = u16::from(color[channel]);
            let dst = u16::from(self.data[index + channel]);
            self.data[index + channel] = ((src * alpha + dst * inverse + 127) / 255) as u8;
        }
    }

    /// Blend a filled rectangle; clipped to the frame bounds.
    pub(crate) fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: [u8; 3], alpha: u8) {
        for row in y..y + h {
            for col in x..x + w {
                self.blend_pixel(col, row, color, alpha);
            }
        }
    }
}

/// Overlay layout knobs.
///
/// Placement is rendering policy, not correctness: the panel stays in a
/// fixed corner so it occludes as little of the content under test as
/// possible, and these defaults can be moved without affecting the
/// reconstruction.
#[derive(Debug, Clone)]
pub struct OverlayOptions {
    /// Panel text origin, from the top-left corner.
    pub margin_x: u32,
    pub margin_y: u32,
    /// Backing rectangle padding around the text block.
    pub padding: u32,
    pub font_size: f32,
    /// Opacity of the backing rectangle (255 = opaque).
    pub panel_alpha: u8,
    /// Explicit TTF to render with; falls back to a platform search list.
    pub font_path: Option<PathBuf>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            margin_x: 20,
            margin_y: 20,
            padding: 10,
            font_size: 28.0,
            panel_alpha: 150,
            font_path: None,
        }
    }
}

struct GlyphBitmap {
    width: usize,
    height: usize,
    coverage: Vec<u8>,
}

/// Draws state snapshots onto frames.
///
/// Holds the rasterized-glyph cache across frames; rendering output depends
/// only on the frame pixels, the snapshot and the timestamp.
pub struct OverlayRenderer {
    font: Font,
    options: OverlayOptions,
    line_height: u32,
    glyph_cache: HashMap<GlyphRasterConfig, GlyphBitmap>,
}

impl OverlayRenderer {
    pub fn new(options: OverlayOptions) -> Result<Self, FontError> {
        let path = resolve_font_path(options.font_path.as_deref())?;
        let bytes = std::fs::read(&path).map_err(|source| FontError::Io {
            path: path.clone(),
            source,
        })?;
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|reason| {
            FontError::Parse {
                path: path.clone(),
                reason: reason.to_string(),
            }
        })?;
        let line_height = (options.font_size * 1.45).round().max(1.0) as u32;

        tracing::debug!(font = %path.display(), "overlay font loaded");

        Ok(Self {
            font,
            options,
            line_height,
            glyph_cache: HashMap::new(),
        })
    }

    /// Composite the snapshot for `timestamp` onto `frame`.
    ///
    /// Mutates the frame in place; never touches the event logs.
    pub fn render(&mut self, frame: &mut FrameBuffer, snapshot: &StateSnapshot, timestamp: f64) {
        let lines = overlay_lines(snapshot, timestamp);

        let x0 = i64::from(self.options.margin_x);
        let y0 = i64::from(self.options.margin_y);
        let pad = i64::from(self.options.padding);
        let text_width = lines
            .iter()
            .map(|line| i64::from(self.line_width(line)))
            .max()
            .unwrap_or(0);
        let text_height = lines.len() as i64 * i64::from(self.line_height);

        frame.fill_rect(
            x0 - pad,
            y0 - pad,
            text_width + 2 * pad,
            text_height + 2 * pad,
            PANEL_COLOR,
            self.options.panel_alpha,
        );

        for (index, line) in lines.iter().enumerate() {
            let line_y = y0 + index as i64 * i64::from(self.line_height);
            self.draw_line(frame, x0, line_y, line);
        }

        if let Some((x, y)) = snapshot.cursor {
            draw_marker(frame, x, y);
        }
    }

    fn draw_line(&mut self, frame: &mut FrameBuffer, x: i64, y: i64, text: &str) {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: x as f32,
            y: y as f32,
            ..LayoutSettings::default()
        });
        layout.append(&[&self.font], &TextStyle::new(text, self.options.font_size, 0));

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let bitmap = self.glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (metrics, coverage) = self.font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: metrics.width,
                    height: metrics.height,
                    coverage,
                }
            });

            let glyph_x = glyph.x.round() as i64;
            let glyph_y = glyph.y.round() as i64;
            for row in 0..bitmap.height {
                for col in 0..bitmap.width {
                    let alpha = bitmap.coverage[row * bitmap.width + col];
                    frame.blend_pixel(glyph_x + col as i64, glyph_y + row as i64, TEXT_COLOR, alpha);
                }
            }
        }
    }

    fn line_width(&self, text: &str) -> u32 {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[&self.font], &TextStyle::new(text, self.options.font_size, 0));
        layout
            .glyphs()
            .iter()
            .map(|glyph| (glyph.x + glyph.width as f32).ceil() as u32)
            .max()
            .unwrap_or(0)
    }
}

/// The panel text lines, in draw order.
///
/// The panel always has the same four lines so its size stays stable while
/// keys come and go.
fn overlay_lines(snapshot: &StateSnapshot, timestamp: f64) -> Vec<String> {
    let cursor = match snapshot.cursor {
        Some((x, y)) => format!("MOUSE: ({}, {})", x.round() as i64, y.round() as i64),
        None => "MOUSE: unknown".to_string(),
    };
    vec![
        format!("TIME: {timestamp:.2} sec"),
        cursor,
        format!("KEYS: {}", join_or_dash(&snapshot.pressed_keys)),
        format!("BTNS: {}", join_or_dash(&snapshot.pressed_buttons)),
    ]
}

fn join_or_dash(labels: &std::collections::BTreeSet<String>) -> String {
    if labels.is_empty() {
        return "-".to_string();
    }
    labels.iter().cloned().collect::<Vec<_>>().join(" ")
}

/// Pick the TTF to render with: the explicit path when configured, the
/// first hit from the platform search list otherwise.
fn resolve_font_path(explicit: Option<&Path>) -> Result<PathBuf, FontError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(FontError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "font file does not exist"),
        });
    }
    FONT_SEARCH_PATHS
        .iter()
        .map(Path::new)
        .find(|candidate| candidate.is_file())
        .map(Path::to_path_buf)
        .ok_or(FontError::NotFound)
}

/// Crosshair at the cursor position: a dark halo under light arms so the
/// marker stays visible over any content.
fn draw_marker(frame: &mut FrameBuffer, x: f64, y: f64) {
    let cx = x.round() as i64;
    let cy = y.round() as i64;

    for d in -(MARKER_ARM + 1)..=(MARKER_ARM + 1) {
        for off in -1..=1 {
            frame.blend_pixel(cx + d, cy + off, MARKER_HALO, 255);
            frame.blend_pixel(cx + off, cy + d, MARKER_HALO, 255);
        }
    }
    for d in -MARKER_ARM..=MARKER_ARM {
        frame.blend_pixel(cx + d, cy, MARKER_COLOR, 255);
        frame.blend_pixel(cx, cy + d, MARKER_COLOR, 255);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn snapshot(cursor: Option<(f64, f64)>, keys: &[&str], buttons: &[&str]) -> StateSnapshot {
        StateSnapshot {
            cursor,
            pressed_keys: keys.iter().map(|k| k.to_string()).collect::<BTreeSet<_>>(),
            pressed_buttons: buttons
                .iter()
                .map(|b| b.to_string())
                .collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn lines_show_time_cursor_and_pressed_labels() {
        let lines = overlay_lines(
            &snapshot(Some((123.4, 56.6)), &["a", "shift_left"], &["left"]),
            1.5,
        );
        assert_eq!(lines[0], "TIME: 1.50 sec");
        assert_eq!(lines[1], "MOUSE: (123, 57)");
        assert_eq!(lines[2], "KEYS: a shift_left");
        assert_eq!(lines[3], "BTNS: left");
    }

    #[test]
    fn unset_state_renders_placeholders() {
        let lines = overlay_lines(&snapshot(None, &[], &[]), 0.0);
        assert_eq!(lines[0], "TIME: 0.00 sec");
        assert_eq!(lines[1], "MOUSE: unknown");
        assert_eq!(lines[2], "KEYS: -");
        assert_eq!(lines[3], "BTNS: -");
    }

    #[test]
    fn blend_is_deterministic() {
        let mut first = FrameBuffer::new(16, 16);
        let mut second = FrameBuffer::new(16, 16);
        for frame in [&mut first, &mut second] {
            frame.fill_rect(2, 2, 10, 10, [0, 0, 0], 150);
            draw_marker(frame, 8.0, 8.0);
        }
        assert_eq!(first, second);
    }

    #[test]
    fn blend_alpha_mixes_toward_source() {
        let mut frame = FrameBuffer::new(1, 1);
        frame.blend_pixel(0, 0, [255, 255, 255], 255);
        assert_eq!(&frame.data()[0..3], &[255, 255, 255]);

        let mut frame = FrameBuffer::new(1, 1);
        frame.blend_pixel(0, 0, [255, 255, 255], 128);
        let value = frame.data()[0];
        assert!((127..=129).contains(&value), "got {value}");
    }

    #[test]
    fn drawing_out_of_bounds_is_a_no_op() {
        let mut frame = FrameBuffer::new(8, 8);
        let before = frame.clone();
        frame.blend_pixel(-1, 0, [255, 0, 0], 255);
        frame.blend_pixel(0, 8, [255, 0, 0], 255);
        draw_marker(&mut frame, -100.0, -100.0);
        assert_eq!(frame, before);
    }

    #[test]
    fn marker_near_edge_is_clipped_not_panicking() {
        let mut frame = FrameBuffer::new(8, 8);
        draw_marker(&mut frame, 0.0, 0.0);
        draw_marker(&mut frame, 7.0, 7.0);
        // Center pixel of the first marker is lit.
        assert_eq!(&frame.data()[0..3], &[255, 255, 255]);
    }

    #[test]
    fn from_raw_round_trips_data() {
        let data = vec![7u8; 4 * 2 * 3];
        let frame = FrameBuffer::from_raw(4, 2, data.clone());
        assert_eq!(frame.data(), &data[..]);
    }
}
