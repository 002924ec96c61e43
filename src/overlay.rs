//! Mapping match rectangles from page pixels to display pixels, and drawing
//! them.

use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::pdf::{PageSize, Rect};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HighlightStyle {
    pub color: [u8; 4],
    pub corner_radius: f32,
}

impl HighlightStyle {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            color: settings.highlight_color,
            corner_radius: settings.highlight_corner_radius,
        }
    }
}

/// A rectangle ready to draw, in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Highlight {
    pub rect: Rect,
    pub color: [u8; 4],
    pub corner_radius: f32,
}

/// Scale `rect` from page space to display space.
pub fn scale_rect(rect: &Rect, page: PageSize, display: PageSize) -> Rect {
    rect.scale(display.width / page.width, display.height / page.height)
}

/// Display size of a page stretched to `width` with its aspect ratio kept.
pub fn display_size_for_width(page: PageSize, width: f32) -> PageSize {
    PageSize::new(width, width * page.height / page.width)
}

pub fn highlights_for(
    rects: &[Rect],
    page: PageSize,
    display: PageSize,
    style: HighlightStyle,
) -> Vec<Highlight> {
    rects
        .iter()
        .map(|rect| Highlight {
            rect: scale_rect(rect, page, display),
            color: style.color,
            corner_radius: style.corner_radius,
        })
        .collect()
}

/// Whether pixel centre (x, y) falls inside the rounded rectangle.
fn inside_rounded(rect: &Rect, radius: f32, x: f32, y: f32) -> bool {
    if x < rect.left || x >= rect.right || y < rect.top || y >= rect.bottom {
        return false;
    }

    let r = radius.min(rect.width() / 2.0).min(rect.height() / 2.0).max(0.0);
    let cx = x.clamp(rect.left + r, rect.right - r);
    let cy = y.clamp(rect.top + r, rect.bottom - r);
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= r * r
}

fn blend(dst: &mut Rgba<u8>, src: [u8; 4]) {
    let alpha = src[3] as f32 / 255.0;
    for channel in 0..3 {
        let mixed = src[channel] as f32 * alpha + dst[channel] as f32 * (1.0 - alpha);
        dst[channel] = mixed.round() as u8;
    }
    dst[3] = dst[3].max(src[3]);
}

/// Alpha-blend `highlights` onto `image`. Rectangles are clipped to the image.
pub fn draw_highlights(image: &mut RgbaImage, highlights: &[Highlight]) {
    let (width, height) = image.dimensions();

    for highlight in highlights {
        let rect = &highlight.rect;
        let x0 = rect.left.floor().max(0.0) as u32;
        let y0 = rect.top.floor().max(0.0) as u32;
        let x1 = (rect.right.ceil().max(0.0) as u32).min(width);
        let y1 = (rect.bottom.ceil().max(0.0) as u32).min(height);

        for y in y0..y1 {
            for x in x0..x1 {
                if inside_rounded(rect, highlight.corner_radius, x as f32 + 0.5, y as f32 + 0.5) {
                    blend(image.get_pixel_mut(x, y), highlight.color);
                }
            }
        }
    }
}
