// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Annotated overlays — a copy of each page image with detected regions
// colour-coded by verdict (green compliant, red non-compliant, amber
// skipped), width labels, and a legend naming the threshold.

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::debug;

use doorgauge_core::types::{DoorRecord, SkipRecord};
use doorgauge_document::PageImage;

const COMPLIANT_COLOR: Rgb<u8> = Rgb([0, 170, 0]);
const NON_COMPLIANT_COLOR: Rgb<u8> = Rgb([220, 0, 0]);
const SKIPPED_COLOR: Rgb<u8> = Rgb([230, 150, 0]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([20, 20, 20]);
const LABEL_BG_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const BOX_THICKNESS: u32 = 2;
const FONT_SIZE: f32 = 18.0;

/// Load a usable system font for labels, if one exists. Overlays degrade to
/// unlabelled boxes when none is found (common in containers).
pub fn load_system_font() -> Option<FontVec> {
    let font_paths = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/opentype/noto/NotoSans-Regular.ttf",
        "/System/Library/Fonts/Helvetica.ttc",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];

    for path in &font_paths {
        if let Ok(data) = std::fs::read(path)
            && let Ok(font) = FontVec::try_from_vec(data)
        {
            debug!("Loaded annotation font from {}", path);
            return Some(font);
        }
    }

    debug!("No system font found; overlays will be unlabelled");
    None
}

/// Render the annotated copy of one page.
///
/// Every measured door gets a verdict-coloured box and (font permitting) a
/// width label; every detection-scoped skip gets an amber box so auditors can
/// see what was found but not measured.
pub fn annotate_page(
    page: &PageImage,
    doors: &[DoorRecord],
    skips: &[SkipRecord],
    min_width_mm: f64,
    font: Option<&FontVec>,
) -> RgbImage {
    let mut canvas = page.image.clone();

    for skip in skips {
        if let Some(bbox) = skip.bbox {
            draw_thick_box(
                &mut canvas,
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height,
                SKIPPED_COLOR,
            );
        }
    }

    for door in doors {
        let color = if door.compliant {
            COMPLIANT_COLOR
        } else {
            NON_COMPLIANT_COLOR
        };
        draw_thick_box(
            &mut canvas,
            door.bbox.x,
            door.bbox.y,
            door.bbox.width,
            door.bbox.height,
            color,
        );

        if let Some(font) = font {
            let label = format!("{:.0}mm", door.width_mm);
            draw_label(&mut canvas, door.bbox.x, door.bbox.y, &label, font);
        }
    }

    if let Some(font) = font {
        draw_legend(&mut canvas, min_width_mm, font);
    }

    canvas
}

/// Hollow rectangle with a visible stroke width, clamped to the canvas.
fn draw_thick_box(canvas: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    let (cw, ch) = canvas.dimensions();
    for offset in 0..BOX_THICKNESS {
        let bx = x.saturating_sub(offset);
        let by = y.saturating_sub(offset);
        let bw = (width + 2 * offset).min(cw.saturating_sub(bx));
        let bh = (height + 2 * offset).min(ch.saturating_sub(by));
        if bw == 0 || bh == 0 {
            continue;
        }
        draw_hollow_rect_mut(
            canvas,
            Rect::at(bx as i32, by as i32).of_size(bw, bh),
            color,
        );
    }
}

/// Width label just above a box, with a white backing for readability.
fn draw_label(canvas: &mut RgbImage, x: u32, y: u32, text: &str, font: &FontVec) {
    let text_y = if y > FONT_SIZE as u32 + 4 {
        y - FONT_SIZE as u32 - 4
    } else {
        y + 4
    };

    // Rough glyph advance; exact metrics are not worth a layout pass here.
    let bg_width = (text.len() as f32 * FONT_SIZE * 0.55) as u32 + 4;
    let bg_height = FONT_SIZE as u32 + 4;
    let (cw, ch) = canvas.dimensions();
    if x < cw && text_y < ch {
        draw_filled_rect_mut(
            canvas,
            Rect::at(x as i32, text_y as i32)
                .of_size(bg_width.min(cw - x), bg_height.min(ch - text_y)),
            LABEL_BG_COLOR,
        );
    }

    draw_text_mut(
        canvas,
        LABEL_TEXT_COLOR,
        x as i32 + 2,
        text_y as i32 + 2,
        PxScale::from(FONT_SIZE),
        font,
        text,
    );
}

/// Threshold and colour key in the top-left corner.
fn draw_legend(canvas: &mut RgbImage, min_width_mm: f64, font: &FontVec) {
    let entries: [(&str, Rgb<u8>); 3] = [
        ("Compliant", COMPLIANT_COLOR),
        ("Non-compliant", NON_COMPLIANT_COLOR),
        ("Skipped", SKIPPED_COLOR),
    ];

    let scale = PxScale::from(FONT_SIZE + 4.0);
    draw_text_mut(
        canvas,
        LABEL_TEXT_COLOR,
        10,
        10,
        scale,
        font,
        &format!("Min width: {min_width_mm:.0}mm"),
    );

    for (i, (label, color)) in entries.iter().enumerate() {
        let y = 10 + (i as i32 + 1) * (FONT_SIZE as i32 + 8);
        draw_text_mut(canvas, *color, 10, y, scale, font, label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorgauge_core::types::{BoundingBox, DetectionSource, ScaleSource, SkipReason};

    fn page() -> PageImage {
        PageImage {
            index: 0,
            dpi: 400,
            image: RgbImage::from_pixel(200, 200, Rgb([255u8, 255, 255])),
        }
    }

    fn door(compliant: bool) -> DoorRecord {
        DoorRecord {
            page_index: 0,
            bbox: BoundingBox::new(50, 60, 18, 40),
            width_mm: if compliant { 920.0 } else { 600.0 },
            angle_deg: None,
            compliant,
            confidence: 0.9,
            detection_source: DetectionSource::LearnedModel,
            scale_source: ScaleSource::TextRatio,
        }
    }

    #[test]
    fn compliant_box_is_green() {
        let annotated = annotate_page(&page(), &[door(true)], &[], 900.0, None);
        // Top edge of the box carries the verdict colour.
        assert_eq!(*annotated.get_pixel(55, 60), COMPLIANT_COLOR);
    }

    #[test]
    fn non_compliant_box_is_red() {
        let annotated = annotate_page(&page(), &[door(false)], &[], 900.0, None);
        assert_eq!(*annotated.get_pixel(55, 60), NON_COMPLIANT_COLOR);
    }

    #[test]
    fn skipped_detection_is_marked() {
        let skip = SkipRecord {
            page_index: 0,
            bbox: Some(BoundingBox::new(100, 100, 20, 20)),
            reason: SkipReason::LowConfidence,
        };
        let annotated = annotate_page(&page(), &[], &[skip], 900.0, None);
        assert_eq!(*annotated.get_pixel(110, 100), SKIPPED_COLOR);
    }

    #[test]
    fn page_scoped_skip_without_bbox_draws_nothing() {
        let skip = SkipRecord {
            page_index: 0,
            bbox: None,
            reason: SkipReason::ScaleUnresolved,
        };
        let annotated = annotate_page(&page(), &[], &[skip], 900.0, None);
        assert!(annotated.pixels().all(|p| *p == Rgb([255u8, 255, 255])));
    }

    #[test]
    fn original_page_is_untouched() {
        let p = page();
        let _ = annotate_page(&p, &[door(true)], &[], 900.0, None);
        assert!(p.image.pixels().all(|px| *px == Rgb([255u8, 255, 255])));
    }
}
