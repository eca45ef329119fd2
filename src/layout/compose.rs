//! Layout engine: photo + category + title -> cover art raster

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use tracing::warn;

use super::text::fit;
use super::{Color, FontFace, LayoutAssets, LayoutSpec, LayoutWarning};

/// Result of composing one piece of cover art
#[derive(Debug, Clone)]
pub struct Composition {
    pub image: RgbaImage,
    /// Asset warnings plus anything degraded during this composition
    pub warnings: Vec<LayoutWarning>,
}

impl Composition {
    /// Flatten to RGB for JPEG output
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        DynamicImage::ImageRgba8(self.image.clone()).to_rgb8()
    }

    /// Write as JPEG at `quality` (1-100)
    pub fn save_jpeg(&self, path: &Path, quality: u8) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.to_rgb()
            .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
            .with_context(|| format!("Failed to encode {}", path.display()))?;
        writer.flush()?;
        Ok(())
    }
}

/// Compose the fixed template
///
/// Pure and deterministic: the same inputs always produce the same pixels.
/// A missing `photo` paints the fallback panel; missing fonts or logo in
/// `assets` omit those elements.
pub fn compose(
    spec: &LayoutSpec,
    assets: &LayoutAssets,
    photo: Option<&DynamicImage>,
    title: &str,
    category: &str,
) -> Composition {
    let mut warnings = assets.warnings.clone();
    let mut canvas = RgbaImage::from_pixel(spec.width, spec.height, rgba(spec.background));

    // 1) Photo region
    match photo {
        Some(photo) => {
            let cover = cover_fit(&flatten_on_white(photo), spec.width, spec.photo.height);
            let cover = DynamicImage::ImageRgb8(cover).to_rgba8();
            imageops::replace(&mut canvas, &cover, 0, i64::from(spec.photo.top));
        }
        None => {
            warn!("{}", LayoutWarning::PhotoMissing);
            warnings.push(LayoutWarning::PhotoMissing);
            fill_rect(
                &mut canvas,
                0,
                spec.photo.top as i32,
                spec.width,
                spec.photo.height,
                spec.photo.fallback_color,
            );
        }
    }

    // 2) Category band
    let band = &spec.category;
    fill_rect(&mut canvas, 0, band.y as i32, spec.width, band.height, band.color);
    if let Some(font) = &assets.category_font {
        let label = category.to_uppercase();
        let b = font.bounds(&label);
        let x = (spec.width as i32 - b.width as i32) / 2 - b.left;
        let y = band.y as i32 + (band.height as i32 - b.height as i32) / 2 - b.top;
        font.draw(&mut canvas, x, y, &label, band.text_color);
    }

    // 3) Logo
    if let Some(logo) = &assets.logo {
        let x = (i64::from(spec.width) - i64::from(logo.width())) / 2;
        imageops::overlay(&mut canvas, logo, x, i64::from(spec.logo.y));
    }

    // 4) Title box
    let tb = &spec.title;
    let box_x = tb.margin_x as i32;
    let box_w = spec.width.saturating_sub(tb.margin_x * 2);
    draw_rounded_rect(
        &mut canvas,
        box_x,
        tb.y as i32,
        box_w,
        tb.height,
        tb.radius,
        tb.fill,
    );
    if let Some(font) = &assets.title_font {
        draw_title(&mut canvas, font, spec, box_x, box_w, title);
    }

    // 5) Footer handle
    if let Some(font) = &assets.handle_font {
        let handle = &spec.handle;
        let b = font.bounds(&handle.text);
        let x = (spec.width as i32 - b.width as i32) / 2 - b.left;
        font.draw(&mut canvas, x, handle.y as i32, &handle.text, handle.color);
    }

    Composition {
        image: canvas,
        warnings,
    }
}

/// Wrap the title into the box and center the block both ways
fn draw_title(
    canvas: &mut RgbaImage,
    font: &FontFace,
    spec: &LayoutSpec,
    box_x: i32,
    box_w: u32,
    title: &str,
) {
    let tb = &spec.title;
    let line_h = font.line_height(tb.leading).max(1);
    let max_lines = (tb.height / line_h).max(1) as usize;
    let max_width = box_w.saturating_sub(tb.padding_x * 2);

    let lines = fit(title.trim(), font, max_width, max_lines, &tb.ellipsis);
    let block_h = (line_h as usize * lines.len()) as i32;
    let mut cur_y = tb.y as i32 + (tb.height as i32 - block_h) / 2;

    for line in &lines {
        let b = font.bounds(line);
        let x = box_x + (box_w as i32 - b.width as i32) / 2 - b.left;
        font.draw(canvas, x, cur_y, line, tb.text_color);
        cur_y += line_h as i32;
    }
}

/// Scale factor that makes `src` fully cover `target`: the smallest scale
/// for which both dimensions reach the target
#[must_use]
pub fn cover_scale(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> f64 {
    f64::max(
        f64::from(target_w) / f64::from(src_w),
        f64::from(target_h) / f64::from(src_h),
    )
}

/// Intermediate size after cover scaling, never smaller than the target
#[must_use]
pub fn cover_dimensions(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    let scale = cover_scale(src_w, src_h, target_w, target_h);
    let w = (f64::from(src_w) * scale).round() as u32;
    let h = (f64::from(src_h) * scale).round() as u32;
    (w.max(target_w), h.max(target_h))
}

/// Cover-fit: scale to cover, then center-crop to exactly `target_w x target_h`
///
/// Overflow is cropped symmetrically; the region is never letterboxed.
#[must_use]
pub fn cover_fit(src: &RgbImage, target_w: u32, target_h: u32) -> RgbImage {
    let (src_w, src_h) = src.dimensions();
    if target_w == 0 || target_h == 0 {
        return RgbImage::new(target_w, target_h);
    }
    if src_w == 0 || src_h == 0 {
        return RgbImage::new(target_w, target_h);
    }

    let (scaled_w, scaled_h) = cover_dimensions(src_w, src_h, target_w, target_h);
    let resized = imageops::resize(src, scaled_w, scaled_h, FilterType::Lanczos3);

    let left = (scaled_w - target_w) / 2;
    let top = (scaled_h - target_h) / 2;
    imageops::crop_imm(&resized, left, top, target_w, target_h).to_image()
}

/// Drop any alpha channel by compositing onto white
fn flatten_on_white(photo: &DynamicImage) -> RgbImage {
    if !photo.color().has_alpha() {
        return photo.to_rgb8();
    }

    let rgba = photo.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        let a = u32::from(p[3]);
        let over_white = |c: u8| ((u32::from(c) * a + 255 * (255 - a)) / 255) as u8;
        Rgb([over_white(p[0]), over_white(p[1]), over_white(p[2])])
    })
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], 255])
}

fn fill_rect(canvas: &mut RgbaImage, x: i32, y: i32, w: u32, h: u32, color: Color) {
    if w == 0 || h == 0 {
        return;
    }
    draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(w, h), rgba(color));
}

fn draw_rounded_rect(
    canvas: &mut RgbaImage,
    x: i32,
    y: i32,
    w: u32,
    h: u32,
    radius: u32,
    color: Color,
) {
    let r = radius.min(w / 2).min(h / 2);
    if r == 0 {
        fill_rect(canvas, x, y, w, h, color);
        return;
    }

    fill_rect(canvas, x + r as i32, y, w - 2 * r, h, color);
    fill_rect(canvas, x, y + r as i32, w, h - 2 * r, color);

    let ri = r as i32;
    let right = x + w as i32 - 1 - ri;
    let bottom = y + h as i32 - 1 - ri;
    for center in [(x + ri, y + ri), (right, y + ri), (x + ri, bottom), (right, bottom)] {
        draw_filled_circle_mut(canvas, center, ri, rgba(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TextMeasure;

    fn solid_photo(w: u32, h: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(color)))
    }

    fn rgb_at(image: &RgbaImage, x: u32, y: u32) -> [u8; 3] {
        let p = image.get_pixel(x, y);
        [p[0], p[1], p[2]]
    }

    #[test]
    fn test_cover_fit_exact_dimensions() {
        for &(sw, sh) in &[(4000, 3000), (300, 2000), (1080, 1150), (17, 9), (1, 1)] {
            let src = RgbImage::new(sw, sh);
            let out = cover_fit(&src, 1080, 1150);
            assert_eq!(out.dimensions(), (1080, 1150), "source {sw}x{sh}");
        }
    }

    #[test]
    fn test_cover_scale_is_minimal_covering_scale() {
        // Landscape source: height is the binding dimension
        let scale = cover_scale(4000, 3000, 1080, 1150);
        assert!((scale - 1150.0 / 3000.0).abs() < 1e-9);

        let (w, h) = cover_dimensions(4000, 3000, 1080, 1150);
        assert_eq!(h, 1150);
        assert!(w >= 1080);

        // Tall source: width is the binding dimension
        let (w, h) = cover_dimensions(300, 2000, 1080, 1150);
        assert_eq!(w, 1080);
        assert!(h >= 1150);
    }

    #[test]
    fn test_cover_fit_crops_symmetrically() {
        // Left half red, right half blue; a wide source keeps the center
        let src = RgbImage::from_fn(400, 100, |x, _| {
            if x < 200 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let out = cover_fit(&src, 100, 100);
        assert_eq!(out.get_pixel(10, 50)[0], 255);
        assert_eq!(out.get_pixel(90, 50)[2], 255);
    }

    #[test]
    fn test_cover_fit_zero_source() {
        let out = cover_fit(&RgbImage::new(0, 0), 10, 20);
        assert_eq!(out.dimensions(), (10, 20));
    }

    #[test]
    fn test_compose_canvas_and_regions() {
        let spec = LayoutSpec::default();
        let assets = LayoutAssets::default();
        let photo = solid_photo(800, 600, [0, 255, 0]);

        let art = compose(&spec, &assets, Some(&photo), "Title", "Sports");

        assert_eq!(art.image.dimensions(), (1080, 1920));
        assert!(art.warnings.is_empty());
        // Photo region
        assert_eq!(rgb_at(&art.image, 10, 10), [0, 255, 0]);
        // Band painted over the bottom of the photo
        assert_eq!(rgb_at(&art.image, 10, 1150), [225, 41, 23]);
        // Title box interior (no font loaded, so it stays plain)
        assert_eq!(rgb_at(&art.image, 540, 1370), [255, 255, 255]);
        // Rounded corner leaves the exact box corner as background
        assert_eq!(rgb_at(&art.image, 60, 1240), [0, 0, 0]);
        // Below the box is background
        assert_eq!(rgb_at(&art.image, 540, 1700), [0, 0, 0]);
    }

    #[test]
    fn test_compose_missing_photo_uses_fallback_panel() {
        let spec = LayoutSpec::default();
        let art = compose(&spec, &LayoutAssets::default(), None, "Title", "Sports");

        assert_eq!(rgb_at(&art.image, 10, 10), spec.photo.fallback_color);
        assert_eq!(art.warnings, vec![LayoutWarning::PhotoMissing]);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let spec = LayoutSpec::default();
        let assets = LayoutAssets::default();
        let photo = DynamicImage::ImageRgb8(RgbImage::from_fn(640, 480, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }));

        let a = compose(&spec, &assets, Some(&photo), "Same title", "Same");
        let b = compose(&spec, &assets, Some(&photo), "Same title", "Same");
        assert_eq!(a.image.as_raw(), b.image.as_raw());
    }

    #[test]
    fn test_compose_blends_transparent_logo() {
        let spec = LayoutSpec::default();
        let photo = solid_photo(100, 100, [0, 0, 255]);
        let assets = LayoutAssets {
            logo: Some(RgbaImage::from_pixel(360, 100, Rgba([255, 255, 255, 0]))),
            ..Default::default()
        };

        let art = compose(&spec, &assets, Some(&photo), "T", "C");
        // Fully transparent logo leaves the photo untouched
        assert_eq!(rgb_at(&art.image, 540, 820), [0, 0, 255]);
    }

    #[test]
    fn test_compose_opaque_logo_is_centered() {
        let spec = LayoutSpec::default();
        let photo = solid_photo(100, 100, [0, 0, 255]);
        let assets = LayoutAssets {
            logo: Some(RgbaImage::from_pixel(360, 100, Rgba([255, 255, 0, 255]))),
            ..Default::default()
        };

        let art = compose(&spec, &assets, Some(&photo), "T", "C");
        assert_eq!(rgb_at(&art.image, 540, 800), [255, 255, 0]);
        assert_eq!(rgb_at(&art.image, 359, 800), [0, 0, 255]);
        assert_eq!(rgb_at(&art.image, 360, 800), [255, 255, 0]);
    }

    #[test]
    fn test_flatten_on_white() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        assert_eq!(flatten_on_white(&rgba).get_pixel(0, 0), &Rgb([255, 255, 255]));

        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([9, 8, 7, 255])));
        assert_eq!(flatten_on_white(&opaque).get_pixel(1, 1), &Rgb([9, 8, 7]));
    }

    #[test]
    fn test_save_jpeg_round_trips_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arte_1.jpg");
        let art = compose(
            &LayoutSpec::default(),
            &LayoutAssets::default(),
            None,
            "Title",
            "News",
        );

        art.save_jpeg(&path, 92).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1080, 1920));
    }

    /// First loadable system font from the default fallback list
    fn system_font(size: f32) -> Option<FontFace> {
        LayoutSpec::default()
            .fallback_fonts
            .iter()
            .find_map(|path| FontFace::load(path, size).ok())
    }

    fn real_font_assets(spec: &LayoutSpec) -> Option<LayoutAssets> {
        Some(LayoutAssets {
            category_font: Some(system_font(spec.category.font_size)?),
            title_font: Some(system_font(spec.title.font_size)?),
            handle_font: Some(system_font(spec.handle.font_size)?),
            ..LayoutAssets::default()
        })
    }

    #[test]
    fn test_fit_with_real_glyph_metrics() {
        let spec = LayoutSpec::default();
        let Some(font) = system_font(spec.title.font_size) else {
            eprintln!("no system font available, skipping");
            return;
        };
        let max_width = spec.width - 2 * spec.title.margin_x - 2 * spec.title.padding_x;
        let title = "Prefeitura anuncia novas obras de pavimentação e drenagem \
                     em bairros da cidade e promete entregar tudo antes do verão \
                     para todo o litoral norte com investimento recorde";

        let lines = fit(title, &font, max_width, 3, "…");

        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert!(
                font.text_width(line) <= max_width,
                "{line:?} is {} px wide",
                font.text_width(line)
            );
        }
        assert!(lines[2].ends_with('…'));
        assert!(font.line_height(spec.title.leading) > spec.title.leading);
    }

    #[test]
    fn test_category_label_centered_in_band() {
        let spec = LayoutSpec::default();
        let Some(font) = system_font(spec.category.font_size) else {
            eprintln!("no system font available, skipping");
            return;
        };
        let assets = LayoutAssets {
            category_font: Some(font),
            ..LayoutAssets::default()
        };

        let art = compose(&spec, &assets, None, "", "Política");

        let band = &spec.category;
        let (mut min_x, mut max_x) = (u32::MAX, 0);
        let (mut min_y, mut max_y) = (u32::MAX, 0);
        for y in band.y..band.y + band.height {
            for x in 0..spec.width {
                if rgb_at(&art.image, x, y) != band.color {
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                    min_y = min_y.min(y);
                    max_y = max_y.max(y);
                }
            }
        }

        assert!(min_x < max_x, "label left no ink in the band");
        let left = min_x;
        let right = spec.width - 1 - max_x;
        let above = min_y - band.y;
        let below = band.y + band.height - 1 - max_y;
        assert!(left.abs_diff(right) <= 1, "horizontal margins {left}/{right}");
        assert!(above.abs_diff(below) <= 1, "vertical margins {above}/{below}");
    }

    #[test]
    fn test_compose_with_real_fonts_is_deterministic() {
        let spec = LayoutSpec::default();
        let Some(assets) = real_font_assets(&spec) else {
            eprintln!("no system font available, skipping");
            return;
        };
        let photo = solid_photo(1600, 900, [0, 0, 255]);
        let title = "Chuva forte deixa ruas alagadas no centro da cidade";

        let a = compose(&spec, &assets, Some(&photo), title, "Cidades");
        let b = compose(&spec, &assets, Some(&photo), title, "Cidades");

        assert!(a.image == b.image);
        let tb = &spec.title;
        let inked = (tb.y..tb.y + tb.height)
            .flat_map(|y| (tb.margin_x..spec.width - tb.margin_x).map(move |x| (x, y)))
            .any(|(x, y)| rgb_at(&a.image, x, y) == tb.text_color);
        assert!(inked, "title text was not drawn");
    }
}
