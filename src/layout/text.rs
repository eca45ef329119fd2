//! Font measurement, glyph rendering and greedy text fitting

use std::fmt;
use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontArc, GlyphId, OutlinedGlyph, PxScale, ScaleFont};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use super::Color;

/// Anything that can report the rendered pixel width of a string
pub trait TextMeasure {
    /// Measured ink width of `text` in pixels
    fn text_width(&self, text: &str) -> u32;
}

/// Ink bounds of a rendered string, relative to a draw origin at the top of
/// the ascender line
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextBounds {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// A loaded font at a fixed pixel size
#[derive(Clone)]
pub struct FontFace {
    font: FontArc,
    scale: PxScale,
    source: PathBuf,
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFace")
            .field("source", &self.source)
            .field("size", &self.scale.y)
            .finish()
    }
}

impl FontFace {
    /// Load a TrueType/OpenType font file at the given pixel size
    pub fn load(path: &Path, size: f32) -> Result<Self> {
        let data =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let font = FontArc::try_from_vec(data)
            .with_context(|| format!("invalid font file {}", path.display()))?;
        Ok(Self::from_font(font, size, path))
    }

    /// Wrap an already parsed font
    #[must_use]
    pub fn from_font(font: FontArc, size: f32, source: &Path) -> Self {
        Self {
            font,
            scale: PxScale::from(size),
            source: source.to_path_buf(),
        }
    }

    /// Nominal line height: ascent + descent + `leading`
    #[must_use]
    pub fn line_height(&self, leading: u32) -> u32 {
        let scaled = self.font.as_scaled(self.scale);
        let natural = scaled.ascent() - scaled.descent();
        natural.ceil().max(0.0) as u32 + leading
    }

    /// Lay out `text` on a single line and return the outlined glyphs,
    /// positioned with the ascender line at y = 0
    fn outline(&self, text: &str) -> Vec<OutlinedGlyph> {
        let scaled = self.font.as_scaled(self.scale);
        let mut caret = 0.0_f32;
        let mut previous: Option<GlyphId> = None;
        let mut glyphs = Vec::new();

        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(self.scale, point(caret, scaled.ascent()));
            caret += scaled.h_advance(id);
            previous = Some(id);

            if let Some(outlined) = self.font.outline_glyph(glyph) {
                glyphs.push(outlined);
            }
        }

        glyphs
    }

    /// Measured ink bounds of `text`
    #[must_use]
    pub fn bounds(&self, text: &str) -> TextBounds {
        let glyphs = self.outline(text);
        if glyphs.is_empty() {
            return TextBounds::default();
        }

        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for glyph in &glyphs {
            let b = glyph.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }

        let left = min_x.floor() as i32;
        let top = min_y.floor() as i32;
        TextBounds {
            left,
            top,
            width: (max_x.ceil() as i32 - left).max(0) as u32,
            height: (max_y.ceil() as i32 - top).max(0) as u32,
        }
    }

    /// Draw `text` with its ascender line at `y` and its origin at `x`
    ///
    /// Coverage is alpha-blended over the existing pixels; anything outside
    /// the canvas is clipped.
    pub fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, text: &str, color: Color) {
        let (width, height) = canvas.dimensions();

        for glyph in self.outline(text) {
            let b = glyph.px_bounds();
            let gx = x + b.min.x as i32;
            let gy = y + b.min.y as i32;

            glyph.draw(|px, py, coverage| {
                let cx = gx + px as i32;
                let cy = gy + py as i32;
                if cx < 0 || cy < 0 || cx >= width as i32 || cy >= height as i32 {
                    return;
                }
                let alpha = coverage.clamp(0.0, 1.0);
                let pixel = canvas.get_pixel_mut(cx as u32, cy as u32);
                *pixel = blend(*pixel, color, alpha);
            });
        }
    }
}

impl TextMeasure for FontFace {
    fn text_width(&self, text: &str) -> u32 {
        self.bounds(text).width
    }
}

fn blend(under: Rgba<u8>, over: Color, alpha: f32) -> Rgba<u8> {
    let mix = |u: u8, o: u8| -> u8 {
        (f32::from(u) * (1.0 - alpha) + f32::from(o) * alpha).round() as u8
    };
    Rgba([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
        under[3],
    ])
}

/// Wrap `text` into at most `max_lines` lines no wider than `max_width`
///
/// Greedy word wrap: words accumulate on a line while the measured width
/// fits, and the first word that overflows opens the next line. Lines are
/// never rebalanced. Source line breaks start new lines.
///
/// When the text does not fit in `max_lines`, the last kept line is
/// shortened one character at a time until it plus `ellipsis` fits. Once
/// three or fewer characters remain the ellipsis is appended regardless, so
/// this never fails.
///
/// A single word wider than `max_width` is kept whole on its own line.
pub fn fit<M: TextMeasure + ?Sized>(
    text: &str,
    measure: &M,
    max_width: u32,
    max_lines: usize,
    ellipsis: &str,
) -> Vec<String> {
    if max_lines == 0 {
        return Vec::new();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut truncated = false;

    'paragraphs: for paragraph in text.lines() {
        let mut line = String::new();

        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };

            if line.is_empty() || measure.text_width(&candidate) <= max_width {
                line = candidate;
                continue;
            }

            lines.push(std::mem::replace(&mut line, word.to_string()));
            if lines.len() == max_lines {
                truncated = true;
                break 'paragraphs;
            }
        }

        if !line.is_empty() {
            if lines.len() == max_lines {
                truncated = true;
                break;
            }
            lines.push(line);
        }
    }

    if truncated {
        if let Some(last) = lines.pop() {
            lines.push(truncate_with_ellipsis(&last, measure, max_width, ellipsis));
        }
    }

    lines
}

fn truncate_with_ellipsis<M: TextMeasure + ?Sized>(
    line: &str,
    measure: &M,
    max_width: u32,
    ellipsis: &str,
) -> String {
    let mut kept = line.to_string();
    loop {
        let candidate = format!("{}{ellipsis}", kept.trim_end());
        if measure.text_width(&candidate) <= max_width || kept.chars().count() <= 3 {
            return candidate;
        }
        kept.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is `px` pixels wide
    struct Monospace(u32);

    impl TextMeasure for Monospace {
        fn text_width(&self, text: &str) -> u32 {
            text.chars().count() as u32 * self.0
        }
    }

    const TITLE: &str = "Prefeitura anuncia novo plano de mobilidade urbana para o litoral norte";

    #[test]
    fn test_fit_short_text_single_line() {
        let lines = fit("Hello world", &Monospace(10), 200, 3, "…");
        assert_eq!(lines, vec!["Hello world"]);
    }

    #[test]
    fn test_fit_wraps_greedily() {
        let lines = fit("aaa bbb ccc ddd", &Monospace(10), 70, 5, "…");
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn test_fit_respects_line_and_width_bounds() {
        let measure = Monospace(13);
        for max_lines in 1..=4 {
            let lines = fit(TITLE, &measure, 260, max_lines, "…");
            assert!(lines.len() <= max_lines);
            for line in &lines {
                assert!(measure.text_width(line) <= 260, "line too wide: {line}");
            }
        }
    }

    #[test]
    fn test_fit_truncation_appends_ellipsis() {
        let measure = Monospace(10);
        let lines = fit(TITLE, &measure, 200, 2, "…");
        assert_eq!(lines.len(), 2);
        let last = lines.last().unwrap();
        assert!(last.ends_with('…'));
        assert!(measure.text_width(last) <= 200);
    }

    #[test]
    fn test_fit_no_ellipsis_when_everything_fits() {
        let lines = fit("one two three", &Monospace(10), 50, 3, "…");
        assert_eq!(lines, vec!["one", "two", "three"]);
        assert!(!lines.iter().any(|l| l.ends_with('…')));
    }

    #[test]
    fn test_fit_accepts_ellipsis_for_tiny_remainder() {
        // Nothing fits in 20px, but truncation must still terminate
        let lines = fit("abcdef ghijkl", &Monospace(10), 20, 1, "…");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with('…'));
        assert!(lines[0].chars().count() <= 4);
    }

    #[test]
    fn test_fit_honors_paragraph_breaks() {
        let lines = fit("first\nsecond", &Monospace(10), 500, 3, "…");
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_fit_truncates_across_paragraphs() {
        let lines = fit("first\nsecond\nthird", &Monospace(10), 500, 2, "…");
        assert_eq!(lines, vec!["first", "second…"]);
    }

    #[test]
    fn test_fit_empty_and_zero_lines() {
        assert!(fit("", &Monospace(10), 100, 3, "…").is_empty());
        assert!(fit("   ", &Monospace(10), 100, 3, "…").is_empty());
        assert!(fit("text", &Monospace(10), 100, 0, "…").is_empty());
    }

    #[test]
    fn test_fit_overlong_word_on_own_line() {
        let lines = fit("a incomprehensibilities b", &Monospace(10), 60, 5, "…");
        assert_eq!(lines, vec!["a", "incomprehensibilities", "b"]);
    }

    #[test]
    fn test_blend_extremes() {
        let under = Rgba([0, 0, 0, 255]);
        assert_eq!(blend(under, [255, 255, 255], 0.0), under);
        assert_eq!(blend(under, [255, 255, 255], 1.0), Rgba([255, 255, 255, 255]));
    }
}
