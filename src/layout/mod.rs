//! Fixed-template vertical layout for reel cover art
//!
//! The template is a 9:16 canvas split into:
//! - **Photo region** - the article photo, cover-fitted (scaled and center-cropped)
//! - **Category band** - solid color strip with the uppercased category label
//! - **Logo** - brand asset, alpha-composited above the band
//! - **Title box** - rounded rectangle holding the wrapped, possibly truncated title
//! - **Handle footer** - fixed social handle
//!
//! Geometry, colors and fonts live in [`LayoutSpec`], loaded once at startup.
//! Fonts and the logo are resolved into [`LayoutAssets`] so that [`compose`]
//! itself never touches the filesystem.
//!
//! # Example
//!
//! ```rust,no_run
//! use reelcast::layout::{compose, LayoutAssets, LayoutSpec};
//!
//! let spec = LayoutSpec::default();
//! let assets = LayoutAssets::load(&spec);
//! let photo = image::open("photo.jpg").ok();
//! let art = compose(&spec, &assets, photo.as_ref(), "Title", "Politics");
//! art.image.save("art.png").unwrap();
//! ```

pub mod compose;
pub mod text;

use std::fmt;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use compose::{compose, cover_dimensions, cover_fit, cover_scale, Composition};
pub use text::{fit, FontFace, TextBounds, TextMeasure};

/// RGB color triple, written as `[r, g, b]` in config files
pub type Color = [u8; 3];

/// Photo region at the top of the canvas (always full canvas width)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoRegion {
    pub top: u32,
    pub height: u32,
    /// Solid panel painted when no photo could be obtained
    pub fallback_color: Color,
}

impl Default for PhotoRegion {
    fn default() -> Self {
        Self {
            top: 0,
            height: 1150,
            fallback_color: [40, 40, 40],
        }
    }
}

/// Category band spanning the canvas width
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryBand {
    pub y: u32,
    pub height: u32,
    pub color: Color,
    pub text_color: Color,
    pub font: PathBuf,
    pub font_size: f32,
}

impl Default for CategoryBand {
    fn default() -> Self {
        Self {
            y: 1100,
            height: 120,
            color: [225, 41, 23],
            text_color: [255, 255, 255],
            font: PathBuf::from("Roboto-Black.ttf"),
            font_size: 70.0,
        }
    }
}

/// Rounded box holding the article title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleBox {
    pub margin_x: u32,
    pub y: u32,
    pub height: u32,
    pub radius: u32,
    pub fill: Color,
    pub text_color: Color,
    /// Horizontal padding between the box edge and the text on each side
    pub padding_x: u32,
    pub font: PathBuf,
    pub font_size: f32,
    /// Extra pixels added to ascent + descent for each line
    pub leading: u32,
    pub ellipsis: String,
}

impl Default for TitleBox {
    fn default() -> Self {
        Self {
            margin_x: 60,
            y: 1240,
            height: 260,
            radius: 22,
            fill: [255, 255, 255],
            text_color: [0, 0, 0],
            padding_x: 20,
            font: PathBuf::from("Anton-Regular.ttf"),
            font_size: 65.0,
            leading: 6,
            ellipsis: "…".to_string(),
        }
    }
}

/// Brand logo overlay, horizontally centered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoSpec {
    pub path: PathBuf,
    pub target_width: u32,
    /// Must keep the logo clear of the category band; not checked at runtime
    pub y: u32,
}

impl Default for LogoSpec {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logo_boca.png"),
            target_width: 360,
            y: 790,
        }
    }
}

/// Footer handle text, horizontally centered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleSpec {
    pub text: String,
    pub font: PathBuf,
    pub font_size: f32,
    pub color: Color,
    pub y: u32,
}

impl Default for HandleSpec {
    fn default() -> Self {
        Self {
            text: "@BOCANOTROMBONELITORAL".to_string(),
            font: PathBuf::from("Roboto-Bold.ttf"),
            font_size: 42.0,
            color: [255, 204, 0],
            y: 1600,
        }
    }
}

/// The complete visual template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSpec {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub photo: PhotoRegion,
    pub category: CategoryBand,
    pub title: TitleBox,
    pub logo: LogoSpec,
    pub handle: HandleSpec,
    /// Fonts tried, in order, when a configured font cannot be loaded
    pub fallback_fonts: Vec<PathBuf>,
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            background: [0, 0, 0],
            photo: PhotoRegion::default(),
            category: CategoryBand::default(),
            title: TitleBox::default(),
            logo: LogoSpec::default(),
            handle: HandleSpec::default(),
            fallback_fonts: vec![
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
                PathBuf::from("/usr/share/fonts/TTF/DejaVuSans-Bold.ttf"),
                PathBuf::from("/System/Library/Fonts/Supplemental/Arial Bold.ttf"),
                PathBuf::from("C:\\Windows\\Fonts\\arialbd.ttf"),
            ],
        }
    }
}

/// Non-fatal degradation noticed while loading assets or composing
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutWarning {
    /// Configured font unusable, a fallback font was substituted
    FontFallback { requested: PathBuf, used: PathBuf },
    /// Neither the configured font nor any fallback could be loaded; text omitted
    FontMissing { requested: PathBuf },
    /// Logo could not be loaded; logo omitted
    LogoMissing { path: PathBuf, reason: String },
    /// No photo supplied; fallback panel painted instead
    PhotoMissing,
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FontFallback { requested, used } => write!(
                f,
                "font {} not found, using fallback {}",
                requested.display(),
                used.display()
            ),
            Self::FontMissing { requested } => write!(
                f,
                "font {} not found and no fallback available, text omitted",
                requested.display()
            ),
            Self::LogoMissing { path, reason } => {
                write!(f, "logo {} unavailable ({reason}), omitted", path.display())
            }
            Self::PhotoMissing => write!(f, "no photo available, using fallback panel"),
        }
    }
}

/// Fonts and logo resolved from a [`LayoutSpec`]
///
/// Any element that failed to load is `None`; the reason is kept in
/// `warnings` and repeated in every [`Composition`].
#[derive(Debug, Clone, Default)]
pub struct LayoutAssets {
    pub category_font: Option<FontFace>,
    pub title_font: Option<FontFace>,
    pub handle_font: Option<FontFace>,
    /// Logo already scaled to the target width
    pub logo: Option<RgbaImage>,
    pub warnings: Vec<LayoutWarning>,
}

impl LayoutAssets {
    /// Load fonts and logo, degrading gracefully on anything missing
    pub fn load(spec: &LayoutSpec) -> Self {
        let mut warnings = Vec::new();

        let category_font = load_font_with_fallback(
            &spec.category.font,
            spec.category.font_size,
            &spec.fallback_fonts,
            &mut warnings,
        );
        let title_font = load_font_with_fallback(
            &spec.title.font,
            spec.title.font_size,
            &spec.fallback_fonts,
            &mut warnings,
        );
        let handle_font = load_font_with_fallback(
            &spec.handle.font,
            spec.handle.font_size,
            &spec.fallback_fonts,
            &mut warnings,
        );

        let logo = match load_logo(&spec.logo.path, spec.logo.target_width) {
            Ok(logo) => Some(logo),
            Err(e) => {
                let warning = LayoutWarning::LogoMissing {
                    path: spec.logo.path.clone(),
                    reason: format!("{e:#}"),
                };
                warn!("{warning}");
                warnings.push(warning);
                None
            }
        };

        Self {
            category_font,
            title_font,
            handle_font,
            logo,
            warnings,
        }
    }
}

fn load_font_with_fallback(
    path: &Path,
    size: f32,
    fallbacks: &[PathBuf],
    warnings: &mut Vec<LayoutWarning>,
) -> Option<FontFace> {
    if let Ok(face) = FontFace::load(path, size) {
        return Some(face);
    }

    for candidate in fallbacks {
        if let Ok(face) = FontFace::load(candidate, size) {
            let warning = LayoutWarning::FontFallback {
                requested: path.to_path_buf(),
                used: candidate.clone(),
            };
            warn!("{warning}");
            warnings.push(warning);
            return Some(face);
        }
    }

    let warning = LayoutWarning::FontMissing {
        requested: path.to_path_buf(),
    };
    warn!("{warning}");
    warnings.push(warning);
    None
}

/// Load the logo and scale it to `target_width`, preserving aspect ratio
fn load_logo(path: &Path, target_width: u32) -> anyhow::Result<RgbaImage> {
    let logo = image::open(path)?.to_rgba8();
    let (w0, h0) = logo.dimensions();
    if w0 == 0 || h0 == 0 || target_width == 0 {
        anyhow::bail!("logo has zero size");
    }

    let ratio = f64::from(target_width) / f64::from(w0);
    let target_height = ((f64::from(h0) * ratio) as u32).max(1);
    Ok(imageops::resize(
        &logo,
        target_width,
        target_height,
        FilterType::Lanczos3,
    ))
}
