use std::path::Path;

use anyhow::{Context, Result};

use reelcast::layout::{compose, LayoutAssets};
use reelcast::pipeline::ART_JPEG_QUALITY;
use reelcast::AppConfig;

pub fn cmd_render(
    config_path: Option<&Path>,
    photo: Option<&Path>,
    title: &str,
    category: &str,
    output: &Path,
) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    eprintln!("🎨 Rendering: {title}");
    eprintln!("   Category: {category}");

    let photo = photo
        .map(|p| image::open(p).with_context(|| format!("Failed to open photo {}", p.display())))
        .transpose()?;

    let assets = LayoutAssets::load(&config.layout);
    let art = compose(&config.layout, &assets, photo.as_ref(), title, category);

    for warning in &art.warnings {
        eprintln!("⚠️  {warning}");
    }

    art.save_jpeg(output, ART_JPEG_QUALITY)?;

    eprintln!(
        "\n✅ Saved {}x{} to {}",
        art.image.width(),
        art.image.height(),
        output.display()
    );

    Ok(())
}
