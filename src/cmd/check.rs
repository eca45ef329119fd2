use std::path::Path;

use anyhow::{bail, Result};

use reelcast::config::default_config_path;
use reelcast::{AppConfig, Credentials, Encoder, EncoderConfig, LayoutAssets};

pub async fn cmd_check(config_path: Option<&Path>) -> Result<()> {
    let mut problems = 0;

    eprintln!("🔍 Checking reelcast setup\n");

    let shown = config_path.map_or_else(default_config_path, Path::to_path_buf);
    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            eprintln!("✅ Config: {}", shown.display());
            config
        }
        Err(e) => {
            eprintln!("❌ Config: {e}");
            problems += 1;
            AppConfig::default()
        }
    };

    let mut encoder_config = EncoderConfig::for_profile(config.variant.encoder);
    if let Some(ffmpeg) = &config.video.ffmpeg_path {
        encoder_config = encoder_config.with_ffmpeg_path(&ffmpeg.to_string_lossy());
    }
    let ffmpeg = encoder_config.ffmpeg_path.clone();
    if Encoder::with_config(encoder_config).check_available().await {
        eprintln!("✅ ffmpeg: {ffmpeg}");
    } else {
        eprintln!("❌ ffmpeg: not runnable ({ffmpeg})");
        problems += 1;
    }

    let assets = LayoutAssets::load(&config.layout);
    if assets.warnings.is_empty() {
        eprintln!("✅ Fonts and logo");
    } else {
        for warning in &assets.warnings {
            eprintln!("⚠️  {warning}");
        }
    }

    match &config.video.audio_path {
        Some(audio) if audio.is_file() => eprintln!("✅ Audio: {}", audio.display()),
        Some(audio) => eprintln!("⚠️  Audio: {} not found, videos will be silent", audio.display()),
        None => eprintln!("   Audio: disabled"),
    }

    match Credentials::from_env() {
        Ok(creds) => {
            eprintln!("✅ Credentials: {}", creds.wp_url);
            eprintln!(
                "   Facebook: {}",
                if creds.facebook_page_id.is_some() { "enabled" } else { "disabled" }
            );
            eprintln!(
                "   Instagram: {}",
                if creds.instagram_id.is_some() { "enabled" } else { "disabled" }
            );
        }
        Err(e) => {
            eprintln!("❌ Credentials: {e}");
            problems += 1;
        }
    }

    if problems > 0 {
        bail!("{problems} problem(s) found");
    }

    eprintln!("\n✅ Ready");
    Ok(())
}
