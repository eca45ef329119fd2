use std::path::Path;

use anyhow::{bail, Context, Result};

use reelcast::{
    AppConfig, CloudinaryHost, Credentials, Encoder, EncoderConfig, FacebookPageReels,
    HttpClient, InstagramReels, LayoutAssets, PipelineSettings, ReelPipeline, WordPressSource,
};

/// Assemble the production pipeline from config and credentials
pub fn build_pipeline(config: &AppConfig, creds: &Credentials) -> Result<ReelPipeline> {
    let http = HttpClient::new().context("Failed to build HTTP client")?;

    let mut encoder_config =
        EncoderConfig::for_profile(config.variant.encoder).with_fps(config.video.fps);
    if let Some(ffmpeg) = &config.video.ffmpeg_path {
        encoder_config = encoder_config.with_ffmpeg_path(&ffmpeg.to_string_lossy());
    }

    let assets = LayoutAssets::load(&config.layout);
    for warning in &assets.warnings {
        eprintln!("⚠️  {warning}");
    }

    let mut pipeline = ReelPipeline::new(
        PipelineSettings::from_config(config),
        config.layout.clone(),
        assets,
        Box::new(WordPressSource::new(http.clone(), &creds.wp_url)),
        Box::new(Encoder::with_config(encoder_config)),
        Box::new(CloudinaryHost::new(
            http.clone(),
            &creds.cloudinary_cloud_name,
            &creds.cloudinary_api_key,
            &creds.cloudinary_api_secret,
        )),
    );

    if let Some(page_id) = &creds.facebook_page_id {
        pipeline = pipeline.with_platform(Box::new(FacebookPageReels::new(
            http.clone(),
            page_id,
            &creds.access_token,
        )));
    } else {
        eprintln!("⚠️  FACEBOOK_PAGE_ID not set, Facebook disabled");
    }

    if let Some(ig_id) = &creds.instagram_id {
        pipeline = pipeline.with_platform(Box::new(InstagramReels::new(
            http,
            ig_id,
            &creds.access_token,
        )));
    } else {
        eprintln!("⚠️  INSTAGRAM_ID not set, Instagram disabled");
    }

    Ok(pipeline)
}

fn load(config_path: Option<&Path>) -> Result<ReelPipeline> {
    let config = AppConfig::load(config_path)?;
    let creds = Credentials::from_env()?;
    build_pipeline(&config, &creds)
}

pub async fn cmd_run(config_path: Option<&Path>) -> Result<()> {
    let pipeline = load(config_path)?;

    eprintln!("🚀 reelcast {} started", reelcast::VERSION);
    eprintln!(
        "   Cycle: {} articles every {}s",
        pipeline.settings().batch_size,
        pipeline.settings().cycle_interval.as_secs()
    );

    pipeline.run_forever().await
}

pub async fn cmd_once(config_path: Option<&Path>) -> Result<()> {
    let pipeline = load(config_path)?;

    let start = std::time::Instant::now();
    let report = pipeline.run_cycle().await;

    if let Some(err) = &report.fetch_error {
        bail!("Failed to fetch articles: {err}");
    }

    eprintln!("\n✅ Cycle {} done in {:.1}s", report.cycle_id, start.elapsed().as_secs_f64());
    eprintln!("   Articles: {}", report.fetched);
    eprintln!("   Skipped (no photo): {}", report.skipped);
    eprintln!("   Failed: {}", report.failed);
    eprintln!("   Published: {}", report.published);
    if report.publish_failed > 0 {
        eprintln!("   ❌ Publish failures: {}", report.publish_failed);
    }

    Ok(())
}
