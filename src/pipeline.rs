//! Cycle orchestrator: article -> cover art -> video -> hosted URL -> platforms
//!
//! Articles are processed strictly in order. A failure at any stage abandons
//! that article only; a failure fetching the batch abandons that cycle only.
//! Nothing short of an interrupt stops [`ReelPipeline::run_forever`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::encoder::VideoEncoder;
use crate::hosting::ArtifactHost;
use crate::layout::{compose, LayoutAssets, LayoutSpec};
use crate::publish::{PlatformApi, PublishMachine, PublishOutcome, PublishPolicy};
use crate::source::{ArticleSource, SourceArticle};
use crate::strategy::{build_caption, resolve_category, CaptionConfig, PipelineVariant};

/// JPEG quality for the intermediate cover art
pub const ART_JPEG_QUALITY: u8 = 92;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Directory for `arte_<id>.jpg` and `reel_<id>.mp4`
    pub output_dir: PathBuf,
    pub video_seconds: u32,
    /// Background track; ignored when the file does not exist
    pub audio_path: Option<PathBuf>,
    pub batch_size: usize,
    pub cycle_interval: Duration,
    pub variant: PipelineVariant,
    pub captions: CaptionConfig,
    pub publish: PublishPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            video_seconds: config.video.seconds,
            audio_path: config.video.audio_path.clone(),
            batch_size: config.cycle.batch_size,
            cycle_interval: config.cycle_interval(),
            variant: config.variant,
            captions: config.caption.clone(),
            publish: config.publish.to_policy(),
        }
    }

    /// Set the output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        self.output_dir = dir.to_path_buf();
        self
    }
}

/// What happened to one article
#[derive(Debug)]
pub enum ArticleOutcome {
    /// No photo reference; nothing downstream was called
    Skipped,
    /// Video hosted; one outcome per configured platform
    Published {
        video_url: String,
        outcomes: Vec<PublishOutcome>,
    },
}

/// Summary of one cycle
#[derive(Debug)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Articles returned by the source
    pub fetched: usize,
    pub skipped: usize,
    /// Articles abandoned before publishing (render, encode, upload)
    pub failed: usize,
    /// Platform publications that succeeded
    pub published: usize,
    /// Platform publications that failed after retries
    pub publish_failed: usize,
    /// Set when the batch itself could not be fetched
    pub fetch_error: Option<String>,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            started_at: Utc::now(),
            fetched: 0,
            skipped: 0,
            failed: 0,
            published: 0,
            publish_failed: 0,
            fetch_error: None,
        }
    }

    fn record(&mut self, outcome: &ArticleOutcome) {
        match outcome {
            ArticleOutcome::Skipped => self.skipped += 1,
            ArticleOutcome::Published { outcomes, .. } => {
                for o in outcomes {
                    if o.is_success() {
                        self.published += 1;
                    } else {
                        self.publish_failed += 1;
                    }
                }
            }
        }
    }
}

/// The article-to-reel pipeline
pub struct ReelPipeline {
    settings: PipelineSettings,
    layout: Arc<LayoutSpec>,
    assets: Arc<LayoutAssets>,
    source: Box<dyn ArticleSource>,
    encoder: Box<dyn VideoEncoder>,
    host: Box<dyn ArtifactHost>,
    platforms: Vec<Box<dyn PlatformApi>>,
    publisher: PublishMachine,
}

impl ReelPipeline {
    /// Create a pipeline with no platforms; add them with
    /// [`ReelPipeline::with_platform`]
    #[must_use]
    pub fn new(
        settings: PipelineSettings,
        layout: LayoutSpec,
        assets: LayoutAssets,
        source: Box<dyn ArticleSource>,
        encoder: Box<dyn VideoEncoder>,
        host: Box<dyn ArtifactHost>,
    ) -> Self {
        let publisher = PublishMachine::new(settings.publish.clone());
        Self {
            settings,
            layout: Arc::new(layout),
            assets: Arc::new(assets),
            source,
            encoder,
            host,
            platforms: Vec::new(),
            publisher,
        }
    }

    /// Publish to one more platform
    #[must_use]
    pub fn with_platform(mut self, platform: Box<dyn PlatformApi>) -> Self {
        self.platforms.push(platform);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run cycles until Ctrl-C
    pub async fn run_forever(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
        info!("Interrupted, stopping");
        Ok(())
    }

    /// Run cycles, sleeping `cycle_interval` between them, until `shutdown`
    /// resolves. An in-flight cycle is abandoned at that point.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => return,
                () = async {
                    self.run_cycle().await;
                    tokio::time::sleep(self.settings.cycle_interval).await;
                } => {}
            }
        }
    }

    /// Fetch one batch and process it; never fails
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::new();
        info!(cycle = %report.cycle_id, "Cycle started");

        let articles = match self.source.fetch_batch(self.settings.batch_size).await {
            Ok(articles) => articles,
            Err(e) => {
                error!("Failed to fetch articles from {}: {:#}", self.source.name(), e);
                report.fetch_error = Some(format!("{e:#}"));
                return report;
            }
        };
        report.fetched = articles.len();

        for article in &articles {
            let result = AssertUnwindSafe(self.process_article(article))
                .catch_unwind()
                .await;
            match result {
                Ok(Ok(outcome)) => report.record(&outcome),
                Ok(Err(e)) => {
                    error!("Article {} failed: {:#}", article.id, e);
                    report.failed += 1;
                }
                Err(panic) => {
                    error!("Article {} panicked: {}", article.id, panic_message(&*panic));
                    report.failed += 1;
                }
            }
        }

        info!(
            cycle = %report.cycle_id,
            "Cycle finished: {} fetched, {} skipped, {} failed, {} published, {} publish failures",
            report.fetched,
            report.skipped,
            report.failed,
            report.published,
            report.publish_failed
        );
        report
    }

    /// Run one article through every stage
    #[instrument(skip_all, fields(article = article.id))]
    pub async fn process_article(&self, article: &SourceArticle) -> Result<ArticleOutcome> {
        let Some(photo_url) = article.photo_url.as_deref() else {
            info!("No photo, skipping");
            return Ok(ArticleOutcome::Skipped);
        };

        let photo = match self.source.fetch_photo(photo_url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Photo unavailable, using fallback panel: {:#}", e);
                None
            }
        };

        let category = resolve_category(
            article,
            self.settings.variant.category,
            &self.settings.captions,
        );
        let caption = build_caption(
            article,
            self.settings.variant.caption,
            &self.settings.captions,
        );

        tokio::fs::create_dir_all(&self.settings.output_dir)
            .await
            .with_context(|| {
                format!("Failed to create {}", self.settings.output_dir.display())
            })?;

        let art_path = self
            .settings
            .output_dir
            .join(format!("arte_{}.jpg", article.id));
        self.render_art(photo, &article.title, &category, &art_path)
            .await?;
        info!("Cover art written to {}", art_path.display());

        let video_path = self
            .settings
            .output_dir
            .join(format!("reel_{}.mp4", article.id));
        let encoded = self
            .encoder
            .encode(
                &art_path,
                &video_path,
                self.settings.video_seconds,
                self.settings.audio_path.as_deref(),
            )
            .await;
        if !encoded {
            bail!("encoding {} failed", video_path.display());
        }

        let video_url = self
            .host
            .upload(&video_path)
            .await
            .context("Upload failed")?;

        let mut outcomes = Vec::with_capacity(self.platforms.len());
        for api in &self.platforms {
            outcomes.push(self.publisher.publish(api.as_ref(), &video_url, &caption).await);
        }

        Ok(ArticleOutcome::Published {
            video_url,
            outcomes,
        })
    }

    /// Decode `photo` and compose the cover art off the async workers
    async fn render_art(
        &self,
        photo: Option<Vec<u8>>,
        title: &str,
        category: &str,
        path: &Path,
    ) -> Result<()> {
        let layout = Arc::clone(&self.layout);
        let assets = Arc::clone(&self.assets);
        let title = title.to_string();
        let category = category.to_string();
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let photo = photo.and_then(|bytes| match image::load_from_memory(&bytes) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!("Photo undecodable, using fallback panel: {}", e);
                    None
                }
            });
            let art = compose(&layout, &assets, photo.as_ref(), &title, &category);
            art.save_jpeg(&path, ART_JPEG_QUALITY)
        })
        .await
        .context("Render task panicked")?
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;
    use crate::publish::testing::ScriptedApi;
    use crate::publish::{JobStatus, Platform};

    struct FakeSource {
        articles: Vec<SourceArticle>,
        fail_fetch: bool,
        batches: Arc<AtomicU32>,
        photos: Arc<AtomicU32>,
    }

    impl FakeSource {
        fn new(articles: Vec<SourceArticle>) -> Self {
            Self {
                articles,
                fail_fetch: false,
                batches: Arc::new(AtomicU32::new(0)),
                photos: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(40, 30, Rgb([255, 0, 0]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[async_trait]
    impl ArticleSource for FakeSource {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_batch(&self, limit: usize) -> Result<Vec<SourceArticle>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err(anyhow!("CMS unreachable"));
            }
            Ok(self.articles.iter().take(limit).cloned().collect())
        }

        async fn fetch_photo(&self, url: &str) -> Result<Vec<u8>> {
            self.photos.fetch_add(1, Ordering::SeqCst);
            if url.contains("broken") {
                return Err(anyhow!("404"));
            }
            if url.contains("garbage") {
                return Ok(b"<html>not an image</html>".to_vec());
            }
            Ok(png_bytes())
        }
    }

    /// Writes a placeholder file; fails for listed article ids
    struct FakeEncoder {
        fail_ids: Vec<u64>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl VideoEncoder for FakeEncoder {
        async fn encode(
            &self,
            image: &Path,
            output: &Path,
            _duration_secs: u32,
            _audio: Option<&Path>,
        ) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(image.exists(), "cover art must exist before encoding");
            let name = output.file_name().unwrap().to_string_lossy().to_string();
            if self.fail_ids.iter().any(|id| name == format!("reel_{id}.mp4")) {
                return false;
            }
            std::fs::write(output, b"mp4").is_ok()
        }
    }

    /// Article whose upload panics inside the host
    const PANICKING_UPLOAD_ID: u64 = 13;

    struct FakeHost {
        uploads: Arc<Mutex<Vec<PathBuf>>>,
    }

    #[async_trait]
    impl ArtifactHost for FakeHost {
        async fn upload(&self, path: &Path) -> Result<String> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if name == format!("reel_{PANICKING_UPLOAD_ID}.mp4") {
                panic!("host bug");
            }
            self.uploads.lock().unwrap().push(path.to_path_buf());
            Ok(format!("https://cdn.example/{name}"))
        }
    }

    /// Lets the test keep a handle on a platform owned by the pipeline
    struct Shared(Arc<ScriptedApi>);

    #[async_trait]
    impl PlatformApi for Shared {
        fn platform(&self) -> Platform {
            self.0.platform()
        }

        async fn create(&self, video_url: &str, caption: &str) -> Result<String> {
            self.0.create(video_url, caption).await
        }

        async fn status(&self, job_id: &str) -> Result<JobStatus> {
            self.0.status(job_id).await
        }

        async fn commit(&self, job_id: &str, caption: &str) -> Result<String> {
            self.0.commit(job_id, caption).await
        }
    }

    fn article(id: u64, photo: Option<&str>) -> SourceArticle {
        SourceArticle {
            id,
            title: format!("Notícia número {id}"),
            categories: vec!["Cidades".to_string()],
            photo_url: photo.map(str::to_string),
            link: format!("https://example.com/{id}"),
            body: String::new(),
        }
    }

    struct Harness {
        pipeline: ReelPipeline,
        batches: Arc<AtomicU32>,
        photos: Arc<AtomicU32>,
        encodes: Arc<AtomicU32>,
        uploads: Arc<Mutex<Vec<PathBuf>>>,
        facebook: Arc<ScriptedApi>,
        instagram: Arc<ScriptedApi>,
        _dir: tempfile::TempDir,
    }

    fn harness(source: FakeSource, fail_ids: Vec<u64>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            audio_path: None,
            ..PipelineSettings::default()
        }
        .with_output_dir(dir.path());

        let batches = Arc::clone(&source.batches);
        let photos = Arc::clone(&source.photos);
        let encodes = Arc::new(AtomicU32::new(0));
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let facebook = Arc::new(ScriptedApi::new(Platform::FacebookPage));
        let instagram = Arc::new(ScriptedApi::new(Platform::InstagramReels));

        let pipeline = ReelPipeline::new(
            settings,
            LayoutSpec::default(),
            LayoutAssets::default(),
            Box::new(source),
            Box::new(FakeEncoder {
                fail_ids,
                calls: Arc::clone(&encodes),
            }),
            Box::new(FakeHost {
                uploads: Arc::clone(&uploads),
            }),
        )
        .with_platform(Box::new(Shared(Arc::clone(&facebook))))
        .with_platform(Box::new(Shared(Arc::clone(&instagram))));

        Harness {
            pipeline,
            batches,
            photos,
            encodes,
            uploads,
            facebook,
            instagram,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_encode_failure_isolated_to_one_article() {
        let source = FakeSource::new(vec![
            article(1, Some("https://cdn/1.jpg")),
            article(2, Some("https://cdn/2.jpg")),
            article(3, Some("https://cdn/3.jpg")),
        ]);
        let h = harness(source, vec![2]);

        let report = h.pipeline.run_cycle().await;

        assert_eq!(report.fetched, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.published, 4);
        assert_eq!(h.encodes.load(Ordering::SeqCst), 3);
        let published: Vec<String> = h.instagram.video_urls.lock().unwrap().clone();
        assert_eq!(
            published,
            vec![
                "https://cdn.example/reel_1.mp4".to_string(),
                "https://cdn.example/reel_3.mp4".to_string(),
            ]
        );
        assert_eq!(h.facebook.creates(), 2);
    }

    #[tokio::test]
    async fn test_article_without_photo_is_skipped() {
        let h = harness(FakeSource::new(vec![article(7, None)]), vec![]);

        let report = h.pipeline.run_cycle().await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(h.photos.load(Ordering::SeqCst), 0);
        assert_eq!(h.encodes.load(Ordering::SeqCst), 0);
        assert!(h.uploads.lock().unwrap().is_empty());
        assert_eq!(h.facebook.creates(), 0);
        assert_eq!(h.instagram.creates(), 0);
    }

    #[tokio::test]
    async fn test_successful_article_uploads_once_and_publishes_twice() {
        let h = harness(
            FakeSource::new(vec![article(5, Some("https://cdn/5.jpg"))]),
            vec![],
        );

        let outcome = h
            .pipeline
            .process_article(&article(5, Some("https://cdn/5.jpg")))
            .await
            .unwrap();

        let ArticleOutcome::Published { video_url, outcomes } = outcome else {
            panic!("expected a published outcome");
        };
        assert_eq!(video_url, "https://cdn.example/reel_5.mp4");
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(PublishOutcome::is_success));
        assert_eq!(h.uploads.lock().unwrap().len(), 1);
        assert_eq!(h.facebook.commits(), 1);
        assert_eq!(h.instagram.commits(), 1);
        assert!(h.pipeline.settings().output_dir.join("arte_5.jpg").exists());
    }

    #[tokio::test]
    async fn test_broken_photo_falls_back_to_panel() {
        let h = harness(
            FakeSource::new(vec![article(9, Some("https://cdn/broken.jpg"))]),
            vec![],
        );

        let report = h.pipeline.run_cycle().await;

        assert_eq!(report.failed, 0);
        assert_eq!(report.published, 2);
        assert_eq!(h.photos.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_photo_falls_back_to_panel() {
        let h = harness(
            FakeSource::new(vec![article(10, Some("https://cdn/garbage.jpg"))]),
            vec![],
        );

        let report = h.pipeline.run_cycle().await;

        assert_eq!(report.failed, 0);
        assert_eq!(report.published, 2);
        let art = image::open(h.pipeline.settings().output_dir.join("arte_10.jpg")).unwrap();
        assert_eq!((art.width(), art.height()), (1080, 1920));
    }

    #[tokio::test]
    async fn test_panicking_collaborator_fails_only_its_article() {
        let source = FakeSource::new(vec![
            article(12, Some("https://cdn/12.jpg")),
            article(PANICKING_UPLOAD_ID, Some("https://cdn/13.jpg")),
            article(14, Some("https://cdn/14.jpg")),
        ]);
        let h = harness(source, vec![]);

        let report = h.pipeline.run_cycle().await;

        assert_eq!(report.fetched, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.published, 4);
        assert_eq!(h.uploads.lock().unwrap().len(), 2);
        assert_eq!(h.instagram.creates(), 2);
    }

    #[test]
    fn test_panic_message_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*literal), "boom");
        assert_eq!(panic_message(&*owned), "bang");
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_fetch_failure_ends_cycle_quietly() {
        let mut source = FakeSource::new(vec![article(1, Some("https://cdn/1.jpg"))]);
        source.fail_fetch = true;
        let h = harness(source, vec![]);

        let report = h.pipeline.run_cycle().await;

        assert!(report.fetch_error.unwrap().contains("CMS unreachable"));
        assert_eq!(report.fetched, 0);
        assert_eq!(h.encodes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_repeats_cycles_on_interval() {
        let h = harness(FakeSource::new(vec![article(1, None)]), vec![]);
        let interval = h.pipeline.settings().cycle_interval;

        h.pipeline
            .run_until(tokio::time::sleep(interval * 2 + interval / 6))
            .await;

        // t = 0, 1x and 2x interval
        assert_eq!(h.batches.load(Ordering::SeqCst), 3);
    }
}
