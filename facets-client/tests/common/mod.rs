#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use facets_client::engine::store::CacheKey;
use facets_client::infra::testing::{RecordingReporter, TestProfileApi};
use facets_client::infra::time::VirtualTimeProvider;
use facets_client::{EngineConfig, ProfileEngine};
use facets_model::{Photo, PhotoId, PhotoUpload, Section};

pub struct Harness {
    pub engine: ProfileEngine,
    pub api: TestProfileApi,
    pub clock: VirtualTimeProvider,
    pub reporter: RecordingReporter,
}

impl Harness {
    pub fn photos(&self, section: Section) -> Vec<Photo> {
        self.engine.store().photos(CacheKey::SectionPhotos(section))
    }

    pub fn pool(&self) -> Vec<Photo> {
        self.engine.store().photos(CacheKey::AllPhotos)
    }

    pub fn primaries(&self, section: Section) -> Vec<PhotoId> {
        self.photos(section)
            .iter()
            .filter(|photo| photo.is_primary_for(section))
            .map(|photo| photo.id)
            .collect()
    }

    /// Let spawned tasks and fired timers run to completion.
    pub async fn settle(&self) {
        settle().await;
    }

    /// Advance virtual time past a debounce window and let the flush run.
    pub async fn advance(&self, ms: u64) {
        settle().await;
        self.clock.advance(Duration::from_millis(ms));
        settle().await;
    }
}

/// Engine settings for tests: no background revalidation unless asked for.
pub fn quiet_config() -> EngineConfig {
    EngineConfig {
        revalidate_on_settle: false,
        ..EngineConfig::default()
    }
}

pub fn harness(api: TestProfileApi) -> Harness {
    harness_with(api, quiet_config())
}

pub fn harness_with(api: TestProfileApi, config: EngineConfig) -> Harness {
    let clock = VirtualTimeProvider::new();
    let reporter = RecordingReporter::new();
    let engine = ProfileEngine::builder(Arc::new(api.clone()), api.owner())
        .config(config)
        .time(Arc::new(clock.clone()))
        .reporter(Arc::new(reporter.clone()))
        .build();
    Harness {
        engine,
        api,
        clock,
        reporter,
    }
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub fn jpeg() -> PhotoUpload {
    PhotoUpload::new("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
}

pub fn ids(photos: &[Photo]) -> Vec<PhotoId> {
    photos.iter().map(|photo| photo.id).collect()
}
