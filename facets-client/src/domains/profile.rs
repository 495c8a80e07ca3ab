//! ProfileEngine - the façade mounted section views talk to
//!
//! One engine owns one store, one coordinator and the per-section state the
//! photo and preference domains need (election guards, debounce lanes,
//! in-flight activity). It is cheap to clone; every clone shares the same
//! state. The write operations live next to their domain
//! (`domains::photos`, `domains::preferences`); this module wires the parts
//! together and carries the read side.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use facets_model::{PhotoId, PreferenceMap, Section, UserId};
use parking_lot::Mutex;

use crate::domains::photos::election::ElectionGuard;
use crate::domains::preferences::lane::PreferenceLanes;
use crate::engine::coordinator::{Coordinator, Liveness};
use crate::engine::identity::{IdAliases, TemporaryIds};
use crate::engine::selectors::{self, PhotoPage};
use crate::engine::store::{CacheKey, ProfileStore};
use crate::error::EngineResult;
use crate::infra::api_client::ApiClient;
use crate::infra::config::EngineConfig;
use crate::infra::reporting::{FailureReporter, LogReporter};
use crate::infra::services::http::HttpProfileApi;
use crate::infra::services::profile_api::ProfileApi;
use crate::infra::time::{SystemTimeProvider, TimeProvider};

/// Writes currently in flight, for disabling controls
#[derive(Debug, Default)]
pub(crate) struct Activity {
    uploads: Mutex<HashMap<Section, usize>>,
    deletes: Mutex<HashMap<PhotoId, usize>>,
}

impl Activity {
    pub(crate) fn uploading(&self, section: Section) -> UploadActivity<'_> {
        *self.uploads.lock().entry(section).or_default() += 1;
        UploadActivity {
            activity: self,
            section,
        }
    }

    pub(crate) fn deleting(&self, id: PhotoId) -> DeleteActivity<'_> {
        *self.deletes.lock().entry(id).or_default() += 1;
        DeleteActivity { activity: self, id }
    }
}

pub(crate) struct UploadActivity<'a> {
    activity: &'a Activity,
    section: Section,
}

impl Drop for UploadActivity<'_> {
    fn drop(&mut self) {
        let mut uploads = self.activity.uploads.lock();
        if let Some(count) = uploads.get_mut(&self.section) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                uploads.remove(&self.section);
            }
        }
    }
}

pub(crate) struct DeleteActivity<'a> {
    activity: &'a Activity,
    id: PhotoId,
}

impl Drop for DeleteActivity<'_> {
    fn drop(&mut self) {
        let mut deletes = self.activity.deletes.lock();
        if let Some(count) = deletes.get_mut(&self.id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                deletes.remove(&self.id);
            }
        }
    }
}

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) owner: UserId,
    pub(crate) api: Arc<dyn ProfileApi>,
    pub(crate) time: Arc<dyn TimeProvider>,
    pub(crate) store: Arc<ProfileStore>,
    pub(crate) coordinator: Coordinator,
    pub(crate) ids: TemporaryIds,
    pub(crate) aliases: Arc<IdAliases>,
    pub(crate) elections: ElectionGuard,
    pub(crate) activity: Activity,
    pub(crate) lanes: PreferenceLanes,
}

#[derive(Clone)]
pub struct ProfileEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl fmt::Debug for ProfileEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileEngine")
            .field("owner", &self.inner.owner)
            .field("api", &self.inner.api)
            .field("coordinator", &self.inner.coordinator)
            .finish()
    }
}

pub struct ProfileEngineBuilder {
    api: Arc<dyn ProfileApi>,
    owner: UserId,
    config: EngineConfig,
    time: Arc<dyn TimeProvider>,
    reporter: Arc<dyn FailureReporter>,
    store: Option<Arc<ProfileStore>>,
}

impl fmt::Debug for ProfileEngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileEngineBuilder")
            .field("owner", &self.owner)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProfileEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn time(mut self, time: Arc<dyn TimeProvider>) -> Self {
        self.time = time;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Share an existing store instead of creating a fresh one.
    pub fn store(mut self, store: Arc<ProfileStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> ProfileEngine {
        let store = self.store.unwrap_or_default();
        let coordinator =
            Coordinator::new(store.clone(), Liveness::default(), self.reporter);
        let ids = TemporaryIds::seeded(self.time.utc_now().timestamp_millis());
        let lanes = PreferenceLanes::new(self.config.coupling.clone());

        ProfileEngine {
            inner: Arc::new(EngineInner {
                config: self.config,
                owner: self.owner,
                api: self.api,
                time: self.time,
                store,
                coordinator,
                ids,
                aliases: Arc::new(IdAliases::default()),
                elections: ElectionGuard::default(),
                activity: Activity::default(),
                lanes,
            }),
        }
    }
}

impl ProfileEngine {
    pub fn builder(
        api: Arc<dyn ProfileApi>,
        owner: UserId,
    ) -> ProfileEngineBuilder {
        ProfileEngineBuilder {
            api,
            owner,
            config: EngineConfig::default(),
            time: Arc::new(SystemTimeProvider),
            reporter: Arc::new(LogReporter),
            store: None,
        }
    }

    /// Engine talking HTTP to `config.server_url`.
    pub fn connect(config: EngineConfig, owner: UserId) -> EngineResult<Self> {
        let client =
            ApiClient::new(config.server_url.clone(), config.request_timeout())?;
        let api = Arc::new(HttpProfileApi::new(Arc::new(client)));
        Ok(Self::builder(api, owner).config(config).build())
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn owner(&self) -> UserId {
        self.inner.owner
    }

    /// A section view appeared: accept writes again and let election run once more.
    pub fn mount(&self, section: Section) {
        self.inner.coordinator.liveness().revive();
        self.inner.elections.reset(section);
        log::debug!("[ProfileEngine] Mounted {section}");
    }

    /// The owning view is gone; in-flight writes settle without touching the store.
    pub fn unmount(&self) {
        self.inner.coordinator.liveness().kill();
        log::debug!("[ProfileEngine] Unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.coordinator.liveness().is_alive()
    }

    pub fn primary_photo_url(&self, section: Section) -> Option<String> {
        selectors::primary_photo_url(&self.inner.store, section)
    }

    pub fn display_photos(&self, section: Section, page_size: usize) -> PhotoPage {
        selectors::display_photos(&self.inner.store, section, page_size)
    }

    pub fn effective_preferences(&self, section: Section) -> PreferenceMap {
        selectors::effective_preferences(
            &self.inner.store,
            section,
            &self.inner.config.default_preferences,
        )
    }

    pub fn is_uploading(&self, section: Section) -> bool {
        self.inner.activity.uploads.lock().contains_key(&section)
    }

    pub fn is_deleting(&self, id: PhotoId) -> bool {
        let resolved = self.inner.aliases.resolve(id);
        let deletes = self.inner.activity.deletes.lock();
        deletes.contains_key(&id) || deletes.contains_key(&resolved)
    }

    pub fn is_toggle_pending(&self, section: Section, field: &str) -> bool {
        self.inner
            .lanes
            .get(section)
            .is_some_and(|lane| lane.is_pending(field))
    }

    /// Kick off a background re-read of `keys` once a write has settled.
    pub(crate) fn settled(&self, keys: &[CacheKey]) {
        if !self.inner.config.revalidate_on_settle || !self.is_mounted() {
            return;
        }
        let engine = self.clone();
        let keys = keys.to_vec();
        tokio::spawn(async move {
            if let Err(e) = engine.revalidate(&keys).await {
                log::warn!("[ProfileEngine] Background revalidation failed: {e}");
            }
        });
    }
}
