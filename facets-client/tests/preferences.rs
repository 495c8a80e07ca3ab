mod common;

use common::{Harness, harness, harness_with, quiet_config};
use facets_client::domains::preferences::{Coupling, PreferenceRules};
use facets_client::engine::store::CacheKey;
use facets_client::infra::testing::{ApiCall, ApiOp, TestProfileApi};
use facets_client::{EngineConfig, EngineError};
use facets_model::{PreferenceMap, RecordId, Section};

const DEBOUNCE_MS: u64 = 150;

async fn with_record(config: EngineConfig, map: PreferenceMap) -> Harness {
    let api = TestProfileApi::default();
    api.seed_preferences(Section::Job, RecordId(7), &map);
    let h = harness_with(api, config);
    h.engine.hydrate(Section::Job).await.unwrap();
    h
}

fn patches(h: &Harness) -> Vec<ApiCall> {
    h.api.calls_of(ApiOp::PatchPreferences)
}

#[tokio::test]
async fn a_burst_of_toggles_sends_only_the_final_state() {
    let h = with_record(quiet_config(), PreferenceMap::new().with("f", false)).await;

    assert!(h.engine.toggle(Section::Job, "f").unwrap());
    assert!(!h.engine.toggle(Section::Job, "f").unwrap());
    assert!(h.engine.toggle(Section::Job, "f").unwrap());
    assert_eq!(h.engine.effective_preferences(Section::Job).get("f"), Some(true));
    assert!(h.engine.is_toggle_pending(Section::Job, "f"));

    h.advance(DEBOUNCE_MS - 1).await;
    assert!(patches(&h).is_empty());

    h.advance(1).await;
    assert_eq!(
        patches(&h),
        vec![ApiCall::PatchPreferences(
            Section::Job,
            PreferenceMap::new().with("f", true)
        )]
    );
    assert!(!h.engine.is_toggle_pending(Section::Job, "f"));
    assert_eq!(h.api.stored_preferences(Section::Job).unwrap().get("f"), Some(true));
}

#[tokio::test]
async fn each_toggle_restarts_the_debounce_window() {
    let h = with_record(quiet_config(), PreferenceMap::new().with("f", false)).await;

    h.engine.toggle(Section::Job, "f").unwrap();
    h.advance(100).await;
    h.engine.toggle(Section::Job, "f").unwrap();
    h.advance(100).await;
    assert!(patches(&h).is_empty());

    h.advance(50).await;
    assert_eq!(
        patches(&h),
        vec![ApiCall::PatchPreferences(
            Section::Job,
            PreferenceMap::new().with("f", false)
        )]
    );
}

#[tokio::test]
async fn failed_write_rolls_back_the_whole_burst_and_notifies_once() {
    let original = PreferenceMap::new().with("f", false);
    let h = with_record(quiet_config(), original.clone()).await;
    h.api.fail_next(ApiOp::PatchPreferences);

    h.engine.toggle(Section::Job, "f").unwrap();
    h.engine.toggle(Section::Job, "g").unwrap();
    h.advance(DEBOUNCE_MS).await;

    assert_eq!(patches(&h).len(), 1);
    let state = h.engine.store().preferences(Section::Job).unwrap();
    assert_eq!(state.map, original);
    assert_eq!(state.record, Some(RecordId(7)));
    assert_eq!(h.reporter.reports(), vec!["toggle-preferences".to_string()]);
    assert!(!h.engine.is_toggle_pending(Section::Job, "g"));
}

#[tokio::test]
async fn toggles_made_while_a_write_is_in_flight_survive_its_failure() {
    let h = with_record(quiet_config(), PreferenceMap::new().with("f", false)).await;
    h.api.pause(ApiOp::PatchPreferences);
    h.api.fail_next(ApiOp::PatchPreferences);

    h.engine.toggle(Section::Job, "f").unwrap();
    h.advance(DEBOUNCE_MS).await;
    assert_eq!(patches(&h).len(), 1);

    // Starts a new burst on top of the one being sent.
    assert!(!h.engine.toggle(Section::Job, "g").unwrap());
    h.api.resume(ApiOp::PatchPreferences);
    h.settle().await;

    let live = h.engine.effective_preferences(Section::Job);
    assert_eq!(live.get("f"), Some(false));
    assert_eq!(live.get("g"), Some(false));
    assert!(h.engine.is_toggle_pending(Section::Job, "g"));

    h.advance(DEBOUNCE_MS).await;
    assert_eq!(
        patches(&h).last(),
        Some(&ApiCall::PatchPreferences(
            Section::Job,
            PreferenceMap::new().with("f", false).with("g", false)
        ))
    );
    assert_eq!(h.reporter.reports(), vec!["toggle-preferences".to_string()]);
}

#[tokio::test]
async fn coupled_fields_change_before_the_write_and_travel_with_it() {
    let config = EngineConfig {
        coupling: PreferenceRules::new().couple(
            "show_photos",
            "show_primary_photo",
            Coupling::Same,
        ),
        ..quiet_config()
    };
    let h = with_record(config, PreferenceMap::new()).await;

    assert!(!h.engine.toggle(Section::Job, "show_photos").unwrap());
    let live = h.engine.effective_preferences(Section::Job);
    assert_eq!(live.get("show_primary_photo"), Some(false));
    assert!(h.engine.is_toggle_pending(Section::Job, "show_primary_photo"));

    h.advance(DEBOUNCE_MS).await;
    assert_eq!(
        patches(&h),
        vec![ApiCall::PatchPreferences(
            Section::Job,
            PreferenceMap::new()
                .with("show_photos", false)
                .with("show_primary_photo", false)
        )]
    );
}

#[tokio::test]
async fn toggles_before_the_record_exists_ride_along_with_creation() {
    let config = EngineConfig {
        default_preferences: PreferenceMap::new().with("show_company", true),
        ..quiet_config()
    };
    let h = harness_with(TestProfileApi::default(), config);
    h.engine.hydrate(Section::Job).await.unwrap();

    assert!(!h.engine.toggle(Section::Job, "show_title").unwrap());
    assert!(!h.engine.is_toggle_pending(Section::Job, "show_title"));
    h.advance(DEBOUNCE_MS).await;
    assert!(patches(&h).is_empty());

    let expected = PreferenceMap::new()
        .with("show_company", true)
        .with("show_title", false);
    assert_eq!(h.engine.effective_preferences(Section::Job), expected);
    assert_eq!(h.engine.creation_preferences(Section::Job), expected.serialize());

    // The caller created the record with that payload.
    h.api.seed_preferences(Section::Job, RecordId(9), &expected);
    h.engine.record_created(Section::Job, RecordId(9));

    assert!(!h.engine.toggle(Section::Job, "show_company").unwrap());
    h.advance(DEBOUNCE_MS).await;
    assert_eq!(
        patches(&h),
        vec![ApiCall::PatchPreferences(
            Section::Job,
            expected.clone().with("show_company", false)
        )]
    );
}

#[tokio::test]
async fn sections_debounce_independently() {
    let api = TestProfileApi::default();
    api.seed_preferences(Section::Job, RecordId(1), &PreferenceMap::new());
    api.seed_preferences(Section::Meet, RecordId(2), &PreferenceMap::new());
    let h = harness(api);
    h.engine.hydrate_all().await.unwrap();

    h.engine.toggle(Section::Job, "f").unwrap();
    h.advance(100).await;
    h.engine.toggle(Section::Meet, "f").unwrap();
    h.advance(50).await;

    assert_eq!(
        patches(&h),
        vec![ApiCall::PatchPreferences(
            Section::Job,
            PreferenceMap::new().with("f", false)
        )]
    );
    assert!(h.engine.is_toggle_pending(Section::Meet, "f"));
    assert!(!h.engine.is_toggle_pending(Section::Job, "f"));

    h.advance(100).await;
    assert_eq!(patches(&h).len(), 2);
    assert_eq!(
        h.api.stored_preferences(Section::Meet).unwrap().get("f"),
        Some(false)
    );
}

#[tokio::test]
async fn refreshes_are_held_off_while_a_burst_is_pending() {
    let h = with_record(quiet_config(), PreferenceMap::new().with("f", false)).await;
    let key = CacheKey::Preferences(Section::Job);

    h.engine.toggle(Section::Job, "f").unwrap();
    h.engine.revalidate(&[key]).await.unwrap();

    assert_eq!(h.api.calls_of(ApiOp::GetPreferences).len(), 1);
    assert_eq!(h.engine.effective_preferences(Section::Job).get("f"), Some(true));

    h.advance(DEBOUNCE_MS).await;
    h.engine.revalidate(&[key]).await.unwrap();
    assert_eq!(h.api.calls_of(ApiOp::GetPreferences).len(), 2);
    assert_eq!(h.engine.effective_preferences(Section::Job).get("f"), Some(true));
}

#[tokio::test]
async fn toggling_after_unmount_is_refused() {
    let h = with_record(quiet_config(), PreferenceMap::new()).await;
    h.engine.unmount();
    assert!(matches!(
        h.engine.toggle(Section::Job, "f"),
        Err(EngineError::Unmounted)
    ));
}

#[tokio::test]
async fn toggle_before_hydration_is_written_once_the_record_turns_up() {
    let api = TestProfileApi::default();
    api.seed_preferences(Section::Job, RecordId(7), &PreferenceMap::new().with("f", true));
    let h = harness(api);

    assert!(!h.engine.toggle(Section::Job, "f").unwrap());
    h.engine.hydrate(Section::Job).await.unwrap();
    assert_eq!(h.engine.effective_preferences(Section::Job).get("f"), Some(false));
    assert!(h.engine.is_toggle_pending(Section::Job, "f"));

    h.advance(DEBOUNCE_MS).await;
    assert_eq!(
        patches(&h),
        vec![ApiCall::PatchPreferences(
            Section::Job,
            PreferenceMap::new().with("f", false)
        )]
    );
    assert_eq!(h.api.stored_preferences(Section::Job).unwrap().get("f"), Some(false));
    assert_eq!(h.engine.effective_preferences(Section::Job).get("f"), Some(false));
    assert!(h.reporter.reports().is_empty());
}

#[tokio::test]
async fn toggle_made_while_the_first_read_is_in_flight_is_not_lost() {
    let api = TestProfileApi::default();
    api.seed_preferences(
        Section::Job,
        RecordId(7),
        &PreferenceMap::new().with("f", true).with("g", true),
    );
    let h = harness(api);

    h.api.pause(ApiOp::GetPreferences);
    let engine = h.engine.clone();
    let hydrate = tokio::spawn(async move { engine.hydrate(Section::Job).await });
    h.settle().await;

    h.engine.toggle(Section::Job, "g").unwrap();
    h.api.resume(ApiOp::GetPreferences);
    hydrate.await.unwrap().unwrap();

    h.advance(DEBOUNCE_MS).await;
    assert_eq!(
        patches(&h),
        vec![ApiCall::PatchPreferences(
            Section::Job,
            PreferenceMap::new().with("f", true).with("g", false)
        )]
    );
    assert_eq!(
        h.engine.effective_preferences(Section::Job),
        PreferenceMap::new().with("f", true).with("g", false)
    );
}
