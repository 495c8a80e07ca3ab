mod common;

use common::{harness, ids};
use facets_client::ElectionOutcome;
use facets_client::infra::testing::{ApiCall, ApiOp, TestProfileApi};
use facets_model::Section;

#[tokio::test]
async fn first_photo_is_elected_when_nobody_is_primary() {
    let api = TestProfileApi::default();
    let a = api.add_photo(Section::Job, false);
    let b = api.add_photo(Section::Job, false);
    let h = harness(api);
    h.engine.hydrate(Section::Job).await.unwrap();

    assert_eq!(
        h.engine.ensure_primary(Section::Job).await,
        ElectionOutcome::Elected(a.id)
    );
    assert_eq!(h.primaries(Section::Job), vec![a.id]);
    assert_eq!(ids(&h.photos(Section::Job)), vec![a.id, b.id]);
    assert_eq!(
        h.api.calls_of(ApiOp::SetPrimary),
        vec![ApiCall::SetPrimary(a.id, Section::Job)]
    );

    // Re-rendering does not re-run the pass.
    assert_eq!(
        h.engine.ensure_primary(Section::Job).await,
        ElectionOutcome::AlreadyChecked
    );
    assert_eq!(h.api.calls_of(ApiOp::SetPrimary).len(), 1);
}

#[tokio::test]
async fn failed_election_is_silent_and_waits_for_the_next_mount() {
    let api = TestProfileApi::default();
    let a = api.add_photo(Section::Job, false);
    api.add_photo(Section::Job, false);
    let h = harness(api);
    h.engine.hydrate(Section::Job).await.unwrap();
    h.api.fail_next(ApiOp::SetPrimary);

    assert_eq!(
        h.engine.ensure_primary(Section::Job).await,
        ElectionOutcome::Failed(a.id)
    );
    assert!(h.primaries(Section::Job).is_empty());
    assert!(h.reporter.reports().is_empty());

    assert_eq!(
        h.engine.ensure_primary(Section::Job).await,
        ElectionOutcome::AlreadyChecked
    );
    assert_eq!(h.api.calls_of(ApiOp::SetPrimary).len(), 1);

    h.engine.mount(Section::Job);
    assert_eq!(
        h.engine.ensure_primary(Section::Job).await,
        ElectionOutcome::Elected(a.id)
    );
    assert_eq!(h.primaries(Section::Job), vec![a.id]);
    assert_eq!(h.api.calls_of(ApiOp::SetPrimary).len(), 2);
}

#[tokio::test]
async fn empty_section_is_checked_again_once_photos_arrive() {
    let h = harness(TestProfileApi::default());
    h.engine.hydrate(Section::Meet).await.unwrap();
    assert_eq!(
        h.engine.ensure_primary(Section::Meet).await,
        ElectionOutcome::NothingToElect
    );

    let photo = h.api.add_photo(Section::Meet, false);
    h.engine.hydrate(Section::Meet).await.unwrap();
    assert_eq!(
        h.engine.ensure_primary(Section::Meet).await,
        ElectionOutcome::Elected(photo.id)
    );
}

#[tokio::test]
async fn existing_primary_is_left_alone() {
    let api = TestProfileApi::default();
    api.add_photo(Section::Mentorship, false);
    let b = api.add_photo(Section::Mentorship, true);
    let h = harness(api);
    h.engine.hydrate(Section::Mentorship).await.unwrap();

    assert_eq!(
        h.engine.ensure_primary(Section::Mentorship).await,
        ElectionOutcome::AlreadyPrimary(b.id)
    );
    assert!(h.api.writes().is_empty());
}

#[tokio::test]
async fn duplicate_primaries_are_repaired_to_the_first_flagged() {
    let api = TestProfileApi::default();
    let a = api.add_photo(Section::Networking, false);
    let b = api.add_photo(Section::Networking, true);
    let c = api.add_photo(Section::Networking, true);
    let h = harness(api);
    h.engine.hydrate(Section::Networking).await.unwrap();
    assert_eq!(h.primaries(Section::Networking), vec![b.id, c.id]);

    assert_eq!(
        h.engine.ensure_primary(Section::Networking).await,
        ElectionOutcome::Elected(b.id)
    );
    assert_eq!(h.primaries(Section::Networking), vec![b.id]);
    assert!(
        h.api
            .photos(Section::Networking)
            .iter()
            .all(|p| p.is_primary_for(Section::Networking) == (p.id == b.id))
    );
    assert!(!h.primaries(Section::Networking).contains(&a.id));
}

#[tokio::test]
async fn every_non_empty_section_ends_with_exactly_one_primary() {
    let api = TestProfileApi::default();
    api.add_photo(Section::Job, false);
    api.add_photo(Section::Job, false);
    api.add_photo(Section::Mentorship, true);
    api.add_photo(Section::Meet, true);
    api.add_photo(Section::Meet, true);
    let h = harness(api);
    h.engine.hydrate_all().await.unwrap();

    for section in Section::ALL {
        h.engine.ensure_primary(section).await;
    }

    for section in Section::ALL {
        let expected = usize::from(!h.photos(section).is_empty());
        assert_eq!(h.primaries(section).len(), expected, "{section}");
    }
}
