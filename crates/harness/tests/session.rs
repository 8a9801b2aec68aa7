use varsync_core::VarsyncConfig;
use varsync_engine::{Denial, EngineError, RenderingSelector};
use varsync_harness::{TestPeer, TestSite, init_tracing};
use varsync_storage::{SqliteStore, VariationStore};

// ============================================================================
// Single actor
// ============================================================================

#[test]
fn first_commit_creates_aggregate_and_second_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut peer = TestPeer::new("alice")?;

    let mut session = peer
        .engine
        .open_session("page/hero", "default", RenderingSelector::default())?;
    assert!(session.is_empty());
    let first = session.add_variation()?;
    let second = session.add_variation()?;
    assert_eq!(session.stubs()[0].id, second);

    let report = peer.engine.commit(&session)?;
    assert_eq!(report.modified.len(), 2);
    assert!(report.modified.contains(&first));
    assert!(report.modified.contains(&second));

    let aggregate = peer
        .engine
        .store()
        .find_aggregate("page/hero")?
        .ok_or("aggregate missing")?;
    let records = peer.engine.store().list_records(aggregate.id)?;
    let mut names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["New variation", "New variation1"]);

    let reopened = peer
        .engine
        .open_session("page/hero", "default", RenderingSelector::default())?;
    let order: Vec<_> = reopened.stubs().iter().map(|s| s.id).collect();
    assert_eq!(order, vec![second, first]);

    let again = peer.engine.commit(&reopened)?;
    assert!(again.modified.is_empty());
    Ok(())
}

#[test]
fn single_variation_cannot_be_committed() -> Result<(), Box<dyn std::error::Error>> {
    let mut peer = TestPeer::new("alice")?;
    let mut session = peer
        .engine
        .open_session("page/hero", "default", RenderingSelector::default())?;
    session.add_variation()?;

    let err = peer.engine.commit(&session).unwrap_err();
    assert!(matches!(err, EngineError::NotEnoughVariations { count: 1 }));
    assert!(peer.engine.store().find_aggregate("page/hero")?.is_none());
    Ok(())
}

#[test]
fn rejected_first_commit_leaves_no_aggregate() -> Result<(), Box<dyn std::error::Error>> {
    let mut peer = TestPeer::new("alice")?;
    let mut session = peer
        .engine
        .open_session("page/hero", "default", RenderingSelector::default())?;
    session.add_variation()?;
    let bad = session.add_variation()?;
    session.rename(bad, "???")?;

    let err = peer.engine.commit(&session).unwrap_err();
    assert!(matches!(err, EngineError::NameRejected { .. }));
    assert!(peer.engine.store().find_aggregate("page/hero")?.is_none());
    Ok(())
}

#[test]
fn edits_round_trip_through_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let mut peer = TestPeer::new("alice")?;
    peer.engine.store_mut().register_item("{PROMO}", "/renderings/promo")?;
    let (aggregate_id, ids) = peer.seed("page/hero", &[("Original", 0), ("Second", 10)])?;

    let mut session = peer
        .engine
        .open_session("page/hero", "default", RenderingSelector::default())?;
    assert!(session.toggle_hide(ids[1])?);
    session.set_datasource(ids[0], "{ABOUT}")?;
    session.set_replacement(ids[0], "{PROMO},extra")?;
    peer.engine.commit(&session)?;

    let stubs = peer.stubs(aggregate_id)?;
    assert_eq!(stubs[0].replacement.as_ref().map(|r| r.as_str()), Some("{PROMO}"));
    assert_eq!(stubs[0].datasource.as_ref().map(|r| r.as_str()), Some("{ABOUT}"));
    assert!(stubs[1].hide_component);

    let reopened = peer
        .engine
        .open_session("page/hero", "default", RenderingSelector::default())?;
    assert!(peer.engine.commit(&reopened)?.modified.is_empty());
    Ok(())
}

#[test]
fn reset_removes_aggregate_and_reports_cache_scope() -> Result<(), Box<dyn std::error::Error>> {
    let mut peer = TestPeer::new("alice")?;
    let (aggregate_id, ids) = peer.seed("page/hero", &[("A", 0), ("B", 1)])?;
    let session = peer
        .engine
        .open_session("page/hero", "default", RenderingSelector::default())?;

    let report = peer.engine.reset(&session)?;
    assert_eq!(report.removed, Some(aggregate_id));
    assert_eq!(report.cache_scope, "page/hero");
    assert!(peer.engine.store().find_aggregate("page/hero")?.is_none());
    assert!(peer.engine.store().get_record(ids[0])?.is_none());

    let nothing = peer.engine.reset(&session)?;
    assert_eq!(nothing.removed, None);
    Ok(())
}

#[test]
fn reset_refused_without_delete_permission() -> Result<(), Box<dyn std::error::Error>> {
    let mut peer = TestPeer::new("alice")?;
    let (aggregate_id, _) = peer.seed("page/hero", &[("A", 0), ("B", 1)])?;
    peer.engine
        .store_mut()
        .set_aggregate_access(aggregate_id, true, false)?;
    let session = peer
        .engine
        .open_session("page/hero", "default", RenderingSelector::default())?;

    let err = peer.engine.reset(&session).unwrap_err();
    assert!(matches!(
        err,
        EngineError::PermissionDenied(ref d) if d == &vec![Denial::AggregateDelete(aggregate_id)]
    ));
    assert!(peer.engine.store().find_aggregate("page/hero")?.is_some());
    Ok(())
}

#[test]
fn copied_stub_from_other_owner_leaves_store_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let mut peer = TestPeer::new("alice")?;
    let (one, _) = peer.seed("page/one", &[("A", 0)])?;
    let (two, ids) = peer.seed("page/two", &[("D", 0), ("E", 1)])?;
    let copied = peer.stubs(one)?.remove(0);
    let kept = peer.stubs(two)?.remove(1);

    let err = peer.engine.apply(two, &[copied, kept]).unwrap_err();
    assert!(matches!(err, EngineError::IdentityTaken(_)));
    let names: Vec<String> = peer.stubs(two)?.into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["D", "E"]);
    assert!(peer.engine.store().get_record(ids[0])?.is_some());
    assert_eq!(peer.stubs(one)?.len(), 1);
    Ok(())
}

// ============================================================================
// Shared store
// ============================================================================

#[test]
fn lock_blocks_other_actor_until_elevated() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let site = TestSite::new()?;
    let mut alice = site.peer("alice")?;
    let (aggregate_id, ids) = alice.seed("page/hero", &[("A", 0), ("B", 1)])?;
    alice.engine.store_mut().set_lock(ids[0], Some("alice"))?;

    let mut bob = site.peer("bob")?;
    let mut session = bob
        .engine
        .open_session("page/hero", "default", RenderingSelector::default())?;
    session.toggle_hide(ids[0])?;
    let err = bob.engine.commit(&session).unwrap_err();
    assert!(matches!(
        err,
        EngineError::PermissionDenied(ref d) if d == &vec![Denial::Locked(ids[0])]
    ));

    // The lock holder itself is not blocked by its own lock.
    let own = alice.engine.prepare(aggregate_id, session.stubs())?;
    assert_eq!(own.plan.updates.len(), 1);

    let config = VarsyncConfig {
        elevated: true,
        ..VarsyncConfig::default()
    };
    let mut admin = TestPeer::with_config(SqliteStore::open(site.path(), "bob")?.elevated(true), config)?;
    let report = admin.engine.commit(&session)?;
    assert_eq!(report.modified.len(), 1);

    let seen_by_alice = alice.stubs(aggregate_id)?;
    assert!(seen_by_alice[0].hide_component);
    Ok(())
}
