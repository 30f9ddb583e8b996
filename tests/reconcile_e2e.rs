use std::collections::HashMap;
use std::time::Duration;

use rosterlink::{
    find_unmatched, matcher_fn, reconcile, reconcile_async, AliasError, AliasStore,
    ExactLabelMatcher, MatcherError, PromptMatcher, ReconcileError,
};

fn one_pair(input: &str, destination: &str) -> HashMap<String, String> {
    HashMap::from([(input.to_string(), destination.to_string())])
}

#[test]
fn unmatched_email_joins_copy_named_row() {
    let mut store = AliasStore::new();
    let id = store.new_entity(["student@mail.com"]).unwrap();
    assert_eq!(id.get(), 400);

    let mut matcher = matcher_fn(|_: &[String], _: &[String]| {
        Ok(one_pair("student@mail.com", "Name One (copy 1)"))
    });
    reconcile(&mut store, &mut matcher, [id], [["Name One (copy 1)"]]).unwrap();

    assert_eq!(store.id_of("Name One (copy 1)").unwrap().get(), 400);
}

#[test]
fn only_unmatched_sides_reach_the_matcher() {
    let mut store = AliasStore::new();
    let ann = store.new_entity(["ann@uni.edu", "Ann One"]).unwrap();
    let bob = store.new_entity(["bob@uni.edu"]).unwrap();
    let groups = vec![
        vec!["Ann One", "aone"],
        vec!["Robert Two", "btwo"],
        vec!["Cara Three", "cthree"],
    ];

    let unmatched = find_unmatched(&store, [ann, bob], &groups).unwrap();
    assert_eq!(unmatched.inputs, ["bob@uni.edu"]);
    assert_eq!(unmatched.destinations, ["Robert Two", "Cara Three"]);

    let mut seen = Vec::new();
    let mut matcher = matcher_fn(|inputs: &[String], destinations: &[String]| {
        seen.push((inputs.to_vec(), destinations.to_vec()));
        Ok(one_pair("bob@uni.edu", "Robert Two"))
    });
    let report = reconcile(&mut store, &mut matcher, [ann, bob], &groups).unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].entity, bob);
    assert_eq!(store.id_of("Robert Two").unwrap(), bob);
    // Only the shown label is merged; the rest of the group binds later.
    assert!(!store.contains_alias("btwo"));
}

#[test]
fn rejected_mapping_leaves_store_unchanged() {
    let mut store = AliasStore::new();
    let a = store.new_entity(["a@mail.com"]).unwrap();
    let b = store.new_entity(["b@mail.com"]).unwrap();
    let before = store.to_string();

    // Both inputs claim the same destination label.
    let mut matcher = matcher_fn(|_: &[String], _: &[String]| {
        Ok(HashMap::from([
            ("a@mail.com".to_string(), "Ann One".to_string()),
            ("b@mail.com".to_string(), "Ann One".to_string()),
        ]))
    });
    let err = reconcile(&mut store, &mut matcher, [a, b], [["Ann One"]]).unwrap_err();

    assert!(matches!(err, ReconcileError::InvalidMatch { .. }), "{err}");
    assert_eq!(store.to_string(), before);
}

#[test]
fn matcher_pairing_two_known_entities_is_a_conflict() {
    let mut store = AliasStore::new();
    let a = store.new_entity(["a@mail.com"]).unwrap();
    let b = store.new_entity(["b@mail.com"]).unwrap();
    let before = store.to_string();

    let mut matcher =
        matcher_fn(|_: &[String], _: &[String]| Ok(one_pair("a@mail.com", "b@mail.com")));
    let err = reconcile(&mut store, &mut matcher, [a, b], [["Ann One"]]).unwrap_err();

    assert!(
        matches!(
            err,
            ReconcileError::Pair {
                source: AliasError::ConflictingEntities { .. },
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(store.to_string(), before);
    assert_ne!(store.id_of("a@mail.com").unwrap(), store.id_of("b@mail.com").unwrap());
}

#[test]
fn prompt_transcript_drives_reconciliation() {
    let mut store = AliasStore::new();
    let a = store.new_entity(["a@mail.com"]).unwrap();
    let b = store.new_entity(["b@mail.com"]).unwrap();

    let mut matcher = PromptMatcher::new("\n2\n".as_bytes(), Vec::new());
    let report = reconcile(
        &mut store,
        &mut matcher,
        [a, b],
        [["Ann One"], ["Bob Two"]],
    )
    .unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(store.id_of("Bob Two").unwrap(), b);
    assert!(!store.contains_alias("Ann One"));
    assert_eq!(report.unpaired_inputs().collect::<Vec<_>>(), ["a@mail.com"]);
}

#[test]
fn exact_matcher_links_case_variants() {
    let mut store = AliasStore::new();
    let id = store.new_entity(["ann one"]).unwrap();
    reconcile(&mut store, &mut ExactLabelMatcher, [id], [["Ann One"]]).unwrap();
    assert_eq!(store.id_of("Ann One").unwrap(), id);
}

#[test]
fn report_serializes() {
    let mut store = AliasStore::new();
    let id = store.new_entity(["student@mail.com"]).unwrap();
    let mut matcher = matcher_fn(|_: &[String], _: &[String]| {
        Ok(one_pair("student@mail.com", "Name One"))
    });
    let report = reconcile(&mut store, &mut matcher, [id], [["Name One"]]).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["applied"][0]["entity"], 400);
    assert_eq!(json["unmatched"]["destinations"][0], "Name One");
    assert!(json["run_at"].is_string());
}

#[tokio::test]
async fn async_matcher_applies_after_resolving() {
    let mut store = AliasStore::new();
    let id = store.new_entity(["student@mail.com"]).unwrap();

    let report = reconcile_async(
        &mut store,
        |inputs: Vec<String>, destinations: Vec<String>| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, MatcherError>(one_pair(&inputs[0], &destinations[0]))
        },
        [id],
        [["Name One (copy 1)"]],
    )
    .await
    .unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(store.id_of("Name One (copy 1)").unwrap(), id);
}

#[tokio::test]
async fn abandoned_async_reconciliation_changes_nothing() {
    let mut store = AliasStore::new();
    let id = store.new_entity(["student@mail.com"]).unwrap();
    let before = store.to_string();

    let pending = reconcile_async(
        &mut store,
        |inputs: Vec<String>, destinations: Vec<String>| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, MatcherError>(one_pair(&inputs[0], &destinations[0]))
        },
        [id],
        [["Name One (copy 1)"]],
    );
    let timed_out = tokio::time::timeout(Duration::from_millis(20), pending).await;

    assert!(timed_out.is_err());
    assert_eq!(store.to_string(), before);
    assert!(!store.contains_alias("Name One (copy 1)"));
}
