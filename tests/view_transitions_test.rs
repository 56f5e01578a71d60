//! Expand/collapse behaviour of the view controller against a scripted store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::fixtures::{PROJECT, abc_graph, source_tree, source_tree_features, store_with};
use common::mock::{FETCH_AGGREGATES, FETCH_CHILDREN, ScriptedStore};
use hierview::app::controller::{TransitionOutcome, ViewController};
use hierview::app::session::GraphSession;
use hierview::config::SessionConfig;
use hierview::domain::error::ViewError;

async fn controller(store: Arc<ScriptedStore>) -> ViewController {
    ViewController::load(store, PROJECT).await.unwrap()
}

fn ids(controller: &ViewController) -> Vec<String> {
    let mut ids = controller.state().visible_ids();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_expand_then_collapse_restores_roots() {
    let store = Arc::new(ScriptedStore::new(store_with(abc_graph(), vec![])));
    let mut ctl = controller(store.clone()).await;
    let initial = ctl.state().clone();
    assert_eq!(ids(&ctl), vec!["A"]);
    assert!(ctl.state().node("A").unwrap().has_children);

    let outcome = ctl.expand("A").await.unwrap();
    assert_eq!(
        outcome,
        TransitionOutcome::Expanded {
            node_id: "A".into(),
            added_nodes: 2,
            added_edges: 1,
            aggregates: 0,
        }
    );
    assert_eq!(ids(&ctl), vec!["A", "B", "C"]);
    assert!(ctl.state().node("A").unwrap().expanded);
    assert_eq!(ctl.state().edges()[0].id, "e_1");
    assert!(ctl.state().aggregates().is_empty());

    let outcome = ctl.collapse("A").await.unwrap();
    assert!(matches!(
        outcome,
        TransitionOutcome::Collapsed { removed_nodes: 2, .. }
    ));
    assert!(ctl.state().same_content(&initial));
    assert!(ctl.state().revision() > initial.revision());
}

#[tokio::test]
async fn test_aggregates_summarize_hidden_connectivity() {
    let store = Arc::new(ScriptedStore::new(store_with(
        source_tree(),
        source_tree_features(),
    )));
    let mut ctl = controller(store).await;

    let outcome = ctl.expand("src").await.unwrap();
    assert!(matches!(
        outcome,
        TransitionOutcome::Expanded { added_nodes: 2, added_edges: 1, aggregates: 1, .. }
    ));
    let agg = &ctl.state().aggregates()[0];
    assert_eq!(agg.id, "agg_a.cpp_b.cpp_aggregated");
    assert_eq!(agg.weight, 1);
    assert_eq!(agg.breakdown["invokes"], 1);
    assert!(agg.is_aggregated);

    // f→cfg resolves to f→a.cpp and is dropped as parent/child noise.
    ctl.expand("a.cpp").await.unwrap();
    let agg_ids: Vec<_> = ctl.state().aggregates().iter().map(|a| a.id.as_str()).collect();
    assert_eq!(agg_ids, vec!["agg_f_b.cpp_aggregated"]);
    assert!(ctl.state().violations().is_empty());
    assert!(!ctl.state().contains("cfg"), "variables are never listed as children");
}

#[tokio::test]
async fn test_collapse_drops_whole_subtree() {
    let store = Arc::new(ScriptedStore::new(store_with(source_tree(), vec![])));
    let mut ctl = controller(store).await;
    ctl.expand("src").await.unwrap();
    ctl.expand("a.cpp").await.unwrap();
    ctl.expand("b.cpp").await.unwrap();
    assert_eq!(ctl.state().node_count(), 6);

    let outcome = ctl.collapse("src").await.unwrap();
    assert!(matches!(
        outcome,
        TransitionOutcome::Collapsed { removed_nodes: 5, aggregates: 0, .. }
    ));
    assert_eq!(ids(&ctl), vec!["src"]);
    assert!(ctl.state().edges().is_empty());
}

#[tokio::test]
async fn test_failed_children_fetch_leaves_state_unchanged() {
    let store = Arc::new(ScriptedStore::new(store_with(source_tree(), vec![])));
    let mut ctl = controller(store.clone()).await;
    ctl.expand("src").await.unwrap();
    let before = ctl.state().clone();

    store.fail(FETCH_CHILDREN);
    let err = ctl.expand("a.cpp").await.unwrap_err();
    assert!(matches!(err, ViewError::FetchFailed { operation: "fetch_children", .. }));
    assert!(ctl.state().same_content(&before));
    assert_eq!(ctl.state().revision(), before.revision());

    store.heal(FETCH_CHILDREN);
    assert!(matches!(
        ctl.expand("a.cpp").await.unwrap(),
        TransitionOutcome::Expanded { .. }
    ));
}

#[tokio::test]
async fn test_failed_aggregate_fetch_leaves_state_unchanged() {
    let store = Arc::new(ScriptedStore::new(store_with(source_tree(), vec![])));
    let mut ctl = controller(store.clone()).await;
    ctl.expand("src").await.unwrap();
    let before = ctl.state().clone();

    store.fail(FETCH_AGGREGATES);
    assert!(ctl.expand("b.cpp").await.is_err());
    assert!(ctl.collapse("src").await.is_err());
    assert!(ctl.state().same_content(&before));
    assert!(!ctl.state().node("b.cpp").unwrap().expanded);
}

#[tokio::test]
async fn test_leaf_and_repeat_requests() {
    let store = Arc::new(ScriptedStore::new(store_with(source_tree(), vec![])));
    let mut ctl = controller(store.clone()).await;
    ctl.expand("src").await.unwrap();
    ctl.expand("a.cpp").await.unwrap();
    let calls = store.calls(FETCH_CHILDREN);

    assert_eq!(
        ctl.expand("f").await.unwrap(),
        TransitionOutcome::EmptyExpansion { node_id: "f".into() }
    );
    assert!(!ctl.state().node("f").unwrap().expanded);

    assert_eq!(
        ctl.expand("a.cpp").await.unwrap(),
        TransitionOutcome::Unchanged { node_id: "a.cpp".into() }
    );
    assert_eq!(
        ctl.collapse("b.cpp").await.unwrap(),
        TransitionOutcome::Unchanged { node_id: "b.cpp".into() }
    );
    // Only the leaf probe reached the store.
    assert_eq!(store.calls(FETCH_CHILDREN), calls + 1);

    assert!(matches!(
        ctl.toggle("ghost").await,
        Err(ViewError::UnknownNode(id)) if id == "ghost"
    ));
}

#[tokio::test]
async fn test_toggle_switches_direction() {
    let store = Arc::new(ScriptedStore::new(store_with(abc_graph(), vec![])));
    let mut ctl = controller(store).await;
    assert!(matches!(ctl.toggle("A").await.unwrap(), TransitionOutcome::Expanded { .. }));
    assert!(matches!(ctl.toggle("A").await.unwrap(), TransitionOutcome::Collapsed { .. }));
    assert_eq!(ids(&ctl), vec!["A"]);
}

#[tokio::test]
async fn test_concurrent_toggles_are_serialized() {
    let store = Arc::new(ScriptedStore::new(store_with(source_tree(), vec![])));
    let session = GraphSession::open(store, PROJECT, SessionConfig::default())
        .await
        .unwrap();

    let (first, second) = tokio::join!(session.toggle_node("src"), session.toggle_node("src"));
    let mut kinds = [first.unwrap(), second.unwrap()]
        .iter()
        .map(|o| serde_json::to_value(o).unwrap()["kind"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    kinds.sort();
    assert_eq!(kinds, vec!["collapsed", "expanded"]);
    assert_eq!(session.visible_ids().await, vec!["src".to_string()]);
    assert_eq!(session.frame().await.stats.displayed_edges, 0);
}

#[tokio::test]
async fn test_unapplied_plan_leaves_view_untouched() {
    let store = Arc::new(ScriptedStore::new(store_with(abc_graph(), vec![])));
    let mut ctl = controller(store).await;
    let before = ctl.state().revision();

    let planned = ctl.plan_expand("A").await.unwrap();
    assert_eq!(ids(&ctl), vec!["A"]);
    drop(planned);
    assert_eq!(ctl.state().revision(), before);

    let planned = ctl.plan_expand("A").await.unwrap();
    assert!(matches!(ctl.apply(planned), TransitionOutcome::Expanded { added_nodes: 2, .. }));
    assert_eq!(ids(&ctl), vec!["A", "B", "C"]);
}

#[tokio::test(start_paused = true)]
async fn test_close_during_fetch_discards_the_transition() {
    let store = Arc::new(
        ScriptedStore::new(store_with(abc_graph(), vec![])).with_children_delay(Duration::from_secs(1)),
    );
    let session = GraphSession::open(store.clone(), PROJECT, SessionConfig::default())
        .await
        .unwrap();

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.expand("A").await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.close().await;

    assert!(matches!(pending.await.unwrap(), Err(ViewError::SessionClosed)));
    assert_eq!(store.calls(FETCH_CHILDREN), 1);
    assert_eq!(session.visible_ids().await, vec!["A".to_string()]);
    assert_eq!(session.frame().await.stats.node_count, 1);
}
