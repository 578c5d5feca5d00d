use super::*;
use crate::auth::{AuthUser, SessionAuth};
use crate::test_helpers::{ManualStore, MockCompletions, stored, view, wait_for, wait_until};

fn mounted_view(store: &Arc<ManualStore>) -> ChatView {
    let v = view(
        Arc::new(SessionAuth::signed_in(AuthUser::new("u1"))),
        store.clone(),
        Arc::new(MockCompletions::default()),
    );
    v.mount();
    v
}

async fn seeded_view() -> (Arc<ManualStore>, ChatView) {
    let store = Arc::new(ManualStore::default());
    let v = mounted_view(&store);
    wait_until(|| !store.queries().is_empty()).await;
    store.push(
        "u1",
        vec![
            stored("m1", "u1", "user", "Hello", Some(1_000)),
            stored("m2", "u1", "assistant", "Hi there", Some(2_000)),
        ],
    );
    wait_for(&v, |s| s.messages.len() == 2).await;
    (store, v)
}

// =========================================================================
// render
// =========================================================================

#[test]
fn fresh_view_renders_empty_submit_form() {
    let state = ViewState::default();
    let rendered = render_state(&state);
    assert!(rendered.history.is_empty());
    assert_eq!(rendered.prompt, "");
    assert_eq!(rendered.button_label, LABEL_SUBMIT);
    assert!(!rendered.submit_disabled);
}

#[test]
fn button_label_follows_loading_then_edit() {
    let mut state = ViewState { edit_id: Some("m1".into()), ..ViewState::default() };
    assert_eq!(render_state(&state).button_label, LABEL_UPDATE);

    state.loading = true;
    let rendered = render_state(&state);
    assert_eq!(rendered.button_label, LABEL_LOADING);
    assert!(rendered.submit_disabled);
}

#[test]
fn render_formats_timestamps_and_marks_editable_user_messages() {
    let state = ViewState {
        messages: vec![
            ChatMessage {
                id: Some("m1".into()),
                role: Role::User,
                content: "Hello".into(),
                created_at: Some(crate::message::Timestamp(1_704_164_645_000)),
                updated_at: None,
            },
            ChatMessage {
                id: Some("m2".into()),
                role: Role::Assistant,
                content: "Hi".into(),
                created_at: None,
                updated_at: None,
            },
        ],
        edit_id: Some("m1".into()),
        ..ViewState::default()
    };
    let rendered = render_state(&state);
    assert_eq!(rendered.history[0].created_at.as_deref(), Some("2024-01-02 03:04:05 UTC"));
    assert!(rendered.history[0].editable);
    assert!(rendered.history[0].editing);
    assert_eq!(rendered.history[1].created_at, None);
    assert!(!rendered.history[1].editable);
    assert!(!rendered.history[1].editing);
}

// =========================================================================
// edit initiation
// =========================================================================

#[tokio::test]
async fn begin_edit_copies_user_message_into_draft() {
    let (_store, v) = seeded_view().await;
    assert!(v.begin_edit("m1"));
    let state = v.state();
    assert_eq!(state.prompt, "Hello");
    assert_eq!(state.edit_id.as_deref(), Some("m1"));
    assert_eq!(v.render().button_label, LABEL_UPDATE);
}

#[tokio::test]
async fn begin_edit_refuses_assistant_and_unknown_messages() {
    let (_store, v) = seeded_view().await;
    v.set_prompt("draft");
    assert!(!v.begin_edit("m2"));
    assert!(!v.begin_edit("nope"));
    let state = v.state();
    assert_eq!(state.prompt, "draft");
    assert_eq!(state.edit_id, None);
}

#[tokio::test]
async fn cancel_edit_keeps_draft() {
    let (_store, v) = seeded_view().await;
    assert!(v.begin_edit("m1"));
    v.cancel_edit();
    let state = v.state();
    assert_eq!(state.edit_id, None);
    assert_eq!(state.prompt, "Hello");
}

#[tokio::test]
async fn state_changes_bump_revision() {
    let store = Arc::new(ManualStore::default());
    let v = mounted_view(&store);
    let rx = v.changes();
    let before = *rx.borrow();
    v.set_prompt("typing");
    assert!(*rx.borrow() > before);
}

#[tokio::test]
async fn mount_twice_opens_one_subscription() {
    let store = Arc::new(ManualStore::default());
    let v = mounted_view(&store);
    v.mount();
    wait_until(|| !store.queries().is_empty()).await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(store.queries(), vec!["u1".to_owned()]);
    assert!(v.is_mounted());
}
