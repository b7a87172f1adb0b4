//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::github::RepoError;
use proptest::prelude::*;
use reqwest::StatusCode;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new(7, SessionOrigin::new(7, "tester"), "test-app")
}

fn start() -> Event {
    Event::StartWorkflow {
        origin: SessionOrigin::new(7, "tester"),
    }
}

fn count_dispatches(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::Dispatch { .. }))
        .count()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_version_tag_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("latest".to_string()),
        (0u32..100).prop_map(|a| a.to_string()),
        (0u32..100, 0u32..100).prop_map(|(a, b)| format!("{a}.{b}")),
        (0u32..100, 0u32..100, 0u32..100).prop_map(|(a, b, c)| format!("{a}.{b}.{c}")),
        (0u32..100, 0u32..100).prop_map(|(a, b)| format!("{a}.{b}.*")),
        (0u32..100).prop_map(|a| format!("{a}.*")),
    ]
}

fn arb_user_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("main".to_string()),
        Just("create".to_string()),
        Just("destroy".to_string()),
        Just("Create".to_string()),
        arb_version_tag_text(),
        "[a-zA-Z0-9./ -]{0,12}",
    ]
}

fn arb_repo_error() -> impl Strategy<Value = RepoError> {
    prop_oneof![
        Just(RepoError::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            url: "https://api.example.com/dispatches".to_string(),
            body: "boom".to_string(),
        }),
        "[a-z ]{1,20}".prop_map(RepoError::Transport),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (-3i64..3).prop_map(|chat_id| Event::StartWorkflow {
            origin: SessionOrigin::new(chat_id, "tester"),
        }),
        arb_user_text().prop_map(|text| Event::UserText { text }),
        arb_user_text().prop_map(|text| Event::UserText { text }),
        arb_user_text().prop_map(|text| Event::UserText { text }),
        Just(Event::UserCancel),
        proptest::collection::vec("[a-z]{1,8}", 0..4)
            .prop_map(|branches| Event::BranchesListed { branches }),
        arb_repo_error().prop_map(|error| Event::BranchListFailed { error }),
        Just(Event::DispatchSucceeded),
        arb_repo_error().prop_map(|error| Event::DispatchFailed { error }),
        Just(Event::SessionExpired),
    ]
}

fn arb_mode() -> impl Strategy<Value = WorkflowMode> {
    prop_oneof![Just(WorkflowMode::Create), Just(WorkflowMode::Destroy)]
}

fn arb_session_state() -> impl Strategy<Value = ConvState> {
    prop_oneof![
        Just(ConvState::AwaitingBranch),
        "[a-z]{1,8}".prop_map(|branch| ConvState::AwaitingMode { branch }),
        ("[a-z]{1,8}", arb_mode()).prop_map(|(branch, mode)| ConvState::AwaitingTag { branch, mode }),
    ]
}

/// Checks that a successful step only ever extends the collected
/// selections in order
fn step_preserves_order(old: &ConvState, new: &ConvState) -> bool {
    match new {
        ConvState::AwaitingMode { .. } => matches!(old, ConvState::AwaitingBranch),
        ConvState::AwaitingTag { branch, .. } => {
            matches!(old, ConvState::AwaitingMode { branch: b } if b == branch)
        }
        ConvState::Dispatching { request } => matches!(
            old,
            ConvState::AwaitingTag { branch, mode }
                if *branch == request.branch && *mode == request.mode
        ),
        ConvState::AwaitingBranch => matches!(old, ConvState::FetchingBranches),
        ConvState::FetchingBranches => matches!(old, ConvState::Idle),
        ConvState::Idle => true,
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Invariant 1: selections are collected strictly left to right
    #[test]
    fn prop_fields_populated_in_order(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut state = ConvState::Idle;
        let ctx = test_context();

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                prop_assert!(
                    step_preserves_order(&state, &result.new_state),
                    "Out of order step {:?} -> {:?}",
                    state,
                    result.new_state
                );
                state = result.new_state;
            }
        }
    }

    // Invariant 2: at most one dispatch per session, and only from AwaitingTag
    #[test]
    fn prop_dispatch_at_most_once_per_session(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = ConvState::Idle;
        let ctx = test_context();
        let mut dispatches_this_session = 0;

        for event in events {
            let is_start = matches!(event, Event::StartWorkflow { .. });
            if let Ok(result) = transition(&state, &ctx, event) {
                if is_start {
                    dispatches_this_session = 0;
                }
                let dispatched = count_dispatches(&result.effects);
                if dispatched > 0 {
                    let from_tag_stage = matches!(state, ConvState::AwaitingTag { .. });
                    prop_assert!(from_tag_stage, "dispatch from {:?}", state);
                }
                dispatches_this_session += dispatched;
                prop_assert!(dispatches_this_session <= 1);
                state = result.new_state;
            }
        }
    }

    // Invariant 3: once terminated, nothing but a fresh /workflow leads anywhere
    #[test]
    fn prop_idle_only_leaves_via_start(event in arb_event()) {
        let is_start = matches!(event, Event::StartWorkflow { .. });
        let result = transition(&ConvState::Idle, &test_context(), event);
        if is_start {
            prop_assert_eq!(result.unwrap().new_state, ConvState::FetchingBranches);
        } else {
            prop_assert!(result.is_err());
        }
    }

    // Invariant 4: cancel always terminates an active session without dispatching
    #[test]
    fn prop_cancel_terminates(state in arb_session_state()) {
        let result = transition(&state, &test_context(), Event::UserCancel).unwrap();
        prop_assert_eq!(result.new_state, ConvState::Idle);
        prop_assert_eq!(count_dispatches(&result.effects), 0);
        prop_assert!(result
            .effects
            .contains(&Effect::end(SessionOutcome::Cancelled)));
    }

    // Invariant 5: every valid tag dispatches exactly the collected selections
    #[test]
    fn prop_valid_tag_dispatches_collected_values(
        branch in "[a-z/]{1,12}",
        mode in arb_mode(),
        tag in arb_version_tag_text(),
    ) {
        let state = ConvState::AwaitingTag { branch: branch.clone(), mode };
        let result = transition(&state, &test_context(), Event::UserText { text: tag.clone() }).unwrap();
        match &result.effects[..] {
            [Effect::Dispatch { request }] => {
                prop_assert_eq!(&request.branch, &branch);
                prop_assert_eq!(request.mode, mode);
                prop_assert_eq!(request.tag.as_str(), tag.as_str());
            }
            other => prop_assert!(false, "unexpected effects {:?}", other),
        }
    }

    // Invariant 6: prefixed or doubled separators never parse as tags
    #[test]
    fn prop_malformed_tags_rejected(a in 0u32..100, b in 0u32..100) {
        let prefixed = format!("v{a}.{b}");
        let doubled = format!("{a}..{b}");
        prop_assert!(VersionTag::parse(&prefixed).is_none());
        prop_assert!(VersionTag::parse(&doubled).is_none());
    }

    // Invariant 7: the busy states only accept their own outcome events
    #[test]
    fn prop_dispatching_rejects_user_input(text in arb_user_text()) {
        let state = ConvState::Dispatching {
            request: DispatchRequest {
                branch: "main".to_string(),
                mode: WorkflowMode::Create,
                tag: VersionTag::parse("1").unwrap(),
            },
        };
        let ctx = test_context();
        prop_assert_eq!(
            transition(&state, &ctx, Event::UserText { text }).unwrap_err(),
            TransitionError::Busy
        );
        prop_assert_eq!(
            transition(&state, &ctx, Event::UserCancel).unwrap_err(),
            TransitionError::Busy
        );
        prop_assert_eq!(
            transition(&state, &ctx, start()).unwrap_err(),
            TransitionError::SessionInProgress
        );
    }
}
