use scrape_core::{advance, JobState, LifecycleMsg, TransitionError};

#[test]
fn happy_path_walks_every_state() {
    let steps = [
        (LifecycleMsg::Start, JobState::EnumeratingIds),
        (LifecycleMsg::BatchesReady, JobState::Running),
        (LifecycleMsg::BatchesSettled, JobState::Converting),
        (LifecycleMsg::ConversionFinished, JobState::Archiving),
        (LifecycleMsg::Archived, JobState::Done),
    ];

    let mut state = JobState::default();
    assert_eq!(state, JobState::Created);
    for (msg, expected) in steps {
        state = advance(state, msg).unwrap();
        assert_eq!(state, expected);
    }
    assert!(state.is_terminal());
}

#[test]
fn fatal_fails_any_live_state() {
    for state in [
        JobState::Created,
        JobState::EnumeratingIds,
        JobState::Running,
        JobState::Converting,
        JobState::Archiving,
    ] {
        assert_eq!(advance(state, LifecycleMsg::Fatal), Ok(JobState::Failed));
    }
}

#[test]
fn terminal_states_reject_everything() {
    for state in [JobState::Done, JobState::Failed] {
        assert_eq!(
            advance(state, LifecycleMsg::Fatal),
            Err(TransitionError {
                from: state,
                msg: LifecycleMsg::Fatal
            })
        );
        assert!(advance(state, LifecycleMsg::Start).is_err());
    }
}

#[test]
fn steps_cannot_be_skipped() {
    assert!(advance(JobState::Created, LifecycleMsg::BatchesSettled).is_err());
    assert!(advance(JobState::Running, LifecycleMsg::Archived).is_err());
    assert!(advance(JobState::EnumeratingIds, LifecycleMsg::Start).is_err());
}
