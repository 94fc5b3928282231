// tests/core_properties.rs

use std::path::PathBuf;

use proptest::prelude::*;
use relaunch::engine::{CoreCommand, CoreRuntime, Phase, RuntimeEvent, RuntimeOptions};
use relaunch::types::FailureSource;

#[derive(Debug, Clone)]
enum Ev {
    Requested,
    Changed,
    Unchanged,
    Rebuilt,
    Restarted,
    Errored(String),
}

impl Ev {
    fn to_event(&self) -> RuntimeEvent {
        match self {
            Ev::Requested => RuntimeEvent::Requested(None),
            Ev::Changed => RuntimeEvent::Changed {
                path: PathBuf::from("main.go"),
            },
            Ev::Unchanged => RuntimeEvent::Unchanged,
            Ev::Rebuilt => RuntimeEvent::Rebuilt,
            Ev::Restarted => RuntimeEvent::Restarted,
            Ev::Errored(text) => RuntimeEvent::Errored {
                source: FailureSource::Run,
                text: text.clone(),
            },
        }
    }
}

fn event_strategy() -> impl Strategy<Value = Ev> {
    prop_oneof![
        Just(Ev::Requested),
        Just(Ev::Changed),
        Just(Ev::Unchanged),
        Just(Ev::Rebuilt),
        Just(Ev::Restarted),
        "[a-z ]{0,12}".prop_map(Ev::Errored),
    ]
}

fn starts(commands: &[CoreCommand]) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, CoreCommand::Build | CoreCommand::Run))
        .count()
}

proptest! {
    #[test]
    fn every_step_starts_at_most_one_process(
        build_enabled in any::<bool>(),
        events in proptest::collection::vec(event_strategy(), 0..40),
    ) {
        let mut core = CoreRuntime::new(RuntimeOptions { build_enabled });
        prop_assert!(starts(&core.bootstrap().commands) == 1);

        for ev in events {
            let before = core.phase();
            let step = core.step(&ev.to_event());
            prop_assert!(step.keep_running);
            prop_assert!(starts(&step.commands) <= 1);

            match ev {
                Ev::Requested => prop_assert_eq!(step.commands, vec![CoreCommand::Scan]),
                Ev::Changed => {
                    // The gate closes before anything new is started.
                    prop_assert_eq!(step.commands.first(), Some(&CoreCommand::Pause));
                    prop_assert_eq!(core.phase(), Phase::Pending);
                }
                Ev::Unchanged => {
                    prop_assert_eq!(core.phase(), before);
                    prop_assert_eq!(starts(&step.commands), 0);
                    let serves = step.commands.contains(&CoreCommand::Serve);
                    prop_assert_eq!(serves, before == Phase::Ready);
                }
                Ev::Rebuilt => prop_assert_eq!(step.commands, vec![CoreCommand::Run]),
                Ev::Restarted => {
                    prop_assert_eq!(step.commands, vec![CoreCommand::Serve]);
                    prop_assert_eq!(core.phase(), Phase::Ready);
                }
                Ev::Errored(text) => {
                    prop_assert_eq!(step.commands, vec![CoreCommand::ShowError(text)]);
                    prop_assert_eq!(core.phase(), Phase::Failed);
                }
            }
        }
    }

    #[test]
    fn serve_is_only_issued_once_ready(
        events in proptest::collection::vec(event_strategy(), 0..40),
    ) {
        let mut core = CoreRuntime::new(RuntimeOptions { build_enabled: true });
        core.bootstrap();

        for ev in events {
            let step = core.step(&ev.to_event());
            if step.commands.contains(&CoreCommand::Serve) {
                prop_assert_eq!(core.phase(), Phase::Ready);
            }
        }
    }
}

#[test]
fn shutdown_ends_the_loop_from_any_phase() {
    for phase_event in [RuntimeEvent::Restarted, RuntimeEvent::Unchanged, RuntimeEvent::Rebuilt] {
        let mut core = CoreRuntime::new(RuntimeOptions { build_enabled: false });
        core.bootstrap();
        core.step(&phase_event);

        let step = core.step(&RuntimeEvent::ShutdownRequested);
        assert_eq!(step.commands, vec![CoreCommand::Stop]);
        assert!(!step.keep_running);
    }
}
