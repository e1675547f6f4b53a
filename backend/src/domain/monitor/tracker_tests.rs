//! Edge detection coverage for the print-completion tracker.

use rstest::rstest;

use super::*;

fn printing(file: &str) -> MachineSnapshot {
    MachineSnapshot::with_file(MachineState::Printing, file)
}

fn bare(state: MachineState) -> MachineSnapshot {
    MachineSnapshot::bare(state)
}

fn completions(tracker: &mut DeviceTracker, polls: &[MachineSnapshot]) -> Vec<usize> {
    polls
        .iter()
        .enumerate()
        .filter_map(|(index, snapshot)| {
            matches!(tracker.observe(snapshot), TrackerEvent::Completed { .. }).then_some(index)
        })
        .collect()
}

#[rstest]
fn three_printing_polls_then_idle_complete_once_on_the_fourth() {
    let mut tracker = DeviceTracker::new();
    let polls = [
        printing("cube.gcode"),
        printing("cube.gcode"),
        printing("cube.gcode"),
        bare(MachineState::Idle),
    ];
    assert_eq!(completions(&mut tracker, &polls), vec![3]);
}

#[rstest]
#[case::idle(vec![bare(MachineState::Idle), bare(MachineState::Idle)])]
#[case::finished_from_boot(vec![bare(MachineState::Finished), bare(MachineState::Finished)])]
#[case::offline(vec![bare(MachineState::Offline), bare(MachineState::Idle)])]
fn terminal_levels_never_trigger(#[case] polls: Vec<MachineSnapshot>) {
    let mut tracker = DeviceTracker::new();
    assert!(completions(&mut tracker, &polls).is_empty());
}

#[rstest]
fn repeated_terminal_polls_do_not_retrigger() {
    let mut tracker = DeviceTracker::new();
    tracker.observe(&printing("cube.gcode"));
    assert!(matches!(
        tracker.observe(&bare(MachineState::Finished)),
        TrackerEvent::Completed { .. }
    ));
    tracker.finish_completion(true, []);
    assert_eq!(
        completions(
            &mut tracker,
            &[bare(MachineState::Finished), bare(MachineState::Idle)]
        ),
        Vec::<usize>::new()
    );
}

#[rstest]
fn first_label_wins_for_a_print() {
    let mut tracker = DeviceTracker::new();
    assert_eq!(
        tracker.observe(&printing("first.gcode")),
        TrackerEvent::LabelCaptured("first.gcode".into())
    );
    assert_eq!(tracker.observe(&printing("second.gcode")), TrackerEvent::Unchanged);
    assert_eq!(tracker.job_label(), Some("first.gcode"));
}

#[rstest]
fn pause_keeps_the_print_open() {
    let mut tracker = DeviceTracker::new();
    tracker.observe(&printing("cube.gcode"));
    tracker.observe(&bare(MachineState::Paused));
    assert_eq!(tracker.phase(), MonitorPhase::Printing);
    assert_eq!(
        tracker.observe(&bare(MachineState::Idle)),
        TrackerEvent::Completed {
            job_label: Some("cube.gcode".into())
        }
    );
}

#[rstest]
#[case(MachineState::Cancelled)]
#[case(MachineState::Error)]
fn aborted_print_drops_label(#[case] terminal: MachineState) {
    let mut tracker = DeviceTracker::new();
    tracker.observe(&printing("cube.gcode"));
    assert_eq!(
        tracker.observe(&bare(terminal)),
        TrackerEvent::Abandoned {
            job_label: Some("cube.gcode".into())
        }
    );
    assert_eq!(tracker.job_label(), None);
    assert_eq!(tracker.phase(), MonitorPhase::IdleOrOffline);
}

#[rstest]
fn missing_file_completes_without_label() {
    let mut tracker = DeviceTracker::new();
    tracker.observe(&bare(MachineState::Printing));
    assert_eq!(
        tracker.observe(&bare(MachineState::Idle)),
        TrackerEvent::Completed { job_label: None }
    );
}

#[rstest]
fn failure_retains_label_and_applied_toolheads() {
    let mut tracker = DeviceTracker::new();
    tracker.observe(&printing("cube.gcode"));
    tracker.observe(&bare(MachineState::Idle));
    assert_eq!(tracker.phase(), MonitorPhase::Completing);

    tracker.finish_completion(false, [ToolheadIndex::new(0)]);
    assert_eq!(tracker.phase(), MonitorPhase::IdleOrOffline);
    assert_eq!(tracker.job_label(), Some("cube.gcode"));
    assert!(tracker.retained_after_failure());
    assert!(tracker.applied().contains(&ToolheadIndex::new(0)));

    // A new print cannot replace the retained label.
    tracker.observe(&printing("next.gcode"));
    assert_eq!(tracker.job_label(), Some("cube.gcode"));
}

#[rstest]
fn retry_reopens_completion_for_retained_label() {
    let mut tracker = DeviceTracker::new();
    tracker.observe(&printing("cube.gcode"));
    tracker.observe(&bare(MachineState::Idle));
    assert_eq!(tracker.retry(), Err(TrackerCommandError::Busy));

    tracker.finish_completion(false, []);
    assert_eq!(tracker.retry(), Ok("cube.gcode".to_owned()));
    assert_eq!(tracker.phase(), MonitorPhase::Completing);

    tracker.finish_completion(true, []);
    assert_eq!(tracker.job_label(), None);
    assert_eq!(tracker.retry(), Err(TrackerCommandError::NothingRetained));
}

#[rstest]
fn abandon_clears_only_retained_labels() {
    let mut tracker = DeviceTracker::new();
    tracker.observe(&printing("cube.gcode"));
    assert_eq!(tracker.abandon(), Err(TrackerCommandError::NothingRetained));

    tracker.observe(&bare(MachineState::Idle));
    tracker.finish_completion(false, [ToolheadIndex::new(1)]);
    assert_eq!(tracker.abandon(), Ok("cube.gcode".to_owned()));
    assert_eq!(tracker.job_label(), None);
    assert!(tracker.applied().is_empty());
}

#[rstest]
fn polls_during_completion_do_not_start_another() {
    let mut tracker = DeviceTracker::new();
    tracker.observe(&printing("cube.gcode"));
    tracker.observe(&bare(MachineState::Idle));
    assert_eq!(tracker.observe(&printing("other.gcode")), TrackerEvent::Unchanged);
    assert_eq!(tracker.observe(&bare(MachineState::Idle)), TrackerEvent::Unchanged);
    assert_eq!(tracker.phase(), MonitorPhase::Completing);
}
