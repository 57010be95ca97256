// ABOUTME: Exhaustive check of the session state machine over short operation sequences
// ABOUTME: Input waits only follow a sandbox prompt and a live run is never started twice

mod support;

use support::Harness;
use tutor_ai::testing::CannedReviewer;
use tutor_engine::{ReplStatus, RunOutcome};
use tutor_sandbox::testing::{SandboxCall, ScriptedFactory};
use tutor_sandbox::SandboxStatus;

#[derive(Debug, Clone, Copy)]
enum Step {
    Run,
    Stop,
    Submit,
    Cancel,
    SandboxPrompt,
    SandboxTerminated,
}

const STEPS: [Step; 6] = [
    Step::Run,
    Step::Stop,
    Step::Submit,
    Step::Cancel,
    Step::SandboxPrompt,
    Step::SandboxTerminated,
];

fn sequences(length: usize) -> Vec<Vec<Step>> {
    let mut all = vec![Vec::new()];
    for _ in 0..length {
        all = all
            .into_iter()
            .flat_map(|prefix| {
                STEPS.iter().map(move |step| {
                    let mut next = prefix.clone();
                    next.push(*step);
                    next
                })
            })
            .collect();
    }
    all
}

async fn check(sequence: &[Step]) {
    let harness = Harness::build(
        ScriptedFactory::stalled(),
        CannedReviewer::replying("no"),
        support::quiet_options(),
    );
    harness.controller.initialize().await;
    let sandbox = harness.sandbox();
    sandbox.emit_status(SandboxStatus::Ready);

    let mut started = 0;
    for step in sequence {
        let before = harness.controller.status();
        match step {
            Step::Run => {
                let outcome = harness.controller.run("", "x = input()", "").await.unwrap();
                if before.is_executing() {
                    assert_eq!(outcome, RunOutcome::AlreadyRunning, "{:?}", sequence);
                }
                if outcome == RunOutcome::Started {
                    started += 1;
                }
            }
            Step::Stop => harness.controller.stop().await.unwrap(),
            Step::Submit => {
                harness.controller.submit_input("42").await.unwrap();
            }
            Step::Cancel => {
                harness.controller.cancel_input("").await.unwrap();
            }
            Step::SandboxPrompt => sandbox.emit_input("value?"),
            Step::SandboxTerminated => sandbox.emit_terminated(),
        }

        let after = harness.controller.status();
        if after == ReplStatus::WaitingForInput && before != ReplStatus::WaitingForInput {
            assert!(
                matches!(step, Step::SandboxPrompt) && before == ReplStatus::Running,
                "entered waiting state after {:?} in {:?}",
                step,
                sequence
            );
        }
        assert_eq!(
            after == ReplStatus::WaitingForInput,
            harness.controller.snapshot().is_waiting_for_input(),
            "{:?}",
            sequence
        );
    }

    let runs = sandbox
        .calls()
        .into_iter()
        .filter(|call| matches!(call, SandboxCall::Run(_)))
        .count();
    assert_eq!(runs, started, "{:?}", sequence);
}

#[tokio::test]
async fn test_state_machine_over_all_short_sequences() {
    for sequence in sequences(4) {
        check(&sequence).await;
    }
}
