mod common;

use busq::{
    InMemoryBus, MessageBus, Operation, QueueWorkflow, Report, WorkflowSettings,
    DEFAULT_MESSAGE_BODY, DEFAULT_QUEUE_NAME,
};
use common::{lines_starting_with, workflow_on, YieldingBus};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

// Property-based test: every visible message is read once, in order, then deleted
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_drain_reads_every_message_in_order(
        bodies in prop::collection::vec("[a-zA-Z0-9 ]{1,64}", 0..20usize)
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let bus = InMemoryBus::new();
            bus.seed(DEFAULT_QUEUE_NAME, &bodies);

            let report = workflow_on(&bus).run().await;

            // seeded messages plus the one the workflow publishes
            let visible = bodies.len() + 1;

            let mut expected = vec![Operation::ListQueues, Operation::SendMessage];
            for _ in 0..visible {
                expected.push(Operation::ReceiveMessage);
                expected.push(Operation::DeleteMessage);
            }
            expected.push(Operation::ReceiveMessage);
            prop_assert_eq!(bus.calls(), expected);

            prop_assert_eq!(
                lines_starting_with(&report, "Read message from queue, id = ").len(),
                visible
            );

            let mut sent: Vec<String> = bodies
                .iter()
                .map(|b| format!("Read message from queue, contents = {b}"))
                .collect();
            sent.push(format!("Read message from queue, contents = {DEFAULT_MESSAGE_BODY}"));
            prop_assert_eq!(
                lines_starting_with(&report, "Read message from queue, contents = "),
                sent.iter().map(String::as_str).collect::<Vec<_>>()
            );

            prop_assert_eq!(bus.depth(DEFAULT_QUEUE_NAME), 0);
            Ok(())
        })?;
    }
}

// Property-based test: whatever fails, the report ends with one processed date
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_report_always_ends_with_processed_date(
        failing in prop::collection::vec(
            prop::sample::select(vec![
                Operation::ListQueues,
                Operation::CreateQueue,
                Operation::SendMessage,
                Operation::ReceiveMessage,
                Operation::DeleteMessage,
            ]),
            0..5usize
        ),
        queue_exists in any::<bool>()
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let bus = InMemoryBus::new();
            if queue_exists {
                bus.seed(DEFAULT_QUEUE_NAME, &["waiting"]);
            }
            for operation in &failing {
                bus.fail(*operation);
            }

            let report = workflow_on(&bus).run().await;

            prop_assert_eq!(lines_starting_with(&report, "Processed Date = ").len(), 1);
            prop_assert!(report.lines().last().unwrap().starts_with("Processed Date = "));
            prop_assert_eq!(report.lines()[0].as_str(), "Connecting to service bus...");
            prop_assert!(bus.count(Operation::CreateQueue) <= 1);
            prop_assert_eq!(bus.count(Operation::SendMessage), 1);
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn existing_queue_skips_create() {
    let bus = InMemoryBus::new();
    bus.seed(DEFAULT_QUEUE_NAME, &["waiting"]);

    let report = workflow_on(&bus).run().await;

    assert_eq!(bus.count(Operation::CreateQueue), 0);
    assert_eq!(
        lines_starting_with(&report, "Queue PRODUCT_QUEUE already exists..."),
        vec!["Queue PRODUCT_QUEUE already exists..."]
    );
    assert!(lines_starting_with(&report, "Creating queue").is_empty());
}

#[tokio::test]
async fn zero_lock_duration_drains_queue() {
    let bus = InMemoryBus::with_lock_duration(Duration::ZERO);
    bus.seed(DEFAULT_QUEUE_NAME, &["waiting"]);

    let report = workflow_on(&bus).run().await;

    assert_eq!(bus.count(Operation::DeleteMessage), 2);
    assert_eq!(bus.depth(DEFAULT_QUEUE_NAME), 0);
    assert_eq!(
        lines_starting_with(&report, "Finished reading messages from queue...").len(),
        1
    );
}

fn assert_well_formed(report: &Report) {
    assert_eq!(report.lines()[0], "Connecting to service bus...");
    assert_eq!(lines_starting_with(report, "Connecting to service bus...").len(), 1);
    assert_eq!(
        lines_starting_with(report, "Finished reading messages from queue...").len(),
        1
    );
    assert_eq!(lines_starting_with(report, "Processed Date = ").len(), 1);
    assert!(report.lines().last().unwrap().starts_with("Processed Date = "));

    // every id line is followed by its contents and then the delete
    for (i, line) in report.lines().iter().enumerate() {
        if line.starts_with("Read message from queue, id = ") {
            assert!(report.lines()[i + 1].starts_with("Read message from queue, contents = "));
            assert_eq!(report.lines()[i + 2], "Deleting message from queue...");
        }
    }
}

#[tokio::test]
async fn concurrent_runs_interleave_and_keep_separate_reports() {
    let memory = InMemoryBus::new();
    memory.seed(DEFAULT_QUEUE_NAME, &["a", "b", "c", "d", "e", "f"]);
    let bus: Arc<dyn MessageBus> = Arc::new(YieldingBus(memory.clone()));

    let first = QueueWorkflow::new(bus.clone(), WorkflowSettings::default());
    let second = QueueWorkflow::new(bus, WorkflowSettings::default());
    let (left, right) = tokio::join!(first.run(), second.run());

    // both runs listed before either published
    assert_eq!(
        &memory.calls()[..2],
        [Operation::ListQueues, Operation::ListQueues]
    );

    assert_well_formed(&left);
    assert_well_formed(&right);

    let left_reads = lines_starting_with(&left, "Read message from queue, id = ").len();
    let right_reads = lines_starting_with(&right, "Read message from queue, id = ").len();
    assert!(left_reads > 0 && right_reads > 0);

    // six seeded plus one published per run, each read by exactly one run
    assert_eq!(left_reads + right_reads, 8);
    assert_eq!(memory.count(Operation::DeleteMessage), 8);
    assert_eq!(memory.depth(DEFAULT_QUEUE_NAME), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawned_runs_share_the_bus_without_sharing_reports() {
    let memory = InMemoryBus::new();
    memory.seed(DEFAULT_QUEUE_NAME, &["a", "b", "c"]);
    let workflow = Arc::new(QueueWorkflow::new(
        Arc::new(YieldingBus(memory.clone())),
        WorkflowSettings::default(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.run().await })
        })
        .collect();

    let mut reads = 0;
    for handle in handles {
        let report = handle.await.unwrap();
        assert_well_formed(&report);
        reads += lines_starting_with(&report, "Read message from queue, id = ").len();
    }

    assert_eq!(reads, 3 + 4);
    assert_eq!(memory.depth(DEFAULT_QUEUE_NAME), 0);
}
