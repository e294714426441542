//! Publisher retry/timeout/cancellation behavior against a scripted
//! fake transport.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use openmods_core::Event;
use openmods_relay::{
    PublishOptions, PublishStatus, RelayPublisher, RelaySender, SendError, summarize,
};

/// One scripted transport response for a relay.
enum Behavior {
    Resolve { delay: Duration },
    Reject { delay: Duration, message: &'static str },
    Hang,
}

impl Behavior {
    fn ok() -> Self {
        Behavior::Resolve {
            delay: Duration::ZERO,
        }
    }

    fn fail(message: &'static str) -> Self {
        Behavior::Reject {
            delay: Duration::ZERO,
            message,
        }
    }
}

/// Plays a per-relay script; relays without one always resolve.
struct FakeSender {
    script: Mutex<HashMap<String, VecDeque<Behavior>>>,
}

impl FakeSender {
    fn new(script: Vec<(&str, Vec<Behavior>)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|(relay, behaviors)| (relay.to_string(), behaviors.into_iter().collect()))
                    .collect(),
            ),
        })
    }
}

#[async_trait]
impl RelaySender for FakeSender {
    async fn send(&self, relay: &str, _event: &Event) -> Result<(), SendError> {
        let behavior = self
            .script
            .lock()
            .await
            .get_mut(relay)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(Behavior::ok);

        match behavior {
            Behavior::Resolve { delay } => {
                if delay > Duration::ZERO {
                    sleep(delay).await;
                }
                Ok(())
            }
            Behavior::Reject { delay, message } => {
                if delay > Duration::ZERO {
                    sleep(delay).await;
                }
                Err(SendError::WebSocket(message.to_string()))
            }
            Behavior::Hang => std::future::pending().await,
        }
    }

    async fn close(&self) {}
}

fn sample_event() -> Event {
    Event {
        id: "00".repeat(32),
        pubkey: "00".repeat(32),
        created_at: 1700000000,
        kind: 1,
        tags: vec![],
        content: String::new(),
        sig: "00".repeat(64),
    }
}

fn options(timeout_ms: u64, max_attempts: u32, backoff_ms: u64) -> PublishOptions {
    PublishOptions {
        timeout: Duration::from_millis(timeout_ms),
        max_attempts,
        backoff_unit: Duration::from_millis(backoff_ms),
        cancel: None,
    }
}

#[tokio::test(start_paused = true)]
async fn retries_and_succeeds_on_a_subsequent_attempt() {
    let sender = FakeSender::new(vec![(
        "wss://relay.test",
        vec![Behavior::fail("first failure"), Behavior::ok()],
    )]);
    let publisher = RelayPublisher::new(sender);

    let outcomes = publisher
        .publish(
            &sample_event(),
            &["wss://relay.test".to_string()],
            &options(50, 3, 0),
        )
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, PublishStatus::Ok);
    assert_eq!(outcomes[0].attempts, 2);
    assert!(outcomes[0].error.is_none());
}

#[tokio::test(start_paused = true)]
async fn stops_after_max_attempts_and_reports_the_last_error() {
    let sender = FakeSender::new(vec![(
        "wss://relay.fail",
        vec![
            Behavior::fail("first failure"),
            Behavior::fail("second failure"),
        ],
    )]);
    let publisher = RelayPublisher::new(sender);

    let outcomes = publisher
        .publish(
            &sample_event(),
            &["wss://relay.fail".to_string()],
            &options(50, 2, 0),
        )
        .await;

    assert_eq!(outcomes[0].status, PublishStatus::Error);
    assert_eq!(outcomes[0].attempts, 2);
    let error = outcomes[0].error.as_deref().unwrap();
    assert!(error.contains("second failure"), "got: {error}");
}

#[tokio::test(start_paused = true)]
async fn enforces_timeouts_when_relays_do_not_respond() {
    let sender = FakeSender::new(vec![("wss://relay.timeout", vec![Behavior::Hang])]);
    let publisher = RelayPublisher::new(sender);

    let outcomes = publisher
        .publish(
            &sample_event(),
            &["wss://relay.timeout".to_string()],
            &options(20, 1, 0),
        )
        .await;

    assert_eq!(outcomes[0].status, PublishStatus::Error);
    assert_eq!(outcomes[0].attempts, 1);
    let error = outcomes[0].error.as_deref().unwrap();
    assert!(error.contains("timed out"), "got: {error}");
    assert!(outcomes[0].elapsed >= Duration::from_millis(20));
    assert!(outcomes[0].elapsed < Duration::from_millis(30));
}

#[tokio::test(start_paused = true)]
async fn duplicate_relays_collapse_to_one_outcome_each() {
    let sender = FakeSender::new(vec![(
        "wss://relay.fail",
        vec![Behavior::fail("down")],
    )]);
    let publisher = RelayPublisher::new(sender);

    let relays = vec![
        "wss://relay.ok".to_string(),
        "wss://relay.fail".to_string(),
        "wss://relay.ok".to_string(),
        "wss://relay.fail".to_string(),
    ];
    let outcomes = publisher
        .publish(&sample_event(), &relays, &options(50, 1, 0))
        .await;

    assert_eq!(outcomes.len(), 2);
    let summary = summarize(&outcomes);
    assert_eq!(summary.succeeded + summary.failed, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn empty_relay_list_yields_no_outcomes() {
    let publisher = RelayPublisher::new(FakeSender::new(vec![]));
    let outcomes = publisher
        .publish(&sample_event(), &[], &options(50, 3, 0))
        .await;
    assert!(outcomes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn one_slow_relay_does_not_delay_the_others() {
    let sender = FakeSender::new(vec![("wss://relay.slow", vec![Behavior::Hang])]);
    let publisher = RelayPublisher::new(sender);

    let relays = vec![
        "wss://relay.slow".to_string(),
        "wss://relay.fast".to_string(),
    ];
    let outcomes = publisher
        .publish(&sample_event(), &relays, &options(50, 1, 0))
        .await;

    let slow = outcomes.iter().find(|o| o.relay.contains("slow")).unwrap();
    let fast = outcomes.iter().find(|o| o.relay.contains("fast")).unwrap();

    assert_eq!(slow.status, PublishStatus::Error);
    assert_eq!(fast.status, PublishStatus::Ok);
    assert!(fast.elapsed < Duration::from_millis(5));
    assert!(slow.elapsed >= Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn cancellation_before_start_skips_all_attempts() {
    let publisher = RelayPublisher::new(FakeSender::new(vec![]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut opts = options(50, 3, 100);
    opts.cancel = Some(cancel);

    let outcomes = publisher
        .publish(&sample_event(), &["wss://relay.test".to_string()], &opts)
        .await;

    assert_eq!(outcomes[0].status, PublishStatus::Error);
    assert_eq!(outcomes[0].attempts, 0);
    assert_eq!(outcomes[0].error.as_deref(), Some("publish aborted"));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_stops_the_loop() {
    let sender = FakeSender::new(vec![(
        "wss://relay.fail",
        vec![Behavior::fail("down"), Behavior::fail("down")],
    )]);
    let publisher = RelayPublisher::new(sender);
    let cancel = CancellationToken::new();

    let mut opts = options(50, 3, 10_000);
    opts.cancel = Some(cancel.clone());

    let event = sample_event();
    let relays = vec!["wss://relay.fail".to_string()];
    let (outcomes, _) = tokio::join!(publisher.publish(&event, &relays, &opts), async {
        // First attempt fails instantly; cancel while the loop sits in
        // its 10s backoff.
        sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    assert_eq!(outcomes[0].status, PublishStatus::Error);
    assert_eq!(outcomes[0].attempts, 1);
    assert_eq!(outcomes[0].error.as_deref(), Some("publish aborted"));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_an_attempt_discards_the_in_flight_call() {
    let sender = FakeSender::new(vec![("wss://relay.hang", vec![Behavior::Hang])]);
    let publisher = RelayPublisher::new(sender);
    let cancel = CancellationToken::new();

    let mut opts = options(60_000, 3, 0);
    opts.cancel = Some(cancel.clone());

    let event = sample_event();
    let relays = vec!["wss://relay.hang".to_string()];
    let (outcomes, _) = tokio::join!(publisher.publish(&event, &relays, &opts), async {
        sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    assert_eq!(outcomes[0].status, PublishStatus::Error);
    assert_eq!(outcomes[0].attempts, 1);
    assert_eq!(outcomes[0].error.as_deref(), Some("publish aborted"));
    assert!(outcomes[0].elapsed < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn backoff_is_linear_in_the_attempt_number() {
    async fn elapsed_with_backoff(backoff_ms: u64) -> Duration {
        let sender = FakeSender::new(vec![(
            "wss://relay.retry",
            vec![
                Behavior::fail("one"),
                Behavior::fail("two"),
                Behavior::ok(),
            ],
        )]);
        let publisher = RelayPublisher::new(sender);
        let outcomes = publisher
            .publish(
                &sample_event(),
                &["wss://relay.retry".to_string()],
                &options(50, 3, backoff_ms),
            )
            .await;
        assert_eq!(outcomes[0].status, PublishStatus::Ok);
        assert_eq!(outcomes[0].attempts, 3);
        outcomes[0].elapsed
    }

    // Waits are unit * 1 + unit * 2 = 3 units; doubling the unit doubles
    // the total wait.
    let base = elapsed_with_backoff(100).await;
    let doubled = elapsed_with_backoff(200).await;

    assert!(base >= Duration::from_millis(300), "base was {base:?}");
    assert!(base < Duration::from_millis(320), "base was {base:?}");
    assert!(doubled >= Duration::from_millis(600), "doubled was {doubled:?}");
    assert!(doubled < Duration::from_millis(640), "doubled was {doubled:?}");
}

#[tokio::test(start_paused = true)]
async fn elapsed_spans_all_attempts() {
    let sender = FakeSender::new(vec![(
        "wss://relay.retry",
        vec![
            Behavior::Reject {
                delay: Duration::from_millis(10),
                message: "down",
            },
            Behavior::Resolve {
                delay: Duration::from_millis(10),
            },
        ],
    )]);
    let publisher = RelayPublisher::new(sender);

    let outcomes = publisher
        .publish(
            &sample_event(),
            &["wss://relay.retry".to_string()],
            &options(50, 3, 100),
        )
        .await;

    // 10ms failure + 100ms backoff + 10ms success.
    assert_eq!(outcomes[0].attempts, 2);
    assert!(outcomes[0].elapsed >= Duration::from_millis(120));
}

#[tokio::test(start_paused = true)]
async fn max_attempts_floor_is_one() {
    let sender = FakeSender::new(vec![("wss://relay.test", vec![Behavior::fail("down")])]);
    let publisher = RelayPublisher::new(sender);

    let outcomes = publisher
        .publish(
            &sample_event(),
            &["wss://relay.test".to_string()],
            &options(50, 0, 0),
        )
        .await;

    assert_eq!(outcomes[0].attempts, 1);
    assert_eq!(outcomes[0].status, PublishStatus::Error);
}
