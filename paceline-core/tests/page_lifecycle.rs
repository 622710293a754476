use std::sync::Arc;
use std::time::Duration;

use paceline_core::engine::ApplyOutcome;
use paceline_core::model::{ChannelName, ContentRequest, ContentResponse, Speed, VideoId};
use paceline_core::orchestrator::{
    InboundMessage, LoopReport, PageController, PageControllerConfig, RetryOutcome,
};
use paceline_core::page::{LifecycleEvent, RouteTracker, WatchPageMatcher, is_watch_page};
use paceline_core::policy::MemoryStore;
use paceline_core::sim::{RecordingClock, SimulatedPage};
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

const WATCH_A: &str = "https://www.youtube.com/watch?v=aaa";
const WATCH_B: &str = "https://www.youtube.com/watch?v=bbb";

type Controller = PageController<SimulatedPage, MemoryStore, RecordingClock>;

fn acme_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_entries(json!({
        "channels": {"Acme": "1.5"},
        "defaultSpeed": "1",
    })))
}

fn controller(page: &Arc<SimulatedPage>, clock: &Arc<RecordingClock>) -> Controller {
    PageController::new(
        Arc::clone(page),
        acme_store(),
        Arc::clone(clock),
        PageControllerConfig::default(),
    )
}

async fn next_report(reports: &mut broadcast::Receiver<LoopReport>) -> LoopReport {
    tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("loop finished in time")
        .expect("report channel open")
}

#[test]
fn watch_page_classification() {
    let eligible = [
        "https://www.youtube.com/watch?v=abc",
        "http://youtube.com/watch?v=abc&t=42",
        "https://m.youtube.com/watch?v=abc",
    ];
    let ineligible = [
        "https://www.youtube.com/",
        "https://www.youtube.com/results?search_query=watch",
        "https://www.youtube.com/@acme/videos",
        "https://example.com/watch?v=abc",
        "https://notyoutube.com/watch?v=abc",
        "https://youtube.com.evil.test/watch?v=abc",
        "file:///youtube.com/watch",
        "not a url",
    ];
    for url in eligible {
        assert!(is_watch_page(url), "{url} should be a watch page");
    }
    for url in ineligible {
        assert!(!is_watch_page(url), "{url} should not be a watch page");
    }
}

#[tokio::test]
async fn unchanged_pair_is_written_once() {
    let page = Arc::new(SimulatedPage::new(WATCH_A).with_player());
    page.set_channel("Acme");
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);

    assert!(controller.apply(None).await.is_settled());
    assert_eq!(controller.apply(None).await, ApplyOutcome::AlreadyApplied);
    assert_eq!(page.player_writes(), vec![1.5]);
}

#[tokio::test]
async fn override_precedence_over_default() {
    let page = Arc::new(SimulatedPage::new(WATCH_A).with_player());
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);

    page.set_channel("Acme");
    controller.on_lifecycle(LifecycleEvent::FullLoad).await;
    assert_eq!(page.playback_rate(), Some(1.5));

    page.set_channel("Other");
    controller.on_lifecycle(LifecycleEvent::FullLoad).await;
    assert_eq!(page.playback_rate(), Some(1.0));
}

#[tokio::test]
async fn explicit_speed_always_writes() {
    let page = Arc::new(SimulatedPage::new(WATCH_A).with_player());
    page.set_channel("Acme");
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);

    controller.on_lifecycle(LifecycleEvent::FullLoad).await;
    for _ in 0..2 {
        let outcome = controller.apply(Some(Speed::new(2.0))).await;
        assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
    }
    assert_eq!(page.player_writes(), vec![1.5, 2.0, 2.0]);
}

#[tokio::test]
async fn missing_player_gives_up_after_twenty_attempts() {
    let page = Arc::new(SimulatedPage::new(WATCH_A));
    page.set_channel("Acme");
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);

    let outcome = controller.on_lifecycle(LifecycleEvent::FullLoad).await;
    assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 20 });
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(500); 19]);
    assert!(page.player_writes().is_empty());
    assert_eq!(controller.state().await.retry_count, 0);
}

#[tokio::test]
async fn late_channel_is_picked_up_by_the_retry_loop() {
    let page = Arc::new(SimulatedPage::new(WATCH_A).with_player());
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);

    let handle = controller.spawn_lifecycle(LifecycleEvent::FullLoad);
    while clock.sleeps().len() < 3 {
        tokio::task::yield_now().await;
    }
    page.set_channel("Acme");

    let outcome = handle.await.unwrap();
    assert!(outcome.is_settled());
    assert!(outcome.attempts() > 3);
    assert_eq!(page.playback_rate(), Some(1.5));
}

#[tokio::test]
async fn overlapping_loops_write_the_rate_once() {
    let page = Arc::new(SimulatedPage::new(WATCH_A));
    page.set_channel("Acme");
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);

    let first = controller.spawn_lifecycle(LifecycleEvent::FullLoad);
    let second = controller.spawn_lifecycle(LifecycleEvent::FullLoad);
    while clock.sleeps().len() < 4 {
        tokio::task::yield_now().await;
    }
    page.attach_player();

    let first = first.await.unwrap();
    let second = second.await.unwrap();
    assert!(first.is_settled());
    assert!(second.is_settled());
    assert_eq!(page.player_writes(), vec![1.5]);

    let state = controller.state().await;
    assert_eq!(state.last_video_id, Some(VideoId::new("aaa")));
    assert_eq!(state.retry_count, 0);
}

#[tokio::test]
async fn route_change_during_a_retrying_load_applies_the_new_channel() {
    let page = Arc::new(SimulatedPage::new(WATCH_A));
    page.set_channel("Acme");
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);
    let mut routes = RouteTracker::new(WatchPageMatcher::default(), WATCH_A);

    let load = controller.spawn_lifecycle(LifecycleEvent::FullLoad);
    while clock.sleeps().len() < 2 {
        tokio::task::yield_now().await;
    }

    page.set_channel("Other");
    page.navigate(WATCH_B);
    let route = controller
        .on_document_mutation(&mut routes)
        .await
        .expect("eligible route change starts a loop");
    while !clock.sleeps().contains(&Duration::from_secs(1)) {
        tokio::task::yield_now().await;
    }
    page.attach_player();

    assert!(load.await.unwrap().is_settled());
    assert!(route.await.unwrap().is_settled());
    assert_eq!(page.player_writes(), vec![1.0]);

    let state = controller.state().await;
    assert_eq!(state.last_video_id, Some(VideoId::new("bbb")));
    assert_eq!(state.last_channel, Some(ChannelName::new("Other")));
}

#[tokio::test]
async fn page_start_waits_before_first_attempt() {
    let page = Arc::new(SimulatedPage::new(WATCH_A).with_player());
    page.set_channel("Acme");
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);

    controller.on_lifecycle(LifecycleEvent::PageStarted).await;
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    assert_eq!(page.playback_rate(), Some(1.5));
}

#[tokio::test]
async fn route_change_resets_even_for_the_same_video() {
    let page = Arc::new(SimulatedPage::new(WATCH_A).with_player());
    page.set_channel("Acme");
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);
    let mut routes = RouteTracker::new(WatchPageMatcher::default(), WATCH_A);

    controller.on_lifecycle(LifecycleEvent::FullLoad).await;
    assert_eq!(controller.apply(None).await, ApplyOutcome::AlreadyApplied);

    page.navigate(format!("{WATCH_A}&t=30"));
    let handle = controller
        .on_document_mutation(&mut routes)
        .await
        .expect("eligible route change starts a loop");
    assert!(handle.await.unwrap().is_settled());

    assert_eq!(page.player_writes(), vec![1.5, 1.5]);
    assert!(clock.sleeps().contains(&Duration::from_secs(1)));
    assert_eq!(controller.state().await.last_video_id, Some(VideoId::new("aaa")));
}

#[tokio::test]
async fn leaving_watch_pages_resets_without_a_loop() {
    let page = Arc::new(SimulatedPage::new(WATCH_A).with_player());
    page.set_channel("Acme");
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);
    let mut routes = RouteTracker::new(WatchPageMatcher::default(), WATCH_A);

    controller.on_lifecycle(LifecycleEvent::FullLoad).await;
    page.navigate("https://www.youtube.com/feed/subscriptions");
    assert!(controller.on_document_mutation(&mut routes).await.is_none());

    let state = controller.state().await;
    assert_eq!(state.last_video_id, None);
    assert_eq!(state.last_channel, None);
    assert!(controller.on_document_mutation(&mut routes).await.is_none());
}

#[tokio::test]
async fn run_loop_reacts_to_page_signals_and_messages() {
    let page = Arc::new(SimulatedPage::new(WATCH_A).with_player());
    page.set_channel("Acme");
    let clock = Arc::new(RecordingClock::new());
    let controller = controller(&page, &clock);
    let mut reports = controller.subscribe_reports();

    let (inbox, rx) = mpsc::channel(8);
    let runner = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run(rx).await }
    });

    let started = next_report(&mut reports).await;
    assert_eq!(started.event, LifecycleEvent::PageStarted);
    assert_eq!(page.playback_rate(), Some(1.5));

    page.set_channel("Other");
    page.navigate(WATCH_B);
    let routed = next_report(&mut reports).await;
    assert_eq!(routed.event, LifecycleEvent::RouteChanged);
    assert_eq!(page.playback_rate(), Some(1.0));

    page.churn();
    page.replace_player();
    let swapped = next_report(&mut reports).await;
    assert_eq!(swapped.event, LifecycleEvent::PlayerReplaced);
    assert_eq!(page.playback_rate(), Some(1.0));
    assert_eq!(
        controller.state().await.last_channel,
        Some(ChannelName::new("Other"))
    );

    let (message, reply) = InboundMessage::new(ContentRequest::GetChannelInfo);
    inbox.send(message).await.unwrap();
    assert_eq!(
        reply.await.unwrap(),
        ContentResponse::ChannelInfo {
            channel_name: Some(ChannelName::new("Other"))
        }
    );

    let (message, reply) = InboundMessage::new(ContentRequest::set_speed("1.75"));
    inbox.send(message).await.unwrap();
    assert_eq!(reply.await.unwrap(), ContentResponse::SpeedSet { success: true });
    assert_eq!(page.playback_rate(), Some(1.75));

    drop(inbox);
    runner.await.unwrap();
    assert_eq!(page.observer_count(), 0);
}
