use avsession::av::{CodecType, FormatDescription, MediaKind, MediaSample, PixelFormat};
use avsession::config::{Config, RequiredTracks, SessionConfig};
use avsession::encoder::BindOutcome;
use avsession::format::MemoryWriterFactory;
use avsession::report::{ChannelObserver, SessionNotification};
use avsession::session::{DropReason, RouteOutcome, Session, SessionState};
use avsession::ErrorKind;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const FRAGMENT: Duration = Duration::from_secs(60);
const WAIT: Duration = Duration::from_secs(3600);

fn base_config() -> SessionConfig {
    SessionConfig::from_config(&Config::default())
}

fn video_format() -> FormatDescription {
    FormatDescription::video(CodecType::H264, 1280, 720, PixelFormat::Nv12)
}

fn audio_format() -> FormatDescription {
    FormatDescription::audio(CodecType::AAC, 44100, 2)
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

struct Harness {
    session: Session,
    factory: Arc<MemoryWriterFactory>,
    notifications: UnboundedReceiver<SessionNotification>,
}

impl Harness {
    fn new(config: SessionConfig) -> Self {
        Self::with_factory(config, MemoryWriterFactory::new())
    }

    fn with_factory(config: SessionConfig, factory: MemoryWriterFactory) -> Self {
        let factory = Arc::new(factory);
        let (observer, notifications) = ChannelObserver::new();
        let session = Session::new(config, factory.clone(), Arc::new(observer)).unwrap();
        Self {
            session,
            factory,
            notifications,
        }
    }

    /// Starts at `destination` with both formats bound and the writer running from `first_pts`.
    fn start_writing(&self, destination: &str, first_pts: Duration) {
        assert_ok!(self.session.start(destination, None));
        assert_eq!(
            self.session.on_format_available(MediaKind::Video, video_format()).unwrap(),
            BindOutcome::Bound
        );
        assert_eq!(
            self.session.on_format_available(MediaKind::Audio, audio_format()).unwrap(),
            BindOutcome::Bound
        );
        assert_eq!(
            self.session.on_sample(&MediaSample::video(first_pts, vec![0u8; 32])),
            RouteOutcome::Forwarded
        );
        assert_eq!(self.session.state(), SessionState::Writing);
    }

    async fn next(&mut self) -> SessionNotification {
        timeout(WAIT, self.notifications.recv())
            .await
            .expect("no notification in time")
            .expect("notification channel closed")
    }
}

fn complete(path: &str, file_number: u32) -> SessionNotification {
    SessionNotification::SegmentComplete {
        path: PathBuf::from(path),
        file_number,
    }
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn test_rollover_keeps_readiness_and_numbers_files() {
    let mut h = Harness::new(base_config().with_fragment_interval(FRAGMENT));
    h.start_writing("file:///tmp/avsession-tests/lecture.mp4", ms(0));

    for i in 1..30u64 {
        h.session.on_sample(&MediaSample::video(ms(i * 33), vec![1u8; 64]));
        h.session.on_sample(&MediaSample::audio(ms(i * 23), vec![2u8; 16]));
    }

    // The fragment timer fires after 60s of (paused) time
    assert_eq!(h.next().await, complete("/tmp/avsession-tests/lecture_0.mp4", 0));
    assert_eq!(h.session.state(), SessionState::AwaitingTracks);
    assert!(h.session.is_ready(MediaKind::Audio));
    assert!(h.session.is_ready(MediaKind::Video));

    let segment = h.session.segment().unwrap();
    assert_eq!(segment.file_number, 1);
    assert_eq!(segment.path, PathBuf::from("/tmp/avsession-tests/lecture_1.mp4"));

    let first = h.factory.writer(0).unwrap();
    assert_eq!(first.finalize_calls(), 1);
    assert_eq!(first.appended_pts(MediaKind::Video).len(), 30);
    assert_eq!(first.appended_pts(MediaKind::Audio).len(), 29);

    // Formats were re-attached without a new bind
    let second = h.factory.writer(1).unwrap();
    assert_eq!(second.tracks().len(), 2);
    assert_eq!(second.started_at(), None);

    assert_eq!(
        h.session.on_sample(&MediaSample::audio(ms(60_500), vec![2u8; 16])),
        RouteOutcome::Forwarded
    );
    assert_eq!(second.started_at(), Some(ms(60_500)));
    assert_eq!(h.session.state(), SessionState::Writing);

    h.session.stop();
    assert_eq!(h.next().await, complete("/tmp/avsession-tests/lecture_1.mp4", 1));
    assert_eq!(h.next().await, SessionNotification::Finished);
    assert_eq!(h.session.state(), SessionState::Closed);
    assert_eq!(h.factory.max_concurrently_open(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_forwarding_waits_for_every_required_track() {
    let h = Harness::new(base_config().with_fragment_interval(FRAGMENT));
    assert_ok!(h.session.start("/tmp/avsession-tests/gate.mp4", None));
    h.session
        .on_format_available(MediaKind::Video, video_format())
        .unwrap();
    assert!(!h.session.all_required_ready());

    for i in 0..5u64 {
        assert_eq!(
            h.session.on_sample(&MediaSample::video(ms(i * 33), vec![0u8; 8])),
            RouteOutcome::Dropped(DropReason::AwaitingTracks)
        );
    }

    tokio::time::sleep(ms(200)).await;
    h.session
        .on_format_available(MediaKind::Audio, audio_format())
        .unwrap();
    assert!(h.session.all_required_ready());
    assert_eq!(h.session.state(), SessionState::AwaitingTracks);

    assert_eq!(
        h.session.on_sample(&MediaSample::audio(ms(210), vec![0u8; 8])),
        RouteOutcome::Forwarded
    );
    let writer = h.factory.writer(0).unwrap();
    assert_eq!(writer.started_at(), Some(ms(210)));
    assert!(writer.appended_pts(MediaKind::Video).is_empty());
    assert_eq!(h.session.stats().dropped, 5);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_formats_closes_cleanly() {
    let mut h = Harness::new(base_config());
    assert_ok!(h.session.start("/tmp/avsession-tests/nothing.mp4", None));
    h.session.stop();

    assert_eq!(h.session.state(), SessionState::Closed);
    assert_eq!(h.next().await, SessionNotification::Finished);
    assert_eq!(h.session.stats().forwarded(), 0);
    assert!(h.factory.writer(0).unwrap().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_samples_during_finishing_are_dropped() {
    let factory = MemoryWriterFactory::new();
    factory.faults().stall_finalize(true);
    let h = Harness::with_factory(
        base_config().with_finalize_timeout(Duration::from_secs(5)),
        factory,
    );
    h.start_writing("/tmp/avsession-tests/finishing.mp4", ms(0));

    assert!(h.session.rotate());
    assert_eq!(h.session.state(), SessionState::Finishing);
    assert!(!h.session.rotate());
    assert_eq!(
        h.session.on_sample(&MediaSample::video(ms(40), vec![0u8; 8])),
        RouteOutcome::Dropped(DropReason::Finishing)
    );
    assert_eq!(h.session.stats().dropped, 1);
    assert_eq!(h.session.segment(), None);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_sample_does_not_stop_session() {
    let h = Harness::new(base_config());
    h.start_writing("/tmp/avsession-tests/reject.mp4", ms(0));

    h.factory.faults().reject_appends(1);
    assert_eq!(
        h.session.on_sample(&MediaSample::video(ms(33), vec![0u8; 8])),
        RouteOutcome::Rejected
    );
    assert_eq!(h.session.state(), SessionState::Writing);
    assert_eq!(
        h.session.on_sample(&MediaSample::video(ms(66), vec![0u8; 8])),
        RouteOutcome::Forwarded
    );

    let stats = h.session.stats();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.forwarded_video, 2);
    assert_eq!(
        h.factory.writer(0).unwrap().appended_pts(MediaKind::Video),
        vec![ms(0), ms(66)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_first_sample_cancels_writer() {
    let mut h = Harness::new(base_config());
    assert_ok!(h.session.start("/tmp/avsession-tests/empty.mp4", None));
    h.session
        .bind_video_format(video_format(), None, None)
        .unwrap();
    assert_eq!(
        h.session.on_sample(&MediaSample::video(ms(0), vec![0u8; 8])),
        RouteOutcome::Dropped(DropReason::AwaitingTracks)
    );

    h.session.stop();
    assert_eq!(h.session.state(), SessionState::Closed);
    assert_eq!(h.next().await, SessionNotification::Finished);

    let writer = h.factory.writer(0).unwrap();
    assert!(writer.is_cancelled());
    assert_eq!(writer.finalize_calls(), 0);
    assert!(writer.appended().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let mut h = Harness::new(base_config());
    h.start_writing("/tmp/avsession-tests/idem.mp4", ms(0));

    h.session.stop();
    h.session.stop();
    assert_eq!(h.session.state(), SessionState::Finishing);

    assert!(matches!(
        h.next().await,
        SessionNotification::SegmentComplete { file_number: 0, .. }
    ));
    assert_eq!(h.next().await, SessionNotification::Finished);

    h.session.stop();
    assert_eq!(h.session.state(), SessionState::Closed);
    assert_eq!(h.factory.writer(0).unwrap().finalize_calls(), 1);
    assert_eq!(h.factory.writers().len(), 1);
    assert!(h.notifications.try_recv().is_err());
    assert_eq!(
        h.session.on_sample(&MediaSample::video(ms(10), vec![0u8; 8])),
        RouteOutcome::Dropped(DropReason::Closed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_rollover_ends_session() {
    let mut h = Harness::new(base_config());
    h.start_writing("/tmp/avsession-tests/late.mp4", ms(0));

    assert!(h.session.rotate());
    h.session.stop();

    assert!(matches!(
        h.next().await,
        SessionNotification::SegmentComplete { file_number: 0, .. }
    ));
    assert_eq!(h.next().await, SessionNotification::Finished);
    assert_eq!(h.factory.writers().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finalize_watchdog_fails_session() {
    let factory = MemoryWriterFactory::new();
    factory.faults().stall_finalize(true);
    let mut h = Harness::with_factory(
        base_config().with_finalize_timeout(Duration::from_secs(5)),
        factory,
    );
    h.start_writing("/tmp/avsession-tests/stall.mp4", ms(0));

    h.session.stop();
    match h.next().await {
        SessionNotification::Error { kind, .. } => assert_eq!(kind, ErrorKind::WriterFatal),
        other => panic!("expected an error, got {:?}", other),
    }
    assert_eq!(h.session.state(), SessionState::Closed);
    assert!(h.factory.writer(0).unwrap().is_cancelled());

    h.session.stop();
    assert!(h.notifications.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_failed_finalize_reports_error_not_completion() {
    let factory = MemoryWriterFactory::new();
    factory.faults().fail_finalize(true);
    let mut h = Harness::with_factory(base_config(), factory);
    h.start_writing("/tmp/avsession-tests/trailer.mp4", ms(0));

    assert!(h.session.rotate());
    assert!(matches!(
        h.next().await,
        SessionNotification::Error {
            kind: ErrorKind::WriterFatal,
            ..
        }
    ));
    assert_eq!(h.session.state(), SessionState::Closed);
    assert_eq!(h.factory.writers().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finalize_io_error_is_reported_as_writer_fatal() {
    let factory = MemoryWriterFactory::new();
    factory.faults().finalize_io_error(true);
    let mut h = Harness::with_factory(base_config(), factory);
    h.start_writing("/tmp/avsession-tests/io.mp4", ms(0));

    h.session.stop();
    match h.next().await {
        SessionNotification::Error { kind, detail } => {
            assert_eq!(kind, ErrorKind::WriterFatal);
            assert!(detail.contains("finalize of segment 0 failed"));
            assert!(detail.contains("disk full"));
        }
        other => panic!("expected an error, got {:?}", other),
    }
    assert_eq!(h.session.state(), SessionState::Closed);
    assert!(h.notifications.try_recv().is_err());
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn test_rollover_open_failure_is_writer_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let mut h = Harness::with_factory(base_config(), MemoryWriterFactory::file_backed());
    h.start_writing(out.join("gone.mp4").to_str().unwrap(), ms(0));

    // The next segment cannot be created once its directory is gone
    std::fs::remove_dir_all(&out).unwrap();
    assert!(h.session.rotate());

    assert!(matches!(
        h.next().await,
        SessionNotification::SegmentComplete { file_number: 0, .. }
    ));
    match h.next().await {
        SessionNotification::Error { kind, detail } => {
            assert_eq!(kind, ErrorKind::WriterFatal);
            assert!(detail.contains("could not open segment 1"));
        }
        other => panic!("expected an error, got {:?}", other),
    }
    assert_eq!(h.session.state(), SessionState::Closed);
    assert_eq!(h.factory.writers().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_append_closes_session() {
    let mut h = Harness::new(base_config());
    h.start_writing("/tmp/avsession-tests/fatal.mp4", ms(0));

    h.factory.faults().fatal_appends(true);
    assert_eq!(
        h.session.on_sample(&MediaSample::audio(ms(20), vec![0u8; 8])),
        RouteOutcome::Rejected
    );
    assert!(matches!(
        h.next().await,
        SessionNotification::Error {
            kind: ErrorKind::WriterFatal,
            ..
        }
    ));
    assert_eq!(h.session.state(), SessionState::Closed);
    assert!(h.factory.writer(0).unwrap().is_cancelled());
    assert_eq!(
        h.session.on_sample(&MediaSample::audio(ms(40), vec![0u8; 8])),
        RouteOutcome::Dropped(DropReason::Closed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_reported_writer_failure_closes_session() {
    let mut h = Harness::new(base_config());
    h.start_writing("/tmp/avsession-tests/disk.mp4", ms(0));

    h.session.report_writer_failure("disk full");
    match h.next().await {
        SessionNotification::Error { kind, detail } => {
            assert_eq!(kind, ErrorKind::WriterFatal);
            assert!(detail.contains("disk full"));
        }
        other => panic!("expected an error, got {:?}", other),
    }
    assert_eq!(h.session.state(), SessionState::Closed);

    h.session.stop();
    assert!(h.notifications.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_is_fatal() {
    let factory = MemoryWriterFactory::new();
    factory.faults().fail_start(true);
    let mut h = Harness::with_factory(base_config(), factory);
    assert_ok!(h.session.start("/tmp/avsession-tests/nostart.mp4", None));
    h.session.bind_audio_format(audio_format(), None).unwrap();
    h.session.bind_video_format(video_format(), None, None).unwrap();

    assert_eq!(
        h.session.on_sample(&MediaSample::video(ms(0), vec![0u8; 8])),
        RouteOutcome::Dropped(DropReason::Closed)
    );
    assert!(matches!(h.next().await, SessionNotification::Error { .. }));
    assert_eq!(h.session.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_refused_track_leaves_kind_not_ready() {
    let factory = MemoryWriterFactory::new();
    factory.faults().refuse_tracks(true);
    let h = Harness::with_factory(
        base_config().with_required_tracks(RequiredTracks::audio_only()),
        factory,
    );
    assert_ok!(h.session.start("/tmp/avsession-tests/refused.mp4", None));

    assert_err!(h.session.bind_audio_format(audio_format(), None));
    assert!(!h.session.is_ready(MediaKind::Audio));
    assert_eq!(h.session.bound_format(MediaKind::Audio), None);
    assert_eq!(h.session.state(), SessionState::AwaitingTracks);

    // Once the writer accepts tracks again the same format can be bound
    h.factory.faults().refuse_tracks(false);
    assert_eq!(
        h.session.bind_audio_format(audio_format(), None).unwrap(),
        BindOutcome::Bound
    );
    assert!(h.session.is_ready(MediaKind::Audio));
    assert_eq!(
        h.session.on_sample(&MediaSample::audio(ms(0), vec![0u8; 8])),
        RouteOutcome::Forwarded
    );
    assert_eq!(h.session.state(), SessionState::Writing);
}

#[tokio::test(start_paused = true)]
async fn test_late_format_is_attached_on_next_segment() {
    let mut h = Harness::new(base_config().with_required_tracks(RequiredTracks::video_only()));
    assert_ok!(h.session.start("/tmp/avsession-tests/late_audio.mp4", None));
    h.session.bind_video_format(video_format(), None, None).unwrap();
    assert_eq!(
        h.session.on_sample(&MediaSample::video(ms(0), vec![0u8; 8])),
        RouteOutcome::Forwarded
    );

    // Writer already started: the format stays bound for the next segment
    assert_err!(h.session.bind_audio_format(audio_format(), None));
    assert!(h.session.bound_format(MediaKind::Audio).is_some());

    assert!(h.session.rotate());
    assert!(matches!(
        h.next().await,
        SessionNotification::SegmentComplete { file_number: 0, .. }
    ));
    assert!(h.session.is_ready(MediaKind::Audio));
    assert_eq!(h.factory.writer(1).unwrap().tracks().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_bind_is_ignored() {
    let h = Harness::new(base_config());
    h.start_writing("/tmp/avsession-tests/dup.mp4", ms(0));

    let wide = FormatDescription::video(CodecType::H264, 1920, 1080, PixelFormat::Nv12);
    assert_eq!(
        h.session.on_format_available(MediaKind::Video, wide).unwrap(),
        BindOutcome::Ignored
    );
    let bound = h.session.bound_format(MediaKind::Video).unwrap();
    assert_eq!(bound.description, video_format());
    assert_eq!(h.factory.writer(0).unwrap().tracks().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_per_track_order_is_preserved_across_threads() {
    let h = Harness::new(base_config());
    h.start_writing("/tmp/avsession-tests/threads.mp4", ms(0));

    let spawn_track = |kind: MediaKind| {
        let session = h.session.clone();
        std::thread::spawn(move || {
            for i in 1..=500u64 {
                let sample = MediaSample::new(kind, ms(i * 10), vec![0u8; 16]);
                assert_eq!(session.on_sample(&sample), RouteOutcome::Forwarded);
            }
        })
    };
    let audio = spawn_track(MediaKind::Audio);
    let video = spawn_track(MediaKind::Video);
    audio.join().unwrap();
    video.join().unwrap();

    let writer = h.factory.writer(0).unwrap();
    for kind in MediaKind::ALL {
        let pts = writer.appended_pts(kind);
        assert!(pts.windows(2).all(|w| w[0] < w[1]), "{} out of order", kind);
    }
    assert_eq!(writer.appended_pts(MediaKind::Audio).len(), 500);
    assert_eq!(writer.appended_pts(MediaKind::Video).len(), 501);
    assert_eq!(h.session.stats().forwarded(), 1001);
}

#[tokio::test]
async fn test_watch_reports_every_byte_before_completion() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("watched.mp4");
    let config = base_config()
        .with_watch(true)
        .with_watch_poll_interval(ms(10));
    let mut h = Harness::with_factory(config, MemoryWriterFactory::file_backed());
    h.start_writing(destination.to_str().unwrap(), ms(0));

    let mut written = 32u64;
    for i in 1..=20u64 {
        h.session.on_sample(&MediaSample::video(ms(i * 33), vec![7u8; 100]));
        written += 100;
    }
    // Let at least one poll observe the file
    match h.next().await {
        SessionNotification::SegmentGrowth { offset, .. } => assert_eq!(offset, 0),
        other => panic!("expected growth, got {:?}", other),
    }

    h.session.on_sample(&MediaSample::audio(ms(700), vec![9u8; 50]));
    written += 50;
    h.session.stop();

    let segment_path = dir.path().join("watched_0.mp4");
    let mut reported = 0u64;
    let mut completed = false;
    loop {
        match h.next().await {
            SessionNotification::SegmentGrowth {
                path,
                offset,
                length,
            } => {
                assert_eq!(path, segment_path);
                assert_eq!(offset, reported);
                reported = offset + length;
            }
            SessionNotification::SegmentComplete { path, file_number } => {
                assert_eq!(path, segment_path);
                assert_eq!(file_number, 0);
                assert_eq!(reported, written);
                completed = true;
            }
            SessionNotification::Finished => break,
            other => panic!("unexpected {:?}", other),
        }
    }
    assert!(completed, "segment never completed");
    assert_eq!(std::fs::metadata(&segment_path).unwrap().len(), written);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_growth_after_segment_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config()
        .with_watch(true)
        .with_watch_poll_interval(ms(1));
    let mut h = Harness::with_factory(config, MemoryWriterFactory::file_backed());
    h.start_writing(dir.path().join("race.mp4").to_str().unwrap(), ms(0));

    let mut written = vec![32u64, 0, 0];
    let mut seen = Vec::new();
    let mut pts = 0u64;
    for (segment, bytes) in written.iter_mut().enumerate() {
        for _ in 0..25 {
            pts += 33;
            assert_eq!(
                h.session.on_sample(&MediaSample::video(ms(pts), vec![5u8; 100])),
                RouteOutcome::Forwarded
            );
            *bytes += 100;
            tokio::time::sleep(ms(1)).await;
        }
        if segment < 2 {
            assert!(h.session.rotate());
        } else {
            h.session.stop();
        }
        loop {
            let notification = h.next().await;
            let done = matches!(notification, SessionNotification::SegmentComplete { .. });
            seen.push(notification);
            if done {
                break;
            }
        }
    }
    assert_eq!(h.next().await, SessionNotification::Finished);
    tokio::time::sleep(ms(20)).await;
    assert!(h.notifications.try_recv().is_err());

    let mut reported = vec![0u64; 3];
    let mut completed = vec![false; 3];
    for notification in &seen {
        match notification {
            SessionNotification::SegmentGrowth {
                path,
                offset,
                length,
            } => {
                let n = (0..3)
                    .find(|n| *path == dir.path().join(format!("race_{}.mp4", n)))
                    .expect("growth for an unknown file");
                assert!(!completed[n], "growth for segment {} after completion", n);
                assert_eq!(*offset, reported[n]);
                reported[n] += length;
            }
            SessionNotification::SegmentComplete { file_number, .. } => {
                completed[*file_number as usize] = true;
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(reported, written);
}

mod properties {
    use super::*;
    use quickcheck_macros::quickcheck;

    /// Each rollover advances the file number by one and never overlaps writers,
    /// whether it comes from the fragment timer or an explicit rotate.
    #[quickcheck]
    fn prop_rollover_numbers_are_sequential(triggers: Vec<bool>) -> bool {
        let triggers: Vec<bool> = triggers.into_iter().take(6).collect();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let mut h = Harness::new(base_config().with_fragment_interval(Duration::from_secs(5)));
            h.start_writing("/tmp/avsession-tests/prop.mp4", ms(0));

            let mut completed = Vec::new();
            for (i, rotate) in triggers.iter().enumerate() {
                if *rotate && !h.session.rotate() {
                    return false;
                }
                match h.next().await {
                    SessionNotification::SegmentComplete { file_number, .. } => {
                        completed.push(file_number)
                    }
                    _ => return false,
                }
                let pts = Duration::from_secs(10 * (i as u64 + 1));
                if h.session.on_sample(&MediaSample::video(pts, vec![0u8; 8]))
                    != RouteOutcome::Forwarded
                {
                    return false;
                }
            }

            h.session.stop();
            while let SessionNotification::SegmentComplete { file_number, .. } = h.next().await {
                completed.push(file_number);
            }

            let expected: Vec<u32> = (0..=triggers.len() as u32).collect();
            completed == expected
                && h.factory.writers().len() == triggers.len() + 1
                && h.factory.max_concurrently_open() == 1
                && h.session.state() == SessionState::Closed
        })
    }
}
