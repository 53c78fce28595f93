use approx::assert_relative_eq;
use platform::record::{self, ImuRecord, Record, ServoRecord};
use platform::{
    Clock, FrameError, ManualClock, Pipeline, PipelineConfig, PipelineEvent, PlatformError,
    PlatformReader, PlatformState, RawTriple, ReplaySource, SourceId, EVENT_QUEUE_CAPACITY,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn imu_line(source: SourceId, accel: [i16; 3], gyro: [i16; 3]) -> String {
    record::encode(&Record::Imu(ImuRecord {
        source,
        raw_accel: RawTriple::new(accel[0], accel[1], accel[2]),
        raw_gyro: RawTriple::new(gyro[0], gyro[1], gyro[2]),
    })) + "\r\n"
}

fn servo_line(angles: [i16; 6]) -> String {
    record::encode(&Record::Servo(ServoRecord { raw_angles: angles })) + "\n"
}

fn differences(events: &[PipelineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::Difference(_)))
        .count()
}

#[test]
fn difference_appears_once_both_imus_report() {
    let clock = ManualClock::new(0.0);
    let mut pipeline = Pipeline::default();

    let events = pipeline.process(
        imu_line(SourceId::Imu1, [2000, 0, 16390], [655, 0, 0]).as_bytes(),
        clock.now(),
    );
    assert_eq!(differences(&events), 0);

    clock.advance(0.01);
    let events = pipeline.process(
        imu_line(SourceId::Imu2, [1000, 0, 16390], [0, 0, 0]).as_bytes(),
        clock.now(),
    );
    assert_eq!(differences(&events), 1);

    let Some(PipelineEvent::Difference(sample)) = events.last() else {
        panic!("expected a difference sample, got {events:?}");
    };
    assert_eq!(sample.t, 0.01);
    assert_relative_eq!(sample.d_accel.x, 1000.0 * 0.000565, epsilon = 1e-6);
    assert_relative_eq!(sample.d_accel.z, 0.0);
    assert_relative_eq!(sample.d_gyro.x, 10.0_f32.to_radians(), epsilon = 1e-6);
}

#[test]
fn byte_by_byte_matches_bulk() {
    let mut stream = String::new();
    stream += &imu_line(SourceId::Imu1, [1, 2, 3], [4, 5, 6]);
    stream += "noise\n";
    stream += &imu_line(SourceId::Imu2, [-1, -2, -3], [-4, -5, -6]);
    stream += &servo_line([-90, -30, 0, 30, 60, 90]);

    let mut bulk = Pipeline::default();
    let expected = bulk.process(stream.as_bytes(), 1.0);

    let mut trickle = Pipeline::default();
    let mut events = Vec::new();
    for byte in stream.as_bytes() {
        events.extend(trickle.process(std::slice::from_ref(byte), 1.0));
    }
    assert_eq!(events, expected);
    assert_eq!(expected.len(), 5);
}

#[test]
fn corrupted_lines_are_skipped() {
    let good = imu_line(SourceId::Imu1, [10, 20, 30], [40, 50, 60]);
    let bad = good.replacen("20", "21", 1);
    let unknown = "IMU:7,0,0,0,0,0,0*39\n";

    let mut pipeline = Pipeline::default();
    let events = pipeline.process(format!("{bad}{unknown}{good}").as_bytes(), 0.0);

    let errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Rejected(r) => Some(r.error.kind()),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["ChecksumMismatch", "UnknownSourceId"]);
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Imu {
            source: SourceId::Imu1,
            ..
        })
    ));
}

#[test]
fn window_slides_with_clock() {
    let clock = ManualClock::new(0.0);
    let mut pipeline = Pipeline::new(&PipelineConfig {
        window_width: 4.0,
        ..Default::default()
    });
    pipeline.process(imu_line(SourceId::Imu2, [0; 3], [0; 3]).as_bytes(), clock.now());

    for t in [0.0, 1.0, 2.0, 3.0, 5.0] {
        clock.set(t);
        pipeline.process(imu_line(SourceId::Imu1, [100; 3], [0; 3]).as_bytes(), clock.now());
    }
    let times: Vec<f64> = pipeline.window().iter().map(|s| s.t).collect();
    assert_eq!(times, vec![1.0, 2.0, 3.0, 5.0]);
    assert_eq!(pipeline.window().range(), (1.0, 5.0));

    // quiet link: an empty read still advances the window
    clock.set(7.5);
    pipeline.process(&[], clock.now());
    let times: Vec<f64> = pipeline.window().iter().map(|s| s.t).collect();
    assert_eq!(times, vec![5.0]);
}

#[test]
fn reader_thread_publishes_events_and_state() {
    let mut stream = String::new();
    stream += &imu_line(SourceId::Imu1, [16390, -16390, 0], [0, 0, 0]);
    stream += &imu_line(SourceId::Imu2, [0, 0, 0], [0, 0, 0]);
    stream += &servo_line([0; 6]);
    let bytes = stream.into_bytes();

    let reader = PlatformReader::spawn(
        move || Ok(ReplaySource::new(bytes, 7)),
        ManualClock::new(2.0),
        PipelineConfig::default(),
    )
    .unwrap();

    let mut events = Vec::new();
    while events.len() < 4 {
        match reader.next_event(Duration::from_secs(5)) {
            Some(event) => events.push(event),
            None => panic!("timed out, got {events:?}"),
        }
    }
    assert_eq!(differences(&events), 1);
    assert!(matches!(events[3], PipelineEvent::Servo(_)));

    let state = reader.get_state().unwrap();
    assert!(state.imu[0].valid && state.imu[1].valid);
    assert_relative_eq!(state.g_force.x, 1.0);
    assert_relative_eq!(state.g_force.y, -1.0);
    assert_eq!(state.platform_accel, RawTriple::new(16390, -16390, 0));
    assert_eq!(state.servos.unwrap().normalized, [0.5; 6]);
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.time_range, (0.0, 2.0));
    assert_eq!(state.rejected, 0);

    reader.stop().unwrap();
}

fn wait_for_state(reader: &PlatformReader, done: impl Fn(&PlatformState) -> bool) -> PlatformState {
    for _ in 0..500 {
        let state = reader.get_state().unwrap();
        if done(&state) {
            return state;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("reader never reached the expected state");
}

#[test]
fn unread_events_are_bounded() {
    let mut stream = String::new();
    for i in 0..1000 {
        stream += &imu_line(SourceId::Imu1, [i, 0, 0], [0, 0, 0]);
        stream += &imu_line(SourceId::Imu2, [0, i, 0], [0, 0, 0]);
    }
    stream += &servo_line([45; 6]);
    let bytes = stream.into_bytes();

    let reader = PlatformReader::spawn(
        move || Ok(ReplaySource::new(bytes, 4096)),
        ManualClock::new(1.0),
        PipelineConfig::default(),
    )
    .unwrap();

    // nobody drains while the whole log is decoded
    let state = wait_for_state(&reader, |s| s.servos.is_some());
    assert_eq!(state.platform_accel, RawTriple::new(999, 0, 0));
    assert_eq!(state.rejected, 0);

    let queued = reader.drain_events();
    assert!(queued.len() <= EVENT_QUEUE_CAPACITY, "{} events queued", queued.len());
    assert!(matches!(
        queued.first(),
        Some(PipelineEvent::Imu {
            source: SourceId::Imu1,
            ..
        })
    ));
}

#[test]
fn quiet_link_still_slides_window() {
    let clock = Arc::new(ManualClock::new(1.0));
    let mut stream = imu_line(SourceId::Imu1, [100, 0, 0], [0, 0, 0]);
    stream += &imu_line(SourceId::Imu2, [0, 0, 0], [0, 0, 0]);
    let bytes = stream.into_bytes();

    let reader = PlatformReader::spawn(
        move || Ok(ReplaySource::new(bytes, 256)),
        Arc::clone(&clock),
        PipelineConfig::default(),
    )
    .unwrap();

    let state = wait_for_state(&reader, |s| s.errors.len() == 1);
    assert_eq!(state.time_range, (0.0, 1.0));

    // no more bytes arrive, only time passes
    clock.set(10.0);
    let state = wait_for_state(&reader, |s| s.errors.is_empty());
    assert_eq!(state.time_range, (6.0, 10.0));
    assert_eq!(state.accel_range, None);
}

#[test]
fn reader_reports_open_failure() {
    let result = PlatformReader::spawn(
        || -> Result<ReplaySource, PlatformError> {
            Err(PlatformError::Startup("no device".to_string()))
        },
        ManualClock::new(0.0),
        PipelineConfig::default(),
    );
    assert!(matches!(result, Err(PlatformError::Startup(_))));
}

#[test]
fn rejection_carries_offending_line() {
    let mut pipeline = Pipeline::default();
    let events = pipeline.process(b"S:1,2,3*00\n", 0.0);
    match &events[..] {
        [PipelineEvent::Rejected(rejected)] => {
            assert_eq!(rejected.line, "S:1,2,3*00");
            assert_eq!(
                rejected.error,
                FrameError::FieldCountMismatch {
                    expected: 6,
                    found: 3
                }
            );
        }
        other => panic!("unexpected events {other:?}"),
    }
}
