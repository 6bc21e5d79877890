//! Full bring-up, load, header and jump run against the simulated ROM.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sdp_core::protocol::{ACK_FILE_COMPLETE, IVT_BARKER_HEADER, WRITE_FILE_SETTLE};
use sdp_core::{
    BoardProfile, CommandKind, HabMode, IvtHeader, RecordingPlatform, SdpError, SdpEvent,
    SdpObserver, SdpSession, SimulatedDevice,
};

const LOAD_ADDRESS: u32 = 0x7080_0000;

#[derive(Default)]
struct ProgressLog {
    loads: Mutex<Vec<(u64, u64)>>,
    hab: Mutex<Vec<HabMode>>,
}

impl SdpObserver for ProgressLog {
    fn on_event(&self, event: &SdpEvent) {
        match event {
            SdpEvent::Progress {
                operation,
                current,
                total,
            } if operation == "load" => self.loads.lock().unwrap().push((*current, *total)),
            SdpEvent::HabMode { mode } => self.hab.lock().unwrap().push(*mode),
            _ => {}
        }
    }
}

fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn bring_up_load_and_boot() {
    let dev = SimulatedDevice::new();
    dev.set_hab_mode(HabMode::Production);
    let platform = RecordingPlatform::new();
    platform.add_file("uImage", image(10_000));
    let observer = Arc::new(ProgressLog::default());

    let session = SdpSession::with_parts(dev.clone(), observer.clone(), platform)
        .with_max_download_size(4096);

    session.bring_up(BoardProfile::KindleMddr).unwrap();
    let written = session.load_image(LOAD_ADDRESS, Path::new("uImage")).unwrap();
    let target = session.boot(LOAD_ADDRESS, true).unwrap();

    assert_eq!(written, 10_000);
    assert_eq!(target, LOAD_ADDRESS - 32);
    assert_eq!(dev.jumps(), vec![LOAD_ADDRESS - 32]);

    // The header sits below the untouched image.
    assert_eq!(dev.peek(LOAD_ADDRESS, 10_000), image(10_000));
    let header = IvtHeader::from_bytes(&dev.peek(LOAD_ADDRESS - 32, 32)).unwrap();
    assert_eq!(header.barker, IVT_BARKER_HEADER);
    assert_eq!(header.entry_address, LOAD_ADDRESS);

    // Three image chunks plus the header write.
    assert_eq!(dev.count_commands(CommandKind::WriteFile), 4);
    assert_eq!(
        *observer.loads.lock().unwrap(),
        vec![(4096, 10_000), (8192, 10_000), (10_000, 10_000)]
    );
    assert!(
        observer
            .hab
            .lock()
            .unwrap()
            .iter()
            .all(|&m| m == HabMode::Production)
    );

    // Four bring-up delays and one settle per WRITE_FILE, all 10 ms.
    let sleeps = session.platform().sleeps();
    assert_eq!(sleeps.iter().filter(|&&d| d == WRITE_FILE_SETTLE).count(), 8);
    assert_eq!(session.platform().total_slept(), Duration::from_millis(80));
}

#[test]
fn failed_load_stops_before_jump() {
    let dev = SimulatedDevice::new();
    let platform = RecordingPlatform::new();
    platform.add_file("uImage", image(100));
    let session = SdpSession::with_parts(dev.clone(), Arc::new(ProgressLog::default()), platform);

    session.bring_up(BoardProfile::KindleMddr).unwrap();
    dev.set_status_override(Some(0));

    let err = session.load_image(LOAD_ADDRESS, Path::new("uImage")).unwrap_err();

    match err {
        SdpError::StatusMismatch {
            kind,
            expected,
            actual,
        } => {
            assert_eq!(kind, CommandKind::WriteFile);
            assert_eq!(expected, ACK_FILE_COMPLETE);
            assert_eq!(actual, 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(dev.jumps().is_empty());
}
