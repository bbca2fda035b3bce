//! spec.md §8 scenario 1: download a single file in passive binary mode.
//!
//! Drives the whole stack through [`engine::engine_start`]/
//! [`engine::Engine::create_operation`] against an in-process fake FTP
//! server: one connection for `Engine::create_operation`'s root-shape
//! probe (`SIZE`/`QUIT`), one for the worker that actually performs the
//! `RETR`, plus a loopback listener for the `EPSV` data channel.

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use engine::config::{EndpointConfig, EngineConfig, OperationRequest};
use engine::{engine_start, EngineEvent, OperationState};
use scheduler::mask::TransferModeDefault;
use scheduler::policy::ConflictPolicies;
use scheduler::worker::OperationKind;
use test_support::{LoopbackListener, TempWorkspace};

#[test]
fn downloads_a_single_file_in_passive_binary_mode() {
    let control_listener = LoopbackListener::bind().unwrap();
    let control_addr: SocketAddr = ([127, 0, 0, 1], control_listener.port()).into();
    let data_listener = LoopbackListener::bind().unwrap();
    let data_port = data_listener.port();
    let payload = vec![0xAB_u8; 64 * 1024];
    let payload_for_server = payload.clone();

    let server = thread::spawn(move || {
        // Engine::create_operation's root-shape probe.
        let mut probe = control_listener.accept_once().unwrap();
        probe.write_all(b"220 test server ready\r\n").unwrap();
        let mut buf = [0_u8; 256];
        let n = probe.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"USER"));
        probe.write_all(b"230 logged in\r\n").unwrap();
        let n = probe.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"SYST"));
        probe.write_all(b"215 UNIX Type: L8\r\n").unwrap();
        let n = probe.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"FEAT"));
        probe.write_all(b"211 none\r\n").unwrap();
        let n = probe.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"SIZE /incoming/report.csv"));
        probe.write_all(b"213 65536\r\n").unwrap();
        let n = probe.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"QUIT"));
        probe.write_all(b"221 bye\r\n").unwrap();
        drop(probe);

        // The worker's own control connection.
        let mut control = control_listener.accept_once().unwrap();
        control.write_all(b"220 test server ready\r\n").unwrap();
        let n = control.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"USER"));
        control.write_all(b"230 logged in\r\n").unwrap();
        let n = control.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"SYST"));
        control.write_all(b"215 UNIX Type: L8\r\n").unwrap();
        let n = control.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"FEAT"));
        control.write_all(b"211 none\r\n").unwrap();

        let n = control.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"TYPE I"));
        control.write_all(b"200 type set to I\r\n").unwrap();
        let n = control.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"EPSV"));
        control.write_all(format!("229 Entering Extended Passive Mode (|||{data_port}|)\r\n").as_bytes()).unwrap();
        let n = control.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"RETR /incoming/report.csv"));

        let mut data = data_listener.accept_once().unwrap();
        data.write_all(&payload_for_server).unwrap();
        drop(data);
        control.write_all(b"226 Transfer complete\r\n").unwrap();
    });

    let workspace = TempWorkspace::new();
    let engine = engine_start(EngineConfig::default()).unwrap();
    let request = OperationRequest {
        kind: OperationKind::CopyDownload,
        endpoint: EndpointConfig { addr: control_addr, user: "anonymous".into(), password: "guest".into(), encrypt_control: Some(false) },
        local_root: workspace.root().to_path_buf(),
        remote_root: "/incoming/report.csv".to_string(),
        policies: ConflictPolicies::default(),
        unix_mode: None,
        masks: Vec::new(),
        ascii_mask: Vec::new(),
        transfer_mode_default: TransferModeDefault::Binary,
        initial_workers: Some(1),
    };

    let operation = engine.create_operation(request).unwrap();
    let events = operation.subscribe();

    let mut final_state = None;
    while let Ok(event) = events.recv_timeout(Duration::from_secs(10)) {
        if let EngineEvent::Completed(state) = event {
            final_state = Some(state);
            break;
        }
    }
    operation.cancel();

    assert_eq!(final_state, Some(OperationState::SuccessfullyFinished));
    let downloaded = workspace.read_file("report.csv").unwrap();
    assert_eq!(downloaded, payload);

    server.join().unwrap();
}
