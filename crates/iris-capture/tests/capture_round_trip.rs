use iris_api::{Cmd, CmdExtra, CmdFlags, Observation};
use iris_capture::{
    export, import, Capture, CaptureError, CaptureHeader, CaptureRegistry, InitialState,
    CURRENT_CAPTURE_VERSION, FOREIGN_TRACE_MAGIC,
};
use iris_pack::{Event, Message, Reader, Writer};
use iris_resource::{InMemoryStore, ResourceStore};
use iris_task::Context;
use iris_types::{ApiId, CmdId, MemoryRange};
use std::io::Cursor;

const MSG_HEADER: u64 = 1;
const MSG_COMMAND: u64 = 2;
const MSG_OBSERVATION: u64 = 3;

fn observed_cmd(store: &InMemoryStore, name: &str, base: u64, blob: &[u8]) -> Cmd {
    let resource = store.put(blob).unwrap();
    let mut cmd = Cmd::new(ApiId(1), name, vec![0xAA]);
    let obs = cmd.extras.get_or_append_observations();
    obs.reads.push(Observation {
        range: MemoryRange::new(base, blob.len() as u64),
        resource,
    });
    obs.writes.push(Observation {
        range: MemoryRange::new(base + 0x100, blob.len() as u64),
        resource,
    });
    cmd
}

fn round_trip(capture: &Capture, store: &InMemoryStore) -> Capture {
    let ctx = Context::background();
    let mut buf = Vec::new();
    export(&ctx, capture, store, &mut buf).unwrap();
    import(&ctx, capture.name.clone(), store, Cursor::new(buf)).unwrap()
}

#[test]
fn two_command_capture_round_trips() {
    let store = InMemoryStore::new();
    let p = observed_cmd(&store, "glBindBuffer", 0x1000, b"buffer-contents");
    let mut q = Cmd::new(ApiId(1), "glDrawArrays", vec![1, 2, 3, 4]).with_flags(CmdFlags::DRAW_CALL);
    q.set_result(vec![0]);
    let capture = Capture::new("seq", CaptureHeader::new("pixel", "arm64"), None, vec![p, q]);

    let decoded = round_trip(&capture, &store);
    assert_eq!(decoded.header.version, CURRENT_CAPTURE_VERSION);
    assert_eq!(decoded.header.device, "pixel");
    assert_eq!(decoded.commands.len(), 2);
    assert_eq!(decoded.commands[0].id, CmdId::new(0));
    assert_eq!(decoded.commands[1].id, CmdId::new(1));
    assert_eq!(decoded, capture);
}

#[test]
fn export_twice_yields_identical_bytes() {
    let store = InMemoryStore::new();
    let capture = Capture::new(
        "stable",
        CaptureHeader::new("d", "a"),
        None,
        vec![observed_cmd(&store, "cmd", 0, b"blob")],
    );
    let ctx = Context::background();
    let mut first = Vec::new();
    let mut second = Vec::new();
    export(&ctx, &capture, &store, &mut first).unwrap();
    export(&ctx, &capture, &store, &mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn shared_resource_bytes_are_written_once() {
    let store = InMemoryStore::new();
    // Both commands observe the same blob.
    let a = observed_cmd(&store, "a", 0, b"shared");
    let b = observed_cmd(&store, "b", 0x4000, b"shared");
    let capture = Capture::new("dedup", CaptureHeader::new("d", "a"), None, vec![a, b]);

    let ctx = Context::background();
    let mut buf = Vec::new();
    export(&ctx, &capture, &store, &mut buf).unwrap();

    let mut reader = Reader::new(Cursor::new(&buf)).unwrap();
    let mut resources = 0;
    while let Some(event) = reader.next_event().unwrap() {
        if let Event::Object { msg } = event {
            // Top-level objects are the header and resource payloads.
            if msg.msg_type != MSG_HEADER {
                resources += 1;
                assert_eq!(msg.bytes, b"shared");
            }
        }
    }
    assert_eq!(resources, 1);

    let decoded = import(&ctx, "dedup", &store, Cursor::new(buf)).unwrap();
    assert_eq!(decoded, capture);
}

#[test]
fn non_terminated_command_survives_round_trip() {
    let store = InMemoryStore::new();
    let mut cut_short = Cmd::new(ApiId(1), "vkQueueSubmit", vec![]);
    cut_short.terminated = false;
    let capture = Capture::new(
        "crash",
        CaptureHeader::new("d", "a"),
        None,
        vec![Cmd::new(ApiId(1), "vkCreateDevice", vec![]), cut_short],
    );
    let decoded = round_trip(&capture, &store);
    assert!(decoded.commands[0].terminated);
    assert!(!decoded.commands[1].terminated);
}

#[test]
fn opaque_extras_and_results_round_trip() {
    let store = InMemoryStore::new();
    let mut cmd = observed_cmd(&store, "glMapBuffer", 0x2000, b"mapped");
    cmd.extras.push(CmdExtra::Opaque {
        kind: 42,
        bytes: vec![9, 8, 7],
    });
    cmd.set_result(vec![0xde, 0xad]);
    let capture = Capture::new("extras", CaptureHeader::new("d", "a"), None, vec![cmd]);
    let decoded = round_trip(&capture, &store);
    assert_eq!(decoded, capture);
}

#[test]
fn extras_pushed_before_observations_round_trip() {
    let store = InMemoryStore::new();
    let resource = store.put(b"late").unwrap();
    let mut cmd = Cmd::new(ApiId(1), "glMapBuffer", vec![]);
    cmd.extras.push(CmdExtra::Opaque {
        kind: 7,
        bytes: vec![1, 2],
    });
    cmd.extras.get_or_append_observations().reads.push(Observation {
        range: MemoryRange::new(0x3000, 4),
        resource,
    });
    // Construction normalizes extras, so the decoded ordering matches.
    let capture = Capture::new("order", CaptureHeader::new("d", "a"), None, vec![cmd]);
    assert!(matches!(
        capture.commands[0].extras.iter().next(),
        Some(CmdExtra::Observations(_))
    ));
    let decoded = round_trip(&capture, &store);
    assert_eq!(decoded, capture);
}

#[test]
fn initial_state_round_trips() {
    let store = InMemoryStore::new();
    let resource = store.put(b"pre-existing memory").unwrap();
    let init = InitialState {
        memory: vec![Observation {
            range: MemoryRange::new(0x8000, 19),
            resource,
        }],
        apis: vec![iris_capture::ApiState {
            api: ApiId(3),
            payload: vec![1, 2],
        }],
    };
    let capture = Capture::new(
        "mec",
        CaptureHeader::new("d", "a"),
        Some(init),
        vec![Cmd::new(ApiId(3), "glFlush", vec![])],
    );
    let decoded = round_trip(&capture, &store);
    assert_eq!(decoded.initial_state, capture.initial_state);
    assert_eq!(decoded.observed.ranges()[0], MemoryRange::new(0x8000, 19));
}

fn header_msg_bytes(version: u32) -> Vec<u8> {
    let mut bytes = version.to_le_bytes().to_vec();
    bytes.push(3);
    bytes.extend_from_slice(b"dev");
    bytes.push(3);
    bytes.extend_from_slice(b"abi");
    bytes
}

fn stream_with_header_version(version: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut w = Writer::new(&mut buf).unwrap();
    w.object(&Message::new(MSG_HEADER, header_msg_bytes(version)))
        .unwrap();
    w.finish().unwrap();
    buf
}

#[test]
fn older_capture_version_is_rejected() {
    let ctx = Context::background();
    let store = InMemoryStore::new();
    let buf = stream_with_header_version(CURRENT_CAPTURE_VERSION - 1);
    assert!(matches!(
        import(&ctx, "old", &store, Cursor::new(buf)),
        Err(CaptureError::FileTooOld { .. })
    ));
}

#[test]
fn newer_capture_version_is_rejected() {
    let ctx = Context::background();
    let store = InMemoryStore::new();
    let buf = stream_with_header_version(CURRENT_CAPTURE_VERSION + 1);
    assert!(matches!(
        import(&ctx, "new", &store, Cursor::new(buf)),
        Err(CaptureError::FileTooNew { .. })
    ));
}

#[test]
fn stream_without_header_cannot_be_read() {
    let ctx = Context::background();
    let store = InMemoryStore::new();
    let mut buf = Vec::new();
    Writer::new(&mut buf).unwrap().finish().unwrap();
    assert!(matches!(
        import(&ctx, "empty", &store, Cursor::new(buf)),
        Err(CaptureError::FileCannotBeRead)
    ));
}

#[test]
fn foreign_trace_magic_is_rejected() {
    let ctx = Context::background();
    let store = InMemoryStore::new();
    let mut buf = vec![0u8; 100];
    buf.extend_from_slice(&FOREIGN_TRACE_MAGIC);
    buf.extend_from_slice(&[0u8; 100]);
    assert!(matches!(
        import(&ctx, "sys", &store, Cursor::new(buf)),
        Err(CaptureError::ForeignTrace)
    ));
}

#[test]
fn foreign_magic_past_the_scan_window_is_not_special() {
    let ctx = Context::background();
    let store = InMemoryStore::new();
    let mut buf = vec![0u8; 5000];
    buf.extend_from_slice(&FOREIGN_TRACE_MAGIC);
    // Scan passes; the stream then fails as an ordinary non-pack stream.
    assert!(matches!(
        import(&ctx, "late", &store, Cursor::new(buf)),
        Err(CaptureError::Pack(_))
    ));
}

fn command_msg_bytes(name: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&CmdId::NO_ID.value().to_le_bytes());
    bytes.push(name.len() as u8);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    bytes
}

#[test]
fn nested_command_groups_are_rejected() {
    let ctx = Context::background();
    let store = InMemoryStore::new();
    let mut buf = Vec::new();
    let mut w = Writer::new(&mut buf).unwrap();
    w.object(&Message::new(
        MSG_HEADER,
        header_msg_bytes(CURRENT_CAPTURE_VERSION),
    ))
    .unwrap();
    let outer = w
        .begin_group(&Message::new(MSG_COMMAND, command_msg_bytes("outer")))
        .unwrap();
    let inner = w
        .begin_child_group(outer, &Message::new(MSG_COMMAND, command_msg_bytes("inner")))
        .unwrap();
    w.end_group(inner).unwrap();
    w.end_group(outer).unwrap();
    w.finish().unwrap();
    assert!(matches!(
        import(&ctx, "nested", &store, Cursor::new(buf)),
        Err(CaptureError::NestedCommandGroup)
    ));
}

fn observation_msg_bytes(base: u64, size: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&base.to_le_bytes());
    bytes.extend_from_slice(&size.to_le_bytes());
    bytes.push(0);
    bytes.extend_from_slice(&[0xab; 20]);
    bytes
}

#[test]
fn wrapping_observation_interval_is_a_decode_error() {
    let ctx = Context::background();
    let store = InMemoryStore::new();
    let mut buf = Vec::new();
    let mut w = Writer::new(&mut buf).unwrap();
    w.object(&Message::new(
        MSG_HEADER,
        header_msg_bytes(CURRENT_CAPTURE_VERSION),
    ))
    .unwrap();
    let gid = w
        .begin_group(&Message::new(MSG_COMMAND, command_msg_bytes("cmd")))
        .unwrap();
    // base + size wraps the address space; a later well-formed
    // observation must never get the chance to merge with it.
    w.child_object(
        gid,
        &Message::new(MSG_OBSERVATION, observation_msg_bytes(u64::MAX, 2)),
    )
    .unwrap();
    w.child_object(
        gid,
        &Message::new(MSG_OBSERVATION, observation_msg_bytes(0x1000, 16)),
    )
    .unwrap();
    w.end_group(gid).unwrap();
    w.finish().unwrap();
    assert!(matches!(
        import(&ctx, "hostile", &store, Cursor::new(buf)),
        Err(CaptureError::BadMessage { .. })
    ));
}

#[test]
fn cancellation_aborts_export_and_import() {
    let store = InMemoryStore::new();
    let capture = Capture::new(
        "c",
        CaptureHeader::new("d", "a"),
        None,
        vec![Cmd::new(ApiId(1), "cmd", vec![])],
    );
    let mut buf = Vec::new();
    export(&Context::background(), &capture, &store, &mut buf).unwrap();

    let (ctx, cancel) = Context::background().with_cancel();
    cancel.cancel();
    let mut sink = Vec::new();
    assert!(matches!(
        export(&ctx, &capture, &store, &mut sink),
        Err(CaptureError::Cancelled(_))
    ));
    assert!(matches!(
        import(&ctx, "c", &store, Cursor::new(buf)),
        Err(CaptureError::Cancelled(_))
    ));
}

#[test]
fn registry_imports_and_exports_by_handle() {
    let reg = CaptureRegistry::new();
    let store = InMemoryStore::new();
    let ctx = Context::background();
    let capture = Capture::new(
        "trace-1",
        CaptureHeader::new("pixel", "arm64"),
        None,
        vec![observed_cmd(&store, "cmd", 0, b"blob")],
    );
    let mut buf = Vec::new();
    export(&ctx, &capture, &store, &mut buf).unwrap();

    let handle = reg.import(&ctx, "trace-1", &store, Cursor::new(buf)).unwrap();
    assert_eq!(handle.name(), "trace-1");
    assert_eq!(*reg.resolve(&handle).unwrap(), capture);

    let mut again = Vec::new();
    reg.export(&ctx, &handle, &store, &mut again).unwrap();
    let reimported = import(&ctx, "trace-1", &store, Cursor::new(again)).unwrap();
    assert_eq!(reimported, capture);
}
