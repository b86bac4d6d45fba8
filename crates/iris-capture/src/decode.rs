use crate::capture::{Capture, CaptureHeader, InitialState, CURRENT_CAPTURE_VERSION};
use crate::msg::{self, msg_type, ResourceRef};
use crate::CaptureError;
use iris_api::{Cmd, Observation};
use iris_pack::{Event, PackError, Reader};
use iris_resource::{ResourceId, ResourceStore};
use iris_task::Context;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::debug;

/// Embedded magic of the system-trace dialect. Streams carrying it within
/// their first 4 KiB belong to an external processor and are rejected.
pub const FOREIGN_TRACE_MAGIC: [u8; 16] = *b"\x82SYSTRACE-TRACE\x00";

const FOREIGN_SCAN_WINDOW: usize = 4096;

/// Reads a pack stream and reconstructs the capture under `name`.
///
/// Resource objects are deduplicated into `store` as they appear; command
/// groups are committed in stream order, each command's position becoming
/// its id. Cancellation is checked between records.
pub fn import<R: Read>(
    ctx: &Context,
    name: impl Into<String>,
    store: &dyn ResourceStore,
    mut source: R,
) -> Result<Capture, CaptureError> {
    let mut head = Vec::with_capacity(FOREIGN_SCAN_WINDOW);
    source
        .by_ref()
        .take(FOREIGN_SCAN_WINDOW as u64)
        .read_to_end(&mut head)
        .map_err(PackError::Io)?;
    if head
        .windows(FOREIGN_TRACE_MAGIC.len())
        .any(|w| w == FOREIGN_TRACE_MAGIC)
    {
        return Err(CaptureError::ForeignTrace);
    }
    let reader = Reader::new(Cursor::new(head).chain(source))?;
    decode_stream(ctx, name.into(), store, reader)
}

/// A group that has begun but not yet ended.
enum Staged {
    Cmd { cmd: Cmd, invoked: bool },
    Init(InitialState),
}

fn decode_stream<R: Read>(
    ctx: &Context,
    name: String,
    store: &dyn ResourceStore,
    mut reader: Reader<R>,
) -> Result<Capture, CaptureError> {
    let mut header: Option<CaptureHeader> = None;
    let mut groups: HashMap<u64, Staged> = HashMap::new();
    // Stream-local resource table; index 0 is the reserved zero sentinel.
    let mut res_ids: Vec<ResourceId> = vec![ResourceId::ZERO];
    let mut commands: Vec<Cmd> = Vec::new();
    let mut initial: Option<InitialState> = None;

    while let Some(event) = reader.next_event()? {
        ctx.check()?;
        let offset = reader.offset();
        let bad = |reason: &'static str| CaptureError::BadMessage { offset, reason };
        match event {
            Event::Object { msg } => match msg.msg_type {
                msg_type::HEADER => {
                    if header.is_some() {
                        return Err(bad("duplicate capture header"));
                    }
                    let h = msg::decode_header(&msg.bytes)
                        .ok_or(CaptureError::FileCannotBeRead)?;
                    match h.version.cmp(&CURRENT_CAPTURE_VERSION) {
                        std::cmp::Ordering::Less => {
                            return Err(CaptureError::FileTooOld {
                                version: h.version,
                                current: CURRENT_CAPTURE_VERSION,
                            })
                        }
                        std::cmp::Ordering::Greater => {
                            return Err(CaptureError::FileTooNew {
                                version: h.version,
                                current: CURRENT_CAPTURE_VERSION,
                            })
                        }
                        std::cmp::Ordering::Equal => {}
                    }
                    header = Some(h);
                }
                msg_type::RESOURCE => {
                    let id = store.put(&msg.bytes)?;
                    res_ids.push(id);
                }
                _ => return Err(bad("unexpected top-level object")),
            },
            Event::BeginGroup { id, msg } => {
                if header.is_none() {
                    return Err(bad("group before capture header"));
                }
                let staged = match msg.msg_type {
                    msg_type::COMMAND => Staged::Cmd {
                        cmd: msg::decode_command(&msg.bytes).ok_or(bad("bad command message"))?,
                        invoked: false,
                    },
                    msg_type::INITIAL_STATE => Staged::Init(InitialState::default()),
                    _ => return Err(bad("unexpected group message")),
                };
                groups.insert(id, staged);
            }
            Event::BeginChildGroup { parent, .. } => {
                return Err(match groups.get(&parent) {
                    Some(Staged::Cmd { .. }) => CaptureError::NestedCommandGroup,
                    _ => bad("unexpected child group"),
                });
            }
            Event::ChildObject { parent, msg } => {
                let staged = groups
                    .get_mut(&parent)
                    .ok_or(bad("child of an unknown group"))?;
                match staged {
                    Staged::Cmd { cmd, invoked } => match msg.msg_type {
                        msg_type::CMD_RESULT => {
                            cmd.set_result(msg.bytes);
                            *invoked = true;
                        }
                        msg_type::OBSERVATION => {
                            let (range, res) = msg::decode_observation(&msg.bytes)
                                .ok_or(bad("bad observation message"))?;
                            let resource = resolve_resource(res, &res_ids)
                                .ok_or(bad("bad resource index"))?;
                            let obs = cmd.extras.get_or_append_observations();
                            let o = Observation { range, resource };
                            if *invoked {
                                obs.writes.push(o);
                            } else {
                                obs.reads.push(o);
                            }
                        }
                        msg_type::CALL_MARKER => *invoked = true,
                        msg_type::EXTRA => {
                            let (kind, bytes) =
                                msg::decode_extra(&msg.bytes).ok_or(bad("bad extra message"))?;
                            cmd.extras.push(iris_api::CmdExtra::Opaque { kind, bytes });
                        }
                        _ => return Err(bad("unexpected command child")),
                    },
                    Staged::Init(init) => match msg.msg_type {
                        msg_type::OBSERVATION => {
                            let (range, res) = msg::decode_observation(&msg.bytes)
                                .ok_or(bad("bad observation message"))?;
                            let resource = resolve_resource(res, &res_ids)
                                .ok_or(bad("bad resource index"))?;
                            init.memory.push(Observation { range, resource });
                        }
                        msg_type::API_STATE => {
                            init.apis.push(
                                msg::decode_api_state(&msg.bytes)
                                    .ok_or(bad("bad API state message"))?,
                            );
                        }
                        _ => {
                            return Err(bad(
                                "initial-state children must be observations or API state",
                            ))
                        }
                    },
                }
            }
            Event::EndGroup { id } | Event::EndGroupNonTerminated { id } => {
                let terminated = matches!(event, Event::EndGroup { .. });
                match groups.remove(&id).ok_or(bad("close of an unknown group"))? {
                    Staged::Cmd { mut cmd, .. } => {
                        cmd.terminated = terminated;
                        commands.push(cmd);
                    }
                    Staged::Init(init) => initial = Some(init),
                }
            }
        }
    }

    let header = header.ok_or(CaptureError::FileCannotBeRead)?;
    debug!(
        name = %name,
        commands = commands.len(),
        resources = res_ids.len() - 1,
        "decoded capture"
    );
    Ok(Capture::new(name, header, initial, commands))
}

fn resolve_resource(res: ResourceRef, res_ids: &[ResourceId]) -> Option<ResourceId> {
    match res {
        ResourceRef::Hash(id) => Some(id),
        ResourceRef::Index(0) => None,
        ResourceRef::Index(i) => res_ids.get(i as usize).copied(),
    }
}
