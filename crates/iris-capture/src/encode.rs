use crate::capture::Capture;
use crate::msg::{self, msg_type, ResourceRef};
use crate::CaptureError;
use iris_api::Cmd;
use iris_pack::{Message, Writer};
use iris_resource::{ResourceId, ResourceStore};
use iris_task::Context;
use std::collections::HashMap;
use std::io::Write;

/// Serializes `capture` as a pack stream.
///
/// Resource payloads are deduplicated: each distinct resource is written
/// as a top-level object exactly once, immediately before the first
/// observation referencing it, and every observation refers to it by its
/// 1-based stream-local index. Cancellation is checked between commands;
/// a cancelled export closes open groups with non-terminated markers
/// before surfacing the error.
pub fn export<W: Write>(
    ctx: &Context,
    capture: &Capture,
    store: &dyn ResourceStore,
    sink: W,
) -> Result<(), CaptureError> {
    let mut w = Writer::new(sink)?;
    w.object(&Message::new(
        msg_type::HEADER,
        msg::encode_header(&capture.header),
    ))?;
    let mut seen: HashMap<ResourceId, u64> = HashMap::new();

    if let Some(init) = &capture.initial_state {
        let gid = w.begin_group(&Message::new(msg_type::INITIAL_STATE, Vec::new()))?;
        for obs in &init.memory {
            let res = resource_ref(&mut w, store, &mut seen, obs.resource)?;
            w.child_object(
                gid,
                &Message::new(
                    msg_type::OBSERVATION,
                    msg::encode_observation(obs.range, res),
                ),
            )?;
        }
        for api in &init.apis {
            w.child_object(
                gid,
                &Message::new(msg_type::API_STATE, msg::encode_api_state(api)),
            )?;
        }
        w.end_group(gid)?;
    }

    for cmd in &capture.commands {
        if let Err(cancelled) = ctx.check() {
            w.finish_cancelled()?;
            return Err(cancelled.into());
        }
        encode_command_group(&mut w, store, &mut seen, cmd)?;
    }
    w.finish()?;
    Ok(())
}

fn encode_command_group<W: Write>(
    w: &mut Writer<W>,
    store: &dyn ResourceStore,
    seen: &mut HashMap<ResourceId, u64>,
    cmd: &Cmd,
) -> Result<(), CaptureError> {
    let gid = w.begin_group(&Message::new(msg_type::COMMAND, msg::encode_command(cmd)))?;
    let obs = cmd.observations();
    if let Some(o) = obs {
        for read in &o.reads {
            let res = resource_ref(w, store, seen, read.resource)?;
            w.child_object(
                gid,
                &Message::new(
                    msg_type::OBSERVATION,
                    msg::encode_observation(read.range, res),
                ),
            )?;
        }
    }
    // The call marker splits pre-call reads from post-call writes; it is
    // emitted even for commands with no observations at all.
    w.child_object(gid, &Message::new(msg_type::CALL_MARKER, Vec::new()))?;
    if let Some(o) = obs {
        for write in &o.writes {
            let res = resource_ref(w, store, seen, write.resource)?;
            w.child_object(
                gid,
                &Message::new(
                    msg_type::OBSERVATION,
                    msg::encode_observation(write.range, res),
                ),
            )?;
        }
    }
    for extra in &cmd.extras {
        if let iris_api::CmdExtra::Opaque { kind, bytes } = extra {
            w.child_object(
                gid,
                &Message::new(msg_type::EXTRA, msg::encode_extra(*kind, bytes)),
            )?;
        }
    }
    if let Some(result) = &cmd.result {
        w.child_object(gid, &Message::new(msg_type::CMD_RESULT, result.clone()))?;
    }
    if cmd.terminated {
        w.end_group(gid)?;
    } else {
        w.end_group_non_terminated(gid)?;
    }
    Ok(())
}

/// Emits the resource's bytes on first sight and hands back its stream
/// index either way.
fn resource_ref<W: Write>(
    w: &mut Writer<W>,
    store: &dyn ResourceStore,
    seen: &mut HashMap<ResourceId, u64>,
    id: ResourceId,
) -> Result<ResourceRef, CaptureError> {
    if let Some(&index) = seen.get(&id) {
        return Ok(ResourceRef::Index(index));
    }
    let bytes = store.get(id)?;
    w.object(&Message::new(msg_type::RESOURCE, bytes))?;
    let index = seen.len() as u64 + 1;
    seen.insert(id, index);
    Ok(ResourceRef::Index(index))
}
