use iris_api::{Cmd, Observation};
use iris_types::{ApiId, CmdId, MemoryRangeList};

/// Stamped into every capture header on construction and export; imports
/// with any other version are rejected.
pub const CURRENT_CAPTURE_VERSION: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureHeader {
    pub version: u32,
    pub device: String,
    pub abi: String,
}

impl CaptureHeader {
    pub fn new(device: impl Into<String>, abi: impl Into<String>) -> Self {
        CaptureHeader {
            version: CURRENT_CAPTURE_VERSION,
            device: device.into(),
            abi: abi.into(),
        }
    }
}

/// Opaque per-API state snapshot carried by an initial-state group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiState {
    pub api: ApiId,
    pub payload: Vec<u8>,
}

/// Mid-execution state captured before the first command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InitialState {
    pub memory: Vec<Observation>,
    pub apis: Vec<ApiState>,
}

/// The immutable in-memory model of one trace.
///
/// `commands[i].id == CmdId(i)`. Built once by [`Capture::new`] (directly
/// or via the decoder) and never mutated afterwards.
#[derive(Debug, PartialEq, Eq)]
pub struct Capture {
    pub name: String,
    pub header: CaptureHeader,
    pub commands: Vec<Cmd>,
    /// APIs in first-seen command order, deduplicated.
    pub apis: Vec<ApiId>,
    /// Every observed memory range of the stream, merged and sorted.
    pub observed: MemoryRangeList,
    pub initial_state: Option<InitialState>,
}

impl Capture {
    /// Normalizes and assembles a capture.
    ///
    /// Walks commands in order noting each distinct API, merges every
    /// observation's range (including initial-state memory) into the
    /// observed list, assigns each command its position as [`CmdId`],
    /// normalizes extras (observations first) and stamps the current
    /// capture version into the header.
    pub fn new(
        name: impl Into<String>,
        mut header: CaptureHeader,
        initial_state: Option<InitialState>,
        mut commands: Vec<Cmd>,
    ) -> Self {
        header.version = CURRENT_CAPTURE_VERSION;
        let mut apis = Vec::new();
        let mut observed = MemoryRangeList::new();
        if let Some(init) = &initial_state {
            for obs in &init.memory {
                observed.add(obs.range);
            }
        }
        for (i, cmd) in commands.iter_mut().enumerate() {
            cmd.id = CmdId::new(i as u64);
            cmd.extras.normalize();
            if !apis.contains(&cmd.api) {
                apis.push(cmd.api);
            }
            if let Some(obs) = cmd.observations() {
                for o in obs.reads.iter().chain(&obs.writes) {
                    observed.add(o.range);
                }
            }
        }
        Capture {
            name: name.into(),
            header,
            commands,
            apis,
            observed,
            initial_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_api::CmdObservations;
    use iris_resource::ResourceId;
    use iris_types::MemoryRange;

    fn cmd_with_read(api: u32, base: u64, size: u64) -> Cmd {
        let mut cmd = Cmd::new(ApiId(api), "cmd", vec![]);
        let obs: &mut CmdObservations = cmd.extras.get_or_append_observations();
        obs.reads.push(Observation {
            range: MemoryRange::new(base, size),
            resource: ResourceId::of(b"blob"),
        });
        cmd
    }

    #[test]
    fn new_assigns_sequential_ids_and_stamps_version() {
        let mut header = CaptureHeader::new("dev", "abi");
        header.version = 999;
        let capture = Capture::new(
            "t",
            header,
            None,
            vec![
                Cmd::new(ApiId(1), "a", vec![]),
                Cmd::new(ApiId(1), "b", vec![]),
            ],
        );
        assert_eq!(capture.header.version, CURRENT_CAPTURE_VERSION);
        assert_eq!(capture.commands[0].id, CmdId::new(0));
        assert_eq!(capture.commands[1].id, CmdId::new(1));
    }

    #[test]
    fn new_collects_apis_in_first_seen_order() {
        let capture = Capture::new(
            "t",
            CaptureHeader::new("dev", "abi"),
            None,
            vec![
                Cmd::new(ApiId(2), "a", vec![]),
                Cmd::new(ApiId(1), "b", vec![]),
                Cmd::new(ApiId(2), "c", vec![]),
            ],
        );
        assert_eq!(capture.apis, vec![ApiId(2), ApiId(1)]);
    }

    #[test]
    fn new_normalizes_extras_ordering() {
        let mut cmd = Cmd::new(ApiId(1), "a", vec![]);
        cmd.extras.push(iris_api::CmdExtra::Opaque {
            kind: 7,
            bytes: vec![1],
        });
        cmd.extras.get_or_append_observations().reads.push(Observation {
            range: MemoryRange::new(0, 4),
            resource: ResourceId::of(b"r"),
        });
        let capture = Capture::new("t", CaptureHeader::new("dev", "abi"), None, vec![cmd]);
        assert!(matches!(
            capture.commands[0].extras.iter().next(),
            Some(iris_api::CmdExtra::Observations(_))
        ));
    }

    #[test]
    fn new_merges_observed_ranges_across_commands_and_initial_state() {
        let init = InitialState {
            memory: vec![Observation {
                range: MemoryRange::new(0, 8),
                resource: ResourceId::of(b"init"),
            }],
            apis: vec![],
        };
        let capture = Capture::new(
            "t",
            CaptureHeader::new("dev", "abi"),
            Some(init),
            vec![cmd_with_read(1, 8, 8), cmd_with_read(1, 32, 8)],
        );
        assert_eq!(capture.observed.ranges().len(), 2);
        assert_eq!(capture.observed.ranges()[0], MemoryRange::new(0, 16));
        assert_eq!(capture.observed.ranges()[1], MemoryRange::new(32, 8));
    }
}
