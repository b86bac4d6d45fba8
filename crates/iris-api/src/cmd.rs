use iris_resource::ResourceId;
use iris_types::{ApiId, CmdId, MemoryRange};

bitflags::bitflags! {
    /// Coarse command classification used for navigation and DCE statistics.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CmdFlags: u32 {
        const DRAW_CALL    = 1 << 0;
        const CLEAR        = 1 << 1;
        const END_OF_FRAME = 1 << 2;
        /// Synthesized for presentation, not captured from the application.
        const SYNTHETIC    = 1 << 3;
    }
}

/// A memory range the command read or wrote, backed by a stored blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    pub range: MemoryRange,
    pub resource: ResourceId,
}

/// The read and write observations attached to one command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CmdObservations {
    pub reads: Vec<Observation>,
    pub writes: Vec<Observation>,
}

impl CmdObservations {
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }
}

/// One entry in a command's ordered extras list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CmdExtra {
    Observations(CmdObservations),
    /// API-specific payload the core carries through verbatim.
    Opaque { kind: u16, bytes: Vec<u8> },
}

/// Ordered list of command extras.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CmdExtras(Vec<CmdExtra>);

impl CmdExtras {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, extra: CmdExtra) {
        self.0.push(extra);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CmdExtra> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The command's observations, if any extra carries them.
    pub fn observations(&self) -> Option<&CmdObservations> {
        self.0.iter().find_map(|e| match e {
            CmdExtra::Observations(o) => Some(o),
            _ => None,
        })
    }

    /// Moves the observations extra, if present, to the front. Opaque
    /// extras keep their relative order. Captures normalize extras on
    /// construction so encoding and decoding agree on the position.
    pub fn normalize(&mut self) {
        if let Some(pos) = self
            .0
            .iter()
            .position(|e| matches!(e, CmdExtra::Observations(_)))
        {
            if pos > 0 {
                let obs = self.0.remove(pos);
                self.0.insert(0, obs);
            }
        }
    }

    /// The observations extra, appended first if absent.
    pub fn get_or_append_observations(&mut self) -> &mut CmdObservations {
        let pos = self
            .0
            .iter()
            .position(|e| matches!(e, CmdExtra::Observations(_)));
        let pos = match pos {
            Some(p) => p,
            None => {
                self.0.push(CmdExtra::Observations(CmdObservations::default()));
                self.0.len() - 1
            }
        };
        match &mut self.0[pos] {
            CmdExtra::Observations(o) => o,
            _ => unreachable!(),
        }
    }
}

impl<'a> IntoIterator for &'a CmdExtras {
    type Item = &'a CmdExtra;
    type IntoIter = std::slice::Iter<'a, CmdExtra>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One unit of captured API activity.
///
/// `id` is assigned when the command is appended to a capture and equals
/// its position in the command list. `caller` is [`CmdId::NO_ID`] for
/// top-level commands; sub-commands reference the command that invoked
/// them. `terminated` is false when the capture ended mid-command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cmd {
    pub id: CmdId,
    pub api: ApiId,
    pub name: String,
    pub caller: CmdId,
    pub flags: CmdFlags,
    pub payload: Vec<u8>,
    pub extras: CmdExtras,
    pub result: Option<Vec<u8>>,
    pub terminated: bool,
}

impl Cmd {
    pub fn new(api: ApiId, name: impl Into<String>, payload: Vec<u8>) -> Self {
        Cmd {
            id: CmdId::NO_ID,
            api,
            name: name.into(),
            caller: CmdId::NO_ID,
            flags: CmdFlags::empty(),
            payload,
            extras: CmdExtras::new(),
            result: None,
            terminated: true,
        }
    }

    pub fn with_flags(mut self, flags: CmdFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn set_result(&mut self, result: Vec<u8>) {
        self.result = Some(result);
    }

    pub fn set_caller(&mut self, caller: CmdId) {
        self.caller = caller;
    }

    pub fn observations(&self) -> Option<&CmdObservations> {
        self.extras.observations()
    }

    /// Total bytes of read observations, saturating; the cost DCE
    /// accounts a command with when it stays live.
    pub fn observed_read_bytes(&self) -> u64 {
        self.observations()
            .map(|o| {
                o.reads
                    .iter()
                    .fold(0u64, |acc, r| acc.saturating_add(r.range.size))
            })
            .unwrap_or(0)
    }

    pub fn is_draw_call(&self) -> bool {
        self.flags.contains(CmdFlags::DRAW_CALL)
    }
}
