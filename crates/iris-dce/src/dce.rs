use crate::footprint::Footprint;
use crate::liveness::LivenessTree;
use iris_api::{Cmd, StateKey};
use iris_task::{Cancelled, Context};
use iris_types::{CmdId, SubCmdIdx};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Accounting of what the pass kept and dropped, over the commands up to
/// the requested cap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DceStats {
    pub live_commands: usize,
    pub dead_commands: usize,
    pub live_read_bytes: u64,
    pub dead_read_bytes: u64,
    pub live_draw_calls: usize,
    pub dead_draw_calls: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DceResult {
    /// Live top-level commands, each exactly once, in capture order.
    pub commands: Vec<CmdId>,
    pub stats: DceStats,
}

/// Backward liveness propagation over a footprint.
///
/// Walks behaviors from the last requested one down to the first,
/// keeping a behavior when it is requested, flagged alive, or writes or
/// modifies state some later live behavior depends on. Live behaviors
/// mark what they read as live and what they fully overwrite as dead,
/// so earlier writers of overwritten state drop out.
pub struct DcePass<'a, K> {
    footprint: &'a Footprint<K>,
    commands: &'a [Cmd],
    framebuffer_hook: Option<Box<dyn FnMut(&SubCmdIdx) + 'a>>,
}

impl<'a, K: StateKey> DcePass<'a, K> {
    pub fn new(footprint: &'a Footprint<K>, commands: &'a [Cmd]) -> Self {
        DcePass {
            footprint,
            commands,
            framebuffer_hook: None,
        }
    }

    /// Invoked once per request before back-propagation; the default is a
    /// no-op.
    pub fn with_framebuffer_hook(mut self, hook: impl FnMut(&SubCmdIdx) + 'a) -> Self {
        self.framebuffer_hook = Some(Box::new(hook));
        self
    }

    pub fn run(mut self, ctx: &Context, requests: &[SubCmdIdx]) -> Result<DceResult, Cancelled> {
        if requests.is_empty() {
            return Ok(DceResult {
                commands: Vec::new(),
                stats: DceStats::default(),
            });
        }
        let cap = requests.iter().map(SubCmdIdx::cmd_id).max().unwrap();
        // A request resolves to the behavior it owns, or failing that to
        // the behavior of its top-level command.
        let end = requests
            .iter()
            .filter_map(|r| {
                self.footprint
                    .index_of(r)
                    .or_else(|| self.footprint.index_of(&SubCmdIdx::from_cmd(r.cmd_id())))
            })
            .max();
        let Some(end) = end else {
            warn!(
                cap = %cap,
                "no requested index owns a behavior, emitting every command up to the cap"
            );
            return Ok(self.emit_all(cap));
        };

        if let Some(hook) = self.framebuffer_hook.as_mut() {
            for request in requests {
                hook(request);
            }
        }

        let behaviors = self.footprint.behaviors();
        let mut live = vec![false; behaviors.len()];
        let mut tree = LivenessTree::new();
        for &parent in &self.footprint.addresses().parents()[1..] {
            tree.push(parent);
        }
        let requested: HashSet<&SubCmdIdx> = requests.iter().collect();

        for i in (0..=end).rev() {
            ctx.check()?;
            let b = &behaviors[i];
            if b.aborted {
                continue;
            }
            let wanted = b.alive
                || requested.contains(&b.owner)
                || requests.iter().any(|r| r.starts_with(&b.owner));
            let depended = b
                .writes
                .iter()
                .chain(&b.modifies)
                .any(|&addr| tree.is_live(addr));
            if !wanted && !depended {
                continue;
            }
            live[i] = true;
            // Full writes satisfy the dependency; whatever wrote the state
            // before is no longer needed. Reads and modifies still require
            // the prior value.
            for &addr in &b.writes {
                tree.mark_dead(addr);
            }
            for &addr in b.reads.iter().chain(&b.modifies) {
                tree.mark_live(addr);
            }
        }

        let mut emitted: HashSet<CmdId> = HashSet::new();
        let mut commands = Vec::new();
        for (i, b) in behaviors.iter().enumerate().take(end + 1) {
            if live[i] && b.owner.is_top_level() && emitted.insert(b.owner.cmd_id()) {
                commands.push(b.owner.cmd_id());
            }
        }
        let stats = self.tally(&emitted, cap);
        debug!(
            live = stats.live_commands,
            dead = stats.dead_commands,
            live_read_bytes = stats.live_read_bytes,
            dead_read_bytes = stats.dead_read_bytes,
            live_draw_calls = stats.live_draw_calls,
            dead_draw_calls = stats.dead_draw_calls,
            "dead code elimination finished"
        );
        Ok(DceResult { commands, stats })
    }

    /// Fallback for inconsistent collaborator data: elimination disables
    /// itself and every command up to the cap replays.
    fn emit_all(&self, cap: CmdId) -> DceResult {
        let commands: Vec<CmdId> = self
            .commands
            .iter()
            .map(|c| c.id)
            .filter(|&id| id <= cap)
            .collect();
        let live: HashSet<CmdId> = commands.iter().copied().collect();
        let stats = self.tally(&live, cap);
        DceResult { commands, stats }
    }

    fn tally(&self, live: &HashSet<CmdId>, cap: CmdId) -> DceStats {
        let mut stats = DceStats::default();
        for cmd in self.commands.iter().filter(|c| c.id <= cap) {
            if live.contains(&cmd.id) {
                stats.live_commands += 1;
                stats.live_read_bytes = stats.live_read_bytes.saturating_add(cmd.observed_read_bytes());
                stats.live_draw_calls += cmd.is_draw_call() as usize;
            } else {
                stats.dead_commands += 1;
                stats.dead_read_bytes = stats.dead_read_bytes.saturating_add(cmd.observed_read_bytes());
                stats.dead_draw_calls += cmd.is_draw_call() as usize;
            }
        }
        stats
    }
}
