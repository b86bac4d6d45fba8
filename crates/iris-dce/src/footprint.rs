use crate::address::{AddressMap, StateAddress};
use iris_api::{Cmd, FootprintProvider, Mutator, StateKey};
use iris_task::{Cancelled, Context};
use iris_types::{SubCmdIdx, SubCmdIdxTrie};
use tracing::warn;

/// What one (sub-)command does to abstract state, with keys interned to
/// addresses.
#[derive(Clone, Debug)]
pub struct Behavior {
    pub owner: SubCmdIdx,
    pub reads: Vec<StateAddress>,
    pub modifies: Vec<StateAddress>,
    pub writes: Vec<StateAddress>,
    /// Survives elimination regardless of dependencies.
    pub alive: bool,
    /// Failed during capture or mutation; neither stays live nor
    /// propagates dependencies.
    pub aborted: bool,
}

/// The dependency footprint of a command list.
///
/// Behaviors are appended strictly in command order; `lookup` reflects
/// the last behavior recorded for any owner index.
pub struct Footprint<K> {
    behaviors: Vec<Behavior>,
    lookup: SubCmdIdxTrie<usize>,
    addresses: AddressMap<K>,
}

impl<K: StateKey> Footprint<K> {
    /// Builds the footprint by inviting, per command, the provider for its
    /// API to describe a behavior.
    ///
    /// A refusal (no provider for the API, or the provider returning
    /// `None`) keeps the command alive unconditionally. Either way the
    /// command is still run through `mutator` so downstream APIs observe
    /// its side effects; a mutation failure is logged, marks the behavior
    /// aborted and does not stop the build.
    pub fn build(
        ctx: &Context,
        commands: &[Cmd],
        providers: &[&dyn FootprintProvider<K>],
        mut mutator: Option<&mut dyn Mutator>,
    ) -> Result<Self, Cancelled> {
        let mut footprint = Footprint {
            behaviors: Vec::with_capacity(commands.len()),
            lookup: SubCmdIdxTrie::new(),
            addresses: AddressMap::new(),
        };
        for cmd in commands {
            ctx.check()?;
            let owner = SubCmdIdx::from_cmd(cmd.id);
            let spec = providers
                .iter()
                .find(|p| p.api() == cmd.api)
                .and_then(|p| p.behavior(ctx, &owner, cmd));
            let mut behavior = match spec {
                Some(spec) => Behavior {
                    owner: owner.clone(),
                    reads: footprint.intern_all(&spec.reads),
                    modifies: footprint.intern_all(&spec.modifies),
                    writes: footprint.intern_all(&spec.writes),
                    alive: spec.keep_alive,
                    aborted: spec.aborted,
                },
                None => Behavior {
                    owner: owner.clone(),
                    reads: Vec::new(),
                    modifies: Vec::new(),
                    writes: Vec::new(),
                    alive: true,
                    aborted: false,
                },
            };
            if let Some(m) = mutator.as_mut() {
                if let Err(err) = m.mutate(ctx, cmd.id, cmd) {
                    warn!(command = %cmd.id, error = %err, "state mutation failed, behavior aborted");
                    behavior.aborted = true;
                }
            }
            let index = footprint.behaviors.len();
            footprint.lookup.set(&owner, index);
            footprint.behaviors.push(behavior);
        }
        Ok(footprint)
    }

    fn intern_all(&mut self, keys: &[K]) -> Vec<StateAddress> {
        keys.iter().map(|k| self.addresses.intern(k)).collect()
    }

    pub fn behaviors(&self) -> &[Behavior] {
        &self.behaviors
    }

    /// The behavior owned by exactly `idx`, if one was recorded.
    pub fn behavior_of(&self, idx: &SubCmdIdx) -> Option<&Behavior> {
        self.index_of(idx).map(|i| &self.behaviors[i])
    }

    pub(crate) fn index_of(&self, idx: &SubCmdIdx) -> Option<usize> {
        self.lookup.value(idx).copied()
    }

    pub fn addresses(&self) -> &AddressMap<K> {
        &self.addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_api::{BehaviorSpec, MutationError};
    use iris_types::{ApiId, CmdId};
    use std::collections::HashMap;

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    struct Slot(u32);

    impl StateKey for Slot {
        fn parent(&self) -> Option<Self> {
            None
        }
    }

    struct Scripted {
        api: ApiId,
        specs: HashMap<u64, BehaviorSpec<Slot>>,
    }

    impl FootprintProvider<Slot> for Scripted {
        fn api(&self) -> ApiId {
            self.api
        }

        fn behavior(&self, _ctx: &Context, idx: &SubCmdIdx, _cmd: &Cmd) -> Option<BehaviorSpec<Slot>> {
            self.specs.get(&idx.cmd_id().value()).cloned()
        }
    }

    struct FailAt(u64);

    impl Mutator for FailAt {
        fn mutate(&mut self, _ctx: &Context, id: CmdId, _cmd: &Cmd) -> Result<(), MutationError> {
            if id.value() == self.0 {
                return Err(MutationError {
                    id,
                    reason: "bad argument".into(),
                });
            }
            Ok(())
        }
    }

    fn commands(n: u64) -> Vec<Cmd> {
        (0..n)
            .map(|i| {
                let mut cmd = Cmd::new(ApiId(1), format!("cmd{i}"), vec![]);
                cmd.id = CmdId::new(i);
                cmd
            })
            .collect()
    }

    #[test]
    fn refused_commands_stay_alive() {
        let ctx = Context::background();
        let cmds = commands(2);
        let provider = Scripted {
            api: ApiId(1),
            specs: HashMap::from([(
                0,
                BehaviorSpec {
                    writes: vec![Slot(1)],
                    ..Default::default()
                },
            )]),
        };
        let fp = Footprint::build(&ctx, &cmds, &[&provider], None).unwrap();
        assert!(!fp.behaviors()[0].alive);
        // No spec for command 1: kept alive unconditionally.
        assert!(fp.behaviors()[1].alive);
        assert!(fp.behaviors()[1].writes.is_empty());
    }

    #[test]
    fn mutation_failure_aborts_the_behavior_but_not_the_build() {
        let ctx = Context::background();
        let cmds = commands(3);
        let provider = Scripted {
            api: ApiId(1),
            specs: HashMap::new(),
        };
        let mut mutator = FailAt(1);
        let fp = Footprint::build(&ctx, &cmds, &[&provider], Some(&mut mutator)).unwrap();
        assert_eq!(fp.behaviors().len(), 3);
        assert!(!fp.behaviors()[0].aborted);
        assert!(fp.behaviors()[1].aborted);
        assert!(!fp.behaviors()[2].aborted);
    }

    #[test]
    fn lookup_maps_owners_to_behavior_indices() {
        let ctx = Context::background();
        let cmds = commands(3);
        let provider = Scripted {
            api: ApiId(1),
            specs: HashMap::new(),
        };
        let fp = Footprint::build(&ctx, &cmds, &[&provider], None).unwrap();
        for i in 0..3u64 {
            let idx = SubCmdIdx::from_cmd(CmdId::new(i));
            assert_eq!(fp.index_of(&idx), Some(i as usize));
            assert_eq!(fp.behavior_of(&idx).unwrap().owner, idx);
        }
        assert_eq!(fp.index_of(&SubCmdIdx::from_cmd(CmdId::new(9))), None);
    }

    #[test]
    fn cancellation_stops_the_build() {
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();
        let cmds = commands(1);
        let provider = Scripted {
            api: ApiId(1),
            specs: HashMap::new(),
        };
        assert!(Footprint::build(&ctx, &cmds, &[&provider], None).is_err());
    }
}
