use futures::future::BoxFuture;

use crate::context::BootContext;
use crate::{Result, phase};

/// Tagged result of a phase hook. The scheduler resolves both arms uniformly:
/// `Done` means the hook already completed, `Deferred` carries the remainder
/// of the work to be awaited before the next plugin runs.
pub enum HookOutcome {
    Done,
    Deferred(BoxFuture<'static, Result<()>>),
}

/// A boot participant. Every method has a no-op default, so a plugin only
/// implements the phases it cares about; an absent hook is a silent skip.
///
/// Dispatch goes through [`BootPlugin::hook`] by phase name, never by
/// concrete type, so plugins registered by third parties participate in
/// exactly the same way as the built-ins.
pub trait BootPlugin: Send + Sync {
    /// Slot name in the configuration bag / instructions, e.g. `models`.
    fn name(&self) -> &str;

    /// Invoke the hook for `phase`, if this plugin defines one.
    fn hook(&self, phase_name: &str, ctx: &mut BootContext) -> Result<HookOutcome> {
        match phase_name {
            phase::LOAD => self.load(ctx).map(|()| HookOutcome::Done),
            phase::COMPILE => self.compile(ctx).map(|()| HookOutcome::Done),
            phase::STARTING => self.starting(ctx),
            phase::START => self.start(ctx),
            phase::STARTED => self.started(ctx),
            other => self.custom(other, ctx),
        }
    }

    fn load(&self, _ctx: &mut BootContext) -> Result<()> {
        Ok(())
    }

    fn compile(&self, _ctx: &mut BootContext) -> Result<()> {
        Ok(())
    }

    fn starting(&self, _ctx: &mut BootContext) -> Result<HookOutcome> {
        Ok(HookOutcome::Done)
    }

    fn start(&self, _ctx: &mut BootContext) -> Result<HookOutcome> {
        Ok(HookOutcome::Done)
    }

    fn started(&self, _ctx: &mut BootContext) -> Result<HookOutcome> {
        Ok(HookOutcome::Done)
    }

    /// Hook for phases outside the built-in sequence.
    fn custom(&self, _phase: &str, _ctx: &mut BootContext) -> Result<HookOutcome> {
        Ok(HookOutcome::Done)
    }
}
