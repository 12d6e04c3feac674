//! Binary method interception: hooks attached to host methods at runtime.
//!
//! Mods register hooks against host method signatures through a staged [`Patcher`].
//! Hooks come in four roles with a fixed application order ([`PatchRole`]); a whole
//! patch stages atomically, so a patch that fails halfway leaves nothing behind. The
//! [`InterceptionRegistry`] validates every target against the host metadata up front,
//! which turns "patched a method that no longer exists" from a crash at call time into
//! a diagnosable error at patch time.

use std::collections::{BTreeMap, HashSet};

use crate::{
    error::error_summary,
    metadata::{body::MethodBody, host::HostMetadata},
    monitor::{LogLevel, Monitor},
    Error, Result,
};

/// The role of one hook. The declaration order is the fixed precedence used when
/// listing active patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum PatchRole {
    /// Runs before the original; may skip it.
    Prefix,
    /// Runs after the original completes normally.
    Postfix,
    /// Runs last, always, and observes any error from the original.
    Finalizer,
    /// Rewrites the target method body at patch time.
    Transpiler,
}

/// Where a patch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum PatchStatus {
    /// Not yet applied.
    Unapplied,
    /// Currently staging its hooks.
    Applying,
    /// All hooks committed.
    Applied,
    /// Staging failed; no hooks were committed.
    Failed,
}

/// Mutable state threaded through the hooks of one intercepted call.
#[derive(Debug, Default)]
pub struct InterceptContext {
    notes: Vec<String>,
}

impl InterceptContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        InterceptContext::default()
    }

    /// Record a note visible to later hooks and to the caller.
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// All notes recorded so far, in order.
    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

/// A prefix hook; returning `false` skips the original method.
pub type PrefixFn = Box<dyn Fn(&mut InterceptContext) -> bool>;
/// A postfix hook.
pub type PostfixFn = Box<dyn Fn(&mut InterceptContext)>;
/// A finalizer hook; receives the original's error, if any.
pub type FinalizerFn = Box<dyn Fn(&mut InterceptContext, Option<&Error>)>;
/// A transpiler; rewrites the target method body.
pub type TranspilerFn = Box<dyn Fn(&mut MethodBody)>;

/// A validated reference to a patchable host method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    signature: String,
}

impl MethodHandle {
    /// The target method's display signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

struct Hook<F> {
    owner: String,
    name: String,
    func: F,
}

#[derive(Default)]
struct TargetHooks {
    transpilers: Vec<Hook<TranspilerFn>>,
    prefixes: Vec<Hook<PrefixFn>>,
    postfixes: Vec<Hook<PostfixFn>>,
    finalizers: Vec<Hook<FinalizerFn>>,
}

/// One hook in a registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveHook {
    /// The id of the mod that registered the hook.
    pub owner: String,
    /// The hook's role.
    pub role: PatchRole,
    /// The hook's display name.
    pub name: String,
}

/// All hooks attached to one target method, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPatches {
    /// The target method's display signature.
    pub method: String,
    /// The attached hooks, sorted by role then registration order.
    pub hooks: Vec<ActiveHook>,
}

/// The central registry of all committed hooks, keyed by target method signature.
#[derive(Default)]
pub struct InterceptionRegistry {
    targets: BTreeMap<String, TargetHooks>,
    known_methods: HashSet<String>,
}

impl InterceptionRegistry {
    /// Create a registry that validates targets against the given host metadata.
    #[must_use]
    pub fn new(host: &HostMetadata) -> Self {
        InterceptionRegistry {
            targets: BTreeMap::new(),
            known_methods: host.method_signatures().map(String::from).collect(),
        }
    }

    /// Resolve a host method signature to a patchable handle.
    ///
    /// # Errors
    /// Returns [`Error::MissingTarget`] when the host has no method with that signature.
    pub fn handle(&self, signature: &str) -> Result<MethodHandle> {
        if self.known_methods.contains(signature) {
            Ok(MethodHandle {
                signature: signature.to_string(),
            })
        } else {
            Err(Error::MissingTarget(signature.to_string()))
        }
    }

    /// Run one intercepted call: prefixes, the original (unless skipped), postfixes,
    /// then finalizers.
    ///
    /// Postfixes are skipped when the original fails; finalizers always run and observe
    /// the error. The original's error, if any, is returned after the finalizers.
    pub fn invoke<F>(
        &self,
        signature: &str,
        ctx: &mut InterceptContext,
        original: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut InterceptContext) -> Result<()>,
    {
        let Some(hooks) = self.targets.get(signature) else {
            return original(ctx);
        };

        let mut run_original = true;
        for prefix in &hooks.prefixes {
            if !(prefix.func)(ctx) {
                run_original = false;
            }
        }

        let result = if run_original { original(ctx) } else { Ok(()) };

        if result.is_ok() {
            for postfix in &hooks.postfixes {
                (postfix.func)(ctx);
            }
        }
        for finalizer in &hooks.finalizers {
            (finalizer.func)(ctx, result.as_ref().err());
        }
        result
    }

    /// Apply all transpilers registered for a target to a method body, in
    /// registration order.
    pub fn transpile(&self, signature: &str, body: &mut MethodBody) {
        if let Some(hooks) = self.targets.get(signature) {
            for transpiler in &hooks.transpilers {
                (transpiler.func)(body);
            }
        }
    }

    /// A diagnostic snapshot of every committed hook, sorted by target method name then
    /// role. The sort ignores the return type prefix in the display signature, so targets
    /// on the same type list alphabetically by method.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TargetPatches> {
        let mut targets: Vec<TargetPatches> = self
            .targets
            .iter()
            .map(|(method, hooks)| {
                let mut active: Vec<ActiveHook> = Vec::new();
                for h in &hooks.prefixes {
                    active.push(ActiveHook {
                        owner: h.owner.clone(),
                        role: PatchRole::Prefix,
                        name: h.name.clone(),
                    });
                }
                for h in &hooks.postfixes {
                    active.push(ActiveHook {
                        owner: h.owner.clone(),
                        role: PatchRole::Postfix,
                        name: h.name.clone(),
                    });
                }
                for h in &hooks.finalizers {
                    active.push(ActiveHook {
                        owner: h.owner.clone(),
                        role: PatchRole::Finalizer,
                        name: h.name.clone(),
                    });
                }
                for h in &hooks.transpilers {
                    active.push(ActiveHook {
                        owner: h.owner.clone(),
                        role: PatchRole::Transpiler,
                        name: h.name.clone(),
                    });
                }
                TargetPatches {
                    method: method.clone(),
                    hooks: active,
                }
            })
            .collect();
        targets.sort_by(|a, b| method_sort_key(&a.method).cmp(method_sort_key(&b.method)));
        targets
    }

    fn commit(&mut self, staged: Vec<StagedHook>) {
        for hook in staged {
            let target = self.targets.entry(hook.signature).or_default();
            match hook.kind {
                StagedKind::Transpiler(func) => target.transpilers.push(Hook {
                    owner: hook.owner,
                    name: hook.name,
                    func,
                }),
                StagedKind::Prefix(func) => target.prefixes.push(Hook {
                    owner: hook.owner,
                    name: hook.name,
                    func,
                }),
                StagedKind::Postfix(func) => target.postfixes.push(Hook {
                    owner: hook.owner,
                    name: hook.name,
                    func,
                }),
                StagedKind::Finalizer(func) => target.finalizers.push(Hook {
                    owner: hook.owner,
                    name: hook.name,
                    func,
                }),
            }
        }
    }
}

/// The `Type::Name(...)` portion of a display signature, after the return type.
fn method_sort_key(signature: &str) -> &str {
    signature
        .split_once(' ')
        .map_or(signature, |(_, rest)| rest)
}

enum StagedKind {
    Transpiler(TranspilerFn),
    Prefix(PrefixFn),
    Postfix(PostfixFn),
    Finalizer(FinalizerFn),
}

struct StagedHook {
    signature: String,
    owner: String,
    name: String,
    kind: StagedKind,
}

/// Stages the hooks of one patch; nothing reaches the registry until
/// [`commit`](Patcher::commit).
pub struct Patcher<'a> {
    owner: String,
    registry: &'a mut InterceptionRegistry,
    staged: Vec<StagedHook>,
}

impl<'a> Patcher<'a> {
    /// Create a patcher staging hooks on behalf of the given mod id.
    #[must_use]
    pub fn new(owner: impl Into<String>, registry: &'a mut InterceptionRegistry) -> Self {
        Patcher {
            owner: owner.into(),
            registry,
            staged: Vec::new(),
        }
    }

    /// Resolve a target method by its display signature.
    ///
    /// # Errors
    /// Returns [`Error::MissingTarget`] when the host has no such method.
    pub fn target(&self, signature: &str) -> Result<MethodHandle> {
        self.registry.handle(signature)
    }

    /// Stage a prefix hook on a target.
    pub fn hook_prefix(&mut self, target: &MethodHandle, name: impl Into<String>, func: PrefixFn) {
        self.stage(target, name, StagedKind::Prefix(func));
    }

    /// Stage a postfix hook on a target.
    pub fn hook_postfix(
        &mut self,
        target: &MethodHandle,
        name: impl Into<String>,
        func: PostfixFn,
    ) {
        self.stage(target, name, StagedKind::Postfix(func));
    }

    /// Stage a finalizer hook on a target.
    pub fn hook_finalizer(
        &mut self,
        target: &MethodHandle,
        name: impl Into<String>,
        func: FinalizerFn,
    ) {
        self.stage(target, name, StagedKind::Finalizer(func));
    }

    /// Stage a transpiler on a target.
    pub fn hook_transpiler(
        &mut self,
        target: &MethodHandle,
        name: impl Into<String>,
        func: TranspilerFn,
    ) {
        self.stage(target, name, StagedKind::Transpiler(func));
    }

    /// The number of hooks staged so far.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Commit every staged hook to the registry.
    pub fn commit(self) {
        self.registry.commit(self.staged);
    }

    /// Drop every staged hook without committing.
    pub fn discard(self) {}

    fn stage(&mut self, target: &MethodHandle, name: impl Into<String>, kind: StagedKind) {
        self.staged.push(StagedHook {
            signature: target.signature.clone(),
            owner: self.owner.clone(),
            name: name.into(),
            kind,
        });
    }
}

/// A set of runtime hooks a mod applies as one atomic unit.
pub trait Patch {
    /// A human-readable name for the patch, used in error messages.
    fn name(&self) -> &str;

    /// Stage this patch's hooks through the given patcher.
    ///
    /// # Errors
    /// Any error discards every hook staged by this patch.
    fn apply(&self, patcher: &mut Patcher<'_>, monitor: &dyn Monitor) -> Result<()>;
}

/// Apply a mod's patches with per-patch failure isolation.
///
/// Each patch stages and commits independently: one failing patch is discarded and
/// logged, and the remaining patches still apply. Returns the final status per patch,
/// in order.
pub fn apply_all(
    owner: &str,
    monitor: &dyn Monitor,
    registry: &mut InterceptionRegistry,
    patches: &[Box<dyn Patch>],
) -> Vec<(String, PatchStatus)> {
    let mut statuses: Vec<(String, PatchStatus)> = patches
        .iter()
        .map(|patch| (patch.name().to_string(), PatchStatus::Unapplied))
        .collect();
    for (patch, entry) in patches.iter().zip(&mut statuses) {
        entry.1 = PatchStatus::Applying;
        monitor.log(
            LogLevel::Trace,
            &format!("Applying runtime patch '{}'.", patch.name()),
        );

        let mut patcher = Patcher::new(owner, registry);
        entry.1 = match patch.apply(&mut patcher, monitor) {
            Ok(()) => {
                patcher.commit();
                PatchStatus::Applied
            }
            Err(err) => {
                patcher.discard();
                monitor.log(
                    LogLevel::Warn,
                    &format!(
                        "Couldn't apply runtime patch '{}'; some mod features may not work correctly.",
                        patch.name()
                    ),
                );
                monitor.log(
                    LogLevel::Trace,
                    &format!("   Technical details: {}", error_summary(&err)),
                );
                PatchStatus::Failed
            }
        };
    }
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::member::MethodSig;
    use crate::monitor::BufferMonitor;

    fn host() -> HostMetadata {
        let mut host = HostMetadata::new();
        host.add_namespace("Game");
        host.add_method(&MethodSig::new(
            "Game.Clock",
            "Tick",
            "System.Void",
            vec![],
        ));
        host.add_method(&MethodSig::new(
            "Game.Player",
            "TakeDamage",
            "System.Void",
            vec!["System.Int32".into()],
        ));
        host
    }

    #[test]
    fn missing_target_is_rejected_at_patch_time() {
        let registry = InterceptionRegistry::new(&host());
        let result = registry.handle("System.Void Game.Clock::Advance()");
        assert!(matches!(result, Err(Error::MissingTarget(_))));
        assert!(registry.handle("System.Void Game.Clock::Tick()").is_ok());
    }

    #[test]
    fn prefix_can_skip_original_but_postfix_still_runs() {
        let mut registry = InterceptionRegistry::new(&host());
        let sig = "System.Void Game.Clock::Tick()";

        let mut patcher = Patcher::new("test.mod", &mut registry);
        let target = patcher.target(sig).unwrap();
        patcher.hook_prefix(
            &target,
            "SkipTick",
            Box::new(|ctx| {
                ctx.note("prefix ran");
                false
            }),
        );
        patcher.hook_postfix(&target, "AfterTick", Box::new(|ctx| ctx.note("postfix ran")));
        patcher.commit();

        let mut ctx = InterceptContext::new();
        registry
            .invoke(sig, &mut ctx, |ctx| {
                ctx.note("original ran");
                Ok(())
            })
            .unwrap();

        assert_eq!(ctx.notes(), ["prefix ran", "postfix ran"]);
    }

    #[test]
    fn finalizer_observes_original_error_and_postfix_is_skipped() {
        let mut registry = InterceptionRegistry::new(&host());
        let sig = "System.Void Game.Player::TakeDamage(System.Int32)";

        let mut patcher = Patcher::new("test.mod", &mut registry);
        let target = patcher.target(sig).unwrap();
        patcher.hook_postfix(&target, "AfterDamage", Box::new(|ctx| ctx.note("postfix ran")));
        patcher.hook_finalizer(
            &target,
            "AlwaysRuns",
            Box::new(|ctx, err| {
                ctx.note(format!("finalizer saw error: {}", err.is_some()));
            }),
        );
        patcher.commit();

        let mut ctx = InterceptContext::new();
        let result = registry.invoke(sig, &mut ctx, |_| Err(Error::Error("boom".into())));

        assert!(result.is_err());
        assert_eq!(ctx.notes(), ["finalizer saw error: true"]);
    }

    #[test]
    fn uncommitted_hooks_never_reach_the_registry() {
        let mut registry = InterceptionRegistry::new(&host());
        let sig = "System.Void Game.Clock::Tick()";

        let mut patcher = Patcher::new("test.mod", &mut registry);
        let target = patcher.target(sig).unwrap();
        patcher.hook_prefix(&target, "Abandoned", Box::new(|_| false));
        patcher.discard();

        assert!(registry.snapshot().is_empty());

        let mut ctx = InterceptContext::new();
        registry
            .invoke(sig, &mut ctx, |ctx| {
                ctx.note("original ran");
                Ok(())
            })
            .unwrap();
        assert_eq!(ctx.notes(), ["original ran"]);
    }

    #[test]
    fn snapshot_sorts_by_method_then_role() {
        let mut registry = InterceptionRegistry::new(&host());
        let tick = "System.Void Game.Clock::Tick()";
        let damage = "System.Void Game.Player::TakeDamage(System.Int32)";

        let mut patcher = Patcher::new("test.mod", &mut registry);
        let tick_handle = patcher.target(tick).unwrap();
        let damage_handle = patcher.target(damage).unwrap();
        patcher.hook_postfix(&damage_handle, "B", Box::new(|_| {}));
        patcher.hook_prefix(&damage_handle, "A", Box::new(|_| true));
        patcher.hook_finalizer(&tick_handle, "C", Box::new(|_, _| {}));
        patcher.commit();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].method, tick);
        assert_eq!(snapshot[1].method, damage);
        let roles: Vec<PatchRole> = snapshot[1].hooks.iter().map(|h| h.role).collect();
        assert_eq!(roles, [PatchRole::Prefix, PatchRole::Postfix]);
    }

    #[test]
    fn snapshot_ignores_return_types_when_sorting() {
        let mut host = HostMetadata::new();
        host.add_namespace("Game");
        host.add_method(&MethodSig::new("Game.Clock", "Alpha", "System.Void", vec![]));
        host.add_method(&MethodSig::new("Game.Clock", "Zulu", "System.Boolean", vec![]));
        let mut registry = InterceptionRegistry::new(&host);

        let mut patcher = Patcher::new("test.mod", &mut registry);
        // "System.Boolean ..." sorts before "System.Void ...", but the method
        // names say Alpha comes first
        let zulu = patcher.target("System.Boolean Game.Clock::Zulu()").unwrap();
        let alpha = patcher.target("System.Void Game.Clock::Alpha()").unwrap();
        patcher.hook_postfix(&zulu, "AfterZulu", Box::new(|_| {}));
        patcher.hook_postfix(&alpha, "AfterAlpha", Box::new(|_| {}));
        patcher.commit();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].method, "System.Void Game.Clock::Alpha()");
        assert_eq!(snapshot[1].method, "System.Boolean Game.Clock::Zulu()");
    }

    #[test]
    fn transpiler_rewrites_target_body() {
        use crate::metadata::instruction::Instruction;

        let mut registry = InterceptionRegistry::new(&host());
        let sig = "System.Void Game.Clock::Tick()";

        let mut patcher = Patcher::new("test.mod", &mut registry);
        let target = patcher.target(sig).unwrap();
        patcher.hook_transpiler(
            &target,
            "InjectNop",
            Box::new(|body| {
                body.insert_before(0, vec![Instruction::nop()]);
            }),
        );
        patcher.commit();

        let mut body = MethodBody::new(vec![Instruction::ret()]);
        registry.transpile(sig, &mut body);
        assert_eq!(body.instructions[0], Instruction::nop());
        assert_eq!(body.instructions.len(), 2);
    }

    struct FailingPatch;
    impl Patch for FailingPatch {
        fn name(&self) -> &str {
            "FailingPatch"
        }
        fn apply(&self, patcher: &mut Patcher<'_>, _monitor: &dyn Monitor) -> Result<()> {
            let target = patcher.target("System.Void Game.Clock::Tick()")?;
            patcher.hook_prefix(&target, "Partial", Box::new(|_| true));
            patcher.target("System.Void Game.Clock::Gone()")?;
            Ok(())
        }
    }

    struct TickPatch;
    impl Patch for TickPatch {
        fn name(&self) -> &str {
            "TickPatch"
        }
        fn apply(&self, patcher: &mut Patcher<'_>, _monitor: &dyn Monitor) -> Result<()> {
            let target = patcher.target("System.Void Game.Clock::Tick()")?;
            patcher.hook_postfix(&target, "AfterTick", Box::new(|_| {}));
            Ok(())
        }
    }

    #[test]
    fn failed_patch_is_isolated_and_leaves_no_partial_hooks() {
        let host = host();
        let mut registry = InterceptionRegistry::new(&host);
        let monitor = BufferMonitor::new();
        let patches: Vec<Box<dyn Patch>> =
            vec![Box::new(TickPatch), Box::new(FailingPatch), Box::new(TickPatch)];

        let statuses = apply_all("test.mod", &monitor, &mut registry, &patches);

        assert_eq!(
            statuses,
            vec![
                ("TickPatch".to_string(), PatchStatus::Applied),
                ("FailingPatch".to_string(), PatchStatus::Failed),
                ("TickPatch".to_string(), PatchStatus::Applied),
            ]
        );
        assert!(monitor.contains("Couldn't apply runtime patch 'FailingPatch'"));

        // the failing patch's partial prefix was discarded
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].hooks.iter().all(|h| h.name != "Partial"));
        assert_eq!(snapshot[0].hooks.len(), 2);
    }

    #[test]
    fn every_patch_is_traced_before_it_applies() {
        let host = host();
        let mut registry = InterceptionRegistry::new(&host);
        let monitor = BufferMonitor::new();
        let patches: Vec<Box<dyn Patch>> = vec![Box::new(TickPatch), Box::new(FailingPatch)];

        let statuses = apply_all("test.mod", &monitor, &mut registry, &patches);

        // both patches left the Unapplied state, whether they succeeded or not
        assert!(monitor.contains("Applying runtime patch 'TickPatch'."));
        assert!(monitor.contains("Applying runtime patch 'FailingPatch'."));
        assert_eq!(
            statuses,
            vec![
                ("TickPatch".to_string(), PatchStatus::Applied),
                ("FailingPatch".to_string(), PatchStatus::Failed),
            ]
        );
    }
}
