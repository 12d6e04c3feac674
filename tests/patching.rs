//! End-to-end tests for method interception and deprecation tracking.

use modscope::monitor::{BufferMonitor, LogLevel};
use modscope::prelude::*;

const TICK: &str = "System.Void Game.Clock::Tick()";
const DRAW: &str = "System.Void Game.Renderer::Draw()";

fn host() -> HostMetadata {
    let mut host = HostMetadata::new();
    host.add_namespace("Game");
    host.add_method(&MethodSig::new("Game.Clock", "Tick", "System.Void", vec![]));
    host.add_method(&MethodSig::new(
        "Game.Renderer",
        "Draw",
        "System.Void",
        vec![],
    ));
    host
}

struct TickCounter;
impl Patch for TickCounter {
    fn name(&self) -> &str {
        "TickCounter"
    }
    fn apply(&self, patcher: &mut Patcher<'_>, _monitor: &dyn Monitor) -> modscope::Result<()> {
        let target = patcher.target(TICK)?;
        patcher.hook_postfix(&target, "CountTick", Box::new(|ctx| ctx.note("tick counted")));
        Ok(())
    }
}

/// Targets a method the host no longer has, after staging a valid hook.
struct StaleDrawPatch;
impl Patch for StaleDrawPatch {
    fn name(&self) -> &str {
        "StaleDrawPatch"
    }
    fn apply(&self, patcher: &mut Patcher<'_>, _monitor: &dyn Monitor) -> modscope::Result<()> {
        let draw = patcher.target(DRAW)?;
        patcher.hook_prefix(&draw, "BeforeDraw", Box::new(|_| true));
        patcher.target("System.Void Game.Renderer::DrawLegacyOverlay()")?;
        Ok(())
    }
}

struct DrawSkipper;
impl Patch for DrawSkipper {
    fn name(&self) -> &str {
        "DrawSkipper"
    }
    fn apply(&self, patcher: &mut Patcher<'_>, _monitor: &dyn Monitor) -> modscope::Result<()> {
        let draw = patcher.target(DRAW)?;
        patcher.hook_prefix(
            &draw,
            "SkipDraw",
            Box::new(|ctx| {
                ctx.note("draw skipped");
                false
            }),
        );
        Ok(())
    }
}

#[test]
fn one_failing_patch_does_not_block_the_rest() {
    let host = host();
    let mut registry = InterceptionRegistry::new(&host);
    let monitor = BufferMonitor::new();
    let patches: Vec<Box<dyn Patch>> = vec![
        Box::new(TickCounter),
        Box::new(StaleDrawPatch),
        Box::new(DrawSkipper),
    ];

    let statuses = apply_all("example.mod", &monitor, &mut registry, &patches);

    assert_eq!(statuses[0], ("TickCounter".to_string(), PatchStatus::Applied));
    assert_eq!(
        statuses[1],
        ("StaleDrawPatch".to_string(), PatchStatus::Failed)
    );
    assert_eq!(statuses[2], ("DrawSkipper".to_string(), PatchStatus::Applied));
    assert!(monitor.contains("Couldn't apply runtime patch 'StaleDrawPatch'"));
    assert!(monitor.contains("DrawLegacyOverlay"));

    // the failed patch's staged prefix never reached the registry
    let snapshot = registry.snapshot();
    let draw_hooks = snapshot
        .iter()
        .find(|t| t.method == DRAW)
        .map(|t| t.hooks.clone())
        .unwrap_or_default();
    assert!(draw_hooks.iter().all(|h| h.name != "BeforeDraw"));
    assert_eq!(draw_hooks.len(), 1);

    // the surviving hooks behave: the skipper prevents the original draw
    let mut ctx = InterceptContext::new();
    registry
        .invoke(DRAW, &mut ctx, |ctx| {
            ctx.note("original draw");
            Ok(())
        })
        .unwrap();
    assert_eq!(ctx.notes(), ["draw skipped"]);

    // and the tick postfix runs after the original
    let mut ctx = InterceptContext::new();
    registry
        .invoke(TICK, &mut ctx, |ctx| {
            ctx.note("original tick");
            Ok(())
        })
        .unwrap();
    assert_eq!(ctx.notes(), ["original tick", "tick counted"]);
}

#[test]
fn deprecation_warnings_raised_in_hooks_flush_per_tick() {
    let mut index = ModIndex::new();
    index.add(ModEntry {
        id: "example.mod".into(),
        name: "Example Mod".into(),
        markers: vec!["example_mod".into()],
    });
    let mut manager = DeprecationManager::new(index);

    // the runtime enters the mod's context before invoking its hooks
    {
        let _guard = manager.enter_mod("example.mod");
        for _ in 0..100 {
            manager.warn_with_stack(
                None,
                "the legacy clock API",
                "3.0",
                DeprecationLevel::Info,
                &[],
                true,
                StackTrace::default(),
            );
        }
    }
    assert_eq!(manager.queued(), 1);

    let monitor = BufferMonitor::new();
    manager.print_queued(&monitor);

    let entries = monitor.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, LogLevel::Debug);
    assert!(entries[0].1.contains("Example Mod uses deprecated code"));
    assert!(entries[0].1.contains("the legacy clock API"));

    // next tick: nothing left to flush
    monitor.clear();
    manager.print_queued(&monitor);
    assert!(monitor.entries().is_empty());
}
