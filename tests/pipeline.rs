//! End-to-end tests for the load pipeline: parse, rewrite, serialize, and policy decisions.

use std::fs;
use std::path::PathBuf;

use modscope::monitor::BufferMonitor;
use modscope::prelude::*;

/// A unique temp path for one test's assembly file.
fn temp_assembly(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("modscope-it-{}-{name}.dll", std::process::id()));
    path
}

fn host() -> HostMetadata {
    let mut host = HostMetadata::new();
    host.add_namespace("Game");
    host.add_assembly("GameEngine");
    host.add_type("Game.Inventory");
    host.add_method(&MethodSig::new(
        "Game.Inventory",
        "Add",
        "System.Void",
        vec![
            "Game.Item".into(),
            "System.Int32".into(),
            "System.Boolean".into(),
        ],
    ));
    host
}

fn facades() -> FacadeTable {
    let mut table = FacadeTable::new();
    table.add_method(MethodFacade {
        old: MethodSig::new(
            "Game.Inventory",
            "Add",
            "System.Void",
            vec!["Game.Item".into(), "System.Int32".into()],
        ),
        replacement: MethodSig::new(
            "Game.Inventory",
            "Add",
            "System.Void",
            vec![
                "Game.Item".into(),
                "System.Int32".into(),
                "System.Boolean".into(),
            ],
        ),
        prelude: vec![Instruction::ldc_i4(0)],
    });
    table
}

/// A mod module calling the removed two-parameter `Add` overload.
fn old_mod(name: &str) -> Module {
    let mut module = Module::new(name);
    module.assembly_refs.push("GameEngine".into());
    let call = module.ensure_method_ref(&MethodSig::new(
        "Game.Inventory",
        "Add",
        "System.Void",
        vec!["Game.Item".into(), "System.Int32".into()],
    ));
    module.types.push(TypeDef {
        full_name: format!("{name}.ModEntry"),
        methods: vec![MethodDef {
            name: "Entry".into(),
            body: MethodBody::new(vec![
                Instruction::ldarg(0),
                Instruction::ldc_i4(12),
                Instruction::call(call),
                Instruction::ret(),
            ]),
        }],
    });
    module
}

fn write_assembly(path: &PathBuf, module: &Module) {
    fs::write(path, write_module(module).unwrap()).unwrap();
}

#[test]
fn facade_rewrite_end_to_end() {
    let host = host();
    let facades = facades();
    let monitor = BufferMonitor::new();
    let path = temp_assembly("facade-rewrite");
    write_assembly(&path, &old_mod("OldMod"));

    let mut loader = AssemblyLoader::new(&host, &facades, RewritePolicy::default(), &monitor);
    let outcome = loader.load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert!(outcome.rewritten);
    assert!(monitor.contains("Rewrote OldMod.dll"));

    // the serialized bytes reflect the rewrite
    let reloaded = read_module(&outcome.bytes).unwrap();
    assert_eq!(reloaded.method_sig(0).unwrap().params.len(), 3);
    let body = &reloaded.types[0].methods[0].body;
    assert_eq!(body.instructions.len(), 5);
    assert_eq!(body.instructions[2], Instruction::ldc_i4(0));
}

#[test]
fn rewriting_a_rewritten_assembly_changes_nothing() {
    let host = host();
    let facades = facades();
    let monitor = BufferMonitor::new();
    let path = temp_assembly("idempotence");
    write_assembly(&path, &old_mod("StableMod"));

    let mut loader = AssemblyLoader::new(&host, &facades, RewritePolicy::default(), &monitor);
    let first = loader.load(&path).unwrap();
    assert!(first.rewritten);

    // load the rewritten output again
    fs::write(&path, &first.bytes).unwrap();
    let second = loader.load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert!(!second.rewritten);
    assert_eq!(second.bytes, first.bytes);
}

#[test]
fn incompatible_assembly_still_loads_by_default() {
    let host = host();
    let facades = FacadeTable::new(); // no facade for the removed overload
    let monitor = BufferMonitor::new();
    let path = temp_assembly("incompatible-loads");
    write_assembly(&path, &old_mod("BrokenMod"));

    let mut loader = AssemblyLoader::new(&host, &facades, RewritePolicy::default(), &monitor);
    let outcome = loader.load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert!(!outcome.rewritten);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Incompatible));
    assert!(monitor.contains("Broken code in BrokenMod.dll"));
}

#[test]
fn reloading_an_assembly_logs_its_problems_again() {
    let host = host();
    let facades = FacadeTable::new();
    let monitor = BufferMonitor::new();
    let path = temp_assembly("reload-logs-again");
    write_assembly(&path, &old_mod("BrokenMod"));

    let mut loader = AssemblyLoader::new(&host, &facades, RewritePolicy::default(), &monitor);
    loader.load(&path).unwrap();
    loader.load(&path).unwrap();
    fs::remove_file(&path).ok();

    let summaries = monitor
        .entries()
        .iter()
        .filter(|(_, m)| m.contains("Broken code in BrokenMod.dll"))
        .count();
    assert_eq!(summaries, 2);
}

#[test]
fn strict_policy_refuses_incompatible_assembly() {
    let host = host();
    let facades = FacadeTable::new();
    let monitor = BufferMonitor::new();
    let path = temp_assembly("strict-policy");
    write_assembly(&path, &old_mod("RefusedMod"));

    let policy = RewritePolicy {
        assume_compatible: false,
        ..RewritePolicy::default()
    };
    let mut loader = AssemblyLoader::new(&host, &facades, policy, &monitor);
    let result = loader.load(&path);
    fs::remove_file(&path).ok();

    assert!(matches!(result, Err(Error::AssemblyLoadFailed { .. })));
}

#[test]
fn wrong_architecture_never_loads() {
    let host = host().with_64bit(false);
    let facades = facades();
    let monitor = BufferMonitor::new();
    let path = temp_assembly("wrong-arch");

    let mut module = old_mod("X64Mod");
    module.flags = ModuleFlags::REQUIRES_64BIT;
    write_assembly(&path, &module);

    let mut loader = AssemblyLoader::new(&host, &facades, RewritePolicy::default(), &monitor);
    let result = loader.load(&path);
    fs::remove_file(&path).ok();

    assert!(matches!(result, Err(Error::AssemblyLoadFailed { .. })));
    assert!(monitor.contains("Failed to load X64Mod.dll"));
}

#[test]
fn corrupt_image_fails_with_clean_error() {
    let host = host();
    let facades = facades();
    let monitor = BufferMonitor::new();
    let path = temp_assembly("corrupt-image");
    fs::write(&path, b"this is not a module image").unwrap();

    let mut loader = AssemblyLoader::new(&host, &facades, RewritePolicy::default(), &monitor);
    let result = loader.load(&path);
    fs::remove_file(&path).ok();

    assert!(matches!(result, Err(Error::AssemblyLoadFailed { .. })));
    assert!(monitor.contains("the module image is invalid"));
}

#[test]
fn symbols_give_diagnostics_source_lines() {
    let host = host();
    let facades = FacadeTable::new();
    let monitor = BufferMonitor::new();
    let path = temp_assembly("with-symbols");

    let mut module = old_mod("SourcedMod");
    module.debug_header = Some(DebugHeader { format: 1, age: 1 });
    write_assembly(&path, &module);

    // legacy-format symbols: token 0x06000001, one point at IL 0 -> line 27, column 9
    let mut sym = Vec::new();
    sym.extend_from_slice(b"LSYM");
    sym.extend_from_slice(&1u32.to_le_bytes());
    sym.extend_from_slice(&0x0600_0001u32.to_le_bytes());
    sym.extend_from_slice(&1u32.to_le_bytes());
    sym.extend_from_slice(&0u32.to_le_bytes());
    sym.extend_from_slice(&27u32.to_le_bytes());
    sym.extend_from_slice(&9u16.to_le_bytes());
    let sym_path = path.with_extension("sym");
    fs::write(&sym_path, sym).unwrap();

    let mut loader = AssemblyLoader::new(&host, &facades, RewritePolicy::default(), &monitor);
    let outcome = loader.load(&path).unwrap();
    fs::remove_file(&path).ok();
    fs::remove_file(&sym_path).ok();

    let broken = outcome
        .diagnostics
        .iter()
        .find(|d| d.severity == Severity::Incompatible)
        .expect("missing member should be flagged");
    assert!(
        broken.location.contains("(line 27:9)"),
        "location was {}",
        broken.location
    );
    assert!(broken.location.contains("SourcedMod.ModEntry.Entry"));
}
