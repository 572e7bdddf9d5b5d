//! Integration tests for end-to-end Vexel execution.
//!
//! These tests verify the full pipeline:
//! Assemble → Resolve → Package → (Save → Load) → Execute → Verify

use vexel_compiler::{Assembler, Assembly};
use vexel_foundation::{DataType, Op, Value, VectorSize};
use vexel_function_registry::library;
use vexel_package::{PackageFlags, PackagingMode, SegmentKind};
use vexel_tests::{numeric, TestHarness};
use vexel_vm::{
    BatchConfig, ExecuteError, ExecutionOptions, FatalError, Halt, RecoverableError, Status,
};

/// `sum = n + (n - 1) + ... + 1`, counting `n` down to zero.
fn countdown(asm: &mut Assembler) {
    asm.anchor("top")
        .jz("done")
        .var(0)
        .end()
        .assign(1)
        .var(1)
        .op(Op::Add)
        .var(0)
        .end()
        .assign(0)
        .var(0)
        .op(Op::Sub)
        .op(Op::Value1)
        .end()
        .jump_back("top")
        .anchor("done")
        .op(Op::Return);
}

/// `out = in * 2`
fn doubler(asm: &mut Assembler) {
    asm.assign(1).var(0).op(Op::Mul).op(Op::Value2).end();
}

#[test]
fn test_loop_runs_to_return() {
    let variables = vec![numeric("n").with_default(Value::numeric(5.0)), numeric("sum")];
    let mut harness = TestHarness::build(variables, PackagingMode::Combined, countdown);

    let report = harness.run().unwrap();

    assert_eq!(report.halt, Halt::Returned);
    assert_eq!(harness.get_f32("sum"), Some(15.0));
    assert_eq!(harness.get_f32("n"), Some(0.0));
}

#[test]
fn test_package_survives_save_and_load() {
    let variables = vec![numeric("n").with_default(Value::numeric(4.0)), numeric("sum")];
    let harness = TestHarness::build(variables, PackagingMode::Combined, countdown);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("countdown.vxp");

    vexel_package::save(&path, harness.package()).unwrap();
    let loaded = vexel_package::load(&path).unwrap();
    assert_eq!(loaded.header(), harness.package().header());
    assert_eq!(
        loaded.segment(SegmentKind::Code).unwrap(),
        harness.compiled().code.as_slice()
    );

    let symbols = harness.compiled().symbols.clone();
    let compiled = vexel_compiler::Compiled {
        package: loaded,
        symbols,
        code: harness.compiled().code.clone(),
        warnings: Vec::new(),
    };
    let mut reloaded = TestHarness::from_compiled(compiled);
    reloaded.run().unwrap();
    assert_eq!(reloaded.get_f32("sum"), Some(10.0));
    // the saved file still holds the defaults
    assert_eq!(harness.get_f32("sum"), Some(0.0));
}

#[test]
fn test_assembly_json_round_trip_compiles_identically() {
    let mut asm = Assembler::new("main");
    countdown(&mut asm);
    let assembly = Assembly::new()
        .variable(numeric("n").with_default(Value::numeric(3.0)))
        .variable(numeric("sum"))
        .segment(asm.finish().unwrap());

    let json = assembly.to_json().unwrap();
    let parsed = Assembly::from_json(&json).unwrap();
    assert_eq!(parsed, assembly);

    let original = TestHarness::from_assembly(&assembly, PackagingMode::Combined);
    let reparsed = TestHarness::from_assembly(&parsed, PackagingMode::Combined);
    assert_eq!(original.compiled().code, reparsed.compiled().code);
}

#[test]
fn test_batched_modes_agree_with_single_runs() {
    const LANES: usize = 100;
    for mode in [PackagingMode::Batched, PackagingMode::Segmented] {
        let mut harness = TestHarness::build(vec![numeric("in"), numeric("out")], mode, doubler);
        let mut lanes = harness.lanes(LANES, |seed| {
            let lane = seed.lane();
            seed.set("in", Value::numeric(lane as f32 * 0.5));
        });

        let report = harness.run_batch(&mut lanes, BatchConfig::auto(LANES)).unwrap();
        assert_eq!(report.lanes, LANES);
        assert!(report.is_clean());

        for lane in [0, 1, 42, LANES - 1] {
            let mut single = TestHarness::build(
                vec![numeric("in"), numeric("out")],
                PackagingMode::Combined,
                doubler,
            );
            single.set("in", Value::numeric(lane as f32 * 0.5));
            single.run().unwrap();
            assert_eq!(
                harness.lane_value(&lanes, lane, "out"),
                single.get("out"),
                "{mode} lane {lane}"
            );
        }
    }
}

#[test]
fn test_external_calls_in_every_lane() {
    let mut harness = TestHarness::build(
        vec![numeric("x"), numeric("h")],
        PackagingMode::Batched,
        |asm| {
            asm.assign(1)
                .call_external(library::ids::HYPOT.0, 2)
                .var(0)
                .op(Op::Value4)
                .end();
        },
    );
    assert!(harness.package().flags().contains(PackageFlags::EXTERNAL_CALLS));

    let mut lanes = harness.lanes(16, |seed| {
        let lane = seed.lane();
        seed.set("x", Value::numeric(lane as f32));
    });
    harness.run_batch(&mut lanes, BatchConfig::new(4)).unwrap();

    for lane in 0..16 {
        let expected = (lane as f32).hypot(4.0);
        let actual = harness.lane_value(&lanes, lane, "h").as_f32().unwrap();
        assert!((actual - expected).abs() < 1e-4, "lane {lane}: {actual} != {expected}");
    }
}

#[test]
fn test_divergent_lanes_fail_the_batch() {
    let mut harness = TestHarness::build(
        vec![numeric("in"), numeric("out")],
        PackagingMode::Segmented,
        |asm| {
            asm.jnz("skip")
                .var(0)
                .end()
                .assign(1)
                .op(Op::Value3)
                .end()
                .anchor("skip")
                .op(Op::Nop);
        },
    );
    let mut lanes = harness.lanes(8, |seed| {
        if seed.lane() >= 6 {
            seed.set("in", Value::numeric(1.0));
        }
    });

    let err = harness.run_batch(&mut lanes, BatchConfig::sequential()).unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::Fatal(FatalError::LaneDivergence { lane: 6, .. })
    ));
    assert_eq!(Status::from(&err), Status::Failed);
}

#[test]
fn test_uniform_branch_in_batch() {
    let mut harness = TestHarness::build(
        vec![numeric("in"), numeric("out")],
        PackagingMode::Batched,
        |asm| {
            asm.jnz("skip")
                .var(0)
                .end()
                .assign(1)
                .op(Op::Value3)
                .end()
                .anchor("skip")
                .op(Op::Nop);
        },
    );
    let mut lanes = harness.lanes(8, |seed| seed.set("in", Value::numeric(1.0)));
    let report = harness.run_batch(&mut lanes, BatchConfig::default()).unwrap();
    assert_eq!(report.halt, Halt::Completed);
    assert!((0..8).all(|lane| harness.lane_value(&lanes, lane, "out") == Value::numeric(0.0)));
}

#[test]
fn test_statement_limit_stops_runaway_loop() {
    let mut harness = TestHarness::build(vec![numeric("a")], PackagingMode::Combined, |asm| {
        asm.anchor("top")
            .assign(0)
            .var(0)
            .op(Op::Add)
            .op(Op::Value1)
            .end()
            .jump_back("top");
    })
    .with_options(ExecutionOptions::default().quiet().with_statement_limit(9));

    let err = harness.run().unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::Fatal(FatalError::StatementLimit { limit: 9 })
    ));
    // five assignments and four jumps ran before the limit
    assert_eq!(harness.get_f32("a"), Some(5.0));
}

#[test]
fn test_unsupported_operation_is_recoverable() {
    let variables = vec![
        numeric("a"),
        vexel_compiler::VariableDecl::new("mask", DataType::Bool32, VectorSize::One),
        numeric("b"),
    ];
    let mut harness = TestHarness::build(variables, PackagingMode::Combined, |asm| {
        asm.assign(0).op(Op::Sqrt).var(1).end();
        asm.assign(2).op(Op::Value3).end();
    });

    let report = harness.run().unwrap();

    assert_eq!(report.halt, Halt::Completed);
    assert_eq!(report.recoverable_count(), 1);
    assert!(matches!(
        report.recoverable[0].error,
        RecoverableError::Unsupported { op: Op::Sqrt, .. }
    ));
    assert!(harness.get_f32("a").unwrap().is_nan());
    // execution continued past the faulting statement
    assert_eq!(harness.get_f32("b"), Some(3.0));
}

#[test]
fn test_listing_names_external_functions() {
    let harness = TestHarness::build(vec![numeric("h")], PackagingMode::Combined, |asm| {
        asm.assign(0)
            .call_external(library::ids::HYPOT.0, 2)
            .op(Op::Value3)
            .op(Op::Value4)
            .end();
    });
    let code = harness.package().segment(SegmentKind::Code).unwrap();
    let text = vexel_vm::listing(code, Some(harness.registry())).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("0000  assign"));
    assert!(text.contains("; hypot"));
    assert_eq!(lines.len(), vexel_vm::disassemble(code).unwrap().len());
}
