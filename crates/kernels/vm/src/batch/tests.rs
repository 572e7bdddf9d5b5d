use super::*;
use vexel_compiler::{Assembler, Compiled, VariableDecl};
use vexel_foundation::{DataType, Op, Shape, Value, VectorSize};
use vexel_package::AllocatorTag;

use crate::error::RecoverableError;
use crate::testing::{compile, numeric, read};

/// `out = in * 2`
fn doubler(mode: PackagingMode) -> Compiled {
    compile(vec![numeric("in"), numeric("out")], mode, |asm| {
        asm.assign(1).var(0).op(Op::Mul).op(Op::Value2).end();
    })
}

/// `if in { out = 1 }`
fn branchy(mode: PackagingMode) -> Compiled {
    compile(vec![numeric("in"), numeric("out")], mode, |asm: &mut Assembler| {
        asm.jz("skip")
            .var(0)
            .end()
            .assign(1)
            .op(Op::Value1)
            .end()
            .anchor("skip")
            .op(Op::Nop);
    })
}

fn offset(compiled: &Compiled, name: &str) -> usize {
    compiled.symbols.require(name).unwrap().mapping.offset
}

fn seed(compiled: &Compiled, lanes: &mut LaneBuffer, values: impl Fn(usize) -> f32) {
    let input = offset(compiled, "in");
    for lane in 0..lanes.lane_count() {
        lanes
            .write_data(lane, input, &Value::numeric(values(lane)))
            .unwrap();
    }
}

fn output(compiled: &Compiled, lanes: &LaneBuffer, lane: usize) -> Value {
    lanes
        .read_data(lane, offset(compiled, "out"), Shape::scalar(DataType::Numeric))
        .unwrap()
}

fn tiny_chunks() -> BatchConfig {
    BatchConfig {
        chunk_size: 2,
        min_chunk: 1,
        max_chunk: 1024,
        parallel: true,
    }
}

#[test]
fn test_lanes_are_isolated() {
    for mode in [PackagingMode::Batched, PackagingMode::Segmented, PackagingMode::Combined] {
        let mut compiled = doubler(mode);
        let mut lanes = compiled.package.replicate_for_batch(8, AllocatorTag::Heap).unwrap();
        seed(&compiled, &mut lanes, |lane| lane as f32);

        let report = BatchInterpreter::new(BatchConfig::sequential())
            .run(&mut compiled.package, &mut lanes, CallContext::default())
            .unwrap();
        assert_eq!(report.lanes, 8);
        assert_eq!(report.statements, 1);
        for lane in 0..8 {
            assert_eq!(output(&compiled, &lanes, lane), Value::numeric(2.0 * lane as f32));
        }
        // the package's own data is not a lane
        assert_eq!(read(&compiled, "out"), Value::numeric(0.0));
    }
}

#[test]
fn test_parallel_chunks_match_sequential() {
    let mut compiled = doubler(PackagingMode::Batched);
    let mut lanes = compiled.package.replicate_for_batch(37, AllocatorTag::Heap).unwrap();
    seed(&compiled, &mut lanes, |lane| lane as f32 - 10.0);
    let status = execute_batch(
        &mut compiled.package,
        &mut lanes,
        None,
        CallContext::default(),
        tiny_chunks(),
    );
    assert_eq!(status, Status::Success);
    for lane in 0..37 {
        assert_eq!(
            output(&compiled, &lanes, lane),
            Value::numeric(2.0 * (lane as f32 - 10.0))
        );
    }
}

#[test]
fn test_uniform_branch_is_allowed() {
    let mut compiled = branchy(PackagingMode::Batched);
    let mut lanes = compiled.package.replicate_for_batch(4, AllocatorTag::Heap).unwrap();
    seed(&compiled, &mut lanes, |_| 0.0);
    let report = BatchInterpreter::new(BatchConfig::sequential())
        .run(&mut compiled.package, &mut lanes, CallContext::default())
        .unwrap();
    assert_eq!(report.halt, Halt::Completed);
    for lane in 0..4 {
        assert_eq!(output(&compiled, &lanes, lane), Value::numeric(0.0));
    }
}

#[test]
fn test_divergent_branch_is_fatal() {
    let mut compiled = branchy(PackagingMode::Batched);
    let mut lanes = compiled.package.replicate_for_batch(3, AllocatorTag::Heap).unwrap();
    seed(&compiled, &mut lanes, |lane| if lane == 2 { 1.0 } else { 0.0 });
    let mut interpreter = BatchInterpreter::new(BatchConfig::sequential());
    let err = interpreter
        .run(&mut compiled.package, &mut lanes, CallContext::default())
        .unwrap_err();
    match err {
        ExecuteError::Fatal(FatalError::LaneDivergence { position, lane, .. }) => {
            assert_eq!(position, 0);
            assert_eq!(lane, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(interpreter.state(), ExecutionState::Halted(Halt::Failed));
}

#[test]
fn test_first_divergent_lane_wins_across_chunks() {
    let mut compiled = branchy(PackagingMode::Segmented);
    let mut lanes = compiled.package.replicate_for_batch(12, AllocatorTag::Heap).unwrap();
    seed(&compiled, &mut lanes, |lane| if lane == 5 || lane == 9 { 1.0 } else { 0.0 });
    let err = BatchInterpreter::new(tiny_chunks())
        .run(&mut compiled.package, &mut lanes, CallContext::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::Fatal(FatalError::LaneDivergence { lane: 5, .. })
    ));
}

#[test]
fn test_per_lane_metadata_tracks_stack() {
    let variables = vec![numeric("in"), numeric("out")];
    let mut compiled = compile(variables, PackagingMode::Segmented, |asm| {
        asm.push()
            .var(0)
            .end()
            .assign(1)
            .op(Op::Pop)
            .op(Op::Add)
            .op(Op::Value1)
            .end();
    });
    let mut lanes = compiled.package.replicate_for_batch(3, AllocatorTag::Heap).unwrap();
    seed(&compiled, &mut lanes, |lane| lane as f32 * 10.0);
    let report = BatchInterpreter::new(BatchConfig::sequential())
        .run(&mut compiled.package, &mut lanes, CallContext::default())
        .unwrap();
    assert_eq!(report.statements, 2);
    for lane in 0..3 {
        assert_eq!(output(&compiled, &lanes, lane), Value::numeric(lane as f32 * 10.0 + 1.0));
    }
}

#[test]
fn test_recoverable_events_in_lane_order() {
    let variables = vec![
        numeric("in"),
        numeric("out"),
        VariableDecl::new("mask", DataType::Bool32, VectorSize::One),
    ];
    let mut compiled = compile(variables, PackagingMode::Batched, |asm| {
        asm.assign(1).op(Op::Sqrt).var(2).end();
    });
    let mut lanes = compiled.package.replicate_for_batch(20, AllocatorTag::Heap).unwrap();
    let report = BatchInterpreter::new(tiny_chunks())
        .with_options(ExecutionOptions::default().quiet())
        .run(&mut compiled.package, &mut lanes, CallContext::default())
        .unwrap();
    let order: Vec<usize> = report.recoverable.iter().map(|event| event.lane).collect();
    assert_eq!(order, (0..20).collect::<Vec<_>>());
    assert!(report
        .recoverable
        .iter()
        .all(|event| matches!(event.error, RecoverableError::Unsupported { op: Op::Sqrt, .. })));
}

#[test]
fn test_unallocated_package_status() {
    let mut compiled = doubler(PackagingMode::Batched);
    let mut lanes = compiled.package.replicate_for_batch(2, AllocatorTag::Heap).unwrap();
    compiled.package.free();
    let status = execute_batch(
        &mut compiled.package,
        &mut lanes,
        None,
        CallContext::default(),
        BatchConfig::default(),
    );
    assert_eq!(status, Status::NotAllocated);
}

#[test]
fn test_lanes_from_another_layout_rejected() {
    let mut compiled = doubler(PackagingMode::Batched);
    let foreign = doubler(PackagingMode::Segmented);
    let mut lanes = foreign.package.replicate_for_batch(2, AllocatorTag::Heap).unwrap();
    let err = BatchInterpreter::new(BatchConfig::sequential())
        .run(&mut compiled.package, &mut lanes, CallContext::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::Package(PackageError::LaneSplitMismatch { .. })
    ));

    let wider = compile(
        vec![numeric("in"), numeric("out"), numeric("spare")],
        PackagingMode::Batched,
        |asm| {
            asm.assign(1).var(0).end();
        },
    );
    let mut lanes = wider.package.replicate_for_batch(2, AllocatorTag::Heap).unwrap();
    let status = execute_batch(
        &mut compiled.package,
        &mut lanes,
        None,
        CallContext::default(),
        BatchConfig::default(),
    );
    assert_eq!(status, Status::Failed);
}
