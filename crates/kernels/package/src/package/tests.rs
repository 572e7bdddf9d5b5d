use super::*;
use crate::file::{read_package, write_package};
use vexel_foundation::{DataType, VectorSize};

fn sizes() -> Sizes {
    Sizes {
        code: 6,
        metadata: 6,
        data: 16,
        stack: 8,
    }
}

fn combined() -> Package {
    let layout = Layout::encode_sizes(PackagingMode::Combined, sizes()).unwrap();
    let mut package = Package::allocate(layout, PackageFlags::empty(), AllocatorTag::Heap).unwrap();
    package
        .segment_mut(SegmentKind::Code)
        .unwrap()
        .copy_from_slice(&[1, 2, 3, 4, 5, 6]);
    package.write_data(0, &Value::numeric(1.5)).unwrap();
    package.write_data(4, &Value::id_vec(&[7, 8, 9]).unwrap()).unwrap();
    package
}

fn with_mode(mode: PackagingMode) -> Package {
    let layout = Layout::encode_sizes(mode, sizes()).unwrap();
    let mut package =
        Package::allocate(layout, PackageFlags::empty(), AllocatorTag::Aligned).unwrap();
    package.write_data(0, &Value::numeric(2.0)).unwrap();
    package
        .set_metadata(0, Shape::scalar(DataType::Numeric))
        .unwrap();
    package
}

#[test]
fn test_segments_follow_layout() {
    let package = combined();
    assert_eq!(package.segment(SegmentKind::Code).unwrap(), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(package.segment(SegmentKind::Metadata).unwrap().len(), 6);
    assert_eq!(package.segment(SegmentKind::Data).unwrap().len(), 16);
    assert_eq!(package.segment(SegmentKind::Stack).unwrap().len(), 8);
    assert_eq!(
        package.read_data(0, Shape::scalar(DataType::Numeric)).unwrap(),
        Value::numeric(1.5)
    );
}

#[test]
fn test_split_mut_matches_segments() {
    for mode in [PackagingMode::Combined, PackagingMode::Batched, PackagingMode::Segmented] {
        let mut package = with_mode(mode);
        let segments = package.split_mut().unwrap();
        assert_eq!(segments.code.len(), 6);
        assert_eq!(segments.metadata.len(), 6);
        assert_eq!(segments.memory.len(), 24);
        assert_eq!(&segments.memory[..4], &2.0f32.to_le_bytes());
        assert_eq!(segments.metadata[0], 0x10);
    }
}

#[test]
fn test_unallocated_and_uninitialized_errors() {
    let mut package = Package::default();
    assert!(matches!(package.segment(SegmentKind::Code), Err(PackageError::NotInitialized)));

    let mut package_b = with_mode(PackagingMode::Batched);
    package_b.free();
    assert!(matches!(package_b.segment(SegmentKind::Data), Err(PackageError::NotAllocated)));
    package_b.free();
    package.free();
    assert!(!package_b.is_allocated());
}

#[test]
fn test_intermediate_segments_fail() {
    let layout = Layout::intermediate(4, 8, 4, 2).unwrap();
    let package = Package::allocate(layout, PackageFlags::empty(), AllocatorTag::Heap).unwrap();
    assert!(matches!(
        package.segment(SegmentKind::Data),
        Err(PackageError::NotLinked(PackagingMode::Intermediate))
    ));
}

#[test]
fn test_clone_with_is_independent() {
    let package = combined();
    let mut copy = package.clone_with(AllocatorTag::Temporary).unwrap();
    assert_eq!(copy.layout(), package.layout());
    assert_eq!(copy.header().allocator, AllocatorTag::Temporary);
    copy.write_data(0, &Value::numeric(-1.0)).unwrap();
    assert_eq!(
        package.read_data(0, Shape::scalar(DataType::Numeric)).unwrap(),
        Value::numeric(1.5)
    );

    let batched = with_mode(PackagingMode::Batched);
    let copy = batched.clone_with(AllocatorTag::Heap).unwrap();
    assert!(copy.data_block().is_some());
}

#[test]
fn test_replicate_for_batch_fidelity() {
    let package = combined();
    let lanes = package.replicate_for_batch(5, AllocatorTag::Aligned).unwrap();
    assert_eq!(lanes.lane_count(), 5);
    assert_eq!(lanes.lane_size(), 24);
    let source = &package.code_block().unwrap().as_slice()[12..36];
    for lane in 0..5 {
        assert_eq!(lanes.lane(lane).unwrap(), source);
    }
}

#[test]
fn test_replicated_lanes_are_isolated() {
    let package = with_mode(PackagingMode::Segmented);
    let mut lanes = package.replicate_for_batch(3, AllocatorTag::Heap).unwrap();
    lanes.write_data(1, 0, &Value::numeric(9.0)).unwrap();
    let shape = Shape::scalar(DataType::Numeric);
    assert_eq!(lanes.read_data(0, 0, shape).unwrap(), Value::numeric(2.0));
    assert_eq!(lanes.read_data(1, 0, shape).unwrap(), Value::numeric(9.0));
    assert_eq!(lanes.read_data(2, 0, shape).unwrap(), Value::numeric(2.0));

    let views = lanes.lanes_mut();
    assert_eq!(views.len(), 3);
    assert!(views.iter().all(|view| view.metadata.as_ref().map(|m| m[0]) == Some(0x10)));
}

#[test]
fn test_replicate_rejects_zero_lanes() {
    let package = combined();
    assert!(matches!(
        package.replicate_for_batch(0, AllocatorTag::Heap),
        Err(PackageError::InvalidLaneCount)
    ));
}

#[test]
fn test_metadata_access() {
    let mut package = combined();
    let shape = Shape::new(DataType::Id, VectorSize::Three);
    package.set_metadata(1, shape).unwrap();
    assert_eq!(package.metadata(1).unwrap(), shape);
    assert!(package.metadata(6).is_err());
}

#[test]
fn test_data_bounds_checked() {
    let mut package = combined();
    assert!(package.write_data(14, &Value::numeric(1.0)).is_err());
    assert!(package.read_data(8, Shape::new(DataType::Numeric, VectorSize::Three)).is_err());
}

#[test]
fn test_write_value_fills_range_or_reports_bounds() {
    let mut data = [0u8; 12];
    write_value(&mut data, 4, &Value::id_vec(&[1, 2]).unwrap()).unwrap();
    assert_eq!(&data[4..8], &1i32.to_le_bytes());
    assert_eq!(&data[8..12], &2i32.to_le_bytes());

    let err = write_value(&mut data, 8, &Value::numeric_vec(&[1.0, 2.0]).unwrap()).unwrap_err();
    assert!(matches!(
        err,
        PackageError::OutOfBounds {
            kind: SegmentKind::Data,
            offset: 8,
            end: 16,
            len: 12,
        }
    ));
    assert_eq!(&data[8..12], &2i32.to_le_bytes());
}

#[test]
fn test_block_size_mismatch_rejected() {
    let layout = Layout::encode_sizes(PackagingMode::Combined, sizes()).unwrap();
    let header = PackageHeader::new(layout, PackageFlags::empty(), AllocatorTag::Heap);
    let block = Block::zeroed(10, AllocatorTag::Heap).unwrap();
    assert!(matches!(
        Package::from_parts(header, block, None),
        Err(PackageError::BlockSizeMismatch { block: 'A', .. })
    ));
}

#[test]
fn test_file_round_trip() {
    let packages = [
        combined(),
        with_mode(PackagingMode::Batched),
        with_mode(PackagingMode::Segmented),
    ];
    for package in packages {
        let mut bytes = Vec::new();
        write_package(&mut bytes, &package).unwrap();
        assert_eq!(&bytes[..4], b"VXPK");
        let loaded = read_package(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded.header(), package.header());
        assert_eq!(
            loaded.code_block().unwrap().as_slice(),
            package.code_block().unwrap().as_slice()
        );
        assert_eq!(
            loaded.data_block().map(Block::as_slice),
            package.data_block().map(Block::as_slice)
        );
    }
}

#[test]
fn test_file_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.vxp");
    crate::file::save(&path, &combined()).unwrap();
    let loaded = crate::file::load(&path).unwrap();
    let ids = loaded.read_data(4, Shape::new(DataType::Id, VectorSize::Three)).unwrap();
    assert_eq!(ids, Value::id_vec(&[7, 8, 9]).unwrap());
}

#[test]
fn test_bad_magic_rejected() {
    let bytes = b"NOPE\x01".to_vec();
    assert!(matches!(read_package(&mut bytes.as_slice()), Err(PackageError::BadMagic)));
}
