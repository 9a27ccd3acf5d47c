use dicom_fg::io::WriteOptions;
use dicom_fg::{FrameContent, FunctionalGroup, PixelMeasures, PlaneOrientation, PlanePosition};
use dicom_object::InMemDicomObject;
use dicom_seg::{
    AlgorithmType, AnalyzerOptions, GroupingOptions, OverlapAnalyzer, OverlapState, Segment,
    SegmentNumber, Segmentation,
};
use rstest::rstest;

fn groups_at(z: f64) -> Vec<FunctionalGroup> {
    vec![
        FrameContent::default().into(),
        PlanePosition::new(10., -20., z).into(),
    ]
}

fn new_segmentation(rows: u16, columns: u16, segments: usize) -> Segmentation {
    let mut seg = Segmentation::new(rows, columns).unwrap();
    for i in 0..segments {
        seg.add_segment(Segment::new(format!("segment {}", i + 1), AlgorithmType::Automatic))
            .unwrap();
    }
    seg.add_for_all_frames(PlaneOrientation::new([1., 0., 0.], [0., 1., 0.]).into())
        .unwrap();
    seg.add_for_all_frames(PixelMeasures::with_slice_thickness(1.).into())
        .unwrap();
    seg
}

/// A mask with the pixels of one row set.
fn row_mask(rows: u16, columns: u16, row: u16) -> Vec<u8> {
    (0..rows)
        .flat_map(|r| (0..columns).map(move |_| u8::from(r == row)))
        .collect()
}

#[test]
fn frames_at_almost_the_same_position_are_compared() {
    let mut seg = new_segmentation(3, 3, 2);
    seg.add_frame(&row_mask(3, 3, 0), 1, groups_at(0.)).unwrap();
    seg.add_frame(&row_mask(3, 3, 0), 2, groups_at(0.0005))
        .unwrap();
    seg.add_frame(&row_mask(3, 3, 1), 1, groups_at(5.)).unwrap();

    let mut analyzer = OverlapAnalyzer::new(&seg, AnalyzerOptions::default());
    assert_eq!(analyzer.frames_by_position().unwrap(), &[vec![0, 1], vec![2]]);
    assert!(analyzer.has_overlapping_segments().unwrap());
    assert_eq!(
        analyzer.non_overlapping_segments().unwrap(),
        &[vec![1], vec![2]]
    );

    // a tighter tolerance separates the first two frames
    let options = AnalyzerOptions::new().grouping(GroupingOptions::new().tolerance_factor(0.0001));
    let mut analyzer = OverlapAnalyzer::new(&seg, options);
    assert_eq!(analyzer.frames_by_position().unwrap().len(), 3);
    assert!(!analyzer.has_overlapping_segments().unwrap());
}

#[rstest(rows, columns, case(4, 4), case(3, 3), case(5, 3))]
fn matrix_and_groups_are_consistent(rows: u16, columns: u16) {
    const SEGMENTS: usize = 6;
    let mut seg = new_segmentation(rows, columns, SEGMENTS);
    // segment n covers row (n % rows) on every slice it appears on,
    // and appears on slices n % 3 and (n + 1) % 3
    for segment in 1..=SEGMENTS as SegmentNumber {
        let row = segment % rows;
        for slice in [segment % 3, (segment + 1) % 3] {
            seg.add_frame(
                &row_mask(rows, columns, row),
                segment,
                groups_at(f64::from(slice) * 2.),
            )
            .unwrap();
        }
    }

    let mut analyzer = OverlapAnalyzer::new(&seg, AnalyzerOptions::default());
    assert_eq!(analyzer.frames_by_position().unwrap().len(), 3);
    let matrix = analyzer.overlap_matrix().unwrap().clone();
    assert_eq!(matrix.size(), SEGMENTS);
    for a in 1..=SEGMENTS as SegmentNumber {
        assert_eq!(matrix.get(a, a), Some(OverlapState::Disjoint));
        for b in 1..=SEGMENTS as SegmentNumber {
            assert_ne!(matrix.get(a, b), Some(OverlapState::Unknown));
            assert_eq!(matrix.get(a, b), matrix.get(b, a));
            // every pair shares at least one slice
            let same_row = a % rows == b % rows;
            assert_eq!(matrix.overlaps(a, b), a != b && same_row);
        }
    }

    let groups = analyzer.non_overlapping_segments().unwrap().to_vec();
    let mut all: Vec<SegmentNumber> = groups.iter().flatten().copied().collect();
    all.sort_unstable();
    assert_eq!(all, (1..=SEGMENTS as SegmentNumber).collect::<Vec<_>>());
    for group in &groups {
        for &a in group {
            for &b in group {
                assert!(!matrix.overlaps(a, b));
            }
        }
    }
}

#[test]
fn analysis_of_a_segmentation_read_from_a_data_set() {
    let mut seg = new_segmentation(2, 4, 3);
    seg.add_frame(&[1, 1, 0, 0, 0, 0, 0, 0], 1, groups_at(0.))
        .unwrap();
    seg.add_frame(&[0, 0, 1, 1, 0, 0, 0, 0], 2, groups_at(0.))
        .unwrap();
    seg.add_frame(&[0, 1, 1, 0, 0, 0, 0, 0], 3, groups_at(0.))
        .unwrap();
    seg.add_frame(&[0, 0, 0, 0, 1, 1, 1, 1], 1, groups_at(1.5))
        .unwrap();

    let mut obj = InMemDicomObject::new_empty();
    seg.write_dataset(&mut obj, WriteOptions::default())
        .unwrap();
    let back = Segmentation::read_dataset(&obj).unwrap();
    assert_eq!(back.number_of_frames(), 4);
    assert_eq!(back.frames_for_segment(1), vec![0, 3]);

    let mut analyzer = OverlapAnalyzer::new(&back, AnalyzerOptions::default());
    assert_eq!(
        analyzer.dump_overlap_matrix().unwrap(),
        "Overlap matrix:\n0 0 1 \n0 0 1 \n1 1 0 \n"
    );
    assert_eq!(
        analyzer.non_overlapping_segments().unwrap(),
        &[vec![1, 2], vec![3]]
    );
}
