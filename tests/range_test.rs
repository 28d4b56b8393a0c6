use sheet_digest::cell::parse_reference;
use sheet_digest::error::DigestError;
use sheet_digest::range::{
    CellRange, MAX_RANGE_CELLS, NormalizedRange, RangeSpecifier, RowSpan, compress_rows,
    normalize_range, normalize_str,
};
use std::collections::BTreeSet;

fn cells(names: &[&str]) -> BTreeSet<sheet_digest::CellCoordinate> {
    names.iter().map(|n| parse_reference(n).unwrap()).collect()
}

#[test]
fn test_normalize_rectangle() {
    let normalized = normalize_str("A2:C3").unwrap();
    assert_eq!(normalized.cells, cells(&["A2", "A3", "B2", "B3", "C2", "C3"]));
    assert_eq!(normalized.rows, BTreeSet::from([2, 3]));
    assert_eq!(
        normalized.references(),
        vec!["A2", "A3", "B2", "B3", "C2", "C3"]
    );
    assert_eq!(normalized.rightmost_column(), Some(3));
}

#[test]
fn test_normalize_reversed_range() {
    assert_eq!(normalize_str("C3:A2").unwrap(), normalize_str("A2:C3").unwrap());
    assert_eq!(
        RangeSpecifier::parse("C3:A2").unwrap().to_string(),
        "A2:C3"
    );
    // Mixed corners: top-right to bottom-left.
    assert_eq!(
        RangeSpecifier::parse("C2:A3").unwrap().to_string(),
        "A2:C3"
    );
}

#[test]
fn test_normalize_single_cell_and_row_marker() {
    let single = normalize_str("$E$4").unwrap();
    assert_eq!(single.cells, cells(&["E4"]));
    assert_eq!(single.rows, BTreeSet::from([4]));

    let marker = normalize_str("7").unwrap();
    assert!(marker.cells.is_empty());
    assert_eq!(marker.rows, BTreeSet::from([7]));
    assert_eq!(marker.rightmost_column(), None);
}

#[test]
fn test_specifier_parsing() {
    assert_eq!(
        RangeSpecifier::parse("E4").unwrap(),
        RangeSpecifier::Cell(parse_reference("E4").unwrap())
    );
    assert_eq!(RangeSpecifier::parse("007").unwrap(), RangeSpecifier::Row(7));
    assert_eq!(RangeSpecifier::parse("007").unwrap().to_string(), "7");
    assert_eq!(RangeSpecifier::parse("$B$2:$D$9").unwrap().to_string(), "B2:D9");

    for bad in ["", "A", "1A", "A1:", ":B2", "A1:B2:C3", "A1-B2"] {
        let err = RangeSpecifier::parse(bad).unwrap_err();
        assert!(matches!(err, DigestError::InvalidFormat(_)), "{:?}", bad);
    }
    assert!(matches!(
        RangeSpecifier::parse("0").unwrap_err(),
        DigestError::InvalidArgument(_)
    ));
}

#[test]
fn test_oversized_range_is_rejected() {
    // 10 columns x 25,000 rows sits exactly on the limit.
    let at_limit = RangeSpecifier::parse("A1:J25000").unwrap();
    match at_limit {
        RangeSpecifier::Range(range) => assert_eq!(range.area(), MAX_RANGE_CELLS),
        other => panic!("expected a range, got {:?}", other),
    }

    for bad in ["A1:J25001", "A1:XFD1048576", "XFD1048576:A1"] {
        let err = RangeSpecifier::parse(bad).unwrap_err();
        assert!(matches!(err, DigestError::InvalidArgument(_)), "{:?}", bad);
    }
    assert!(normalize_str("A1:XFD1048576").is_err());
}

#[test]
fn test_specifier_serde_uses_canonical_text() {
    let spec = RangeSpecifier::parse("$C$3:A1").unwrap();
    assert_eq!(serde_json::to_string(&spec).unwrap(), "\"A1:C3\"");

    let back: RangeSpecifier = serde_json::from_str("\"A1:C3\"").unwrap();
    assert_eq!(back, spec);
    assert!(serde_json::from_str::<RangeSpecifier>("\"1A\"").is_err());
}

#[test]
fn test_merge_unions_cells_and_rows() {
    let mut merged = NormalizedRange::default();
    for spec in ["A1:B4", "E4", "D4", "F8", "E4"] {
        merged.merge(normalize_range(&RangeSpecifier::parse(spec).unwrap()));
    }
    assert_eq!(merged.cells.len(), 11);
    assert_eq!(merged.rows, BTreeSet::from([1, 2, 3, 4, 8]));
    assert_eq!(merged.rightmost_column(), Some(6));
}

#[test]
fn test_compress_rows() {
    assert_eq!(
        compress_rows([1, 2, 3, 4, 8]),
        vec![RowSpan::new(1, 4), RowSpan::new(8, 8)]
    );
    assert_eq!(compress_rows(Vec::<u32>::new()), Vec::<RowSpan>::new());
    assert_eq!(compress_rows([5]), vec![RowSpan::new(5, 5)]);
    assert_eq!(
        compress_rows([2, 4, 6]),
        vec![RowSpan::new(2, 2), RowSpan::new(4, 4), RowSpan::new(6, 6)]
    );
    assert_eq!(
        compress_rows(BTreeSet::from([10, 9, 11, 1])),
        vec![RowSpan::new(1, 1), RowSpan::new(9, 11)]
    );
}

#[test]
fn test_row_span_region() {
    let span = RowSpan::new(8, 8);
    let region = span.region(6);
    assert_eq!(region.to_string(), "A8:F8");
    assert!(span.contains(8));
    assert!(!span.contains(9));

    let block = RowSpan::new(1, 4).region(6);
    assert_eq!((block.width(), block.height()), (6, 4));
    assert!(block.contains(&parse_reference("F4").unwrap()));
    assert!(!block.contains(&parse_reference("F8").unwrap()));
}

#[test]
fn test_cell_range_iteration_is_row_major() {
    let range = CellRange::new(parse_reference("B3").unwrap(), parse_reference("A2").unwrap());
    let names: Vec<String> = range.cells().map(|c| c.to_string()).collect();
    assert_eq!(names, vec!["A2", "B2", "A3", "B3"]);
}
