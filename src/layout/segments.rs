//! Segment calculator: turns a door list into alternating panel/door segments.

use super::model::{Door, Segment};

/// Derives the segments tiling `[0, total_width)`.
///
/// Doors are walked left to right; any gap before a door becomes a panel,
/// and space after the last door becomes a trailing panel. Zero-width gaps
/// are omitted.
pub fn segments(doors: &[Door], total_width: f64) -> Vec<Segment> {
    if doors.is_empty() {
        return vec![Segment::panel(0.0, total_width)];
    }

    let mut sorted: Vec<&Door> = doors.iter().collect();
    sorted.sort_by(|a, b| a.position.total_cmp(&b.position));

    let mut result = Vec::with_capacity(sorted.len() * 2 + 1);
    let mut cursor = 0.0;
    for door in sorted {
        if door.position > cursor {
            result.push(Segment::panel(cursor, door.position));
        }
        result.push(Segment::door(door));
        cursor = door.end();
    }
    if cursor < total_width {
        result.push(Segment::panel(cursor, total_width));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::model::SegmentKind;

    fn door(position: f64, width: f64) -> Door {
        Door::new(position, width, 190.0)
    }

    fn assert_tiles(segments: &[Segment], total: f64) {
        let sum: f64 = segments.iter().map(|s| s.width).sum();
        assert_eq!(sum, total);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(!(pair[0].is_panel() && pair[1].is_panel()));
        }
        assert_eq!(segments.first().unwrap().start, 0.0);
        assert_eq!(segments.last().unwrap().end, total);
    }

    #[test]
    fn test_no_doors_single_panel() {
        let segs = segments(&[], 800.0);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].kind, SegmentKind::Panel);
        assert_eq!(segs[0].width, 800.0);
    }

    #[test]
    fn test_alternating_segments_sorted() {
        let doors = vec![door(500.0, 100.0), door(100.0, 100.0)];
        let segs = segments(&doors, 800.0);
        let kinds: Vec<_> = segs.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SegmentKind::Panel,
                SegmentKind::Door,
                SegmentKind::Panel,
                SegmentKind::Door,
                SegmentKind::Panel,
            ]
        );
        assert_eq!(segs[1].door.as_ref().unwrap().position, 100.0);
        assert_eq!(segs[3].door.as_ref().unwrap().position, 500.0);
        assert_tiles(&segs, 800.0);
    }

    #[test]
    fn test_zero_width_gaps_omitted() {
        let doors = vec![door(0.0, 100.0), door(100.0, 100.0), door(700.0, 100.0)];
        let segs = segments(&doors, 800.0);
        assert_eq!(segs.len(), 4);
        assert!(segs[0].is_door());
        assert!(segs[1].is_door());
        assert!(segs[2].is_panel());
        assert_eq!(segs[2].width, 500.0);
        assert!(segs[3].is_door());
        assert_tiles(&segs, 800.0);
    }

    #[test]
    fn test_deterministic() {
        let doors = vec![door(300.0, 120.0), door(50.0, 80.0)];
        assert_eq!(segments(&doors, 700.0), segments(&doors, 700.0));
    }
}
