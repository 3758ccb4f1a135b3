//! Placement planner: door insertion heuristics and width-preserving resizes.
//!
//! Every function here mutates a single [`SideState`] and keeps the door
//! invariants: doors stay inside `[0, total_width]`, never overlap, and their
//! opening height stays within `[MIN_DOOR_HEIGHT, height]`. Computed
//! placements are rounded to whole centimeters.

use super::model::{
    round_cm, Door, SideState, MAX_SIDE_HEIGHT, MIN_DOOR_HEIGHT, MIN_DOOR_WIDTH, MIN_SIDE_HEIGHT,
    MIN_TOTAL_WIDTH,
};
use crate::error::{LayoutError, LayoutResult};

// =============================================================================
// ADD / REMOVE
// =============================================================================

/// Inserts a new door and returns its ID.
///
/// - No doors: the door is centered.
/// - One door: both doors are spread onto the thirds of the side.
/// - Two or more: the door is centered in the largest gap that fits it;
///   equal gaps resolve to the leftmost one.
pub fn add_door(state: &mut SideState, width: f64, door_height: f64) -> LayoutResult<String> {
    let total = state.total_width;
    let width = round_cm(width).clamp(MIN_DOOR_WIDTH, total);
    let door_height = round_cm(door_height).clamp(MIN_DOOR_HEIGHT, state.height);

    let position = match state.doors.len() {
        0 => clamp_position(total / 2.0 - width / 2.0, width, total),
        1 => match thirds_placement(state, width) {
            Some((existing, new)) => {
                state.doors[0].position = existing;
                new
            }
            None => gap_placement(state, width)?,
        },
        _ => gap_placement(state, width)?,
    };

    let door = Door::new(position, width, door_height);
    let id = door.id.clone();
    state.doors.push(door);
    Ok(id)
}

/// Removes a door, returning it.
pub fn remove_door(state: &mut SideState, id: &str) -> LayoutResult<Door> {
    let index = state
        .doors
        .iter()
        .position(|d| d.id == id)
        .ok_or_else(|| LayoutError::door_not_found(id))?;
    Ok(state.doors.remove(index))
}

fn clamp_position(position: f64, width: f64, total: f64) -> f64 {
    round_cm(position).clamp(0.0, (total - width).max(0.0))
}

/// Positions for (existing door, new door) on the thirds, if they don't collide.
fn thirds_placement(state: &SideState, width: f64) -> Option<(f64, f64)> {
    let total = state.total_width;
    let existing = &state.doors[0];
    let first = clamp_position(total / 3.0 - existing.width / 2.0, existing.width, total);
    let second = clamp_position(2.0 * total / 3.0 - width / 2.0, width, total);
    (first + existing.width <= second).then_some((first, second))
}

fn gap_placement(state: &SideState, width: f64) -> LayoutResult<f64> {
    let (start, size) =
        largest_gap(state, width).ok_or_else(|| LayoutError::no_room_for_door(width))?;
    let centered = round_cm(start + (size - width) / 2.0).clamp(start, start + size - width);
    Ok(clamp_position(centered, width, state.total_width))
}

/// Largest gap at least `width` wide, as (start, size). First wins on ties.
fn largest_gap(state: &SideState, width: f64) -> Option<(f64, f64)> {
    let mut gaps = Vec::with_capacity(state.doors.len() + 1);
    let mut cursor = 0.0_f64;
    for door in state.sorted_doors() {
        gaps.push((cursor, door.position - cursor));
        cursor = cursor.max(door.end());
    }
    gaps.push((cursor, state.total_width - cursor));

    gaps.into_iter()
        .filter(|&(_, size)| size >= width)
        .fold(None, |best: Option<(f64, f64)>, gap| match best {
            Some((_, best_size)) if best_size >= gap.1 => best,
            _ => Some(gap),
        })
}

// =============================================================================
// RESIZE
// =============================================================================

/// Resizes the segment at `index` of the derived segment list.
///
/// Door segments delegate to [`resize_door`]. Panel segments change the
/// overall width by the same amount; doors right of a non-trailing panel
/// shift with it.
pub fn resize_segment(state: &mut SideState, index: usize, new_width: f64) -> LayoutResult<()> {
    let segments = state.segments();
    let length = segments.len();
    let segment = segments
        .get(index)
        .ok_or_else(|| LayoutError::segment_out_of_range(index, length))?;

    if let Some(door) = &segment.door {
        return resize_door(state, &door.id, new_width);
    }

    let diff = round_cm(new_width).max(0.0) - segment.width;
    if index + 1 < length {
        shift_doors_from(state, segment.end, diff, None);
    }
    state.total_width = floor_total(state, state.total_width + diff);
    Ok(())
}

/// Changes a door's width; doors to its right shift and the side grows.
pub fn resize_door(state: &mut SideState, id: &str, new_width: f64) -> LayoutResult<()> {
    let door = state.door_mut(id)?;
    let old_end = door.end();
    let new_width = round_cm(new_width).max(MIN_DOOR_WIDTH);
    let diff = new_width - door.width;
    door.width = new_width;

    shift_doors_from(state, old_end, diff, Some(id));
    state.total_width = floor_total(state, state.total_width + diff);
    Ok(())
}

/// Sets the side height, clamped to its bounds. Returns the applied value.
pub fn set_height(state: &mut SideState, height: f64) -> f64 {
    let height = round_cm(height).clamp(MIN_SIDE_HEIGHT, MAX_SIDE_HEIGHT);
    state.height = height;
    for door in &mut state.doors {
        door.door_height = door.door_height.min(height);
    }
    height
}

/// Sets a door's opening height, clamped to `[MIN_DOOR_HEIGHT, height]`.
pub fn set_door_height(state: &mut SideState, id: &str, door_height: f64) -> LayoutResult<f64> {
    let max = state.height;
    let door = state.door_mut(id)?;
    door.door_height = round_cm(door_height).clamp(MIN_DOOR_HEIGHT, max);
    Ok(door.door_height)
}

/// Moves a door, clamped to the free interval between its neighbours.
pub fn move_door(state: &mut SideState, id: &str, position: f64) -> LayoutResult<f64> {
    let door = state.door(id).ok_or_else(|| LayoutError::door_not_found(id))?;
    let (width, current) = (door.width, door.position);

    let left = state
        .doors
        .iter()
        .filter(|d| d.id != id && d.end() <= current)
        .map(Door::end)
        .fold(0.0, f64::max);
    let right = state
        .doors
        .iter()
        .filter(|d| d.id != id && d.position >= current + width)
        .map(|d| d.position)
        .fold(state.total_width, f64::min);

    let position = round_cm(position).clamp(left, (right - width).max(left));
    state.door_mut(id)?.position = position;
    Ok(position)
}

/// Sets the overall width, never cutting into a door.
pub fn set_total_width(state: &mut SideState, total_width: f64) -> f64 {
    state.total_width = floor_total(state, round_cm(total_width));
    state.total_width
}

fn shift_doors_from(state: &mut SideState, from: f64, diff: f64, skip: Option<&str>) {
    for door in &mut state.doors {
        if door.position >= from && Some(door.id.as_str()) != skip {
            door.position = (door.position + diff).max(0.0);
        }
    }
}

fn floor_total(state: &SideState, total: f64) -> f64 {
    total.max(MIN_TOTAL_WIDTH).max(state.doors_end())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::model::{DEFAULT_DOOR_HEIGHT, DEFAULT_DOOR_WIDTH};

    fn flank() -> SideState {
        SideState::new(240.0, 800.0)
    }

    fn add(state: &mut SideState) -> LayoutResult<String> {
        add_door(state, DEFAULT_DOOR_WIDTH, DEFAULT_DOOR_HEIGHT)
    }

    fn positions(state: &SideState) -> Vec<f64> {
        state.sorted_doors().iter().map(|d| d.position).collect()
    }

    fn assert_valid(state: &SideState) {
        for (i, a) in state.doors.iter().enumerate() {
            assert!(a.position >= 0.0, "door {} starts before 0", a.id);
            assert!(a.end() <= state.total_width, "door {} past the edge", a.id);
            assert!(a.door_height >= MIN_DOOR_HEIGHT && a.door_height <= state.height);
            for b in state.doors.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "doors {} and {} overlap", a.id, b.id);
            }
        }
        let sum: f64 = state.segments().iter().map(|s| s.width).sum();
        assert_eq!(sum, state.total_width);
    }

    #[test]
    fn test_first_door_centered() {
        let mut state = flank();
        add(&mut state).unwrap();
        assert_eq!(positions(&state), vec![350.0]);
        assert_eq!(state.doors[0].door_height, 190.0);
    }

    #[test]
    fn test_second_door_spreads_thirds() {
        let mut state = flank();
        let first = add(&mut state).unwrap();
        let second = add(&mut state).unwrap();
        assert_eq!(state.door(&first).unwrap().position, 217.0);
        assert_eq!(state.door(&second).unwrap().position, 483.0);
        assert_valid(&state);
    }

    #[test]
    fn test_second_door_falls_back_when_thirds_collide() {
        let mut state = flank().with_door(Door::new(0.0, 600.0, 190.0));
        add(&mut state).unwrap();
        assert_eq!(positions(&state), vec![0.0, 650.0]);
        assert_valid(&state);
    }

    #[test]
    fn test_third_door_takes_largest_gap() {
        let mut state = flank()
            .with_door(Door::new(100.0, 100.0, 190.0))
            .with_door(Door::new(500.0, 100.0, 190.0));
        add(&mut state).unwrap();
        // gaps: [0,100) [200,500) [600,800) -> middle, centered
        assert_eq!(positions(&state), vec![100.0, 300.0, 500.0]);
    }

    #[test]
    fn test_equal_gaps_pick_leftmost() {
        let mut state = SideState::new(240.0, 900.0)
            .with_door(Door::new(250.0, 100.0, 190.0))
            .with_door(Door::new(550.0, 100.0, 190.0));
        add(&mut state).unwrap();
        // gaps of 250, 200, 250: the first one wins
        assert_eq!(positions(&state), vec![75.0, 250.0, 550.0]);
    }

    #[test]
    fn test_no_room_leaves_state_untouched() {
        let mut state = SideState::new(240.0, 300.0)
            .with_door(Door::new(0.0, 100.0, 190.0))
            .with_door(Door::new(150.0, 100.0, 190.0));
        let before = state.clone();
        assert!(matches!(add(&mut state), Err(LayoutError::NoRoomForDoor { .. })));
        assert_eq!(state, before);
    }

    #[test]
    fn test_repeated_adds_stay_valid() {
        let mut state = flank();
        for _ in 0..10 {
            let _ = add(&mut state);
            assert_valid(&state);
        }
        assert!(state.doors.len() >= 4);
    }

    #[test]
    fn test_door_height_clamped_to_short_side() {
        let mut state = SideState::new(150.0, 800.0);
        add(&mut state).unwrap();
        assert_eq!(state.doors[0].door_height, 150.0);
    }

    #[test]
    fn test_resize_trailing_segment_conserves_boundaries() {
        let mut state = flank();
        add(&mut state).unwrap();
        let before: Vec<f64> = state.segments().iter().map(|s| s.end).collect();

        resize_segment(&mut state, 2, 550.0).unwrap();
        assert_eq!(state.total_width, 1000.0);
        let after: Vec<f64> = state.segments().iter().map(|s| s.end).collect();
        assert_eq!(&after[..2], &before[..2]);
        assert_eq!(after[2], 1000.0);
    }

    #[test]
    fn test_resize_trailing_segment_floors() {
        let mut state = SideState::new(240.0, 150.0);
        resize_segment(&mut state, 0, 20.0).unwrap();
        assert_eq!(state.total_width, MIN_TOTAL_WIDTH);

        let mut state = flank();
        add(&mut state).unwrap();
        resize_segment(&mut state, 2, -50.0).unwrap();
        assert_eq!(state.total_width, 450.0);
        assert_valid(&state);
    }

    #[test]
    fn test_resize_leading_segment_grows_total() {
        let mut state = flank();
        let id = add(&mut state).unwrap();
        resize_segment(&mut state, 0, 400.0).unwrap();
        assert_eq!(state.door(&id).unwrap().position, 400.0);
        assert_eq!(state.total_width, 850.0);
        assert_valid(&state);
    }

    #[test]
    fn test_resize_door_segment_delegates() {
        let mut state = flank();
        let id = add(&mut state).unwrap();
        resize_segment(&mut state, 1, 150.0).unwrap();
        assert_eq!(state.door(&id).unwrap().width, 150.0);
        assert_eq!(state.total_width, 850.0);
    }

    #[test]
    fn test_resize_door_shifts_right_neighbours() {
        let mut state = flank();
        let first = add(&mut state).unwrap();
        let second = add(&mut state).unwrap();
        resize_door(&mut state, &first, 200.0).unwrap();
        assert_eq!(state.door(&first).unwrap().end(), 417.0);
        assert_eq!(state.door(&second).unwrap().position, 583.0);
        assert_eq!(state.total_width, 900.0);
        assert_valid(&state);

        resize_door(&mut state, &first, 1.0).unwrap();
        assert_eq!(state.door(&first).unwrap().width, MIN_DOOR_WIDTH);
        assert_valid(&state);
    }

    #[test]
    fn test_resize_out_of_range() {
        let mut state = flank();
        assert!(matches!(
            resize_segment(&mut state, 3, 10.0),
            Err(LayoutError::SegmentOutOfRange { index: 3, length: 1 })
        ));
        assert!(resize_door(&mut state, "missing", 10.0).is_err());
    }

    #[test]
    fn test_height_and_door_height_bounds() {
        let mut state = flank();
        let id = add(&mut state).unwrap();
        assert_eq!(set_height(&mut state, 50.0), MIN_SIDE_HEIGHT);
        assert_eq!(state.door(&id).unwrap().door_height, MIN_SIDE_HEIGHT);
        assert_eq!(set_height(&mut state, 1000.0), MAX_SIDE_HEIGHT);

        assert_eq!(set_door_height(&mut state, &id, 10.0).unwrap(), MIN_DOOR_HEIGHT);
        assert_eq!(set_door_height(&mut state, &id, 999.0).unwrap(), MAX_SIDE_HEIGHT);
    }

    #[test]
    fn test_non_finite_input_is_clamped() {
        let mut state = flank();
        let id = add_door(&mut state, f64::NAN, f64::INFINITY).unwrap();
        assert_eq!(state.door(&id).unwrap().width, MIN_DOOR_WIDTH);
        assert_eq!(state.door(&id).unwrap().door_height, MIN_DOOR_HEIGHT);

        assert_eq!(move_door(&mut state, &id, f64::NAN).unwrap(), 0.0);
        assert_eq!(set_door_height(&mut state, &id, f64::NAN).unwrap(), MIN_DOOR_HEIGHT);
        assert_eq!(set_height(&mut state, f64::INFINITY), MIN_SIDE_HEIGHT);
        resize_door(&mut state, &id, f64::NAN).unwrap();
        assert_eq!(state.door(&id).unwrap().width, MIN_DOOR_WIDTH);
        assert_eq!(set_total_width(&mut state, f64::NEG_INFINITY), MIN_TOTAL_WIDTH);
        assert_valid(&state);

        let segments = state.segments();
        assert!(segments[0].is_door());
        assert_eq!(segments.last().unwrap().end, state.total_width);
    }

    #[test]
    fn test_move_door_stays_between_neighbours() {
        let mut state = flank();
        let first = add(&mut state).unwrap();
        let second = add(&mut state).unwrap();
        assert_eq!(move_door(&mut state, &first, 450.0).unwrap(), 383.0);
        assert_eq!(move_door(&mut state, &second, 9999.0).unwrap(), 700.0);
        assert_eq!(move_door(&mut state, &first, -20.0).unwrap(), 0.0);
        assert_valid(&state);
    }

    #[test]
    fn test_set_total_width_respects_doors() {
        let mut state = flank();
        add(&mut state).unwrap();
        assert_eq!(set_total_width(&mut state, 200.0), 450.0);
        assert_eq!(set_total_width(&mut state, 1200.0), 1200.0);
    }

    #[test]
    fn test_remove_door() {
        let mut state = flank();
        let id = add(&mut state).unwrap();
        let removed = remove_door(&mut state, &id).unwrap();
        assert_eq!(removed.id, id);
        assert!(state.doors.is_empty());
        assert!(remove_door(&mut state, &id).is_err());
    }
}
