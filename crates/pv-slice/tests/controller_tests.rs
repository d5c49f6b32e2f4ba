//! Synchronization tests for the slice geometry controller.
//!
//! The reference cube uses the linear header: voxel `(i, j, k)` maps to
//! world `(10 + i, 20 + j, k)`. With 11×11 planes the pivot is `(5, 5, 0)`.

use std::rc::Rc;

use astro_common::{RulerId, ScalarBuffer, Volume, VolumeId};
use nalgebra::Matrix4;
use pv_slice::{
    RulerPose, SliceConfig, SliceError, SliceEvent, SliceGeometryController, SlicePhase,
    SyncOutcome,
};
use test_utils::{
    assert_approx_eq, assert_triple_approx_eq, fixtures, volume_from_f32, volume_with_header,
    EchoMode, SpyHost,
};

const DIMS: [usize; 3] = [11, 11, 4];

/// Ruler along the first axis through the pivot, pixels (2,5,0)-(8,5,0).
const HORIZONTAL_RULER: [[f64; 3]; 2] = [[12.0, 25.0, 0.0], [18.0, 25.0, 0.0]];

fn pose(angle: f64, shift_x: f64, shift_y: f64) -> RulerPose {
    RulerPose {
        angle,
        shift_x,
        shift_y,
    }
}

fn cube(id: &str, dims: [usize; 3]) -> Volume {
    volume_from_f32(id, dims, vec![1.0; dims[0] * dims[1] * dims[2]])
}

/// Controller synchronized on `cube` with `ruler`, records cleared.
fn session(mode: EchoMode) -> (Rc<SliceGeometryController>, SpyHost) {
    let controller = Rc::new(SliceGeometryController::new(SliceConfig::default()).unwrap());
    let mut host = SpyHost::new()
        .with_volume(cube("cube", DIMS))
        .with_ruler("ruler", HORIZONTAL_RULER);

    let outcome = controller
        .handle(&mut host, SliceEvent::InputVolumeChanged(VolumeId::new("cube")))
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Updated);
    let outcome = controller
        .handle(&mut host, SliceEvent::RulerSelected(RulerId::new("ruler")))
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Synchronized);

    host.reset_records();
    host.echo_to(controller.clone(), mode);
    (controller, host)
}

fn rotation_block(m: &Matrix4<f64>) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    out
}

// ============================================================================
// Session setup
// ============================================================================

#[test]
fn test_existing_ruler_is_adopted() {
    let (controller, _host) = session(EchoMode::Silent);

    let params = controller.parameters();
    assert_eq!(controller.phase(), SlicePhase::Synchronized);
    assert_eq!(params.pivot, [5, 5, 0]);
    assert_approx_eq!(params.angle(), 0.0, 1e-12);
    assert_approx_eq!(params.shift_x(), 0.0, 1e-12);
    assert_approx_eq!(params.shift_y(), 0.0, 1e-12);
    assert_approx_eq!(controller.half_length(), 3.0, 1e-12);
    assert_eq!(controller.sync_passes(), 1);
}

#[test]
fn test_fresh_ruler_is_placed_from_parameters() {
    let controller = SliceGeometryController::new(SliceConfig::default()).unwrap();
    let mut host = SpyHost::new()
        .with_volume(cube("cube", DIMS))
        .with_ruler("ruler", [[10.0, 20.0, 0.0], [10.0, 20.0, 0.0]]);

    controller
        .handle(&mut host, SliceEvent::InputVolumeChanged(VolumeId::new("cube")))
        .unwrap();
    let outcome = controller
        .handle(&mut host, SliceEvent::RulerSelected(RulerId::new("ruler")))
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Synchronized);
    // Half-length is a quarter of the plane width.
    assert_approx_eq!(controller.half_length(), 2.75, 1e-12);
    let [a, b] = host.ruler("ruler").unwrap();
    assert_triple_approx_eq!(a, [12.25, 25.0, 0.0], 1e-9);
    assert_triple_approx_eq!(b, [17.75, 25.0, 0.0], 1e-9);
    assert_eq!(host.reslices.len(), 1);
}

#[test]
fn test_ruler_before_volume_is_rejected() {
    let controller = SliceGeometryController::new(SliceConfig::default()).unwrap();
    let mut host = SpyHost::new().with_ruler("ruler", HORIZONTAL_RULER);

    let result = controller.handle(&mut host, SliceEvent::RulerSelected(RulerId::new("ruler")));

    assert!(matches!(result, Err(SliceError::MissingCollaborator(_))));
    assert_eq!(controller.phase(), SlicePhase::Idle);
}

// ============================================================================
// Parameters -> ruler
// ============================================================================

#[test]
fn test_quarter_turn_scenario() {
    let (controller, mut host) = session(EchoMode::Silent);

    let outcome = controller
        .handle(&mut host, SliceEvent::AngleOrShiftChanged(pose(90.0, 0.0, 0.0)))
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Synchronized);

    // Ruler rotated about the pivot (5, 5): pixels (5,2)-(5,8).
    let [a, b] = host.ruler("ruler").unwrap();
    assert_triple_approx_eq!(a, [15.0, 22.0, 0.0], 1e-9);
    assert_triple_approx_eq!(b, [15.0, 28.0, 0.0], 1e-9);

    assert_eq!(host.reslices.len(), 1);
    let (volume, transform) = &host.reslices[0];
    assert_eq!(volume, &VolumeId::new("cube"));
    let expected = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
    let block = rotation_block(transform);
    for r in 0..3 {
        assert_triple_approx_eq!(block[r], expected[r], 1e-12);
    }
    assert_approx_eq!(transform[(0, 3)], 5.0, 1e-12);
    assert_approx_eq!(transform[(1, 3)], 5.0, 1e-12);

    let params = controller.parameters();
    assert_eq!(params.angle(), 90.0);
    assert_eq!(params.previous.angle, 90.0);
}

#[test]
fn test_unchanged_parameters_are_a_no_op() {
    let (controller, mut host) = session(EchoMode::Silent);

    let outcome = controller
        .handle(&mut host, SliceEvent::AngleOrShiftChanged(pose(0.0, 0.0, 0.0)))
        .unwrap();

    assert_eq!(outcome, SyncOutcome::NoOp);
    assert!(host.ruler_writes.is_empty());
    assert!(host.reslices.is_empty());
    assert_eq!(host.ruler("ruler"), Some(HORIZONTAL_RULER));
}

#[test]
fn test_repeated_edit_is_a_no_op() {
    let (controller, mut host) = session(EchoMode::Silent);
    let edit = pose(30.0, 1.5, -0.5);

    controller
        .handle(&mut host, SliceEvent::AngleOrShiftChanged(edit))
        .unwrap();
    let second = controller
        .handle(&mut host, SliceEvent::AngleOrShiftChanged(edit))
        .unwrap();

    assert_eq!(second, SyncOutcome::NoOp);
    assert_eq!(host.reslices.len(), 1);
    assert_eq!(host.ruler_writes.len(), 1);
}

#[test]
fn test_shift_moves_ruler_in_rotated_frame() {
    let (controller, mut host) = session(EchoMode::Silent);

    controller
        .handle(&mut host, SliceEvent::AngleOrShiftChanged(pose(90.0, 0.0, 2.0)))
        .unwrap();

    // Perpendicular of +y is -x: centre moves to pixel (3, 5).
    let [a, b] = host.ruler("ruler").unwrap();
    assert_triple_approx_eq!(a, [13.0, 22.0, 0.0], 1e-9);
    assert_triple_approx_eq!(b, [13.0, 28.0, 0.0], 1e-9);
}

#[test]
fn test_rejected_write_keeps_last_geometry() {
    let (controller, mut host) = session(EchoMode::Silent);
    host.reject_writes = Some("ruler is locked".to_string());

    let result = controller.handle(&mut host, SliceEvent::AngleOrShiftChanged(pose(60.0, 0.0, 0.0)));

    assert!(matches!(result, Err(SliceError::Host(_))));
    assert_eq!(controller.phase(), SlicePhase::Synchronized);
    assert_eq!(controller.parameters().angle(), 0.0);
    assert!(host.reslices.is_empty());
    assert!(host.published.is_empty());
}

// ============================================================================
// Ruler -> parameters
// ============================================================================

#[test]
fn test_dragged_ruler_updates_parameters() {
    let (controller, mut host) = session(EchoMode::Silent);
    host.drag_ruler("ruler", [[15.0, 22.0, 0.0], [15.0, 28.0, 0.0]]);

    let outcome = controller
        .handle(&mut host, SliceEvent::RulerEndpointsChanged)
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Synchronized);
    let params = controller.parameters();
    assert_approx_eq!(params.angle(), 90.0, 1e-9);
    assert_approx_eq!(params.shift_x(), 0.0, 1e-9);
    assert_approx_eq!(params.shift_y(), 0.0, 1e-9);
    assert_eq!(params.previous, params.pose);

    assert!(host.ruler_writes.is_empty());
    assert_eq!(host.published.len(), 1);
    assert_eq!(host.reslices.len(), 1);
}

#[test]
fn test_dragged_ruler_offset_becomes_shift() {
    let (controller, mut host) = session(EchoMode::Silent);
    // Pixels (3,7)-(9,7): same direction, centre (6,7).
    host.drag_ruler("ruler", [[13.0, 27.0, 0.0], [19.0, 27.0, 0.0]]);

    controller
        .handle(&mut host, SliceEvent::RulerEndpointsChanged)
        .unwrap();

    let params = controller.parameters();
    assert_approx_eq!(params.angle(), 0.0, 1e-9);
    assert_approx_eq!(params.shift_x(), 1.0, 1e-9);
    assert_approx_eq!(params.shift_y(), 2.0, 1e-9);
}

#[test]
fn test_zero_length_ruler_is_rejected() {
    let (controller, mut host) = session(EchoMode::Silent);
    host.drag_ruler("ruler", [[14.0, 24.0, 0.0], [14.0, 24.0, 0.0]]);

    let result = controller.handle(&mut host, SliceEvent::RulerEndpointsChanged);

    match result {
        Err(e @ SliceError::DegenerateGeometry(_)) => assert!(!e.is_session_fatal()),
        other => panic!("expected DegenerateGeometry, got {:?}", other),
    }
    assert_eq!(controller.phase(), SlicePhase::Synchronized);
    assert_approx_eq!(controller.half_length(), 3.0, 1e-12);
    assert!(host.reslices.is_empty());
}

#[test]
fn test_off_plane_endpoint_is_snapped() {
    let (controller, mut host) = session(EchoMode::Silent);
    host.drag_ruler("ruler", [[12.0, 25.0, 0.5], [18.0, 25.0, 0.0]]);

    let outcome = controller
        .handle(&mut host, SliceEvent::RulerEndpointsChanged)
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Synchronized);
    assert_eq!(host.ruler_writes.len(), 1);
    let [a, _] = host.ruler("ruler").unwrap();
    assert_triple_approx_eq!(a, [12.0, 25.0, 0.0], 1e-9);
}

#[test]
fn test_missing_ruler_is_transient() {
    let (controller, mut host) = session(EchoMode::Silent);
    host.rulers.clear();

    let result = controller.handle(&mut host, SliceEvent::RulerEndpointsChanged);

    assert!(matches!(result, Err(SliceError::MissingCollaborator(_))));
    assert_eq!(controller.phase(), SlicePhase::Synchronized);
}

// ============================================================================
// Loop prevention
// ============================================================================

#[test]
fn test_immediate_echo_gives_one_pass() {
    let (controller, mut host) = session(EchoMode::Immediate);
    let passes = controller.sync_passes();

    controller
        .handle(&mut host, SliceEvent::AngleOrShiftChanged(pose(30.0, 1.0, 0.0)))
        .unwrap();

    assert_eq!(controller.sync_passes(), passes + 1);
    assert_eq!(host.ruler_writes.len(), 1);
    assert_eq!(host.reslices.len(), 1);
    // One echo from the ruler write, one from the parameter publication.
    assert_eq!(host.echo_outcomes.len(), 2);
    assert!(host
        .echo_outcomes
        .iter()
        .all(|o| o == &Ok(SyncOutcome::Suppressed)));
    assert!(!controller.is_synchronizing());
}

#[test]
fn test_immediate_echo_of_ruler_drag_gives_one_pass() {
    let (controller, mut host) = session(EchoMode::Immediate);
    host.drag_ruler("ruler", [[15.0, 22.0, 0.0], [15.0, 28.0, 0.0]]);

    controller
        .handle(&mut host, SliceEvent::RulerEndpointsChanged)
        .unwrap();

    assert_eq!(host.reslices.len(), 1);
    assert_eq!(host.echo_outcomes, vec![Ok(SyncOutcome::Suppressed)]);
}

#[test]
fn test_deferred_echo_is_absorbed() {
    let (controller, mut host) = session(EchoMode::Deferred);
    let passes = controller.sync_passes();

    controller
        .handle(&mut host, SliceEvent::AngleOrShiftChanged(pose(45.0, 0.0, 2.0)))
        .unwrap();
    assert_eq!(host.pending_echoes(), 2);

    assert_eq!(host.flush_echoes(), 2);

    assert_eq!(controller.sync_passes(), passes + 1);
    assert_eq!(host.reslices.len(), 1);
    assert_eq!(host.ruler_writes.len(), 1);
    assert!(host.echo_outcomes.iter().all(|o| o == &Ok(SyncOutcome::NoOp)));
    assert_eq!(host.pending_echoes(), 0);
}

#[test]
fn test_deferred_echo_on_sky_cube_is_absorbed() {
    let dims = [21, 21, 8];
    let controller = Rc::new(SliceGeometryController::new(SliceConfig::default()).unwrap());
    let sky = volume_with_header(
        "sky",
        dims,
        vec![0.0; dims[0] * dims[1] * dims[2]],
        fixtures::sky_cube_header(dims),
    );
    let mut host = SpyHost::new()
        .with_volume(sky)
        .with_ruler("ruler", [[180.0, 30.0, 1.0e6], [180.0, 30.0, 1.0e6]]);

    controller
        .handle(&mut host, SliceEvent::InputVolumeChanged(VolumeId::new("sky")))
        .unwrap();
    controller
        .handle(&mut host, SliceEvent::RulerSelected(RulerId::new("ruler")))
        .unwrap();
    host.reset_records();
    host.echo_to(controller.clone(), EchoMode::Deferred);

    controller
        .handle(&mut host, SliceEvent::AngleOrShiftChanged(pose(-30.0, 2.0, 1.0)))
        .unwrap();
    host.flush_echoes();

    assert_eq!(host.reslices.len(), 1);
    assert!(host.echo_outcomes.iter().all(|o| o == &Ok(SyncOutcome::NoOp)));
}

// ============================================================================
// Volume changes
// ============================================================================

#[test]
fn test_volume_change_resets_pivot_and_awaits_ruler() {
    let (controller, mut host) = session(EchoMode::Silent);
    controller
        .handle(&mut host, SliceEvent::AngleOrShiftChanged(pose(20.0, 0.0, 0.0)))
        .unwrap();
    host.volumes
        .insert(VolumeId::new("other"), cube("other", [21, 15, 3]));

    let outcome = controller
        .handle(&mut host, SliceEvent::InputVolumeChanged(VolumeId::new("other")))
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Updated);
    assert_eq!(controller.phase(), SlicePhase::AwaitingRuler);
    let params = controller.parameters();
    assert_eq!(params.pivot, [10, 7, 0]);
    assert_eq!(params.angle(), 0.0);
    assert_eq!(params.input_volume, Some(VolumeId::new("other")));
    assert_eq!(params.ruler, None);

    // Ruler and parameter edits wait for a new ruler selection.
    let result = controller.handle(&mut host, SliceEvent::RulerEndpointsChanged);
    assert!(matches!(result, Err(SliceError::MissingCollaborator(_))));
    let result = controller.handle(&mut host, SliceEvent::AngleOrShiftChanged(pose(10.0, 0.0, 0.0)));
    assert!(matches!(result, Err(SliceError::MissingCollaborator(_))));
}

#[test]
fn test_ruler_reselected_after_volume_change() {
    let (controller, mut host) = session(EchoMode::Silent);
    host.volumes
        .insert(VolumeId::new("other"), cube("other", [21, 15, 3]));
    controller
        .handle(&mut host, SliceEvent::InputVolumeChanged(VolumeId::new("other")))
        .unwrap();

    let outcome = controller
        .handle(&mut host, SliceEvent::RulerSelected(RulerId::new("ruler")))
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Synchronized);
    assert_eq!(controller.phase(), SlicePhase::Synchronized);
    assert_eq!(controller.parameters().ruler, Some(RulerId::new("ruler")));
}

#[test]
fn test_moment_map_moves_pivot() {
    let (controller, mut host) = session(EchoMode::Silent);
    host.volumes.insert(VolumeId::new("mom0"), cube("mom0", [9, 11, 1]));

    let outcome = controller
        .handle(&mut host, SliceEvent::MomentMapSelected(VolumeId::new("mom0")))
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Synchronized);
    assert_eq!(controller.parameters().pivot, [4, 5, 0]);
    let [a, b] = host.ruler("ruler").unwrap();
    assert_triple_approx_eq!(a, [11.0, 25.0, 0.0], 1e-9);
    assert_triple_approx_eq!(b, [17.0, 25.0, 0.0], 1e-9);
}

#[test]
fn test_unknown_volume_is_transient() {
    let controller = SliceGeometryController::new(SliceConfig::default()).unwrap();
    let mut host = SpyHost::new();

    let result = controller.handle(&mut host, SliceEvent::InputVolumeChanged(VolumeId::new("nope")));

    assert!(matches!(result, Err(SliceError::MissingCollaborator(_))));
    assert_eq!(controller.phase(), SlicePhase::Idle);
}

#[test]
fn test_invalid_wcs_abandons_session() {
    let (controller, mut host) = session(EchoMode::Silent);
    let broken = volume_with_header(
        "broken",
        DIMS,
        vec![0.0; DIMS[0] * DIMS[1] * DIMS[2]],
        fixtures::singular_header(DIMS),
    );
    host.volumes.insert(VolumeId::new("broken"), broken);

    let result = controller.handle(&mut host, SliceEvent::InputVolumeChanged(VolumeId::new("broken")));

    let err = result.unwrap_err();
    assert!(err.is_session_fatal());
    assert_eq!(controller.phase(), SlicePhase::Idle);
    assert_eq!(controller.parameters().input_volume, None);
}

#[test]
fn test_unsupported_scalar_type_abandons_session() {
    let controller = SliceGeometryController::new(SliceConfig::default()).unwrap();
    let mask = Volume::new(
        VolumeId::new("mask"),
        "mask",
        DIMS,
        ScalarBuffer::UInt8(vec![0; DIMS[0] * DIMS[1] * DIMS[2]]),
        fixtures::linear_header(DIMS),
    )
    .unwrap();
    let mut host = SpyHost::new().with_volume(mask);

    let result = controller.handle(&mut host, SliceEvent::InputVolumeChanged(VolumeId::new("mask")));

    assert!(matches!(result, Err(SliceError::UnsupportedDataType(_))));
    assert_eq!(controller.phase(), SlicePhase::Idle);
}
