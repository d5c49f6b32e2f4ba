//! Integration tests for the pixel ↔ world pipeline and spectral conventions.

use astro_common::{CoordinateSpace, HeaderMap, ScalarBuffer, Volume, VolumeId};
use rand::{Rng, SeedableRng};
use wcs::spectral::SPEED_OF_LIGHT;
use wcs::{
    AxisRole, SpectralConvention, WcsDescriptor, WcsError, WcsStatus, WcsTransform, NO_PREVIOUS,
};

const HI_RESTFRQ: f64 = 1.420405752e9;

fn cube_header(projection: &str) -> HeaderMap {
    HeaderMap::new()
        .with("NAXIS", 3)
        .with("CTYPE1", format!("RA---{}", projection))
        .with("CTYPE2", format!("DEC--{}", projection))
        .with("CTYPE3", "VRAD")
        .with("CUNIT1", "deg")
        .with("CUNIT2", "deg")
        .with("CUNIT3", "km/s")
        .with("CRPIX1", 32.0)
        .with("CRPIX2", 32.0)
        .with("CRPIX3", 16.0)
        .with("CRVAL1", 201.365)
        .with("CRVAL2", -43.019)
        .with("CRVAL3", 550.0)
        .with("CDELT1", -0.005)
        .with("CDELT2", 0.005)
        .with("CDELT3", 4.0)
        .with("RESTFRQ", HI_RESTFRQ)
}

fn assert_pixel_close(a: [f64; 3], b: [f64; 3]) {
    for i in 0..3 {
        assert!(
            (a[i] - b[i]).abs() < 1e-6,
            "axis {}: {:?} vs {:?}",
            i,
            a,
            b
        );
    }
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_reference_pixel_maps_to_crval() {
    let wcs = WcsTransform::from_header(&cube_header("TAN")).unwrap();
    let world = wcs.pixel_to_world([31.0, 31.0, 15.0]).unwrap();
    assert!((world[0] - 201.365).abs() < 1e-9);
    assert!((world[1] + 43.019).abs() < 1e-9);
    assert!((world[2] - 550.0).abs() < 1e-9);
}

#[test]
fn test_random_round_trips_all_projections() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    for projection in ["TAN", "SIN", "ARC", "STG", "ZEA", "CAR"] {
        let wcs = WcsTransform::from_header(&cube_header(projection)).unwrap();
        assert!(wcs.is_valid(), "{} should validate", projection);
        for _ in 0..200 {
            let ijk = [
                rng.gen_range(0.0..64.0),
                rng.gen_range(0.0..64.0),
                rng.gen_range(0.0..32.0),
            ];
            let world = wcs.pixel_to_world(ijk).unwrap();
            let back = wcs.world_to_pixel(world).unwrap();
            assert_pixel_close(ijk, back);
        }
    }
}

#[test]
fn test_rotated_pc_round_trip() {
    let angle = 25f64.to_radians();
    let header = cube_header("TAN")
        .with("PC1_1", angle.cos())
        .with("PC1_2", -angle.sin())
        .with("PC2_1", angle.sin())
        .with("PC2_2", angle.cos());
    let wcs = WcsTransform::from_header(&header).unwrap();
    let ijk = [10.25, 50.5, 3.0];
    let back = wcs.world_to_pixel(wcs.pixel_to_world(ijk).unwrap()).unwrap();
    assert_pixel_close(ijk, back);
}

#[test]
fn test_right_ascension_is_normalised() {
    let header = cube_header("TAN").with("CRVAL1", 0.01);
    let wcs = WcsTransform::from_header(&header).unwrap();
    // Positive pixel offset with negative CDELT1 goes west of 0h.
    let world = wcs.pixel_to_world([40.0, 31.0, 0.0]).unwrap();
    assert!(world[0] >= 0.0 && world[0] < 360.0);
    assert!(world[0] > 359.0);
}

#[test]
fn test_two_axis_image() {
    let header = HeaderMap::new()
        .with("NAXIS", 2)
        .with("CTYPE1", "RA---SIN")
        .with("CTYPE2", "DEC--SIN")
        .with("CRPIX1", 10.0)
        .with("CRPIX2", 10.0)
        .with("CRVAL1", 83.8)
        .with("CRVAL2", -5.4)
        .with("CDELT1", -0.001)
        .with("CDELT2", 0.001);
    let wcs = WcsTransform::from_header(&header).unwrap();
    assert_eq!(wcs.descriptor().naxis(), 2);
    let world = wcs.pixel_to_world([3.0, 4.0, 7.0]).unwrap();
    assert_eq!(world[2], 7.0);
    assert_pixel_close(wcs.world_to_pixel(world).unwrap(), [3.0, 4.0, 7.0]);
}

// ============================================================================
// Invalid descriptors
// ============================================================================

#[test]
fn test_invalid_wcs_rejects_conversions() {
    let header = cube_header("TAN").with("CDELT2", 0.0);
    let wcs = WcsTransform::from_header(&header).unwrap();
    assert!(matches!(wcs.status(), WcsStatus::Invalid(_)));
    assert!(matches!(wcs.pixel_to_world([0.0; 3]), Err(WcsError::NotValid(_))));
    assert!(matches!(wcs.world_to_pixel([0.0; 3]), Err(WcsError::NotValid(_))));

    let err: astro_common::AstroError = wcs.pixel_to_world([0.0; 3]).unwrap_err().into();
    assert_eq!(err.code(), "InvalidWCS");
}

#[test]
fn test_invalid_wcs_rejects_display_helpers() {
    let header = cube_header("TAN").with("CDELT1", 0.0);
    let wcs = WcsTransform::from_header(&header).unwrap();
    assert!(!wcs.is_valid());

    let config = wcs::DisplayConfig::default();
    assert!(matches!(
        wcs.tick_step(AxisRole::Y, 2.7, 10, &config),
        Err(WcsError::NotValid(_))
    ));
    assert!(matches!(
        wcs.format_world_value(30.0, AxisRole::Y, 2, NO_PREVIOUS, &config),
        Err(WcsError::NotValid(_))
    ));
}

#[test]
fn test_volume_falls_back_to_ijk() {
    let header = cube_header("AIT");
    let mut volume = Volume::new(
        VolumeId::new("cube"),
        "cube",
        [2, 2, 2],
        ScalarBuffer::Float32(vec![0.0; 8]),
        header,
    )
    .unwrap();
    let wcs = WcsTransform::for_volume(&mut volume).unwrap();
    assert!(!wcs.is_valid());
    assert_eq!(volume.coordinate_space(), CoordinateSpace::Ijk);
}

#[test]
fn test_latitude_out_of_range_on_inverse() {
    let wcs = WcsTransform::from_header(&cube_header("TAN")).unwrap();
    assert!(matches!(
        wcs.world_to_pixel([201.0, 95.0, 550.0]),
        Err(WcsError::OutOfRange(_))
    ));
}

// ============================================================================
// Spectral conventions
// ============================================================================

#[test]
fn test_radio_to_optical_preserves_frequency() {
    let mut wcs = WcsTransform::from_header(&cube_header("TAN")).unwrap();
    let pixel = [31.0, 31.0, 25.0];
    let v_radio = wcs.pixel_to_world(pixel).unwrap()[2];

    assert!(wcs.set_spectral_convention(SpectralConvention::OpticalVelocity));
    assert_eq!(wcs.spectral_type(), Some("VOPT-F2W"));
    assert_eq!(
        wcs.descriptor().spectral_convention(),
        SpectralConvention::OpticalVelocity
    );

    let v_opt = wcs.pixel_to_world(pixel).unwrap()[2];
    let c_kms = SPEED_OF_LIGHT / 1000.0;
    let freq = HI_RESTFRQ * (1.0 - v_radio / c_kms);
    let expected = c_kms * (HI_RESTFRQ / freq - 1.0);
    assert!((v_opt - expected).abs() < 1e-6, "{} vs {}", v_opt, expected);

    // Reference pixel converts exactly.
    let v_ref = wcs.pixel_to_world([31.0, 31.0, 15.0]).unwrap()[2];
    let freq_ref = HI_RESTFRQ * (1.0 - 550.0 / c_kms);
    assert!((v_ref - c_kms * (HI_RESTFRQ / freq_ref - 1.0)).abs() < 1e-6);

    let back = wcs.world_to_pixel(wcs.pixel_to_world(pixel).unwrap()).unwrap();
    assert_pixel_close(back, pixel);
}

#[test]
fn test_convention_switch_back_is_linear_again() {
    let mut wcs = WcsTransform::from_header(&cube_header("TAN")).unwrap();
    let before = wcs.pixel_to_world([5.0, 5.0, 9.0]).unwrap();

    assert!(wcs.set_spectral_convention(SpectralConvention::OpticalVelocity));
    assert!(wcs.set_spectral_convention(SpectralConvention::RadioVelocity));
    assert_eq!(wcs.spectral_type(), Some("VRAD"));

    let after = wcs.pixel_to_world([5.0, 5.0, 9.0]).unwrap();
    assert!((before[2] - after[2]).abs() < 1e-6);
}

#[test]
fn test_optical_axis_to_radio_is_nonlinear() {
    let header = cube_header("TAN").with("CTYPE3", "VOPT");
    let mut wcs = WcsTransform::from_header(&header).unwrap();
    assert!(wcs.set_spectral_convention(SpectralConvention::RadioVelocity));
    assert_eq!(wcs.spectral_type(), Some("VRAD-W2F"));
}

#[test]
fn test_same_convention_is_noop() {
    let mut wcs = WcsTransform::from_header(&cube_header("TAN")).unwrap();
    let before: WcsDescriptor = wcs.descriptor().clone();
    assert!(wcs.set_spectral_convention(SpectralConvention::RadioVelocity));
    assert_eq!(wcs.descriptor(), &before);
}

#[test]
fn test_missing_rest_frequency_leaves_descriptor() {
    let mut header = HeaderMap::new();
    for (key, value) in cube_header("TAN").iter() {
        if key != "RESTFRQ" {
            header.insert(key, value);
        }
    }
    let mut wcs = WcsTransform::from_header(&header).unwrap();
    let before = wcs.descriptor().clone();
    assert!(!wcs.set_spectral_convention(SpectralConvention::OpticalVelocity));
    assert_eq!(wcs.descriptor(), &before);
    assert!(wcs.is_valid());
}

#[test]
fn test_frequency_axis_to_radio() {
    let header = cube_header("TAN")
        .with("CTYPE3", "FREQ")
        .with("CUNIT3", "Hz")
        .with("CRVAL3", HI_RESTFRQ)
        .with("CDELT3", -10000.0);
    let mut wcs = WcsTransform::from_header(&header).unwrap();
    let pixel = [0.0, 0.0, 20.0];
    let freq = wcs.pixel_to_world(pixel).unwrap()[2];

    assert!(wcs.set_spectral_convention(SpectralConvention::RadioVelocity));
    assert_eq!(wcs.spectral_type(), Some("VRAD"));
    assert_eq!(wcs.descriptor().axes()[2].cunit, "m/s");
    let v = wcs.pixel_to_world(pixel).unwrap()[2];
    let expected = SPEED_OF_LIGHT * (1.0 - freq / HI_RESTFRQ);
    assert!((v - expected).abs() < 1e-6);
}

// ============================================================================
// Display helpers
// ============================================================================

#[test]
fn test_velocity_display_carries_convention_tag() {
    let wcs = WcsTransform::from_header(&cube_header("TAN")).unwrap();
    let config = wcs.display_config();
    let out = wcs
        .format_world_value(12.5, AxisRole::Z, 2, NO_PREVIOUS, &config)
        .unwrap();
    assert_eq!(out.text, "12.50 km/s (VRAD)");
}

#[test]
fn test_tick_step_uses_axis_hint() {
    let wcs = WcsTransform::from_header(&cube_header("TAN")).unwrap();
    let config = wcs.display_config();
    let tick = wcs.tick_step(AxisRole::Y, 2.7, 10, &config).unwrap();
    assert!((tick.step - 0.25).abs() < 1e-12);
    assert_eq!(tick.point_count, 13);
}
