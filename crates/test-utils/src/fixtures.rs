//! Common header fixtures for astro-volume tests.
//!
//! This module provides pre-defined FITS-style headers that represent
//! common cube layouts.

use astro_common::HeaderMap;

/// HI 21 cm rest frequency in Hz.
pub const HI_REST_FREQUENCY: f64 = 1.420_405_752e9;

/// Linear 3-axis header: `crpix = (1, 1, 1)`, `crval = (10, 20, 0)`,
/// `cdelt = (1, 1, 1)`, identity PC.
///
/// World coordinates of voxel `(i, j, k)` are `(10 + i, 20 + j, k)`.
pub fn linear_header(dims: [usize; 3]) -> HeaderMap {
    HeaderMap::new()
        .with("NAXIS", 3)
        .with("NAXIS1", dims[0])
        .with("NAXIS2", dims[1])
        .with("NAXIS3", dims[2])
        .with("CRPIX1", 1.0)
        .with("CRPIX2", 1.0)
        .with("CRPIX3", 1.0)
        .with("CRVAL1", 10.0)
        .with("CRVAL2", 20.0)
        .with("CRVAL3", 0.0)
        .with("CDELT1", 1.0)
        .with("CDELT2", 1.0)
        .with("CDELT3", 1.0)
}

/// Spectral-line cube in `RA---TAN / DEC--TAN / VRAD` centred on
/// (180°, 30°) with 0.01° pixels and 5 km/s channels.
pub fn sky_cube_header(dims: [usize; 3]) -> HeaderMap {
    HeaderMap::new()
        .with("NAXIS", 3)
        .with("NAXIS1", dims[0])
        .with("NAXIS2", dims[1])
        .with("NAXIS3", dims[2])
        .with("CTYPE1", "RA---TAN")
        .with("CTYPE2", "DEC--TAN")
        .with("CTYPE3", "VRAD")
        .with("CUNIT1", "deg")
        .with("CUNIT2", "deg")
        .with("CUNIT3", "m/s")
        .with("CRPIX1", (dims[0] / 2 + 1) as f64)
        .with("CRPIX2", (dims[1] / 2 + 1) as f64)
        .with("CRPIX3", 1.0)
        .with("CRVAL1", 180.0)
        .with("CRVAL2", 30.0)
        .with("CRVAL3", 1.0e6)
        .with("CDELT1", -0.01)
        .with("CDELT2", 0.01)
        .with("CDELT3", 5000.0)
        .with("RESTFRQ", HI_REST_FREQUENCY)
        .with("SPECSYS", "BARYCENT")
        .with("BUNIT", "JY/BEAM")
}

/// Header whose PC matrix is singular.
pub fn singular_header(dims: [usize; 3]) -> HeaderMap {
    linear_header(dims)
        .with("PC1_1", 1.0)
        .with("PC1_2", 1.0)
        .with("PC2_1", 1.0)
        .with("PC2_2", 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_header_values() {
        let header = linear_header([8, 8, 4]);
        assert_eq!(header.get_f64("CRVAL2").unwrap(), Some(20.0));
        assert_eq!(header.get_i64("NAXIS3").unwrap(), Some(4));
    }

    #[test]
    fn test_sky_header_reference_pixel_is_centre() {
        let header = sky_cube_header([21, 21, 10]);
        assert_eq!(header.get_f64("CRPIX1").unwrap(), Some(11.0));
        assert_eq!(header.get_str("CTYPE3"), Some("VRAD"));
    }
}
