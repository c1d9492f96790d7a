// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibration matrices.
//!
//! Each [`CalType`] fixes a handful of properties (see [`CalTypeProperties`]):
//! how many parameters each antenna (Jones) or baseline (Mueller) has, whether
//! the matrix elements are simply the parameters ("trivial" types), and
//! whether parameters vary with frequency or matrices vary with time. The free
//! functions here turn parameters into matrices and matrices into corrected or
//! corrupted visibilities.

mod error;
mod mueller;

pub use error::MatrixError;
pub use mueller::Mueller;

use marlu::{c64, Jones};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{constants::FRAC_PI_2, math::cexp, vis::PolBasis};

/// The matrix-order positions of a full set of correlations.
pub const MATRIX_ORDER: [usize; 4] = [0, 1, 2, 3];

/// The supported calibration types.
#[derive(
    Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum CalType {
    /// Polarisation-independent (scalar) complex gain.
    T,

    /// Per-polarisation complex gain.
    G,

    /// Per-polarisation, per-channel complex gain (bandpass).
    B,

    /// General 2x2 Jones matrix; every element is a parameter.
    J,

    /// Polarisation leakage ("D-terms").
    D,

    /// Parallactic-angle rotation. Parameters are derived from antenna
    /// geometry, not solved for.
    P,

    /// Atmospheric opacity. The parameter is the zenith opacity.
    TOpac,

    /// Baseline-based diagonal Mueller gain.
    M,

    /// Baseline-based, per-channel diagonal Mueller gain.
    Mf,
}

/// The shape of the non-zero part of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    Scalar,
    Diagonal,
    General,
}

/// What each calibration element corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// One Jones matrix per antenna; a baseline's calibration needs the
    /// matrices of both of its antennas.
    Antenna,

    /// One Mueller matrix per baseline.
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalTypeProperties {
    /// The number of parameters per element.
    pub n_par: usize,

    /// Are matrix elements simply the parameters?
    pub trivial: bool,

    pub matrix_kind: MatrixKind,

    pub element: ElementKind,

    /// Do parameters vary with frequency (one set per channel)?
    pub freq_dep_par: bool,

    /// Do matrices change with time even when parameters don't?
    pub time_dep_mat: bool,

    /// Are parameters calculated from antenna geometry rather than supplied?
    pub par_from_geometry: bool,
}

impl CalType {
    pub fn properties(self) -> CalTypeProperties {
        use ElementKind::*;
        use MatrixKind::*;

        #[rustfmt::skip]
        let (n_par, trivial, matrix_kind, element, freq_dep_par, time_dep_mat, par_from_geometry) = match self {
            CalType::T =>     (1, true,  Scalar,   Antenna,  false, false, false),
            CalType::G =>     (2, true,  Diagonal, Antenna,  false, false, false),
            CalType::B =>     (2, true,  Diagonal, Antenna,  true,  false, false),
            CalType::J =>     (4, true,  General,  Antenna,  false, false, false),
            CalType::D =>     (2, false, General,  Antenna,  false, false, false),
            CalType::P =>     (1, false, General,  Antenna,  false, true,  true),
            CalType::TOpac => (1, false, Scalar,   Antenna,  false, true,  false),
            CalType::M =>     (4, true,  Diagonal, Baseline, false, false, false),
            CalType::Mf =>    (4, true,  Diagonal, Baseline, true,  false, false),
        };

        CalTypeProperties {
            n_par,
            trivial,
            matrix_kind,
            element,
            freq_dep_par,
            time_dep_mat,
            par_from_geometry,
        }
    }
}

/// Per-antenna geometry needed by the non-trivial calibration types.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AntennaGeometry {
    /// \[radians\]
    pub parallactic_angle: f64,

    /// \[radians\]
    pub elevation: f64,
}

fn check_par_count(cal_type: CalType, params: usize, params_ok: usize) -> Result<(), MatrixError> {
    let expected = cal_type.properties().n_par;
    if params != expected || params_ok != expected {
        return Err(MatrixError::ParameterCount {
            cal_type,
            expected,
            got: params.min(params_ok),
        });
    }
    Ok(())
}

/// Compose an antenna's Jones matrix from its parameters, also returning the
/// validity of each of the 4 elements. Elements that don't depend on any
/// parameter are always ok.
///
/// `geometry` and `basis` are only used by the non-trivial types that need
/// them ([`CalType::P`] and [`CalType::TOpac`]).
pub fn compose_jones(
    cal_type: CalType,
    params: ArrayView1<c64>,
    params_ok: ArrayView1<bool>,
    geometry: &AntennaGeometry,
    basis: PolBasis,
) -> Result<(Jones<f64>, [bool; 4]), MatrixError> {
    let props = cal_type.properties();
    if props.element != ElementKind::Antenna {
        return Err(MatrixError::WrongElementKind {
            cal_type,
            kind: "Mueller",
            requested: "Jones",
        });
    }
    if !props.par_from_geometry {
        check_par_count(cal_type, params.len(), params_ok.len())?;
    }

    let zero = c64::new(0.0, 0.0);
    let one = c64::new(1.0, 0.0);
    let composed = match cal_type {
        // Trivial types; the elements are the parameters.
        CalType::T => (
            Jones::from([params[0], zero, zero, params[0]]),
            [params_ok[0], true, true, params_ok[0]],
        ),
        CalType::G | CalType::B => (
            Jones::from([params[0], zero, zero, params[1]]),
            [params_ok[0], true, true, params_ok[1]],
        ),
        CalType::J => (
            Jones::from([params[0], params[1], params[2], params[3]]),
            [params_ok[0], params_ok[1], params_ok[2], params_ok[3]],
        ),

        CalType::D => (
            Jones::from([one, params[0], params[1], one]),
            [true, params_ok[0], params_ok[1], true],
        ),

        CalType::P => {
            let p = cexp(geometry.parallactic_angle);
            let jones = match basis {
                PolBasis::Circular => Jones::from([p.conj(), zero, zero, p]),
                PolBasis::Linear => {
                    let (s, c) = p.arg().sin_cos();
                    Jones::from([
                        c64::new(c, 0.0),
                        c64::new(s, 0.0),
                        c64::new(-s, 0.0),
                        c64::new(c, 0.0),
                    ])
                }
            };
            (jones, [true; 4])
        }

        CalType::TOpac => {
            let zenith_angle = FRAC_PI_2 - geometry.elevation;
            let t = if params_ok[0] && zenith_angle < FRAC_PI_2 {
                (-params[0].re / zenith_angle.cos()).exp().sqrt()
            } else {
                1.0
            };
            let t = c64::new(t, 0.0);
            (
                Jones::from([t, zero, zero, t]),
                [params_ok[0], true, true, params_ok[0]],
            )
        }

        CalType::M | CalType::Mf => unreachable!("checked above"),
    };
    Ok(composed)
}

/// Compose a baseline's Mueller matrix from its parameters, also returning the
/// validity of each of the 16 elements. Parameters that are exactly zero are
/// treated as unset and become 1.
pub fn compose_mueller(
    cal_type: CalType,
    params: ArrayView1<c64>,
    params_ok: ArrayView1<bool>,
) -> Result<(Mueller, [bool; 16]), MatrixError> {
    let props = cal_type.properties();
    if props.element != ElementKind::Baseline {
        return Err(MatrixError::WrongElementKind {
            cal_type,
            kind: "Jones",
            requested: "Mueller",
        });
    }
    check_par_count(cal_type, params.len(), params_ok.len())?;

    let unset_to_one = |p: c64| if p == c64::new(0.0, 0.0) { c64::new(1.0, 0.0) } else { p };
    let mut ok = [true; 16];
    let mueller = match props.matrix_kind {
        MatrixKind::Scalar => {
            for i in 0..4 {
                ok[i * 5] = params_ok[0];
            }
            Mueller::scalar(unset_to_one(params[0]))
        }
        MatrixKind::Diagonal | MatrixKind::General => {
            let mut d = [c64::new(1.0, 0.0); 4];
            for (i, d) in d.iter_mut().enumerate() {
                *d = unset_to_one(params[i]);
                ok[i * 5] = params_ok[i];
            }
            Mueller::diagonal(d)
        }
    };
    Ok((mueller, ok))
}

/// If any element of the Jones matrix isn't ok, replace the whole matrix with
/// the identity so that applying it can't corrupt anything. Returns whether
/// the matrix is ok.
pub fn set_jones_by_ok(jones: &mut Jones<f64>, ok: &[bool; 4]) -> bool {
    if ok.iter().all(|&ok| ok) && !jones.any_nan() {
        true
    } else {
        *jones = Jones::identity();
        false
    }
}

/// The Mueller version of [`set_jones_by_ok`].
pub fn set_mueller_by_ok(mueller: &mut Mueller, ok: &[bool; 16]) -> bool {
    if ok.iter().all(|&ok| ok) && !mueller.any_nan() {
        true
    } else {
        *mueller = Mueller::identity();
        false
    }
}

/// Invert a Jones matrix. The result isn't ok if the input wasn't, or if the
/// matrix is singular; in both cases the identity is returned.
pub fn invert_jones(jones: &Jones<f64>, ok: bool) -> (Jones<f64>, bool) {
    let mut inv = if ok { jones.inv() } else { Jones::nan() };
    let ok = set_jones_by_ok(&mut inv, &[ok; 4]);
    (inv, ok)
}

/// The Mueller version of [`invert_jones`].
pub fn invert_mueller(mueller: &Mueller, ok: bool) -> (Mueller, bool) {
    let mut inv = if ok { mueller.inv() } else { Mueller::nan() };
    let ok = set_mueller_by_ok(&mut inv, &[ok; 16]);
    (inv, ok)
}

/// Apply J1 . V . J2^H to visibilities. `positions` are the matrix-order
/// positions (XX = 0, XY = 1, YX = 2, YY = 3) of the elements of `vis`. With
/// all 4 correlations in matrix order, this is the full product; otherwise only
/// the diagonal elements of the Jones matrices are used.
#[inline]
pub fn apply_jones(j1: &Jones<f64>, vis: &mut [c64], positions: &[usize], j2: &Jones<f64>) {
    debug_assert_eq!(vis.len(), positions.len());
    if positions == MATRIX_ORDER {
        let v = Jones::from([vis[0], vis[1], vis[2], vis[3]]);
        let out = *j1 * v * j2.h();
        vis.copy_from_slice(&[out[0], out[1], out[2], out[3]]);
    } else {
        for (v, &pos) in vis.iter_mut().zip(positions) {
            let (p, q) = (pos / 2, pos % 2);
            *v = j1[3 * p] * *v * j2[3 * q].conj();
        }
    }
}

/// The Mueller version of [`apply_jones`]. With fewer than 4 correlations,
/// only the diagonal elements of the matrix are used.
#[inline]
pub fn apply_mueller(mueller: &Mueller, vis: &mut [c64], positions: &[usize]) {
    debug_assert_eq!(vis.len(), positions.len());
    if positions == MATRIX_ORDER {
        let out = mueller.apply([vis[0], vis[1], vis[2], vis[3]]);
        vis.copy_from_slice(&out);
    } else {
        for (v, &pos) in vis.iter_mut().zip(positions) {
            *v *= mueller[pos * 5];
        }
    }
}

/// The factors a Jones matrix scales data weights by, one per polarisation
/// (|J_xx|^2, |J_yy|^2).
pub fn jones_weight_scale(jones: &Jones<f64>) -> [f64; 2] {
    [jones[0].norm_sqr(), jones[3].norm_sqr()]
}

/// The factors a Mueller matrix scales data weights by, one per correlation in
/// matrix order (|M_ii|^2).
pub fn mueller_weight_scale(mueller: &Mueller) -> [f64; 4] {
    mueller.diag().map(|d| d.norm_sqr())
}
