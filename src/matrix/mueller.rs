// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
4x4 complex (Mueller) matrices acting on visibility 4-vectors.

Elements are stored row-major. The 4-vector a Mueller matrix acts on is in
matrix order, i.e. (XX, XY, YX, YY).
 */

use marlu::{c64, Jones};

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Mueller([c64; 16]);

const MUELLER_ZERO: Mueller = Mueller([c64::new(0.0, 0.0); 16]);

impl Mueller {
    pub fn identity() -> Self {
        Self::diagonal([c64::new(1.0, 0.0); 4])
    }

    pub fn zero() -> Self {
        MUELLER_ZERO
    }

    pub fn nan() -> Self {
        Mueller([c64::new(f64::NAN, f64::NAN); 16])
    }

    pub fn scalar(s: c64) -> Self {
        Self::diagonal([s; 4])
    }

    pub fn diagonal(d: [c64; 4]) -> Self {
        let mut m = MUELLER_ZERO;
        for (i, d) in d.into_iter().enumerate() {
            m[i * 5] = d;
        }
        m
    }

    /// The diagonal elements.
    pub fn diag(&self) -> [c64; 4] {
        [self[0], self[5], self[10], self[15]]
    }

    /// The direct (outer) product J1 (x) conj(J2). Applying the result to a
    /// visibility 4-vector is the same as J1 . V . J2^H on the 2x2 form of the
    /// visibilities.
    ///
    /// # Examples
    ///
    /// ```
    /// # use approx::assert_abs_diff_eq;
    /// # use marlu::{c64, Jones};
    /// # use viscal::Mueller;
    /// let j1 = Jones::from([
    ///     c64::new(1.0, 2.0),
    ///     c64::new(3.0, 4.0),
    ///     c64::new(5.0, 6.0),
    ///     c64::new(7.0, 8.0),
    /// ]);
    /// let j2 = Jones::from([
    ///     c64::new(-1.0, 0.5),
    ///     c64::new(0.0, 1.0),
    ///     c64::new(2.0, 0.0),
    ///     c64::new(0.5, -0.5),
    /// ]);
    /// let v = Jones::from([
    ///     c64::new(1.0, 0.0),
    ///     c64::new(0.1, 0.2),
    ///     c64::new(0.3, -0.1),
    ///     c64::new(0.9, 0.0),
    /// ]);
    /// let expected = j1 * v * j2.h();
    /// let result = Mueller::from_jones_pair(&j1, &j2).apply([v[0], v[1], v[2], v[3]]);
    /// let expected = [expected[0], expected[1], expected[2], expected[3]];
    /// for (r, e) in result.into_iter().zip(expected) {
    ///     assert_abs_diff_eq!(r, e, epsilon = 1e-10);
    /// }
    /// ```
    pub fn from_jones_pair(j1: &Jones<f64>, j2: &Jones<f64>) -> Self {
        let mut m = MUELLER_ZERO;
        // Row (i, k) and column (j, l) of the product hold J1_ij conj(J2_kl).
        for i in 0..2 {
            for k in 0..2 {
                let row = 2 * i + k;
                for j in 0..2 {
                    for l in 0..2 {
                        let col = 2 * j + l;
                        m[row * 4 + col] = j1[2 * i + j] * j2[2 * k + l].conj();
                    }
                }
            }
        }
        m
    }

    /// Get the inverse of the Mueller matrix. If the matrix is singular, all
    /// elements of the result are NaN.
    pub fn inv(&self) -> Self {
        let mut a = self.0;
        let mut inv = Self::identity().0;

        let max_norm = a.iter().fold(0.0_f64, |acc, e| acc.max(e.norm()));
        if max_norm == 0.0 || !max_norm.is_finite() {
            return Self::nan();
        }
        let tiny = max_norm * 1e-14;

        for col in 0..4 {
            let mut pivot = col;
            for row in col + 1..4 {
                if a[row * 4 + col].norm() > a[pivot * 4 + col].norm() {
                    pivot = row;
                }
            }
            if a[pivot * 4 + col].norm() <= tiny {
                return Self::nan();
            }
            if pivot != col {
                for k in 0..4 {
                    a.swap(pivot * 4 + k, col * 4 + k);
                    inv.swap(pivot * 4 + k, col * 4 + k);
                }
            }

            let p = a[col * 4 + col];
            for k in 0..4 {
                a[col * 4 + k] /= p;
                inv[col * 4 + k] /= p;
            }
            for row in 0..4 {
                if row == col {
                    continue;
                }
                let factor = a[row * 4 + col];
                for k in 0..4 {
                    let (ak, ik) = (a[col * 4 + k], inv[col * 4 + k]);
                    a[row * 4 + k] -= factor * ak;
                    inv[row * 4 + k] -= factor * ik;
                }
            }
        }

        Mueller(inv)
    }

    pub fn any_nan(&self) -> bool {
        self.iter().any(|e| e.is_nan())
    }

    /// Multiply a visibility 4-vector (in matrix order).
    #[inline]
    pub fn apply(&self, v: [c64; 4]) -> [c64; 4] {
        let m = &self.0;
        let mut out = [c64::new(0.0, 0.0); 4];
        for (i, out) in out.iter_mut().enumerate() {
            *out = m[i * 4] * v[0] + m[i * 4 + 1] * v[1] + m[i * 4 + 2] * v[2] + m[i * 4 + 3] * v[3];
        }
        out
    }
}

impl std::ops::Deref for Mueller {
    type Target = [c64; 16];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Mueller {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<[c64; 16]> for Mueller {
    fn from(arr: [c64; 16]) -> Self {
        Self(arr)
    }
}

impl std::ops::Mul<Mueller> for Mueller {
    type Output = Self;

    fn mul(self, rhs: Mueller) -> Self {
        let mut c = MUELLER_ZERO;
        for i in 0..4 {
            for j in 0..4 {
                c[i * 4 + j] = (0..4).map(|k| self[i * 4 + k] * rhs[k * 4 + j]).sum();
            }
        }
        c
    }
}

#[cfg(test)]
impl approx::AbsDiffEq for Mueller {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.iter()
            .zip(other.iter())
            .all(|(a, b)| (a - b).norm() <= epsilon)
    }
}
