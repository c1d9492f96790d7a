// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;
use num_traits::Zero;

use super::{Sample, Stripe};

const HANNING: [f64; 3] = [0.25, 0.5, 0.25];

/// Hanning smooth a stripe with the (0.25, 0.5, 0.25) kernel. The first and
/// last channels don't have full support, so they keep their values and are
/// flagged. Any other channel is flagged if any of its three inputs is flagged.
pub fn hanning_smooth<T: Sample>(stripe: &Stripe<T>) -> Stripe<T> {
    let n = stripe.len();
    let mut out = stripe.clone();
    if n == 0 {
        return out;
    }
    out.flags[0] = true;
    out.flags[n - 1] = true;

    for i in 1..n.saturating_sub(1) {
        let mut acc = T::Acc::zero();
        let mut weight = 0.0;
        for ((&d, &w), k) in stripe
            .data
            .slice(s![i - 1..i + 2])
            .iter()
            .zip(stripe.weights.slice(s![i - 1..i + 2]).iter())
            .zip(HANNING)
        {
            acc += d.promote() * k;
            weight += f64::from(w) * k;
        }
        out.data[i] = T::demote(acc);
        out.weights[i] = weight as f32;
        out.flags[i] = stripe.flags.slice(s![i - 1..i + 2]).iter().any(|&f| f);
    }

    out
}
