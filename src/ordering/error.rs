// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use hifitime::Epoch;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderingError {
    #[error("A {table} record in context {context} already starts at {start} but carries different values")]
    DuplicateKey {
        table: &'static str,
        context: String,
        start: Epoch,
    },
}
