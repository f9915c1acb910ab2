// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Progressive row order.
//!
//! Jobs are numbered `0..virtual_rows`, where `virtual_rows` is the
//! screen height rounded up to a power of two.  Job `j` renders the
//! row whose index is `j` with its bits reversed, so any prefix of the
//! job sequence whose length is a power of two covers the screen at an
//! even stride: first row 0, then the middle, then the quarters, and
//! so on.  Mapped rows at or past the real height are padding and
//! render nothing.

/// Job-to-row mapping for one screen height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowSchedule {
    rows: usize,
    virtual_rows: usize,
    row_bits: u32,
}

impl RowSchedule {
    /// Schedule for a screen `rows` tall.
    pub fn new(rows: usize) -> Self {
        let virtual_rows = rows.max(1).next_power_of_two();
        RowSchedule {
            rows,
            virtual_rows,
            row_bits: virtual_rows.trailing_zeros(),
        }
    }

    /// The real screen height.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Jobs published per render cycle.
    pub fn virtual_rows(&self) -> usize {
        self.virtual_rows
    }

    /// `log2(virtual_rows)`.
    pub fn row_bits(&self) -> u32 {
        self.row_bits
    }

    /// The row a job renders.  May be a padding row.
    pub fn map(&self, job: usize) -> usize {
        if self.row_bits == 0 {
            return 0;
        }
        (job % self.virtual_rows).reverse_bits() >> (usize::BITS - self.row_bits)
    }

    /// True for rows that exist on screen.
    pub fn is_visible(&self, row: usize) -> bool {
        row < self.rows
    }
}
