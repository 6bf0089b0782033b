//! Post-multiply epilogue: what happens to each finished tile.
//!
//! A multiply call takes a list of [`Callback`]s. For every tile the list runs
//! in order over a running value that starts as the eight raw `i32` totals
//! (converted to `f32`). `Unquantize` and `AddBias` transform the running
//! value, `Write` stores it, and the combined variants are shorthands:
//!
//! ```text
//! [UnquantizeAndWrite(s, out)]                 == [Unquantize(s), Write(out)]
//! [UnquantizeAndAddBiasAndWrite(s, bias, out)] == [Unquantize(s), AddBias(bias), Write(out)]
//! ```
//!
//! Each tile writes its own 8 output elements, so no two tiles touch the same
//! memory.

/// Where a tile sits in the output, plus the shape of the whole multiply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Row of A (and of C).
    pub row: usize,
    /// First of the eight columns of B (and of C) in this tile.
    pub col: usize,
    pub a_rows: usize,
    pub width: usize,
    pub b_cols: usize,
}

impl Tile {
    /// Offset of the tile's first element in a row-major `a_rows × b_cols` C.
    pub fn output_offset(&self) -> usize {
        self.row * self.b_cols + self.col
    }
}

/// One post-processing step applied to every tile.
#[derive(Debug)]
pub enum Callback<'a> {
    /// Does nothing.
    Dummy,
    /// Multiply by `unquant_mult` to go back to float scale.
    Unquantize { unquant_mult: f32 },
    /// Store the running value into row-major `output`.
    Write { output: &'a mut [f32] },
    /// Add `bias[col]` to each column.
    AddBias { bias: &'a [f32] },
    UnquantizeAndWrite {
        unquant_mult: f32,
        output: &'a mut [f32],
    },
    UnquantizeAndAddBiasAndWrite {
        unquant_mult: f32,
        bias: &'a [f32],
        output: &'a mut [f32],
    },
}

impl<'a> Callback<'a> {
    pub fn unquantize(unquant_mult: f32) -> Self {
        Callback::Unquantize { unquant_mult }
    }

    pub fn write(output: &'a mut [f32]) -> Self {
        Callback::Write { output }
    }

    pub fn add_bias(bias: &'a [f32]) -> Self {
        Callback::AddBias { bias }
    }

    pub fn unquantize_and_write(unquant_mult: f32, output: &'a mut [f32]) -> Self {
        Callback::UnquantizeAndWrite {
            unquant_mult,
            output,
        }
    }

    pub fn unquantize_and_add_bias_and_write(
        unquant_mult: f32,
        bias: &'a [f32],
        output: &'a mut [f32],
    ) -> Self {
        Callback::UnquantizeAndAddBiasAndWrite {
            unquant_mult,
            bias,
            output,
        }
    }

    fn apply(&mut self, values: &mut [f32; 8], tile: Tile) {
        match self {
            Callback::Dummy => {}
            Callback::Unquantize { unquant_mult } => unquantize(values, *unquant_mult),
            Callback::Write { output } => write(output, values, tile),
            Callback::AddBias { bias } => add_bias(values, bias, tile),
            Callback::UnquantizeAndWrite {
                unquant_mult,
                output,
            } => {
                unquantize(values, *unquant_mult);
                write(output, values, tile);
            }
            Callback::UnquantizeAndAddBiasAndWrite {
                unquant_mult,
                bias,
                output,
            } => {
                unquantize(values, *unquant_mult);
                add_bias(values, bias, tile);
                write(output, values, tile);
            }
        }
    }

    /// Panics if a buffer is too small for an `a_rows × b_cols` multiply.
    fn assert_fits(&self, a_rows: usize, b_cols: usize) {
        let (output, bias) = match self {
            Callback::Dummy | Callback::Unquantize { .. } => (None, None),
            Callback::Write { output } | Callback::UnquantizeAndWrite { output, .. } => {
                (Some(output.len()), None)
            }
            Callback::AddBias { bias } => (None, Some(bias.len())),
            Callback::UnquantizeAndAddBiasAndWrite { bias, output, .. } => {
                (Some(output.len()), Some(bias.len()))
            }
        };
        if let Some(len) = output {
            assert!(
                len >= a_rows * b_cols,
                "C: expected {}x{}={} elements, got {}",
                a_rows,
                b_cols,
                a_rows * b_cols,
                len
            );
        }
        if let Some(len) = bias {
            assert!(len >= b_cols, "bias: expected {} elements, got {}", b_cols, len);
        }
    }
}

/// Checks every callback's buffers once, before any tile is computed.
pub fn assert_callbacks(callbacks: &[Callback<'_>], a_rows: usize, b_cols: usize) {
    for callback in callbacks {
        callback.assert_fits(a_rows, b_cols);
    }
}

/// Run `callbacks` in order over one tile's totals.
pub fn run_callbacks(callbacks: &mut [Callback<'_>], totals: &[i32; 8], tile: Tile) {
    let mut values = totals.map(|total| total as f32);
    for callback in callbacks.iter_mut() {
        callback.apply(&mut values, tile);
    }
}

fn unquantize(values: &mut [f32; 8], unquant_mult: f32) {
    for v in values.iter_mut() {
        *v *= unquant_mult;
    }
}

fn add_bias(values: &mut [f32; 8], bias: &[f32], tile: Tile) {
    for (v, b) in values.iter_mut().zip(&bias[tile.col..tile.col + 8]) {
        *v += b;
    }
}

fn write(output: &mut [f32], values: &[f32; 8], tile: Tile) {
    let offset = tile.output_offset();
    output[offset..offset + 8].copy_from_slice(values);
}
