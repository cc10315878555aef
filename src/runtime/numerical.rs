// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Five-point central differences.

use super::tape::Tape;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumDiffError {
    #[error("argument position {position} is out of range for {arity} argument(s)")]
    PositionOutOfRange { position: usize, arity: usize },
    #[error("{slots} output slot(s) were provided for {args} argument(s)")]
    SlotCountMismatch { slots: usize, args: usize },
}

/// Step for perturbing `x`, scaled to its magnitude.
pub fn step_size(x: f64) -> f64 {
    f64::EPSILON.sqrt() * x.abs().max(1.0)
}

/// Five-point estimate of `df/dx_position` and the gap to the three-point
/// estimate, used as the error bound.
fn partial<F>(f: &F, args: &[f64], position: usize) -> (f64, f64)
where
    F: Fn(&[f64]) -> f64,
{
    let h = step_size(args[position]);
    let mut probe = args.to_vec();
    let mut at = |offset: f64| {
        probe[position] = args[position] + offset * h;
        f(&probe)
    };
    let (p2, p1, m1, m2) = (at(2.0), at(1.0), at(-1.0), at(-2.0));
    let five = (-p2 + 8.0 * p1 - 8.0 * m1 + m2) / (12.0 * h);
    let three = (p1 - m1) / (2.0 * h);
    (five, (five - three).abs())
}

/// Derivative of `f` with respect to argument `position` at `args`.
pub fn forward_central_difference<F>(
    f: F,
    args: &[f64],
    position: usize,
    print_error: bool,
) -> Result<f64, NumDiffError>
where
    F: Fn(&[f64]) -> f64,
{
    if position >= args.len() {
        return Err(NumDiffError::PositionOutOfRange {
            position,
            arity: args.len(),
        });
    }
    let (value, error) = partial(&f, args, position);
    if print_error {
        log::info!("numerical derivative w.r.t. argument {position}: {value} (error estimate {error:e})");
    }
    Ok(value)
}

/// Write every partial derivative of `f` at `args` into the slots of
/// `grads`, which are read in push order.
pub fn central_difference<F>(
    f: F,
    grads: &mut Tape<&mut f64>,
    print_error: bool,
    args: &[f64],
) -> Result<(), NumDiffError>
where
    F: Fn(&[f64]) -> f64,
{
    if grads.len() != args.len() {
        return Err(NumDiffError::SlotCountMismatch {
            slots: grads.len(),
            args: args.len(),
        });
    }
    let mut total_error = 0.0;
    for (position, slot) in grads.iter_mut().enumerate() {
        let (value, error) = partial(&f, args, position);
        **slot = value;
        total_error += error;
    }
    if print_error {
        log::info!("numerical gradient over {} argument(s): error estimate {total_error:e}", args.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_argument_matches_analytic_derivative() {
        let d = forward_central_difference(|a| a[0].sin() * a[1], &[0.5, 2.0], 0, false)
            .expect("position in range");
        assert!((d - 0.5f64.cos() * 2.0).abs() < 1e-6);
    }

    #[test]
    fn position_out_of_range() {
        assert_eq!(
            forward_central_difference(|a| a[0], &[1.0], 1, true),
            Err(NumDiffError::PositionOutOfRange {
                position: 1,
                arity: 1
            })
        );
    }

    #[test]
    fn multi_argument_fills_slots_in_push_order() {
        let (mut dx, mut dy) = (0.0, 0.0);
        let mut grads = Tape::new();
        grads.push(&mut dx);
        grads.push(&mut dy);
        central_difference(|a| a[0] * a[0] * a[1], &mut grads, false, &[3.0, 4.0])
            .expect("one slot per argument");
        drop(grads);
        assert!((dx - 24.0).abs() < 1e-5);
        assert!((dy - 9.0).abs() < 1e-5);
    }

    #[test]
    fn slot_count_must_match() {
        let mut only = 0.0;
        let mut grads = Tape::new();
        grads.push(&mut only);
        let err = central_difference(|a| a[0] + a[1], &mut grads, false, &[1.0, 2.0]);
        assert_eq!(err, Err(NumDiffError::SlotCountMismatch { slots: 1, args: 2 }));
    }
}
