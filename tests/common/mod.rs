//! Shared helpers for the ascope integration tests
//!
//! - [`builders`]: instrument frames and byte streams
//! - [`mock_helpers`]: a renderer that records every snapshot

#![allow(dead_code)] // Each test binary uses a different subset

pub mod builders;
pub mod mock_helpers;

/// Assert two voltages agree within `epsilon`
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "expected {b} V, got {a} V (tolerance {epsilon})"
    );
}
