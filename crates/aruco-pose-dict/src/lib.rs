//! ArUco marker dictionaries and code matching.
//!
//! This crate provides:
//! - built-in dictionaries embedded into the binary,
//! - matching observed marker codes against a dictionary over all four
//!   in-plane rotations, with ambiguity rejection.
//!
//! It does **not** perform any image work; the detector crate samples bit
//! grids and hands packed codes to the [`Matcher`].

pub mod builtins;
mod dictionary;
mod matcher;

pub use dictionary::Dictionary;
pub use matcher::{rotate_code_u64, Match, Matcher};
