// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Utility modules

pub mod colors;

pub use colors::*;
