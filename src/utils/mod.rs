// ABOUTME: Utility module grouping shared helper functions
// ABOUTME: Physiological derivations and validation used across drivers and intelligence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Heart rate zones, sleep scoring and value validation
pub mod physiology;
