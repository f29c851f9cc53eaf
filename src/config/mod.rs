// ABOUTME: Configuration module for the wearables layer
// ABOUTME: Environment-driven settings loaded once at startup and passed through the context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Environment variable loading and typed defaults
pub mod environment;

pub use environment::{
    Environment, HttpClientConfig, RealtimeConfig, SyncSettings, WearablesConfig, WhoopSettings,
};
