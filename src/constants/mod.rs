// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Vendor endpoints, sync timing, thresholds and aggregation priorities
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single large
//! block. Anything a deployment may want to tune is also exposed through
//! [`crate::config::environment::WearablesConfig`]; these are the defaults.

/// Vendor identifiers
pub mod vendors {
    /// On-device health store
    pub const HEALTH_STORE: &str = "apple_health";
    /// WHOOP cloud API
    pub const WHOOP: &str = "whoop";
    /// Garmin Connect
    pub const GARMIN: &str = "garmin";
    /// Fitbit Web API
    pub const FITBIT: &str = "fitbit";
    /// Google Fit
    pub const GOOGLE_FIT: &str = "google_fit";
}

/// OAuth endpoints and scopes
pub mod oauth {
    /// WHOOP authorization endpoint
    pub const WHOOP_AUTH_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/auth";
    /// WHOOP token endpoint
    pub const WHOOP_TOKEN_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/token";
    /// WHOOP revoke endpoint
    pub const WHOOP_REVOKE_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/revoke";
    /// WHOOP developer API base
    pub const WHOOP_API_BASE_URL: &str = "https://api.prod.whoop.com/developer/v1";
    /// Scopes requested from WHOOP (space separated)
    pub const WHOOP_DEFAULT_SCOPES: &str =
        "offline read:recovery read:cycles read:sleep read:workout read:profile read:body_measurement";
    /// Default redirect URI for local development
    pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8081/oauth/callback/whoop";
    /// Refresh tokens this many seconds before they expire
    pub const TOKEN_REFRESH_THRESHOLD_SECS: i64 = 60;
}

/// HTTP client settings
pub mod http {
    /// Request timeout
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Connect timeout
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
    /// Maximum attempts for rate limited requests
    pub const RATE_LIMIT_MAX_ATTEMPTS: u32 = 3;
    /// Base delay for exponential backoff
    pub const RATE_LIMIT_BASE_DELAY_MS: u64 = 500;
    /// Upper bound on random jitter added to each backoff
    pub const RATE_LIMIT_MAX_JITTER_MS: u64 = 250;
    /// Retry-After fallback when the vendor does not send one
    pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
    /// Upper bound on pages followed for one paginated collection
    pub const MAX_PAGES: usize = 20;
    /// Page size requested from paginated vendor endpoints
    pub const PAGE_LIMIT: u32 = 25;
}

/// Circuit breaker defaults
pub mod circuit_breaker {
    /// Consecutive failures before the circuit opens
    pub const FAILURE_THRESHOLD: u32 = 5;
    /// Seconds the circuit stays open before a probe is allowed
    pub const COOLDOWN_SECS: u64 = 30;
    /// Successful probes required to close the circuit again
    pub const SUCCESS_THRESHOLD: u32 = 2;
}

/// Sync orchestration timing
pub mod sync {
    /// Lookback window for a device that has never synced
    pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;
    /// Unified snapshot cache TTL
    pub const SNAPSHOT_TTL_SECS: u64 = 300;
    /// Bundles older than this are not aggregated
    pub const MAX_BUNDLE_AGE_DAYS: i64 = 7;
    /// Interval of the auto-sync scheduler tick
    pub const AUTO_SYNC_TICK_SECS: u64 = 60;
    /// Realtime frequency tier
    pub const REALTIME_TIER_SECS: i64 = 15 * 60;
    /// Hourly frequency tier
    pub const HOURLY_TIER_SECS: i64 = 60 * 60;
    /// Daily frequency tier
    pub const DAILY_TIER_SECS: i64 = 24 * 60 * 60;
    /// Relative difference below which two values are not a conflict
    pub const CONFLICT_TOLERANCE: f64 = 0.05;
}

/// Real-time fan-out
pub mod realtime {
    /// Health store poll interval
    pub const POLL_INTERVAL_SECS: u64 = 5;
    /// Health store poll interval during a workout session
    pub const WORKOUT_POLL_INTERVAL_SECS: u64 = 1;
    /// Per-subscriber channel capacity
    pub const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;
}

/// Physiological bounds used for validation and derivation
pub mod physiology {
    /// Lowest plausible heart rate
    pub const MIN_HEART_RATE_BPM: f64 = 25.0;
    /// Highest plausible heart rate
    pub const MAX_HEART_RATE_BPM: f64 = 250.0;
    /// Lowest plausible HRV
    pub const MIN_HRV_MS: f64 = 1.0;
    /// Highest plausible HRV
    pub const MAX_HRV_MS: f64 = 300.0;
    /// Heart rate zone lower bounds as a fraction of max HR
    pub const HEART_RATE_ZONE_FRACTIONS: [f64; 5] = [0.5, 0.6, 0.7, 0.8, 0.9];
    /// Gap that separates two nights of sleep samples
    pub const NIGHT_GAP_HOURS: i64 = 4;
    /// Lower edge of the optimal sleep duration band
    pub const OPTIMAL_SLEEP_MIN_HOURS: f64 = 7.0;
    /// Upper edge of the optimal sleep duration band
    pub const OPTIMAL_SLEEP_MAX_HOURS: f64 = 9.0;
    /// Points available for sleep duration
    pub const SLEEP_DURATION_POINTS: f64 = 50.0;
    /// Points available for sleep efficiency
    pub const SLEEP_EFFICIENCY_POINTS: f64 = 50.0;
    /// Points lost per hour slept past the optimal band
    pub const OVERSLEEP_PENALTY_PER_HOUR: f64 = 10.0;
    /// Kilojoule to kilocalorie factor
    pub const KILOJOULES_TO_KCAL: f64 = 0.239;
}

/// Training load windows and ratio bands
pub mod training_load {
    /// Acute window
    pub const ACUTE_WINDOW_DAYS: i64 = 7;
    /// Chronic window
    pub const CHRONIC_WINDOW_DAYS: i64 = 28;
    /// Ratio above which training is overreaching
    pub const OVERREACHING_RATIO: f64 = 1.5;
    /// Ratio above which training is productive
    pub const PRODUCTIVE_RATIO: f64 = 1.2;
    /// Ratio above which training is maintaining
    pub const MAINTAINING_RATIO: f64 = 0.8;
    /// Ratio above which training is recovery
    pub const RECOVERY_RATIO: f64 = 0.5;
}

/// Default per-field vendor priorities, best source first
pub mod aggregation {
    use crate::models::VendorType;

    /// Heart rate: the on-device store samples continuously
    pub const HEART_RATE: &[VendorType] = &[
        VendorType::HealthStore,
        VendorType::Whoop,
        VendorType::Garmin,
        VendorType::Fitbit,
        VendorType::GoogleFit,
    ];
    /// HRV
    pub const HRV: &[VendorType] = &[
        VendorType::Whoop,
        VendorType::HealthStore,
        VendorType::Garmin,
        VendorType::Fitbit,
    ];
    /// Sleep
    pub const SLEEP: &[VendorType] = &[
        VendorType::Whoop,
        VendorType::Garmin,
        VendorType::Fitbit,
        VendorType::GoogleFit,
        VendorType::HealthStore,
    ];
    /// Strain
    pub const STRAIN: &[VendorType] = &[VendorType::Whoop];
    /// Training load
    pub const TRAINING_LOAD: &[VendorType] = &[VendorType::Whoop, VendorType::Garmin];
}

/// Recovery, readiness and recommendation thresholds
pub mod recovery {
    /// Readiness score for the excellent band
    pub const READINESS_EXCELLENT: f64 = 80.0;
    /// Readiness score for the good band
    pub const READINESS_GOOD: f64 = 60.0;
    /// Readiness score for the fair band
    pub const READINESS_FAIR: f64 = 40.0;
    /// Recovery below this triggers a rest recommendation
    pub const LOW_RECOVERY: f64 = 40.0;
    /// Recovery above this triggers a high-intensity recommendation
    pub const HIGH_RECOVERY: f64 = 80.0;
    /// Minimum healthy sleep duration
    pub const MIN_SLEEP_HOURS: f64 = 6.0;
    /// Minimum healthy sleep efficiency
    pub const MIN_SLEEP_EFFICIENCY_PERCENT: f64 = 85.0;
    /// Weight for vendors without an explicit recovery weight
    pub const DEFAULT_VENDOR_WEIGHT: f64 = 0.5;
    /// WHOOP recovery weight
    pub const WHOOP_WEIGHT: f64 = 1.0;
    /// Garmin body battery weight
    pub const GARMIN_WEIGHT: f64 = 0.8;
    /// Fitbit readiness weight
    pub const FITBIT_WEIGHT: f64 = 0.6;
    /// HRV change (fraction of baseline) that counts as a trend
    pub const HRV_TREND_THRESHOLD: f64 = 0.05;
}

/// Data quality grading
pub mod quality {
    /// Coverage for grade A
    pub const GRADE_A: f64 = 0.9;
    /// Coverage for grade B
    pub const GRADE_B: f64 = 0.75;
    /// Coverage for grade C
    pub const GRADE_C: f64 = 0.5;
    /// Coverage for grade D
    pub const GRADE_D: f64 = 0.25;
}

/// Webhook handling
pub mod webhooks {
    /// WHOOP signature header
    pub const WHOOP_SIGNATURE_HEADER: &str = "x-whoop-signature";
    /// WHOOP signature timestamp header
    pub const WHOOP_TIMESTAMP_HEADER: &str = "x-whoop-signature-timestamp";
    /// Largest accepted distance between the signature timestamp and now
    pub const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;
    /// WHOOP webhook route
    pub const WHOOP_ROUTE: &str = "/webhooks/whoop";
    /// Default port for the webhook server
    pub const DEFAULT_PORT: u16 = 8081;
}

/// Service identity
pub mod service {
    /// Service name used in logs
    pub const SERVICE_NAME: &str = "pierre-wearables";
    /// Subdirectory under the platform data directory
    pub const DATA_DIR_NAME: &str = "pierre-wearables";
}
