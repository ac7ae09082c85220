//! Upstream API constants shared across the balance probe and request engine.

/// Compile-time upstream base URL.
pub const BASE_URL: &str = "https://api.siliconflow.cn/v1";
