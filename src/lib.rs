// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Outfit Classifier: local web tool for tagging outfit image directories
//!
//! Hands out unclassified outfit directories, records submitted tags and
//! tracks progress in three flat JSON files under the data directory.

pub mod config;
pub mod error;
pub mod images;
pub mod store;
pub mod weather;
pub mod web;

pub use config::AppConfig;
pub use error::{ClassifierError, Result};
