/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Workflow configuration.

use url::Url;

use crate::ledger::DEFAULT_EXPIRY_DAYS;

/// Configuration for the workflow orchestrator.
///
/// Built with chained setters:
///
/// ```rust
/// use countersign::WorkflowConfig;
/// use url::Url;
///
/// let config = WorkflowConfig::new(Url::parse("https://sign.example.com").unwrap())
///     .with_expiry_days(14)
///     .with_label_font_size(8.0);
/// assert_eq!(config.expiry_days(), 14);
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    base_url: Url,
    expiry_days: i64,
    label_font_size: f64,
}

impl WorkflowConfig {
    /// Creates a configuration with the given public base URL for signing
    /// links and default settings otherwise.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            expiry_days: DEFAULT_EXPIRY_DAYS,
            label_font_size: 7.0,
        }
    }

    /// Days until newly created requests expire.
    pub fn with_expiry_days(mut self, days: i64) -> Self {
        self.expiry_days = days;
        self
    }

    /// Font size in points for the "Signed: ..." label under each mark.
    pub fn with_label_font_size(mut self, size: f64) -> Self {
        self.label_font_size = size;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn expiry_days(&self) -> i64 {
        self.expiry_days
    }

    pub fn label_font_size(&self) -> f64 {
        self.label_font_size
    }
}
