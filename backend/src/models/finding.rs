use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::error::ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(crate::error::ApiError::validation(format!(
                "Unknown severity '{}'",
                other
            ))),
        }
    }
}

/// One reported vulnerability instance, owned by the scan that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Module identifier that produced the finding
    #[serde(rename = "type")]
    pub finding_type: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub test_url: String,
    #[serde(default)]
    pub details: String,
}

impl Finding {
    /// Query marker appended to the scanned URL for the `index`-th (0-based)
    /// finding produced by `module`.
    pub fn test_url_for(url: &str, module: &str, index: usize) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}id={}_test_{}", url, separator, module, index + 1)
    }
}
