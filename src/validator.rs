//! One-shot deployment validation against expected status codes

use crate::probe::{Probe, ProbeResult};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Average latency above which the deployment is flagged as slow
pub const SLOW_AVERAGE_MS: f64 = 2000.0;

/// Single-endpoint latency above which that endpoint is flagged
pub const SLOW_ENDPOINT_MS: u64 = 3000;

/// A path and the exact status it must answer with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointExpectation {
    pub path: String,
    pub expected_status: u16,
    pub description: String,
}

impl EndpointExpectation {
    pub fn new(path: &str, expected_status: u16, description: &str) -> Self {
        Self {
            path: path.to_string(),
            expected_status,
            description: description.to_string(),
        }
    }
}

/// Routes every deployment of the dealership site must serve
pub fn default_expectations() -> Vec<EndpointExpectation> {
    vec![
        EndpointExpectation::new("/", 200, "Home page"),
        EndpointExpectation::new("/inventory", 200, "Vehicle inventory listing"),
        EndpointExpectation::new("/about", 200, "About page"),
        EndpointExpectation::new("/services", 200, "Services page"),
        EndpointExpectation::new("/contact", 200, "Contact page"),
        EndpointExpectation::new("/api/health", 200, "Health endpoint"),
        EndpointExpectation::new("/this-page-does-not-exist", 404, "Not-found handling"),
    ]
}

#[derive(Debug, Clone)]
pub struct EndpointValidation {
    pub expectation: EndpointExpectation,
    pub result: ProbeResult,
    pub passed: bool,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub base_url: String,
    pub endpoints: Vec<EndpointValidation>,
}

impl ValidationReport {
    pub fn passed_count(&self) -> usize {
        self.endpoints.iter().filter(|e| e.passed).count()
    }

    /// Percentage of passing checks; 100 when nothing was checked
    pub fn success_rate(&self) -> f64 {
        if self.endpoints.is_empty() {
            return 100.0;
        }
        self.passed_count() as f64 / self.endpoints.len() as f64 * 100.0
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.endpoints.is_empty() {
            return 0.0;
        }
        let total: u64 = self.endpoints.iter().map(|e| e.result.latency_ms).sum();
        total as f64 / self.endpoints.len() as f64
    }

    pub fn is_success(&self) -> bool {
        self.passed_count() == self.endpoints.len()
    }

    pub fn recommendations(&self) -> Vec<String> {
        let mut recommendations = Vec::new();

        if !self.is_success() {
            recommendations.push(
                "Some endpoints failed validation: check the deployment logs and routing configuration."
                    .to_string(),
            );
        }

        if self.average_latency_ms() > SLOW_AVERAGE_MS {
            recommendations.push(
                "Average response time is above 2000ms: review caching headers and CDN configuration."
                    .to_string(),
            );
        }

        for slow in self
            .endpoints
            .iter()
            .filter(|e| e.result.latency_ms > SLOW_ENDPOINT_MS)
        {
            recommendations.push(format!(
                "{} took {}ms: investigate server-side rendering and data fetching for this route.",
                slow.expectation.path, slow.result.latency_ms
            ));
        }

        recommendations
    }

    /// Human-readable report
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Deployment validation for {}", self.base_url);
        let _ = writeln!(out);

        for endpoint in &self.endpoints {
            let marker = if endpoint.passed { "PASS" } else { "FAIL" };
            let _ = write!(
                out,
                "[{}] {} ({}) expected {} got {} in {}ms",
                marker,
                endpoint.expectation.path,
                endpoint.expectation.description,
                endpoint.expectation.expected_status,
                endpoint.result.status,
                endpoint.result.latency_ms
            );
            if let Some(message) = &endpoint.result.error_message {
                let _ = write!(out, " error: {}", message);
            }
            let _ = writeln!(out);

            if let Some(cache) = &endpoint.result.cache_control {
                let _ = writeln!(out, "       cache-control: {}", cache);
            }
            if let Some(encoding) = &endpoint.result.content_encoding {
                let _ = writeln!(out, "       content-encoding: {}", encoding);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Passed: {}/{} ({:.1}%)",
            self.passed_count(),
            self.endpoints.len(),
            self.success_rate()
        );
        let _ = writeln!(out, "Average response time: {:.0}ms", self.average_latency_ms());

        let recommendations = self.recommendations();
        if !recommendations.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Recommendations:");
            for r in recommendations {
                let _ = writeln!(out, "  - {}", r);
            }
        }

        out
    }
}

pub struct DeploymentValidator {
    prober: Arc<dyn Probe>,
    expectations: Vec<EndpointExpectation>,
}

impl DeploymentValidator {
    pub fn new(prober: Arc<dyn Probe>, expectations: Vec<EndpointExpectation>) -> Self {
        Self {
            prober,
            expectations,
        }
    }

    /// Probe each expectation once, in order
    #[instrument(skip(self))]
    pub async fn validate(&self, base_url: &str) -> ValidationReport {
        let base_url = base_url.trim_end_matches('/').to_string();
        let mut endpoints = Vec::with_capacity(self.expectations.len());

        for expectation in &self.expectations {
            let url = format!("{}{}", base_url, expectation.path);
            let result = self.prober.probe(&url).await;
            let passed = result.status.code() == Some(expectation.expected_status);

            if passed {
                info!("{} -> {} ({}ms)", expectation.path, result.status, result.latency_ms);
            } else {
                warn!(
                    "{} -> {} (expected {})",
                    expectation.path, result.status, expectation.expected_status
                );
            }

            endpoints.push(EndpointValidation {
                expectation: expectation.clone(),
                result,
                passed,
            });
        }

        ValidationReport {
            base_url,
            endpoints,
        }
    }
}
