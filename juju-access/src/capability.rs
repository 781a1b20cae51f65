// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detection of the JAAS relationship API.
//!
//! Whether a controller is JAAS-capable is decided once per client by probing it. The first caller
//! runs the probe, every concurrent or later caller waits for and shares that result. A failed
//! probe falls back to a caller-supplied hint and is never retried.
use std::fmt::Display;
use std::future::Future;

use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CapabilityGate {
    capable: OnceCell<bool>,
}

impl CapabilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized capability, running `probe` if no result exists yet.
    ///
    /// A successful probe means the controller is capable, any error falls back to `default`.
    pub async fn is_capable<F, Fut, E>(&self, default: bool, probe: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        *self
            .capable
            .get_or_init(|| async move {
                match probe().await {
                    Ok(()) => {
                        debug!("capability probe succeeded");
                        true
                    }
                    Err(err) => {
                        debug!(%err, default, "capability probe failed, using default");
                        default
                    }
                }
            })
            .await
    }

    /// The memoized result, if the probe already ran.
    pub fn get(&self) -> Option<bool> {
        self.capable.get().copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Outcome of a capability validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Check run against the controller capability before an operation is allowed.
pub trait CapabilityValidator {
    fn description(&self) -> &'static str;

    fn validate(&self, capable: bool) -> Option<Diagnostic>;
}

/// Refuses operations unless the controller offers the relationship API.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequiresJaas;

impl CapabilityValidator for RequiresJaas {
    fn description(&self) -> &'static str {
        "Enforces that this resource can only be used with JAAS"
    }

    fn validate(&self, capable: bool) -> Option<Diagnostic> {
        if capable {
            return None;
        }

        Some(Diagnostic {
            severity: Severity::Error,
            summary: "Invalid use of resource without JAAS.".to_string(),
            detail: "This resource can only be used with a JAAS controller, which offers \
                     fine-grained relationship management."
                .to_string(),
        })
    }
}

/// Warns when a resource with a dedicated JAAS counterpart is used against JAAS.
#[derive(Clone, Copy, Debug, Default)]
pub struct AvoidJaas;

impl CapabilityValidator for AvoidJaas {
    fn description(&self) -> &'static str {
        "Warns when this resource is used with JAAS"
    }

    fn validate(&self, capable: bool) -> Option<Diagnostic> {
        if !capable {
            return None;
        }

        Some(Diagnostic {
            severity: Severity::Warning,
            summary: "Poor use of resource with JAAS.".to_string(),
            detail: "It is not recommended to use this resource with a JAAS setup. JAAS offers \
                     additional enterprise features through the use of dedicated resources."
                .to_string(),
        })
    }
}
