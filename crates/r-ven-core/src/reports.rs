//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Event reconciliation and registration lifecycle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use r_ven_common::config::ReportConfig;
use r_ven_msg::{ReportDescription, ReportReading, ReportRequest};

/// Produces a numeric reading for a report.
pub trait Sampler: Send + Sync {
    fn sample(&self) -> f64;
}

impl<F> Sampler for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn sample(&self) -> f64 {
        self()
    }
}

/// Uniform random reading in `[0, scale)`.
#[derive(Debug, Clone, Copy)]
pub struct RandomSampler {
    scale: f64,
}

impl RandomSampler {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }
}

impl Sampler for RandomSampler {
    fn sample(&self) -> f64 {
        rand::random::<f64>() * self.scale
    }
}

/// Report offered to the coordinator together with its sampling callback.
#[derive(Clone)]
pub struct ReportSpecification {
    pub report_id: String,
    pub resource_id: String,
    pub measurement: String,
    pub unit: String,
    sampler: Arc<dyn Sampler>,
}

impl ReportSpecification {
    pub fn new(
        report_id: impl Into<String>,
        resource_id: impl Into<String>,
        measurement: impl Into<String>,
        unit: impl Into<String>,
        sampler: Arc<dyn Sampler>,
    ) -> Self {
        Self {
            report_id: report_id.into(),
            resource_id: resource_id.into(),
            measurement: measurement.into(),
            unit: unit.into(),
            sampler,
        }
    }

    pub fn description(&self) -> ReportDescription {
        ReportDescription {
            report_specifier_id: self.report_id.clone(),
            resource_id: self.resource_id.clone(),
            measurement: self.measurement.clone(),
            unit: self.unit.clone(),
        }
    }

    fn is_requested_by(&self, request: &ReportRequest) -> bool {
        self.report_id == request.report_specifier_id
            && self.resource_id == request.resource_id
            && self.measurement == request.measurement
    }

    fn read(&self, timestamp: DateTime<Utc>) -> ReportReading {
        ReportReading {
            report_specifier_id: self.report_id.clone(),
            resource_id: self.resource_id.clone(),
            measurement: self.measurement.clone(),
            value: self.sampler.sample(),
            timestamp,
        }
    }
}

impl fmt::Debug for ReportSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportSpecification")
            .field("report_id", &self.report_id)
            .field("resource_id", &self.resource_id)
            .field("measurement", &self.measurement)
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of reports offered during registration.
#[derive(Debug, Clone, Default)]
pub struct ReportSet {
    specs: Vec<ReportSpecification>,
}

impl ReportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports from configuration, each sampled by a [`RandomSampler`].
    pub fn from_config(reports: &[ReportConfig]) -> Self {
        let mut set = Self::new();
        for report in reports {
            set.add_report(ReportSpecification::new(
                report.report_id.clone(),
                report.resource_id.clone(),
                report.measurement.clone(),
                report.unit.clone(),
                Arc::new(RandomSampler::new(report.scale)),
            ));
        }
        set
    }

    pub fn add_report(&mut self, spec: ReportSpecification) {
        self.specs.push(spec);
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn descriptions(&self) -> Vec<ReportDescription> {
        self.specs.iter().map(ReportSpecification::description).collect()
    }

    /// Sample every offered report named in `requests`, in offer order.
    pub fn sample_requested(
        &self,
        requests: &[ReportRequest],
        timestamp: DateTime<Utc>,
    ) -> Vec<ReportReading> {
        self.specs
            .iter()
            .filter(|spec| requests.iter().any(|request| spec.is_requested_by(request)))
            .map(|spec| spec.read(timestamp))
            .collect()
    }
}
