//! Service catalog.
//!
//! The catalog is the fixed list of services a kiosk offers. Each service and
//! each sub-service may carry a prefix; every prefix in the catalog is unique,
//! which is what lets the counter table treat prefixes as independent
//! numbering sequences.
//!
//! A catalog is validated once at construction and then shared read-only
//! (usually behind an `Arc`).

use crate::error::QueueError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Errors raised while validating a catalog definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The catalog has no services at all.
    #[error("Catalog must define at least one service")]
    Empty,

    /// Two services share the same id.
    #[error("Duplicate service id: {0}")]
    DuplicateServiceId(ServiceId),

    /// Two sub-services of the same service share an id.
    #[error("Duplicate sub-service id {sub_service} in service {service}")]
    DuplicateSubServiceId {
        /// Owning service
        service: ServiceId,
        /// Repeated sub-service id
        sub_service: SubServiceId,
    },

    /// The same prefix appears twice anywhere in the catalog.
    #[error("Prefix {0} is used more than once")]
    DuplicatePrefix(Prefix),

    /// A prefix is empty or contains non-alphabetic characters.
    #[error("Invalid prefix {0:?}: prefixes must be non-empty and alphabetic")]
    InvalidPrefix(String),
}

/// Identifier of a service (`general`, `priority`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Creates a service id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a sub-service, unique within its parent service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubServiceId(String);

impl SubServiceId {
    /// Creates a sub-service id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short alphabetic code that names a numbering sequence (`G`, `GI`, `P`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    /// Creates a prefix, rejecting empty or non-alphabetic codes.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidPrefix`] if the code is empty or contains
    /// anything other than ASCII letters.
    pub fn new(code: impl Into<String>) -> Result<Self, CatalogError> {
        let code = code.into();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CatalogError::InvalidPrefix(code));
        }
        Ok(Self(code))
    }

    /// Prefix for compile-time constants already known to be valid.
    fn known(code: &'static str) -> Self {
        Self(code.to_string())
    }

    /// Returns the prefix as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Prefix {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.0
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A refinement of a service, optionally numbered on its own prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubService {
    /// Identifier, unique within the parent service
    pub id: SubServiceId,
    /// Display name
    pub name: String,
    /// Own numbering prefix; when absent the parent's prefix is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<Prefix>,
}

/// A service category offered at the kiosk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Identifier
    pub id: ServiceId,
    /// Display name
    pub name: String,
    /// Numbering prefix
    pub prefix: Prefix,
    /// Priority-class services pre-empt everything else on call-next
    #[serde(default)]
    pub priority: bool,
    /// Optional ordered sub-services
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_services: Vec<SubService>,
}

impl Service {
    /// Looks up one of this service's sub-services
    #[must_use]
    pub fn sub_service(&self, id: &SubServiceId) -> Option<&SubService> {
        self.sub_services.iter().find(|sub| sub.id == *id)
    }
}

/// A service together with the sub-service a ticket was requested for.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    /// The service
    pub service: &'a Service,
    /// The chosen sub-service, if any
    pub sub_service: Option<&'a SubService>,
}

impl Resolved<'_> {
    /// Prefix that numbers this ticket: the sub-service's own prefix if it
    /// has one, otherwise the service's.
    #[must_use]
    pub fn effective_prefix(&self) -> &Prefix {
        self.sub_service
            .and_then(|sub| sub.prefix.as_ref())
            .unwrap_or(&self.service.prefix)
    }
}

/// Validated, immutable list of services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Service>", into = "Vec<Service>")]
pub struct Catalog {
    services: Vec<Service>,
}

impl Catalog {
    /// Builds a catalog after checking id and prefix uniqueness.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] describing the first violation found.
    pub fn new(services: Vec<Service>) -> Result<Self, CatalogError> {
        if services.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut ids = HashSet::new();
        let mut prefixes = HashSet::new();

        for service in &services {
            if !ids.insert(&service.id) {
                return Err(CatalogError::DuplicateServiceId(service.id.clone()));
            }
            if !prefixes.insert(&service.prefix) {
                return Err(CatalogError::DuplicatePrefix(service.prefix.clone()));
            }

            let mut sub_ids = HashSet::new();
            for sub in &service.sub_services {
                if !sub_ids.insert(&sub.id) {
                    return Err(CatalogError::DuplicateSubServiceId {
                        service: service.id.clone(),
                        sub_service: sub.id.clone(),
                    });
                }
                if let Some(prefix) = &sub.prefix {
                    if !prefixes.insert(prefix) {
                        return Err(CatalogError::DuplicatePrefix(prefix.clone()));
                    }
                }
            }
        }

        Ok(Self { services })
    }

    /// The catalog of the reference deployment: general attendance with four
    /// sub-services, priority attendance and exam results.
    #[must_use]
    pub fn reference() -> Self {
        let sub = |id: &str, name: &str, prefix: &'static str| SubService {
            id: SubServiceId::new(id),
            name: name.to_string(),
            prefix: Some(Prefix::known(prefix)),
        };

        Self {
            services: vec![
                Service {
                    id: ServiceId::new("general"),
                    name: "General Attendance".to_string(),
                    prefix: Prefix::known("G"),
                    priority: false,
                    sub_services: vec![
                        sub("info", "Information", "GI"),
                        sub("schedule", "Scheduling", "GA"),
                        sub("payment", "Payments", "GP"),
                        sub("other", "Other Matters", "GO"),
                    ],
                },
                Service {
                    id: ServiceId::new("priority"),
                    name: "Priority Attendance".to_string(),
                    prefix: Prefix::known("P"),
                    priority: true,
                    sub_services: Vec::new(),
                },
                Service {
                    id: ServiceId::new("exams"),
                    name: "Exam Results".to_string(),
                    prefix: Prefix::known("E"),
                    priority: false,
                    sub_services: Vec::new(),
                },
            ],
        }
    }

    /// All services in catalog order
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Looks up a service by id
    #[must_use]
    pub fn service(&self, id: &ServiceId) -> Option<&Service> {
        self.services.iter().find(|service| service.id == *id)
    }

    /// Whether tickets of this service pre-empt the queue.
    ///
    /// Ids that are not (or no longer) in the catalog are never priority.
    #[must_use]
    pub fn is_priority(&self, id: &ServiceId) -> bool {
        self.service(id).is_some_and(|service| service.priority)
    }

    /// Resolves a ticket request against the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotFound`] if the service is unknown, or if a
    /// sub-service is given that the service does not list.
    pub fn resolve(
        &self,
        service: &ServiceId,
        sub_service: Option<&SubServiceId>,
    ) -> Result<Resolved<'_>, QueueError> {
        let found = self
            .service(service)
            .ok_or_else(|| QueueError::not_found("service", service))?;

        let sub = match sub_service {
            Some(sub_id) => Some(
                found
                    .sub_service(sub_id)
                    .ok_or_else(|| QueueError::not_found("sub-service", format!("{service}/{sub_id}")))?,
            ),
            None => None,
        };

        Ok(Resolved {
            service: found,
            sub_service: sub,
        })
    }
}

impl TryFrom<Vec<Service>> for Catalog {
    type Error = CatalogError;

    fn try_from(services: Vec<Service>) -> Result<Self, Self::Error> {
        Self::new(services)
    }
}

impl From<Catalog> for Vec<Service> {
    fn from(catalog: Catalog) -> Self {
        catalog.services
    }
}
