//! The request aggregate and its pure transition function.
//!
//! `apply` mutates an in-memory copy only. The engine decides whether the
//! result gets committed.

use super::error::LifecycleError;
use super::operation::Operation;
use crate::config::LifecyclePolicy;
use crate::entities::RequestStatus;
use crate::entities::acceptance::Acceptance;
use crate::entities::service_request::{RequestDetails, RequestDetailsPatch, ServiceRequest};
use crate::ledger::AcceptanceLedger;
use hireloop_sdk::objects::Transition;
use time::OffsetDateTime;
use uuid::Uuid;

/// A request together with its acceptance ledger: the unit of locking and
/// of every commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAggregate {
    pub request: ServiceRequest,
    pub ledger: AcceptanceLedger,
}

/// What a successful `apply` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// `None` when nothing changed and nothing must be committed.
    pub transition: Option<Transition>,
    pub actor_id: Uuid,
    /// The acceptance row an accept or select call is about.
    pub acceptance: Option<Acceptance>,
    pub duplicate: bool,
}

impl RequestAggregate {
    /// Validate a creation payload and build the `pending` aggregate.
    pub fn create(
        client_id: Uuid,
        details: RequestDetails,
        now: OffsetDateTime,
        policy: &LifecyclePolicy,
    ) -> Result<Self, LifecycleError> {
        let details = RequestDetails {
            category: required_text("category", &details.category, policy, None)?,
            description: required_text("description", &details.description, policy, None)?,
            location: required_text("location", &details.location, policy, None)?,
            urgency: details.urgency,
        };
        let id = Uuid::now_v7();
        Ok(Self {
            request: ServiceRequest::new(id, client_id, details, now),
            ledger: AcceptanceLedger::new(id),
        })
    }

    pub fn id(&self) -> Uuid {
        self.request.id
    }

    pub fn status(&self) -> RequestStatus {
        self.request.status
    }

    /// Whether `caller_id` may read this request.
    pub fn is_visible_to(&self, caller_id: Uuid) -> bool {
        caller_id == self.request.client_id || self.ledger.find(caller_id).is_some()
    }

    /// Run one operation against this aggregate.
    ///
    /// Checks run in a fixed order: input validation, authorization,
    /// status, ledger membership. On error the aggregate may be partially
    /// modified and must be discarded.
    pub fn apply(
        &mut self,
        op: &Operation,
        now: OffsetDateTime,
        policy: &LifecyclePolicy,
    ) -> Result<Applied, LifecycleError> {
        let actor_id = op.actor_id();
        let status = self.status();
        let mut acceptance = None;

        let transition = match op {
            Operation::Accept { professional_id } => {
                if *professional_id == self.request.client_id {
                    return Err(LifecycleError::forbidden(
                        status,
                        "a client cannot accept their own request",
                    ));
                }
                if let Some(existing) = self.ledger.find(*professional_id) {
                    return Ok(Applied {
                        transition: None,
                        actor_id,
                        acceptance: Some(existing.clone()),
                        duplicate: true,
                    });
                }
                if !status.is_open_for_acceptance() {
                    return Err(LifecycleError::illegal_in(status, "accept"));
                }
                let row = self
                    .ledger
                    .append(*professional_id, now)
                    .map_err(|e| LifecycleError::from_ledger(status, e))?;
                acceptance = Some(row);
                if status == RequestStatus::Pending {
                    self.request.status = RequestStatus::ActiveForAcceptance;
                }
                Transition::ProfessionalAccepted
            }

            Operation::Select {
                client_id,
                professional_id,
            } => {
                self.require_owner(*client_id)?;
                if status != RequestStatus::ActiveForAcceptance {
                    return Err(LifecycleError::illegal_in(status, "select a professional for"));
                }
                if let Some(bound) = self.request.selected_professional_id {
                    return Err(LifecycleError::conflict(
                        status,
                        format!("request is already bound to professional {bound}"),
                    ));
                }
                let row = self
                    .ledger
                    .mark_selected(*professional_id, now)
                    .map_err(|e| LifecycleError::from_ledger(status, e))?
                    .clone();
                self.request
                    .bind_professional(*professional_id)
                    .map_err(|bound| {
                        LifecycleError::conflict(
                            status,
                            format!("request is already bound to professional {bound}"),
                        )
                    })?;
                acceptance = Some(row);
                self.request.status = RequestStatus::InProgress;
                Transition::ProfessionalSelected
            }

            Operation::CloseWithoutSelection { client_id, reason } => {
                let reason = optional_text("reason", reason, policy, Some(status))?;
                self.require_owner(*client_id)?;
                if !status.is_open_for_acceptance()
                    || self.request.selected_professional_id.is_some()
                {
                    return Err(LifecycleError::illegal_in(status, "close without selection"));
                }
                self.ledger.mark_unselected_remaining(now);
                self.request.status = RequestStatus::Closed;
                self.request.closed_at = Some(now);
                self.request.close_reason = reason;
                Transition::RequestClosed
            }

            Operation::Complete { professional_id } => {
                if self.request.selected_professional_id != Some(*professional_id) {
                    return Err(LifecycleError::forbidden(
                        status,
                        "only the selected professional can complete this request",
                    ));
                }
                if status != RequestStatus::InProgress {
                    return Err(LifecycleError::illegal_in(status, "complete"));
                }
                self.ledger
                    .mark_completed(now)
                    .map_err(|e| LifecycleError::from_ledger(status, e))?;
                // `completed` is never stored; the client still owes a rating.
                self.request.completed_at = Some(now);
                self.request.status = RequestStatus::AwaitingRating;
                Transition::RequestCompleted
            }

            Operation::RateAndClose {
                client_id,
                rating,
                comment,
            } => {
                if !(1..=5).contains(rating) {
                    return Err(LifecycleError::validation(
                        Some(status),
                        format!("rating must be between 1 and 5, got {rating}"),
                    ));
                }
                let comment = comment.trim();
                let len = comment.chars().count();
                if len < policy.min_comment_len {
                    return Err(LifecycleError::validation(
                        Some(status),
                        format!(
                            "comment must be at least {} characters",
                            policy.min_comment_len
                        ),
                    ));
                }
                if len > policy.max_field_len {
                    return Err(LifecycleError::validation(
                        Some(status),
                        format!("comment must be at most {} characters", policy.max_field_len),
                    ));
                }
                self.require_owner(*client_id)?;
                if status != RequestStatus::AwaitingRating {
                    return Err(LifecycleError::illegal_in(status, "rate"));
                }
                self.request.status = RequestStatus::Closed;
                self.request.closed_at = Some(now);
                self.request.rating = Some(i16::from(*rating));
                self.request.rating_comment = Some(comment.to_string());
                Transition::RequestClosed
            }

            Operation::Cancel { caller_id, reason } => {
                let reason = required_text("reason", reason, policy, Some(status))?;
                let is_owner = *caller_id == self.request.client_id;
                let is_bound = self.request.selected_professional_id == Some(*caller_id);
                if !is_owner && !is_bound {
                    return Err(LifecycleError::forbidden(
                        status,
                        "only the owning client or the selected professional can cancel",
                    ));
                }
                if status.is_terminal() {
                    return Err(LifecycleError::illegal_in(status, "cancel"));
                }
                self.request.status = RequestStatus::Cancelled;
                self.request.cancellation_reason = Some(reason);
                self.request.cancelled_by = Some(*caller_id);
                Transition::RequestCancelled
            }

            Operation::UpdateDetails { client_id, patch } => {
                let patch = validate_patch(patch, policy, status)?;
                self.require_owner(*client_id)?;
                if status != RequestStatus::Pending {
                    return Err(LifecycleError::illegal_in(status, "edit"));
                }
                if let Some(category) = patch.category {
                    self.request.category = category;
                }
                if let Some(description) = patch.description {
                    self.request.description = description;
                }
                if let Some(location) = patch.location {
                    self.request.location = location;
                }
                if let Some(urgency) = patch.urgency {
                    self.request.urgency = urgency;
                }
                Transition::RequestUpdated
            }
        };

        self.request.updated_at = now;
        Ok(Applied {
            transition: Some(transition),
            actor_id,
            acceptance,
            duplicate: false,
        })
    }

    fn require_owner(&self, client_id: Uuid) -> Result<(), LifecycleError> {
        if client_id == self.request.client_id {
            Ok(())
        } else {
            Err(LifecycleError::forbidden(
                self.status(),
                "caller does not own this request",
            ))
        }
    }
}

fn required_text(
    field: &str,
    value: &str,
    policy: &LifecyclePolicy,
    status: Option<RequestStatus>,
) -> Result<String, LifecycleError> {
    match optional_text(field, value, policy, status)? {
        Some(text) => Ok(text),
        None => Err(LifecycleError::validation(
            status,
            format!("{field} must not be blank"),
        )),
    }
}

/// Trimmed text, `None` when blank.
fn optional_text(
    field: &str,
    value: &str,
    policy: &LifecyclePolicy,
    status: Option<RequestStatus>,
) -> Result<Option<String>, LifecycleError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.chars().count() > policy.max_field_len {
        return Err(LifecycleError::validation(
            status,
            format!("{field} must be at most {} characters", policy.max_field_len),
        ));
    }
    Ok(Some(value.to_string()))
}

fn validate_patch(
    patch: &RequestDetailsPatch,
    policy: &LifecyclePolicy,
    status: RequestStatus,
) -> Result<RequestDetailsPatch, LifecycleError> {
    if patch.is_empty() {
        return Err(LifecycleError::validation(
            Some(status),
            "update must change at least one field",
        ));
    }
    let check = |field: &str, value: &Option<String>| {
        value
            .as_deref()
            .map(|v| required_text(field, v, policy, Some(status)))
            .transpose()
    };
    Ok(RequestDetailsPatch {
        category: check("category", &patch.category)?,
        description: check("description", &patch.description)?,
        location: check("location", &patch.location)?,
        urgency: patch.urgency,
    })
}
