use super::aggregate::{Applied, RequestAggregate};
use super::error::LifecycleError;
use super::locks::LockArena;
use super::operation::{Operation, OperationKind, create_fingerprint};
use crate::config::LifecyclePolicy;
use crate::entities::RequestStatus;
use crate::entities::acceptance::{Acceptance, ProfessionalAcceptance};
use crate::entities::idempotency::IdempotencyRecord;
use crate::entities::service_request::{RequestDetails, RequestDetailsPatch, ServiceRequest};
use crate::events::{EventEmitter, LifecycleEvent};
use crate::store::{RequestStore, StoreError};
use crate::utils::backoff::retry_transient;
use hireloop_sdk::objects::Transition;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Commits lost to a concurrent writer before giving up with Conflict.
const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Longest idempotency key accepted, in bytes.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Result of an accept call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub acceptance: Acceptance,
    pub status: RequestStatus,
    /// No row was created by this call.
    pub duplicate: bool,
}

struct Execution {
    aggregate: RequestAggregate,
    acceptance: Option<Acceptance>,
    duplicate: bool,
}

/// The request state machine.
///
/// Every mutation of a request goes through [`LifecycleEngine::execute`]:
/// lock, load, check the idempotency key, apply, commit with a version
/// check, emit. Reads skip the lock.
pub struct LifecycleEngine {
    store: Arc<dyn RequestStore>,
    locks: LockArena,
    emitter: EventEmitter,
    policy: LifecyclePolicy,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn RequestStore>, emitter: EventEmitter, policy: LifecyclePolicy) -> Self {
        Self {
            store,
            locks: LockArena::new(),
            emitter,
            policy,
        }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub fn locks(&self) -> &LockArena {
        &self.locks
    }

    pub async fn create_request(
        &self,
        client_id: Uuid,
        details: RequestDetails,
        idempotency_key: Option<String>,
    ) -> Result<ServiceRequest, LifecycleError> {
        let key = normalize_key(idempotency_key)?;
        let fingerprint = create_fingerprint(&details);
        if let Some(key) = &key {
            if let Some(record) = self.find_key(client_id, client_id, key).await? {
                return self.replay_create(record, &fingerprint).await;
            }
        }

        let now = OffsetDateTime::now_utc();
        let aggregate = RequestAggregate::create(client_id, details, now, &self.policy)?;
        let record = key.as_ref().map(|k| {
            IdempotencyRecord::new(
                client_id,
                client_id,
                k.clone(),
                OperationKind::Create.as_str(),
                fingerprint.clone(),
                aggregate.id(),
                now,
            )
        });

        let inserted = retry_transient(self.policy.store_retry_attempts, || {
            self.store.insert(&aggregate, record.as_ref())
        })
        .await;
        match inserted {
            Ok(()) => {}
            Err(StoreError::KeyTaken { key }) => {
                tracing::debug!(client_id = %client_id, key = %key, "Concurrent create with same key");
                return match self.find_key(client_id, client_id, &key).await? {
                    Some(record) => self.replay_create(record, &fingerprint).await,
                    None => Err(LifecycleError::unavailable(
                        "idempotency key vanished during create",
                    )),
                };
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            request_id = %aggregate.id(),
            client_id = %client_id,
            "Service request created"
        );
        self.emitter.emit(LifecycleEvent::new(
            Transition::RequestCreated,
            client_id,
            aggregate.request.clone(),
            now,
        ));
        Ok(aggregate.request)
    }

    pub async fn accept_request(
        &self,
        request_id: Uuid,
        professional_id: Uuid,
        idempotency_key: Option<String>,
    ) -> Result<AcceptOutcome, LifecycleError> {
        let execution = self
            .execute(
                request_id,
                Operation::Accept { professional_id },
                idempotency_key,
            )
            .await?;
        let status = execution.aggregate.status();
        let acceptance = execution.acceptance.ok_or_else(|| {
            LifecycleError::not_found(Some(status), "acceptance not found for professional")
        })?;
        Ok(AcceptOutcome {
            acceptance,
            status,
            duplicate: execution.duplicate,
        })
    }

    pub async fn select_professional(
        &self,
        request_id: Uuid,
        client_id: Uuid,
        professional_id: Uuid,
        idempotency_key: Option<String>,
    ) -> Result<ServiceRequest, LifecycleError> {
        self.mutate(
            request_id,
            Operation::Select {
                client_id,
                professional_id,
            },
            idempotency_key,
        )
        .await
    }

    pub async fn close_without_selection(
        &self,
        request_id: Uuid,
        client_id: Uuid,
        reason: String,
        idempotency_key: Option<String>,
    ) -> Result<ServiceRequest, LifecycleError> {
        self.mutate(
            request_id,
            Operation::CloseWithoutSelection { client_id, reason },
            idempotency_key,
        )
        .await
    }

    pub async fn complete_by_professional(
        &self,
        request_id: Uuid,
        professional_id: Uuid,
        idempotency_key: Option<String>,
    ) -> Result<ServiceRequest, LifecycleError> {
        self.mutate(
            request_id,
            Operation::Complete { professional_id },
            idempotency_key,
        )
        .await
    }

    pub async fn rate_and_close(
        &self,
        request_id: Uuid,
        client_id: Uuid,
        rating: u8,
        comment: String,
        idempotency_key: Option<String>,
    ) -> Result<ServiceRequest, LifecycleError> {
        self.mutate(
            request_id,
            Operation::RateAndClose {
                client_id,
                rating,
                comment,
            },
            idempotency_key,
        )
        .await
    }

    pub async fn cancel_request(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
        reason: String,
        idempotency_key: Option<String>,
    ) -> Result<ServiceRequest, LifecycleError> {
        self.mutate(
            request_id,
            Operation::Cancel { caller_id, reason },
            idempotency_key,
        )
        .await
    }

    pub async fn update_request_details(
        &self,
        request_id: Uuid,
        client_id: Uuid,
        patch: RequestDetailsPatch,
        idempotency_key: Option<String>,
    ) -> Result<ServiceRequest, LifecycleError> {
        self.mutate(
            request_id,
            Operation::UpdateDetails { client_id, patch },
            idempotency_key,
        )
        .await
    }

    /// Visible to the owner and to every professional who accepted.
    pub async fn get_request(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
    ) -> Result<ServiceRequest, LifecycleError> {
        let aggregate = self.load_existing(request_id).await?;
        if !aggregate.is_visible_to(caller_id) {
            return Err(LifecycleError::forbidden(
                aggregate.status(),
                "caller is neither the owner nor an accepting professional",
            ));
        }
        Ok(aggregate.request)
    }

    /// The acceptance ledger of a request, for its owner.
    pub async fn list_professionals(
        &self,
        request_id: Uuid,
        client_id: Uuid,
    ) -> Result<RequestAggregate, LifecycleError> {
        let aggregate = self.load_existing(request_id).await?;
        if aggregate.request.client_id != client_id {
            return Err(LifecycleError::forbidden(
                aggregate.status(),
                "caller does not own this request",
            ));
        }
        Ok(aggregate)
    }

    pub async fn list_acceptances_for(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<ProfessionalAcceptance>, LifecycleError> {
        let rows = retry_transient(self.policy.store_retry_attempts, || {
            self.store.acceptances_by_professional(professional_id)
        })
        .await?;
        Ok(rows)
    }

    async fn mutate(
        &self,
        request_id: Uuid,
        op: Operation,
        idempotency_key: Option<String>,
    ) -> Result<ServiceRequest, LifecycleError> {
        let execution = self.execute(request_id, op, idempotency_key).await?;
        Ok(execution.aggregate.request)
    }

    #[tracing::instrument(skip_all, fields(request_id = %request_id, operation = %op.kind()))]
    async fn execute(
        &self,
        request_id: Uuid,
        op: Operation,
        idempotency_key: Option<String>,
    ) -> Result<Execution, LifecycleError> {
        let key = normalize_key(idempotency_key)?;
        let _guard = self
            .locks
            .acquire(request_id, self.policy.lock_timeout)
            .await
            .map_err(|e| LifecycleError::unavailable(e.to_string()))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut aggregate = self.load_existing(request_id).await?;

            if let Some(key) = &key {
                if let Some(record) = self.find_key(request_id, op.actor_id(), key).await? {
                    return replay(aggregate, &op, record);
                }
            }

            let expected_version = aggregate.request.version;
            let loaded_status = aggregate.status();
            let now = OffsetDateTime::now_utc();
            let applied = aggregate.apply(&op, now, &self.policy)?;
            let Applied {
                transition,
                actor_id,
                acceptance,
                duplicate,
            } = applied;
            let Some(transition) = transition else {
                tracing::debug!(actor_id = %actor_id, "Operation changed nothing");
                return Ok(Execution {
                    aggregate,
                    acceptance,
                    duplicate,
                });
            };

            aggregate.request.version = expected_version + 1;
            let record = key.as_ref().map(|k| {
                IdempotencyRecord::new(
                    request_id,
                    actor_id,
                    k.clone(),
                    op.kind().as_str(),
                    op.fingerprint(),
                    request_id,
                    now,
                )
            });
            let committed = retry_transient(self.policy.store_retry_attempts, || {
                self.store
                    .commit(&aggregate, expected_version, record.as_ref())
            })
            .await;

            match committed {
                Ok(()) => {
                    tracing::info!(
                        actor_id = %actor_id,
                        transition = %transition,
                        from = %loaded_status,
                        to = %aggregate.status(),
                        "Lifecycle transition committed"
                    );
                    self.emitter.emit(LifecycleEvent::new(
                        transition,
                        actor_id,
                        aggregate.request.clone(),
                        now,
                    ));
                    return Ok(Execution {
                        aggregate,
                        acceptance,
                        duplicate: false,
                    });
                }
                Err(StoreError::VersionConflict(_) | StoreError::KeyTaken { .. })
                    if attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    tracing::debug!(attempt, "Lost commit race, re-evaluating");
                }
                Err(StoreError::VersionConflict(_) | StoreError::KeyTaken { .. }) => {
                    tracing::warn!(attempt, "Giving up after repeated commit races");
                    return Err(LifecycleError::conflict(
                        loaded_status,
                        "request is being modified concurrently",
                    ));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to commit transition");
                    return Err(e.into());
                }
            }
        }
    }

    async fn load_existing(&self, request_id: Uuid) -> Result<RequestAggregate, LifecycleError> {
        retry_transient(self.policy.store_retry_attempts, || self.store.load(request_id))
            .await?
            .ok_or_else(|| {
                LifecycleError::not_found(None, format!("request {request_id} not found"))
            })
    }

    async fn find_key(
        &self,
        scope: Uuid,
        actor_id: Uuid,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, LifecycleError> {
        let record = retry_transient(self.policy.store_retry_attempts, || {
            self.store.idempotency_record(scope, actor_id, key)
        })
        .await?;
        Ok(record)
    }

    async fn replay_create(
        &self,
        record: IdempotencyRecord,
        fingerprint: &str,
    ) -> Result<ServiceRequest, LifecycleError> {
        if record.operation != OperationKind::Create.as_str() {
            return Err(key_reused(&record, OperationKind::Create, None));
        }
        if record.fingerprint != fingerprint {
            return Err(arguments_changed(&record, None));
        }
        tracing::debug!(request_id = %record.request_id, key = %record.key, "Replaying create");
        Ok(self.load_existing(record.request_id).await?.request)
    }
}

fn replay(
    aggregate: RequestAggregate,
    op: &Operation,
    record: IdempotencyRecord,
) -> Result<Execution, LifecycleError> {
    if record.operation != op.kind().as_str() {
        return Err(key_reused(&record, op.kind(), Some(aggregate.status())));
    }
    // Lookups are per actor, so only the original caller reaches this point.
    if record.fingerprint != op.fingerprint() {
        return Err(arguments_changed(&record, Some(aggregate.status())));
    }
    let acceptance = match op {
        Operation::Accept { professional_id } | Operation::Select { professional_id, .. } => {
            aggregate.ledger.find(*professional_id).cloned()
        }
        _ => None,
    };
    tracing::debug!(key = %record.key, "Replaying idempotent call");
    Ok(Execution {
        aggregate,
        acceptance,
        duplicate: true,
    })
}

fn key_reused(
    record: &IdempotencyRecord,
    attempted: OperationKind,
    status: Option<RequestStatus>,
) -> LifecycleError {
    LifecycleError::validation(
        status,
        format!(
            "idempotency key {:?} was already used for {}, not {attempted}",
            record.key, record.operation
        ),
    )
}

fn arguments_changed(record: &IdempotencyRecord, status: Option<RequestStatus>) -> LifecycleError {
    LifecycleError::validation(
        status,
        format!(
            "idempotency key {:?} was already used for {} with different arguments",
            record.key, record.operation
        ),
    )
}

/// Blank keys count as absent.
fn normalize_key(key: Option<String>) -> Result<Option<String>, LifecycleError> {
    let Some(key) = key else {
        return Ok(None);
    };
    let key = key.trim();
    if key.is_empty() {
        return Ok(None);
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(LifecycleError::validation(
            None,
            format!("idempotency key must be at most {MAX_IDEMPOTENCY_KEY_LEN} bytes"),
        ));
    }
    Ok(Some(key.to_string()))
}
