//! Per-request record of which professionals have accepted a request.
//!
//! Rows are only ever appended. The outcome of a row changes exactly once
//! when the request is bound, completed, or closed without a selection; the
//! lifecycle engine is the only caller of the `mark_*` methods.

use crate::entities::AcceptanceOutcome;
use crate::entities::acceptance::Acceptance;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("professional {professional_id} already accepted this request")]
    AlreadyAccepted { professional_id: Uuid },

    #[error("professional {professional_id} has not accepted this request")]
    NotAccepted { professional_id: Uuid },

    #[error("professional {professional_id} is already bound to this request")]
    AlreadySelected { professional_id: Uuid },

    #[error("no professional is bound to this request")]
    NoneSelected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceLedger {
    request_id: Uuid,
    rows: Vec<Acceptance>,
}

impl AcceptanceLedger {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            rows: Vec::new(),
        }
    }

    /// Rebuild a ledger from stored rows, restoring listing order.
    pub fn from_rows(request_id: Uuid, mut rows: Vec<Acceptance>) -> Self {
        rows.sort_by_key(|row| (row.accepted_at, row.sequence));
        Self { request_id, rows }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows ordered by `(accepted_at, sequence)`.
    pub fn list(&self) -> &[Acceptance] {
        &self.rows
    }

    pub fn find(&self, professional_id: Uuid) -> Option<&Acceptance> {
        self.rows
            .iter()
            .find(|row| row.professional_id == professional_id)
    }

    /// The row that won the request, if any.
    pub fn selected(&self) -> Option<&Acceptance> {
        self.rows.iter().find(|row| row.outcome.is_winning())
    }

    /// Append a `pending_selection` row for a professional.
    pub fn append(
        &mut self,
        professional_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Acceptance, LedgerError> {
        if self.find(professional_id).is_some() {
            return Err(LedgerError::AlreadyAccepted { professional_id });
        }
        let sequence = self
            .rows
            .iter()
            .map(|row| row.sequence)
            .max()
            .unwrap_or(0)
            + 1;
        // Clock skew between nodes must not reorder the listing.
        let accepted_at = match self.rows.last() {
            Some(last) if last.accepted_at > now => last.accepted_at,
            _ => now,
        };
        let row = Acceptance {
            id: Uuid::now_v7(),
            request_id: self.request_id,
            professional_id,
            sequence,
            accepted_at,
            outcome: AcceptanceOutcome::PendingSelection,
            updated_at: now,
        };
        self.rows.push(row.clone());
        Ok(row)
    }

    /// Bind one professional: their row becomes `selected`, every other row
    /// `not_selected`. Nothing changes on error.
    pub fn mark_selected(
        &mut self,
        professional_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<&Acceptance, LedgerError> {
        if let Some(existing) = self.selected() {
            return Err(LedgerError::AlreadySelected {
                professional_id: existing.professional_id,
            });
        }
        let index = self
            .rows
            .iter()
            .position(|row| row.professional_id == professional_id)
            .ok_or(LedgerError::NotAccepted { professional_id })?;

        for (i, row) in self.rows.iter_mut().enumerate() {
            row.outcome = if i == index {
                AcceptanceOutcome::Selected
            } else {
                AcceptanceOutcome::NotSelected
            };
            row.updated_at = now;
        }
        Ok(&self.rows[index])
    }

    /// The bound row becomes `completed`; stragglers still waiting become
    /// `completed_by_other`.
    pub fn mark_completed(&mut self, now: OffsetDateTime) -> Result<(), LedgerError> {
        if !self
            .rows
            .iter()
            .any(|row| row.outcome == AcceptanceOutcome::Selected)
        {
            return Err(LedgerError::NoneSelected);
        }
        for row in &mut self.rows {
            let next = match row.outcome {
                AcceptanceOutcome::Selected => AcceptanceOutcome::Completed,
                AcceptanceOutcome::PendingSelection => AcceptanceOutcome::CompletedByOther,
                other => other,
            };
            if next != row.outcome {
                row.outcome = next;
                row.updated_at = now;
            }
        }
        Ok(())
    }

    /// Every row still waiting becomes `not_selected`. Returns how many
    /// rows changed.
    pub fn mark_unselected_remaining(&mut self, now: OffsetDateTime) -> usize {
        let mut changed = 0;
        for row in &mut self.rows {
            if row.outcome == AcceptanceOutcome::PendingSelection {
                row.outcome = AcceptanceOutcome::NotSelected;
                row.updated_at = now;
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(professionals: &[Uuid]) -> AcceptanceLedger {
        let mut ledger = AcceptanceLedger::new(Uuid::now_v7());
        let now = OffsetDateTime::now_utc();
        for p in professionals {
            ledger.append(*p, now).unwrap();
        }
        ledger
    }

    #[test]
    fn test_append_rejects_second_row_for_same_professional() {
        let a = Uuid::now_v7();
        let mut ledger = ledger_with(&[a]);
        let err = ledger.append(a, OffsetDateTime::now_utc()).unwrap_err();
        assert_eq!(err, LedgerError::AlreadyAccepted { professional_id: a });
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_equal_timestamps_list_in_sequence_order() {
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let ledger = ledger_with(&[a, b, c]);
        let order: Vec<Uuid> = ledger.list().iter().map(|r| r.professional_id).collect();
        assert_eq!(order, vec![a, b, c]);
        let sequences: Vec<i32> = ledger.list().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_from_rows_restores_order() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let ledger = ledger_with(&[a, b]);
        let mut rows = ledger.list().to_vec();
        rows.reverse();
        let restored = AcceptanceLedger::from_rows(ledger.request_id(), rows);
        assert_eq!(restored.list()[0].professional_id, a);
    }

    #[test]
    fn test_mark_selected_flips_everyone_else() {
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let mut ledger = ledger_with(&[a, b, c]);
        let selected = ledger
            .mark_selected(b, OffsetDateTime::now_utc())
            .unwrap()
            .professional_id;
        assert_eq!(selected, b);
        assert_eq!(ledger.find(a).unwrap().outcome, AcceptanceOutcome::NotSelected);
        assert_eq!(ledger.find(b).unwrap().outcome, AcceptanceOutcome::Selected);
        assert_eq!(ledger.find(c).unwrap().outcome, AcceptanceOutcome::NotSelected);
    }

    #[test]
    fn test_mark_selected_twice_keeps_first_binding() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let mut ledger = ledger_with(&[a, b]);
        ledger.mark_selected(a, OffsetDateTime::now_utc()).unwrap();
        let err = ledger
            .mark_selected(b, OffsetDateTime::now_utc())
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadySelected { professional_id: a });
        assert_eq!(ledger.selected().unwrap().professional_id, a);
    }

    #[test]
    fn test_mark_selected_unknown_professional() {
        let mut ledger = ledger_with(&[Uuid::now_v7()]);
        let stranger = Uuid::now_v7();
        let before = ledger.clone();
        let err = ledger
            .mark_selected(stranger, OffsetDateTime::now_utc())
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::NotAccepted {
                professional_id: stranger
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_mark_completed_requires_selection() {
        let mut ledger = ledger_with(&[Uuid::now_v7()]);
        assert_eq!(
            ledger.mark_completed(OffsetDateTime::now_utc()),
            Err(LedgerError::NoneSelected)
        );
    }

    #[test]
    fn test_mark_completed_leaves_not_selected_rows() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let mut ledger = ledger_with(&[a, b]);
        ledger.mark_selected(a, OffsetDateTime::now_utc()).unwrap();
        ledger.mark_completed(OffsetDateTime::now_utc()).unwrap();
        assert_eq!(ledger.find(a).unwrap().outcome, AcceptanceOutcome::Completed);
        assert_eq!(ledger.find(b).unwrap().outcome, AcceptanceOutcome::NotSelected);
        assert_eq!(ledger.selected().unwrap().professional_id, a);
    }

    #[test]
    fn test_mark_unselected_remaining() {
        let mut ledger = ledger_with(&[Uuid::now_v7(), Uuid::now_v7()]);
        assert_eq!(ledger.mark_unselected_remaining(OffsetDateTime::now_utc()), 2);
        assert!(ledger
            .list()
            .iter()
            .all(|r| r.outcome == AcceptanceOutcome::NotSelected));
        assert_eq!(ledger.mark_unselected_remaining(OffsetDateTime::now_utc()), 0);
    }
}
