//! Bulk uploader.
//!
//! Posts records to the destination one at a time. Each record is
//! independent: a failure is recorded in the caller's [`ErrorLedger`] and
//! the batch moves on. There is no retry at this level.

mod ledger;

pub use ledger::{ErrorLedger, FailureRecord};

use std::future::Future;

use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::destination::{Destination, DestinationError};
use crate::model::{Contact, DestinationContactPayload};

/// Counts for one upload batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Post every record in order.
///
/// `identify` names a record for logs and failure entries and gives its
/// source id; `post` maps and sends one record.
pub async fn upload_all<R, I, P, Fut>(
    records: &[R],
    identify: I,
    post: P,
    ledger: &mut ErrorLedger,
    audit: &AuditHandle,
) -> UploadReport
where
    I: Fn(&R) -> (String, Option<i64>),
    P: Fn(&R) -> Fut,
    Fut: Future<Output = Result<(), DestinationError>>,
{
    let mut report = UploadReport::default();

    for record in records {
        let (identifier, source_id) = identify(record);
        report.attempted += 1;

        match post(record).await {
            Ok(()) => {
                report.succeeded += 1;
                info!(record = %identifier, "Record uploaded");
                audit
                    .emit(AuditEvent::RecordUploaded { identifier })
                    .await;
            }
            Err(e) => {
                report.failed += 1;
                warn!(record = %identifier, error = %e, "Record upload failed");
                audit
                    .emit(AuditEvent::RecordFailed {
                        identifier: identifier.clone(),
                        error: e.to_string(),
                    })
                    .await;
                ledger.record(FailureRecord::new(identifier, source_id, e));
            }
        }
    }

    report
}

/// Upload source contacts as destination end-user contacts.
pub async fn upload_contacts(
    contacts: &[Contact],
    destination: &dyn Destination,
    ledger: &mut ErrorLedger,
    audit: &AuditHandle,
) -> UploadReport {
    upload_all(
        contacts,
        |c| {
            let identifier = c
                .email_address
                .clone()
                .unwrap_or_else(|| format!("contact {}", c.id));
            (identifier, Some(c.id))
        },
        |c| {
            let payload = DestinationContactPayload::from(c);
            async move { destination.post_contact(&payload).await }
        },
        ledger,
        audit,
    )
    .await
}
