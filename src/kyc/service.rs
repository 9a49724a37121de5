use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use super::model::{KycApplication, KycStatus, KycStatusResponse, SubmitKycRequest};
use crate::error::ServiceError;

const COLUMNS: &str = "id, user_id, full_name, document_type, document_number, nationality, status, submitted_at, reviewed_at";

pub struct KycService {
    db_pool: SqlitePool,
}

impl KycService {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// File a new application. Refused while one is pending or after approval.
    pub async fn submit(
        &self,
        user_id: Uuid,
        req: SubmitKycRequest,
    ) -> Result<KycApplication, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        if let Some(latest) = self.latest(user_id).await? {
            match latest.status {
                KycStatus::Pending => {
                    return Err(ServiceError::Conflict(
                        "A KYC application is already under review".to_string(),
                    ))
                }
                KycStatus::Approved => {
                    return Err(ServiceError::Conflict("KYC is already approved".to_string()))
                }
                KycStatus::Rejected => {}
            }
        }

        let application = KycApplication {
            id: Uuid::new_v4(),
            user_id,
            full_name: req.full_name.trim().to_string(),
            document_type: req.document_type,
            document_number: req.document_number.trim().to_string(),
            nationality: req.nationality.trim().to_string(),
            status: KycStatus::Pending,
            submitted_at: Utc::now(),
            reviewed_at: None,
        };

        sqlx::query(&format!(
            "INSERT INTO kyc_applications ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            COLUMNS
        ))
        .bind(application.id)
        .bind(application.user_id)
        .bind(&application.full_name)
        .bind(application.document_type)
        .bind(&application.document_number)
        .bind(&application.nationality)
        .bind(application.status)
        .bind(application.submitted_at)
        .bind(application.reviewed_at)
        .execute(&self.db_pool)
        .await?;

        tracing::info!(user_id = %user_id, application_id = %application.id, "KYC application submitted");

        Ok(application)
    }

    pub async fn status(&self, user_id: Uuid) -> Result<KycStatusResponse, ServiceError> {
        let application = self.latest(user_id).await?;
        Ok(KycStatusResponse {
            status: application.as_ref().map(|a| a.status),
            application,
        })
    }

    /// Approve or reject a pending application
    pub async fn review(
        &self,
        application_id: Uuid,
        status: KycStatus,
    ) -> Result<KycApplication, ServiceError> {
        if status == KycStatus::Pending {
            return Err(ServiceError::Validation(
                "Review must approve or reject".to_string(),
            ));
        }

        let updated = sqlx::query(
            "UPDATE kyc_applications SET status = ?, reviewed_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(application_id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        let application: KycApplication = sqlx::query_as(&format!(
            "SELECT {} FROM kyc_applications WHERE id = ?",
            COLUMNS
        ))
        .bind(application_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("KYC application".to_string()))?;

        if updated == 0 {
            return Err(ServiceError::Conflict(
                "KYC application was already reviewed".to_string(),
            ));
        }

        tracing::info!(application_id = %application_id, status = ?status, "KYC application reviewed");

        Ok(application)
    }

    async fn latest(&self, user_id: Uuid) -> Result<Option<KycApplication>, ServiceError> {
        let application = sqlx::query_as(&format!(
            "SELECT {} FROM kyc_applications WHERE user_id = ? ORDER BY submitted_at DESC LIMIT 1",
            COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kyc::DocumentType;
    use crate::test_support;

    fn request() -> SubmitKycRequest {
        SubmitKycRequest {
            full_name: "Ayesha Khan".to_string(),
            document_type: DocumentType::Cnic,
            document_number: "35202-1234567-1".to_string(),
            nationality: "Pakistani".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_and_review_flow() {
        let pool = test_support::pool().await;
        let user_id = test_support::seed_user(&pool, "kyc@example.com").await;
        let service = KycService::new(pool);

        assert_eq!(service.status(user_id).await.unwrap().status, None);

        let application = service.submit(user_id, request()).await.unwrap();
        assert_eq!(
            service.status(user_id).await.unwrap().status,
            Some(KycStatus::Pending)
        );

        // Only one pending application at a time
        assert!(matches!(
            service.submit(user_id, request()).await,
            Err(ServiceError::Conflict(_))
        ));

        let reviewed = service
            .review(application.id, KycStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(reviewed.status, KycStatus::Rejected);
        assert!(reviewed.reviewed_at.is_some());
        assert!(matches!(
            service.review(application.id, KycStatus::Approved).await,
            Err(ServiceError::Conflict(_))
        ));

        // A rejected applicant may resubmit
        assert!(service.submit(user_id, request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_validation() {
        let pool = test_support::pool().await;
        let user_id = test_support::seed_user(&pool, "kyc2@example.com").await;
        let service = KycService::new(pool);

        let mut req = request();
        req.document_number = "1".to_string();
        assert!(matches!(
            service.submit(user_id, req).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.review(Uuid::new_v4(), KycStatus::Approved).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
