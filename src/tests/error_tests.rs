#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    use crate::error::{AppError, AppResult, AuditError, FolioError, OptionExt, StoreError};

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let error = AppError::BadRequest("Invalid input".to_string());
        assert_eq!(format!("{}", error), "Bad request: Invalid input");

        let error = AppError::ValidationError { field: "count".into(), message: "too big".into() };
        assert_eq!(format!("{}", error), "Validation error on field 'count': too big");

        let error = AppError::AllocationFailed("locked".into());
        assert_eq!(format!("{}", error), "Folio allocation failed: locked");
    }

    #[test]
    fn test_folio_errors_map_to_distinct_kinds() {
        let validation = FolioError::Validation { field: "count", message: "must be positive".into() };
        assert!(matches!(
            AppError::from(validation),
            AppError::ValidationError { ref field, .. } if field == "count"
        ));

        let failure = FolioError::AllocationFailed(sqlx::Error::PoolTimedOut);
        assert!(matches!(AppError::from(failure), AppError::AllocationFailed(_)));
    }

    #[test]
    fn test_store_errors_map() {
        let err: AppError = StoreError::UnknownEntity("x".into()).into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = StoreError::NotFound { entity: "inv_bienes".into(), id: 3 }.into();
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("inv_bienes record 3")));

        let err: AppError = StoreError::Audit(AuditError::WriteFailed(sqlx::Error::PoolClosed)).into();
        assert!(matches!(err, AppError::AuditWriteFailed(_)));

        let err: AppError = StoreError::Audit(AuditError::InvalidMutation("bad".into())).into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_error_response_bodies() {
        let (status, body) = body_json(AppError::AllocationFailed("database is locked".into())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "ALLOCATION_FAILED");
        assert_eq!(body["error"]["details"]["retryable"], true);

        let (status, body) = body_json(AppError::AuditWriteFailed("no such table".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "AUDIT_WRITE_FAILED");

        let (status, body) = body_json(AppError::Forbidden("nope".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], 403);
        assert!(body["timestamp"].is_string());

        let (status, body) = body_json(AppError::Internal(anyhow::anyhow!("boom"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]["details"]["error_id"].is_string());
    }

    #[test]
    fn test_sqlx_error_conversion() {
        assert!(matches!(AppError::from(sqlx::Error::RowNotFound), AppError::NotFound(_)));
        assert!(matches!(AppError::from(sqlx::Error::PoolTimedOut), AppError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_option_ext() {
        let some: Option<i32> = Some(42);
        assert_eq!(some.ok_or_not_found("Value").unwrap(), 42);

        let none: Option<i32> = None;
        let result: AppResult<i32> = none.ok_or_not_found("Record");
        assert!(matches!(result, Err(AppError::NotFound(ref m)) if m == "Record not found"));
    }
}
