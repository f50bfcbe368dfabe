use offsync_model::ModelError;
use offsync_sync::{MAX_BATCH_SIZE, SessionConfig, SessionState, SyncError};

#[test]
fn session_config_uses_protocol_batch_size() {
    assert_eq!(SessionConfig::default().batch_size, MAX_BATCH_SIZE);
}

#[test]
fn session_state_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&SessionState::Fetching).unwrap(),
        r#""fetching""#
    );
}

#[test]
fn retryable_errors() {
    assert!(SyncError::Network("reset".into()).is_retryable());
    assert!(SyncError::Timeout.is_retryable());
    assert!(
        SyncError::SessionAlreadyActive {
            entity_type: "Order".into()
        }
        .is_retryable()
    );
}

#[test]
fn contract_violations_are_not_retryable() {
    let model = SyncError::from(ModelError::IdentityResolution {
        entity_type: "Note".into(),
        reason: "no identifier properties".into(),
    });
    assert!(!model.is_retryable());
    assert!(
        !SyncError::TypeMismatch {
            expected: "Order".into(),
            found: "Product".into()
        }
        .is_retryable()
    );
    assert!(!SyncError::Protocol("bad".into()).is_retryable());
    assert!(!SyncError::Cancelled.is_retryable());
}

#[test]
fn model_errors_display_transparently() {
    let err = SyncError::from(ModelError::IdentityResolution {
        entity_type: "Note".into(),
        reason: "no identifier properties".into(),
    });
    assert_eq!(
        err.to_string(),
        ModelError::IdentityResolution {
            entity_type: "Note".into(),
            reason: "no identifier properties".into(),
        }
        .to_string()
    );
}
