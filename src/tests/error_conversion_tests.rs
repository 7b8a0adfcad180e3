//! Classification of RPC client errors into the pipeline taxonomy

use crate::errors::PipelineError;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::{RpcError, RpcResponseErrorData};

fn response_error(code: i64, message: &str) -> ClientError {
    ClientError::from(ClientErrorKind::RpcError(RpcError::RpcResponseError {
        code,
        message: message.to_string(),
        data: RpcResponseErrorData::Empty,
    }))
}

#[test]
fn test_server_error_keeps_code() {
    let err: PipelineError = response_error(500, "Internal server error").into();

    match &err {
        PipelineError::Rpc { message, code } => {
            assert_eq!(*code, Some(500));
            assert!(message.contains("Internal server error"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_retryable());
}

#[test]
fn test_invalid_params_is_fatal() {
    let err: PipelineError = response_error(-32602, "Invalid params").into();
    assert_eq!(err.category(), "rpc");
    assert!(!err.is_retryable());
}

#[test]
fn test_blockhash_not_found_is_expiry() {
    let err: PipelineError = response_error(
        -32002,
        "Transaction simulation failed: Blockhash not found",
    )
    .into();
    assert!(err.requires_rebuild());
}

#[test]
fn test_rate_limit_is_retryable() {
    let err: PipelineError = ClientError::from(ClientErrorKind::Custom(
        "HTTP status client error (429 Too Many Requests)".to_string(),
    ))
    .into();

    assert!(matches!(err, PipelineError::Rpc { code: Some(429), .. }));
    assert!(err.is_retryable());
}

#[test]
fn test_io_error_is_transient() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
    let err: PipelineError = ClientError::from(io).into();
    assert!(matches!(err, PipelineError::Rpc { code: None, .. }));
    assert!(err.is_retryable());
}
