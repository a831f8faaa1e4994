//! HTTP API module for the Incentive Engine.
//!
//! This module exposes the calculation and approval workflow as JSON
//! endpoints over an [`crate::service::IncentiveService`].

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{
    AdjustRequest, ApproveRequest, BatchRequest, BulkApproveRequest, CreateAdjustmentRequest,
    DelegateRequest, EscalateRequest, FindQuery, PayRequest, RecalculateRequest, RejectRequest,
    SubmitRequest, VoidRequest,
};
pub use response::{ApiError, ApiErrorResponse, BatchItemResponse};
pub use state::AppState;
