//! HTTP payload types

pub mod error;
pub mod session;

pub use error::{ApiError, ApiErrorResponse};
pub use session::{
    AnswerView, ErrorView, MessageView, SessionCreated, Speaker, StepView, TurnRequest, UsageView,
};
