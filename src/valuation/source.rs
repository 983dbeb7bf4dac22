use crate::error::AppError;
use crate::session::SessionId;
use futures_util::future::BoxFuture;

/// One request for the session's current realtime valuation.
///
/// The returned future owns everything it needs so it can be spawned. It is
/// never retried by the implementation; polling cadence belongs to the caller.
pub trait ValueFetcher: Send + Sync {
    fn fetch_realtime_value(
        &self,
        session_id: &SessionId,
    ) -> BoxFuture<'static, Result<f64, AppError>>;
}

/// The holdings-derived valuation that realtime values are compared against.
pub trait BaseValueSource: Send + Sync {
    fn fetch_base_value(
        &self,
        session_id: &SessionId,
    ) -> BoxFuture<'static, Result<f64, AppError>>;
}
