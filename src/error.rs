//! Pipeline error taxonomy.
//!
//! The orchestrator matches on these variants to pick its policy:
//!   - `RateLimited` gets exactly one bounded retry, then template fallback.
//!   - Everything else (provider/transport/response-shape) falls back at once.
//!   - `Config` is raised by client construction only, before any network I/O;
//!     a pipeline built without a client serves templates for every unit.

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Provider credential missing from process configuration.
  #[error("provider credential missing (set OPENAI_API_KEY)")]
  Config,

  /// The provider signalled its rate-limit condition (transient).
  #[error("provider rate limit hit")]
  RateLimited,

  /// Non-2xx provider response that is not a rate limit.
  #[error("provider HTTP {status}: {body}")]
  Provider { status: u16, body: String },

  /// The request never produced an HTTP response (DNS, TLS, timeout...).
  #[error("provider transport failure: {0}")]
  Transport(#[from] reqwest::Error),

  /// 2xx response missing the expected text payload.
  #[error("provider response missing text payload")]
  MalformedResponse,

  /// All parse strategies exhausted without recovering a JSON object.
  #[error("no parse strategy could extract a usable object")]
  Parse,

  /// A strategy produced an object, but a mandatory field is absent or empty.
  #[error("parsed object missing mandatory field `{0}`")]
  Schema(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
