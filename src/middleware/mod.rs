mod client_ctx;

pub use client_ctx::{ClientCtx, ClientCtxInner, SESSION_USER_KEY, SESSION_VERIFIED_KEY};
