mod http_fallback;
mod rollback;
mod session_slot;
