pub const fn project_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

/// Identifier used as `server` and `user-agent` header value.
pub const fn server_identifier() -> &'static str {
    concat!("eventing-thpt/", env!("CARGO_PKG_VERSION"))
}
