//! End-to-end scenario tests for the Wharf toolkit.

#[cfg(test)]
mod client_retry_tests;
#[cfg(test)]
mod executor_tests;
#[cfg(test)]
mod routing_tests;
#[cfg(test)]
mod static_file_tests;
#[cfg(test)]
mod sync_primitive_tests;

#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
