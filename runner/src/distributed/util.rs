use once_cell::sync::Lazy;
use tracing::warn;

static NODE_NAME: Lazy<String> = Lazy::new(hostname);

#[cfg(unix)]
fn hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(hostname) => hostname.to_string_lossy().into_owned(),
        Err(error) => {
            warn!(error = ?error, "Failed to retrieve hostname for rank logging: {error}");

            String::from("unknown")
        }
    }
}

#[cfg(not(unix))]
fn hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|error| {
        warn!(error = ?error, "Failed to retrieve hostname for rank logging: {error}");

        String::from("unknown")
    })
}

/// hostname of the node this rank runs on
pub fn node_name() -> &'static str {
    NODE_NAME.as_str()
}
