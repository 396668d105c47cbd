/// rclone remote-control (RC) API endpoints used by the configuration core

/// Configuration management endpoints
pub mod config {
    pub const CREATE: &str = "config/create";
    pub const UPDATE: &str = "config/update";
    pub const DELETE: &str = "config/delete";
    pub const GET: &str = "config/get";
    pub const LISTREMOTES: &str = "config/listremotes";
    pub const PROVIDERS: &str = "config/providers";
}

/// Option schema endpoints
pub mod options {
    pub const INFO: &str = "options/info";
}

/// Mount endpoints
pub mod mount {
    pub const MOUNT: &str = "mount/mount";
}

/// Transfer job endpoints
pub mod sync {
    pub const SYNC: &str = "sync/sync";
    pub const COPY: &str = "sync/copy";
    pub const MOVE: &str = "sync/move";
    pub const BISYNC: &str = "sync/bisync";
}

/// Serve endpoints
pub mod serve {
    pub const START: &str = "serve/start";
}

/// Join a base URL and an endpoint path without doubling slashes
pub fn build_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        assert_eq!(
            build_url("http://127.0.0.1:5572/", config::CREATE),
            "http://127.0.0.1:5572/config/create"
        );
        assert_eq!(
            build_url("http://host:1", "/options/info"),
            "http://host:1/options/info"
        );
    }
}
