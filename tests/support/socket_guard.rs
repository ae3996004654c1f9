//! Skips wiremock-backed tests where localhost sockets are unavailable.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "RECIPE_FINDER_REQUIRE_SOCKET_TESTS";

fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock catalog, or returns `None` (after logging) when binding fails.
///
/// Panics instead of skipping when `RECIPE_FINDER_REQUIRE_SOCKET_TESTS` is set.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl std::future::Future<Output = Option<MockServer>> {
    let location = Location::caller();
    let can_bind = TcpListener::bind("127.0.0.1:0").is_ok();
    async move {
        if can_bind {
            return Some(MockServer::start().await);
        }
        let message = format!(
            "[socket-bound-test] cannot bind a localhost socket at {}:{}",
            location.file(),
            location.line()
        );
        if socket_tests_required() {
            panic!("{message}; unset {REQUIRE_ENV} to allow skipping");
        }
        eprintln!("{message}; skipping (set {REQUIRE_ENV}=1 to fail instead)");
        None
    }
}
