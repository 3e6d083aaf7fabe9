use std::sync::Mutex;

use strand::config::{CONFIG_ENV, Config, LISTEN_ENV};

// Tests touching process environment must not interleave.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_config_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.server.pools, 4);
    assert_eq!(cfg.static_files.mount, "static");
    assert!(cfg.static_files.not_found_page.is_none());
    assert_eq!(cfg.log_level, "info");
}

#[test]
fn test_config_empty_yaml_is_default() {
    let cfg = Config::from_yaml("").unwrap();
    assert_eq!(cfg.server.listen_addr, Config::default().server.listen_addr);
}

#[test]
fn test_config_partial_yaml_keeps_other_defaults() {
    let yaml = r#"
server:
  listen_addr: "0.0.0.0:9000"
  pools: 2
static_files:
  root: "/srv/www"
  not_found_page: "/srv/www/404.html"
log_level: debug
"#;
    let cfg = Config::from_yaml(yaml).unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:9000");
    assert_eq!(cfg.server.pools, 2);
    assert_eq!(cfg.server.max_connections, 1024);
    assert_eq!(cfg.static_files.mount, "static");
    assert_eq!(cfg.static_files.root.to_str(), Some("/srv/www"));
    assert_eq!(
        cfg.static_files.not_found_page.as_deref().and_then(|p| p.to_str()),
        Some("/srv/www/404.html")
    );
    assert_eq!(cfg.log_level, "debug");
}

#[test]
fn test_config_rejects_zero_pools() {
    assert!(Config::from_yaml("server:\n  pools: 0\n").is_err());
}

#[test]
fn test_config_rejects_tiny_receive_buffer() {
    assert!(Config::from_yaml("server:\n  receive_buffer: 8\n").is_err());
}

#[test]
fn test_config_rejects_malformed_yaml() {
    assert!(Config::from_yaml("server: [not, a, map").is_err());
}

#[test]
fn test_config_poll_timeout() {
    let cfg = Config::from_yaml("server:\n  poll_timeout_ms: 20\n").unwrap();
    assert_eq!(cfg.server.poll_timeout().as_millis(), 20);
}

#[test]
fn test_config_load_from_file_with_listen_override() {
    let _guard = ENV_LOCK.lock().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strand.yaml");
    std::fs::write(&path, "server:\n  listen_addr: \"127.0.0.1:7000\"\n  pools: 3\n").unwrap();

    unsafe {
        std::env::set_var(CONFIG_ENV, &path);
        std::env::remove_var(LISTEN_ENV);
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:7000");
    assert_eq!(cfg.server.pools, 3);

    unsafe {
        std::env::set_var(LISTEN_ENV, "0.0.0.0:3000");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.server.pools, 3);

    unsafe {
        std::env::remove_var(CONFIG_ENV);
        std::env::remove_var(LISTEN_ENV);
    }
}

#[test]
fn test_config_missing_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();

    unsafe {
        std::env::set_var(CONFIG_ENV, "/nonexistent/strand.yaml");
    }
    let result = Config::load();
    unsafe {
        std::env::remove_var(CONFIG_ENV);
    }
    assert!(result.is_err());
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.server.listen_addr, cfg2.server.listen_addr);
}
