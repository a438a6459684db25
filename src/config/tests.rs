use super::types::*;
use crate::directory::{HostEntry, HostStatus, ServiceRecord};
use std::path::Path;
use std::time::Duration;

fn write_tmp(name: &str, content: &str) -> std::path::PathBuf {
    let tmp = std::env::temp_dir().join(name);
    std::fs::write(&tmp, content).unwrap();
    tmp
}

#[test]
fn test_load_directory_toml() {
    let toml = r#"
listen = "127.0.0.1:9000"

[health_check]
interval_ms = 500
concurrency = 8

[[services]]
id = "svcA"
port = 7777
hosts = [{ ip = "10.0.0.1" }, { ip = "10.0.0.2", status = "active" }]

[[services]]
id = "svcB"
port = 7778
"#;
    let tmp = write_tmp("relay_test_directory.toml", toml);
    let cfg = DirectoryConfig::load(&tmp).unwrap();
    assert_eq!(cfg.listen, "127.0.0.1:9000");
    assert_eq!(cfg.health_check.interval(), Duration::from_millis(500));
    assert_eq!(cfg.health_check.timeout(), Duration::from_millis(500));
    assert_eq!(cfg.health_check.concurrency, 8);
    assert_eq!(cfg.health_check.path, "/health");
    assert_eq!(cfg.services.len(), 2);
    assert_eq!(cfg.services[0].hosts[1].status, HostStatus::Active);
    assert!(cfg.services[1].hosts.is_empty());
    std::fs::remove_file(&tmp).ok();
}

#[test]
fn test_load_directory_json() {
    let json = r#"{
        "services": [{"id": "svcA", "hosts": [{"IP": "10.0.0.1"}], "port": 7777}]
    }"#;
    let tmp = write_tmp("relay_test_directory.json", json);
    let cfg = DirectoryConfig::load(&tmp).unwrap();
    assert_eq!(cfg.listen, "0.0.0.0:8081");
    assert_eq!(cfg.services[0].hosts[0].address, "10.0.0.1");
    std::fs::remove_file(&tmp).ok();
}

#[test]
fn test_load_directory_yaml_registry_format() {
    let yaml = r#"
services:
  - id: svcA
    hosts:
      - ip: 10.0.0.1
        status: ""
      - ip: 10.0.0.2
        status: active
    port: 7777
  - id: svcB
    hosts:
      - ip: 10.0.1.1
    port: 7778
"#;
    let tmp = write_tmp("relay_test_registry.yaml", yaml);
    let cfg = DirectoryConfig::load(&tmp).unwrap();
    assert_eq!(cfg.listen, "0.0.0.0:8081");
    assert_eq!(cfg.services.len(), 2);
    assert_eq!(cfg.services[0].name, "svcA");
    assert_eq!(cfg.services[0].port, 7777);
    assert_eq!(cfg.services[0].hosts[0].address, "10.0.0.1");
    assert_eq!(cfg.services[0].hosts[0].status, HostStatus::Unknown);
    assert_eq!(cfg.services[0].hosts[1].status, HostStatus::Active);
    assert_eq!(cfg.services[1].hosts[0].status, HostStatus::Unknown);
    std::fs::remove_file(&tmp).ok();
}

#[test]
fn test_load_directory_yml_extension() {
    let tmp = write_tmp("relay_test_registry.yml", "services: []\n");
    let cfg = DirectoryConfig::load(&tmp).unwrap();
    assert!(cfg.services.is_empty());
    std::fs::remove_file(&tmp).ok();
}

#[test]
fn test_load_directory_missing_file_fails() {
    let err = DirectoryConfig::load(Path::new("/nonexistent/relay-directory.json")).unwrap_err();
    assert!(err.to_string().contains("no valid configuration in"));
}

#[test]
fn test_load_gateway_missing_file_uses_defaults() {
    let cfg = GatewayConfig::load(Path::new("/nonexistent/relay-gateway.toml")).unwrap();
    assert_eq!(cfg.upstream.scheme, "http");
}

#[test]
fn test_unsupported_extension_fails() {
    let tmp = write_tmp("relay_test_directory.ini", "services = []");
    assert!(DirectoryConfig::load(&tmp).is_err());
    std::fs::remove_file(&tmp).ok();
}

#[test]
fn test_explicit_probe_timeout() {
    let hc = HealthCheckConfig {
        interval_ms: 1000,
        timeout_ms: Some(250),
        ..Default::default()
    };
    assert_eq!(hc.timeout(), Duration::from_millis(250));
}

#[test]
fn test_validate_duplicate_service_fails() {
    let cfg = DirectoryConfig {
        services: vec![
            ServiceRecord::new("svcA", vec![], 80),
            ServiceRecord::new("svcA", vec![], 81),
        ],
        ..Default::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_validate_zero_port_fails() {
    let cfg = DirectoryConfig {
        services: vec![ServiceRecord::new("svcA", vec![HostEntry::new("h")], 0)],
        ..Default::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_validate_empty_host_fails() {
    let cfg = DirectoryConfig {
        services: vec![ServiceRecord::new("svcA", vec![HostEntry::new("")], 80)],
        ..Default::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_validate_zero_interval_fails() {
    let cfg = DirectoryConfig {
        health_check: HealthCheckConfig {
            interval_ms: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_validate_zero_threshold_fails() {
    let cfg = DirectoryConfig {
        health_check: HealthCheckConfig {
            unhealthy_threshold: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_gateway_defaults() {
    let cfg = GatewayConfig::default();
    assert_eq!(cfg.listen, "0.0.0.0:8080");
    assert_eq!(cfg.discovery.address, "http://localhost:8081");
    assert_eq!(cfg.discovery.poll_interval(), Duration::from_secs(1));
    assert_eq!(cfg.access.public_routes, vec!["/".to_string()]);
    assert_eq!(cfg.access.token, "validToken");
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_load_gateway_toml() {
    let toml = r#"
listen = "127.0.0.1:8088"

[discovery]
address = "http://registry:8081"
poll_interval_ms = 2000

[access]
public_routes = ["/", "/status"]
"#;
    let tmp = write_tmp("relay_test_gateway.toml", toml);
    let cfg = GatewayConfig::load(&tmp).unwrap();
    assert_eq!(cfg.listen, "127.0.0.1:8088");
    assert_eq!(cfg.discovery.poll_interval_ms, 2000);
    assert_eq!(cfg.access.public_routes.len(), 2);
    assert_eq!(cfg.access.token, "validToken");
    std::fs::remove_file(&tmp).ok();
}

#[test]
fn test_validate_gateway_bad_scheme_fails() {
    let mut cfg = GatewayConfig::default();
    cfg.upstream.scheme = "ftp".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_validate_gateway_relative_public_route_fails() {
    let mut cfg = GatewayConfig::default();
    cfg.access.public_routes = vec!["status".to_string()];
    assert!(cfg.validate().is_err());
}
