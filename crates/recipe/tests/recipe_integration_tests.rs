use mockito::{Server, ServerGuard};
use recipe::config::RecipeConfig;
use recipe::state::{RegistrationState, StateStore};
use recipe::{Action, HostFacts, HostRuntime, MemoryHost, Recipe};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn facts() -> HostFacts {
    HostFacts {
        hostname: "node1".to_string(),
        ipaddress: "10.0.0.5".to_string(),
    }
}

fn config(server_url: &str, dir: &Path) -> RecipeConfig {
    let mut config = RecipeConfig {
        memory: 4096,
        aerospike_ips: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
        state_file: dir.join("registration.json"),
        ..Default::default()
    };
    config.agent.url = server_url.to_string();
    config
}

async fn setup() -> (ServerGuard, TempDir) {
    (Server::new_async().await, tempfile::tempdir().unwrap())
}

#[tokio::test]
async fn test_add_then_status() {
    let (mut server, dir) = setup().await;
    let _services = server
        .mock("GET", "/v1/agent/services")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let recipe = Recipe::new(MemoryHost::new(), config(&server.url(), dir.path()), facts()).unwrap();
    assert!(recipe.run(Action::Add).await.is_ok());

    let status = recipe.status().await.unwrap();
    assert!(status.service.enabled);
    assert!(status.service.active);
    assert!(!status.registered);
    assert_eq!(status.agent_listed, Some(false));

    let expected: Vec<PathBuf> = ["init_options.sh", "config.properties", "weights.yml"]
        .iter()
        .map(|name| Path::new("/etc/rb-reputation").join(name))
        .collect();
    let paths: Vec<_> = status.files.iter().map(|(path, _)| path.clone()).collect();
    assert_eq!(paths, expected);

    for (path, info) in &status.files {
        let info = info.as_ref().unwrap_or_else(|| panic!("{} missing", path.display()));
        assert_eq!(info.mode, 0o644);
        assert_eq!(info.user, "rb-reputation");
        assert_eq!(info.group, "rb-reputation");
    }
    assert_eq!(recipe.host().file_paths().await.len(), 3);

    let config_dir = recipe.host().directory(Path::new("/etc/rb-reputation")).await.unwrap();
    assert_eq!(config_dir.mode, 0o700);
    let log_dir = recipe.host().directory(Path::new("/var/log/rb-reputation")).await.unwrap();
    assert_eq!(log_dir.mode, 0o770);
}

#[tokio::test]
async fn test_add_twice_is_idempotent() {
    let (server, dir) = setup().await;
    let recipe = Recipe::new(MemoryHost::new(), config(&server.url(), dir.path()), facts()).unwrap();

    let first = recipe.add().await.unwrap();
    let second = recipe.add().await.unwrap();

    assert_eq!(first.created_dirs.len(), 2);
    assert!(second.created_dirs.is_empty());
    assert!(second.changed_files.is_empty());
    assert!(!second.restarted);

    let restarts = recipe
        .host()
        .calls()
        .await
        .iter()
        .filter(|c| c.as_str() == "service restart rb-reputation")
        .count();
    assert_eq!(restarts, 1);
}

#[tokio::test]
async fn test_changed_values_rerender_and_restart() {
    let (server, dir) = setup().await;
    let host = MemoryHost::new();

    let recipe = Recipe::new(host, config(&server.url(), dir.path()), facts()).unwrap();
    recipe.add().await.unwrap();
    let host = recipe.into_host();

    let mut changed = config(&server.url(), dir.path());
    changed.aerospike_ips.push("10.0.0.3".to_string());
    let recipe = Recipe::new(host, changed, facts()).unwrap();
    let report = recipe.add().await.unwrap();

    assert_eq!(
        report.changed_files,
        vec![PathBuf::from("/etc/rb-reputation/config.properties")]
    );
    assert!(report.restarted);

    let properties = recipe
        .host()
        .file_content(Path::new("/etc/rb-reputation/config.properties"))
        .await
        .unwrap();
    assert!(properties.contains("10.0.0.1,10.0.0.2,10.0.0.3"));
    assert!(properties.contains("4096"));
}

#[tokio::test]
async fn test_failed_add_completes_normally() {
    let (server, dir) = setup().await;
    let host = MemoryHost::new().failing_package();
    let recipe = Recipe::new(host, config(&server.url(), dir.path()), facts()).unwrap();

    let outcome = recipe.run(Action::Add).await;

    assert!(!outcome.is_ok());
    assert_eq!(outcome.action, Action::Add);
}

#[tokio::test]
async fn test_register_is_issued_once() {
    let (mut server, dir) = setup().await;
    let mock = server
        .mock("PUT", "/v1/agent/service/register")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let cfg = config(&server.url(), dir.path());
    let store = StateStore::new(&cfg.state_file);
    let recipe = Recipe::new(MemoryHost::new(), cfg, facts()).unwrap();

    assert!(recipe.run(Action::Register).await.is_ok());
    assert_eq!(store.load().await.unwrap(), RegistrationState::registered());

    assert!(recipe.run(Action::Register).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_deregister_is_issued_once() {
    let (mut server, dir) = setup().await;
    let mock = server
        .mock("PUT", "/v1/agent/service/deregister/rb-reputation-node1")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let cfg = config(&server.url(), dir.path());
    let store = StateStore::new(&cfg.state_file);
    store.save(RegistrationState::registered()).await.unwrap();
    let recipe = Recipe::new(MemoryHost::new(), cfg, facts()).unwrap();

    assert!(recipe.run(Action::Deregister).await.is_ok());
    assert_eq!(store.load().await.unwrap(), RegistrationState::unregistered());

    assert!(recipe.run(Action::Deregister).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_deregister_when_never_registered_is_a_no_op() {
    let (mut server, dir) = setup().await;
    let mock = server
        .mock("PUT", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let recipe = Recipe::new(MemoryHost::new(), config(&server.url(), dir.path()), facts()).unwrap();

    assert!(recipe.run(Action::Deregister).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_register_keeps_flag() {
    let (mut server, dir) = setup().await;
    let mock = server
        .mock("PUT", "/v1/agent/service/register")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let cfg = config(&server.url(), dir.path());
    let store = StateStore::new(&cfg.state_file);
    let recipe = Recipe::new(MemoryHost::new(), cfg, facts()).unwrap();

    let outcome = recipe.run(Action::Register).await;
    assert!(!outcome.is_ok());
    assert_eq!(store.load().await.unwrap(), RegistrationState::unregistered());

    // Still unregistered, so the next run tries again
    assert!(!recipe.run(Action::Register).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_deregister_keeps_flag() {
    let (mut server, dir) = setup().await;
    let mock = server
        .mock("PUT", "/v1/agent/service/deregister/rb-reputation-node1")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let cfg = config(&server.url(), dir.path());
    let store = StateStore::new(&cfg.state_file);
    store.save(RegistrationState::registered()).await.unwrap();
    let recipe = Recipe::new(MemoryHost::new(), cfg, facts()).unwrap();

    let outcome = recipe.run(Action::Deregister).await;
    assert!(!outcome.is_ok());
    assert_eq!(store.load().await.unwrap(), RegistrationState::registered());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_remove_stops_service() {
    let (server, dir) = setup().await;
    let recipe = Recipe::new(MemoryHost::new(), config(&server.url(), dir.path()), facts()).unwrap();

    recipe.add().await.unwrap();
    assert!(recipe.run(Action::Remove).await.is_ok());

    let state = recipe.host().service_state("rb-reputation").await.unwrap();
    assert!(!state.enabled);
    assert!(!state.active);
}

#[tokio::test]
async fn test_failed_remove_completes_normally() {
    let (server, dir) = setup().await;
    let recipe = Recipe::new(
        MemoryHost::new().failing_service(),
        config(&server.url(), dir.path()),
        facts(),
    )
    .unwrap();

    let outcome = recipe.run(Action::Remove).await;
    assert_eq!(outcome.action, Action::Remove);
    assert!(!outcome.is_ok());
    assert!(!recipe.host().calls().await.iter().any(|c| c.starts_with("service")));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config("http://localhost:8500", dir.path());
    cfg.memory = 0;

    assert!(Recipe::new(MemoryHost::new(), cfg, facts()).is_err());
}
