use ag_authz::vocabulary::{action, resource};
use ag_authz::{AuthorizationGate, AuthzRequest, BackendRegistry, GateError};
use ag_domain::config::Config;
use ag_domain::identity::Identity;
use serde_json::json;

fn gate_for(toml_str: &str) -> AuthorizationGate {
    let config: Config = toml::from_str(toml_str).unwrap();
    let backend = BackendRegistry::default().build(&config.authz).unwrap();
    AuthorizationGate::new(backend)
}

#[tokio::test]
async fn rbac_from_config_file() {
    let gate = gate_for(
        r#"
        [authz]
        backend = "rbac"
        "#,
    );
    assert_eq!(gate.backend_name(), "rbac");

    let viewer = Identity::new("v").with_claim("roles", json!(["viewer"]));
    let stop = AuthzRequest::new(resource::GRAPH, action::STOP)
        .with_resource_id(Some("thread-9".into()));
    let err = gate.authorize(&viewer, &stop).await.unwrap_err();
    assert!(matches!(err, GateError::Forbidden { ref action, .. } if action == "stop"));

    let admin = Identity::new("a").with_claim("roles", json!(["admin"]));
    assert!(gate.authorize(&admin, &stop).await.is_ok());
}

#[tokio::test]
async fn empty_config_uses_default_backend() {
    let gate = gate_for("");
    assert_eq!(gate.backend_name(), "default");
    let req = AuthzRequest::new(resource::STORE, action::WRITE);
    assert!(gate.authorize(&Identity::anonymous(), &req).await.is_ok());
}
