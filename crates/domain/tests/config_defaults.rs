use tl_domain::config::Config;

#[test]
fn default_role_pool_global_cap_is_eight() {
    let config = Config::default();
    assert_eq!(config.role_pool.global_max_concurrent, 8);
}

#[test]
fn explicit_toml_overrides_role_pool() {
    let toml_str = r#"
[role_pool]
global_max_concurrent = 2

[role_pool.per_role_max_concurrent]
frontend = 1
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.role_pool.global_max_concurrent, 2);
    assert_eq!(config.role_pool.per_role_max_concurrent.get("frontend"), Some(&1));
}

#[test]
fn explicit_toml_configures_a_provider_profile() {
    let toml_str = r#"
[[providers.profiles]]
name = "primary"
priority = 2
kind = "test-double"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.providers.profiles.len(), 1);
    assert_eq!(config.providers.profiles[0].name, "primary");
    assert_eq!(config.providers.profiles[0].priority, 2);
}
