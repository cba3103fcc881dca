use prism_core::config::{CliOverrides, ConfigKey, EnvSource, IniSource, Resolver};
use serial_test::serial;

const VARS: [&str; 3] = ["workday_tenant_name", "WORKDAY_TENANT_NAME", "prism_client_id"];

fn clear_vars() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn process_environment_sits_between_cli_and_file() {
    clear_vars();
    std::env::set_var("workday_tenant_name", "env_tenant");
    std::env::set_var("prism_client_id", "env_client");

    let mut cli = CliOverrides::new();
    cli.set(ConfigKey::ClientId, Some("cli_client".into()));
    let file = IniSource::from_values(
        "default",
        [("workday_tenant_name", "file_tenant"), ("prism_client_secret", "file_secret")],
    );
    let resolver = Resolver::new()
        .with_source(cli)
        .with_source(EnvSource::from_process())
        .with_source(file);

    assert_eq!(resolver.resolve(ConfigKey::ClientId).as_deref(), Some("cli_client"));
    assert_eq!(resolver.resolve(ConfigKey::TenantName).as_deref(), Some("env_tenant"));
    assert_eq!(resolver.resolve(ConfigKey::ClientSecret).as_deref(), Some("file_secret"));
    clear_vars();
}

#[test]
#[serial]
fn uppercase_process_variables_are_read() {
    clear_vars();
    std::env::set_var("WORKDAY_TENANT_NAME", "upper_tenant");

    let resolver = Resolver::new().with_source(EnvSource::from_process());
    assert_eq!(resolver.resolve(ConfigKey::TenantName).as_deref(), Some("upper_tenant"));
    clear_vars();
}
